//! Plans brokers for a replica workload. Run `plan-capacity --help` for more information.

#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::default_trait_access,
    clippy::cast_precision_loss
)]

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

use eyre::{eyre, WrapErr};
use indicatif::ProgressBar;
use itertools::Itertools;
use rand::SeedableRng;
use rand_chacha::ChaChaRng;
use rayon::prelude::*;
use structopt::StructOpt;

use planner::report::PlanReport;
use planner::{
    CapacityPlanner, HardwareProfile, InitialBinCount, InstanceType, Replica, Strategy, Topic,
    VolumeClass,
};

/// Packing strategy names accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::ToString)]
#[strum(serialize_all = "kebab_case")]
enum StrategyOption {
    /// Best-fit-decreasing.
    Bfd,
    /// Random placement ignoring capacity.
    Random,
    /// Random order with round-robin brokers.
    RandomBalancing,
}

/// Plans the number of brokers required to host a set of replicas.
#[derive(Debug, StructOpt)]
#[structopt(name = "plan-capacity")]
struct Opt {
    /// JSON array of replica records.
    #[structopt(long, required_unless = "topics", conflicts_with = "topics")]
    replicas: Option<PathBuf>,

    /// JSON array of topic descriptions to derive replicas from.
    #[structopt(long, required_unless = "replicas")]
    topics: Option<PathBuf>,

    /// Broker instance type. Repeat with `--sweep` to evaluate several.
    #[structopt(long = "instance-type", default_value = "m4.4xlarge", number_of_values = 1)]
    instance_types: Vec<InstanceType>,

    /// Storage volume class.
    #[structopt(long, default_value = "st1")]
    volume_class: VolumeClass,

    /// Packing strategy: bfd, random, or random-balancing.
    #[structopt(long, default_value = "bfd")]
    strategy: StrategyOption,

    /// Number of brokers for the random strategies.
    #[structopt(long)]
    bin_count: Option<usize>,

    /// Sort brokers once per attempt instead of before every placement.
    #[structopt(long = "static")]
    static_order: bool,

    /// Start the bin-count search at one broker per replica.
    #[structopt(long)]
    start_with_replica_count: bool,

    /// Seed of the random strategies.
    #[structopt(long)]
    seed: Option<u64>,

    /// Give up when this many brokers are not enough.
    #[structopt(long)]
    max_bin_count: Option<usize>,

    /// Evaluate every instance type in parallel and print one summary each.
    #[structopt(long)]
    sweep: bool,

    /// Verbosity.
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u64,

    /// Store the logs in this file.
    #[structopt(long)]
    log_output: Option<PathBuf>,

    /// Do not log to the stderr.
    #[structopt(long)]
    no_stderr: bool,
}

impl Opt {
    fn strategy(&self) -> eyre::Result<Strategy> {
        let bin_count = || {
            self.bin_count
                .ok_or_else(|| eyre!("--bin-count is required for {}", self.strategy.to_string()))
        };
        Ok(match self.strategy {
            StrategyOption::Bfd => Strategy::BestFitDecreasing {
                dynamic: !self.static_order,
                initial: if self.start_with_replica_count {
                    InitialBinCount::ReplicaCount
                } else {
                    InitialBinCount::LowerBound
                },
            },
            StrategyOption::Random => Strategy::Random {
                bin_count: bin_count()?,
            },
            StrategyOption::RandomBalancing => Strategy::RandomBalancing {
                bin_count: bin_count()?,
            },
        })
    }

    fn planner(&self, instance: InstanceType) -> eyre::Result<CapacityPlanner> {
        let planner = CapacityPlanner::new(
            HardwareProfile::new(instance, self.volume_class),
            self.strategy()?,
        );
        Ok(match self.max_bin_count {
            Some(max_bin_count) => planner.max_bin_count(max_bin_count),
            None => planner,
        })
    }

    fn rng(&self, run: u64) -> ChaChaRng {
        match self.seed {
            Some(seed) => ChaChaRng::seed_from_u64(seed.wrapping_add(run)),
            None => ChaChaRng::from_entropy(),
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> eyre::Result<T> {
    let file = File::open(path).wrap_err_with(|| format!("unable to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .wrap_err_with(|| format!("unable to parse {}", path.display()))
}

fn load_replicas(opt: &Opt) -> eyre::Result<Vec<Replica>> {
    if let Some(path) = &opt.replicas {
        return read_json(path);
    }
    let path = opt
        .topics
        .as_ref()
        .ok_or_else(|| eyre!("either --replicas or --topics is required"))?;
    let topics: Vec<Topic> = read_json(path)?;
    let mut replicas = Vec::new();
    for topic in &topics {
        replicas.extend(
            topic
                .replicas()
                .wrap_err_with(|| format!("invalid topic {}", topic.name()))?,
        );
    }
    Ok(replicas)
}

fn plan(
    opt: &Opt,
    instance: InstanceType,
    replicas: &[Replica],
    run: u64,
) -> eyre::Result<PlanReport> {
    let planner = opt.planner(instance)?;
    let mut rng = opt.rng(run);
    log::info!("[{}] Planning with {:?}", instance, planner.strategy());
    let start = Instant::now();
    let plan = match planner.strategy() {
        Strategy::Random { .. } => planner.place(replicas, &mut rng),
        _ => planner.solve(replicas, &mut rng),
    }
    .wrap_err_with(|| format!("planning failed for {}", instance))?;
    let elapsed = start.elapsed();
    log::info!(
        "[{}] {} brokers in {:.3}s",
        instance,
        plan.brokers().len(),
        elapsed.as_secs_f64()
    );
    let report = if opt.sweep {
        PlanReport::summary(&plan, &planner)
    } else {
        PlanReport::new(&plan, &planner)
    };
    Ok(report.elapsed(elapsed))
}

fn run(opt: &Opt) -> eyre::Result<Vec<PlanReport>> {
    let replicas = load_replicas(opt)?;
    log::info!("Loaded {} replicas", replicas.len());
    if !opt.sweep {
        let instance = match opt.instance_types.as_slice() {
            [instance] => *instance,
            _ => return Err(eyre!("several instance types require --sweep")),
        };
        return Ok(vec![plan(opt, instance, &replicas, 0)?]);
    }
    log::info!(
        "Sweeping over {}",
        opt.instance_types.iter().map(ToString::to_string).join(", ")
    );
    let progress_bar = ProgressBar::new(opt.instance_types.len() as u64);
    let reports: Vec<_> = opt
        .instance_types
        .par_iter()
        .enumerate()
        .map(|(run, &instance)| {
            let report = plan(opt, instance, &replicas, run as u64);
            progress_bar.inc(1);
            report
        })
        .collect();
    progress_bar.finish_and_clear();
    Ok(reports
        .into_iter()
        .filter_map(|report| match report {
            Ok(report) => Some(report),
            Err(err) => {
                log::error!("{:?}", err);
                None
            }
        })
        .collect())
}

fn set_up_logger(opt: &Opt) -> Result<(), fern::InitError> {
    let level = match opt.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{:<5} {}: {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level);
    if let Some(path) = &opt.log_output {
        dispatch = dispatch.chain(File::create(path)?);
    }
    if !opt.no_stderr {
        dispatch = dispatch.chain(std::io::stderr());
    }
    dispatch.apply()?;
    Ok(())
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let opt = Opt::from_args();
    set_up_logger(&opt)?;
    for report in run(&opt)? {
        println!("{}", serde_json::to_string(&report)?);
    }
    Ok(())
}
