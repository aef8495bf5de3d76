//! Packing strategies.
//!
//! [`Strategy::BestFitDecreasing`] searches for the smallest number of brokers that fits the
//! workload: every attempt packs from scratch on a fixed number of fresh brokers, and a failed
//! attempt is retried with one more broker. The randomized strategies pack onto a fixed number
//! of brokers and only exist to compare against.

use ordered_float::OrderedFloat;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;
use serde::{Deserialize, Serialize};

use crate::{
    Broker, BrokerId, Dimension, Error, HardwareProfile, Replica, ResourceVector, Result,
    SizeNormalizer,
};

/// Where the bin-count search of best-fit-decreasing starts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialBinCount {
    /// The dimension-wise lower bound. See [`CapacityPlanner::lower_bound`].
    LowerBound,
    /// One broker per replica.
    ReplicaCount,
}

/// Packing strategy with its configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Largest replica first, into the fullest broker that accepts it.
    BestFitDecreasing {
        /// Renormalize and reorder brokers before every placement.
        dynamic: bool,
        /// Start of the bin-count search.
        initial: InitialBinCount,
    },
    /// Random order onto brokers that only reject a second replica of a partition.
    Random {
        /// Number of brokers.
        bin_count: usize,
    },
    /// Random order onto fully checked brokers; a broker that accepts moves to the back.
    RandomBalancing {
        /// Number of brokers.
        bin_count: usize,
    },
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::BestFitDecreasing {
            dynamic: true,
            initial: InitialBinCount::LowerBound,
        }
    }
}

/// Outcome of a planning run.
#[derive(Debug, Clone)]
pub struct Plan {
    brokers: Vec<Broker>,
    bin_count: usize,
    failed_bin_counts: Vec<usize>,
    lower_bound: usize,
}

impl Plan {
    /// Brokers in ID order. Best-fit-decreasing drops brokers without replicas.
    #[must_use]
    pub fn brokers(&self) -> &[Broker] {
        &self.brokers
    }

    /// Consumes the plan, returning its brokers.
    #[must_use]
    pub fn into_brokers(self) -> Vec<Broker> {
        self.brokers
    }

    /// Number of brokers of the successful attempt, before pruning.
    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    /// Bin counts that were attempted and failed, in increasing order.
    #[must_use]
    pub fn failed_bin_counts(&self) -> &[usize] {
        &self.failed_bin_counts
    }

    /// Lower bound on the number of brokers for the packed workload.
    #[must_use]
    pub fn lower_bound(&self) -> usize {
        self.lower_bound
    }

    /// Brokers used relative to the lower bound.
    #[must_use]
    pub fn competitive_ratio(&self) -> f64 {
        competitive_ratio(self.brokers.len(), self.lower_bound)
    }
}

/// Ratio of `broker_count` to `lower_bound`; `1.0` when the lower bound is zero.
#[must_use]
pub fn competitive_ratio(broker_count: usize, lower_bound: usize) -> f64 {
    if lower_bound == 0 {
        1.0
    } else {
        broker_count as f64 / lower_bound as f64
    }
}

/// Creates `count` empty, fully checked brokers with IDs `0..count`.
///
/// # Errors
///
/// Fails if the hardware profile cannot be modeled.
pub fn create_brokers(profile: &HardwareProfile, count: usize) -> Result<Vec<Broker>> {
    (0..count)
        .map(|id| Broker::new(BrokerId::from(id), profile.clone()))
        .collect()
}

/// Plans brokers of a single hardware profile for a set of replicas.
#[derive(Debug, Clone)]
pub struct CapacityPlanner {
    profile: HardwareProfile,
    strategy: Strategy,
    max_bin_count: Option<usize>,
}

impl CapacityPlanner {
    /// Constructs a planner.
    #[must_use]
    pub fn new(profile: HardwareProfile, strategy: Strategy) -> Self {
        Self {
            profile,
            strategy,
            max_bin_count: None,
        }
    }

    /// Caps the bin-count search of best-fit-decreasing. Defaults to the number of replicas.
    #[must_use]
    pub fn max_bin_count(mut self, max_bin_count: usize) -> Self {
        self.max_bin_count = Some(max_bin_count);
        self
    }

    /// Hardware of the planned brokers.
    #[must_use]
    pub fn profile(&self) -> &HardwareProfile {
        &self.profile
    }

    /// Selected strategy.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Smallest broker count any packing could use: the total requirement in each dimension
    /// divided by the capacity of one broker, rounded up, maximized over dimensions.
    #[must_use]
    pub fn lower_bound(&self, replicas: &[Replica]) -> usize {
        let block_size = self.profile.block_size();
        let total: ResourceVector = replicas.iter().map(|r| r.requirement(block_size)).sum();
        let capacity = self.profile.capacity();
        Dimension::ALL
            .iter()
            .filter(|&&d| capacity[d] > 0)
            .map(|&d| {
                let (quotient, remainder) = (total[d] / capacity[d], total[d] % capacity[d]);
                (quotient + i64::from(remainder > 0)) as usize
            })
            .max()
            .unwrap_or(0)
    }

    /// Packs `replicas` onto checked brokers.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedStrategy`] for [`Strategy::Random`], which only supports
    ///   [`CapacityPlanner::place`].
    /// - [`Error::PackingInfeasible`] if random balancing cannot place a replica.
    /// - [`Error::BinCountExhausted`] if best-fit-decreasing reaches the bin-count cap.
    /// - Any error of broker construction or normalization.
    pub fn solve<R: Rng + ?Sized>(&self, replicas: &[Replica], rng: &mut R) -> Result<Plan> {
        match self.strategy {
            Strategy::BestFitDecreasing { dynamic, initial } => {
                self.best_fit_decreasing(replicas, dynamic, initial)
            }
            Strategy::RandomBalancing { bin_count } => {
                self.random_balancing(replicas, bin_count, rng)
            }
            Strategy::Random { .. } => Err(Error::UnsupportedStrategy(
                "random placement does not solve; use place",
            )),
        }
    }

    /// Places `replicas` in random order onto unchecked brokers.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedStrategy`] for any strategy other than [`Strategy::Random`].
    /// - [`Error::PackingInfeasible`] if every broker already holds the replica's partition.
    pub fn place<R: Rng + ?Sized>(&self, replicas: &[Replica], rng: &mut R) -> Result<Plan> {
        let bin_count = match self.strategy {
            Strategy::Random { bin_count } => bin_count,
            _ => {
                return Err(Error::UnsupportedStrategy(
                    "only random placement supports place",
                ))
            }
        };
        let mut brokers = (0..bin_count)
            .map(|id| {
                let seed = rng.gen::<u64>();
                Broker::naive(
                    BrokerId::from(id),
                    self.profile.clone(),
                    ChaChaRng::seed_from_u64(seed),
                )
            })
            .collect::<Result<Vec<_>>>()?;
        for replica in random_order(replicas, rng) {
            brokers.shuffle(rng);
            if try_place(&mut brokers, replica)?.is_none() {
                return Err(Error::PackingInfeasible {
                    bin_count,
                    replica: replica.replica_id(),
                });
            }
        }
        brokers.sort_by_key(Broker::id);
        log::info!(
            "Randomly placed {} replicas on {} brokers",
            replicas.len(),
            bin_count
        );
        Ok(self.plan(brokers, bin_count, Vec::new(), replicas))
    }

    fn random_balancing<R: Rng + ?Sized>(
        &self,
        replicas: &[Replica],
        bin_count: usize,
        rng: &mut R,
    ) -> Result<Plan> {
        let mut brokers = create_brokers(&self.profile, bin_count)?;
        balance(&mut brokers, random_order(replicas, rng))?;
        brokers.sort_by_key(Broker::id);
        log::info!(
            "Balanced {} replicas over {} brokers",
            replicas.len(),
            bin_count
        );
        Ok(self.plan(brokers, bin_count, Vec::new(), replicas))
    }

    fn best_fit_decreasing(
        &self,
        replicas: &[Replica],
        dynamic: bool,
        initial: InitialBinCount,
    ) -> Result<Plan> {
        let lower_bound = self.lower_bound(replicas);
        if replicas.is_empty() {
            return Ok(self.plan(Vec::new(), 0, Vec::new(), replicas));
        }
        let limit = self.max_bin_count.unwrap_or_else(|| replicas.len());
        let mut bin_count = match initial {
            InitialBinCount::LowerBound => lower_bound.max(1),
            InitialBinCount::ReplicaCount => replicas.len(),
        };
        let mut failed_bin_counts = Vec::new();
        loop {
            if bin_count > limit {
                return Err(Error::BinCountExhausted { limit });
            }
            match self.pack(replicas, bin_count, dynamic) {
                Ok(mut brokers) => {
                    brokers.retain(|b| !b.is_empty());
                    brokers.sort_by_key(Broker::id);
                    log::info!(
                        "Packed {} replicas onto {} brokers ({} empty pruned) after {} attempts",
                        replicas.len(),
                        brokers.len(),
                        bin_count - brokers.len(),
                        failed_bin_counts.len() + 1
                    );
                    return Ok(self.plan(brokers, bin_count, failed_bin_counts, replicas));
                }
                Err(Error::PackingInfeasible { replica, .. }) => {
                    log::debug!("{} brokers are not enough: {} does not fit", bin_count, replica);
                    failed_bin_counts.push(bin_count);
                    bin_count += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// A single best-fit-decreasing attempt on `bin_count` fresh brokers.
    fn pack(&self, replicas: &[Replica], bin_count: usize, dynamic: bool) -> Result<Vec<Broker>> {
        let block_size = self.profile.block_size();
        let mut brokers = create_brokers(&self.profile, bin_count)?;
        let mut pending = replicas.to_vec();
        let normalizer = SizeNormalizer::new(&brokers)?;
        normalizer.update_replicas(&mut pending, block_size);
        normalizer.update_brokers(&mut brokers);
        brokers.sort_by_key(|b| OrderedFloat(b.size()));
        while let Some(next) = largest(&pending) {
            let replica = pending.remove(next);
            if dynamic {
                SizeNormalizer::new(&brokers)?.update_brokers(&mut brokers);
                brokers.sort_by_key(|b| OrderedFloat(b.size()));
            }
            if try_place(&mut brokers, &replica)?.is_none() {
                return Err(Error::PackingInfeasible {
                    bin_count,
                    replica: replica.replica_id(),
                });
            }
        }
        Ok(brokers)
    }

    fn plan(
        &self,
        brokers: Vec<Broker>,
        bin_count: usize,
        failed_bin_counts: Vec<usize>,
        replicas: &[Replica],
    ) -> Plan {
        Plan {
            brokers,
            bin_count,
            failed_bin_counts,
            lower_bound: self.lower_bound(replicas),
        }
    }
}

/// Position of the first replica of maximal size.
fn largest(replicas: &[Replica]) -> Option<usize> {
    replicas
        .iter()
        .enumerate()
        .rev()
        .max_by_key(|(_, r)| OrderedFloat(r.size()))
        .map(|(position, _)| position)
}

/// Adds `replica` to the first broker that accepts it, returning that broker's position.
fn try_place(brokers: &mut [Broker], replica: &Replica) -> Result<Option<usize>> {
    for (position, broker) in brokers.iter_mut().enumerate() {
        if broker.add(replica)? {
            return Ok(Some(position));
        }
    }
    Ok(None)
}

/// Places replicas in the given order, moving the broker that accepts one to the back.
/// On failure, `brokers` is left as it was when the replica could not be placed.
fn balance<'a, I>(brokers: &mut Vec<Broker>, order: I) -> Result<()>
where
    I: IntoIterator<Item = &'a Replica>,
{
    let bin_count = brokers.len();
    for replica in order {
        match try_place(brokers, replica)? {
            Some(position) => {
                let broker = brokers.remove(position);
                brokers.push(broker);
            }
            None => {
                return Err(Error::PackingInfeasible {
                    bin_count,
                    replica: replica.replica_id(),
                })
            }
        }
    }
    Ok(())
}

fn random_order<'a, R: Rng + ?Sized>(replicas: &'a [Replica], rng: &mut R) -> Vec<&'a Replica> {
    let mut order: Vec<_> = replicas.iter().collect();
    order.shuffle(rng);
    order
}

#[cfg(test)]
mod test {
    use super::*;
    use super::Strategy;
    use crate::{
        FixedIops, InstanceType, Topic, TopicPartition, VolumeClass, BLOCK_SIZE_KB,
    };
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn profile() -> HardwareProfile {
        HardwareProfile::new(InstanceType::M4_4X, VolumeClass::St1).model(FixedIops(1e9))
    }

    /// Leaders of distinct partitions with identical demand.
    fn uniform(count: u32, demand: [i64; 5]) -> Vec<Replica> {
        (0..count)
            .map(|p| Replica::new("t", p, 0, ResourceVector::new(demand), 0))
            .collect()
    }

    fn bfd(dynamic: bool, initial: InitialBinCount) -> CapacityPlanner {
        CapacityPlanner::new(profile(), Strategy::BestFitDecreasing { dynamic, initial })
    }

    fn check_plan(plan: &Plan, replicas: &[Replica]) {
        let mut placed = 0;
        for broker in plan.brokers() {
            let mut partitions = HashSet::new();
            let mut demand = ResourceVector::zero();
            for replica in broker.replicas() {
                assert!(partitions.insert(replica.topic_partition()));
                demand += replica.requirement(128);
            }
            for &d in &Dimension::SUBTRACTIVE {
                assert_eq!(broker.capacity()[d] - broker.remaining()[d], demand[d]);
            }
            assert_eq!(broker.remaining().first_negative(), None);
            let on_volumes: usize = broker
                .volumes()
                .iter()
                .map(|v| v.replica_indices().len())
                .sum();
            assert_eq!(on_volumes, broker.replicas().len());
            placed += broker.replicas().len();
        }
        assert_eq!(placed, replicas.len());
    }

    #[test]
    fn test_lower_bound() {
        let planner = bfd(true, InitialBinCount::LowerBound);
        assert_eq!(planner.lower_bound(&[]), 0);
        assert_eq!(planner.lower_bound(&uniform(60, [1, 1, 1, 1, 79])), 20);
        assert_eq!(planner.lower_bound(&uniform(61, [1, 1, 1, 1, 79])), 21);
        // 25 MB/s is 200 IOPS, a tenth of the ceiling.
        assert_eq!(planner.lower_bound(&uniform(31, [1, 1, 25, 1, 1])), 4);
    }

    #[test]
    fn test_bfd_reaches_lower_bound_on_uniform_workload() -> Result<()> {
        let replicas = uniform(60, [1, 1, 1, 1, 79]);
        let mut rng = ChaChaRng::seed_from_u64(0);
        for &dynamic in &[true, false] {
            let plan = bfd(dynamic, InitialBinCount::LowerBound).solve(&replicas, &mut rng)?;
            assert_eq!(plan.brokers().len(), 20);
            assert!(plan.failed_bin_counts().is_empty());
            assert_eq!(plan.lower_bound(), 20);
            approx::assert_abs_diff_eq!(plan.competitive_ratio(), 1.0);
            check_plan(&plan, &replicas);
        }
        Ok(())
    }

    #[test]
    fn test_bfd_grows_bin_count() -> Result<()> {
        // Two replicas per partition cannot share a broker, so one broker is never enough.
        let replicas: Vec<_> = (0..2)
            .map(|id| Replica::new("t", 0, id, ResourceVector::new([1, 1, 1, 1, 1]), 0))
            .collect();
        let plan = bfd(true, InitialBinCount::LowerBound).solve(&replicas, &mut rand::thread_rng())?;
        assert_eq!(plan.lower_bound(), 1);
        assert_eq!(plan.failed_bin_counts(), &[1]);
        assert_eq!(plan.bin_count(), 2);
        assert_eq!(plan.brokers().len(), 2);
        Ok(())
    }

    #[test]
    fn test_bfd_prunes_empty_brokers() -> Result<()> {
        let replicas = uniform(10, [1, 1, 1, 1, 1]);
        let plan =
            bfd(false, InitialBinCount::ReplicaCount).solve(&replicas, &mut rand::thread_rng())?;
        assert_eq!(plan.bin_count(), 10);
        assert_eq!(plan.brokers().len(), 1);
        assert!(plan.failed_bin_counts().is_empty());
        Ok(())
    }

    #[test]
    fn test_bfd_bin_count_cap() {
        let replicas = uniform(4, [1, 1, 1, 1, 200]);
        let planner = bfd(true, InitialBinCount::LowerBound).max_bin_count(3);
        assert!(matches!(
            planner.solve(&replicas, &mut rand::thread_rng()),
            Err(Error::BinCountExhausted { limit: 3 })
        ));
        let oversized = uniform(2, [1, 1, 1, 1, 300]);
        assert!(matches!(
            bfd(true, InitialBinCount::LowerBound).solve(&oversized, &mut rand::thread_rng()),
            Err(Error::BinCountExhausted { limit: 2 })
        ));
    }

    #[test]
    fn test_bfd_empty_workload() -> Result<()> {
        let plan = bfd(true, InitialBinCount::LowerBound).solve(&[], &mut rand::thread_rng())?;
        assert!(plan.brokers().is_empty());
        assert_eq!(plan.bin_count(), 0);
        Ok(())
    }

    #[test]
    fn test_largest_is_first_maximum() {
        let mut replicas = uniform(4, [1, 1, 1, 1, 1]);
        for (replica, &size) in replicas.iter_mut().zip(&[1.0, 3.0, 3.0, 2.0]) {
            replica.set_size(size);
        }
        assert_eq!(largest(&replicas), Some(1));
        assert_eq!(largest(&[]), None);
    }

    #[test]
    fn test_random_balancing_round_robin() -> Result<()> {
        let replicas = uniform(60, [1, 1, 1, 1, 79]);
        let planner = CapacityPlanner::new(profile(), Strategy::RandomBalancing { bin_count: 20 });
        for seed in 0..5 {
            let plan = planner.solve(&replicas, &mut ChaChaRng::seed_from_u64(seed))?;
            assert_eq!(plan.brokers().len(), 20);
            for broker in plan.brokers() {
                assert_eq!(broker.replicas().len(), 3);
            }
            check_plan(&plan, &replicas);
        }
        let planner = CapacityPlanner::new(profile(), Strategy::RandomBalancing { bin_count: 19 });
        assert!(matches!(
            planner.solve(&replicas, &mut ChaChaRng::seed_from_u64(0)),
            Err(Error::PackingInfeasible { bin_count: 19, .. })
        ));
        Ok(())
    }

    /// Six topics whose leaders are bound by outbound network.
    fn network_out_heavy() -> Result<Vec<Replica>> {
        let topics = vec![
            Topic::new("t1", 1_000_000, 234, 70)
                .consumers(4)
                .replays(2, vec![3_000_000, 4_000_000])
                .retention_hours(2),
            Topic::new("t2", 2_000_000, 234, 80)
                .consumers(3)
                .replays(1, vec![4_000_000])
                .retention_hours(2),
            Topic::new("t3", 3_000_000, 234, 100)
                .consumers(5)
                .replays(2, vec![5_000_000, 6_000_000]),
            Topic::new("t4", 2_000_000, 234, 80)
                .consumers(2)
                .replays(3, vec![3_000_000, 4_000_000, 6_000_000])
                .retention_hours(2),
            Topic::new("t5", 1_500_000, 234, 70)
                .consumers(3)
                .replays(2, vec![3_000_000, 4_000_000]),
            Topic::new("t6", 1_800_000, 234, 100)
                .consumers(6)
                .replays(1, vec![4_000_000]),
        ];
        let mut replicas = Vec::new();
        for topic in topics {
            replicas.extend(topic.replication_factor(2).max_consumer_lag_secs(20).replicas()?);
        }
        Ok(replicas)
    }

    #[test]
    fn test_random_balancing_fragments_network_out() -> Result<()> {
        let replicas = network_out_heavy()?;
        let profile = HardwareProfile::new(InstanceType::M4_4X, VolumeClass::St1);
        let bin_count = CapacityPlanner::new(profile.clone(), Strategy::default())
            .solve(&replicas, &mut ChaChaRng::seed_from_u64(0))?
            .brokers()
            .len();
        let total_net_out: i64 = replicas
            .iter()
            .map(|r| r.demand()[Dimension::NetworkOut])
            .sum();
        let mut failures = 0;
        for seed in 0..5 {
            let mut brokers = create_brokers(&profile, bin_count)?;
            let order = random_order(&replicas, &mut ChaChaRng::seed_from_u64(seed));
            let failed = match balance(&mut brokers, order) {
                Ok(()) => continue,
                Err(Error::PackingInfeasible { replica, .. }) => replica,
                Err(err) => return Err(err),
            };
            failures += 1;
            let replica = replicas
                .iter()
                .find(|r| r.replica_id() == failed)
                .expect("failed replica comes from the input");
            let requirement = replica.requirement(BLOCK_SIZE_KB);
            let partition = replica.topic_partition();
            let mut holding_partition = 0;
            for broker in &brokers {
                if broker.replicas().iter().any(|r| r.topic_partition() == partition) {
                    holding_partition += 1;
                } else {
                    // Every other broker is out of outbound network for this replica.
                    assert!(
                        requirement[Dimension::NetworkOut]
                            > broker.remaining()[Dimension::NetworkOut]
                    );
                }
            }
            assert!(holding_partition <= 1);
            // The cluster as a whole still has room for everything not yet placed.
            let remaining: i64 = brokers
                .iter()
                .map(|b| b.remaining()[Dimension::NetworkOut])
                .sum();
            let placed: i64 = brokers
                .iter()
                .flat_map(Broker::replicas)
                .map(|r| r.demand()[Dimension::NetworkOut])
                .sum();
            assert!(remaining >= total_net_out - placed);
        }
        assert!(failures > 0);
        Ok(())
    }

    #[test]
    fn test_random_placement() -> Result<()> {
        let replicas: Vec<_> = (0..20)
            .flat_map(|p| {
                (0..2).map(move |id| {
                    Replica::new("t", p, id, ResourceVector::new([1, 1, 1, 1, 100]), 0)
                })
            })
            .collect();
        let planner = CapacityPlanner::new(profile(), Strategy::Random { bin_count: 2 });
        let plan = planner.place(&replicas, &mut ChaChaRng::seed_from_u64(3))?;
        assert_eq!(plan.brokers().len(), 2);
        for broker in plan.brokers() {
            // Each broker holds exactly one replica of every partition.
            let partitions: HashSet<TopicPartition> =
                broker.replicas().iter().map(Replica::topic_partition).collect();
            assert_eq!(partitions.len(), 20);
        }
        assert!(matches!(
            planner.solve(&replicas, &mut ChaChaRng::seed_from_u64(3)),
            Err(Error::UnsupportedStrategy(_))
        ));
        let single = CapacityPlanner::new(profile(), Strategy::Random { bin_count: 1 });
        assert!(matches!(
            single.place(&replicas, &mut ChaChaRng::seed_from_u64(3)),
            Err(Error::PackingInfeasible { bin_count: 1, .. })
        ));
        assert!(matches!(
            bfd(true, InitialBinCount::LowerBound).place(&replicas, &mut ChaChaRng::seed_from_u64(3)),
            Err(Error::UnsupportedStrategy(_))
        ));
        Ok(())
    }

    fn workload(demands: &[(i64, i64, i64, i64, i64)], replication: u32) -> Vec<Replica> {
        demands
            .iter()
            .enumerate()
            .flat_map(|(p, &(ram, storage, bandwidth, net_in, net_out))| {
                (0..replication).map(move |id| {
                    Replica::new(
                        "topic",
                        p as u32,
                        id,
                        ResourceVector::new([ram, storage, bandwidth, net_in, net_out]),
                        50,
                    )
                })
            })
            .collect()
    }

    proptest! {
        #[test]
        fn test_bfd_properties(
            demands in proptest::collection::vec(
                (1..20_000_i64, 1..1_000_000_i64, 1..200_i64, 1..200_i64, 1..200_i64),
                1..30,
            ),
            replication in 1..=3_u32,
            dynamic: bool,
        ) {
            let replicas = workload(&demands, replication);
            let planner = bfd(dynamic, InitialBinCount::LowerBound);
            let plan = planner.solve(&replicas, &mut rand::thread_rng()).unwrap();
            check_plan(&plan, &replicas);
            prop_assert!(plan.brokers().len() >= plan.lower_bound());
            prop_assert!(plan.brokers().len() <= plan.bin_count());
            let expected_failures: Vec<_> = (plan.lower_bound()..plan.bin_count()).collect();
            prop_assert_eq!(plan.failed_bin_counts(), &expected_failures[..]);
        }

        #[test]
        fn test_static_bfd_is_deterministic(
            demands in proptest::collection::vec(
                (1..20_000_i64, 1..1_000_000_i64, 1..200_i64, 1..200_i64, 1..200_i64),
                1..30,
            ),
        ) {
            let replicas = workload(&demands, 2);
            let planner = bfd(false, InitialBinCount::LowerBound);
            let assignment = |plan: Plan| -> Vec<Vec<String>> {
                plan.brokers()
                    .iter()
                    .map(|b| b.replicas().iter().map(Replica::to_string).collect())
                    .collect()
            };
            let lhs = planner.solve(&replicas, &mut ChaChaRng::seed_from_u64(1)).unwrap();
            let rhs = planner.solve(&replicas, &mut ChaChaRng::seed_from_u64(2)).unwrap();
            prop_assert_eq!(assignment(lhs), assignment(rhs));
        }
    }
}
