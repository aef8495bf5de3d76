//! Serializable summaries of a plan.

use std::time::Duration;

use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::{
    Broker, BrokerId, CapacityPlanner, Dimension, InstanceType, Plan, ReplicaId, ResourceVector,
    StorageVolume, Strategy, VolumeCapacity, VolumeClass, DIMENSIONS,
};

/// Summary statistics of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stat {
    /// Arithmetic mean.
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// Median.
    pub median: f64,
}

impl Stat {
    /// Computes statistics of `values`. All fields are zero for an empty sample.
    #[must_use]
    pub fn new(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                mean: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
                median: 0.0,
            };
        }
        let mut sorted = values.to_vec();
        sorted.sort_by_key(|&v| OrderedFloat(v));
        let len = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / len;
        let std_dev = (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / len).sqrt();
        Self {
            mean,
            std_dev,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            median: (sorted[sorted.len() / 2] + sorted[(sorted.len() - 1) / 2]) / 2.0,
        }
    }
}

/// A storage volume and its members.
#[derive(Debug, Clone, Serialize)]
pub struct VolumeReport {
    /// Replicas stored on the volume.
    pub replicas: Vec<ReplicaId>,
    /// Number of leader replicas.
    pub leaders: u32,
    /// `[size MB, IOPS]` capacity.
    pub capacity: VolumeCapacity,
    /// `[size MB, IOPS]` left.
    pub remaining: VolumeCapacity,
    /// Dollars per hour.
    pub hourly_cost: f64,
}

/// A broker, its load and its volumes.
#[derive(Debug, Clone, Serialize)]
pub struct BrokerReport {
    /// Broker ID.
    pub id: BrokerId,
    /// Number of replicas.
    pub replica_count: usize,
    /// Capacity per dimension.
    pub capacity: ResourceVector,
    /// Remaining capacity per dimension.
    pub remaining: ResourceVector,
    /// Fraction of each dimension in use.
    pub utilization: [f64; DIMENSIONS],
    /// Instance and volumes, in dollars per hour.
    pub hourly_cost: f64,
    /// Materialized volumes.
    pub volumes: Vec<VolumeReport>,
}

impl BrokerReport {
    /// Summarizes `broker`.
    #[must_use]
    pub fn new(broker: &Broker) -> Self {
        let volumes = broker
            .volumes()
            .iter()
            .enumerate()
            .map(|(position, volume)| volume_report(broker, position, volume))
            .collect();
        Self {
            id: broker.id(),
            replica_count: broker.replicas().len(),
            capacity: *broker.capacity(),
            remaining: *broker.remaining(),
            utilization: broker.utilization(),
            hourly_cost: broker.hourly_cost(),
            volumes,
        }
    }
}

fn volume_report(broker: &Broker, position: usize, volume: &StorageVolume) -> VolumeReport {
    VolumeReport {
        replicas: broker
            .volume_replicas(position)
            .map(|r| r.replica_id())
            .collect(),
        leaders: volume.num_leaders(),
        capacity: volume.capacity(),
        remaining: volume.remaining(),
        hourly_cost: volume.hourly_cost(),
    }
}

/// Outcome of a planning run.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    /// Broker hardware.
    pub instance_type: InstanceType,
    /// Volume class.
    pub volume_class: VolumeClass,
    /// Strategy and its configuration.
    pub strategy: Strategy,
    /// Number of returned brokers.
    pub broker_count: usize,
    /// Number of brokers of the successful attempt.
    pub bin_count: usize,
    /// Lower bound on the broker count.
    pub lower_bound: usize,
    /// Broker count relative to the lower bound.
    pub competitive_ratio: f64,
    /// Bin counts attempted before the successful one.
    pub failed_bin_counts: Vec<usize>,
    /// Sum over brokers, in dollars per hour.
    pub hourly_cost: f64,
    /// Outbound network utilization across brokers.
    pub network_out_utilization: Stat,
    /// Wall-clock time of the planning run, in seconds. Zero unless recorded.
    pub elapsed_secs: f64,
    /// Per-broker details; omitted from summaries.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub brokers: Vec<BrokerReport>,
}

impl PlanReport {
    /// Full report with per-broker details.
    #[must_use]
    pub fn new(plan: &Plan, planner: &CapacityPlanner) -> Self {
        let mut report = Self::summary(plan, planner);
        report.brokers = plan.brokers().iter().map(BrokerReport::new).collect();
        report
    }

    /// Report without per-broker details.
    #[must_use]
    pub fn summary(plan: &Plan, planner: &CapacityPlanner) -> Self {
        let network_out: Vec<f64> = plan
            .brokers()
            .iter()
            .map(|b| b.utilization()[Dimension::NetworkOut.index()])
            .collect();
        Self {
            instance_type: planner.profile().instance(),
            volume_class: planner.profile().volume_class(),
            strategy: planner.strategy(),
            broker_count: plan.brokers().len(),
            bin_count: plan.bin_count(),
            lower_bound: plan.lower_bound(),
            competitive_ratio: plan.competitive_ratio(),
            failed_bin_counts: plan.failed_bin_counts().to_vec(),
            hourly_cost: plan.brokers().iter().map(Broker::hourly_cost).sum(),
            network_out_utilization: Stat::new(&network_out),
            elapsed_secs: 0.0,
            brokers: Vec::new(),
        }
    }

    /// Records how long planning took.
    #[must_use]
    pub fn elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_secs = elapsed.as_secs_f64();
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{FixedIops, HardwareProfile, InitialBinCount, Replica};
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    #[test]
    fn test_stat() {
        let stat = Stat::new(&[4.0, 1.0, 3.0, 2.0]);
        assert_abs_diff_eq!(stat.mean, 2.5);
        assert_abs_diff_eq!(stat.min, 1.0);
        assert_abs_diff_eq!(stat.max, 4.0);
        assert_abs_diff_eq!(stat.median, 2.5);
        assert_abs_diff_eq!(stat.std_dev, 1.25_f64.sqrt());
        assert_abs_diff_eq!(Stat::new(&[]).mean, 0.0);
        assert_abs_diff_eq!(Stat::new(&[7.0]).median, 7.0);
    }

    #[test]
    fn test_plan_report() -> eyre::Result<()> {
        let profile =
            HardwareProfile::new(InstanceType::M4_4X, VolumeClass::St1).model(FixedIops(1e9));
        let planner = CapacityPlanner::new(
            profile,
            Strategy::BestFitDecreasing {
                dynamic: true,
                initial: InitialBinCount::LowerBound,
            },
        );
        let replicas: Vec<_> = (0..6)
            .map(|p| Replica::new("t", p, 0, ResourceVector::new([1, 1, 1, 1, 79]), 0))
            .collect();
        let plan = planner.solve(&replicas, &mut ChaChaRng::seed_from_u64(0))?;
        let report = PlanReport::new(&plan, &planner);
        assert_eq!(report.broker_count, 2);
        assert_eq!(report.brokers.len(), 2);
        assert_eq!(report.brokers[0].volumes[0].replicas.len(), 3);
        assert_abs_diff_eq!(report.network_out_utilization.mean, 1.0);
        assert_abs_diff_eq!(report.network_out_utilization.std_dev, 0.0);
        let json = serde_json::to_value(&PlanReport::summary(&plan, &planner))?;
        assert_eq!(json["instance_type"], "m4.4xlarge");
        assert_eq!(json["volume_class"], "st1");
        assert!(json.get("brokers").is_none());
        assert_abs_diff_eq!(report.elapsed_secs, 0.0);
        let timed = PlanReport::summary(&plan, &planner).elapsed(Duration::from_millis(1500));
        assert_abs_diff_eq!(timed.elapsed_secs, 1.5);
        Ok(())
    }
}
