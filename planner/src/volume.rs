//! Storage volumes: the second-level bins owned by a broker.
//!
//! A volume tracks two dimensions, size in MB and IOPS. Its IOPS capacity is not fixed: every
//! accepted replica changes the leader/follower mix, and the capacity is recomputed from the
//! performance model. Replicas accepted before a recomputation are not re-validated, so a
//! shrinking capacity may leave less headroom than earlier placements assumed.

use crate::hardware::{HardwareProfile, InstanceType, VolumeClass};
use crate::perf_model::IoMix;
use crate::{Dimension, Replica, Result};

const SIZE: usize = 0;
const IOPS: usize = 1;

/// Remaining (or total) capacity of a volume as `[size MB, IOPS]`.
pub type VolumeCapacity = [i64; 2];

/// A single disk attached to a broker.
#[derive(Debug, Clone)]
pub struct StorageVolume {
    class: VolumeClass,
    instance: InstanceType,
    block_size_kb: u32,
    num_logs: u32,
    num_leaders: u32,
    leader_io: f64,
    leader_read_io: f64,
    capacity: VolumeCapacity,
    assigned: VolumeCapacity,
    remaining: VolumeCapacity,
    replicas: Vec<usize>,
}

/// Counters a successful insertion would produce.
struct Pending {
    num_logs: u32,
    num_leaders: u32,
    leader_io: f64,
    leader_read_io: f64,
    assigned: VolumeCapacity,
}

impl Pending {
    fn write_pct(&self) -> u32 {
        if self.num_leaders >= 1 && self.leader_read_io > 0.0 {
            ((self.leader_io - self.leader_read_io) / self.leader_io * 100.0) as u32
        } else if self.leader_read_io == 0.0 {
            100
        } else {
            0
        }
    }

    fn mix(&self) -> IoMix {
        IoMix {
            write_pct: self.write_pct(),
            leaders: self.num_leaders,
            followers: self.num_logs - self.num_leaders,
        }
    }
}

impl StorageVolume {
    /// Constructs an empty volume for a broker described by `profile`.
    ///
    /// # Errors
    ///
    /// Fails if the volume class has no IOPS model.
    pub fn new(profile: &HardwareProfile) -> Result<Self> {
        let capacity = Self::empty_capacity(profile)?;
        Ok(Self {
            class: profile.volume_class(),
            instance: profile.instance(),
            block_size_kb: profile.block_size(),
            num_logs: 0,
            num_leaders: 0,
            leader_io: 0.0,
            leader_read_io: 0.0,
            capacity,
            assigned: [0, 0],
            remaining: capacity,
            replicas: Vec::new(),
        })
    }

    /// Capacity of a fresh volume without materializing one.
    ///
    /// # Errors
    ///
    /// Fails if the volume class has no IOPS model.
    pub fn empty_capacity(profile: &HardwareProfile) -> Result<VolumeCapacity> {
        let class = profile.volume_class();
        Ok([
            class.size_mb(),
            class.baseline_iops(
                profile.performance_model(),
                profile.block_size(),
                profile.instance().storage_bw_mb(),
            )?,
        ])
    }

    /// `true` iff both the size and the IOPS demand are strictly below what remains.
    #[must_use]
    pub fn is_feasible(&self, replica: &Replica) -> bool {
        Self::fits(replica, self.block_size_kb, &self.remaining)
    }

    pub(crate) fn fits(replica: &Replica, block_size_kb: u32, remaining: &VolumeCapacity) -> bool {
        let requirement = replica.requirement(block_size_kb);
        requirement[Dimension::StorageSize] < remaining[SIZE]
            && requirement[Dimension::StorageIops] < remaining[IOPS]
    }

    fn pending(&self, replica: &Replica, leader: bool) -> Pending {
        let bandwidth = replica.demand()[Dimension::StorageIops] as f64;
        let (leader_io, leader_read_io) = if leader && replica.read_pct() > 0 {
            (
                bandwidth,
                bandwidth * f64::from(replica.read_pct()) / 100.0,
            )
        } else {
            (0.0, 0.0)
        };
        Pending {
            num_logs: self.num_logs + 1,
            num_leaders: self.num_leaders + u32::from(leader),
            leader_io: self.leader_io + leader_io,
            leader_read_io: self.leader_read_io + leader_read_io,
            assigned: [
                self.assigned[SIZE] + replica.demand()[Dimension::StorageSize],
                self.assigned[IOPS] + replica.storage_iops(self.block_size_kb),
            ],
        }
    }

    fn commit(&mut self, pending: Pending, index: usize) {
        self.num_logs = pending.num_logs;
        self.num_leaders = pending.num_leaders;
        self.leader_io = pending.leader_io;
        self.leader_read_io = pending.leader_read_io;
        self.assigned = pending.assigned;
        self.replicas.push(index);
    }

    /// Places `replica` on this volume if it is feasible.
    ///
    /// `index` is the position of the replica in the owning broker's replica list.
    /// Returns `Ok(false)` without any change if the replica does not fit. On success, the
    /// effective IOPS is recomputed and becomes the new IOPS capacity.
    ///
    /// # Errors
    ///
    /// Fails if the model cannot be evaluated for this class; the volume is left unchanged.
    pub fn add_replica(
        &mut self,
        replica: &Replica,
        leader: bool,
        index: usize,
        profile: &HardwareProfile,
    ) -> Result<bool> {
        if !self.is_feasible(replica) {
            return Ok(false);
        }
        let pending = self.pending(replica, leader);
        let effective_iops = self.class.effective_iops(
            profile.performance_model(),
            self.block_size_kb,
            self.instance.storage_bw_mb(),
            pending.mix(),
        )?;
        self.commit(pending, index);
        self.capacity[IOPS] = effective_iops;
        self.remaining = [
            self.capacity[SIZE] - self.assigned[SIZE],
            effective_iops - self.assigned[IOPS],
        ];
        Ok(true)
    }

    /// Places `replica` without checking feasibility or consulting the performance model.
    pub fn record_replica(&mut self, replica: &Replica, leader: bool, index: usize) {
        let pending = self.pending(replica, leader);
        self.commit(pending, index);
        self.remaining = [
            self.capacity[SIZE] - self.assigned[SIZE],
            self.capacity[IOPS] - self.assigned[IOPS],
        ];
    }

    /// Current effective throughput in KB/s.
    #[must_use]
    pub fn effective_throughput(&self) -> i64 {
        self.capacity[IOPS] * i64::from(self.block_size_kb)
    }

    /// Hourly cost of the volume given what has been placed on it.
    #[must_use]
    pub fn hourly_cost(&self) -> f64 {
        self.class.hourly_cost(
            self.assigned[SIZE] / 1024,
            self.assigned[IOPS],
            self.block_size_kb,
        )
    }

    /// Scalar size: the sum of remaining fractions of both dimensions.
    #[must_use]
    pub fn size(&self) -> f64 {
        scalar_size(&self.remaining, &self.capacity)
    }

    /// Remaining `[size, IOPS]`.
    #[must_use]
    pub fn remaining(&self) -> VolumeCapacity {
        self.remaining
    }

    /// Current `[size, IOPS]` capacity.
    #[must_use]
    pub fn capacity(&self) -> VolumeCapacity {
        self.capacity
    }

    /// Total `[size, IOPS]` placed on the volume.
    #[must_use]
    pub fn assigned(&self) -> VolumeCapacity {
        self.assigned
    }

    /// Number of logs (replicas) on the volume.
    #[must_use]
    pub fn num_logs(&self) -> u32 {
        self.num_logs
    }

    /// Number of leader logs on the volume.
    #[must_use]
    pub fn num_leaders(&self) -> u32 {
        self.num_leaders
    }

    /// Positions of the volume's replicas in the owning broker's replica list.
    #[must_use]
    pub fn replica_indices(&self) -> &[usize] {
        &self.replicas
    }
}

pub(crate) fn scalar_size(remaining: &VolumeCapacity, capacity: &VolumeCapacity) -> f64 {
    remaining
        .iter()
        .zip(capacity.iter())
        .map(|(&r, &c)| if c == 0 { 0.0 } else { r as f64 / c as f64 })
        .sum()
}
