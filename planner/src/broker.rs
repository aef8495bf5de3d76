use std::collections::HashSet;

use derive_more::{Display, From, Into};
use ordered_float::OrderedFloat;
use rand::Rng;
use rand_chacha::ChaChaRng;
use serde::{Deserialize, Serialize};

use crate::volume::{StorageVolume, VolumeCapacity};
use crate::{
    Dimension, Error, HardwareProfile, Replica, ResourceVector, Result, TopicPartition, DIMENSIONS,
};

/// Broker ID.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    From,
    Into,
    Display,
    Serialize,
    Deserialize,
)]
pub struct BrokerId(usize);

/// How a broker picks a volume for an incoming replica.
#[derive(Debug, Clone)]
enum VolumeSelection {
    /// Feasibility checked, volumes tried from the fullest, grown on demand.
    Careful,
    /// Only the duplicate-partition check; a uniformly random volume.
    Naive(ChaChaRng),
}

/// A server of a fixed hardware profile: the first-level bin.
///
/// RAM and network headroom is a running subtraction. Storage size and IOPS headroom is the
/// remaining capacity of the single volume with the most room, because a replica cannot span
/// volumes. While the broker may still create a volume, the headroom is that of a fresh
/// volume instead.
#[derive(Debug, Clone)]
pub struct Broker {
    id: BrokerId,
    profile: HardwareProfile,
    selection: VolumeSelection,
    capacity: ResourceVector,
    remaining: ResourceVector,
    assigned: ResourceVector,
    volumes: Vec<StorageVolume>,
    max_volumes: usize,
    fresh_volume: VolumeCapacity,
    partitions: HashSet<TopicPartition>,
    replicas: Vec<Replica>,
    size: f64,
}

impl Broker {
    /// Constructs an empty broker that checks feasibility on every insertion.
    ///
    /// # Errors
    ///
    /// Fails if the volume class cannot be modeled on the profile's instance type.
    pub fn new(id: BrokerId, profile: HardwareProfile) -> Result<Self> {
        Self::with_selection(id, profile, VolumeSelection::Careful)
    }

    /// Constructs a broker that accepts anything except a second replica of a partition
    /// and spreads replicas over its volumes at random.
    ///
    /// # Errors
    ///
    /// Fails if the volume class cannot be modeled on the profile's instance type.
    pub fn naive(id: BrokerId, profile: HardwareProfile, rng: ChaChaRng) -> Result<Self> {
        Self::with_selection(id, profile, VolumeSelection::Naive(rng))
    }

    fn with_selection(
        id: BrokerId,
        profile: HardwareProfile,
        selection: VolumeSelection,
    ) -> Result<Self> {
        let class = profile.volume_class();
        let instance = profile.instance();
        let fresh_volume = StorageVolume::empty_capacity(&profile)?;
        let max_volumes = if class.is_local_disk() {
            if instance.local_disk_count() == 0 {
                return Err(Error::UnsupportedHardwareClass {
                    volume_class: class.to_string(),
                    reason: "instance has no local disks",
                });
            }
            instance.local_disk_count()
        } else {
            instance.volume_slots()
        };
        let volumes = if class.is_local_disk() {
            (0..max_volumes)
                .map(|_| StorageVolume::new(&profile))
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };
        let capacity = ResourceVector::new([
            instance.ram_mb(),
            max_volumes as i64 * class.size_mb(),
            instance.storage_iops_ceiling(profile.block_size()),
            instance.network_bw_mb(),
            instance.network_bw_mb(),
        ]);
        let mut broker = Self {
            id,
            profile,
            selection,
            capacity,
            remaining: capacity,
            assigned: ResourceVector::zero(),
            volumes,
            max_volumes,
            fresh_volume,
            partitions: HashSet::new(),
            replicas: Vec::new(),
            size: 0.0,
        };
        broker.refresh_storage_headroom();
        Ok(broker)
    }

    /// `true` iff the broker holds no replica of the same partition and every dimension of
    /// the replica's requirement is at most the remaining capacity.
    #[must_use]
    pub fn is_feasible(&self, replica: &Replica) -> bool {
        !self.partitions.contains(&replica.topic_partition())
            && replica
                .requirement(self.profile.block_size())
                .fits_within(&self.remaining)
    }

    /// Places `replica` on this broker and one of its volumes.
    ///
    /// Returns `Ok(false)`, leaving the broker unchanged, if the replica does not fit.
    ///
    /// # Errors
    ///
    /// Fails if the performance model cannot be evaluated for the volume class.
    pub fn add(&mut self, replica: &Replica) -> Result<bool> {
        let volume = match &mut self.selection {
            VolumeSelection::Careful => return self.add_checked(replica),
            VolumeSelection::Naive(rng) => {
                if self.partitions.contains(&replica.topic_partition()) {
                    return Ok(false);
                }
                if self.volumes.is_empty() {
                    for _ in 0..self.max_volumes {
                        self.volumes.push(StorageVolume::new(&self.profile)?);
                    }
                }
                rng.gen_range(0, self.volumes.len())
            }
        };
        let index = self.replicas.len();
        self.volumes[volume].record_replica(replica, replica.is_leader(), index);
        self.record(replica);
        Ok(true)
    }

    fn add_checked(&mut self, replica: &Replica) -> Result<bool> {
        if !self.is_feasible(replica) {
            return Ok(false);
        }
        let volume = match self.select_storage_volume(replica)? {
            Some(volume) => volume,
            None => return Ok(false),
        };
        let index = self.replicas.len();
        let placed =
            self.volumes[volume].add_replica(replica, replica.is_leader(), index, &self.profile)?;
        if !placed {
            return Err(Error::BrokenInvariant(format!(
                "volume {} of broker {} rejected {} after selection",
                volume, self.id, replica
            )));
        }
        self.record(replica);
        log::trace!("Placed {} on broker {} volume {}", replica, self.id, volume);
        Ok(true)
    }

    /// Picks the feasible volume with the smallest scalar size, or creates one.
    ///
    /// A created volume is only pushed when the replica fits into it, and the broker will
    /// place the replica there immediately, so no empty volume is ever materialized.
    fn select_storage_volume(&mut self, replica: &Replica) -> Result<Option<usize>> {
        let mut order: Vec<usize> = (0..self.volumes.len()).collect();
        order.sort_by_key(|&v| OrderedFloat(self.volumes[v].size()));
        if let Some(volume) = order.into_iter().find(|&v| self.volumes[v].is_feasible(replica)) {
            return Ok(Some(volume));
        }
        if self.volumes.len() >= self.volume_limit()
            || !StorageVolume::fits(replica, self.profile.block_size(), &self.fresh_volume)
        {
            return Ok(None);
        }
        self.allocate_more_storage_if_necessary();
        self.volumes.push(StorageVolume::new(&self.profile)?);
        Ok(Some(self.volumes.len() - 1))
    }

    fn record(&mut self, replica: &Replica) {
        let requirement = replica.requirement(self.profile.block_size());
        self.assigned += requirement;
        for &dimension in &Dimension::SUBTRACTIVE {
            self.remaining[dimension] -= requirement[dimension];
        }
        self.partitions.insert(replica.topic_partition());
        self.replicas.push(replica.clone());
        self.refresh_storage_headroom();
    }

    fn refresh_storage_headroom(&mut self) {
        let [size, iops] = self.max_remaining_volume_capacity();
        self.remaining[Dimension::StorageSize] = size;
        self.remaining[Dimension::StorageIops] = iops;
    }

    /// `true` if the volume class is throughput provisioned, the broker is at its volume limit,
    /// and the volumes together deliver less than the instance's storage bandwidth.
    #[must_use]
    pub fn should_allocate_more_storage(&self) -> bool {
        let bandwidth_kb = i64::from(self.profile.instance().storage_bw_mb()) * 1024;
        self.profile.volume_class().is_throughput_provisioned()
            && self.volumes.len() >= self.max_volumes
            && self
                .volumes
                .iter()
                .map(StorageVolume::effective_throughput)
                .sum::<i64>()
                < bandwidth_kb
    }

    /// Raises the volume limit by one if [`Broker::should_allocate_more_storage`] holds.
    /// Returns whether the limit was raised.
    pub fn allocate_more_storage_if_necessary(&mut self) -> bool {
        if !self.should_allocate_more_storage() {
            return false;
        }
        self.max_volumes += 1;
        self.capacity[Dimension::StorageSize] += self.profile.volume_class().size_mb();
        log::debug!(
            "Broker {} may now use {} volumes",
            self.id,
            self.max_volumes
        );
        true
    }

    /// Number of volumes the broker may use now, counting a pending expansion.
    fn volume_limit(&self) -> usize {
        self.max_volumes + usize::from(self.should_allocate_more_storage())
    }

    /// Remaining `[size, IOPS]` of the volume with the most room. While another volume may
    /// be created, this is the capacity of a fresh volume, which is never materialized.
    #[must_use]
    pub fn max_remaining_volume_capacity(&self) -> VolumeCapacity {
        if self.volumes.len() < self.volume_limit() {
            return self.fresh_volume;
        }
        self.volumes
            .iter()
            .max_by_key(|v| OrderedFloat(v.size()))
            .map_or(self.fresh_volume, StorageVolume::remaining)
    }

    /// Fraction of each dimension in use.
    #[must_use]
    pub fn utilization(&self) -> [f64; DIMENSIONS] {
        let mut utilization = [0.0; DIMENSIONS];
        for (dimension, capacity) in self.capacity.iter() {
            let used = match dimension {
                Dimension::StorageSize | Dimension::StorageIops => self.assigned[dimension],
                _ => capacity - self.remaining[dimension],
            };
            if capacity > 0 {
                utilization[dimension.index()] = used as f64 / capacity as f64;
            }
        }
        utilization
    }

    /// Instance price plus the price of every volume, in dollars per hour.
    #[must_use]
    pub fn hourly_cost(&self) -> f64 {
        self.profile.instance().hourly_cost()
            + self
                .volumes
                .iter()
                .map(StorageVolume::hourly_cost)
                .sum::<f64>()
    }

    /// Replicas placed on the volume at position `volume`.
    pub fn volume_replicas(&self, volume: usize) -> impl Iterator<Item = &Replica> + '_ {
        self.volumes
            .get(volume)
            .map(StorageVolume::replica_indices)
            .unwrap_or_default()
            .iter()
            .map(move |&r| &self.replicas[r])
    }

    /// Broker ID.
    #[must_use]
    pub fn id(&self) -> BrokerId {
        self.id
    }

    /// Hardware the broker runs on.
    #[must_use]
    pub fn profile(&self) -> &HardwareProfile {
        &self.profile
    }

    /// Capacity in each dimension.
    #[must_use]
    pub fn capacity(&self) -> &ResourceVector {
        &self.capacity
    }

    /// Remaining capacity in each dimension.
    #[must_use]
    pub fn remaining(&self) -> &ResourceVector {
        &self.remaining
    }

    /// Sum of the requirements of all placed replicas.
    #[must_use]
    pub fn assigned(&self) -> &ResourceVector {
        &self.assigned
    }

    /// Placed replicas in insertion order.
    #[must_use]
    pub fn replicas(&self) -> &[Replica] {
        &self.replicas
    }

    /// Materialized volumes.
    #[must_use]
    pub fn volumes(&self) -> &[StorageVolume] {
        &self.volumes
    }

    /// Current limit on the number of volumes.
    #[must_use]
    pub fn max_volumes(&self) -> usize {
        self.max_volumes
    }

    /// `true` if no replica has been placed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    /// Scalar size assigned by the last normalization.
    #[must_use]
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Sets the scalar size.
    pub fn set_size(&mut self, size: f64) {
        self.size = size;
    }
}
