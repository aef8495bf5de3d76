use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize};

use crate::hardware::bandwidth_to_iops;
use crate::{Dimension, ResourceVector};

/// Topic and partition pair. No broker may hold two replicas with the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicPartition {
    /// Topic name.
    pub topic: String,
    /// Partition number.
    pub partition: u32,
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

/// Identity of a replica.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReplicaId {
    /// Topic name.
    pub topic: String,
    /// Partition number.
    pub partition: u32,
    /// Replica number within the partition; `0` is the leader.
    pub id: u32,
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}#{}", self.topic, self.partition, self.id)
    }
}

/// A copy of a topic partition: the unit of placement.
///
/// Demand is expressed in MB for RAM and storage size, and in MB/s for the storage bandwidth
/// and network dimensions. The storage bandwidth is converted to IOPS by [`Replica::requirement`]
/// whenever it is compared against broker or volume capacity.
///
/// Equality and hashing only consider the identity `(topic, partition, id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replica {
    topic: String,
    partition: u32,
    id: u32,
    demand: ResourceVector,
    #[serde(default, deserialize_with = "percentage")]
    read_pct: u32,
    #[serde(skip)]
    size: f64,
}

impl Replica {
    /// Constructs a new replica.
    pub fn new<S: Into<String>>(
        topic: S,
        partition: u32,
        id: u32,
        demand: ResourceVector,
        read_pct: u32,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            id,
            demand,
            read_pct: read_pct.min(100),
            size: 0.0,
        }
    }

    /// Topic name.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Partition number.
    #[must_use]
    pub fn partition(&self) -> u32 {
        self.partition
    }

    /// Replica number within the partition.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Leaders are replicas with ID 0.
    #[must_use]
    pub fn is_leader(&self) -> bool {
        self.id == 0
    }

    /// Duplicate-partition key.
    #[must_use]
    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition {
            topic: self.topic.clone(),
            partition: self.partition,
        }
    }

    /// Full identity.
    #[must_use]
    pub fn replica_id(&self) -> ReplicaId {
        ReplicaId {
            topic: self.topic.clone(),
            partition: self.partition,
            id: self.id,
        }
    }

    /// Raw demand as stated by the workload.
    #[must_use]
    pub fn demand(&self) -> &ResourceVector {
        &self.demand
    }

    /// Demand in capacity units: storage bandwidth is converted to IOPS of `block_size_kb`.
    #[must_use]
    pub fn requirement(&self, block_size_kb: u32) -> ResourceVector {
        let mut requirement = self.demand;
        requirement[Dimension::StorageIops] = self.storage_iops(block_size_kb);
        requirement
    }

    /// Storage bandwidth demand in IOPS of `block_size_kb`.
    #[must_use]
    pub fn storage_iops(&self, block_size_kb: u32) -> i64 {
        bandwidth_to_iops(self.demand[Dimension::StorageIops], block_size_kb)
    }

    /// Percentage (0-100) of this replica's storage I/O that is reads.
    #[must_use]
    pub fn read_pct(&self) -> u32 {
        self.read_pct
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

fn percentage<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = u32::deserialize(deserializer)?;
    if value > 100 {
        return Err(serde::de::Error::custom(format!(
            "percentage must be at most 100, got {}",
            value
        )));
    }
    Ok(value)
}

impl PartialEq for Replica {
    fn eq(&self, other: &Self) -> bool {
        (&self.topic, self.partition, self.id) == (&other.topic, other.partition, other.id)
    }
}

impl Eq for Replica {}

impl Hash for Replica {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.topic.hash(state);
        self.partition.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Display for Replica {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}#{}", self.topic, self.partition, self.id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_requirement_converts_bandwidth() {
        let replica = Replica::new("t", 3, 1, ResourceVector::new([256, 1000, 30, 10, 40]), 0);
        assert_eq!(
            replica.requirement(128),
            ResourceVector::new([256, 1000, 240, 10, 40])
        );
        assert_eq!(replica.demand()[Dimension::StorageIops], 30);
        assert!(!replica.is_leader());
        assert_eq!(replica.to_string(), "t-3#1");
        assert_eq!(replica.topic_partition().to_string(), "t-3");
    }

    #[test]
    fn test_identity_ignores_size_and_demand() {
        let mut lhs = Replica::new("t", 0, 0, ResourceVector::new([1, 1, 1, 1, 1]), 50);
        let rhs = Replica::new("t", 0, 0, ResourceVector::new([2, 2, 2, 2, 2]), 0);
        lhs.set_size(3.5);
        assert_eq!(lhs, rhs);
        assert_ne!(lhs, Replica::new("t", 0, 1, *rhs.demand(), 0));
    }

    #[test]
    fn test_deserialize() -> serde_json::Result<()> {
        let replica: Replica = serde_json::from_str(
            r#"{"topic":"t1","partition":2,"id":0,"demand":[144,28800,28,4,44],"read_pct":86}"#,
        )?;
        assert_eq!(replica.replica_id().to_string(), "t1-2#0");
        assert_eq!(replica.read_pct(), 86);
        assert!(replica.is_leader());
        Ok(())
    }

    #[test]
    fn test_deserialize_rejects_read_share_above_100() -> serde_json::Result<()> {
        let parse = |read_pct: u32| {
            serde_json::from_str::<Replica>(&format!(
                r#"{{"topic":"t","partition":0,"id":0,"demand":[1,1,1,1,1],"read_pct":{}}}"#,
                read_pct
            ))
        };
        assert!(parse(150).is_err());
        assert_eq!(parse(100)?.read_pct(), 100);
        let replica: Replica = serde_json::from_str(
            r#"{"topic":"t","partition":0,"id":0,"demand":[1,1,1,1,1]}"#,
        )?;
        assert_eq!(replica.read_pct(), 0);
        Ok(())
    }
}
