//! Capacity planning for message-broker clusters.
//!
//! Replicas of topic partitions are packed onto brokers of a single hardware profile, and onto
//! the storage volumes owned by each broker, subject to five resource dimensions. The primary
//! strategy is best-fit-decreasing with an increasing bin-count search; two randomized
//! strategies serve as baselines.

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
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]
#![deny(unsafe_code)]

mod broker;
pub mod hardware;
pub mod perf_model;
mod planner;
mod replica;
pub mod report;
mod resources;
mod size;
mod volume;
mod workload;

pub use broker::{Broker, BrokerId};
pub use hardware::{bandwidth_to_iops, HardwareProfile, InstanceType, VolumeClass};
pub use perf_model::{FixedIops, IoMix, Media, PerformanceModel, ReferenceCurve};
pub use planner::{
    competitive_ratio, create_brokers, CapacityPlanner, InitialBinCount, Plan, Strategy,
};
pub use replica::{Replica, ReplicaId, TopicPartition};
pub use resources::{Dimension, ResourceVector, DIMENSIONS};
pub use size::SizeNormalizer;
pub use volume::{StorageVolume, VolumeCapacity};
pub use workload::Topic;

/// Size of a single storage I/O operation used to convert bandwidth into IOPS.
pub const BLOCK_SIZE_KB: u32 = 128;

/// Error type encompassing all planning errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No broker of a fixed-size attempt could accept a replica.
    #[error("Could not place replica {replica} on {bin_count} brokers.")]
    PackingInfeasible {
        /// Number of brokers in the failed attempt.
        bin_count: usize,
        /// The replica that could not be placed.
        replica: ReplicaId,
    },
    /// Internal state that must never occur, such as negative remaining capacity.
    #[error("Broken invariant: {0}")]
    BrokenInvariant(String),
    /// The selected strategy does not implement the requested operation.
    #[error("Unsupported operation: {0}")]
    UnsupportedStrategy(&'static str),
    /// The hardware combination cannot be modeled.
    #[error("Unsupported hardware class {volume_class}: {reason}")]
    UnsupportedHardwareClass {
        /// Volume class identifier.
        volume_class: String,
        /// What is missing.
        reason: &'static str,
    },
    /// The bin-count search reached its cap without a feasible packing.
    #[error("No feasible packing with at most {limit} brokers.")]
    BinCountExhausted {
        /// The largest bin count attempted.
        limit: usize,
    },
    /// Inconsistent topic description.
    #[error("Topic {topic}: {reason}")]
    InvalidTopic {
        /// Topic name.
        topic: String,
        /// What is inconsistent.
        reason: String,
    },
}

/// Result alias using [`Error`](enum.Error.html).
pub type Result<T> = std::result::Result<T, Error>;
