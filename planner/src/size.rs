//! Scalar sizes of brokers and replicas.
//!
//! Each dimension is weighed by the reciprocal of the remaining capacity of the whole cluster
//! in that dimension, so dimensions that are scarce across the cluster count for more.

use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::{Broker, Error, Replica, Result, DIMENSIONS};

/// Per-dimension normalization factors derived from a broker set.
#[derive(Debug, Clone)]
pub struct SizeNormalizer {
    factors: Array1<f64>,
}

impl SizeNormalizer {
    /// Computes factors from the current remaining capacity of `brokers`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BrokenInvariant`] if `brokers` is empty or any broker has a negative
    /// remaining capacity.
    pub fn new(brokers: &[Broker]) -> Result<Self> {
        if brokers.is_empty() {
            return Err(Error::BrokenInvariant(String::from(
                "cannot normalize sizes without brokers",
            )));
        }
        if let Some((broker, (dimension, value))) = brokers
            .iter()
            .find_map(|b| b.remaining().first_negative().map(|n| (b.id(), n)))
        {
            return Err(Error::BrokenInvariant(format!(
                "broker {} has negative remaining {}: {}",
                broker, dimension, value
            )));
        }
        let remaining = Array2::from_shape_fn((brokers.len(), DIMENSIONS), |(b, d)| {
            brokers[b].remaining().values()[d] as f64
        });
        let factors = remaining
            .sum_axis(Axis(0))
            .mapv(|total| if total == 0.0 { 0.0 } else { 1.0 / total });
        Ok(Self { factors })
    }

    /// Normalization factor of each dimension.
    #[must_use]
    pub fn factors(&self) -> ArrayView1<'_, f64> {
        self.factors.view()
    }

    /// Scalar size of the remaining capacity of `broker`.
    #[must_use]
    pub fn broker_size(&self, broker: &Broker) -> f64 {
        broker.remaining().to_array().dot(&self.factors)
    }

    /// Scalar size of the requirement of `replica`.
    #[must_use]
    pub fn replica_size(&self, replica: &Replica, block_size_kb: u32) -> f64 {
        replica
            .requirement(block_size_kb)
            .to_array()
            .dot(&self.factors)
    }

    /// Sets the size of every broker.
    pub fn update_brokers(&self, brokers: &mut [Broker]) {
        for broker in brokers {
            let size = self.broker_size(broker);
            broker.set_size(size);
        }
    }

    /// Sets the size of every replica.
    pub fn update_replicas(&self, replicas: &mut [Replica], block_size_kb: u32) {
        for replica in replicas {
            let size = self.replica_size(replica, block_size_kb);
            replica.set_size(size);
        }
    }
}
