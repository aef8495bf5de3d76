//! Replica demand derived from topic parameters.

use serde::{Deserialize, Serialize};

use crate::{Error, Replica, ResourceVector, Result};

const BYTES_PER_MB: f64 = 1_000_000.0;
const SECONDS_PER_HOUR: i64 = 3600;
const FLUSH_DELAY_SECS: i64 = 30;

/// A topic description from which per-replica demand is derived.
///
/// Rates are in messages per second. Every partition gets one leader (replica 0) and
/// `replication_factor - 1` followers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    name: String,
    produce_rate: i64,
    avg_message_bytes: i64,
    partitions: u32,
    #[serde(default = "default_replication_factor")]
    replication_factor: u32,
    #[serde(default)]
    consumers: u32,
    #[serde(default)]
    replays: u32,
    #[serde(default)]
    replay_rates: Vec<i64>,
    #[serde(default)]
    max_consumer_lag_secs: i64,
    #[serde(default = "default_retention_hours")]
    retention_hours: i64,
    #[serde(default)]
    read_capacity_for_followers: bool,
}

fn default_replication_factor() -> u32 {
    1
}

fn default_retention_hours() -> i64 {
    1
}

impl Topic {
    /// Topic without consumers or replays, one replica per partition and one hour of retention.
    pub fn new<S: Into<String>>(
        name: S,
        produce_rate: i64,
        avg_message_bytes: i64,
        partitions: u32,
    ) -> Self {
        Self {
            name: name.into(),
            produce_rate,
            avg_message_bytes,
            partitions,
            replication_factor: default_replication_factor(),
            consumers: 0,
            replays: 0,
            replay_rates: Vec::new(),
            max_consumer_lag_secs: 0,
            retention_hours: default_retention_hours(),
            read_capacity_for_followers: false,
        }
    }

    /// Sets the number of replicas per partition.
    #[must_use]
    pub fn replication_factor(mut self, replication_factor: u32) -> Self {
        self.replication_factor = replication_factor;
        self
    }

    /// Sets the number of tailing consumers.
    #[must_use]
    pub fn consumers(mut self, consumers: u32) -> Self {
        self.consumers = consumers;
        self
    }

    /// Sets the number of replaying consumers and their rates.
    #[must_use]
    pub fn replays(mut self, replays: u32, replay_rates: Vec<i64>) -> Self {
        self.replays = replays;
        self.replay_rates = replay_rates;
        self
    }

    /// Sets the maximum lag of tailing consumers, served from memory.
    #[must_use]
    pub fn max_consumer_lag_secs(mut self, max_consumer_lag_secs: i64) -> Self {
        self.max_consumer_lag_secs = max_consumer_lag_secs;
        self
    }

    /// Sets the retention period.
    #[must_use]
    pub fn retention_hours(mut self, retention_hours: i64) -> Self {
        self.retention_hours = retention_hours;
        self
    }

    /// Makes followers carry the read load of the leader.
    #[must_use]
    pub fn read_capacity_for_followers(mut self, read_capacity_for_followers: bool) -> Self {
        self.read_capacity_for_followers = read_capacity_for_followers;
        self
    }

    /// Topic name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn invalid(&self, reason: String) -> Error {
        Error::InvalidTopic {
            topic: self.name.clone(),
            reason,
        }
    }

    /// Derives the replicas of every partition, leaders first within each partition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTopic`] if the topic has no partitions, a zero replication
    /// factor, or a replay count that does not match the number of replay rates.
    pub fn replicas(&self) -> Result<Vec<Replica>> {
        if self.partitions == 0 {
            return Err(self.invalid(String::from("no partitions")));
        }
        if self.replication_factor == 0 {
            return Err(self.invalid(String::from("replication factor must be positive")));
        }
        if self.replays != 0 && self.replays as usize != self.replay_rates.len() {
            return Err(self.invalid(format!(
                "{} replays but {} replay rates",
                self.replays,
                self.replay_rates.len()
            )));
        }
        let partitions = i64::from(self.partitions);
        let produce_mb = megabytes(self.produce_rate * self.avg_message_bytes / partitions);
        let replay_mb = if self.replays == 0 {
            0
        } else {
            let replay_rate = self.replay_rates.iter().sum::<i64>() / partitions;
            megabytes(replay_rate * self.avg_message_bytes)
        };
        let storage = produce_mb * self.retention_hours * SECONDS_PER_HOUR;
        let memory = (self.max_consumer_lag_secs * produce_mb)
            .max(FLUSH_DELAY_SECS * produce_mb + replay_mb);
        let bandwidth = produce_mb + replay_mb;
        let read_pct = if bandwidth > 0 {
            ((100 * replay_mb + bandwidth - 1) / bandwidth) as u32
        } else {
            0
        };
        let network_out =
            (i64::from(self.consumers) + i64::from(self.replication_factor) - 1) * produce_mb
                + replay_mb;
        let leader = ResourceVector::new([memory, storage, bandwidth, produce_mb, network_out]);
        let (follower, follower_read_pct) = if self.read_capacity_for_followers {
            (leader, read_pct)
        } else {
            (
                ResourceVector::new([memory, storage, produce_mb, produce_mb, 0]),
                0,
            )
        };
        Ok((0..self.partitions)
            .flat_map(|partition| {
                (0..self.replication_factor).map(move |id| {
                    if id == 0 {
                        Replica::new(self.name.as_str(), partition, id, leader, read_pct)
                    } else {
                        Replica::new(
                            self.name.as_str(),
                            partition,
                            id,
                            follower,
                            follower_read_pct,
                        )
                    }
                })
            })
            .collect())
    }
}

/// Bytes per second to MB/s, rounded up.
fn megabytes(bytes: i64) -> i64 {
    (bytes as f64 / BYTES_PER_MB).ceil() as i64
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Dimension;

    fn t1() -> Topic {
        Topic::new("t1", 1_000_000, 234, 70)
            .replication_factor(2)
            .consumers(4)
            .replays(2, vec![3_000_000, 4_000_000])
            .max_consumer_lag_secs(20)
            .retention_hours(2)
    }

    #[test]
    fn test_leader_and_follower_demand() -> Result<()> {
        let replicas = t1().replicas()?;
        assert_eq!(replicas.len(), 140);
        let leader = &replicas[0];
        assert!(leader.is_leader());
        assert_eq!(leader.demand(), &ResourceVector::new([144, 28800, 28, 4, 44]));
        assert_eq!(leader.read_pct(), 86);
        let follower = &replicas[1];
        assert_eq!(follower.id(), 1);
        assert_eq!(follower.partition(), 0);
        assert_eq!(follower.demand(), &ResourceVector::new([144, 28800, 4, 4, 0]));
        assert_eq!(follower.read_pct(), 0);
        assert_eq!(replicas[139].to_string(), "t1-69#1");
        Ok(())
    }

    #[test]
    fn test_followers_with_read_capacity() -> Result<()> {
        let replicas = t1().read_capacity_for_followers(true).replicas()?;
        assert_eq!(replicas[1].demand(), replicas[0].demand());
        assert_eq!(replicas[1].read_pct(), 86);
        Ok(())
    }

    #[test]
    fn test_without_replays() -> Result<()> {
        let replicas = Topic::new("t", 2_000_000, 234, 80)
            .replication_factor(3)
            .consumers(2)
            .max_consumer_lag_secs(20)
            .replicas()?;
        assert_eq!(replicas.len(), 240);
        let leader = replicas[0].demand();
        // 5.85 MB/s per partition rounds up to 6.
        assert_eq!(leader[Dimension::NetworkIn], 6);
        assert_eq!(leader[Dimension::Ram], 180);
        assert_eq!(leader[Dimension::NetworkOut], 24);
        assert_eq!(replicas[0].read_pct(), 0);
        Ok(())
    }

    #[test]
    fn test_invalid_topics() {
        let mismatched = Topic::new("t", 1, 1, 1).replays(2, vec![1]);
        assert!(matches!(
            mismatched.replicas(),
            Err(Error::InvalidTopic { .. })
        ));
        assert!(Topic::new("t", 1, 1, 0).replicas().is_err());
        assert!(Topic::new("t", 1, 1, 1).replication_factor(0).replicas().is_err());
    }

    #[test]
    fn test_deserialize() -> serde_json::Result<()> {
        let topic: Topic = serde_json::from_str(
            r#"{"name":"t1","produce_rate":1000000,"avg_message_bytes":234,"partitions":70,
                "replication_factor":2,"consumers":4,"replays":2,
                "replay_rates":[3000000,4000000],"max_consumer_lag_secs":20,"retention_hours":2}"#,
        )?;
        assert_eq!(topic, t1());
        Ok(())
    }
}
