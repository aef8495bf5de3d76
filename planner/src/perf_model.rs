//! Storage performance models.
//!
//! The planner only needs an estimate of how many I/O operations per second a volume sustains
//! under a given mix of leader and follower logs. Trained regression models can be plugged in
//! by implementing [`PerformanceModel`]; this module ships two deterministic implementations.

use std::fmt;

/// Physical medium a model is asked about.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Media {
    /// Throughput-optimized network attached HDD volume.
    ThroughputHdd,
    /// Instance-local HDD.
    LocalHdd,
}

/// Composition of the logs stored on a volume.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IoMix {
    /// Percentage (0-100) of leader I/O that is writes.
    pub write_pct: u32,
    /// Number of leader logs.
    pub leaders: u32,
    /// Number of follower logs.
    pub followers: u32,
}

impl IoMix {
    /// The reference mix used to estimate an empty volume: half writes, one leader, no followers.
    pub const BASELINE: IoMix = IoMix {
        write_pct: 50,
        leaders: 1,
        followers: 0,
    };
}

/// Predicts effective IOPS of a storage volume.
///
/// Implementations must be deterministic for identical inputs. The returned value is an
/// uncapped estimate; instance bandwidth ceilings are applied by the caller.
pub trait PerformanceModel: fmt::Debug + Send + Sync {
    /// Effective IOPS for operations of `block_size_kb` on an instance with `storage_bw_mb`
    /// of storage bandwidth, under the given log mix.
    fn effective_iops(&self, media: Media, block_size_kb: u32, storage_bw_mb: u32, mix: IoMix)
        -> f64;

    /// IOPS of a volume without load.
    fn baseline_iops(&self, media: Media, block_size_kb: u32, storage_bw_mb: u32) -> f64 {
        self.effective_iops(media, block_size_kb, storage_bw_mb, IoMix::BASELINE)
    }
}

/// Closed-form approximation of HDD behavior under concurrent sequential streams.
///
/// Throughput starts at the nominal sequential rate of the medium and degrades
/// with the number of interleaved logs (each adds seeks) and with mixing reads into writes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceCurve {
    /// Per-log slowdown factor.
    pub interleave_penalty: f64,
    /// Maximum slowdown caused by an even read/write mix.
    pub mix_penalty: f64,
}

impl Default for ReferenceCurve {
    fn default() -> Self {
        Self {
            interleave_penalty: 0.01,
            mix_penalty: 0.15,
        }
    }
}

impl ReferenceCurve {
    fn nominal_mb(media: Media) -> f64 {
        match media {
            Media::ThroughputHdd => 500.0,
            Media::LocalHdd => 200.0,
        }
    }
}

impl PerformanceModel for ReferenceCurve {
    fn effective_iops(&self, media: Media, block_size_kb: u32, _: u32, mix: IoMix) -> f64 {
        let nominal = Self::nominal_mb(media) * 1024.0 / f64::from(block_size_kb.max(1));
        let read = 1.0 - f64::from(mix.write_pct.min(100)) / 100.0;
        // 4r(1-r) peaks at an even mix.
        let mix_factor = 1.0 - self.mix_penalty * 4.0 * read * (1.0 - read);
        let logs = (mix.leaders + mix.followers).saturating_sub(1);
        nominal * mix_factor / (1.0 + self.interleave_penalty * f64::from(logs))
    }
}

/// Returns the same IOPS regardless of the input. Useful as a test stub.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedIops(pub f64);

impl PerformanceModel for FixedIops {
    fn effective_iops(&self, _: Media, _: u32, _: u32, _: IoMix) -> f64 {
        self.0
    }
}
