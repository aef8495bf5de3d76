//! Static hardware tables: broker instance types and storage volume classes.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::perf_model::{IoMix, Media, PerformanceModel, ReferenceCurve};
use crate::{Error, ResourceVector, Result, BLOCK_SIZE_KB};

const MB_PER_GB: i64 = 1024;
const MB_PER_TB: i64 = 1024 * 1024;
const HOURS_PER_MONTH: f64 = 24.0 * 30.0;

/// Converts a bandwidth in MB/s into I/O operations per second of `block_size_kb`, rounding up.
#[must_use]
pub fn bandwidth_to_iops(bandwidth_mb: i64, block_size_kb: u32) -> i64 {
    let block = i64::from(block_size_kb.max(1));
    let kb = bandwidth_mb * 1024;
    kb / block + i64::from(kb % block > 0)
}

/// Machine class a broker runs on.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
    strum::EnumIter,
)]
#[allow(missing_docs, non_camel_case_types)]
pub enum InstanceType {
    #[strum(to_string = "m4.2xlarge", serialize = "M4_2X")]
    #[serde(rename = "m4.2xlarge")]
    M4_2X,
    #[strum(to_string = "m4.4xlarge", serialize = "M4_4X")]
    #[serde(rename = "m4.4xlarge")]
    M4_4X,
    #[strum(to_string = "m4.10xlarge", serialize = "M4_10X")]
    #[serde(rename = "m4.10xlarge")]
    M4_10X,
    #[strum(to_string = "m4.16xlarge", serialize = "M4_16X")]
    #[serde(rename = "m4.16xlarge")]
    M4_16X,
    #[strum(to_string = "d2.2xlarge", serialize = "D2_2X")]
    #[serde(rename = "d2.2xlarge")]
    D2_2X,
    #[strum(to_string = "d2.4xlarge", serialize = "D2_4X")]
    #[serde(rename = "d2.4xlarge")]
    D2_4X,
    #[strum(to_string = "d2.8xlarge", serialize = "D2_8X")]
    #[serde(rename = "d2.8xlarge")]
    D2_8X,
}

struct InstanceSpec {
    vcpus: u32,
    ram_mb: i64,
    network_mb: i64,
    storage_bw_mb: u32,
    hourly_cost: f64,
    local_disks: usize,
    volume_slots: usize,
}

const fn instance(
    vcpus: u32,
    ram_gb: i64,
    network_mb: i64,
    storage_bw_mb: u32,
    hourly_cost: f64,
    local_disks: usize,
    volume_slots: usize,
) -> InstanceSpec {
    InstanceSpec {
        vcpus,
        ram_mb: ram_gb * MB_PER_GB,
        network_mb,
        storage_bw_mb,
        hourly_cost,
        local_disks,
        volume_slots,
    }
}

const INSTANCES: [InstanceSpec; 7] = [
    instance(8, 32, 118, 125, 0.296, 0, 1),
    instance(16, 64, 237, 250, 0.592, 0, 1),
    instance(40, 160, 1250, 500, 1.480, 0, 2),
    instance(64, 256, 2500, 1250, 2.369, 0, 5),
    instance(8, 61, 118, 550, 0.804, 6, 6),
    instance(16, 122, 237, 550, 1.608, 12, 12),
    instance(36, 244, 1250, 550, 3.216, 24, 24),
];

impl InstanceType {
    fn spec(self) -> &'static InstanceSpec {
        &INSTANCES[self as usize]
    }

    /// Number of virtual CPUs.
    #[must_use]
    pub fn vcpus(self) -> u32 {
        self.spec().vcpus
    }

    /// Memory in MB.
    #[must_use]
    pub fn ram_mb(self) -> i64 {
        self.spec().ram_mb
    }

    /// Network bandwidth in MB/s, available separately inbound and outbound.
    #[must_use]
    pub fn network_bw_mb(self) -> i64 {
        self.spec().network_mb
    }

    /// Storage bandwidth in MB/s.
    #[must_use]
    pub fn storage_bw_mb(self) -> u32 {
        self.spec().storage_bw_mb
    }

    /// On-demand price in dollars per hour.
    #[must_use]
    pub fn hourly_cost(self) -> f64 {
        self.spec().hourly_cost
    }

    /// Number of instance-local disks.
    #[must_use]
    pub fn local_disk_count(self) -> usize {
        self.spec().local_disks
    }

    /// Number of storage volumes a broker starts with as its limit.
    #[must_use]
    pub fn volume_slots(self) -> usize {
        self.spec().volume_slots
    }

    /// Upper bound on IOPS imposed by the instance's storage bandwidth.
    #[must_use]
    pub fn storage_iops_ceiling(self, block_size_kb: u32) -> i64 {
        i64::from(self.storage_bw_mb()) * 1024 / i64::from(block_size_kb.max(1))
    }

    /// Broker capacity along each dimension, assuming the default number of volume slots of
    /// the given class.
    #[must_use]
    pub fn capacity(self, volume_class: VolumeClass, block_size_kb: u32) -> ResourceVector {
        ResourceVector::new([
            self.ram_mb(),
            self.volume_slots() as i64 * volume_class.size_mb(),
            self.storage_iops_ceiling(block_size_kb),
            self.network_bw_mb(),
            self.network_bw_mb(),
        ])
    }
}

/// Class of storage volumes attached to a broker.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
    strum::EnumIter,
)]
pub enum VolumeClass {
    /// Provisioned IOPS SSD.
    #[strum(to_string = "io1", serialize = "IO1")]
    #[serde(rename = "io1")]
    Io1,
    /// General purpose SSD.
    #[strum(to_string = "gp2", serialize = "GP2")]
    #[serde(rename = "gp2")]
    Gp2,
    /// Throughput optimized HDD.
    #[strum(to_string = "st1", serialize = "ST1")]
    #[serde(rename = "st1")]
    St1,
    /// Instance-local HDD.
    #[strum(to_string = "d2hdd", serialize = "D2HDD")]
    #[serde(rename = "d2hdd")]
    D2Hdd,
    /// Throughput optimized HDD with a fixed IOPS figure.
    #[strum(to_string = "st1.static", serialize = "ST1STATIC")]
    #[serde(rename = "st1.static")]
    St1Static,
    /// Instance-local HDD that always performs at its baseline.
    #[strum(to_string = "d2hdd.static", serialize = "D2HDDSTATIC")]
    #[serde(rename = "d2hdd.static")]
    D2HddStatic,
}

const ST1_STATIC_IOPS: i64 = 2000;

impl VolumeClass {
    /// Size of a single volume in MB.
    #[must_use]
    pub fn size_mb(self) -> i64 {
        match self {
            VolumeClass::D2Hdd | VolumeClass::D2HddStatic => 2 * MB_PER_TB,
            _ => 16 * MB_PER_TB,
        }
    }

    /// `true` for instance-local disks, which are all present from the start.
    #[must_use]
    pub fn is_local_disk(self) -> bool {
        matches!(self, VolumeClass::D2Hdd | VolumeClass::D2HddStatic)
    }

    /// `true` for network attached classes whose volume count may grow with load.
    #[must_use]
    pub fn is_throughput_provisioned(self) -> bool {
        !self.is_local_disk()
    }

    fn unsupported(self, reason: &'static str) -> Error {
        Error::UnsupportedHardwareClass {
            volume_class: self.to_string(),
            reason,
        }
    }

    fn media(self) -> Result<Media> {
        match self {
            VolumeClass::St1 | VolumeClass::St1Static => Ok(Media::ThroughputHdd),
            VolumeClass::D2Hdd | VolumeClass::D2HddStatic => Ok(Media::LocalHdd),
            VolumeClass::Io1 | VolumeClass::Gp2 => Err(self.unsupported("no IOPS model")),
        }
    }

    /// IOPS of an empty volume of this class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedHardwareClass`] for classes without an IOPS model.
    pub fn baseline_iops(
        self,
        model: &dyn PerformanceModel,
        block_size_kb: u32,
        storage_bw_mb: u32,
    ) -> Result<i64> {
        let ceiling = f64::from(storage_bw_mb) * 1024.0 / f64::from(block_size_kb.max(1));
        match self {
            VolumeClass::St1Static => Ok(ST1_STATIC_IOPS),
            _ => {
                let predicted = model.baseline_iops(self.media()?, block_size_kb, storage_bw_mb);
                Ok(predicted.min(ceiling).max(0.0) as i64)
            }
        }
    }

    /// IOPS a volume of this class sustains under the given log mix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedHardwareClass`] for classes without an IOPS model.
    pub fn effective_iops(
        self,
        model: &dyn PerformanceModel,
        block_size_kb: u32,
        storage_bw_mb: u32,
        mix: IoMix,
    ) -> Result<i64> {
        match self {
            VolumeClass::St1 | VolumeClass::D2Hdd => {
                let ceiling = f64::from(storage_bw_mb) * 1024.0 / f64::from(block_size_kb.max(1));
                let predicted =
                    model.effective_iops(self.media()?, block_size_kb, storage_bw_mb, mix);
                Ok(predicted.min(ceiling).max(0.0) as i64)
            }
            VolumeClass::St1Static | VolumeClass::D2HddStatic => {
                self.baseline_iops(model, block_size_kb, storage_bw_mb)
            }
            VolumeClass::Io1 | VolumeClass::Gp2 => Err(self.unsupported("no IOPS model")),
        }
    }

    /// Hourly cost in dollars of a volume holding `size_gb` with `provisioned_iops`.
    #[must_use]
    pub fn hourly_cost(self, size_gb: i64, provisioned_iops: i64, block_size_kb: u32) -> f64 {
        let throughput_mb = (i64::from(block_size_kb) * provisioned_iops) as f64 / 1024.0;
        let billed_gb = match self {
            VolumeClass::St1 | VolumeClass::St1Static => {
                (size_gb as f64).max(st1_minimum_size_gb(throughput_mb))
            }
            _ => size_gb as f64,
        };
        let monthly = match self {
            VolumeClass::Io1 => 0.125 * billed_gb + 0.065 * provisioned_iops as f64,
            VolumeClass::Gp2 => 0.1 * billed_gb,
            VolumeClass::St1 | VolumeClass::St1Static => 0.045 * billed_gb,
            VolumeClass::D2Hdd | VolumeClass::D2HddStatic => 0.0,
        };
        monthly / HOURS_PER_MONTH
    }
}

/// ST1 throughput scales with size, so sustained throughput implies a billable size.
fn st1_minimum_size_gb(throughput_mb: f64) -> f64 {
    if throughput_mb < 20.0 {
        500.0
    } else if throughput_mb >= 480.0 {
        12_500.0
    } else {
        // 1 TB for each started 40 MB/s step.
        1000.0 * ((throughput_mb / 40.0).floor() + 1.0)
    }
}

/// Everything needed to build identical brokers.
#[derive(Clone)]
pub struct HardwareProfile {
    instance: InstanceType,
    volume_class: VolumeClass,
    block_size_kb: u32,
    model: Arc<dyn PerformanceModel>,
}

impl fmt::Debug for HardwareProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HardwareProfile")
            .field("instance", &self.instance)
            .field("volume_class", &self.volume_class)
            .field("block_size_kb", &self.block_size_kb)
            .field("model", &self.model)
            .finish()
    }
}

impl HardwareProfile {
    /// Profile with the default block size and the [`ReferenceCurve`] performance model.
    #[must_use]
    pub fn new(instance: InstanceType, volume_class: VolumeClass) -> Self {
        Self {
            instance,
            volume_class,
            block_size_kb: BLOCK_SIZE_KB,
            model: Arc::new(ReferenceCurve::default()),
        }
    }

    /// Replaces the performance model.
    #[must_use]
    pub fn model<M: PerformanceModel + 'static>(mut self, model: M) -> Self {
        self.model = Arc::new(model);
        self
    }

    /// Replaces the performance model with a shared one.
    #[must_use]
    pub fn shared_model(mut self, model: Arc<dyn PerformanceModel>) -> Self {
        self.model = model;
        self
    }

    /// Replaces the I/O block size.
    #[must_use]
    pub fn block_size_kb(mut self, block_size_kb: u32) -> Self {
        self.block_size_kb = block_size_kb;
        self
    }

    /// Broker instance type.
    #[must_use]
    pub fn instance(&self) -> InstanceType {
        self.instance
    }

    /// Storage volume class.
    #[must_use]
    pub fn volume_class(&self) -> VolumeClass {
        self.volume_class
    }

    /// I/O block size in KB.
    #[must_use]
    pub fn block_size(&self) -> u32 {
        self.block_size_kb
    }

    /// Storage performance model.
    #[must_use]
    pub fn performance_model(&self) -> &dyn PerformanceModel {
        self.model.as_ref()
    }

    /// Nominal broker capacity. See [`InstanceType::capacity`].
    #[must_use]
    pub fn capacity(&self) -> ResourceVector {
        self.instance.capacity(self.volume_class, self.block_size_kb)
    }
}
