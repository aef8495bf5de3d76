use std::fmt;
use std::ops::{Add, AddAssign, Index, IndexMut, Sub, SubAssign};

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Number of resource dimensions.
pub const DIMENSIONS: usize = 5;

/// Resource dimension of a broker or a replica.
///
/// The ordinal of each variant is its index in every [`ResourceVector`], and it must not change:
/// unit conversions and comparisons address dimensions by position.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Memory in MB.
    Ram = 0,
    /// Storage size in MB.
    StorageSize = 1,
    /// Storage throughput. Replicas state it in MB/s, brokers and volumes count it in IOPS.
    StorageIops = 2,
    /// Inbound network in MB/s.
    NetworkIn = 3,
    /// Outbound network in MB/s.
    NetworkOut = 4,
}

impl Dimension {
    /// All dimensions in ordinal order.
    pub const ALL: [Dimension; DIMENSIONS] = [
        Dimension::Ram,
        Dimension::StorageSize,
        Dimension::StorageIops,
        Dimension::NetworkIn,
        Dimension::NetworkOut,
    ];

    /// Dimensions whose remaining capacity is a plain running subtraction at the broker level.
    pub const SUBTRACTIVE: [Dimension; 3] =
        [Dimension::Ram, Dimension::NetworkIn, Dimension::NetworkOut];

    /// Position of this dimension within a resource vector.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::Ram => "ram",
            Dimension::StorageSize => "storage-size",
            Dimension::StorageIops => "storage-iops",
            Dimension::NetworkIn => "network-in",
            Dimension::NetworkOut => "network-out",
        };
        f.write_str(name)
    }
}

/// Fixed-length vector with one integer value per [`Dimension`].
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceVector([i64; DIMENSIONS]);

impl ResourceVector {
    /// Vector with all values equal to zero.
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Constructs a vector from values listed in dimension order.
    #[must_use]
    pub fn new(values: [i64; DIMENSIONS]) -> Self {
        Self(values)
    }

    /// Iterates over `(dimension, value)` pairs in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = (Dimension, i64)> + '_ {
        Dimension::ALL.iter().map(move |&d| (d, self[d]))
    }

    /// Returns the values in dimension order.
    #[must_use]
    pub fn values(&self) -> [i64; DIMENSIONS] {
        self.0
    }

    /// Returns the first dimension with a negative value, if any.
    #[must_use]
    pub fn first_negative(&self) -> Option<(Dimension, i64)> {
        self.iter().find(|(_, v)| *v < 0)
    }

    /// `true` iff every value of `self` is at most the corresponding value of `other`.
    #[must_use]
    pub fn fits_within(&self, other: &Self) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(lhs, rhs)| lhs <= rhs)
    }

    /// Converts to a floating point array for normalization.
    #[must_use]
    pub fn to_array(&self) -> Array1<f64> {
        self.0.iter().map(|&v| v as f64).collect()
    }
}

impl From<[i64; DIMENSIONS]> for ResourceVector {
    fn from(values: [i64; DIMENSIONS]) -> Self {
        Self(values)
    }
}

impl Index<Dimension> for ResourceVector {
    type Output = i64;
    fn index(&self, dimension: Dimension) -> &i64 {
        &self.0[dimension.index()]
    }
}

impl IndexMut<Dimension> for ResourceVector {
    fn index_mut(&mut self, dimension: Dimension) -> &mut i64 {
        &mut self.0[dimension.index()]
    }
}

impl Add for ResourceVector {
    type Output = Self;
    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for ResourceVector {
    fn add_assign(&mut self, rhs: Self) {
        for (lhs, rhs) in self.0.iter_mut().zip(rhs.0.iter()) {
            *lhs += rhs;
        }
    }
}

impl Sub for ResourceVector {
    type Output = Self;
    fn sub(mut self, rhs: Self) -> Self {
        self -= rhs;
        self
    }
}

impl SubAssign for ResourceVector {
    fn sub_assign(&mut self, rhs: Self) {
        for (lhs, rhs) in self.0.iter_mut().zip(rhs.0.iter()) {
            *lhs -= rhs;
        }
    }
}

impl std::iter::Sum for ResourceVector {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, v| acc + v)
    }
}
