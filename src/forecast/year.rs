use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use utoipa::ToSchema;

/// A coerced year label
///
/// Labels are usually whole calendar years, but any finite number is kept
/// ("2023.5" stays 2023.5). Whole years serialize as JSON integers.
#[derive(Debug, Clone, Copy, ToSchema)]
pub struct Year(f64);

impl Year {
    /// Smallest representable year, used for open-ended ranges
    pub const MIN: Year = Year(f64::MIN);
    /// Largest representable year, used for open-ended ranges
    pub const MAX: Year = Year(f64::MAX);

    /// `None` for NaN and infinities
    pub fn new(value: f64) -> Option<Self> {
        // -0.0 + 0.0 == +0.0, so equal years always share a bit pattern
        value.is_finite().then_some(Year(value + 0.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_whole(self) -> bool {
        self.0.fract() == 0.0
    }
}

impl From<i32> for Year {
    fn from(year: i32) -> Self {
        Year(f64::from(year))
    }
}

impl PartialEq for Year {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Year {}

impl PartialEq<i32> for Year {
    fn eq(&self, other: &i32) -> bool {
        self.0 == f64::from(*other)
    }
}

impl PartialOrd for Year {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Year {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Year {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Year {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_whole() && self.0.abs() < i64::MAX as f64 {
            serializer.serialize_i64(self.0 as i64)
        } else {
            serializer.serialize_f64(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Year {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Year::new(value).ok_or_else(|| serde::de::Error::custom("year must be a finite number"))
    }
}
