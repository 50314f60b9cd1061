#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Submergence risk tiers.
//!
//! Maps the predicted submergence ratio of a road or route to a risk
//! [`RiskLevel`], a traversal weight multiplier, and a closure decision.
//! All three are derived from [`RiskLevel::from_ratio`] so they always
//! agree on where the tier boundaries fall.
//!
//! | Submergence   | Multiplier | Risk level |
//! |---------------|------------|------------|
//! | `<= 0.2`      | x1         | low        |
//! | `(0.2, 0.4]`  | x2         | moderate   |
//! | `(0.4, 0.7]`  | x5         | high       |
//! | `> 0.7`       | closed     | severe     |

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Upper bound (inclusive) of the low tier.
pub const TIER_LOW: f64 = 0.2;
/// Upper bound (inclusive) of the moderate tier.
pub const TIER_MODERATE: f64 = 0.4;
/// Upper bound (inclusive) of the high tier. Anything above closes the road.
pub const TIER_HIGH: f64 = 0.7;

/// Weight multiplier for the low tier.
pub const MULTIPLIER_LOW: f64 = 1.0;
/// Weight multiplier for the moderate tier.
pub const MULTIPLIER_MODERATE: f64 = 2.0;
/// Weight multiplier for the high tier.
pub const MULTIPLIER_HIGH: f64 = 5.0;
/// Weight of a closed road.
pub const MULTIPLIER_CLOSED: f64 = f64::INFINITY;

/// Flood risk classification of a submergence ratio.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RiskLevel {
    /// Passable at normal cost.
    Low,
    /// Passable, twice the normal cost.
    Moderate,
    /// Passable, five times the normal cost.
    High,
    /// Impassable.
    Severe,
}

impl RiskLevel {
    /// Classifies a submergence ratio. A ratio exactly on a boundary
    /// belongs to the lower tier.
    #[must_use]
    pub fn from_ratio(submergence_ratio: f64) -> Self {
        if submergence_ratio > TIER_HIGH {
            Self::Severe
        } else if submergence_ratio > TIER_MODERATE {
            Self::High
        } else if submergence_ratio > TIER_LOW {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    /// Weight multiplier for this tier (`f64::INFINITY` for [`Self::Severe`]).
    #[must_use]
    pub const fn multiplier(self) -> f64 {
        match self {
            Self::Low => MULTIPLIER_LOW,
            Self::Moderate => MULTIPLIER_MODERATE,
            Self::High => MULTIPLIER_HIGH,
            Self::Severe => MULTIPLIER_CLOSED,
        }
    }

    /// Whether roads in this tier are closed.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Severe)
    }

    /// Returns all variants, lowest risk first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Low, Self::Moderate, Self::High, Self::Severe]
    }
}

/// Flood-adjusted traversal weight for a road segment.
///
/// Returns `f64::INFINITY` when the road is closed.
#[must_use]
pub fn weight(base_weight: f64, submergence_ratio: f64) -> f64 {
    let level = RiskLevel::from_ratio(submergence_ratio);
    if level.is_closed() {
        MULTIPLIER_CLOSED
    } else {
        base_weight * level.multiplier()
    }
}

/// Risk label for a submergence ratio.
#[must_use]
pub fn label(submergence_ratio: f64) -> RiskLevel {
    RiskLevel::from_ratio(submergence_ratio)
}

/// Whether a submergence ratio makes a road impassable (`ratio > 0.7`).
#[must_use]
pub fn is_closed(submergence_ratio: f64) -> bool {
    RiskLevel::from_ratio(submergence_ratio).is_closed()
}
