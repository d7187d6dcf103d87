//! Preference-weighted re-ranking.
//!
//! The caller's tech ratio (0–100, share of technical content wanted) picks
//! a [`PreferenceBand`]; the band and the entity's [`EntityType`] pick a
//! fixed match factor that scales raw similarity.
//!
//! | Band | technical | mixed | business |
//! |------|-----------|-------|----------|
//! | `ratio >= 70` | 1.0 | 0.7 | 0.3 |
//! | `ratio <= 30` | 0.3 | 0.7 | 1.0 |
//! | otherwise     | 0.8 | 1.0 | 0.8 |

use crate::models::EntityType;

pub const HEAVY_TECHNICAL_MIN: u8 = 70;
pub const HEAVY_BUSINESS_MAX: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceBand {
    HeavyTechnical,
    HeavyBusiness,
    Balanced,
}

impl PreferenceBand {
    pub fn from_ratio(tech_ratio: u8) -> Self {
        if tech_ratio >= HEAVY_TECHNICAL_MIN {
            PreferenceBand::HeavyTechnical
        } else if tech_ratio <= HEAVY_BUSINESS_MAX {
            PreferenceBand::HeavyBusiness
        } else {
            PreferenceBand::Balanced
        }
    }
}

/// Multiplier in `(0, 1]` for an entity of `entity_type` under `tech_ratio`.
pub fn match_factor(entity_type: EntityType, tech_ratio: u8) -> f64 {
    match (PreferenceBand::from_ratio(tech_ratio), entity_type) {
        (PreferenceBand::HeavyTechnical, EntityType::Technical) => 1.0,
        (PreferenceBand::HeavyTechnical, EntityType::Mixed) => 0.7,
        (PreferenceBand::HeavyTechnical, EntityType::Business) => 0.3,
        (PreferenceBand::HeavyBusiness, EntityType::Business) => 1.0,
        (PreferenceBand::HeavyBusiness, EntityType::Mixed) => 0.7,
        (PreferenceBand::HeavyBusiness, EntityType::Technical) => 0.3,
        (PreferenceBand::Balanced, EntityType::Mixed) => 1.0,
        (PreferenceBand::Balanced, _) => 0.8,
    }
}
