//! Crop lifecycle stages and the stage-event ledger.
//!
//! Every farm crop moves through a fixed sequence of stages, one step at a
//! time and never backwards:
//!
//! ```text
//! Cropping ──► Harvesting ──► SunDrying ──► Transportation
//!                                                 │
//!                                                 ▼ move_to_production
//!                                      TransportFarmToKiln
//!                                                 │
//!                                                 ▼ verify_handoff
//!                                            Production
//!                                                 │
//!                                                 ▼ distribute
//!                          TransportKilnToFarm ──► Distribution
//! ```
//!
//! The first three transitions are taken by the farmer through
//! [`LifecycleCoordinator::advance`](crate::coordinator::LifecycleCoordinator::advance),
//! gated by the admission rules in [`admission`]. The rest are side effects
//! of coordinated operations that carry their own gates.
//!
//! Each transition appends an immutable [`StageEvent`]. The crop row caches
//! the latest stage; the event history is the authoritative order.

// SQLite returns i64 for row ids and timestamps, but they're always non-negative.
#![allow(clippy::cast_sign_loss)]

pub mod admission;
pub mod details;

#[cfg(test)]
mod tests;

use std::fmt;
use std::str::FromStr;

pub use admission::{Admission, AdmissionFacts, Prerequisite};
pub use details::{FertilizerApplication, StageDetails};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::error::{LifecycleError, UnknownVariant};

/// A stage in the biomass lifecycle, in lifecycle order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Sowing and tending the crop.
    #[default]
    Cropping,
    /// Harvesting; yield is measured.
    Harvesting,
    /// Drying the residue in the field.
    SunDrying,
    /// Preparing transport to a kiln.
    Transportation,
    /// In transit to the assigned kiln, awaiting verification.
    TransportFarmToKiln,
    /// Verified at the kiln and credited to its biomass pool.
    Production,
    /// Biochar on its way back to the farm.
    TransportKilnToFarm,
    /// Biochar delivered (terminal).
    Distribution,
}

impl Stage {
    /// Every stage, in lifecycle order.
    pub const ALL: [Self; 8] = [
        Self::Cropping,
        Self::Harvesting,
        Self::SunDrying,
        Self::Transportation,
        Self::TransportFarmToKiln,
        Self::Production,
        Self::TransportKilnToFarm,
        Self::Distribution,
    ];

    /// Returns the stage as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cropping => "cropping",
            Self::Harvesting => "harvesting",
            Self::SunDrying => "sun_drying",
            Self::Transportation => "transportation",
            Self::TransportFarmToKiln => "transport_farm_to_kiln",
            Self::Production => "production",
            Self::TransportKilnToFarm => "transport_kiln_to_farm",
            Self::Distribution => "distribution",
        }
    }

    /// Returns the stage that follows this one, if any.
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        match self {
            Self::Cropping => Some(Self::Harvesting),
            Self::Harvesting => Some(Self::SunDrying),
            Self::SunDrying => Some(Self::Transportation),
            Self::Transportation => Some(Self::TransportFarmToKiln),
            Self::TransportFarmToKiln => Some(Self::Production),
            Self::Production => Some(Self::TransportKilnToFarm),
            Self::TransportKilnToFarm => Some(Self::Distribution),
            Self::Distribution => None,
        }
    }

    /// Returns `true` if this is the terminal stage.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Distribution)
    }

    /// Returns `true` if transitioning to `target` is valid from this stage.
    ///
    /// Only the immediate successor is reachable.
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        self.next() == Some(target)
    }

    /// Name of the coordinated operation that enters this stage, or `None`
    /// if the farmer advances into it directly.
    #[must_use]
    pub const fn entered_by(&self) -> Option<&'static str> {
        match self {
            Self::Cropping | Self::Harvesting | Self::SunDrying | Self::Transportation => None,
            Self::TransportFarmToKiln => Some("move_to_production"),
            Self::Production => Some("verify_handoff"),
            Self::TransportKilnToFarm | Self::Distribution => Some("distribute"),
        }
    }

    /// Returns `true` if a crop may be registered directly into this stage.
    #[must_use]
    pub const fn is_initial(&self) -> bool {
        matches!(self, Self::Cropping | Self::Harvesting | Self::SunDrying)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Stage {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("stage", s))
    }
}

/// An immutable record of a crop entering a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEvent {
    /// Position in the global commit order.
    pub seq_id: u64,
    /// The crop that moved.
    pub crop_id: String,
    /// The stage entered.
    pub stage: Stage,
    /// When the stage was entered, in nanoseconds since the Unix epoch.
    pub started_at_ns: u64,
}

/// Moves a crop from `from` to `to` and appends the stage event.
///
/// The update is conditional on the stored stage still being `from`, so a
/// caller acting on a stale read cannot skip or repeat a stage.
pub(crate) fn advance(
    conn: &Connection,
    crop_id: &str,
    from: Stage,
    to: Stage,
    now_ns: u64,
) -> Result<StageEvent, LifecycleError> {
    if !from.can_transition_to(to) {
        return Err(LifecycleError::StageOrderViolation {
            crop_id: crop_id.to_string(),
            from,
            to,
        });
    }

    let updated = conn.execute(
        "UPDATE farm_crops SET stage = ?3, updated_at_ns = ?4 WHERE id = ?1 AND stage = ?2",
        params![crop_id, from, to, now_ns],
    )?;
    if updated == 0 {
        let actual: Option<Stage> = conn
            .query_row(
                "SELECT stage FROM farm_crops WHERE id = ?1",
                [crop_id],
                |row| row.get(0),
            )
            .optional()?;
        return Err(match actual {
            Some(actual) => LifecycleError::StageMismatch {
                crop_id: crop_id.to_string(),
                expected: from,
                actual,
            },
            None => LifecycleError::crop_not_found(crop_id),
        });
    }

    append_event(conn, crop_id, to, now_ns)
}

/// Appends a stage event without touching the cached stage.
pub(crate) fn append_event(
    conn: &Connection,
    crop_id: &str,
    stage: Stage,
    now_ns: u64,
) -> Result<StageEvent, LifecycleError> {
    conn.execute(
        "INSERT INTO stage_events (farm_crop_id, stage, started_at_ns) VALUES (?1, ?2, ?3)",
        params![crop_id, stage, now_ns],
    )?;
    Ok(StageEvent {
        seq_id: conn.last_insert_rowid() as u64,
        crop_id: crop_id.to_string(),
        stage,
        started_at_ns: now_ns,
    })
}

/// Returns a crop's stage events in commit order.
pub(crate) fn history(conn: &Connection, crop_id: &str) -> Result<Vec<StageEvent>, LifecycleError> {
    let mut stmt = conn.prepare(
        "SELECT seq_id, farm_crop_id, stage, started_at_ns
         FROM stage_events
         WHERE farm_crop_id = ?1
         ORDER BY seq_id ASC",
    )?;
    let events = stmt
        .query_map([crop_id], |row| {
            Ok(StageEvent {
                seq_id: row.get::<_, i64>(0)? as u64,
                crop_id: row.get(1)?,
                stage: row.get(2)?,
                started_at_ns: row.get::<_, i64>(3)? as u64,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(events)
}
