//! Production batches: one pyrolysis run at a kiln.
//!
//! ```text
//! open ──► Open ──► complete ──► Completed (terminal)
//!           │
//!           └── append evidence (images and videos tracked separately)
//! ```
//!
//! Opening a batch draws its biomass from the kiln's pool for the batch's
//! crop type at that moment, not at completion. Completion records the
//! biochar produced and credits the kiln's inventory exactly once; a
//! completed batch is immutable.

#![allow(clippy::cast_sign_loss)]


use std::fmt;

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;
use crate::evidence::{self, EvidenceSubject, MediaKind};
use crate::quantity::{Mass, Quantity};

/// Status of a production batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Consuming its pooled biomass.
    Open,
    /// Biochar recorded and credited (terminal).
    Completed,
}

impl BatchStatus {
    /// Returns the status as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A pyrolysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionBatch {
    /// Batch id (UUID v4).
    pub id: String,
    /// The kiln running the batch.
    pub kiln_id: String,
    /// Crop type of the biomass consumed.
    pub crop_type_id: String,
    /// Biomass drawn from the pool at open.
    pub biomass: Mass,
    /// Biochar produced; set on completion.
    pub biochar: Option<Mass>,
    /// When the batch was opened.
    pub started_at_ns: u64,
    /// When the batch was completed.
    pub ended_at_ns: Option<u64>,
}

impl ProductionBatch {
    /// Returns the batch status.
    #[must_use]
    pub const fn status(&self) -> BatchStatus {
        if self.ended_at_ns.is_some() {
            BatchStatus::Completed
        } else {
            BatchStatus::Open
        }
    }

    /// Returns `true` once the batch has been completed.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self.status(), BatchStatus::Completed)
    }
}

/// Request to open a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenBatch {
    /// Crop type whose pool supplies the biomass.
    pub crop_type_id: String,
    /// Biomass to draw from the pool.
    pub biomass: Quantity,
    /// Media ids of photos.
    #[serde(default)]
    pub images: Vec<String>,
    /// Media ids of videos.
    #[serde(default)]
    pub videos: Vec<String>,
}

/// Replacement evidence for a batch. `None` leaves that media kind as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEvidence {
    /// New photo set.
    #[serde(default)]
    pub images: Option<Vec<String>>,
    /// New video set.
    #[serde(default)]
    pub videos: Option<Vec<String>>,
}

/// Request to complete a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteBatch {
    /// Biochar produced by the run.
    pub biochar: Quantity,
    /// Final evidence.
    #[serde(default)]
    pub evidence: BatchEvidence,
}

pub(crate) fn insert(conn: &Connection, batch: &ProductionBatch) -> Result<(), LifecycleError> {
    conn.execute(
        "INSERT INTO production_batches (id, kiln_id, crop_type_id, biomass_grams, started_at_ns)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            batch.id,
            batch.kiln_id,
            batch.crop_type_id,
            batch.biomass.grams(),
            batch.started_at_ns
        ],
    )?;
    Ok(())
}

const SELECT_BATCH: &str = "SELECT id, kiln_id, crop_type_id, biomass_grams, biochar_grams, started_at_ns, ended_at_ns
     FROM production_batches";

fn map_batch(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProductionBatch> {
    Ok(ProductionBatch {
        id: row.get(0)?,
        kiln_id: row.get(1)?,
        crop_type_id: row.get(2)?,
        biomass: Mass::from_grams(row.get(3)?),
        biochar: row.get::<_, Option<i64>>(4)?.map(Mass::from_grams),
        started_at_ns: row.get::<_, i64>(5)? as u64,
        ended_at_ns: row.get::<_, Option<i64>>(6)?.map(|ns| ns as u64),
    })
}

/// Loads a batch by id.
pub(crate) fn load(conn: &Connection, batch_id: &str) -> Result<ProductionBatch, LifecycleError> {
    conn.query_row(&format!("{SELECT_BATCH} WHERE id = ?1"), [batch_id], map_batch)
        .optional()?
        .ok_or_else(|| LifecycleError::batch_not_found(batch_id))
}

/// Loads a batch and checks it belongs to `kiln_id`.
pub(crate) fn load_owned(
    conn: &Connection,
    kiln_id: &str,
    batch_id: &str,
) -> Result<ProductionBatch, LifecycleError> {
    let batch = load(conn, batch_id)?;
    if batch.kiln_id != kiln_id {
        return Err(LifecycleError::BatchKilnMismatch {
            batch_id: batch_id.to_string(),
            kiln_id: kiln_id.to_string(),
        });
    }
    Ok(batch)
}

/// Returns a kiln's batches, newest first.
pub(crate) fn for_kiln(
    conn: &Connection,
    kiln_id: &str,
) -> Result<Vec<ProductionBatch>, LifecycleError> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_BATCH} WHERE kiln_id = ?1 ORDER BY started_at_ns DESC, rowid DESC"
    ))?;
    let batches = stmt
        .query_map([kiln_id], map_batch)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(batches)
}

/// Records the batch's output and end time.
///
/// Only an open batch is updated; a completed one yields
/// [`LifecycleError::BatchAlreadyCompleted`].
pub(crate) fn mark_completed(
    conn: &Connection,
    batch_id: &str,
    biochar: Mass,
    now_ns: u64,
) -> Result<(), LifecycleError> {
    let updated = conn.execute(
        "UPDATE production_batches SET biochar_grams = ?2, ended_at_ns = ?3
         WHERE id = ?1 AND ended_at_ns IS NULL",
        params![batch_id, biochar.grams(), now_ns],
    )?;
    if updated == 0 {
        return Err(LifecycleError::BatchAlreadyCompleted {
            batch_id: batch_id.to_string(),
        });
    }
    Ok(())
}

/// Replaces the image and video sets that are given.
pub(crate) fn replace_evidence(
    conn: &Connection,
    batch_id: &str,
    images: Option<&[String]>,
    videos: Option<&[String]>,
    now_ns: u64,
) -> Result<(), LifecycleError> {
    let subject = EvidenceSubject::batch(batch_id);
    if let Some(images) = images {
        evidence::replace(conn, &subject, MediaKind::Image, images, now_ns)?;
    }
    if let Some(videos) = videos {
        evidence::replace(conn, &subject, MediaKind::Video, videos, now_ns)?;
    }
    Ok(())
}
