//! Evidence sets with supersede semantics.
//!
//! Evidence is an opaque media id (a photo or video already stored
//! elsewhere) attached to a subject: a crop stage or a production batch.
//! Sets are keyed by (subject, media kind). Replacing a set marks every
//! active record superseded and inserts the new ones, so the full history
//! stays queryable and nothing is ever deleted.

// SQLite returns i64 for row ids and timestamps, but they're always non-negative.
#![allow(clippy::cast_sign_loss)]


use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::error::{LifecycleError, UnknownVariant};
use crate::stage::Stage;

/// The kind of media an evidence record points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// A photo.
    Image,
    /// A video.
    Video,
}

impl MediaKind {
    /// Returns the media kind as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            other => Err(UnknownVariant::new("media kind", other)),
        }
    }
}

/// What an evidence set is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "subject", rename_all = "snake_case")]
pub enum EvidenceSubject {
    /// Evidence captured while a crop was in a stage.
    CropStage {
        /// The crop.
        crop_id: String,
        /// The stage the evidence is tagged with.
        stage: Stage,
    },
    /// Evidence for a production batch.
    Batch {
        /// The batch.
        batch_id: String,
    },
}

impl EvidenceSubject {
    /// Evidence for a crop stage.
    #[must_use]
    pub fn crop_stage(crop_id: impl Into<String>, stage: Stage) -> Self {
        Self::CropStage {
            crop_id: crop_id.into(),
            stage,
        }
    }

    /// Evidence for a production batch.
    #[must_use]
    pub fn batch(batch_id: impl Into<String>) -> Self {
        Self::Batch {
            batch_id: batch_id.into(),
        }
    }

    const fn owner_kind(&self) -> &'static str {
        match self {
            Self::CropStage { .. } => "farm_crop",
            Self::Batch { .. } => "production_batch",
        }
    }

    fn owner_id(&self) -> &str {
        match self {
            Self::CropStage { crop_id, .. } => crop_id,
            Self::Batch { batch_id } => batch_id,
        }
    }

    const fn scope(&self) -> &'static str {
        match self {
            Self::CropStage { stage, .. } => stage.as_str(),
            Self::Batch { .. } => "batch",
        }
    }
}

/// One evidence item, active or superseded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    /// Row id, increasing in insertion order.
    pub id: u64,
    /// The media id supplied by the caller.
    pub media_id: String,
    /// Photo or video.
    pub media_kind: MediaKind,
    /// When the record was attached.
    pub recorded_at_ns: u64,
    /// When the record was replaced, if it has been.
    pub superseded_at_ns: Option<u64>,
}

impl EvidenceRecord {
    /// Returns `true` if the record belongs to the current set.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.superseded_at_ns.is_none()
    }
}

/// Replaces the active set for (subject, kind) with `media_ids`.
///
/// Duplicate ids are recorded once. Returns the number of records inserted.
///
/// A blank id is refused before anything is superseded.
pub(crate) fn replace(
    conn: &Connection,
    subject: &EvidenceSubject,
    kind: MediaKind,
    media_ids: &[String],
    now_ns: u64,
) -> Result<usize, LifecycleError> {
    if media_ids.iter().any(|media_id| media_id.trim().is_empty()) {
        return Err(LifecycleError::BlankMediaId);
    }

    conn.execute(
        "UPDATE evidence SET superseded_at_ns = ?5
         WHERE owner_kind = ?1 AND owner_id = ?2 AND scope = ?3 AND media_kind = ?4
           AND superseded_at_ns IS NULL",
        params![
            subject.owner_kind(),
            subject.owner_id(),
            subject.scope(),
            kind,
            now_ns
        ],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO evidence (owner_kind, owner_id, scope, media_kind, media_id, recorded_at_ns)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    let mut seen = BTreeSet::new();
    for media_id in media_ids {
        if seen.insert(media_id.as_str()) {
            stmt.execute(params![
                subject.owner_kind(),
                subject.owner_id(),
                subject.scope(),
                kind,
                media_id,
                now_ns
            ])?;
        }
    }
    Ok(seen.len())
}

/// Returns the active set for (subject, kind).
pub(crate) fn active(
    conn: &Connection,
    subject: &EvidenceSubject,
    kind: MediaKind,
) -> Result<Vec<EvidenceRecord>, LifecycleError> {
    query(conn, subject, kind, true)
}

/// Returns every record for (subject, kind), superseded ones included.
pub(crate) fn history(
    conn: &Connection,
    subject: &EvidenceSubject,
    kind: MediaKind,
) -> Result<Vec<EvidenceRecord>, LifecycleError> {
    query(conn, subject, kind, false)
}

fn query(
    conn: &Connection,
    subject: &EvidenceSubject,
    kind: MediaKind,
    active_only: bool,
) -> Result<Vec<EvidenceRecord>, LifecycleError> {
    let mut stmt = conn.prepare(
        "SELECT id, media_id, media_kind, recorded_at_ns, superseded_at_ns
         FROM evidence
         WHERE owner_kind = ?1 AND owner_id = ?2 AND scope = ?3 AND media_kind = ?4
           AND (?5 = 0 OR superseded_at_ns IS NULL)
         ORDER BY id ASC",
    )?;
    let records = stmt
        .query_map(
            params![
                subject.owner_kind(),
                subject.owner_id(),
                subject.scope(),
                kind,
                active_only
            ],
            |row| {
                Ok(EvidenceRecord {
                    id: row.get::<_, i64>(0)? as u64,
                    media_id: row.get(1)?,
                    media_kind: row.get(2)?,
                    recorded_at_ns: row.get::<_, i64>(3)? as u64,
                    superseded_at_ns: row.get::<_, Option<i64>>(4)?.map(|ns| ns as u64),
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Returns the stages of a crop that have at least one active evidence item.
pub(crate) fn crop_stages_with_evidence(
    conn: &Connection,
    crop_id: &str,
) -> Result<BTreeSet<Stage>, LifecycleError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT scope FROM evidence
         WHERE owner_kind = 'farm_crop' AND owner_id = ?1 AND superseded_at_ns IS NULL",
    )?;
    let stages = stmt
        .query_map([crop_id], |row| row.get::<_, Stage>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(stages)
}
