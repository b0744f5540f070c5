//! Kiln balances and the movement journal.
//!
//! Two kinds of shared balance live at a kiln:
//!
//! - a [biomass pool](pool) per crop type, credited when a farm crop's
//!   handoff is verified and debited when a production batch is opened;
//! - a [biochar inventory](inventory), credited when a batch completes and
//!   debited when biochar is distributed to a crop.
//!
//! Balances are only ever changed through `credit` and `debit` in the
//! submodules. Both refuse non-positive amounts, `debit` refuses to take a
//! balance below zero, and both append a [`LedgerEntry`] to the journal in
//! the same transaction. The conservation audit recomputes every balance
//! from the journal, which must always agree with the stored rows.
//!
//! # Example
//!
//! ```rust,no_run
//! use biochar_core::LifecycleCoordinator;
//!
//! let coordinator = LifecycleCoordinator::in_memory().unwrap();
//! let report = coordinator.audit_conservation().unwrap();
//! assert!(report.is_conserved());
//! ```

// SQLite returns i64 for row ids and timestamps, but they're always non-negative.
#![allow(clippy::cast_sign_loss)]

pub mod inventory;
pub mod pool;


use std::fmt;
use std::str::FromStr;

pub use pool::PoolBalance;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::error::{LifecycleError, UnknownVariant};
use crate::quantity::Mass;

/// A kind of kiln balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Account {
    /// Biomass held at a kiln for one crop type.
    BiomassPool,
    /// Biochar held at a kiln.
    BiocharInventory,
}

impl Account {
    /// Returns the account as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BiomassPool => "biomass_pool",
            Self::BiocharInventory => "biochar_inventory",
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Account {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "biomass_pool" => Ok(Self::BiomassPool),
            "biochar_inventory" => Ok(Self::BiocharInventory),
            other => Err(UnknownVariant::new("account", other)),
        }
    }
}

/// Whether a movement adds to or removes from a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Adds to the balance.
    Credit,
    /// Removes from the balance.
    Debit,
}

impl Direction {
    /// Returns the direction as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Direction {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(Self::Credit),
            "debit" => Ok(Self::Debit),
            other => Err(UnknownVariant::new("direction", other)),
        }
    }
}

/// One immutable journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Position in the journal.
    pub seq_id: u64,
    /// Which balance moved.
    pub account: Account,
    /// The kiln holding the balance.
    pub kiln_id: String,
    /// The pool's crop type; `None` for biochar inventory.
    pub crop_type_id: Option<String>,
    /// Credit or debit.
    pub direction: Direction,
    /// Amount moved, always positive.
    pub mass: Mass,
    /// Crop or batch that caused the movement.
    pub reference_id: String,
    /// Balance immediately after the movement.
    pub balance_after: Mass,
    /// When the movement was committed.
    pub recorded_at_ns: u64,
}

/// Fields of a journal line before it is appended.
pub(crate) struct Movement<'a> {
    pub account: Account,
    pub kiln_id: &'a str,
    pub crop_type_id: Option<&'a str>,
    pub direction: Direction,
    pub mass: Mass,
    pub reference_id: &'a str,
    pub balance_after: Mass,
}

fn require_positive(mass: Mass) -> Result<(), LifecycleError> {
    if mass.is_positive() {
        Ok(())
    } else {
        Err(LifecycleError::invalid_quantity(format!(
            "ledger movements must be positive, got {mass}"
        )))
    }
}

fn append(conn: &Connection, movement: &Movement<'_>, now_ns: u64) -> Result<(), LifecycleError> {
    conn.execute(
        "INSERT INTO ledger_entries
         (account, kiln_id, crop_type_id, direction, grams, reference_id, balance_after_grams, recorded_at_ns)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            movement.account,
            movement.kiln_id,
            movement.crop_type_id,
            movement.direction,
            movement.mass.grams(),
            movement.reference_id,
            movement.balance_after.grams(),
            now_ns
        ],
    )?;
    Ok(())
}

/// Returns every journal line for a kiln in commit order.
pub(crate) fn entries_for_kiln(
    conn: &Connection,
    kiln_id: &str,
) -> Result<Vec<LedgerEntry>, LifecycleError> {
    let mut stmt = conn.prepare(
        "SELECT seq_id, account, kiln_id, crop_type_id, direction, grams, reference_id,
                balance_after_grams, recorded_at_ns
         FROM ledger_entries
         WHERE kiln_id = ?1
         ORDER BY seq_id ASC",
    )?;
    let entries = stmt
        .query_map([kiln_id], |row| {
            Ok(LedgerEntry {
                seq_id: row.get::<_, i64>(0)? as u64,
                account: row.get(1)?,
                kiln_id: row.get(2)?,
                crop_type_id: row.get(3)?,
                direction: row.get(4)?,
                mass: Mass::from_grams(row.get(5)?),
                reference_id: row.get(6)?,
                balance_after: Mass::from_grams(row.get(7)?),
                recorded_at_ns: row.get::<_, i64>(8)? as u64,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// A stored balance next to the balance its journal implies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAudit {
    /// Which balance.
    pub account: Account,
    /// The kiln holding it.
    pub kiln_id: String,
    /// The pool's crop type; `None` for biochar inventory.
    pub crop_type_id: Option<String>,
    /// Balance stored on the account row.
    pub stored: Mass,
    /// Credits minus debits from the journal.
    pub journal: Mass,
}

impl AccountAudit {
    /// Returns `true` if the stored balance matches the journal.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.stored == self.journal
    }
}

/// Result of recomputing every balance from the journal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConservationReport {
    /// Every account, balanced or not.
    pub accounts: Vec<AccountAudit>,
}

impl ConservationReport {
    /// Returns the accounts whose stored balance disagrees with the journal.
    pub fn discrepancies(&self) -> impl Iterator<Item = &AccountAudit> {
        self.accounts.iter().filter(|audit| !audit.is_balanced())
    }

    /// Returns `true` if every account agrees with its journal.
    #[must_use]
    pub fn is_conserved(&self) -> bool {
        self.discrepancies().next().is_none()
    }
}

/// Recomputes every balance from the journal.
///
/// Journal lines with no account row (which `credit` never produces) are
/// reported against a stored balance of zero.
pub(crate) fn audit(conn: &Connection) -> Result<ConservationReport, LifecycleError> {
    let mut stmt = conn.prepare(
        "WITH journal AS (
             SELECT account, kiln_id, crop_type_id,
                    SUM(CASE direction WHEN 'credit' THEN grams ELSE -grams END) AS net
             FROM ledger_entries
             GROUP BY account, kiln_id, crop_type_id
         ),
         stored AS (
             SELECT 'biomass_pool' AS account, kiln_id, crop_type_id, balance_grams
             FROM kiln_biomass_pools
             UNION ALL
             SELECT 'biochar_inventory', kiln_id, NULL, balance_grams
             FROM kiln_biochar_inventory
         )
         SELECT s.account, s.kiln_id, s.crop_type_id, s.balance_grams, COALESCE(j.net, 0)
         FROM stored s
         LEFT JOIN journal j
           ON j.account = s.account AND j.kiln_id = s.kiln_id
          AND j.crop_type_id IS s.crop_type_id
         UNION ALL
         SELECT j.account, j.kiln_id, j.crop_type_id, 0, j.net
         FROM journal j
         WHERE NOT EXISTS (
             SELECT 1 FROM stored s
             WHERE s.account = j.account AND s.kiln_id = j.kiln_id
               AND s.crop_type_id IS j.crop_type_id
         )
         ORDER BY 2, 1, 3",
    )?;
    let accounts = stmt
        .query_map([], |row| {
            Ok(AccountAudit {
                account: row.get(0)?,
                kiln_id: row.get(1)?,
                crop_type_id: row.get(2)?,
                stored: Mass::from_grams(row.get(3)?),
                journal: Mass::from_grams(row.get(4)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ConservationReport { accounts })
}
