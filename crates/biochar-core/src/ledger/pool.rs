//! Biomass pools, one per (kiln, crop type).
//!
//! A pool row is created by its first credit. A pool that has never been
//! credited does not exist, and debiting it fails as an empty pool.

#![allow(clippy::cast_sign_loss)]

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use super::{Account, Direction, Movement, append, require_positive};
use crate::error::LifecycleError;
use crate::quantity::Mass;

/// Current state of one biomass pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolBalance {
    /// The kiln holding the biomass.
    pub kiln_id: String,
    /// The crop type pooled.
    pub crop_type_id: String,
    /// Biomass physically present and not yet consumed by a batch.
    pub balance: Mass,
    /// When the pool last moved.
    pub updated_at_ns: u64,
}

/// Adds verified biomass to a pool, creating it on first use.
pub(crate) fn credit(
    conn: &Connection,
    kiln_id: &str,
    crop_type_id: &str,
    mass: Mass,
    reference_id: &str,
    now_ns: u64,
) -> Result<PoolBalance, LifecycleError> {
    require_positive(mass)?;
    let current = balance(conn, kiln_id, crop_type_id)?.map_or(Mass::ZERO, |pool| pool.balance);
    let balance_after = current.checked_add(mass).ok_or_else(|| {
        LifecycleError::invalid_quantity(format!("crediting {mass} would overflow the pool"))
    })?;

    conn.execute(
        "INSERT INTO kiln_biomass_pools (kiln_id, crop_type_id, balance_grams, created_at_ns, updated_at_ns)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT (kiln_id, crop_type_id)
         DO UPDATE SET balance_grams = excluded.balance_grams, updated_at_ns = excluded.updated_at_ns",
        params![kiln_id, crop_type_id, balance_after.grams(), now_ns],
    )?;
    append(
        conn,
        &Movement {
            account: Account::BiomassPool,
            kiln_id,
            crop_type_id: Some(crop_type_id),
            direction: Direction::Credit,
            mass,
            reference_id,
            balance_after,
        },
        now_ns,
    )?;

    Ok(PoolBalance {
        kiln_id: kiln_id.to_string(),
        crop_type_id: crop_type_id.to_string(),
        balance: balance_after,
        updated_at_ns: now_ns,
    })
}

/// Removes biomass from a pool for a production batch.
///
/// Fails with [`LifecycleError::InsufficientPoolBalance`], leaving the pool
/// unchanged, if `mass` exceeds the balance.
pub(crate) fn debit(
    conn: &Connection,
    kiln_id: &str,
    crop_type_id: &str,
    mass: Mass,
    reference_id: &str,
    now_ns: u64,
) -> Result<PoolBalance, LifecycleError> {
    require_positive(mass)?;
    let available = balance(conn, kiln_id, crop_type_id)?.map_or(Mass::ZERO, |pool| pool.balance);
    let balance_after =
        available
            .checked_sub(mass)
            .ok_or_else(|| LifecycleError::InsufficientPoolBalance {
                kiln_id: kiln_id.to_string(),
                crop_type_id: crop_type_id.to_string(),
                requested: mass,
                available,
            })?;

    conn.execute(
        "UPDATE kiln_biomass_pools SET balance_grams = ?3, updated_at_ns = ?4
         WHERE kiln_id = ?1 AND crop_type_id = ?2",
        params![kiln_id, crop_type_id, balance_after.grams(), now_ns],
    )?;
    append(
        conn,
        &Movement {
            account: Account::BiomassPool,
            kiln_id,
            crop_type_id: Some(crop_type_id),
            direction: Direction::Debit,
            mass,
            reference_id,
            balance_after,
        },
        now_ns,
    )?;

    Ok(PoolBalance {
        kiln_id: kiln_id.to_string(),
        crop_type_id: crop_type_id.to_string(),
        balance: balance_after,
        updated_at_ns: now_ns,
    })
}

/// Returns a pool's balance, or `None` if it has never been credited.
pub(crate) fn balance(
    conn: &Connection,
    kiln_id: &str,
    crop_type_id: &str,
) -> Result<Option<PoolBalance>, LifecycleError> {
    let pool = conn
        .query_row(
            "SELECT kiln_id, crop_type_id, balance_grams, updated_at_ns
             FROM kiln_biomass_pools
             WHERE kiln_id = ?1 AND crop_type_id = ?2",
            params![kiln_id, crop_type_id],
            map_pool,
        )
        .optional()?;
    Ok(pool)
}

/// Returns every pool at a kiln, ordered by crop type.
pub(crate) fn for_kiln(conn: &Connection, kiln_id: &str) -> Result<Vec<PoolBalance>, LifecycleError> {
    let mut stmt = conn.prepare(
        "SELECT kiln_id, crop_type_id, balance_grams, updated_at_ns
         FROM kiln_biomass_pools
         WHERE kiln_id = ?1
         ORDER BY crop_type_id ASC",
    )?;
    let pools = stmt
        .query_map([kiln_id], map_pool)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(pools)
}

fn map_pool(row: &rusqlite::Row<'_>) -> rusqlite::Result<PoolBalance> {
    Ok(PoolBalance {
        kiln_id: row.get(0)?,
        crop_type_id: row.get(1)?,
        balance: Mass::from_grams(row.get(2)?),
        updated_at_ns: row.get::<_, i64>(3)? as u64,
    })
}
