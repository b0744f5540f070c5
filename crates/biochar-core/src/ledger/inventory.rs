//! Biochar inventory, one per kiln.
//!
//! Completed batches are the only source of credits; distribution to a
//! crop is the only debit. A kiln that has never completed a batch holds
//! zero.

use rusqlite::{Connection, OptionalExtension, params};

use super::{Account, Direction, Movement, append, require_positive};
use crate::error::LifecycleError;
use crate::quantity::Mass;

/// Adds a completed batch's output to the kiln's inventory.
pub(crate) fn credit(
    conn: &Connection,
    kiln_id: &str,
    mass: Mass,
    batch_id: &str,
    now_ns: u64,
) -> Result<Mass, LifecycleError> {
    require_positive(mass)?;
    let balance_after = balance(conn, kiln_id)?.checked_add(mass).ok_or_else(|| {
        LifecycleError::invalid_quantity(format!("crediting {mass} would overflow the inventory"))
    })?;

    conn.execute(
        "INSERT INTO kiln_biochar_inventory (kiln_id, balance_grams, created_at_ns, updated_at_ns)
         VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT (kiln_id)
         DO UPDATE SET balance_grams = excluded.balance_grams, updated_at_ns = excluded.updated_at_ns",
        params![kiln_id, balance_after.grams(), now_ns],
    )?;
    append(
        conn,
        &Movement {
            account: Account::BiocharInventory,
            kiln_id,
            crop_type_id: None,
            direction: Direction::Credit,
            mass,
            reference_id: batch_id,
            balance_after,
        },
        now_ns,
    )?;
    Ok(balance_after)
}

/// Removes biochar handed to a crop.
///
/// Fails with [`LifecycleError::InsufficientBiocharInventory`], leaving the
/// inventory unchanged, if `mass` exceeds the balance.
pub(crate) fn debit(
    conn: &Connection,
    kiln_id: &str,
    mass: Mass,
    crop_id: &str,
    now_ns: u64,
) -> Result<Mass, LifecycleError> {
    require_positive(mass)?;
    let available = balance(conn, kiln_id)?;
    let balance_after =
        available
            .checked_sub(mass)
            .ok_or_else(|| LifecycleError::InsufficientBiocharInventory {
                kiln_id: kiln_id.to_string(),
                requested: mass,
                available,
            })?;

    conn.execute(
        "UPDATE kiln_biochar_inventory SET balance_grams = ?2, updated_at_ns = ?3
         WHERE kiln_id = ?1",
        params![kiln_id, balance_after.grams(), now_ns],
    )?;
    append(
        conn,
        &Movement {
            account: Account::BiocharInventory,
            kiln_id,
            crop_type_id: None,
            direction: Direction::Debit,
            mass,
            reference_id: crop_id,
            balance_after,
        },
        now_ns,
    )?;
    Ok(balance_after)
}

/// Returns the kiln's biochar balance; zero if it has none.
pub(crate) fn balance(conn: &Connection, kiln_id: &str) -> Result<Mass, LifecycleError> {
    let grams: Option<i64> = conn
        .query_row(
            "SELECT balance_grams FROM kiln_biochar_inventory WHERE kiln_id = ?1",
            [kiln_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(grams.map_or(Mass::ZERO, Mass::from_grams))
}
