//! Read-only inspection commands.
//!
//! # Commands
//!
//! - `biochar crop <CROP_ID>` - crop record, stage history, admission
//! - `biochar pools <KILN_ID>` - biomass pools at a kiln
//! - `biochar inventory <KILN_ID>` - biochar inventory at a kiln
//! - `biochar batches <KILN_ID>` - production batches at a kiln
//! - `biochar pending <KILN_ID>` - handoffs awaiting verification
//! - `biochar journal <KILN_ID>` - pool and inventory movements
//!
//! # JSON Output
//!
//! With `--json`, every command prints one pretty-printed JSON document on
//! stdout; errors go to stderr as `{"code": ..., "message": ...}` where
//! `code` is the error class (`not_found`, `ownership`, ...).

use biochar_core::{
    Admission, FarmCrop, FertilizerApplication, LedgerEntry, LifecycleCoordinator,
    LifecycleError, Mass, PoolBalance, ProductionBatch, StageEvent,
};
use serde::Serialize;

use super::{exit_codes, output_lifecycle_error, print_json};

/// Response for `biochar crop`.
#[derive(Debug, Clone, Serialize)]
pub struct CropReport {
    /// The crop record.
    pub crop: FarmCrop,
    /// Active fertilizer applications.
    pub fertilizers: Vec<FertilizerApplication>,
    /// Every stage entered, oldest first.
    pub history: Vec<StageEvent>,
    /// Whether the crop can move to its next stage.
    pub admission: Admission,
}

/// Response for `biochar inventory`.
#[derive(Debug, Clone, Serialize)]
pub struct InventoryResponse {
    /// Kiln id.
    pub kiln_id: String,
    /// Biochar on hand.
    pub biochar: Mass,
}

fn load_crop_report(
    coordinator: &LifecycleCoordinator,
    crop_id: &str,
) -> Result<CropReport, LifecycleError> {
    Ok(CropReport {
        crop: coordinator.crop(crop_id)?,
        fertilizers: coordinator.fertilizers(crop_id)?,
        history: coordinator.stage_history(crop_id)?,
        admission: coordinator.can_advance(crop_id)?,
    })
}

/// Shows a crop.
pub fn run_crop(coordinator: &LifecycleCoordinator, crop_id: &str, json_output: bool) -> u8 {
    let report = match load_crop_report(coordinator, crop_id) {
        Ok(report) => report,
        Err(err) => return output_lifecycle_error(json_output, &err),
    };

    if json_output {
        print_json(&report);
        return exit_codes::SUCCESS;
    }

    let crop = &report.crop;
    println!("Crop {}", crop.id);
    println!("  Farm:       {} (farmer {})", crop.farm_id, crop.farmer_id);
    println!("  Crop type:  {}", crop.crop_type_id);
    println!("  Stage:      {}", crop.stage);
    if let Some(area) = &crop.area {
        println!("  Area:       {} {}", area.amount, area.unit);
    }
    print_optional("Seed", crop.seed.as_ref());
    print_optional("Yield", crop.yield_quantity.as_ref());
    print_optional("Vehicle", crop.vehicle.as_ref());
    print_optional("Declared", crop.declared_biomass.as_ref());
    print_optional("Biomass", crop.biomass.as_ref());
    print_optional("Biochar", crop.biochar.as_ref());
    if let Some(kiln_id) = &crop.kiln_id {
        let state = if crop.biomass_verified {
            "verified"
        } else {
            "unverified"
        };
        println!("  Kiln:       {kiln_id} ({state})");
    }
    for fertilizer in &report.fertilizers {
        println!(
            "  Fertilizer: {} {}",
            fertilizer.fertilizer_id, fertilizer.quantity
        );
    }

    println!();
    println!("Stage history:");
    for event in &report.history {
        println!("  #{:<4} {:<24} {}", event.seq_id, event.stage, event.started_at_ns);
    }

    println!();
    match &report.admission {
        Admission::Permitted => println!("Next stage: permitted"),
        Admission::NotReady { missing } => {
            let missing: Vec<String> = missing.iter().map(ToString::to_string).collect();
            println!("Next stage: missing {}", missing.join(", "));
        },
        Admission::Coordinated { operation } => {
            println!("Next stage: entered through {operation}");
        },
        Admission::Terminal => println!("Next stage: none (terminal)"),
    }
    exit_codes::SUCCESS
}

fn print_optional<T: std::fmt::Display>(label: &str, value: Option<&T>) {
    if let Some(value) = value {
        println!("  {:<11} {value}", format!("{label}:"));
    }
}

/// Shows the biomass pools at a kiln.
pub fn run_pools(coordinator: &LifecycleCoordinator, kiln_id: &str, json_output: bool) -> u8 {
    let pools: Vec<PoolBalance> = match coordinator.kiln_pools(kiln_id) {
        Ok(pools) => pools,
        Err(err) => return output_lifecycle_error(json_output, &err),
    };

    if json_output {
        print_json(&pools);
    } else if pools.is_empty() {
        println!("No biomass pools at kiln {kiln_id}");
    } else {
        println!("{:<24} {:>14}", "CROP TYPE", "BALANCE");
        for pool in &pools {
            println!("{:<24} {:>14}", pool.crop_type_id, pool.balance.to_string());
        }
    }
    exit_codes::SUCCESS
}

/// Shows the biochar inventory at a kiln.
pub fn run_inventory(coordinator: &LifecycleCoordinator, kiln_id: &str, json_output: bool) -> u8 {
    let biochar = match coordinator.biochar_inventory(kiln_id) {
        Ok(biochar) => biochar,
        Err(err) => return output_lifecycle_error(json_output, &err),
    };

    if json_output {
        print_json(&InventoryResponse {
            kiln_id: kiln_id.to_string(),
            biochar,
        });
    } else {
        println!("Kiln {kiln_id}: {biochar} biochar on hand");
    }
    exit_codes::SUCCESS
}

/// Lists the production batches at a kiln.
pub fn run_batches(coordinator: &LifecycleCoordinator, kiln_id: &str, json_output: bool) -> u8 {
    let batches: Vec<ProductionBatch> = match coordinator.kiln_batches(kiln_id) {
        Ok(batches) => batches,
        Err(err) => return output_lifecycle_error(json_output, &err),
    };

    if json_output {
        print_json(&batches);
    } else if batches.is_empty() {
        println!("No batches at kiln {kiln_id}");
    } else {
        println!(
            "{:<38} {:<12} {:<10} {:>12} {:>12}",
            "BATCH", "CROP TYPE", "STATUS", "BIOMASS", "BIOCHAR"
        );
        for batch in &batches {
            println!(
                "{:<38} {:<12} {:<10} {:>12} {:>12}",
                batch.id,
                batch.crop_type_id,
                batch.status().as_str(),
                batch.biomass.to_string(),
                batch
                    .biochar
                    .map_or_else(|| "-".to_string(), |mass| mass.to_string()),
            );
        }
    }
    exit_codes::SUCCESS
}

/// Lists handoffs to a kiln that are awaiting verification.
pub fn run_pending(coordinator: &LifecycleCoordinator, kiln_id: &str, json_output: bool) -> u8 {
    let crops: Vec<FarmCrop> = match coordinator.pending_handoffs(kiln_id) {
        Ok(crops) => crops,
        Err(err) => return output_lifecycle_error(json_output, &err),
    };

    if json_output {
        print_json(&crops);
    } else if crops.is_empty() {
        println!("No handoffs awaiting verification at kiln {kiln_id}");
    } else {
        println!("{:<38} {:<12} {:>14}", "CROP", "CROP TYPE", "DECLARED");
        for crop in &crops {
            println!(
                "{:<38} {:<12} {:>14}",
                crop.id,
                crop.crop_type_id,
                crop.declared_biomass
                    .as_ref()
                    .map_or_else(|| "-".to_string(), ToString::to_string),
            );
        }
    }
    exit_codes::SUCCESS
}

/// Shows the movement journal for a kiln.
pub fn run_journal(coordinator: &LifecycleCoordinator, kiln_id: &str, json_output: bool) -> u8 {
    let entries: Vec<LedgerEntry> = match coordinator.ledger_entries(kiln_id) {
        Ok(entries) => entries,
        Err(err) => return output_lifecycle_error(json_output, &err),
    };

    if json_output {
        print_json(&entries);
    } else if entries.is_empty() {
        println!("No movements at kiln {kiln_id}");
    } else {
        for entry in &entries {
            println!(
                "#{:<5} {:<18} {:<12} {:<6} {:>12} -> {:>12}  ref={}",
                entry.seq_id,
                entry.account.as_str(),
                entry.crop_type_id.as_deref().unwrap_or("-"),
                entry.direction.as_str(),
                entry.mass.to_string(),
                entry.balance_after.to_string(),
                entry.reference_id,
            );
        }
    }
    exit_codes::SUCCESS
}
