//! `biochar audit` - conservation audit.
//!
//! Recomputes every pool and inventory balance from the movement journal
//! and compares it with the stored balance.
//!
//! # Exit Codes
//!
//! - 0: Every balance agrees with the journal
//! - 1: The audit could not run
//! - 3: At least one balance disagrees

use biochar_core::{ConservationReport, LifecycleCoordinator};

use super::{exit_codes, output_lifecycle_error, print_json};

/// Runs the audit and prints the report.
pub fn run_audit(coordinator: &LifecycleCoordinator, json_output: bool) -> u8 {
    let report = match coordinator.audit_conservation() {
        Ok(report) => report,
        Err(err) => return output_lifecycle_error(json_output, &err),
    };

    if json_output {
        print_json(&report);
    } else {
        print_report(&report);
    }
    exit_code_for(&report)
}

fn print_report(report: &ConservationReport) {
    println!("Audited {} balances", report.accounts.len());
    let mut discrepancies = 0_usize;
    for audit in report.discrepancies() {
        discrepancies += 1;
        println!(
            "  MISMATCH {} kiln={} crop_type={} stored={} journal={}",
            audit.account,
            audit.kiln_id,
            audit.crop_type_id.as_deref().unwrap_or("-"),
            audit.stored,
            audit.journal,
        );
    }
    if discrepancies == 0 {
        println!("All balances agree with the journal");
    } else {
        println!("{discrepancies} balance(s) disagree with the journal");
    }
}

/// Maps a report to the command's exit code.
fn exit_code_for(report: &ConservationReport) -> u8 {
    if report.is_conserved() {
        exit_codes::SUCCESS
    } else {
        exit_codes::DISCREPANCY
    }
}

#[cfg(test)]
mod tests {
    use biochar_core::{Account, AccountAudit, Mass};

    use super::*;

    fn audit(stored: i64, journal: i64) -> AccountAudit {
        AccountAudit {
            account: Account::BiocharInventory,
            kiln_id: "kiln-1".to_string(),
            crop_type_id: None,
            stored: Mass::from_grams(stored),
            journal: Mass::from_grams(journal),
        }
    }

    #[test]
    fn test_empty_store_audits_clean() {
        let coordinator = LifecycleCoordinator::in_memory().unwrap();
        assert_eq!(run_audit(&coordinator, false), exit_codes::SUCCESS);
    }

    #[test]
    fn test_discrepancy_exit_code() {
        let report = ConservationReport {
            accounts: vec![audit(3_000, 3_000), audit(3_000, 2_500)],
        };
        assert_eq!(exit_code_for(&report), exit_codes::DISCREPANCY);
    }

    #[test]
    fn test_balanced_report_exit_code() {
        let report = ConservationReport {
            accounts: vec![audit(1_000, 1_000)],
        };
        assert_eq!(exit_code_for(&report), exit_codes::SUCCESS);
    }
}
