//! Tests for the stage machine and admission rules.

use std::collections::BTreeSet;

use super::admission::{can_advance, rule_for, unmet};
use super::*;
use crate::store::LifecycleStore;

fn facts(seed: bool, yield_quantity: bool, vehicle: bool, evidence: &[Stage]) -> AdmissionFacts {
    AdmissionFacts {
        seed_recorded: seed,
        yield_recorded: yield_quantity,
        vehicle_recorded: vehicle,
        evidence_stages: evidence.iter().copied().collect::<BTreeSet<_>>(),
    }
}

fn missing(admission: Admission) -> Vec<Prerequisite> {
    match admission {
        Admission::NotReady { missing } => missing,
        other => panic!("expected NotReady, got {other:?}"),
    }
}

// ============================================================================
// Stage Ordering Tests
// ============================================================================

#[test]
fn test_stages_are_ordered_by_lifecycle() {
    for pair in Stage::ALL.windows(2) {
        assert!(pair[0] < pair[1], "{} should precede {}", pair[0], pair[1]);
        assert_eq!(pair[0].next(), Some(pair[1]));
    }
    assert_eq!(Stage::Distribution.next(), None);
    assert!(Stage::Distribution.is_terminal());
    assert_eq!(Stage::default(), Stage::Cropping);
}

#[test]
fn test_only_immediate_successor_is_reachable() {
    assert!(Stage::Cropping.can_transition_to(Stage::Harvesting));
    assert!(!Stage::Cropping.can_transition_to(Stage::SunDrying));
    assert!(!Stage::Harvesting.can_transition_to(Stage::Cropping));
    assert!(!Stage::Harvesting.can_transition_to(Stage::Harvesting));
    assert!(!Stage::Distribution.can_transition_to(Stage::Cropping));
}

#[test]
fn test_stage_strings_round_trip() {
    for stage in Stage::ALL {
        assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
        assert_eq!(
            serde_json::to_string(&stage).unwrap(),
            format!("\"{}\"", stage.as_str())
        );
    }
    let err = "composting".parse::<Stage>().unwrap_err();
    assert_eq!(err.kind, "stage");
}

#[test]
fn test_coordinated_stages_name_their_operation() {
    assert_eq!(Stage::Harvesting.entered_by(), None);
    assert_eq!(Stage::Transportation.entered_by(), None);
    assert_eq!(
        Stage::TransportFarmToKiln.entered_by(),
        Some("move_to_production")
    );
    assert_eq!(Stage::Production.entered_by(), Some("verify_handoff"));
    assert_eq!(Stage::TransportKilnToFarm.entered_by(), Some("distribute"));
    assert_eq!(Stage::Distribution.entered_by(), Some("distribute"));
}

#[test]
fn test_initial_stages() {
    let initial: Vec<Stage> = Stage::ALL.into_iter().filter(Stage::is_initial).collect();
    assert_eq!(
        initial,
        vec![Stage::Cropping, Stage::Harvesting, Stage::SunDrying]
    );
}

// ============================================================================
// Admission Rule Tests
// ============================================================================

#[test]
fn test_rules_exist_only_for_farmer_stages() {
    assert!(rule_for(Stage::Cropping).is_some());
    assert!(rule_for(Stage::TransportFarmToKiln).is_some());
    assert!(rule_for(Stage::Production).is_none());
    assert!(rule_for(Stage::TransportKilnToFarm).is_none());
    assert!(rule_for(Stage::Distribution).is_none());
}

#[test]
fn test_cropping_to_harvesting_needs_both_rules() {
    let admission = can_advance(Stage::Cropping, &AdmissionFacts::default());
    assert_eq!(
        missing(admission),
        vec![
            Prerequisite::SeedQuantity,
            Prerequisite::Evidence(Stage::Cropping),
            Prerequisite::YieldQuantity,
            Prerequisite::Evidence(Stage::Harvesting),
        ]
    );

    let ready = facts(true, true, false, &[Stage::Cropping, Stage::Harvesting]);
    assert_eq!(can_advance(Stage::Cropping, &ready), Admission::Permitted);
}

#[test]
fn test_harvesting_refused_without_seed_even_with_evidence() {
    let no_seed = facts(false, true, false, &[Stage::Cropping, Stage::Harvesting]);
    assert_eq!(
        missing(can_advance(Stage::Cropping, &no_seed)),
        vec![Prerequisite::SeedQuantity]
    );
}

#[test]
fn test_harvesting_refused_without_evidence_even_with_quantities() {
    let no_evidence = facts(true, true, false, &[Stage::Cropping]);
    assert_eq!(
        missing(can_advance(Stage::Cropping, &no_evidence)),
        vec![Prerequisite::Evidence(Stage::Harvesting)]
    );
}

#[test]
fn test_sun_drying_to_transportation() {
    let dried = facts(true, true, false, &[Stage::SunDrying]);
    assert_eq!(
        missing(can_advance(Stage::SunDrying, &dried)),
        vec![
            Prerequisite::VehicleType,
            Prerequisite::Evidence(Stage::Transportation),
        ]
    );

    let loaded = facts(true, true, true, &[Stage::SunDrying, Stage::Transportation]);
    assert!(can_advance(Stage::SunDrying, &loaded).is_permitted());
}

#[test]
fn test_shared_transport_prerequisites_are_listed_once() {
    let admission = can_advance(Stage::Transportation, &AdmissionFacts::default());
    assert_eq!(
        missing(admission),
        vec![
            Prerequisite::VehicleType,
            Prerequisite::Evidence(Stage::Transportation),
        ]
    );
}

#[test]
fn test_handoff_stage_still_checks_its_own_rule() {
    let admission = can_advance(Stage::TransportFarmToKiln, &AdmissionFacts::default());
    assert_eq!(
        missing(admission),
        vec![
            Prerequisite::VehicleType,
            Prerequisite::Evidence(Stage::Transportation),
        ]
    );
}

#[test]
fn test_unmet_checks_a_single_rule() {
    let loaded = facts(false, false, true, &[Stage::Transportation]);
    assert!(unmet(Stage::TransportFarmToKiln, &loaded).is_empty());
    assert_eq!(
        unmet(Stage::Cropping, &loaded),
        vec![
            Prerequisite::SeedQuantity,
            Prerequisite::Evidence(Stage::Cropping),
        ]
    );
    assert!(unmet(Stage::Production, &AdmissionFacts::default()).is_empty());
}

#[test]
fn test_kiln_side_transitions_are_coordinated() {
    let complete = facts(true, true, true, &Stage::ALL);
    assert_eq!(
        can_advance(Stage::Production, &complete),
        Admission::Coordinated {
            operation: "distribute"
        }
    );
    assert_eq!(
        can_advance(Stage::TransportKilnToFarm, &complete),
        Admission::Coordinated {
            operation: "distribute"
        }
    );
    assert_eq!(can_advance(Stage::Distribution, &complete), Admission::Terminal);
}

#[test]
fn test_ready_crop_is_pointed_at_the_operation_that_moves_it() {
    let loaded = facts(true, true, true, &[Stage::Transportation]);
    assert_eq!(
        can_advance(Stage::Transportation, &loaded),
        Admission::Coordinated {
            operation: "move_to_production"
        }
    );
    assert_eq!(
        can_advance(Stage::TransportFarmToKiln, &loaded),
        Admission::Coordinated {
            operation: "verify_handoff"
        }
    );
    assert!(!can_advance(Stage::TransportFarmToKiln, &loaded).is_permitted());
}

#[test]
fn test_admission_serializes_missing_prerequisites() {
    let admission = Admission::NotReady {
        missing: vec![
            Prerequisite::SeedQuantity,
            Prerequisite::Evidence(Stage::Cropping),
        ],
    };
    let json = serde_json::to_value(&admission).unwrap();
    assert_eq!(json["status"], "not_ready");
    assert_eq!(json["missing"][0]["kind"], "seed_quantity");
    assert_eq!(json["missing"][1]["kind"], "evidence");
    assert_eq!(json["missing"][1]["stage"], "cropping");
}

// ============================================================================
// Stage Event Tests
// ============================================================================

fn seed_crop(store: &LifecycleStore, stage: Stage) {
    store
        .write(|tx| {
            tx.execute(
                "INSERT INTO farm_crops (id, farm_id, farmer_id, crop_type_id, stage, created_at_ns, updated_at_ns)
                 VALUES ('crop-1', 'farm-1', 'farmer-1', 'rice', ?1, 1, 1)",
                [stage],
            )?;
            append_event(tx, "crop-1", stage, 1)?;
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_advance_appends_event_and_updates_cached_stage() {
    let store = LifecycleStore::in_memory().unwrap();
    seed_crop(&store, Stage::Cropping);

    let event = store
        .write(|tx| advance(tx, "crop-1", Stage::Cropping, Stage::Harvesting, 5))
        .unwrap();
    assert_eq!(event.stage, Stage::Harvesting);
    assert_eq!(event.started_at_ns, 5);

    let events = store.read(|conn| history(conn, "crop-1")).unwrap();
    let stages: Vec<Stage> = events.iter().map(|e| e.stage).collect();
    assert_eq!(stages, vec![Stage::Cropping, Stage::Harvesting]);
    assert!(events[0].seq_id < events[1].seq_id);
}

#[test]
fn test_advance_refuses_skips() {
    let store = LifecycleStore::in_memory().unwrap();
    seed_crop(&store, Stage::Cropping);

    let err = store
        .write(|tx| advance(tx, "crop-1", Stage::Cropping, Stage::SunDrying, 5))
        .unwrap_err();
    assert!(matches!(err, LifecycleError::StageOrderViolation { .. }));
    assert_eq!(store.read(|conn| history(conn, "crop-1")).unwrap().len(), 1);
}

#[test]
fn test_advance_from_stale_stage_is_a_mismatch() {
    let store = LifecycleStore::in_memory().unwrap();
    seed_crop(&store, Stage::Harvesting);

    let err = store
        .write(|tx| advance(tx, "crop-1", Stage::Cropping, Stage::Harvesting, 5))
        .unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::StageMismatch {
            expected: Stage::Cropping,
            actual: Stage::Harvesting,
            ..
        }
    ));
}

#[test]
fn test_stage_events_cannot_be_rewritten() {
    let store = LifecycleStore::in_memory().unwrap();
    seed_crop(&store, Stage::Cropping);
    store
        .write(|tx| advance(tx, "crop-1", Stage::Cropping, Stage::Harvesting, 5))
        .unwrap();

    let err = store
        .write(|tx| Ok(tx.execute("UPDATE stage_events SET stage = 'distribution'", [])?))
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Database(_)));
    let err = store
        .write(|tx| Ok(tx.execute("DELETE FROM stage_events", [])?))
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Database(_)));

    let stages: Vec<Stage> = store
        .read(|conn| history(conn, "crop-1"))
        .unwrap()
        .into_iter()
        .map(|event| event.stage)
        .collect();
    assert_eq!(stages, vec![Stage::Cropping, Stage::Harvesting]);
}

#[test]
fn test_advance_unknown_crop() {
    let store = LifecycleStore::in_memory().unwrap();
    let err = store
        .write(|tx| advance(tx, "ghost", Stage::Cropping, Stage::Harvesting, 5))
        .unwrap_err();
    assert!(matches!(err, LifecycleError::CropNotFound { .. }));
}
