//! End-to-end lifecycle walkthrough against an on-disk store.
//!
//! A single farm crop goes from sowing to biochar distribution, and every
//! intermediate balance is checked:
//!
//! - 5 kg seed with cropping evidence; harvesting refused until yield and
//!   harvesting evidence are recorded
//! - 20 kg biomass handed to kiln K; verification credits pool(K, rice) = 20
//! - batch of 15 kg opened: pool = 5
//! - batch completed with 3 kg biochar: inventory(K) = 3
//! - 3 kg distributed to the crop: inventory(K) = 0, crop at distribution
//! - a second distribution is refused

use biochar_core::{
    Admission, BatchEvidence, CompleteBatch, DistributeBiochar, HandoffDeclaration,
    HandoffVerification, LifecycleCoordinator, LifecycleError, Mass, NewFarmCrop, OpenBatch,
    Prerequisite, Quantity, Stage, StageDetails, StoreConfig, VehicleType,
};
use tempfile::TempDir;

const KILN: &str = "kiln-k";

fn kg(value: i64) -> Mass {
    Mass::from_grams(value * 1_000)
}

fn evidence(id: &str) -> Vec<String> {
    vec![id.to_string()]
}

#[test]
fn test_farm_to_biochar_walkthrough() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let config = StoreConfig {
        path: dir.path().join("biochar.db"),
        ..StoreConfig::default()
    };
    let coordinator = LifecycleCoordinator::open(&config).expect("failed to open store");

    // Cropping: 5 kg seed and a photo.
    let crop = coordinator
        .register_crop(NewFarmCrop {
            farm_id: "farm-1".to_string(),
            farmer_id: "farmer-1".to_string(),
            crop_type_id: "rice".to_string(),
            area: None,
            initial_stage: Stage::Cropping,
            details: vec![StageDetails::Cropping {
                seed: Some(Quantity::kg(5.0)),
                fertilizers: Vec::new(),
                evidence: evidence("img-sowing"),
            }],
        })
        .unwrap();

    // Harvesting is refused until its own data is present.
    match coordinator.advance(&crop.id, Stage::Harvesting) {
        Err(LifecycleError::AdmissionDenied { missing, .. }) => assert_eq!(
            missing,
            vec![
                Prerequisite::YieldQuantity,
                Prerequisite::Evidence(Stage::Harvesting)
            ]
        ),
        other => panic!("expected admission denial, got {other:?}"),
    }

    coordinator
        .record_stage_details(
            &crop.id,
            StageDetails::Harvesting {
                yield_quantity: Some(Quantity::kg(60.0)),
                evidence: evidence("img-harvest"),
            },
        )
        .unwrap();
    coordinator.advance(&crop.id, Stage::Harvesting).unwrap();

    coordinator
        .record_stage_details(
            &crop.id,
            StageDetails::SunDrying {
                evidence: evidence("img-drying"),
            },
        )
        .unwrap();
    coordinator.advance(&crop.id, Stage::SunDrying).unwrap();

    coordinator
        .record_stage_details(
            &crop.id,
            StageDetails::Transportation {
                vehicle: VehicleType::NonMotorised,
                evidence: evidence("img-cart"),
            },
        )
        .unwrap();
    coordinator.advance(&crop.id, Stage::Transportation).unwrap();

    // Farmer sends 20 kg to kiln K.
    coordinator
        .move_to_production(
            &crop.id,
            HandoffDeclaration {
                kiln_id: KILN.to_string(),
                biomass: Quantity::kg(20.0),
                evidence: evidence("img-dispatch"),
            },
        )
        .unwrap();
    assert_eq!(coordinator.pending_handoffs(KILN).unwrap().len(), 1);
    assert!(coordinator.pool_balance(KILN, "rice").unwrap().is_none());

    // Kiln verifies: pool(K, rice) = 20.
    let pool = coordinator
        .verify_handoff(KILN, &crop.id, HandoffVerification::default())
        .unwrap();
    assert_eq!(pool.balance, kg(20));
    assert_eq!(coordinator.crop(&crop.id).unwrap().stage, Stage::Production);

    // Batch of 15 kg: pool = 5.
    let batch = coordinator
        .open_batch(
            KILN,
            OpenBatch {
                crop_type_id: "rice".to_string(),
                biomass: Quantity::kg(15.0),
                images: evidence("img-kiln-load"),
                videos: Vec::new(),
            },
        )
        .unwrap();
    assert_eq!(batch.biomass, kg(15));
    assert_eq!(
        coordinator.pool_balance(KILN, "rice").unwrap().unwrap().balance,
        kg(5)
    );
    assert_eq!(coordinator.biochar_inventory(KILN).unwrap(), Mass::ZERO);

    // 3 kg biochar: inventory(K) = 3.
    let batch = coordinator
        .complete_batch(
            KILN,
            &batch.id,
            CompleteBatch {
                biochar: Quantity::kg(3.0),
                evidence: BatchEvidence {
                    images: Some(evidence("img-biochar")),
                    videos: None,
                },
            },
        )
        .unwrap();
    assert!(batch.is_completed());
    assert_eq!(coordinator.biochar_inventory(KILN).unwrap(), kg(3));

    // Distribute 3 kg: inventory(K) = 0, crop at distribution.
    let crop = coordinator
        .distribute(
            KILN,
            &crop.id,
            DistributeBiochar {
                biochar: Quantity::kg(3.0),
                evidence: evidence("img-handover"),
            },
        )
        .unwrap();
    assert_eq!(coordinator.biochar_inventory(KILN).unwrap(), Mass::ZERO);
    assert_eq!(crop.biochar, Some(Quantity::kg(3.0)));
    assert_eq!(crop.stage, Stage::Distribution);
    assert_eq!(coordinator.can_advance(&crop.id).unwrap(), Admission::Terminal);

    // A second distribution is refused and changes nothing.
    let err = coordinator
        .distribute(
            KILN,
            &crop.id,
            DistributeBiochar {
                biochar: Quantity::kg(3.0),
                evidence: Vec::new(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, LifecycleError::BiocharAlreadyRecorded { .. }));
    assert_eq!(coordinator.biochar_inventory(KILN).unwrap(), Mass::ZERO);

    // The stage history is strictly forward and complete.
    let stages: Vec<Stage> = coordinator
        .stage_history(&crop.id)
        .unwrap()
        .into_iter()
        .map(|event| event.stage)
        .collect();
    assert_eq!(stages, Stage::ALL.to_vec());

    // The journal agrees with every balance.
    let report = coordinator.audit_conservation().unwrap();
    assert!(report.is_conserved());
    assert_eq!(coordinator.ledger_entries(KILN).unwrap().len(), 4);
}

#[test]
fn test_state_survives_reopen() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let config = StoreConfig {
        path: dir.path().join("biochar.db"),
        ..StoreConfig::default()
    };

    let crop_id = {
        let coordinator = LifecycleCoordinator::open(&config).unwrap();
        coordinator
            .register_crop(NewFarmCrop {
                farm_id: "farm-1".to_string(),
                farmer_id: "farmer-1".to_string(),
                crop_type_id: "wheat".to_string(),
                area: None,
                initial_stage: Stage::Harvesting,
                details: Vec::new(),
            })
            .unwrap()
            .id
    };

    let coordinator = LifecycleCoordinator::open(&config).unwrap();
    let crop = coordinator.crop(&crop_id).unwrap();
    assert_eq!(crop.stage, Stage::Harvesting);
    assert_eq!(crop.crop_type_id, "wheat");
}
