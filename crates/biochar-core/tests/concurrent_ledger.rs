//! Concurrency tests for the kiln ledgers.
//!
//! Each worker opens its own connection to one database file, the way
//! separate request handlers would, so the only thing serializing them is
//! the store's write transaction.
//!
//! - Concurrent handoff verifications into one pool all land
//! - Concurrent batch opens that together exceed the pool let exactly the
//!   affordable ones through

use std::sync::{Arc, Barrier};
use std::thread;

use biochar_core::{
    HandoffDeclaration, HandoffVerification, LifecycleCoordinator, LifecycleError, Mass,
    NewFarmCrop, OpenBatch, Quantity, Stage, StageDetails, StoreConfig, VehicleType,
};
use tempfile::TempDir;

const KILN: &str = "kiln-1";

fn store_config(dir: &TempDir) -> StoreConfig {
    StoreConfig {
        path: dir.path().join("biochar.db"),
        busy_timeout_ms: 30_000,
        wal: true,
    }
}

fn evidence(id: &str) -> Vec<String> {
    vec![id.to_string()]
}

/// Registers a crop and takes it as far as the kiln handoff.
fn send_crop(coordinator: &LifecycleCoordinator, biomass_kg: f64) -> String {
    let crop = coordinator
        .register_crop(NewFarmCrop {
            farm_id: "farm-1".to_string(),
            farmer_id: "farmer-1".to_string(),
            crop_type_id: "rice".to_string(),
            area: None,
            initial_stage: Stage::SunDrying,
            details: vec![
                StageDetails::Cropping {
                    seed: Some(Quantity::kg(2.0)),
                    fertilizers: Vec::new(),
                    evidence: evidence("img-crop"),
                },
                StageDetails::Harvesting {
                    yield_quantity: Some(Quantity::kg(30.0)),
                    evidence: evidence("img-harvest"),
                },
                StageDetails::SunDrying {
                    evidence: evidence("img-dry"),
                },
                StageDetails::Transportation {
                    vehicle: VehicleType::Diesel,
                    evidence: evidence("img-truck"),
                },
            ],
        })
        .unwrap();
    coordinator.advance(&crop.id, Stage::Transportation).unwrap();
    coordinator
        .move_to_production(
            &crop.id,
            HandoffDeclaration {
                kiln_id: KILN.to_string(),
                biomass: Quantity::kg(biomass_kg),
                evidence: evidence("img-dispatch"),
            },
        )
        .unwrap();
    crop.id
}

#[test]
fn test_concurrent_handoffs_from_separate_connections_sum_exactly() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let config = store_config(&dir);
    let setup = LifecycleCoordinator::open(&config).unwrap();

    let quantities = [3.0, 5.5, 8.25, 13.0, 21.125, 1.0];
    let crop_ids: Vec<String> = quantities
        .iter()
        .map(|kg| send_crop(&setup, *kg))
        .collect();

    let barrier = Arc::new(Barrier::new(crop_ids.len()));
    let handles: Vec<_> = crop_ids
        .into_iter()
        .map(|crop_id| {
            let coordinator = LifecycleCoordinator::open(&config).unwrap();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                coordinator
                    .verify_handoff(KILN, &crop_id, HandoffVerification::default())
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    let pool = setup.pool_balance(KILN, "rice").unwrap().unwrap();
    assert_eq!(pool.balance, Mass::from_grams(51_875));
    assert_eq!(setup.ledger_entries(KILN).unwrap().len(), quantities.len());
    assert!(setup.audit_conservation().unwrap().is_conserved());
}

#[test]
fn test_concurrent_batch_opens_never_overdraw_the_pool() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let config = store_config(&dir);
    let setup = LifecycleCoordinator::open(&config).unwrap();

    let crop_id = send_crop(&setup, 50.0);
    setup
        .verify_handoff(KILN, &crop_id, HandoffVerification::default())
        .unwrap();

    let workers = 5;
    let barrier = Arc::new(Barrier::new(workers));
    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let coordinator = LifecycleCoordinator::open(&config).unwrap();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                coordinator.open_batch(
                    KILN,
                    OpenBatch {
                        crop_type_id: "rice".to_string(),
                        biomass: Quantity::kg(15.0),
                        images: Vec::new(),
                        videos: Vec::new(),
                    },
                )
            })
        })
        .collect();

    let mut opened = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.join().expect("worker panicked") {
            Ok(_) => opened += 1,
            Err(LifecycleError::InsufficientPoolBalance { .. }) => refused += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(opened, 3);
    assert_eq!(refused, 2);
    let pool = setup.pool_balance(KILN, "rice").unwrap().unwrap();
    assert_eq!(pool.balance, Mass::from_grams(5_000));
    assert_eq!(setup.kiln_batches(KILN).unwrap().len(), 3);
    assert!(setup.audit_conservation().unwrap().is_conserved());
}
