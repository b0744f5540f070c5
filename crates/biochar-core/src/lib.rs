//! # biochar-core
//!
//! Lifecycle and ledger core for a biomass-to-biochar supply chain.
//!
//! Farm crops move through a fixed sequence of stages, from cropping to
//! biochar distribution. Between the farm and the kiln, physical mass is
//! tracked by two conserved balances:
//!
//! - a **biomass pool** per (kiln, crop type), credited when a kiln verifies
//!   a farm crop's handoff and debited when a production batch is opened;
//! - a **biochar inventory** per kiln, credited when a batch completes and
//!   debited when biochar is distributed back to a crop.
//!
//! ## Core Concepts
//!
//! - **Stage**: one step of the lifecycle; see [`stage`]
//! - **Admission**: the per-stage completeness rules gating farmer
//!   transitions; see [`stage::admission`]
//! - **Evidence**: opaque media ids attached to a crop stage or a batch,
//!   superseded rather than deleted; see [`evidence`]
//! - **Ledger**: pool and inventory balances plus their movement journal;
//!   see [`ledger`]
//!
//! All state lives in a `SQLite` store and every mutation goes through
//! [`LifecycleCoordinator`], which runs it as a single transaction.
//!
//! ## Example
//!
//! ```rust
//! use biochar_core::prelude::*;
//!
//! let coordinator = LifecycleCoordinator::in_memory().unwrap();
//! let crop = coordinator
//!     .register_crop(NewFarmCrop {
//!         farm_id: "farm-1".to_string(),
//!         farmer_id: "farmer-1".to_string(),
//!         crop_type_id: "rice".to_string(),
//!         area: None,
//!         initial_stage: Stage::Cropping,
//!         details: vec![StageDetails::Cropping {
//!             seed: Some(Quantity::kg(5.0)),
//!             fertilizers: Vec::new(),
//!             evidence: vec!["img-1".to_string()],
//!         }],
//!     })
//!     .unwrap();
//!
//! // Harvesting data is still missing.
//! let admission = coordinator.can_advance(&crop.id).unwrap();
//! assert!(!admission.is_permitted());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod batch;
pub mod config;
pub mod coordinator;
pub mod crop;
pub mod error;
pub mod evidence;
pub mod ledger;
pub mod quantity;
pub mod stage;
pub mod store;

// Re-export main types at crate root for convenience
pub use batch::{BatchEvidence, BatchStatus, CompleteBatch, OpenBatch, ProductionBatch};
pub use config::{ConfigError, LedgerConfig, LogConfig, StoreConfig};
pub use coordinator::LifecycleCoordinator;
pub use crop::{DistributeBiochar, FarmCrop, HandoffDeclaration, HandoffVerification, NewFarmCrop};
pub use error::{ErrorClass, LifecycleError, UnknownVariant};
pub use evidence::{EvidenceRecord, EvidenceSubject, MediaKind};
pub use ledger::{Account, AccountAudit, ConservationReport, Direction, LedgerEntry, PoolBalance};
pub use quantity::{Area, AreaUnit, Mass, Quantity, VehicleType, WeightUnit};
pub use stage::{
    Admission, AdmissionFacts, FertilizerApplication, Prerequisite, Stage, StageDetails,
    StageEvent,
};
pub use store::LifecycleStore;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::batch::{BatchEvidence, CompleteBatch, OpenBatch, ProductionBatch};
    pub use crate::coordinator::LifecycleCoordinator;
    pub use crate::crop::{
        DistributeBiochar, FarmCrop, HandoffDeclaration, HandoffVerification, NewFarmCrop,
    };
    pub use crate::error::{ErrorClass, LifecycleError};
    pub use crate::evidence::{EvidenceSubject, MediaKind};
    pub use crate::quantity::{Mass, Quantity, VehicleType, WeightUnit};
    pub use crate::stage::{Admission, Stage, StageDetails};
}
