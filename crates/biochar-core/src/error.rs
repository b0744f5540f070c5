//! Error types for lifecycle and ledger operations.
//!
//! Every coordinator operation either commits in full or returns one of the
//! errors below with nothing applied. Callers that only need to know how to
//! respond (show "not ready", ask for a smaller quantity, report a fault)
//! should use [`LifecycleError::error_class`] rather than matching variants.

use std::fmt;

use thiserror::Error;

use crate::quantity::{Mass, WeightUnit};
use crate::stage::{Prerequisite, Stage};

/// Errors that can occur during lifecycle operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LifecycleError {
    /// The crop does not yet satisfy the admission rule for the transition.
    #[error("crop {crop_id} is not ready to leave {stage}: missing {}", join_prerequisites(.missing))]
    AdmissionDenied {
        /// The crop that was refused.
        crop_id: String,
        /// The stage the crop is currently in.
        stage: Stage,
        /// Every prerequisite that is not yet met.
        missing: Vec<Prerequisite>,
    },

    /// The operation requires the crop to be in a specific stage.
    #[error("crop {crop_id} is in {actual}, expected {expected}")]
    StageMismatch {
        /// The crop whose stage did not match.
        crop_id: String,
        /// The stage the operation requires.
        expected: Stage,
        /// The stage the crop is actually in.
        actual: Stage,
    },

    /// Stage details were submitted for a stage the crop cannot record yet.
    #[error("crop {crop_id} cannot record {stage} details while in {current}")]
    StageNotReached {
        /// The crop.
        crop_id: String,
        /// The stage the details belong to.
        stage: Stage,
        /// The crop's current stage.
        current: Stage,
    },

    /// A biomass pool does not hold enough biomass for the debit.
    #[error(
        "insufficient biomass in pool {kiln_id}/{crop_type_id}: requested {requested}, available {available}"
    )]
    InsufficientPoolBalance {
        /// Kiln owning the pool.
        kiln_id: String,
        /// Crop type of the pool.
        crop_type_id: String,
        /// Mass the caller asked for.
        requested: Mass,
        /// Mass currently in the pool.
        available: Mass,
    },

    /// A kiln does not hold enough biochar for the distribution.
    #[error("insufficient biochar at kiln {kiln_id}: requested {requested}, available {available}")]
    InsufficientBiocharInventory {
        /// The kiln.
        kiln_id: String,
        /// Mass the caller asked for.
        requested: Mass,
        /// Mass currently held.
        available: Mass,
    },

    /// The crop's handoff has already been verified and credited.
    #[error("handoff for crop {crop_id} has already been verified")]
    HandoffAlreadyVerified {
        /// The crop.
        crop_id: String,
    },

    /// The batch has already been completed.
    #[error("production batch {batch_id} is already completed")]
    BatchAlreadyCompleted {
        /// The batch.
        batch_id: String,
    },

    /// The crop has already received its biochar share.
    #[error("biochar for crop {crop_id} has already been recorded")]
    BiocharAlreadyRecorded {
        /// The crop.
        crop_id: String,
    },

    /// The batch belongs to a different kiln than the caller's.
    #[error("production batch {batch_id} does not belong to kiln {kiln_id}")]
    BatchKilnMismatch {
        /// The batch.
        batch_id: String,
        /// The kiln the caller acted for.
        kiln_id: String,
    },

    /// The crop is not assigned to the caller's kiln.
    #[error("crop {crop_id} is not assigned to kiln {kiln_id}")]
    CropKilnMismatch {
        /// The crop.
        crop_id: String,
        /// The kiln the caller acted for.
        kiln_id: String,
    },

    /// No crop exists with this id.
    #[error("crop not found: {crop_id}")]
    CropNotFound {
        /// The missing crop id.
        crop_id: String,
    },

    /// No production batch exists with this id.
    #[error("production batch not found: {batch_id}")]
    BatchNotFound {
        /// The missing batch id.
        batch_id: String,
    },

    /// A quantity is not a finite, positive amount.
    #[error("invalid quantity: {reason}")]
    InvalidQuantity {
        /// Why the quantity was rejected.
        reason: String,
    },

    /// An evidence list contains an empty or whitespace-only media id.
    #[error("evidence media ids must not be blank")]
    BlankMediaId,

    /// The unit has no defined mass and cannot enter a ledger.
    #[error("unit {unit} has no defined mass and cannot be credited or debited")]
    UnmeasurableUnit {
        /// The offending unit.
        unit: WeightUnit,
    },

    /// The requested transition skips or reverses the stage order.
    #[error("crop {crop_id} cannot move from {from} to {to}")]
    StageOrderViolation {
        /// The crop.
        crop_id: String,
        /// The crop's current stage.
        from: Stage,
        /// The requested stage.
        to: Stage,
    },

    /// The target stage is only reachable through a coordinated operation.
    #[error("{stage} can only be entered through {operation}")]
    CoordinatedTransitionRequired {
        /// The requested stage.
        stage: Stage,
        /// The operation that enters it.
        operation: &'static str,
    },

    /// The crop has no biomass figure to credit.
    #[error("crop {crop_id} has no biomass quantity recorded")]
    MissingBiomassQuantity {
        /// The crop.
        crop_id: String,
    },

    /// A crop cannot be registered directly into this stage.
    #[error("crops cannot be registered at {stage}")]
    InvalidInitialStage {
        /// The requested initial stage.
        stage: Stage,
    },

    /// Database error from `SQLite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The shared connection is unusable after a panic in another thread.
    #[error("store unavailable: connection lock poisoned")]
    StoreUnavailable,
}

fn join_prerequisites(missing: &[Prerequisite]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl LifecycleError {
    /// Creates a new invalid quantity error.
    #[must_use]
    pub fn invalid_quantity(reason: impl Into<String>) -> Self {
        Self::InvalidQuantity {
            reason: reason.into(),
        }
    }

    /// Creates a new crop not found error.
    #[must_use]
    pub fn crop_not_found(crop_id: impl Into<String>) -> Self {
        Self::CropNotFound {
            crop_id: crop_id.into(),
        }
    }

    /// Creates a new batch not found error.
    #[must_use]
    pub fn batch_not_found(batch_id: impl Into<String>) -> Self {
        Self::BatchNotFound {
            batch_id: batch_id.into(),
        }
    }

    /// Returns `true` if the caller can correct the request and try again.
    ///
    /// Idempotence, ownership and lookup failures will fail the same way
    /// on every retry; store failures are reported as not recoverable
    /// because nothing in the request can fix them.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self.error_class(),
            ErrorClass::AdmissionDenied
                | ErrorClass::ConservationViolation
                | ErrorClass::InvalidRequest
        )
    }

    /// Returns the error classification for this error.
    #[must_use]
    pub const fn error_class(&self) -> ErrorClass {
        match self {
            Self::AdmissionDenied { .. }
            | Self::StageMismatch { .. }
            | Self::StageNotReached { .. } => ErrorClass::AdmissionDenied,
            Self::InsufficientPoolBalance { .. } | Self::InsufficientBiocharInventory { .. } => {
                ErrorClass::ConservationViolation
            },
            Self::HandoffAlreadyVerified { .. }
            | Self::BatchAlreadyCompleted { .. }
            | Self::BiocharAlreadyRecorded { .. } => ErrorClass::IdempotenceViolation,
            Self::BatchKilnMismatch { .. } | Self::CropKilnMismatch { .. } => ErrorClass::Ownership,
            Self::CropNotFound { .. } | Self::BatchNotFound { .. } => ErrorClass::NotFound,
            Self::InvalidQuantity { .. }
            | Self::UnmeasurableUnit { .. }
            | Self::BlankMediaId
            | Self::StageOrderViolation { .. }
            | Self::CoordinatedTransitionRequired { .. }
            | Self::MissingBiomassQuantity { .. }
            | Self::InvalidInitialStage { .. } => ErrorClass::InvalidRequest,
            Self::Database(_) | Self::StoreUnavailable => ErrorClass::Store,
        }
    }
}

/// Error classification used to choose a response without matching variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Stage prerequisites are incomplete; present as "not ready".
    AdmissionDenied,
    /// A debit would take a pool or inventory below zero.
    ConservationViolation,
    /// The operation was already applied and will not be applied twice.
    IdempotenceViolation,
    /// The entity belongs to a different kiln than the caller's.
    Ownership,
    /// A referenced entity does not exist.
    NotFound,
    /// The request itself is malformed.
    InvalidRequest,
    /// The store failed; the transaction was rolled back.
    Store,
}

impl ErrorClass {
    /// Returns the stable reason code for this class.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AdmissionDenied => "admission_denied",
            Self::ConservationViolation => "conservation_violation",
            Self::IdempotenceViolation => "idempotence_violation",
            Self::Ownership => "ownership",
            Self::NotFound => "not_found",
            Self::InvalidRequest => "invalid_request",
            Self::Store => "store",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored or parsed string did not name any variant of a domain enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    /// The enum being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_admission_denied_lists_every_missing_prerequisite() {
        let err = LifecycleError::AdmissionDenied {
            crop_id: "crop-1".to_string(),
            stage: Stage::Cropping,
            missing: vec![
                Prerequisite::SeedQuantity,
                Prerequisite::Evidence(Stage::Cropping),
            ],
        };
        let message = err.to_string();
        assert!(message.contains("crop-1"));
        assert!(message.contains("seed quantity"));
        assert!(message.contains("evidence tagged cropping"));
        assert!(err.is_recoverable());
        assert_eq!(err.error_class(), ErrorClass::AdmissionDenied);
    }

    #[test]
    fn test_conservation_errors_are_recoverable() {
        let err = LifecycleError::InsufficientPoolBalance {
            kiln_id: "kiln-1".to_string(),
            crop_type_id: "rice".to_string(),
            requested: Mass::from_grams(15_000),
            available: Mass::from_grams(5_000),
        };
        assert!(err.to_string().contains("15.000 kg"));
        assert!(err.to_string().contains("5.000 kg"));
        assert!(err.is_recoverable());
        assert_eq!(err.error_class(), ErrorClass::ConservationViolation);
    }

    #[test]
    fn test_idempotence_errors_are_not_recoverable() {
        let err = LifecycleError::BatchAlreadyCompleted {
            batch_id: "batch-1".to_string(),
        };
        assert!(!err.is_recoverable());
        assert_eq!(err.error_class(), ErrorClass::IdempotenceViolation);
    }

    #[test]
    fn test_ownership_and_lookup_classes() {
        let err = LifecycleError::CropKilnMismatch {
            crop_id: "crop-1".to_string(),
            kiln_id: "kiln-2".to_string(),
        };
        assert_eq!(err.error_class(), ErrorClass::Ownership);

        let err = LifecycleError::batch_not_found("batch-9");
        assert!(err.to_string().contains("batch-9"));
        assert_eq!(err.error_class(), ErrorClass::NotFound);
    }

    #[test]
    fn test_store_errors() {
        let err = LifecycleError::from(rusqlite::Error::InvalidQuery);
        assert_eq!(err.error_class(), ErrorClass::Store);
        assert!(!err.is_recoverable());
        assert_eq!(ErrorClass::Store.to_string(), "store");
    }

    #[test]
    fn test_error_class_display() {
        assert_eq!(ErrorClass::AdmissionDenied.to_string(), "admission_denied");
        assert_eq!(
            ErrorClass::ConservationViolation.to_string(),
            "conservation_violation"
        );
        assert_eq!(ErrorClass::InvalidRequest.to_string(), "invalid_request");
    }
}
