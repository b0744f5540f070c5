//! The lifecycle coordinator.
//!
//! [`LifecycleCoordinator`] is the only way to change lifecycle state. Each
//! mutation runs in one store transaction: either every row it touches
//! (crop record, stage events, evidence, pool, inventory, journal) is
//! committed, or none is.
//!
//! Farmer-side operations:
//!
//! - [`register_crop`](LifecycleCoordinator::register_crop)
//! - [`record_stage_details`](LifecycleCoordinator::record_stage_details)
//! - [`can_advance`](LifecycleCoordinator::can_advance) /
//!   [`advance`](LifecycleCoordinator::advance)
//! - [`move_to_production`](LifecycleCoordinator::move_to_production)
//!
//! Kiln-side operations:
//!
//! - [`verify_handoff`](LifecycleCoordinator::verify_handoff)
//! - [`open_batch`](LifecycleCoordinator::open_batch),
//!   [`append_batch_evidence`](LifecycleCoordinator::append_batch_evidence),
//!   [`complete_batch`](LifecycleCoordinator::complete_batch)
//! - [`distribute`](LifecycleCoordinator::distribute)
//!
//! Every refused mutation is logged at `warn` with its error class before
//! the transaction is rolled back; every committed one is logged at `info`.


use tracing::{info, warn};
use uuid::Uuid;

use crate::batch::{self, BatchEvidence, CompleteBatch, OpenBatch, ProductionBatch};
use crate::config::StoreConfig;
use crate::crop::{
    self, DistributeBiochar, FarmCrop, HandoffDeclaration, HandoffVerification, NewFarmCrop,
};
use crate::error::LifecycleError;
use crate::evidence::{self, EvidenceRecord, EvidenceSubject, MediaKind};
use crate::ledger::{self, ConservationReport, LedgerEntry, PoolBalance, inventory, pool};
use crate::quantity::Mass;
use crate::stage::{
    self, Admission, FertilizerApplication, Stage, StageDetails, StageEvent, admission,
};
use crate::store::{LifecycleStore, now_ns};

/// Returns a closure that logs a refused operation.
fn refused(operation: &'static str) -> impl Fn(&LifecycleError) {
    move |err| {
        warn!(
            operation,
            error = %err,
            class = %err.error_class(),
            "lifecycle operation refused"
        );
    }
}

/// Checks that `stage`'s details may be written while the crop is in
/// `current`: farmers fill in stages they have reached, plus the next one.
/// Once the kiln has taken the crop into production, the farm stages are
/// closed and only distribution remains writable.
fn check_recordable(crop_id: &str, current: Stage, stage: Stage) -> Result<(), LifecycleError> {
    if current >= Stage::Production && stage < Stage::Production {
        return Err(LifecycleError::StageMismatch {
            crop_id: crop_id.to_string(),
            expected: stage,
            actual: current,
        });
    }
    let furthest = current.next().unwrap_or(current);
    if stage > furthest {
        return Err(LifecycleError::StageNotReached {
            crop_id: crop_id.to_string(),
            stage,
            current,
        });
    }
    Ok(())
}

fn require_stage(crop: &FarmCrop, expected: Stage) -> Result<(), LifecycleError> {
    if crop.stage != expected {
        return Err(LifecycleError::StageMismatch {
            crop_id: crop.id.clone(),
            expected,
            actual: crop.stage,
        });
    }
    Ok(())
}

fn require_kiln(crop: &FarmCrop, kiln_id: &str) -> Result<(), LifecycleError> {
    if !crop.is_assigned_to(kiln_id) {
        return Err(LifecycleError::CropKilnMismatch {
            crop_id: crop.id.clone(),
            kiln_id: kiln_id.to_string(),
        });
    }
    Ok(())
}

/// Entry point for every lifecycle operation.
///
/// Cloning is cheap; clones share the underlying store handle.
#[derive(Debug, Clone)]
pub struct LifecycleCoordinator {
    store: LifecycleStore,
}

impl LifecycleCoordinator {
    /// Creates a coordinator over an open store.
    #[must_use]
    pub const fn new(store: LifecycleStore) -> Self {
        Self { store }
    }

    /// Opens the file store described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    pub fn open(config: &StoreConfig) -> Result<Self, LifecycleError> {
        LifecycleStore::open(config).map(Self::new)
    }

    /// Opens a private in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be initialized.
    pub fn in_memory() -> Result<Self, LifecycleError> {
        LifecycleStore::in_memory().map(Self::new)
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &LifecycleStore {
        &self.store
    }

    // ========================================================================
    // Farmer operations
    // ========================================================================

    /// Registers a crop at its initial stage, applying any details supplied
    /// with it.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidInitialStage`] unless the initial
    /// stage is cropping, harvesting or sun drying,
    /// [`LifecycleError::InvalidQuantity`] for a non-positive area, and the
    /// errors of [`Self::record_stage_details`] for each supplied detail.
    pub fn register_crop(&self, request: NewFarmCrop) -> Result<FarmCrop, LifecycleError> {
        let crop_id = Uuid::new_v4().to_string();
        let crop = self
            .store
            .write(|tx| {
                if !request.initial_stage.is_initial() {
                    return Err(LifecycleError::InvalidInitialStage {
                        stage: request.initial_stage,
                    });
                }
                if let Some(area) = &request.area {
                    area.validate()?;
                }
                let now = now_ns();
                let crop = FarmCrop::new(crop_id.clone(), &request, now);
                crop::insert(tx, &crop)?;
                stage::append_event(tx, &crop_id, crop.stage, now)?;
                for details in &request.details {
                    check_recordable(&crop_id, crop.stage, details.stage())?;
                    crop::apply_details(tx, &crop_id, details, now)?;
                }
                crop::load(tx, &crop_id)
            })
            .inspect_err(refused("register_crop"))?;

        info!(
            crop_id = %crop.id,
            farm_id = %crop.farm_id,
            crop_type_id = %crop.crop_type_id,
            stage = %crop.stage,
            "crop registered"
        );
        Ok(crop)
    }

    /// Records one stage's measurements and replaces its evidence set.
    ///
    /// Does not change the crop's stage.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::StageNotReached`] for a stage beyond the
    /// crop's next one, [`LifecycleError::StageMismatch`] for a farm stage
    /// once the crop is in production, and
    /// [`LifecycleError::InvalidQuantity`] for a bad measurement.
    pub fn record_stage_details(
        &self,
        crop_id: &str,
        details: StageDetails,
    ) -> Result<FarmCrop, LifecycleError> {
        let crop = self
            .store
            .write(|tx| {
                let crop = crop::load(tx, crop_id)?;
                check_recordable(crop_id, crop.stage, details.stage())?;
                crop::apply_details(tx, crop_id, &details, now_ns())?;
                crop::load(tx, crop_id)
            })
            .inspect_err(refused("record_stage_details"))?;

        info!(
            crop_id = %crop_id,
            stage = %details.stage(),
            evidence = details.evidence().len(),
            "stage details recorded"
        );
        Ok(crop)
    }

    /// Evaluates whether the crop may move from its current stage to the
    /// next one.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::CropNotFound`] or a store error.
    pub fn can_advance(&self, crop_id: &str) -> Result<Admission, LifecycleError> {
        self.store.read(|conn| {
            let crop = crop::load(conn, crop_id)?;
            let facts = crop::admission_facts(conn, &crop)?;
            Ok(admission::can_advance(crop.stage, &facts))
        })
    }

    /// Moves the crop into `target`, which must be the next stage and one
    /// the farmer enters directly (harvesting, sun drying, transportation).
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::StageOrderViolation`] if `target` is not
    /// the next stage, [`LifecycleError::CoordinatedTransitionRequired`] if
    /// it is entered through another operation, and
    /// [`LifecycleError::AdmissionDenied`] listing every missing
    /// prerequisite.
    pub fn advance(&self, crop_id: &str, target: Stage) -> Result<StageEvent, LifecycleError> {
        let event = self
            .store
            .write(|tx| {
                let crop = crop::load(tx, crop_id)?;
                if !crop.stage.can_transition_to(target) {
                    return Err(LifecycleError::StageOrderViolation {
                        crop_id: crop_id.to_string(),
                        from: crop.stage,
                        to: target,
                    });
                }
                if let Some(operation) = target.entered_by() {
                    return Err(LifecycleError::CoordinatedTransitionRequired {
                        stage: target,
                        operation,
                    });
                }

                let facts = crop::admission_facts(tx, &crop)?;
                match admission::can_advance(crop.stage, &facts) {
                    Admission::Permitted => {},
                    Admission::NotReady { missing } => {
                        return Err(LifecycleError::AdmissionDenied {
                            crop_id: crop_id.to_string(),
                            stage: crop.stage,
                            missing,
                        });
                    },
                    Admission::Coordinated { operation } => {
                        return Err(LifecycleError::CoordinatedTransitionRequired {
                            stage: target,
                            operation,
                        });
                    },
                    Admission::Terminal => {
                        return Err(LifecycleError::StageOrderViolation {
                            crop_id: crop_id.to_string(),
                            from: crop.stage,
                            to: target,
                        });
                    },
                }
                stage::advance(tx, crop_id, crop.stage, target, now_ns())
            })
            .inspect_err(refused("advance"))?;

        info!(crop_id = %crop_id, stage = %event.stage, seq_id = event.seq_id, "stage advanced");
        Ok(event)
    }

    /// Declares the crop's biomass on its way to a kiln, moving it from
    /// transportation to transport-farm-to-kiln.
    ///
    /// The farmer's figure becomes both the declared and the current
    /// biomass. The dispatch evidence is tagged transport-farm-to-kiln.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::StageMismatch`] unless the crop is in
    /// transportation, [`LifecycleError::AdmissionDenied`] if the transport
    /// rules are not met, and a quantity error if the biomass cannot be
    /// credited to a pool.
    pub fn move_to_production(
        &self,
        crop_id: &str,
        declaration: HandoffDeclaration,
    ) -> Result<StageEvent, LifecycleError> {
        let event = self
            .store
            .write(|tx| {
                declaration.biomass.to_mass()?;
                let crop = crop::load(tx, crop_id)?;
                require_stage(&crop, Stage::Transportation)?;

                let facts = crop::admission_facts(tx, &crop)?;
                if let Admission::NotReady { missing } =
                    admission::can_advance(crop.stage, &facts)
                {
                    return Err(LifecycleError::AdmissionDenied {
                        crop_id: crop_id.to_string(),
                        stage: crop.stage,
                        missing,
                    });
                }

                let now = now_ns();
                crop::record_declaration(tx, crop_id, &declaration, now)?;
                evidence::replace(
                    tx,
                    &EvidenceSubject::crop_stage(crop_id, Stage::TransportFarmToKiln),
                    MediaKind::Image,
                    &declaration.evidence,
                    now,
                )?;
                stage::advance(
                    tx,
                    crop_id,
                    Stage::Transportation,
                    Stage::TransportFarmToKiln,
                    now,
                )
            })
            .inspect_err(refused("move_to_production"))?;

        info!(
            crop_id = %crop_id,
            kiln_id = %declaration.kiln_id,
            biomass = %declaration.biomass,
            "biomass declared for kiln handoff"
        );
        Ok(event)
    }

    // ========================================================================
    // Kiln operations
    // ========================================================================

    /// Confirms receipt of a crop's biomass and credits the kiln's pool for
    /// the crop type.
    ///
    /// The operator's figure, when given, replaces the farmer's as the
    /// biomass of record; the farmer's declared figure is kept.
    ///
    /// # Errors
    ///
    /// Checked in order: [`LifecycleError::CropNotFound`],
    /// [`LifecycleError::CropKilnMismatch`],
    /// [`LifecycleError::HandoffAlreadyVerified`],
    /// [`LifecycleError::StageMismatch`],
    /// [`LifecycleError::AdmissionDenied`], then quantity errors.
    pub fn verify_handoff(
        &self,
        kiln_id: &str,
        crop_id: &str,
        verification: HandoffVerification,
    ) -> Result<PoolBalance, LifecycleError> {
        let (pool, credited) = self
            .store
            .write(|tx| {
                let crop = crop::load(tx, crop_id)?;
                require_kiln(&crop, kiln_id)?;
                if crop.biomass_verified {
                    return Err(LifecycleError::HandoffAlreadyVerified {
                        crop_id: crop_id.to_string(),
                    });
                }
                require_stage(&crop, Stage::TransportFarmToKiln)?;

                let facts = crop::admission_facts(tx, &crop)?;
                let missing = admission::unmet(Stage::TransportFarmToKiln, &facts);
                if !missing.is_empty() {
                    return Err(LifecycleError::AdmissionDenied {
                        crop_id: crop_id.to_string(),
                        stage: crop.stage,
                        missing,
                    });
                }

                let biomass = verification.biomass.or(crop.biomass).ok_or_else(|| {
                    LifecycleError::MissingBiomassQuantity {
                        crop_id: crop_id.to_string(),
                    }
                })?;
                let mass = biomass.to_mass()?;

                let now = now_ns();
                crop::record_verification(tx, crop_id, kiln_id, biomass, now)?;
                if !verification.evidence.is_empty() {
                    evidence::replace(
                        tx,
                        &EvidenceSubject::crop_stage(crop_id, Stage::TransportFarmToKiln),
                        MediaKind::Image,
                        &verification.evidence,
                        now,
                    )?;
                }
                let pool = pool::credit(tx, kiln_id, &crop.crop_type_id, mass, crop_id, now)?;
                stage::advance(
                    tx,
                    crop_id,
                    Stage::TransportFarmToKiln,
                    Stage::Production,
                    now,
                )?;
                Ok((pool, mass))
            })
            .inspect_err(refused("verify_handoff"))?;

        info!(
            crop_id = %crop_id,
            kiln_id = %kiln_id,
            crop_type_id = %pool.crop_type_id,
            credited = %credited,
            balance = %pool.balance,
            "handoff verified, pool credited"
        );
        Ok(pool)
    }

    /// Opens a production batch, drawing its biomass from the kiln's pool.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InsufficientPoolBalance`], with nothing
    /// applied, if the pool holds less than requested, and a quantity error
    /// if the biomass cannot be converted to a mass.
    pub fn open_batch(
        &self,
        kiln_id: &str,
        request: OpenBatch,
    ) -> Result<ProductionBatch, LifecycleError> {
        let batch_id = Uuid::new_v4().to_string();
        let (batch, pool) = self
            .store
            .write(|tx| {
                let mass = request.biomass.to_mass()?;
                let now = now_ns();
                let pool =
                    pool::debit(tx, kiln_id, &request.crop_type_id, mass, &batch_id, now)?;
                let batch = ProductionBatch {
                    id: batch_id.clone(),
                    kiln_id: kiln_id.to_string(),
                    crop_type_id: request.crop_type_id.clone(),
                    biomass: mass,
                    biochar: None,
                    started_at_ns: now,
                    ended_at_ns: None,
                };
                batch::insert(tx, &batch)?;
                batch::replace_evidence(
                    tx,
                    &batch_id,
                    Some(request.images.as_slice()),
                    Some(request.videos.as_slice()),
                    now,
                )?;
                Ok((batch, pool))
            })
            .inspect_err(refused("open_batch"))?;

        info!(
            batch_id = %batch.id,
            kiln_id = %kiln_id,
            crop_type_id = %batch.crop_type_id,
            biomass = %batch.biomass,
            pool_balance = %pool.balance,
            "production batch opened"
        );
        Ok(batch)
    }

    /// Replaces an open batch's image or video set.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::BatchKilnMismatch`] if the batch belongs
    /// to another kiln and [`LifecycleError::BatchAlreadyCompleted`] once
    /// it is completed.
    pub fn append_batch_evidence(
        &self,
        kiln_id: &str,
        batch_id: &str,
        evidence: BatchEvidence,
    ) -> Result<ProductionBatch, LifecycleError> {
        let batch = self
            .store
            .write(|tx| {
                let batch = batch::load_owned(tx, kiln_id, batch_id)?;
                if batch.is_completed() {
                    return Err(LifecycleError::BatchAlreadyCompleted {
                        batch_id: batch_id.to_string(),
                    });
                }
                batch::replace_evidence(
                    tx,
                    batch_id,
                    evidence.images.as_deref(),
                    evidence.videos.as_deref(),
                    now_ns(),
                )?;
                Ok(batch)
            })
            .inspect_err(refused("append_batch_evidence"))?;

        info!(batch_id = %batch_id, kiln_id = %kiln_id, "batch evidence replaced");
        Ok(batch)
    }

    /// Completes a batch and credits its biochar to the kiln's inventory.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::BatchKilnMismatch`] if the batch belongs
    /// to another kiln, [`LifecycleError::BatchAlreadyCompleted`] on a
    /// second completion (whatever quantity it carries), and a quantity
    /// error for the biochar.
    pub fn complete_batch(
        &self,
        kiln_id: &str,
        batch_id: &str,
        request: CompleteBatch,
    ) -> Result<ProductionBatch, LifecycleError> {
        let (batch, inventory) = self
            .store
            .write(|tx| {
                let batch = batch::load_owned(tx, kiln_id, batch_id)?;
                if batch.is_completed() {
                    return Err(LifecycleError::BatchAlreadyCompleted {
                        batch_id: batch_id.to_string(),
                    });
                }
                let mass = request.biochar.to_mass()?;
                let now = now_ns();
                batch::mark_completed(tx, batch_id, mass, now)?;
                batch::replace_evidence(
                    tx,
                    batch_id,
                    request.evidence.images.as_deref(),
                    request.evidence.videos.as_deref(),
                    now,
                )?;
                let inventory = inventory::credit(tx, kiln_id, mass, batch_id, now)?;
                Ok((batch::load(tx, batch_id)?, inventory))
            })
            .inspect_err(refused("complete_batch"))?;

        info!(
            batch_id = %batch_id,
            kiln_id = %kiln_id,
            biochar = %request.biochar,
            inventory = %inventory,
            "production batch completed, inventory credited"
        );
        Ok(batch)
    }

    /// Hands biochar from the kiln's inventory to a crop, moving the crop
    /// through transport-kiln-to-farm into distribution.
    ///
    /// The handover evidence is tagged transport-kiln-to-farm; the farmer
    /// records distribution's own evidence afterwards.
    ///
    /// # Errors
    ///
    /// Checked in order: [`LifecycleError::CropNotFound`],
    /// [`LifecycleError::CropKilnMismatch`],
    /// [`LifecycleError::BiocharAlreadyRecorded`],
    /// [`LifecycleError::StageMismatch`], quantity errors, then
    /// [`LifecycleError::InsufficientBiocharInventory`].
    pub fn distribute(
        &self,
        kiln_id: &str,
        crop_id: &str,
        request: DistributeBiochar,
    ) -> Result<FarmCrop, LifecycleError> {
        let (crop, inventory) = self
            .store
            .write(|tx| {
                let crop = crop::load(tx, crop_id)?;
                require_kiln(&crop, kiln_id)?;
                if crop.biochar.is_some() {
                    return Err(LifecycleError::BiocharAlreadyRecorded {
                        crop_id: crop_id.to_string(),
                    });
                }
                require_stage(&crop, Stage::Production)?;
                let mass = request.biochar.to_mass()?;

                let now = now_ns();
                let inventory = inventory::debit(tx, kiln_id, mass, crop_id, now)?;
                crop::record_biochar(tx, crop_id, request.biochar, now)?;
                evidence::replace(
                    tx,
                    &EvidenceSubject::crop_stage(crop_id, Stage::TransportKilnToFarm),
                    MediaKind::Image,
                    &request.evidence,
                    now,
                )?;
                stage::advance(
                    tx,
                    crop_id,
                    Stage::Production,
                    Stage::TransportKilnToFarm,
                    now,
                )?;
                stage::advance(
                    tx,
                    crop_id,
                    Stage::TransportKilnToFarm,
                    Stage::Distribution,
                    now,
                )?;
                Ok((crop::load(tx, crop_id)?, inventory))
            })
            .inspect_err(refused("distribute"))?;

        info!(
            crop_id = %crop_id,
            kiln_id = %kiln_id,
            biochar = %request.biochar,
            inventory = %inventory,
            "biochar distributed"
        );
        Ok(crop)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Returns a crop.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::CropNotFound`] or a store error.
    pub fn crop(&self, crop_id: &str) -> Result<FarmCrop, LifecycleError> {
        self.store.read(|conn| crop::load(conn, crop_id))
    }

    /// Returns a crop's current fertilizer applications.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::CropNotFound`] or a store error.
    pub fn fertilizers(&self, crop_id: &str) -> Result<Vec<FertilizerApplication>, LifecycleError> {
        self.store.read(|conn| {
            crop::load(conn, crop_id)?;
            crop::fertilizers(conn, crop_id)
        })
    }

    /// Returns a crop's stage events in commit order.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::CropNotFound`] or a store error.
    pub fn stage_history(&self, crop_id: &str) -> Result<Vec<StageEvent>, LifecycleError> {
        self.store.read(|conn| {
            crop::load(conn, crop_id)?;
            stage::history(conn, crop_id)
        })
    }

    /// Returns the active evidence of one kind for a crop stage or batch.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn evidence(
        &self,
        subject: &EvidenceSubject,
        kind: MediaKind,
    ) -> Result<Vec<EvidenceRecord>, LifecycleError> {
        self.store
            .read(|conn| evidence::active(conn, subject, kind))
    }

    /// Returns every evidence record of one kind for a crop stage or batch,
    /// superseded ones included.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn evidence_history(
        &self,
        subject: &EvidenceSubject,
        kind: MediaKind,
    ) -> Result<Vec<EvidenceRecord>, LifecycleError> {
        self.store
            .read(|conn| evidence::history(conn, subject, kind))
    }

    /// Returns a pool balance, or `None` if the pool has never been
    /// credited.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn pool_balance(
        &self,
        kiln_id: &str,
        crop_type_id: &str,
    ) -> Result<Option<PoolBalance>, LifecycleError> {
        self.store
            .read(|conn| pool::balance(conn, kiln_id, crop_type_id))
    }

    /// Returns every pool at a kiln.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn kiln_pools(&self, kiln_id: &str) -> Result<Vec<PoolBalance>, LifecycleError> {
        self.store.read(|conn| pool::for_kiln(conn, kiln_id))
    }

    /// Returns a kiln's biochar inventory; zero if it has never completed a
    /// batch.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn biochar_inventory(&self, kiln_id: &str) -> Result<Mass, LifecycleError> {
        self.store.read(|conn| inventory::balance(conn, kiln_id))
    }

    /// Returns a batch.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::BatchNotFound`] or a store error.
    pub fn batch(&self, batch_id: &str) -> Result<ProductionBatch, LifecycleError> {
        self.store.read(|conn| batch::load(conn, batch_id))
    }

    /// Returns a kiln's batches, newest first.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn kiln_batches(&self, kiln_id: &str) -> Result<Vec<ProductionBatch>, LifecycleError> {
        self.store.read(|conn| batch::for_kiln(conn, kiln_id))
    }

    /// Returns crops on their way to a kiln that it has not verified yet.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn pending_handoffs(&self, kiln_id: &str) -> Result<Vec<FarmCrop>, LifecycleError> {
        self.store
            .read(|conn| crop::pending_for_kiln(conn, kiln_id))
    }

    /// Returns crops that received biochar from a kiln.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn distributed_crops(&self, kiln_id: &str) -> Result<Vec<FarmCrop>, LifecycleError> {
        self.store
            .read(|conn| crop::distributed_for_kiln(conn, kiln_id))
    }

    /// Returns a kiln's ledger journal in commit order.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn ledger_entries(&self, kiln_id: &str) -> Result<Vec<LedgerEntry>, LifecycleError> {
        self.store
            .read(|conn| ledger::entries_for_kiln(conn, kiln_id))
    }

    /// Recomputes every pool and inventory balance from the journal and
    /// compares it with the stored balance.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn audit_conservation(&self) -> Result<ConservationReport, LifecycleError> {
        let report = self.store.read(ledger::audit)?;
        for account in report.discrepancies() {
            warn!(
                account = %account.account,
                kiln_id = %account.kiln_id,
                crop_type_id = ?account.crop_type_id,
                stored = %account.stored,
                journal = %account.journal,
                "ledger balance disagrees with journal"
            );
        }
        Ok(report)
    }
}
