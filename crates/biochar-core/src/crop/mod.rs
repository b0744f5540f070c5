//! Farm crop records.
//!
//! A farm crop is one planting of one crop type on one farm. Farmer-side
//! operations fill in its stage details up to the handoff; kiln-side
//! operations record the verified biomass and, finally, the biochar share
//! it receives. The current stage is cached here and kept in step with the
//! stage-event history by [`crate::stage::advance`].

#![allow(clippy::cast_sign_loss)]

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;
use crate::evidence::{self, EvidenceSubject, MediaKind};
use crate::quantity::{Area, AreaUnit, Quantity, VehicleType, WeightUnit};
use crate::stage::{AdmissionFacts, FertilizerApplication, Stage, StageDetails};

/// A farm crop and everything recorded about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmCrop {
    /// Crop id (UUID v4).
    pub id: String,
    /// Owning farm.
    pub farm_id: String,
    /// Owning farmer.
    pub farmer_id: String,
    /// Crop type; selects the kiln pool the biomass joins.
    pub crop_type_id: String,
    /// Area planted.
    pub area: Option<Area>,
    /// Current stage (cached from the stage history).
    pub stage: Stage,
    /// Seed sown.
    pub seed: Option<Quantity>,
    /// Harvest yield.
    pub yield_quantity: Option<Quantity>,
    /// Biomass as declared by the farmer at move-to-production; never
    /// overwritten afterwards.
    pub declared_biomass: Option<Quantity>,
    /// Biomass of record: the farmer's figure until the kiln verifies it,
    /// the operator's figure afterwards.
    pub biomass: Option<Quantity>,
    /// Biochar received at distribution; written once.
    pub biochar: Option<Quantity>,
    /// Transport vehicle.
    pub vehicle: Option<VehicleType>,
    /// Kiln the biomass was sent to.
    pub kiln_id: Option<String>,
    /// Whether the kiln has verified the handoff and credited its pool.
    pub biomass_verified: bool,
    /// When the crop was registered.
    pub created_at_ns: u64,
    /// When the crop was last changed.
    pub updated_at_ns: u64,
}

/// Request to register a crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFarmCrop {
    /// Owning farm.
    pub farm_id: String,
    /// Owning farmer.
    pub farmer_id: String,
    /// Crop type.
    pub crop_type_id: String,
    /// Area planted.
    #[serde(default)]
    pub area: Option<Area>,
    /// Stage to register the crop at: cropping, harvesting or sun drying.
    #[serde(default)]
    pub initial_stage: Stage,
    /// Details for stages up to the initial stage.
    #[serde(default)]
    pub details: Vec<StageDetails>,
}

/// Farmer's declaration that the biomass is on its way to a kiln.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffDeclaration {
    /// Destination kiln.
    pub kiln_id: String,
    /// Biomass sent, as the farmer measured it.
    pub biomass: Quantity,
    /// Media ids of dispatch photos.
    #[serde(default)]
    pub evidence: Vec<String>,
}

/// Kiln operator's confirmation that the biomass arrived.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoffVerification {
    /// Biomass received as the operator measured it; `None` accepts the
    /// farmer's figure.
    #[serde(default)]
    pub biomass: Option<Quantity>,
    /// Media ids of receipt photos; replaces the dispatch photos when given.
    #[serde(default)]
    pub evidence: Vec<String>,
}

/// Kiln operator's handover of biochar to a crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributeBiochar {
    /// Biochar handed over.
    pub biochar: Quantity,
    /// Media ids of handover photos.
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl FarmCrop {
    pub(crate) fn new(id: String, request: &NewFarmCrop, now_ns: u64) -> Self {
        Self {
            id,
            farm_id: request.farm_id.clone(),
            farmer_id: request.farmer_id.clone(),
            crop_type_id: request.crop_type_id.clone(),
            area: request.area,
            stage: request.initial_stage,
            seed: None,
            yield_quantity: None,
            declared_biomass: None,
            biomass: None,
            biochar: None,
            vehicle: None,
            kiln_id: None,
            biomass_verified: false,
            created_at_ns: now_ns,
            updated_at_ns: now_ns,
        }
    }

    /// Returns `true` if the crop was sent to `kiln_id`.
    #[must_use]
    pub fn is_assigned_to(&self, kiln_id: &str) -> bool {
        self.kiln_id.as_deref() == Some(kiln_id)
    }
}

fn quantity(amount: Option<f64>, unit: Option<WeightUnit>) -> Option<Quantity> {
    match (amount, unit) {
        (Some(amount), Some(unit)) => Some(Quantity::new(amount, unit)),
        _ => None,
    }
}

const SELECT_CROP: &str = "SELECT id, farm_id, farmer_id, crop_type_id, area, area_unit, stage,
            seed_quantity, seed_quantity_unit, yield_quantity, yield_quantity_unit,
            declared_biomass_quantity, declared_biomass_unit,
            biomass_quantity, biomass_quantity_unit,
            biochar_quantity, biochar_quantity_unit,
            vehicle_type, kiln_id, biomass_verified, created_at_ns, updated_at_ns
     FROM farm_crops";

fn map_crop(row: &rusqlite::Row<'_>) -> rusqlite::Result<FarmCrop> {
    let area = match (row.get::<_, Option<f64>>(4)?, row.get::<_, Option<AreaUnit>>(5)?) {
        (Some(amount), Some(unit)) => Some(Area { amount, unit }),
        _ => None,
    };
    Ok(FarmCrop {
        id: row.get(0)?,
        farm_id: row.get(1)?,
        farmer_id: row.get(2)?,
        crop_type_id: row.get(3)?,
        area,
        stage: row.get(6)?,
        seed: quantity(row.get(7)?, row.get(8)?),
        yield_quantity: quantity(row.get(9)?, row.get(10)?),
        declared_biomass: quantity(row.get(11)?, row.get(12)?),
        biomass: quantity(row.get(13)?, row.get(14)?),
        biochar: quantity(row.get(15)?, row.get(16)?),
        vehicle: row.get(17)?,
        kiln_id: row.get(18)?,
        biomass_verified: row.get(19)?,
        created_at_ns: row.get::<_, i64>(20)? as u64,
        updated_at_ns: row.get::<_, i64>(21)? as u64,
    })
}

pub(crate) fn insert(conn: &Connection, crop: &FarmCrop) -> Result<(), LifecycleError> {
    conn.execute(
        "INSERT INTO farm_crops (id, farm_id, farmer_id, crop_type_id, area, area_unit, stage,
                                 created_at_ns, updated_at_ns)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            crop.id,
            crop.farm_id,
            crop.farmer_id,
            crop.crop_type_id,
            crop.area.map(|a| a.amount),
            crop.area.map(|a| a.unit),
            crop.stage,
            crop.created_at_ns,
            crop.updated_at_ns
        ],
    )?;
    Ok(())
}

/// Loads a crop by id.
pub(crate) fn load(conn: &Connection, crop_id: &str) -> Result<FarmCrop, LifecycleError> {
    conn.query_row(&format!("{SELECT_CROP} WHERE id = ?1"), [crop_id], map_crop)
        .optional()?
        .ok_or_else(|| LifecycleError::crop_not_found(crop_id))
}

/// Crops sent to a kiln and still waiting for verification.
pub(crate) fn pending_for_kiln(
    conn: &Connection,
    kiln_id: &str,
) -> Result<Vec<FarmCrop>, LifecycleError> {
    list(
        conn,
        &format!(
            "{SELECT_CROP} WHERE kiln_id = ?1 AND stage = 'transport_farm_to_kiln'
             AND biomass_verified = 0 ORDER BY updated_at_ns ASC"
        ),
        kiln_id,
    )
}

/// Crops that have received biochar from a kiln.
pub(crate) fn distributed_for_kiln(
    conn: &Connection,
    kiln_id: &str,
) -> Result<Vec<FarmCrop>, LifecycleError> {
    list(
        conn,
        &format!(
            "{SELECT_CROP} WHERE kiln_id = ?1 AND biochar_quantity IS NOT NULL
             ORDER BY updated_at_ns DESC"
        ),
        kiln_id,
    )
}

fn list(conn: &Connection, sql: &str, kiln_id: &str) -> Result<Vec<FarmCrop>, LifecycleError> {
    let mut stmt = conn.prepare(sql)?;
    let crops = stmt
        .query_map([kiln_id], map_crop)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(crops)
}

/// Collects what the admission rules need to know about a crop.
pub(crate) fn admission_facts(
    conn: &Connection,
    crop: &FarmCrop,
) -> Result<AdmissionFacts, LifecycleError> {
    Ok(AdmissionFacts {
        seed_recorded: crop.seed.is_some(),
        yield_recorded: crop.yield_quantity.is_some(),
        vehicle_recorded: crop.vehicle.is_some(),
        evidence_stages: evidence::crop_stages_with_evidence(conn, &crop.id)?,
    })
}

/// Writes one stage's details and replaces its evidence set.
pub(crate) fn apply_details(
    conn: &Connection,
    crop_id: &str,
    details: &StageDetails,
    now_ns: u64,
) -> Result<(), LifecycleError> {
    match details {
        StageDetails::Cropping {
            seed, fertilizers, ..
        } => {
            if let Some(seed) = seed {
                seed.validate()?;
                conn.execute(
                    "UPDATE farm_crops SET seed_quantity = ?2, seed_quantity_unit = ?3 WHERE id = ?1",
                    params![crop_id, seed.amount, seed.unit],
                )?;
            }
            replace_fertilizers(conn, crop_id, fertilizers, now_ns)?;
        },
        StageDetails::Harvesting { yield_quantity, .. } => {
            if let Some(yield_quantity) = yield_quantity {
                yield_quantity.validate()?;
                conn.execute(
                    "UPDATE farm_crops SET yield_quantity = ?2, yield_quantity_unit = ?3 WHERE id = ?1",
                    params![crop_id, yield_quantity.amount, yield_quantity.unit],
                )?;
            }
        },
        StageDetails::Transportation { vehicle, .. } => {
            conn.execute(
                "UPDATE farm_crops SET vehicle_type = ?2 WHERE id = ?1",
                params![crop_id, vehicle],
            )?;
        },
        StageDetails::SunDrying { .. } | StageDetails::Distribution { .. } => {},
    }

    evidence::replace(
        conn,
        &EvidenceSubject::crop_stage(crop_id, details.stage()),
        MediaKind::Image,
        details.evidence(),
        now_ns,
    )?;
    touch(conn, crop_id, now_ns)
}

fn replace_fertilizers(
    conn: &Connection,
    crop_id: &str,
    fertilizers: &[FertilizerApplication],
    now_ns: u64,
) -> Result<(), LifecycleError> {
    for fertilizer in fertilizers {
        fertilizer.quantity.validate()?;
    }
    conn.execute(
        "UPDATE fertilizer_applications SET superseded_at_ns = ?2
         WHERE farm_crop_id = ?1 AND superseded_at_ns IS NULL",
        params![crop_id, now_ns],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO fertilizer_applications
         (farm_crop_id, fertilizer_id, quantity, quantity_unit, recorded_at_ns)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for fertilizer in fertilizers {
        stmt.execute(params![
            crop_id,
            fertilizer.fertilizer_id,
            fertilizer.quantity.amount,
            fertilizer.quantity.unit,
            now_ns
        ])?;
    }
    Ok(())
}

/// Returns the crop's current fertilizer applications.
pub(crate) fn fertilizers(
    conn: &Connection,
    crop_id: &str,
) -> Result<Vec<FertilizerApplication>, LifecycleError> {
    let mut stmt = conn.prepare(
        "SELECT fertilizer_id, quantity, quantity_unit FROM fertilizer_applications
         WHERE farm_crop_id = ?1 AND superseded_at_ns IS NULL
         ORDER BY id ASC",
    )?;
    let applications = stmt
        .query_map([crop_id], |row| {
            Ok(FertilizerApplication {
                fertilizer_id: row.get(0)?,
                quantity: Quantity::new(row.get(1)?, row.get(2)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(applications)
}

/// Records the farmer's declared biomass and destination kiln.
pub(crate) fn record_declaration(
    conn: &Connection,
    crop_id: &str,
    declaration: &HandoffDeclaration,
    now_ns: u64,
) -> Result<(), LifecycleError> {
    let biomass = declaration.biomass;
    conn.execute(
        "UPDATE farm_crops
         SET declared_biomass_quantity = ?2, declared_biomass_unit = ?3,
             biomass_quantity = ?2, biomass_quantity_unit = ?3,
             kiln_id = ?4, updated_at_ns = ?5
         WHERE id = ?1",
        params![crop_id, biomass.amount, biomass.unit, declaration.kiln_id, now_ns],
    )?;
    Ok(())
}

/// Records the verified biomass of record and sets the verified flag.
///
/// Only an unverified crop is updated; a verified one yields
/// [`LifecycleError::HandoffAlreadyVerified`].
pub(crate) fn record_verification(
    conn: &Connection,
    crop_id: &str,
    kiln_id: &str,
    biomass: Quantity,
    now_ns: u64,
) -> Result<(), LifecycleError> {
    let updated = conn.execute(
        "UPDATE farm_crops
         SET biomass_quantity = ?2, biomass_quantity_unit = ?3, biomass_verified = 1,
             kiln_id = ?4, updated_at_ns = ?5
         WHERE id = ?1 AND biomass_verified = 0",
        params![crop_id, biomass.amount, biomass.unit, kiln_id, now_ns],
    )?;
    if updated == 0 {
        return Err(LifecycleError::HandoffAlreadyVerified {
            crop_id: crop_id.to_string(),
        });
    }
    Ok(())
}

/// Records the crop's biochar share.
///
/// Only the first write succeeds; later ones yield
/// [`LifecycleError::BiocharAlreadyRecorded`].
pub(crate) fn record_biochar(
    conn: &Connection,
    crop_id: &str,
    biochar: Quantity,
    now_ns: u64,
) -> Result<(), LifecycleError> {
    let updated = conn.execute(
        "UPDATE farm_crops
         SET biochar_quantity = ?2, biochar_quantity_unit = ?3, updated_at_ns = ?4
         WHERE id = ?1 AND biochar_quantity IS NULL",
        params![crop_id, biochar.amount, biochar.unit, now_ns],
    )?;
    if updated == 0 {
        return Err(LifecycleError::BiocharAlreadyRecorded {
            crop_id: crop_id.to_string(),
        });
    }
    Ok(())
}

fn touch(conn: &Connection, crop_id: &str, now_ns: u64) -> Result<(), LifecycleError> {
    conn.execute(
        "UPDATE farm_crops SET updated_at_ns = ?2 WHERE id = ?1",
        params![crop_id, now_ns],
    )?;
    Ok(())
}
