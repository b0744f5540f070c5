//! Stage-specific details recorded by farmers.

use serde::{Deserialize, Serialize};

use super::Stage;
use crate::quantity::{Quantity, VehicleType};

/// A fertilizer applied during cropping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FertilizerApplication {
    /// Opaque fertilizer reference.
    pub fertilizer_id: String,
    /// Amount applied.
    pub quantity: Quantity,
}

/// Measurements and evidence for one stage.
///
/// Recording details writes only the named stage's slice of the crop. A
/// `None` measurement leaves the stored value untouched; the evidence list
/// always replaces the stage's active evidence set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageDetails {
    /// Sowing details.
    Cropping {
        /// Seed sown.
        seed: Option<Quantity>,
        /// Fertilizers applied; replaces the previously recorded set.
        #[serde(default)]
        fertilizers: Vec<FertilizerApplication>,
        /// Media ids of cropping photos.
        #[serde(default)]
        evidence: Vec<String>,
    },
    /// Harvest details.
    Harvesting {
        /// Crop yield.
        yield_quantity: Option<Quantity>,
        /// Media ids of harvest photos.
        #[serde(default)]
        evidence: Vec<String>,
    },
    /// Sun-drying details.
    SunDrying {
        /// Media ids of drying photos.
        #[serde(default)]
        evidence: Vec<String>,
    },
    /// Transport preparation details.
    Transportation {
        /// Vehicle that will carry the biomass.
        vehicle: VehicleType,
        /// Media ids of loading photos.
        #[serde(default)]
        evidence: Vec<String>,
    },
    /// Delivery details for the biochar received.
    Distribution {
        /// Media ids of distribution photos.
        #[serde(default)]
        evidence: Vec<String>,
    },
}

impl StageDetails {
    /// Returns the stage these details belong to.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Cropping { .. } => Stage::Cropping,
            Self::Harvesting { .. } => Stage::Harvesting,
            Self::SunDrying { .. } => Stage::SunDrying,
            Self::Transportation { .. } => Stage::Transportation,
            Self::Distribution { .. } => Stage::Distribution,
        }
    }

    /// Returns the evidence media ids.
    #[must_use]
    pub fn evidence(&self) -> &[String] {
        match self {
            Self::Cropping { evidence, .. }
            | Self::Harvesting { evidence, .. }
            | Self::SunDrying { evidence }
            | Self::Transportation { evidence, .. }
            | Self::Distribution { evidence } => evidence,
        }
    }
}
