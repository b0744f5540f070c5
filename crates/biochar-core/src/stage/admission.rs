//! Stage admission rules.
//!
//! Each stage that farmers work through directly has a completeness rule: a
//! list of [`Prerequisite`]s that must hold before the crop may leave the
//! stage, and that the crop must also meet to enter it. A transition from
//! `S` to its successor `T` is admitted when the rules of both `S` and `T`
//! hold, where they exist.
//!
//! | Stage                 | Prerequisites                                   |
//! |-----------------------|-------------------------------------------------|
//! | `Cropping`            | seed quantity, cropping evidence                |
//! | `Harvesting`          | seed and yield quantity, harvesting evidence    |
//! | `SunDrying`           | seed and yield quantity, sun-drying evidence    |
//! | `Transportation`      | vehicle type, transportation evidence           |
//! | `TransportFarmToKiln` | vehicle type, transportation evidence           |
//!
//! Stages after the farm-to-kiln handoff have no rule: they are only
//! entered through coordinated operations, each with its own gate.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::Stage;

/// A single condition an admission rule checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "stage", rename_all = "snake_case")]
pub enum Prerequisite {
    /// A seed quantity has been recorded.
    SeedQuantity,
    /// A yield quantity has been recorded.
    YieldQuantity,
    /// A transport vehicle type has been recorded.
    VehicleType,
    /// At least one active evidence item is tagged with the stage.
    Evidence(Stage),
}

impl Prerequisite {
    /// Returns `true` if the facts satisfy this prerequisite.
    #[must_use]
    pub fn is_met(&self, facts: &AdmissionFacts) -> bool {
        match self {
            Self::SeedQuantity => facts.seed_recorded,
            Self::YieldQuantity => facts.yield_recorded,
            Self::VehicleType => facts.vehicle_recorded,
            Self::Evidence(stage) => facts.evidence_stages.contains(stage),
        }
    }
}

impl fmt::Display for Prerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SeedQuantity => write!(f, "seed quantity"),
            Self::YieldQuantity => write!(f, "yield quantity"),
            Self::VehicleType => write!(f, "vehicle type"),
            Self::Evidence(stage) => write!(f, "evidence tagged {stage}"),
        }
    }
}

/// Completeness rules, in stage order.
const RULES: [(Stage, &[Prerequisite]); 5] = [
    (
        Stage::Cropping,
        &[
            Prerequisite::SeedQuantity,
            Prerequisite::Evidence(Stage::Cropping),
        ],
    ),
    (
        Stage::Harvesting,
        &[
            Prerequisite::SeedQuantity,
            Prerequisite::YieldQuantity,
            Prerequisite::Evidence(Stage::Harvesting),
        ],
    ),
    (
        Stage::SunDrying,
        &[
            Prerequisite::SeedQuantity,
            Prerequisite::YieldQuantity,
            Prerequisite::Evidence(Stage::SunDrying),
        ],
    ),
    (
        Stage::Transportation,
        &[
            Prerequisite::VehicleType,
            Prerequisite::Evidence(Stage::Transportation),
        ],
    ),
    (
        Stage::TransportFarmToKiln,
        &[
            Prerequisite::VehicleType,
            Prerequisite::Evidence(Stage::Transportation),
        ],
    ),
];

/// Returns the completeness rule for a stage, if it has one.
#[must_use]
pub fn rule_for(stage: Stage) -> Option<&'static [Prerequisite]> {
    RULES
        .iter()
        .find(|(ruled, _)| *ruled == stage)
        .map(|(_, prerequisites)| *prerequisites)
}

/// Returns the prerequisites of `stage`'s own rule that `facts` leave unmet.
///
/// A stage without a rule has nothing unmet.
#[must_use]
pub fn unmet(stage: Stage, facts: &AdmissionFacts) -> Vec<Prerequisite> {
    rule_for(stage)
        .unwrap_or_default()
        .iter()
        .filter(|prerequisite| !prerequisite.is_met(facts))
        .copied()
        .collect()
}

/// What is known about a crop when its admission is evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionFacts {
    /// A seed quantity is recorded.
    pub seed_recorded: bool,
    /// A yield quantity is recorded.
    pub yield_recorded: bool,
    /// A vehicle type is recorded.
    pub vehicle_recorded: bool,
    /// Stages that have at least one active evidence item.
    pub evidence_stages: BTreeSet<Stage>,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Admission {
    /// The transition may be taken.
    Permitted,
    /// Prerequisites are missing; the crop is not ready.
    NotReady {
        /// Every unmet prerequisite, without duplicates.
        missing: Vec<Prerequisite>,
    },
    /// Nothing is missing, but the successor is entered only through the
    /// named coordinated operation rather than a plain advance.
    Coordinated {
        /// The operation that performs the transition.
        operation: &'static str,
    },
    /// The crop is in the terminal stage.
    Terminal,
}

impl Admission {
    /// Returns `true` if the transition may be taken.
    #[must_use]
    pub const fn is_permitted(&self) -> bool {
        matches!(self, Self::Permitted)
    }
}

/// Evaluates the transition out of `from` into its successor.
///
/// Missing prerequisites are reported first. When nothing is missing, a
/// successor entered through a coordinated operation is reported as
/// [`Admission::Coordinated`] so the verdict matches what a plain advance
/// would do.
#[must_use]
pub fn can_advance(from: Stage, facts: &AdmissionFacts) -> Admission {
    let Some(to) = from.next() else {
        return Admission::Terminal;
    };

    if rule_for(from).is_none() && rule_for(to).is_none() {
        return Admission::Coordinated {
            operation: to.entered_by().unwrap_or("advance"),
        };
    }

    let mut missing: Vec<Prerequisite> = Vec::new();
    let required = rule_for(from)
        .into_iter()
        .chain(rule_for(to))
        .flatten();
    for prerequisite in required {
        if !prerequisite.is_met(facts) && !missing.contains(prerequisite) {
            missing.push(*prerequisite);
        }
    }

    if !missing.is_empty() {
        return Admission::NotReady { missing };
    }
    match to.entered_by() {
        Some(operation) => Admission::Coordinated { operation },
        None => Admission::Permitted,
    }
}
