//! Recorded quantities, units and exact ledger masses.
//!
//! Actors record what they measured as a [`Quantity`]: an amount in one of
//! the field units in use (`kg`, `gm`, `ton`, `sack`). Anything that enters
//! a pool, an inventory or a batch is converted to a [`Mass`], an integer
//! count of grams, so balances add and subtract exactly.
//!
//! A `sack` has no fixed mass. It is accepted for measurements that stay on
//! the crop record (seed, yield) and rejected wherever a ledger is touched.

// Gram counts are bounded by MAX_LEDGER_GRAMS, well inside f64's exact range.
#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LifecycleError, UnknownVariant};

/// Largest single mass accepted by the ledger (one million tonnes).
pub const MAX_LEDGER_GRAMS: i64 = 1_000_000_000_000;

/// Unit a weight was recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightUnit {
    /// Kilograms.
    Kg,
    /// Grams.
    Gm,
    /// Metric tonnes.
    Ton,
    /// Sacks; no defined mass.
    Sack,
}

impl WeightUnit {
    /// Returns all weight units.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Kg, Self::Gm, Self::Ton, Self::Sack]
    }

    /// Returns the unit as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Kg => "kg",
            Self::Gm => "gm",
            Self::Ton => "ton",
            Self::Sack => "sack",
        }
    }

    /// Grams in one unit, or `None` for units with no defined mass.
    #[must_use]
    pub const fn grams_per_unit(&self) -> Option<i64> {
        match self {
            Self::Kg => Some(1_000),
            Self::Gm => Some(1),
            Self::Ton => Some(1_000_000),
            Self::Sack => None,
        }
    }
}

impl fmt::Display for WeightUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WeightUnit {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|unit| unit.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("weight unit", s))
    }
}

/// Unit a field area was recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaUnit {
    /// Bigha.
    Bigha,
    /// Hectare.
    Hectare,
}

impl AreaUnit {
    /// Returns the unit as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bigha => "bigha",
            Self::Hectare => "hectare",
        }
    }
}

impl fmt::Display for AreaUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AreaUnit {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bigha" => Ok(Self::Bigha),
            "hectare" => Ok(Self::Hectare),
            other => Err(UnknownVariant::new("area unit", other)),
        }
    }
}

/// Vehicle used to move biomass from the farm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    /// Diesel vehicle.
    Diesel,
    /// Petrol vehicle.
    Petrol,
    /// Cart, bicycle or carried by hand.
    NonMotorised,
}

impl VehicleType {
    /// Returns the vehicle type as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Diesel => "diesel",
            Self::Petrol => "petrol",
            Self::NonMotorised => "non_motorised",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VehicleType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "diesel" => Ok(Self::Diesel),
            "petrol" => Ok(Self::Petrol),
            "non_motorised" => Ok(Self::NonMotorised),
            other => Err(UnknownVariant::new("vehicle type", other)),
        }
    }
}

/// A measured weight as an actor recorded it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    /// The measured amount.
    pub amount: f64,
    /// The unit the amount is expressed in.
    pub unit: WeightUnit,
}

impl Quantity {
    /// Creates a new quantity.
    #[must_use]
    pub const fn new(amount: f64, unit: WeightUnit) -> Self {
        Self { amount, unit }
    }

    /// Shorthand for a quantity in kilograms.
    #[must_use]
    pub const fn kg(amount: f64) -> Self {
        Self::new(amount, WeightUnit::Kg)
    }

    /// Checks that the amount is finite and strictly positive.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidQuantity`] otherwise.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if !self.amount.is_finite() {
            return Err(LifecycleError::invalid_quantity(format!(
                "amount {} is not a finite number",
                self.amount
            )));
        }
        if self.amount <= 0.0 {
            return Err(LifecycleError::invalid_quantity(format!(
                "amount {} must be positive",
                self.amount
            )));
        }
        Ok(())
    }

    /// Converts the quantity to an exact ledger mass, rounding to the
    /// nearest gram.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::UnmeasurableUnit`] for sacks, and
    /// [`LifecycleError::InvalidQuantity`] when the amount is invalid, rounds
    /// to zero grams, or exceeds [`MAX_LEDGER_GRAMS`].
    pub fn to_mass(&self) -> Result<Mass, LifecycleError> {
        self.validate()?;
        let per_unit = self
            .unit
            .grams_per_unit()
            .ok_or(LifecycleError::UnmeasurableUnit { unit: self.unit })?;

        let grams = (self.amount * per_unit as f64).round();
        if grams < 1.0 {
            return Err(LifecycleError::invalid_quantity(format!(
                "{self} is less than one gram"
            )));
        }
        if grams > MAX_LEDGER_GRAMS as f64 {
            return Err(LifecycleError::invalid_quantity(format!(
                "{self} exceeds the ledger limit"
            )));
        }
        Ok(Mass::from_grams(grams as i64))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.unit)
    }
}

/// A recorded field area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Area {
    /// The measured amount.
    pub amount: f64,
    /// The unit the amount is expressed in.
    pub unit: AreaUnit,
}

impl Area {
    /// Checks that the area is finite and strictly positive.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidQuantity`] otherwise.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(LifecycleError::invalid_quantity(format!(
                "area {} {} must be a positive number",
                self.amount, self.unit
            )));
        }
        Ok(())
    }
}

/// An exact mass in grams, as held by pools, inventories and batches.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Mass(i64);

impl Mass {
    /// The empty mass.
    pub const ZERO: Self = Self(0);

    /// Creates a mass from a gram count.
    #[must_use]
    pub const fn from_grams(grams: i64) -> Self {
        Self(grams)
    }

    /// Returns the mass in grams.
    #[must_use]
    pub const fn grams(&self) -> i64 {
        self.0
    }

    /// Returns `true` if the mass is strictly positive.
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Adds two masses, returning `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(grams) => Some(Self(grams)),
            None => None,
        }
    }

    /// Subtracts `other`, returning `None` if the result would be negative.
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(grams) if grams >= 0 => Some(Self(grams)),
            _ => None,
        }
    }
}

impl fmt::Display for Mass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let grams = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:03} kg", grams / 1_000, grams % 1_000)
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_kilograms_convert_exactly() {
        assert_eq!(Quantity::kg(20.0).to_mass().unwrap(), Mass::from_grams(20_000));
        assert_eq!(
            Quantity::new(2.5, WeightUnit::Ton).to_mass().unwrap(),
            Mass::from_grams(2_500_000)
        );
        assert_eq!(
            Quantity::new(750.0, WeightUnit::Gm).to_mass().unwrap(),
            Mass::from_grams(750)
        );
    }

    #[test]
    fn test_conversion_rounds_to_nearest_gram() {
        assert_eq!(Quantity::kg(0.0026).to_mass().unwrap(), Mass::from_grams(3));
        assert_eq!(Quantity::kg(1.2344).to_mass().unwrap(), Mass::from_grams(1_234));
    }

    #[test]
    fn test_sack_cannot_enter_ledger() {
        let err = Quantity::new(3.0, WeightUnit::Sack).to_mass().unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::UnmeasurableUnit {
                unit: WeightUnit::Sack
            }
        ));
        // Still a valid recorded measurement.
        assert!(Quantity::new(3.0, WeightUnit::Sack).validate().is_ok());
    }

    #[test]
    fn test_non_positive_and_non_finite_rejected() {
        for amount in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = Quantity::kg(amount).to_mass().unwrap_err();
            assert!(matches!(err, LifecycleError::InvalidQuantity { .. }), "{amount}");
        }
    }

    #[test]
    fn test_area_must_be_positive_and_finite() {
        for amount in [0.0, -3.0, f64::NAN, f64::NEG_INFINITY] {
            let area = Area {
                amount,
                unit: AreaUnit::Hectare,
            };
            assert!(matches!(
                area.validate(),
                Err(LifecycleError::InvalidQuantity { .. })
            ));
        }
        let area = Area {
            amount: 1.5,
            unit: AreaUnit::Bigha,
        };
        assert!(area.validate().is_ok());
    }

    #[test]
    fn test_sub_gram_and_oversized_rejected() {
        assert!(Quantity::new(0.4, WeightUnit::Gm).to_mass().is_err());
        assert!(Quantity::new(2_000_000.0, WeightUnit::Ton).to_mass().is_err());
    }

    #[test]
    fn test_mass_arithmetic() {
        let twenty = Mass::from_grams(20_000);
        let fifteen = Mass::from_grams(15_000);
        assert_eq!(twenty.checked_sub(fifteen), Some(Mass::from_grams(5_000)));
        assert_eq!(fifteen.checked_sub(twenty), None);
        assert_eq!(twenty.checked_add(fifteen), Some(Mass::from_grams(35_000)));
        assert_eq!(Mass::from_grams(i64::MAX).checked_add(Mass::from_grams(1)), None);
    }

    #[test]
    fn test_mass_display() {
        assert_eq!(Mass::from_grams(3_000).to_string(), "3.000 kg");
        assert_eq!(Mass::from_grams(1_234_567).to_string(), "1234.567 kg");
        assert_eq!(Mass::from_grams(-5).to_string(), "-0.005 kg");
        assert_eq!(Mass::ZERO.to_string(), "0.000 kg");
    }

    #[test]
    fn test_unit_strings_round_trip() {
        for unit in WeightUnit::all() {
            assert_eq!(unit.as_str().parse::<WeightUnit>().unwrap(), *unit);
        }
        assert_eq!(
            "non_motorised".parse::<VehicleType>().unwrap(),
            VehicleType::NonMotorised
        );
        assert!("litre".parse::<WeightUnit>().is_err());
        assert!("acre".parse::<AreaUnit>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&VehicleType::NonMotorised).unwrap();
        assert_eq!(json, "\"non_motorised\"");
        let quantity: Quantity = serde_json::from_str(r#"{"amount":5.0,"unit":"kg"}"#).unwrap();
        assert_eq!(quantity, Quantity::kg(5.0));
    }
}
