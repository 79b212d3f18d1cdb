//! Delivery platform price propagation
//!
//! Each third-party delivery platform takes a commission, so the price shown
//! there is the restaurant's base price inflated by a fixed multiplier. The
//! multipliers are business configuration held in a [`MarkupTable`].
//!
//! All arithmetic is done in [`Decimal`]; prices only become binary floats at
//! the document store boundary (see [`decimal_to_json`]).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// Third-party delivery platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    DoorDash,
    UberEats,
    GrubHub,
}

impl Platform {
    /// Every platform, in display order
    pub const ALL: [Platform; 3] = [Platform::DoorDash, Platform::UberEats, Platform::GrubHub];

    /// Identifier used as the key inside `platformPricing`
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::DoorDash => "doordash",
            Platform::UberEats => "ubereats",
            Platform::GrubHub => "grubhub",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "doordash" => Ok(Platform::DoorDash),
            "ubereats" => Ok(Platform::UberEats),
            "grubhub" => Ok(Platform::GrubHub),
            other => Err(Error::invalid(format!("unknown platform: {}", other))),
        }
    }
}

/// Round to currency precision, half-up on the decimal value
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Fixed mapping from platform to price multiplier
///
/// Every multiplier is strictly greater than 1.0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<Platform, Decimal>",
    into = "BTreeMap<Platform, Decimal>"
)]
pub struct MarkupTable {
    markups: BTreeMap<Platform, Decimal>,
}

impl MarkupTable {
    /// The multipliers agreed with the business: DoorDash and UberEats 1.35,
    /// GrubHub 1.215
    pub fn standard() -> Self {
        let mut markups = BTreeMap::new();
        markups.insert(Platform::DoorDash, Decimal::new(135, 2));
        markups.insert(Platform::UberEats, Decimal::new(135, 2));
        markups.insert(Platform::GrubHub, Decimal::new(1215, 3));
        Self { markups }
    }

    pub fn empty() -> Self {
        Self {
            markups: BTreeMap::new(),
        }
    }

    pub fn new(entries: impl IntoIterator<Item = (Platform, Decimal)>) -> Result<Self> {
        entries
            .into_iter()
            .try_fold(Self::empty(), |table, (platform, multiplier)| {
                table.with_markup(platform, multiplier)
            })
    }

    /// Add or replace one platform's multiplier
    pub fn with_markup(mut self, platform: Platform, multiplier: Decimal) -> Result<Self> {
        if multiplier <= Decimal::ONE {
            return Err(Error::invalid(format!(
                "markup for {} must be greater than 1.0, got {}",
                platform, multiplier
            )));
        }
        self.markups.insert(platform, multiplier);
        Ok(self)
    }

    pub fn multiplier(&self, platform: Platform) -> Option<Decimal> {
        self.markups.get(&platform).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.markups.is_empty()
    }

    /// Compute the display price on every platform in the table
    pub fn propagate(&self, base_price: Decimal) -> Result<PlatformPricing> {
        check_base_price(base_price)?;

        self.markups
            .iter()
            .map(|(platform, multiplier)| {
                Ok((*platform, marked_up(base_price, *platform, *multiplier)?))
            })
            .collect::<Result<_>>()
            .map(PlatformPricing)
    }

    /// Display price on a single platform
    pub fn price_for(&self, base_price: Decimal, platform: Platform) -> Result<Decimal> {
        check_base_price(base_price)?;
        let multiplier = self
            .multiplier(platform)
            .ok_or_else(|| Error::invalid(format!("no markup configured for {}", platform)))?;
        marked_up(base_price, platform, multiplier)
    }

    /// [`propagate`](Self::propagate) for a price held as a binary float
    ///
    /// The float goes through its shortest decimal text form, so `2.49_f64`
    /// is treated as exactly 2.49.
    pub fn propagate_f64(&self, base_price: f64) -> Result<PlatformPricing> {
        self.propagate(decimal_from_f64(base_price)?)
    }
}

impl Default for MarkupTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl TryFrom<BTreeMap<Platform, Decimal>> for MarkupTable {
    type Error = Error;

    fn try_from(markups: BTreeMap<Platform, Decimal>) -> Result<Self> {
        Self::new(markups)
    }
}

impl From<MarkupTable> for BTreeMap<Platform, Decimal> {
    fn from(table: MarkupTable) -> Self {
        table.markups
    }
}

fn marked_up(base_price: Decimal, platform: Platform, multiplier: Decimal) -> Result<Decimal> {
    base_price
        .checked_mul(multiplier)
        .map(round2)
        .ok_or_else(|| {
            Error::invalid(format!(
                "base price {} is too large to mark up for {}",
                base_price, platform
            ))
        })
}

fn check_base_price(base_price: Decimal) -> Result<()> {
    if base_price < Decimal::ZERO {
        return Err(Error::invalid(format!(
            "base price must be non-negative, got {}",
            base_price
        )));
    }
    Ok(())
}

/// Per-platform display prices derived from a base price
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformPricing(BTreeMap<Platform, Decimal>);

impl PlatformPricing {
    pub fn get(&self, platform: Platform) -> Option<Decimal> {
        self.0.get(&platform).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Platform, Decimal)> + '_ {
        self.0.iter().map(|(p, d)| (*p, *d))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .0
            .iter()
            .map(|(platform, price)| (platform.as_str().to_string(), decimal_to_json(*price)))
            .collect();
        serde_json::Value::Object(map)
    }
}

impl FromIterator<(Platform, Decimal)> for PlatformPricing {
    fn from_iter<I: IntoIterator<Item = (Platform, Decimal)>>(iter: I) -> Self {
        PlatformPricing(iter.into_iter().collect())
    }
}

impl Serialize for PlatformPricing {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (platform, price) in &self.0 {
            map.serialize_entry(platform, &price_to_f64(*price))?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PlatformPricing {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = BTreeMap::<Platform, serde_json::Number>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(platform, number)| {
                decimal_from_number(&number)
                    .map(|price| (platform, price))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

/// Read a price stored as a JSON number
///
/// Strings, booleans, nulls and negative numbers are rejected.
pub fn base_price_from_json(value: &serde_json::Value) -> Result<Decimal> {
    let price = match value {
        serde_json::Value::Number(number) => decimal_from_number(number)?,
        other => return Err(Error::invalid(format!("price is not a number: {}", other))),
    };
    check_base_price(price)?;
    Ok(price)
}

/// Store a price as a JSON number
pub fn decimal_to_json(value: Decimal) -> serde_json::Value {
    serde_json::Number::from_f64(price_to_f64(value))
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

// Through the decimal text so the float is the nearest double to the price
fn price_to_f64(value: Decimal) -> f64 {
    value.to_string().parse().unwrap_or(f64::NAN)
}

pub(crate) fn decimal_from_number(number: &serde_json::Number) -> Result<Decimal> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| Error::invalid(format!("price {} is out of range: {}", text, e)))
}

pub(crate) fn decimal_from_f64(value: f64) -> Result<Decimal> {
    if !value.is_finite() {
        return Err(Error::invalid(format!("price must be finite, got {}", value)));
    }
    let text = value.to_string();
    Decimal::from_str(&text)
        .map_err(|e| Error::invalid(format!("price {} is out of range: {}", text, e)))
}

/// Serde adapter storing a [`Decimal`] price as a JSON number
pub mod json_price {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(super::price_to_f64(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let number = serde_json::Number::deserialize(deserializer)?;
        super::decimal_from_number(&number).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_propagate_matches_rounded_product_for_every_platform() {
        let table = MarkupTable::standard();
        for base in [dec!(0.99), dec!(7.49), dec!(12.00), dec!(18.75), dec!(104.99)] {
            let pricing = table.propagate(base).unwrap();
            assert_eq!(pricing.len(), 3);
            for platform in Platform::ALL {
                let expected = round2(base * table.multiplier(platform).unwrap());
                assert_eq!(pricing.get(platform), Some(expected), "{} at {}", platform, base);
            }
        }
    }

    #[test]
    fn test_propagate_is_repeatable() {
        let table = MarkupTable::standard();
        assert_eq!(table.propagate(dec!(9.99)).unwrap(), table.propagate(dec!(9.99)).unwrap());
    }

    #[test]
    fn test_zero_base_price() {
        let pricing = MarkupTable::standard().propagate(Decimal::ZERO).unwrap();
        for platform in Platform::ALL {
            assert_eq!(pricing.get(platform), Some(Decimal::ZERO));
        }
    }

    #[test]
    fn test_rounding_near_half_cent() {
        let table = MarkupTable::standard();
        let pricing = table.propagate(dec!(2.49)).unwrap();
        // 3.3615 and 3.02535
        assert_eq!(pricing.get(Platform::DoorDash), Some(dec!(3.36)));
        assert_eq!(pricing.get(Platform::GrubHub), Some(dec!(3.03)));
    }

    #[test]
    fn test_round2_exact_midpoint_rounds_up() {
        assert_eq!(round2(dec!(1.005)), dec!(1.01));
        assert_eq!(round2(dec!(2.675)), dec!(2.68));
        assert_eq!(round2(dec!(2.674999)), dec!(2.67));
    }

    #[test]
    fn test_standard_scenario() {
        let pricing = MarkupTable::standard().propagate(dec!(3.75)).unwrap();
        assert_eq!(
            pricing.to_json(),
            json!({"doordash": 5.06, "ubereats": 5.06, "grubhub": 4.56})
        );
    }

    #[test]
    fn test_negative_base_price_rejected() {
        let err = MarkupTable::standard().propagate(dec!(-1.00)).unwrap_err();
        assert!(err.is_invalid_argument(), "{:?}", err);
    }

    #[test]
    fn test_overflowing_base_price_rejected() {
        let table = MarkupTable::standard();
        assert!(table.propagate(Decimal::MAX).unwrap_err().is_invalid_argument());
        assert!(table
            .price_for(Decimal::MAX, Platform::GrubHub)
            .unwrap_err()
            .is_invalid_argument());

        let huge = base_price_from_json(&json!(7e28)).unwrap();
        assert!(table.propagate(huge).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_empty_table_yields_empty_pricing() {
        let pricing = MarkupTable::empty().propagate(dec!(5.00)).unwrap();
        assert!(pricing.is_empty());
        assert_eq!(pricing.to_json(), json!({}));
    }

    #[test]
    fn test_price_for_missing_platform() {
        let table = MarkupTable::empty()
            .with_markup(Platform::DoorDash, dec!(1.35))
            .unwrap();
        assert_eq!(table.price_for(dec!(10), Platform::DoorDash).unwrap(), dec!(13.50));
        assert!(table
            .price_for(dec!(10), Platform::GrubHub)
            .unwrap_err()
            .is_invalid_argument());
    }

    #[test]
    fn test_markup_must_exceed_one() {
        assert!(MarkupTable::empty().with_markup(Platform::UberEats, dec!(1.0)).is_err());
        assert!(MarkupTable::empty().with_markup(Platform::UberEats, dec!(0.9)).is_err());
    }

    #[test]
    fn test_propagate_f64_rejects_non_finite() {
        let table = MarkupTable::standard();
        assert!(table.propagate_f64(f64::NAN).unwrap_err().is_invalid_argument());
        assert!(table.propagate_f64(f64::INFINITY).unwrap_err().is_invalid_argument());
        assert!(table.propagate_f64(-0.5).unwrap_err().is_invalid_argument());
        assert_eq!(
            table.propagate_f64(2.49).unwrap().get(Platform::GrubHub),
            Some(dec!(3.03))
        );
    }

    #[test]
    fn test_base_price_from_json() {
        assert_eq!(base_price_from_json(&json!(12.99)).unwrap(), dec!(12.99));
        assert_eq!(base_price_from_json(&json!(8)).unwrap(), dec!(8));
        assert!(base_price_from_json(&json!("12.99")).is_err());
        assert!(base_price_from_json(&json!(null)).is_err());
        assert!(base_price_from_json(&json!(-3.5)).is_err());
    }

    #[test]
    fn test_platform_parse() {
        assert_eq!("DoorDash".parse::<Platform>().unwrap(), Platform::DoorDash);
        assert_eq!("grubhub".parse::<Platform>().unwrap(), Platform::GrubHub);
        assert!("postmates".parse::<Platform>().is_err());
    }

    #[test]
    fn test_markup_table_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            pricing: MarkupTable,
        }
        let parsed: Wrapper = toml::from_str("[pricing]\ndoordash = 1.4\ngrubhub = \"1.2\"\n").unwrap();
        assert_eq!(parsed.pricing.multiplier(Platform::DoorDash), Some(dec!(1.4)));
        assert_eq!(parsed.pricing.multiplier(Platform::GrubHub), Some(dec!(1.2)));
        assert_eq!(parsed.pricing.multiplier(Platform::UberEats), None);

        let bad: std::result::Result<Wrapper, _> = toml::from_str("[pricing]\nubereats = 0.8\n");
        assert!(bad.is_err());
    }
}
