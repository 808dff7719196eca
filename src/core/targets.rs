//! Target allocation: which share of the portfolio each asset should hold,
//! what kind of rebalancing is allowed and who gets told about it.

use super::error::{AllocationError, Result};
use anyhow::Context;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// The share sum must read as this at five decimals.
const SHARE_SUM_AT_FIVE_DECIMALS: &str = "1.00000";

/// Which kind of orders a rebalancing run may produce.
///
/// Only `Buy` has allocator behavior; the other two are accepted as
/// configuration values and rejected when a plan is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Buy,
    Sell,
    BuyAndSell,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Buy => "buy",
            Strategy::Sell => "sell",
            Strategy::BuyAndSell => "buy_and_sell",
        }
    }
}

impl Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = AllocationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "buy" => Ok(Strategy::Buy),
            "sell" => Ok(Strategy::Sell),
            "buy_and_sell" => Ok(Strategy::BuyAndSell),
            _ => Err(AllocationError::InvalidConfiguration(format!(
                "unknown strategy: {s:?} (expected buy, sell or buy_and_sell)"
            ))),
        }
    }
}

/// Validated target allocation. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetConfig {
    target_shares: BTreeMap<String, f64>,
    strategy: Strategy,
    to_email: String,
}

impl TargetConfig {
    /// Builds a configuration, rejecting repeated identifiers, shares that do
    /// not sum to 1 at five decimals and unknown strategy tags.
    pub fn new<I, K>(target_shares: I, strategy: &str, to_email: impl Into<String>) -> Result<Self>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let mut shares = BTreeMap::new();
        let mut total = 0.0;
        for (id, weight) in target_shares {
            let id = id.into();
            if !weight.is_finite() {
                return Err(AllocationError::InvalidConfiguration(format!(
                    "target share for {id} is not a finite number"
                )));
            }
            if shares.insert(id.clone(), weight).is_some() {
                return Err(AllocationError::InvalidConfiguration(format!(
                    "duplicate target share for {id}"
                )));
            }
            total += weight;
        }

        // Precision formatting rounds the exact binary value, half-way cases included.
        if format!("{total:.5}") != SHARE_SUM_AT_FIVE_DECIMALS {
            return Err(AllocationError::InvalidConfiguration(format!(
                "sum of target shares is {total}, not 1"
            )));
        }

        let strategy = strategy.parse::<Strategy>()?;

        debug!(targets = shares.len(), %strategy, "Validated target configuration");
        Ok(TargetConfig {
            target_shares: shares,
            strategy,
            to_email: to_email.into(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawTargetConfig = serde_json::from_str(json).map_err(|e| {
            AllocationError::InvalidConfiguration(format!("failed to parse targets: {e}"))
        })?;
        Self::try_from(raw)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: RawTargetConfig = serde_yaml::from_str(yaml).map_err(|e| {
            AllocationError::InvalidConfiguration(format!("failed to parse targets: {e}"))
        })?;
        Self::try_from(raw)
    }

    /// Loads a targets file; `.yaml`/`.yml` files are read as YAML, anything
    /// else as JSON.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read targets file: {}", path.display()))?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        let config = if is_yaml {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        }
        .with_context(|| format!("Invalid targets file: {}", path.display()))?;

        debug!("Successfully loaded targets from {}", path.display());
        Ok(config)
    }

    pub fn target_shares(&self) -> &BTreeMap<String, f64> {
        &self.target_shares
    }

    pub fn target_for(&self, id: &str) -> Option<f64> {
        self.target_shares.get(id).copied()
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn to_email(&self) -> &str {
        &self.to_email
    }
}

/// Targets file as written by the user, before coercion and validation.
#[derive(Debug, Deserialize)]
struct RawTargetConfig {
    #[serde(deserialize_with = "ordered_entries")]
    target_shares: Vec<(String, RawWeight)>,
    strategy: String,
    to_email: String,
}

/// Weights may be written as numbers or as numeric strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawWeight {
    Number(f64),
    Text(String),
}

impl RawWeight {
    fn coerce(self, id: &str) -> Result<f64> {
        match self {
            RawWeight::Number(value) => Ok(value),
            RawWeight::Text(text) => text.trim().parse::<f64>().map_err(|_| {
                AllocationError::InvalidConfiguration(format!(
                    "target share for {id} is not a number: {text:?}"
                ))
            }),
        }
    }
}

impl TryFrom<RawTargetConfig> for TargetConfig {
    type Error = AllocationError;

    fn try_from(raw: RawTargetConfig) -> Result<Self> {
        let shares = raw
            .target_shares
            .into_iter()
            .map(|(id, weight)| weight.coerce(&id).map(|w| (id, w)))
            .collect::<Result<Vec<_>>>()?;
        TargetConfig::new(shares, &raw.strategy, raw.to_email)
    }
}

// Keeps every entry of the map, repeated keys included, so that duplicates
// reach `TargetConfig::new` instead of silently overwriting each other.
fn ordered_entries<'de, D>(deserializer: D) -> std::result::Result<Vec<(String, RawWeight)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct EntriesVisitor;

    impl<'de> Visitor<'de> for EntriesVisitor {
        type Value = Vec<(String, RawWeight)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of identifier to target share")
        }

        fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<String, RawWeight>()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(EntriesVisitor)
}
