// crates/tally-hub/src/params.rs
//
// Hub parameters. Loaded from the `[hub]` table of the keeper configuration
// or populated with defaults.
//
// Rates are scaled by 1e18, which leaves no headroom in a 64-bit config
// integer, so wide values are written as decimal strings
// (`exchange_rate = "25_000_000_000_000_000_000"`). Plain integers are
// still accepted.

use serde::{Deserialize, Serialize};

/// Tunable parameters of the aggregation hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubParams {
    /// Reward units per point, scaled by `REDEMPTION_PRECISION`. 0 = not configured.
    #[serde(default, with = "wide_amount")]
    pub exchange_rate: u128,

    /// Whether redemption is open.
    #[serde(default)]
    pub redemption_enabled: bool,

    /// Optional cap on points redeemed per call.
    #[serde(default, with = "wide_amount::option")]
    pub max_redeem_per_tx: Option<u128>,

    /// Work units each source may spend per query.
    #[serde(default = "default_source_query_budget")]
    pub source_query_budget: u64,
}

fn default_source_query_budget() -> u64 {
    10_000
}

impl Default for HubParams {
    fn default() -> Self {
        Self {
            exchange_rate: 0,
            redemption_enabled: false,
            max_redeem_per_tx: None,
            source_query_budget: default_source_query_budget(),
        }
    }
}

mod wide_amount {
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wide {
        Int(u64),
        Text(String),
    }

    impl Wide {
        fn into_u128<E: de::Error>(self) -> Result<u128, E> {
            match self {
                Wide::Int(value) => Ok(u128::from(value)),
                Wide::Text(text) => text
                    .trim()
                    .replace('_', "")
                    .parse()
                    .map_err(|e| E::custom(format!("invalid amount {:?}: {}", text, e))),
            }
        }
    }

    pub fn serialize<S>(value: &u128, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u128, D::Error>
    where
        D: Deserializer<'de>,
    {
        Wide::deserialize(deserializer)?.into_u128()
    }

    pub mod option {
        use super::Wide;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(value: &Option<u128>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(value) => serializer.serialize_some(&value.to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u128>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<Wide>::deserialize(deserializer)?
                .map(|wide| wide.into_u128::<D::Error>())
                .transpose()
        }
    }
}
