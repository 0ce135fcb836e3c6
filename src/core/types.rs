use serde::{Deserialize, Deserializer, Serialize};

use super::error::{EngineError, Result};

/// Share of monthly income the simulation banks as savings each year a turn
/// advances. Independent of the per-player `savings_fraction`.
pub const POLICY_SAVINGS_FRACTION: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finance {
    pub income: f64,
    pub capital: f64,
    #[serde(rename = "interest_rates")]
    pub interest_rate: f64,
    #[serde(rename = "desired_rates")]
    pub savings_fraction: f64,
}

impl Finance {
    pub fn monthly_payment(&self) -> f64 {
        self.income * self.savings_fraction
    }

    pub fn monthly_rate(&self) -> f64 {
        self.interest_rate / 100.0 / 12.0
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("income", self.income),
            ("capital", self.capital),
            ("interest_rates", self.interest_rate),
            ("desired_rates", self.savings_fraction),
        ] {
            if !value.is_finite() {
                return Err(EngineError::InvalidInput(format!("{name} must be finite")));
            }
        }
        if self.income < 0.0 {
            return Err(EngineError::InvalidInput("income must be >= 0".to_string()));
        }
        if self.interest_rate < 0.0 {
            return Err(EngineError::InvalidInput(
                "interest_rates must be >= 0".to_string(),
            ));
        }
        if self.savings_fraction <= 0.0 || self.savings_fraction > 1.0 {
            return Err(EngineError::InvalidInput(
                "desired_rates must be a fraction of income in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifeEventKind {
    #[serde(alias = "CHILD")]
    Child,
    #[serde(alias = "CONSUME")]
    Consume,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeEvent {
    #[serde(rename = "chance_type")]
    pub kind: LifeEventKind,
    #[serde(default)]
    pub yearly_cost: f64,
    #[serde(rename = "onetime_cost", default)]
    pub one_time_cost: f64,
    #[serde(rename = "age", default)]
    pub trigger_age: u32,
}

impl LifeEvent {
    /// Charges `years` of recurring cost plus the one-time cost, then clears
    /// the one-time cost so a second application never charges it again.
    pub fn apply(&mut self, finance: &mut Finance, years: u32) {
        finance.capital -= self.yearly_cost * years as f64;
        finance.capital -= self.one_time_cost;
        self.one_time_cost = 0.0;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Envelope {
    low: f64,
    high: f64,
}

impl Envelope {
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) / 2.0
    }

    pub fn contains(&self, price: f64) -> bool {
        (self.low..=self.high).contains(&price)
    }
}

impl From<[f64; 2]> for Envelope {
    fn from(value: [f64; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}

impl From<Envelope> for [f64; 2] {
    fn from(value: Envelope) -> Self {
        [value.low, value.high]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilter {
    pub max_budget: f64,
    #[serde(rename = "type")]
    pub property_type: String,
    pub sort_type: String,
    pub size: u32,
    pub city: String,
    pub region: String,
}

impl SearchFilter {
    /// Key identifying the listing set this filter selects. Budget and region
    /// do not change what the listing source returns.
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.property_type, self.sort_type, self.size, self.city
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub age: u32,
    #[serde(default, with = "optional_envelope")]
    pub equity: Option<Envelope>,
    #[serde(rename = "square_id", default)]
    pub position: u32,
    #[serde(rename = "filter_option", alias = "filter_options", default)]
    pub filter: SearchFilter,
    #[serde(rename = "chance", default, deserialize_with = "null_as_empty")]
    pub pending_events: Vec<LifeEvent>,
    pub finance: Finance,
}

impl State {
    pub fn new(age: u32, finance: Finance, filter: SearchFilter) -> Self {
        Self {
            age,
            equity: None,
            position: 0,
            filter,
            pending_events: Vec::new(),
            finance,
        }
    }

    pub fn region(&self) -> &str {
        &self.filter.region
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub buying_price: f64,
    #[serde(default)]
    pub rooms: f64,
    #[serde(default)]
    pub square_meter: f64,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub construction_year: u32,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedListing {
    #[serde(flatten)]
    pub listing: Listing,
    #[serde(rename = "finance_duration")]
    pub financing_duration: f64,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

mod optional_envelope {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Envelope;

    pub fn serialize<S: Serializer>(
        value: &Option<Envelope>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(envelope) => envelope.serialize(serializer),
            None => serializer.collect_seq(std::iter::empty::<f64>()),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Envelope>, D::Error> {
        let raw = Option::<Vec<f64>>::deserialize(deserializer)?;
        match raw.as_deref() {
            None | Some([]) => Ok(None),
            Some(&[a, b]) => Ok(Some(Envelope::new(a, b))),
            Some(other) => Err(D::Error::invalid_length(
                other.len(),
                &"an empty array or [low, high]",
            )),
        }
    }
}
