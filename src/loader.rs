//! JSON network documents.
//!
//! A document has the shape
//!
//! ```json
//! {
//!   "state": {"a": [10], "b": [0], "time": [0.0]},
//!   "propensity": {"0": "0.5 * a", "1": "0.5 * b"},
//!   "stoichiometry": {"0": {"a": -1, "b": 1}, "1": {"a": 1, "b": -1}},
//!   "step_limit": 10
//! }
//! ```
//!
//! `duration_limit` and `step_limit` are optional. Any other top-level
//! object is rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::error;

use crate::error::{Result, SimError};
use crate::network::{EventId, NetworkInputs, ReactionNetwork, Stoichiometry};
use crate::propensity::{Propensity, TIME_SERIES};

pub const OBJECT_KINDS: [&str; 5] = [
    "state",
    "propensity",
    "stoichiometry",
    "duration_limit",
    "step_limit",
];

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkDocument {
    pub state: BTreeMap<String, Vec<f64>>,
    pub propensity: BTreeMap<EventId, String>,
    pub stoichiometry: BTreeMap<EventId, Stoichiometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_limit: Option<u64>,
}

fn parse_state(value: Value) -> Result<BTreeMap<String, Vec<f64>>> {
    let Value::Object(entries) = value else {
        return Err(SimError::Configuration(
            "state must map species names to sequences".into(),
        ));
    };
    let mut state = BTreeMap::new();
    for (name, series) in entries {
        let Value::Array(items) = series else {
            return Err(SimError::Configuration(format!(
                "state series '{}' must be a sequence",
                name
            )));
        };
        let values = items
            .iter()
            .map(|item| {
                item.as_f64().ok_or_else(|| {
                    SimError::Configuration(format!(
                        "state series '{}' contains non-numeric entry {}",
                        name, item
                    ))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        state.insert(name, values);
    }
    Ok(state)
}

fn parse_propensity(value: Value) -> Result<BTreeMap<EventId, String>> {
    let Value::Object(entries) = value else {
        return Err(SimError::Configuration(
            "propensity must map event ids to expressions".into(),
        ));
    };
    entries
        .into_iter()
        .map(|(event, expression)| match expression {
            Value::String(text) => Ok((EventId::from(event), text)),
            Value::Number(number) => Ok((EventId::from(event), number.to_string())),
            other => Err(SimError::Configuration(format!(
                "propensity of event {} must be an expression, got {}",
                event, other
            ))),
        })
        .collect()
}

impl NetworkDocument {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(objects) = value else {
            return Err(SimError::Configuration(
                "network document must be a JSON object".into(),
            ));
        };
        let mut document = Self::default();
        for (kind, object) in objects {
            document.load(&kind, object)?;
        }
        Ok(document)
    }

    /// Loads a single top-level object into the document.
    pub fn load(&mut self, kind: &str, value: Value) -> Result<()> {
        match kind {
            "state" => self.state = parse_state(value)?,
            "propensity" => self.propensity = parse_propensity(value)?,
            "stoichiometry" => self.stoichiometry = serde_json::from_value(value)?,
            "duration_limit" => self.duration_limit = serde_json::from_value(value)?,
            "step_limit" => self.step_limit = serde_json::from_value(value)?,
            other => {
                error!(kind = other, "unsupported document object");
                return Err(SimError::UnsupportedObject(format!(
                    "'{}' is not one of {}",
                    other,
                    OBJECT_KINDS.join(", ")
                )));
            }
        }
        Ok(())
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_inputs(&self) -> Result<NetworkInputs> {
        let propensity = self
            .propensity
            .iter()
            .map(|(event, source)| Propensity::expression(source).map(|p| (event.clone(), p)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(NetworkInputs {
            id: None,
            state: self.state.clone(),
            propensity,
            stoichiometry: self.stoichiometry.clone(),
            duration_limit: self.duration_limit,
            step_limit: self.step_limit,
        })
    }

    pub fn into_network(self) -> Result<ReactionNetwork> {
        ReactionNetwork::from_inputs(self.to_inputs()?)
    }
}

impl ReactionNetwork {
    /// Configuration of this network as a document: initial state, the
    /// expression of every propensity, stoichiometries and limits.
    /// Networks with native propensities cannot be written out.
    pub fn to_document(&self) -> Result<NetworkDocument> {
        let mut state: BTreeMap<String, Vec<f64>> = self
            .species_series()
            .map(|(name, values)| (name.to_string(), values[..1].to_vec()))
            .collect();
        state.insert(TIME_SERIES.to_string(), self.time()[..1].to_vec());

        let mut propensity = BTreeMap::new();
        let mut stoichiometry = BTreeMap::new();
        for idx in 0..self.n_events() {
            let event = self.event_id(idx).clone();
            let source = self.event_propensity(idx).source().ok_or_else(|| {
                SimError::Configuration(format!(
                    "propensity of event {} is native and has no expression",
                    event
                ))
            })?;
            propensity.insert(event.clone(), source.to_string());
            stoichiometry.insert(event, self.event_stoichiometry(idx).clone());
        }

        let limits = self.limits();
        Ok(NetworkDocument {
            state,
            propensity,
            stoichiometry,
            duration_limit: limits.duration.is_finite().then_some(limits.duration),
            step_limit: limits.steps,
        })
    }
}
