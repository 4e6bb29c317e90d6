use meval::{Context, ContextProvider, Expr};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use crate::error::{Result, SimError};

/// Propensities at or below this value mark an event as unable to fire.
pub const ZERO_PROPENSITY: f64 = 1e-15;

pub const TIME_SERIES: &str = "time";
pub const SOJOURN_SERIES: &str = "sojourn";

const BUILTIN_CONSTANTS: [&str; 2] = ["pi", "e"];

static SPECIES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]\w{0,31}$").expect("species pattern is a valid regex")
});

static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z]\w*\b").expect("identifier pattern is a valid regex")
});

pub fn is_species_identifier(name: &str) -> bool {
    name.is_ascii() && SPECIES_RE.is_match(name)
}

/// Latest value of every series, as seen by a propensity.
#[derive(Clone, Copy)]
pub struct StateView<'a> {
    index: &'a HashMap<String, usize>,
    series: &'a [Vec<f64>],
    time: f64,
}

impl<'a> StateView<'a> {
    pub(crate) fn new(index: &'a HashMap<String, usize>, series: &'a [Vec<f64>], time: f64) -> Self {
        Self {
            index,
            series,
            time,
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        if name == TIME_SERIES {
            return Some(self.time);
        }
        self.index
            .get(name)
            .and_then(|&idx| self.series[idx].last().copied())
    }

    pub fn time(&self) -> f64 {
        self.time
    }
}

impl ContextProvider for StateView<'_> {
    fn get_var(&self, name: &str) -> Option<f64> {
        self.get(name)
    }
}

pub type NativeFn = dyn for<'a> Fn(&StateView<'a>) -> f64 + Send + Sync;

#[derive(Clone)]
pub struct PropensityExpression {
    source: String,
    expr: Expr,
    identifiers: Vec<String>,
}

impl PropensityExpression {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Free identifiers in order of first appearance, function names excluded.
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }
}

impl FromStr for PropensityExpression {
    type Err = SimError;

    fn from_str(source: &str) -> Result<Self> {
        let expr = Expr::from_str(source).map_err(|err| {
            SimError::Configuration(format!("propensity '{}' parse error: {}", source, err))
        })?;
        Ok(Self {
            source: source.to_string(),
            expr,
            identifiers: collect_identifiers(source),
        })
    }
}

fn collect_identifiers(source: &str) -> Vec<String> {
    let mut identifiers: Vec<String> = Vec::new();
    for found in IDENTIFIER_RE.find_iter(source) {
        let is_call = source[found.end()..].trim_start().starts_with('(');
        if is_call {
            continue;
        }
        let name = found.as_str();
        if !identifiers.iter().any(|known| known == name) {
            identifiers.push(name.to_string());
        }
    }
    identifiers
}

#[derive(Clone)]
pub enum Propensity {
    Expression(PropensityExpression),
    Native(Arc<NativeFn>),
}

impl Propensity {
    pub fn expression(source: &str) -> Result<Self> {
        source.parse().map(Self::Expression)
    }

    pub fn native<F>(func: F) -> Self
    where
        F: for<'a> Fn(&StateView<'a>) -> f64 + Send + Sync + 'static,
    {
        Self::Native(Arc::new(func))
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            Self::Expression(expression) => Some(expression.source()),
            Self::Native(_) => None,
        }
    }

    pub(crate) fn check_identifiers(&self, event: &str, species: &HashMap<String, usize>) -> Result<()> {
        let Self::Expression(expression) = self else {
            return Ok(());
        };
        for name in &expression.identifiers {
            let known = name == TIME_SERIES
                || species.contains_key(name)
                || BUILTIN_CONSTANTS.contains(&name.as_str());
            if !known {
                return Err(SimError::Configuration(format!(
                    "propensity of event {} references unknown identifier '{}'",
                    event, name
                )));
            }
        }
        Ok(())
    }

    pub fn evaluate(&self, state: &StateView<'_>) -> std::result::Result<f64, String> {
        match self {
            Self::Expression(expression) => expression
                .expr
                .eval_with_context((*state, Context::new()))
                .map_err(|err| err.to_string()),
            Self::Native(func) => Ok(func(state)),
        }
    }
}

impl fmt::Debug for Propensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expression(expression) => f
                .debug_tuple("Expression")
                .field(&expression.source)
                .finish(),
            Self::Native(_) => f.write_str("Native(..)"),
        }
    }
}

impl From<PropensityExpression> for Propensity {
    fn from(expression: PropensityExpression) -> Self {
        Self::Expression(expression)
    }
}
