// src/engine/params.rs

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};

/// One gene. Strategies declare which variant each position holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{x}"),
        }
    }
}

/// Ordered parameter set bound to one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamVector(Vec<ParamValue>);

impl ParamVector {
    pub fn new(values: Vec<ParamValue>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[ParamValue] {
        &self.0
    }

    pub fn values_mut(&mut self) -> &mut [ParamValue] {
        &mut self.0
    }

    pub fn into_inner(self) -> Vec<ParamValue> {
        self.0
    }

    pub fn expect_len(&self, expected: usize) -> Result<()> {
        if self.0.len() == expected {
            Ok(())
        } else {
            Err(BacktestError::ParamCount { expected, got: self.0.len() })
        }
    }

    pub fn int(&self, index: usize) -> Result<i64> {
        match self.0.get(index) {
            Some(ParamValue::Int(v)) => Ok(*v),
            _ => Err(BacktestError::ParamType { index, expected: "an integer" }),
        }
    }

    /// Integers are accepted and widened.
    pub fn float(&self, index: usize) -> Result<f64> {
        match self.0.get(index) {
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            _ => Err(BacktestError::ParamType { index, expected: "a number" }),
        }
    }

    pub fn flag(&self, index: usize) -> Result<bool> {
        match self.0.get(index) {
            Some(ParamValue::Bool(v)) => Ok(*v),
            _ => Err(BacktestError::ParamType { index, expected: "a boolean" }),
        }
    }
}

impl FromIterator<ParamValue> for ParamVector {
    fn from_iter<I: IntoIterator<Item = ParamValue>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<ParamValue>> for ParamVector {
    fn from(values: Vec<ParamValue>) -> Self {
        Self(values)
    }
}

/// Allowed values for one gene, in declared order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDomain {
    pub name:   String,
    pub values: Vec<ParamValue>,
}

impl ParamDomain {
    pub fn new(name: impl Into<String>, values: Vec<ParamValue>) -> Self {
        Self { name: name.into(), values }
    }

    /// Integers `start, start+step, ..` up to and including `end`.
    pub fn int_range(name: impl Into<String>, start: i64, end: i64, step: i64) -> Self {
        let step = step.max(1);
        let values = (0..)
            .map(|k| start + k * step)
            .take_while(|v| *v <= end)
            .map(ParamValue::Int)
            .collect();
        Self::new(name, values)
    }

    /// Floats `start + k*step` for `k = 0..` while `<= end`, each rounded to
    /// 10 decimals.
    pub fn float_range(name: impl Into<String>, start: f64, end: f64, step: f64) -> Self {
        let mut values = Vec::new();
        if step > 0.0 && step.is_finite() {
            let count = ((end - start) / step + 1e-9).floor();
            if count >= 0.0 {
                for k in 0..=count as usize {
                    let v = crate::engine::precision::round_to(start + k as f64 * step, 10);
                    values.push(ParamValue::Float(v));
                }
            }
        }
        Self::new(name, values)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, vec![ParamValue::Bool(false), ParamValue::Bool(true)])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Declared optimizable fields of a strategy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParamSpace {
    pub domains: Vec<ParamDomain>,
}

impl ParamSpace {
    pub fn new(domains: Vec<ParamDomain>) -> Self {
        Self { domains }
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(|d| d.name.as_str())
    }

    /// Every domain must offer at least one value.
    pub fn validate(&self) -> Result<()> {
        match self.domains.iter().find(|d| d.is_empty()) {
            Some(d) => Err(BacktestError::EmptyDomain { name: d.name.clone() }),
            None => Ok(()),
        }
    }

    /// Number of distinct vectors in the space, saturating.
    pub fn cardinality(&self) -> u128 {
        self.domains
            .iter()
            .fold(1u128, |acc, d| acc.saturating_mul(d.len() as u128))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters() {
        let v = ParamVector::new(vec![
            ParamValue::Int(20),
            ParamValue::Float(1.5),
            ParamValue::Bool(true),
        ]);
        assert_eq!(v.int(0), Ok(20));
        assert_eq!(v.float(0), Ok(20.0));
        assert_eq!(v.float(1), Ok(1.5));
        assert_eq!(v.flag(2), Ok(true));
        assert!(matches!(v.int(1), Err(BacktestError::ParamType { index: 1, .. })));
        assert!(v.flag(7).is_err());
        assert_eq!(v.expect_len(4), Err(BacktestError::ParamCount { expected: 4, got: 3 }));
    }

    #[test]
    fn ranges() {
        let d = ParamDomain::int_range("period", 10, 30, 10);
        assert_eq!(d.values, vec![ParamValue::Int(10), ParamValue::Int(20), ParamValue::Int(30)]);
        let f = ParamDomain::float_range("stop", 0.5, 1.5, 0.1);
        assert_eq!(f.len(), 11);
        assert_eq!(f.values[3], ParamValue::Float(0.8));
        assert_eq!(f.values[10], ParamValue::Float(1.5));

        let space = ParamSpace::new(vec![d, ParamDomain::boolean("trail")]);
        assert_eq!(space.cardinality(), 6);
    }

    #[test]
    fn empty_domain_is_rejected() {
        let space = ParamSpace::new(vec![
            ParamDomain::boolean("trail"),
            ParamDomain::int_range("period", 5, 1, 1),
        ]);
        assert_eq!(space.validate(), Err(BacktestError::EmptyDomain { name: "period".into() }));
    }

    #[test]
    fn json_is_plain_values() {
        let v = ParamVector::new(vec![ParamValue::Int(3), ParamValue::Float(0.5), ParamValue::Bool(false)]);
        assert_eq!(serde_json::to_string(&v).unwrap(), "[3,0.5,false]");
        let back: ParamVector = serde_json::from_str("[3,0.5,false]").unwrap();
        assert_eq!(back, v);
    }
}
