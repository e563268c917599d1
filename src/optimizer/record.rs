// src/optimizer/record.rs

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::engine::params::{ParamSpace, ParamValue, ParamVector};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedParam {
    pub name:  String,
    pub value: ParamValue,
}

/// One elected parameter set: enough to rebuild the strategy and to know
/// which data it was fitted on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRecord {
    pub strategy:         String,
    pub dataset:          String,
    pub restart:          usize,
    pub train_start:      i64,   // ms, first bar
    pub train_end:        i64,   // ms, last bar
    pub validation_start: i64,
    pub validation_end:   i64,
    pub train_score:      f64,
    pub validation_score: Option<f64>,
    pub params:           Vec<NamedParam>,
}

impl OptimizationRecord {
    pub fn named(space: &ParamSpace, genes: &ParamVector) -> Vec<NamedParam> {
        space
            .names()
            .zip(genes.values())
            .map(|(name, value)| NamedParam { name: name.to_string(), value: *value })
            .collect()
    }

    /// Gene vector in declared order, ready for `Optimizable::from_params`.
    pub fn param_vector(&self) -> ParamVector {
        self.params.iter().map(|p| p.value).collect()
    }
}

pub fn write_records(path: &Path, records: &[OptimizationRecord]) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), records)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn read_records(path: &Path) -> anyhow::Result<Vec<OptimizationRecord>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let records = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::params::ParamDomain;

    #[test]
    fn names_follow_the_space() {
        let space = ParamSpace::new(vec![ParamDomain::int_range("period", 1, 3, 1), ParamDomain::boolean("trail")]);
        let genes = ParamVector::new(vec![ParamValue::Int(2), ParamValue::Bool(true)]);
        let record = OptimizationRecord {
            strategy:         "x".into(),
            dataset:          "y".into(),
            restart:          0,
            train_start:      0,
            train_end:        1,
            validation_start: 2,
            validation_end:   3,
            train_score:      1.5,
            validation_score: None,
            params:           OptimizationRecord::named(&space, &genes),
        };
        assert_eq!(record.params[1].name, "trail");
        assert_eq!(record.param_vector(), genes);

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#"{"name":"period","value":2}"#));
    }

    #[test]
    fn file_round_trip() {
        let path = std::env::temp_dir().join(format!("tradesim-records-{}.json", std::process::id()));
        let record = OptimizationRecord {
            strategy:         "s".into(),
            dataset:          "d".into(),
            restart:          1,
            train_start:      10,
            train_end:        20,
            validation_start: 30,
            validation_end:   40,
            train_score:      -3.25,
            validation_score: Some(2.0),
            params:           vec![NamedParam { name: "k".into(), value: ParamValue::Float(0.5) }],
        };
        write_records(&path, &[record.clone()]).unwrap();
        let back = read_records(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(back, vec![record]);
    }
}
