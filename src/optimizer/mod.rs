// src/optimizer/mod.rs

pub mod config;
pub mod ga;
pub mod record;
pub mod space;
pub mod windows;

use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::engine::bars::BarSeries;
use crate::engine::prepare_inputs::prepare_inputs;
use crate::engine::settings::SimulationSettings;
use crate::engine::strategy::Optimizable;
use crate::error::Result;

pub use config::OptimizerConfig;
pub use ga::{fitness, GeneticSearch, Individual};
pub use record::{read_records, write_records, NamedParam, OptimizationRecord};
pub use windows::{split_windows, Windows};

/// A named bar series to optimize over.
#[derive(Debug, Clone, Copy)]
pub struct Dataset<'a> {
    pub name: &'a str,
    pub bars: &'a BarSeries,
}

/// Run `config.restarts` independent GA populations for `S` on one dataset,
/// in parallel, and pool their elected individuals.
pub fn optimize<S: Optimizable>(
    dataset: Dataset<'_>,
    settings: &SimulationSettings,
    config: &OptimizerConfig,
) -> Result<Vec<OptimizationRecord>> {
    // 1) Preconditions, before any worker starts
    config.validate()?;
    settings.validate()?;
    prepare_inputs(dataset.bars)?;
    let space = S::space();
    space.validate()?;
    let windows = split_windows(dataset.bars, config.train_window, config.validation_window)?;
    info!(
        "{} on {}: {} restarts over {} combinations, {} train / {} validation bars",
        S::NAME,
        dataset.name,
        config.restarts,
        space.cardinality(),
        windows.train.len(),
        windows.validation.len()
    );

    // 2) Independent restarts
    let restarts: Vec<Vec<Individual>> = (0..config.restarts)
        .into_par_iter()
        .map(|restart| {
            let rng = match config.seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(restart as u64)),
                None => StdRng::from_entropy(),
            };
            let mut search =
                GeneticSearch::<S>::new(config, settings, &windows.train, &windows.validation, rng);
            let elected = search.run();
            info!(
                "{} on {}: restart {} finished, best train score {:.2}",
                S::NAME,
                dataset.name,
                restart + 1,
                elected.first().map_or(f64::NAN, |i| i.score)
            );
            elected
        })
        .collect();

    // 3) Records
    let time = dataset.bars.time();
    let (train, validation) = (&windows.train_range, &windows.validation_range);
    Ok(restarts
        .into_iter()
        .enumerate()
        .flat_map(|(restart, elected)| elected.into_iter().map(move |ind| (restart, ind)))
        .map(|(restart, ind)| OptimizationRecord {
            strategy:         S::NAME.to_string(),
            dataset:          dataset.name.to_string(),
            restart,
            train_start:      time[train.start],
            train_end:        time[train.end - 1],
            validation_start: time[validation.start],
            validation_end:   time[validation.end - 1],
            train_score:      ind.score,
            validation_score: ind.validation,
            params:           OptimizationRecord::named(&space, &ind.genes),
        })
        .collect())
}

/// One `optimize` per dataset, the datasets themselves spread over the
/// rayon pool. A failing dataset does not stop the others.
pub fn optimize_all<S: Optimizable>(
    datasets: &[Dataset<'_>],
    settings: &SimulationSettings,
    config: &OptimizerConfig,
) -> Vec<(String, Result<Vec<OptimizationRecord>>)> {
    datasets
        .par_iter()
        .map(|ds| (ds.name.to_string(), optimize::<S>(*ds, settings, config)))
        .collect()
}
