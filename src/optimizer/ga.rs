// src/optimizer/ga.rs

use std::cmp::Ordering;
use std::marker::PhantomData;

use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::Rng;

use crate::engine::bars::BarSeries;
use crate::engine::params::{ParamSpace, ParamVector};
use crate::engine::settings::SimulationSettings;
use crate::engine::simulator::simulate;
use crate::engine::strategy::Optimizable;
use crate::optimizer::config::OptimizerConfig;
use crate::optimizer::space::{initial_population, random_gene, random_vector};

/// One candidate and its training-window fitness.
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    pub genes:      ParamVector,
    pub score:      f64,
    pub validation: Option<f64>,
}

/// Fitness: total realized return in percent on `bars`. A parameter vector
/// the strategy rejects, or a run that fails, scores negative infinity.
pub fn fitness<S: Optimizable>(genes: &ParamVector, bars: &BarSeries, settings: &SimulationSettings) -> f64 {
    let mut strategy = match S::from_params(genes) {
        Ok(s) => s,
        Err(e) => {
            warn!("rejected parameters {:?}: {}", genes.values(), e);
            return f64::NEG_INFINITY;
        }
    };
    match simulate(&mut strategy, bars, settings) {
        Ok(result) => result.ledger.total_return_pct(),
        Err(e) => {
            warn!("simulation failed for {:?}: {}", genes.values(), e);
            f64::NEG_INFINITY
        }
    }
}

fn by_score_desc(a: &Individual, b: &Individual) -> Ordering {
    b.score.total_cmp(&a.score)
}

/// One independent GA population: owns its RNG and never shares state.
pub struct GeneticSearch<'a, S: Optimizable> {
    config:     &'a OptimizerConfig,
    settings:   &'a SimulationSettings,
    train:      &'a BarSeries,
    validation: &'a BarSeries,
    space:      ParamSpace,
    rng:        StdRng,
    population: Vec<Individual>,
    _strategy:  PhantomData<fn() -> S>,
}

impl<'a, S: Optimizable> GeneticSearch<'a, S> {
    pub fn new(
        config: &'a OptimizerConfig,
        settings: &'a SimulationSettings,
        train: &'a BarSeries,
        validation: &'a BarSeries,
        rng: StdRng,
    ) -> Self {
        Self {
            config,
            settings,
            train,
            validation,
            space: S::space(),
            rng,
            population: Vec::new(),
            _strategy: PhantomData,
        }
    }

    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    fn evaluate(&self, genes: &ParamVector) -> f64 {
        fitness::<S>(genes, self.train, self.settings)
    }

    fn validate_score(&self, genes: &ParamVector) -> f64 {
        fitness::<S>(genes, self.validation, self.settings)
    }

    /// Seed the population and score it on the training window.
    pub fn create(&mut self) {
        let samples = initial_population(&self.space, self.config.population_size, &mut self.rng);
        self.population = samples
            .into_iter()
            .map(|genes| {
                let score = self.evaluate(&genes);
                Individual { genes, score, validation: None }
            })
            .collect();
    }

    /// Two distinct parents: half the time the best plus a random other,
    /// otherwise two uniform picks.
    pub fn select(&mut self) -> (usize, usize) {
        let n = self.population.len();
        if self.rng.gen_bool(0.5) {
            let best = self.best_index();
            let mut other = self.rng.gen_range(0..n - 1);
            if other >= best {
                other += 1;
            }
            (best, other)
        } else {
            let picks = sample(&mut self.rng, n, 2);
            (picks.index(0), picks.index(1))
        }
    }

    /// Single-point or two-point crossover, half and half. Two-point needs
    /// at least four genes and falls back to single-point otherwise.
    pub fn recombine(&mut self, p1: &ParamVector, p2: &ParamVector) -> ParamVector {
        let len = p1.len();
        if len < 2 {
            return p1.clone();
        }
        let (a, b) = (p1.values(), p2.values());

        if self.rng.gen_bool(0.5) || len < 4 {
            let cut = self.rng.gen_range(1..len);
            a[..cut].iter().chain(&b[cut..]).copied().collect()
        } else {
            let half = len / 2;
            let d1 = self.rng.gen_range(1..half);
            let d2 = self.rng.gen_range(half + 1..len);
            a[..d1].iter().chain(&b[d1..d2]).chain(&a[d2..]).copied().collect()
        }
    }

    /// 95%: resample one gene. 5%: resample all of them.
    pub fn mutate(&mut self, child: &mut ParamVector) {
        if child.is_empty() {
            return;
        }
        if self.rng.gen_bool(0.95) {
            let g = self.rng.gen_range(0..child.len());
            child.values_mut()[g] = random_gene(&self.space, g, &mut self.rng);
        } else {
            *child = random_vector(&self.space, &mut self.rng);
        }
    }

    pub fn expand(&mut self, genes: ParamVector) {
        let score = self.evaluate(&genes);
        self.population.push(Individual { genes, score, validation: None });
    }

    /// Drop the worst until the population fits.
    pub fn kill(&mut self) {
        while self.population.len() > self.config.max_population_size {
            if let Some(worst) = self.worst_index() {
                self.population.swap_remove(worst);
            }
        }
    }

    /// Rare catastrophe: remove the bottom half, never below two.
    pub fn destroy(&mut self) {
        if !self.rng.gen_bool(self.config.destroy_probability) {
            return;
        }
        let keep = (self.population.len() - self.population.len() / 2).max(2);
        self.population.sort_by(by_score_desc);
        self.population.truncate(keep);
        debug!("catastrophe: population cut to {}", self.population.len());
    }

    /// Re-score on the validation window and keep the top share by that
    /// score. Training scores are kept as the ranking key afterwards.
    pub fn validate(&mut self) {
        let scores: Vec<f64> = self.population.iter().map(|ind| self.validate_score(&ind.genes)).collect();
        for (ind, v) in self.population.iter_mut().zip(scores) {
            ind.validation = Some(v);
        }
        let keep = ((self.population.len() as f64 * self.config.validation_keep).ceil() as usize)
            .max(2)
            .min(self.population.len());
        self.population.sort_by(|a, b| {
            let (va, vb) = (a.validation.unwrap_or(f64::NEG_INFINITY), b.validation.unwrap_or(f64::NEG_INFINITY));
            vb.total_cmp(&va)
        });
        self.population.truncate(keep);
        debug!("validation kept {} individuals", keep);
    }

    /// Top `elect_count` by training score, each with its validation score.
    /// Individuals without a finite training score are never elected; a
    /// non-finite validation score is reported as None.
    pub fn elect(&mut self) -> Vec<Individual> {
        self.population.sort_by(by_score_desc);
        let mut best: Vec<Individual> = self
            .population
            .iter()
            .filter(|ind| ind.score.is_finite())
            .take(self.config.elect_count)
            .cloned()
            .collect();
        for ind in &mut best {
            let v = match ind.validation {
                Some(v) => v,
                None => self.validate_score(&ind.genes),
            };
            ind.validation = Some(v).filter(|v| v.is_finite());
        }
        if best.is_empty() {
            warn!("no individual with a finite score to elect");
        }
        best
    }

    /// One full restart: create, iterate, elect.
    pub fn run(&mut self) -> Vec<Individual> {
        self.create();
        for j in 1..=self.config.iterations {
            if self.population.len() < 2 {
                warn!("population collapsed to {} at iteration {}", self.population.len(), j);
                break;
            }
            let (i1, i2) = self.select();
            let (p1, p2) = (self.population[i1].genes.clone(), self.population[i2].genes.clone());
            let mut child = self.recombine(&p1, &p2);
            self.mutate(&mut child);
            self.expand(child);
            self.kill();
            self.destroy();

            let interval = self.config.validation_interval;
            if interval > 0 && j % interval == 0 {
                self.validate();
            }
            if j % 100 == 0 {
                trace!("iteration {}: best {:.4}", j, self.best_score());
            }
        }
        self.elect()
    }

    pub fn best_score(&self) -> f64 {
        self.population.iter().map(|i| i.score).fold(f64::NEG_INFINITY, f64::max)
    }

    fn best_index(&self) -> usize {
        self.population
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.score.total_cmp(&b.score))
            .map_or(0, |(i, _)| i)
    }

    fn worst_index(&self) -> Option<usize> {
        self.population
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.score.total_cmp(&b.score))
            .map(|(i, _)| i)
    }
}
