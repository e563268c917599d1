// src/optimizer/space.rs

use rand::seq::SliceRandom;
use rand::Rng;

use crate::engine::params::{ParamSpace, ParamValue, ParamVector};

/// One value drawn uniformly from domain `gene`.
pub fn random_gene<R: Rng + ?Sized>(space: &ParamSpace, gene: usize, rng: &mut R) -> ParamValue {
    let values = &space.domains[gene].values;
    values[rng.gen_range(0..values.len())]
}

pub fn random_vector<R: Rng + ?Sized>(space: &ParamSpace, rng: &mut R) -> ParamVector {
    (0..space.len()).map(|g| random_gene(space, g, rng)).collect()
}

/// Latin-hypercube draw: each gene's domain is cut into `count` strata and
/// every stratum is used exactly once across the returned vectors.
pub fn latin_hypercube<R: Rng + ?Sized>(space: &ParamSpace, count: usize, rng: &mut R) -> Vec<ParamVector> {
    if count == 0 || space.is_empty() {
        return Vec::new();
    }
    let columns: Vec<Vec<usize>> = space
        .domains
        .iter()
        .map(|d| {
            let mut strata: Vec<usize> = (0..count).collect();
            strata.shuffle(rng);
            strata
                .into_iter()
                .map(|s| (s * d.len() / count).min(d.len() - 1))
                .collect()
        })
        .collect();

    (0..count)
        .map(|row| {
            space
                .domains
                .iter()
                .zip(&columns)
                .map(|(d, col)| d.values[col[row]])
                .collect()
        })
        .collect()
}

/// Each gene set to its domain's first or last value.
pub fn extreme_vector<R: Rng + ?Sized>(space: &ParamSpace, rng: &mut R) -> ParamVector {
    space
        .domains
        .iter()
        .map(|d| if rng.gen_bool(0.5) { d.values[0] } else { d.values[d.len() - 1] })
        .collect()
}

/// Starting population: 30% uniform, 40% Latin hypercube, 20% extremes,
/// topped up with uniform draws.
pub fn initial_population<R: Rng + ?Sized>(space: &ParamSpace, size: usize, rng: &mut R) -> Vec<ParamVector> {
    let random_count = size * 3 / 10;
    let lhs_count = size * 4 / 10;
    let extreme_count = size * 2 / 10;

    let mut out = Vec::with_capacity(size);
    out.extend((0..random_count).map(|_| random_vector(space, rng)));
    out.extend(latin_hypercube(space, lhs_count, rng));
    out.extend((0..extreme_count).map(|_| extreme_vector(space, rng)));
    while out.len() < size {
        out.push(random_vector(space, rng));
    }
    out
}
