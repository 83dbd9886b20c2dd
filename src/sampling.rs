//! Subsampling strategies over a [`FileIndex`].
//!
//! Every strategy is a pure function of the index (and, for the random
//! ones, the caller's RNG) that returns a selection for the registry.
//! Drawn ordinals are sorted so output keeps the source file order.
//! Nothing is returned until every population has been validated.

use std::fmt;

use rand::seq::index::sample as sample_indices;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::genepop::{GenepopError, Result};
use crate::index::FileIndex;
use crate::ranges::RangeCollection;
use crate::registry::{IndividualSubsample, LociSubsample, PopulationSubsample};

/// Batch sampling schemes and their tag prefixes.
///
/// Batch callers name their selections `{prefix}_{value}_r_{replicate}`;
/// the registry itself treats tags as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleScheme {
    /// Keep a proportion of each population.
    Proportion,
    /// Remove N individuals from each population.
    Removal,
    /// Keep exactly N individuals from each population.
    Count,
}

impl SampleScheme {
    pub fn prefix(&self) -> &'static str {
        match self {
            SampleScheme::Proportion => "p",
            SampleScheme::Removal => "n",
            SampleScheme::Count => "c",
        }
    }

    /// Tag for one value and zero-based replicate.
    pub fn tag<V: fmt::Display>(&self, value: V, replicate: usize) -> String {
        format!("{}_{}_r_{}", self.prefix(), value, replicate)
    }
}

/// Keep `round(count * proportion)` randomly chosen individuals per population.
///
/// Rounding is half-to-even. A proportion of 0 keeps only the delimiter.
pub fn by_proportion<R: Rng + ?Sized>(
    index: &FileIndex,
    proportion: f64,
    rng: &mut R,
) -> Result<IndividualSubsample> {
    if !(0.0..=1.0).contains(&proportion) {
        return Err(GenepopError::InvalidParameter(format!(
            "proportion {} is outside [0, 1]",
            proportion
        )));
    }

    let mut subsample = IndividualSubsample::new();
    for (ordinal, block) in index.populations() {
        let count = block.individual_count();
        let size = ((count as f64 * proportion).round_ties_even() as usize).min(count);
        subsample.insert(ordinal, draw(count, size, rng));
    }
    Ok(subsample)
}

/// Keep exactly `n` randomly chosen individuals per population.
pub fn n_individuals<R: Rng + ?Sized>(
    index: &FileIndex,
    n: usize,
    rng: &mut R,
) -> Result<IndividualSubsample> {
    check_fits(index, n, "sample")?;

    let mut subsample = IndividualSubsample::new();
    for (ordinal, block) in index.populations() {
        subsample.insert(ordinal, draw(block.individual_count(), n, rng));
    }
    Ok(subsample)
}

/// Shuffle each population and drop the first `n` individuals.
pub fn by_removal<R: Rng + ?Sized>(
    index: &FileIndex,
    n: usize,
    rng: &mut R,
) -> Result<IndividualSubsample> {
    check_fits(index, n, "remove")?;

    let mut subsample = IndividualSubsample::new();
    for (ordinal, block) in index.populations() {
        let mut shuffled: Vec<usize> = (1..=block.individual_count()).collect();
        shuffled.shuffle(rng);
        let mut kept = shuffled.split_off(n);
        kept.sort_unstable();
        subsample.insert(ordinal, kept);
    }
    Ok(subsample)
}

/// Every individual of `population` except the `n`th.
///
/// The selection covers only that population.
pub fn leave_nth_out(index: &FileIndex, n: usize, population: usize) -> Result<IndividualSubsample> {
    let block = index.require_population(population)?;
    let count = block.individual_count();
    if n < 1 || n > count {
        return Err(GenepopError::InvalidParameter(format!(
            "cannot leave out individual {} of population {}: valid range is 1..={}",
            n, population, count
        )));
    }

    let mut subsample = IndividualSubsample::new();
    subsample.insert(population, (1..=count).filter(|&i| i != n).collect());
    Ok(subsample)
}

/// Populations in the given order, each checked against the file.
pub fn populations_by_list(index: &FileIndex, populations: &[usize]) -> Result<PopulationSubsample> {
    if populations.is_empty() {
        return Err(GenepopError::InvalidParameter(
            "population list is empty".to_string(),
        ));
    }
    for &p in populations {
        index.require_population(p)?;
    }
    Ok(PopulationSubsample {
        populations: populations.to_vec(),
    })
}

/// Every population ordinal contained in `ranges`, ascending.
pub fn populations_by_ranges(index: &FileIndex, ranges: &RangeCollection) -> Result<PopulationSubsample> {
    let populations: Vec<usize> = (1..=index.population_count())
        .filter(|&p| ranges.contains(p as i64))
        .collect();
    if populations.is_empty() {
        return Err(GenepopError::InvalidParameter(format!(
            "ranges '{}' select none of populations 1..={}",
            ranges,
            index.population_count()
        )));
    }
    Ok(PopulationSubsample { populations })
}

/// Header lines checked against the header, kept in header order.
///
/// Duplicates collapse, so the title can never land below a locus.
pub fn loci_by_list(index: &FileIndex, lines: &[usize]) -> Result<LociSubsample> {
    let header_len = index.header().len();
    if let Some(&bad) = lines.iter().find(|&&l| l >= header_len) {
        return Err(GenepopError::InvalidParameter(format!(
            "header line {} is out of range; header has lines 0..{}",
            bad, header_len
        )));
    }
    let mut lines = lines.to_vec();
    lines.sort_unstable();
    lines.dedup();
    Ok(LociSubsample { lines })
}

/// Title plus the loci whose 1-based position is contained in `ranges`.
pub fn loci_by_ranges(index: &FileIndex, ranges: &RangeCollection) -> Result<LociSubsample> {
    let header_len = index.header().len();
    if header_len == 0 {
        return Err(GenepopError::InvalidParameter(
            "file has no header lines to select".to_string(),
        ));
    }
    let mut lines = vec![0];
    lines.extend((1..header_len).filter(|&l| ranges.contains(l as i64)));
    Ok(LociSubsample { lines })
}

/// Title plus the loci whose names are listed, in header order.
///
/// `loci_names[i]` names header line `i + 1`. Every requested name must exist.
pub fn loci_by_name(loci_names: &[String], names: &[&str]) -> Result<LociSubsample> {
    if let Some(missing) = names.iter().find(|n| !loci_names.iter().any(|l| l == *n)) {
        return Err(GenepopError::InvalidParameter(format!(
            "no locus named '{}'",
            missing
        )));
    }
    let mut lines = vec![0];
    lines.extend(
        loci_names
            .iter()
            .enumerate()
            .filter(|(_, l)| names.contains(&l.as_str()))
            .map(|(i, _)| i + 1),
    );
    Ok(LociSubsample { lines })
}

/// `size` distinct ordinals from `1..=count`, ascending.
fn draw<R: Rng + ?Sized>(count: usize, size: usize, rng: &mut R) -> Vec<usize> {
    let mut picked: Vec<usize> = sample_indices(rng, count, size)
        .into_iter()
        .map(|i| i + 1)
        .collect();
    picked.sort_unstable();
    picked
}

fn check_fits(index: &FileIndex, n: usize, verb: &str) -> Result<()> {
    for (ordinal, block) in index.populations() {
        if n > block.individual_count() {
            return Err(GenepopError::InvalidParameter(format!(
                "cannot {} {} individuals from population {}, which has {}",
                verb,
                n,
                ordinal,
                block.individual_count()
            )));
        }
    }
    Ok(())
}
