//! Named subsample selections.
//!
//! A selection never copies file content; it only lists ordinals into a
//! [`FileIndex`](crate::index::FileIndex). Each kind has its own tag
//! namespace and re-registering a tag replaces the old selection.

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashMap;

use crate::genepop::{GenepopError, Result};

/// The three tag namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubsampleKind {
    Population,
    Individual,
    Loci,
}

impl fmt::Display for SubsampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubsampleKind::Population => write!(f, "population"),
            SubsampleKind::Individual => write!(f, "individual"),
            SubsampleKind::Loci => write!(f, "loci"),
        }
    }
}

/// Population ordinals, in the order they will be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationSubsample {
    pub populations: Vec<usize>,
}

/// Per-population individual ordinals.
///
/// Every list starts with 0, the delimiter, followed by ascending
/// individual ordinals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndividualSubsample {
    by_population: BTreeMap<usize, Vec<usize>>,
}

impl IndividualSubsample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a selection for one population; `0` is prepended.
    pub fn insert(&mut self, population: usize, mut individuals: Vec<usize>) {
        individuals.insert(0, 0);
        self.by_population.insert(population, individuals);
    }

    /// Ordinals for a population, delimiter included.
    pub fn records(&self, population: usize) -> Option<&[usize]> {
        self.by_population.get(&population).map(|v| v.as_slice())
    }

    /// Selected individuals of a population, delimiter excluded.
    pub fn individuals(&self, population: usize) -> Option<&[usize]> {
        self.records(population).map(|r| &r[1..])
    }

    /// Number of selected individuals in a population.
    pub fn count(&self, population: usize) -> Option<usize> {
        self.individuals(population).map(|i| i.len())
    }

    /// Populations this selection covers, ascending.
    pub fn populations(&self) -> impl Iterator<Item = usize> + '_ {
        self.by_population.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.by_population.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_population.is_empty()
    }
}

/// Header-line ordinals (title is 0), in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LociSubsample {
    pub lines: Vec<usize>,
}

/// All selections registered against one file.
#[derive(Debug, Clone, Default)]
pub struct SubsampleRegistry {
    populations: FxHashMap<String, PopulationSubsample>,
    individuals: FxHashMap<String, IndividualSubsample>,
    loci: FxHashMap<String, LociSubsample>,
}

impl SubsampleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_populations(&mut self, tag: impl Into<String>, subsample: PopulationSubsample) {
        self.populations.insert(tag.into(), subsample);
    }

    pub fn insert_individuals(&mut self, tag: impl Into<String>, subsample: IndividualSubsample) {
        self.individuals.insert(tag.into(), subsample);
    }

    pub fn insert_loci(&mut self, tag: impl Into<String>, subsample: LociSubsample) {
        self.loci.insert(tag.into(), subsample);
    }

    pub fn populations(&self, tag: &str) -> Result<&PopulationSubsample> {
        self.populations
            .get(tag)
            .ok_or_else(|| unknown(SubsampleKind::Population, tag))
    }

    pub fn individuals(&self, tag: &str) -> Result<&IndividualSubsample> {
        self.individuals
            .get(tag)
            .ok_or_else(|| unknown(SubsampleKind::Individual, tag))
    }

    pub fn loci(&self, tag: &str) -> Result<&LociSubsample> {
        self.loci.get(tag).ok_or_else(|| unknown(SubsampleKind::Loci, tag))
    }

    /// Registered tags of one kind, sorted.
    pub fn tags(&self, kind: SubsampleKind) -> Vec<String> {
        let mut tags: Vec<String> = match kind {
            SubsampleKind::Population => self.populations.keys().cloned().collect(),
            SubsampleKind::Individual => self.individuals.keys().cloned().collect(),
            SubsampleKind::Loci => self.loci.keys().cloned().collect(),
        };
        tags.sort();
        tags
    }

    /// Drop every selection.
    pub fn clear(&mut self) {
        self.populations.clear();
        self.individuals.clear();
        self.loci.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.populations.is_empty() && self.individuals.is_empty() && self.loci.is_empty()
    }
}

fn unknown(kind: SubsampleKind, tag: &str) -> GenepopError {
    GenepopError::UnknownTag {
        kind,
        tag: tag.to_string(),
    }
}
