//! Batch sampling sessions over one [`GenepopFileManager`].
//!
//! A session registers its population list under one population tag,
//! then one individual subsample per value and replicate, named with the
//! [`SampleScheme`] convention. [`SampleTag`]s returned by `run` say which
//! tags to hand the writer for each output file.

use crate::genepop::{GenepopError, Result};
use crate::manager::{GenepopFileManager, WriteOptions};
use crate::sampling::SampleScheme;

/// Population tag used when the caller does not name one.
pub const DEFAULT_POPULATION_TAG: &str = "population_numbers";

/// One registered individual subsample and the population tag it pairs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleTag {
    pub individual_tag: String,
    /// `None` for leave-one-out selections, which cover a single population.
    pub population_tag: Option<String>,
}

impl SampleTag {
    /// Options selecting this subsample.
    pub fn write_options(&self) -> WriteOptions {
        let options = WriteOptions::new().with_individuals(self.individual_tag.as_str());
        match &self.population_tag {
            Some(tag) => options.with_populations(tag.as_str()),
            None => options,
        }
    }
}

/// Keep each listed proportion of every population, `replicates` times.
#[derive(Debug, Clone, PartialEq)]
pub struct ProportionParams {
    pub population_numbers: Vec<usize>,
    pub proportions: Vec<f64>,
    pub replicates: usize,
    pub population_subsample_tag: String,
}

impl ProportionParams {
    pub fn new(population_numbers: Vec<usize>, proportions: Vec<f64>, replicates: usize) -> Self {
        Self {
            population_numbers,
            proportions,
            replicates,
            population_subsample_tag: DEFAULT_POPULATION_TAG.to_string(),
        }
    }

    pub fn with_population_subsample_tag(mut self, tag: impl Into<String>) -> Self {
        self.population_subsample_tag = tag.into();
        self
    }

    /// Register the population tag and every `p_{proportion}_r_{replicate}` tag.
    pub fn run(&self, manager: &mut GenepopFileManager) -> Result<Vec<SampleTag>> {
        register_replicates(
            manager,
            &self.population_numbers,
            &self.population_subsample_tag,
            SampleScheme::Proportion,
            &self.proportions,
            self.replicates,
            |m, p, tag| m.subsample_individuals_by_proportion(p, tag),
        )
    }
}

/// Keep exactly N of every population for each listed N, `replicates` times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountParams {
    pub population_numbers: Vec<usize>,
    pub counts: Vec<usize>,
    pub replicates: usize,
    pub population_subsample_tag: String,
}

impl CountParams {
    pub fn new(population_numbers: Vec<usize>, counts: Vec<usize>, replicates: usize) -> Self {
        Self {
            population_numbers,
            counts,
            replicates,
            population_subsample_tag: DEFAULT_POPULATION_TAG.to_string(),
        }
    }

    pub fn with_population_subsample_tag(mut self, tag: impl Into<String>) -> Self {
        self.population_subsample_tag = tag.into();
        self
    }

    pub fn run(&self, manager: &mut GenepopFileManager) -> Result<Vec<SampleTag>> {
        register_replicates(
            manager,
            &self.population_numbers,
            &self.population_subsample_tag,
            SampleScheme::Count,
            &self.counts,
            self.replicates,
            |m, n, tag| m.subsample_n_individuals(n, tag),
        )
    }
}

/// Remove N random individuals from every population for each listed N.
///
/// With `all_combos_when_one` set (the default), N = 1 is not sampled at
/// random: every individual of every listed population is left out once,
/// one subsample each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalParams {
    pub population_numbers: Vec<usize>,
    pub n_to_remove: Vec<usize>,
    pub replicates: usize,
    pub population_subsample_tag: String,
    pub all_combos_when_one: bool,
}

impl RemovalParams {
    pub fn new(population_numbers: Vec<usize>, n_to_remove: Vec<usize>, replicates: usize) -> Self {
        Self {
            population_numbers,
            n_to_remove,
            replicates,
            population_subsample_tag: DEFAULT_POPULATION_TAG.to_string(),
            all_combos_when_one: true,
        }
    }

    pub fn with_population_subsample_tag(mut self, tag: impl Into<String>) -> Self {
        self.population_subsample_tag = tag.into();
        self
    }

    pub fn with_all_combos_when_one(mut self, enabled: bool) -> Self {
        self.all_combos_when_one = enabled;
        self
    }

    pub fn run(&self, manager: &mut GenepopFileManager) -> Result<Vec<SampleTag>> {
        let mut tags = Vec::new();
        for &n in &self.n_to_remove {
            if n == 1 && self.all_combos_when_one {
                tags.extend(self.leave_each_out(manager)?);
            } else {
                tags.extend(register_replicates(
                    manager,
                    &self.population_numbers,
                    &self.population_subsample_tag,
                    SampleScheme::Removal,
                    &[n],
                    self.replicates,
                    |m, n, tag| m.subsample_by_removal(n, tag),
                )?);
            }
        }
        Ok(tags)
    }

    /// One leave-nth-out subsample per individual of each listed population.
    ///
    /// Tags are `n_1_r_{k}` with `k` counting across populations, so no two
    /// populations share a tag.
    fn leave_each_out(&self, manager: &mut GenepopFileManager) -> Result<Vec<SampleTag>> {
        check_batch(&self.population_numbers, self.replicates)?;
        manager.subsample_populations_by_list(&self.population_numbers, &self.population_subsample_tag)?;

        let mut tags = Vec::new();
        for &population in &self.population_numbers {
            for n in 1..=manager.individual_count(population)? {
                let tag = SampleScheme::Removal.tag(1, tags.len());
                manager.subsample_leave_nth_out(n, population, &tag)?;
                tags.push(SampleTag {
                    individual_tag: tag,
                    population_tag: None,
                });
            }
        }
        log::info!(
            "Registered {} leave-one-out subsamples over {} populations",
            tags.len(),
            self.population_numbers.len()
        );
        Ok(tags)
    }
}

fn register_replicates<V, F>(
    manager: &mut GenepopFileManager,
    population_numbers: &[usize],
    population_tag: &str,
    scheme: SampleScheme,
    values: &[V],
    replicates: usize,
    mut subsample: F,
) -> Result<Vec<SampleTag>>
where
    V: Copy + std::fmt::Display,
    F: FnMut(&mut GenepopFileManager, V, &str) -> Result<()>,
{
    check_batch(population_numbers, replicates)?;
    manager.subsample_populations_by_list(population_numbers, population_tag)?;

    let mut tags = Vec::with_capacity(values.len() * replicates);
    for &value in values {
        for replicate in 0..replicates {
            let tag = scheme.tag(value, replicate);
            subsample(manager, value, &tag)?;
            tags.push(SampleTag {
                individual_tag: tag,
                population_tag: Some(population_tag.to_string()),
            });
        }
    }
    log::info!(
        "Registered {} '{}' subsamples for populations {:?}",
        tags.len(),
        scheme.prefix(),
        population_numbers
    );
    Ok(tags)
}

fn check_batch(population_numbers: &[usize], replicates: usize) -> Result<()> {
    if replicates == 0 {
        return Err(GenepopError::InvalidParameter(
            "replicates must be at least 1".to_string(),
        ));
    }
    if population_numbers.is_empty() {
        return Err(GenepopError::InvalidParameter(
            "population list is empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SubsampleKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Populations of sizes 3, 2 and 4.
    fn manager() -> (NamedTempFile, GenepopFileManager) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            b"title\nlocA\npop\na1, 01\na2, 02\na3, 03\npop\nb1, 01\nb2, 02\npop\nc1, 01\nc2, 02\nc3, 03\nc4, 04\n",
        )
        .unwrap();
        file.flush().unwrap();
        let mgr = GenepopFileManager::with_seed(file.path(), 17).unwrap();
        (file, mgr)
    }

    #[test]
    fn test_proportion_session_registers_every_tag() {
        let (_f, mut mgr) = manager();
        let params = ProportionParams::new(vec![1, 3], vec![0.5, 1.0], 2)
            .with_population_subsample_tag("sample_prop");
        let tags = params.run(&mut mgr).unwrap();

        let names: Vec<&str> = tags.iter().map(|t| t.individual_tag.as_str()).collect();
        assert_eq!(names, vec!["p_0.5_r_0", "p_0.5_r_1", "p_1_r_0", "p_1_r_1"]);
        assert!(tags
            .iter()
            .all(|t| t.population_tag.as_deref() == Some("sample_prop")));
        assert_eq!(mgr.tags(SubsampleKind::Population), vec!["sample_prop"]);
        assert_eq!(mgr.tags(SubsampleKind::Individual).len(), 4);

        assert_eq!(
            mgr.individual_counts(Some("p_1_r_0"), Some("sample_prop")).unwrap(),
            vec![3, 4]
        );
    }

    #[test]
    fn test_all_combos_across_two_populations() {
        let (_f, mut mgr) = manager();
        let params = RemovalParams::new(vec![1, 2], vec![1], 5);
        let tags = params.run(&mut mgr).unwrap();

        // three from the first population, two from the second
        let names: Vec<&str> = tags.iter().map(|t| t.individual_tag.as_str()).collect();
        assert_eq!(names, vec!["n_1_r_0", "n_1_r_1", "n_1_r_2", "n_1_r_3", "n_1_r_4"]);
        assert!(tags.iter().all(|t| t.population_tag.is_none()));

        assert_eq!(mgr.individual_numbers(1, Some("n_1_r_1")).unwrap(), vec![1, 3]);
        assert_eq!(mgr.individual_numbers(2, Some("n_1_r_3")).unwrap(), vec![2]);
        assert_eq!(mgr.individual_numbers(2, Some("n_1_r_4")).unwrap(), vec![1]);
        assert!(mgr.individual_numbers(1, Some("n_1_r_4")).is_err());
        assert_eq!(mgr.individual_counts(Some("n_1_r_4"), None).unwrap(), vec![1]);
    }

    #[test]
    fn test_removal_without_all_combos_is_random() {
        let (_f, mut mgr) = manager();
        let params = RemovalParams::new(vec![1, 2, 3], vec![1, 2], 2).with_all_combos_when_one(false);
        let tags = params.run(&mut mgr).unwrap();

        let names: Vec<&str> = tags.iter().map(|t| t.individual_tag.as_str()).collect();
        assert_eq!(names, vec!["n_1_r_0", "n_1_r_1", "n_2_r_0", "n_2_r_1"]);
        assert_eq!(
            mgr.individual_counts(Some("n_2_r_1"), Some(DEFAULT_POPULATION_TAG))
                .unwrap(),
            vec![1, 0, 2]
        );
    }

    #[test]
    fn test_count_session_and_bad_batches() {
        let (_f, mut mgr) = manager();
        let tags = CountParams::new(vec![2], vec![2], 1).run(&mut mgr).unwrap();
        assert_eq!(tags[0].individual_tag, "c_2_r_0");

        assert!(CountParams::new(vec![1], vec![1], 0).run(&mut mgr).is_err());
        assert!(CountParams::new(vec![], vec![1], 1).run(&mut mgr).is_err());
        // population 2 has only two individuals
        assert!(CountParams::new(vec![1], vec![3], 1).run(&mut mgr).is_err());
    }

    #[test]
    fn test_sample_tags_drive_the_writer() {
        let (_f, mut mgr) = manager();
        let mut tags = RemovalParams::new(vec![2], vec![1], 1).run(&mut mgr).unwrap();
        tags.extend(
            ProportionParams::new(vec![2, 3], vec![0.5], 1)
                .run(&mut mgr)
                .unwrap(),
        );

        let mut out = Vec::new();
        mgr.print(&mut out, &tags[0].write_options()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "title\nlocA\npop\nb2, 02\n"
        );

        let mut out = Vec::new();
        let stats = mgr.print(&mut out, &tags[2].write_options()).unwrap();
        assert_eq!(stats.populations_written, 2);
        assert_eq!(stats.individuals_written, 3);
    }
}
