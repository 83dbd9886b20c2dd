//! The Genepop file manager: index, subsample registry and writer.
//!
//! Build it once per source file, register selections with the
//! `subsample_*` methods, then materialize any combination of tags with
//! [`GenepopFileManager::write`] or [`GenepopFileManager::print`]. Only
//! the addressed lines are re-read from the source.

use std::borrow::Cow;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::genepop::{individual_name, locus_name, GenepopError, NameField, Result};
use crate::index::{ByteOffset, FileIndex, OffsetReader, PopulationBlock};
use crate::ranges::RangeCollection;
use crate::registry::{SubsampleKind, SubsampleRegistry};
use crate::sampling;

/// Output buffer for materialized files.
const OUTPUT_BUFFER: usize = 2 * 1024 * 1024;

/// Which registered selections a write should apply.
///
/// With no tags set a write reproduces the source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub population_tag: Option<String>,
    pub individual_tag: Option<String>,
    pub loci_tag: Option<String>,
    /// Populations with fewer selected individuals are left out entirely.
    pub min_population_size: usize,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_populations(mut self, tag: impl Into<String>) -> Self {
        self.population_tag = Some(tag.into());
        self
    }

    pub fn with_individuals(mut self, tag: impl Into<String>) -> Self {
        self.individual_tag = Some(tag.into());
        self
    }

    pub fn with_loci(mut self, tag: impl Into<String>) -> Self {
        self.loci_tag = Some(tag.into());
        self
    }

    pub fn with_min_population_size(mut self, size: usize) -> Self {
        self.min_population_size = size;
        self
    }
}

/// Counts from one write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub header_lines: usize,
    pub populations_written: usize,
    /// Selected but below `min_population_size`.
    pub populations_skipped: usize,
    pub individuals_written: usize,
}

impl fmt::Display for WriteStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Header lines: {}, Populations: {} (skipped {}), Individuals: {}",
            self.header_lines,
            self.populations_written,
            self.populations_skipped,
            self.individuals_written
        )
    }
}

/// Everything a write needs, resolved before any output is produced.
struct WritePlan<'a> {
    header_lines: Cow<'a, [usize]>,
    populations: Vec<(&'a PopulationBlock, Cow<'a, [usize]>)>,
    min_population_size: usize,
}

/// Copies indexed lines to a sink.
///
/// A source line without a terminator (the last line of a file) gets a
/// `\n` only if another line follows it.
struct LineCopier<'p, W: Write> {
    source: &'p Path,
    reader: OffsetReader,
    out: BufWriter<W>,
    buffer: Vec<u8>,
    pending_newline: bool,
}

impl<'p, W: Write> LineCopier<'p, W> {
    fn new(source: &'p Path, sink: W) -> Result<Self> {
        Ok(Self {
            source,
            reader: OffsetReader::open(source)?,
            out: BufWriter::with_capacity(OUTPUT_BUFFER, sink),
            buffer: Vec::with_capacity(1024),
            pending_newline: false,
        })
    }

    fn copy_line(&mut self, offset: ByteOffset) -> Result<()> {
        if self.reader.read_line_at(offset, &mut self.buffer)? == 0 {
            return Err(GenepopError::Io(io::Error::new(
                ErrorKind::UnexpectedEof,
                format!(
                    "{} ended before indexed offset {}; was it modified?",
                    self.source.display(),
                    offset
                ),
            )));
        }
        if self.pending_newline {
            self.out.write_all(b"\n")?;
        }
        self.out.write_all(&self.buffer)?;
        self.pending_newline = !self.buffer.ends_with(b"\n");
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Random-access reader and subsampler for one Genepop file.
pub struct GenepopFileManager {
    index: FileIndex,
    registry: SubsampleRegistry,
    rng: SmallRng,
}

impl GenepopFileManager {
    /// Index `path`, drawing randomness from the OS.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_rng(path, SmallRng::from_entropy())
    }

    /// Index `path` with a fixed seed, for reproducible subsamples.
    pub fn with_seed<P: AsRef<Path>>(path: P, seed: u64) -> Result<Self> {
        Self::with_rng(path, SmallRng::seed_from_u64(seed))
    }

    pub fn with_rng<P: AsRef<Path>>(path: P, rng: SmallRng) -> Result<Self> {
        Ok(Self {
            index: FileIndex::build(path)?,
            registry: SubsampleRegistry::new(),
            rng,
        })
    }

    /// Point at a different file: rebuild the index and drop every selection.
    ///
    /// On failure the manager keeps its current file and selections.
    pub fn set_source<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.index = FileIndex::build(path)?;
        self.registry.clear();
        Ok(())
    }

    pub fn source_path(&self) -> &Path {
        self.index.path()
    }

    pub fn index(&self) -> &FileIndex {
        &self.index
    }

    pub fn registry(&self) -> &SubsampleRegistry {
        &self.registry
    }

    /// Registered tags of one kind, sorted.
    pub fn tags(&self, kind: SubsampleKind) -> Vec<String> {
        self.registry.tags(kind)
    }

    // ---------------------------------------------------------------------
    // Sampling
    // ---------------------------------------------------------------------

    pub fn subsample_individuals_by_proportion(&mut self, proportion: f64, tag: &str) -> Result<()> {
        let subsample = sampling::by_proportion(&self.index, proportion, &mut self.rng)?;
        self.registry.insert_individuals(tag, subsample);
        Ok(())
    }

    pub fn subsample_n_individuals(&mut self, n: usize, tag: &str) -> Result<()> {
        let subsample = sampling::n_individuals(&self.index, n, &mut self.rng)?;
        self.registry.insert_individuals(tag, subsample);
        Ok(())
    }

    pub fn subsample_by_removal(&mut self, n: usize, tag: &str) -> Result<()> {
        let subsample = sampling::by_removal(&self.index, n, &mut self.rng)?;
        self.registry.insert_individuals(tag, subsample);
        Ok(())
    }

    pub fn subsample_leave_nth_out(&mut self, n: usize, population: usize, tag: &str) -> Result<()> {
        let subsample = sampling::leave_nth_out(&self.index, n, population)?;
        self.registry.insert_individuals(tag, subsample);
        Ok(())
    }

    pub fn subsample_populations_by_list(&mut self, populations: &[usize], tag: &str) -> Result<()> {
        let subsample = sampling::populations_by_list(&self.index, populations)?;
        self.registry.insert_populations(tag, subsample);
        Ok(())
    }

    pub fn subsample_populations_by_ranges(&mut self, ranges: &RangeCollection, tag: &str) -> Result<()> {
        let subsample = sampling::populations_by_ranges(&self.index, ranges)?;
        self.registry.insert_populations(tag, subsample);
        Ok(())
    }

    pub fn subsample_loci_by_list(&mut self, lines: &[usize], tag: &str) -> Result<()> {
        let subsample = sampling::loci_by_list(&self.index, lines)?;
        self.registry.insert_loci(tag, subsample);
        Ok(())
    }

    pub fn subsample_loci_by_name(&mut self, names: &[&str], tag: &str) -> Result<()> {
        let loci = self.loci_names()?;
        let subsample = sampling::loci_by_name(&loci, names)?;
        self.registry.insert_loci(tag, subsample);
        Ok(())
    }

    pub fn subsample_loci_by_ranges(&mut self, ranges: &RangeCollection, tag: &str) -> Result<()> {
        let subsample = sampling::loci_by_ranges(&self.index, ranges)?;
        self.registry.insert_loci(tag, subsample);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn population_count(&self) -> usize {
        self.index.population_count()
    }

    /// Individuals in a population of the source file.
    pub fn individual_count(&self, population: usize) -> Result<usize> {
        Ok(self.index.require_population(population)?.individual_count())
    }

    /// Individuals of `population` selected under `individual_tag`.
    pub fn individual_count_in_subsample(&self, individual_tag: &str, population: usize) -> Result<usize> {
        Ok(self.individual_numbers(population, Some(individual_tag))?.len())
    }

    /// Individual counts for the populations selected by the tags.
    pub fn individual_counts(
        &self,
        individual_tag: Option<&str>,
        population_tag: Option<&str>,
    ) -> Result<Vec<usize>> {
        self.selected_populations(population_tag, individual_tag)?
            .into_iter()
            .map(|p| Ok(self.individual_numbers(p, individual_tag)?.len()))
            .collect()
    }

    /// Selected populations left with no individuals.
    pub fn empty_populations(
        &self,
        population_tag: Option<&str>,
        individual_tag: Option<&str>,
    ) -> Result<Vec<usize>> {
        let mut empty = Vec::new();
        for p in self.selected_populations(population_tag, individual_tag)? {
            if self.individual_numbers(p, individual_tag)?.is_empty() {
                empty.push(p);
            }
        }
        Ok(empty)
    }

    /// Population ordinals under `population_tag`, or all of them.
    pub fn population_numbers(&self, population_tag: Option<&str>) -> Result<Vec<usize>> {
        self.selected_populations(population_tag, None)
    }

    /// Individual ordinals of a population, delimiter excluded.
    pub fn individual_numbers(&self, population: usize, individual_tag: Option<&str>) -> Result<Vec<usize>> {
        let block = self.index.require_population(population)?;
        match individual_tag {
            None => Ok((1..=block.individual_count()).collect()),
            Some(tag) => Ok(self.subsample_records(tag, population)?[1..].to_vec()),
        }
    }

    /// Display names of a population's individuals.
    ///
    /// The name is the text before the comma on a record's first line. A
    /// record with no comma is named by its ordinal.
    pub fn individual_names(&self, population: usize, individual_tag: Option<&str>) -> Result<Vec<String>> {
        let ordinals = self.individual_numbers(population, individual_tag)?;
        let block = self.index.require_population(population)?;
        let mut reader = OffsetReader::open(self.index.path())?;
        let mut line = Vec::new();
        let mut names = Vec::with_capacity(ordinals.len());

        for ordinal in ordinals {
            let first = block
                .record_lines(ordinal)
                .and_then(|lines| lines.first().copied())
                .ok_or_else(|| {
                    GenepopError::InvalidParameter(format!(
                        "population {} has no individual {}",
                        population, ordinal
                    ))
                })?;
            reader.read_line_at(first, &mut line)?;
            match individual_name(&line) {
                NameField::Named(name) => names.push(name),
                NameField::Missing => {
                    log::warn!(
                        "Individual {} of population {} has no name field; using its ordinal",
                        ordinal,
                        population
                    );
                    names.push(ordinal.to_string());
                }
                NameField::Ambiguous(commas) => {
                    return Err(GenepopError::MalformedFormat {
                        path: self.index.path().to_path_buf(),
                        message: format!(
                            "individual {} of population {} has {} commas on its first line",
                            ordinal, population, commas
                        ),
                    })
                }
            }
        }
        Ok(names)
    }

    /// Locus names, i.e. every header line after the title.
    pub fn loci_names(&self) -> Result<Vec<String>> {
        let offsets = self.index.header().offsets();
        let mut reader = OffsetReader::open(self.index.path())?;
        let mut line = Vec::new();
        let mut names = Vec::with_capacity(offsets.len().saturating_sub(1));
        for &offset in offsets.iter().skip(1) {
            reader.read_line_at(offset, &mut line)?;
            names.push(locus_name(&line));
        }
        Ok(names)
    }

    // ---------------------------------------------------------------------
    // Materialization
    // ---------------------------------------------------------------------

    /// Write the selection to a new file. Never overwrites.
    ///
    /// A copy that fails partway removes the file it created, so a retry
    /// does not trip over a truncated leftover.
    pub fn write<P: AsRef<Path>>(&self, dest: P, options: &WriteOptions) -> Result<WriteStats> {
        let dest = dest.as_ref();
        let plan = self.plan(options)?;
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dest)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => GenepopError::DestinationExists(PathBuf::from(dest)),
                _ => GenepopError::Io(e),
            })?;
        let stats = match self.emit(&plan, file) {
            Ok(stats) => stats,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(dest) {
                    log::warn!("Could not remove partial output {}: {}", dest.display(), cleanup);
                }
                return Err(e);
            }
        };
        log::info!("Wrote {}: {}", dest.display(), stats);
        Ok(stats)
    }

    /// Stream the selection to `sink`.
    pub fn print<W: Write>(&self, sink: &mut W, options: &WriteOptions) -> Result<WriteStats> {
        let plan = self.plan(options)?;
        self.emit(&plan, sink)
    }

    /// Resolve every tag up front so a bad tag fails before any output.
    fn plan(&self, options: &WriteOptions) -> Result<WritePlan<'_>> {
        let header_lines: Cow<'_, [usize]> = match &options.loci_tag {
            Some(tag) => Cow::Borrowed(self.registry.loci(tag)?.lines.as_slice()),
            None => Cow::Owned((0..self.index.header().len()).collect()),
        };

        let individual_tag = options.individual_tag.as_deref();
        let mut populations = Vec::new();
        for p in self.selected_populations(options.population_tag.as_deref(), individual_tag)? {
            let block = self.index.require_population(p)?;
            let records: Cow<'_, [usize]> = match individual_tag {
                Some(tag) => Cow::Borrowed(self.subsample_records(tag, p)?),
                None => Cow::Owned(block.ordinals().collect()),
            };
            populations.push((block, records));
        }

        Ok(WritePlan {
            header_lines,
            populations,
            min_population_size: options.min_population_size,
        })
    }

    fn emit<W: Write>(&self, plan: &WritePlan<'_>, sink: W) -> Result<WriteStats> {
        let mut copier = LineCopier::new(self.index.path(), sink)?;
        let mut stats = WriteStats::default();

        for &line in plan.header_lines.iter() {
            let offset = self.index.header().get(line).ok_or_else(|| {
                GenepopError::InvalidParameter(format!("no header line {}", line))
            })?;
            copier.copy_line(offset)?;
            stats.header_lines += 1;
        }

        for (block, records) in &plan.populations {
            let count = records.len().saturating_sub(1);
            if count < plan.min_population_size {
                stats.populations_skipped += 1;
                continue;
            }
            for &ordinal in records.iter() {
                let lines = block.record_lines(ordinal).ok_or_else(|| {
                    GenepopError::InvalidParameter(format!("no individual {} in population", ordinal))
                })?;
                for &offset in lines {
                    copier.copy_line(offset)?;
                }
            }
            stats.populations_written += 1;
            stats.individuals_written += count;
        }

        copier.finish()?;
        if stats.populations_skipped > 0 {
            log::debug!(
                "Skipped {} populations below minimum size {}",
                stats.populations_skipped,
                plan.min_population_size
            );
        }
        Ok(stats)
    }

    /// Populations a query or write covers.
    ///
    /// A population tag wins; otherwise an individual tag covers the
    /// populations it has selections for; otherwise all, ascending.
    fn selected_populations(
        &self,
        population_tag: Option<&str>,
        individual_tag: Option<&str>,
    ) -> Result<Vec<usize>> {
        match (population_tag, individual_tag) {
            (Some(tag), _) => Ok(self.registry.populations(tag)?.populations.clone()),
            (None, Some(tag)) => Ok(self.registry.individuals(tag)?.populations().collect()),
            (None, None) => Ok((1..=self.index.population_count()).collect()),
        }
    }

    /// Record ordinals (delimiter first) of one population in a subsample.
    fn subsample_records(&self, individual_tag: &str, population: usize) -> Result<&[usize]> {
        self.registry
            .individuals(individual_tag)?
            .records(population)
            .ok_or_else(|| {
                GenepopError::InvalidParameter(format!(
                    "individual subsample '{}' has no selection for population {}",
                    individual_tag, population
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    const SAMPLE: &str = "\
Test file
loc1
loc2
pop
a1, 0101 0202
a2, 0102
0303
a3, 0202 0202
POP
b1, 0101 0101
b2 , 0102 0102
pop
";

    fn manager() -> (NamedTempFile, GenepopFileManager) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        file.flush().unwrap();
        let mgr = GenepopFileManager::with_seed(file.path(), 11).unwrap();
        (file, mgr)
    }

    fn print_to_string(mgr: &GenepopFileManager, options: &WriteOptions) -> String {
        let mut out = Vec::new();
        mgr.print(&mut out, options).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_unrestricted_print_reproduces_source() {
        let (_f, mgr) = manager();
        assert_eq!(print_to_string(&mgr, &WriteOptions::new()), SAMPLE);
    }

    #[test]
    fn test_counts_and_names() {
        let (_f, mgr) = manager();
        assert_eq!(mgr.population_count(), 3);
        assert_eq!(mgr.individual_count(1).unwrap(), 3);
        assert_eq!(mgr.individual_counts(None, None).unwrap(), vec![3, 2, 0]);
        assert_eq!(mgr.empty_populations(None, None).unwrap(), vec![3]);
        assert_eq!(mgr.individual_names(2, None).unwrap(), vec!["b1", "b2"]);
        assert_eq!(mgr.loci_names().unwrap(), vec!["loc1", "loc2"]);
        assert!(mgr.individual_count(4).is_err());
    }

    #[test]
    fn test_leave_one_out_write() {
        let (_f, mut mgr) = manager();
        mgr.subsample_leave_nth_out(2, 1, "l_2").unwrap();
        let text = print_to_string(&mgr, &WriteOptions::new().with_individuals("l_2"));
        assert_eq!(
            text,
            "Test file\nloc1\nloc2\npop\na1, 0101 0202\na3, 0202 0202\n"
        );
        assert_eq!(mgr.individual_counts(Some("l_2"), None).unwrap(), vec![2]);
        assert_eq!(mgr.individual_count_in_subsample("l_2", 1).unwrap(), 2);
        assert_eq!(mgr.individual_numbers(1, Some("l_2")).unwrap(), vec![1, 3]);
        assert!(mgr.individual_count_in_subsample("l_2", 2).is_err());
    }

    #[test]
    fn test_individual_tag_missing_population() {
        let (_f, mut mgr) = manager();
        mgr.subsample_leave_nth_out(1, 1, "l").unwrap();
        mgr.subsample_populations_by_list(&[2], "second").unwrap();
        let options = WriteOptions::new()
            .with_individuals("l")
            .with_populations("second");
        let mut out = Vec::new();
        assert!(matches!(
            mgr.print(&mut out, &options),
            Err(GenepopError::InvalidParameter(_))
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_unknown_tags() {
        let (_f, mgr) = manager();
        for options in [
            WriteOptions::new().with_individuals("nope"),
            WriteOptions::new().with_populations("nope"),
            WriteOptions::new().with_loci("nope"),
        ] {
            let mut out = Vec::new();
            assert!(matches!(
                mgr.print(&mut out, &options),
                Err(GenepopError::UnknownTag { .. })
            ));
        }
    }

    #[test]
    fn test_loci_and_min_size() {
        let (_f, mut mgr) = manager();
        mgr.subsample_loci_by_name(&["loc2"], "l2").unwrap();
        let options = WriteOptions::new().with_loci("l2").with_min_population_size(3);
        let mut out = Vec::new();
        let stats = mgr.print(&mut out, &options).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Test file\nloc2\npop\na1, 0101 0202\na2, 0102\n0303\na3, 0202 0202\n"
        );
        assert_eq!(stats.populations_written, 1);
        assert_eq!(stats.populations_skipped, 2);
        assert_eq!(stats.individuals_written, 3);
    }

    #[test]
    fn test_write_refuses_existing_destination() {
        let (_f, mgr) = manager();
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out.gen");
        mgr.write(&dest, &WriteOptions::new()).unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), SAMPLE);
        assert!(matches!(
            mgr.write(&dest, &WriteOptions::new()),
            Err(GenepopError::DestinationExists(_))
        ));
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let (source, mgr) = manager();
        let dir = tempdir().unwrap();
        let dest = dir.path().join("partial.gen");

        // shrink the source under the index so the copy runs off its end
        std::fs::write(source.path(), b"Test file\n").unwrap();
        assert!(matches!(
            mgr.write(&dest, &WriteOptions::new()),
            Err(GenepopError::Io(_))
        ));
        assert!(!dest.exists());

        std::fs::write(source.path(), SAMPLE).unwrap();
        mgr.write(&dest, &WriteOptions::new()).unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), SAMPLE);
    }

    #[test]
    fn test_set_source_clears_registry() {
        let (_f, mut mgr) = manager();
        mgr.subsample_individuals_by_proportion(0.5, "p_0.5_r_0").unwrap();
        assert_eq!(mgr.tags(SubsampleKind::Individual).len(), 1);

        let mut other = NamedTempFile::new().unwrap();
        other.write_all(b"t\nl\npop\nx, 01\n").unwrap();
        other.flush().unwrap();
        mgr.set_source(other.path()).unwrap();
        assert_eq!(mgr.source_path(), other.path());
        assert!(mgr.registry().is_empty());
        assert_eq!(mgr.population_count(), 1);

        let mut bad = NamedTempFile::new().unwrap();
        bad.write_all(b"t\nl\n").unwrap();
        bad.flush().unwrap();
        assert!(mgr.set_source(bad.path()).is_err());
        assert_eq!(mgr.source_path(), other.path());
    }

    #[test]
    fn test_missing_final_newline() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"t\nl\npop\nx, 01\ny, 02").unwrap();
        file.flush().unwrap();
        let mut mgr = GenepopFileManager::with_seed(file.path(), 1).unwrap();

        let out = print_to_string(&mgr, &WriteOptions::new());
        assert_eq!(out, "t\nl\npop\nx, 01\ny, 02");

        mgr.subsample_populations_by_list(&[1, 1], "twice").unwrap();
        let out = print_to_string(&mgr, &WriteOptions::new().with_populations("twice"));
        assert_eq!(out, "t\nl\npop\nx, 01\ny, 02\npop\nx, 01\ny, 02");
    }
}
