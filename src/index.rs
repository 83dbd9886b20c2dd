//! Byte-offset index over a Genepop file.
//!
//! One forward pass records where every line starts. Lines before the
//! first `pop` delimiter form the [`HeaderIndex`]; each delimiter opens a
//! [`PopulationBlock`] addressed by population ordinal (1-based), then by
//! individual ordinal (0 is the delimiter itself), then by physical line.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::genepop::{has_field_separator, is_pop_line, GenepopError, Result};

/// First byte of a physical line. `u64` so offsets past 4 GiB are fine.
pub type ByteOffset = u64;

/// Read buffer used for scanning and re-reading lines.
const INPUT_BUFFER: usize = 256 * 1024;

/// Initial capacity of the per-line buffer.
const LINE_BUFFER: usize = 1024;

/// Offsets of the title and loci lines, keyed by 0-based line ordinal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderIndex {
    offsets: Vec<ByteOffset>,
}

impl HeaderIndex {
    #[inline]
    pub fn get(&self, ordinal: usize) -> Option<ByteOffset> {
        self.offsets.get(ordinal).copied()
    }

    /// Number of header lines, title included.
    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn offsets(&self) -> &[ByteOffset] {
        &self.offsets
    }
}

/// Line offsets of one population, stored as a flat arena.
///
/// `record_starts[i]` is where individual `i`'s lines begin in `lines`;
/// record 0 is the delimiter and always spans exactly one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationBlock {
    lines: Vec<ByteOffset>,
    record_starts: Vec<usize>,
}

impl PopulationBlock {
    fn new(delimiter: ByteOffset) -> Self {
        Self {
            lines: vec![delimiter],
            record_starts: vec![0],
        }
    }

    fn begin_individual(&mut self, offset: ByteOffset) {
        self.record_starts.push(self.lines.len());
        self.lines.push(offset);
    }

    fn continue_individual(&mut self, offset: ByteOffset) {
        self.lines.push(offset);
    }

    /// Offset of the `pop` line.
    #[inline]
    pub fn delimiter_offset(&self) -> ByteOffset {
        self.lines[0]
    }

    /// Number of individuals, not counting the delimiter.
    #[inline]
    pub fn individual_count(&self) -> usize {
        self.record_starts.len() - 1
    }

    /// All physical lines of record `ordinal`, in file order.
    pub fn record_lines(&self, ordinal: usize) -> Option<&[ByteOffset]> {
        let start = *self.record_starts.get(ordinal)?;
        let end = self
            .record_starts
            .get(ordinal + 1)
            .copied()
            .unwrap_or(self.lines.len());
        Some(&self.lines[start..end])
    }

    /// Every record ordinal, delimiter included: `0..=individual_count`.
    pub fn ordinals(&self) -> impl Iterator<Item = usize> {
        0..self.record_starts.len()
    }

    /// Physical lines in the block, delimiter included.
    #[inline]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

/// The complete offset index of one source file.
#[derive(Debug, Clone)]
pub struct FileIndex {
    path: PathBuf,
    header: HeaderIndex,
    populations: Vec<PopulationBlock>,
}

impl FileIndex {
    /// Scan `path` once and record every line offset.
    ///
    /// Fails with `MalformedFormat` when no `pop` line exists or when a
    /// locus line carries commas (the comma-joined loci header variant).
    pub fn build<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let reader = BufReader::with_capacity(INPUT_BUFFER, file);
        Self::scan(reader, path)
    }

    fn scan<R: BufRead>(mut reader: R, path: PathBuf) -> Result<Self> {
        let mut header = HeaderIndex::default();
        let mut populations: Vec<PopulationBlock> = Vec::new();
        let mut buffer = Vec::with_capacity(LINE_BUFFER);
        let mut position: u64 = 0;
        let mut line_number: u64 = 0;

        loop {
            buffer.clear();
            let bytes_read = reader.read_until(b'\n', &mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            position += bytes_read as u64;
            line_number += 1;
            let offset = position - bytes_read as u64;

            if is_pop_line(&buffer) {
                populations.push(PopulationBlock::new(offset));
                continue;
            }

            match populations.last_mut() {
                None => {
                    // the title line may hold anything
                    if !header.is_empty() && has_field_separator(&buffer) {
                        return Err(GenepopError::MalformedFormat {
                            path,
                            message: format!(
                                "line {}: comma-separated loci lists are not supported; \
                                 expected one locus name per line",
                                line_number
                            ),
                        });
                    }
                    header.offsets.push(offset);
                }
                Some(block) if has_field_separator(&buffer) => block.begin_individual(offset),
                Some(block) if block.individual_count() == 0 => {
                    log::warn!(
                        "{}: line {} follows a 'pop' line but has no comma; treating it as an individual",
                        path.display(),
                        line_number
                    );
                    block.begin_individual(offset);
                }
                Some(block) => block.continue_individual(offset),
            }
        }

        if populations.is_empty() {
            return Err(GenepopError::MalformedFormat {
                path,
                message: format!("no 'pop' delimiter line found in {} lines", line_number),
            });
        }

        let index = Self {
            path,
            header,
            populations,
        };
        log::info!(
            "Indexed {}: {} header lines, {} populations, {} individuals",
            index.path.display(),
            index.header.len(),
            index.population_count(),
            index.individual_total()
        );
        Ok(index)
    }

    /// The file this index addresses.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &HeaderIndex {
        &self.header
    }

    #[inline]
    pub fn population_count(&self) -> usize {
        self.populations.len()
    }

    /// Population by 1-based ordinal.
    #[inline]
    pub fn population(&self, ordinal: usize) -> Option<&PopulationBlock> {
        ordinal.checked_sub(1).and_then(|i| self.populations.get(i))
    }

    /// Population by 1-based ordinal, or `InvalidParameter` naming the bound.
    pub fn require_population(&self, ordinal: usize) -> Result<&PopulationBlock> {
        self.population(ordinal).ok_or_else(|| {
            GenepopError::InvalidParameter(format!(
                "population {} is out of range; file has populations 1..={}",
                ordinal,
                self.population_count()
            ))
        })
    }

    /// `(ordinal, block)` pairs in file order.
    pub fn populations(&self) -> impl Iterator<Item = (usize, &PopulationBlock)> {
        self.populations.iter().enumerate().map(|(i, b)| (i + 1, b))
    }

    /// Individuals across all populations.
    pub fn individual_total(&self) -> usize {
        self.populations.iter().map(|b| b.individual_count()).sum()
    }
}

/// Re-reads indexed lines from a fresh handle on the source file.
///
/// Seeks only when the requested offset is not where the last read
/// stopped, so sequential writes stay buffered.
pub struct OffsetReader {
    reader: BufReader<File>,
    position: u64,
}

impl OffsetReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::with_capacity(INPUT_BUFFER, file),
            position: 0,
        })
    }

    /// Read the line starting at `offset` into `buffer`, terminator included.
    pub fn read_line_at(&mut self, offset: ByteOffset, buffer: &mut Vec<u8>) -> Result<usize> {
        if offset != self.position {
            self.reader.seek(SeekFrom::Start(offset))?;
        }
        buffer.clear();
        let bytes_read = self.reader.read_until(b'\n', buffer)?;
        self.position = offset + bytes_read as u64;
        Ok(bytes_read)
    }
}
