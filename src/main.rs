//! gpindex: random-access indexing and subsampling of Genepop files
//!
//! Usage: gpindex <COMMAND> [OPTIONS]

use clap::{ArgGroup, Args, Parser, Subcommand};
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use genepop_index::genepop::Result;
use genepop_index::manager::{GenepopFileManager, WriteOptions};
use genepop_index::ranges::{MinMaxDelimiter, RangeCollection};
use genepop_index::sampler::{CountParams, ProportionParams, RemovalParams, SampleTag};
use genepop_index::sampling;

/// Tag the CLI registers for its loci range filter.
const LOCI_FILTER_TAG: &str = "cli_loci";

#[derive(Parser)]
#[command(name = "gpindex")]
#[command(version)]
#[command(about = "Index Genepop files and write reproducible subsamples of them", long_about = None)]
struct Cli {
    /// Verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Accept `pop` delimiter lines padded with spaces or tabs
    #[arg(long, global = true)]
    lenient_pop: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the header and populations of a file
    Info {
        /// Input Genepop file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// List the individual names of one population
    Names {
        /// Input Genepop file
        #[arg(short, long)]
        input: PathBuf,

        /// Population number (1-based)
        #[arg(short, long)]
        population: usize,
    },

    /// Write random subsamples, one file per value and replicate
    Sample(SampleArgs),

    /// Write one file per individual of the chosen populations, each missing that individual
    LeaveOneOut {
        /// Input Genepop file
        #[arg(short, long)]
        input: PathBuf,

        /// Output prefix; files are named PREFIX_n_1_r_K
        #[arg(short, long)]
        output: PathBuf,

        /// Population numbers (1-based) as a range expression, e.g. "2" or "1-3"
        #[arg(short, long)]
        populations: String,

        /// Print write statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Test values against a range expression such as "1-3,10~21,100"
    Ranges {
        /// Range expression
        expression: String,

        /// Treat '-' as a min/max delimiter as well as '~'
        #[arg(long)]
        hyphen: bool,

        /// Values to test
        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<i64>,
    },
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("scheme")
        .required(true)
        .args(["proportion", "remove", "count"]),
))]
struct SampleArgs {
    /// Input Genepop file
    #[arg(short, long)]
    input: PathBuf,

    /// Output prefix; files are named PREFIX_{tag}
    #[arg(short, long)]
    output: PathBuf,

    /// Keep this proportion of each population
    #[arg(long, value_delimiter = ',')]
    proportion: Vec<f64>,

    /// Remove this many individuals from each population
    #[arg(long, value_delimiter = ',')]
    remove: Vec<usize>,

    /// With --remove 1, draw at random instead of leaving out each individual in turn
    #[arg(long)]
    no_all_combos: bool,

    /// Keep exactly this many individuals from each population
    #[arg(long, value_delimiter = ',')]
    count: Vec<usize>,

    /// Replicates per value
    #[arg(short, long, default_value_t = 1)]
    replicates: usize,

    /// Random seed for reproducible output
    #[arg(short, long)]
    seed: Option<u64>,

    /// Only sample populations in this range expression
    #[arg(long)]
    populations: Option<String>,

    /// Only write loci (1-based) in this range expression
    #[arg(long)]
    loci: Option<String>,

    /// Leave out populations with fewer selected individuals
    #[arg(long, default_value_t = 0)]
    min_pop_size: usize,

    /// Print write statistics to stderr
    #[arg(long)]
    stats: bool,
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    // Must be set before any file is indexed
    if cli.lenient_pop {
        genepop_index::config::set_lenient_delimiters(true);
    }

    let result = match cli.command {
        Commands::Info { input } => run_info(input),
        Commands::Names { input, population } => run_names(input, population),
        Commands::Sample(args) => run_sample(args),
        Commands::LeaveOneOut {
            input,
            output,
            populations,
            stats,
        } => run_leave_one_out(input, output, &populations, stats),
        Commands::Ranges {
            expression,
            hyphen,
            values,
        } => run_ranges(&expression, hyphen, &values),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_info(input: PathBuf) -> Result<()> {
    let manager = GenepopFileManager::new(&input)?;
    let index = manager.index();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(out, "File: {}", input.display())?;
    writeln!(
        out,
        "Header lines: {} (loci: {})",
        index.header().len(),
        index.header().len().saturating_sub(1)
    )?;
    writeln!(out, "Populations: {}", manager.population_count())?;
    writeln!(out, "Individuals: {}", index.individual_total())?;
    writeln!(out, "population\tindividuals")?;
    for (ordinal, block) in index.populations() {
        writeln!(out, "{}\t{}", ordinal, block.individual_count())?;
    }

    let empty = manager.empty_populations(None, None)?;
    if !empty.is_empty() {
        let list: Vec<String> = empty.iter().map(|p| p.to_string()).collect();
        writeln!(out, "Empty populations: {}", list.join(","))?;
    }
    Ok(())
}

fn run_names(input: PathBuf, population: usize) -> Result<()> {
    let manager = GenepopFileManager::new(&input)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for name in manager.individual_names(population, None)? {
        writeln!(out, "{}", name)?;
    }
    Ok(())
}

fn run_sample(args: SampleArgs) -> Result<()> {
    let mut manager = match args.seed {
        Some(seed) => GenepopFileManager::with_seed(&args.input, seed)?,
        None => GenepopFileManager::new(&args.input)?,
    };

    let populations = match &args.populations {
        Some(expr) => selected_populations(&manager, expr)?,
        None => manager.population_numbers(None)?,
    };
    let loci = match &args.loci {
        Some(expr) => {
            let ranges = RangeCollection::parse(expr, MinMaxDelimiter::Hyphen)?;
            manager.subsample_loci_by_ranges(&ranges, LOCI_FILTER_TAG)?;
            Some(LOCI_FILTER_TAG)
        }
        None => None,
    };

    let tags = if !args.proportion.is_empty() {
        ProportionParams::new(populations, args.proportion.clone(), args.replicates).run(&mut manager)?
    } else if !args.remove.is_empty() {
        RemovalParams::new(populations, args.remove.clone(), args.replicates)
            .with_all_combos_when_one(!args.no_all_combos)
            .run(&mut manager)?
    } else {
        CountParams::new(populations, args.count.clone(), args.replicates).run(&mut manager)?
    };

    write_all(&manager, &args.output, &tags, loci, args.min_pop_size, args.stats)
}

fn run_leave_one_out(input: PathBuf, output: PathBuf, populations: &str, stats: bool) -> Result<()> {
    let mut manager = GenepopFileManager::new(&input)?;
    let populations = selected_populations(&manager, populations)?;
    let tags = RemovalParams::new(populations, vec![1], 1).run(&mut manager)?;
    write_all(&manager, &output, &tags, None, 0, stats)
}

/// Population ordinals named by a hyphen range expression, in file order.
fn selected_populations(manager: &GenepopFileManager, expr: &str) -> Result<Vec<usize>> {
    let ranges = RangeCollection::parse(expr, MinMaxDelimiter::Hyphen)?;
    Ok(sampling::populations_by_ranges(manager.index(), &ranges)?.populations)
}

/// Write each registered subsample to `PREFIX_{tag}`.
fn write_all(
    manager: &GenepopFileManager,
    prefix: &Path,
    tags: &[SampleTag],
    loci: Option<&str>,
    min_pop_size: usize,
    stats: bool,
) -> Result<()> {
    for tag in tags {
        let mut options = tag.write_options().with_min_population_size(min_pop_size);
        if let Some(loci) = loci {
            options = options.with_loci(loci);
        }
        let dest = output_path(prefix, &tag.individual_tag);
        let result = manager.write(&dest, &options)?;
        if stats {
            eprintln!("{}: {}", dest.display(), result);
        }
    }
    Ok(())
}

fn run_ranges(expression: &str, hyphen: bool, values: &[i64]) -> Result<()> {
    let delimiter = if hyphen {
        MinMaxDelimiter::Hyphen
    } else {
        MinMaxDelimiter::Tilde
    };
    let ranges = RangeCollection::parse(expression, delimiter)?;
    log::info!("Parsed '{}' as {}", expression, ranges);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for &value in values {
        writeln!(out, "{}\t{}", value, ranges.contains(value))?;
    }
    Ok(())
}

/// `PREFIX_{tag}`, keeping any directory part of the prefix.
fn output_path(prefix: &Path, tag: &str) -> PathBuf {
    let mut name: OsString = prefix.as_os_str().to_os_string();
    name.push("_");
    name.push(tag);
    PathBuf::from(name)
}
