use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use harvest_core::clean::dedup::{DedupKeyMode, SeenKeys};
use harvest_core::clean::filter::{LineCountMode, MethodFilter};
use harvest_core::collect::local::LocalCheckouts;
use harvest_core::extract::methods::{extract_methods, ExtractOptions};
use harvest_core::extract::tokenizer::tokenize;
use harvest_core::store::{CsvSink, MultiSink, SqliteSink};
use harvest_core::{HarvestConfig, HarvestError, Harvester};

#[derive(Parser)]
#[command(name = "harvest", version)]
#[command(about = "Build a dataset of Java methods from source repositories")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest every repository of a local-checkout manifest
    Run(RunArgs),

    /// Print the methods of one Java file as JSON lines
    Extract {
        file: PathBuf,

        /// Include methods the cleaning rules would reject
        #[arg(long)]
        all: bool,

        #[arg(long)]
        include_constructors: bool,
    },

    /// Print the tokens of a file, one `kind<TAB>text` per line
    Tokenize { file: PathBuf },
}

#[derive(Args)]
struct RunArgs {
    /// JSON manifest listing the checkouts
    #[arg(short, long)]
    manifest: PathBuf,

    /// CSV dataset to write
    #[arg(short, long)]
    output: PathBuf,

    /// Also write rows to this SQLite database
    #[arg(long)]
    sqlite: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep rows already in the outputs and skip their duplicates
    #[arg(long, requires = "sqlite")]
    resume: bool,

    #[arg(long)]
    dedup_key: Option<DedupKeyMode>,

    #[arg(long)]
    line_count_mode: Option<LineCountMode>,

    #[arg(long)]
    min_lines: Option<usize>,

    #[arg(long)]
    max_lines: Option<usize>,

    #[arg(short, long)]
    workers: Option<usize>,

    #[arg(long)]
    max_files: Option<usize>,

    /// Row cap; 0 lifts it
    #[arg(long)]
    max_samples: Option<usize>,

    #[arg(long)]
    include_constructors: bool,
}

impl RunArgs {
    /// Flags win over the TOML file and `HARVEST_*` variables already in
    /// `config`.
    fn apply(&self, config: &mut HarvestConfig) {
        if let Some(v) = self.dedup_key {
            config.dedup_key = v;
        }
        if let Some(v) = self.line_count_mode {
            config.line_count_mode = v;
        }
        if let Some(v) = self.min_lines {
            config.min_lines = v;
        }
        if let Some(v) = self.max_lines {
            config.max_lines = v;
        }
        if let Some(v) = self.workers {
            config.workers = v;
        }
        if let Some(v) = self.max_files {
            config.max_files_per_repo = v;
        }
        if let Some(v) = self.max_samples {
            config.max_samples = (v > 0).then_some(v);
        }
        if self.include_constructors {
            config.include_constructors = true;
        }
    }

    fn resolve(&self, mut config: HarvestConfig) -> anyhow::Result<HarvestConfig> {
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }
}

/// 2 when every attempted repository failed, 1 for any other error.
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<HarvestError>() {
        Some(HarvestError::AllRepositoriesFailed { .. }) => 2,
        _ => 1,
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_status(&err))
        }
    }
}

fn run_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run(&args),
        Commands::Extract {
            file,
            all,
            include_constructors,
        } => extract(&file, all, include_constructors),
        Commands::Tokenize { file } => {
            let text = read_source(&file)?;
            for token in tokenize(&text) {
                println!("{}\t{}", token.kind.as_str(), token.text);
            }
            Ok(())
        }
    }
}

fn run(args: &RunArgs) -> anyhow::Result<()> {
    let config = args.resolve(HarvestConfig::load(args.config.as_deref())?)?;

    let source = LocalCheckouts::from_manifest(&args.manifest, &config)
        .with_context(|| format!("reading manifest {}", args.manifest.display()))?;

    let mut sink = MultiSink::new();
    let mut seen = SeenKeys::new();
    if args.resume {
        sink.push(Box::new(CsvSink::append_to(&args.output)?));
    } else {
        sink.push(Box::new(CsvSink::create(&args.output)?));
    }
    if let Some(db) = &args.sqlite {
        let sqlite = if args.resume {
            let sqlite = SqliteSink::resume(db, config.dedup_key)?;
            seen = sqlite.seen_keys()?;
            tracing::info!(rows = seen.len(), "resuming from existing dataset");
            sqlite
        } else {
            SqliteSink::create(db, config.dedup_key)?
        };
        sink.push(Box::new(sqlite));
    }

    let harvester = Harvester::new(config)?;
    let (stats, _) = harvester.run_with_seen(&source, &source, &mut sink, seen)?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn extract(file: &Path, all: bool, include_constructors: bool) -> anyhow::Result<()> {
    let text = read_source(file)?;
    let path = file.to_string_lossy();
    let options = ExtractOptions {
        include_constructors,
    };
    let filter = MethodFilter::default();
    for candidate in extract_methods(&text, &path, options)? {
        if all || filter.accept(&candidate) {
            println!("{}", serde_json::to_string(&candidate)?);
        }
    }
    Ok(())
}

fn read_source(file: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(_) => bail!(HarvestError::Encoding {
            path: file.display().to_string(),
        }),
    }
}
