use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing::{Level, info, subscriber::set_global_default};
fn init_tracing(verbosity: u8) {
    // Map -q/-v to tracing levels; default INFO
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let env_filter = EnvFilter::from_default_env()
        .add_directive(level.into());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr) // logs to stderr
        .with_target(false)
        .with_level(true)
        .compact()
        .finish();

    // Ignore error if already set in tests or env
    let _ = set_global_default(subscriber);
}

use dupr::config::FactoryMode;
use dupr::engine::{EngineCommand, EngineEvent, ReviewEngine};
use dupr::location::PotentialDuplicatesSearchContext;
use dupr::{
    DuplicatePairDecision, DuplicateType, MediaId, MediaResult, MediaResultPair, MemoryStore,
    ReviewConfig, ReviewSession, ServiceKey,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn main() {
    let opts = Opts::parse();
    init_tracing(opts.verbose.saturating_sub(opts.quiet));
    if let Err(e) = run(opts) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(opts: Opts) -> anyhow::Result<()> {
    match opts.command {
        Command::Review {
            store,
            mode,
            limit,
            seed,
            config,
            decide,
            max_batches,
            save,
        } => {
            let mut review_config = load_config(config.as_deref())?;
            if let Some(mode) = mode {
                review_config.factory.mode = mode.into();
            }
            if let Some(limit) = limit {
                review_config.factory.no_more_than = limit;
            }
            if seed.is_some() {
                review_config.factory.seed = seed;
            }
            review_config.validate()?;
            review(&store, &review_config, decide, max_batches, save)?;
        }
        Command::Status { store } => {
            let store = MemoryStore::load_json(&store)?;
            println!("Files: {}", store.file_count()?);
            println!("Potential pairs: {}", store.potential_pair_count()?);
            println!("Potential groups: {}", store.potential_group_count()?);
        }
        Command::Generate { out, files, pairs, seed } => {
            let store = generate(files, pairs, seed)?;
            store.save_json(&out)?;
            println!(
                "Wrote {} files and {} potential pairs to {}",
                store.file_count()?,
                store.potential_pair_count()?,
                out.display()
            );
        }
    }
    Ok(())
}

/// --config, then $DUPR_CONFIG, then the platform config dir, then defaults
fn load_config(cli_arg: Option<&Path>) -> anyhow::Result<ReviewConfig> {
    if let Some(path) = cli_arg {
        return Ok(ReviewConfig::load(path)?);
    }
    if let Ok(path) = std::env::var("DUPR_CONFIG") {
        return Ok(ReviewConfig::load(path)?);
    }
    if let Some(path) = ReviewConfig::default_path().filter(|p| p.exists()) {
        info!("Using config {}", path.display());
        return Ok(ReviewConfig::load(path)?);
    }
    Ok(ReviewConfig::default())
}

fn review(
    store_path: &Path,
    config: &ReviewConfig,
    decide: Decide,
    max_batches: Option<usize>,
    save: bool,
) -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::load_json(store_path)?);
    let session = ReviewSession::from_config(
        store.clone(),
        PotentialDuplicatesSearchContext::default(),
        config,
    );
    let engine = ReviewEngine::start(session);
    engine.send(EngineCommand::Start)?;

    let mut batches = 0;
    loop {
        match engine.recv()? {
            EngineEvent::Started => info!("Review started"),
            EngineEvent::Status(status) => info!("{status}"),
            EngineEvent::BatchReady(batch) => {
                batches += 1;
                println!("Batch {batches}: {} pairs", batch.len());
                for pair in &batch {
                    print_pair(pair);
                }
                let decisions = batch
                    .into_iter()
                    .map(|pair| decide.decision(pair, config))
                    .collect();
                engine.send(EngineCommand::Commit(decisions))?;
            }
            EngineEvent::Committed(summary) => {
                println!(
                    "  committed {} packages ({} skipped)",
                    summary.packages_written, summary.skipped
                );
                if max_batches.is_some_and(|max| batches >= max) {
                    break;
                }
                // skipping leaves the pool unchanged, so one pass is all there is
                if decide == Decide::Skip && summary.skipped == summary.decisions {
                    break;
                }
            }
            EngineEvent::Exhausted => {
                println!("No pairs left to review");
                break;
            }
            EngineEvent::Error(e) => anyhow::bail!(e),
            EngineEvent::Completed => break,
        }
    }
    engine.shutdown()?;

    if save {
        store.save_json(store_path)?;
        println!("Saved {}", store_path.display());
    }
    Ok(())
}

fn print_pair(pair: &MediaResultPair) {
    println!(
        "  A {} ({} bytes)  B {} ({} bytes)  distance {}",
        pair.a.hash, pair.a.size, pair.b.hash, pair.b.size, pair.distance
    );
}

fn generate(files: u64, pairs: usize, seed: u64) -> anyhow::Result<MemoryStore> {
    anyhow::ensure!(files >= 2, "need at least two files to make pairs");
    let mut rng = StdRng::seed_from_u64(seed);
    let store = MemoryStore::new();
    let now = chrono::Utc::now();

    for id in 0..files {
        let mut media = MediaResult::new(
            MediaId(id),
            format!("{:016x}", rng.r#gen::<u64>()),
            if rng.gen_bool(0.8) { "image/jpeg" } else { "image/png" },
            rng.gen_range(10_000..5_000_000),
        )
        .with_resolution(rng.gen_range(200..4000), rng.gen_range(200..4000));
        media.import_time = now - chrono::Duration::days(rng.gen_range(0..3650));
        let tags: Vec<String> = (0..rng.gen_range(0..5))
            .map(|_| format!("tag{}", rng.gen_range(0..50)))
            .collect();
        store.insert_media(media.with_tags(ServiceKey::local_tags(), tags))?;
    }

    // neighbours in id space, so pairs cluster into groups
    for _ in 0..pairs {
        let a = rng.gen_range(0..files);
        let b = (a + rng.gen_range(1..=5)) % files;
        store.add_potential_pair(MediaId(a), MediaId(b), rng.gen_range(0..=8))?;
    }
    Ok(store)
}

#[derive(Parser)]
#[command(version, about = "dupr: review potential duplicate pairs")]
pub struct Opts {
    /// Increase verbosity (-v, -vv). Default INFO.
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Decrease verbosity (-q). Each -q reduces level by one step.
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Review batches of potential duplicates, applying one decision to every pair
    Review {
        /// Store snapshot (JSON)
        #[arg(long)]
        store: PathBuf,
        #[arg(long, value_enum)]
        mode: Option<Mode>,
        /// Mixed-mode cap on pairs per batch
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "skip")]
        decide: Decide,
        #[arg(long)]
        max_batches: Option<usize>,
        /// Write the store back when done
        #[arg(long)]
        save: bool,
    },
    /// Summarise a store snapshot
    Status {
        #[arg(long)]
        store: PathBuf,
    },
    /// Write a synthetic store snapshot
    Generate {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 1000)]
        files: u64,
        #[arg(long, default_value_t = 2000)]
        pairs: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Mode {
    Group,
    Mixed,
}

impl From<Mode> for FactoryMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Group => FactoryMode::Group,
            Mode::Mixed => FactoryMode::Mixed,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Decide {
    Skip,
    SameQuality,
    Better,
    Alternate,
    FalsePositive,
}

impl Decide {
    fn decision(self, pair: MediaResultPair, config: &ReviewConfig) -> DuplicatePairDecision {
        let duplicate_type = match self {
            Decide::Skip => return DuplicatePairDecision::skip_manual(pair),
            Decide::SameQuality => DuplicateType::SameQuality,
            Decide::Better => DuplicateType::Better,
            Decide::Alternate => DuplicateType::Alternate,
            Decide::FalsePositive => DuplicateType::FalsePositive,
        };
        let options = config.merge.options_for(duplicate_type);
        DuplicatePairDecision::duplicates_action(pair, duplicate_type, Some(&options), false)
    }
}
