use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use pretraining_data::{FileDataset, PipelineConfig, WorkerTopology};

#[derive(Parser, Debug)]
#[command(author, version, about = "Frame a sharded text corpus into LM samples", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "PATH", help = "Pipeline config (TOML or JSON)")]
    config: PathBuf,

    #[arg(long, help = "Process rank (defaults to $RANK or 0)")]
    rank: Option<usize>,

    #[arg(long, help = "Number of processes (defaults to $WORLD_SIZE or 1)")]
    world_size: Option<usize>,

    #[arg(long, help = "Data-loading worker id (defaults to $WORKER_ID or 0)")]
    worker_id: Option<usize>,

    #[arg(long, help = "Workers per process (defaults to $NUM_WORKERS or 1)")]
    num_workers: Option<usize>,

    #[arg(long, default_value_t = 1000, help = "Stop after this many samples")]
    limit: usize,

    #[arg(long, default_value_t = 0, help = "Print the first N samples")]
    show: usize,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short, long, action = clap::ArgAction::Count)]
    quiet: u8,
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(err) = run(args) {
        eprintln!("framing failed: {:#}", err);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = match (quiet, verbose) {
        (0, 0) => LevelFilter::Info,
        (0, 1) => LevelFilter::Debug,
        (0, _) => LevelFilter::Trace,
        (1, _) => LevelFilter::Warn,
        _ => LevelFilter::Error,
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn run(args: Args) -> Result<()> {
    let config = PipelineConfig::from_path(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let env = WorkerTopology::from_env()?;
    let topology = WorkerTopology::new(
        args.rank.unwrap_or(env.process_rank),
        args.world_size.unwrap_or(env.num_processes),
        args.worker_id.unwrap_or(env.worker_id),
        args.num_workers.unwrap_or(env.workers_per_process),
    );

    let mut dataset = FileDataset::from_pipeline(&config)?;
    println!("{}", dataset);
    println!("shard: {}", topology.shard_coordinate());

    let pad = dataset.pad_token_id();
    let mut produced = 0usize;
    let mut padded_positions = 0usize;
    let mut total_positions = 0usize;

    for sample in dataset.iter_with(&topology)?.take(args.limit) {
        let sample = sample?;
        let buffer = sample.content_buffer();
        padded_positions += buffer.iter().filter(|&&id| id == pad).count();
        total_positions += buffer.len();

        if produced < args.show {
            println!("sample {}: samples={:?}", produced, sample.samples);
            println!("sample {}: targets={:?}", produced, sample.targets);
        }
        produced += 1;
    }

    let pad_ratio = if total_positions == 0 {
        0.0
    } else {
        padded_positions as f64 / total_positions as f64
    };
    println!("samples produced: {}", produced);
    println!("pad ratio: {:.2}%", pad_ratio * 100.0);

    Ok(())
}
