use clap::{Args, Parser, Subcommand};
use smallworld::dataset::{self, normalize_all, pick_seeds, random_vectors};
use smallworld::eval::find_k_for_recall;
use smallworld::{evaluate, run_seeds, Evaluation, ExactRanker, HeapRanker, HnswRanker, Ranker};
use smallworld_core::config;
use smallworld_core::vector_ops::cosine_similarity_unit;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "smallworld", about = "HNSW recall/latency benchmark")]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a random dataset in the raw `u32 count, u32 dim, f32...` format
    Generate {
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short = 'n', long, default_value_t = 10_000)]
        count: usize,
        #[arg(short, long, default_value_t = 32)]
        dim: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Compare exact, heap, and HNSW rankers on one dataset
    Bench(BenchArgs),
}

#[derive(Args)]
struct BenchArgs {
    /// Raw vector file; a random dataset is generated when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Dataset name used in model file names
    #[arg(long, default_value = "random")]
    name: String,

    /// Size of the generated dataset
    #[arg(short = 'n', long, default_value_t = 10_000)]
    count: usize,

    /// Dimension of the generated dataset
    #[arg(short, long, default_value_t = 32)]
    dim: usize,

    /// Seed for dataset generation and seed selection
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Directory holding `.gf` / `.vec` model files
    #[arg(long, default_value = "models")]
    model_dir: PathBuf,

    #[arg(short, long, default_value_t = config::HNSW_DEFAULT_M)]
    m: usize,

    #[arg(long, default_value_t = config::HNSW_DEFAULT_EF_CONSTRUCTION)]
    ef_construction: usize,

    /// Ground-truth k
    #[arg(short, long, default_value_t = 10)]
    k: usize,

    /// Number of query seeds
    #[arg(long, default_value_t = 100)]
    seeds: usize,

    /// Query threads (0 = one per core)
    #[arg(short, long, default_value_t = 0)]
    parallelism: usize,

    /// Recall targets for the k sweep
    #[arg(long, value_delimiter = ',', default_values_t = vec![0.95, 0.85])]
    recall: Vec<f64>,

    /// Write all evaluations to this file as JSON
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::from_default_env()
        .add_directive("smallworld=info".parse().expect("valid directive literal"))
        .add_directive(
            "smallworld_core=info"
                .parse()
                .expect("valid directive literal"),
        );
    if cli.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    match cli.command {
        Command::Generate {
            output,
            count,
            dim,
            seed,
        } => {
            if dim == 0 {
                eprintln!("Error: dim must be > 0");
                std::process::exit(1);
            }
            let vectors = random_vectors(count, dim, seed);
            dataset::write_vectors_file(&output, &vectors)?;
            tracing::info!(path = %output.display(), count, dim, "wrote dataset");
            Ok(())
        }
        Command::Bench(args) => bench(args),
    }
}

fn bench(args: BenchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut vectors = match &args.input {
        Some(path) => dataset::read_vectors_file(path)?,
        None => random_vectors(args.count, args.dim, args.seed),
    };
    let dim = dataset::check_shape(&vectors)?;
    normalize_all(&mut vectors);
    let vectors = Arc::new(vectors);
    let n = vectors.len();
    let seeds = pick_seeds(n, args.seeds, args.seed);
    tracing::info!(n, dim, seeds = seeds.len(), k = args.k, "benchmark dataset ready");

    let mut evaluations = Vec::new();
    let mut emit = |e: Evaluation| {
        println!("{}", e.row());
        evaluations.push(e);
    };

    println!("{}", Evaluation::header());

    let exact = ExactRanker::new(Arc::clone(&vectors), cosine_similarity_unit);
    let truth = run_seeds(&exact, &seeds, args.k, args.parallelism)?;
    emit(evaluate(
        &truth,
        &format!("GT OrderBySort [k={}]", args.k),
        dim,
        n,
        Some(&truth),
    ));

    let heap = HeapRanker::new(Arc::clone(&vectors), cosine_similarity_unit);
    let heap_run = run_seeds(&heap, &seeds, args.k, args.parallelism)?;
    emit(evaluate(
        &heap_run,
        &format!("Pr. Queue [k={}]", args.k),
        dim,
        n,
        Some(&truth),
    ));

    let hnsw = HnswRanker::init(
        &args.model_dir,
        &args.name,
        Arc::clone(&vectors),
        args.m,
        args.ef_construction,
    )?;
    let hnsw_run = run_seeds(&hnsw, &seeds, args.k, args.parallelism)?;
    emit(evaluate(
        &hnsw_run,
        &format!("HNSW [k={}]", args.k),
        hnsw.dimension(),
        hnsw.data_size(),
        Some(&truth),
    ));

    for &desired in &args.recall {
        let sweep = find_k_for_recall(&hnsw, &seeds, &truth, desired, args.parallelism)?;
        if !sweep.reached {
            tracing::warn!(desired, recall = sweep.recall, k = sweep.k, "recall target not reached");
        }
        emit(evaluate(
            &sweep.run,
            &format!("HNSW [k={}] recall>{desired}", sweep.k),
            hnsw.dimension(),
            hnsw.data_size(),
            Some(&truth),
        ));
    }

    if let Some(path) = &args.report {
        serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), &evaluations)?;
        tracing::info!(path = %path.display(), "wrote report");
    }
    Ok(())
}
