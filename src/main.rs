#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

use interp_bench::config::CliOverrides;
use interp_bench::core::TrialMode;
use interp_bench::fixtures::DEFAULT_N;
use interp_bench::report::OutputFormat;
use interp_bench::run_cmd::{self, RunArgs};
use interp_bench::list_cmd;

#[derive(Parser, Debug)]
#[command(name = "interp-bench")]
#[command(about = "Factorial micro-benchmarks across embedded interpreters", long_about = None)]
struct Cli {
    /// Enable verbose logging (or set INTERP_BENCH_LOG)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the factorial trial on each engine and print one line per engine
    Run {
        /// Measured iterations per engine
        #[arg(long)]
        iterations: Option<u32>,
        /// Untimed iterations before measuring
        #[arg(long)]
        warmup: Option<u32>,
        /// Compute N!
        #[arg(long)]
        n: Option<u32>,
        /// Reuse one engine instance (warm) or build one per iteration (cold)
        #[arg(long, value_enum)]
        mode: Option<TrialMode>,
        /// Cold mode: count engine construction in the eval clock
        #[arg(long)]
        include_setup: bool,
        /// Only run these engines (repeatable)
        #[arg(long = "engine", value_name = "ID")]
        engines: Vec<String>,
        /// Output format for stdout
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        /// TOML file with [harness] settings and [[fixture]] overrides
        #[arg(long)]
        config: Option<std::path::PathBuf>,
        /// Append trial records to this JSONL file
        #[arg(long)]
        jsonl: Option<std::path::PathBuf>,
        /// Write trial records to this CSV file
        #[arg(long)]
        csv: Option<std::path::PathBuf>,
    },

    /// List engines and their fixtures
    List {
        /// N used for the printed fixtures
        #[arg(long, default_value_t = DEFAULT_N)]
        n: u32,
        /// Print each fixture's program
        #[arg(long)]
        source: bool,
    },
}

fn init_tracing(verbose: bool) {
    let env = std::env::var("INTERP_BENCH_LOG").unwrap_or_else(|_| {
        if verbose { "interp_bench=debug".to_string() } else { "interp_bench=info".to_string() }
    });
    let _ = tracing_subscriber::fmt()
        .with_span_events(FmtSpan::ACTIVE)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_env_filter(EnvFilter::new(env))
        .try_init();
}

fn main() {
    color_eyre::install().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run { iterations, warmup, n, mode, include_setup, engines, format, config, jsonl, csv } => {
            let args = RunArgs {
                overrides: CliOverrides { iterations, warmup, n, mode, include_setup, engines },
                format,
                config,
                jsonl,
                csv,
            };
            run_cmd::run(&args)
        }
        Commands::List { n, source } => {
            let stdout = std::io::stdout();
            list_cmd::run(&mut stdout.lock(), n, source).map(|()| 0)
        }
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(1);
        }
    }
}
