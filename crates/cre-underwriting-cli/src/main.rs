mod commands;
mod input;
mod output;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::debt::SizeDebtArgs;
use commands::irr::IrrArgs;
use commands::pro_forma::ProFormaArgs;
use commands::sensitivity::SensitivityArgs;
use commands::stress::StressArgs;
use commands::waterfall::WaterfallArgs;

/// Commercial real-estate underwriting calculations
#[derive(Parser)]
#[command(
    name = "creu",
    version,
    about = "Commercial real-estate underwriting calculations",
    long_about = "A CLI for underwriting commercial real-estate acquisitions with decimal \
                  precision. Supports IRR, annual pro formas, LP/GP distribution \
                  waterfalls, two-way sensitivity grids, stress scenarios and debt sizing."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the internal rate of return of a cash-flow series
    Irr(IrrArgs),
    /// Project an annual pro forma with exit analysis and returns
    ProForma(ProFormaArgs),
    /// Split levered cash flows between LP and GP through a promote waterfall
    Waterfall(WaterfallArgs),
    /// Two-way sensitivity grid of a return metric
    Sensitivity(SensitivityArgs),
    /// Run the stress scenario bundle and probability-weight the results
    Stress(StressArgs),
    /// Size a loan under LTV, DSCR and debt-yield constraints
    SizeDebt(SizeDebtArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

/// Logs go to stderr so formatted output on stdout stays pipeable.
fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    });

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    debug!(output = ?cli.output, "starting creu");

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Irr(args) => commands::irr::run_irr(args),
        Commands::ProForma(args) => commands::pro_forma::run_pro_forma(args),
        Commands::Waterfall(args) => commands::waterfall::run_waterfall(args),
        Commands::Sensitivity(args) => commands::sensitivity::run_sensitivity(args),
        Commands::Stress(args) => commands::stress::run_stress(args),
        Commands::SizeDebt(args) => commands::debt::run_size_debt(args),
        Commands::Version => {
            println!("creu {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
