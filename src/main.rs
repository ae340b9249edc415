use anyhow::Context;
use backtester::{BacktestParams, Backtester};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::Table;
use configuration::Config;
use core_types::{SymbolPair, Timeframe};
use database::{connect, run_migrations, DbRepository};
use engine::Engine;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// The main entry point for the pairflow analytics application.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variable overrides from .env, if present.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let _log_guard = init_tracing();

    let config = configuration::load_config(&cli.config)
        .with_context(|| format!("failed to load configuration from '{}'", cli.config))?;

    let pool = connect(&config.database.url)
        .await
        .context("failed to connect to the store")?;
    run_migrations(&pool)
        .await
        .context("failed to run database migrations")?;
    let repo = DbRepository::new(pool);

    match cli.command {
        Commands::Run => handle_run(config, repo).await,
        Commands::Backtest(args) => handle_backtest(args, config, repo).await,
        Commands::Export(args) => handle_export(args, repo).await,
    }
}

/// Logs to stdout and to a daily-rolling file under logs/.
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily("logs", "pairflow.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();
    guard
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Statistical-arbitrage analytics engine for co-moving price pairs.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "config.toml", global = true)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the periodic analytics recomputation loop.
    Run,
    /// Replay stored z-scores through the mean-reversion simulator.
    Backtest(BacktestArgs),
    /// Dump analytics records as CSV or JSON.
    Export(ExportArgs),
}

#[derive(Parser)]
struct BacktestArgs {
    /// Dependent leg of the pair (e.g. "BTCUSDT").
    #[arg(long)]
    pair_y: String,

    /// Independent leg of the pair (e.g. "ETHUSDT").
    #[arg(long)]
    pair_x: String,

    /// Bar interval the analytics were computed on (e.g. "1m").
    #[arg(long)]
    timeframe: String,

    /// Entry threshold; defaults to alerts.default_zscore_threshold.
    #[arg(long)]
    entry: Option<f64>,

    /// Exit threshold; defaults to backtest.exit_threshold.
    #[arg(long)]
    exit: Option<f64>,

    /// Force-close an open position at the final observation.
    #[arg(long)]
    close_at_end: bool,

    /// Only replay records from the last N minutes.
    #[arg(long)]
    since_minutes: Option<i64>,
}

#[derive(Parser)]
struct ExportArgs {
    /// Dependent leg of the pair.
    #[arg(long)]
    pair_y: String,

    /// Independent leg of the pair.
    #[arg(long)]
    pair_x: String,

    /// Bar interval the analytics were computed on (e.g. "1m").
    #[arg(long)]
    timeframe: String,

    #[arg(long, value_enum, default_value = "csv")]
    format: ExportFormat,

    /// Output file; stdout when omitted.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Only export records from the last N minutes.
    #[arg(long)]
    since_minutes: Option<i64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn handle_run(config: Config, repo: DbRepository) -> anyhow::Result<()> {
    let engine = Engine::new(config, repo);
    engine.run().await?;
    Ok(())
}

fn since_horizon(since_minutes: Option<i64>) -> DateTime<Utc> {
    match since_minutes {
        Some(minutes) => Utc::now() - Duration::minutes(minutes),
        None => DateTime::UNIX_EPOCH,
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v))
}

async fn handle_backtest(
    args: BacktestArgs,
    config: Config,
    repo: DbRepository,
) -> anyhow::Result<()> {
    let timeframe: Timeframe = args
        .timeframe
        .parse()
        .with_context(|| format!("invalid timeframe '{}'", args.timeframe))?;
    let pair = SymbolPair {
        y: args.pair_y,
        x: args.pair_x,
    };

    let records = repo
        .analytics_since(&pair, timeframe, since_horizon(args.since_minutes))
        .await?;
    if records.is_empty() {
        anyhow::bail!("no analytics records stored for {} [{}]", pair, timeframe);
    }

    let params = BacktestParams {
        entry_threshold: args.entry.unwrap_or(config.alerts.default_zscore_threshold),
        exit_threshold: args.exit.unwrap_or(config.backtest.exit_threshold),
        close_at_end: args.close_at_end || config.backtest.close_at_end,
    };
    let report = Backtester::new(params)?.run(&records);

    let mut summary = Table::new();
    summary.set_header(vec!["Metric", "Value"]);
    summary.add_row(vec!["Records replayed".to_string(), records.len().to_string()]);
    summary.add_row(vec!["Closed trades".to_string(), report.total_trades.to_string()]);
    summary.add_row(vec!["Winning trades".to_string(), report.winning_trades.to_string()]);
    summary.add_row(vec!["Losing trades".to_string(), report.losing_trades.to_string()]);
    summary.add_row(vec!["Win rate %".to_string(), fmt_opt(report.win_rate_pct)]);
    summary.add_row(vec!["Total pnl".to_string(), format!("{:.6}", report.total_pnl)]);
    summary.add_row(vec!["Average pnl".to_string(), fmt_opt(report.average_pnl)]);
    summary.add_row(vec!["Average return %".to_string(), fmt_opt(report.average_return_pct)]);
    summary.add_row(vec!["Max trade pnl".to_string(), fmt_opt(report.max_pnl)]);
    summary.add_row(vec!["Min trade pnl".to_string(), fmt_opt(report.min_pnl)]);
    summary.add_row(vec![
        "Avg holding period".to_string(),
        format!("{:?}", report.average_holding_period),
    ]);
    println!("Backtest for {} [{}]:", pair, timeframe);
    println!("{summary}");

    if !report.trades.is_empty() {
        let mut trades = Table::new();
        trades.set_header(vec![
            "Direction",
            "Entry time",
            "Exit time",
            "Entry spread",
            "Exit spread",
            "PnL",
            "Return %",
        ]);
        for trade in &report.trades {
            trades.add_row(vec![
                trade.direction.to_string(),
                trade.entry_ts.to_rfc3339(),
                trade.exit_ts.to_rfc3339(),
                format!("{:.6}", trade.entry_spread),
                format!("{:.6}", trade.exit_spread),
                format!("{:.6}", trade.pnl),
                fmt_opt(trade.return_pct),
            ]);
        }
        println!("{trades}");
    }

    if let Some(open) = &report.open_position {
        println!(
            "Open {} position since {} (entry spread {:.6}, unrealized pnl {})",
            open.direction,
            open.entry_ts.to_rfc3339(),
            open.entry_spread,
            fmt_opt(open.unrealized_pnl),
        );
    }

    Ok(())
}

async fn handle_export(args: ExportArgs, repo: DbRepository) -> anyhow::Result<()> {
    let timeframe: Timeframe = args
        .timeframe
        .parse()
        .with_context(|| format!("invalid timeframe '{}'", args.timeframe))?;
    let pair = SymbolPair {
        y: args.pair_y,
        x: args.pair_x,
    };

    let records = repo
        .analytics_since(&pair, timeframe, since_horizon(args.since_minutes))
        .await?;

    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    };

    match args.format {
        ExportFormat::Csv => {
            let mut csv_writer = csv::Writer::from_writer(writer);
            for record in &records {
                csv_writer.serialize(record)?;
            }
            csv_writer.flush()?;
        }
        ExportFormat::Json => {
            serde_json::to_writer_pretty(writer, &records)?;
        }
    }

    info!(
        records = records.len(),
        pair = %pair,
        timeframe = %timeframe,
        "export complete"
    );
    Ok(())
}
