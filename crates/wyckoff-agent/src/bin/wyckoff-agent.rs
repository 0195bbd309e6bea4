//! Command-line entry point for the Wyckoff report agent

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use wyckoff_agent::{
    AppConfig, Pipeline, PipelineSettings, TierCredentials, Watchlist, build_dispatcher,
    resolve_targets,
};
use wyckoff_market::DataUnifier;
use wyckoff_market::providers::{EastMoneyClient, SinaClient};
use wyckoff_report::{ChartStyle, HtmlPdfRenderer, PlottersChart, PromptTemplate, TelegramSink};

#[derive(Parser, Debug)]
#[command(name = "wyckoff-agent")]
#[command(
    about = "Chart, analyze and deliver Wyckoff reports for A-share symbols",
    long_about = None
)]
struct Cli {
    /// TOML config file (defaults to wyckoff.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate reports for every target symbol
    Run {
        /// Comma separated symbols, used when the watchlist and stock list are empty
        #[arg(long)]
        symbols: Option<String>,

        /// Render reports without sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// Maintain the watchlist file
    Watchlist {
        #[command(subcommand)]
        action: WatchlistAction,
    },
}

#[derive(Subcommand, Debug)]
enum WatchlistAction {
    /// Add a symbol or update its position
    Add {
        symbol: String,
        #[arg(long, default_value = "")]
        date: String,
        #[arg(long, default_value = "")]
        price: String,
        #[arg(long, default_value = "")]
        qty: String,
    },
    /// Remove a symbol
    Remove { symbol: String },
    /// Print the watchlist
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wyckoff_utils::init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Run {
        symbols: None,
        dry_run: false,
    }) {
        Commands::Run { symbols, dry_run } => run(config, symbols, dry_run).await,
        Commands::Watchlist { action } => manage_watchlist(&config, action),
    }
}

async fn run(config: AppConfig, symbols: Option<String>, dry_run: bool) -> anyhow::Result<()> {
    let dry_run = dry_run || config.dry_run;
    let symbols_var = symbols.or_else(|| wyckoff_utils::env_opt("SYMBOLS"));
    let targets = resolve_targets(&config.watchlist, &config.stock_list, symbols_var.as_deref())?;
    if targets.is_empty() {
        warn!("No target symbols, nothing to do");
        return Ok(());
    }

    let market = config.market.to_market_config()?;
    let unifier = DataUnifier::new(
        Arc::new(SinaClient::new(&market)?),
        Arc::new(EastMoneyClient::new(&market)?),
    )
    .with_heuristic(market.heuristic);

    let dispatcher = build_dispatcher(&config.inference, TierCredentials::from_env()?).context(
        "no inference tier is configured; set GEMINI_API_KEY, RELAY_API_KEY or OPENAI_API_KEY",
    )?;

    let chart = PlottersChart::new(ChartStyle {
        width: config.report.chart_width,
        height: config.report.chart_height,
        ..ChartStyle::default()
    });
    let mut renderer = HtmlPdfRenderer::default();
    if config.report.converter != renderer.program() {
        renderer = HtmlPdfRenderer::new(config.report.converter.clone());
    }
    if let Some(args) = &config.report.converter_args {
        renderer = renderer.with_args(args.clone());
    }

    let mut pipeline = Pipeline::new(
        unifier,
        dispatcher,
        Arc::new(chart),
        Arc::new(renderer),
        PipelineSettings {
            data_dir: config.data_dir.clone(),
            reports_dir: config.reports_dir.clone(),
            cooldown: config.cooldown(),
            system_instruction: config.inference.system_instruction.clone(),
        },
    );

    match PromptTemplate::load(&config.prompt_file) {
        Ok(prompt) => pipeline = pipeline.with_prompt(prompt),
        Err(e) => warn!("{e}; every symbol will be skipped"),
    }

    if dry_run {
        info!("Dry run: reports will not be delivered");
    } else {
        let sink = TelegramSink::from_env()?.context(
            "TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID are required unless --dry-run is set",
        )?;
        pipeline = pipeline.with_sink(Arc::new(sink));
    }

    info!(
        symbols = targets.len(),
        cooldown = ?config.cooldown(),
        "Starting run"
    );
    let summary = pipeline.run(&targets).await;
    println!("{}", summary.table());

    if summary.skipped() == summary.reports.len() {
        bail!("every symbol was skipped");
    }
    Ok(())
}

fn manage_watchlist(config: &AppConfig, action: WatchlistAction) -> anyhow::Result<()> {
    let mut watchlist = Watchlist::load(&config.watchlist)?;

    match action {
        WatchlistAction::Add {
            symbol,
            date,
            price,
            qty,
        } => {
            let updated = watchlist.add_or_update(&symbol, &date, &price, &qty)?;
            watchlist.save()?;
            println!("{} {}", if updated { "Updated" } else { "Added" }, symbol);
        }
        WatchlistAction::Remove { symbol } => {
            if watchlist.remove(&symbol)? {
                watchlist.save()?;
                println!("Removed {symbol}");
            } else {
                println!("{symbol} is not on the watchlist");
            }
        }
        WatchlistAction::List => {
            if watchlist.is_empty() {
                println!("Watchlist {} is empty", config.watchlist.display());
            } else {
                println!("{}", watchlist.summary());
            }
        }
    }
    Ok(())
}
