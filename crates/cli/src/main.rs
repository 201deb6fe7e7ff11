mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::DeskConfig;
use po3_api::AppState;
use po3_core::*;
use po3_journal::{csv_io, Journal};
use po3_risk::{position_size, Checklist, SizingInput, TradingPhase};
use po3_service::TradingService;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "po3")]
#[command(about = "PO3 trading desk: broker accounts, risk rules and the trade journal")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Path to a po3.toml config file
    #[arg(short, long, env = "PO3_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind address, overrides the config file
        #[arg(short, long, env = "PO3_BIND")]
        bind: Option<String>,
    },

    /// Connect one terminal account and stream its events until Ctrl-C
    Connect {
        /// Broker preset name (e.g. "FTMO"); --host wins when both are given
        #[arg(long)]
        preset: Option<String>,

        /// Bridge host
        #[arg(long)]
        host: Option<String>,

        /// Bridge port
        #[arg(long)]
        port: Option<u16>,

        /// Platform (MT4, MT5)
        #[arg(long, default_value = "MT5")]
        platform: String,

        /// Connection id, prefix of the account id
        #[arg(long, default_value = "desk")]
        id: String,

        #[arg(long)]
        login: String,

        #[arg(long, env = "PO3_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long, default_value = "")]
        server: String,
    },

    /// Lot size for a setup
    Size {
        /// Instrument symbol (e.g. "XAUUSD", "US30")
        #[arg(short, long)]
        instrument: String,

        #[arg(short, long)]
        balance: Decimal,

        #[arg(short, long)]
        entry: Decimal,

        #[arg(short, long)]
        stop: Decimal,

        /// Percent of balance to risk; the phase default when omitted
        #[arg(short, long)]
        risk_pct: Option<Decimal>,

        /// Trading phase, overrides the config file
        #[arg(short, long)]
        phase: Option<TradingPhase>,
    },

    /// List broker presets
    Presets,

    /// Print the pre-trade checklist
    Checklist,

    /// Summarize a journal CSV
    JournalStats {
        /// Journal file, defaults to the configured path
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = DeskConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => serve(config, bind).await?,
        Commands::Connect {
            preset,
            host,
            port,
            platform,
            id,
            login,
            password,
            server,
        } => {
            let connection = resolve_connection(&config, preset, host, port, &platform, id)?;
            let credentials = Credentials::Terminal {
                login,
                password,
                server,
            };
            connect(config, connection, credentials).await?;
        }
        Commands::Size {
            instrument,
            balance,
            entry,
            stop,
            risk_pct,
            phase,
        } => {
            let profile = phase.unwrap_or(config.risk.phase).profile();
            let size = position_size(
                &SizingInput {
                    instrument,
                    balance,
                    entry,
                    stop_loss: stop,
                    risk_pct,
                },
                &profile,
            )?;

            let sep = "=".repeat(48);
            println!("\n{sep}");
            println!("  POSITION SIZE ({})", profile.name);
            println!("{sep}");
            println!("  Instrument:  {}", size.instrument);
            println!("  Risk:        {}% (${:.2})", size.risk_pct, size.risk_amount);
            println!("  Stop:        {} points", size.distance);
            println!("  Lots:        {}", size.lots);
            if !size.within_limit {
                println!("  WARNING:     risk above the ${:.2} per-trade cap", size.max_risk);
            }
            println!("{sep}\n");
        }
        Commands::Presets => {
            println!("Broker presets:");
            for preset in &config.service.presets {
                let port = preset.port.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
                println!("  {:<16} {:<4} {}:{}", preset.name, preset.platform, preset.host, port);
            }
        }
        Commands::Checklist => print_checklist(&Checklist::po3()),
        Commands::JournalStats { file } => {
            let path = file
                .or(config.journal.path)
                .context("No journal file given and none configured")?;
            let journal = csv_io::load(&path)?;
            let stats = journal.stats();
            println!("Journal: {}", path.display());
            println!("  Trades:      {}", stats.total);
            println!("  W / L / BE:  {} / {} / {}", stats.wins, stats.losses, stats.breakeven);
            println!("  Win Rate:    {:.1}%", stats.win_rate);
            println!("  Net P&L:     ${:.2}", stats.net_pnl);
            println!("  Avg Rating:  {:.1}", stats.average_rating);
        }
    }

    Ok(())
}

async fn serve(config: DeskConfig, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or(config.server.bind);
    let journal = match &config.journal.path {
        Some(path) => open_journal(path)?,
        None => Journal::new(),
    };

    let service = Arc::new(TradingService::new(config.service));
    let state = AppState::new(service.clone())
        .with_phase(config.risk.phase)
        .with_initial_balance(config.risk.initial_balance)
        .with_journal(journal, config.journal.path);

    tracing::info!(phase = %config.risk.phase, bind = %bind, "Starting PO3 desk");
    let result = po3_api::start_server(Arc::new(state), &bind).await;
    service.disconnect_all();
    result
}

/// A missing journal file is an empty journal; it is created on first save.
fn open_journal(path: &Path) -> Result<Journal> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "Journal file not found, starting empty");
        return Ok(Journal::new());
    }
    let journal = csv_io::load(path)
        .with_context(|| format!("Failed to load journal {}", path.display()))?;
    tracing::info!(path = %path.display(), entries = journal.len(), "Loaded journal");
    Ok(journal)
}

fn resolve_connection(
    config: &DeskConfig,
    preset: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    platform: &str,
    id: String,
) -> Result<BrokerConnection> {
    let preset = match preset {
        Some(name) => Some(
            config
                .service
                .presets
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(&name))
                .cloned()
                .with_context(|| format!("Unknown broker preset: {}", name))?,
        ),
        None => None,
    };

    let (name, host, preset_port, platform) = match (preset, host) {
        (_, Some(host)) => (id.clone(), host, None, PlatformKind::from(platform)),
        (Some(p), None) => (p.name, p.host, p.port, p.platform),
        (None, None) => anyhow::bail!("Either --preset or --host is required"),
    };

    Ok(BrokerConnection {
        id,
        name,
        platform,
        host,
        port: port.or(preset_port),
    })
}

async fn connect(
    config: DeskConfig,
    connection: BrokerConnection,
    credentials: Credentials,
) -> Result<()> {
    let service = TradingService::new(config.service);

    service.subscribe(|update: &AccountUpdate| {
        let a = &update.account;
        tracing::info!(
            account_id = %update.account_id,
            connected = a.connected,
            "balance {} equity {} free margin {}",
            a.balance,
            a.equity,
            a.free_margin
        );
        Ok(())
    });
    service.subscribe(|update: &PositionsUpdate| {
        for p in &update.positions {
            tracing::info!(
                account_id = %update.account_id,
                ticket = %p.id,
                "{} {:?} {} @ {} P&L {}",
                p.symbol,
                p.side,
                p.volume,
                p.open_price,
                p.profit
            );
        }
        Ok(())
    });
    service.subscribe(|update: &OrdersUpdate| {
        tracing::info!(account_id = %update.account_id, orders = update.orders.len(), "Orders updated");
        Ok(())
    });
    service.subscribe(|update: &MarketDataUpdate| {
        for q in &update.prices {
            tracing::debug!(symbol = %q.symbol, "bid {} ask {}", q.bid, q.ask);
        }
        Ok(())
    });
    service.subscribe(|fault: &StreamFault| {
        tracing::warn!(account_id = %fault.account_id, "Stream fault: {}", fault.message);
        Ok(())
    });

    let account = service.connect(&connection, &credentials).await?;
    println!(
        "Connected {} ({}) balance {} {}",
        account.name, account.id, account.balance, account.currency
    );

    tokio::signal::ctrl_c().await?;
    service.disconnect_all();
    println!("Disconnected");
    Ok(())
}

fn print_checklist(checklist: &Checklist) {
    for section in &checklist.sections {
        println!("\n{}", section.title);
        for item in &section.items {
            let marker = if item.critical { "*" } else { " " };
            println!("  [ ]{} {:<40} {}", marker, item.label, item.description);
        }
    }
    println!(
        "\n{} items, {} critical (*). Trading is allowed once every critical item is ticked.",
        checklist.items().count(),
        checklist.items().filter(|i| i.critical).count()
    );
}
