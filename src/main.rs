use anyhow::{bail, Context, Result};
use gnss_tracker::cli::commands::{DecodeCommand, RunCommand, StoreCommand, ValidateCommand};
use gnss_tracker::cli::output::*;
use gnss_tracker::cli::{Cli, Command};
use gnss_tracker::core::config::StoreConfig;
use gnss_tracker::core::{RuntimeConfig, TrackerConfig};
use gnss_tracker::execution::GlobalOrchestrator;
use gnss_tracker::modem::response::parse_imei;
use gnss_tracker::modem::{commands, Exchange, TcpModemBridge};
use gnss_tracker::payload::decode_control;
use gnss_tracker::persistence::{FileStore, TrackerStore};
use std::path::PathBuf;
use std::task::Poll;
use std::time::{Duration, Instant};
use tracing::{error, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// How often the host loop offers the orchestrator a tick
const HOST_LOOP_PERIOD: Duration = Duration::from_millis(50);
const IMEI_BUDGET: Duration = Duration::from_millis(2000);
const FALLBACK_IDENTITY: &str = "000000000000000";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_tracker(cmd).await?,
        Command::Validate(cmd) => validate_config(cmd)?,
        Command::Decode(cmd) => decode_message(cmd)?,
        Command::Store(cmd) => show_store(cmd)?,
    }

    Ok(())
}

async fn run_tracker(cmd: &RunCommand) -> Result<()> {
    let mut config = match &cmd.config {
        Some(path) => TrackerConfig::from_file(path).context("Failed to load tracker config")?,
        None => TrackerConfig::default(),
    };
    if let Some(address) = &cmd.modem {
        config.modem.address = address.clone();
    }

    let mut bridge = TcpModemBridge::connect(&config.modem.address)
        .await
        .with_context(|| format!("Failed to connect to modem at {}", config.modem.address))?;
    println!(
        "{} Connected to modem at {}",
        INFO,
        style(&config.modem.address).bold()
    );

    let mut store = if cmd.no_store {
        TrackerStore::in_memory()
    } else {
        let path = config.store.resolve_path();
        let backend = FileStore::open(&path)
            .with_context(|| format!("Failed to open store {}", path.display()))?;
        TrackerStore::new(backend)
    };

    let reported = query_imei(&mut bridge).await;
    let device_id = resolve_identity(reported, &mut store, config.device.imei.as_deref());
    println!("{} Device identity: {}", INFO, style(&device_id).cyan());

    let mut orchestrator = GlobalOrchestrator::from_config(device_id, &config).with_store(store);
    orchestrator.add_event_handler(|event| println!("{}", format_tracker_event(event)));

    println!("{} Tracker running, press Ctrl-C to stop", ROCKET);
    let mut host_loop = tokio::time::interval(HOST_LOOP_PERIOD);
    host_loop.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = host_loop.tick() => {
                orchestrator.poll(&mut bridge, Instant::now());
                if !bridge.is_connected() {
                    bail!("Modem link closed");
                }
                if let Some(limit) = cmd.cycles {
                    if orchestrator.context().cycles >= limit {
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n{} Interrupted", WARN);
                break;
            }
        }
    }

    println!(
        "{} Stopped after {} completed cycles ({} fixes buffered)",
        CHECK,
        style(orchestrator.context().cycles).bold(),
        orchestrator.context().fixes.len()
    );
    Ok(())
}

/// Ask the modem for its IMEI, giving up once the exchange budget runs out
async fn query_imei(bridge: &mut TcpModemBridge) -> Option<String> {
    let mut exchange = Exchange::new(commands::IMEI, IMEI_BUDGET);
    loop {
        if let Poll::Ready(reply) = exchange.poll(bridge, Instant::now()) {
            let imei = parse_imei(&reply.text());
            if imei.is_none() {
                warn!("Modem did not report an IMEI");
            }
            return imei;
        }
        tokio::time::sleep(HOST_LOOP_PERIOD).await;
    }
}

/// Modem first, then the store, then the configured override
fn resolve_identity(reported: Option<String>, store: &mut TrackerStore, configured: Option<&str>) -> String {
    if let Some(imei) = reported {
        if let Err(e) = store.write_identity(&imei) {
            error!("Identity not persisted: {}", e);
        }
        return imei;
    }
    match store.read_identity() {
        Ok(Some(identity)) => return identity,
        Ok(None) => {}
        Err(e) => warn!("Stored identity unreadable: {}", e),
    }
    match configured {
        Some(imei) => imei.to_string(),
        None => {
            warn!("No device identity available, using {}", FALLBACK_IDENTITY);
            FALLBACK_IDENTITY.to_string()
        }
    }
}

fn validate_config(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating tracker config...", INFO);

    match TrackerConfig::from_file(&cmd.file) {
        Ok(config) => {
            println!("{} Tracker configuration is valid!", CHECK);
            println!(
                "  Server: {}",
                style(format!("{}:{}", config.server.host, config.server.port)).bold()
            );
            println!("  APN: {}", style(&config.network.apn).cyan());
            println!("  Modem: {}", style(&config.modem.address).cyan());
            println!(
                "  Tick: {}  Adjustment period: {}",
                style(format_duration(config.timing.tick_interval())).cyan(),
                style(format_duration(config.timing.adjustment_period())).cyan()
            );

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

fn decode_message(cmd: &DecodeCommand) -> Result<()> {
    let bytes = std::fs::read(&cmd.file).with_context(|| format!("Failed to read {}", cmd.file))?;

    match decode_control(&bytes) {
        Ok(message) => {
            println!("{} Control message: {}", CHECK, format_control(&message));
            let mut runtime = RuntimeConfig::default();
            runtime.apply(&message);
            println!("{} Resulting runtime options:", INFO);
            println!("{}", format_runtime(&runtime));
            Ok(())
        }
        Err(e) => {
            println!("{} {}", CROSS, style(e).red());
            std::process::exit(1);
        }
    }
}

fn show_store(cmd: &StoreCommand) -> Result<()> {
    let path = match &cmd.path {
        Some(path) => PathBuf::from(path),
        None => StoreConfig::default().resolve_path(),
    };
    let backend =
        FileStore::open(&path).with_context(|| format!("Failed to open store {}", path.display()))?;
    let store = TrackerStore::new(backend);

    println!("{} Store {}", INFO, style(path.display()).dim());
    match store.read_identity()? {
        Some(identity) => println!("  Identity: {}", style(identity).cyan()),
        None => println!("  Identity: {}", style("unset").dim()),
    }
    match store.load_last_fix()? {
        Some(fix) => println!(
            "  Last fix: {}, {} at {}",
            style(fix.latitude.to_decimal_string()).bold(),
            style(fix.longitude.to_decimal_string()).bold(),
            style(&fix.timestamp).dim()
        ),
        None => println!("  Last fix: {}", style("none").dim()),
    }
    Ok(())
}
