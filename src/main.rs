//! tagwatch CLI
//!
//! Presence tracking for nearby wireless devices.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tagwatch::{
    activity::ActivityLog,
    config::Config,
    core::{DeviceView, PresenceRegistry, PresenceState},
    orchestrator::{CommandError, CycleError, ScanController, ScanOrchestrator},
    scanner::{FeedScanner, NoopScanner, ScanProvider},
    store::PersistenceStore,
    RegistryError, VERSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tagwatch")]
#[command(version = VERSION)]
#[command(about = "Presence registry for nearby wireless devices", long_about = None)]
struct Cli {
    /// Directory holding the registry (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single scan cycle and show the registry
    Scan {
        /// Observation feed written by a radio bridge
        #[arg(long)]
        feed: Option<PathBuf>,
    },

    /// Scan continuously until Ctrl+C
    Watch {
        /// Observation feed written by a radio bridge
        #[arg(long)]
        feed: Option<PathBuf>,

        /// Seconds between scan cycles
        #[arg(long)]
        interval: Option<u64>,

        /// Seconds of silence before a device is marked OUT
        #[arg(long)]
        threshold: Option<u64>,
    },

    /// Show tracked devices
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Set a custom label for a device (by address or tag); empty clears it
    Label {
        /// Device address or tag
        device: String,

        /// New label
        label: String,
    },

    /// Remove every tracked device
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },

    /// Show registry and scan activity status
    Status,

    /// Show configuration
    Config {
        /// Write the current configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config, using defaults: {e}");
        Config::default()
    });
    if let Some(dir) = cli.data_dir {
        config.data_path = dir;
    }

    match cli.command {
        Commands::Scan { feed } => {
            if feed.is_some() {
                config.feed_path = feed;
            }
            cmd_scan(&config);
        }
        Commands::Watch {
            feed,
            interval,
            threshold,
        } => {
            if feed.is_some() {
                config.feed_path = feed;
            }
            if let Some(secs) = interval {
                config.scan_interval = Duration::from_secs(secs);
            }
            if let Some(secs) = threshold {
                config.exit_threshold = Duration::from_secs(secs);
            }
            cmd_watch(&config);
        }
        Commands::List { json } => {
            cmd_list(&config, json);
        }
        Commands::Label { device, label } => {
            cmd_label(&config, &device, &label);
        }
        Commands::Reset { yes } => {
            cmd_reset(&config, yes);
        }
        Commands::Status => {
            cmd_status(&config);
        }
        Commands::Config { init } => {
            cmd_config(&config, init);
        }
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_scan(config: &Config) {
    let orchestrator = open(config, scan_provider(config));
    let tz = timezone(config);
    let controller = ScanController::new(Arc::new(orchestrator));

    println!("Scanning for {}s...", config.scan_duration.as_secs());
    let result = controller.trigger_scan();
    save_activity(controller.orchestrator());

    match result {
        Ok(report) => {
            println!(
                "Scan complete: {} seen, {} new, {} exited",
                report.observations, report.discovered, report.exited
            );
            println!();
            print_table(&controller.snapshot(), tz);
        }
        Err(CycleError::Scan(e)) => {
            eprintln!("Error scanning: {e}");
            std::process::exit(1);
        }
        Err(CycleError::Persist(e)) => {
            print_table(&controller.snapshot(), tz);
            eprintln!("Error saving registry: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_watch(config: &Config) {
    println!("tagwatch v{VERSION}");
    println!();

    let orchestrator = Arc::new(open(config, scan_provider(config)));
    let tz = timezone(config);
    let settings = *orchestrator.settings();

    println!("Starting continuous scanning...");
    println!("  Scan duration: {}s", settings.scan_duration().as_secs());
    println!("  Scan interval: {}s", settings.scan_interval().as_secs());
    println!("  Exit threshold: {}s", settings.exit_threshold_secs());
    println!("  Registry: {:?}", orchestrator.store().path());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let snapshots = orchestrator.subscribe();
    let controller = ScanController::new(orchestrator.clone());
    if let Err(e) = controller.set_continuous(true) {
        eprintln!("Error starting scan thread: {e}");
        std::process::exit(1);
    }

    while running.load(Ordering::SeqCst) {
        match snapshots.recv_timeout(Duration::from_millis(200)) {
            Ok(views) => {
                let (present, absent) = count_states(&views);
                println!(
                    "[{}] {} devices ({} IN, {} OUT)",
                    chrono::Local::now().format("%H:%M:%S"),
                    views.len(),
                    present,
                    absent
                );
                print_table(&views, tz);
                println!();
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                eprintln!("Scan loop disconnected unexpectedly");
                break;
            }
        }
    }

    println!();
    println!("Stopping scanning...");
    controller.shutdown();

    if let Err(e) = orchestrator.save() {
        eprintln!("Error saving registry: {e}");
    }
    save_activity(&orchestrator);

    println!();
    println!("{}", orchestrator.activity().summary());
}

fn cmd_list(config: &Config, json: bool) {
    let orchestrator = open(config, Arc::new(NoopScanner::new()));
    let views = orchestrator.snapshot();

    if json {
        match serde_json::to_string_pretty(&views) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("Error serializing: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    if views.is_empty() {
        println!("No devices detected yet.");
        println!("Run 'tagwatch scan' or 'tagwatch watch' to start tracking.");
        return;
    }

    print_table(&views, timezone(config));
}

fn cmd_label(config: &Config, device: &str, label: &str) {
    let orchestrator = open(config, Arc::new(NoopScanner::new()));

    match orchestrator.label(device, label) {
        Ok(address) => {
            let tag = orchestrator
                .registry()
                .get(&address)
                .map(|r| r.tag)
                .unwrap_or_default();
            if label.is_empty() {
                println!("Label cleared for {tag} ({address})");
            } else {
                println!("Label saved for {tag} ({address}): {label}");
            }
        }
        Err(CommandError::Registry(RegistryError::NotFound(_))) => {
            eprintln!("Error: No device with address or tag '{device}'");
            eprintln!("Run 'tagwatch list' to see tracked devices.");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error saving label: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_reset(config: &Config, yes: bool) {
    if !yes {
        eprintln!("This removes every tracked device and cannot be undone.");
        eprintln!("Re-run with --yes to confirm.");
        std::process::exit(1);
    }

    let orchestrator = open(config, Arc::new(NoopScanner::new()));
    match orchestrator.reset() {
        Ok(dropped) => {
            println!("Device data cleared ({dropped} devices removed).");
            println!("Activity counters reset.");
        }
        Err(e) => {
            eprintln!("Error saving registry: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_status(config: &Config) {
    let orchestrator = open(config, Arc::new(NoopScanner::new()));
    let (present, absent) = orchestrator.registry().counts();

    println!("tagwatch Status");
    println!("===============");
    println!();
    println!("Registry: {:?}", orchestrator.store().path());
    println!("  Devices tracked: {}", present + absent);
    println!("  Present (IN): {present}");
    println!("  Absent (OUT): {absent}");
    println!();
    println!("Configuration:");
    println!("  Scan duration: {}s", config.scan_duration.as_secs());
    println!("  Scan interval: {}s", config.scan_interval.as_secs());
    println!("  Exit threshold: {}s", config.exit_threshold.as_secs());
    match &config.feed_path {
        Some(path) => println!("  Observation feed: {path:?}"),
        None => println!("  Observation feed: none"),
    }
    println!();

    let stats = orchestrator.activity().stats();
    println!("Cumulative Activity:");
    println!("  Cycles completed: {}", stats.cycles_completed);
    println!("  Scans failed: {}", stats.scans_failed);
    println!("  Observations ingested: {}", stats.observations_ingested);
    println!("  Devices discovered: {}", stats.devices_discovered);
    println!("  Exits recorded: {}", stats.exits_recorded);
    println!("  Saves failed: {}", stats.saves_failed);
}

fn cmd_config(config: &Config, init: bool) {
    if init {
        if let Err(e) = config.validate() {
            exit_with_error(e);
        }
        match config.save() {
            Ok(path) => println!("Configuration written to {path:?}"),
            Err(e) => exit_with_error(e),
        }
        println!();
    }

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(config).unwrap_or_else(|_| "Error".to_string())
    );
    if let Err(e) = config.validate() {
        println!();
        println!("Warning: {e}");
    }
}

/// Validate the config, load the registry and wire up an orchestrator.
/// Exits the process on any error.
fn open(config: &Config, provider: Arc<dyn ScanProvider>) -> ScanOrchestrator {
    if let Err(e) = config.validate() {
        exit_with_error(e);
    }
    let settings = config.scan_settings().unwrap_or_else(|e| exit_with_error(e));
    let tags = config.tag_generator().unwrap_or_else(|e| exit_with_error(e));

    let store = PersistenceStore::new(config.registry_path(), config.on_corrupt_state);
    let snapshot = match store.load() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Set \"on_corrupt_state\": \"reset\" in the config to start empty instead.");
            std::process::exit(1);
        }
    };

    let registry = Arc::new(PresenceRegistry::from_snapshot(tags, snapshot));
    let activity = Arc::new(ActivityLog::with_persistence(config.activity_path()));

    ScanOrchestrator::new(provider, registry, store, settings).with_activity(activity)
}

fn exit_with_error(e: impl std::fmt::Display) -> ! {
    eprintln!("Error: {e}");
    std::process::exit(1);
}

fn scan_provider(config: &Config) -> Arc<dyn ScanProvider> {
    match &config.feed_path {
        Some(path) => Arc::new(FeedScanner::new(path)),
        None => {
            eprintln!("Warning: No observation feed configured (use --feed or set feed_path).");
            eprintln!("Scans will report no devices.");
            Arc::new(NoopScanner::new())
        }
    }
}

fn timezone(config: &Config) -> Tz {
    config.timezone().unwrap_or(Tz::UTC)
}

fn save_activity(orchestrator: &ScanOrchestrator) {
    if let Err(e) = orchestrator.activity().save() {
        eprintln!("Warning: Could not save activity stats: {e}");
    }
}

fn count_states(views: &[DeviceView]) -> (usize, usize) {
    let present = views
        .iter()
        .filter(|v| v.presence_state == PresenceState::In)
        .count();
    (present, views.len() - present)
}

fn format_timestamp(ts: i64, tz: Tz) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn print_table(views: &[DeviceView], tz: Tz) {
    println!(
        "{:<13} {:<20} {:<16} {:<18} {:>5} {:<6} {:>9}  {}",
        "TAG", "NAME", "LABEL", "ADDRESS", "RSSI", "STATUS", "SILENT(s)", "LAST SEEN"
    );
    for view in views {
        let rssi = view
            .signal_strength
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<13} {:<20} {:<16} {:<18} {:>5} {:<6} {:>9}  {}",
            view.tag,
            truncate(&view.observed_name, 20),
            truncate(&view.display_label, 16),
            view.address,
            rssi,
            view.presence_state,
            view.seconds_since_last_seen,
            format_timestamp(view.last_seen_at, tz)
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('~');
        out
    }
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }
}
