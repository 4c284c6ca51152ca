use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::oneshot;

use passwatch::config::{Config, MAX_HORIZON_DAYS};
use passwatch::elements::{self, ElementStore};
use passwatch::notify::ScheduleOutcome;
use passwatch::predict::PassEvent;
use passwatch::source;
use passwatch::web::{self, AppState};

#[derive(Parser)]
#[command(name = "passwatch")]
#[command(about = "Satellite pass predictions and reminders")]
struct Cli {
    /// Configuration file (YAML); built-in defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve,
    /// List upcoming passes
    Passes {
        /// Search horizon in days
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_HORIZON_DAYS)))]
        days: Option<u32>,
        /// Minimum peak elevation in degrees
        #[arg(long)]
        min_elevation: Option<f64>,
    },
    /// Show the next pass and wait for its reminder
    Next {
        #[arg(long, default_value = "cli")]
        subscriber: String,
    },
    /// Download fresh element text from the configured source
    UpdateTle,
    /// Check an element file
    ValidateTle {
        file: PathBuf,
        /// Also look up this object in the file
        #[arg(long)]
        identifier: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::ValidateTle { file, identifier } => validate_tle(&file, identifier.as_deref()),
        Commands::Serve => match load_state(config) {
            Ok(state) => serve(state).await,
            Err(code) => code,
        },
        Commands::Passes {
            days,
            min_elevation,
        } => match load_state(config) {
            Ok(state) => passes(&state, days, min_elevation).await,
            Err(code) => code,
        },
        Commands::Next { subscriber } => match load_state(config) {
            Ok(state) => next(&state, &subscriber).await,
            Err(code) => code,
        },
        Commands::UpdateTle => match load_state(config) {
            Ok(state) => update_tle(&state).await,
            Err(code) => code,
        },
    }
}

fn load_state(path: Option<&Path>) -> Result<AppState, ExitCode> {
    let config = match path {
        Some(path) => Config::from_file(path).map_err(|e| {
            eprintln!("Error reading {}: {}", path.display(), e);
            ExitCode::FAILURE
        })?,
        None => Config::default(),
    };
    AppState::new(config, Arc::new(ElementStore::new())).map_err(|e| {
        eprintln!("Error: {}", e);
        ExitCode::FAILURE
    })
}

/// Seed the store from the cache, then refresh from the network if configured
/// or if nothing was cached.
async fn prepare_elements(state: &AppState) {
    if let Err(e) = source::load_cached(&state.cache, &state.elements).await {
        log::warn!("Failed to read element cache: {}", e);
    }
    let missing = state.elements.snapshot().is_err();
    if (state.config.elements.refresh_on_start || missing)
        && state.refresh_elements().await.is_err()
        && !missing
    {
        log::warn!("Continuing with cached element text");
    }
}

async fn serve(state: AppState) -> ExitCode {
    prepare_elements(&state).await;
    match web::run_server(state).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn passes(state: &AppState, days: Option<u32>, min_elevation: Option<f64>) -> ExitCode {
    prepare_elements(state).await;
    let tracking = state.settings.load();
    let days_shown = days.unwrap_or(tracking.horizon_days);

    match state.with_forecast(|forecast| forecast.passes(Utc::now(), days, min_elevation)) {
        Ok(passes) if passes.is_empty() => {
            println!(
                "No passes of {} in the next {} days",
                tracking.identifier, days_shown
            );
            ExitCode::SUCCESS
        }
        Ok(passes) => {
            println!("Passes of {} in the next {} days:", tracking.identifier, days_shown);
            for pass in &passes {
                println!();
                print_pass(pass);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn next(state: &AppState, subscriber: &str) -> ExitCode {
    prepare_elements(state).await;
    let tracking = state.settings.load();

    let pass = match state.with_forecast(|forecast| forecast.next(Utc::now())) {
        Ok(Some(pass)) => pass,
        Ok(None) => {
            println!(
                "No passes of {} in the next {} days",
                tracking.identifier, tracking.horizon_days
            );
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Next pass of {}:", tracking.identifier);
    print_pass(&pass);

    let (delivered_tx, delivered_rx) = oneshot::channel();
    let hook = state.hook.clone();
    let object = tracking.identifier.clone();
    let outcome = state.scheduler.schedule(
        subscriber,
        pass.rise,
        tracking.lead_minutes,
        Utc::now(),
        move |notification| {
            let _ = delivered_tx.send(hook.deliver(&object, &notification));
        },
    );

    match &outcome {
        ScheduleOutcome::Skipped { fire_at } => {
            println!("Reminder time {} has already passed", format_time(*fire_at));
            return ExitCode::SUCCESS;
        }
        ScheduleOutcome::Scheduled(n) | ScheduleOutcome::AlreadyScheduled(n) => {
            println!(
                "Reminder {} minutes before rise at {}; waiting (Ctrl-C to cancel)",
                n.lead_minutes,
                format_time(n.fire_at)
            );
        }
    }

    tokio::select! {
        delivered = delivered_rx => {
            if let Ok(Some(hook_thread)) = delivered {
                let _ = tokio::task::spawn_blocking(move || hook_thread.join()).await;
            }
            ExitCode::SUCCESS
        }
        _ = tokio::signal::ctrl_c() => {
            if let Some(n) = outcome.notification() {
                state.scheduler.cancel(n.id);
            }
            println!("Cancelled");
            ExitCode::SUCCESS
        }
    }
}

async fn update_tle(state: &AppState) -> ExitCode {
    if let Err(e) = state.refresh_elements().await {
        eprintln!("Element update failed: {}", e);
        return ExitCode::FAILURE;
    }
    println!("Element text saved to {}", state.cache.path().display());

    let identifier = state.settings.load().identifier.clone();
    match state.elements.resolve(&identifier) {
        Ok(set) => {
            println!(
                "{} (catalog {}): epoch {}, {:.1} days old",
                set.name,
                set.norad_id,
                format_time(set.epoch),
                set.age_days(Utc::now())
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Warning: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn validate_tle(path: &Path, identifier: Option<&str>) -> ExitCode {
    let text = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading file: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let sets = match elements::parse_all(&text) {
        Ok(sets) => sets,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Element file is valid ({} element sets)", sets.len());
    for set in &sets {
        println!(
            "  {:05} {} @ {} ({:.1} min period)",
            set.norad_id,
            set.name,
            format_time(set.epoch),
            set.period_minutes()
        );
    }

    if let Some(identifier) = identifier {
        match elements::lookup(&text, identifier) {
            Ok(set) => println!("'{}' matches {} ({:05})", identifier, set.name, set.norad_id),
            Err(e) => {
                eprintln!("Lookup error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

fn format_time(t: DateTime<Utc>) -> String {
    format!(
        "{} UTC / {} local",
        t.format("%Y-%m-%d %H:%M:%S"),
        t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    )
}

fn print_pass(pass: &PassEvent) {
    println!(
        "  Rise (0°):    {}  az {:5.1}°{}",
        format_time(pass.rise),
        pass.rise_azimuth_deg,
        format_range_rate(pass.rise_range_rate_km_s)
    );
    println!(
        "  Culmination:  {}  az {:5.1}°  {:.0} km",
        format_time(pass.culmination),
        pass.culmination_azimuth_deg,
        pass.culmination_range_km
    );
    println!(
        "  Set (0°):     {}  az {:5.1}°{}",
        format_time(pass.set),
        pass.set_azimuth_deg,
        format_range_rate(pass.set_range_rate_km_s)
    );
    println!(
        "  Peak elevation: {:.1}°, duration {}",
        pass.peak_elevation_deg,
        humantime::format_duration(std::time::Duration::from_secs(
            pass.duration_seconds.max(0) as u64
        ))
    );
}

fn format_range_rate(rate: Option<f64>) -> String {
    rate.map(|r| format!("  {r:+.2} km/s")).unwrap_or_default()
}
