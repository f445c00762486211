//! ward-sim: run an emergency-room simulation from a JSON layout.
//!
//! Every patient runs on its own blocking thread and walks the layout's
//! route. Ctrl-C cancels all patients, wherever they are blocked. The final
//! report goes to stdout as JSON; logs go to stderr.

mod config;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use ward::{AreaStatus, CancelToken, Patient, PatientOutcome, PatientStatus};

use crate::config::SimConfig;

/// Initialize tracing with WARD_LOG and LOG_FORMAT support.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let base_level = match std::env::var("WARD_LOG").as_deref() {
            Ok("debug") => "debug",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("ward={base_level},ward_sim={base_level}"))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    layout: PathBuf,
    patients: Option<u32>,
    arrival_ms: Option<u64>,
}

#[tokio::main]
async fn main() {
    let argv: Vec<String> = std::env::args().collect();

    let args = match parse_args(&argv) {
        Ok(v) => v,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            eprintln!("Usage: ward-sim <layout.json> [--patients N] [--arrival-ms MS]");
            eprintln!();
            eprintln!("Arguments:");
            eprintln!("  <layout.json>      Areas, route and defaults for the simulation");
            eprintln!();
            eprintln!("Options:");
            eprintln!("  --patients <N>     Number of patients [default: from layout]");
            eprintln!("  --arrival-ms <MS>  Delay between arrivals [default: from layout]");
            eprintln!();
            eprintln!("Environment:");
            eprintln!("  WARD_LOG           debug|info|warn|error [default: info]");
            eprintln!("  LOG_FORMAT         set to 'json' for JSON logs");
            process::exit(2);
        }
    };

    init_tracing();

    let report = match run(&args).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("error: failed to serialize report: {e}");
            process::exit(1);
        }
    }
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut layout: Option<PathBuf> = None;
    let mut patients = None;
    let mut arrival_ms = None;

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        match args[i].as_str() {
            "--patients" => {
                i += 1;
                let value = args.get(i).ok_or("--patients requires a value")?;
                patients = Some(
                    value
                        .parse::<u32>()
                        .map_err(|_| format!("invalid --patients value: {value}"))?,
                );
            }
            "--arrival-ms" => {
                i += 1;
                let value = args.get(i).ok_or("--arrival-ms requires a value")?;
                arrival_ms = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("invalid --arrival-ms value: {value}"))?,
                );
            }
            "--help" | "-h" => return Err(String::new()),
            arg if arg.starts_with('-') => return Err(format!("unknown flag: {arg}")),
            arg => {
                if layout.is_some() {
                    return Err(format!("unexpected argument: {arg}"));
                }
                layout = Some(PathBuf::from(arg));
            }
        }
        i += 1;
    }

    let layout = layout.ok_or("missing required argument: <layout.json>")?;
    Ok(Args {
        layout,
        patients,
        arrival_ms,
    })
}

/// Final simulation report.
#[derive(Debug, Serialize)]
struct Report {
    started_at: String,
    completed_at: String,
    route: Vec<String>,
    areas: Vec<AreaStatus>,
    patients: Vec<PatientOutcome>,
}

/// Tokens of every admitted patient, plus whether shutdown already fired.
///
/// Both live under one lock so a patient spawned concurrently with Ctrl-C is
/// either cancelled by the handler or never spawned.
#[derive(Default)]
struct Roster {
    shutdown: bool,
    tokens: Vec<CancelToken>,
}

impl Roster {
    fn cancel_all(roster: &Mutex<Roster>) {
        let mut roster = roster.lock().unwrap_or_else(PoisonError::into_inner);
        roster.shutdown = true;
        for token in &roster.tokens {
            token.cancel();
        }
    }

    /// Register a patient token; `false` if shutdown already fired.
    fn enroll(roster: &Mutex<Roster>, token: CancelToken) -> bool {
        let mut roster = roster.lock().unwrap_or_else(PoisonError::into_inner);
        if roster.shutdown {
            return false;
        }
        roster.tokens.push(token);
        true
    }
}

async fn run(args: &Args) -> anyhow::Result<Report> {
    let mut config = SimConfig::load(&args.layout)?;
    if let Some(patients) = args.patients {
        config.patients = patients;
    }
    if let Some(arrival_ms) = args.arrival_ms {
        config.arrival_ms = arrival_ms;
    }
    config.validate()?;

    simulate(&config, &args.layout).await
}

async fn simulate(config: &SimConfig, layout: &Path) -> anyhow::Result<Report> {
    let registry = config.build_registry()?;
    let started_at = chrono::Utc::now();

    info!(
        layout = %layout.display(),
        areas = registry.len(),
        patients = config.patients,
        route = ?config.route,
        "Starting simulation"
    );

    let roster = Arc::new(Mutex::new(Roster::default()));
    let signal_task = {
        let roster = Arc::clone(&roster);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received - cancelling all patients");
                Roster::cancel_all(&roster);
            }
        })
    };

    let mut handles = Vec::with_capacity(config.patients as usize);
    for number in 1..=config.patients {
        let patient = Patient::new(number, registry.resolve(config.route.as_slice())?);
        if !Roster::enroll(&roster, patient.cancel_token()) {
            warn!(patient = %patient, "Shutdown in progress - patient not admitted");
            break;
        }

        info!(patient = %patient, id = %patient.id(), "Patient arrived");
        handles.push(tokio::task::spawn_blocking(move || patient.run()));

        if number < config.patients {
            tokio::time::sleep(config.arrival_interval()).await;
        }
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        outcomes.push(handle.await?);
    }
    signal_task.abort();

    let treated = outcomes
        .iter()
        .filter(|o| o.status == PatientStatus::Treated)
        .count();
    info!(
        treated,
        cancelled = outcomes.len() - treated,
        "Simulation finished"
    );

    Ok(Report {
        started_at: started_at.to_rfc3339(),
        completed_at: chrono::Utc::now().to_rfc3339(),
        route: config.route.clone(),
        areas: registry.statuses(),
        patients: outcomes,
    })
}
