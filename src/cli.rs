//! idscan - decode identity payloads and manage the record store

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use crate::{now_ms, KeyProfile, ScanOutcome, ScanSession, ScannerConfig};

#[derive(Parser, Debug)]
#[command(name = "idscan", version, about = "Identity QR payload scanner")]
struct Args {
    /// SQLite snapshot path (overrides IDSCAN_SNAPSHOT_PATH and the config file).
    #[arg(long, global = true, value_name = "PATH")]
    snapshot: Option<PathBuf>,
    /// Dedup key profile (identity|contact).
    #[arg(long, global = true, value_name = "PROFILE")]
    profile: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode raw payloads (arguments, or one per stdin line) and store them
    Decode {
        payloads: Vec<String>,
    },

    /// Print stored records as JSON, most recent first
    Records,

    /// Remove every stored record
    Clear,

    /// Scan a still image for a code and store it
    #[cfg(all(feature = "ingest-image", feature = "backend-rqrr"))]
    Scan {
        image: PathBuf,
        /// Give up after this many milliseconds.
        #[arg(long, default_value_t = 10_000)]
        timeout_ms: u64,
    },
}

pub fn run() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = ScannerConfig::load()?;
    if let Some(path) = args.snapshot {
        config.snapshot_path = Some(path);
    }
    if let Some(profile) = args.profile.as_deref() {
        config.key_profile = KeyProfile::parse(profile)
            .ok_or_else(|| anyhow!("unknown key profile {:?}", profile))?;
    }
    if config.snapshot_path.is_none() {
        log::warn!("no snapshot path configured; records are kept in memory only");
    }

    match args.command {
        Command::Decode { payloads } => cmd_decode(config, payloads),
        Command::Records => cmd_records(config),
        Command::Clear => cmd_clear(config),
        #[cfg(all(feature = "ingest-image", feature = "backend-rqrr"))]
        Command::Scan { image, timeout_ms } => cmd_scan(config, image, timeout_ms),
    }
}

fn cmd_decode(config: ScannerConfig, payloads: Vec<String>) -> Result<()> {
    let mut session = ScanSession::from_config(config)?;
    let payloads = if payloads.is_empty() {
        std::io::stdin()
            .lock()
            .lines()
            .collect::<std::io::Result<Vec<String>>>()?
            .into_iter()
            .filter(|line| !line.trim().is_empty())
            .collect()
    } else {
        payloads
    };

    let mut rejected = 0usize;
    for raw in payloads {
        match session.handle_payload(raw.trim(), now_ms()?) {
            Ok(ScanOutcome::Stored(outcome)) => {
                if let Some(record) = session.record(outcome.key()) {
                    println!("{}", serde_json::to_string(record)?);
                }
            }
            Ok(ScanOutcome::Suppressed) => log::info!("repeat payload suppressed"),
            Err(e) => {
                rejected += 1;
                eprintln!("rejected: {}", e);
            }
        }
    }
    if rejected > 0 {
        log::warn!("{} payload(s) rejected", rejected);
    }
    Ok(())
}

fn cmd_records(config: ScannerConfig) -> Result<()> {
    let session = ScanSession::from_config(config)?;
    let snapshot = session.store().snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn cmd_clear(config: ScannerConfig) -> Result<()> {
    let mut session = ScanSession::from_config(config)?;
    let count = session.store().len();
    session.clear()?;
    println!("cleared {} record(s)", count);
    Ok(())
}

#[cfg(all(feature = "ingest-image", feature = "backend-rqrr"))]
fn cmd_scan(config: ScannerConfig, image: PathBuf, timeout_ms: u64) -> Result<()> {
    use std::time::{Duration, Instant};

    use crate::detect::backends::RqrrDecoder;
    use crate::ingest::ImageCamera;
    use crate::{CapabilityProber, FrameScanner};

    // A local process reading a file has no browser-style origin restriction.
    let backend = CapabilityProber::new()
        .secure_context(true)
        .with_software(RqrrDecoder::new())
        .probe()
        .into_backend()?;
    let settings = config.scanner_settings();
    let mut session = ScanSession::from_config(config)?;
    let mut scanner = FrameScanner::new(ImageCamera::new(&image), backend, settings);

    let stop = scanner.stop_signal();
    ctrlc::set_handler(move || stop.raise())
        .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    scanner.start()?;
    log::info!("scanning {} with {}", image.display(), scanner.backend_name());

    // Wall-clock origin advanced by a monotonic clock, so ticks never run backward.
    let origin_ms = now_ms()?;
    let started = Instant::now();
    while scanner.is_active() {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let now = origin_ms.saturating_add(elapsed_ms);
        if elapsed_ms >= timeout_ms {
            log::warn!("no code found within {} ms", timeout_ms);
            break;
        }
        match session.pump(&mut scanner, now) {
            Ok(Some(ScanOutcome::Stored(outcome))) => {
                if let Some(record) = session.record(outcome.key()) {
                    println!("{}", serde_json::to_string(record)?);
                }
                break;
            }
            Ok(_) => {}
            Err(e) => log::warn!("code rejected: {}", e),
        }
        std::thread::sleep(Duration::from_millis(16));
    }
    scanner.stop();
    Ok(())
}
