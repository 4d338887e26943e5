use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use photoslicer::{DetectionEngine, ImageCatalog, ParameterSet, SaveReport, Session, SlicerError};

#[derive(Parser)]
#[command(name = "photoslicer")]
#[command(about = "Find, deskew and save the photographs on scanned sheets")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the detection parameters as JSON
    Params,

    /// Detect photographs on one sheet
    Detect {
        /// Path to the scanned sheet
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        #[command(flatten)]
        knobs: DetectionArgs,

        /// Write the binarized view with outlined boundaries here
        #[arg(long, value_name = "FILE")]
        diagnostic: Option<PathBuf>,

        /// Lock these slices (comma separated numbers) before saving
        #[arg(long, value_delimiter = ',', value_name = "N")]
        lock: Vec<usize>,

        /// Lock every detected slice
        #[arg(long)]
        lock_all: bool,

        /// Add the default manual box as an extra locked slice
        #[arg(long)]
        manual_box: bool,

        /// Save locked slices next to the sheet
        #[arg(long)]
        save: bool,

        /// Print the slices as JSON
        #[arg(long)]
        json: bool,
    },

    /// Detect and save every photograph on every sheet in a directory
    Batch {
        /// Directory of scanned sheets (.png)
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        #[command(flatten)]
        knobs: DetectionArgs,
    },
}

#[derive(Args)]
struct DetectionArgs {
    /// Override a parameter, e.g. --set threshold=200 (repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_override)]
    overrides: Vec<(String, f64)>,

    /// JSON object of parameter overrides
    #[arg(long, value_name = "FILE")]
    params: Option<PathBuf>,

    /// Save debug outputs to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,
}

fn parse_override(raw: &str) -> Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for {}: {}", name, e))?;
    Ok((name.trim().to_string(), value))
}

impl DetectionArgs {
    fn build_session(&self) -> anyhow::Result<Session> {
        let mut params = ParameterSet::detection()?;
        if let Some(file) = &self.params {
            params
                .load_overrides(file)
                .with_context(|| format!("loading parameters from {}", file.display()))?;
        }
        for (name, value) in &self.overrides {
            let stored = params.set(name, *value)?;
            if stored != *value {
                println!("Note: {} snapped to {}", name, stored);
            }
        }

        Ok(Session::new(params, self.engine(None)?))
    }

    /// Engine writing debug images to `--debug-out`, or to a per-sheet
    /// sub-directory of it when `sheet` is given
    fn engine(&self, sheet: Option<&Path>) -> anyhow::Result<DetectionEngine> {
        let engine = DetectionEngine::new();
        let Some(dir) = &self.debug_out else {
            return Ok(engine);
        };
        let dir = match sheet.and_then(|p| p.file_stem()) {
            Some(stem) => dir.join(stem),
            None => dir.clone(),
        };
        engine
            .with_debug(dir.clone())
            .with_context(|| format!("preparing debug directory {}", dir.display()))
    }
}

/// Run detection off the async runtime so Ctrl-C can cancel it
async fn detect(mut session: Session, verbose: bool) -> anyhow::Result<(Session, bool)> {
    let token = session.cancel_token();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.request();
        }
    });

    let (session, result) = tokio::task::spawn_blocking(move || {
        let mut sink = |message: &str| {
            if verbose {
                println!("  {}", message);
            }
        };
        let result = session.autodetect(&mut sink).map(|_| ());
        (session, result)
    })
    .await?;
    watcher.abort();

    match result {
        Ok(()) => Ok((session, true)),
        Err(SlicerError::Cancelled) => {
            println!("Detection cancelled.");
            Ok((session, false))
        }
        Err(e) => Err(e.into()),
    }
}

fn print_report(report: &SaveReport) {
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(()) => println!("  Saved {}", outcome.path.display()),
            Err(e) => println!("  Failed {} (slice {}): {}", outcome.path.display(), outcome.order, e),
        }
    }
    if report.outcomes.is_empty() {
        println!("No locked slice to save.");
    } else {
        println!("{} slices have been saved", report.saved_count());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match args.command {
        Command::Params => {
            let params = ParameterSet::detection()?;
            println!("{}", serde_json::to_string_pretty(&params)?);
        }

        Command::Detect {
            image_path,
            knobs,
            diagnostic,
            lock,
            lock_all,
            manual_box,
            save,
            json,
        } => {
            let mut session = knobs.build_session()?;
            session.load_image(&image_path)?;

            if args.verbose {
                println!("Running detection on {}...", image_path.display());
            }
            let (mut session, completed) = detect(session, args.verbose).await?;
            if !completed {
                return Ok(());
            }

            if let (Some(out), Some(image)) = (&diagnostic, session.diagnostic()) {
                image
                    .save(out)
                    .with_context(|| format!("writing diagnostic to {}", out.display()))?;
            }

            let slices = session.slices_mut();
            if lock_all {
                slices.lock_all();
            }
            for order in lock {
                slices.lock(order)?;
            }
            if manual_box {
                session.add_manual_box()?;
            }

            if json {
                println!("{}", serde_json::to_string_pretty(session.slices().as_slice())?);
            } else {
                println!("\n=== Detected photographs ===");
                println!("Total slices: {}", session.slices().len());
                for slice in session.slices().iter() {
                    let c = slice.boundary().corners();
                    println!(
                        "  #{} {} ({:.1}, {:.1}) ({:.1}, {:.1}) ({:.1}, {:.1}) ({:.1}, {:.1})",
                        slice.order(),
                        if slice.is_locked() { "[locked]" } else { "        " },
                        c[0].x, c[0].y, c[1].x, c[1].y, c[2].x, c[2].y, c[3].x, c[3].y
                    );
                }
            }

            if save {
                print_report(&session.save_locked()?);
            }
        }

        Command::Batch { dir, knobs } => {
            let mut catalog = ImageCatalog::open(&dir)?;
            let mut session = knobs.build_session()?;
            let mut total = 0;

            loop {
                let path = catalog.current().to_path_buf();
                println!("Processing {}", path.display());
                session.set_engine(knobs.engine(Some(path.as_path()))?);
                session.load_image(&path)?;

                let (next_session, completed) = detect(session, args.verbose).await?;
                session = next_session;
                if !completed {
                    break;
                }

                session.slices_mut().lock_all();
                let report = session.save_locked()?;
                print_report(&report);
                total += report.saved_count();

                match catalog.next() {
                    Ok(_) => continue,
                    Err(SlicerError::AtLastImage) => break,
                    Err(e) => return Err(e.into()),
                }
            }

            println!("\n{} slices saved from {} sheets", total, catalog.len());
        }
    }

    Ok(())
}
