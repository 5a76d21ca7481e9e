//! `uiscribe` — record and replay desktop UI macros.

mod http_verify;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use http_verify::HttpVerifier;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uiscribe::{MonitorCapture, NullProvider, SystemProcessIndex};
use uiscribe_macro_recorder::{
    EnigoInjector, GlobalInputSource, InputInjector, MacroPlayer, MacroRecorder, PlaybackOptions,
    RecorderConfig,
};

#[derive(Parser)]
#[command(name = "uiscribe", version, about = "Record and replay desktop UI macros")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a macro until the toggle key (F9) or Ctrl-C.
    Record {
        /// Macro name; also names the package directory.
        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Root directory for macro packages.
        #[arg(long, default_value = "macros", env = "UISCRIBE_OUTPUT_DIR")]
        output_dir: PathBuf,

        /// Skip element resolution for recorded actions.
        #[arg(long)]
        no_ui_context: bool,

        /// Skip annotated screenshots.
        #[arg(long)]
        no_screenshots: bool,

        /// Keys that commit the typed-text buffer (repeatable).
        #[arg(long = "commit-key")]
        commit_keys: Vec<String>,
    },

    /// Replay a recorded macro package.
    Play {
        /// Package directory or macro.json path.
        package: PathBuf,

        /// Playback speed multiplier (2.0 = twice as fast).
        #[arg(long, default_value_t = 1.0)]
        speed: f64,

        /// Verify each step against the vision endpoint.
        #[arg(long)]
        verify: bool,

        /// Vision verification endpoint URL.
        #[arg(long, env = "UISCRIBE_VERIFY_ENDPOINT")]
        verify_endpoint: Option<String>,

        /// Abort on the first failed step instead of continuing.
        #[arg(long)]
        stop_on_failure: bool,

        /// Pace through the macro without dispatching input.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Record {
            name,
            description,
            output_dir,
            no_ui_context,
            no_screenshots,
            commit_keys,
        } => {
            record(
                name,
                description,
                output_dir,
                no_ui_context,
                no_screenshots,
                commit_keys,
            )
            .await
        }
        Commands::Play {
            package,
            speed,
            verify,
            verify_endpoint,
            stop_on_failure,
            dry_run,
        } => {
            play(
                package,
                speed,
                verify,
                verify_endpoint,
                stop_on_failure,
                dry_run,
            )
            .await
        }
    };

    if let Err(e) = outcome {
        eprintln!("FAILED: {e:#}");
        std::process::exit(1);
    }
}

async fn record(
    name: String,
    description: String,
    output_dir: PathBuf,
    no_ui_context: bool,
    no_screenshots: bool,
    commit_keys: Vec<String>,
) -> Result<()> {
    let recorder = MacroRecorder::new(
        Arc::new(NullProvider::new()),
        Arc::new(SystemProcessIndex::new()),
        Arc::new(MonitorCapture::new()),
        Arc::new(GlobalInputSource::new()),
    );
    let commands = recorder
        .take_command_receiver()
        .context("Command queue already taken")?;

    let mut config = RecorderConfig {
        capture_ui_context: !no_ui_context,
        capture_screenshots: !no_screenshots,
        output_dir,
        ..RecorderConfig::default()
    };
    if !commit_keys.is_empty() {
        config.commit_keys = commit_keys.iter().map(|k| k.to_lowercase()).collect();
    }

    recorder.start_recording(&name, &description, config)?;
    println!("Recording '{name}' - press F9 (or Ctrl-C) to stop.");

    // The toggle key arrives on the command queue from the listener
    // thread; drain it here rather than reacting inside the callback.
    let stop_signal = tokio::task::spawn_blocking(move || commands.recv());
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Stop requested via Ctrl-C"),
        _ = stop_signal => info!("Stop requested via toggle key"),
    }

    let summary = recorder.stop_recording(true)?;
    if let Some(error) = summary.save_error {
        bail!("Recording stopped but saving failed: {error}");
    }

    println!(
        "Recorded {} events into '{}'.",
        summary.events_recorded, summary.macro_name
    );
    if let Some(saved) = summary.saved {
        println!("Package: {}", saved.package_dir.display());
        println!("Bundle:  {}", saved.zip_path.display());
    }
    Ok(())
}

async fn play(
    package: PathBuf,
    speed: f64,
    verify: bool,
    verify_endpoint: Option<String>,
    stop_on_failure: bool,
    dry_run: bool,
) -> Result<()> {
    if !package.exists() {
        bail!("Macro package not found: {}", package.display());
    }

    let verifier = match (verify, verify_endpoint) {
        (true, Some(endpoint)) => {
            Some(Arc::new(HttpVerifier::new(endpoint)) as Arc<dyn uiscribe::VerificationService>)
        }
        (true, None) => {
            warn!("--verify requested without --verify-endpoint; verification disabled");
            None
        }
        _ => None,
    };

    // A dry run needs no real input backend (and must not require one).
    let injector: Box<dyn InputInjector> = if dry_run {
        Box::new(NoopInjector)
    } else {
        Box::new(EnigoInjector::new()?)
    };

    let player = MacroPlayer::new(injector, verifier);
    let options = PlaybackOptions {
        speed_multiplier: speed,
        verify_each_step: verify,
        stop_on_verification_failure: stop_on_failure,
        dry_run,
        ..PlaybackOptions::default()
    };

    let result = player.play_file(&package, &options).await?;

    println!(
        "Executed {}/{} events in {:.2}s.",
        result.events_executed, result.events_total, result.total_duration
    );
    if !result.verifications.is_empty() {
        println!(
            "Verification: {}/{} passed.",
            result.verifications_passed(),
            result.verifications.len()
        );
    }
    if !result.success {
        if let Some(event) = &result.failed_event {
            println!("Failed at {:?} (t={:.2}s).", event.event_type, event.timestamp);
        }
        bail!(
            "Playback failed{}",
            result
                .error
                .map(|e| format!(": {e}"))
                .unwrap_or_default()
        );
    }
    println!("Playback completed successfully.");
    Ok(())
}

/// Injector for dry runs; accepts everything and touches nothing.
struct NoopInjector;

impl InputInjector for NoopInjector {
    fn click(
        &mut self,
        _x: i32,
        _y: i32,
        _button: uiscribe_macro_recorder::MouseButton,
    ) -> uiscribe_macro_recorder::Result<()> {
        Ok(())
    }

    fn scroll(
        &mut self,
        _x: i32,
        _y: i32,
        _dx: i32,
        _dy: i32,
    ) -> uiscribe_macro_recorder::Result<()> {
        Ok(())
    }

    fn type_text(&mut self, _text: &str) -> uiscribe_macro_recorder::Result<()> {
        Ok(())
    }

    fn press_key(&mut self, _key: &str) -> uiscribe_macro_recorder::Result<()> {
        Ok(())
    }
}
