//! `loopcast` command-line entry point.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use loopcast_media::{check_ffmpeg, check_ffprobe, FfmpegBackend};
use loopcast_models::{TargetSpec, DEFAULT_CROSSFADE_SECS, DEFAULT_SLOWDOWN};
use loopcast_pipeline::{check_assets, list_inventory, metrics, Assembler, AssemblyConfig};

#[derive(Parser, Debug)]
#[command(name = "loopcast", version, about = "Assemble duration-matched music videos from looped audio and video")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the final video
    Assemble(AssembleArgs),
    /// List recognized audio and video files
    List {
        #[arg(long)]
        audio_dir: PathBuf,
        #[arg(long)]
        video_dir: Option<PathBuf>,
    },
    /// Verify the inputs and print the loop plan
    Check {
        #[arg(long)]
        audio_dir: PathBuf,
        #[arg(long)]
        video_dir: PathBuf,
        #[arg(long, default_value_t = 60)]
        minutes: u32,
        #[arg(long, default_value_t = DEFAULT_SLOWDOWN)]
        slowdown: f64,
        #[arg(long, default_value_t = DEFAULT_CROSSFADE_SECS)]
        crossfade: f64,
    },
}

#[derive(Args, Debug)]
struct AssembleArgs {
    #[arg(long)]
    audio_dir: PathBuf,
    #[arg(long)]
    video_dir: PathBuf,
    /// Target duration in minutes
    #[arg(long)]
    minutes: u32,
    #[arg(long, short)]
    output: PathBuf,
    /// File name of a track to leave out
    #[arg(long)]
    exclude: Option<String>,
    /// Shuffle the playlist
    #[arg(long)]
    randomize: bool,
    /// Seed for a reproducible shuffle
    #[arg(long)]
    seed: Option<u64>,
    /// Video slow-down factor (>= 1)
    #[arg(long, default_value_t = DEFAULT_SLOWDOWN)]
    slowdown: f64,
    /// Crossfade width in seconds
    #[arg(long, default_value_t = DEFAULT_CROSSFADE_SECS)]
    crossfade: f64,
}

impl AssembleArgs {
    fn target_spec(&self) -> TargetSpec {
        let mut spec = TargetSpec::new(self.minutes)
            .with_randomize(self.randomize)
            .with_slowdown(self.slowdown)
            .with_crossfade(self.crossfade);
        if let Some(name) = &self.exclude {
            spec = spec.with_exclude(name.clone());
        }
        if let Some(seed) = self.seed {
            spec = spec.with_seed(seed);
        }
        spec
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let config = AssemblyConfig::from_env();

    if let Err(e) = run(cli, config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Colored output for terminals, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["loopcast=info", "loopcast_pipeline=info", "loopcast_media=info"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run(cli: Cli, config: AssemblyConfig) -> anyhow::Result<()> {
    check_ffmpeg().context("ffmpeg is required")?;
    check_ffprobe().context("ffprobe is required")?;

    match cli.command {
        Command::Assemble(args) => assemble(args, config).await,
        Command::List {
            audio_dir,
            video_dir,
        } => {
            let backend = FfmpegBackend::new(config.encoding);
            let inventory = list_inventory(&audio_dir, video_dir.as_deref(), &backend).await?;

            println!("Audio tracks in {}:", audio_dir.display());
            for track in &inventory.audio {
                println!("  {:<48} {:>9.2}s", track.name, track.duration);
            }
            println!(
                "  {} tracks, {:.2} minutes total",
                inventory.audio.len(),
                inventory.total_audio_duration() / 60.0
            );
            if let Some(dir) = video_dir {
                println!("Videos in {}:", dir.display());
                for track in &inventory.video {
                    println!("  {:<48} {:>9.2}s", track.name, track.duration);
                }
            }
            Ok(())
        }
        Command::Check {
            audio_dir,
            video_dir,
            minutes,
            slowdown,
            crossfade,
        } => {
            let backend = FfmpegBackend::new(config.encoding);
            let spec = TargetSpec::new(minutes)
                .with_slowdown(slowdown)
                .with_crossfade(crossfade);
            let plan = check_assets(&audio_dir, &video_dir, &spec, &backend).await?;

            println!("Inputs OK");
            println!("  playlist:    {}", plan.playlist.join(", "));
            println!("  video:       {}", plan.video_source);
            println!(
                "  base audio:  {:.2}s, looped {} times",
                plan.base_audio_duration, plan.audio_loops
            );
            println!(
                "  video cycle: {:.2}s, looped {} times",
                plan.video_cycle_duration, plan.video_loops
            );
            println!("  target:      {:.0}s", plan.target_seconds);
            Ok(())
        }
    }
}

async fn assemble(args: AssembleArgs, config: AssemblyConfig) -> anyhow::Result<()> {
    let spec = args.target_spec();
    info!("Assembly config: {:?}", config);

    let metrics_handle = match &config.metrics_file {
        Some(_) => match metrics::init_metrics() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to install metrics recorder: {}", e);
                None
            }
        },
        None => None,
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, cancelling run");
            let _ = cancel_tx.send(true);
        }
    });

    let mut backend = FfmpegBackend::new(config.encoding.clone()).with_cancel(cancel_rx.clone());
    if let Some(timeout) = config.stage_timeout {
        backend = backend.with_timeout(timeout);
    }

    let metrics_file = config.metrics_file.clone();
    let assembler = Assembler::new(Arc::new(backend), config).with_cancel(cancel_rx);
    let result = assembler
        .assemble(&args.audio_dir, &args.video_dir, &args.output, &spec)
        .await;

    if let (Some(handle), Some(path)) = (&metrics_handle, &metrics_file) {
        if let Err(e) = metrics::write_metrics_file(handle, path).await {
            warn!("Failed to write metrics to {}: {}", path.display(), e);
        }
    }

    let result = result?;
    println!(
        "{} ({:.2} minutes)",
        result.output.display(),
        result.realized_duration / 60.0
    );
    Ok(())
}
