use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use longshot_stitch::config::{load_config_or_default, ConfigFormat};
use longshot_stitch::data::validate_image_size;
use longshot_stitch::logging::{init_logging, LoggingConfig};
use longshot_stitch::pipeline::OverlapValidator;
use longshot_stitch::utils::scroll_luma;
use longshot_stitch::*;
use std::path::{Path, PathBuf};

/// Smallest frame side the estimators can work with
const MIN_FRAME_SIZE: u32 = 16;

#[derive(Parser)]
#[command(name = "longshot")]
#[command(about = "Stitch overlapping scroll captures into one long screenshot")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory for JSON log files
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stitch a sequence of frames, in capture order, into one image
    Stitch {
        /// Frame images in capture order
        #[arg(required = true)]
        frames: Vec<PathBuf>,

        /// Output image path
        #[arg(short, long, default_value = "longshot.png")]
        output: PathBuf,

        /// Frames scroll left to right instead of top to bottom
        #[arg(long)]
        horizontal: bool,

        /// Failure policy: abort, finalize or skip
        #[arg(short, long)]
        policy: Option<String>,

        /// Alignment mode: auto, correlation or feature
        #[arg(short, long)]
        mode: Option<String>,

        /// Configuration file (TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the session summary as JSON
        #[arg(short, long)]
        summary: Option<PathBuf>,
    },

    /// Estimate the scroll offset between two frames
    Align {
        /// Earlier frame
        previous: PathBuf,

        /// Later frame
        candidate: PathBuf,

        /// Frames scroll left to right instead of top to bottom
        #[arg(long)]
        horizontal: bool,

        /// Alignment mode: auto, correlation or feature
        #[arg(short, long)]
        mode: Option<String>,

        /// Configuration file (TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Output path; the extension picks TOML or JSON
        #[arg(default_value = "longshot.toml")]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let logging = LoggingConfig {
        global_level: level.to_string(),
        algorithm_level: level.to_string(),
        session_level: level.to_string(),
        log_directory: cli.log_dir.clone(),
        ..LoggingConfig::default()
    };
    let _guard = init_logging(&logging)?;

    match cli.command {
        Commands::Stitch {
            frames,
            output,
            horizontal,
            policy,
            mode,
            config,
            summary,
        } => {
            let config = build_config(config.as_deref(), horizontal, policy.as_deref(), mode.as_deref())?;
            handle_stitch(&frames, &output, summary.as_deref(), config)?;
        }
        Commands::Align {
            previous,
            candidate,
            horizontal,
            mode,
            config,
        } => {
            let config = build_config(config.as_deref(), horizontal, None, mode.as_deref())?;
            handle_align(&previous, &candidate, &config)?;
        }
        Commands::InitConfig { output } => {
            let format = match output.extension().and_then(|e| e.to_str()) {
                Some("json") => ConfigFormat::Json,
                _ => ConfigFormat::Toml,
            };
            StitchConfig::default().save_to_file(&output, format)?;
            println!("Default configuration written to {}", output.display());
        }
    }

    Ok(())
}

fn build_config(
    path: Option<&Path>,
    horizontal: bool,
    policy: Option<&str>,
    mode: Option<&str>,
) -> anyhow::Result<StitchConfig> {
    let mut config = load_config_or_default(path);

    if horizontal {
        config.axis = ScrollAxis::Horizontal;
    }
    if let Some(policy) = policy {
        config.failure_policy = match policy {
            "abort" => FailurePolicy::Abort,
            "finalize" => FailurePolicy::Finalize,
            "skip" => FailurePolicy::Skip,
            other => bail!("Unknown failure policy: {}", other),
        };
    }
    if let Some(mode) = mode {
        config.mode = match mode {
            "auto" => AlignmentMode::Auto,
            "correlation" => AlignmentMode::CorrelationOnly,
            "feature" => AlignmentMode::FeatureOnly,
            other => bail!("Unknown alignment mode: {}", other),
        };
    }

    Ok(config)
}

fn handle_stitch(frames: &[PathBuf], output: &Path, summary_path: Option<&Path>, config: StitchConfig) -> anyhow::Result<()> {
    let mut session = StitchSession::new(config)?;

    let mut stitched = None;
    for (i, path) in frames.iter().enumerate() {
        let bitmap = load_bitmap(path)?;
        validate_image_size(&bitmap, MIN_FRAME_SIZE)?;
        if i == 0 {
            session.start(CaptureRegion::new(0, 0, bitmap.width(), bitmap.height()))?;
        }

        let outcome = session
            .push_frame(bitmap, Utc::now())
            .with_context(|| format!("Frame {} rejected by session", path.display()))?;

        match outcome {
            FrameOutcome::Accepted { canvas_length, .. } => {
                println!("{}: accepted, canvas {}px", path.display(), canvas_length);
            }
            FrameOutcome::Duplicate { reason, .. } => println!("{}: dropped ({})", path.display(), reason),
            FrameOutcome::Skipped { rejection, .. } => {
                println!("{}: skipped ({})", path.display(), rejection);
            }
            FrameOutcome::Finalized { rejection, output, .. } => {
                println!("{}: {}; finishing with earlier frames", path.display(), rejection);
                stitched = Some(*output);
                break;
            }
            FrameOutcome::Aborted { rejection, .. } => {
                bail!("Stitching aborted at {}: {}", path.display(), rejection);
            }
        }
    }

    let result = match stitched {
        Some(result) => result,
        None => session.finish()?,
    };

    result
        .image
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "Stitched {} frames into {}x{} at {}",
        result.summary.frame_count,
        result.summary.final_width,
        result.summary.final_height,
        output.display()
    );

    let json = serde_json::to_string_pretty(&result.summary)?;
    match summary_path {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{}", json),
    }

    Ok(())
}

fn handle_align(previous: &Path, candidate: &Path, config: &StitchConfig) -> anyhow::Result<()> {
    let previous = load_bitmap(previous)?;
    let candidate = load_bitmap(candidate)?;
    validate_image_size(&previous, MIN_FRAME_SIZE)?;
    validate_image_size(&candidate, MIN_FRAME_SIZE)?;

    let previous = scroll_luma(&previous, config.axis);
    let candidate = scroll_luma(&candidate, config.axis);
    if previous.dimensions() != candidate.dimensions() {
        bail!(
            "Frames differ in size: {:?} vs {:?}",
            previous.dimensions(),
            candidate.dimensions()
        );
    }

    let estimator = AlignmentEstimator::from_config(config);
    let Some(result) = estimator.estimate(&previous, &candidate, (0, 1), None) else {
        bail!("No alignment method configured");
    };

    println!("{}", serde_json::to_string_pretty(&result)?);

    let validator = OverlapValidator::new(config.validation.clone());
    match validator.validate(&result, previous.height()) {
        Ok(overlap) => println!(
            "Stitchable: offset {}px, overlap {}px",
            overlap.offset, overlap.overlap_height
        ),
        Err(rejection) => println!("Not stitchable: {}", rejection),
    }

    Ok(())
}
