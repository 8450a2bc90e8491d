use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use hg_cli::keypoints::load_keypoints;
use hg_cli::overlay::save_overlay;
use hg_cli::{
    BruteForceMatcher, KnnMatcher, ParallelBruteForceMatcher, Quadrilateral, Registration,
    RegistrationConfig, ResultReport,
};
use log::info;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "hg")]
#[command(about = "Locate a known planar object in a scene from precomputed keypoints")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match object and scene keypoints and project the object outline.
    Register(RegisterArgs),

    /// Write a preset configuration file (.json or .toml).
    Config {
        /// Preset name: fast, balanced or precise.
        #[arg(long, default_value = "balanced")]
        preset: String,

        #[arg(long)]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct RegisterArgs {
    /// Keypoint JSON of the object image.
    #[arg(long)]
    object_keypoints: PathBuf,

    /// Keypoint JSON of the scene image.
    #[arg(long)]
    scene_keypoints: PathBuf,

    /// Object image; only its dimensions are read.
    #[arg(long, conflicts_with_all = ["width", "height"], required_unless_present_all = ["width", "height"])]
    object_image: Option<PathBuf>,

    /// Object width in pixels, instead of --object-image.
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Object height in pixels, instead of --object-image.
    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Path to write the result (JSON).
    #[arg(long)]
    output: PathBuf,

    /// Scene image to draw the located outline on.
    #[arg(long, requires = "overlay")]
    scene_image: Option<PathBuf>,

    /// Path to write the overlay image.
    #[arg(long, requires = "scene_image")]
    overlay: Option<PathBuf>,

    /// Ratio-test threshold; overrides the configuration file.
    #[arg(long)]
    ratio: Option<f32>,

    /// Configuration file (.json or .toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Match descriptors on a thread pool.
    #[arg(long)]
    parallel: bool,

    /// Thread count for --parallel; defaults to the number of CPUs.
    #[arg(long, requires = "parallel")]
    threads: Option<usize>,
}

fn main() -> CliResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Register(args) => run_register(&args),
        Commands::Config { preset, output } => run_config(&preset, &output),
    }
}

fn run_register(args: &RegisterArgs) -> CliResult<()> {
    let mut config = match &args.config {
        Some(path) => RegistrationConfig::load(path)?,
        None => RegistrationConfig::default(),
    };
    if let Some(ratio) = args.ratio {
        config = config.with_ratio(ratio);
    }
    info!("{}", config.summary());

    let (width, height) = match (&args.object_image, args.width, args.height) {
        (Some(path), _, _) => image::image_dimensions(path)
            .map_err(|e| -> CliError { format!("Failed to read {}: {}", path.display(), e).into() })?,
        (None, Some(w), Some(h)) => (w, h),
        _ => return Err("either --object-image or both --width and --height are required".into()),
    };
    let corners = Quadrilateral::from_size(width as f32, height as f32);

    // File reads stay outside the timed stages
    let object = load_keypoints(&args.object_keypoints)?;
    let scene = load_keypoints(&args.scene_keypoints)?;
    info!("Loaded {} object and {} scene keypoints", object.len(), scene.len());

    let matcher: Box<dyn KnnMatcher> = if args.parallel {
        Box::new(args.threads.map_or_else(ParallelBruteForceMatcher::default, ParallelBruteForceMatcher::new))
    } else {
        Box::new(BruteForceMatcher)
    };

    let record = Registration::new(&config, corners)?
        .load_features(object, scene)?
        .match_features(matcher.as_ref())?
        .estimate_homography()?
        .project_corners()?;

    let timing = record.timing();
    info!(
        "Registered with {} of {} correspondences as inliers (features {:.2?}, matching {:.2?}, homography {:.2?})",
        record.inliers(),
        record.correspondences(),
        timing.feature,
        timing.matching,
        timing.homography
    );

    ResultReport::from(&record).save(&args.output)?;
    info!("Saved result to {}", args.output.display());

    if let (Some(scene_image), Some(overlay)) = (&args.scene_image, &args.overlay) {
        save_overlay(scene_image, record.quad(), overlay)?;
        info!("Saved overlay to {}", overlay.display());
    }

    Ok(())
}

fn run_config(preset: &str, output: &Path) -> CliResult<()> {
    let config = RegistrationConfig::preset(preset)
        .ok_or_else(|| -> CliError { format!("Unknown preset '{}' (expected fast, balanced or precise)", preset).into() })?;
    config.save(output)?;
    info!("Wrote {} to {}", config.summary(), output.display());
    Ok(())
}
