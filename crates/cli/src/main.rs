use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use driver_recognition_core::capture::domain::captured_frame::CapturedFrame;
use driver_recognition_core::capture::domain::image_reader::ImageReader;
use driver_recognition_core::capture::infrastructure::image_file_reader::{
    is_image, ImageFileReader,
};
use driver_recognition_core::pipeline::infrastructure::threaded_orchestrator::Orchestrator;
use driver_recognition_core::pipeline::pipeline_logger::StatsPipelineLogger;
use driver_recognition_core::pipeline::pipeline_state::FrameDisposition;
use driver_recognition_core::pipeline::recognition_context::RecognitionContext;
use driver_recognition_core::shared::settings::RecognitionSettings;
use driver_recognition_core::tracking::domain::face_tracker::FaceTracker;
use driver_recognition_core::tracking::infrastructure::multi_box_tracker::MultiBoxTracker;

/// How long `recognize` waits for one frame to finish.
const FRAME_TIMEOUT: Duration = Duration::from_secs(30);

/// Enroll drivers and recognize their faces in images.
#[derive(Parser)]
#[command(name = "drvrec")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

/// Flags that override the settings file.
#[derive(Args)]
struct Overrides {
    /// Settings file (default: platform config dir).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Directory holding the training corpus and identity names.
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,

    /// Directory with bundled default data and model files.
    #[arg(long, global = true)]
    bundled_dir: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, global = true)]
    confidence: Option<f64>,

    /// Never download missing models.
    #[arg(long, global = true)]
    offline: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Register a new identity name.
    AddPerson { name: String },
    /// Train an identity from face images.
    Enroll {
        /// Label of the identity, as listed by `identities`.
        label: i32,
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// List registered identities.
    Identities,
    /// Run images through the recognition pipeline as camera frames.
    Recognize {
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Clockwise sensor rotation of every frame (0, 90, 180, 270).
        #[arg(long, default_value = "0")]
        rotation: i32,
    },
    /// Print classifier statistics.
    Stats,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = load_settings(&cli.overrides)?;

    match cli.command {
        Command::AddPerson { name } => run_add_person(&settings, &name),
        Command::Enroll { label, images } => run_enroll(&settings, label, images),
        Command::Identities => run_identities(&settings),
        Command::Recognize { images, rotation } => run_recognize(&settings, &images, rotation),
        Command::Stats => run_stats(&settings),
    }
}

fn load_settings(overrides: &Overrides) -> Result<RecognitionSettings, Box<dyn std::error::Error>> {
    let mut settings = match &overrides.settings {
        Some(path) => RecognitionSettings::load_from(path),
        None => RecognitionSettings::load(),
    };

    if let Some(root) = &overrides.data_root {
        settings.data_root = Some(root.clone());
    }
    if let Some(dir) = &overrides.bundled_dir {
        settings.bundled_dir = Some(dir.clone());
    }
    if let Some(confidence) = overrides.confidence {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(format!("Confidence must be between 0 and 1, got {confidence}").into());
        }
        settings.detector_confidence = confidence;
    }
    if overrides.offline {
        settings.allow_model_download = false;
    }
    Ok(settings)
}

fn run_add_person(
    settings: &RecognitionSettings,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let classifier = RecognitionContext::open_classifier(settings)?;
    let count = classifier.enroll(name)?;
    println!("Added {} as label {}", name.trim(), count - 1);
    Ok(())
}

fn run_identities(settings: &RecognitionSettings) -> Result<(), Box<dyn std::error::Error>> {
    let classifier = RecognitionContext::open_classifier(settings)?;
    let identities = classifier.identities();
    if identities.is_empty() {
        println!("No identities registered");
    }
    for identity in identities {
        println!("{:>3}  {}", identity.id, identity.name);
    }
    Ok(())
}

fn run_stats(settings: &RecognitionSettings) -> Result<(), Box<dyn std::error::Error>> {
    let classifier = RecognitionContext::open_classifier(settings)?;
    if let Some(root) = settings.data_root() {
        println!("Data root: {}", root.display());
    }
    println!("{}", classifier.stats());
    Ok(())
}

fn run_enroll(
    settings: &RecognitionSettings,
    label: i32,
    images: Vec<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    validate_images(&images)?;
    let orchestrator = build_pipeline(settings)?.0;

    let known = orchestrator.context().classifier().identity_count();
    if label < 0 || label as usize >= known {
        return Err(format!(
            "Unknown label {label}; register the person with add-person first ({known} identities)"
        )
        .into());
    }

    let report = orchestrator.enroll_identity(label, images)?;
    let title = orchestrator.context().classifier().title_for(label);
    println!("Enrolled {} image(s) for {title}", report.accepted);
    for (path, reason) in &report.skipped {
        println!("  skipped {}: {reason}", path.display());
    }
    log::info!("\n{}", orchestrator.stats());
    Ok(())
}

fn run_recognize(
    settings: &RecognitionSettings,
    images: &[PathBuf],
    rotation: i32,
) -> Result<(), Box<dyn std::error::Error>> {
    if rotation.rem_euclid(90) != 0 {
        return Err(format!("Rotation must be a multiple of 90, got {rotation}").into());
    }
    validate_images(images)?;
    let (mut orchestrator, tracker) = build_pipeline(settings)?;
    let reader = ImageFileReader::new();

    for (index, path) in images.iter().enumerate() {
        let frame = match reader.read(path, index) {
            Ok(frame) => frame,
            Err(e) => {
                eprintln!("Skipping {}: {e}", path.display());
                continue;
            }
        };

        // Frames are offered one at a time after the previous one finished.
        let captured = CapturedFrame::new(frame, rotation, index as u64);
        if orchestrator.submit_frame(captured) == FrameDisposition::Dropped {
            eprintln!("Frame {index} dropped");
            continue;
        }
        if !orchestrator.wait_until_idle(FRAME_TIMEOUT) {
            return Err(format!("Timed out recognizing {}", path.display()).into());
        }

        println!("{}:", path.display());
        let tracks = tracker.current_tracks();
        let visible: Vec<_> = tracks.iter().filter(|t| t.frames_missed == 0).collect();
        if visible.is_empty() {
            println!("  no faces");
        }
        for track in visible {
            println!("  track {} {}", track.track_id, track.recognition);
        }
    }

    log::info!("\n{}", orchestrator.stats());
    orchestrator.shutdown()?;
    Ok(())
}

fn build_pipeline(
    settings: &RecognitionSettings,
) -> Result<(Orchestrator, Arc<MultiBoxTracker>), Box<dyn std::error::Error>> {
    log::info!("Loading recognition models");
    let context = RecognitionContext::open(settings, Some(Box::new(download_progress)))?;

    let tracker = Arc::new(MultiBoxTracker::new(settings.tracker));
    let orchestrator = Orchestrator::new(
        Arc::new(context),
        tracker.clone(),
        Arc::new(ImageFileReader::new()),
        Box::new(StatsPipelineLogger::new()),
    )?;
    Ok((orchestrator, tracker))
}

fn validate_images(images: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    for path in images {
        if !path.exists() {
            return Err(format!("Image not found: {}", path.display()).into());
        }
        if !is_image(path) {
            return Err(format!("Not a supported image: {}", path.display()).into());
        }
    }
    Ok(())
}

fn download_progress(model: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {model}... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading {model}... {} KiB", downloaded / 1024);
    }
}
