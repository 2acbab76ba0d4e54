//! Lostlens: review object detections on a photo and file a lost-item record.
//!
//! A user picks an image, the image is sent to a remote detection service,
//! the returned boxes are reviewed (one object highlighted at a time) and a
//! record describing the item is saved to a backend store.
//!
//! # Modules
//!
//! - [`session`]: The review state machine and its read-only views
//! - [`geometry`]: Detection-space boxes and the mapping into display space
//! - [`selection`]: The single "highlighted detection" index and its subscribers
//! - [`client`]: HTTP clients for the detection service and the record store
//! - [`workflow`]: Runs remote calls on worker threads and applies the results
//! - [`config`]: Deployment configuration
//! - [`error`]: Error types

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod geometry;
pub mod image_source;
pub mod model;
pub mod selection;
pub mod session;
pub mod workflow;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use auth::TokenStore;
use client::{parse_detection_response, DetectionClient, HttpTransport, PersistenceClient};
use config::{ClientConfig, ConfigOverrides};
use geometry::{to_display, CoordinateConvention, Dimensions};
use image_source::ImageSource;
use model::SaveMetadata;
use session::view::ReviewView;
use session::{Phase, ReviewSession, ReviewSnapshot};
use workflow::Workflow;

pub use error::{ClientError, LostlensError, ReviewError};

/// Extra time allowed for worker threads to report back after the HTTP
/// timeout itself has elapsed.
const SETTLE_MARGIN: Duration = Duration::from_secs(5);

/// The lostlens CLI application.
#[derive(Parser)]
#[command(name = "lostlens")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Connection settings shared by every subcommand.
#[derive(clap::Args)]
struct GlobalArgs {
    /// TOML configuration file.
    #[arg(long, global = true, env = "LOSTLENS_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the backend (e.g. 'http://127.0.0.1:5000').
    #[arg(long, global = true, env = "LOSTLENS_API_BASE_URL")]
    api_base_url: Option<String>,

    /// Coordinate space of the detection boxes ('normalized' or 'pixel').
    #[arg(long, global = true, env = "LOSTLENS_CONVENTION")]
    convention: Option<CoordinateConvention>,

    /// Timeout for each remote call, in seconds.
    #[arg(long, global = true, env = "LOSTLENS_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Bearer token for the backend.
    #[arg(long, global = true, env = "LOSTLENS_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Upload an image and print the detected objects.
    Detect(DetectArgs),
    /// Upload an image, pick an object and save a lost-item record.
    Report(ReportArgs),
    /// Map the boxes of a saved detection response into a rendered size.
    Display(DisplayArgs),
}

/// Arguments for the detect subcommand.
#[derive(clap::Args)]
struct DetectArgs {
    /// Image file to upload.
    image: PathBuf,

    /// Where the item was found; forwarded to the detection service.
    #[arg(long)]
    location: Option<String>,

    /// Rendered size as WIDTHxHEIGHT; enables display boxes.
    #[arg(long)]
    rendered: Option<Dimensions>,

    /// Output format ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Arguments for the report subcommand.
#[derive(clap::Args)]
struct ReportArgs {
    /// Image file to upload.
    image: PathBuf,

    /// Where the item was found.
    #[arg(long)]
    location: String,

    /// Description of the item. Defaults to the selected object's label.
    #[arg(long)]
    description: Option<String>,

    /// Index of the detected object to describe (defaults to the first).
    #[arg(long)]
    select: Option<usize>,

    /// Id of the reporting user.
    #[arg(long)]
    user_id: Option<i64>,

    /// Rendered size as WIDTHxHEIGHT; enables display boxes in the output.
    #[arg(long)]
    rendered: Option<Dimensions>,

    /// Output format ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Arguments for the display subcommand.
#[derive(clap::Args)]
struct DisplayArgs {
    /// JSON reply of the detection service.
    response: PathBuf,

    /// Rendered size as WIDTHxHEIGHT.
    #[arg(long)]
    rendered: Dimensions,

    /// Original image size as WIDTHxHEIGHT (needed for pixel boxes).
    #[arg(long)]
    original: Option<Dimensions>,

    /// Output format ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Run the lostlens CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), LostlensError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Detect(args)) => run_detect(&cli.global, args),
        Some(Commands::Report(args)) => run_report(&cli.global, args),
        Some(Commands::Display(args)) => run_display(&cli.global, args),
        None => {
            println!("lostlens {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Review object detections and file lost-item records.");
            println!();
            println!("Run 'lostlens --help' for usage information.");
            Ok(())
        }
    }
}

impl GlobalArgs {
    fn load_config(&self) -> Result<ClientConfig, LostlensError> {
        ClientConfig::load(
            self.config.as_deref(),
            ConfigOverrides {
                api_base_url: self.api_base_url.clone(),
                convention: self.convention,
                timeout_secs: self.timeout_secs,
            },
        )
    }

    /// Wires the HTTP clients into a fresh workflow.
    fn workflow(&self, config: &ClientConfig) -> Workflow {
        let auth = Arc::new(TokenStore::new());
        if let Some(token) = &self.token {
            auth.set_token(token.as_str());
        }
        let transport = HttpTransport::new(config.timeout);
        let detector = DetectionClient::new(
            transport.clone(),
            config.detect_url.clone(),
            config.convention,
            auth.clone(),
        );
        let store = PersistenceClient::new(transport, config.save_url.clone(), auth);
        Workflow::new(ReviewSession::new(), Arc::new(detector), Arc::new(store))
    }
}

/// Execute the detect subcommand.
fn run_detect(global: &GlobalArgs, args: DetectArgs) -> Result<(), LostlensError> {
    let config = global.load_config()?;
    let mut workflow = global.workflow(&config);
    let deadline = config.timeout.saturating_add(SETTLE_MARGIN);

    workflow
        .session_mut()
        .set_location_hint(args.location.clone());
    workflow.select_image(Some(ImageSource::from_path(&args.image)?))?;
    workflow.settle(deadline);
    if let Some(rendered) = args.rendered {
        workflow.session_mut().set_rendered_dimensions(rendered);
    }

    let snapshot = workflow.session().snapshot();
    print_snapshot(&snapshot, &args.output)?;
    finish(&snapshot, Phase::Reviewing)
}

/// Execute the report subcommand.
fn run_report(global: &GlobalArgs, args: ReportArgs) -> Result<(), LostlensError> {
    let config = global.load_config()?;
    let mut workflow = global.workflow(&config);
    let deadline = config.timeout.saturating_add(SETTLE_MARGIN);

    workflow
        .session_mut()
        .set_location_hint(Some(args.location.clone()));
    workflow.select_image(Some(ImageSource::from_path(&args.image)?))?;
    workflow.settle(deadline);

    let snapshot = workflow.session().snapshot();
    if snapshot.phase != Phase::Reviewing {
        print_snapshot(&snapshot, &args.output)?;
        return finish(&snapshot, Phase::Reviewing);
    }

    if let Some(index) = args.select {
        workflow.session_mut().select_object(index)?;
    }
    if let Some(rendered) = args.rendered {
        workflow.session_mut().set_rendered_dimensions(rendered);
    }

    let mut metadata = SaveMetadata::new(args.location);
    if let Some(description) = args.description {
        metadata = metadata.with_description(description);
    }
    if let Some(user_id) = args.user_id {
        metadata = metadata.with_user_id(user_id);
    }
    workflow.save(metadata)?;
    workflow.settle(deadline);

    let snapshot = workflow.session().snapshot();
    print_snapshot(&snapshot, &args.output)?;
    finish(&snapshot, Phase::Saved)
}

/// Execute the display subcommand.
fn run_display(global: &GlobalArgs, args: DisplayArgs) -> Result<(), LostlensError> {
    let config = global.load_config()?;
    let body = std::fs::read_to_string(&args.response)?;
    let response = parse_detection_response(&body, config.convention).map_err(|err| {
        LostlensError::ResponseParse {
            path: args.response.clone(),
            message: err.to_string(),
        }
    })?;

    let display_boxes = response
        .detections
        .iter()
        .map(|detection| {
            detection
                .bbox
                .as_ref()
                .and_then(|bbox| to_display(bbox, Some(args.rendered), args.original))
        })
        .collect();
    let snapshot = ReviewSnapshot {
        phase: Phase::Reviewing,
        generation: 0,
        file_name: args
            .response
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
        image_ref: Some(response.image_url),
        selected: if response.detections.is_empty() {
            None
        } else {
            Some(0)
        },
        detections: response.detections,
        display_boxes,
        manual_description: None,
        rendered: Some(args.rendered),
        error: None,
        saved_id: None,
    };
    print_snapshot(&snapshot, &args.output)
}

fn print_snapshot(snapshot: &ReviewSnapshot, output: &str) -> Result<(), LostlensError> {
    match output {
        "json" => println!("{}", serde_json::to_string_pretty(snapshot)?),
        _ => print!("{}", ReviewView(snapshot)),
    }
    Ok(())
}

/// Turns the final snapshot into the command's exit status.
fn finish(snapshot: &ReviewSnapshot, expected: Phase) -> Result<(), LostlensError> {
    if snapshot.phase == expected {
        return Ok(());
    }
    match &snapshot.error {
        Some(info) => Err(LostlensError::WorkflowFailed {
            stage: info.stage,
            info: info.clone(),
        }),
        None => Err(LostlensError::Unsettled {
            phase: snapshot.phase,
        }),
    }
}
