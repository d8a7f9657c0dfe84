use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "faceauth",
    about = "Enroll faces and authenticate against enrolled identities",
    version
)]
pub struct Cli {
    /// Emit structured JSON to stdout instead of human-readable text
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (may be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Read configuration from this TOML file instead of the system locations
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Embedding store file (overrides config `store_path` and $FACEAUTH_STORE_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Register a new identity from a camera frame or an image file
    Enroll(EnrollArgs),
    /// Run a live authentication session against enrolled identities
    Login(LoginArgs),
    /// List enrolled identity names
    List,
}

#[derive(Debug, Clone, Args)]
pub struct EnrollArgs {
    /// Identity name to register
    #[arg(long)]
    pub name: String,

    /// Enroll from a PNG/JPEG file instead of the camera
    #[arg(long, value_name = "PATH")]
    pub image: Option<PathBuf>,

    #[command(flatten)]
    pub capture: CaptureArgs,

    #[command(flatten)]
    pub models: ModelArgs,
}

#[derive(Debug, Clone, Args)]
pub struct LoginArgs {
    /// Give up after this many seconds without a match
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    #[command(flatten)]
    pub capture: CaptureArgs,

    #[command(flatten)]
    pub models: ModelArgs,
}

#[derive(Debug, Clone, Default, Args)]
pub struct CaptureArgs {
    /// Video device path (e.g. /dev/video2) or index (e.g. 0)
    #[arg(long)]
    pub device: Option<String>,

    /// Pixel format FourCC (Y16, GREY, YUYV)
    #[arg(long)]
    pub pixel_format: Option<String>,

    /// Frames to discard before using one
    #[arg(long)]
    pub warmup_frames: Option<u32>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ModelArgs {
    /// dlib landmark predictor model (.dat)
    #[arg(long)]
    pub landmark_model: Option<PathBuf>,

    /// dlib face encoder network (.dat)
    #[arg(long)]
    pub encoder_model: Option<PathBuf>,

    /// Re-sampling passes when computing an embedding
    #[arg(long)]
    pub jitters: Option<u32>,
}

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub store: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl From<bool> for OutputMode {
    fn from(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from(self.json)
    }

    pub fn global_options(&self) -> GlobalOptions {
        GlobalOptions {
            config: self.config.clone(),
            store: self.store.clone(),
        }
    }
}
