/*!
    Command-line harness for the ZenPlay playback core (A4).

    Drives a [`PlaybackController`] end to end with no windowing toolkit of
    its own: media plays to whatever render path gets selected (software
    frames are decoded and timed correctly even with no real surface to
    present them to), which is enough to exercise and manually verify the
    pipeline without pulling in a GUI crate this workspace doesn't
    otherwise depend on.
*/

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use zenplay_player::{PlaybackController, PlayerConfig, PlayerState};
use zenplay_render::WindowHandle;

#[derive(Parser)]
#[command(name = "zenplay")]
#[command(about = "ZenPlay playback core command-line harness")]
struct Cli {
    /// Path or URL to the media to play.
    location: PathBuf,

    /// Optional TOML configuration file; unset keys fall back to defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seek to this position (milliseconds) immediately after opening.
    #[arg(long)]
    seek_ms: Option<i64>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,zenplay_player=info")))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match PlayerConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, path = %path.display(), "failed to load config");
                return ExitCode::FAILURE;
            }
        },
        None => PlayerConfig::default(),
    };

    // No real window surface in this harness; the zero-copy render path
    // still negotiates a device context but has nothing to present to.
    let window = WindowHandle(std::ptr::null_mut());

    let controller = match PlaybackController::open(&cli.location, config, window) {
        Ok(controller) => controller,
        Err(e) => {
            tracing::error!(error = %e, location = %cli.location.display(), "failed to open media");
            return ExitCode::FAILURE;
        }
    };

    controller.add_state_listener(|state| {
        tracing::info!(?state, "playback state changed");
    });

    if let Err(e) = controller.start() {
        tracing::error!(error = %e, "failed to start playback");
        return ExitCode::FAILURE;
    }

    if let Some(seek_ms) = cli.seek_ms {
        controller.seek(seek_ms);
    }

    controller.wait_until_finished();

    match controller.last_error() {
        Some(err) => {
            tracing::error!(kind = err.kind, detail = %err.detail, stage = err.stage, "playback ended in error");
            ExitCode::FAILURE
        }
        None if controller.state() == PlayerState::Stopped => ExitCode::SUCCESS,
        None => ExitCode::SUCCESS,
    }
}
