// SPDX-License-Identifier: MIT OR Apache-2.0
//! MeshSync key frame replay tool.
//!
//! Replays a RON script of timeline events (clip edits, marker drags, key
//! frame commands, undo/redo) against clip data on an in-memory timeline and
//! prints the resulting frames, markers and host notifications.
//!
//! ```text
//! meshsync_keyframes_replay scripts/drag_key_frames.ron --json
//! ```
//!
//! Logging goes to stderr and honours `RUST_LOG`.

mod history;
mod report;
mod script;
mod session;

use clap::Parser;
use meshsync_keyframes::{ClipFamily, KeyFrameTiming, SceneCacheTiming};
use script::ReplayScript;
use session::replay;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meshsync_keyframes_replay")]
#[command(about = "Replay timeline events against MeshSync key frame clip data")]
#[command(version)]
struct Cli {
    /// Replay script (RON)
    script: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn run(cli: &Cli) -> session::Result<()> {
    let script = ReplayScript::load(&cli.script)?;
    tracing::info!(
        "Replaying {} steps from {} ({})",
        script.steps.len(),
        cli.script.display(),
        script.family.name()
    );

    let report = match script.family {
        ClipFamily::KeyFrame => replay::<KeyFrameTiming>(&script)?,
        ClipFamily::SceneCache => replay::<SceneCacheTiming>(&script)?,
    };

    if cli.json {
        println!("{}", report.to_json()?);
    } else {
        println!("{report}");
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("meshsync_keyframes=debug,meshsync_keyframes_replay=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(&cli) {
        tracing::error!("Replay failed: {e}");
        std::process::exit(1);
    }
}
