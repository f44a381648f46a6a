//! Play command - run an animation loop and report each step.

use clap::Args;
use geoloop::animation::AnimationScheduler;
use geoloop::events::{ChannelListener, OverlayEvent};
use geoloop::overlay::OverlayGroup;
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::common::{layer_entries, overlay_name, source_ref, LayerArgs};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Slack added to the frame period before giving up on the loop.
const STEP_GRACE: Duration = Duration::from_secs(5);

/// Arguments for the play command.
#[derive(Debug, Args)]
pub struct PlayArgs {
    #[command(flatten)]
    pub layer: LayerArgs,

    /// Legend image URL or local file shown while the loop plays
    #[arg(long)]
    pub legend: Option<String>,

    /// Speed dial setting (1-100); defaults to [animation] default_speed
    #[arg(long, allow_hyphen_values = true)]
    pub speed: Option<i64>,

    /// Number of passes over the visible frames before stopping
    #[arg(long, default_value_t = 1)]
    pub cycles: usize,

    /// Zero-based index of a frame to skip; repeatable
    #[arg(long = "hide")]
    pub hidden: Vec<usize>,

    /// Skip fetching every overlay before the loop starts
    #[arg(long)]
    pub no_prewarm: bool,
}

/// Run the play command.
pub fn run(args: PlayArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path)?;
    runner.log_startup("play");
    let config = runner.config();

    let cache = runner.open_cache()?;
    let scheduler = AnimationScheduler::with_interval(Arc::clone(&cache), config.base_interval());
    let speed = scheduler.set_speed(
        args.speed
            .unwrap_or(i64::from(config.animation.default_speed)),
    );

    let group = OverlayGroup::new(&args.layer.group, cache).with_scheduler(scheduler);
    let frames = layer_entries(&group, &args.layer);
    for frame in &frames {
        group.add_frame(Arc::clone(frame))?;
    }
    if let Some(value) = &args.legend {
        let source = source_ref(value);
        let name = format!("{} legend", overlay_name(&source, 0));
        group.set_legend(Arc::new(group.entry(name, args.layer.bounds, source)))?;
    }

    let scheduler = group.scheduler().ok_or_else(|| {
        CliError::InvalidArgument("group has no animation loop".to_string())
    })?;

    for &index in &args.hidden {
        let frame = frames.get(index).ok_or_else(|| {
            CliError::InvalidArgument(format!(
                "--hide {} is out of range for {} frames",
                index,
                frames.len()
            ))
        })?;
        scheduler.set_hidden(frame.cache_key(), true);
    }

    let visible = frames
        .iter()
        .filter(|frame| !scheduler.is_hidden(frame.cache_key()))
        .count();
    if visible == 0 {
        return Err(CliError::InvalidArgument("every frame is hidden".to_string()));
    }

    if !args.no_prewarm {
        let summary = group.prewarm()?;
        println!(
            "Prewarmed {} overlays ({} failed)",
            summary.ready, summary.failed
        );
    }

    let (tx, rx) = mpsc::channel();
    scheduler.subscribe(Arc::new(ChannelListener::new(tx)));

    println!(
        "Playing '{}': {} frames, speed {}, {:.2}s per frame",
        group.name(),
        frames.len(),
        speed,
        scheduler.interval().as_secs_f64()
    );
    scheduler.play()?;

    let timeout = scheduler.interval()
        + Duration::from_secs(config.fetch.timeout)
        + STEP_GRACE;
    let target = visible * args.cycles;
    let mut steps = 0;
    let mut failures = 0;

    while steps + failures < target {
        match rx.recv_timeout(timeout) {
            Ok(OverlayEvent::Step {
                index,
                total,
                frame,
            }) => {
                steps += 1;
                println!("[{}/{}] {}", index + 1, total, frame);
            }
            Ok(OverlayEvent::Error { source, message }) => {
                failures += 1;
                eprintln!("  ! {}: {}", source, message);
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(?timeout, "No animation step within timeout");
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    scheduler.stop();
    info!(steps, failures, "Animation finished");
    println!();
    println!("Shown {} frames, {} failed", steps, failures);

    group.dispose();
    Ok(())
}
