//! Headless, deterministic slideshow runs.
//!
//! The scene is driven by a [`SteppedTimeSource`] and images are decoded
//! inline, so the same deck, seed and script always print the same frames.

use std::io::Write;
use std::time::Instant;

use anyhow::{Context, Result};
use renderer::{Scene, SceneFrame, SceneOptions, SteppedTimeSource, TimeSource, WorkStrategy};
use sequencer::{AdvanceOutcome, Direction, Phase};
use serde::Serialize;
use slideconfig::SlideshowConfig;

use crate::cli::SimulateArgs;

/// One scripted request applied before the frame it is scheduled on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptedEvent {
    Advance(Direction),
    Select(i64),
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    events: Vec<(u64, ScriptedEvent)>,
}

impl Script {
    pub fn from_args(args: &SimulateArgs) -> Self {
        let mut events: Vec<(u64, ScriptedEvent)> = args
            .advances
            .iter()
            .map(|&(frame, direction)| (frame, ScriptedEvent::Advance(direction)))
            .chain(
                args.selects
                    .iter()
                    .map(|&(frame, index)| (frame, ScriptedEvent::Select(index))),
            )
            .collect();
        events.sort_by_key(|(frame, _)| *frame);
        Self { events }
    }

    fn at(&self, frame: u64) -> impl Iterator<Item = ScriptedEvent> + '_ {
        self.events
            .iter()
            .filter(move |(at, _)| *at == frame)
            .map(|(_, event)| *event)
    }
}

#[derive(Debug, Serialize)]
pub struct EventReport {
    pub request: String,
    pub outcome: String,
}

/// The JSON object printed for each simulated frame.
#[derive(Debug, Serialize)]
pub struct FrameReport {
    pub frame: u64,
    pub time: f32,
    pub active_index: usize,
    pub title: String,
    pub phase: &'static str,
    pub generation: u64,
    pub direction: f32,
    pub progress: f32,
    pub exit_progress: f32,
    pub interference: f32,
    pub glitch: f32,
    pub bloom: f32,
    pub content: &'static str,
    pub content_weight: f32,
    pub mouse: [f32; 2],
    pub parallax: [f32; 2],
    pub tilt: [f32; 2],
    pub accent: String,
    pub corners: [String; 4],
    pub seed: f32,
    pub loading: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<EventReport>,
}

impl FrameReport {
    fn new(frame: &SceneFrame, events: Vec<EventReport>) -> Self {
        let uniforms = &frame.uniforms;
        let palette = &uniforms.palette;
        Self {
            frame: uniforms.frame_index,
            time: uniforms.time,
            active_index: uniforms.active_index,
            title: frame.hud.title.clone(),
            phase: match frame.hud.phase {
                Phase::Idle => "idle",
                Phase::Exiting => "exiting",
            },
            generation: uniforms.generation,
            direction: uniforms.direction,
            progress: uniforms.progress,
            exit_progress: uniforms.exit_progress,
            interference: uniforms.interference,
            glitch: uniforms.glitch,
            bloom: uniforms.bloom,
            content: uniforms.content.as_str(),
            content_weight: uniforms.content_weight,
            mouse: uniforms.mouse,
            parallax: uniforms.parallax,
            tilt: uniforms.tilt,
            accent: uniforms.accent.to_string(),
            corners: palette.corners().map(|corner| corner.to_string()),
            seed: uniforms.seed,
            loading: frame.hud.loading_progress,
            events,
        }
    }
}

fn describe_outcome(outcome: AdvanceOutcome) -> String {
    match outcome {
        AdvanceOutcome::Accepted { target } => format!("accepted:{target}"),
        AdvanceOutcome::Debounced => "debounced".into(),
        AdvanceOutcome::Busy => "busy".into(),
        AdvanceOutcome::Unchanged => "unchanged".into(),
    }
}

/// Drives `config` for `args.frames` frames and writes one JSON line per
/// frame to `out`.
pub fn run_simulation<W: Write>(
    config: SlideshowConfig,
    args: &SimulateArgs,
    out: &mut W,
) -> Result<()> {
    let origin = Instant::now();
    let mut scene = Scene::new(
        config,
        SceneOptions {
            strategy: WorkStrategy::Inline,
            seed: args.seed,
        },
        origin,
    )?;
    let mut clock = SteppedTimeSource::new(origin, args.frame_rate);
    if let Some((x, y)) = args.pointer {
        scene.pointer_moved(x, y);
    }
    let script = Script::from_args(args);
    tracing::info!(
        frames = args.frames,
        frame_rate = args.frame_rate,
        seed = scene.seed(),
        "starting headless simulation"
    );

    for frame in 0..args.frames {
        let now = clock.instant_at(frame);
        let events: Vec<EventReport> = script
            .at(frame)
            .map(|event| {
                let (request, outcome) = match event {
                    ScriptedEvent::Advance(direction) => (
                        format!("advance:{}", direction.sign()),
                        scene.advance(direction, now),
                    ),
                    ScriptedEvent::Select(index) => {
                        (format!("select:{index}"), scene.select_index(index, now))
                    }
                };
                EventReport {
                    request,
                    outcome: describe_outcome(outcome),
                }
            })
            .collect();
        let sample = clock.sample();
        let report = FrameReport::new(&scene.tick(sample), events);
        serde_json::to_writer(&mut *out, &report).context("failed to encode frame report")?;
        writeln!(out).context("failed to write frame report")?;
    }
    Ok(())
}
