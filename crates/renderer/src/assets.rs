//! Slide image decoding.
//!
//! Every slide is decoded once at start-up. Decodes run on worker threads
//! (or inline for headless runs) and are polled from the render thread,
//! which never blocks on them. A slide whose image fails to decode stays in
//! standby for the rest of the session.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, TryRecvError};
use image::RgbaImage;
use slideconfig::Slide;
use tracing::{debug, warn};

use crate::palette::WorkStrategy;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("decode worker for {} exited without a result", .0.display())]
    WorkerLost(PathBuf),
}

/// Decoded state of one slide's image.
#[derive(Debug, Clone)]
pub enum SlideContent {
    Pending { since: Instant },
    Ready(Arc<RgbaImage>),
    Failed,
}

impl SlideContent {
    pub fn is_settled(&self) -> bool {
        !matches!(self, SlideContent::Pending { .. })
    }
}

/// What the voxel and base-plane layers should draw for the active slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentState {
    /// Texture available; draw the image.
    Ready,
    /// Still decoding within the grace period; image layers are skipped.
    Pending,
    /// No texture will arrive in time; draw the accent standby tint.
    Standby,
}

impl ContentState {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentState::Ready => "ready",
            ContentState::Pending => "pending",
            ContentState::Standby => "standby",
        }
    }
}

type DecodeResult = Result<RgbaImage, AssetError>;

struct SlideSlot {
    image: PathBuf,
    content: SlideContent,
    receiver: Option<Receiver<DecodeResult>>,
}

pub struct SlideAssets {
    slots: Vec<SlideSlot>,
    texture_timeout: Duration,
}

pub fn decode(path: &Path) -> DecodeResult {
    let image = image::open(path).map_err(|source| AssetError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image.to_rgba8())
}

impl SlideAssets {
    /// Starts decoding every slide image.
    pub fn load(
        slides: &[Slide],
        strategy: WorkStrategy,
        texture_timeout: Duration,
        now: Instant,
    ) -> Self {
        let slots = slides
            .iter()
            .enumerate()
            .map(|(index, slide)| start_decode(index, &slide.image, strategy, now))
            .collect();
        Self {
            slots,
            texture_timeout,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Collects finished decodes. Returns the indices that became ready.
    pub fn poll(&mut self) -> Vec<usize> {
        let mut ready = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(receiver) = &slot.receiver else {
                continue;
            };
            let result = match receiver.try_recv() {
                Ok(result) => result,
                Err(TryRecvError::Empty) => continue,
                Err(TryRecvError::Disconnected) => Err(AssetError::WorkerLost(slot.image.clone())),
            };
            slot.receiver = None;
            if settle(index, slot, result) {
                ready.push(index);
            }
        }
        ready
    }

    pub fn content(&self, index: usize) -> Option<&SlideContent> {
        self.slots.get(index).map(|slot| &slot.content)
    }

    pub fn image(&self, index: usize) -> Option<Arc<RgbaImage>> {
        match self.content(index)? {
            SlideContent::Ready(image) => Some(Arc::clone(image)),
            _ => None,
        }
    }

    pub fn path(&self, index: usize) -> Option<&Path> {
        self.slots.get(index).map(|slot| slot.image.as_path())
    }

    pub fn content_state(&self, index: usize, now: Instant) -> ContentState {
        match self.content(index) {
            Some(SlideContent::Ready(_)) => ContentState::Ready,
            Some(SlideContent::Pending { since })
                if now.saturating_duration_since(*since) < self.texture_timeout =>
            {
                ContentState::Pending
            }
            _ => ContentState::Standby,
        }
    }

    /// Percentage of slides whose decode has finished, successfully or not.
    pub fn loading_progress(&self) -> f32 {
        if self.slots.is_empty() {
            return 100.0;
        }
        let settled = self
            .slots
            .iter()
            .filter(|slot| slot.content.is_settled())
            .count();
        settled as f32 / self.slots.len() as f32 * 100.0
    }

    pub fn is_settled(&self) -> bool {
        self.slots.iter().all(|slot| slot.content.is_settled())
    }
}

fn start_decode(index: usize, image: &Path, strategy: WorkStrategy, now: Instant) -> SlideSlot {
    let mut slot = SlideSlot {
        image: image.to_path_buf(),
        content: SlideContent::Pending { since: now },
        receiver: None,
    };
    match strategy {
        WorkStrategy::Inline => {
            let result = decode(image);
            settle(index, &mut slot, result);
        }
        WorkStrategy::Threaded => {
            let (sender, receiver) = bounded(1);
            let path = image.to_path_buf();
            let spawned = thread::Builder::new()
                .name(format!("slide-decode-{index}"))
                .spawn(move || {
                    let _ = sender.send(decode(&path));
                });
            match spawned {
                Ok(_) => slot.receiver = Some(receiver),
                Err(err) => {
                    warn!(slide = index, error = %err, "failed to spawn decode worker");
                    slot.content = SlideContent::Failed;
                }
            }
        }
    }
    slot
}

fn settle(index: usize, slot: &mut SlideSlot, result: DecodeResult) -> bool {
    match result {
        Ok(image) => {
            debug!(
                slide = index,
                width = image.width(),
                height = image.height(),
                "slide image decoded"
            );
            slot.content = SlideContent::Ready(Arc::new(image));
            true
        }
        Err(err) => {
            warn!(slide = index, error = %err, "slide image unavailable; showing standby");
            slot.content = SlideContent::Failed;
            false
        }
    }
}
