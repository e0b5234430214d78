// The per-frame pipeline: advance the glitch clock, segment the camera frame,
// composite it (or replay an old one), bend it, and leave the result in the
// output surface for the window to present.
//
// One renderer runs one frame at a time. Segmentation blocks the frame it
// belongs to, so inference never piles up behind the display.

use kurbo::Affine;
use tracing::{debug, error, info, warn};

use crate::camera::FrameSource;
use crate::compositor::{composite, draw_transformed};
use crate::error::Error;
use crate::glitch::{GlitchEvent, GlitchKind, GlitchState, RandomSource, MAX_GLITCH_FREQUENCY};
use crate::replay::FrameReplayBuffer;
use crate::segment::Segmenter;
use crate::types::FrameBuffer;
use crate::video_rect::VideoRect;

pub const DEFAULT_GLITCH_FREQUENCY: u8 = 3;

/// Receives human-readable status changes ("Loading...", "Ready", errors).
pub type StatusSink = Box<dyn FnMut(&str)>;

/// Where the displayed frame came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOrigin {
    Live,
    Replay,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// `stop()` was called; nothing was drawn or captured.
    Stopped,
    /// No segmentation model yet; nothing was drawn.
    NotReady,
    Rendered { origin: FrameOrigin, glitch: GlitchKind },
    /// The frame failed and was skipped; the next one will be tried as usual.
    Dropped,
}

/// All state that evolves from frame to frame, owned by a single renderer.
#[derive(Debug, Default)]
pub struct FrameContext {
    pub glitch: GlitchState,
    pub replay: FrameReplayBuffer,
    pub video_rect: VideoRect,
    /// (video w, video h) the rect was fitted for; `None` forces a refit.
    fitted_for: Option<(usize, usize)>,
}

impl FrameContext {
    fn rect_for(&mut self, video: &FrameBuffer, canvas_w: usize, canvas_h: usize) -> VideoRect {
        let size = (video.width, video.height);
        if self.fitted_for != Some(size) {
            self.video_rect = VideoRect::fit(video.width, video.height, canvas_w, canvas_h);
            self.fitted_for = Some(size);
            debug!(rect = ?self.video_rect, "video rect refitted");
        }
        self.video_rect
    }
}

pub struct Renderer {
    segmenter: Box<dyn Segmenter>,
    rng: Box<dyn RandomSource>,
    ctx: FrameContext,
    glitch_frequency: u8,
    /// The untransformed frame for this tick (composited or replayed).
    staging: FrameBuffer,
    /// What the window shows.
    output: FrameBuffer,
    running: bool,
    model_ready: bool,
    on_status: Option<StatusSink>,
}

impl Renderer {
    pub fn new(
        segmenter: Box<dyn Segmenter>,
        rng: Box<dyn RandomSource>,
        width: usize,
        height: usize,
        glitch_frequency: u8,
    ) -> Self {
        Self {
            segmenter,
            rng,
            ctx: FrameContext::default(),
            glitch_frequency: glitch_frequency.min(MAX_GLITCH_FREQUENCY),
            staging: FrameBuffer::transparent(width, height),
            output: FrameBuffer::transparent(width, height),
            running: false,
            model_ready: false,
            on_status: None,
        }
    }

    pub fn set_status_sink(&mut self, sink: StatusSink) {
        self.on_status = Some(sink);
    }

    fn report(&mut self, status: &str) {
        if let Some(sink) = self.on_status.as_mut() {
            sink(status);
        }
    }

    /// Prepare the segmentation adapter. Frames render only after this succeeds.
    pub fn load_model(&mut self, source: &mut dyn FrameSource) -> Result<(), Error> {
        let loading = format!("Loading {} model...", self.segmenter.name());
        self.report(&loading);
        match self.segmenter.load_model(source) {
            Ok(()) => {
                self.model_ready = true;
                info!(segmenter = self.segmenter.name(), "model loaded");
                self.report("Model loaded");
                Ok(())
            }
            Err(e) => {
                error!("loading {} model: {e}", self.segmenter.name());
                self.report("Failed to load model");
                Err(e)
            }
        }
    }

    /// Idempotent. Reports "Ready" when the loop actually starts.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        info!("renderer started");
        self.report("Ready");
    }

    /// Idempotent. Takes effect before the next frame.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        info!("renderer stopped");
        self.report("Stopped");
    }

    pub fn destroy(&mut self) {
        self.stop();
        self.model_ready = false;
        self.ctx.replay.clear();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_glitch_frequency(&mut self, frequency: u8) {
        let frequency = frequency.min(MAX_GLITCH_FREQUENCY);
        if frequency != self.glitch_frequency {
            info!(frequency, "glitch frequency changed");
        }
        self.glitch_frequency = frequency;
    }

    pub fn glitch_frequency(&self) -> u8 {
        self.glitch_frequency
    }

    /// New output size. Old replay frames no longer fit, so they are dropped,
    /// and the video rect is refitted on the next frame.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.staging.resize(width, height);
        self.output.resize(width, height);
        self.ctx.replay.clear();
        self.ctx.fitted_for = None;
        debug!(width, height, "output resized");
    }

    pub fn output(&self) -> &FrameBuffer {
        &self.output
    }

    pub fn context(&self) -> &FrameContext {
        &self.ctx
    }

    /// Run one frame, pulling the camera image from `source`. Failures are
    /// logged and reported, never returned: the next tick simply tries again.
    pub fn tick(&mut self, now_ms: f64, source: &mut dyn FrameSource) -> FrameOutcome {
        if !self.running {
            return FrameOutcome::Stopped;
        }
        if !self.model_ready {
            return FrameOutcome::NotReady;
        }
        let result = source
            .next_frame()
            .and_then(|video| self.render_frame(now_ms, &video));
        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("frame rendering error: {e}");
                self.report(&e.to_string());
                FrameOutcome::Dropped
            }
        }
    }

    /// Run one frame on an already captured camera image.
    pub fn render_frame(&mut self, now_ms: f64, video: &FrameBuffer) -> Result<FrameOutcome, Error> {
        if !self.running {
            return Ok(FrameOutcome::Stopped);
        }
        if !self.model_ready {
            return Ok(FrameOutcome::NotReady);
        }

        // 1) Glitch clock.
        let event = self.ctx.glitch.update(now_ms, self.glitch_frequency, self.rng.as_mut());
        match event {
            GlitchEvent::Started { kind, repeat } => {
                debug!(?kind, repeat, "glitch started");
                if kind == GlitchKind::Skip && !repeat {
                    self.ctx.replay.start_replay();
                }
            }
            GlitchEvent::Ended => debug!("glitch ended"),
            GlitchEvent::Quiet => {}
        }

        // 2) Mask for this frame; blocks until the adapter answers.
        let mask = self.segmenter.segment(video)?;

        // 3) Where the video sits on the canvas.
        let rect = self.ctx.rect_for(video, self.output.width, self.output.height);

        // 4) A skip glitch shows history instead of the live picture.
        let skipping = self.ctx.glitch.is_skipping();
        let mut origin = FrameOrigin::Live;
        if skipping {
            if let Some(old) = self.ctx.replay.next_replay_frame() {
                self.staging.copy_from(old);
                origin = FrameOrigin::Replay;
            }
        }

        // 5) Otherwise composite live; only clean live frames enter history.
        if origin == FrameOrigin::Live {
            composite(&mut self.staging, video, &mask, &rect)?;
            if !skipping {
                self.ctx.replay.capture(&self.staging);
            }
        }

        // 6) Draw with the glitch transform; the output is rebuilt every frame.
        let transform = self
            .ctx
            .glitch
            .transform(&rect, now_ms, self.rng.as_mut())
            .unwrap_or(Affine::IDENTITY);
        draw_transformed(&mut self.output, &self.staging, transform)?;

        Ok(FrameOutcome::Rendered { origin, glitch: self.ctx.glitch.glitch_type })
    }
}
