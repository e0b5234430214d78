// Person segmentation adapters. The renderer only needs `segment(frame) -> Mask`;
// how the mask is produced, its resolution and its encoding belong to the adapter.
//
// Two model-free adapters ship here:
// • BackgroundSegmenter records the empty scene first, then calls anything
//   that differs from it "person" (probability mask, 0.5 threshold).
// • ChromaKeySegmenter calls anything that isn't the key colour "person"
//   (label mask).

use tracing::{debug, info};

use crate::camera::FrameSource;
use crate::error::Error;
use crate::types::{pack_rgb, unpack_rgb, FrameBuffer, Mask, MaskEncoding};

pub const BG_CAPTURE_COUNT: usize = 35; // ~1–2 seconds of frames at 30 FPS
pub const PROBABILITY_THRESHOLD: u8 = 128; // 0.5

/// A swappable segmentation strategy, chosen when the renderer is built.
pub trait Segmenter {
    fn name(&self) -> &'static str;

    /// Get ready to segment. May pull frames from the live source.
    fn load_model(&mut self, source: &mut dyn FrameSource) -> Result<(), Error>;

    /// Classify one frame. The returned mask may be smaller than the frame.
    fn segment(&mut self, frame: &FrameBuffer) -> Result<Mask, Error>;
}

/// Average `factor` x `factor` blocks into one opaque pixel.
/// Edge blocks that run past the frame average only what exists.
pub fn downsample(frame: &FrameBuffer, factor: usize) -> FrameBuffer {
    let factor = factor.max(1);
    let w = frame.width.div_ceil(factor);
    let h = frame.height.div_ceil(factor);
    let mut out = Vec::with_capacity(w * h);

    for by in 0..h {
        let y0 = by * factor;
        let y1 = (y0 + factor).min(frame.height);
        for bx in 0..w {
            let x0 = bx * factor;
            let x1 = (x0 + factor).min(frame.width);
            let (mut sr, mut sg, mut sb) = (0u32, 0u32, 0u32);
            for y in y0..y1 {
                for x in x0..x1 {
                    let (r, g, b) = unpack_rgb(frame.get(x, y));
                    sr += r as u32;
                    sg += g as u32;
                    sb += b as u32;
                }
            }
            let n = ((y1 - y0) * (x1 - x0)) as u32;
            out.push(pack_rgb((sr / n) as u8, (sg / n) as u8, (sb / n) as u8));
        }
    }
    FrameBuffer { width: w, height: h, pixels: out }
}

/// Compute per-pixel median across the provided frames (all same size).
/// Moving subjects vanish; what stays is the empty scene.
pub fn median_background(frames: &[FrameBuffer]) -> Result<FrameBuffer, Error> {
    if frames.is_empty() {
        return Err(Error::ModelLoad("median_background: no frames".into()));
    }

    let w = frames[0].width;
    let h = frames[0].height;
    if frames.iter().any(|f| f.width != w || f.height != h) {
        return Err(Error::ModelLoad(
            "median_background: frames must share identical dimensions".into(),
        ));
    }

    let k = frames.len();
    let mut rbuf = vec![0u8; k];
    let mut gbuf = vec![0u8; k];
    let mut bbuf = vec![0u8; k];
    let mut out = Vec::with_capacity(w * h);

    // Per pixel: gather each channel across frames, sort, take the middle.
    for idx in 0..(w * h) {
        for (i, f) in frames.iter().enumerate() {
            let (r, g, b) = unpack_rgb(f.pixels[idx]);
            rbuf[i] = r;
            gbuf[i] = g;
            bbuf[i] = b;
        }
        rbuf.sort_unstable();
        gbuf.sort_unstable();
        bbuf.sort_unstable();
        let mid = k / 2;
        out.push(pack_rgb(rbuf[mid], gbuf[mid], bbuf[mid]));
    }

    Ok(FrameBuffer { width: w, height: h, pixels: out })
}

/// Mean absolute channel difference, 0..=255.
#[inline]
fn colour_distance(a: (u8, u8, u8), b: (u8, u8, u8)) -> u32 {
    let d = |x: u8, y: u8| (x as i32 - y as i32).unsigned_abs();
    (d(a.0, b.0) + d(a.1, b.1) + d(a.2, b.2)) / 3
}

/// Background subtraction against a median plate of the empty scene.
pub struct BackgroundSegmenter {
    downscale: usize,
    capture_count: usize,
    /// Colour distance that maps to probability 0.5.
    sensitivity: u32,
    plate: Option<FrameBuffer>,
}

impl BackgroundSegmenter {
    pub fn new(downscale: usize, sensitivity: u32) -> Self {
        Self {
            downscale: downscale.max(1),
            capture_count: BG_CAPTURE_COUNT,
            sensitivity: sensitivity.max(1),
            plate: None,
        }
    }

    pub fn with_capture_count(mut self, count: usize) -> Self {
        self.capture_count = count.max(1);
        self
    }
}

impl Segmenter for BackgroundSegmenter {
    fn name(&self) -> &'static str {
        "background"
    }

    fn load_model(&mut self, source: &mut dyn FrameSource) -> Result<(), Error> {
        info!(frames = self.capture_count, "recording background plate; keep the scene empty");
        let mut frames = Vec::with_capacity(self.capture_count);
        for _ in 0..self.capture_count {
            let frame = source
                .next_frame()
                .map_err(|e| Error::ModelLoad(format!("recording background: {e}")))?;
            frames.push(downsample(&frame, self.downscale));
        }
        let plate = median_background(&frames)?;
        debug!(width = plate.width, height = plate.height, "background plate ready");
        self.plate = Some(plate);
        Ok(())
    }

    fn segment(&mut self, frame: &FrameBuffer) -> Result<Mask, Error> {
        let plate = self
            .plate
            .as_ref()
            .ok_or_else(|| Error::Segmentation("no background plate recorded".into()))?;
        let small = downsample(frame, self.downscale);
        if small.width != plate.width || small.height != plate.height {
            return Err(Error::Segmentation(format!(
                "frame grid {}x{} does not match plate {}x{}",
                small.width, small.height, plate.width, plate.height
            )));
        }

        let scale = PROBABILITY_THRESHOLD as u32;
        let values = small
            .pixels
            .iter()
            .zip(plate.pixels.iter())
            .map(|(&px, &bg)| {
                let d = colour_distance(unpack_rgb(px), unpack_rgb(bg));
                (d * scale / self.sensitivity).min(255) as u8
            })
            .collect();

        Ok(Mask {
            width: small.width,
            height: small.height,
            values,
            encoding: MaskEncoding::Probability { threshold: PROBABILITY_THRESHOLD },
        })
    }
}

/// Green-screen keying: every cell far enough from the key colour is a person.
pub struct ChromaKeySegmenter {
    key: (u8, u8, u8),
    tolerance: u32,
    downscale: usize,
}

impl ChromaKeySegmenter {
    /// `key` is 0xRRGGBB.
    pub fn new(key: u32, tolerance: u32, downscale: usize) -> Self {
        Self { key: unpack_rgb(key), tolerance, downscale: downscale.max(1) }
    }
}

impl Segmenter for ChromaKeySegmenter {
    fn name(&self) -> &'static str {
        "chroma"
    }

    fn load_model(&mut self, _source: &mut dyn FrameSource) -> Result<(), Error> {
        Ok(()) // nothing to learn
    }

    fn segment(&mut self, frame: &FrameBuffer) -> Result<Mask, Error> {
        if frame.is_empty() {
            return Err(Error::Segmentation("empty frame".into()));
        }
        let small = downsample(frame, self.downscale);
        let values = small
            .pixels
            .iter()
            .map(|&px| (colour_distance(unpack_rgb(px), self.key) > self.tolerance) as u8)
            .collect();
        Ok(Mask { width: small.width, height: small.height, values, encoding: MaskEncoding::Labels })
    }
}
