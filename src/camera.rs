// Opens a camera and converts frames into opaque 0xAARRGGBB buffers.
// Visual expectation: every `next_frame()` is one fresh, upright camera image
// at the resolution the device settled on.

use crate::error::Error;
use crate::types::{pack_rgb, FrameBuffer};

use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    },
};
use image::RgbImage;
use tracing::{info, warn};

/// Anything that yields live frames: the camera, or a synthetic source in tests.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<FrameBuffer, Error>;
    fn resolution(&self) -> (u32, u32);
}

// A small wrapper around nokhwa::Camera so the main loop stays clean.
pub struct CameraCapture {
    cam: Camera,
    width: u32,
    height: u32,
}

impl CameraCapture {
    /// Open camera `index` near the requested resolution (falls back if not exact).
    /// Visual: the camera's activity light comes on.
    pub fn new(index: u32, width: u32, height: u32) -> Result<Self, Error> {
        let idx = CameraIndex::Index(index);

        let fmt = CameraFormat::new(
            Resolution::new(width, height),
            FrameFormat::YUYV, // uncompressed; cheap to convert to RGB
            30,
        );
        let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(fmt));

        let mut cam = Camera::new(idx, req)
            .map_err(|e| Error::CameraInit(format!("Create camera: {e}")))?;

        cam.open_stream()
            .map_err(|e| Error::CameraInit(format!("Open stream: {e}")))?;

        // The stream might choose a slightly different resolution.
        let actual = cam.resolution();
        info!(index, width = actual.width(), height = actual.height(), "camera stream open");

        Ok(Self {
            cam,
            width: actual.width(),
            height: actual.height(),
        })
    }

    /// Release the device. Safe to call more than once.
    /// Visual: the camera's activity light goes off.
    pub fn stop(&mut self) {
        if let Err(e) = self.cam.stop_stream() {
            warn!("stopping camera stream: {e}");
        }
    }
}

impl FrameSource for CameraCapture {
    /// Blocks until the camera delivers a new frame.
    fn next_frame(&mut self) -> Result<FrameBuffer, Error> {
        let frame = self
            .cam
            .frame()
            .map_err(|e| Error::CameraFrame(format!("Fetch frame: {e}")))?;

        // Handles the various raw formats (YUYV, MJPEG, ...).
        let rgb_img: RgbImage = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::CameraFrame(format!("Decode RGB: {e}")))?;

        Ok(pack_image(&rgb_img))
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Row-major RGB image -> opaque packed pixels of the same size.
pub fn pack_image(img: &RgbImage) -> FrameBuffer {
    let (w, h) = img.dimensions();
    let pixels = img.pixels().map(|p| pack_rgb(p[0], p[1], p[2])).collect();
    FrameBuffer {
        width: w as usize,
        height: h as usize,
        pixels,
    }
}
