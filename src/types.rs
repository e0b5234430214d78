// Core pixel types shared by the camera, the compositor and the window.

/// A canvas-sized pixel grid. Each entry is 0xAARRGGBB.
/// Camera frames arrive fully opaque; composited frames carry alpha 0 where
/// the background was keyed out.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameBuffer {
    pub width: usize,      // how wide the frame is (pixels)
    pub height: usize,     // how tall the frame is (pixels)
    pub pixels: Vec<u32>,  // length = width * height
}

pub const ALPHA_MASK: u32 = 0xFF_00_00_00;
pub const RGB_MASK: u32 = 0x00_FF_FF_FF;

impl FrameBuffer {
    /// A fully transparent buffer.
    pub fn transparent(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![0u32; width * height] }
    }

    /// A buffer filled with one colour.
    pub fn filled(width: usize, height: usize, argb: u32) -> Self {
        Self { width, height, pixels: vec![argb; width * height] }
    }

    /// Make every pixel transparent (the `clearRect` of a canvas).
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Reallocate for a new size; contents become transparent.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize(width * height, 0);
    }

    /// Become a copy of `other`, reusing this allocation when possible.
    pub fn copy_from(&mut self, other: &FrameBuffer) {
        self.width = other.width;
        self.height = other.height;
        self.pixels.clear();
        self.pixels.extend_from_slice(&other.pixels);
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * self.width + x]
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[inline]
pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    ALPHA_MASK | ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

#[inline]
pub fn unpack_rgb(px: u32) -> (u8, u8, u8) {
    (((px >> 16) & 0xFF) as u8, ((px >> 8) & 0xFF) as u8, (px & 0xFF) as u8)
}

#[inline]
pub fn alpha_of(px: u32) -> u8 {
    (px >> 24) as u8
}

/// How a mask stores its per-cell classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaskEncoding {
    /// 0 = background, anything else = person.
    Labels,
    /// 0..=255 person probability; below `threshold` counts as background.
    Probability { threshold: u8 },
}

/// Foreground/background classification aligned to a video frame.
/// Its grid is usually coarser than the canvas; the compositor scales it.
#[derive(Clone, Debug, PartialEq)]
pub struct Mask {
    pub width: usize,
    pub height: usize,
    pub values: Vec<u8>,   // length = width * height
    pub encoding: MaskEncoding,
}

impl Mask {
    pub fn is_foreground(&self, mx: usize, my: usize) -> bool {
        let v = self.values[my * self.width + mx];
        match self.encoding {
            MaskEncoding::Labels => v != 0,
            MaskEncoding::Probability { threshold } => v >= threshold,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probability_threshold_is_inclusive() {
        let mask = Mask {
            width: 3,
            height: 1,
            values: vec![127, 128, 255],
            encoding: MaskEncoding::Probability { threshold: 128 },
        };
        assert!(!mask.is_foreground(0, 0));
        assert!(mask.is_foreground(1, 0));
        assert!(mask.is_foreground(2, 0));
    }

    #[test]
    fn labels_treat_zero_as_background() {
        let mask = Mask { width: 2, height: 1, values: vec![0, 1], encoding: MaskEncoding::Labels };
        assert!(!mask.is_foreground(0, 0));
        assert!(mask.is_foreground(1, 0));
    }

    #[test]
    fn packed_pixels_are_opaque() {
        let px = pack_rgb(0x12, 0x34, 0x56);
        assert_eq!(alpha_of(px), 0xFF);
        assert_eq!(unpack_rgb(px), (0x12, 0x34, 0x56));
    }
}
