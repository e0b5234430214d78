// Where on the canvas the camera image goes.
// The video *covers* the canvas: it is scaled until both dimensions reach the
// canvas, keeping its aspect ratio, and centred. The overflowing side is cropped.

/// Placement of the aspect-corrected video on the output canvas, in canvas pixels.
/// Offsets are negative on the cropped axis.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct VideoRect {
    pub offset_x: f64,
    pub offset_y: f64,
    pub width: f64,
    pub height: f64,
}

impl VideoRect {
    /// Fit a `video_w` x `video_h` source onto a `canvas_w` x `canvas_h` canvas.
    /// Before the camera reports its size (0 x 0) the result is an empty rect,
    /// which the compositor treats as "nothing inside".
    pub fn fit(video_w: usize, video_h: usize, canvas_w: usize, canvas_h: usize) -> Self {
        if video_w == 0 || video_h == 0 || canvas_w == 0 || canvas_h == 0 {
            return Self::default();
        }
        let (vw, vh) = (video_w as f64, video_h as f64);
        let (cw, ch) = (canvas_w as f64, canvas_h as f64);
        let video_aspect = vw / vh;
        let canvas_aspect = cw / ch;

        if video_aspect > canvas_aspect {
            // Wider than the canvas: match heights, crop the sides.
            let width = ch * video_aspect;
            Self { offset_x: (cw - width) / 2.0, offset_y: 0.0, width, height: ch }
        } else {
            // Taller (or equal): match widths, crop top/bottom.
            let height = cw / video_aspect;
            Self { offset_x: 0.0, offset_y: (ch - height) / 2.0, width: cw, height }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// True when the canvas pixel at (x, y) lies inside the video area.
    #[cfg(test)]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.offset_x
            && x < self.offset_x + self.width
            && y >= self.offset_y
            && y < self.offset_y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.offset_x + self.width / 2.0, self.offset_y + self.height / 2.0)
    }
}
