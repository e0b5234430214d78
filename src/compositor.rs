// Software "canvas" operations: draw the camera into its VideoRect, key out the
// background with a segmentation mask, and draw a finished frame under a glitch
// transform. All sampling is nearest-neighbour.

use kurbo::{Affine, Point};

use crate::error::Error;
use crate::types::{FrameBuffer, Mask, ALPHA_MASK, RGB_MASK};
use crate::video_rect::VideoRect;

/// Nearest source index for each destination coordinate along one axis.
/// `None` means the coordinate is outside the video area on that axis.
fn axis_lookup(len: usize, offset: f64, extent: f64, src_len: usize) -> Vec<Option<usize>> {
    (0..len)
        .map(|i| {
            let p = i as f64;
            if p < offset || p >= offset + extent || src_len == 0 {
                return None;
            }
            let s = ((p - offset) * src_len as f64 / extent).floor() as usize;
            Some(s.min(src_len - 1))
        })
        .collect()
}

/// Clear `canvas` and draw `video` scaled into `rect` (the `drawImage` step).
/// Pixels outside the rect stay transparent.
pub fn draw_video(canvas: &mut FrameBuffer, video: &FrameBuffer, rect: &VideoRect) {
    canvas.clear();
    if rect.is_empty() || video.is_empty() {
        return;
    }
    let cols = axis_lookup(canvas.width, rect.offset_x, rect.width, video.width);
    let rows = axis_lookup(canvas.height, rect.offset_y, rect.height, video.height);

    for (y, sy) in rows.iter().enumerate() {
        let Some(sy) = *sy else { continue };
        let dst_row = &mut canvas.pixels[y * canvas.width..(y + 1) * canvas.width];
        let src_row = &video.pixels[sy * video.width..(sy + 1) * video.width];
        for (dst, sx) in dst_row.iter_mut().zip(cols.iter()) {
            if let Some(sx) = *sx {
                *dst = src_row[sx] | ALPHA_MASK;
            }
        }
    }
}

/// Key out everything the mask calls background, and everything outside `rect`.
/// The mask is scaled onto the rect with independent X/Y factors; it is never
/// modified. Mask coordinates that round past the last cell are clamped to it.
pub fn apply_mask(canvas: &mut FrameBuffer, mask: &Mask, rect: &VideoRect) -> Result<(), Error> {
    if mask.is_empty() || mask.values.len() != mask.width * mask.height {
        return Err(Error::Composite(format!(
            "mask {}x{} with {} values",
            mask.width,
            mask.height,
            mask.values.len()
        )));
    }
    let cols = axis_lookup(canvas.width, rect.offset_x, rect.width, mask.width);
    let rows = axis_lookup(canvas.height, rect.offset_y, rect.height, mask.height);

    for (y, my) in rows.iter().enumerate() {
        let row = &mut canvas.pixels[y * canvas.width..(y + 1) * canvas.width];
        for (px, mx) in row.iter_mut().zip(cols.iter()) {
            let keep = match (*mx, *my) {
                (Some(mx), Some(my)) => mask.is_foreground(mx, my),
                _ => false,
            };
            *px = if keep { *px | ALPHA_MASK } else { *px & RGB_MASK };
        }
    }
    Ok(())
}

/// Draw the live `video` into `canvas` and mask it: one composited frame.
pub fn composite(
    canvas: &mut FrameBuffer,
    video: &FrameBuffer,
    mask: &Mask,
    rect: &VideoRect,
) -> Result<(), Error> {
    draw_video(canvas, video, rect);
    apply_mask(canvas, mask, rect)
}

/// Clear `dst` and draw `src` onto it with `transform` applied (src -> dst space).
/// Each destination pixel centre is pulled back through the inverse transform.
pub fn draw_transformed(dst: &mut FrameBuffer, src: &FrameBuffer, transform: Affine) -> Result<(), Error> {
    if dst.width != src.width || dst.height != src.height {
        return Err(Error::Composite(format!(
            "draw: {}x{} source onto {}x{} surface",
            src.width, src.height, dst.width, dst.height
        )));
    }
    if transform == Affine::IDENTITY {
        dst.pixels.copy_from_slice(&src.pixels);
        return Ok(());
    }
    dst.clear();
    let inverse = transform.inverse();
    let (w, h) = (src.width as f64, src.height as f64);
    for y in 0..dst.height {
        for x in 0..dst.width {
            let p = inverse * Point::new(x as f64 + 0.5, y as f64 + 0.5);
            if p.x < 0.0 || p.y < 0.0 || p.x >= w || p.y >= h {
                continue;
            }
            dst.pixels[y * dst.width + x] = src.get(p.x as usize, p.y as usize);
        }
    }
    Ok(())
}
