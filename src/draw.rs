// Window + software drawing utilities:
// 1) A resizable window paced to the display rate.
// 2) Flattening the transparent overlay onto a backdrop colour.
// 3) A tiny 5x7 bitmap font for the HUD line.

use crate::error::Error;
use crate::types::{alpha_of, FrameBuffer, ALPHA_MASK, RGB_MASK};
use minifb::{Key, KeyRepeat, Window, WindowOptions};

/// A key press the main loop cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    SetFrequency(u8),
    FrequencyUp,
    FrequencyDown,
    ToggleRunning,
}

pub struct Drawer {
    window: Window,
}

impl Drawer {
    /// Open a resizable window. `fps` paces `present()` like a display refresh.
    /// Visual: a new empty window appears with your chosen title.
    pub fn new(title: &str, width: usize, height: usize, fps: usize) -> Result<Self, Error> {
        let options = WindowOptions { resize: true, ..WindowOptions::default() };
        let mut window = Window::new(title, width, height, options)
            .map_err(|e| Error::WindowInit(e.to_string()))?;
        window.set_target_fps(fps);
        Ok(Self { window })
    }

    /// Push the pixels for this frame; blocks until the next refresh slot.
    /// Visual: the window shows the new image.
    pub fn present(&mut self, framebuffer: &FrameBuffer) -> Result<(), Error> {
        self.window
            .update_with_buffer(&framebuffer.pixels, framebuffer.width, framebuffer.height)
            .map_err(|e| Error::WindowUpdate(e.to_string()))?;
        Ok(())
    }

    /// Returns false when the user closes the window (so we can stop the loop).
    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn esc_pressed(&self) -> bool {
        self.window.is_key_down(Key::Escape)
    }

    /// Current client-area size; `None` while minimised.
    /// Visual: dragging the window edge changes what this returns, and the
    /// picture is refitted to the new size.
    pub fn size(&self) -> Option<(usize, usize)> {
        let (w, h) = self.window.get_size();
        (w > 0 && h > 0).then_some((w, h))
    }

    /// Keys pressed since the last `present()`, as commands.
    pub fn commands(&self) -> Vec<Command> {
        self.window
            .get_keys_pressed(KeyRepeat::No)
            .into_iter()
            .filter_map(command_for)
            .collect()
    }
}

fn command_for(key: Key) -> Option<Command> {
    let digit = match key {
        Key::Key0 => 0,
        Key::Key1 => 1,
        Key::Key2 => 2,
        Key::Key3 => 3,
        Key::Key4 => 4,
        Key::Key5 => 5,
        Key::Key6 => 6,
        Key::Key7 => 7,
        Key::Key8 => 8,
        Key::Key9 => 9,
        Key::RightBracket => return Some(Command::FrequencyUp),
        Key::LeftBracket => return Some(Command::FrequencyDown),
        Key::Space => return Some(Command::ToggleRunning),
        _ => return None,
    };
    Some(Command::SetFrequency(digit))
}

/// Write `overlay` onto `screen`, showing `backdrop` wherever the overlay is
/// transparent. `screen` is resized to match.
/// Visual: the keyed-out background turns into the flat backdrop colour.
pub fn flatten_over(screen: &mut FrameBuffer, overlay: &FrameBuffer, backdrop: u32) {
    if screen.width != overlay.width || screen.height != overlay.height {
        screen.resize(overlay.width, overlay.height);
    }
    let backdrop = backdrop | ALPHA_MASK;
    for (dst, &px) in screen.pixels.iter_mut().zip(overlay.pixels.iter()) {
        *dst = if alpha_of(px) == 0 { backdrop } else { px | ALPHA_MASK };
    }
}

/* ---------- Software drawing: pixels, tiny bitmap font ---------- */

/// Put a pixel on the framebuffer if (x,y) is inside bounds.
/// Visual: the exact pixel at (x,y) changes color.
#[inline]
fn put_pixel(fb: &mut FrameBuffer, x: i32, y: i32, color: u32) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as usize, y as usize);
    if x >= fb.width || y >= fb.height {
        return;
    }
    let idx = y * fb.width + x;
    fb.pixels[idx] = color;
}

/// Return a 5x7 glyph bitmap. Lowercase letters use the uppercase shapes.
/// Each u8 is a row; the low 5 bits are the pixels (bit 4 = leftmost).
fn glyph5x7(ch: char) -> Option<[u8; 7]> {
    macro_rules! g { ($a:expr,$b:expr,$c:expr,$d:expr,$e:expr,$f:expr,$g:expr) => {
        Some([$a,$b,$c,$d,$e,$f,$g])
    }; }

    match ch.to_ascii_uppercase() {
        '0' => g!(0b01110,0b10001,0b10011,0b10101,0b11001,0b10001,0b01110),
        '1' => g!(0b00100,0b01100,0b00100,0b00100,0b00100,0b00100,0b01110),
        '2' => g!(0b01110,0b10001,0b00001,0b00010,0b00100,0b01000,0b11111),
        '3' => g!(0b11110,0b00001,0b00001,0b01110,0b00001,0b00001,0b11110),
        '4' => g!(0b00010,0b00110,0b01010,0b10010,0b11111,0b00010,0b00010),
        '5' => g!(0b11111,0b10000,0b11110,0b00001,0b00001,0b10001,0b01110),
        '6' => g!(0b00110,0b01000,0b10000,0b11110,0b10001,0b10001,0b01110),
        '7' => g!(0b11111,0b00001,0b00010,0b00100,0b01000,0b01000,0b01000),
        '8' => g!(0b01110,0b10001,0b10001,0b01110,0b10001,0b10001,0b01110),
        '9' => g!(0b01110,0b10001,0b10001,0b01111,0b00001,0b00010,0b01100),

        'A' => g!(0b01110,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001),
        'B' => g!(0b11110,0b10001,0b10001,0b11110,0b10001,0b10001,0b11110),
        'C' => g!(0b01110,0b10001,0b10000,0b10000,0b10000,0b10001,0b01110),
        'D' => g!(0b11100,0b10010,0b10001,0b10001,0b10001,0b10010,0b11100),
        'E' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b11111),
        'F' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b10000),
        'G' => g!(0b01110,0b10001,0b10000,0b10111,0b10001,0b10001,0b01111),
        'H' => g!(0b10001,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001),
        'I' => g!(0b01110,0b00100,0b00100,0b00100,0b00100,0b00100,0b01110),
        'J' => g!(0b00111,0b00010,0b00010,0b00010,0b00010,0b10010,0b01100),
        'K' => g!(0b10001,0b10010,0b10100,0b11000,0b10100,0b10010,0b10001),
        'L' => g!(0b10000,0b10000,0b10000,0b10000,0b10000,0b10000,0b11111),
        'M' => g!(0b10001,0b11011,0b10101,0b10101,0b10001,0b10001,0b10001),
        'N' => g!(0b10001,0b10001,0b11001,0b10101,0b10011,0b10001,0b10001),
        'O' => g!(0b01110,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110),
        'P' => g!(0b11110,0b10001,0b10001,0b11110,0b10000,0b10000,0b10000),
        'Q' => g!(0b01110,0b10001,0b10001,0b10001,0b10101,0b10010,0b01101),
        'R' => g!(0b11110,0b10001,0b10001,0b11110,0b10100,0b10010,0b10001),
        'S' => g!(0b01111,0b10000,0b10000,0b01110,0b00001,0b00001,0b11110),
        'T' => g!(0b11111,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),
        'U' => g!(0b10001,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110),
        'V' => g!(0b10001,0b10001,0b10001,0b10001,0b10001,0b01010,0b00100),
        'W' => g!(0b10001,0b10001,0b10001,0b10101,0b10101,0b10101,0b01010),
        'X' => g!(0b10001,0b10001,0b01010,0b00100,0b01010,0b10001,0b10001),
        'Y' => g!(0b10001,0b10001,0b01010,0b00100,0b00100,0b00100,0b00100),
        'Z' => g!(0b11111,0b00001,0b00010,0b00100,0b01000,0b10000,0b11111),

        ' ' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00000,0b00000),
        '|' => g!(0b00100,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),
        ':' => g!(0b00000,0b00100,0b00000,0b00000,0b00100,0b00000,0b00000),
        '.' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00100,0b00000),
        '-' => g!(0b00000,0b00000,0b00000,0b11111,0b00000,0b00000,0b00000),
        '/' => g!(0b00001,0b00001,0b00010,0b00100,0b01000,0b10000,0b10000),

        _ => None,
    }
}

/// Draw a single 5x7 character at (x,y) with a 1-pixel black shadow.
/// Visual: a tiny glyph that stays readable over a busy picture.
fn draw_char_5x7(fb: &mut FrameBuffer, x: i32, y: i32, ch: char, color: u32) {
    if let Some(rows) = glyph5x7(ch) {
        // Shadow pass first, offset by (1,1).
        for (dx, dy, c) in [(1, 1, ALPHA_MASK), (0, 0, color | ALPHA_MASK)] {
            for (ry, rowbits) in rows.iter().enumerate() {
                for rx in 0..5 {
                    if (rowbits & (1 << (4 - rx))) != 0 {
                        put_pixel(fb, x + rx + dx, y + ry as i32 + dy, c);
                    }
                }
            }
        }
    }
}

/// Draw a text string using 5x7 glyphs (1-pixel spacing).
/// Visual: a compact HUD line in the top-left corner.
/// Characters without a glyph leave a gap.
pub fn draw_text_5x7(fb: &mut FrameBuffer, mut x: i32, y: i32, text: &str, color: u32) {
    for ch in text.chars() {
        draw_char_5x7(fb, x, y, ch, color & RGB_MASK);
        x += 6;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::pack_rgb;

    #[test]
    fn transparent_pixels_show_the_backdrop() {
        let overlay = FrameBuffer { width: 2, height: 1, pixels: vec![0x00_11_22_33, pack_rgb(9, 8, 7)] };
        let mut screen = FrameBuffer::transparent(0, 0);
        flatten_over(&mut screen, &overlay, 0x10_18_20);
        assert_eq!(screen.pixels, vec![0xFF_10_18_20, pack_rgb(9, 8, 7)]);
    }

    #[test]
    fn status_messages_have_glyphs() {
        for text in ["Loading background model...", "Model loaded", "Ready", "Stopped", "FPS: 59.9 | GLITCH 10 | SKIP"] {
            for ch in text.chars() {
                assert!(glyph5x7(ch).is_some(), "no glyph for {ch:?}");
            }
        }
    }

    #[test]
    fn text_is_clipped_at_the_edges() {
        let mut fb = FrameBuffer::transparent(8, 8);
        draw_text_5x7(&mut fb, 4, 4, "W", 0xFF_FF_FF);
        draw_text_5x7(&mut fb, -3, -3, "W", 0xFF_FF_FF);
        assert!(fb.pixels.iter().any(|&p| p == 0xFF_FF_FF_FF));
    }

    #[test]
    fn keys_map_to_commands() {
        assert_eq!(command_for(Key::Key7), Some(Command::SetFrequency(7)));
        assert_eq!(command_for(Key::RightBracket), Some(Command::FrequencyUp));
        assert_eq!(command_for(Key::Space), Some(Command::ToggleRunning));
        assert_eq!(command_for(Key::A), None);
    }
}
