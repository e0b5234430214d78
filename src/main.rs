// What you SEE:
// • Your camera image with the background keyed out over a flat backdrop.
// • Every so often the picture glitches like a chewed tape: it flips, mirrors,
//   jumps sideways, or stutters through the last few frames.
// • 0–9 set the glitch frequency, [ and ] step it, Space pauses, ESC quits.

mod camera;
mod compositor;
mod draw;
mod error;
mod glitch;
mod renderer;
mod replay;
mod segment;
mod types;
mod video_rect;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use camera::{CameraCapture, FrameSource};
use draw::{draw_text_5x7, flatten_over, Command, Drawer};
use error::Error;
use glitch::{GlitchKind, RandomSource, MAX_GLITCH_FREQUENCY};
use renderer::{FrameOutcome, Renderer, DEFAULT_GLITCH_FREQUENCY};
use segment::{BackgroundSegmenter, ChromaKeySegmenter, Segmenter};
use types::FrameBuffer;

#[derive(Parser, Debug)]
#[command(name = "headroom", version, about = "Live person cut-out with analog tape glitches")]
struct Cli {
    /// Camera index (0 = default webcam).
    #[arg(long, default_value_t = 0)]
    camera: u32,

    /// Requested camera width; the device may pick the closest it supports.
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Requested camera height.
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Output width. Without it the output follows the window size.
    #[arg(long)]
    canvas_width: Option<usize>,

    /// Output height. Without it the output follows the window size.
    #[arg(long)]
    canvas_height: Option<usize>,

    /// 0 disables glitches; 10 is the busiest.
    #[arg(long, default_value_t = DEFAULT_GLITCH_FREQUENCY,
          value_parser = clap::value_parser!(u8).range(0..=MAX_GLITCH_FREQUENCY as i64))]
    glitch_frequency: u8,

    /// How the person is separated from the background.
    #[arg(long, value_enum, default_value_t = SegmenterChoice::Background)]
    segmenter: SegmenterChoice,

    /// Key colour for `--segmenter chroma`, as RRGGBB hex.
    #[arg(long, value_parser = parse_hex_rgb, default_value = "00B140")]
    key_color: u32,

    /// Colour distance (0-255) from the key still counted as background.
    #[arg(long, default_value_t = 90)]
    key_tolerance: u32,

    /// Colour distance (0-255) from the recorded background that counts as a person.
    #[arg(long, default_value_t = 30)]
    sensitivity: u32,

    /// Frames recorded for the empty-scene plate of `--segmenter background`.
    #[arg(long, default_value_t = segment::BG_CAPTURE_COUNT)]
    background_frames: usize,

    /// Mask cells are this many camera pixels on a side.
    #[arg(long, default_value_t = 4)]
    mask_downscale: usize,

    /// Display refresh rate to pace frames at.
    #[arg(long, default_value_t = 60)]
    fps: usize,

    /// Colour shown behind the cut-out, as RRGGBB hex.
    #[arg(long, value_parser = parse_hex_rgb, default_value = "101820")]
    backdrop: u32,

    /// Seed the glitch randomness for a repeatable show.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SegmenterChoice {
    /// Record the empty scene first, then cut out whatever differs from it.
    Background,
    /// Cut out whatever is not the key colour.
    Chroma,
}

fn parse_hex_rgb(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches('#');
    let value = u32::from_str_radix(digits, 16).map_err(|e| format!("{s:?}: {e}"))?;
    if value > 0x00FF_FFFF {
        return Err(format!("{s:?} is not an RRGGBB colour"));
    }
    Ok(value)
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    /* --- Camera + window setup --- */
    let mut cam = CameraCapture::new(cli.camera, cli.width, cli.height)?;
    let (cam_w, cam_h) = cam.resolution();
    let canvas_w = cli.canvas_width.unwrap_or(cam_w as usize);
    let canvas_h = cli.canvas_height.unwrap_or(cam_h as usize);
    let follow_window = cli.canvas_width.is_none() && cli.canvas_height.is_none();
    let mut drawer = Drawer::new("Headroom", canvas_w, canvas_h, cli.fps)?;

    /* --- Renderer: segmentation strategy + glitch randomness --- */
    let segmenter: Box<dyn Segmenter> = match cli.segmenter {
        SegmenterChoice::Background => Box::new(
            BackgroundSegmenter::new(cli.mask_downscale, cli.sensitivity)
                .with_capture_count(cli.background_frames),
        ),
        SegmenterChoice::Chroma => {
            Box::new(ChromaKeySegmenter::new(cli.key_color, cli.key_tolerance, cli.mask_downscale))
        }
    };
    let rng: Box<dyn RandomSource> = Box::new(match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    });
    let mut renderer = Renderer::new(segmenter, rng, canvas_w, canvas_h, cli.glitch_frequency);

    // Latest status line for the HUD.
    let status = Rc::new(RefCell::new(String::from("Initializing...")));
    let sink = status.clone();
    renderer.set_status_sink(Box::new(move |s: &str| {
        info!(status = s, "status");
        *sink.borrow_mut() = s.to_string();
    }));

    renderer.load_model(&mut cam)?;
    renderer.start();

    /* --- Reusable screen buffer: the overlay flattened onto the backdrop --- */
    let mut screen = FrameBuffer::filled(canvas_w, canvas_h, cli.backdrop);

    let clock = Instant::now();
    let mut last_fps_time = Instant::now();
    let mut frames_this_second: u32 = 0;
    let mut hud_fps_text = String::from("FPS: 0.0");
    let mut shown_glitch = GlitchKind::None;

    /* ------------------------------ Main loop ------------------------------ */
    while drawer.is_open() && !drawer.esc_pressed() {
        let now = Instant::now();

        /* 1) Live configuration from the keyboard. */
        for command in drawer.commands() {
            match command {
                Command::SetFrequency(f) => renderer.set_glitch_frequency(f),
                Command::FrequencyUp => renderer.set_glitch_frequency(renderer.glitch_frequency().saturating_add(1)),
                Command::FrequencyDown => renderer.set_glitch_frequency(renderer.glitch_frequency().saturating_sub(1)),
                Command::ToggleRunning => {
                    if renderer.is_running() {
                        renderer.stop();
                    } else {
                        renderer.start();
                    }
                }
            }
        }

        /* 2) Follow the window size unless the output size was pinned. */
        if follow_window {
            if let Some((w, h)) = drawer.size() {
                let out = renderer.output();
                if (w, h) != (out.width, out.height) {
                    renderer.resize(w, h);
                }
            }
        }

        /* 3) One frame through the pipeline. Errors are logged inside. */
        let millis = now.duration_since(clock).as_secs_f64() * 1000.0;
        if let FrameOutcome::Rendered { glitch, .. } = renderer.tick(millis, &mut cam) {
            shown_glitch = glitch;
        }

        /* 4) Flatten, HUD, present (blocks until the next refresh slot). */
        flatten_over(&mut screen, renderer.output(), cli.backdrop);
        let glitch_text = if shown_glitch == GlitchKind::None { "" } else { shown_glitch.label() };
        let hud = format!(
            "{} | GLITCH {} {} | TAPE {} | {}",
            status.borrow(),
            renderer.glitch_frequency(),
            glitch_text,
            renderer.context().replay.len(),
            hud_fps_text
        );
        draw_text_5x7(&mut screen, 8, 8, &hud, 0x00_FF_FF_FF);
        drawer.present(&screen)?;

        /* 5) FPS counter, once per second. */
        frames_this_second += 1;
        if now.duration_since(last_fps_time) >= Duration::from_secs(1) {
            let secs = now.duration_since(last_fps_time).as_secs_f32();
            let fps = frames_this_second as f32 / secs;
            info!("FPS: {:.1}", fps);
            hud_fps_text = format!("FPS: {:.1}", fps);
            frames_this_second = 0;
            last_fps_time = now;
        }
    }

    renderer.destroy();
    cam.stop();
    Ok(())
}
