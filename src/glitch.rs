// Analog "bad tape" glitches: when they fire, which kind, how long, and how
// each kind bends the picture.
//
// Glitches come in bursts. A burst picks a kind and a repeat budget; while
// budget remains the next glitch is scheduled 150..350 ms out and usually
// (70%) repeats the same kind. Once the budget is spent a quiet interval
// follows whose length depends on the configured frequency.

use kurbo::Affine;
use rand::Rng;
use rand::rngs::StdRng;

use crate::video_rect::VideoRect;

/// Highest accepted glitch frequency; 0 turns glitches off.
pub const MAX_GLITCH_FREQUENCY: u8 = 10;

const MIN_DURATION_MS: f64 = 80.0;
const DURATION_SPREAD_MS: f64 = 200.0;
const BURST_GAP_MS: f64 = 150.0;
const BURST_GAP_SPREAD_MS: f64 = 200.0;
const REPEAT_CHANCE: f64 = 0.7;
const MIN_INTERVAL_MS: f64 = 500.0;
const MAX_INTERVAL_MS: f64 = 5000.0;
/// How long a disabled machine waits before looking again.
const DISABLED_RECHECK_MS: f64 = 10_000.0;

/// Uniform draws in [0, 1). Injected so tests can force exact sequences.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

impl RandomSource for StdRng {
    fn next_unit(&mut self) -> f64 {
        self.random::<f64>()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GlitchKind {
    #[default]
    None,
    FlipH,
    FlipV,
    FlipBoth,
    Mirror,
    Offset,
    Skip,
}

impl GlitchKind {
    /// The kinds a new burst chooses from, uniformly.
    pub const ACTIVE: [GlitchKind; 6] = [
        GlitchKind::FlipH,
        GlitchKind::FlipV,
        GlitchKind::FlipBoth,
        GlitchKind::Mirror,
        GlitchKind::Offset,
        GlitchKind::Skip,
    ];

    pub fn label(self) -> &'static str {
        match self {
            GlitchKind::None => "NONE",
            GlitchKind::FlipH => "FLIP H",
            GlitchKind::FlipV => "FLIP V",
            GlitchKind::FlipBoth => "FLIP HV",
            GlitchKind::Mirror => "MIRROR",
            GlitchKind::Offset => "OFFSET",
            GlitchKind::Skip => "SKIP",
        }
    }

    /// Draw-time transform for this kind, pivoting on `center` where it flips.
    /// `Offset` and `Skip` draw fresh jitter on every call.
    pub fn transform(self, center: (f64, f64), now_ms: f64, rng: &mut dyn RandomSource) -> Affine {
        let (cx, cy) = center;
        let about_center = |sx: f64, sy: f64| {
            Affine::translate((cx, cy)) * Affine::scale_non_uniform(sx, sy) * Affine::translate((-cx, -cy))
        };
        match self {
            GlitchKind::None => Affine::IDENTITY,
            GlitchKind::FlipH => about_center(-1.0, 1.0),
            GlitchKind::FlipV => about_center(1.0, -1.0),
            GlitchKind::FlipBoth => about_center(-1.0, -1.0),
            GlitchKind::Mirror => {
                // Flipped, with a wobble that slides the image sideways.
                let wobble = (now_ms * 0.01).sin() * 20.0;
                Affine::translate((cx, cy))
                    * Affine::scale_non_uniform(-1.0, 1.0)
                    * Affine::translate((-cx + wobble, -cy))
            }
            GlitchKind::Offset => {
                let dx = (rng.next_unit() - 0.5) * 40.0;
                let dy = (rng.next_unit() - 0.5) * 20.0;
                Affine::translate((dx, dy))
            }
            GlitchKind::Skip => {
                let dx = (rng.next_unit() - 0.5) * 6.0;
                let dy = (rng.next_unit() - 0.5) * 6.0;
                Affine::translate((dx, dy))
            }
        }
    }
}

/// What one `update` call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlitchEvent {
    Quiet,
    /// A glitch began. `repeat` is true when it re-used the burst's kind.
    Started { kind: GlitchKind, repeat: bool },
    Ended,
}

/// Base quiet interval between bursts: 5000 ms at frequency 1 down to 500 ms at 10.
pub fn quiet_interval_ms(frequency: u8) -> f64 {
    let f = frequency.clamp(1, MAX_GLITCH_FREQUENCY) as f64;
    MAX_INTERVAL_MS - ((f - 1.0) / 9.0) * (MAX_INTERVAL_MS - MIN_INTERVAL_MS)
}

/// Per-instance glitch timing state. Times are milliseconds on the caller's clock.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlitchState {
    pub is_glitching: bool,
    pub glitch_type: GlitchKind,
    pub glitch_start_time: f64,
    pub glitch_duration: f64,
    pub next_glitch_time: f64,
    pub last_glitch_type: GlitchKind,
    pub repeat_count: u32,
    pub max_repeats: u32,
}

impl GlitchState {
    /// Advance the machine to `now`. Call once per frame.
    pub fn update(&mut self, now: f64, frequency: u8, rng: &mut dyn RandomSource) -> GlitchEvent {
        let mut event = GlitchEvent::Quiet;

        if !self.is_glitching && now >= self.next_glitch_time {
            if frequency == 0 {
                self.next_glitch_time = now + DISABLED_RECHECK_MS;
            } else {
                event = self.begin(now, rng);
                self.schedule_next(now, frequency, rng);
            }
        }

        if self.is_glitching && now >= self.glitch_start_time + self.glitch_duration {
            self.is_glitching = false;
            self.glitch_type = GlitchKind::None;
            event = GlitchEvent::Ended;
        }
        event
    }

    fn begin(&mut self, now: f64, rng: &mut dyn RandomSource) -> GlitchEvent {
        self.is_glitching = true;
        self.glitch_start_time = now;
        self.glitch_duration = MIN_DURATION_MS + rng.next_unit() * DURATION_SPREAD_MS;

        let repeat = self.last_glitch_type != GlitchKind::None
            && self.repeat_count < self.max_repeats
            && rng.next_unit() < REPEAT_CHANCE;

        if repeat {
            self.glitch_type = self.last_glitch_type;
            self.repeat_count += 1;
        } else {
            let pick = (rng.next_unit() * GlitchKind::ACTIVE.len() as f64) as usize;
            let kind = GlitchKind::ACTIVE[pick.min(GlitchKind::ACTIVE.len() - 1)];
            self.glitch_type = kind;
            self.last_glitch_type = kind;
            self.repeat_count = 1;
            self.max_repeats = if kind == GlitchKind::Skip {
                2 + (rng.next_unit() * 5.0) as u32
            } else {
                1 + (rng.next_unit() * 4.0) as u32
            };
        }
        GlitchEvent::Started { kind: self.glitch_type, repeat }
    }

    fn schedule_next(&mut self, now: f64, frequency: u8, rng: &mut dyn RandomSource) {
        if self.repeat_count < self.max_repeats {
            self.next_glitch_time = now + BURST_GAP_MS + rng.next_unit() * BURST_GAP_SPREAD_MS;
        } else {
            let interval = quiet_interval_ms(frequency);
            self.next_glitch_time = now + interval + rng.next_unit() * interval * 0.5;
            self.last_glitch_type = GlitchKind::None;
            self.repeat_count = 0;
            self.max_repeats = 0;
        }
    }

    /// True while a skip glitch wants frames from the replay buffer.
    pub fn is_skipping(&self) -> bool {
        self.is_glitching && self.glitch_type == GlitchKind::Skip
    }

    /// The transform to draw this frame with, pivoting on the video's centre.
    pub fn transform(&self, rect: &VideoRect, now: f64, rng: &mut dyn RandomSource) -> Option<Affine> {
        if !self.is_glitching {
            return None;
        }
        Some(self.glitch_type.transform(rect.center(), now, rng))
    }
}

/// Replays a fixed list of draws, then repeats `fallback` forever.
#[cfg(test)]
pub struct ScriptedRandom {
    pub draws: std::collections::VecDeque<f64>,
    pub fallback: f64,
}

#[cfg(test)]
impl ScriptedRandom {
    pub fn new(draws: &[f64], fallback: f64) -> Self {
        Self { draws: draws.iter().copied().collect(), fallback }
    }
}

#[cfg(test)]
impl RandomSource for ScriptedRandom {
    fn next_unit(&mut self) -> f64 {
        self.draws.pop_front().unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;
    use rand::SeedableRng;

    fn assert_close(p: Point, x: f64, y: f64) {
        assert!((p.x - x).abs() < 1e-9 && (p.y - y).abs() < 1e-9, "{p:?} != ({x}, {y})");
    }

    #[test]
    fn frequency_zero_never_glitches() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = GlitchState::default();
        for frame in 0..10_000u32 {
            state.update(frame as f64 * 16.0, 0, &mut rng);
            assert!(!state.is_glitching);
        }
    }

    #[test]
    fn quiet_interval_spans_five_seconds_to_half_a_second() {
        assert_eq!(quiet_interval_ms(1), 5000.0);
        assert_eq!(quiet_interval_ms(10), 500.0);
        for f in 1..MAX_GLITCH_FREQUENCY {
            assert!(quiet_interval_ms(f + 1) < quiet_interval_ms(f));
        }
    }

    #[test]
    fn first_glitch_starts_a_burst() {
        // duration, kind (FlipV), max repeats (1 + 3), burst gap
        let mut rng = ScriptedRandom::new(&[0.5, 0.2, 0.99, 0.0], 0.0);
        let mut state = GlitchState::default();
        let event = state.update(1000.0, 5, &mut rng);

        assert_eq!(event, GlitchEvent::Started { kind: GlitchKind::FlipV, repeat: false });
        assert!(state.is_glitching);
        assert_eq!(state.glitch_duration, 180.0);
        assert_eq!(state.last_glitch_type, GlitchKind::FlipV);
        assert_eq!((state.repeat_count, state.max_repeats), (1, 4));
        assert_eq!(state.next_glitch_time, 1150.0);
    }

    #[test]
    fn glitch_ends_after_its_duration() {
        let mut rng = ScriptedRandom::new(&[0.0, 0.0, 0.99, 0.0], 0.0);
        let mut state = GlitchState::default();
        state.update(0.0, 5, &mut rng);
        assert_eq!(state.update(79.0, 5, &mut rng), GlitchEvent::Quiet);
        assert!(state.is_glitching);
        assert_eq!(state.update(80.0, 5, &mut rng), GlitchEvent::Ended);
        assert!(!state.is_glitching);
        assert_eq!(state.glitch_type, GlitchKind::None);
    }

    #[test]
    fn burst_repeats_the_same_kind() {
        let mut rng = ScriptedRandom::new(
            &[
                0.0, 0.55, 0.99, 0.0, // Mirror, budget 4, gap 150
                0.0, 0.1, 0.0, // repeat (0.1 < 0.7), gap 150
            ],
            0.0,
        );
        let mut state = GlitchState::default();
        state.update(0.0, 5, &mut rng);
        assert_eq!(state.glitch_type, GlitchKind::Mirror);
        state.update(100.0, 5, &mut rng);
        assert!(!state.is_glitching);

        let event = state.update(150.0, 5, &mut rng);
        assert_eq!(event, GlitchEvent::Started { kind: GlitchKind::Mirror, repeat: true });
        assert_eq!(state.repeat_count, 2);
        assert_eq!(state.next_glitch_time, 300.0);
    }

    #[test]
    fn failed_repeat_draw_picks_a_fresh_burst() {
        let mut rng = ScriptedRandom::new(
            &[
                0.0, 0.0, 0.99, 0.0, // FlipH, budget 4
                0.0, 0.9, 0.7, 0.0, 0.0, // no repeat, Offset, budget 1, quiet
            ],
            0.0,
        );
        let mut state = GlitchState::default();
        state.update(0.0, 10, &mut rng);
        state.update(100.0, 10, &mut rng);
        let event = state.update(150.0, 10, &mut rng);
        assert_eq!(event, GlitchEvent::Started { kind: GlitchKind::Offset, repeat: false });
        assert_eq!(state.repeat_count, 0, "single-shot burst is consumed at once");
        assert_eq!(state.last_glitch_type, GlitchKind::None);
        assert_eq!(state.next_glitch_time, 650.0);
    }

    #[test]
    fn skip_burst_gets_a_larger_budget() {
        let mut rng = ScriptedRandom::new(&[0.0, 0.95, 0.0, 0.0], 0.0);
        let mut state = GlitchState::default();
        let event = state.update(0.0, 3, &mut rng);
        assert_eq!(event, GlitchEvent::Started { kind: GlitchKind::Skip, repeat: false });
        assert_eq!(state.max_repeats, 2);
        assert!(state.is_skipping());

        let mut rng = ScriptedRandom::new(&[0.0, 0.95, 0.999], 0.0);
        let mut state = GlitchState::default();
        state.update(0.0, 3, &mut rng);
        assert_eq!(state.max_repeats, 6);
    }

    #[test]
    fn exhausted_burst_waits_a_quiet_interval() {
        // FlipH with budget 1: the burst is spent immediately.
        let mut rng = ScriptedRandom::new(&[0.0, 0.0, 0.0, 1.0 - f64::EPSILON], 0.0);
        let mut state = GlitchState::default();
        state.update(0.0, 1, &mut rng);
        assert_eq!((state.repeat_count, state.max_repeats), (0, 0));
        assert!((state.next_glitch_time - 7500.0).abs() < 1e-6);
    }

    #[test]
    fn average_gap_shrinks_as_frequency_rises() {
        let mut averages = Vec::new();
        for frequency in 1..=MAX_GLITCH_FREQUENCY {
            let mut rng = StdRng::seed_from_u64(42);
            let mut state = GlitchState::default();
            let mut starts = Vec::new();
            let mut now = 0.0;
            while starts.len() < 500 {
                if let GlitchEvent::Started { .. } = state.update(now, frequency, &mut rng) {
                    starts.push(now);
                }
                now += 16.0;
            }
            let gaps: f64 = starts.windows(2).map(|w| w[1] - w[0]).sum();
            averages.push(gaps / (starts.len() - 1) as f64);
        }
        for pair in averages.windows(2) {
            assert!(pair[1] < pair[0], "averages not decreasing: {averages:?}");
        }
    }

    #[test]
    fn flip_h_mirrors_about_center() {
        let mut rng = ScriptedRandom::new(&[], 0.5);
        let (cx, cy) = (320.0, 240.0);
        let t = GlitchKind::FlipH.transform((cx, cy), 0.0, &mut rng);
        assert_close(t * Point::new(cx + 5.0, cy), cx - 5.0, cy);
    }

    #[test]
    fn flip_v_and_both_pivot_on_center() {
        let mut rng = ScriptedRandom::new(&[], 0.5);
        let c = (100.0, 50.0);
        let v = GlitchKind::FlipV.transform(c, 0.0, &mut rng);
        assert_close(v * Point::new(103.0, 57.0), 103.0, 43.0);
        let both = GlitchKind::FlipBoth.transform(c, 0.0, &mut rng);
        assert_close(both * Point::new(103.0, 57.0), 97.0, 43.0);
    }

    #[test]
    fn mirror_wobbles_sideways_over_time() {
        let mut rng = ScriptedRandom::new(&[], 0.5);
        let c = (100.0, 50.0);
        let still = GlitchKind::Mirror.transform(c, 0.0, &mut rng);
        assert_close(still * Point::new(110.0, 50.0), 90.0, 50.0);
        // sin(pi/2) = 1: the pre-flip shift of +20 lands as -20 after flipping.
        let t = std::f64::consts::FRAC_PI_2 / 0.01;
        let moved = GlitchKind::Mirror.transform(c, t, &mut rng);
        assert_close(moved * Point::new(110.0, 50.0), 70.0, 50.0);
    }

    #[test]
    fn offset_and_skip_jitter_stay_small() {
        let mut rng = ScriptedRandom::new(&[0.0, 1.0, 0.0, 1.0], 0.5);
        let offset = GlitchKind::Offset.transform((0.0, 0.0), 0.0, &mut rng);
        assert_close(offset * Point::ORIGIN, -20.0, 10.0);
        let skip = GlitchKind::Skip.transform((0.0, 0.0), 0.0, &mut rng);
        assert_close(skip * Point::ORIGIN, -3.0, 3.0);
    }

    #[test]
    fn idle_state_has_no_transform() {
        let mut rng = ScriptedRandom::new(&[], 0.5);
        let rect = VideoRect { offset_x: 0.0, offset_y: 0.0, width: 10.0, height: 10.0 };
        assert!(GlitchState::default().transform(&rect, 0.0, &mut rng).is_none());
    }
}
