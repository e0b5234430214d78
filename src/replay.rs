// "Stuck tape" history: the last few composited frames, replayed on a skip glitch.

use std::collections::VecDeque;

use crate::types::FrameBuffer;

pub const REPLAY_CAPACITY: usize = 12;
/// How far behind the newest capture a replay starts.
pub const REPLAY_REWIND: usize = 8;
/// Once a replay runs off the end it keeps looping over this many frames.
pub const REPLAY_LOOP: usize = 6;

/// Bounded FIFO of live-composited frames plus a replay read cursor.
/// Only live output is ever captured, so replaying never compounds distortion.
#[derive(Debug, Default)]
pub struct FrameReplayBuffer {
    frames: VecDeque<FrameBuffer>,
    cursor: usize,
}

impl FrameReplayBuffer {
    /// Store a copy of a freshly composited frame, evicting the oldest when full.
    pub fn capture(&mut self, frame: &FrameBuffer) {
        // Reuse the evicted frame's allocation when the sizes line up.
        let evicted = if self.frames.len() >= REPLAY_CAPACITY {
            self.frames.pop_front()
        } else {
            None
        };
        let copy = match evicted {
            Some(mut old) if old.pixels.len() == frame.pixels.len() => {
                old.width = frame.width;
                old.height = frame.height;
                old.pixels.copy_from_slice(&frame.pixels);
                old
            }
            _ => frame.clone(),
        };
        self.frames.push_back(copy);
    }

    /// Rewind the cursor a few frames behind the newest capture.
    pub fn start_replay(&mut self) {
        self.cursor = self.frames.len().saturating_sub(REPLAY_REWIND);
    }

    /// The frame under the cursor, then advance. Past the end the cursor loops
    /// back over the last few frames. `None` when nothing has been captured.
    pub fn next_replay_frame(&mut self) -> Option<&FrameBuffer> {
        if self.frames.is_empty() {
            return None;
        }
        // Captures since the last rewind can't move it backwards, but a clear can.
        if self.cursor >= self.frames.len() {
            self.cursor = self.frames.len().saturating_sub(REPLAY_LOOP);
        }
        let index = self.cursor;
        self.cursor += 1;
        if self.cursor >= self.frames.len() {
            self.cursor = self.frames.len().saturating_sub(REPLAY_LOOP);
        }
        self.frames.get(index)
    }

    /// Drop all history (the canvas changed size).
    pub fn clear(&mut self) {
        self.frames.clear();
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[cfg(test)]
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1x1 frame whose only pixel records its capture order.
    fn tagged(n: u32) -> FrameBuffer {
        FrameBuffer { width: 1, height: 1, pixels: vec![n] }
    }

    fn tag(f: &FrameBuffer) -> u32 {
        f.pixels[0]
    }

    #[test]
    fn capture_never_exceeds_capacity_and_evicts_oldest() {
        let mut buf = FrameReplayBuffer::default();
        for n in 0..30 {
            buf.capture(&tagged(n));
            assert!(buf.len() <= REPLAY_CAPACITY);
        }
        assert_eq!(buf.len(), REPLAY_CAPACITY);
        buf.cursor = 0;
        assert_eq!(tag(buf.next_replay_frame().unwrap()), 18);
    }

    #[test]
    fn capture_copies_rather_than_aliases() {
        let mut buf = FrameReplayBuffer::default();
        let mut frame = tagged(1);
        buf.capture(&frame);
        frame.pixels[0] = 99;
        assert_eq!(tag(buf.next_replay_frame().unwrap()), 1);
    }

    #[test]
    fn replay_starts_eight_back_then_loops_last_six() {
        let mut buf = FrameReplayBuffer::default();
        for n in 0..12 {
            buf.capture(&tagged(n));
        }
        buf.start_replay();
        let seen: Vec<u32> = (0..12).map(|_| tag(buf.next_replay_frame().unwrap())).collect();
        assert_eq!(seen, vec![4, 5, 6, 7, 8, 9, 10, 11, 6, 7, 8, 9]);
    }

    #[test]
    fn short_buffer_replays_from_the_start() {
        let mut buf = FrameReplayBuffer::default();
        for n in 0..3 {
            buf.capture(&tagged(n));
        }
        buf.start_replay();
        let seen: Vec<u32> = (0..5).map(|_| tag(buf.next_replay_frame().unwrap())).collect();
        assert_eq!(seen, vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn cursor_stays_inside_a_full_buffer_forever() {
        let mut buf = FrameReplayBuffer::default();
        for n in 0..REPLAY_CAPACITY as u32 {
            buf.capture(&tagged(n));
        }
        buf.start_replay();
        for _ in 0..10_000 {
            assert!(buf.next_replay_frame().is_some());
            assert!(buf.cursor() < buf.len());
        }
    }

    #[test]
    fn empty_buffer_yields_nothing() {
        let mut buf = FrameReplayBuffer::default();
        buf.start_replay();
        assert!(buf.next_replay_frame().is_none());
    }

    #[test]
    fn clear_forgets_history() {
        let mut buf = FrameReplayBuffer::default();
        buf.capture(&tagged(1));
        buf.clear();
        assert!(buf.is_empty());
        assert!(buf.next_replay_frame().is_none());
    }
}
