//! Frame clock
//!
//! Turns the platform's per-frame timestamps (milliseconds, monotonic) into
//! `{elapsed, delta}` seconds.

use crate::consts::MAX_FRAME_DELTA;

/// Time handed to the simulation each frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTime {
    /// Seconds accumulated while the loop was running
    pub elapsed: f32,
    /// Seconds since the previous frame
    pub delta: f32,
}

#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last_ms: Option<f64>,
    elapsed: f64,
    running: bool,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) measuring; the next tick reports a zero delta
    pub fn start(&mut self) {
        self.running = true;
        self.last_ms = None;
    }

    /// Stop measuring; time spent stopped is never reported as delta
    pub fn stop(&mut self) {
        self.running = false;
        self.last_ms = None;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advance to the frame timestamp `now_ms`
    pub fn tick(&mut self, now_ms: f64) -> FrameTime {
        if !self.running {
            self.start();
        }
        let delta = match self.last_ms {
            Some(last) => (((now_ms - last) / 1000.0) as f32).clamp(0.0, MAX_FRAME_DELTA),
            None => 0.0,
        };
        self.last_ms = Some(now_ms);
        self.elapsed += delta as f64;

        FrameTime {
            elapsed: self.elapsed as f32,
            delta,
        }
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed as f32
    }
}
