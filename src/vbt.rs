use log::debug;
use serde_derive::{Deserialize, Serialize};

use crate::window::SampleWindow;

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct VbtConfig {
    /// Rolling window length, in samples.
    pub window: usize,
    /// Samples required in the window before velocity is trusted.
    pub min_samples: usize,
    /// Endpoint displacement (normalized) counting as movement.
    pub movement_threshold: f32,
    /// Stillness that closes out the current rep.
    pub stillness_s: f64,
    /// Silence that ends the whole set.
    pub silence_s: f64,
    /// Uncalibrated display scale; no physical distance calibration is
    /// performed, so this is an approximation the caller can tune.
    pub velocity_scale: f32,
}

impl Default for VbtConfig {
    fn default() -> Self {
        Self {
            window: 10,
            min_samples: 5,
            movement_threshold: 0.003,
            stillness_s: 0.5,
            silence_s: 3.5,
            velocity_scale: 2.5,
        }
    }
}

/// One completed repetition.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct RepData {
    pub peak_velocity_mps: f32,
    pub avg_velocity_mps: f32,
    pub duration_s: f64,
    pub timestamp_ms: u64,
}

/// Rep-boundary detector for velocity-based training: movement above the
/// threshold opens a rep, sustained stillness closes it.
#[derive(Debug)]
pub struct RepDetector {
    config: VbtConfig,
    window: SampleWindow,
    in_rep: bool,
    rep_start_t: f64,
    rep_velocity_sum: f32,
    rep_velocity_count: usize,
    rep_peak: f32,
    last_movement_t: f64,
    live_velocity: f32,
}

impl RepDetector {
    pub fn new(config: VbtConfig) -> Self {
        Self {
            window: SampleWindow::with_capacity(config.window),
            config,
            in_rep: false,
            rep_start_t: 0.0,
            rep_velocity_sum: 0.0,
            rep_velocity_count: 0,
            rep_peak: 0.0,
            last_movement_t: 0.0,
            live_velocity: 0.0,
        }
    }

    #[inline]
    pub fn config(&self) -> &VbtConfig {
        &self.config
    }

    /// Latest velocity reading for the live display.
    #[inline]
    pub fn current_velocity(&self) -> f32 {
        self.live_velocity
    }

    /// Timestamp of the last movement, for the session silence timeout.
    #[inline]
    pub fn last_movement(&self) -> f64 {
        self.last_movement_t
    }

    pub fn reset(&mut self, t: f64) {
        self.window.clear();
        self.in_rep = false;
        self.rep_velocity_sum = 0.0;
        self.rep_velocity_count = 0;
        self.rep_peak = 0.0;
        self.last_movement_t = t;
        self.live_velocity = 0.0;
    }

    pub fn update(&mut self, y: f32, t: f64) -> Option<RepData> {
        self.window.push(t, y);

        if self.window.len() <= self.config.min_samples {
            return None;
        }

        let dy = self.window.displacement()?;
        let vel = self.window.velocity()? * self.config.velocity_scale;

        if dy > self.config.movement_threshold {
            if !self.in_rep {
                self.in_rep = true;
                self.rep_start_t = t;
                self.rep_velocity_sum = 0.0;
                self.rep_velocity_count = 0;
                self.rep_peak = 0.0;
            }

            self.rep_velocity_sum += vel;
            self.rep_velocity_count += 1;
            if vel > self.rep_peak {
                self.rep_peak = vel;
            }

            self.last_movement_t = t;
            self.live_velocity = vel;

            None
        } else if self.in_rep && t - self.last_movement_t > self.config.stillness_s {
            self.finish_rep(t)
        } else {
            None
        }
    }

    fn finish_rep(&mut self, t: f64) -> Option<RepData> {
        if self.rep_velocity_count == 0 {
            self.in_rep = false;
            return None;
        }

        let rep = RepData {
            peak_velocity_mps: self.rep_peak,
            avg_velocity_mps: self.rep_velocity_sum / self.rep_velocity_count as f32,
            duration_s: t - self.rep_start_t,
            timestamp_ms: (t * 1000.0) as u64,
        };

        debug!(
            "rep closed: peak {:.2} m/s, avg {:.2} m/s over {:.2} s",
            rep.peak_velocity_mps, rep.avg_velocity_mps, rep.duration_s
        );

        self.in_rep = false;
        self.rep_velocity_sum = 0.0;
        self.rep_velocity_count = 0;
        self.rep_peak = 0.0;

        Some(rep)
    }
}
