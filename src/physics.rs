use log::{debug, info};
use serde_derive::{Deserialize, Serialize};

use crate::kinematics;
use crate::window::SampleWindow;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum JumpMode {
    /// Countermovement jump, height only.
    Cmj,
    /// Reactive jumps, height plus ground-contact time and RSI.
    Rsi,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    Baseline,
    Ground,
    Flight,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct JumpConfig {
    /// Takeoff/landing band around the baseline, in normalized frame height.
    pub threshold: f32,
    pub min_flight_ms: f32,
    pub max_flight_ms: f32,
    pub min_contact_ms: f32,
    pub max_contact_ms: f32,
    /// Valid samples averaged to establish the rest position.
    pub baseline_window: usize,
    /// Session ends this long after the last accepted jump.
    pub auto_stop_ms: f64,
}

impl JumpConfig {
    pub fn for_mode(mode: JumpMode) -> Self {
        match mode {
            JumpMode::Cmj => Self {
                threshold: 0.025,
                min_flight_ms: 100.0,
                max_flight_ms: 1500.0,
                min_contact_ms: 80.0,
                max_contact_ms: 3000.0,
                baseline_window: 30,
                auto_stop_ms: 5000.0,
            },
            // Tighter band and shorter windows for rebound jumps.
            JumpMode::Rsi => Self {
                threshold: 0.015,
                min_flight_ms: 80.0,
                max_flight_ms: 1200.0,
                min_contact_ms: 50.0,
                max_contact_ms: 3000.0,
                baseline_window: 30,
                auto_stop_ms: 3000.0,
            },
        }
    }
}

/// One accepted jump, appended to the session in completion order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct JumpData {
    pub height_cm: f32,
    pub flight_time_ms: f32,
    pub contact_time_ms: f32,
    pub timestamp_ms: u64,
    pub rsi: Option<f32>,
}

/// Per-session jump state machine: BASELINE -> GROUND <-> FLIGHT.
/// Fed one (y, t) per valid tracking sample; emits on accepted landings.
#[derive(Debug)]
pub struct JumpDetector {
    mode: JumpMode,
    config: JumpConfig,
    phase: Phase,
    baseline_y: f32,
    baseline: SampleWindow,
    takeoff_t: f64,
    last_landing_t: Option<f64>,
    pending_contact_ms: Option<f32>,
}

impl JumpDetector {
    pub fn new(mode: JumpMode) -> Self {
        Self::with_config(mode, JumpConfig::for_mode(mode))
    }

    pub fn with_config(mode: JumpMode, config: JumpConfig) -> Self {
        Self {
            mode,
            phase: Phase::Baseline,
            baseline_y: 0.0,
            baseline: SampleWindow::with_capacity(config.baseline_window),
            takeoff_t: 0.0,
            last_landing_t: None,
            pending_contact_ms: None,
            config,
        }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn mode(&self) -> JumpMode {
        self.mode
    }

    #[inline]
    pub fn config(&self) -> &JumpConfig {
        &self.config
    }

    /// Rest position once baseline capture has completed.
    #[inline]
    pub fn baseline_y(&self) -> Option<f32> {
        match self.phase {
            Phase::Baseline => None,
            _ => Some(self.baseline_y),
        }
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Baseline;
        self.baseline_y = 0.0;
        self.baseline.clear();
        self.takeoff_t = 0.0;
        self.last_landing_t = None;
        self.pending_contact_ms = None;
    }

    /// Advances the state machine with one valid sample. Tracking misses
    /// must simply not call this; the phase holds until the next sample.
    pub fn update(&mut self, y: f32, t: f64) -> Option<JumpData> {
        match self.phase {
            Phase::Baseline => {
                self.baseline.push(t, y);

                if self.baseline.is_full() {
                    self.baseline_y = self.baseline.mean_y().unwrap_or(y);
                    self.phase = Phase::Ground;
                    info!("baseline established at y={:.4}", self.baseline_y);
                }

                None
            }
            Phase::Ground => {
                // Marker rising in image space means y decreases.
                if y < self.baseline_y - self.config.threshold {
                    self.phase = Phase::Flight;
                    self.takeoff_t = t;
                    self.pending_contact_ms = self.contact_time_at_takeoff(t);
                }

                None
            }
            Phase::Flight => {
                if y <= self.baseline_y - self.config.threshold {
                    return None;
                }

                self.phase = Phase::Ground;
                self.last_landing_t = Some(t);

                let flight_ms = ((t - self.takeoff_t) * 1000.0) as f32;
                let contact_ms = self.pending_contact_ms.take();

                if flight_ms < self.config.min_flight_ms || flight_ms > self.config.max_flight_ms {
                    // Noise rejection: the landing still happened.
                    debug!("discarded implausible flight of {:.0} ms", flight_ms);
                    return None;
                }

                let rsi = contact_ms
                    .and_then(|c| kinematics::reactive_strength_index(flight_ms, c));

                Some(JumpData {
                    height_cm: kinematics::flight_time_to_height(flight_ms),
                    flight_time_ms: flight_ms,
                    contact_time_ms: contact_ms.unwrap_or(0.0),
                    timestamp_ms: (t * 1000.0) as u64,
                    rsi,
                })
            }
        }
    }

    fn contact_time_at_takeoff(&self, t: f64) -> Option<f32> {
        if self.mode != JumpMode::Rsi {
            return None;
        }

        let landing = self.last_landing_t?;
        let contact_ms = ((t - landing) * 1000.0) as f32;

        if contact_ms < self.config.min_contact_ms || contact_ms > self.config.max_contact_ms {
            debug!("discarded implausible contact of {:.0} ms", contact_ms);
            return None;
        }

        Some(contact_ms)
    }
}
