use log::{debug, info};
use serde_derive::{Deserialize, Serialize};

use crate::error::Error;
use crate::frame::{Frame, Roi};
use crate::physics::{JumpData, JumpDetector, JumpMode};
use crate::sample::TrackingSample;
use crate::tracker::Tracker;
use crate::vbt::{RepData, RepDetector, VbtConfig};

/// The only asynchronous boundary: waiting for the next camera frame.
/// Acquisition failures are fatal for the session and are not retried here;
/// the caller decides whether the user may try again.
pub trait FrameSource {
    /// Blocks for the next frame; Ok(None) when the stream ends.
    fn next_frame(&mut self) -> Result<Option<Frame>, Error>;
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum SessionMode {
    Jump(JumpMode),
    Vbt,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub enum SessionEvent {
    Jump(JumpData),
    Rep(RepData),
}

/// Finalized session aggregate handed to the reporting collaborator,
/// events in completion order. The core does not persist it.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionReport {
    pub mode: SessionMode,
    pub athlete_name: String,
    pub date: String,
    pub events: Vec<SessionEvent>,
}

/// Display-friendly copy of accumulated state, produced on the slow UI
/// timer. Reading it never mutates physics state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Snapshot {
    pub last_height_cm: f32,
    pub last_flight_ms: f32,
    pub last_contact_ms: f32,
    pub current_velocity_mps: f32,
    pub event_count: usize,
    pub confidence: f32,
    pub fps: f32,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub athlete_name: String,
    pub date: String,
}

impl SessionConfig {
    pub fn new(athlete_name: &str, date: &str) -> Self {
        Self {
            athlete_name: athlete_name.into(),
            date: date.into(),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum SessionStatus {
    Running,
    Finished,
}

enum Detector {
    Jump(JumpDetector),
    Vbt(RepDetector),
}

/// Frame-driven tracking session. One synchronous pass per frame: track,
/// update physics, maybe emit an event. Single-threaded by construction;
/// stopping is a cooperative flag checked before each pass, and the
/// auto-stop/silence timers are timestamp deadlines, so a late timer can
/// never fire after manual stop tore the session down.
pub struct Session {
    mode: SessionMode,
    config: SessionConfig,
    tracker: Tracker,
    roi: Roi,
    detector: Detector,
    events: Vec<SessionEvent>,
    stop_requested: bool,
    handed_off: bool,
    started: bool,
    auto_stop_deadline: Option<f64>,
    last_sample: Option<TrackingSample>,
    last_jump: Option<JumpData>,
    frames_since_snapshot: u32,
    last_snapshot_t: Option<f64>,
}

impl Session {
    pub fn jump(mode: JumpMode, tracker: Tracker, roi: Roi, config: SessionConfig) -> Self {
        Self::with_detector(
            SessionMode::Jump(mode),
            Detector::Jump(JumpDetector::new(mode)),
            tracker,
            roi,
            config,
        )
    }

    pub fn vbt(vbt: VbtConfig, tracker: Tracker, roi: Roi, config: SessionConfig) -> Self {
        Self::with_detector(
            SessionMode::Vbt,
            Detector::Vbt(RepDetector::new(vbt)),
            tracker,
            roi,
            config,
        )
    }

    fn with_detector(
        mode: SessionMode,
        detector: Detector,
        tracker: Tracker,
        roi: Roi,
        config: SessionConfig,
    ) -> Self {
        Self {
            mode,
            config,
            tracker,
            roi,
            detector,
            events: Vec::new(),
            stop_requested: false,
            handed_off: false,
            started: false,
            auto_stop_deadline: None,
            last_sample: None,
            last_jump: None,
            frames_since_snapshot: 0,
            last_snapshot_t: None,
        }
    }

    #[inline]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    #[inline]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Cooperative stop; takes effect before the next frame pass.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// One full pass for one frame. Must run to completion before the next
    /// frame is processed.
    pub fn process_frame(&mut self, frame: &Frame) -> SessionStatus {
        if self.stop_requested {
            return SessionStatus::Finished;
        }

        let t = frame.timestamp;

        if !self.started {
            self.started = true;
            self.last_snapshot_t = Some(t);
            if let Detector::Vbt(ref mut d) = self.detector {
                d.reset(t);
            }
            info!("session started ({:?})", self.mode);
        }

        if self.deadline_expired(t) {
            info!("auto-stop after {} event(s)", self.events.len());
            self.stop_requested = true;
            return SessionStatus::Finished;
        }

        self.frames_since_snapshot += 1;

        let sample = self.tracker.track(frame, self.roi);
        self.last_sample = sample;

        // A miss or low-confidence sample is not an error: hold state and
        // wait for the next frame.
        let sample = match sample {
            Some(s) if s.is_reliable() => s,
            _ => return SessionStatus::Running,
        };

        match self.detector {
            Detector::Jump(ref mut d) => {
                if let Some(jump) = d.update(sample.y, t) {
                    debug!("jump accepted: {:.1} cm", jump.height_cm);
                    self.auto_stop_deadline = Some(t + d.config().auto_stop_ms / 1000.0);
                    self.last_jump = Some(jump);
                    self.events.push(SessionEvent::Jump(jump));
                }
            }
            Detector::Vbt(ref mut d) => {
                if let Some(rep) = d.update(sample.y, t) {
                    self.events.push(SessionEvent::Rep(rep));
                }

                if !self.events.is_empty() && t - d.last_movement() > d.config().silence_s {
                    info!("set ended after {:.1} s of silence", d.config().silence_s);
                    self.stop_requested = true;
                    return SessionStatus::Finished;
                }
            }
        }

        SessionStatus::Running
    }

    fn deadline_expired(&self, t: f64) -> bool {
        matches!(self.auto_stop_deadline, Some(deadline) if t > deadline)
    }

    /// Drives the session to completion over a frame source. Acquisition
    /// errors propagate immediately; the report (if any) is handed off
    /// exactly once.
    pub fn run<S: FrameSource>(&mut self, source: &mut S) -> Result<Option<SessionReport>, Error> {
        loop {
            if self.stop_requested {
                break;
            }

            match source.next_frame()? {
                Some(frame) => {
                    if self.process_frame(&frame) == SessionStatus::Finished {
                        break;
                    }
                }
                None => break,
            }
        }

        Ok(self.finish())
    }

    /// Stops the session and hands off the finalized event list, exactly
    /// once. A session with zero events hands off nothing.
    pub fn finish(&mut self) -> Option<SessionReport> {
        self.stop_requested = true;

        if self.handed_off || self.events.is_empty() {
            return None;
        }
        self.handed_off = true;

        Some(SessionReport {
            mode: self.mode,
            athlete_name: self.config.athlete_name.clone(),
            date: self.config.date.clone(),
            events: std::mem::take(&mut self.events),
        })
    }

    /// Builds the UI snapshot and restarts fps accounting. Call on the
    /// slow UI timer, not per frame.
    pub fn snapshot(&mut self, now: f64) -> Snapshot {
        let elapsed = self
            .last_snapshot_t
            .map(|t| (now - t).max(0.0))
            .unwrap_or(0.0);
        let fps = if elapsed > 0.0 {
            self.frames_since_snapshot as f32 / elapsed as f32
        } else {
            0.0
        };
        self.frames_since_snapshot = 0;
        self.last_snapshot_t = Some(now);

        let velocity = match self.detector {
            Detector::Vbt(ref d) => d.current_velocity(),
            Detector::Jump(_) => 0.0,
        };

        Snapshot {
            last_height_cm: self.last_jump.map(|j| j.height_cm).unwrap_or(0.0),
            last_flight_ms: self.last_jump.map(|j| j.flight_time_ms).unwrap_or(0.0),
            last_contact_ms: self.last_jump.map(|j| j.contact_time_ms).unwrap_or(0.0),
            current_velocity_mps: velocity,
            event_count: self.events.len(),
            confidence: self.last_sample.map(|s| s.confidence).unwrap_or(0.0),
            fps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color;
    use crate::tracker::Strategy;
    use std::collections::VecDeque;

    const W: u32 = 100;
    const H: u32 = 100;
    const DT: f64 = 1.0 / 60.0;

    struct ScriptedSource {
        frames: VecDeque<Frame>,
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
            Ok(self.frames.pop_front())
        }
    }

    struct FailingSource;

    impl FrameSource for FailingSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
            Err(Error::Camera("permission denied".into()))
        }
    }

    /// Frame with a 30x30 green marker whose center sits at normalized y.
    fn marker_frame(y_norm: f32, t: f64) -> Frame {
        let top = (y_norm * H as f32) as i32 - 15;
        let mut data = Vec::with_capacity((W * H * 4) as usize);

        for y in 0..H as i32 {
            for x in 0..W as i32 {
                let inside = x >= 35 && x < 65 && y >= top && y < top + 30;
                if inside {
                    data.extend_from_slice(&[0, 230, 20, 255]);
                } else {
                    data.extend_from_slice(&[10, 10, 10, 255]);
                }
            }
        }

        Frame::new(W, H, data, t).unwrap()
    }

    fn green_session(mode: JumpMode) -> Session {
        Session::jump(
            mode,
            Tracker::new(Strategy::color(color::GREEN)),
            Roi::full(W, H),
            SessionConfig::new("Athlete", "2026-02-01"),
        )
    }

    fn push_hold(frames: &mut VecDeque<Frame>, t: &mut f64, y: f32, seconds: f64) {
        let end = *t + seconds;
        while *t < end {
            frames.push_back(marker_frame(y, *t));
            *t += DT;
        }
    }

    #[test]
    fn jump_session_emits_one_event_for_one_jump() {
        let mut frames = VecDeque::new();
        let mut t = 0.0;

        push_hold(&mut frames, &mut t, 0.6, 1.0); // baseline + ground
        push_hold(&mut frames, &mut t, 0.3, 0.4); // 400 ms of flight
        push_hold(&mut frames, &mut t, 0.6, 0.5); // landed

        let mut session = green_session(JumpMode::Cmj);
        let report = session
            .run(&mut ScriptedSource { frames })
            .unwrap()
            .expect("report expected");

        assert_eq!(report.events.len(), 1);
        match report.events[0] {
            SessionEvent::Jump(j) => {
                assert!((j.flight_time_ms - 400.0).abs() < 25.0);
                assert!((j.height_cm - 19.6).abs() < 2.5);
            }
            SessionEvent::Rep(_) => panic!("expected a jump event"),
        }

        // Hand-off happens exactly once.
        assert!(session.finish().is_none());
    }

    #[test]
    fn session_without_events_hands_off_nothing() {
        let mut frames = VecDeque::new();
        let mut t = 0.0;
        push_hold(&mut frames, &mut t, 0.6, 1.0);

        let mut session = green_session(JumpMode::Cmj);
        assert!(session.run(&mut ScriptedSource { frames }).unwrap().is_none());
    }

    #[test]
    fn acquisition_error_is_fatal_and_propagates() {
        let mut session = green_session(JumpMode::Cmj);
        let err = session.run(&mut FailingSource);
        assert!(matches!(err, Err(Error::Camera(_))));
    }

    #[test]
    fn auto_stop_fires_after_quiet_period() {
        let mut frames = VecDeque::new();
        let mut t = 0.0;

        push_hold(&mut frames, &mut t, 0.6, 1.0);
        push_hold(&mut frames, &mut t, 0.3, 0.4);
        // Standing still well past the 5 s CMJ auto-stop window.
        push_hold(&mut frames, &mut t, 0.6, 6.0);
        // These frames must never be processed.
        push_hold(&mut frames, &mut t, 0.3, 0.4);
        push_hold(&mut frames, &mut t, 0.6, 0.5);

        let mut session = green_session(JumpMode::Cmj);
        let report = session
            .run(&mut ScriptedSource { frames })
            .unwrap()
            .expect("report expected");

        assert_eq!(report.events.len(), 1);
    }

    #[test]
    fn manual_stop_wins_over_in_flight_frames() {
        let mut session = green_session(JumpMode::Cmj);

        assert_eq!(
            session.process_frame(&marker_frame(0.6, 0.0)),
            SessionStatus::Running
        );

        session.request_stop();
        assert_eq!(
            session.process_frame(&marker_frame(0.6, DT)),
            SessionStatus::Finished
        );
    }

    #[test]
    fn tracking_loss_holds_state() {
        let mut session = green_session(JumpMode::Cmj);
        let mut t = 0.0;

        for _ in 0..40 {
            session.process_frame(&marker_frame(0.6, t));
            t += DT;
        }

        // Marker gone: empty scene, no detection, still running.
        let empty = Frame::new(W, H, vec![10; (W * H * 4) as usize], t).unwrap();
        assert_eq!(session.process_frame(&empty), SessionStatus::Running);
        assert_eq!(session.event_count(), 0);
    }

    #[test]
    fn vbt_session_ends_on_silence_with_reps_recorded() {
        let mut frames = VecDeque::new();
        let mut t = 0.0;

        // Bar travels down over a second, then racked.
        push_hold(&mut frames, &mut t, 0.25, 0.2);
        let steps = (1.0 / DT) as usize;
        for i in 0..steps {
            frames.push_back(marker_frame(0.25 + 0.4 * i as f32 / steps as f32, t));
            t += DT;
        }
        push_hold(&mut frames, &mut t, 0.65, 5.0);

        let mut session = Session::vbt(
            VbtConfig::default(),
            Tracker::new(Strategy::color(color::GREEN)),
            Roi::full(W, H),
            SessionConfig::new("Athlete", "2026-02-01"),
        );

        let report = session
            .run(&mut ScriptedSource { frames })
            .unwrap()
            .expect("report expected");

        assert_eq!(report.mode, SessionMode::Vbt);
        assert_eq!(report.events.len(), 1);
        match report.events[0] {
            SessionEvent::Rep(rep) => {
                assert!(rep.peak_velocity_mps > 0.0);
                assert!(rep.avg_velocity_mps <= rep.peak_velocity_mps);
            }
            SessionEvent::Jump(_) => panic!("expected a rep event"),
        }
    }

    #[test]
    fn snapshot_reports_counts_and_fps() {
        let mut session = green_session(JumpMode::Cmj);
        let mut t = 0.0;

        for _ in 0..30 {
            session.process_frame(&marker_frame(0.6, t));
            t += DT;
        }

        let snap = session.snapshot(t);
        assert_eq!(snap.event_count, 0);
        assert!(snap.fps > 50.0 && snap.fps < 70.0);
        assert!(snap.confidence > 0.3);

        // Counter restarts after each snapshot.
        let snap = session.snapshot(t + 0.5);
        assert_eq!(snap.fps, 0.0);
    }
}
