//! Frame-rate scheduling for the emulation thread.

use std::time::Instant;

use rambo_core::Region;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeedMode {
    #[default]
    Realtime,
    FastForward,
    SlowMotion,
    Paused,
    /// Frame advance is gated by the debugger.
    Stepping,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedConfig {
    pub mode: SpeedMode,
    pub timing: Region,
    /// Playback speed relative to real time; >1 for fast-forward.
    pub multiplier: f64,
    /// Align emulated frames to the wall clock instead of free-running.
    pub hard_sync: bool,
    /// Frames we are allowed to burst through when behind before dropping.
    pub max_catchup_frames: u32,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            mode: SpeedMode::Realtime,
            timing: Region::Ntsc,
            multiplier: 1.0,
            hard_sync: true,
            max_catchup_frames: 3,
        }
    }
}

/// Verdict for the next frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    Proceed,
    /// Nothing to do; idle briefly and re-poll (paused/stepping).
    Wait,
    /// Ahead of the wall clock by this many nanoseconds.
    WaitNs(u64),
}

/// Decides when the runner may emulate the next frame.
#[derive(Debug)]
pub struct SpeedController {
    config: SpeedConfig,
    wall_time_ref: Instant,
    frame_count: u64,
    dropped_frames: u64,
}

impl SpeedController {
    pub fn new(config: SpeedConfig) -> Self {
        Self {
            config,
            wall_time_ref: Instant::now(),
            frame_count: 0,
            dropped_frames: 0,
        }
    }

    pub fn config(&self) -> SpeedConfig {
        self.config
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Applies a new configuration. Mode and region switches restart the
    /// wall-clock reference so drift does not carry across them.
    pub fn set_config(&mut self, config: SpeedConfig) {
        if config.mode != self.config.mode || config.timing != self.config.timing {
            self.reset_reference();
        }
        self.config = config;
    }

    pub fn reset_reference(&mut self) {
        self.wall_time_ref = Instant::now();
        self.frame_count = 0;
    }

    /// Emulated frame duration under the current multiplier.
    pub fn frame_duration_ns(&self) -> u64 {
        let multiplier = self.config.multiplier.max(0.01);
        (self.config.timing.frame_duration_ns() as f64 / multiplier) as u64
    }

    /// Record a completed frame.
    pub fn on_frame(&mut self) {
        self.frame_count += 1;
    }

    pub fn should_tick(&mut self, now: Instant) -> TickDecision {
        match self.config.mode {
            SpeedMode::Paused | SpeedMode::Stepping => return TickDecision::Wait,
            SpeedMode::Realtime | SpeedMode::FastForward | SpeedMode::SlowMotion => {}
        }
        if !self.config.hard_sync {
            return TickDecision::Proceed;
        }

        let frame_ns = self.frame_duration_ns();
        let expected_ns = self.frame_count.saturating_mul(frame_ns);
        let elapsed_ns = now.duration_since(self.wall_time_ref).as_nanos() as u64;

        if elapsed_ns < expected_ns {
            return TickDecision::WaitNs(expected_ns - elapsed_ns);
        }

        let behind_ns = elapsed_ns - expected_ns;
        let budget_ns = self.config.max_catchup_frames as u64 * frame_ns;
        if behind_ns > budget_ns {
            // Too far behind to catch up frame-by-frame: drop the backlog
            // and restart the reference from here.
            let dropped = behind_ns / frame_ns.max(1);
            self.dropped_frames += dropped;
            tracing::warn!(dropped, "frame pacing fell behind; resyncing");
            self.reset_reference();
        }
        TickDecision::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn paused_always_waits() {
        let mut controller = SpeedController::new(SpeedConfig {
            mode: SpeedMode::Paused,
            ..SpeedConfig::default()
        });
        assert_eq!(controller.should_tick(Instant::now()), TickDecision::Wait);
    }

    #[test]
    fn free_running_always_proceeds() {
        let mut controller = SpeedController::new(SpeedConfig {
            hard_sync: false,
            ..SpeedConfig::default()
        });
        for _ in 0..10 {
            assert_eq!(
                controller.should_tick(Instant::now()),
                TickDecision::Proceed
            );
            controller.on_frame();
        }
    }

    #[test]
    fn hard_sync_waits_when_ahead() {
        let mut controller = SpeedController::new(SpeedConfig::default());
        controller.on_frame();
        // Immediately after one frame we are a full frame ahead.
        match controller.should_tick(controller.wall_time_ref) {
            TickDecision::WaitNs(ns) => assert_eq!(ns, controller.frame_duration_ns()),
            other => panic!("expected WaitNs, got {other:?}"),
        }
    }

    #[test]
    fn hard_sync_drops_when_far_behind() {
        let mut controller = SpeedController::new(SpeedConfig::default());
        let frame = Duration::from_nanos(controller.frame_duration_ns());
        let far_future = controller.wall_time_ref + frame * 100;
        assert_eq!(controller.should_tick(far_future), TickDecision::Proceed);
        assert!(controller.dropped_frames() >= 90);
        // Reference was rebased; the very next poll is on time again.
        assert_eq!(controller.should_tick(far_future), TickDecision::Proceed);
    }

    #[test]
    fn multiplier_scales_frame_duration() {
        let controller = SpeedController::new(SpeedConfig {
            mode: SpeedMode::FastForward,
            multiplier: 2.0,
            ..SpeedConfig::default()
        });
        assert_eq!(
            controller.frame_duration_ns(),
            Region::Ntsc.frame_duration_ns() / 2
        );
    }

    #[test]
    fn pal_switch_resets_reference() {
        let mut controller = SpeedController::new(SpeedConfig::default());
        controller.on_frame();
        controller.on_frame();
        controller.set_config(SpeedConfig {
            timing: Region::Pal,
            ..SpeedConfig::default()
        });
        assert_eq!(controller.frame_count, 0);
        assert_eq!(
            controller.frame_duration_ns(),
            Region::Pal.frame_duration_ns()
        );
    }
}
