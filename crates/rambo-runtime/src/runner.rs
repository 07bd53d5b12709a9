//! The emulation thread.
//!
//! Owns the [`Nes`] exclusively, drains its mailboxes between frames,
//! consults the speed controller for pacing, and publishes finished frames
//! through the frame mailbox. All buffers are allocated up front; the
//! per-frame path performs no heap allocation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rambo_core::{Nes, ResetKind, SCREEN_PIXELS};

use crate::command::{DebugEvent, EmulationCommand, EmulationStatus};
use crate::debug::Debugger;
use crate::mailbox::Mailboxes;
use crate::speed::{SpeedConfig, SpeedController, TickDecision};

/// Sleep granularity while far from the frame deadline.
const MAX_SLEEP_CHUNK: Duration = Duration::from_millis(4);
/// Inside this window we spin for tighter pacing.
const SPIN_THRESHOLD: Duration = Duration::from_micros(300);
/// Idle poll interval while paused.
const PAUSED_POLL: Duration = Duration::from_millis(2);
/// Status publish cadence, in frames.
const STATUS_INTERVAL: u64 = 60;

/// Handle to the spawned emulation thread.
pub struct Runner {
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl Runner {
    /// Spawns the emulation thread. The thread exits when the shared
    /// `running` flag drops or a `Shutdown` command arrives.
    pub fn spawn(nes: Nes, mailboxes: Arc<Mailboxes>, speed: SpeedConfig) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let thread_flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("rambo-emulation".into())
            .spawn(move || {
                let mut worker = Worker::new(nes, mailboxes, speed, thread_flag);
                worker.run();
            })
            .expect("spawn emulation thread");
        Self {
            handle: Some(handle),
            running,
        }
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Requests shutdown and joins the thread.
    pub fn shutdown(mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

struct Worker {
    nes: Nes,
    mailboxes: Arc<Mailboxes>,
    speed: SpeedController,
    debugger: Debugger,
    running: Arc<AtomicBool>,
    write_buffer: Vec<u32>,
    frame_count: u64,
    fps_window_start: Instant,
    fps_window_frames: u64,
    fps: f64,
    error: Option<String>,
}

impl Worker {
    fn new(
        nes: Nes,
        mailboxes: Arc<Mailboxes>,
        speed: SpeedConfig,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            nes,
            mailboxes,
            speed: SpeedController::new(speed),
            debugger: Debugger::default(),
            running,
            write_buffer: vec![0; SCREEN_PIXELS],
            frame_count: 0,
            fps_window_start: Instant::now(),
            fps_window_frames: 0,
            fps: 0.0,
            error: None,
        }
    }

    fn run(&mut self) {
        tracing::debug!("emulation thread up");
        while self.running.load(Ordering::Acquire) {
            self.drain_mailboxes();

            if self.debugger.paused() {
                if self.debugger.take_step() {
                    self.nes.step_instruction();
                    self.report_debug_stops();
                } else {
                    thread::sleep(PAUSED_POLL);
                }
                continue;
            }

            match self.speed.should_tick(Instant::now()) {
                TickDecision::Wait => thread::sleep(PAUSED_POLL),
                TickDecision::WaitNs(ns) => self.wait_for(Duration::from_nanos(ns)),
                TickDecision::Proceed => self.emulate_one_frame(),
            }
        }
        tracing::debug!("emulation thread down");
    }

    fn drain_mailboxes(&mut self) {
        while let Some(command) = self.mailboxes.commands.pop() {
            self.handle_command(command);
        }
        while let Some(command) = self.mailboxes.debug_commands.pop() {
            self.debugger
                .handle_command(command, &mut self.nes, &self.mailboxes.debug_events);
        }
        if let Some(config) = self.mailboxes.speed.take() {
            self.speed.set_config(config);
        }
        if let Some(input) = self.mailboxes.controller_input.take() {
            self.nes.set_controller_buttons(0, input.pads[0]);
            self.nes.set_controller_buttons(1, input.pads[1]);
        }
    }

    fn handle_command(&mut self, command: EmulationCommand) {
        match command {
            EmulationCommand::PowerOn => {
                self.nes.reset(ResetKind::Power);
                self.speed.reset_reference();
            }
            EmulationCommand::Reset => self.nes.reset(ResetKind::Warm),
            EmulationCommand::Pause => self.debugger.pause(&self.mailboxes.debug_events),
            EmulationCommand::Resume => {
                self.debugger.handle_command(
                    crate::command::DebugCommand::Resume,
                    &mut self.nes,
                    &self.mailboxes.debug_events,
                );
                self.speed.reset_reference();
            }
            EmulationCommand::SaveState => match self.nes.save_state() {
                Ok(blob) => self.mailboxes.snapshots.set(blob),
                Err(err) => self.post_error(format!("snapshot save failed: {err}")),
            },
            EmulationCommand::LoadState(blob) => {
                // A failed load keeps the current state running.
                if let Err(err) = self.nes.load_state(&blob) {
                    self.post_error(format!("snapshot load failed: {err}"));
                }
            }
            EmulationCommand::Shutdown => self.running.store(false, Ordering::Release),
        }
    }

    fn emulate_one_frame(&mut self) {
        if self.debugger.intrusive() {
            // Instruction-granular frame so breakpoints can land mid-frame.
            loop {
                self.nes.step_instruction();
                if self.report_debug_stops() {
                    return;
                }
                if self.nes.take_frame_complete() {
                    break;
                }
            }
        } else {
            self.nes.emulate_frame();
            if let Some(hit) = self.nes.take_watch_hit() {
                let _ = self
                    .mailboxes
                    .debug_events
                    .push(DebugEvent::WatchpointHit(hit));
                self.debugger.pause(&self.mailboxes.debug_events);
            }
        }
        self.publish_frame();
    }

    /// Emits breakpoint/watchpoint events; true when execution paused.
    fn report_debug_stops(&mut self) -> bool {
        let mut stopped = false;
        if let Some(hit) = self.nes.take_watch_hit() {
            let _ = self
                .mailboxes
                .debug_events
                .push(DebugEvent::WatchpointHit(hit));
            self.debugger.pause(&self.mailboxes.debug_events);
            stopped = true;
        }
        let pc = self.nes.cpu().pc;
        if self.debugger.should_break(pc) {
            let _ = self
                .mailboxes
                .debug_events
                .push(DebugEvent::BreakpointHit { pc });
            self.debugger.pause(&self.mailboxes.debug_events);
            stopped = true;
        }
        stopped
    }

    fn publish_frame(&mut self) {
        self.nes.framebuffer().copy_into(&mut self.write_buffer);
        self.mailboxes.frames.post(&mut self.write_buffer);
        self.speed.on_frame();
        self.frame_count += 1;
        self.fps_window_frames += 1;

        if self.frame_count % STATUS_INTERVAL == 0 {
            let elapsed = self.fps_window_start.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                self.fps = self.fps_window_frames as f64 / elapsed;
            }
            self.fps_window_start = Instant::now();
            self.fps_window_frames = 0;
            self.publish_status();
        }
    }

    fn publish_status(&mut self) {
        self.mailboxes.emulation_status.set(EmulationStatus {
            frame_count: self.frame_count,
            fps: self.fps,
            dropped_frames: self.speed.dropped_frames(),
            paused: self.debugger.paused(),
            error: self.error.take(),
        });
    }

    fn post_error(&mut self, message: String) {
        tracing::warn!(%message, "runtime error");
        self.error = Some(message);
        self.publish_status();
    }

    /// Hybrid wait: coarse sleeps until close to the deadline, then a short
    /// spin for tight pacing.
    fn wait_for(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        loop {
            if !self.running.load(Ordering::Acquire) {
                return;
            }
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return;
            };
            if remaining > SPIN_THRESHOLD {
                thread::sleep(remaining.min(MAX_SLEEP_CHUNK).saturating_sub(SPIN_THRESHOLD));
            } else {
                std::hint::spin_loop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ControllerInput;
    use crate::speed::SpeedMode;
    use rambo_core::{Cartridge, MachineConfig};

    fn test_nes() -> Nes {
        // Minimal NROM image: spin loop at $8000.
        let mut image = vec![0u8; 16];
        image[0..4].copy_from_slice(&[0x4E, 0x45, 0x53, 0x1A]);
        image[4] = 1;
        image[5] = 1;
        let mut prg = vec![0u8; 16 * 1024];
        prg[0..3].copy_from_slice(&[0x4C, 0x00, 0x80]);
        prg[0x3FFC] = 0x00;
        prg[0x3FFD] = 0x80;
        image.extend_from_slice(&prg);
        image.extend(std::iter::repeat_n(0u8, 8 * 1024));
        let cartridge = Cartridge::from_ines(&image).expect("test image");
        Nes::new(cartridge, MachineConfig::default())
    }

    #[test]
    fn produces_frames_and_shuts_down() {
        let mailboxes = Arc::new(Mailboxes::default());
        let speed = SpeedConfig {
            mode: SpeedMode::FastForward,
            hard_sync: false,
            ..SpeedConfig::default()
        };
        let runner = Runner::spawn(test_nes(), Arc::clone(&mailboxes), speed);

        let mut frame = vec![0u32; SCREEN_PIXELS];
        let deadline = Instant::now() + Duration::from_secs(10);
        while !mailboxes.frames.drain(&mut frame) {
            assert!(Instant::now() < deadline, "no frame arrived");
            thread::sleep(Duration::from_millis(1));
        }

        mailboxes
            .controller_input
            .set(ControllerInput { pads: [0x08, 0] });
        runner.shutdown();
    }

    #[test]
    fn save_state_lands_in_snapshot_mailbox() {
        let mailboxes = Arc::new(Mailboxes::default());
        let speed = SpeedConfig {
            mode: SpeedMode::FastForward,
            hard_sync: false,
            ..SpeedConfig::default()
        };
        let runner = Runner::spawn(test_nes(), Arc::clone(&mailboxes), speed);
        mailboxes
            .commands
            .push(EmulationCommand::SaveState)
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        let blob = loop {
            if let Some(blob) = mailboxes.snapshots.take() {
                break blob;
            }
            assert!(Instant::now() < deadline, "no snapshot arrived");
            thread::sleep(Duration::from_millis(1));
        };
        assert!(!blob.is_empty());
        runner.shutdown();
    }
}
