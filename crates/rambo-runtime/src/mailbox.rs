//! Cross-thread mailboxes.
//!
//! Three shapes cover every channel in the system: the double-buffered
//! [`FrameMailbox`], latest-wins [`Latest`] slots, and bounded [`Ring`]
//! queues for command/event streams. A [`Mailboxes`] aggregate owns one of
//! each and is shared by `Arc` across the threads.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;
use thiserror::Error;

use rambo_core::SCREEN_PIXELS;

use crate::command::{
    ControllerInput, DebugCommand, DebugEvent, EmulationCommand, EmulationStatus, InputEvent,
    RenderStatus, WindowEvent,
};
use crate::speed::SpeedConfig;

use rambo_core::MachineConfig;

/// Capacity of the command/event rings.
const RING_CAPACITY: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MailboxError {
    /// The ring is full; the producer decides whether to retry or drop.
    #[error("mailbox ring is full")]
    BufferFull,
}

/// Double-buffered frame hand-off between the emulation and render threads.
///
/// The producer owns a write buffer at all times: [`post`](Self::post)
/// swaps it with the front buffer under a short lock and raises the
/// new-frame flag. The consumer polls the flag lock-free and only takes the
/// lock to copy the front buffer out.
pub struct FrameMailbox {
    front: Mutex<Vec<u32>>,
    new_frame: AtomicBool,
}

impl Default for FrameMailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameMailbox {
    pub fn new() -> Self {
        Self {
            front: Mutex::new(vec![0; SCREEN_PIXELS]),
            new_frame: AtomicBool::new(false),
        }
    }

    /// Publishes `write_buffer` (swapping the old front buffer back into
    /// it) and flags the new frame.
    pub fn post(&self, write_buffer: &mut Vec<u32>) {
        debug_assert_eq!(write_buffer.len(), SCREEN_PIXELS);
        {
            let mut front = self.front.lock();
            std::mem::swap(&mut *front, write_buffer);
        }
        self.new_frame.store(true, Ordering::Release);
    }

    /// Lock-free check for an undrained frame.
    pub fn has_new_frame(&self) -> bool {
        self.new_frame.load(Ordering::Acquire)
    }

    /// Copies the front buffer into `dst` and clears the flag. Returns
    /// `false` without touching `dst` when no new frame is pending.
    pub fn drain(&self, dst: &mut [u32]) -> bool {
        if !self.has_new_frame() {
            return false;
        }
        let front = self.front.lock();
        dst.copy_from_slice(&front);
        self.new_frame.store(false, Ordering::Release);
        true
    }
}

/// Latest-wins slot: writers replace, the reader takes.
pub struct Latest<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Default for Latest<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T> Latest<T> {
    pub fn set(&self, value: T) {
        *self.slot.lock() = Some(value);
    }

    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }
}

impl<T: Clone> Latest<T> {
    pub fn get(&self) -> Option<T> {
        self.slot.lock().clone()
    }
}

/// Bounded command/event ring. Producers get [`MailboxError::BufferFull`]
/// instead of blocking; consumers poll.
pub struct Ring<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Default for Ring<T> {
    fn default() -> Self {
        Self::with_capacity(RING_CAPACITY)
    }
}

impl<T> Ring<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    pub fn push(&self, value: T) -> Result<(), MailboxError> {
        self.tx.try_send(value).map_err(|err| match err {
            TrySendError::Full(_) | TrySendError::Disconnected(_) => MailboxError::BufferFull,
        })
    }

    pub fn pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

/// Every channel the threads share, owned in one place.
#[derive(Default)]
pub struct Mailboxes {
    pub frames: FrameMailbox,
    pub controller_input: Latest<ControllerInput>,
    pub commands: Ring<EmulationCommand>,
    pub speed: Latest<SpeedConfig>,
    pub debug_commands: Ring<DebugCommand>,
    pub debug_events: Ring<DebugEvent>,
    pub emulation_status: Latest<EmulationStatus>,
    pub render_status: Latest<RenderStatus>,
    /// Pending machine configuration; applied by the coordinator on the
    /// next power cycle (region/variant are fixed per machine instance).
    pub config: Latest<MachineConfig>,
    /// Window/input traffic from the presentation backend to the
    /// coordinator.
    pub window_events: Ring<WindowEvent>,
    pub input_events: Ring<InputEvent>,
    /// Most recent snapshot produced by a `SaveState` command.
    pub snapshots: Latest<Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_mailbox_flag_lifecycle() {
        let mailbox = FrameMailbox::new();
        let mut write_buffer = vec![0xAAu32; SCREEN_PIXELS];
        assert!(!mailbox.has_new_frame());

        mailbox.post(&mut write_buffer);
        assert!(mailbox.has_new_frame());

        let mut out = vec![0u32; SCREEN_PIXELS];
        assert!(mailbox.drain(&mut out));
        assert_eq!(out[0], 0xAA);
        // Drained exactly once.
        assert!(!mailbox.has_new_frame());
        assert!(!mailbox.drain(&mut out));
    }

    #[test]
    fn frame_mailbox_swaps_buffers() {
        let mailbox = FrameMailbox::new();
        let mut write_buffer = vec![7u32; SCREEN_PIXELS];
        mailbox.post(&mut write_buffer);
        // The producer now owns the previous front buffer (zeroed).
        assert_eq!(write_buffer[0], 0);
    }

    #[test]
    fn ring_reports_full() {
        let ring = Ring::with_capacity(2);
        ring.push(1u8).unwrap();
        ring.push(2u8).unwrap();
        assert_eq!(ring.push(3u8), Err(MailboxError::BufferFull));
        assert_eq!(ring.pop(), Some(1));
        ring.push(3u8).unwrap();
    }

    #[test]
    fn latest_wins() {
        let latest = Latest::default();
        latest.set(1u32);
        latest.set(2u32);
        assert_eq!(latest.take(), Some(2));
        assert_eq!(latest.take(), None);
    }
}
