//! Message types flowing through the mailboxes.

use rambo_core::bus::{WatchHit, Watchpoint};

/// Main-thread control of the emulation thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmulationCommand {
    PowerOn,
    Reset,
    Pause,
    Resume,
    /// Snapshot the machine into the snapshot mailbox.
    SaveState,
    /// Restore a previously saved snapshot blob.
    LoadState(Vec<u8>),
    Shutdown,
}

/// Latest controller state for both ports, one button mask each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerInput {
    pub pads: [u8; 2],
}

/// Debugger requests (main -> emulation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugCommand {
    AddBreakpoint(u16),
    RemoveBreakpoint(u16),
    AddWatchpoint(Watchpoint),
    RemoveWatchpoint(u16),
    Pause,
    Resume,
    /// Execute one CPU instruction while paused.
    Step,
    /// Request a register/timing snapshot.
    Inspect,
    /// Drop all breakpoints and watchpoints.
    Clear,
}

/// Register/timing view returned by [`DebugCommand::Inspect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InspectView {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub p: u8,
    pub cpu_cycles: u64,
    pub scanline: i16,
    pub dot: u16,
}

/// Debugger responses and notifications (emulation -> main).
#[derive(Debug, Clone, PartialEq)]
pub enum DebugEvent {
    BreakpointHit { pc: u16 },
    WatchpointHit(WatchHit),
    InspectResponse(InspectView),
    Paused,
    Resumed,
    Error(String),
}

/// Periodic status published for the UI.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmulationStatus {
    pub frame_count: u64,
    pub fps: f64,
    pub dropped_frames: u64,
    pub paused: bool,
    pub error: Option<String>,
}

/// Status published by the render thread (latest-wins).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderStatus {
    pub presented_frames: u64,
    pub fps: f64,
}

/// Window events forwarded from the presentation backend to the
/// coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    Resized { width: u32, height: u32 },
    FocusChanged(bool),
    CloseRequested,
}

/// Raw input events from the presentation backend; the coordinator maps
/// them onto [`ControllerInput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key { code: u32, pressed: bool },
    GamepadButton { pad: u8, button: u8, pressed: bool },
}
