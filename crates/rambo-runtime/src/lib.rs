//! Scheduling and thread plumbing around `rambo-core`: mailboxes, the
//! speed controller, debugger bookkeeping, and the emulation-thread runner.

pub mod command;
pub mod debug;
pub mod mailbox;
pub mod runner;
pub mod speed;

pub use command::{
    ControllerInput, DebugCommand, DebugEvent, EmulationCommand, EmulationStatus, InputEvent,
    InspectView, RenderStatus, WindowEvent,
};
pub use mailbox::{FrameMailbox, Latest, MailboxError, Mailboxes, Ring};
pub use runner::Runner;
pub use speed::{SpeedConfig, SpeedController, SpeedMode, TickDecision};
