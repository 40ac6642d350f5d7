//! Handsignal Shared Types
//!
//! This crate provides the pure core of the bridge: hand landmark types,
//! the gesture classifier, the command line codec and the serial session
//! state machine. Nothing here performs I/O.

pub mod codec;
pub mod gesture;
pub mod landmarks;
pub mod state_machine;

pub use codec::{CodecError, CommandMessage, LineDecoder, LineEnding};
pub use gesture::{classify, ClassifyError, Digit, GestureVector};
pub use landmarks::{Hand, KeypointSnapshot, Landmark};
pub use state_machine::{
    Effect, OpenTicket, Phase, PortHandle, SessionError, SessionEvent, SessionStateMachine,
};

/// Serial link parameters
pub mod link {
    /// Default baud rate for the device link
    pub const DEFAULT_BAUD_RATE: u32 = 9600;

    /// Longest line accepted from the device before it is discarded
    pub const MAX_LINE_LEN: usize = 1024;
}
