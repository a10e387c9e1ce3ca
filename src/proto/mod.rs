//! Wire grammar shared by both ends of the link: one ASCII line per
//! frame, `/` prefix, single-character opcode, CRLF terminator.

pub mod error;
pub mod frame;

/// Opcode the device answers with when it rejects or refuses a command.
pub const ERROR_OPCODE: char = 'E';
/// Opcode reserved for the busy-state query.
pub const STATUS_OPCODE: char = 'S';
