//! Assuan protocol speaker
//!
//! The line-based request/response protocol pinentry programs talk over
//! stdin/stdout. `protocol` handles framing and escapes; `connection`
//! drives a peer process and correlates commands with replies.

mod connection;
mod protocol;

pub use connection::{AssuanConnection, PendingReply};
pub use protocol::{decode_percent, encode_percent, parse_line, AssuanResponse, ReplyLine};
