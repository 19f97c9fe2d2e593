//! Chat protocol sessions
//!
//! Only the subset needed to authenticate, join channels and stay alive.

pub mod frame;
pub mod session;

pub use frame::{parse_frame, Command, Frame};
pub use session::{Session, SessionError, SessionId, SessionSettings, SessionState};
