//! # chatsync-shared
//!
//! Types shared by the archive store and the RPC server: chat addressing
//! (JIDs), chat kinds, protocol constants and the associated errors.

pub mod constants;
pub mod error;
pub mod jid;
pub mod types;

pub use error::JidError;
pub use jid::{parse_user_or_jid, Jid};
pub use types::ChatKind;
