//! # chatsync-server
//!
//! HTTP RPC layer over a chat archive that a background sync task keeps
//! appending to.
//!
//! - **Server lifecycle**: non-blocking start, deadline-bounded stop
//! - **Client binding**: the live chat client can be attached after the
//!   server is already serving
//! - **Handlers**: ping, status, chats, messages, search, send
//! - **Sync driver**: feeds client events into the archive

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod logging;
pub mod server;
pub mod state;
pub mod store;
pub mod sync;

pub use client::{ChatClient, ClientBinding, ClientError};
pub use config::RpcConfig;
pub use error::{ApiError, RpcError};
pub use server::{Options, Server};
pub use store::Store;
pub use sync::{run_sync, Connector, SyncError, SyncEvent, SyncOptions, SyncReport, SyncSession};
