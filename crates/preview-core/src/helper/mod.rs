//! The out-of-process rendering helper
//!
//! `supervisor` owns the child process, `client` speaks its HTTP API and
//! `session` ties both to the catalog snapshot of one run.

pub mod client;
pub mod port;
pub mod session;
pub mod supervisor;
pub mod wire;

pub use client::HelperClient;
pub use port::negotiate_port;
pub use session::HelperSession;
pub use supervisor::{resolve_command, CommandKind, HelperCommand, HelperProcessSupervisor, HelperState};
pub use wire::{PreviewRequest, PreviewResponse};
