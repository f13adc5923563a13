//! # Interactive
//!
//! Line-oriented control of interactive programs attached to a
//! pseudo-terminal. Start a command, write lines to it as if typed at a
//! keyboard, and read every line it prints as one ordered stream.
//!
//! ## Architecture
//!
//! ```text
//!            write()                                   recv()
//!   caller ──────────▶ [input queue] ─▶ Input Forwarder ─┐
//!                                                         ▼
//!                                                     ┌───────┐    ┌─────────┐
//!                                                     │  PTY  │◀──▶│  child  │
//!                                                     └───────┘    └─────────┘
//!                                                         │             │
//!   caller ◀────────── [output queue] ◀─ Output Reader ◀──┘             │
//!                            ▲                                          │
//!                            └──── closed by Supervisor ◀── wait/kill ──┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use interactive::Session;
//!
//! #[tokio::main]
//! async fn main() -> interactive::Result<()> {
//!     let mut bc = Session::start("bc", &["-q"], None)?;
//!
//!     bc.write("1 + 1").await?;
//!     while let Some(line) = bc.recv().await {
//!         if line == "2" {
//!             bc.exit()?;
//!         }
//!     }
//!
//!     println!("bc {}", bc.wait().await);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Per-session configuration
//! - [`session`]: The session and its tasks
//! - [`error`]: Error types

pub mod config;
pub mod error;
pub mod session;

pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use session::{Session, SessionState, SessionStatus};
