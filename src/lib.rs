// Allow unwrap and unreadable literals in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::unreadable_literal))]
//! Ratchet: a metered sandbox runtime for remote-controlled game bots.
//!
//! Competitor programs arrive as `.rasm` sources. They are assembled into
//! compact wordcode, rewritten so every instruction charges a per-turn
//! budget, and run one worker thread per game entity. All game effects go
//! through a remote authority over a length-prefixed JSON link.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Session (event loop, id → instance map)    │
//! ├──────────────────────┬──────────────────────┤
//! │  Scheduler (worker   │  Gateway (capability │
//! │  per instance,       │  table, value codec) │
//! │  pause / resume)     │                      │
//! ├──────────────────────┼──────────────────────┤
//! │  Sandbox (guards,    │  Transport (framed   │
//! │  imports, builtins)  │  JSON over TCP)      │
//! ├──────────────────────┴──────────────────────┤
//! │  Interpreter + Meter  ◄──  Instrumenter     │
//! └─────────────────────────────────────────────┘
//! ```

pub mod bytecode;
pub mod codec;
pub mod config;
pub mod error;
pub mod game;
pub mod gateway;
pub mod instrument;
pub mod protocol;
pub mod sandbox;
pub mod scheduler;
pub mod session;
pub mod transport;
pub mod vm;

pub use config::RuntimeConfig;
pub use error::{ErrorKind, ProgramError};
pub use sandbox::{Bundle, LoadError, Sandbox};
pub use session::{Session, SessionError};
