//! Delivery modes for the tool protocol.
//!
//! - [`stdio`]: one implicit session over the process's pipes.
//! - [`sse`]: many concurrent sessions over HTTP, tracked by [`session`].

pub mod session;
pub mod sse;
pub mod stdio;

pub use session::{SessionGuard, SessionRegistry};
pub use sse::{router, serve, AppState};
pub use stdio::serve_stdio;
