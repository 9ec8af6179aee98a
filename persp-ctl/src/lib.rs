//! persp-ctl - CloudHealth perspective lifecycle
//!
//! Wraps the perspective codec with the pieces needed to manage a perspective
//! end to end: HTTP transport, confirmation parsing, local state records and
//! create/read/update/delete orchestration.

pub mod confirmation;
pub mod lifecycle;
pub mod state;
pub mod transport;

pub use lifecycle::Lifecycle;
pub use state::{StateRecord, StateStore};
pub use transport::{HttpTransport, Transport};
