//! sg-core: shared foundation for simgate.
//!
//! Contains:
//! - session (short session identifiers and artifact naming)
//! - numeric (printf-style number formatting)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod session;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use numeric::*;
pub use session::*;
