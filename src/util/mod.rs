//! Shared utilities

pub mod cancel;
pub mod config;
pub mod diagnostic;
pub mod fs;
pub mod process;

pub use cancel::CancellationToken;
pub use config::Config;
pub use diagnostic::Diagnostic;
