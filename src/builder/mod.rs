//! Extension module build system.
//!
//! This module selects the platform flag strategy, drives the translate and
//! compile steps for every compiled unit, and audits the generated sources.

pub mod audit;
pub mod context;
pub mod events;
pub mod executor;
pub mod headers;
pub mod native;
pub mod platform;
pub mod query;
pub mod report;
pub mod scan;
pub mod toolchain;

pub use audit::{audit, AuditReport};
pub use context::{BuildContext, ProjectLayout};
pub use events::{BuildEvent, MessageFormat};
pub use executor::BuildExecutor;
pub use native::{ExtensionDriver, UnitInvocation};
pub use platform::{BaseFlags, FlagStrategy, PlatformTarget};
pub use query::FlagQuery;
pub use report::{BuildPhase, BuildReport, UnitOutcome, UnitResult};
pub use toolchain::{CommandSpec, CythonToolchain, Toolchain};
