//! Platform target selection and base flag strategies.
//!
//! The target is picked once per build. Desktop targets ask the native
//! library's config tool for flags; embedded targets link a fixed library
//! list because their SDK guarantees the library name and may not have a
//! shell at all.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::Serialize;

use crate::builder::query::FlagQuery;
use crate::core::errors::BuildError;
use crate::core::flags::{FlagSet, LibraryReference};
use crate::core::manifest::NativeConfig;

/// Environment variable naming the target explicitly.
pub const TARGET_ENV: &str = "EXTBUILD_TARGET";
/// Presence selects the Android target.
pub const ANDROID_ENV: &str = "EXTBUILD_ANDROID";
/// Presence selects the iOS target.
pub const IOS_ENV: &str = "EXTBUILD_IOS";

/// The environment the extension modules are built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformTarget {
    #[default]
    Desktop,
    Android,
    Ios,
}

impl PlatformTarget {
    /// Detect the target from the process environment.
    pub fn detect() -> Result<Self> {
        Self::from_env(|key| std::env::var(key).ok())
    }

    /// Detect the target using `lookup` for environment access.
    ///
    /// `EXTBUILD_TARGET` wins; otherwise the presence of `EXTBUILD_ANDROID`
    /// or `EXTBUILD_IOS` selects that target; otherwise desktop.
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup(TARGET_ENV) {
            return value.parse();
        }
        if lookup(ANDROID_ENV).is_some() {
            return Ok(PlatformTarget::Android);
        }
        if lookup(IOS_ENV).is_some() {
            return Ok(PlatformTarget::Ios);
        }
        Ok(PlatformTarget::Desktop)
    }

    /// Mobile/embedded targets use a fixed library list.
    pub fn is_embedded(&self) -> bool {
        matches!(self, PlatformTarget::Android | PlatformTarget::Ios)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformTarget::Desktop => "desktop",
            PlatformTarget::Android => "android",
            PlatformTarget::Ios => "ios",
        }
    }
}

impl fmt::Display for PlatformTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformTarget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "desktop" => Ok(PlatformTarget::Desktop),
            "android" => Ok(PlatformTarget::Android),
            "ios" => Ok(PlatformTarget::Ios),
            other => bail!(
                "invalid target `{}`; expected 'desktop', 'android', or 'ios'",
                other
            ),
        }
    }
}

/// Flags and libraries shared by every compiled unit of a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BaseFlags {
    pub flags: FlagSet,
    pub libs: Vec<LibraryReference>,
}

/// How the base flags are obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagStrategy {
    /// Ask the library's config tool (desktop).
    DesktopQuery { cflags: FlagQuery, libs: FlagQuery },
    /// Use a fixed library list; no process is spawned (embedded).
    EmbeddedFixed { libs: Vec<LibraryReference> },
}

impl FlagStrategy {
    /// Select the strategy for a target.
    pub fn for_target(target: PlatformTarget, native: &NativeConfig) -> Self {
        if target.is_embedded() {
            FlagStrategy::EmbeddedFixed {
                libs: native.embedded_libs.clone(),
            }
        } else {
            FlagStrategy::DesktopQuery {
                cflags: native.cflags_query.clone(),
                libs: native.libs_query.clone(),
            }
        }
    }

    /// Produce the base flag set and base libraries.
    pub fn resolve(&self, timeout: Duration) -> Result<BaseFlags, BuildError> {
        match self {
            FlagStrategy::DesktopQuery { cflags, libs } => {
                let cflags_output = cflags.run(timeout)?;
                let libs_output = libs.run(timeout)?;
                let (flags, libs) = FlagSet::from_query_output(&cflags_output, &libs_output);
                Ok(BaseFlags { flags, libs })
            }
            FlagStrategy::EmbeddedFixed { libs } => Ok(BaseFlags {
                flags: FlagSet::default(),
                libs: libs.clone(),
            }),
        }
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            FlagStrategy::DesktopQuery { cflags, libs } => {
                format!("querying `{}` and `{}`", cflags, libs)
            }
            FlagStrategy::EmbeddedFixed { libs } => {
                let names: Vec<_> = libs.iter().map(|l| l.name()).collect();
                format!("fixed libraries [{}]", names.join(", "))
            }
        }
    }
}
