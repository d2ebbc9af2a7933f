//! Compilation unit registry.
//!
//! Units are registered in declaration order while the build is being
//! configured. Freezing the registry yields a [`FrozenRegistry`] with no
//! mutating API; the driver and the auditor only ever see the frozen form.

use std::collections::{BTreeSet, HashSet};

use crate::core::errors::BuildError;
use crate::core::flags::LibraryReference;
use crate::core::unit::{CompilationUnit, UnitName};

/// Append-only registry used during configuration.
#[derive(Debug, Default)]
pub struct UnitRegistry {
    units: Vec<CompilationUnit>,
    names: HashSet<UnitName>,
}

impl UnitRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        UnitRegistry::default()
    }

    /// Register an interpreted-only unit.
    pub fn register_interpreted(&mut self, name: &str) -> Result<(), BuildError> {
        let name = UnitName::parse(name)?;
        self.register(CompilationUnit::interpreted(name))
    }

    /// Register a compiled unit with its own libraries, in link order.
    pub fn register_compiled<I, L>(&mut self, name: &str, libs: I) -> Result<(), BuildError>
    where
        I: IntoIterator<Item = L>,
        L: Into<LibraryReference>,
    {
        let name = UnitName::parse(name)?;
        let libs = libs.into_iter().map(Into::into).collect();
        self.register(CompilationUnit::compiled(name, libs))
    }

    /// Register an already-built unit.
    pub fn register(&mut self, unit: CompilationUnit) -> Result<(), BuildError> {
        if !self.names.insert(unit.name().clone()) {
            return Err(BuildError::DuplicateUnit {
                name: unit.name().to_string(),
            });
        }
        self.units.push(unit);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Stop accepting registrations.
    pub fn freeze(self) -> FrozenRegistry {
        FrozenRegistry { units: self.units }
    }
}

/// Read-only registry handed to the build phases.
#[derive(Debug, Clone)]
pub struct FrozenRegistry {
    units: Vec<CompilationUnit>,
}

impl FrozenRegistry {
    /// All units in registration order.
    pub fn units(&self) -> &[CompilationUnit] {
        &self.units
    }

    /// Compiled units in registration order.
    pub fn compiled(&self) -> impl Iterator<Item = &CompilationUnit> {
        self.units.iter().filter(|u| u.is_compiled())
    }

    /// Interpreted units in registration order.
    pub fn interpreted(&self) -> impl Iterator<Item = &CompilationUnit> {
        self.units.iter().filter(|u| !u.is_compiled())
    }

    /// Look up a unit by its dotted name.
    pub fn get(&self, name: &str) -> Option<&CompilationUnit> {
        self.units.iter().find(|u| u.name().as_str() == name)
    }

    /// File names the generated-sources directory is expected to hold.
    pub fn expected_generated(&self) -> BTreeSet<String> {
        self.units
            .iter()
            .filter_map(|u| u.generated_file_name())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Libraries a compiled unit links against: the base libraries in order,
/// then the unit's own libraries in order. Duplicates are kept.
pub fn link_libraries(base: &[LibraryReference], unit: &CompilationUnit) -> Vec<LibraryReference> {
    base.iter().chain(unit.libs()).cloned().collect()
}
