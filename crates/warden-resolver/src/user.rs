//! Table of user modules loaded from search roots.
//!
//! User modules never enter the sealed registry. They live here, keyed by
//! module name and bound to the manifest file that produced them. A name
//! stays bound to its first file for the lifetime of the table: loading the
//! same file again reuses the bound descriptor, and a different file under
//! a bound name is rejected.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{info, warn};

use warden_core::{ModuleCatalog, ModuleDescriptor};

#[derive(Debug)]
struct UserModule {
    file: PathBuf,
    descriptor: Arc<ModuleDescriptor>,
}

/// Concurrent table of user-module descriptors.
#[derive(Debug, Default)]
pub struct UserModuleTable {
    modules: DashMap<String, UserModule>,
}

impl UserModuleTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a descriptor loaded from `file` to its module name.
    ///
    /// Returns the descriptor now bound to the name: the new one, or the
    /// existing one if the name is already bound to the same file.
    ///
    /// # Errors
    ///
    /// Returns the bound file if the name is bound to a different file.
    pub fn insert(
        &self,
        file: &Path,
        descriptor: ModuleDescriptor,
    ) -> Result<Arc<ModuleDescriptor>, PathBuf> {
        let file = identity(file);
        match self.modules.entry(descriptor.name().to_string()) {
            Entry::Occupied(entry) => {
                let bound = entry.get();
                if bound.file == file {
                    Ok(Arc::clone(&bound.descriptor))
                } else {
                    warn!(
                        module = %entry.key(),
                        bound = %bound.file.display(),
                        rejected = %file.display(),
                        "User module name already bound"
                    );
                    Err(bound.file.clone())
                }
            }
            Entry::Vacant(entry) => {
                let descriptor = Arc::new(descriptor);
                info!(
                    module = %entry.key(),
                    version = descriptor.version(),
                    file = %file.display(),
                    "User module loaded"
                );
                entry.insert(UserModule {
                    file,
                    descriptor: Arc::clone(&descriptor),
                });
                Ok(descriptor)
            }
        }
    }

    /// The descriptor bound to `name`, if it was loaded from `file`.
    ///
    /// Returns `Err` with the bound file when `name` belongs to another file.
    pub fn bound_to(
        &self,
        name: &str,
        file: &Path,
    ) -> Result<Option<Arc<ModuleDescriptor>>, PathBuf> {
        match self.modules.get(name) {
            None => Ok(None),
            Some(bound) if bound.file == identity(file) => Ok(Some(Arc::clone(&bound.descriptor))),
            Some(bound) => Err(bound.file.clone()),
        }
    }

    /// Look up a module.
    pub fn get(&self, name: &str) -> Option<Arc<ModuleDescriptor>> {
        self.modules
            .get(name)
            .map(|entry| Arc::clone(&entry.descriptor))
    }

    /// The manifest file a module was loaded from.
    pub fn file(&self, name: &str) -> Option<PathBuf> {
        self.modules.get(name).map(|entry| entry.file.clone())
    }

    /// Number of user modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if no user modules are loaded.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleCatalog for UserModuleTable {
    fn module(&self, name: &str) -> Option<Arc<ModuleDescriptor>> {
        self.get(name)
    }

    fn module_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }
}

/// Canonical form of a manifest path, so `root/./a.toml` and `root/a.toml`
/// name the same module.
fn identity(file: &Path) -> PathBuf {
    std::fs::canonicalize(file).unwrap_or_else(|_| file.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::ModuleDeclaration;

    fn module(name: &str, version: &str) -> ModuleDescriptor {
        ModuleDeclaration::new(name).version(version).build().unwrap()
    }

    #[test]
    fn test_first_file_keeps_the_name() {
        let table = UserModuleTable::new();
        let first = table
            .insert(Path::new("/trusted/tools.toml"), module("tools", "1.0.0"))
            .unwrap();

        let rejected = table
            .insert(Path::new("/other/tools.toml"), module("tools", "9.9.9"))
            .unwrap_err();
        assert_eq!(rejected, PathBuf::from("/trusted/tools.toml"));

        let current = table.get("tools").unwrap();
        assert!(Arc::ptr_eq(&first, &current));
        assert_eq!(current.version(), "1.0.0");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_same_file_reuses_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("tools.toml");
        std::fs::write(&file, "name = \"tools\"\n").unwrap();

        let table = UserModuleTable::new();
        let first = table.insert(&file, module("tools", "1.0.0")).unwrap();
        let again = table
            .insert(&dir.path().join(".").join("tools.toml"), module("tools", "2.0.0"))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert!(matches!(table.bound_to("tools", &file), Ok(Some(_))));
        assert!(matches!(table.bound_to("nope", &file), Ok(None)));
        assert!(table.bound_to("tools", Path::new("/elsewhere/tools.toml")).is_err());
    }
}
