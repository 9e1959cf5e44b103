//! Loading user-module manifests from disk.

use std::path::{Path, PathBuf};

use tracing::debug;

use warden_core::{HostBindings, ModuleDescriptor, ModuleManifest};

use crate::error::LoadError;

/// File name used for package-style modules: `<root>/a/b/module.toml`.
pub const PACKAGE_MANIFEST: &str = "module.toml";

/// Manifest file extension.
pub const MANIFEST_EXTENSION: &str = "toml";

/// Turns manifest files into descriptors bound to host implementations.
#[derive(Debug, Clone, Default)]
pub struct ManifestLoader {
    bindings: HostBindings,
}

impl ManifestLoader {
    /// Create a loader that binds manifest functions against `bindings`.
    pub fn new(bindings: HostBindings) -> Self {
        Self { bindings }
    }

    /// The host bindings available to manifests.
    pub fn bindings(&self) -> &HostBindings {
        &self.bindings
    }

    /// Files probed under `root` for `segments`, in order:
    /// `<root>/a/b.toml` then `<root>/a/b/module.toml`.
    pub fn candidates(root: &Path, segments: &[&str]) -> [PathBuf; 2] {
        let mut dir = root.to_path_buf();
        for segment in segments {
            dir.push(segment);
        }
        let file = dir.with_extension(MANIFEST_EXTENSION);
        let package = dir.join(PACKAGE_MANIFEST);
        [file, package]
    }

    /// Load and validate the manifest at `file`, which must declare the
    /// module `expected`.
    pub fn load(&self, file: &Path, expected: &str) -> Result<ModuleDescriptor, LoadError> {
        let contents = std::fs::read_to_string(file)?;
        let manifest = ModuleManifest::from_toml_str(&contents)?;
        if manifest.name != expected {
            return Err(LoadError::NameMismatch {
                expected: expected.to_string(),
                found: manifest.name,
            });
        }

        let descriptor = manifest.into_descriptor(&self.bindings)?;
        debug!(
            module = expected,
            file = %file.display(),
            members = descriptor.member_names().len(),
            "Loaded manifest"
        );
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::Value;

    #[test]
    fn test_candidates() {
        let [file, package] = ManifestLoader::candidates(Path::new("/lib"), &["pkg", "tools"]);
        assert_eq!(file, PathBuf::from("/lib/pkg/tools.toml"));
        assert_eq!(package, PathBuf::from("/lib/pkg/tools/module.toml"));
    }

    #[test]
    fn test_load_checks_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("tools.toml");
        std::fs::write(&file, "name = \"other\"\n").unwrap();

        let loader = ManifestLoader::default();
        assert!(matches!(
            loader.load(&file, "tools"),
            Err(LoadError::NameMismatch { .. })
        ));
    }

    #[test]
    fn test_load_binds_symbols() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("tools.toml");
        std::fs::write(&file, "name = \"tools\"\n[[functions]]\nname = \"ping\"\n").unwrap();

        assert!(matches!(
            ManifestLoader::default().load(&file, "tools"),
            Err(LoadError::Manifest(_))
        ));

        let loader = ManifestLoader::new(
            HostBindings::new().bind("tools.ping", |_, _| Ok(Value::from("pong"))),
        );
        let descriptor = loader.load(&file, "tools").unwrap();
        assert!(descriptor.function("ping").is_some());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ManifestLoader::default()
            .load(&dir.path().join("absent.toml"), "absent")
            .unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }
}
