//! Experiment configuration
//!
//! An experiment lives under `experiments/<name>/` and consists of an
//! `options.glsl` fragment, a `main.glsl` fragment, and an ordered list of
//! shared includes declared in `experiments/<name>/includes.toml`:
//!
//! ```toml
//! include = ["noise", "sdf"]
//! ```
//!
//! Each listed name resolves to `includes/<name>.glsl`. A missing
//! `include` key means the experiment uses no shared fragments.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Extension shared by every fragment file.
pub const FRAGMENT_EXT: &str = "glsl";

/// Per-experiment configuration fragment, always concatenated first.
pub const OPTIONS_FRAGMENT: &str = "options.glsl";

/// Per-experiment main fragment, always concatenated last.
pub const MAIN_FRAGMENT: &str = "main.glsl";

/// Combined output file, written into the experiment directory.
pub const OUTPUT_FRAGMENT: &str = "build.glsl";

/// Include manifest file name inside the experiment directory.
pub const INCLUDE_MANIFEST: &str = "includes.toml";

/// Errors raised while loading an experiment's configuration.
///
/// All of these are fatal at startup; none are retried.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("experiment name must not be empty")]
    EmptyName,

    #[error("invalid experiment name '{0}': must be a plain directory name")]
    InvalidName(String),

    #[error("failed to read include manifest {path}: {source}")]
    ManifestIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse include manifest {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// The two root directories every resolution happens against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    /// Directory holding one subdirectory per experiment.
    pub experiments_dir: PathBuf,
    /// Directory holding the shared include fragments.
    pub includes_dir: PathBuf,
}

impl ProjectLayout {
    /// Derive the layout from a project root containing `experiments/`
    /// and `includes/`.
    pub fn from_root(root: &Path) -> Self {
        Self {
            experiments_dir: root.join("experiments"),
            includes_dir: root.join("includes"),
        }
    }

    /// Directory of a single experiment.
    pub fn experiment_dir(&self, name: &str) -> PathBuf {
        self.experiments_dir.join(name)
    }
}

/// Shape of `includes.toml`.
#[derive(Debug, Deserialize)]
struct IncludeManifest {
    #[serde(default)]
    include: Vec<String>,
}

/// One experiment, loaded once per invocation and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentConfig {
    /// Experiment name, also the directory name under `experiments/`.
    pub name: String,
    /// `experiments/<name>`.
    pub root_dir: PathBuf,
    /// Ordered shared-include names from the manifest. Order here is
    /// concatenation order.
    pub include_names: Vec<String>,
}

impl ExperimentConfig {
    /// Load the configuration for `name` under the given layout.
    ///
    /// Validates the name and reads the include manifest; fails with a
    /// [`ConfigError`] if either step goes wrong.
    pub fn load(layout: &ProjectLayout, name: &str) -> Result<Self, ConfigError> {
        validate_name(name)?;
        let root_dir = layout.experiment_dir(name);
        let manifest_path = root_dir.join(INCLUDE_MANIFEST);
        let include_names = load_include_manifest(&manifest_path)?;
        Ok(Self {
            name: name.to_string(),
            root_dir,
            include_names,
        })
    }

    /// Path the combined output is written to.
    pub fn output_path(&self) -> PathBuf {
        self.root_dir.join(OUTPUT_FRAGMENT)
    }
}

fn validate_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::EmptyName);
    }
    // The name must stay inside the experiments directory.
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(ConfigError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn load_include_manifest(path: &Path) -> Result<Vec<String>, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::ManifestIo {
        path: path.to_path_buf(),
        source,
    })?;
    let manifest: IncludeManifest =
        toml::from_str(&raw).map_err(|source| ConfigError::ManifestParse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(manifest.include)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn layout_with_experiment(manifest: Option<&str>) -> (TempDir, ProjectLayout) {
        let dir = TempDir::new().unwrap();
        let layout = ProjectLayout::from_root(dir.path());
        let exp_dir = layout.experiment_dir("demo");
        fs::create_dir_all(&exp_dir).unwrap();
        if let Some(contents) = manifest {
            fs::write(exp_dir.join(INCLUDE_MANIFEST), contents).unwrap();
        }
        (dir, layout)
    }

    #[test]
    fn test_load_preserves_include_order() {
        let (_dir, layout) = layout_with_experiment(Some("include = [\"b\", \"a\", \"c\"]\n"));
        let config = ExperimentConfig::load(&layout, "demo").unwrap();
        assert_eq!(config.include_names, vec!["b", "a", "c"]);
        assert_eq!(config.root_dir, layout.experiment_dir("demo"));
    }

    #[test]
    fn test_missing_include_key_means_no_includes() {
        let (_dir, layout) = layout_with_experiment(Some(""));
        let config = ExperimentConfig::load(&layout, "demo").unwrap();
        assert!(config.include_names.is_empty());
    }

    #[test]
    fn test_missing_manifest_is_config_error() {
        let (_dir, layout) = layout_with_experiment(None);
        let err = ExperimentConfig::load(&layout, "demo").unwrap_err();
        assert!(matches!(err, ConfigError::ManifestIo { .. }));
    }

    #[test]
    fn test_malformed_manifest_is_config_error() {
        let (_dir, layout) = layout_with_experiment(Some("include = \"not-a-list\"\n"));
        let err = ExperimentConfig::load(&layout, "demo").unwrap_err();
        assert!(matches!(err, ConfigError::ManifestParse { .. }));
    }

    #[test]
    fn test_empty_name_rejected() {
        let (_dir, layout) = layout_with_experiment(Some(""));
        let err = ExperimentConfig::load(&layout, "").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyName));
    }

    #[test]
    fn test_path_like_name_rejected() {
        let (_dir, layout) = layout_with_experiment(Some(""));
        for name in ["../demo", "a/b", ".."] {
            let err = ExperimentConfig::load(&layout, name).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidName(_)));
        }
    }

    #[test]
    fn test_output_path_is_in_experiment_dir() {
        let (_dir, layout) = layout_with_experiment(Some(""));
        let config = ExperimentConfig::load(&layout, "demo").unwrap();
        assert_eq!(
            config.output_path(),
            layout.experiment_dir("demo").join("build.glsl")
        );
    }
}
