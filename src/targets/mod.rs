//! Target resolution
//!
//! Turns one experiment's configuration into the ordered list of fragment
//! paths a build pass concatenates. Resolution is pure path arithmetic;
//! existence of the files is checked by the build pass that reads them.

use std::path::PathBuf;

use crate::config::{ExperimentConfig, ProjectLayout, FRAGMENT_EXT, MAIN_FRAGMENT, OPTIONS_FRAGMENT};

/// Ordered fragment paths for one experiment.
///
/// Invariant: the first entry is the experiment's options fragment, the
/// last is its main fragment, and everything in between is a shared
/// include in manifest order. The list always has at least the two
/// bookend entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetList {
    paths: Vec<PathBuf>,
}

impl TargetList {
    /// Paths in concatenation order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.paths.iter()
    }
}

impl<'a> IntoIterator for &'a TargetList {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

/// Resolve the target list for `config` under `layout`.
///
/// For N include names the result has N+2 entries:
/// `options.glsl`, then `includes/<name>.glsl` for each name in order,
/// then `main.glsl`. Recomputed fresh on every invocation; a watch
/// session holds onto one resolution for its whole lifetime.
pub fn resolve(layout: &ProjectLayout, config: &ExperimentConfig) -> TargetList {
    let mut paths = Vec::with_capacity(config.include_names.len() + 2);
    paths.push(config.root_dir.join(OPTIONS_FRAGMENT));
    for name in &config.include_names {
        paths.push(layout.includes_dir.join(format!("{name}.{FRAGMENT_EXT}")));
    }
    paths.push(config.root_dir.join(MAIN_FRAGMENT));
    TargetList { paths }
}
