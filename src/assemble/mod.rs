//! Build pass
//!
//! One pass reads every target fragment in list order, wraps each one in
//! the separator banner, and writes the concatenation to the output file.
//! All reads happen before the write: a pass that fails to read any
//! fragment leaves the previous output untouched.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::targets::TargetList;

/// Banner emitted immediately before and after every fragment.
///
/// Byte-exact across versions; downstream tooling diffs `build.glsl`
/// against outputs produced by earlier releases.
pub const SEPARATOR: &str = "\n/*------------*/\n";

/// Errors raised by a build pass.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to read fragment {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write output {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BuildError {
    /// Path of the file the pass failed on.
    pub fn path(&self) -> &Path {
        match self {
            BuildError::Read { path, .. } | BuildError::Write { path, .. } => path,
        }
    }
}

/// Run one build pass: read all of `targets`, concatenate with banners,
/// overwrite `output_path`.
///
/// Fragment bytes pass through unchanged. The pass is all-or-nothing at
/// the write: no read failure ever truncates or partially rewrites an
/// existing output file.
pub fn build(targets: &TargetList, output_path: &Path) -> Result<(), BuildError> {
    let mut fragments = Vec::with_capacity(targets.len());
    for path in targets {
        let bytes = fs::read(path).map_err(|source| BuildError::Read {
            path: path.clone(),
            source,
        })?;
        fragments.push(bytes);
    }

    let banner = SEPARATOR.as_bytes();
    let total: usize = fragments.iter().map(|f| f.len() + 2 * banner.len()).sum();
    let mut combined = Vec::with_capacity(total);
    for fragment in &fragments {
        combined.extend_from_slice(banner);
        combined.extend_from_slice(fragment);
        combined.extend_from_slice(banner);
    }

    fs::write(output_path, &combined).map_err(|source| BuildError::Write {
        path: output_path.to_path_buf(),
        source,
    })
}
