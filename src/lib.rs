//! fraglab - build-time assembler for GLSL shader experiments
//!
//! Gathers an experiment's fragments (options, shared includes, main),
//! concatenates them with separator banners, and writes
//! `experiments/<name>/build.glsl`. Watch mode rebuilds on fragment
//! changes until interrupted.

pub mod assemble;
pub mod config;
pub mod signal;
pub mod targets;
pub mod watch;

pub use assemble::{build, BuildError, SEPARATOR};
pub use config::{ConfigError, ExperimentConfig, ProjectLayout};
pub use targets::{resolve, TargetList};
pub use watch::{WatchError, WatchSession};
