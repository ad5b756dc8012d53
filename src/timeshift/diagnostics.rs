//! Operator diagnostics for the catch-up pipeline
//!
//! Step logging is gated on the `debug_mode` plugin setting so normal
//! operation only produces the single per-failure warning line.

use std::fmt::Display;
use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct Diagnostics {
    verbose: bool,
}

impl Diagnostics {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Record one resolution step when verbose
    pub fn step(&self, step: &str, detail: impl Display) {
        if self.verbose {
            info!(step = step, "[timeshift] {}", detail);
        }
    }
}
