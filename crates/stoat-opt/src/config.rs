//! Knobs gating the body optimizer.

use crate::analysis::OptimizerHints;
use stoat_ir::MethodDef;

#[derive(Debug, Clone, Copy)]
pub struct OptimizerConfig {
    /// Largest body size still considered for inlining without an explicit
    /// hint.
    pub inline_threshold: usize,
    /// Maximum nesting of inlined bodies within one optimized method.
    pub max_inline_depth: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            inline_threshold: 16,
            max_inline_depth: 4,
        }
    }
}

impl OptimizerConfig {
    pub(crate) fn is_inlineable(&self, hints: OptimizerHints, def: &MethodDef) -> bool {
        !hints.no_inline && (hints.inline || def.body.size() <= self.inline_threshold)
    }
}
