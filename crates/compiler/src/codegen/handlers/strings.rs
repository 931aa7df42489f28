//! Bounded string assignment handlers.
//!
//! Every string write is a bounded copy that always null-terminates the
//! last slot: `strncpy(dest, src, N); dest[N] = '\0';`. The declared
//! capacity is `N`; storage is `N + 1`.

use crate::codegen::{AssignmentContext, CodegenState};
use crate::diagnostics::GenResult;

impl CodegenState {
    /// All `STRING_*` kinds share one shape; the classifier already
    /// resolved the destination lvalue and capacity.
    pub(super) fn emit_string_assignment(
        &mut self,
        ctx: &AssignmentContext<'_>,
    ) -> GenResult<String> {
        self.needs_string = true;
        let t = &ctx.target_name;
        let cap = ctx.string_capacity;
        Ok(format!(
            "strncpy({t}, {src}, {cap});\n{t}[{cap}] = '\\0';",
            t = t,
            src = ctx.rhs,
            cap = cap
        ))
    }
}
