//! Mutable state for one generation run.
//!
//! One `CodegenState` value is owned by the entry point and threaded by
//! reference through every emitter; there is no module-level state anywhere.
//! A full [`CodegenState::reset`] runs at the start of every generation.
//!
//! Need-flags are monotonic: once an emitter sets one it stays set, and the
//! include aggregator reads them only after the traversal completes.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::ast::Visibility;
use crate::config::{Mode, TargetCapabilities};
use crate::diagnostics::Diagnostic;
use crate::symbols::SymbolInfo;
use crate::types::{ParameterInfo, TypeInfo};

pub struct CodegenState {
    pub(crate) symbols: SymbolInfo,
    pub(crate) mode: Mode,
    pub(crate) target: TargetCapabilities,

    // Scope stack
    pub(crate) current_scope: Option<String>,
    pub(crate) scope_stack: Vec<String>,
    pub(crate) scope_member_cache: HashMap<String, HashSet<String>>,

    // Parameter frame for the function being emitted
    pub(crate) current_parameters: HashMap<String, ParameterInfo>,
    pub(crate) current_function_name: Option<String>,

    // Fully-qualified name -> declared type record, populated as
    // declarations are emitted
    pub(crate) type_registry: HashMap<String, TypeInfo>,

    // Need-flags (write-once-to-true within a run)
    pub(crate) needs_stdint: bool,
    pub(crate) needs_stdbool: bool,
    pub(crate) needs_string: bool,
    pub(crate) needs_limits: bool,
    pub(crate) needs_cmsis: bool,
    pub(crate) needs_isr: bool,
    pub(crate) needs_float_assert: bool,
    pub(crate) needs_double_assert: bool,

    // Helper usage, ordered so emission is deterministic
    pub(crate) used_clamp_ops: BTreeSet<String>,
    pub(crate) used_safe_div_ops: BTreeSet<String>,

    // Float bit-shadow bookkeeping
    pub(crate) float_bit_shadows: HashSet<String>,
    pub(crate) float_shadow_current: HashSet<String>,

    // Temp declarations hoisted above the next statement (C++ mode scratch,
    // atomic retry temps)
    pub(crate) pending_temp_declarations: Vec<String>,
    pub(crate) temp_counter: usize,

    // Per-function locals
    pub(crate) local_variables: HashSet<String>,
    pub(crate) local_arrays: HashSet<String>,
    pub(crate) known_functions: HashSet<String>,

    // Struct types that need the `struct ` qualifier (externally declared)
    pub(crate) needs_struct_keyword: HashSet<String>,

    // User #include lines replayed after the need-flag prelude
    pub(crate) user_includes: Vec<String>,

    // Non-fatal diagnostics accumulated during the walk
    pub(crate) warnings: Vec<Diagnostic>,

    // Cursor into the token stream for comment replay
    pub(crate) comment_cursor: usize,

    // Source line of the statement being emitted, for expression-level
    // diagnostics
    pub(crate) current_line: usize,
}

impl CodegenState {
    pub fn new(symbols: SymbolInfo, mode: Mode, target: TargetCapabilities) -> Self {
        let mut state = CodegenState {
            symbols,
            mode,
            target,
            current_scope: None,
            scope_stack: Vec::new(),
            scope_member_cache: HashMap::new(),
            current_parameters: HashMap::new(),
            current_function_name: None,
            type_registry: HashMap::new(),
            needs_stdint: false,
            needs_stdbool: false,
            needs_string: false,
            needs_limits: false,
            needs_cmsis: false,
            needs_isr: false,
            needs_float_assert: false,
            needs_double_assert: false,
            used_clamp_ops: BTreeSet::new(),
            used_safe_div_ops: BTreeSet::new(),
            float_bit_shadows: HashSet::new(),
            float_shadow_current: HashSet::new(),
            pending_temp_declarations: Vec::new(),
            temp_counter: 0,
            local_variables: HashSet::new(),
            local_arrays: HashSet::new(),
            known_functions: HashSet::new(),
            needs_struct_keyword: HashSet::new(),
            user_includes: Vec::new(),
            warnings: Vec::new(),
            comment_cursor: 0,
            current_line: 0,
        };
        state.prime_scope_member_cache();
        state
    }

    /// Restore every field for a fresh run. The symbol table view and mode
    /// survive; everything mutable goes back to empty/false.
    pub fn reset(&mut self, target: Option<TargetCapabilities>) {
        if let Some(target) = target {
            self.target = target;
        }
        self.current_scope = None;
        self.scope_stack.clear();
        self.current_parameters.clear();
        self.current_function_name = None;
        self.type_registry.clear();
        self.needs_stdint = false;
        self.needs_stdbool = false;
        self.needs_string = false;
        self.needs_limits = false;
        self.needs_cmsis = false;
        self.needs_isr = false;
        self.needs_float_assert = false;
        self.needs_double_assert = false;
        self.used_clamp_ops.clear();
        self.used_safe_div_ops.clear();
        self.float_bit_shadows.clear();
        self.float_shadow_current.clear();
        self.pending_temp_declarations.clear();
        self.temp_counter = 0;
        self.local_variables.clear();
        self.local_arrays.clear();
        self.known_functions.clear();
        self.needs_struct_keyword.clear();
        self.user_includes.clear();
        self.warnings.clear();
        self.comment_cursor = 0;
        self.current_line = 0;
        self.prime_scope_member_cache();
    }

    fn prime_scope_member_cache(&mut self) {
        self.scope_member_cache.clear();
        for (scope, members) in &self.symbols.scope_members {
            self.scope_member_cache
                .insert(scope.clone(), members.keys().cloned().collect());
        }
    }

    /// Next unique temp variable name.
    pub(crate) fn fresh_temp(&mut self) -> String {
        let name = format!("cnx_tmp_{}", self.temp_counter);
        self.temp_counter += 1;
        name
    }

    /// Queue a declaration to be emitted at the next statement boundary.
    pub(crate) fn push_pending_temp(&mut self, decl: String) {
        self.pending_temp_declarations.push(decl);
    }

    /// Drain the pending-temp queue (called at each statement boundary).
    pub(crate) fn take_pending_temps(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_temp_declarations)
    }

    pub(crate) fn enter_scope(&mut self, name: &str) {
        if let Some(current) = self.current_scope.take() {
            self.scope_stack.push(current);
        }
        self.current_scope = Some(name.to_string());
    }

    pub(crate) fn leave_scope(&mut self) {
        self.current_scope = self.scope_stack.pop();
    }

    /// Members of the current scope, if any.
    pub(crate) fn current_scope_members(&self) -> Option<&HashSet<String>> {
        let scope = self.current_scope.as_deref()?;
        self.scope_member_cache.get(scope)
    }

    pub(crate) fn begin_function(&mut self, name: &str) {
        self.current_function_name = Some(name.to_string());
        self.current_parameters.clear();
        self.local_variables.clear();
        self.local_arrays.clear();
        self.float_shadow_current.clear();
    }

    pub(crate) fn end_function(&mut self) {
        self.current_function_name = None;
        self.current_parameters.clear();
        self.local_variables.clear();
        self.local_arrays.clear();
        self.float_shadow_current.clear();
    }

    /// Flag the headers a use of `type_name` requires.
    pub(crate) fn note_type_use(&mut self, type_name: &str) {
        match type_name {
            "u8" | "u16" | "u32" | "u64" | "i8" | "i16" | "i32" | "i64" => {
                self.needs_stdint = true;
            }
            "bool" => self.needs_stdbool = true,
            _ => {}
        }
    }

    /// Visibility of `member` inside `scope`, defaulting to public when the
    /// resolver did not record one.
    pub(crate) fn member_visibility(&self, scope: &str, member: &str) -> Visibility {
        self.symbols
            .member_visibility(scope, member)
            .unwrap_or(Visibility::Public)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> CodegenState {
        CodegenState::new(SymbolInfo::new(), Mode::C, TargetCapabilities::default())
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut cg = state();
        cg.needs_stdint = true;
        cg.used_clamp_ops.insert("add_u8".to_string());
        cg.temp_counter = 7;
        cg.type_registry.insert("x".to_string(), TypeInfo::scalar("u8"));
        cg.enter_scope("Motor");

        cg.reset(None);

        assert!(!cg.needs_stdint);
        assert!(cg.used_clamp_ops.is_empty());
        assert_eq!(cg.temp_counter, 0);
        assert!(cg.type_registry.is_empty());
        assert!(cg.current_scope.is_none());
    }

    #[test]
    fn test_scope_stack_nesting() {
        let mut cg = state();
        cg.enter_scope("Outer");
        cg.enter_scope("Inner");
        assert_eq!(cg.current_scope.as_deref(), Some("Inner"));
        cg.leave_scope();
        assert_eq!(cg.current_scope.as_deref(), Some("Outer"));
        cg.leave_scope();
        assert!(cg.current_scope.is_none());
    }

    #[test]
    fn test_fresh_temp_is_monotonic() {
        let mut cg = state();
        assert_eq!(cg.fresh_temp(), "cnx_tmp_0");
        assert_eq!(cg.fresh_temp(), "cnx_tmp_1");
    }

    #[test]
    fn test_pending_temps_drain_at_boundary() {
        let mut cg = state();
        cg.push_pending_temp("uint32_t cnx_tmp_0;".to_string());
        let drained = cg.take_pending_temps();
        assert_eq!(drained.len(), 1);
        assert!(cg.pending_temp_declarations.is_empty());
    }

    #[test]
    fn test_note_type_use_sets_flags() {
        let mut cg = state();
        cg.note_type_use("u8");
        cg.note_type_use("bool");
        cg.note_type_use("MyStruct");
        assert!(cg.needs_stdint);
        assert!(cg.needs_stdbool);
    }
}
