//! `sizeof` resolution.
//!
//! The grammar cannot tell `sizeof(Type)` from `sizeof(variable)` for bare
//! names. Resolution checks the current function's locals, parameters,
//! globals, and the known type sets in that order; when a name is both a
//! type and a variable in scope, the variable wins and a diagnostic is
//! recorded.

use crate::ast::{Expr, SizeofArg};
use crate::codegen::CodegenState;
use crate::diagnostics::{CodegenError, Diagnostic, ErrorCode, GenResult};
use crate::resolver::c_primitive_name;

impl CodegenState {
    /// Emit a `sizeof` expression, applying the special-case rules.
    pub fn emit_sizeof(&mut self, arg: &SizeofArg, line: usize) -> GenResult<String> {
        match arg {
            SizeofArg::Type(name) => {
                if self.name_is_value_in_scope(name) {
                    if self.name_is_known_type(name) {
                        self.warnings.push(
                            Diagnostic::warning(
                                ErrorCode::SizeofAmbiguity,
                                format!(
                                    "'{}' names both a type and a variable here; \
                                     sizeof resolves to the variable",
                                    name
                                ),
                            )
                            .with_line(line),
                        );
                    }
                    return self.emit_sizeof_value(&Expr::ident(name), line);
                }
                self.emit_sizeof_type(name)
            }
            SizeofArg::Value(expr) => self.emit_sizeof_value(expr, line),
        }
    }

    fn emit_sizeof_type(&mut self, name: &str) -> GenResult<String> {
        if let Some(c_name) = c_primitive_name(name) {
            self.note_type_use(name);
            return Ok(format!("sizeof({})", c_name));
        }
        if self.needs_struct_keyword.contains(name) {
            return Ok(format!("sizeof(struct {})", name));
        }
        Ok(format!("sizeof({})", name))
    }

    fn emit_sizeof_value(&mut self, expr: &Expr, line: usize) -> GenResult<String> {
        if expr.contains_call() {
            return Err(CodegenError::rule(
                ErrorCode::SideEffectInSizeof,
                "expression with side effects inside sizeof".to_string(),
                line,
            ));
        }
        if let Some(name) = expr.as_identifier() {
            if let Some(param) = self.current_parameters.get(name) {
                if param.is_array {
                    return Err(CodegenError::rule(
                        ErrorCode::SizeofArrayParameter,
                        format!(
                            "sizeof on array parameter '{}' would return the pointer size",
                            name
                        ),
                        line,
                    ));
                }
                // Pass-by-reference parameters measure the pointee
                if param.by_ref {
                    return Ok(format!("sizeof(*{})", name));
                }
            }
        }
        let text = self.emit_expression(expr)?;
        Ok(format!("sizeof({})", text))
    }

    fn name_is_value_in_scope(&self, name: &str) -> bool {
        self.current_parameters.contains_key(name)
            || self.local_variables.contains(name)
            || self.local_arrays.contains(name)
            || self.type_registry.contains_key(name)
            || self.symbols.globals.contains(name)
    }

    fn name_is_known_type(&self, name: &str) -> bool {
        c_primitive_name(name).is_some()
            || self.symbols.is_struct_type(name)
            || self.symbols.is_enum_type(name)
            || self.symbols.is_bitmap_type(name)
            || self.symbols.callbacks.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Mode, TargetCapabilities};
    use crate::symbols::SymbolInfo;
    use crate::types::{ParameterInfo, TypeInfo};

    fn state() -> CodegenState {
        CodegenState::new(SymbolInfo::new(), Mode::C, TargetCapabilities::default())
    }

    #[test]
    fn test_sizeof_primitive_type() {
        let mut cg = state();
        let out = cg
            .emit_sizeof(&SizeofArg::Type("u32".to_string()), 1)
            .unwrap();
        assert_eq!(out, "sizeof(uint32_t)");
        assert!(cg.needs_stdint);
    }

    #[test]
    fn test_sizeof_array_parameter_rejected() {
        let mut cg = state();
        cg.current_parameters.insert(
            "buf".to_string(),
            ParameterInfo {
                base_type: "u8".to_string(),
                is_array: true,
                ..ParameterInfo::default()
            },
        );
        let err = cg
            .emit_sizeof(&SizeofArg::Value(Expr::ident("buf")), 4)
            .unwrap_err();
        match err {
            CodegenError::Rule(d) => assert_eq!(d.code, ErrorCode::SizeofArrayParameter),
            other => panic!("expected rule error, got {:?}", other),
        }
    }

    #[test]
    fn test_sizeof_by_ref_param_dereferences() {
        let mut cg = state();
        cg.current_parameters.insert(
            "cfg".to_string(),
            ParameterInfo {
                base_type: "Config".to_string(),
                is_struct: true,
                by_ref: true,
                ..ParameterInfo::default()
            },
        );
        let out = cg
            .emit_sizeof(&SizeofArg::Value(Expr::ident("cfg")), 1)
            .unwrap();
        assert_eq!(out, "sizeof(*cfg)");
    }

    #[test]
    fn test_sizeof_with_call_rejected() {
        let mut cg = state();
        let call = Expr::Call {
            callee: Box::new(Expr::ident("f")),
            args: vec![],
            line: 2,
        };
        let err = cg.emit_sizeof(&SizeofArg::Value(call), 2).unwrap_err();
        match err {
            CodegenError::Rule(d) => assert_eq!(d.code, ErrorCode::SideEffectInSizeof),
            other => panic!("expected rule error, got {:?}", other),
        }
    }

    #[test]
    fn test_type_variable_ambiguity_prefers_variable() {
        let mut cg = state();
        // "u8" used as a variable name, shadowing the type
        cg.local_variables.insert("u8".to_string());
        cg.type_registry
            .insert("u8".to_string(), TypeInfo::scalar("u16"));
        let out = cg.emit_sizeof(&SizeofArg::Type("u8".to_string()), 3).unwrap();
        assert_eq!(out, "sizeof(u8)");
        assert_eq!(cg.warnings.len(), 1);
        assert_eq!(cg.warnings[0].code, ErrorCode::SizeofAmbiguity);
    }
}
