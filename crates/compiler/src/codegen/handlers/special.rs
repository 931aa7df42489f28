//! Atomic RMW and saturating-arithmetic handlers.

use crate::ast::AssignOp;
use crate::codegen::{AssignmentContext, CodegenState, grouped};
use crate::diagnostics::{CodegenError, GenResult};

impl CodegenState {
    /// `OVERFLOW_CLAMP`: compound add/sub/mul on a `clamp` integer calls
    /// the saturating helper and registers its definition for the prelude.
    pub(super) fn emit_overflow_clamp_assignment(
        &mut self,
        ctx: &AssignmentContext<'_>,
    ) -> GenResult<String> {
        let op = match ctx.op {
            AssignOp::Add => "add",
            AssignOp::Sub => "sub",
            AssignOp::Mul => "mul",
            other => {
                return Err(CodegenError::Internal(format!(
                    "clamp classification accepted operator {:?}",
                    other
                )));
            }
        };
        let Some(ty) = ctx.element_type.clone() else {
            return Err(CodegenError::Internal(
                "clamp assignment without a resolved type".to_string(),
            ));
        };
        self.used_clamp_ops.insert(format!("{}_{}", op, ty));
        self.note_type_use(&ty);
        let t = &ctx.target_name;
        Ok(format!("{t} = cnx_clamp_{op}_{ty}({t}, {rhs});", t = t, op = op, ty = ty, rhs = ctx.rhs))
    }

    /// `ATOMIC_RMW`: load-link/store-conditional retry loop on capable
    /// targets, `__atomic` builtins otherwise.
    pub(super) fn emit_atomic_rmw_assignment(
        &mut self,
        ctx: &AssignmentContext<'_>,
    ) -> GenResult<String> {
        let t = &ctx.target_name;
        let rhs = grouped(&ctx.rhs);

        if self.target.has_llsc_atomics && ctx.target_width <= 32 {
            self.needs_cmsis = true;
            let suffix = match ctx.target_width {
                8 => "B",
                16 => "H",
                _ => "W",
            };
            let tmp = self.fresh_temp();
            let c_ty = match ctx.target_width {
                8 => "uint8_t",
                16 => "uint16_t",
                _ => "uint32_t",
            };
            self.needs_stdint = true;
            self.push_pending_temp(format!("{} {};", c_ty, tmp));
            return Ok(format!(
                "do {{ {tmp} = __LDREX{s}(&{t}); {tmp} {op} {rhs}; }} \
                 while (__STREX{s}({tmp}, &{t}) != 0U);",
                tmp = tmp,
                s = suffix,
                t = t,
                op = ctx.c_op,
                rhs = rhs
            ));
        }

        let builtin = match ctx.op {
            AssignOp::Add => "__atomic_fetch_add",
            AssignOp::Sub => "__atomic_fetch_sub",
            AssignOp::BitAnd => "__atomic_fetch_and",
            AssignOp::BitOr => "__atomic_fetch_or",
            AssignOp::BitXor => "__atomic_fetch_xor",
            other => {
                return Err(CodegenError::Internal(format!(
                    "atomic classification accepted operator {:?}",
                    other
                )));
            }
        };
        Ok(format!(
            "(void){}(&{}, {}, __ATOMIC_SEQ_CST);",
            builtin, t, rhs
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AssignStmt, Expr, OverflowBehavior};
    use crate::config::{Mode, TargetCapabilities};
    use crate::symbols::SymbolInfo;
    use crate::types::TypeInfo;

    fn run(cg: &mut CodegenState, stmt: &AssignStmt) -> GenResult<String> {
        let (kind, ctx) = cg.classify_assignment(stmt)?;
        cg.emit_assignment(kind, &ctx)
    }

    fn clamp_state() -> CodegenState {
        let mut cg =
            CodegenState::new(SymbolInfo::new(), Mode::C, TargetCapabilities::default());
        let mut info = TypeInfo::scalar("u8");
        info.overflow = OverflowBehavior::Clamp;
        cg.type_registry.insert("c".to_string(), info);
        cg.local_variables.insert("c".to_string());
        cg
    }

    #[test]
    fn test_clamp_add_calls_helper() {
        // Scenario E: clamp u8 c; c +<- 200;
        let mut cg = clamp_state();
        let stmt = AssignStmt {
            target: Expr::ident("c"),
            op: AssignOp::Add,
            value: Expr::int("200"),
            line: 1,
        };
        let out = run(&mut cg, &stmt).unwrap();
        assert_eq!(out, "c = cnx_clamp_add_u8(c, 200);");
        assert!(cg.used_clamp_ops.contains("add_u8"));
    }

    #[test]
    fn test_clamp_sub_and_mul_register_usage() {
        let mut cg = clamp_state();
        let sub = AssignStmt {
            target: Expr::ident("c"),
            op: AssignOp::Sub,
            value: Expr::int("3"),
            line: 1,
        };
        let mul = AssignStmt {
            target: Expr::ident("c"),
            op: AssignOp::Mul,
            value: Expr::int("2"),
            line: 2,
        };
        run(&mut cg, &sub).unwrap();
        run(&mut cg, &mul).unwrap();
        assert!(cg.used_clamp_ops.contains("sub_u8"));
        assert!(cg.used_clamp_ops.contains("mul_u8"));
    }

    #[test]
    fn test_atomic_builtin_fallback() {
        let mut cg =
            CodegenState::new(SymbolInfo::new(), Mode::C, TargetCapabilities::default());
        let mut info = TypeInfo::scalar("u32");
        info.is_atomic = true;
        cg.type_registry.insert("counter".to_string(), info);
        cg.local_variables.insert("counter".to_string());
        let stmt = AssignStmt {
            target: Expr::ident("counter"),
            op: AssignOp::Add,
            value: Expr::int("5"),
            line: 1,
        };
        let out = run(&mut cg, &stmt).unwrap();
        assert_eq!(out, "(void)__atomic_fetch_add(&counter, 5, __ATOMIC_SEQ_CST);");
    }

    #[test]
    fn test_atomic_llsc_on_capable_target() {
        let target = TargetCapabilities {
            has_llsc_atomics: true,
            ..TargetCapabilities::default()
        };
        let mut cg = CodegenState::new(SymbolInfo::new(), Mode::C, target);
        let mut info = TypeInfo::scalar("u32");
        info.is_atomic = true;
        cg.type_registry.insert("counter".to_string(), info);
        cg.local_variables.insert("counter".to_string());
        let stmt = AssignStmt {
            target: Expr::ident("counter"),
            op: AssignOp::Add,
            value: Expr::int("5"),
            line: 1,
        };
        let out = run(&mut cg, &stmt).unwrap();
        assert!(out.contains("__LDREXW(&counter)"));
        assert!(out.contains("__STREXW(cnx_tmp_0, &counter)"));
        assert!(cg.needs_cmsis);
        assert_eq!(cg.pending_temp_declarations.len(), 1);
    }
}
