//! Array element and slice assignment handlers.

use crate::codegen::{AssignmentContext, CodegenState, Subscript};
use crate::diagnostics::{CodegenError, GenResult};
use crate::resolver::const_int_value;

impl CodegenState {
    /// `ARRAY_ELEMENT` / `MULTI_DIM_ARRAY_ELEMENT` / `THIS_ARRAY` /
    /// `GLOBAL_ARRAY` — bounds were checked during classification.
    pub(super) fn emit_array_element_assignment(
        &mut self,
        ctx: &AssignmentContext<'_>,
    ) -> GenResult<String> {
        let lhs_ty = ctx.element_type.clone();
        let rhs = self.checked_rhs(ctx, lhs_ty.as_deref())?;
        Ok(format!("{} {} {};", ctx.target_name, ctx.c_op, rhs))
    }

    /// `ARRAY_SLICE`: a compile-time-checked `memcpy` into the target run.
    pub(super) fn emit_array_slice_assignment(
        &mut self,
        ctx: &AssignmentContext<'_>,
    ) -> GenResult<String> {
        let Some(Subscript::Range { start, width, .. }) = ctx.subscripts.last() else {
            return Err(CodegenError::Internal(
                "slice assignment without a trailing range".to_string(),
            ));
        };
        // Bounds were validated at classification; the constants are known
        let offset = const_int_value(start).unwrap_or(0);
        let length = const_int_value(width).unwrap_or(0);
        self.needs_string = true;
        Ok(format!(
            "memcpy(&{}[{}], &{}, {});",
            ctx.target_name, offset, ctx.rhs, length
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AssignOp, AssignStmt, Expr};
    use crate::config::{Mode, TargetCapabilities};
    use crate::symbols::SymbolInfo;
    use crate::types::TypeInfo;

    fn state_with_array(name: &str, dims: Vec<u32>) -> CodegenState {
        let mut cg =
            CodegenState::new(SymbolInfo::new(), Mode::C, TargetCapabilities::default());
        let mut info = TypeInfo::scalar("u8");
        info.is_array = true;
        info.array_dimensions = dims;
        cg.type_registry.insert(name.to_string(), info);
        cg.local_arrays.insert(name.to_string());
        cg
    }

    fn run(cg: &mut CodegenState, stmt: &AssignStmt) -> GenResult<String> {
        let (kind, ctx) = cg.classify_assignment(stmt)?;
        cg.emit_assignment(kind, &ctx)
    }

    #[test]
    fn test_element_write() {
        let mut cg = state_with_array("buf", vec![4]);
        let stmt = AssignStmt {
            target: Expr::Index {
                base: Box::new(Expr::ident("buf")),
                index: Box::new(Expr::int("2")),
                line: 1,
            },
            op: AssignOp::Set,
            value: Expr::int("9"),
            line: 1,
        };
        assert_eq!(run(&mut cg, &stmt).unwrap(), "buf[2] = 9;");
    }

    #[test]
    fn test_constant_index_bounds_checked() {
        let mut cg = state_with_array("buf", vec![4]);
        let stmt = AssignStmt {
            target: Expr::Index {
                base: Box::new(Expr::ident("buf")),
                index: Box::new(Expr::int("4")),
                line: 1,
            },
            op: AssignOp::Set,
            value: Expr::int("9"),
            line: 1,
        };
        assert!(run(&mut cg, &stmt).is_err());
    }

    #[test]
    fn test_slice_emits_memcpy() {
        let mut cg = state_with_array("buf", vec![8]);
        let mut src = TypeInfo::scalar("u8");
        src.is_array = true;
        src.array_dimensions = vec![3];
        cg.type_registry.insert("src".to_string(), src);
        cg.local_arrays.insert("src".to_string());
        let stmt = AssignStmt {
            target: Expr::Range {
                base: Box::new(Expr::ident("buf")),
                start: Box::new(Expr::int("2")),
                width: Box::new(Expr::int("3")),
                line: 1,
            },
            op: AssignOp::Set,
            value: Expr::ident("src"),
            line: 1,
        };
        assert_eq!(run(&mut cg, &stmt).unwrap(), "memcpy(&buf[2], &src, 3);");
        assert!(cg.needs_string);
    }

    #[test]
    fn test_slice_overflow_rejected() {
        // Property 9(d): offset + length must stay within the dimension
        let mut cg = state_with_array("buf", vec![8]);
        let stmt = AssignStmt {
            target: Expr::Range {
                base: Box::new(Expr::ident("buf")),
                start: Box::new(Expr::int("6")),
                width: Box::new(Expr::int("4")),
                line: 1,
            },
            op: AssignOp::Set,
            value: Expr::ident("src"),
            line: 1,
        };
        assert!(run(&mut cg, &stmt).is_err());
    }

    #[test]
    fn test_multi_dim_slice_rejected() {
        let mut cg = state_with_array("grid", vec![4, 4]);
        let stmt = AssignStmt {
            target: Expr::Range {
                base: Box::new(Expr::ident("grid")),
                start: Box::new(Expr::int("0")),
                width: Box::new(Expr::int("2")),
                line: 1,
            },
            op: AssignOp::Set,
            value: Expr::ident("src"),
            line: 1,
        };
        assert!(run(&mut cg, &stmt).is_err());
    }
}
