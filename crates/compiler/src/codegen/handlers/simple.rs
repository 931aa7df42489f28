//! Simple, member, and chain assignment handlers.

use crate::ast::Expr;
use crate::codegen::{AssignmentContext, CodegenState, grouped};
use crate::diagnostics::GenResult;
use crate::resolver::{is_integer_type, type_bit_width, validate_literal_fits_type,
    validate_type_conversion};

impl CodegenState {
    /// `x <op> rhs;` — the fallback shape, also used for `this.`/`global.`
    /// members and whole register-member writes.
    pub(super) fn emit_simple_assignment(
        &mut self,
        ctx: &AssignmentContext<'_>,
    ) -> GenResult<String> {
        let lhs_ty = ctx.element_type.clone();
        let rhs = self.checked_rhs(ctx, lhs_ty.as_deref())?;
        Ok(format!("{} {} {};", ctx.target_name, ctx.c_op, rhs))
    }

    /// `a.b.c <op> rhs;` — the classifier already rerouted bit and range
    /// endings, so only the plain chain reaches this handler.
    pub(super) fn emit_member_chain_assignment(
        &mut self,
        ctx: &AssignmentContext<'_>,
    ) -> GenResult<String> {
        let lhs_ty = ctx.element_type.clone();
        let rhs = self.checked_rhs(ctx, lhs_ty.as_deref())?;
        Ok(format!("{} {} {};", ctx.target_name, ctx.c_op, rhs))
    }

    /// Validate the RHS against the target type and insert a narrowing cast
    /// where C's integer promotion would widen the arithmetic.
    pub(super) fn checked_rhs(
        &mut self,
        ctx: &AssignmentContext<'_>,
        lhs_ty: Option<&str>,
    ) -> GenResult<String> {
        let Some(lhs_ty) = lhs_ty else {
            return Ok(ctx.rhs.clone());
        };

        // Callback targets: structural + nominal signature checking
        if let Some(expected) = self.symbols.callbacks.get(lhs_ty).cloned() {
            if let Some(func_name) = ctx.value.as_identifier() {
                self.validate_callback_assignment(&expected, func_name, ctx.line)?;
                if expected.is_isr() {
                    self.needs_isr = true;
                }
                return Ok(ctx.rhs.clone());
            }
        }

        if let Expr::IntLiteral { text, .. } = ctx.value {
            validate_literal_fits_type(text, lhs_ty, ctx.line)?;
        }
        let rhs_ty = self.expression_type(ctx.value);
        validate_type_conversion(lhs_ty, rhs_ty.as_deref(), ctx.line)?;

        // u8/u16 arithmetic promotes to int in C; cast the result back down
        let promoted_arithmetic = matches!(ctx.value, Expr::Binary { op, .. } if op.is_arithmetic());
        if promoted_arithmetic
            && is_integer_type(lhs_ty)
            && type_bit_width(lhs_ty).is_some_and(|w| w < 32)
        {
            let c_ty = self.c_type_text(lhs_ty);
            return Ok(format!("({}){}", c_ty, grouped(&ctx.rhs)));
        }
        Ok(ctx.rhs.clone())
    }
}
