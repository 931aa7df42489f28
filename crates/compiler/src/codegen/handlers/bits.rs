//! Bit, bit-range, and bitmap-field assignment handlers, plus the float
//! bit-write path.
//!
//! Read-modify-write shapes:
//! - single bit: `T = (T & ~(1U << pos)) | ((value) << pos);`
//! - bit range:  `T = (T & ~(mask << pos)) | (((v) & mask) << pos);`
//!
//! where the mask for a compile-time width is the precomputed hex literal
//! for `(1 << w) - 1` and the `1` is `1ULL` on 64-bit targets.

use crate::ast::{AssignStmt, Expr};
use crate::codegen::{AssignmentContext, CodegenState, Subscript, grouped, mask_literal, mask_one};
use crate::config::Mode;
use crate::diagnostics::{CodegenError, GenResult};
use crate::resolver::{const_int_value, is_float_type};

impl CodegenState {
    /// Single-bit RMW: `INTEGER_BIT`, `STRUCT_MEMBER_BIT`, `ARRAY_ELEMENT_BIT`.
    pub(super) fn emit_bit_assignment(&mut self, ctx: &AssignmentContext<'_>) -> GenResult<String> {
        let Some(Subscript::Index { expr, line, .. }) = ctx.subscripts.last() else {
            return Err(CodegenError::Internal(
                "bit assignment without a trailing index".to_string(),
            ));
        };
        self.validate_shift_amount(ctx.target_width, expr, *line)?;
        let pos = self.emit_expression(expr)?;
        let value = self.bit_value_text(ctx);
        let t = &ctx.target_name;
        let one = mask_one(ctx.target_width);
        Ok(format!(
            "{t} = ({t} & ~({one} << {pos})) | ({value} << {pos});",
            t = t,
            one = one,
            pos = pos,
            value = value
        ))
    }

    /// Bit-range RMW: `INTEGER_BIT_RANGE`, `STRUCT_CHAIN_BIT_RANGE`.
    pub(super) fn emit_bit_range_assignment(
        &mut self,
        ctx: &AssignmentContext<'_>,
    ) -> GenResult<String> {
        let Some(Subscript::Range {
            start, width, line, ..
        }) = ctx.subscripts.last()
        else {
            return Err(CodegenError::Internal(
                "range assignment without a trailing range".to_string(),
            ));
        };
        self.validate_shift_amount(ctx.target_width, start, *line)?;
        let mask = self.range_mask(width, ctx.target_width)?;
        let start_text = self.emit_expression(start)?;
        let t = &ctx.target_name;
        let v = grouped(&ctx.rhs);
        Ok(format!(
            "{t} = ({t} & ~({mask} << {start})) | ((({v}) & {mask}) << {start});",
            t = t,
            mask = mask,
            start = start_text,
            v = v
        ))
    }

    /// Bitmap-field RMW: the field's offset/width come from the symbol
    /// table; single-bit fields use the mask-one form.
    pub(super) fn emit_bitmap_field_assignment(
        &mut self,
        ctx: &AssignmentContext<'_>,
    ) -> GenResult<String> {
        let Some((offset, width)) = ctx.bit_field else {
            return Err(CodegenError::Internal(
                "bitmap assignment without a resolved field".to_string(),
            ));
        };
        let t = &ctx.target_name;
        if width == 1 {
            let one = mask_one(ctx.target_width);
            let value = self.bit_value_text(ctx);
            return Ok(format!(
                "{t} = ({t} & ~({one} << {offset})) | ({value} << {offset});",
                t = t,
                one = one,
                offset = offset,
                value = value
            ));
        }
        let mask = mask_literal(width);
        let v = grouped(&ctx.rhs);
        Ok(format!(
            "{t} = ({t} & ~({mask} << {offset})) | ((({v}) & {mask}) << {offset});",
            t = t,
            mask = mask,
            offset = offset,
            v = v
        ))
    }

    /// The value half of a single-bit write: boolean literals fold to
    /// integer constants, everything else is masked to one bit.
    pub(super) fn bit_value_text(&self, ctx: &AssignmentContext<'_>) -> String {
        let one = mask_one(ctx.target_width);
        if ctx.value.is_literal_true() {
            return format!("({})", one);
        }
        if ctx.value.is_literal_false_or_zero() {
            return if ctx.target_width == 64 {
                "(0ULL)".to_string()
            } else {
                "(0U)".to_string()
            };
        }
        format!("(({}) & {})", ctx.rhs, one)
    }

    /// The mask for a range write: precomputed hex for a constant width,
    /// computed at runtime otherwise.
    pub(super) fn range_mask(&mut self, width: &Expr, total_width: u32) -> GenResult<String> {
        match const_int_value(width) {
            Some(w) if (1..=64).contains(&w) => Ok(mask_literal(w as u32)),
            _ => {
                let w = self.emit_expression(width)?;
                let one = mask_one(total_width);
                Ok(format!("(({} << {}) - {})", one, grouped(&w), one))
            }
        }
    }

    // =========================================================================
    // Float bit writes
    // =========================================================================

    /// Intercept assignments whose target is a bit or bit-range of a float.
    /// Returns `None` when the target is not float-typed.
    pub fn try_emit_float_bit_assignment(
        &mut self,
        stmt: &AssignStmt,
    ) -> GenResult<Option<String>> {
        let (base, pos_parts): (&Expr, FloatBitPos<'_>) = match &stmt.target {
            Expr::Index { base, index, .. } => (base, FloatBitPos::Bit(index)),
            Expr::Range {
                base, start, width, ..
            } => (base, FloatBitPos::Range(start, width)),
            _ => return Ok(None),
        };
        let Some(base_ty) = self.expression_type(base) else {
            return Ok(None);
        };
        if !is_float_type(&base_ty) {
            return Ok(None);
        }

        let (c_float, c_int, total) = if base_ty == "f64" {
            self.needs_double_assert = true;
            ("double", "uint64_t", 64u32)
        } else {
            self.needs_float_assert = true;
            ("float", "uint32_t", 32u32)
        };
        self.needs_stdint = true;

        let target = self.emit_expression(base)?;
        let rhs = self.emit_expression(&stmt.value)?;
        let one = mask_one(total);
        let update = match pos_parts {
            FloatBitPos::Bit(index) => {
                self.validate_shift_amount(total, index, stmt.line)?;
                let pos = self.emit_expression(index)?;
                let value = if stmt.value.is_literal_true() {
                    format!("({})", one)
                } else if stmt.value.is_literal_false_or_zero() {
                    if total == 64 { "(0ULL)".to_string() } else { "(0U)".to_string() }
                } else {
                    format!("(({}) & {})", rhs, one)
                };
                (pos, one.to_string(), value)
            }
            FloatBitPos::Range(start, width) => {
                self.validate_shift_amount(total, start, stmt.line)?;
                let mask = self.range_mask(width, total)?;
                let pos = self.emit_expression(start)?;
                let value = format!("(({}) & {})", grouped(&rhs), mask);
                (pos, mask, value)
            }
        };
        let (pos, mask, value) = update;

        let shadow = self.fresh_temp();
        self.float_bit_shadows.insert(shadow.clone());
        self.float_shadow_current.insert(shadow.clone());

        let text = match self.mode {
            Mode::C => format!(
                "{{ union {{ {cf} f; {ci} u; }} {s}; {s}.f = {t}; \
                 {s}.u = ({s}.u & ~({mask} << {pos})) | ({value} << {pos}); \
                 {t} = {s}.f; }}",
                cf = c_float,
                ci = c_int,
                s = shadow,
                t = target,
                mask = mask,
                pos = pos,
                value = value
            ),
            Mode::Cpp => {
                self.needs_string = true;
                self.push_pending_temp(format!(
                    "{ci} {s}; memcpy(&{s}, &{t}, sizeof {s});",
                    ci = c_int,
                    s = shadow,
                    t = target
                ));
                format!(
                    "{s} = ({s} & ~({mask} << {pos})) | ({value} << {pos}); \
                     memcpy(&{t}, &{s}, sizeof {s});",
                    s = shadow,
                    t = target,
                    mask = mask,
                    pos = pos,
                    value = value
                )
            }
        };
        Ok(Some(text))
    }
}

enum FloatBitPos<'a> {
    Bit(&'a Expr),
    Range(&'a Expr, &'a Expr),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AssignOp;
    use crate::config::TargetCapabilities;
    use crate::symbols::SymbolInfo;
    use crate::types::TypeInfo;

    fn state() -> CodegenState {
        CodegenState::new(SymbolInfo::new(), Mode::C, TargetCapabilities::default())
    }

    fn run(cg: &mut CodegenState, stmt: &AssignStmt) -> String {
        let (kind, ctx) = cg.classify_assignment(stmt).unwrap();
        cg.emit_assignment(kind, &ctx).unwrap()
    }

    fn bit_write(target: &str, bit: &str, value: Expr) -> AssignStmt {
        AssignStmt {
            target: Expr::Index {
                base: Box::new(Expr::ident(target)),
                index: Box::new(Expr::int(bit)),
                line: 1,
            },
            op: AssignOp::Set,
            value,
            line: 1,
        }
    }

    #[test]
    fn test_single_bit_rmw_shape() {
        // Scenario B: flags[3] <- true
        let mut cg = state();
        cg.type_registry
            .insert("flags".to_string(), TypeInfo::scalar("u8"));
        cg.local_variables.insert("flags".to_string());
        let out = run(&mut cg, &bit_write("flags", "3", Expr::BoolLiteral(true)));
        assert_eq!(out, "flags = (flags & ~(1U << 3)) | ((1U) << 3);");
    }

    #[test]
    fn test_single_bit_clear() {
        let mut cg = state();
        cg.type_registry
            .insert("flags".to_string(), TypeInfo::scalar("u8"));
        cg.local_variables.insert("flags".to_string());
        let out = run(&mut cg, &bit_write("flags", "3", Expr::BoolLiteral(false)));
        assert_eq!(out, "flags = (flags & ~(1U << 3)) | ((0U) << 3);");
    }

    #[test]
    fn test_64_bit_target_uses_ull() {
        // Property 3: ULL suffix iff the target width is 64
        let mut cg = state();
        cg.type_registry
            .insert("wide".to_string(), TypeInfo::scalar("u64"));
        cg.local_variables.insert("wide".to_string());
        let out = run(&mut cg, &bit_write("wide", "40", Expr::BoolLiteral(true)));
        assert!(out.contains("& ~(1ULL << 40)"));
        assert!(out.contains("((1ULL) << 40)"));
        assert!(!out.contains("1U <<"));
    }

    #[test]
    fn test_dynamic_bit_value_masked() {
        let mut cg = state();
        cg.type_registry
            .insert("flags".to_string(), TypeInfo::scalar("u8"));
        cg.type_registry
            .insert("b".to_string(), TypeInfo::scalar("bool"));
        cg.local_variables.insert("flags".to_string());
        cg.local_variables.insert("b".to_string());
        let out = run(&mut cg, &bit_write("flags", "2", Expr::ident("b")));
        assert_eq!(out, "flags = (flags & ~(1U << 2)) | (((b) & 1U) << 2);");
    }

    #[test]
    fn test_bit_range_precomputed_mask() {
        let mut cg = state();
        cg.type_registry
            .insert("x".to_string(), TypeInfo::scalar("u32"));
        cg.local_variables.insert("x".to_string());
        let stmt = AssignStmt {
            target: Expr::Range {
                base: Box::new(Expr::ident("x")),
                start: Box::new(Expr::int("8")),
                width: Box::new(Expr::int("8")),
                line: 1,
            },
            op: AssignOp::Set,
            value: Expr::int("0xAB"),
            line: 1,
        };
        let out = run(&mut cg, &stmt);
        assert_eq!(out, "x = (x & ~(0xFFU << 8)) | (((0xAB) & 0xFFU) << 8);");
    }

    #[test]
    fn test_bit_position_out_of_range() {
        let mut cg = state();
        cg.type_registry
            .insert("flags".to_string(), TypeInfo::scalar("u8"));
        cg.local_variables.insert("flags".to_string());
        let stmt = bit_write("flags", "9", Expr::BoolLiteral(true));
        let (kind, ctx) = cg.classify_assignment(&stmt).unwrap();
        assert!(cg.emit_assignment(kind, &ctx).is_err());
    }

    #[test]
    fn test_float_bit_write_c_mode() {
        let mut cg = state();
        cg.type_registry
            .insert("temp".to_string(), TypeInfo::scalar("f32"));
        cg.local_variables.insert("temp".to_string());
        let stmt = bit_write("temp", "31", Expr::BoolLiteral(true));
        let out = cg.try_emit_float_bit_assignment(&stmt).unwrap().unwrap();
        assert!(out.contains("union { float f; uint32_t u; }"));
        assert!(out.contains("cnx_tmp_0.f = temp"));
        assert!(out.contains("temp = cnx_tmp_0.f"));
        assert!(cg.needs_float_assert);
    }

    #[test]
    fn test_float_bit_write_cpp_mode() {
        let mut cg = CodegenState::new(
            SymbolInfo::new(),
            Mode::Cpp,
            TargetCapabilities::default(),
        );
        cg.type_registry
            .insert("temp".to_string(), TypeInfo::scalar("f32"));
        cg.local_variables.insert("temp".to_string());
        let stmt = bit_write("temp", "0", Expr::BoolLiteral(true));
        let out = cg.try_emit_float_bit_assignment(&stmt).unwrap().unwrap();
        assert!(out.contains("memcpy(&temp, &cnx_tmp_0"));
        assert_eq!(cg.pending_temp_declarations.len(), 1);
    }

    #[test]
    fn test_non_float_target_passes_through() {
        let mut cg = state();
        cg.type_registry
            .insert("flags".to_string(), TypeInfo::scalar("u8"));
        cg.local_variables.insert("flags".to_string());
        let stmt = bit_write("flags", "1", Expr::BoolLiteral(true));
        assert!(cg.try_emit_float_bit_assignment(&stmt).unwrap().is_none());
    }
}
