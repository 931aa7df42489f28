//! Register assignment handlers.
//!
//! Access modes drive the shape: `rw` members read-modify-write, the
//! write-only modes (`wo`/`w1s`/`w1c`) emit only the set-bits form and
//! reject clearing writes. Byte-aligned byte/half/word bit-range writes fuse
//! into a direct volatile pointer store (the MMIO peephole).

use crate::codegen::{AssignmentContext, CodegenState, Subscript, grouped, mask_one};
use crate::diagnostics::{CodegenError, ErrorCode, GenResult};
use crate::resolver::const_int_value;

impl CodegenState {
    /// `GLOBAL_REGISTER_BIT` / `SCOPED_REGISTER_BIT`.
    pub(super) fn emit_register_bit_assignment(
        &mut self,
        ctx: &AssignmentContext<'_>,
    ) -> GenResult<String> {
        let Some(register) = &ctx.register else {
            return Err(CodegenError::Internal(
                "register bit assignment without register info".to_string(),
            ));
        };
        let Some(Subscript::Index { expr, line, .. }) = ctx.subscripts.last() else {
            return Err(CodegenError::Internal(
                "register bit assignment without a trailing index".to_string(),
            ));
        };
        self.validate_shift_amount(ctx.target_width, expr, *line)?;
        let pos = self.emit_expression(expr)?;
        let t = &ctx.target_name;

        if register.access.is_write_only() {
            // Writing false to a set/clear register bit is meaningless and
            // almost certainly a bug
            if ctx.value.is_literal_false_or_zero() {
                return Err(CodegenError::rule(
                    ErrorCode::WriteOnlyViolation,
                    format!(
                        "cannot write 0 to write-only register bit '{}[{}]'",
                        t, pos
                    ),
                    ctx.line,
                ));
            }
            return Ok(format!("{} = (1 << {});", t, pos));
        }

        let value = self.bit_value_text(ctx);
        let one = mask_one(ctx.target_width);
        Ok(format!(
            "{t} = ({t} & ~({one} << {pos})) | ({value} << {pos});",
            t = t,
            one = one,
            pos = pos,
            value = value
        ))
    }

    /// `GLOBAL_REGISTER_BIT_RANGE` / `SCOPED_REGISTER_BIT_RANGE`.
    pub(super) fn emit_register_bit_range_assignment(
        &mut self,
        ctx: &AssignmentContext<'_>,
    ) -> GenResult<String> {
        let Some(register) = ctx.register.clone() else {
            return Err(CodegenError::Internal(
                "register range assignment without register info".to_string(),
            ));
        };
        let Some(Subscript::Range {
            start, width, line, ..
        }) = ctx.subscripts.last()
        else {
            return Err(CodegenError::Internal(
                "register range assignment without a trailing range".to_string(),
            ));
        };
        self.validate_shift_amount(ctx.target_width, start, *line)?;
        if register.access.is_write_only() && ctx.value.is_literal_false_or_zero() {
            return Err(CodegenError::rule(
                ErrorCode::WriteOnlyViolation,
                format!(
                    "cannot write 0 to write-only register range '{}'",
                    ctx.target_name
                ),
                ctx.line,
            ));
        }

        // MMIO peephole: byte-aligned byte/half/word writes become a direct
        // typed volatile store
        if let (Some(start_bits), Some(width_bits)) =
            (const_int_value(start), const_int_value(width))
        {
            if matches!(width_bits, 8 | 16 | 32) && start_bits % 8 == 0 {
                self.needs_stdint = true;
                let byte_offset = register.offset + (start_bits as u64) / 8;
                return Ok(format!(
                    "*((volatile uint{}_t*)(0x{:X} + 0x{:02X})) = ({});",
                    width_bits, register.base_address, byte_offset, ctx.rhs
                ));
            }
        }

        let mask = self.range_mask(width, ctx.target_width)?;
        let start_text = self.emit_expression(start)?;
        let t = &ctx.target_name;
        let v = grouped(&ctx.rhs);

        if register.access.is_write_only() {
            return Ok(format!(
                "{t} = ((({v}) & {mask}) << {start});",
                t = t,
                v = v,
                mask = mask,
                start = start_text
            ));
        }
        Ok(format!(
            "{t} = ({t} & ~({mask} << {start})) | ((({v}) & {mask}) << {start});",
            t = t,
            mask = mask,
            start = start_text,
            v = v
        ))
    }

    /// `REGISTER_MEMBER_BITMAP_FIELD` / `SCOPED_REGISTER_MEMBER_BITMAP_FIELD`.
    pub(super) fn emit_register_bitmap_field_assignment(
        &mut self,
        ctx: &AssignmentContext<'_>,
    ) -> GenResult<String> {
        let Some(register) = &ctx.register else {
            return Err(CodegenError::Internal(
                "register bitmap assignment without register info".to_string(),
            ));
        };
        let Some((offset, width)) = ctx.bit_field else {
            return Err(CodegenError::Internal(
                "register bitmap assignment without a resolved field".to_string(),
            ));
        };
        let t = &ctx.target_name;

        if register.access.is_write_only() {
            if ctx.value.is_literal_false_or_zero() {
                return Err(CodegenError::rule(
                    ErrorCode::WriteOnlyViolation,
                    format!("cannot write 0 to write-only register field '{}'", t),
                    ctx.line,
                ));
            }
            if width == 1 {
                return Ok(format!("{} = (1 << {});", t, offset));
            }
            let mask = crate::codegen::mask_literal(width);
            return Ok(format!(
                "{t} = ((({v}) & {mask}) << {offset});",
                t = t,
                v = grouped(&ctx.rhs),
                mask = mask,
                offset = offset
            ));
        }

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
        let mask = crate::codegen::mask_literal(width);
        Ok(format!(
            "{t} = ({t} & ~({mask} << {offset})) | ((({v}) & {mask}) << {offset});",
            t = t,
            mask = mask,
            offset = offset,
            v = grouped(&ctx.rhs)
        ))
    }
}
