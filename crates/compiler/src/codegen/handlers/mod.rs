//! The assignment handler registry.
//!
//! One handler per [`AssignmentKind`], dispatched through a single
//! exhaustive `match` so the compiler proves handler totality. Each handler
//! receives the prepared context and returns one terminated C statement
//! (string handlers append the terminator write as a second line). Handlers
//! may set need-flags, register helper usage, and queue pending temps; on
//! any rule failure they error before producing text.

mod arrays;
mod bits;
mod registers;
mod simple;
mod special;
mod strings;

use crate::codegen::{AssignmentContext, AssignmentKind, CodegenState};
use crate::diagnostics::GenResult;

impl CodegenState {
    /// Dispatch a classified assignment to its handler.
    pub fn emit_assignment(
        &mut self,
        kind: AssignmentKind,
        ctx: &AssignmentContext<'_>,
    ) -> GenResult<String> {
        match kind {
            AssignmentKind::Simple
            | AssignmentKind::GlobalMember
            | AssignmentKind::ThisMember => self.emit_simple_assignment(ctx),
            AssignmentKind::MemberChain => self.emit_member_chain_assignment(ctx),

            AssignmentKind::ArrayElement
            | AssignmentKind::MultiDimArrayElement
            | AssignmentKind::GlobalArray
            | AssignmentKind::ThisArray => self.emit_array_element_assignment(ctx),
            AssignmentKind::ArraySlice => self.emit_array_slice_assignment(ctx),

            AssignmentKind::IntegerBit
            | AssignmentKind::StructMemberBit
            | AssignmentKind::ArrayElementBit => self.emit_bit_assignment(ctx),
            AssignmentKind::IntegerBitRange | AssignmentKind::StructChainBitRange => {
                self.emit_bit_range_assignment(ctx)
            }
            AssignmentKind::BitmapFieldSingleBit
            | AssignmentKind::BitmapFieldMultiBit
            | AssignmentKind::BitmapArrayElementField
            | AssignmentKind::StructMemberBitmapField => self.emit_bitmap_field_assignment(ctx),

            AssignmentKind::GlobalRegisterBit | AssignmentKind::ScopedRegisterBit => {
                self.emit_register_bit_assignment(ctx)
            }
            AssignmentKind::GlobalRegisterBitRange | AssignmentKind::ScopedRegisterBitRange => {
                self.emit_register_bit_range_assignment(ctx)
            }
            AssignmentKind::RegisterMemberBitmapField
            | AssignmentKind::ScopedRegisterMemberBitmapField => {
                self.emit_register_bitmap_field_assignment(ctx)
            }

            AssignmentKind::StringSimple
            | AssignmentKind::StringThisMember
            | AssignmentKind::StringGlobal
            | AssignmentKind::StringStructField
            | AssignmentKind::StringArrayElement
            | AssignmentKind::StringStructArrayElement => self.emit_string_assignment(ctx),

            AssignmentKind::AtomicRmw => self.emit_atomic_rmw_assignment(ctx),
            AssignmentKind::OverflowClamp => self.emit_overflow_clamp_assignment(ctx),
        }
    }
}
