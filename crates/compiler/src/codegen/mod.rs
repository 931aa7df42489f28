//! C code generation.
//!
//! The generator walks the AST exactly once, in source order. Statements call
//! into the expression emitter; assignments additionally run through the
//! classifier and the handler registry. Need-flags collected on
//! [`CodegenState`] during the walk drive the include/helper prelude that
//! `includes.rs` prepends afterwards.
//!
//! # Module structure
//!
//! - `state.rs`: the per-run mutable state (`CodegenState`)
//! - `assignment.rs`: `AssignmentKind`, `AssignmentContext`, the classifier
//! - `handlers/`: one emitter per assignment shape, dispatched by kind
//! - `expressions.rs`: expression emission mirroring the grammar layers
//! - `statements.rs`: declarations, functions, scopes, control flow
//! - `includes.rs`: prelude assembly from need-flags and helper usage

mod assignment;
mod expressions;
mod handlers;
mod includes;
mod state;
mod statements;

pub use assignment::{AssignmentContext, AssignmentKind, Subscript};
pub use state::CodegenState;

/// The `1` used in single-bit masks: `1U` below 64 bits, `1ULL` at 64.
pub(crate) fn mask_one(width: u32) -> &'static str {
    if width == 64 { "1ULL" } else { "1U" }
}

/// Precomputed hex mask for a `width`-bit field: the literal for
/// `(1 << width) - 1`, suffixed `U` up to 32 bits and `ULL` above.
pub(crate) fn mask_literal(width: u32) -> String {
    let value: u128 = if width >= 64 {
        u64::MAX as u128
    } else {
        (1u128 << width) - 1
    };
    let suffix = if width <= 32 { "U" } else { "ULL" };
    format!("0x{:X}{}", value, suffix)
}

/// Wrap an emitted expression in parentheses unless it is a single token.
pub(crate) fn grouped(text: &str) -> String {
    let single_token = !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.');
    if single_token || (text.starts_with('(') && text.ends_with(')')) {
        text.to_string()
    } else {
        format!("({})", text)
    }
}

impl CodegenState {
    /// The C spelling of a type token, flagging needed headers and the
    /// `struct ` qualifier for externally declared structs.
    pub(crate) fn c_type_text(&mut self, type_name: &str) -> String {
        if let Some(c_name) = crate::resolver::c_primitive_name(type_name) {
            self.note_type_use(type_name);
            return c_name.to_string();
        }
        if let Some(bitmap) = self.symbols.bitmaps.get(type_name) {
            // Bitmap typedefs alias their backing integer
            let backing = bitmap.backing_type.clone();
            self.note_type_use(&backing);
            return type_name.to_string();
        }
        if self.symbols.is_struct_type(type_name)
            || self.symbols.is_enum_type(type_name)
            || self.symbols.callbacks.contains_key(type_name)
        {
            return type_name.to_string();
        }
        // Unknown to the symbol table: an externally declared struct
        self.needs_struct_keyword.insert(type_name.to_string());
        format!("struct {}", type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_one_suffix_by_width() {
        assert_eq!(mask_one(8), "1U");
        assert_eq!(mask_one(32), "1U");
        assert_eq!(mask_one(64), "1ULL");
    }

    #[test]
    fn test_mask_literal_precomputation() {
        // Property 8: hex literal for (1<<w)-1, U up to 32 bits, ULL above
        assert_eq!(mask_literal(1), "0x1U");
        assert_eq!(mask_literal(8), "0xFFU");
        assert_eq!(mask_literal(16), "0xFFFFU");
        assert_eq!(mask_literal(32), "0xFFFFFFFFU");
        assert_eq!(mask_literal(33), "0x1FFFFFFFFULL");
        assert_eq!(mask_literal(64), "0xFFFFFFFFFFFFFFFFULL");
    }

    #[test]
    fn test_grouped_leaves_tokens_alone() {
        assert_eq!(grouped("x"), "x");
        assert_eq!(grouped("42"), "42");
        assert_eq!(grouped("(a + b)"), "(a + b)");
        assert_eq!(grouped("a + b"), "(a + b)");
    }
}
