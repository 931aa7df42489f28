//! Type, enum, scope, and sizeof resolution.
//!
//! Everything here is a pure query over the run state and symbol table; the
//! emitters in `codegen` call into these to decide what text to produce.

mod enums;
mod scopes;
mod sizeof_arg;
mod types;

pub use scopes::mangle_scoped;
pub use types::{
    c_primitive_name, const_int_value, is_float_type, is_integer_type, is_narrowing_conversion,
    is_numeric_type, is_sign_conversion, is_signed_type, is_unsigned_type, parse_integer_literal,
    peel_subscripts, type_bit_width, type_range, validate_literal_fits_type,
    validate_type_conversion,
};
