//! Declared-name type records tracked by the code generator.

use serde::{Deserialize, Serialize};

use crate::ast::{OverflowBehavior, ParamDecl, VarDecl};
use crate::resolver::type_bit_width;
use crate::symbols::{SymbolInfo, base_type_token, string_capacity_of};

/// Everything the generator knows about one declared name.
///
/// For numeric base types `bit_width` equals the type's defined width. For
/// `string`, `string_capacity` is the user-visible capacity; the emitted
/// storage length is `string_capacity + 1` for the terminator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub base_type: String,
    pub bit_width: u32,
    pub is_array: bool,
    pub array_dimensions: Vec<u32>,
    pub is_string: bool,
    pub string_capacity: u32,
    pub is_const: bool,
    pub is_atomic: bool,
    pub overflow: OverflowBehavior,
    pub is_enum: bool,
    pub enum_type_name: Option<String>,
    pub bitmap_type_name: Option<String>,
}

impl TypeInfo {
    /// A plain scalar of the given base type.
    pub fn scalar(base_type: &str) -> Self {
        TypeInfo {
            base_type: base_type.to_string(),
            bit_width: type_bit_width(base_type).unwrap_or(0),
            ..TypeInfo::default()
        }
    }

    /// Build the record for a declaration, resolving enum/bitmap/string
    /// typing against the symbol table.
    pub fn from_decl(decl: &VarDecl, symbols: &SymbolInfo) -> Self {
        let base = base_type_token(&decl.type_name);
        let mut info = TypeInfo {
            base_type: base.to_string(),
            bit_width: type_bit_width(base).unwrap_or(0),
            is_array: !decl.array_dims.is_empty(),
            array_dimensions: decl.array_dims.clone(),
            is_const: decl.is_const,
            is_atomic: decl.is_atomic,
            overflow: decl.overflow,
            ..TypeInfo::default()
        };
        if base == "string" {
            info.is_string = true;
            info.string_capacity = decl
                .string_capacity
                .or_else(|| string_capacity_of(&decl.type_name))
                .unwrap_or(0);
        }
        if symbols.is_enum_type(base) {
            info.is_enum = true;
            info.enum_type_name = Some(base.to_string());
        }
        if let Some(bitmap) = symbols.bitmaps.get(base) {
            info.bitmap_type_name = Some(base.to_string());
            info.bit_width = bitmap.bit_width;
        }
        info
    }
}

/// Per-parameter flags tracked for the duration of one function body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub base_type: String,
    pub is_const: bool,
    pub is_array: bool,
    pub is_struct: bool,
    pub is_callback: bool,
    pub is_string: bool,
    pub by_ref: bool,
    pub string_capacity: u32,
}

impl ParameterInfo {
    pub fn from_decl(decl: &ParamDecl, symbols: &SymbolInfo) -> Self {
        let base = base_type_token(&decl.type_name);
        ParameterInfo {
            base_type: base.to_string(),
            is_const: decl.is_const,
            is_array: decl.is_array(),
            is_struct: symbols.is_struct_type(base),
            is_callback: symbols.callbacks.contains_key(base),
            is_string: base == "string",
            by_ref: decl.by_ref,
            string_capacity: decl
                .string_capacity
                .or_else(|| string_capacity_of(&decl.type_name))
                .unwrap_or(0),
        }
    }
}
