//! The resolved symbol table consumed by the backend.
//!
//! `SymbolInfo` is produced by the symbol resolver (an external collaborator)
//! and is read-only for the whole generation run. Everything here is keyed by
//! name; cross-references between types are name lookups, never pointers.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::ast::Visibility;

/// Hardware access mode of a register member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Rw,
    Ro,
    Wo,
    /// Write-1-to-set
    W1s,
    /// Write-1-to-clear
    W1c,
}

impl AccessMode {
    /// Write-only modes never read back, so partial writes must not RMW.
    pub fn is_write_only(self) -> bool {
        matches!(self, AccessMode::Wo | AccessMode::W1s | AccessMode::W1c)
    }

    pub fn is_read_only(self) -> bool {
        self == AccessMode::Ro
    }
}

/// Layout of one bitmap type: backing integer plus named fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BitmapInfo {
    /// Backing integer type token (`u8`..`u64`)
    pub backing_type: String,
    /// Total width in bits
    pub bit_width: u32,
    /// field name -> (bit offset, bit width)
    pub fields: HashMap<String, (u32, u32)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterMemberInfo {
    pub offset: u64,
    pub access: AccessMode,
    /// C type token of the member (`u8`..`u64` or a bitmap type name)
    pub type_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterInfo {
    pub base_address: u64,
    pub members: HashMap<String, RegisterMemberInfo>,
}

/// One parameter in a callback or function signature, as much as signature
/// matching needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureParam {
    pub type_name: String,
    pub is_const: bool,
    pub is_pointer: bool,
    pub is_array: bool,
}

/// The structural signature of a callback typedef or a declared function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackSignature {
    pub return_type: String,
    pub params: Vec<SignatureParam>,
}

impl CallbackSignature {
    /// An interrupt-handler shape: `void(void)`.
    pub fn is_isr(&self) -> bool {
        self.return_type == "void" && self.params.is_empty()
    }
}

/// Declared enum variants in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumInfo {
    pub variants: Vec<(String, i64)>,
}

impl EnumInfo {
    pub fn contains(&self, variant: &str) -> bool {
        self.variants.iter().any(|(name, _)| name == variant)
    }

    pub fn value_of(&self, variant: &str) -> Option<i64> {
        self.variants
            .iter()
            .find(|(name, _)| name == variant)
            .map(|(_, value)| *value)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

/// Read-only view of the symbol universe for one translation unit.
///
/// Scoped declarations are stored under their mangled names (`Scope_name`),
/// matching what the emitter writes into the output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub scopes: HashSet<String>,
    /// scope -> member -> visibility
    pub scope_members: HashMap<String, HashMap<String, Visibility>>,
    /// struct -> field -> full type token (`u16`, `string<32>`, ...)
    pub struct_fields: HashMap<String, HashMap<String, String>>,
    /// struct -> array field -> dimensions
    pub struct_array_fields: HashMap<String, HashMap<String, Vec<u32>>>,
    pub enums: HashMap<String, EnumInfo>,
    pub bitmaps: HashMap<String, BitmapInfo>,
    pub registers: HashMap<String, RegisterInfo>,
    pub callbacks: HashMap<String, CallbackSignature>,
    pub functions: HashMap<String, CallbackSignature>,
    /// File-scope variable names
    pub globals: HashSet<String>,
    /// scoped member -> the single function that writes it, when the
    /// resolver proved there is exactly one
    pub member_single_function: HashMap<String, String>,
}

impl SymbolInfo {
    pub fn new() -> Self {
        SymbolInfo::default()
    }

    /// A name is a struct type iff at least one field is known under it.
    pub fn is_struct_type(&self, name: &str) -> bool {
        self.struct_fields
            .get(name)
            .is_some_and(|fields| !fields.is_empty())
    }

    pub fn is_scope(&self, name: &str) -> bool {
        self.scopes.contains(name)
    }

    pub fn is_enum_type(&self, name: &str) -> bool {
        self.enums.contains_key(name)
    }

    pub fn is_bitmap_type(&self, name: &str) -> bool {
        self.bitmaps.contains_key(name)
    }

    pub fn is_register(&self, name: &str) -> bool {
        self.registers.contains_key(name)
    }

    pub fn struct_field_type(&self, struct_name: &str, field: &str) -> Option<&str> {
        self.struct_fields
            .get(struct_name)?
            .get(field)
            .map(String::as_str)
    }

    pub fn struct_array_dims(&self, struct_name: &str, field: &str) -> Option<&[u32]> {
        self.struct_array_fields
            .get(struct_name)?
            .get(field)
            .map(Vec::as_slice)
    }

    pub fn register_member(&self, register: &str, member: &str) -> Option<&RegisterMemberInfo> {
        self.registers.get(register)?.members.get(member)
    }

    pub fn bitmap_field(&self, bitmap: &str, field: &str) -> Option<(u32, u32)> {
        self.bitmaps.get(bitmap)?.fields.get(field).copied()
    }

    pub fn member_visibility(&self, scope: &str, member: &str) -> Option<Visibility> {
        self.scope_members.get(scope)?.get(member).copied()
    }

    /// Is `name` used as a declared field type anywhere? Drives the nominal
    /// half of callback assignment checking.
    pub fn is_field_type_name(&self, name: &str) -> bool {
        self.struct_fields
            .values()
            .any(|fields| fields.values().any(|ty| base_type_token(ty) == name))
    }
}

/// Strip a `string<N>` capacity suffix down to the base token.
pub fn base_type_token(type_token: &str) -> &str {
    match type_token.find('<') {
        Some(idx) => &type_token[..idx],
        None => type_token,
    }
}

/// Parse the `N` out of a `string<N>` type token.
pub fn string_capacity_of(type_token: &str) -> Option<u32> {
    let rest = type_token.strip_prefix("string<")?;
    let digits = rest.strip_suffix('>')?;
    digits.parse().ok()
}
