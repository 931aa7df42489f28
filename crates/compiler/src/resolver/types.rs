//! Pure type queries: closed-set primitive checks, literal range validation,
//! conversion classification, and the expression-type walk.
//!
//! The walk mirrors the source grammar: logical and comparison layers yield
//! `bool` once two operands combine; everything below descends through the
//! bitwise/additive/multiplicative/unary layers into the primary expression.

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::codegen::CodegenState;
use crate::diagnostics::{CodegenError, ErrorCode, GenResult};
use crate::symbols::base_type_token;
use crate::types::TypeInfo;

pub fn is_integer_type(name: &str) -> bool {
    matches!(
        name,
        "u8" | "u16" | "u32" | "u64" | "i8" | "i16" | "i32" | "i64"
    )
}

pub fn is_float_type(name: &str) -> bool {
    matches!(name, "f32" | "f64")
}

pub fn is_signed_type(name: &str) -> bool {
    matches!(name, "i8" | "i16" | "i32" | "i64")
}

pub fn is_unsigned_type(name: &str) -> bool {
    matches!(name, "u8" | "u16" | "u32" | "u64")
}

pub fn is_numeric_type(name: &str) -> bool {
    is_integer_type(name) || is_float_type(name)
}

/// Defined width of a primitive type, in bits.
pub fn type_bit_width(name: &str) -> Option<u32> {
    match name {
        "u8" | "i8" => Some(8),
        "u16" | "i16" => Some(16),
        "u32" | "i32" | "f32" => Some(32),
        "u64" | "i64" | "f64" => Some(64),
        "bool" => Some(8),
        _ => None,
    }
}

/// Map a source primitive to its C spelling.
pub fn c_primitive_name(name: &str) -> Option<&'static str> {
    match name {
        "u8" => Some("uint8_t"),
        "u16" => Some("uint16_t"),
        "u32" => Some("uint32_t"),
        "u64" => Some("uint64_t"),
        "i8" => Some("int8_t"),
        "i16" => Some("int16_t"),
        "i32" => Some("int32_t"),
        "i64" => Some("int64_t"),
        "f32" => Some("float"),
        "f64" => Some("double"),
        "bool" => Some("bool"),
        "void" => Some("void"),
        _ => None,
    }
}

/// True iff both types are known integers and the destination is narrower.
pub fn is_narrowing_conversion(from: &str, to: &str) -> bool {
    if !is_integer_type(from) || !is_integer_type(to) {
        return false;
    }
    match (type_bit_width(to), type_bit_width(from)) {
        (Some(to_w), Some(from_w)) => to_w < from_w,
        _ => false,
    }
}

/// True iff both types are integers with different signedness.
pub fn is_sign_conversion(from: &str, to: &str) -> bool {
    if !is_integer_type(from) || !is_integer_type(to) {
        return false;
    }
    is_signed_type(from) != is_signed_type(to)
}

/// Reject implicit narrowing and sign changes at an assignment boundary.
/// No-op when the source type is unknown, the types are equal, or either
/// side is not an integer.
pub fn validate_type_conversion(to: &str, from: Option<&str>, line: usize) -> GenResult<()> {
    let Some(from) = from else {
        return Ok(());
    };
    if from == to {
        return Ok(());
    }
    if is_narrowing_conversion(from, to) {
        return Err(CodegenError::rule(
            ErrorCode::NarrowingConversion,
            format!("implicit narrowing conversion from '{}' to '{}'", from, to),
            line,
        ));
    }
    if is_sign_conversion(from, to) {
        return Err(CodegenError::rule(
            ErrorCode::SignConversion,
            format!("implicit sign conversion from '{}' to '{}'", from, to),
            line,
        ));
    }
    Ok(())
}

/// Parse a decimal, hex (`0x…`), or binary (`0b…`) integer literal, with an
/// optional leading `-`.
pub fn parse_integer_literal(text: &str) -> Option<i128> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let digits = digits.replace('_', "");
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i128::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        i128::from_str_radix(bin, 2).ok()?
    } else {
        digits.parse::<i128>().ok()?
    };
    Some(if negative { -value } else { value })
}

/// The closed value range of an integer type.
pub fn type_range(name: &str) -> Option<(i128, i128)> {
    match name {
        "u8" => Some((0, u8::MAX as i128)),
        "u16" => Some((0, u16::MAX as i128)),
        "u32" => Some((0, u32::MAX as i128)),
        "u64" => Some((0, u64::MAX as i128)),
        "i8" => Some((i8::MIN as i128, i8::MAX as i128)),
        "i16" => Some((i16::MIN as i128, i16::MAX as i128)),
        "i32" => Some((i32::MIN as i128, i32::MAX as i128)),
        "i64" => Some((i64::MIN as i128, i64::MAX as i128)),
        _ => None,
    }
}

/// Assert that an integer literal lies in the target type's range. Negative
/// into unsigned is its own error kind. Non-integer literals and unknown
/// target types are ignored.
pub fn validate_literal_fits_type(literal: &str, type_name: &str, line: usize) -> GenResult<()> {
    let Some((min, max)) = type_range(type_name) else {
        return Ok(());
    };
    let Some(value) = parse_integer_literal(literal) else {
        return Ok(());
    };
    if value < 0 && is_unsigned_type(type_name) {
        return Err(CodegenError::rule(
            ErrorCode::NegativeIntoUnsigned,
            format!(
                "negative value {} cannot be stored in unsigned type '{}'",
                literal, type_name
            ),
            line,
        ));
    }
    if value < min || value > max {
        return Err(CodegenError::rule(
            ErrorCode::LiteralOutOfRange,
            format!(
                "literal {} is out of range for '{}' ({}..={})",
                literal, type_name, min, max
            ),
            line,
        ));
    }
    Ok(())
}

/// Peel `Index` layers off a postfix chain, returning the root expression
/// and how many subscripts were applied below the current one.
pub fn peel_subscripts(e: &Expr) -> (&Expr, usize) {
    let mut current = e;
    let mut count = 0;
    while let Expr::Index { base, .. } = current {
        current = base;
        count += 1;
    }
    (current, count)
}

/// Fold an expression to a compile-time integer, when it is one.
pub fn const_int_value(e: &Expr) -> Option<i128> {
    match e {
        Expr::IntLiteral { text, .. } => parse_integer_literal(text),
        Expr::CharLiteral(c) => Some(*c as i128),
        Expr::BoolLiteral(b) => Some(*b as i128),
        Expr::Paren(inner) => const_int_value(inner),
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => const_int_value(operand).map(|v| -v),
        Expr::Unary {
            op: UnaryOp::BitNot,
            operand,
        } => const_int_value(operand).map(|v| !v),
        Expr::Binary { op, lhs, rhs } => {
            let l = const_int_value(lhs)?;
            let r = const_int_value(rhs)?;
            match op {
                BinaryOp::Add => l.checked_add(r),
                BinaryOp::Sub => l.checked_sub(r),
                BinaryOp::Mul => l.checked_mul(r),
                BinaryOp::Div => l.checked_div(r),
                BinaryOp::Mod => l.checked_rem(r),
                BinaryOp::Shl => u32::try_from(r).ok().and_then(|s| l.checked_shl(s)),
                BinaryOp::Shr => u32::try_from(r).ok().and_then(|s| l.checked_shr(s)),
                BinaryOp::BitAnd => Some(l & r),
                BinaryOp::BitOr => Some(l | r),
                BinaryOp::BitXor => Some(l ^ r),
                _ => None,
            }
        }
        _ => None,
    }
}

impl CodegenState {
    /// Full type record for a bare name, searched through the parameter
    /// frame, function locals, scope members, then globals.
    pub fn lookup_type_info(&self, name: &str) -> Option<TypeInfo> {
        if let Some(param) = self.current_parameters.get(name) {
            let mut info = TypeInfo::scalar(&param.base_type);
            info.is_array = param.is_array;
            if param.is_array {
                // Parameter dimensions are unsized from the callee's side
                info.array_dimensions = vec![0];
            }
            info.is_const = param.is_const;
            info.is_string = param.is_string;
            info.string_capacity = param.string_capacity;
            if self.symbols.is_enum_type(&param.base_type) {
                info.is_enum = true;
                info.enum_type_name = Some(param.base_type.clone());
            }
            if let Some(bitmap) = self.symbols.bitmaps.get(&param.base_type) {
                info.bitmap_type_name = Some(param.base_type.clone());
                info.bit_width = bitmap.bit_width;
            }
            return Some(info);
        }
        if let Some(info) = self.type_registry.get(name) {
            return Some(info.clone());
        }
        if let Some(scope) = self.current_scope.as_deref() {
            let mangled = format!("{}_{}", scope, name);
            if let Some(info) = self.type_registry.get(&mangled) {
                return Some(info.clone());
            }
        }
        None
    }

    /// Result type of an expression, or `None` when it cannot be inferred.
    pub fn expression_type(&self, e: &Expr) -> Option<String> {
        match e {
            Expr::IntLiteral { suffix, .. } => suffix.clone(),
            Expr::FloatLiteral { suffix, .. } => {
                Some(suffix.clone().unwrap_or_else(|| "f32".to_string()))
            }
            Expr::BoolLiteral(_) => Some("bool".to_string()),
            Expr::CharLiteral(_) => Some("u8".to_string()),
            Expr::StringLiteral(_) => Some("string".to_string()),
            Expr::Identifier(name) => {
                if let Some(enum_ty) = self.enum_type_of_expression(e) {
                    return Some(enum_ty);
                }
                self.lookup_type_info(name).map(|info| self.surface_type(&info))
            }
            Expr::This | Expr::Global => None,
            Expr::Member { .. } => self.postfix_member_type(e),
            Expr::Index { base, .. } => self.postfix_index_type(base),
            // Range subscripts are excluded from inference
            Expr::Range { .. } => None,
            Expr::Call { callee, .. } => self.function_return_type(callee),
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => Some("bool".to_string()),
                UnaryOp::Neg | UnaryOp::BitNot => self.expression_type(operand),
            },
            Expr::Binary { op, lhs, rhs } => {
                if op.yields_bool() {
                    return Some("bool".to_string());
                }
                self.combined_numeric_type(lhs, rhs)
            }
            Expr::Ternary {
                then_value,
                else_value,
                ..
            } => self
                .expression_type(then_value)
                .or_else(|| self.expression_type(else_value)),
            Expr::Cast { type_name, .. } => Some(type_name.clone()),
            Expr::Sizeof { .. } => Some("u32".to_string()),
            Expr::Paren(inner) => self.expression_type(inner),
        }
    }

    /// The user-visible type token for a declared record.
    fn surface_type(&self, info: &TypeInfo) -> String {
        if info.is_string {
            "string".to_string()
        } else if let Some(enum_ty) = &info.enum_type_name {
            enum_ty.clone()
        } else if let Some(bitmap_ty) = &info.bitmap_type_name {
            bitmap_ty.clone()
        } else {
            info.base_type.clone()
        }
    }

    /// Result type of the non-boolean arithmetic layers: the wider operand
    /// wins, equal widths keep the left operand's type.
    fn combined_numeric_type(&self, lhs: &Expr, rhs: &Expr) -> Option<String> {
        let lhs_ty = self.expression_type(lhs);
        let rhs_ty = self.expression_type(rhs);
        match (lhs_ty, rhs_ty) {
            (Some(l), Some(r)) => {
                if l == r {
                    return Some(l);
                }
                let lw = type_bit_width(&l);
                let rw = type_bit_width(&r);
                match (lw, rw) {
                    (Some(lw), Some(rw)) if rw > lw => Some(r),
                    _ => Some(l),
                }
            }
            (Some(l), None) => Some(l),
            (None, Some(r)) => Some(r),
            (None, None) => None,
        }
    }

    fn postfix_member_type(&self, e: &Expr) -> Option<String> {
        if let Some(enum_ty) = self.enum_type_of_expression(e) {
            return Some(enum_ty);
        }
        let Expr::Member { base, member } = e else {
            return None;
        };
        // this.m / global.m / global.Scope.m / Scope.m resolve through the
        // registry under their emitted names
        if let Some(resolved) = self.qualified_member_registry_name(base, member) {
            if let Some(info) = self.type_registry.get(&resolved) {
                return Some(self.surface_type(info));
            }
            // Register member access resolves through the symbol table
            if let Some((register, reg_member)) = resolved.split_once('.') {
                if let Some(info) = self.symbols.register_member(register, reg_member) {
                    return Some(info.type_name.clone());
                }
            }
        }
        // Register member: REG.MEMBER
        if let Some(register) = base.as_identifier() {
            if let Some(info) = self.symbols.register_member(register, member) {
                return Some(info.type_name.clone());
            }
        }
        // Struct field or bitmap field on an arbitrary base
        let base_ty = self.expression_type(base)?;
        if let Some(field_ty) = self.symbols.struct_field_type(&base_ty, member) {
            return Some(base_type_token(field_ty).to_string());
        }
        if let Some((_, width)) = self.symbols.bitmap_field(&base_ty, member) {
            let backing = self.symbols.bitmaps.get(&base_ty)?.backing_type.clone();
            return Some(if width == 1 { "bool".to_string() } else { backing });
        }
        None
    }

    /// Type of `base[i]`: the element type when the subscript indexes an
    /// array dimension, `bool` when it bit-indexes a plain integer, `u8`
    /// when it indexes into a string's characters.
    fn postfix_index_type(&self, base: &Expr) -> Option<String> {
        let (root, applied) = peel_subscripts(base);
        let info = self.subscript_root_info(root)?;
        let dims = info.array_dimensions.len();
        // `applied` subscripts already consumed, this one is number applied+1
        if applied < dims {
            // Indexing an array dimension
            if applied + 1 == dims && info.is_string {
                return Some("string".to_string());
            }
            return Some(info.base_type.clone());
        }
        // All array dimensions consumed: subscripting the element itself
        if info.is_string {
            return Some("u8".to_string());
        }
        if is_integer_type(&info.base_type)
            || info.bitmap_type_name.is_some()
            || is_float_type(&info.base_type)
        {
            // Bit indexing, not array access
            return Some("bool".to_string());
        }
        Some(info.base_type.clone())
    }

    /// The declared record behind the root of a subscript chain: a bare or
    /// qualified identifier, or a struct array field.
    pub(crate) fn subscript_root_info(&self, root: &Expr) -> Option<TypeInfo> {
        if let Some(name) = root.as_identifier() {
            if let Some(mut info) = self.lookup_type_info(name) {
                if !info.is_array {
                    info.array_dimensions.clear();
                }
                return Some(info);
            }
            return None;
        }
        if let Expr::Member { base, member } = root {
            // this.arr / global.arr / Scope.arr resolve through the registry
            if let Some(resolved) = self.qualified_member_registry_name(base, member) {
                if let Some(info) = self.type_registry.get(&resolved) {
                    return Some(info.clone());
                }
                // Register member: fixed-width integer, never an array
                if let Some((register, reg_member)) = resolved.split_once('.') {
                    if let Some(member_info) = self.symbols.register_member(register, reg_member) {
                        let mut info = TypeInfo::scalar(&member_info.type_name);
                        if let Some(bitmap) = self.symbols.bitmaps.get(&member_info.type_name) {
                            info.bitmap_type_name = Some(member_info.type_name.clone());
                            info.bit_width = bitmap.bit_width;
                        }
                        return Some(info);
                    }
                }
            }
            // Struct array field
            let struct_ty = self.expression_type(base)?;
            let field_ty = self.symbols.struct_field_type(&struct_ty, member)?;
            let base_token = base_type_token(field_ty).to_string();
            let mut info = TypeInfo::scalar(&base_token);
            if base_token == "string" {
                info.is_string = true;
                info.string_capacity =
                    crate::symbols::string_capacity_of(field_ty).unwrap_or(0);
            }
            if let Some(dims) = self.symbols.struct_array_dims(&struct_ty, member) {
                info.is_array = true;
                info.array_dimensions = dims.to_vec();
            }
            return Some(info);
        }
        None
    }

    /// Return type of a call through any of the qualification forms.
    pub(crate) fn function_return_type(&self, callee: &Expr) -> Option<String> {
        let name = self.resolve_callee_symbol(callee)?;
        self.symbols
            .functions
            .get(&name)
            .map(|sig| sig.return_type.clone())
    }

    /// The symbol-table key a callee expression refers to.
    pub(crate) fn resolve_callee_symbol(&self, callee: &Expr) -> Option<String> {
        match callee {
            Expr::Identifier(name) => {
                if self.symbols.functions.contains_key(name) {
                    return Some(name.clone());
                }
                if let Some(scope) = self.current_scope.as_deref() {
                    let mangled = format!("{}_{}", scope, name);
                    if self.symbols.functions.contains_key(&mangled) {
                        return Some(mangled);
                    }
                }
                Some(name.clone())
            }
            Expr::Member { base, member } => match base.as_ref() {
                Expr::This => {
                    let scope = self.current_scope.as_deref()?;
                    Some(format!("{}_{}", scope, member))
                }
                Expr::Global => Some(member.clone()),
                Expr::Identifier(scope) if self.symbols.is_scope(scope) => {
                    Some(format!("{}_{}", scope, member))
                }
                Expr::Member {
                    base: inner,
                    member: scope,
                } if matches!(inner.as_ref(), Expr::Global) && self.symbols.is_scope(scope) => {
                    Some(format!("{}_{}", scope, member))
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Resolve `this.m`, `global.m`, `global.Scope.m`, and `Scope.m` to the
    /// name the emitted C uses. Register member paths come back as
    /// `register.member` for the caller to split.
    pub(crate) fn qualified_member_registry_name(
        &self,
        base: &Expr,
        member: &str,
    ) -> Option<String> {
        match base {
            Expr::This => {
                let scope = self.current_scope.as_deref()?;
                Some(format!("{}_{}", scope, member))
            }
            Expr::Global => Some(member.to_string()),
            Expr::Identifier(name) if self.symbols.is_scope(name) => {
                Some(format!("{}_{}", name, member))
            }
            Expr::Identifier(name) if self.symbols.is_register(name) => {
                Some(format!("{}.{}", name, member))
            }
            Expr::Member {
                base: inner,
                member: outer,
            } if matches!(inner.as_ref(), Expr::Global) => {
                if self.symbols.is_scope(outer) {
                    Some(format!("{}_{}", outer, member))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Width in bits of a type token, including bitmap and enum types.
    pub(crate) fn width_of_type(&self, type_name: &str) -> Option<u32> {
        if let Some(width) = type_bit_width(type_name) {
            return Some(width);
        }
        if let Some(bitmap) = self.symbols.bitmaps.get(type_name) {
            return Some(bitmap.bit_width);
        }
        if self.symbols.is_enum_type(type_name) {
            return Some(32);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Mode, TargetCapabilities};
    use crate::symbols::SymbolInfo;

    fn state() -> CodegenState {
        CodegenState::new(SymbolInfo::new(), Mode::C, TargetCapabilities::default())
    }

    #[test]
    fn test_closed_set_checks() {
        assert!(is_integer_type("u8"));
        assert!(is_integer_type("i64"));
        assert!(!is_integer_type("f32"));
        assert!(is_float_type("f64"));
        assert!(is_signed_type("i16"));
        assert!(is_unsigned_type("u32"));
        assert!(!is_integer_type("Color"));
    }

    #[test]
    fn test_narrowing_and_sign_detection() {
        assert!(is_narrowing_conversion("u32", "u8"));
        assert!(!is_narrowing_conversion("u8", "u32"));
        assert!(!is_narrowing_conversion("Color", "u8"));
        assert!(is_sign_conversion("i32", "u32"));
        assert!(!is_sign_conversion("u16", "u32"));
    }

    #[test]
    fn test_validate_conversion_no_ops() {
        assert!(validate_type_conversion("u8", None, 1).is_ok());
        assert!(validate_type_conversion("u8", Some("u8"), 1).is_ok());
        assert!(validate_type_conversion("u8", Some("Color"), 1).is_ok());
        assert!(validate_type_conversion("u8", Some("u16"), 1).is_err());
        assert!(validate_type_conversion("u32", Some("i32"), 1).is_err());
    }

    #[test]
    fn test_literal_parsing_forms() {
        assert_eq!(parse_integer_literal("42"), Some(42));
        assert_eq!(parse_integer_literal("0xFF"), Some(255));
        assert_eq!(parse_integer_literal("0b1010"), Some(10));
        assert_eq!(parse_integer_literal("-17"), Some(-17));
        assert_eq!(parse_integer_literal("3.5"), None);
    }

    #[test]
    fn test_literal_range_checks() {
        assert!(validate_literal_fits_type("255", "u8", 1).is_ok());
        assert!(validate_literal_fits_type("256", "u8", 1).is_err());
        assert!(validate_literal_fits_type("-1", "i8", 1).is_ok());
        assert!(validate_literal_fits_type("nonsense", "u8", 1).is_ok());
        assert!(validate_literal_fits_type("42", "NotAType", 1).is_ok());

        let err = validate_literal_fits_type("-1", "u8", 1).unwrap_err();
        match err {
            CodegenError::Rule(d) => assert_eq!(d.code, ErrorCode::NegativeIntoUnsigned),
            other => panic!("expected rule error, got {:?}", other),
        }
    }

    #[test]
    fn test_bool_layers_yield_bool() {
        let cg = state();
        let cmp = Expr::Binary {
            op: BinaryOp::Lt,
            lhs: Box::new(Expr::int("1")),
            rhs: Box::new(Expr::int("2")),
        };
        assert_eq!(cg.expression_type(&cmp).as_deref(), Some("bool"));
        let logic = Expr::Binary {
            op: BinaryOp::And,
            lhs: Box::new(Expr::BoolLiteral(true)),
            rhs: Box::new(Expr::BoolLiteral(false)),
        };
        assert_eq!(cg.expression_type(&logic).as_deref(), Some("bool"));
    }

    #[test]
    fn test_bit_index_on_integer_yields_bool() {
        let mut cg = state();
        cg.type_registry
            .insert("flags".to_string(), TypeInfo::scalar("u8"));
        let e = Expr::Index {
            base: Box::new(Expr::ident("flags")),
            index: Box::new(Expr::int("3")),
            line: 1,
        };
        assert_eq!(cg.expression_type(&e).as_deref(), Some("bool"));
    }

    #[test]
    fn test_array_subscript_yields_element_type() {
        let mut cg = state();
        let mut info = TypeInfo::scalar("u16");
        info.is_array = true;
        info.array_dimensions = vec![4];
        cg.type_registry.insert("samples".to_string(), info);
        let e = Expr::Index {
            base: Box::new(Expr::ident("samples")),
            index: Box::new(Expr::int("0")),
            line: 1,
        };
        assert_eq!(cg.expression_type(&e).as_deref(), Some("u16"));
    }

    #[test]
    fn test_array_parameter_subscript_is_element_access() {
        use crate::types::ParameterInfo;
        let mut cg = state();
        cg.current_parameters.insert(
            "buf".to_string(),
            ParameterInfo {
                base_type: "u8".to_string(),
                is_array: true,
                ..ParameterInfo::default()
            },
        );
        let e = Expr::Index {
            base: Box::new(Expr::ident("buf")),
            index: Box::new(Expr::int("2")),
            line: 1,
        };
        // Element access, not a bit read: the parameter is an array even
        // though its dimensions are unsized here
        assert_eq!(cg.expression_type(&e).as_deref(), Some("u8"));
    }

    #[test]
    fn test_range_subscript_excluded_from_inference() {
        let mut cg = state();
        cg.type_registry
            .insert("x".to_string(), TypeInfo::scalar("u32"));
        let e = Expr::Range {
            base: Box::new(Expr::ident("x")),
            start: Box::new(Expr::int("0")),
            width: Box::new(Expr::int("8")),
            line: 1,
        };
        assert_eq!(cg.expression_type(&e), None);
    }

    #[test]
    fn test_literal_suffix_detection() {
        let cg = state();
        let e = Expr::IntLiteral {
            text: "42".to_string(),
            suffix: Some("u8".to_string()),
        };
        assert_eq!(cg.expression_type(&e).as_deref(), Some("u8"));
        assert_eq!(cg.expression_type(&Expr::int("42")), None);
        let f = Expr::FloatLiteral {
            text: "3.14".to_string(),
            suffix: None,
        };
        assert_eq!(cg.expression_type(&f).as_deref(), Some("f32"));
    }

    #[test]
    fn test_wider_operand_wins() {
        let mut cg = state();
        cg.type_registry
            .insert("a".to_string(), TypeInfo::scalar("u8"));
        cg.type_registry
            .insert("b".to_string(), TypeInfo::scalar("u16"));
        let e = Expr::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(Expr::ident("a")),
            rhs: Box::new(Expr::ident("b")),
        };
        assert_eq!(cg.expression_type(&e).as_deref(), Some("u16"));
    }

    #[test]
    fn test_const_folding() {
        let e = Expr::Binary {
            op: BinaryOp::Shl,
            lhs: Box::new(Expr::int("1")),
            rhs: Box::new(Expr::int("4")),
        };
        assert_eq!(const_int_value(&e), Some(16));
        assert_eq!(const_int_value(&Expr::ident("x")), None);
    }
}
