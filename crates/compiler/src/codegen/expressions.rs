//! Expression emission.
//!
//! Mirrors the precedence layers of the source grammar. Each emitter returns
//! a C expression string; need-flags are set on the state as types are
//! encountered. Float bit access is rewritten through a type-punning union
//! (C) or a memcpy'd shadow temp (C++); unsafe integer divides route through
//! the `cnx_safe_div_*` helpers.

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::codegen::{CodegenState, grouped, mask_literal, mask_one};
use crate::config::Mode;
use crate::diagnostics::{CodegenError, ErrorCode, GenResult};
use crate::resolver::{
    const_int_value, is_float_type, is_integer_type, is_signed_type, parse_integer_literal,
    peel_subscripts,
};

impl CodegenState {
    /// Emit a C expression for `e`.
    pub fn emit_expression(&mut self, e: &Expr) -> GenResult<String> {
        match e {
            Expr::IntLiteral { text, suffix } => Ok(self.emit_int_literal(text, suffix.as_deref())),
            Expr::FloatLiteral { text, suffix } => {
                Ok(Self::emit_float_literal(text, suffix.as_deref()))
            }
            Expr::BoolLiteral(b) => {
                self.needs_stdbool = true;
                Ok(if *b { "true" } else { "false" }.to_string())
            }
            Expr::CharLiteral(c) => Ok(emit_char_literal(*c)),
            Expr::StringLiteral(s) => Ok(format!("\"{}\"", escape_c_string(s))),
            Expr::Identifier(name) => self.emit_identifier(name),
            Expr::This | Expr::Global => Err(CodegenError::Internal(
                "bare qualifier outside a member access".to_string(),
            )),
            Expr::Member { base, member } => self.emit_member(e, base, member),
            Expr::Index { base, index, line } => self.emit_index(base, index, *line),
            Expr::Range {
                base,
                start,
                width,
                line,
            } => self.emit_range_read(base, start, width, *line),
            Expr::Call { callee, args, line } => self.emit_call(callee, args, *line),
            Expr::Unary { op, operand } => {
                let text = self.emit_expression(operand)?;
                Ok(format!("{}{}", op.c_token(), grouped(&text)))
            }
            Expr::Binary { op, lhs, rhs } => self.emit_binary(*op, lhs, rhs),
            Expr::Ternary {
                cond,
                then_value,
                else_value,
                line,
            } => {
                self.validate_no_call_in_condition(cond, "ternary", *line)?;
                self.validate_boolean_condition(cond, "ternary", *line)?;
                self.validate_no_nested_ternary(then_value, else_value, *line)?;
                let c = self.emit_expression(cond)?;
                let t = self.emit_expression(then_value)?;
                let f = self.emit_expression(else_value)?;
                Ok(format!("({} ? {} : {})", c, t, f))
            }
            Expr::Cast { type_name, value } => self.emit_cast(type_name, value),
            Expr::Sizeof { arg, line } => self.emit_sizeof(arg, *line),
            Expr::Paren(inner) => {
                let text = self.emit_expression(inner)?;
                Ok(grouped(&text))
            }
        }
    }

    fn emit_int_literal(&mut self, text: &str, suffix: Option<&str>) -> String {
        if let Some(suffix) = suffix {
            self.note_type_use(suffix);
        }
        // C has no binary literals; rewrite 0b forms as hex
        let body = if text.starts_with("0b") || text.starts_with("0B") {
            match parse_integer_literal(text) {
                Some(v) => format!("0x{:X}", v),
                None => text.to_string(),
            }
        } else {
            text.to_string()
        };
        // Literals beyond 32 bits need an explicit long-long suffix
        match parse_integer_literal(text) {
            Some(v) if v > i128::from(u32::MAX) => format!("{}ULL", body),
            Some(v) if v < i128::from(i32::MIN) => format!("{}LL", body),
            _ => body,
        }
    }

    fn emit_float_literal(text: &str, suffix: Option<&str>) -> String {
        // Unsuffixed float literals are f32; C spells that with a trailing f
        match suffix {
            Some("f64") => text.to_string(),
            _ => {
                if text.ends_with('f') || text.ends_with('F') {
                    text.to_string()
                } else if text.contains('.') || text.contains('e') || text.contains('E') {
                    format!("{}f", text)
                } else {
                    format!("{}.0f", text)
                }
            }
        }
    }

    fn emit_identifier(&mut self, name: &str) -> GenResult<String> {
        if self.current_parameters.contains_key(name)
            || self.local_variables.contains(name)
            || self.local_arrays.contains(name)
        {
            if let Some(info) = self.lookup_type_info(name) {
                let base = info.base_type.clone();
                self.note_type_use(&base);
            }
            return Ok(name.to_string());
        }
        // Inside a scope, a bare name colliding with a scope-level name must
        // be qualified
        self.validate_unqualified_identifier(name, self.current_line)?;
        if let Some(info) = self.lookup_type_info(name) {
            let base = info.base_type.clone();
            self.note_type_use(&base);
        }
        Ok(name.to_string())
    }

    // =========================================================================
    // Member access
    // =========================================================================

    fn emit_member(&mut self, whole: &Expr, base: &Expr, member: &str) -> GenResult<String> {
        let line = self.current_line;

        // Enum constant through any qualification form
        if let Some(enum_ty) = self.enum_type_of_expression(whole) {
            if self
                .symbols
                .enums
                .get(&enum_ty)
                .is_some_and(|info| info.contains(member))
            {
                return Ok(format!("{}_{}", enum_ty, member));
            }
        }

        // Register member: the emitted name is the member's macro lvalue
        if let Some(register) = self.resolve_register_path(base) {
            if self.symbols.register_member(&register, member).is_some() {
                self.needs_stdint = true;
                return Ok(format!("{}_{}", register, member));
            }
        }

        match base {
            Expr::This => {
                let scope = self.current_scope.clone().ok_or_else(|| {
                    CodegenError::rule(
                        ErrorCode::ScopeVisibility,
                        "'this' used outside a scope".to_string(),
                        line,
                    )
                })?;
                let mangled = format!("{}_{}", scope, member);
                if let Some(info) = self.type_registry.get(&mangled) {
                    let base_ty = info.base_type.clone();
                    self.note_type_use(&base_ty);
                }
                Ok(mangled)
            }
            Expr::Global => Ok(member.to_string()),
            Expr::Identifier(name) if self.symbols.is_scope(name) => {
                self.validate_scope_access(name, member, false, line)?;
                Ok(format!("{}_{}", name, member))
            }
            Expr::Member {
                base: inner,
                member: scope,
            } if matches!(inner.as_ref(), Expr::Global) && self.symbols.is_scope(scope) => {
                self.validate_scope_access(scope, member, true, line)?;
                Ok(format!("{}_{}", scope, member))
            }
            _ => {
                // Bitmap field read: RMW-shaped extract
                if let Some(base_ty) = self.expression_type(base) {
                    if let Some((offset, width)) = self.symbols.bitmap_field(&base_ty, member) {
                        let total = self
                            .symbols
                            .bitmaps
                            .get(&base_ty)
                            .map(|b| b.bit_width)
                            .unwrap_or(32);
                        let base_text = self.emit_expression(base)?;
                        return Ok(bit_extract(&grouped(&base_text), offset, width, total));
                    }
                }
                // Struct field; by-ref struct parameters use arrow access
                let arrow = base
                    .as_identifier()
                    .and_then(|n| self.current_parameters.get(n))
                    .is_some_and(|p| p.is_struct && p.by_ref);
                let base_text = self.emit_expression(base)?;
                let sep = if arrow { "->" } else { "." };
                Ok(format!("{}{}{}", base_text, sep, member))
            }
        }
    }

    /// Resolve an expression naming a register block, across the `this.` /
    /// `global.` / `Scope.` qualification forms. Scoped registers live in
    /// the symbol table under their mangled names.
    pub(crate) fn resolve_register_path(&self, e: &Expr) -> Option<String> {
        match e {
            Expr::Identifier(name) => {
                if self.symbols.is_register(name) {
                    return Some(name.clone());
                }
                if let Some(scope) = self.current_scope.as_deref() {
                    let mangled = format!("{}_{}", scope, name);
                    if self.symbols.is_register(&mangled) {
                        return Some(mangled);
                    }
                }
                None
            }
            Expr::Member { base, member } => match base.as_ref() {
                Expr::This => {
                    let scope = self.current_scope.as_deref()?;
                    let mangled = format!("{}_{}", scope, member);
                    self.symbols.is_register(&mangled).then_some(mangled)
                }
                Expr::Global => self
                    .symbols
                    .is_register(member)
                    .then(|| member.to_string()),
                Expr::Identifier(scope) if self.symbols.is_scope(scope) => {
                    let mangled = format!("{}_{}", scope, member);
                    self.symbols.is_register(&mangled).then_some(mangled)
                }
                Expr::Member {
                    base: inner,
                    member: scope,
                } if matches!(inner.as_ref(), Expr::Global) && self.symbols.is_scope(scope) => {
                    let mangled = format!("{}_{}", scope, member);
                    self.symbols.is_register(&mangled).then_some(mangled)
                }
                _ => None,
            },
            _ => None,
        }
    }

    // =========================================================================
    // Subscripts
    // =========================================================================

    fn emit_index(&mut self, base: &Expr, index: &Expr, line: usize) -> GenResult<String> {
        let (root, applied) = peel_subscripts(base);
        let root_info = self.subscript_root_info(root);

        if let Some(info) = &root_info {
            let dims = info.array_dimensions.clone();
            if applied < dims.len() {
                // Array element access; constant indices are bounds-checked
                crate::validate::validate_array_bounds(&dims[applied..], &[index], line)?;
                let base_text = self.emit_expression(base)?;
                let index_text = self.emit_expression(index)?;
                return Ok(format!("{}[{}]", base_text, index_text));
            }
            if info.is_string {
                let base_text = self.emit_expression(base)?;
                let index_text = self.emit_expression(index)?;
                return Ok(format!("{}[{}]", base_text, index_text));
            }
            if is_float_type(&info.base_type) {
                return self.emit_float_bit_read(base, index, &info.base_type, line);
            }
        }

        // Bit read from an integer: subscript on a non-array integer is bit
        // indexing, never array access
        let width = self
            .expression_type(base)
            .and_then(|ty| self.width_of_type(&ty))
            .unwrap_or(32);
        self.validate_shift_amount(width, index, line)?;
        let base_text = self.emit_expression(base)?;
        let index_text = self.emit_expression(index)?;
        Ok(format!(
            "(({} >> {}) & {})",
            grouped(&base_text),
            index_text,
            mask_one(width)
        ))
    }

    fn emit_range_read(
        &mut self,
        base: &Expr,
        start: &Expr,
        width: &Expr,
        line: usize,
    ) -> GenResult<String> {
        let base_ty = self.expression_type(base);
        if let Some(ty) = &base_ty {
            if is_float_type(ty) {
                return self.emit_float_range_read(base, start, width, ty, line);
            }
        }
        let total = base_ty
            .and_then(|ty| self.width_of_type(&ty))
            .unwrap_or(32);
        if let Some(s) = const_int_value(start) {
            self.validate_shift_amount(total, &Expr::int(s.to_string()), line)?;
        }
        let mask = match const_int_value(width) {
            Some(w) if (1..=64).contains(&w) => mask_literal(w as u32),
            _ => {
                let w = self.emit_expression(width)?;
                format!("(({} << {}) - {})", mask_one(total), grouped(&w), mask_one(total))
            }
        };
        let base_text = self.emit_expression(base)?;
        let start_text = self.emit_expression(start)?;
        Ok(format!(
            "(({} >> {}) & {})",
            grouped(&base_text),
            start_text,
            mask
        ))
    }

    // =========================================================================
    // Float bit shadows
    // =========================================================================

    /// Read one bit of a float through its bit pattern. C uses a punning
    /// union in a compound literal; C++ hoists a shadow temp and memcpy.
    fn emit_float_bit_read(
        &mut self,
        base: &Expr,
        index: &Expr,
        float_ty: &str,
        line: usize,
    ) -> GenResult<String> {
        let width = if float_ty == "f64" { 64 } else { 32 };
        self.validate_shift_amount(width, index, line)?;
        let shadow = self.float_shadow_expr(base, float_ty)?;
        let index_text = self.emit_expression(index)?;
        Ok(format!(
            "(({} >> {}) & {})",
            shadow,
            index_text,
            mask_one(width)
        ))
    }

    fn emit_float_range_read(
        &mut self,
        base: &Expr,
        start: &Expr,
        width: &Expr,
        float_ty: &str,
        line: usize,
    ) -> GenResult<String> {
        let total = if float_ty == "f64" { 64 } else { 32 };
        if let Some(s) = const_int_value(start) {
            self.validate_shift_amount(total, &Expr::int(s.to_string()), line)?;
        }
        let mask = match const_int_value(width) {
            Some(w) if (1..=64).contains(&w) => mask_literal(w as u32),
            _ => mask_literal(total),
        };
        let shadow = self.float_shadow_expr(base, float_ty)?;
        let start_text = self.emit_expression(start)?;
        Ok(format!("(({} >> {}) & {})", shadow, start_text, mask))
    }

    /// An expression reading the bit pattern of a float value.
    fn float_shadow_expr(&mut self, base: &Expr, float_ty: &str) -> GenResult<String> {
        let (c_float, c_int) = if float_ty == "f64" {
            self.needs_double_assert = true;
            ("double", "uint64_t")
        } else {
            self.needs_float_assert = true;
            ("float", "uint32_t")
        };
        self.needs_stdint = true;
        let base_text = self.emit_expression(base)?;
        match self.mode {
            Mode::C => Ok(format!(
                "(((union {{ {} f; {} u; }}){{ .f = {} }}).u)",
                c_float, c_int, base_text
            )),
            Mode::Cpp => {
                // Compound literals of anonymous unions are not C++; shadow
                // the bits through a hoisted temp instead
                self.needs_string = true;
                let tmp = self.fresh_temp();
                self.push_pending_temp(format!(
                    "{} {}; memcpy(&{}, &{}, sizeof {});",
                    c_int, tmp, tmp, base_text, tmp
                ));
                self.float_bit_shadows.insert(tmp.clone());
                self.float_shadow_current.insert(tmp.clone());
                Ok(tmp)
            }
        }
    }

    // =========================================================================
    // Calls and binaries
    // =========================================================================

    fn emit_call(&mut self, callee: &Expr, args: &[Expr], line: usize) -> GenResult<String> {
        let name = match callee {
            Expr::Identifier(name) => {
                if self
                    .current_parameters
                    .get(name)
                    .is_some_and(|p| p.is_callback)
                {
                    name.clone()
                } else {
                    self.resolve_callee_symbol(callee).ok_or_else(|| {
                        CodegenError::Internal(format!("unresolvable call target '{}'", name))
                    })?
                }
            }
            Expr::Member {
                base,
                member,
            } => {
                // Scope-qualified calls honor visibility
                if let Expr::Identifier(scope) = base.as_ref() {
                    if self.symbols.is_scope(scope) {
                        self.validate_scope_access(scope, member, false, line)?;
                    }
                }
                self.resolve_callee_symbol(callee).ok_or_else(|| {
                    CodegenError::Internal(format!("unresolvable call target '.{}'", member))
                })?
            }
            _ => {
                return Err(CodegenError::Internal(
                    "unsupported call target expression".to_string(),
                ));
            }
        };
        self.known_functions.insert(name.clone());
        let mut emitted = Vec::with_capacity(args.len());
        for arg in args {
            emitted.push(self.emit_expression(arg)?);
        }
        Ok(format!("{}({})", name, emitted.join(", ")))
    }

    fn emit_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> GenResult<String> {
        if op.is_shift() {
            if let Some(width) = self
                .expression_type(lhs)
                .and_then(|ty| self.width_of_type(&ty))
            {
                self.validate_shift_amount(width, rhs, self.current_line)?;
            }
        }
        // Integer division with a divisor that is not a provably non-zero
        // literal goes through the guard helper
        if matches!(op, BinaryOp::Div | BinaryOp::Mod) {
            let result_ty = self
                .expression_type(lhs)
                .or_else(|| self.expression_type(rhs));
            if let Some(ty) = result_ty {
                let nonzero_literal = const_int_value(rhs).is_some_and(|v| v != 0);
                if is_integer_type(&ty) && !nonzero_literal {
                    let helper_op = if op == BinaryOp::Div { "div" } else { "mod" };
                    self.used_safe_div_ops
                        .insert(format!("{}_{}", helper_op, ty));
                    self.note_type_use(&ty);
                    let l = self.emit_expression(lhs)?;
                    let r = self.emit_expression(rhs)?;
                    return Ok(format!("cnx_safe_{}_{}({}, {})", helper_op, ty, l, r));
                }
            }
        }
        let l = self.emit_expression(lhs)?;
        let r = self.emit_expression(rhs)?;
        Ok(format!("({} {} {})", l, op.c_token(), r))
    }

    fn emit_cast(&mut self, type_name: &str, value: &Expr) -> GenResult<String> {
        let value_ty = self.expression_type(value);
        let text = self.emit_expression(value)?;
        let c_ty = self.c_type_text(type_name);

        // Float-to-integer casts clamp to the target range
        if is_integer_type(type_name) && value_ty.as_deref().is_some_and(is_float_type) {
            self.needs_limits = true;
            let src = if value_ty.as_deref() == Some("f64") {
                "double"
            } else {
                "float"
            };
            let v = grouped(&text);
            let ty_upper = type_name.to_uppercase();
            if is_signed_type(type_name) {
                return Ok(format!(
                    "({v} >= ({src})INT{w}_MAX ? INT{w}_MAX : \
                     ({v} <= ({src})INT{w}_MIN ? INT{w}_MIN : ({c_ty}){v}))",
                    v = v,
                    src = src,
                    w = &ty_upper[1..],
                    c_ty = c_ty
                ));
            }
            return Ok(format!(
                "({v} >= ({src})UINT{w}_MAX ? UINT{w}_MAX : \
                 ({v} <= 0.0f ? 0U : ({c_ty}){v}))",
                v = v,
                src = src,
                w = &ty_upper[1..],
                c_ty = c_ty
            ));
        }
        Ok(format!("({})({})", c_ty, text))
    }
}

/// Extract a bitmap field: `((base >> offset) & mask)`.
pub(crate) fn bit_extract(base: &str, offset: u32, width: u32, total_width: u32) -> String {
    let mask = if width == 1 {
        mask_one(total_width).to_string()
    } else {
        mask_literal(width)
    };
    format!("(({} >> {}) & {})", base, offset, mask)
}

fn emit_char_literal(c: char) -> String {
    match c {
        '\'' => "'\\''".to_string(),
        '\\' => "'\\\\'".to_string(),
        '\n' => "'\\n'".to_string(),
        '\t' => "'\\t'".to_string(),
        '\r' => "'\\r'".to_string(),
        '\0' => "'\\0'".to_string(),
        _ => format!("'{}'", c),
    }
}

pub(crate) fn escape_c_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            _ => out.push(c),
        }
    }
    out
}
