//! Assignment classification.
//!
//! Every assignment statement is classified to exactly one [`AssignmentKind`]
//! plus an [`AssignmentContext`] carrying the resolved pieces the handler
//! needs. The kind enumeration is closed and the handler dispatch is an
//! exhaustive `match`, so the compiler enforces handler totality.
//!
//! Rules are tried in priority order: strings, atomics, clamped arithmetic,
//! range subscripts (register / chain / slice / integer), single-bit
//! subscripts, bitmap field selects, array elements, `this.`/`global.`
//! members, member chains, and finally the simple form.

use crate::ast::{AssignOp, AssignStmt, Expr};
use crate::codegen::CodegenState;
use crate::diagnostics::{CodegenError, ErrorCode, GenResult};
use crate::resolver::is_integer_type;
use crate::symbols::{AccessMode, base_type_token, string_capacity_of};
use crate::types::TypeInfo;
use crate::validate::{validate_array_bounds, validate_slice_bounds};

/// The closed set of code shapes an assignment can lower to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKind {
    Simple,
    GlobalMember,
    GlobalArray,
    ThisMember,
    ThisArray,
    MemberChain,
    GlobalRegisterBit,
    ScopedRegisterBit,
    GlobalRegisterBitRange,
    ScopedRegisterBitRange,
    RegisterMemberBitmapField,
    ScopedRegisterMemberBitmapField,
    BitmapFieldSingleBit,
    BitmapFieldMultiBit,
    BitmapArrayElementField,
    StructMemberBitmapField,
    IntegerBit,
    IntegerBitRange,
    StructMemberBit,
    ArrayElementBit,
    StructChainBitRange,
    ArrayElement,
    MultiDimArrayElement,
    ArraySlice,
    StringSimple,
    StringThisMember,
    StringGlobal,
    StringStructField,
    StringArrayElement,
    StringStructArrayElement,
    AtomicRmw,
    OverflowClamp,
}

/// One subscript in the target chain, with its source line and its anchor
/// (how many identifier-path segments preceded it).
#[derive(Debug)]
pub enum Subscript<'a> {
    Index {
        expr: &'a Expr,
        line: usize,
        anchor: usize,
    },
    Range {
        start: &'a Expr,
        width: &'a Expr,
        line: usize,
        anchor: usize,
    },
}

impl<'a> Subscript<'a> {
    pub fn line(&self) -> usize {
        match self {
            Subscript::Index { line, .. } | Subscript::Range { line, .. } => *line,
        }
    }

    pub fn anchor(&self) -> usize {
        match self {
            Subscript::Index { anchor, .. } | Subscript::Range { anchor, .. } => *anchor,
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Subscript::Range { .. })
    }
}

/// Register member resolved from the target path.
#[derive(Debug, Clone)]
pub struct RegisterTarget {
    pub register: String,
    pub member: String,
    pub base_address: u64,
    pub offset: u64,
    pub access: AccessMode,
    pub scoped: bool,
}

/// Everything the dispatch needs for one assignment, resolved once.
#[derive(Debug)]
pub struct AssignmentContext<'a> {
    /// Left-to-right dotted identifier path
    pub path: Vec<String>,
    /// Subscripts in source order
    pub subscripts: Vec<Subscript<'a>>,
    pub has_this: bool,
    pub has_global: bool,
    pub has_member_access: bool,
    pub has_array_access: bool,
    pub is_simple_identifier: bool,
    pub is_simple_this_access: bool,
    pub is_simple_global_access: bool,
    pub member_access_depth: usize,
    pub subscript_depth: usize,
    /// Source operator and its C counterpart
    pub op: AssignOp,
    pub c_op: &'static str,
    /// Already-emitted RHS text
    pub rhs: String,
    /// The raw RHS, for literal/range validation
    pub value: &'a Expr,
    /// Resolved final target lvalue (without any trailing bit/range part)
    pub target_name: String,
    /// Resolved base identifier, post scope-prefixing
    pub base_identifier: String,
    pub line: usize,

    // Resolution results the handlers key off
    pub target_width: u32,
    pub bit_field: Option<(u32, u32)>,
    pub register: Option<RegisterTarget>,
    pub element_type: Option<String>,
    pub string_capacity: u32,
    pub array_dims: Vec<u32>,
}

#[derive(Default)]
struct FlatTarget<'a> {
    path: Vec<&'a str>,
    subscripts: Vec<Subscript<'a>>,
    has_this: bool,
    has_global: bool,
}

fn flatten_target<'a>(e: &'a Expr, flat: &mut FlatTarget<'a>) -> GenResult<()> {
    match e {
        Expr::Identifier(name) => {
            flat.path.push(name);
            Ok(())
        }
        Expr::This => {
            flat.has_this = true;
            Ok(())
        }
        Expr::Global => {
            flat.has_global = true;
            Ok(())
        }
        Expr::Member { base, member } => {
            flatten_target(base, flat)?;
            flat.path.push(member);
            Ok(())
        }
        Expr::Index { base, index, line } => {
            flatten_target(base, flat)?;
            flat.subscripts.push(Subscript::Index {
                expr: index,
                line: *line,
                anchor: flat.path.len(),
            });
            Ok(())
        }
        Expr::Range {
            base,
            start,
            width,
            line,
        } => {
            flatten_target(base, flat)?;
            flat.subscripts.push(Subscript::Range {
                start,
                width,
                line: *line,
                anchor: flat.path.len(),
            });
            Ok(())
        }
        Expr::Paren(inner) => flatten_target(inner, flat),
        _ => Err(CodegenError::Internal(
            "unsupported assignment target expression".to_string(),
        )),
    }
}

impl CodegenState {
    /// Produce exactly one kind plus the prepared context for an assignment.
    pub fn classify_assignment<'a>(
        &mut self,
        stmt: &'a AssignStmt,
    ) -> GenResult<(AssignmentKind, AssignmentContext<'a>)> {
        let mut flat = FlatTarget::default();
        flatten_target(&stmt.target, &mut flat)?;
        if flat.path.is_empty() {
            return Err(CodegenError::Internal(
                "assignment target has no identifier path".to_string(),
            ));
        }
        let line = stmt.line;
        let rhs = self.emit_expression(&stmt.value)?;

        let mut ctx = AssignmentContext {
            path: flat.path.iter().map(|s| s.to_string()).collect(),
            has_this: flat.has_this,
            has_global: flat.has_global,
            has_member_access: flat.path.len() > 1 || flat.has_this || flat.has_global,
            has_array_access: !flat.subscripts.is_empty(),
            is_simple_identifier: !flat.has_this
                && !flat.has_global
                && flat.path.len() == 1
                && flat.subscripts.is_empty(),
            is_simple_this_access: flat.has_this
                && flat.path.len() == 1
                && flat.subscripts.is_empty(),
            is_simple_global_access: flat.has_global
                && flat.path.len() == 1
                && flat.subscripts.is_empty(),
            member_access_depth: flat.path.len() - 1
                + usize::from(flat.has_this || flat.has_global),
            subscript_depth: flat.subscripts.len(),
            op: stmt.op,
            c_op: stmt.op.c_token(),
            rhs,
            value: &stmt.value,
            target_name: String::new(),
            base_identifier: String::new(),
            line,
            target_width: 0,
            bit_field: None,
            register: None,
            element_type: None,
            string_capacity: 0,
            array_dims: Vec::new(),
            subscripts: flat.subscripts,
        };

        // Register targets have their own resolution path
        if let Some(kind) = self.classify_register_target(&mut ctx)? {
            return Ok((kind, ctx));
        }

        // Resolve the base identifier (scope prefixing, visibility)
        let consumed = self.resolve_assignment_base(&mut ctx)?;
        let base_info = self
            .type_registry
            .get(&ctx.base_identifier)
            .cloned()
            .or_else(|| self.lookup_type_info(&ctx.base_identifier));

        let kind = self.classify_resolved(&mut ctx, consumed, base_info)?;
        Ok((kind, ctx))
    }

    // =========================================================================
    // Base resolution
    // =========================================================================

    /// Resolve the leading path segments to the emitted base identifier.
    /// Returns how many path segments the base consumed.
    fn resolve_assignment_base(&mut self, ctx: &mut AssignmentContext) -> GenResult<usize> {
        let line = ctx.line;
        if ctx.has_this {
            let scope = self.current_scope.clone().ok_or_else(|| {
                CodegenError::rule(
                    ErrorCode::ScopeVisibility,
                    "'this' used outside a scope".to_string(),
                    line,
                )
            })?;
            ctx.base_identifier = format!("{}_{}", scope, ctx.path[0]);
            return Ok(1);
        }
        if ctx.has_global {
            if ctx.path.len() >= 2 && self.symbols.is_scope(&ctx.path[0]) {
                self.validate_scope_access(&ctx.path[0].clone(), &ctx.path[1].clone(), true, line)?;
                ctx.base_identifier = format!("{}_{}", ctx.path[0], ctx.path[1]);
                return Ok(2);
            }
            ctx.base_identifier = ctx.path[0].clone();
            return Ok(1);
        }
        if ctx.path.len() >= 2 && self.symbols.is_scope(&ctx.path[0]) {
            self.validate_scope_access(&ctx.path[0].clone(), &ctx.path[1].clone(), false, line)?;
            ctx.base_identifier = format!("{}_{}", ctx.path[0], ctx.path[1]);
            return Ok(2);
        }
        let name = ctx.path[0].clone();
        if !self.current_parameters.contains_key(&name)
            && !self.local_variables.contains(&name)
            && !self.local_arrays.contains(&name)
        {
            self.validate_unqualified_identifier(&name, line)?;
        }
        ctx.base_identifier = name;
        Ok(1)
    }

    // =========================================================================
    // Register targets
    // =========================================================================

    /// Detect `REG.MEMBER…` forms across the qualification variants and
    /// classify the register-family kinds.
    fn classify_register_target(
        &mut self,
        ctx: &mut AssignmentContext,
    ) -> GenResult<Option<AssignmentKind>> {
        let (register, member_idx, scoped) = match self.find_register_path(ctx) {
            Some(found) => found,
            None => return Ok(None),
        };
        // Cross-scope access to a scoped register honors visibility
        if scoped && !ctx.has_this {
            if let Some((scope, short_name)) = register.split_once('_') {
                self.validate_scope_access(scope, short_name, ctx.has_global, ctx.line)?;
            }
        }
        let member = ctx.path[member_idx].clone();
        let Some(info) = self.symbols.register_member(&register, &member).cloned() else {
            return Err(CodegenError::Internal(format!(
                "register '{}' has no member '{}'",
                register, member
            )));
        };
        let Some(reg_info) = self.symbols.registers.get(&register) else {
            return Err(CodegenError::Internal(format!(
                "register '{}' vanished from the symbol table",
                register
            )));
        };

        if info.access.is_read_only() {
            return Err(CodegenError::rule(
                ErrorCode::ConstWrite,
                format!("register member '{}_{}' is read-only", register, member),
                ctx.line,
            ));
        }

        ctx.register = Some(RegisterTarget {
            register: register.clone(),
            member: member.clone(),
            base_address: reg_info.base_address,
            offset: info.offset,
            access: info.access,
            scoped,
        });
        ctx.base_identifier = format!("{}_{}", register, member);
        ctx.target_name = ctx.base_identifier.clone();
        ctx.target_width = self.width_of_type(&info.type_name).unwrap_or(32);
        ctx.element_type = Some(info.type_name.clone());
        self.needs_stdint = true;

        let trailing_range = ctx
            .subscripts
            .last()
            .is_some_and(|s| s.is_range() && s.anchor() == ctx.path.len());
        let trailing_bit = ctx
            .subscripts
            .last()
            .is_some_and(|s| !s.is_range() && s.anchor() == ctx.path.len());

        if trailing_range || trailing_bit {
            if ctx.op.is_compound() {
                return Err(CodegenError::rule(
                    ErrorCode::CompoundBitWrite,
                    "compound assignment is not allowed on a bit target".to_string(),
                    ctx.line,
                ));
            }
            let kind = match (trailing_range, scoped) {
                (true, false) => AssignmentKind::GlobalRegisterBitRange,
                (true, true) => AssignmentKind::ScopedRegisterBitRange,
                (false, false) => AssignmentKind::GlobalRegisterBit,
                (false, true) => AssignmentKind::ScopedRegisterBit,
            };
            return Ok(Some(kind));
        }

        // A further path segment selects a bitmap field of the member
        if member_idx + 1 < ctx.path.len() {
            let field = ctx.path[member_idx + 1].clone();
            let Some((offset, width)) = self.symbols.bitmap_field(&info.type_name, &field) else {
                return Err(CodegenError::Internal(format!(
                    "'{}' is not a field of bitmap '{}'",
                    field, info.type_name
                )));
            };
            crate::validate::validate_bitmap_field_write(width, ctx.value, ctx.line)?;
            ctx.bit_field = Some((offset, width));
            let kind = if scoped {
                AssignmentKind::ScopedRegisterMemberBitmapField
            } else {
                AssignmentKind::RegisterMemberBitmapField
            };
            return Ok(Some(kind));
        }

        // Whole-member register write lowers through the simple handler
        Ok(Some(AssignmentKind::Simple))
    }

    fn find_register_path(&self, ctx: &AssignmentContext) -> Option<(String, usize, bool)> {
        let path = &ctx.path;
        if ctx.has_this {
            let scope = self.current_scope.as_deref()?;
            if path.len() >= 2 {
                let mangled = format!("{}_{}", scope, path[0]);
                if self.symbols.is_register(&mangled) {
                    return Some((mangled, 1, true));
                }
            }
            return None;
        }
        if ctx.has_global {
            if path.len() >= 2 && self.symbols.is_register(&path[0]) {
                return Some((path[0].clone(), 1, false));
            }
            if path.len() >= 3 && self.symbols.is_scope(&path[0]) {
                let mangled = format!("{}_{}", path[0], path[1]);
                if self.symbols.is_register(&mangled) {
                    return Some((mangled, 2, true));
                }
            }
            return None;
        }
        if path.len() >= 2 && self.symbols.is_register(&path[0]) {
            return Some((path[0].clone(), 1, false));
        }
        if path.len() >= 3 && self.symbols.is_scope(&path[0]) {
            let mangled = format!("{}_{}", path[0], path[1]);
            if self.symbols.is_register(&mangled) {
                return Some((mangled, 2, true));
            }
        }
        None
    }

    // =========================================================================
    // Non-register classification
    // =========================================================================

    fn classify_resolved(
        &mut self,
        ctx: &mut AssignmentContext,
        consumed: usize,
        base_info: Option<TypeInfo>,
    ) -> GenResult<AssignmentKind> {
        let line = ctx.line;
        let remaining: Vec<String> = ctx.path[consumed..].to_vec();
        let trailing = ctx
            .subscripts
            .last()
            .filter(|s| s.anchor() == ctx.path.len());
        let trailing_is_range = trailing.is_some_and(|s| s.is_range());
        let trailing_is_index = trailing.is_some_and(|s| !s.is_range());

        if let Some(info) = &base_info {
            ctx.target_width = if info.bit_width != 0 {
                info.bit_width
            } else {
                32
            };
            ctx.element_type = Some(info.base_type.clone());
            ctx.string_capacity = info.string_capacity;
            ctx.array_dims = info.array_dimensions.clone();
        }

        // Const target check applies before anything emits
        let base_name = ctx.base_identifier.clone();
        self.validate_const_target(&base_name, line)?;

        // -------- Rule 1: bounded string destinations
        let rhs_is_string = matches!(ctx.value, Expr::StringLiteral(_))
            || self.expression_type(ctx.value).as_deref() == Some("string");
        if rhs_is_string {
            if let Some(kind) = self.classify_string_target(ctx, &remaining, &base_info)? {
                if ctx.op.is_compound() {
                    return Err(CodegenError::rule(
                        ErrorCode::CompoundBitWrite,
                        "compound assignment is not allowed on a string target".to_string(),
                        line,
                    ));
                }
                return Ok(kind);
            }
        }

        // -------- Rule 2: atomic RMW on a bare atomic identifier
        if ctx.is_simple_identifier && ctx.op.is_compound() {
            if let Some(info) = &base_info {
                if info.is_atomic && supports_atomic_op(ctx.op) {
                    ctx.target_name = ctx.base_identifier.clone();
                    return Ok(AssignmentKind::AtomicRmw);
                }
            }
        }

        // -------- Rule 3: clamped overflow behavior
        if let Some(info) = &base_info {
            if info.overflow == crate::ast::OverflowBehavior::Clamp
                && matches!(ctx.op, AssignOp::Add | AssignOp::Sub | AssignOp::Mul)
                && is_integer_type(&info.base_type)
                && remaining.is_empty()
                && ctx.subscripts.is_empty()
            {
                ctx.target_name = ctx.base_identifier.clone();
                return Ok(AssignmentKind::OverflowClamp);
            }
        }

        // -------- Rule 4: trailing range subscript
        if trailing_is_range {
            if ctx.op.is_compound() {
                return Err(CodegenError::rule(
                    ErrorCode::CompoundBitWrite,
                    "compound assignment is not allowed on a range target".to_string(),
                    line,
                ));
            }
            // Slice assignment onto an array
            if let Some(info) = &base_info {
                if info.is_array && remaining.is_empty() {
                    let Some(Subscript::Range { start, width, .. }) = ctx.subscripts.last()
                    else {
                        unreachable!("trailing range checked above");
                    };
                    validate_slice_bounds(&info.array_dimensions, start, width, line)?;
                    ctx.target_name = ctx.base_identifier.clone();
                    return Ok(AssignmentKind::ArraySlice);
                }
            }
            // Multi-member chain re-routes to the chain bit-range form
            self.resolve_member_chain_target(ctx, consumed, true)?;
            self.apply_chain_end_type(ctx, &base_info, &remaining);
            if !remaining.is_empty() {
                return Ok(AssignmentKind::StructChainBitRange);
            }
            return Ok(AssignmentKind::IntegerBitRange);
        }

        // -------- Rule 5: trailing single-bit subscript
        if trailing_is_index {
            let is_array_element_write = base_info
                .as_ref()
                .is_some_and(|info| info.is_array && ctx.subscripts.len() <= info.array_dimensions.len());
            if !is_array_element_write {
                if ctx.op.is_compound() {
                    return Err(CodegenError::rule(
                        ErrorCode::CompoundBitWrite,
                        "compound assignment is not allowed on a bit target".to_string(),
                        line,
                    ));
                }
                // Bitmap field bit? plain integer bit? struct member bit?
                self.resolve_member_chain_target(ctx, consumed, true)?;
                self.apply_chain_end_type(ctx, &base_info, &remaining);
                let dims = base_info
                    .as_ref()
                    .map(|i| i.array_dimensions.len())
                    .unwrap_or(0);
                if dims > 0 && ctx.subscripts.len() == dims + 1 && remaining.is_empty() {
                    return Ok(AssignmentKind::ArrayElementBit);
                }
                if !remaining.is_empty() {
                    return Ok(AssignmentKind::StructMemberBit);
                }
                return Ok(AssignmentKind::IntegerBit);
            }
        }

        // -------- Rule 6: bitmap field select
        if let Some(kind) = self.classify_bitmap_field(ctx, consumed, &base_info)? {
            return Ok(kind);
        }

        // -------- Rule 8: array element writes
        if let Some(info) = &base_info {
            if info.is_array && !ctx.subscripts.is_empty() && remaining.is_empty() {
                let indices: Vec<&Expr> = ctx
                    .subscripts
                    .iter()
                    .map(|s| match s {
                        Subscript::Index { expr, .. } => *expr,
                        Subscript::Range { start, .. } => *start,
                    })
                    .collect();
                validate_array_bounds(&info.array_dimensions, &indices, line)?;
                self.resolve_member_chain_target(ctx, consumed, false)?;
                if ctx.has_this {
                    return Ok(AssignmentKind::ThisArray);
                }
                if ctx.has_global {
                    return Ok(AssignmentKind::GlobalArray);
                }
                if info.array_dimensions.len() > 1 {
                    return Ok(AssignmentKind::MultiDimArrayElement);
                }
                return Ok(AssignmentKind::ArrayElement);
            }
        }

        // -------- Rules 9/10: this.X / global.X
        if ctx.is_simple_this_access {
            ctx.target_name = ctx.base_identifier.clone();
            return Ok(AssignmentKind::ThisMember);
        }
        if ctx.is_simple_global_access {
            ctx.target_name = ctx.base_identifier.clone();
            return Ok(AssignmentKind::GlobalMember);
        }

        // -------- Rule 11: member chains (the bit-access analyzer already
        // rerouted bit/range endings above)
        if !remaining.is_empty() || !ctx.subscripts.is_empty() {
            self.resolve_member_chain_target(ctx, consumed, false)?;
            self.apply_chain_end_type(ctx, &base_info, &remaining);
            return Ok(AssignmentKind::MemberChain);
        }

        // -------- Rule 12: fallback
        ctx.target_name = ctx.base_identifier.clone();
        Ok(AssignmentKind::Simple)
    }

    /// String-destination shapes (rule 1).
    fn classify_string_target(
        &mut self,
        ctx: &mut AssignmentContext,
        remaining: &[String],
        base_info: &Option<TypeInfo>,
    ) -> GenResult<Option<AssignmentKind>> {
        // Direct string variable (scalar or array element)
        if let Some(info) = base_info {
            if info.is_string && remaining.is_empty() {
                if info.is_array {
                    if ctx.subscripts.len() == 1 {
                        let consumed = ctx.path.len();
                        self.resolve_member_chain_target(ctx, consumed, false)?;
                        ctx.string_capacity = info.string_capacity;
                        return Ok(Some(AssignmentKind::StringArrayElement));
                    }
                } else if ctx.subscripts.is_empty() {
                    ctx.target_name = ctx.base_identifier.clone();
                    ctx.string_capacity = info.string_capacity;
                    let kind = if ctx.has_this {
                        AssignmentKind::StringThisMember
                    } else if ctx.has_global {
                        AssignmentKind::StringGlobal
                    } else {
                        AssignmentKind::StringSimple
                    };
                    return Ok(Some(kind));
                }
            }
        }
        // Struct field string: s.name or s.names[i]
        if remaining.len() == 1 {
            if let Some(info) = base_info {
                if let Some(field_ty) = self
                    .symbols
                    .struct_field_type(&info.base_type, &remaining[0])
                    .map(str::to_string)
                {
                    if base_type_token(&field_ty) == "string" {
                        ctx.string_capacity = string_capacity_of(&field_ty).unwrap_or(0);
                        let consumed = ctx.path.len() - 1;
                        self.resolve_member_chain_target(ctx, consumed, false)?;
                        let field_is_array = self
                            .symbols
                            .struct_array_dims(&info.base_type, &remaining[0])
                            .is_some();
                        let kind = if field_is_array && !ctx.subscripts.is_empty() {
                            AssignmentKind::StringStructArrayElement
                        } else {
                            AssignmentKind::StringStructField
                        };
                        return Ok(Some(kind));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Bitmap field shapes (rule 6).
    fn classify_bitmap_field(
        &mut self,
        ctx: &mut AssignmentContext,
        consumed: usize,
        base_info: &Option<TypeInfo>,
    ) -> GenResult<Option<AssignmentKind>> {
        let remaining: Vec<String> = ctx.path[consumed..].to_vec();
        if remaining.is_empty() {
            return Ok(None);
        }
        let Some(field) = remaining.last().cloned() else {
            return Ok(None);
        };

        // Determine the type the field is selected on: the base itself, the
        // base array element, or a struct member along the chain
        let Some(info) = base_info else {
            return Ok(None);
        };
        let holder_ty = if remaining.len() == 1 {
            info.bitmap_type_name.clone()
        } else {
            // Walk struct fields up to the second-to-last segment
            let mut current = info.base_type.clone();
            for segment in &remaining[..remaining.len() - 1] {
                match self.symbols.struct_field_type(&current, segment) {
                    Some(ty) => current = base_type_token(ty).to_string(),
                    None => return Ok(None),
                }
            }
            self.symbols.is_bitmap_type(&current).then_some(current)
        };
        let Some(bitmap_ty) = holder_ty else {
            return Ok(None);
        };
        let Some((offset, width)) = self.symbols.bitmap_field(&bitmap_ty, &field) else {
            return Ok(None);
        };
        if ctx.op.is_compound() {
            return Err(CodegenError::rule(
                ErrorCode::CompoundBitWrite,
                "compound assignment is not allowed on a bitmap field".to_string(),
                ctx.line,
            ));
        }
        crate::validate::validate_bitmap_field_write(width, ctx.value, ctx.line)?;
        ctx.bit_field = Some((offset, width));
        ctx.target_width = self
            .symbols
            .bitmaps
            .get(&bitmap_ty)
            .map(|b| b.bit_width)
            .unwrap_or(32);

        // Build the backing lvalue (everything except the field segment)
        self.resolve_bitmap_backing_target(ctx, consumed, &remaining)?;

        if remaining.len() > 1 {
            return Ok(Some(AssignmentKind::StructMemberBitmapField));
        }
        if info.is_array && !ctx.subscripts.is_empty() {
            return Ok(Some(AssignmentKind::BitmapArrayElementField));
        }
        let kind = if width == 1 {
            AssignmentKind::BitmapFieldSingleBit
        } else {
            AssignmentKind::BitmapFieldMultiBit
        };
        Ok(Some(kind))
    }

    /// Build `target_name` for a bitmap write: the backing lvalue without
    /// the trailing field segment.
    fn resolve_bitmap_backing_target(
        &mut self,
        ctx: &mut AssignmentContext,
        consumed: usize,
        remaining: &[String],
    ) -> GenResult<()> {
        let mut text = ctx.base_identifier.clone();
        let chain_segments = &remaining[..remaining.len() - 1];
        let mut segment_position = consumed;
        for subscript in &ctx.subscripts {
            if subscript.anchor() <= segment_position {
                text.push_str(&self.emit_subscript_text(subscript)?);
            }
        }
        for segment in chain_segments {
            segment_position += 1;
            text.push('.');
            text.push_str(segment);
            for subscript in &ctx.subscripts {
                if subscript.anchor() == segment_position {
                    text.push_str(&self.emit_subscript_text(subscript)?);
                }
            }
        }
        ctx.target_name = text;
        Ok(())
    }

    /// Build `target_name` for chain/array targets: base identifier, then
    /// members and subscripts in source order. `exclude_trailing` drops the
    /// final bit/range subscript from the lvalue text.
    fn resolve_member_chain_target(
        &mut self,
        ctx: &mut AssignmentContext,
        consumed: usize,
        exclude_trailing: bool,
    ) -> GenResult<()> {
        let usable = if exclude_trailing && !ctx.subscripts.is_empty() {
            ctx.subscripts.len() - 1
        } else {
            ctx.subscripts.len()
        };

        let mut text = ctx.base_identifier.clone();
        let mut emitted = 0usize;
        // Subscripts anchored at the base
        for subscript in ctx.subscripts.iter().take(usable) {
            if subscript.anchor() <= consumed {
                text.push_str(&self.emit_subscript_text(subscript)?);
                emitted += 1;
            }
        }
        for (offset, segment) in ctx.path[consumed..].iter().enumerate() {
            let position = consumed + offset + 1;
            text.push('.');
            text.push_str(segment);
            for subscript in ctx.subscripts.iter().take(usable).skip(emitted) {
                if subscript.anchor() == position {
                    text.push_str(&self.emit_subscript_text(subscript)?);
                    emitted += 1;
                }
            }
        }
        ctx.target_name = text;
        Ok(())
    }

    fn emit_subscript_text(&mut self, subscript: &Subscript<'_>) -> GenResult<String> {
        match subscript {
            Subscript::Index { expr, .. } => {
                let text = self.emit_expression(expr)?;
                Ok(format!("[{}]", text))
            }
            Subscript::Range { start, .. } => {
                let text = self.emit_expression(start)?;
                Ok(format!("[{}]", text))
            }
        }
    }
}

impl CodegenState {
    /// Set `target_width`/`element_type` from the type at the end of a
    /// member chain, so bit handlers mask at the field's width rather than
    /// the base struct's.
    fn apply_chain_end_type(
        &self,
        ctx: &mut AssignmentContext,
        base_info: &Option<TypeInfo>,
        remaining: &[String],
    ) {
        let Some(info) = base_info else {
            return;
        };
        if remaining.is_empty() {
            return;
        }
        let mut current = info.base_type.clone();
        for segment in remaining {
            match self.symbols.struct_field_type(&current, segment) {
                Some(ty) => current = base_type_token(ty).to_string(),
                None => return,
            }
        }
        if let Some(width) = self.width_of_type(&current) {
            ctx.target_width = width;
        }
        ctx.element_type = Some(current);
    }
}

/// Compound operators the atomic fetch builtins support.
fn supports_atomic_op(op: AssignOp) -> bool {
    matches!(
        op,
        AssignOp::Add | AssignOp::Sub | AssignOp::BitAnd | AssignOp::BitOr | AssignOp::BitXor
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::OverflowBehavior;
    use crate::config::{Mode, TargetCapabilities};
    use crate::symbols::{
        BitmapInfo, RegisterInfo, RegisterMemberInfo, SymbolInfo,
    };
    use std::collections::HashMap;

    fn state() -> CodegenState {
        CodegenState::new(SymbolInfo::new(), Mode::C, TargetCapabilities::default())
    }

    fn assign(target: Expr, op: AssignOp, value: Expr) -> AssignStmt {
        AssignStmt {
            target,
            op,
            value,
            line: 1,
        }
    }

    fn classify(cg: &mut CodegenState, stmt: &AssignStmt) -> AssignmentKind {
        cg.classify_assignment(stmt).unwrap().0
    }

    fn index(base: Expr, i: &str) -> Expr {
        Expr::Index {
            base: Box::new(base),
            index: Box::new(Expr::int(i)),
            line: 1,
        }
    }

    fn range(base: Expr, start: &str, width: &str) -> Expr {
        Expr::Range {
            base: Box::new(base),
            start: Box::new(Expr::int(start)),
            width: Box::new(Expr::int(width)),
            line: 1,
        }
    }

    fn member(base: Expr, name: &str) -> Expr {
        Expr::Member {
            base: Box::new(base),
            member: name.to_string(),
        }
    }

    #[test]
    fn test_simple_identifier() {
        let mut cg = state();
        cg.type_registry
            .insert("x".to_string(), TypeInfo::scalar("u8"));
        cg.local_variables.insert("x".to_string());
        let stmt = assign(Expr::ident("x"), AssignOp::Set, Expr::int("1"));
        assert_eq!(classify(&mut cg, &stmt), AssignmentKind::Simple);
    }

    #[test]
    fn test_integer_bit() {
        let mut cg = state();
        cg.type_registry
            .insert("flags".to_string(), TypeInfo::scalar("u8"));
        cg.local_variables.insert("flags".to_string());
        let stmt = assign(
            index(Expr::ident("flags"), "3"),
            AssignOp::Set,
            Expr::BoolLiteral(true),
        );
        let (kind, ctx) = cg.classify_assignment(&stmt).unwrap();
        assert_eq!(kind, AssignmentKind::IntegerBit);
        assert_eq!(ctx.target_name, "flags");
        assert_eq!(ctx.target_width, 8);
    }

    #[test]
    fn test_integer_bit_range() {
        let mut cg = state();
        cg.type_registry
            .insert("x".to_string(), TypeInfo::scalar("u32"));
        cg.local_variables.insert("x".to_string());
        let stmt = assign(
            range(Expr::ident("x"), "4", "8"),
            AssignOp::Set,
            Expr::int("0xAB"),
        );
        assert_eq!(classify(&mut cg, &stmt), AssignmentKind::IntegerBitRange);
    }

    #[test]
    fn test_array_slice_vs_bit_range() {
        let mut cg = state();
        let mut arr = TypeInfo::scalar("u8");
        arr.is_array = true;
        arr.array_dimensions = vec![8];
        cg.type_registry.insert("buf".to_string(), arr);
        cg.local_arrays.insert("buf".to_string());
        let stmt = assign(
            range(Expr::ident("buf"), "2", "3"),
            AssignOp::Set,
            Expr::ident("src"),
        );
        assert_eq!(classify(&mut cg, &stmt), AssignmentKind::ArraySlice);
    }

    #[test]
    fn test_array_element_kinds() {
        let mut cg = state();
        let mut arr = TypeInfo::scalar("u8");
        arr.is_array = true;
        arr.array_dimensions = vec![4];
        cg.type_registry.insert("buf".to_string(), arr);
        cg.local_arrays.insert("buf".to_string());
        let stmt = assign(index(Expr::ident("buf"), "2"), AssignOp::Set, Expr::int("1"));
        assert_eq!(classify(&mut cg, &stmt), AssignmentKind::ArrayElement);

        let mut grid = TypeInfo::scalar("u8");
        grid.is_array = true;
        grid.array_dimensions = vec![2, 3];
        cg.type_registry.insert("grid".to_string(), grid);
        cg.local_arrays.insert("grid".to_string());
        let stmt = assign(
            index(index(Expr::ident("grid"), "1"), "2"),
            AssignOp::Set,
            Expr::int("1"),
        );
        assert_eq!(classify(&mut cg, &stmt), AssignmentKind::MultiDimArrayElement);
    }

    #[test]
    fn test_array_element_bit() {
        let mut cg = state();
        let mut arr = TypeInfo::scalar("u8");
        arr.is_array = true;
        arr.array_dimensions = vec![4];
        cg.type_registry.insert("buf".to_string(), arr);
        cg.local_arrays.insert("buf".to_string());
        // buf[1][3] <- true: second subscript exceeds the dimensions, so it
        // is a bit write into the element
        let stmt = assign(
            index(index(Expr::ident("buf"), "1"), "3"),
            AssignOp::Set,
            Expr::BoolLiteral(true),
        );
        let (kind, ctx) = cg.classify_assignment(&stmt).unwrap();
        assert_eq!(kind, AssignmentKind::ArrayElementBit);
        assert_eq!(ctx.target_name, "buf[1]");
    }

    #[test]
    fn test_atomic_and_clamp() {
        let mut cg = state();
        let mut counter = TypeInfo::scalar("u32");
        counter.is_atomic = true;
        cg.type_registry.insert("counter".to_string(), counter);
        cg.local_variables.insert("counter".to_string());
        let stmt = assign(Expr::ident("counter"), AssignOp::Add, Expr::int("5"));
        assert_eq!(classify(&mut cg, &stmt), AssignmentKind::AtomicRmw);

        let mut clamped = TypeInfo::scalar("u8");
        clamped.overflow = OverflowBehavior::Clamp;
        cg.type_registry.insert("c".to_string(), clamped);
        cg.local_variables.insert("c".to_string());
        let stmt = assign(Expr::ident("c"), AssignOp::Add, Expr::int("200"));
        assert_eq!(classify(&mut cg, &stmt), AssignmentKind::OverflowClamp);

        // Plain set on an atomic stays simple
        let stmt = assign(Expr::ident("counter"), AssignOp::Set, Expr::int("0"));
        assert_eq!(classify(&mut cg, &stmt), AssignmentKind::Simple);
    }

    #[test]
    fn test_string_kinds() {
        let mut cg = state();
        let mut s = TypeInfo::scalar("string");
        s.is_string = true;
        s.string_capacity = 32;
        cg.type_registry.insert("name".to_string(), s);
        cg.local_variables.insert("name".to_string());
        let stmt = assign(
            Expr::ident("name"),
            AssignOp::Set,
            Expr::StringLiteral("hi".to_string()),
        );
        let (kind, ctx) = cg.classify_assignment(&stmt).unwrap();
        assert_eq!(kind, AssignmentKind::StringSimple);
        assert_eq!(ctx.string_capacity, 32);
    }

    #[test]
    fn test_register_kinds() {
        let mut cg = state();
        let mut members = HashMap::new();
        members.insert(
            "DR_SET".to_string(),
            RegisterMemberInfo {
                offset: 0x84,
                access: AccessMode::Wo,
                type_name: "u32".to_string(),
            },
        );
        members.insert(
            "DR".to_string(),
            RegisterMemberInfo {
                offset: 0x00,
                access: AccessMode::Rw,
                type_name: "u32".to_string(),
            },
        );
        cg.symbols.registers.insert(
            "GPIO7".to_string(),
            RegisterInfo {
                base_address: 0x401B_8000,
                members,
            },
        );

        let stmt = assign(
            index(member(Expr::ident("GPIO7"), "DR_SET"), "5"),
            AssignOp::Set,
            Expr::BoolLiteral(true),
        );
        let (kind, ctx) = cg.classify_assignment(&stmt).unwrap();
        assert_eq!(kind, AssignmentKind::GlobalRegisterBit);
        assert_eq!(ctx.base_identifier, "GPIO7_DR_SET");
        assert!(ctx.register.as_ref().unwrap().access.is_write_only());

        let stmt = assign(
            range(member(Expr::ident("GPIO7"), "DR"), "0", "8"),
            AssignOp::Set,
            Expr::int("0xFF"),
        );
        assert_eq!(classify(&mut cg, &stmt), AssignmentKind::GlobalRegisterBitRange);

        // Whole-member write lowers through the simple handler
        let stmt = assign(
            member(Expr::ident("GPIO7"), "DR"),
            AssignOp::Set,
            Expr::int("0"),
        );
        assert_eq!(classify(&mut cg, &stmt), AssignmentKind::Simple);
    }

    #[test]
    fn test_bitmap_field_kinds() {
        let mut cg = state();
        let mut fields = HashMap::new();
        fields.insert("Ready".to_string(), (0u32, 1u32));
        fields.insert("Mode".to_string(), (1u32, 3u32));
        cg.symbols.bitmaps.insert(
            "Flags".to_string(),
            BitmapInfo {
                backing_type: "u8".to_string(),
                bit_width: 8,
                fields,
            },
        );
        let mut info = TypeInfo::scalar("Flags");
        info.bitmap_type_name = Some("Flags".to_string());
        info.bit_width = 8;
        cg.type_registry.insert("status".to_string(), info);
        cg.local_variables.insert("status".to_string());

        let stmt = assign(
            member(Expr::ident("status"), "Ready"),
            AssignOp::Set,
            Expr::BoolLiteral(true),
        );
        assert_eq!(classify(&mut cg, &stmt), AssignmentKind::BitmapFieldSingleBit);

        let stmt = assign(
            member(Expr::ident("status"), "Mode"),
            AssignOp::Set,
            Expr::int("5"),
        );
        assert_eq!(classify(&mut cg, &stmt), AssignmentKind::BitmapFieldMultiBit);

        // Value wider than the field is rejected
        let stmt = assign(
            member(Expr::ident("status"), "Mode"),
            AssignOp::Set,
            Expr::int("8"),
        );
        assert!(cg.classify_assignment(&stmt).is_err());
    }

    #[test]
    fn test_member_chain() {
        let mut cg = state();
        let mut fields = HashMap::new();
        fields.insert("baud".to_string(), "u32".to_string());
        cg.symbols.struct_fields.insert("Config".to_string(), fields);
        let info = TypeInfo::scalar("Config");
        cg.type_registry.insert("cfg".to_string(), info);
        cg.local_variables.insert("cfg".to_string());

        let stmt = assign(
            member(Expr::ident("cfg"), "baud"),
            AssignOp::Set,
            Expr::int("9600"),
        );
        let (kind, ctx) = cg.classify_assignment(&stmt).unwrap();
        assert_eq!(kind, AssignmentKind::MemberChain);
        assert_eq!(ctx.target_name, "cfg.baud");
    }

    #[test]
    fn test_compound_on_bit_rejected() {
        let mut cg = state();
        cg.type_registry
            .insert("flags".to_string(), TypeInfo::scalar("u8"));
        cg.local_variables.insert("flags".to_string());
        let stmt = assign(
            index(Expr::ident("flags"), "3"),
            AssignOp::Add,
            Expr::int("1"),
        );
        let err = cg.classify_assignment(&stmt).unwrap_err();
        match err {
            CodegenError::Rule(d) => assert_eq!(d.code, ErrorCode::CompoundBitWrite),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_const_write_rejected_at_classification() {
        let mut cg = state();
        let mut info = TypeInfo::scalar("u8");
        info.is_const = true;
        cg.type_registry.insert("limit".to_string(), info);
        cg.local_variables.insert("limit".to_string());
        let stmt = assign(Expr::ident("limit"), AssignOp::Set, Expr::int("1"));
        assert!(cg.classify_assignment(&stmt).is_err());
    }
}
