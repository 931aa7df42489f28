//! Cross-cutting semantic rules.
//!
//! Every violation produces a structured error with a stable code and a
//! message naming the offending construct. The emitters call these checks
//! before producing any text, so a failed statement never emits partial C.

use std::path::{Path, PathBuf};

use crate::ast::{DefaultCase, Expr, IncludeDecl, Stmt, SwitchStmt, UnaryOp};
use crate::codegen::CodegenState;
use crate::diagnostics::{CodegenError, ErrorCode, GenResult};
use crate::symbols::CallbackSignature;
use crate::resolver::const_int_value;

// ============================================================================
//                              INCLUDE RULES
// ============================================================================

const IMPLEMENTATION_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx", "c++"];

/// Reject includes of implementation files and of C headers that have a
/// source-language alternative next to the including file or on an include
/// path. Malformed directives are ignored.
pub fn validate_include(
    decl: &IncludeDecl,
    source_path: &Path,
    include_paths: &[PathBuf],
) -> GenResult<()> {
    let path = decl.path.trim();
    if path.is_empty() {
        return Ok(());
    }
    let Some((stem, extension)) = path.rsplit_once('.') else {
        return Ok(());
    };
    let extension = extension.to_ascii_lowercase();
    if IMPLEMENTATION_EXTENSIONS.contains(&extension.as_str()) {
        return Err(CodegenError::rule(
            ErrorCode::IncludeImplementationFile,
            format!("cannot include implementation file '{}'", path),
            decl.line,
        ));
    }
    if extension == "h" || extension == "hpp" {
        let alternative = format!("{}.cnx", stem);
        let mut candidates = Vec::new();
        if let Some(parent) = source_path.parent() {
            candidates.push(parent.join(&alternative));
        }
        for include_path in include_paths {
            candidates.push(include_path.join(&alternative));
        }
        if let Some(found) = candidates.iter().find(|c| c.is_file()) {
            return Err(CodegenError::rule(
                ErrorCode::IncludeHasAlternative,
                format!(
                    "include '{}' has a C-Next alternative at '{}'; include that instead",
                    path,
                    found.display()
                ),
                decl.line,
            ));
        }
    }
    Ok(())
}

// ============================================================================
//                              SWITCH RULES
// ============================================================================

impl CodegenState {
    /// All switch-statement rules: scrutinee shape, clause minimum,
    /// duplicate labels, and enum exhaustiveness.
    pub fn validate_switch(&self, stmt: &SwitchStmt) -> GenResult<()> {
        let scrutinee_ty = self.expression_type(&stmt.value);
        if scrutinee_ty.as_deref() == Some("bool") {
            return Err(CodegenError::rule(
                ErrorCode::SwitchOnBool,
                "switch on a boolean value; use if/else (MISRA 16.7)".to_string(),
                stmt.line,
            ));
        }

        let clause_count = stmt.cases.len() + usize::from(stmt.default.is_some());
        if clause_count < 2 {
            return Err(CodegenError::rule(
                ErrorCode::SwitchTooFewClauses,
                format!(
                    "switch has {} clause{}; at least two are required (MISRA 16.6)",
                    clause_count,
                    if clause_count == 1 { "" } else { "s" }
                ),
                stmt.line,
            ));
        }

        let enum_name = self.enum_type_of_expression(&stmt.value);
        self.check_duplicate_cases(stmt, enum_name.as_deref())?;
        if let Some(enum_name) = enum_name {
            self.check_switch_exhaustive(stmt, &enum_name)?;
        }
        Ok(())
    }

    /// Normalize every label (hex/binary/char literals to decimal, enum
    /// members to their declared value) and reject duplicates.
    fn check_duplicate_cases(&self, stmt: &SwitchStmt, enum_name: Option<&str>) -> GenResult<()> {
        let mut seen: Vec<(i128, usize)> = Vec::new();
        for case in &stmt.cases {
            for label in &case.labels {
                let Some(value) = self.normalized_case_value(label, enum_name) else {
                    continue;
                };
                if let Some((_, first_line)) = seen.iter().find(|(v, _)| *v == value) {
                    return Err(CodegenError::rule(
                        ErrorCode::DuplicateCaseValue,
                        format!(
                            "duplicate case value {} (first used on line {})",
                            value, first_line
                        ),
                        case.line,
                    ));
                }
                seen.push((value, case.line));
            }
        }
        Ok(())
    }

    /// An enum switch must cover every variant, either explicitly, through a
    /// plain `default`, or through a `default(N)` whose count matches the
    /// residue exactly.
    fn check_switch_exhaustive(&self, stmt: &SwitchStmt, enum_name: &str) -> GenResult<()> {
        let Some(info) = self.symbols.enums.get(enum_name) else {
            return Ok(());
        };
        let mut covered: Vec<String> = Vec::new();
        for case in &stmt.cases {
            for label in &case.labels {
                if let Some(variant) = self.case_label_variant(label) {
                    if info.contains(&variant) && !covered.contains(&variant) {
                        covered.push(variant);
                    }
                }
            }
        }
        let total = info.len();
        let missing = total - covered.len();

        match &stmt.default {
            None if missing > 0 => Err(CodegenError::rule(
                ErrorCode::NonExhaustiveSwitch,
                format!(
                    "Non-exhaustive switch on '{}': covers {} of {} variants, missing {}",
                    enum_name,
                    covered.len(),
                    total,
                    missing
                ),
                stmt.line,
            )),
            Some(DefaultCase {
                expected_remaining: Some(declared),
                ..
            }) if *declared as usize != missing => Err(CodegenError::rule(
                ErrorCode::NonExhaustiveSwitch,
                format!(
                    "default({}) does not match the {} uncovered variant{} of '{}' \
                     ({} of {} covered)",
                    declared,
                    missing,
                    if missing == 1 { "" } else { "s" },
                    enum_name,
                    covered.len(),
                    total
                ),
                stmt.line,
            )),
            _ => Ok(()),
        }
    }

    /// The variant name a case label refers to, across qualification forms.
    fn case_label_variant(&self, label: &Expr) -> Option<String> {
        match label {
            Expr::Member { member, .. } => Some(member.clone()),
            Expr::Paren(inner) => self.case_label_variant(inner),
            _ => None,
        }
    }

    /// Numeric value of a case label after normalization.
    fn normalized_case_value(&self, label: &Expr, enum_name: Option<&str>) -> Option<i128> {
        if let Some(value) = const_int_value(label) {
            return Some(value);
        }
        let enum_name = enum_name?;
        let variant = self.case_label_variant(label)?;
        self.symbols
            .enums
            .get(enum_name)?
            .value_of(&variant)
            .map(i128::from)
    }
}

// ============================================================================
//                      CONDITIONS, TERNARY, SHIFTS
// ============================================================================

impl CodegenState {
    /// Function calls are banned from `if`/`while`/ternary/do-while
    /// conditions (MISRA 13.5).
    pub fn validate_no_call_in_condition(
        &self,
        cond: &Expr,
        construct: &str,
        line: usize,
    ) -> GenResult<()> {
        if cond.contains_call() {
            return Err(CodegenError::rule(
                ErrorCode::CallInCondition,
                format!("function call in {} condition (MISRA 13.5)", construct),
                line,
            ));
        }
        Ok(())
    }

    /// Ternary and do-while conditions must be boolean-shaped: `||`, `&&`,
    /// equality, relational, a `true`/`false` literal, `!…`, or an
    /// identifier of registered type `bool`.
    pub fn validate_boolean_condition(
        &self,
        cond: &Expr,
        construct: &str,
        line: usize,
    ) -> GenResult<()> {
        if self.is_boolean_expression(cond) {
            return Ok(());
        }
        Err(CodegenError::rule(
            ErrorCode::NonBooleanCondition,
            format!("{} condition must be a boolean expression", construct),
            line,
        ))
    }

    pub(crate) fn is_boolean_expression(&self, e: &Expr) -> bool {
        match e {
            Expr::Binary { op, .. } => op.yields_bool(),
            Expr::BoolLiteral(_) => true,
            Expr::Unary {
                op: UnaryOp::Not, ..
            } => true,
            Expr::Identifier(_) | Expr::Member { .. } | Expr::Index { .. } => {
                self.expression_type(e).as_deref() == Some("bool")
            }
            Expr::Paren(inner) => self.is_boolean_expression(inner),
            _ => false,
        }
    }

    /// A ternary branch must not itself be a ternary.
    pub fn validate_no_nested_ternary(
        &self,
        then_value: &Expr,
        else_value: &Expr,
        line: usize,
    ) -> GenResult<()> {
        for branch in [then_value, else_value] {
            let mut inner = branch;
            while let Expr::Paren(next) = inner {
                inner = next;
            }
            if matches!(inner, Expr::Ternary { .. }) {
                return Err(CodegenError::rule(
                    ErrorCode::NestedTernary,
                    "ternary nested inside a ternary branch".to_string(),
                    line,
                ));
            }
        }
        Ok(())
    }

    /// For a compile-time shift amount `s` on a `width`-bit operand,
    /// require `0 <= s < width`. Negative shifts are always rejected.
    pub fn validate_shift_amount(&self, width: u32, shift: &Expr, line: usize) -> GenResult<()> {
        let Some(amount) = const_int_value(shift) else {
            return Ok(());
        };
        if amount < 0 {
            return Err(CodegenError::rule(
                ErrorCode::ShiftOutOfRange,
                format!("negative shift amount {}", amount),
                line,
            ));
        }
        if amount >= i128::from(width) {
            return Err(CodegenError::rule(
                ErrorCode::ShiftOutOfRange,
                format!(
                    "shift amount {} out of range for {}-bit operand",
                    amount, width
                ),
                line,
            ));
        }
        Ok(())
    }
}

// ============================================================================
//                      BITMAPS, ARRAYS, SLICES
// ============================================================================

/// A literal written to a bitmap field must fit the field's width.
/// Non-literal values are not range-checked here.
pub fn validate_bitmap_field_write(width: u32, value: &Expr, line: usize) -> GenResult<()> {
    let Some(v) = const_int_value(value) else {
        return Ok(());
    };
    let max = if width >= 64 {
        u64::MAX as i128
    } else {
        (1i128 << width) - 1
    };
    if v < 0 || v > max {
        return Err(CodegenError::rule(
            ErrorCode::BitmapFieldOverflow,
            format!("value {} does not fit in a {}-bit field", v, width),
            line,
        ));
    }
    Ok(())
}

/// Constant indices must satisfy `0 <= index < dim` per dimension; a zero
/// dimension means unsized and skips the upper bound.
pub fn validate_array_bounds(dims: &[u32], indices: &[&Expr], line: usize) -> GenResult<()> {
    for (dim, index) in dims.iter().zip(indices.iter()) {
        let Some(value) = const_int_value(index) else {
            continue;
        };
        if value < 0 {
            return Err(CodegenError::rule(
                ErrorCode::ArrayIndexOutOfBounds,
                format!("negative array index {}", value),
                line,
            ));
        }
        if *dim != 0 && value >= i128::from(*dim) {
            return Err(CodegenError::rule(
                ErrorCode::ArrayIndexOutOfBounds,
                format!("index {} out of bounds for dimension {}", value, dim),
                line,
            ));
        }
    }
    Ok(())
}

/// Slice assignment preconditions: one-dimensional target, constant offset
/// and length, positive length, and `offset + length <= dim`.
pub fn validate_slice_bounds(
    dims: &[u32],
    offset: &Expr,
    length: &Expr,
    line: usize,
) -> GenResult<(i128, i128)> {
    if dims.len() != 1 {
        return Err(CodegenError::rule(
            ErrorCode::InvalidSliceBounds,
            "slice assignment requires a one-dimensional array".to_string(),
            line,
        ));
    }
    let (Some(off), Some(len)) = (const_int_value(offset), const_int_value(length)) else {
        return Err(CodegenError::rule(
            ErrorCode::InvalidSliceBounds,
            "slice offset and length must be compile-time constants".to_string(),
            line,
        ));
    };
    if off < 0 || len <= 0 {
        return Err(CodegenError::rule(
            ErrorCode::InvalidSliceBounds,
            format!("invalid slice bounds [{}, {}]", off, len),
            line,
        ));
    }
    let dim = dims[0];
    if dim != 0 && off + len > i128::from(dim) {
        return Err(CodegenError::rule(
            ErrorCode::InvalidSliceBounds,
            format!(
                "slice [{}, {}] exceeds array dimension {}",
                off, len, dim
            ),
            line,
        ));
    }
    Ok((off, len))
}

// ============================================================================
//                  CONST, CALLBACKS, CRITICAL SECTIONS
// ============================================================================

impl CodegenState {
    /// Writes through a const variable or parameter are rejected.
    pub fn validate_const_target(&self, name: &str, line: usize) -> GenResult<()> {
        if let Some(param) = self.current_parameters.get(name) {
            if param.is_const {
                return Err(CodegenError::rule(
                    ErrorCode::ConstWrite,
                    format!("cannot assign to const parameter '{}'", name),
                    line,
                ));
            }
            return Ok(());
        }
        if let Some(info) = self.lookup_type_info(name) {
            if info.is_const {
                return Err(CodegenError::rule(
                    ErrorCode::ConstWrite,
                    format!("cannot assign to const variable '{}'", name),
                    line,
                ));
            }
        }
        Ok(())
    }

    /// Assigning a function name to a typed callback target requires
    /// structural signature equality plus the nominal check: a name that is
    /// itself used as a declared field type denotes a type, not a function.
    pub fn validate_callback_assignment(
        &self,
        expected: &CallbackSignature,
        func_name: &str,
        line: usize,
    ) -> GenResult<()> {
        if self.symbols.is_field_type_name(func_name) {
            return Err(CodegenError::rule(
                ErrorCode::CallbackSignatureMismatch,
                format!(
                    "'{}' names a callback type used in a field declaration, not a function",
                    func_name
                ),
                line,
            ));
        }
        let Some(actual) = self.symbols.functions.get(func_name) else {
            return Err(CodegenError::rule(
                ErrorCode::CallbackSignatureMismatch,
                format!("unknown function '{}' assigned to callback", func_name),
                line,
            ));
        };
        if actual.return_type != expected.return_type {
            return Err(CodegenError::rule(
                ErrorCode::CallbackSignatureMismatch,
                format!(
                    "callback expects return type '{}' but '{}' returns '{}'",
                    expected.return_type, func_name, actual.return_type
                ),
                line,
            ));
        }
        if actual.params.len() != expected.params.len() {
            return Err(CodegenError::rule(
                ErrorCode::CallbackSignatureMismatch,
                format!(
                    "callback expects {} parameter(s) but '{}' takes {}",
                    expected.params.len(),
                    func_name,
                    actual.params.len()
                ),
                line,
            ));
        }
        for (i, (want, have)) in expected.params.iter().zip(actual.params.iter()).enumerate() {
            if want != have {
                return Err(CodegenError::rule(
                    ErrorCode::CallbackSignatureMismatch,
                    format!(
                        "parameter {} of '{}' does not match the callback signature",
                        i + 1,
                        func_name
                    ),
                    line,
                ));
            }
        }
        Ok(())
    }
}

/// A `return` at any nested depth inside a `critical` block is rejected:
/// it would leave interrupts disabled.
pub fn validate_critical_body(body: &[Stmt], critical_line: usize) -> GenResult<()> {
    for stmt in body {
        check_no_return(stmt, critical_line)?;
    }
    Ok(())
}

fn check_no_return(stmt: &Stmt, critical_line: usize) -> GenResult<()> {
    match stmt {
        Stmt::Return { line, .. } => Err(CodegenError::rule(
            ErrorCode::CriticalSectionExit,
            format!(
                "return inside critical section (opened on line {}) would skip interrupt re-enable",
                critical_line
            ),
            *line,
        )),
        Stmt::If {
            then_branch,
            else_branch,
            ..
        } => {
            validate_critical_body(then_branch, critical_line)?;
            if let Some(else_branch) = else_branch {
                validate_critical_body(else_branch, critical_line)?;
            }
            Ok(())
        }
        Stmt::While { body, .. }
        | Stmt::DoWhile { body, .. }
        | Stmt::For { body, .. }
        | Stmt::Critical { body, .. } => validate_critical_body(body, critical_line),
        Stmt::Switch(switch) => {
            for case in &switch.cases {
                validate_critical_body(&case.body, critical_line)?;
            }
            if let Some(default) = &switch.default {
                validate_critical_body(&default.body, critical_line)?;
            }
            Ok(())
        }
        Stmt::Block(body) => validate_critical_body(body, critical_line),
        _ => Ok(()),
    }
}
