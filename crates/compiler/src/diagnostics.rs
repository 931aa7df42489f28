//! Diagnostics and error types for the code generator.
//!
//! Validation failures are structured [`Diagnostic`] values carrying a stable
//! code, a message, and (when available) a source line. The generator never
//! recovers from a rule violation within a statement; the driver decides how
//! to present the collected diagnostics.

use std::path::PathBuf;

/// Stable identifiers for every rule the validators enforce.
///
/// The numeric codes are part of the tool's contract: scripts and editor
/// integrations key off them, so variants may be added but never renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Switch scrutinee is boolean (MISRA 16.7)
    SwitchOnBool,
    /// Switch has fewer than two clauses (MISRA 16.6)
    SwitchTooFewClauses,
    /// `#include` of an implementation file
    IncludeImplementationFile,
    /// `#include` of a C header that has a `.cnx` alternative
    IncludeHasAlternative,
    /// Duplicate case value after normalizing hex/binary/char literals
    DuplicateCaseValue,
    /// Enum switch does not cover every variant
    NonExhaustiveSwitch,
    /// Shift amount negative or >= the operand width
    ShiftOutOfRange,
    /// `sizeof` applied to an array parameter (would yield pointer size)
    SizeofArrayParameter,
    /// Expression with side effects inside `sizeof` (MISRA 13.6)
    SideEffectInSizeof,
    /// `sizeof` name is both a type and a variable in scope (warning)
    SizeofAmbiguity,
    /// Ternary or do-while condition is not a boolean expression
    NonBooleanCondition,
    /// Function call inside a condition (MISRA 13.5)
    CallInCondition,
    /// Ternary nested inside a ternary branch
    NestedTernary,
    /// Implicit conversion to a narrower integer type
    NarrowingConversion,
    /// Implicit conversion between signednesses
    SignConversion,
    /// Literal does not fit the target type's range
    LiteralOutOfRange,
    /// Negative literal assigned to an unsigned type
    NegativeIntoUnsigned,
    /// Literal wider than the bitmap field it is written to
    BitmapFieldOverflow,
    /// Constant array index outside the declared dimension
    ArrayIndexOutOfBounds,
    /// Slice offset/length violate the target array's bounds
    InvalidSliceBounds,
    /// Write through a `const` variable or parameter
    ConstWrite,
    /// Private member accessed from outside its scope, or a scope
    /// referring to itself by name instead of `this.`
    ScopeVisibility,
    /// `return` at any depth inside a `critical` block
    CriticalSectionExit,
    /// Unqualified identifier shadowing a scope-level name
    UnqualifiedScopeAccess,
    /// Function assigned to a callback with a different signature
    CallbackSignatureMismatch,
    /// Clearing write to a write-only register bit
    WriteOnlyViolation,
    /// Compound operator applied to a bit/range/slice/string target
    CompoundBitWrite,
}

impl ErrorCode {
    /// The stable `Exxxx` identifier for this code.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::SwitchOnBool => "E0501",
            ErrorCode::SwitchTooFewClauses => "E0502",
            ErrorCode::IncludeImplementationFile => "E0503",
            ErrorCode::IncludeHasAlternative => "E0504",
            ErrorCode::DuplicateCaseValue => "E0505",
            ErrorCode::NonExhaustiveSwitch => "E0506",
            ErrorCode::ShiftOutOfRange => "E0507",
            ErrorCode::SizeofArrayParameter => "E0601",
            ErrorCode::SideEffectInSizeof => "E0602",
            ErrorCode::SizeofAmbiguity => "E0603",
            ErrorCode::NonBooleanCondition => "E0701",
            ErrorCode::CallInCondition => "E0702",
            ErrorCode::NestedTernary => "E0703",
            ErrorCode::NarrowingConversion => "E0801",
            ErrorCode::SignConversion => "E0802",
            ErrorCode::LiteralOutOfRange => "E0803",
            ErrorCode::NegativeIntoUnsigned => "E0804",
            ErrorCode::BitmapFieldOverflow => "E0805",
            ErrorCode::ArrayIndexOutOfBounds => "E0806",
            ErrorCode::InvalidSliceBounds => "E0807",
            ErrorCode::ConstWrite => "E0851",
            ErrorCode::ScopeVisibility => "E0852",
            ErrorCode::CriticalSectionExit => "E0853",
            ErrorCode::UnqualifiedScopeAccess => "E0854",
            ErrorCode::CallbackSignatureMismatch => "E0855",
            ErrorCode::WriteOnlyViolation => "E0856",
            ErrorCode::CompoundBitWrite => "E0857",
        }
    }
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A structured diagnostic produced by the validators.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub severity: Severity,
    pub message: String,
    pub line: Option<usize>,
    pub path: Option<PathBuf>,
}

impl Diagnostic {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Diagnostic {
            code,
            severity: Severity::Error,
            message: message.into(),
            line: None,
            path: None,
        }
    }

    pub fn warning(code: ErrorCode, message: impl Into<String>) -> Self {
        Diagnostic {
            code,
            severity: Severity::Warning,
            message: message.into(),
            line: None,
            path: None,
        }
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}[{}]: {}", kind, self.code.as_str(), self.message)?;
        if let Some(line) = self.line {
            write!(f, " (line {})", line)?;
        }
        if let Some(path) = &self.path {
            write!(f, " [{}]", path.display())?;
        }
        Ok(())
    }
}

/// Error type for code generation operations.
///
/// `Rule` carries a validation diagnostic; `Internal` marks invariant
/// violations that indicate a compiler bug rather than a bad program.
#[derive(Debug)]
pub enum CodegenError {
    /// A language or MISRA rule violation in the input program
    Rule(Diagnostic),
    /// A broken internal invariant (missing handler, inconsistent context)
    Internal(String),
    /// A formatting error while writing output text
    Format(std::fmt::Error),
}

impl CodegenError {
    /// Shorthand for a rule violation with a source line.
    pub fn rule(code: ErrorCode, message: impl Into<String>, line: usize) -> Self {
        CodegenError::Rule(Diagnostic::error(code, message).with_line(line))
    }
}

impl std::fmt::Display for CodegenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodegenError::Rule(d) => write!(f, "{}", d),
            CodegenError::Internal(s) => write!(f, "internal error: {}", s),
            CodegenError::Format(e) => write!(f, "output generation error: {}", e),
        }
    }
}

impl std::error::Error for CodegenError {}

impl From<Diagnostic> for CodegenError {
    fn from(d: Diagnostic) -> Self {
        CodegenError::Rule(d)
    }
}

impl From<std::fmt::Error> for CodegenError {
    fn from(e: std::fmt::Error) -> Self {
        CodegenError::Format(e)
    }
}

/// Result alias used throughout the generator.
pub type GenResult<T> = Result<T, CodegenError>;
