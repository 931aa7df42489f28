//! C-Next backend code generator.
//!
//! Consumes a parsed AST, token stream, and resolved symbol table (produced
//! by the frontend) and emits a MISRA-C-aligned translation unit together
//! with structured diagnostics.
//!
//! # Pipeline
//!
//! ```rust,ignore
//! use cnxc::{GenOptions, generate_unit};
//!
//! let options = GenOptions::new("app.cnx");
//! let unit = generate_unit(&program, &tokens, &symbols, &options)?;
//! std::fs::write("app.c", unit.code)?;
//! ```
//!
//! One [`codegen::CodegenState`] value is created per run and fully reset
//! before the walk; the AST, token stream, and symbol table are borrowed
//! read-only throughout. A failed run returns only diagnostics, never
//! partial C.

pub mod ast;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod resolver;
pub mod symbols;
pub mod types;
pub mod validate;

pub use ast::{Program, TokenStream};
pub use codegen::{AssignmentKind, CodegenState};
pub use config::{GenOptions, Mode, TargetCapabilities};
pub use diagnostics::{CodegenError, Diagnostic, ErrorCode, Severity};
pub use symbols::SymbolInfo;
pub use types::{ParameterInfo, TypeInfo};

/// A successfully generated translation unit plus any warnings.
#[derive(Debug)]
pub struct GeneratedUnit {
    pub code: String,
    pub warnings: Vec<Diagnostic>,
}

/// Failure of a generation run.
#[derive(Debug)]
pub enum GenerateError {
    /// The program violates language or MISRA rules
    Invalid(Vec<Diagnostic>),
    /// A broken compiler invariant; report as a bug
    Internal(String),
}

impl std::fmt::Display for GenerateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerateError::Invalid(diagnostics) => {
                for (i, d) in diagnostics.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", d)?;
                }
                Ok(())
            }
            GenerateError::Internal(msg) => write!(f, "internal compiler error: {}", msg),
        }
    }
}

impl std::error::Error for GenerateError {}

/// Generate one C translation unit.
///
/// Rule violations are collected per statement and declaration; if any
/// error-severity diagnostic was produced the run fails with the full set
/// and no code is returned.
pub fn generate_unit(
    program: &Program,
    tokens: &TokenStream,
    symbols: &SymbolInfo,
    options: &GenOptions,
) -> Result<GeneratedUnit, GenerateError> {
    let mut state = CodegenState::new(symbols.clone(), options.mode, options.target.clone());
    state.reset(None);

    let mut diagnostics = Vec::new();
    let body = match state.emit_translation_unit(program, tokens, options, &mut diagnostics) {
        Ok(body) => body,
        Err(CodegenError::Rule(d)) => {
            diagnostics.push(d);
            String::new()
        }
        Err(CodegenError::Internal(msg)) => return Err(GenerateError::Internal(msg)),
        Err(CodegenError::Format(e)) => return Err(GenerateError::Internal(e.to_string())),
    };
    let warnings = std::mem::take(&mut state.warnings);

    if !diagnostics.is_empty() {
        diagnostics.extend(warnings);
        return Err(GenerateError::Invalid(diagnostics));
    }

    let prelude = state.emit_prelude();
    Ok(GeneratedUnit {
        code: format!("{}{}", prelude, body),
        warnings,
    })
}

/// Run the full validation walk and return the diagnostics, discarding the
/// generated text.
pub fn check_unit(
    program: &Program,
    tokens: &TokenStream,
    symbols: &SymbolInfo,
    options: &GenOptions,
) -> Result<Vec<Diagnostic>, GenerateError> {
    match generate_unit(program, tokens, symbols, options) {
        Ok(unit) => Ok(unit.warnings),
        Err(err) => Err(err),
    }
}
