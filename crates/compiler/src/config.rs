//! Generation options and target capability configuration.

use serde::Deserialize;
use std::path::PathBuf;

/// Output language flavor. C++ mode keeps the output C-shaped but swaps the
/// few constructs C++ rejects (compound-literal unions, `_Static_assert`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    C,
    Cpp,
}

/// What the target hardware offers. Loadable from a TOML file so board
/// definitions can ship alongside projects.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TargetCapabilities {
    pub has_fpu: bool,
    pub has_hardware_divide: bool,
    /// Widest integer the target handles natively
    pub max_bit_width: u32,
    /// Load-link/store-conditional atomics (LDREX/STREX); targets without
    /// them fall back to compiler builtins
    pub has_llsc_atomics: bool,
    /// Header that provides the CMSIS intrinsics used for critical sections
    /// and LL/SC atomics
    pub cmsis_header: String,
}

impl Default for TargetCapabilities {
    fn default() -> Self {
        TargetCapabilities {
            has_fpu: true,
            has_hardware_divide: true,
            max_bit_width: 64,
            has_llsc_atomics: false,
            cmsis_header: "cmsis_compiler.h".to_string(),
        }
    }
}

impl TargetCapabilities {
    /// Parse a target capability file.
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse target config: {}", e))
    }
}

/// Options for one generation run.
#[derive(Debug, Clone, Default)]
pub struct GenOptions {
    pub source_path: PathBuf,
    pub mode: Mode,
    pub target: TargetCapabilities,
    /// Directories searched when checking whether an included C header has a
    /// `.cnx` alternative
    pub include_paths: Vec<PathBuf>,
}

impl GenOptions {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        GenOptions {
            source_path: source_path.into(),
            ..GenOptions::default()
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_target(mut self, target: TargetCapabilities) -> Self {
        self.target = target;
        self
    }

    pub fn with_include_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_paths.push(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_target_uses_builtin_atomics() {
        let target = TargetCapabilities::default();
        assert!(!target.has_llsc_atomics);
        assert_eq!(target.max_bit_width, 64);
        assert_eq!(target.cmsis_header, "cmsis_compiler.h");
    }

    #[test]
    fn test_target_from_toml() {
        let target = TargetCapabilities::from_toml(
            r#"
            has_fpu = false
            has_hardware_divide = false
            max_bit_width = 32
            has_llsc_atomics = true
            cmsis_header = "core_cm7.h"
            "#,
        )
        .unwrap();
        assert!(!target.has_fpu);
        assert!(target.has_llsc_atomics);
        assert_eq!(target.max_bit_width, 32);
        assert_eq!(target.cmsis_header, "core_cm7.h");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let target = TargetCapabilities::from_toml("has_llsc_atomics = true").unwrap();
        assert!(target.has_llsc_atomics);
        assert_eq!(target.cmsis_header, "cmsis_compiler.h");
    }

    #[test]
    fn test_options_builder() {
        let opts = GenOptions::new("app.cnx")
            .with_mode(Mode::Cpp)
            .with_include_path("include");
        assert_eq!(opts.mode, Mode::Cpp);
        assert_eq!(opts.include_paths.len(), 1);
    }
}
