//! C-Next backend CLI.
//!
//! Consumes the frontend's serialized bundle (AST + token stream + symbol
//! table as JSON) and writes the generated C translation unit. The parser
//! and symbol resolver live in the frontend; this binary is the backend
//! half of the toolchain.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use cnxc::{GenOptions, GenerateError, Mode, Program, SymbolInfo, TargetCapabilities, TokenStream};

/// The frontend's output: everything one generation run consumes.
#[derive(Debug, Deserialize)]
struct FrontendBundle {
    source_path: PathBuf,
    program: Program,
    #[serde(default)]
    tokens: TokenStream,
    symbols: SymbolInfo,
}

#[derive(Parser)]
#[command(name = "cnxc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "C-Next backend - generate MISRA-C from frontend bundles", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a C translation unit from a frontend bundle
    Generate {
        /// Frontend bundle (JSON: source_path, program, tokens, symbols)
        input: PathBuf,

        /// Output path (defaults to the bundle's source path with .c/.cpp)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit C++-compatible output
        #[arg(long)]
        cpp: bool,

        /// Target capability file (TOML)
        #[arg(long, value_name = "PATH")]
        target: Option<PathBuf>,

        /// Additional include search paths for include-rule checking
        #[arg(short = 'I', long = "include-path", value_name = "DIR")]
        include_paths: Vec<PathBuf>,
    },

    /// Validate a frontend bundle without writing output
    Check {
        /// Frontend bundle (JSON)
        input: PathBuf,

        /// Validate against C++-compatible output rules
        #[arg(long)]
        cpp: bool,

        /// Target capability file (TOML)
        #[arg(long, value_name = "PATH")]
        target: Option<PathBuf>,

        /// Additional include search paths for include-rule checking
        #[arg(short = 'I', long = "include-path", value_name = "DIR")]
        include_paths: Vec<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            input,
            output,
            cpp,
            target,
            include_paths,
        } => run_generate(&input, output, cpp, target.as_deref(), include_paths),
        Commands::Check {
            input,
            cpp,
            target,
            include_paths,
        } => run_check(&input, cpp, target.as_deref(), include_paths),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "cnxc", &mut io::stdout());
        }
    }
}

fn load_bundle(path: &Path) -> FrontendBundle {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading bundle '{}': {}", path.display(), e);
            process::exit(1);
        }
    };
    match serde_json::from_str(&content) {
        Ok(bundle) => bundle,
        Err(e) => {
            eprintln!("Error parsing bundle '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}

fn load_options(
    bundle: &FrontendBundle,
    cpp: bool,
    target: Option<&Path>,
    include_paths: Vec<PathBuf>,
) -> GenOptions {
    let mut options = GenOptions::new(bundle.source_path.clone());
    options.mode = if cpp { Mode::Cpp } else { Mode::C };
    options.include_paths = include_paths;
    if let Some(target_path) = target {
        let content = match std::fs::read_to_string(target_path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Error reading target config '{}': {}", target_path.display(), e);
                process::exit(1);
            }
        };
        match TargetCapabilities::from_toml(&content) {
            Ok(caps) => options.target = caps,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    }
    options
}

fn run_generate(
    input: &Path,
    output: Option<PathBuf>,
    cpp: bool,
    target: Option<&Path>,
    include_paths: Vec<PathBuf>,
) {
    let bundle = load_bundle(input);
    let options = load_options(&bundle, cpp, target, include_paths);
    let output = output.unwrap_or_else(|| {
        bundle
            .source_path
            .with_extension(if cpp { "cpp" } else { "c" })
    });

    match cnxc::generate_unit(&bundle.program, &bundle.tokens, &bundle.symbols, &options) {
        Ok(unit) => {
            for warning in &unit.warnings {
                eprintln!("{}", warning);
            }
            if let Err(e) = std::fs::write(&output, unit.code) {
                eprintln!("Error writing '{}': {}", output.display(), e);
                process::exit(1);
            }
            println!(
                "Generated {} -> {}",
                bundle.source_path.display(),
                output.display()
            );
        }
        Err(err) => report_failure(err),
    }
}

fn run_check(input: &Path, cpp: bool, target: Option<&Path>, include_paths: Vec<PathBuf>) {
    let bundle = load_bundle(input);
    let options = load_options(&bundle, cpp, target, include_paths);

    match cnxc::check_unit(&bundle.program, &bundle.tokens, &bundle.symbols, &options) {
        Ok(warnings) => {
            for warning in &warnings {
                eprintln!("{}", warning);
            }
            println!("{}: OK", bundle.source_path.display());
        }
        Err(err) => report_failure(err),
    }
}

fn report_failure(err: GenerateError) -> ! {
    match err {
        GenerateError::Invalid(diagnostics) => {
            for d in &diagnostics {
                eprintln!("{}", d);
            }
            let errors = diagnostics
                .iter()
                .filter(|d| d.severity == cnxc::Severity::Error)
                .count();
            eprintln!("{} error(s)", errors);
        }
        GenerateError::Internal(msg) => {
            eprintln!("internal compiler error: {}", msg);
            eprintln!("this is a bug; please report it with the input bundle");
        }
    }
    process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_parses_minimal_json() {
        let json = r#"{
            "source_path": "app.cnx",
            "program": { "declarations": [] },
            "symbols": {
                "scopes": [],
                "scope_members": {},
                "struct_fields": {},
                "struct_array_fields": {},
                "enums": {},
                "bitmaps": {},
                "registers": {},
                "callbacks": {},
                "functions": {},
                "globals": [],
                "member_single_function": {}
            }
        }"#;
        let bundle: FrontendBundle = serde_json::from_str(json).unwrap();
        assert_eq!(bundle.source_path, PathBuf::from("app.cnx"));
        assert!(bundle.program.declarations.is_empty());
        assert!(bundle.tokens.tokens.is_empty());
    }

    #[test]
    fn test_bundle_round_trip_through_tempfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        std::fs::write(
            &path,
            r#"{
                "source_path": "blinky.cnx",
                "program": { "declarations": [] },
                "symbols": {
                    "scopes": [], "scope_members": {}, "struct_fields": {},
                    "struct_array_fields": {}, "enums": {}, "bitmaps": {},
                    "registers": {}, "callbacks": {}, "functions": {},
                    "globals": [], "member_single_function": {}
                }
            }"#,
        )
        .unwrap();
        let bundle = load_bundle(&path);
        let options = load_options(&bundle, false, None, vec![]);
        let unit =
            cnxc::generate_unit(&bundle.program, &bundle.tokens, &bundle.symbols, &options)
                .unwrap();
        assert!(unit.code.is_empty());
    }
}
