//! Command-line interface of the Tau compiler driver.

use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};

use tau_compile::compiler::CompileOptions;
use tau_compile::linker::{self, Linker, LinkerKind};
use tau_compile::Environment;

#[derive(Parser)]
#[command(name = "tauc")]
#[command(about = "The Tau compiler", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Input files: Tau sources (.tau) and pre-built objects (.o/.obj).
    #[arg(required = true, value_name = "input-file")]
    pub inputs: Vec<PathBuf>,

    /// Output file for the linked artifact.
    #[arg(short = 'o', long = "output", value_name = "file")]
    pub output: Option<PathBuf>,

    /// Intermediate dumps to write next to each input.
    #[arg(long = "emit", value_name = "kind")]
    pub emit: Vec<EmitKind>,

    /// Library search directories.
    #[arg(short = 'L', value_name = "dir")]
    pub lib_dirs: Vec<PathBuf>,

    /// Libraries to link against.
    #[arg(short = 'l', value_name = "name")]
    pub libs: Vec<String>,

    /// Narrate driver stages to stderr.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Diagnostic verbosity.
    #[arg(long = "log-level", value_name = "level", default_value = "normal")]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmitKind {
    Tokens,
    Ast,
    Ll,
    Bc,
    Asm,
    Obj,
}

impl EmitKind {
    /// Dumps the front-end can produce without a codegen backend.
    pub fn needs_backend(self) -> bool {
        !matches!(self, EmitKind::Tokens | EmitKind::Ast)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Quiet,
    Normal,
    Verbose,
}

fn is_object(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("o") | Some("obj")
    )
}

/// Entry point: compile every source, merge the units, then link any
/// pre-built objects. Returns the process exit code.
pub fn run(cli: Cli) -> i32 {
    let verbose = cli.verbose || cli.log_level == LogLevel::Verbose;
    let options = CompileOptions {
        emit_tokens: cli.emit.contains(&EmitKind::Tokens),
        emit_ast: cli.emit.contains(&EmitKind::Ast),
        verbose,
        ..CompileOptions::default()
    };

    if cli.emit.iter().any(|e| e.needs_backend()) && cli.log_level != LogLevel::Quiet {
        eprintln!("note: no code generation backend is installed; ll/bc/asm/obj dumps are unavailable");
    }

    let compiler = tau_compile::Compiler::new(options);
    let mut env = Environment::new();
    let mut objects = Vec::new();
    let mut success = true;

    for input in &cli.inputs {
        if is_object(input) {
            objects.push(input.clone());
            continue;
        }

        // Each unit gets its own environment; results merge afterwards.
        let mut unit_env = Environment::new();
        match compiler.compile_file(&mut unit_env, input) {
            Ok(ok) => {
                success &= ok;
                env.merge(unit_env);
            }
            Err(error) => {
                eprintln!("error: {}: {}", input.display(), error);
                success = false;
            }
        }
    }

    if success && !objects.is_empty() {
        success &= link_objects(&cli, &objects, verbose);
    }

    if success {
        0
    } else {
        1
    }
}

fn link_objects(cli: &Cli, objects: &[PathBuf], verbose: bool) -> bool {
    let kind = if cfg!(windows) {
        LinkerKind::Msvc
    } else {
        LinkerKind::Gcc
    };
    let mut linker = linker::create(kind);

    for object in objects {
        linker.add_object(object);
    }
    for dir in &cli.lib_dirs {
        linker.add_library_directory(dir);
    }
    for lib in &cli.libs {
        linker.add_dynamic_library_by_name(lib);
    }
    if let Some(output) = &cli.output {
        linker.set_output_file(output);
    }

    if verbose {
        eprintln!("linking {} object(s)", objects.len());
    }

    match linker.link() {
        Ok(ok) => {
            if !ok {
                eprintln!("error: linker exited with a failure status");
            }
            ok
        }
        Err(error) => {
            eprintln!("error: failed to spawn the linker: {}", error);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_invocation() {
        let cli = Cli::try_parse_from(["tauc", "main.tau"]).unwrap();
        assert_eq!(cli.inputs, [PathBuf::from("main.tau")]);
        assert!(cli.output.is_none());
        assert!(!cli.verbose);
        assert_eq!(cli.log_level, LogLevel::Normal);
    }

    #[test]
    fn parses_full_option_set() {
        let cli = Cli::try_parse_from([
            "tauc",
            "-o",
            "app",
            "--emit",
            "tokens",
            "--emit",
            "ast",
            "-L",
            "/usr/lib",
            "-l",
            "m",
            "-v",
            "--log-level",
            "verbose",
            "main.tau",
            "extra.o",
        ])
        .unwrap();

        assert_eq!(cli.output, Some(PathBuf::from("app")));
        assert_eq!(cli.emit, [EmitKind::Tokens, EmitKind::Ast]);
        assert_eq!(cli.lib_dirs, [PathBuf::from("/usr/lib")]);
        assert_eq!(cli.libs, ["m"]);
        assert!(cli.verbose);
        assert_eq!(cli.log_level, LogLevel::Verbose);
        assert_eq!(cli.inputs.len(), 2);
    }

    #[test]
    fn rejects_missing_inputs() {
        assert!(Cli::try_parse_from(["tauc"]).is_err());
    }

    #[test]
    fn backend_emits_are_flagged() {
        assert!(!EmitKind::Tokens.needs_backend());
        assert!(!EmitKind::Ast.needs_backend());
        assert!(EmitKind::Ll.needs_backend());
        assert!(EmitKind::Obj.needs_backend());
    }

    #[test]
    fn object_inputs_are_recognised_by_extension() {
        assert!(is_object(Path::new("a.o")));
        assert!(is_object(Path::new("b.obj")));
        assert!(!is_object(Path::new("main.tau")));
    }

    #[test]
    fn run_compiles_a_source_file_and_writes_dumps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.tau");
        std::fs::write(&path, "fun main() -> i32 { return 0 }\n").unwrap();

        let cli = Cli::try_parse_from([
            "tauc",
            "--emit",
            "tokens",
            "--emit",
            "ast",
            path.to_str().unwrap(),
        ])
        .unwrap();
        assert_eq!(run(cli), 0);

        assert!(dir.path().join("main.tokens.json").exists());
        assert!(dir.path().join("main.ast.json").exists());
    }

    #[test]
    fn run_exits_nonzero_on_semantic_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.tau");
        std::fs::write(&path, "fun h() { return nope }\n").unwrap();

        let cli = Cli::try_parse_from(["tauc", path.to_str().unwrap()]).unwrap();
        assert_eq!(run(cli), 1);
    }
}
