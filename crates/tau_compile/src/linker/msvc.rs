//! MSVC-style link driver (`link.exe`): slash-prefixed options.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{Linker, OptimizationLevel, OutputKind, Visibility};

pub struct MsvcLinker {
    driver: String,
    args: Vec<String>,
    output_kind: OutputKind,
    output_file: Option<PathBuf>,
    level: OptimizationLevel,
    debugging: bool,
}

impl MsvcLinker {
    pub fn new() -> Self {
        Self::with_driver("link.exe")
    }

    pub fn with_driver(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            args: Vec::new(),
            output_kind: OutputKind::default(),
            output_file: None,
            level: OptimizationLevel::default(),
            debugging: false,
        }
    }

    fn push(&mut self, arg: impl Into<String>) {
        self.args.push(arg.into());
    }

    /// The full argument line `link()` would run, for inspection.
    pub fn command_line(&self) -> Vec<String> {
        let mut line = vec!["/NOLOGO".to_string()];
        line.extend(self.args.iter().cloned());

        match self.output_kind {
            OutputKind::DynamicNonPie | OutputKind::StaticNonPie => {
                line.push("/FIXED".into());
            }
            OutputKind::DynamicPie | OutputKind::StaticPie => {
                line.push("/DYNAMICBASE".into());
            }
            OutputKind::DynamicLibrary | OutputKind::DynamicLibraryLibc => {
                line.push("/DLL".into());
            }
        }

        if let Some(output) = &self.output_file {
            line.push(format!("/OUT:{}", output.display()));
        }

        // link.exe itself only distinguishes size/speed preferences.
        match self.level {
            OptimizationLevel::None | OptimizationLevel::Debug => {}
            OptimizationLevel::Size => line.push("/OPT:REF,ICF".into()),
            OptimizationLevel::Less
            | OptimizationLevel::Default
            | OptimizationLevel::Aggressive
            | OptimizationLevel::Speed => line.push("/OPT:REF".into()),
        }

        if self.debugging {
            line.push("/DEBUG".into());
        }

        line
    }

    fn reset(&mut self) {
        self.args.clear();
        self.output_kind = OutputKind::default();
        self.output_file = None;
        self.level = OptimizationLevel::default();
        self.debugging = false;
    }
}

impl Default for MsvcLinker {
    fn default() -> Self {
        Self::new()
    }
}

impl Linker for MsvcLinker {
    fn add_object(&mut self, path: &Path) {
        self.push(path.display().to_string());
    }

    fn add_library_directory(&mut self, path: &Path) {
        self.push(format!("/LIBPATH:{}", path.display()));
    }

    fn add_static_library_by_name(&mut self, name: &str) {
        self.push(format!("{}.lib", name));
    }

    fn add_static_library_by_path(&mut self, path: &Path) {
        self.push(path.display().to_string());
    }

    fn add_dynamic_library_by_name(&mut self, name: &str) {
        // Dynamic linking goes through the import library.
        self.push(format!("{}.lib", name));
    }

    fn add_dynamic_library_by_path(&mut self, path: &Path) {
        self.push(path.display().to_string());
    }

    fn set_output_kind(&mut self, kind: OutputKind) {
        self.output_kind = kind;
    }

    fn set_output_file(&mut self, path: &Path) {
        self.output_file = Some(path.to_path_buf());
    }

    fn set_optimization_level(&mut self, level: OptimizationLevel) {
        self.level = level;
    }

    fn set_debugging(&mut self, debugging: bool) {
        self.debugging = debugging;
    }

    fn set_entry_point(&mut self, name: &str) {
        self.push(format!("/ENTRY:{}", name));
    }

    fn set_visibility(&mut self, _visibility: Visibility) {
        // Symbol visibility is an ELF concept; PE exports are explicit.
    }

    fn add_flag(&mut self, flag: &str) {
        self.push(flag);
    }

    fn link(&mut self) -> io::Result<bool> {
        let line = self.command_line();
        let status = Command::new(&self.driver).args(&line).status()?;
        self.reset();
        Ok(status.success())
    }
}
