//! GCC-style link driver.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{Linker, OptimizationLevel, OutputKind, Visibility};

/// Drives a GCC-compatible front-end (`gcc` by default).
pub struct GccLinker {
    driver: String,
    args: Vec<String>,
    output_kind: OutputKind,
    output_file: Option<PathBuf>,
    level: OptimizationLevel,
    visibility: Visibility,
    debugging: bool,
}

impl GccLinker {
    pub fn new() -> Self {
        Self::with_driver("gcc")
    }

    /// Uses a different GCC-compatible driver binary (`clang`, `cc`, …).
    pub fn with_driver(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            args: Vec::new(),
            output_kind: OutputKind::default(),
            output_file: None,
            level: OptimizationLevel::default(),
            visibility: Visibility::default(),
            debugging: false,
        }
    }

    fn push(&mut self, arg: impl Into<String>) {
        self.args.push(arg.into());
    }

    fn hint_static(&mut self) {
        self.push("-Bstatic");
    }

    fn hint_dynamic(&mut self) {
        self.push("-Bdynamic");
    }

    /// The full argument line `link()` would run, for inspection.
    pub fn command_line(&self) -> Vec<String> {
        let mut line = self.args.clone();

        match self.output_kind {
            OutputKind::DynamicNonPie => line.push("-no-pie".into()),
            OutputKind::DynamicPie => {
                line.push("-fPIE".into());
                line.push("-pie".into());
            }
            OutputKind::StaticNonPie => {
                line.push("-static".into());
                line.push("-no-pie".into());
            }
            OutputKind::StaticPie => {
                line.push("-static".into());
                line.push("-fPIE".into());
                line.push("-pie".into());
            }
            OutputKind::DynamicLibrary => {
                line.push("-shared".into());
                line.push("-fPIC".into());
            }
            OutputKind::DynamicLibraryLibc => {
                line.push("-shared".into());
                line.push("-fPIC".into());
                line.push("-static-libgcc".into());
                line.push("-Wl,-Bstatic".into());
                line.push("-lc".into());
                line.push("-Wl,-Bdynamic".into());
            }
        }

        if let Some(output) = &self.output_file {
            line.push("-o".into());
            line.push(output.display().to_string());
        }

        line.push(
            match self.level {
                OptimizationLevel::None => "-O0",
                OptimizationLevel::Less => "-O1",
                OptimizationLevel::Default => "-O2",
                OptimizationLevel::Aggressive => "-O3",
                OptimizationLevel::Size => "-Os",
                OptimizationLevel::Speed => "-Ofast",
                OptimizationLevel::Debug => "-Og",
            }
            .into(),
        );

        if self.debugging {
            line.push("-g".into());
        }

        line.push(
            match self.visibility {
                Visibility::Default => "-fvisibility=default",
                Visibility::Hidden => "-fvisibility=hidden",
                Visibility::Protected => "-fvisibility=protected",
            }
            .into(),
        );

        line
    }

    fn reset(&mut self) {
        self.args.clear();
        self.output_kind = OutputKind::default();
        self.output_file = None;
        self.level = OptimizationLevel::default();
        self.visibility = Visibility::default();
        self.debugging = false;
    }
}

impl Default for GccLinker {
    fn default() -> Self {
        Self::new()
    }
}

impl Linker for GccLinker {
    fn add_object(&mut self, path: &Path) {
        self.push(path.display().to_string());
    }

    fn add_library_directory(&mut self, path: &Path) {
        self.push(format!("-L{}", path.display()));
    }

    fn add_static_library_by_name(&mut self, name: &str) {
        self.hint_static();
        self.push(format!("-l{}", name));
    }

    fn add_static_library_by_path(&mut self, path: &Path) {
        self.hint_static();
        self.push(format!("-l{}", path.display()));
    }

    fn add_dynamic_library_by_name(&mut self, name: &str) {
        self.hint_dynamic();
        self.push(format!("-l{}", name));
    }

    fn add_dynamic_library_by_path(&mut self, path: &Path) {
        self.hint_dynamic();
        self.push(format!("-l{}", path.display()));
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
        self.push(format!("-Wl,--entry={}", name));
    }

    fn set_visibility(&mut self, visibility: Visibility) {
        self.visibility = visibility;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_and_directories_appear_in_order() {
        let mut linker = GccLinker::new();
        linker.add_object(Path::new("a.obj"));
        linker.add_object(Path::new("b.obj"));
        linker.add_library_directory(Path::new("/usr/local/lib"));
        linker.add_dynamic_library_by_name("m");

        let line = linker.command_line();
        assert_eq!(&line[..4], &["a.obj", "b.obj", "-L/usr/local/lib", "-Bdynamic"]);
        assert!(line.contains(&"-lm".to_string()));
    }

    #[test]
    fn static_libraries_get_a_static_hint() {
        let mut linker = GccLinker::new();
        linker.add_static_library_by_name("ssl");
        let line = linker.command_line();
        let static_pos = line.iter().position(|a| a == "-Bstatic").unwrap();
        assert_eq!(line[static_pos + 1], "-lssl");
    }

    #[test]
    fn output_kind_maps_to_pie_flags() {
        let mut linker = GccLinker::new();
        linker.set_output_kind(OutputKind::StaticPie);
        let line = linker.command_line();
        assert!(line.contains(&"-static".to_string()));
        assert!(line.contains(&"-fPIE".to_string()));
        assert!(line.contains(&"-pie".to_string()));
    }

    #[test]
    fn shared_library_with_bundled_libc() {
        let mut linker = GccLinker::new();
        linker.set_output_kind(OutputKind::DynamicLibraryLibc);
        let line = linker.command_line();
        assert!(line.contains(&"-shared".to_string()));
        assert!(line.contains(&"-static-libgcc".to_string()));
        assert!(line.contains(&"-lc".to_string()));
    }

    #[test]
    fn output_optimization_debug_and_visibility() {
        let mut linker = GccLinker::new();
        linker.set_output_file(Path::new("app"));
        linker.set_optimization_level(OptimizationLevel::Aggressive);
        linker.set_debugging(true);
        linker.set_visibility(Visibility::Hidden);

        let line = linker.command_line();
        let o = line.iter().position(|a| a == "-o").unwrap();
        assert_eq!(line[o + 1], "app");
        assert!(line.contains(&"-O3".to_string()));
        assert!(line.contains(&"-g".to_string()));
        assert!(line.contains(&"-fvisibility=hidden".to_string()));
    }

    #[test]
    fn link_resets_the_driver_state() {
        // `true` ignores its arguments and exits 0, which is all the
        // reset contract needs.
        let mut linker = GccLinker::with_driver("true");
        linker.add_object(Path::new("a.obj"));
        linker.set_debugging(true);
        linker.set_output_kind(OutputKind::DynamicPie);

        let ok = linker.link().expect("driver spawns");
        assert!(ok);

        let line = linker.command_line();
        assert!(!line.contains(&"a.obj".to_string()));
        assert!(!line.contains(&"-g".to_string()));
        assert!(!line.contains(&"-pie".to_string()));
    }

    #[test]
    fn failing_driver_reports_false() {
        let mut linker = GccLinker::with_driver("false");
        let ok = linker.link().expect("driver spawns");
        assert!(!ok);
    }
}
