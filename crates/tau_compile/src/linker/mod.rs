//! The linker abstraction.
//!
//! A [`Linker`] is a capability set over a concrete link driver: configure
//! the link line, then [`Linker::link`] spawns the driver as a child
//! process and blocks until it exits. The abstract layer never depends on
//! which back-end is present; callers pick one at construction time and
//! hold a `Box<dyn Linker>`.
//!
//! `link()` resets the driver to its initial state, so a linker object is
//! reusable across link lines.

pub mod gcc;
pub mod msvc;

use std::io;
use std::path::Path;

pub use gcc::GccLinker;
pub use msvc::MsvcLinker;

/// Concrete driver families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkerKind {
    /// GCC-style drivers (`gcc`, `clang`, …): dash-prefixed options.
    Gcc,
    /// MSVC-style drivers (`link.exe`): slash-prefixed options.
    Msvc,
}

/// What the link produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputKind {
    #[default]
    DynamicNonPie,
    DynamicPie,
    StaticNonPie,
    StaticPie,
    DynamicLibrary,
    /// A dynamic library with libc linked statically into it.
    DynamicLibraryLibc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizationLevel {
    None,
    Less,
    #[default]
    Default,
    Aggressive,
    Size,
    Speed,
    Debug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Default,
    Hidden,
    Protected,
}

/// The abstract linker interface.
pub trait Linker {
    fn add_object(&mut self, path: &Path);
    fn add_library_directory(&mut self, path: &Path);
    fn add_static_library_by_name(&mut self, name: &str);
    fn add_static_library_by_path(&mut self, path: &Path);
    fn add_dynamic_library_by_name(&mut self, name: &str);
    fn add_dynamic_library_by_path(&mut self, path: &Path);
    fn set_output_kind(&mut self, kind: OutputKind);
    fn set_output_file(&mut self, path: &Path);
    fn set_optimization_level(&mut self, level: OptimizationLevel);
    fn set_debugging(&mut self, debugging: bool);
    fn set_entry_point(&mut self, name: &str);
    fn set_visibility(&mut self, visibility: Visibility);
    /// Pass-through escape hatch for flags the abstraction does not model.
    fn add_flag(&mut self, flag: &str);
    /// Spawns the configured child process, waits for it, resets the
    /// driver, and reports whether the link succeeded.
    fn link(&mut self) -> io::Result<bool>;
}

/// Constructs a linker of the requested family.
pub fn create(kind: LinkerKind) -> Box<dyn Linker> {
    match kind {
        LinkerKind::Gcc => Box::new(GccLinker::new()),
        LinkerKind::Msvc => Box::new(MsvcLinker::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_dispatches_by_kind() {
        let mut gcc = create(LinkerKind::Gcc);
        let mut msvc = create(LinkerKind::Msvc);
        // Both accept the full option set through the trait object.
        gcc.add_flag("-v");
        msvc.add_flag("/VERBOSE");
    }
}
