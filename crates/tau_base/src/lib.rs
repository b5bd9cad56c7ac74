//! Structural atoms shared by every stage of the Tau compiler.
//!
//! This crate has no opinion about the language being compiled. It provides
//! the building blocks the rest of the pipeline is made of:
//!
//! - [`Arena`]: bump allocation with stable ids for registry-owned values
//! - [`Interner`] / [`Symbol`]: O(1) string equality
//! - [`Span`]: byte-offset source ranges
//! - [`SourceRegistry`] / [`Location`]: source buffers and offset decoding
//! - [`Diagnostic`] / [`ErrorBag`]: bounded error accumulation and rendering

pub mod arena;
pub mod diag;
pub mod intern;
pub mod source;
pub mod span;
pub mod style;

pub use arena::{Arena, ArenaId};
pub use diag::{BagFull, Diagnostic, ErrorBag, Severity};
pub use intern::{Interner, Symbol};
pub use source::{Location, SourceId, SourceRegistry};
pub use span::Span;
pub use style::Style;
