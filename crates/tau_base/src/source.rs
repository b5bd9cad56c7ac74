//! Source file registry and location decoding.
//!
//! The registry owns every source buffer for a translation unit. Tokens
//! store only `(source, offset)`; everything derived from that — row,
//! column, line text — is computed on demand against the registered buffer,
//! so locations never need to be stored per token.

use crate::span::Span;

/// Identity of a registered source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u32);

impl SourceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Reconstructs an id from a dense index. Only meaningful for indices
    /// previously handed out by a registry.
    pub fn from_index(index: usize) -> Self {
        SourceId(index as u32)
    }
}

/// A fully decoded source position.
///
/// Rows and columns are zero-based; renderers print them one-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub row: usize,
    pub col: usize,
    pub span: Span,
}

struct SourceFile {
    path: String,
    contents: String,
}

/// Owns `(path, contents)` pairs and decodes offsets into [`Location`]s.
#[derive(Default)]
pub struct SourceRegistry {
    files: Vec<SourceFile>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source buffer, returning its id.
    pub fn add(&mut self, path: impl Into<String>, contents: impl Into<String>) -> SourceId {
        let id = SourceId(self.files.len() as u32);
        self.files.push(SourceFile {
            path: path.into(),
            contents: contents.into(),
        });
        id
    }

    /// Path of a registered source.
    pub fn path(&self, id: SourceId) -> &str {
        &self.files[id.index()].path
    }

    /// Full contents of a registered source.
    pub fn contents(&self, id: SourceId) -> &str {
        &self.files[id.index()].contents
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Decodes `(id, span)` into a [`Location`] by scanning the buffer.
    pub fn location(&self, id: SourceId, span: Span) -> Location {
        let file = &self.files[id.index()];
        let mut row = 0;
        let mut col = 0;

        for byte in file.contents.as_bytes()[..span.start.min(file.contents.len())].iter() {
            if *byte == b'\n' {
                row += 1;
                col = 0;
            } else {
                col += 1;
            }
        }

        Location {
            path: file.path.clone(),
            row,
            col,
            span,
        }
    }

    /// The full line of text containing `offset`, without its newline.
    pub fn line_at(&self, id: SourceId, offset: usize) -> &str {
        let contents = &self.files[id.index()].contents;
        let offset = offset.min(contents.len());

        let start = contents[..offset].rfind('\n').map_or(0, |i| i + 1);
        let end = contents[offset..]
            .find('\n')
            .map_or(contents.len(), |i| offset + i);

        &contents[start..end]
    }
}
