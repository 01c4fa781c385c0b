//! Project file set
//!
//! In-memory view of every file the build pass may read or mutate. The sprite
//! pipeline never touches the filesystem directly; the host (or the CLI front
//! end) loads files into a [`FileSet`] and writes mutated entries back out.

use std::collections::HashMap;

/// One file in the project set.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Project-relative source path (forward slashes)
    pub path: String,
    /// Path the file will be written to (defaults to `path`)
    pub output_path: String,
    /// Raw file contents
    pub data: Vec<u8>,
    /// Whether this entry was created by the pipeline (e.g. a sprite sheet)
    pub added: bool,
    /// Whether the contents were modified by the pipeline
    pub mutated: bool,
}

impl FileEntry {
    /// Create an entry for an existing source file.
    pub fn new(path: impl Into<String>, data: Vec<u8>) -> Self {
        let path = path.into();
        Self { output_path: path.clone(), path, data, added: false, mutated: false }
    }

    /// Create an entry for a file produced by the pipeline.
    pub fn added(path: impl Into<String>, data: Vec<u8>) -> Self {
        let mut entry = Self::new(path, data);
        entry.added = true;
        entry
    }

    /// Contents as UTF-8 text, if valid.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    /// Replace the contents with new text and mark the entry mutated.
    pub fn set_text(&mut self, text: String) {
        self.data = text.into_bytes();
        self.mutated = true;
    }
}

/// The full project file set, with O(1) path lookup and stable iteration
/// order (insertion order).
#[derive(Debug, Default)]
pub struct FileSet {
    entries: Vec<FileEntry>,
    index: HashMap<String, usize>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `path` names a known file. This is the resolver the URL
    /// extractor consults before accepting an image reference.
    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.index.get(path).map(|&idx| &self.entries[idx])
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut FileEntry> {
        match self.index.get(path) {
            Some(&idx) => Some(&mut self.entries[idx]),
            None => None,
        }
    }

    /// Add an entry, replacing any previous entry at the same path.
    pub fn add(&mut self, entry: FileEntry) {
        match self.index.get(&entry.path) {
            Some(&idx) => self.entries[idx] = entry,
            None => {
                self.index.insert(entry.path.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FileEntry> {
        self.entries.iter_mut()
    }

    /// All paths in insertion order.
    pub fn paths(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }
}
