//! Source positions and file tracking.
//!
//! Positions carry a `FileId` into a `SourceMap` so that `#line` remapping
//! can retarget tokens at arbitrary files without copying names around.

use std::fmt;

/// Index into a [`SourceMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub u32);

/// Interns the file names a compilation touches (main file plus includes and
/// `#line` targets).
#[derive(Debug, Default, Clone)]
pub struct SourceMap {
    files: Vec<String>,
}

impl SourceMap {
    pub fn new() -> Self {
        SourceMap { files: Vec::new() }
    }

    pub fn intern(&mut self, name: &str) -> FileId {
        if let Some(idx) = self.files.iter().position(|f| f == name) {
            return FileId(idx as u32);
        }
        self.files.push(name.to_string());
        FileId((self.files.len() - 1) as u32)
    }

    pub fn name(&self, id: FileId) -> &str {
        self.files.get(id.0 as usize).map(String::as_str).unwrap_or("")
    }
}

/// A (file, row, column) triple. Rows and columns are 1-based; a zero row
/// marks an invalid or synthetic position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePos {
    pub file: FileId,
    pub row: u32,
    pub col: u32,
}

impl SourcePos {
    pub fn new(file: FileId, row: u32, col: u32) -> Self {
        SourcePos { file, row, col }
    }

    pub fn is_valid(&self) -> bool {
        self.row > 0
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

/// Half-open range starting at `pos` spanning `length` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceArea {
    pub pos: SourcePos,
    pub length: u32,
}

impl SourceArea {
    pub fn new(pos: SourcePos, length: u32) -> Self {
        SourceArea { pos, length }
    }

    pub fn ignore() -> Self {
        SourceArea {
            pos: SourcePos::new(FileId(0), 0, 0),
            length: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.pos.is_valid()
    }

    /// Extends this area to cover `other` when both lie on the same row.
    pub fn update(&mut self, other: SourceArea) {
        if !self.is_valid() {
            *self = other;
        } else if other.is_valid()
            && other.pos.row == self.pos.row
            && other.pos.col >= self.pos.col
        {
            self.length = other.pos.col + other.length - self.pos.col;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_idempotent() {
        let mut map = SourceMap::new();
        let a = map.intern("shader.hlsl");
        let b = map.intern("common.hlsli");
        let a2 = map.intern("shader.hlsl");
        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(map.name(b), "common.hlsli");
    }

    #[test]
    fn test_area_update_same_row() {
        let file = FileId(0);
        let mut area = SourceArea::new(SourcePos::new(file, 3, 5), 4);
        area.update(SourceArea::new(SourcePos::new(file, 3, 12), 6));
        assert_eq!(area.length, 13);
    }
}
