// src/facts/path.rs

/// Current position in the config include tree, as an ordered stack of path
/// segments.
///
/// Pushed on entering a sub-document, popped on return. Snapshots of this
/// stack are stamped onto emitted task-list entries so the runner can restore
/// the position for relative resource resolution and diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveConfigPath {
    segments: Vec<String>,
}

impl ActiveConfigPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a segment. Empty segments (the tree root) are ignored so that
    /// snapshots stay clean.
    pub fn append(&mut self, segment: &str) {
        if !segment.is_empty() {
            self.segments.push(segment.to_string());
        }
    }

    /// Pop the most recent non-root segment, if any.
    pub fn pop(&mut self) -> Option<String> {
        self.segments.pop()
    }

    /// Replace the whole stack, e.g. when restoring from a task-list entry.
    pub fn set(&mut self, segments: &[String]) {
        self.segments = segments.to_vec();
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl std::fmt::Display for ActiveConfigPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}
