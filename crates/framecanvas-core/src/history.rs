//! Linear snapshot history.

/// Linear undo/redo list of snapshot texts with a current index.
///
/// Pushing while not at the end drops everything after the index. With a cap,
/// the oldest entries fall off the front.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<String>,
    index: usize,
    cap: Option<usize>,
}

impl History {
    pub fn new(cap: Option<usize>) -> Self {
        Self {
            entries: Vec::new(),
            index: 0,
            cap,
        }
    }

    /// Replace the whole history with a single entry.
    pub fn reset(&mut self, snapshot: String) {
        self.entries.clear();
        self.entries.push(snapshot);
        self.index = 0;
    }

    /// Append a snapshot. Returns false if it equals the current entry.
    pub fn push(&mut self, snapshot: String) -> bool {
        if self.current() == Some(snapshot.as_str()) {
            return false;
        }
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push(snapshot);
        if let Some(cap) = self.cap {
            let overflow = self.entries.len().saturating_sub(cap);
            if overflow > 0 {
                self.entries.drain(..overflow);
            }
        }
        self.index = self.entries.len() - 1;
        true
    }

    /// Step back and return the snapshot to restore.
    pub fn undo(&mut self) -> Option<&str> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        self.current()
    }

    /// Step forward and return the snapshot to restore.
    pub fn redo(&mut self) -> Option<&str> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        self.current()
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    pub fn current(&self) -> Option<&str> {
        self.entries.get(self.index).map(String::as_str)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
