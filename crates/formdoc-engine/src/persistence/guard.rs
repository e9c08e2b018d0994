use std::ops::{Deref, DerefMut};

use crate::host::Document;

/// Switches change recording off for as long as the guard lives and restores
/// the previous setting on drop, also when the write in between fails.
pub struct RecordChangesGuard<'a> {
    doc: &'a mut Document,
    saved: bool,
}

impl<'a> RecordChangesGuard<'a> {
    pub fn new(doc: &'a mut Document) -> Self {
        let saved = doc.record_changes();
        doc.set_record_changes(false);
        Self { doc, saved }
    }
}

impl Deref for RecordChangesGuard<'_> {
    type Target = Document;

    fn deref(&self) -> &Document {
        self.doc
    }
}

impl DerefMut for RecordChangesGuard<'_> {
    fn deref_mut(&mut self) -> &mut Document {
        self.doc
    }
}

impl Drop for RecordChangesGuard<'_> {
    fn drop(&mut self) {
        self.doc.set_record_changes(self.saved);
    }
}
