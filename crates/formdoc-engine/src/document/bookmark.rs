use log::{debug, error, trace};

use crate::host::{Document, FieldId, HostError, Inline, TextRange};

/// Name reported by [`BookmarkHandle::rename`] once the bookmark has vanished.
pub const BROKEN: &str = "WM(CMD'bookmarkBroken')";

/// A named anchor region in a [`Document`].
///
/// The handle only remembers the name; every operation looks the bookmark up
/// again, so a handle survives edits to the surrounding text and notices when
/// the bookmark was deleted by hand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BookmarkHandle {
    name: String,
}

impl BookmarkHandle {
    /// Wraps a name without checking that the bookmark exists.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Handle of an existing bookmark.
    pub fn open(doc: &Document, name: &str) -> Option<Self> {
        doc.has_bookmark(name).then(|| Self::new(name))
    }

    /// Creates a bookmark over `range`. The name gets a numeric suffix if it
    /// is taken.
    pub fn create(doc: &mut Document, name: &str, range: &TextRange) -> Result<Self, HostError> {
        let name = doc.insert_bookmark(name, range)?;
        Ok(Self { name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exists(&self, doc: &Document) -> bool {
        doc.has_bookmark(&self.name)
    }

    pub fn anchor(&self, doc: &Document) -> Option<TextRange> {
        doc.bookmark_range(&self.name)
    }

    /// Text covered by the bookmark.
    pub fn text(&self, doc: &Document) -> Option<String> {
        doc.bookmark_string(&self.name)
    }

    /// True for a single collapsed mark. A start/end pair without content in
    /// between is not collapsed.
    pub fn is_collapsed(&self, doc: &Document) -> bool {
        doc.bookmark_is_collapsed(&self.name).unwrap_or(false)
    }

    /// Renames the bookmark and returns the name it ended up with.
    ///
    /// A taken `new_name` gets the smallest free numeric suffix. If the
    /// bookmark no longer exists the handle switches to [`BROKEN`].
    pub fn rename(&mut self, doc: &mut Document, new_name: &str) -> &str {
        if self.name == new_name {
            if !doc.has_bookmark(&self.name) {
                self.name = BROKEN.to_string();
            }
            return &self.name;
        }

        debug!("Rename \"{}\" --> \"{}\"", self.name, new_name);
        let target = doc.unique_bookmark_name(new_name);
        match doc.rename_bookmark(&self.name, &target) {
            Ok(()) => self.name = target,
            Err(e) => {
                debug!("cannot rename bookmark, it has vanished: {e}");
                self.name = BROKEN.to_string();
            }
        }
        &self.name
    }

    /// Turns the bookmark into a collapsed mark at its start. The text it
    /// covered stays in place, behind the mark.
    pub fn collapse(&self, doc: &mut Document) {
        let Some(range) = self.anchor(doc) else {
            return;
        };
        if self.is_collapsed(doc) {
            return;
        }
        debug!("Collapse bookmark '{}'", self.name);
        if doc.remove_bookmark(&self.name).is_ok() {
            if let Err(e) = doc.insert_bookmark(&self.name, &TextRange::collapsed(range.start)) {
                error!("cannot re-create bookmark '{}': {e}", self.name);
            }
        }
    }

    /// Turns a collapsed bookmark into a start/end pair around a single `.`,
    /// so that content can be placed inside it.
    pub fn decollapse(&self, doc: &mut Document) {
        if !self.is_collapsed(doc) {
            return;
        }
        debug!("Decollapse bookmark '{}'", self.name);
        if let Err(e) = doc.replace_bookmark_content(&self.name, vec![Inline::Text(".".into())]) {
            error!("cannot decollapse bookmark '{}': {e}", self.name);
        }
    }

    /// Replaces the covered text. An empty string leaves the bookmark
    /// collapsed.
    pub fn set_text(&self, doc: &mut Document, text: &str) -> Result<(), HostError> {
        if !text.is_empty() {
            self.decollapse(doc);
        }
        let content = if text.is_empty() {
            Vec::new()
        } else {
            vec![Inline::Text(text.to_string())]
        };
        doc.replace_bookmark_content(&self.name, content)?;
        if text.is_empty() {
            self.collapse(doc);
        }
        Ok(())
    }

    /// Replaces the covered content with `field`; the bookmark then spans
    /// exactly the field.
    pub fn insert_field(&self, doc: &mut Document, field: FieldId) -> Result<(), HostError> {
        self.decollapse(doc);
        doc.replace_bookmark_content(&self.name, vec![Inline::Field(field)])
    }

    /// Deletes the bookmark; the covered text stays.
    pub fn remove(&self, doc: &mut Document) {
        if let Err(e) = doc.remove_bookmark(&self.name) {
            trace!("{e}");
        }
    }

    /// Moves the view cursor onto the bookmark.
    pub fn select(&self, doc: &mut Document) -> Result<(), HostError> {
        let range = self
            .anchor(doc)
            .ok_or_else(|| HostError::NoSuchBookmark(self.name.clone()))?;
        doc.select(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{FieldKind, Position};
    use pretty_assertions::assert_eq;

    fn doc_with_bookmark(text: &str, name: &str, from: usize, to: usize) -> (Document, BookmarkHandle) {
        let mut doc = Document::new();
        let body = doc.body();
        doc.push_text(body, 0, text).unwrap();
        let range = TextRange {
            start: Position { text: body, block: 0, offset: from },
            end: Position { text: body, block: 0, offset: to },
        };
        let handle = BookmarkHandle::create(&mut doc, name, &range).unwrap();
        (doc, handle)
    }

    #[test]
    fn rename_avoids_collisions() {
        let (mut doc, mut a) = doc_with_bookmark("abcdef", "a", 0, 1);
        let body = doc.body();
        doc.push_collapsed_bookmark(body, 0, "taken").unwrap();
        doc.push_collapsed_bookmark(body, 0, "taken1").unwrap();
        assert_eq!(a.rename(&mut doc, "taken"), "taken2");
        assert!(doc.has_bookmark("taken2"));
        assert!(!doc.has_bookmark("a"));
    }

    #[test]
    fn rename_of_vanished_bookmark_is_broken() {
        let (mut doc, mut a) = doc_with_bookmark("abc", "a", 0, 1);
        doc.remove_bookmark("a").unwrap();
        assert_eq!(a.rename(&mut doc, "b"), BROKEN);

        let (mut doc, mut same) = doc_with_bookmark("abc", "s", 0, 1);
        doc.remove_bookmark("s").unwrap();
        assert_eq!(same.rename(&mut doc, "s"), BROKEN);
    }

    #[test]
    fn collapse_keeps_text_behind_the_mark() {
        let (mut doc, bm) = doc_with_bookmark("Herr Müller", "bm", 5, 11);
        bm.collapse(&mut doc);
        assert!(bm.is_collapsed(&doc));
        assert_eq!(bm.text(&doc).unwrap(), "");
        assert_eq!(bm.anchor(&doc).unwrap().start.offset, 5);
        assert_eq!(doc.paragraph_string(doc.body(), 0), "Herr Müller");
    }

    #[test]
    fn decollapse_inserts_a_dot() {
        let (mut doc, bm) = doc_with_bookmark("ab", "bm", 1, 1);
        assert!(bm.is_collapsed(&doc));
        bm.decollapse(&mut doc);
        assert!(!bm.is_collapsed(&doc));
        assert_eq!(bm.text(&doc).unwrap(), ".");
        assert_eq!(doc.paragraph_string(doc.body(), 0), "a.b");
    }

    #[test]
    fn set_text_round_trip() {
        let (mut doc, bm) = doc_with_bookmark("ab", "bm", 1, 1);
        bm.set_text(&mut doc, "XYZ").unwrap();
        assert_eq!(bm.text(&doc).unwrap(), "XYZ");
        bm.set_text(&mut doc, "").unwrap();
        assert!(bm.is_collapsed(&doc));
        assert_eq!(doc.paragraph_string(doc.body(), 0), "ab");
    }

    #[test]
    fn insert_field_replaces_content() {
        let (mut doc, bm) = doc_with_bookmark("<Name>", "bm", 0, 6);
        let field = doc.create_field(FieldKind::input(""));
        bm.insert_field(&mut doc, field).unwrap();
        assert_eq!(doc.paragraph_string(doc.body(), 0), "");
        assert_eq!(doc.field_anchor(field), bm.anchor(&doc));
        assert!(doc.field(field).unwrap().attached);
    }

    #[test]
    fn open_checks_existence() {
        let (doc, _) = doc_with_bookmark("a", "bm", 0, 1);
        assert!(BookmarkHandle::open(&doc, "bm").is_some());
        assert!(BookmarkHandle::open(&doc, "other").is_none());
    }
}
