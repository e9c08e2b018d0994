//! In-memory word-processing document.
//!
//! The model exposes the capability set a form layer needs from an office
//! host: paragraph and portion enumeration, named bookmarks, text fields,
//! control shapes, named frames, user-field masters, document metadata and
//! the `RecordChanges` property. Everything is plain data so documents can be
//! stored as JSON and built up in tests.
//!
//! ## Positions
//!
//! A [`Position`] addresses a slot in one text: `(text, block, offset)`.
//! Text runs contribute one slot per character, fields and shapes one slot
//! each, bookmark marks none. Positions in different texts are unordered.

pub mod faults;
pub mod objects;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use faults::FaultPlan;
pub use objects::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookmarkId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("bookmark '{0}' does not exist")]
    NoSuchBookmark(String),

    #[error("a bookmark named '{0}' already exists")]
    DuplicateBookmark(String),

    #[error("text field {0:?} does not exist")]
    NoSuchField(FieldId),

    #[error("shape {0:?} does not exist")]
    NoSuchShape(ShapeId),

    #[error("text {0:?} does not exist")]
    NoSuchText(TextId),

    #[error("no paragraph at block {block} of text {text:?}")]
    NotAParagraph { text: TextId, block: usize },

    #[error("position {0:?} lies outside its paragraph")]
    InvalidPosition(Position),

    #[error("range spans more than one text")]
    CrossTextRange,

    #[error("field {0:?} has no property '{1}'")]
    UnknownProperty(FieldId, &'static str),

    #[error("document refused to create {0}")]
    CreationRefused(&'static str),

    #[error("document refused to write '{0}'")]
    WriteRefused(&'static str),

    #[error("document has no metadata repository")]
    MetadataUnsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextKind {
    Body,
    Header,
    Footer,
    Frame,
    Cell,
}

/// Paragraph content. Marks are zero-width; fields and shapes take one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Inline {
    Text(String),
    BookmarkStart(BookmarkId),
    BookmarkEnd(BookmarkId),
    CollapsedBookmark(BookmarkId),
    Field(FieldId),
    Shape(ShapeId),
}

impl Inline {
    pub fn width(&self) -> usize {
        match self {
            Inline::Text(s) => s.chars().count(),
            Inline::Field(_) | Inline::Shape(_) => 1,
            _ => 0,
        }
    }

    fn is_mark(&self) -> bool {
        matches!(
            self,
            Inline::BookmarkStart(_) | Inline::BookmarkEnd(_) | Inline::CollapsedBookmark(_)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    pub inlines: Vec<Inline>,
    pub char_hidden: bool,
}

impl Paragraph {
    pub fn width(&self) -> usize {
        self.inlines.iter().map(Inline::width).sum()
    }

    fn offset_of(&self, index: usize) -> usize {
        self.inlines[..index].iter().map(Inline::width).sum()
    }

    /// Index at which an inline placed at `offset` goes, splitting a text run
    /// if needed. With `after_marks` the index skips marks sitting at `offset`.
    fn split_at(&mut self, offset: usize, after_marks: bool) -> Option<usize> {
        let mut acc = 0;
        let mut i = 0;
        while i < self.inlines.len() {
            let width = self.inlines[i].width();
            if acc == offset {
                if after_marks && width == 0 {
                    i += 1;
                    continue;
                }
                return Some(i);
            }
            if acc + width > offset {
                if let Inline::Text(run) = &mut self.inlines[i] {
                    let byte = run
                        .char_indices()
                        .nth(offset - acc)
                        .map(|(b, _)| b)
                        .unwrap_or(run.len());
                    let tail = run.split_off(byte);
                    self.inlines.insert(i + 1, Inline::Text(tail));
                    return Some(i + 1);
                }
                return None;
            }
            acc += width;
            i += 1;
        }
        (acc == offset).then_some(self.inlines.len())
    }

    fn slice_string(&self, from: usize, to: usize) -> String {
        let mut out = String::new();
        let mut acc = 0;
        for inline in &self.inlines {
            if let Inline::Text(run) = inline {
                for c in run.chars() {
                    if acc >= from && acc < to {
                        out.push(c);
                    }
                    acc += 1;
                }
            } else {
                acc += inline.width();
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub rows: Vec<Vec<TextId>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    pub kind: TextKind,
    pub blocks: Vec<Block>,
}

impl Text {
    fn new(kind: TextKind) -> Self {
        Self {
            kind,
            blocks: vec![Block::Paragraph(Paragraph::default())],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkKind {
    Start,
    End,
    Collapsed,
}

/// One element of a paragraph's portion enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Portion {
    Text(String),
    Bookmark { name: String, kind: MarkKind },
    TextField(FieldId),
    Frame(ShapeId),
}

impl Portion {
    /// The `TextPortionType` an office host reports for this portion.
    pub fn portion_type(&self) -> &'static str {
        match self {
            Portion::Text(_) => "Text",
            Portion::Bookmark { .. } => "Bookmark",
            Portion::TextField(_) => "TextField",
            Portion::Frame(_) => "Frame",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub text: TextId,
    pub block: usize,
    pub offset: usize,
}

/// Positions in different texts are incomparable.
impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.text != other.text {
            return None;
        }
        Some((self.block, self.offset).cmp(&(other.block, other.offset)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    pub fn collapsed(at: Position) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn text(&self) -> TextId {
        self.start.text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    text: TextId,
    block: usize,
    index: usize,
}

/// The whole document: texts, object tables and document properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    texts: Vec<Text>,
    bookmarks: Vec<Option<String>>,
    fields: Vec<Option<TextField>>,
    shapes: Vec<Option<ControlShape>>,
    frames: Vec<Frame>,
    masters: BTreeMap<String, UserFieldMaster>,
    metadata: BTreeMap<String, BTreeMap<String, String>>,
    record_changes: bool,
    modified: bool,
    url: Option<String>,
    view_cursor: Option<TextRange>,
    #[serde(skip)]
    faults: FaultPlan,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document: one body text with one empty paragraph.
    pub fn new() -> Self {
        Self {
            texts: vec![Text::new(TextKind::Body)],
            bookmarks: Vec::new(),
            fields: Vec::new(),
            shapes: Vec::new(),
            frames: Vec::new(),
            masters: BTreeMap::new(),
            metadata: BTreeMap::new(),
            record_changes: false,
            modified: false,
            url: None,
            view_cursor: None,
            faults: FaultPlan::default(),
        }
    }

    pub fn body(&self) -> TextId {
        TextId(0)
    }

    // ---- properties ------------------------------------------------------

    pub fn record_changes(&self) -> bool {
        self.record_changes
    }

    pub fn set_record_changes(&mut self, on: bool) {
        self.record_changes = on;
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn set_url(&mut self, url: Option<String>) {
        self.url = url;
    }

    pub fn fault_plan(&self) -> &FaultPlan {
        &self.faults
    }

    pub fn set_fault_plan(&mut self, plan: FaultPlan) {
        self.faults = plan;
    }

    pub fn view_cursor(&self) -> Option<TextRange> {
        self.view_cursor
    }

    /// Moves the view cursor onto `range`.
    pub fn select(&mut self, range: TextRange) -> Result<(), HostError> {
        if range.start.text != range.end.text {
            return Err(HostError::CrossTextRange);
        }
        self.check_position(range.start)?;
        self.check_position(range.end)?;
        self.view_cursor = Some(range);
        Ok(())
    }

    fn check_write(&mut self, what: &'static str) -> Result<(), HostError> {
        if self.faults.allow_write() {
            self.modified = true;
            Ok(())
        } else {
            Err(HostError::WriteRefused(what))
        }
    }

    // ---- texts and blocks ------------------------------------------------

    /// Adds a new story text (header, footer, ...).
    pub fn add_text(&mut self, kind: TextKind) -> TextId {
        self.texts.push(Text::new(kind));
        TextId(self.texts.len() - 1)
    }

    pub fn text(&self, id: TextId) -> Option<&Text> {
        self.texts.get(id.0)
    }

    pub fn block_count(&self, text: TextId) -> usize {
        self.text(text).map_or(0, |t| t.blocks.len())
    }

    pub fn block(&self, text: TextId, block: usize) -> Option<&Block> {
        self.text(text)?.blocks.get(block)
    }

    /// Paragraphs of all story texts in flow order. The cells of a table are
    /// visited where the table stands in its text.
    pub fn paragraphs_in_flow_order(&self) -> Vec<(TextId, usize)> {
        let mut order = Vec::new();
        for (i, text) in self.texts.iter().enumerate() {
            if text.kind != TextKind::Cell {
                self.collect_flow(TextId(i), &mut order);
            }
        }
        order
    }

    fn collect_flow(&self, id: TextId, out: &mut Vec<(TextId, usize)>) {
        let Some(text) = self.text(id) else {
            return;
        };
        for (index, block) in text.blocks.iter().enumerate() {
            match block {
                Block::Paragraph(_) => out.push((id, index)),
                Block::Table(table) => {
                    for cell in table.rows.iter().flatten() {
                        self.collect_flow(*cell, out);
                    }
                }
            }
        }
    }

    fn paragraph(&self, text: TextId, block: usize) -> Result<&Paragraph, HostError> {
        match self.texts.get(text.0) {
            None => Err(HostError::NoSuchText(text)),
            Some(t) => match t.blocks.get(block) {
                Some(Block::Paragraph(p)) => Ok(p),
                _ => Err(HostError::NotAParagraph { text, block }),
            },
        }
    }

    fn paragraph_mut(&mut self, text: TextId, block: usize) -> Result<&mut Paragraph, HostError> {
        match self.texts.get_mut(text.0) {
            None => Err(HostError::NoSuchText(text)),
            Some(t) => match t.blocks.get_mut(block) {
                Some(Block::Paragraph(p)) => Ok(p),
                _ => Err(HostError::NotAParagraph { text, block }),
            },
        }
    }

    fn check_position(&self, pos: Position) -> Result<(), HostError> {
        let par = self.paragraph(pos.text, pos.block)?;
        if pos.offset > par.width() {
            return Err(HostError::InvalidPosition(pos));
        }
        Ok(())
    }

    /// Index of the last paragraph of `text`, appending one after a trailing table.
    fn last_paragraph(&mut self, text: TextId) -> Result<usize, HostError> {
        let t = self
            .texts
            .get_mut(text.0)
            .ok_or(HostError::NoSuchText(text))?;
        if !matches!(t.blocks.last(), Some(Block::Paragraph(_))) {
            t.blocks.push(Block::Paragraph(Paragraph::default()));
        }
        Ok(t.blocks.len() - 1)
    }

    /// Appends an empty paragraph and returns its block index.
    pub fn push_paragraph(&mut self, text: TextId) -> Result<usize, HostError> {
        let t = self
            .texts
            .get_mut(text.0)
            .ok_or(HostError::NoSuchText(text))?;
        t.blocks.push(Block::Paragraph(Paragraph::default()));
        self.modified = true;
        Ok(t.blocks.len() - 1)
    }

    fn push_inline(&mut self, text: TextId, block: usize, inline: Inline) -> Result<(), HostError> {
        self.paragraph_mut(text, block)?.inlines.push(inline);
        self.modified = true;
        Ok(())
    }

    pub fn push_text(&mut self, text: TextId, block: usize, s: &str) -> Result<(), HostError> {
        self.push_inline(text, block, Inline::Text(s.to_string()))
    }

    pub fn push_field(
        &mut self,
        text: TextId,
        block: usize,
        kind: FieldKind,
    ) -> Result<FieldId, HostError> {
        self.paragraph(text, block)?;
        let id = self.create_field(kind);
        self.attach_field(id)?;
        self.push_inline(text, block, Inline::Field(id))?;
        Ok(id)
    }

    pub fn push_shape(
        &mut self,
        text: TextId,
        block: usize,
        kind: ShapeKind,
    ) -> Result<ShapeId, HostError> {
        self.paragraph(text, block)?;
        self.shapes.push(Some(ControlShape {
            kind,
            attached: true,
        }));
        let id = ShapeId(self.shapes.len() - 1);
        self.push_inline(text, block, Inline::Shape(id))?;
        Ok(id)
    }

    pub fn push_checkbox(
        &mut self,
        text: TextId,
        block: usize,
        state: bool,
    ) -> Result<ShapeId, HostError> {
        self.push_shape(text, block, ShapeKind::CheckBox { state })
    }

    /// Opens a bookmark at the end of the paragraph; returns the name actually used.
    pub fn push_bookmark_start(
        &mut self,
        text: TextId,
        block: usize,
        name: &str,
    ) -> Result<String, HostError> {
        self.paragraph(text, block)?;
        let (id, name) = self.register_bookmark(name);
        self.push_inline(text, block, Inline::BookmarkStart(id))?;
        Ok(name)
    }

    pub fn push_bookmark_end(
        &mut self,
        text: TextId,
        block: usize,
        name: &str,
    ) -> Result<(), HostError> {
        let id = self
            .bookmark_id(name)
            .ok_or_else(|| HostError::NoSuchBookmark(name.to_string()))?;
        self.push_inline(text, block, Inline::BookmarkEnd(id))
    }

    pub fn push_collapsed_bookmark(
        &mut self,
        text: TextId,
        block: usize,
        name: &str,
    ) -> Result<String, HostError> {
        self.paragraph(text, block)?;
        let (id, name) = self.register_bookmark(name);
        self.push_inline(text, block, Inline::CollapsedBookmark(id))?;
        Ok(name)
    }

    /// Appends a `rows` x `cols` table; returns the cell texts row by row.
    pub fn push_table(
        &mut self,
        text: TextId,
        name: &str,
        rows: usize,
        cols: usize,
    ) -> Result<Vec<Vec<TextId>>, HostError> {
        if self.text(text).is_none() {
            return Err(HostError::NoSuchText(text));
        }
        let cells: Vec<Vec<TextId>> = (0..rows)
            .map(|_| (0..cols).map(|_| self.add_text(TextKind::Cell)).collect())
            .collect();
        self.texts[text.0].blocks.push(Block::Table(Table {
            name: name.to_string(),
            rows: cells.clone(),
        }));
        self.modified = true;
        Ok(cells)
    }

    pub fn set_paragraph_hidden(
        &mut self,
        text: TextId,
        block: usize,
        hidden: bool,
    ) -> Result<(), HostError> {
        self.paragraph_mut(text, block)?.char_hidden = hidden;
        Ok(())
    }

    /// Portion enumeration of one paragraph. Empty for tables.
    pub fn portions(&self, text: TextId, block: usize) -> Vec<Portion> {
        let Ok(par) = self.paragraph(text, block) else {
            return Vec::new();
        };
        par.inlines
            .iter()
            .filter_map(|inline| match inline {
                Inline::Text(s) => Some(Portion::Text(s.clone())),
                Inline::BookmarkStart(id) => self.mark_portion(*id, MarkKind::Start),
                Inline::BookmarkEnd(id) => self.mark_portion(*id, MarkKind::End),
                Inline::CollapsedBookmark(id) => self.mark_portion(*id, MarkKind::Collapsed),
                Inline::Field(id) => Some(Portion::TextField(*id)),
                Inline::Shape(id) => Some(Portion::Frame(*id)),
            })
            .collect()
    }

    fn mark_portion(&self, id: BookmarkId, kind: MarkKind) -> Option<Portion> {
        let name = self.bookmarks.get(id.0)?.clone()?;
        Some(Portion::Bookmark { name, kind })
    }

    /// Visible text of a paragraph.
    pub fn paragraph_string(&self, text: TextId, block: usize) -> String {
        self.paragraph(text, block)
            .map(|p| p.slice_string(0, usize::MAX))
            .unwrap_or_default()
    }

    /// Text between two positions of one text; paragraphs are joined with `\n`.
    pub fn range_string(&self, range: &TextRange) -> Result<String, HostError> {
        if range.start.text != range.end.text {
            return Err(HostError::CrossTextRange);
        }
        let (start, end) = if range.start <= range.end {
            (range.start, range.end)
        } else {
            (range.end, range.start)
        };
        let mut out = String::new();
        for block in start.block..=end.block {
            let Ok(par) = self.paragraph(start.text, block) else {
                continue;
            };
            let from = if block == start.block { start.offset } else { 0 };
            let to = if block == end.block { end.offset } else { usize::MAX };
            if block != start.block {
                out.push('\n');
            }
            out.push_str(&par.slice_string(from, to));
        }
        Ok(out)
    }

    fn slots(&self) -> impl Iterator<Item = (Slot, &Inline)> {
        self.texts.iter().enumerate().flat_map(|(t, text)| {
            text.blocks
                .iter()
                .enumerate()
                .filter_map(|(b, block)| match block {
                    Block::Paragraph(p) => Some((b, p)),
                    Block::Table(_) => None,
                })
                .flat_map(move |(b, p)| {
                    p.inlines.iter().enumerate().map(move |(i, inline)| {
                        (
                            Slot {
                                text: TextId(t),
                                block: b,
                                index: i,
                            },
                            inline,
                        )
                    })
                })
        })
    }

    fn find_slot(&self, wanted: &Inline) -> Option<Slot> {
        self.slots()
            .find(|(_, inline)| *inline == wanted)
            .map(|(slot, _)| slot)
    }

    fn position_of(&self, slot: Slot) -> Position {
        let offset = self
            .paragraph(slot.text, slot.block)
            .map(|p| p.offset_of(slot.index))
            .unwrap_or(0);
        Position {
            text: slot.text,
            block: slot.block,
            offset,
        }
    }

    /// Moves the inlines out of a text and its nested cells.
    fn drain_text(&mut self, id: TextId) -> Vec<Inline> {
        let Some(text) = self.texts.get_mut(id.0) else {
            return Vec::new();
        };
        let blocks = std::mem::take(&mut text.blocks);
        let mut out = Vec::new();
        for block in blocks {
            match block {
                Block::Paragraph(p) => out.extend(p.inlines),
                Block::Table(t) => {
                    for cell in t.rows.into_iter().flatten() {
                        out.extend(self.drain_text(cell));
                    }
                }
            }
        }
        out
    }

    /// Drops removed content: objects are disposed, marks are handed back.
    fn discard(&mut self, removed: Vec<Inline>) -> Vec<Inline> {
        let mut marks = Vec::new();
        for inline in removed {
            match inline {
                Inline::Field(id) => {
                    if let Some(slot) = self.fields.get_mut(id.0) {
                        *slot = None;
                    }
                }
                Inline::Shape(id) => {
                    if let Some(slot) = self.shapes.get_mut(id.0) {
                        *slot = None;
                    }
                }
                mark if mark.is_mark() => marks.push(mark),
                _ => {}
            }
        }
        marks
    }

    // ---- bookmarks -------------------------------------------------------

    fn bookmark_id(&self, name: &str) -> Option<BookmarkId> {
        self.bookmarks
            .iter()
            .position(|b| b.as_deref() == Some(name))
            .map(BookmarkId)
    }

    fn register_bookmark(&mut self, name: &str) -> (BookmarkId, String) {
        let name = self.unique_bookmark_name(name);
        self.bookmarks.push(Some(name.clone()));
        (BookmarkId(self.bookmarks.len() - 1), name)
    }

    /// `name` if free, otherwise `name` followed by the smallest free number.
    pub fn unique_bookmark_name(&self, name: &str) -> String {
        if !self.has_bookmark(name) {
            return name.to_string();
        }
        let mut count = 1;
        while self.has_bookmark(&format!("{name}{count}")) {
            count += 1;
        }
        format!("{name}{count}")
    }

    pub fn has_bookmark(&self, name: &str) -> bool {
        self.bookmark_id(name).is_some()
    }

    /// Names of all bookmarks in creation order.
    pub fn bookmark_names(&self) -> Vec<String> {
        self.bookmarks.iter().flatten().cloned().collect()
    }

    fn mark_slots(&self, id: BookmarkId) -> Option<(Slot, Slot)> {
        let mut start = None;
        let mut end = None;
        for (slot, inline) in self.slots() {
            match inline {
                Inline::BookmarkStart(b) if *b == id => start = Some(slot),
                Inline::BookmarkEnd(b) if *b == id => end = Some(slot),
                Inline::CollapsedBookmark(b) if *b == id => {
                    start = Some(slot);
                    end = Some(slot);
                }
                _ => {}
            }
        }
        match (start, end) {
            (Some(s), Some(e)) => Some((s, e)),
            (Some(s), None) | (None, Some(s)) => Some((s, s)),
            (None, None) => None,
        }
    }

    pub fn bookmark_range(&self, name: &str) -> Option<TextRange> {
        let (start, end) = self.mark_slots(self.bookmark_id(name)?)?;
        Some(TextRange {
            start: self.position_of(start),
            end: self.position_of(end),
        })
    }

    /// Whether the bookmark is a single collapsed mark. `None` if it is gone.
    pub fn bookmark_is_collapsed(&self, name: &str) -> Option<bool> {
        let id = self.bookmark_id(name)?;
        let (start, _) = self.mark_slots(id)?;
        let par = self.paragraph(start.text, start.block).ok()?;
        Some(matches!(
            par.inlines.get(start.index),
            Some(Inline::CollapsedBookmark(_))
        ))
    }

    pub fn bookmark_string(&self, name: &str) -> Option<String> {
        self.range_string(&self.bookmark_range(name)?).ok()
    }

    /// Creates a bookmark over `range`; a zero-width range gives a collapsed
    /// mark. Returns the name actually used.
    pub fn insert_bookmark(&mut self, name: &str, range: &TextRange) -> Result<String, HostError> {
        if range.start.text != range.end.text {
            return Err(HostError::CrossTextRange);
        }
        self.check_position(range.start)?;
        self.check_position(range.end)?;
        let (start, end) = if range.start <= range.end {
            (range.start, range.end)
        } else {
            (range.end, range.start)
        };

        let (id, name) = self.register_bookmark(name);
        if start == end {
            let par = self.paragraph_mut(start.text, start.block)?;
            let at = par
                .split_at(start.offset, true)
                .ok_or(HostError::InvalidPosition(start))?;
            par.inlines.insert(at, Inline::CollapsedBookmark(id));
        } else {
            let par = self.paragraph_mut(end.text, end.block)?;
            let at = par
                .split_at(end.offset, false)
                .ok_or(HostError::InvalidPosition(end))?;
            par.inlines.insert(at, Inline::BookmarkEnd(id));
            let par = self.paragraph_mut(start.text, start.block)?;
            let at = par
                .split_at(start.offset, true)
                .ok_or(HostError::InvalidPosition(start))?;
            par.inlines.insert(at, Inline::BookmarkStart(id));
        }
        self.modified = true;
        Ok(name)
    }

    /// Renames a bookmark. The new name must be free.
    pub fn rename_bookmark(&mut self, old: &str, new: &str) -> Result<(), HostError> {
        let id = self
            .bookmark_id(old)
            .ok_or_else(|| HostError::NoSuchBookmark(old.to_string()))?;
        if old != new && self.has_bookmark(new) {
            return Err(HostError::DuplicateBookmark(new.to_string()));
        }
        self.bookmarks[id.0] = Some(new.to_string());
        self.modified = true;
        Ok(())
    }

    /// Removes the bookmark's marks; the text it surrounded stays.
    pub fn remove_bookmark(&mut self, name: &str) -> Result<(), HostError> {
        let id = self
            .bookmark_id(name)
            .ok_or_else(|| HostError::NoSuchBookmark(name.to_string()))?;
        for text in &mut self.texts {
            for block in &mut text.blocks {
                if let Block::Paragraph(p) = block {
                    p.inlines.retain(|inline| {
                        !matches!(inline,
                            Inline::BookmarkStart(b) | Inline::BookmarkEnd(b) | Inline::CollapsedBookmark(b)
                            if *b == id)
                    });
                }
            }
        }
        self.bookmarks[id.0] = None;
        self.modified = true;
        Ok(())
    }

    /// Replaces everything between the bookmark's marks with `content`.
    ///
    /// A collapsed bookmark is opened into a start/end pair around the new
    /// content. Marks of other bookmarks inside the old content are kept in
    /// front of the new content; fields and shapes there are disposed.
    pub fn replace_bookmark_content(
        &mut self,
        name: &str,
        content: Vec<Inline>,
    ) -> Result<(), HostError> {
        let id = self
            .bookmark_id(name)
            .ok_or_else(|| HostError::NoSuchBookmark(name.to_string()))?;
        let (start, end) = self
            .mark_slots(id)
            .ok_or_else(|| HostError::NoSuchBookmark(name.to_string()))?;
        if start.text != end.text {
            return Err(HostError::CrossTextRange);
        }
        if (end.block, end.index) < (start.block, start.index) {
            return Err(HostError::InvalidPosition(self.position_of(end)));
        }

        for inline in &content {
            if let Inline::Field(f) = inline {
                self.attach_field(*f)?;
            }
        }

        if start == end {
            let par = self.paragraph_mut(start.text, start.block)?;
            par.inlines[start.index] = Inline::BookmarkStart(id);
            let mut tail = content;
            tail.push(Inline::BookmarkEnd(id));
            par.inlines.splice(start.index + 1..start.index + 1, tail);
        } else if start.block == end.block {
            let par = self.paragraph_mut(start.text, start.block)?;
            let removed: Vec<Inline> = par.inlines.drain(start.index + 1..end.index).collect();
            let mut fill = self.discard(removed);
            fill.extend(content);
            let par = self.paragraph_mut(start.text, start.block)?;
            par.inlines.splice(start.index + 1..start.index + 1, fill);
        } else {
            let tail_blocks: Vec<Block> = self.texts[start.text.0]
                .blocks
                .drain(start.block + 1..=end.block)
                .collect();
            let last = tail_blocks.len() - 1;
            let mut removed: Vec<Inline> = self
                .paragraph_mut(start.text, start.block)?
                .inlines
                .drain(start.index + 1..)
                .collect();
            let mut rest = Vec::new();
            for (i, block) in tail_blocks.into_iter().enumerate() {
                match block {
                    Block::Paragraph(mut p) if i == last => {
                        rest = p.inlines.split_off(end.index);
                        removed.extend(p.inlines);
                    }
                    Block::Paragraph(p) => removed.extend(p.inlines),
                    Block::Table(t) => {
                        for cell in t.rows.into_iter().flatten() {
                            let drained = self.drain_text(cell);
                            removed.extend(drained);
                        }
                    }
                }
            }
            let mut fill = self.discard(removed);
            fill.extend(content);
            fill.extend(rest);
            self.paragraph_mut(start.text, start.block)?
                .inlines
                .extend(fill);
        }
        self.modified = true;
        Ok(())
    }

    // ---- text fields -----------------------------------------------------

    /// Creates a field object that is not yet part of the text flow.
    pub fn create_field(&mut self, kind: FieldKind) -> FieldId {
        self.fields.push(Some(TextField {
            kind,
            attached: false,
        }));
        FieldId(self.fields.len() - 1)
    }

    fn attach_field(&mut self, id: FieldId) -> Result<(), HostError> {
        let field = self
            .fields
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(HostError::NoSuchField(id))?;
        field.attached = true;
        Ok(())
    }

    /// Appends an existing field object to the end of `text`.
    pub fn append_field(&mut self, text: TextId, id: FieldId) -> Result<(), HostError> {
        self.attach_field(id)?;
        let block = self.last_paragraph(text)?;
        self.push_inline(text, block, Inline::Field(id))
    }

    pub fn field(&self, id: FieldId) -> Option<&TextField> {
        self.fields.get(id.0)?.as_ref()
    }

    pub fn field_kind(&self, id: FieldId) -> Option<&FieldKind> {
        self.field(id).map(|f| &f.kind)
    }

    fn field_kind_mut(&mut self, id: FieldId) -> Result<&mut FieldKind, HostError> {
        self.fields
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .map(|f| &mut f.kind)
            .ok_or(HostError::NoSuchField(id))
    }

    /// One-slot range covering the field in the text flow.
    pub fn field_anchor(&self, id: FieldId) -> Option<TextRange> {
        let slot = self.find_slot(&Inline::Field(id))?;
        let start = self.position_of(slot);
        let end = Position {
            offset: start.offset + 1,
            ..start
        };
        Some(TextRange { start, end })
    }

    /// The `Content` property (dropdowns report their selected item).
    pub fn field_content(&self, id: FieldId) -> Option<String> {
        match self.field_kind(id)? {
            FieldKind::Input { content, .. }
            | FieldKind::Database { content, .. }
            | FieldKind::InputUser { content }
            | FieldKind::Annotation { content, .. } => Some(content.clone()),
            FieldKind::DropDown { selected, .. } => Some(selected.clone()),
            FieldKind::Other { .. } => None,
        }
    }

    pub fn set_field_content(&mut self, id: FieldId, value: &str) -> Result<(), HostError> {
        if !matches!(
            self.field_kind(id).ok_or(HostError::NoSuchField(id))?,
            FieldKind::Input { .. }
                | FieldKind::Database { .. }
                | FieldKind::InputUser { .. }
                | FieldKind::Annotation { .. }
        ) {
            return Err(HostError::UnknownProperty(id, "Content"));
        }
        self.check_write("Content")?;
        match self.field_kind_mut(id)? {
            FieldKind::Input { content, .. }
            | FieldKind::InputUser { content }
            | FieldKind::Annotation { content, .. } => *content = value.to_string(),
            FieldKind::Database {
                content,
                presentation,
                ..
            } => {
                *content = value.to_string();
                *presentation = value.to_string();
            }
            _ => {}
        }
        Ok(())
    }

    pub fn set_dropdown_items(&mut self, id: FieldId, new_items: Vec<String>) -> Result<(), HostError> {
        if !matches!(self.field_kind(id), Some(FieldKind::DropDown { .. })) {
            return Err(self.missing_property(id, "Items"));
        }
        self.check_write("Items")?;
        if let FieldKind::DropDown { items, .. } = self.field_kind_mut(id)? {
            *items = new_items;
        }
        Ok(())
    }

    pub fn set_dropdown_selected(&mut self, id: FieldId, value: &str) -> Result<(), HostError> {
        if !matches!(self.field_kind(id), Some(FieldKind::DropDown { .. })) {
            return Err(self.missing_property(id, "SelectedItem"));
        }
        self.check_write("SelectedItem")?;
        if let FieldKind::DropDown { selected, .. } = self.field_kind_mut(id)? {
            *selected = value.to_string();
        }
        Ok(())
    }

    fn missing_property(&self, id: FieldId, property: &'static str) -> HostError {
        if self.field(id).is_some() {
            HostError::UnknownProperty(id, property)
        } else {
            HostError::NoSuchField(id)
        }
    }

    /// Removes the field from the text flow and disposes the object.
    pub fn remove_field(&mut self, id: FieldId) -> Result<(), HostError> {
        if self.field(id).is_none() {
            return Err(HostError::NoSuchField(id));
        }
        if let Some(slot) = self.find_slot(&Inline::Field(id)) {
            self.paragraph_mut(slot.text, slot.block)?
                .inlines
                .remove(slot.index);
        }
        self.fields[id.0] = None;
        self.modified = true;
        Ok(())
    }

    /// Fields in the text flow, in flow order.
    pub fn fields_in_document_order(&self) -> Vec<FieldId> {
        let mut out = Vec::new();
        for (text, block) in self.paragraphs_in_flow_order() {
            let Ok(p) = self.paragraph(text, block) else {
                continue;
            };
            out.extend(p.inlines.iter().filter_map(|inline| match inline {
                Inline::Field(id) if self.field(*id).is_some() => Some(*id),
                _ => None,
            }));
        }
        out
    }

    // ---- shapes ----------------------------------------------------------

    pub fn shape(&self, id: ShapeId) -> Option<&ControlShape> {
        self.shapes.get(id.0)?.as_ref()
    }

    pub fn shape_anchor(&self, id: ShapeId) -> Option<TextRange> {
        let slot = self.find_slot(&Inline::Shape(id))?;
        let start = self.position_of(slot);
        let end = Position {
            offset: start.offset + 1,
            ..start
        };
        Some(TextRange { start, end })
    }

    pub fn checkbox_state(&self, id: ShapeId) -> Option<bool> {
        match self.shape(id)?.kind {
            ShapeKind::CheckBox { state } => Some(state),
            ShapeKind::Other { .. } => None,
        }
    }

    pub fn set_checkbox_state(&mut self, id: ShapeId, value: bool) -> Result<(), HostError> {
        if !matches!(
            self.shape(id).map(|s| &s.kind),
            Some(ShapeKind::CheckBox { .. })
        ) {
            return Err(HostError::NoSuchShape(id));
        }
        self.check_write("State")?;
        if let Some(Some(shape)) = self.shapes.get_mut(id.0) {
            shape.kind = ShapeKind::CheckBox { state: value };
        }
        Ok(())
    }

    pub fn remove_shape(&mut self, id: ShapeId) -> Result<(), HostError> {
        if self.shape(id).is_none() {
            return Err(HostError::NoSuchShape(id));
        }
        if let Some(slot) = self.find_slot(&Inline::Shape(id)) {
            self.paragraph_mut(slot.text, slot.block)?
                .inlines
                .remove(slot.index);
        }
        self.shapes[id.0] = None;
        self.modified = true;
        Ok(())
    }

    // ---- user field masters ----------------------------------------------

    pub fn user_master(&self, name: &str) -> Option<&UserFieldMaster> {
        self.masters.get(name)
    }

    /// Writes the master's content, creating the master if needed.
    pub fn set_user_master_content(&mut self, name: &str, value: &str) -> Result<(), HostError> {
        self.check_write("Content")?;
        self.masters.entry(name.to_string()).or_default().content = value.to_string();
        Ok(())
    }

    // ---- frames ----------------------------------------------------------

    pub fn frame_by_name(&self, name: &str) -> Option<&Frame> {
        self.frames.iter().find(|f| f.name == name)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Creates a named frame with its own text.
    pub fn create_frame(&mut self, name: &str, props: FrameProps) -> Result<TextId, HostError> {
        if self.faults.refuse_frame_creation {
            return Err(HostError::CreationRefused("com.sun.star.text.TextFrame"));
        }
        let text = self.add_text(TextKind::Frame);
        self.frames.push(Frame {
            name: name.to_string(),
            text,
            props,
        });
        self.modified = true;
        Ok(text)
    }

    // ---- metadata --------------------------------------------------------

    pub fn supports_metadata(&self) -> bool {
        !self.faults.metadata_unsupported
    }

    pub fn metadata_value(&self, graph: &str, key: &str) -> Result<Option<&str>, HostError> {
        if !self.supports_metadata() {
            return Err(HostError::MetadataUnsupported);
        }
        Ok(self
            .metadata
            .get(graph)
            .and_then(|g| g.get(key))
            .map(String::as_str))
    }

    pub fn set_metadata_value(&mut self, graph: &str, key: &str, value: &str) -> Result<(), HostError> {
        if !self.supports_metadata() {
            return Err(HostError::MetadataUnsupported);
        }
        self.check_write("Metadata")?;
        self.metadata
            .entry(graph.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn remove_metadata_value(&mut self, graph: &str, key: &str) -> Result<(), HostError> {
        if !self.supports_metadata() {
            return Err(HostError::MetadataUnsupported);
        }
        if let Some(g) = self.metadata.get_mut(graph) {
            if g.remove(key).is_some() {
                self.modified = true;
            }
            if g.is_empty() {
                self.metadata.remove(graph);
            }
        }
        Ok(())
    }
}
