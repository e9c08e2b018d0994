//! Fields that live inside an `insertFormValue` command bookmark.

use std::sync::OnceLock;

use log::{info, trace};
use regex::Regex;

use crate::document::BookmarkHandle;
use crate::host::{Document, FieldId, FieldKind, HostError, ShapeId, TextRange};

use super::{FieldAccess, FieldType};

/// Bookmark text that looks like a placeholder: `<...>`, `[...]` or `{...}`.
pub fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\A[<\[{].*[\]>}]\z").expect("Invalid placeholder regex"))
}

/// The command bookmark of a field together with the id and transformation
/// parsed from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkBinding {
    pub bookmark: BookmarkHandle,
    pub id: String,
    pub trafo: Option<String>,
}

impl BookmarkBinding {
    pub fn new(bookmark: BookmarkHandle, id: impl Into<String>, trafo: Option<String>) -> Self {
        Self {
            bookmark,
            id: id.into(),
            trafo,
        }
    }
}

/// Value held by an input field that already exists in the bookmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundInputField {
    pub binding: BookmarkBinding,
    pub field: FieldId,
}

impl BoundInputField {
    pub fn new(binding: BookmarkBinding, field: FieldId) -> Self {
        Self { binding, field }
    }
}

impl FieldAccess for BoundInputField {
    fn id(&self) -> Option<&str> {
        Some(&self.binding.id)
    }

    fn trafo_name(&self, _doc: &Document) -> Option<String> {
        self.binding.trafo.clone()
    }

    fn single_parameter_trafo(&self) -> bool {
        true
    }

    fn value(&self, doc: &Document) -> String {
        doc.field_content(self.field).unwrap_or_default()
    }

    fn set_value(&mut self, doc: &mut Document, value: &str) -> Result<(), HostError> {
        doc.set_field_content(self.field, value)
    }

    fn anchor(&self, doc: &Document) -> Option<TextRange> {
        self.binding.bookmark.anchor(doc)
    }

    fn field_type(&self) -> FieldType {
        FieldType::Input
    }
}

/// A bookmark without a control. An input field is created on the first
/// non-empty write and used from then on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LazyInputField {
    pub binding: BookmarkBinding,
    pub materialized: Option<FieldId>,
}

impl LazyInputField {
    pub fn new(binding: BookmarkBinding) -> Self {
        Self {
            binding,
            materialized: None,
        }
    }

    /// Collapses the bookmark if it covers text that is not a placeholder, so
    /// that stray text is not overwritten by the field later on.
    pub fn collapse_unless_placeholder(&self, doc: &mut Document) {
        let bookmark = &self.binding.bookmark;
        let Some(text) = bookmark.text(doc) else {
            return;
        };
        if text.is_empty() || placeholder_pattern().is_match(text.trim()) {
            return;
        }
        info!(
            "Collapsing bookmark \"{}\" around the text \"{}\"",
            bookmark.name(),
            text
        );
        bookmark.collapse(doc);
    }

    fn materialize(&mut self, doc: &mut Document) -> Result<FieldId, HostError> {
        trace!(
            "creating input field for bookmark \"{}\"",
            self.binding.bookmark.name()
        );
        let field = doc.create_field(FieldKind::input(""));
        if let Err(e) = self.binding.bookmark.insert_field(doc, field) {
            doc.remove_field(field)?;
            return Err(e);
        }
        self.materialized = Some(field);
        Ok(field)
    }
}

impl FieldAccess for LazyInputField {
    fn id(&self) -> Option<&str> {
        Some(&self.binding.id)
    }

    fn trafo_name(&self, _doc: &Document) -> Option<String> {
        self.binding.trafo.clone()
    }

    fn single_parameter_trafo(&self) -> bool {
        true
    }

    fn value(&self, doc: &Document) -> String {
        self.materialized
            .and_then(|field| doc.field_content(field))
            .unwrap_or_default()
    }

    fn set_value(&mut self, doc: &mut Document, value: &str) -> Result<(), HostError> {
        let field = match (self.materialized, value.is_empty()) {
            (Some(field), _) => field,
            (None, true) => return self.binding.bookmark.set_text(doc, ""),
            (None, false) => self.materialize(doc)?,
        };
        doc.set_field_content(field, value)
    }

    fn anchor(&self, doc: &Document) -> Option<TextRange> {
        self.binding.bookmark.anchor(doc)
    }

    fn field_type(&self) -> FieldType {
        FieldType::DynamicInput
    }
}

/// Value held by a dropdown field. Values outside the items the field had
/// when it was found are appended to that list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropdownField {
    pub binding: BookmarkBinding,
    pub field: FieldId,
    pub allowed_values: Vec<String>,
}

impl DropdownField {
    pub fn new(binding: BookmarkBinding, field: FieldId, allowed_values: Vec<String>) -> Self {
        Self {
            binding,
            field,
            allowed_values,
        }
    }
}

impl FieldAccess for DropdownField {
    fn id(&self) -> Option<&str> {
        Some(&self.binding.id)
    }

    fn trafo_name(&self, _doc: &Document) -> Option<String> {
        self.binding.trafo.clone()
    }

    fn single_parameter_trafo(&self) -> bool {
        true
    }

    fn value(&self, doc: &Document) -> String {
        doc.field_content(self.field).unwrap_or_default()
    }

    fn set_value(&mut self, doc: &mut Document, value: &str) -> Result<(), HostError> {
        if !self.allowed_values.iter().any(|v| v == value) {
            let mut items = self.allowed_values.clone();
            items.push(value.to_string());
            doc.set_dropdown_items(self.field, items)?;
        }
        doc.set_dropdown_selected(self.field, value)
    }

    fn anchor(&self, doc: &Document) -> Option<TextRange> {
        self.binding.bookmark.anchor(doc)
    }

    fn field_type(&self) -> FieldType {
        FieldType::Dropdown
    }
}

/// Boolean value held by a two-state checkbox control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckboxField {
    pub binding: BookmarkBinding,
    pub shape: ShapeId,
}

impl CheckboxField {
    pub fn new(binding: BookmarkBinding, shape: ShapeId) -> Self {
        Self { binding, shape }
    }
}

impl FieldAccess for CheckboxField {
    fn id(&self) -> Option<&str> {
        Some(&self.binding.id)
    }

    fn trafo_name(&self, _doc: &Document) -> Option<String> {
        self.binding.trafo.clone()
    }

    fn single_parameter_trafo(&self) -> bool {
        true
    }

    fn value(&self, doc: &Document) -> String {
        doc.checkbox_state(self.shape).unwrap_or(false).to_string()
    }

    fn set_value(&mut self, doc: &mut Document, value: &str) -> Result<(), HostError> {
        doc.set_checkbox_state(self.shape, value.eq_ignore_ascii_case("true"))
    }

    fn anchor(&self, doc: &Document) -> Option<TextRange> {
        self.binding.bookmark.anchor(doc)
    }

    fn field_type(&self) -> FieldType {
        FieldType::Checkbox
    }
}
