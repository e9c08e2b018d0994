//! Form fields: the physical shapes a form value can take in a document,
//! behind one access contract.

pub mod bound;
pub mod textfield;
pub mod trafo;

use serde::Serialize;

use crate::host::{Document, HostError, TextRange};

pub use bound::{BookmarkBinding, BoundInputField, CheckboxField, DropdownField, LazyInputField};
pub use textfield::{MergeField, UserVariableField};
pub use trafo::{function_name_for_user_field, user_field_function_pattern};

/// Physical representation of a [`FormField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FieldType {
    Input,
    DynamicInput,
    Dropdown,
    Checkbox,
    Database,
    InputUser,
}

/// Uniform access to a form field, whatever its representation.
pub trait FieldAccess {
    /// Logical field id; `None` for fields found outside command bookmarks.
    fn id(&self) -> Option<&str>;

    /// Name of the transformation applied to the raw value.
    fn trafo_name(&self, doc: &Document) -> Option<String>;

    /// True if the transformation takes the field's own value as its only
    /// argument.
    fn single_parameter_trafo(&self) -> bool;

    fn value(&self, doc: &Document) -> String;

    fn set_value(&mut self, doc: &mut Document, value: &str) -> Result<(), HostError>;

    /// Region of the document the field occupies.
    fn anchor(&self, doc: &Document) -> Option<TextRange>;

    /// Moves the view cursor onto the field. Does nothing once the field has
    /// vanished from the document.
    fn focus(&self, doc: &mut Document) -> Result<(), HostError> {
        match self.anchor(doc) {
            Some(range) => doc.select(range),
            None => Ok(()),
        }
    }

    fn field_type(&self) -> FieldType;
}

/// A form field of any representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormField {
    Bound(BoundInputField),
    Lazy(LazyInputField),
    Dropdown(DropdownField),
    Checkbox(CheckboxField),
    Merge(MergeField),
    UserVariable(UserVariableField),
}

impl FormField {
    fn access(&self) -> &dyn FieldAccess {
        match self {
            FormField::Bound(f) => f,
            FormField::Lazy(f) => f,
            FormField::Dropdown(f) => f,
            FormField::Checkbox(f) => f,
            FormField::Merge(f) => f,
            FormField::UserVariable(f) => f,
        }
    }

    fn access_mut(&mut self) -> &mut dyn FieldAccess {
        match self {
            FormField::Bound(f) => f,
            FormField::Lazy(f) => f,
            FormField::Dropdown(f) => f,
            FormField::Checkbox(f) => f,
            FormField::Merge(f) => f,
            FormField::UserVariable(f) => f,
        }
    }

    /// The command bookmark a bookmark-bound field lives in.
    pub fn binding(&self) -> Option<&BookmarkBinding> {
        match self {
            FormField::Bound(f) => Some(&f.binding),
            FormField::Lazy(f) => Some(&f.binding),
            FormField::Dropdown(f) => Some(&f.binding),
            FormField::Checkbox(f) => Some(&f.binding),
            FormField::Merge(_) | FormField::UserVariable(_) => None,
        }
    }
}

impl FieldAccess for FormField {
    fn id(&self) -> Option<&str> {
        self.access().id()
    }

    fn trafo_name(&self, doc: &Document) -> Option<String> {
        self.access().trafo_name(doc)
    }

    fn single_parameter_trafo(&self) -> bool {
        self.access().single_parameter_trafo()
    }

    fn value(&self, doc: &Document) -> String {
        self.access().value(doc)
    }

    fn set_value(&mut self, doc: &mut Document, value: &str) -> Result<(), HostError> {
        self.access_mut().set_value(doc, value)
    }

    fn anchor(&self, doc: &Document) -> Option<TextRange> {
        self.access().anchor(doc)
    }

    fn focus(&self, doc: &mut Document) -> Result<(), HostError> {
        self.access().focus(doc)
    }

    fn field_type(&self) -> FieldType {
        self.access().field_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::BookmarkHandle;
    use crate::host::{FieldKind, Position};
    use pretty_assertions::assert_eq;

    fn bookmark_over(doc: &mut Document, text: &str, name: &str) -> BookmarkHandle {
        let body = doc.body();
        doc.push_text(body, 0, text).unwrap();
        let range = TextRange {
            start: Position { text: body, block: 0, offset: 0 },
            end: Position { text: body, block: 0, offset: text.chars().count() },
        };
        BookmarkHandle::create(doc, name, &range).unwrap()
    }

    #[test]
    fn enum_delegates_to_variant() {
        let mut doc = Document::new();
        let body = doc.body();
        let field = doc.push_field(body, 0, FieldKind::input("Hallo")).unwrap();
        let bookmark = BookmarkHandle::new("WM(CMD 'insertFormValue' ID 'Gruss')");
        let mut form_field = FormField::Bound(BoundInputField::new(
            BookmarkBinding::new(bookmark, "Gruss", None),
            field,
        ));

        assert_eq!(form_field.id(), Some("Gruss"));
        assert_eq!(form_field.field_type(), FieldType::Input);
        assert!(form_field.single_parameter_trafo());
        assert_eq!(form_field.value(&doc), "Hallo");
        form_field.set_value(&mut doc, "Servus").unwrap();
        assert_eq!(doc.field_content(field).as_deref(), Some("Servus"));
        assert!(form_field.binding().is_some());
    }

    #[test]
    fn focus_selects_anchor() {
        let mut doc = Document::new();
        let bookmark = bookmark_over(&mut doc, "<Name>", "WM(CMD 'insertFormValue' ID 'Name')");
        let form_field = FormField::Lazy(LazyInputField::new(BookmarkBinding::new(
            bookmark.clone(),
            "Name",
            None,
        )));
        form_field.focus(&mut doc).unwrap();
        assert_eq!(doc.view_cursor(), bookmark.anchor(&doc));
    }
}
