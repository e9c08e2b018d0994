//! Fields found as plain field objects, outside any command bookmark.

use crate::host::{Document, FieldId, FieldKind, HostError, TextRange};

use super::trafo::function_name_for_user_field;
use super::{FieldAccess, FieldType};

/// A mail-merge field. Never transformed; two merge fields are equal when
/// they wrap the same field object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergeField {
    pub field: FieldId,
}

impl MergeField {
    pub fn new(field: FieldId) -> Self {
        Self { field }
    }

    /// The data column the field is bound to.
    pub fn column(&self, doc: &Document) -> Option<String> {
        match doc.field_kind(self.field)? {
            FieldKind::Database { column, .. } => Some(column.clone()),
            _ => None,
        }
    }
}

impl FieldAccess for MergeField {
    fn id(&self) -> Option<&str> {
        None
    }

    fn trafo_name(&self, _doc: &Document) -> Option<String> {
        None
    }

    fn single_parameter_trafo(&self) -> bool {
        false
    }

    fn value(&self, doc: &Document) -> String {
        match doc.field_kind(self.field) {
            Some(FieldKind::Database {
                content,
                presentation,
                ..
            }) if content.is_empty() => presentation.clone(),
            Some(FieldKind::Database { content, .. }) => content.clone(),
            _ => String::new(),
        }
    }

    fn set_value(&mut self, doc: &mut Document, value: &str) -> Result<(), HostError> {
        doc.set_field_content(self.field, value)
    }

    fn anchor(&self, doc: &Document) -> Option<TextRange> {
        doc.field_anchor(self.field)
    }

    fn field_type(&self) -> FieldType {
        FieldType::Database
    }
}

/// A user variable field. The value lives in the shared master named by
/// `master`; the transformation is read from the field's content on every
/// access.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserVariableField {
    pub field: FieldId,
    pub master: String,
}

impl UserVariableField {
    pub fn new(field: FieldId, master: impl Into<String>) -> Self {
        Self {
            field,
            master: master.into(),
        }
    }
}

impl FieldAccess for UserVariableField {
    fn id(&self) -> Option<&str> {
        None
    }

    fn trafo_name(&self, doc: &Document) -> Option<String> {
        match doc.field_kind(self.field)? {
            FieldKind::InputUser { content } => function_name_for_user_field(content),
            _ => None,
        }
    }

    fn single_parameter_trafo(&self) -> bool {
        false
    }

    fn value(&self, doc: &Document) -> String {
        doc.user_master(&self.master)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    fn set_value(&mut self, doc: &mut Document, value: &str) -> Result<(), HostError> {
        doc.set_user_master_content(&self.master, value)
    }

    fn anchor(&self, doc: &Document) -> Option<TextRange> {
        doc.field_anchor(self.field)
    }

    fn field_type(&self) -> FieldType {
        FieldType::InputUser
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn merge_field_shows_presentation_until_filled() {
        let mut doc = Document::new();
        let body = doc.body();
        let field = doc.push_field(body, 0, FieldKind::database("Vorname")).unwrap();
        let mut merge = MergeField::new(field);

        assert_eq!(merge.column(&doc).as_deref(), Some("Vorname"));
        assert_eq!(merge.value(&doc), "<Vorname>");
        merge.set_value(&mut doc, "Anna").unwrap();
        assert_eq!(merge.value(&doc), "Anna");
        assert_eq!(merge.trafo_name(&doc), None);
        assert!(!merge.single_parameter_trafo());
    }

    #[test]
    fn merge_fields_compare_by_object() {
        let mut doc = Document::new();
        let body = doc.body();
        let a = doc.push_field(body, 0, FieldKind::database("X")).unwrap();
        let b = doc.push_field(body, 0, FieldKind::database("X")).unwrap();
        assert_eq!(MergeField::new(a), MergeField::new(a));
        assert_ne!(MergeField::new(a), MergeField::new(b));
    }

    #[test]
    fn user_variable_reads_trafo_on_every_access() {
        let mut doc = Document::new();
        let body = doc.body();
        let field = doc
            .push_field(body, 0, FieldKind::input_user("WM(FUNCTION 'Anrede')"))
            .unwrap();
        let mut var = UserVariableField::new(field, "WM(FUNCTION 'Anrede')");

        assert_eq!(var.trafo_name(&doc).as_deref(), Some("Anrede"));
        assert_eq!(var.value(&doc), "");
        var.set_value(&mut doc, "Sehr geehrte Frau").unwrap();
        assert_eq!(var.value(&doc), "Sehr geehrte Frau");

        if let Some(FieldKind::InputUser { .. }) = doc.field_kind(field) {
            doc.remove_field(field).unwrap();
        }
        assert_eq!(var.trafo_name(&doc), None);
    }
}
