//! Reconciles the paragraph structure of a document into form fields keyed
//! by logical id.
//!
//! ## Bookmark-bound fields
//!
//! Every paragraph is walked portion by portion with its own small state
//! machine. The start of an `insertFormValue` bookmark opens the bookmark;
//! the first input field, dropdown or checkbox before it closes binds that
//! control. A bookmark end, a collapsed bookmark or the end of the paragraph
//! closes it without a control, which yields a [`LazyInputField`]. Table
//! cells are separate texts and get their own machine, run where the table
//! stands in the flow.
//!
//! ## Field objects
//!
//! A second pass picks up mail-merge fields (keyed by data column) and user
//! variable fields that reference a function (keyed by the function's
//! parameters). These never interact with the bookmarks.

use std::collections::{BTreeMap, HashMap};

use log::{debug, error};

use crate::document::{Command, DocumentCommand, sort_in_document_order};
use crate::fields::{
    BookmarkBinding, BoundInputField, CheckboxField, DropdownField, FieldAccess, FormField,
    LazyInputField, MergeField, UserVariableField, function_name_for_user_field,
};
use crate::functions::FunctionLibrary;
use crate::host::{Document, FieldKind, MarkKind, Portion};

/// Fields of one document, grouped by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Fields inside `insertFormValue` bookmarks, each list in document order.
    pub id_to_form_fields: BTreeMap<String, Vec<FormField>>,
    /// Mail-merge and user variable fields by the id they depend on.
    pub id_to_text_field_form_fields: BTreeMap<String, Vec<FormField>>,
    /// User variable fields whose function takes no parameters.
    pub static_text_field_form_fields: Vec<FormField>,
}

#[derive(Debug, Default)]
enum ScanState {
    #[default]
    Idle,
    AwaitingControl(BookmarkBinding),
}

struct BookmarkPass<'a> {
    doc: &'a Document,
    bindings: HashMap<String, BookmarkBinding>,
    found: Vec<FormField>,
}

impl<'a> BookmarkPass<'a> {
    fn new(doc: &'a Document, commands: &[DocumentCommand]) -> Self {
        let bindings = commands
            .iter()
            .filter_map(|c| match &c.command {
                Command::InsertFormValue { id, trafo } => Some((
                    c.bookmark.name().to_string(),
                    BookmarkBinding::new(c.bookmark.clone(), id.clone(), trafo.clone()),
                )),
                _ => None,
            })
            .collect();
        Self {
            doc,
            bindings,
            found: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<FormField> {
        for (text, block) in self.doc.paragraphs_in_flow_order() {
            let portions = self.doc.portions(text, block);
            self.scan_paragraph(&portions);
        }
        self.found
    }

    fn scan_paragraph(&mut self, portions: &[Portion]) {
        let doc = self.doc;
        let mut state = ScanState::Idle;
        for portion in portions {
            state = match (std::mem::take(&mut state), portion) {
                (state, Portion::Bookmark { name, kind }) => self.on_bookmark(state, name, *kind),
                (ScanState::AwaitingControl(binding), Portion::TextField(field)) => {
                    match doc.field_kind(*field) {
                        Some(FieldKind::Input { .. }) => {
                            self.emit(FormField::Bound(BoundInputField::new(binding, *field)));
                            ScanState::Idle
                        }
                        Some(FieldKind::DropDown { items, .. }) => {
                            self.emit(FormField::Dropdown(DropdownField::new(
                                binding,
                                *field,
                                items.clone(),
                            )));
                            ScanState::Idle
                        }
                        _ => ScanState::AwaitingControl(binding),
                    }
                }
                (ScanState::AwaitingControl(binding), Portion::Frame(shape))
                    if doc.checkbox_state(*shape).is_some() =>
                {
                    self.emit(FormField::Checkbox(CheckboxField::new(binding, *shape)));
                    ScanState::Idle
                }
                (state, _) => state,
            };
        }
        if let ScanState::AwaitingControl(binding) = state {
            self.emit_lazy(binding);
        }
    }

    fn on_bookmark(&mut self, state: ScanState, name: &str, kind: MarkKind) -> ScanState {
        let Some(binding) = self.bindings.get(name).cloned() else {
            return state;
        };
        match kind {
            MarkKind::Start | MarkKind::Collapsed => {
                if let ScanState::AwaitingControl(open) = state {
                    debug!("bookmark \"{name}\" starts inside \"{}\"", open.bookmark.name());
                    self.emit_lazy(open);
                }
                if kind == MarkKind::Collapsed {
                    debug!("found collapsed bookmark for {name}");
                    self.emit_lazy(binding);
                    ScanState::Idle
                } else {
                    debug!("found bookmark start for {name}");
                    ScanState::AwaitingControl(binding)
                }
            }
            MarkKind::End => match state {
                ScanState::AwaitingControl(open) if open.bookmark.name() == name => {
                    debug!("found bookmark end for {name}");
                    self.emit_lazy(open);
                    ScanState::Idle
                }
                state => state,
            },
        }
    }

    fn emit_lazy(&mut self, binding: BookmarkBinding) {
        self.emit(FormField::Lazy(LazyInputField::new(binding)));
    }

    fn emit(&mut self, field: FormField) {
        self.found.push(field);
    }
}

/// Scans `doc` for the fields of `commands` and for free-standing field
/// objects.
///
/// Lazy fields whose bookmark covers literal text (anything but a `<...>`,
/// `[...]` or `{...}` placeholder) get their bookmark collapsed, which is why
/// the document is borrowed mutably.
pub fn scan(
    doc: &mut Document,
    commands: &[DocumentCommand],
    functions: &dyn FunctionLibrary,
) -> ScanResult {
    let found = BookmarkPass::new(doc, commands).run();

    for field in &found {
        if let FormField::Lazy(lazy) = field {
            lazy.collapse_unless_placeholder(doc);
        }
    }

    let mut result = ScanResult::default();
    for field in found {
        let id = field.id().unwrap_or_default().to_string();
        result.id_to_form_fields.entry(id).or_default().push(field);
    }
    for fields in result.id_to_form_fields.values_mut() {
        sort_in_document_order(doc, fields, |f| f.anchor(doc).map(|r| r.start));
    }

    collect_text_fields(doc, functions, &mut result);
    debug!(
        "scan found {} bookmark ids and {} field object ids",
        result.id_to_form_fields.len(),
        result.id_to_text_field_form_fields.len()
    );
    result
}

fn collect_text_fields(doc: &Document, functions: &dyn FunctionLibrary, result: &mut ScanResult) {
    for field in doc.fields_in_document_order() {
        match doc.field_kind(field) {
            Some(FieldKind::Database { column, .. }) if !column.is_empty() => {
                result
                    .id_to_text_field_form_fields
                    .entry(column.clone())
                    .or_default()
                    .push(FormField::Merge(MergeField::new(field)));
            }
            Some(FieldKind::InputUser { content }) => {
                let Some(function) = function_name_for_user_field(content) else {
                    continue;
                };
                let Some(params) = functions.parameters(&function) else {
                    error!("function '{function}' used in a form field is not defined");
                    continue;
                };
                let form_field = FormField::UserVariable(UserVariableField::new(field, content.clone()));
                if params.is_empty() {
                    result.static_text_field_form_fields.push(form_field);
                    continue;
                }
                for param in params.into_iter().filter(|p| !p.is_empty()) {
                    result
                        .id_to_text_field_form_fields
                        .entry(param)
                        .or_default()
                        .push(form_field.clone());
                }
            }
            _ => {}
        }
    }
}
