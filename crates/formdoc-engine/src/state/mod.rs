//! Per-document aggregate tying the field scan, the persisted blobs and the
//! command bookmarks together.
//!
//! A [`TextDocumentState`] owns its [`Document`]. It is built once when a
//! document is opened and keeps its field maps current through
//! [`rescan`](TextDocumentState::rescan).

pub mod overrides;
pub mod persisted;

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, error, info, trace, warn};
use serde::Serialize;

use crate::conf::ConfNode;
use crate::document::{
    BookmarkHandle, Command, DocumentCommand, DocumentType, collect_commands, kill_pattern,
};
use crate::fields::{FieldAccess, FormField};
use crate::functions::{FormDescriptionFunctions, FunctionLibrary};
use crate::host::{Document, HostError};
use crate::persistence::{DataId, PersistentDataContainer, StoreError, StoreMode, create_container};
use crate::scanner::scan;

pub use overrides::{OverrideChainError, OverrideMap};

/// Shown instead of a preset value when untransformed fields of one id
/// disagree.
pub const FISHY: &str = "!!!PRÜFEN!!!";

/// Version recorded for documents that were never touched.
pub const UNKNOWN_VERSION: &str = "unknown";

/// How a [`TextDocumentState`] is set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateOptions {
    pub store_mode: StoreMode,
    /// Written to `TOUCH_WOLLMUXVERSION`.
    pub version_stamp: String,
    /// Written to `TOUCH_OOOVERSION`.
    pub host_version: String,
}

impl Default for StateOptions {
    fn default() -> Self {
        Self {
            store_mode: StoreMode::default(),
            version_stamp: env!("CARGO_PKG_VERSION").to_string(),
            host_version: UNKNOWN_VERSION.to_string(),
        }
    }
}

/// A field id used in the document but missing from a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferencedFieldId {
    pub id: String,
    /// True if at least one field of the id has a transformation.
    pub transformed: bool,
}

/// Field maps, form values and document settings of one open document.
#[derive(Debug)]
pub struct TextDocumentState {
    doc: Document,
    store: Box<dyn PersistentDataContainer>,
    options: StateOptions,
    commands: Vec<DocumentCommand>,
    functions: FormDescriptionFunctions,

    id_to_form_fields: BTreeMap<String, Vec<FormField>>,
    id_to_text_field_form_fields: BTreeMap<String, Vec<FormField>>,
    static_text_field_form_fields: Vec<FormField>,

    form_field_values: BTreeMap<String, String>,
    form_description: Option<ConfNode>,
    mailmerge_conf: Option<ConfNode>,
    print_functions: BTreeSet<String>,
    visibility: BTreeMap<String, bool>,
    overrides: OverrideMap,

    is_template: bool,
    is_form_document: bool,
    last_touched_version: String,
    last_touched_host_version: String,
    touched: bool,
    /// A write other than a version stamp waits for the next flush.
    unflushed_changes: bool,
}

impl TextDocumentState {
    /// Reads the persisted settings of `doc` and scans its fields.
    pub fn new(doc: Document, options: StateOptions) -> Self {
        let store = create_container(options.store_mode, &doc);
        let is_template = doc.url().is_none();
        let mut state = Self {
            doc,
            store,
            options,
            commands: Vec::new(),
            functions: FormDescriptionFunctions::new(),
            id_to_form_fields: BTreeMap::new(),
            id_to_text_field_form_fields: BTreeMap::new(),
            static_text_field_form_fields: Vec::new(),
            form_field_values: BTreeMap::new(),
            form_description: None,
            mailmerge_conf: None,
            print_functions: BTreeSet::new(),
            visibility: BTreeMap::new(),
            overrides: OverrideMap::new(),
            is_template,
            is_form_document: false,
            last_touched_version: UNKNOWN_VERSION.to_string(),
            last_touched_host_version: UNKNOWN_VERSION.to_string(),
            touched: false,
            unflushed_changes: false,
        };

        if let Some(values) = state.data(DataId::FormValues) {
            state.form_field_values = persisted::parse_form_values(&values);
        }
        if let Some(functions) = state.data(DataId::PrintFunction) {
            state.print_functions = persisted::parse_print_functions(&functions);
        }
        if let Some(version) = state.data(DataId::TouchWollmuxVersion) {
            state.last_touched_version = version;
        }
        if let Some(version) = state.data(DataId::TouchOooVersion) {
            state.last_touched_host_version = version;
        }

        state.rescan();

        if let Some(ty) = state.data(DataId::SetType) {
            state.set_type_str(&ty);
        }
        state
    }

    fn data(&self, id: DataId) -> Option<String> {
        self.store.get(&self.doc, id)
    }

    fn store_data(&mut self, id: DataId, value: Option<&str>) -> Result<(), StoreError> {
        if !id.is_infodata() {
            self.unflushed_changes = true;
        }
        match value {
            Some(value) => self.store.set(&mut self.doc, id, value),
            None => self.store.remove(&mut self.doc, id),
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Direct access to the document. Call [`rescan`](Self::rescan) after
    /// structural edits.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    pub fn store_mode(&self) -> StoreMode {
        self.options.store_mode
    }

    /// Rebuilds the field maps and the command derived settings from the
    /// document.
    pub fn rescan(&mut self) {
        self.functions = FormDescriptionFunctions::from_form_description(self.form_description());
        self.commands = collect_commands(&self.doc);

        let result = scan(&mut self.doc, &self.commands, &self.functions);
        self.id_to_form_fields = result.id_to_form_fields;
        self.id_to_text_field_form_fields = result.id_to_text_field_form_fields;
        self.static_text_field_form_fields = result.static_text_field_form_fields;

        let commands = std::mem::take(&mut self.commands);
        for command in &commands {
            match &command.command {
                Command::SetGroups { groups } => {
                    for group in groups {
                        self.visibility.entry(group.clone()).or_insert(true);
                    }
                }
                Command::SetType { doc_type } => self.set_type(*doc_type),
                Command::OverrideFrag {
                    frag_id,
                    new_frag_id,
                } => {
                    if let Err(e) = self.set_override(frag_id, new_frag_id) {
                        error!("{e}");
                    }
                }
                _ => {}
            }
        }
        self.commands = commands;
        debug!(
            "rescan: {} commands, {} field ids",
            self.commands.len(),
            self.all_field_ids().len()
        );
    }

    pub fn commands(&self) -> &[DocumentCommand] {
        &self.commands
    }

    // ---- fields ------------------------------------------------------------

    /// Fields inside `insertFormValue` bookmarks, each list in document order.
    pub fn id_to_form_fields(&self) -> &BTreeMap<String, Vec<FormField>> {
        &self.id_to_form_fields
    }

    /// Mail-merge and user variable fields by the id they depend on.
    pub fn id_to_text_field_form_fields(&self) -> &BTreeMap<String, Vec<FormField>> {
        &self.id_to_text_field_form_fields
    }

    pub fn static_text_field_form_fields(&self) -> &[FormField] {
        &self.static_text_field_form_fields
    }

    /// Every id with at least one field.
    pub fn all_field_ids(&self) -> BTreeSet<String> {
        self.id_to_form_fields
            .keys()
            .chain(self.id_to_text_field_form_fields.keys())
            .cloned()
            .collect()
    }

    /// Puts the view cursor on a field of `id`. Text fields win; among
    /// bookmark fields an untransformed one is preferred.
    pub fn focus_field(&mut self, id: &str) {
        let field = match self.id_to_text_field_form_fields.get(id).and_then(|f| f.first()) {
            Some(field) => Some(field),
            None => self.id_to_form_fields.get(id).and_then(|fields| {
                fields
                    .iter()
                    .find(|f| f.trafo_name(&self.doc).is_none())
                    .or_else(|| fields.first())
            }),
        };
        let Some(field) = field.cloned() else {
            trace!("no field with id '{id}' to focus");
            return;
        };
        if let Err(e) = field.focus(&mut self.doc) {
            trace!("cannot focus field '{id}': {e}");
        }
    }

    // ---- form values ---------------------------------------------------------

    pub fn form_field_values(&self) -> &BTreeMap<String, String> {
        &self.form_field_values
    }

    /// Records the value of `id`, or forgets it for `None`, and persists the
    /// value list.
    pub fn set_form_field_value(&mut self, id: &str, value: Option<&str>) -> Result<(), StoreError> {
        match value {
            Some(value) => {
                self.form_field_values
                    .insert(id.to_string(), value.to_string());
            }
            None => {
                self.form_field_values.remove(id);
            }
        }
        self.store_form_values()
    }

    /// Sets every known value to "".
    pub fn clear_form_field_values(&mut self) -> Result<(), StoreError> {
        for value in self.form_field_values.values_mut() {
            value.clear();
        }
        self.store_form_values()
    }

    fn store_form_values(&mut self) -> Result<(), StoreError> {
        let data = persisted::form_values_to_string(&self.form_field_values);
        self.store_data(DataId::FormValues, Some(&data))
    }

    /// The value list in its persisted text form.
    pub fn export_form_values(&self) -> String {
        persisted::form_values_to_string(&self.form_field_values)
    }

    /// Takes over every value of an exported list, persists them and
    /// updates the affected fields. Returns the ids that were imported.
    pub fn import_form_values(&mut self, data: &str) -> Result<Vec<String>, StoreError> {
        let imported = persisted::parse_form_values(data);
        let ids: Vec<String> = imported.keys().cloned().collect();
        self.form_field_values.extend(imported);
        self.store_form_values()?;
        for id in &ids {
            if let Err(e) = self.update_form_fields(id) {
                warn!("cannot update fields of '{id}': {e}");
            }
        }
        Ok(ids)
    }

    /// Writes the stored value of `id` into all its fields. Transformed
    /// fields receive the result of their function.
    pub fn update_form_fields(&mut self, id: &str) -> Result<(), HostError> {
        let Self {
            doc,
            functions,
            form_field_values,
            id_to_form_fields,
            id_to_text_field_form_fields,
            ..
        } = self;
        let value = form_field_values.get(id).cloned().unwrap_or_default();
        let lookup = |param: &str| form_field_values.get(param).cloned();

        let fields = id_to_form_fields
            .get_mut(id)
            .into_iter()
            .chain(id_to_text_field_form_fields.get_mut(id))
            .flatten();
        for field in fields {
            let shown = match field.trafo_name(doc) {
                None => Some(value.clone()),
                Some(trafo) if field.single_parameter_trafo() => {
                    functions.evaluate(&trafo, &|_: &str| Some(value.clone()))
                }
                Some(trafo) => functions.evaluate(&trafo, &lookup),
            };
            match shown {
                Some(shown) => field.set_value(doc, &shown)?,
                None => warn!("field '{id}': transformation could not be evaluated"),
            }
        }
        Ok(())
    }

    /// The value each id shows when the form opens: the value of its first
    /// untransformed field, else the stored value. Ids whose untransformed
    /// fields disagree get [`FISHY`].
    pub fn id_to_preset_value(&self) -> BTreeMap<String, String> {
        let mut presets = BTreeMap::new();
        for (id, stored) in &self.form_field_values {
            let values: Vec<String> = self
                .id_to_form_fields
                .get(id)
                .into_iter()
                .flatten()
                .filter(|f| f.trafo_name(&self.doc).is_none())
                .map(|f| f.value(&self.doc))
                .collect();
            let preset = match values.split_first() {
                None => stored.clone(),
                Some((first, rest)) if rest.iter().all(|v| v == first) => first.clone(),
                Some(_) => {
                    warn!("fields of '{id}' show different values");
                    FISHY.to_string()
                }
            };
            presets.insert(id.clone(), preset);
        }
        presets
    }

    /// Ids used by fields of the document that `schema` does not declare,
    /// sorted.
    pub fn referenced_field_ids_not_in_schema(
        &self,
        schema: &BTreeSet<String>,
    ) -> Vec<ReferencedFieldId> {
        self.all_field_ids()
            .into_iter()
            .filter(|id| !schema.contains(id))
            .map(|id| {
                let transformed = self
                    .id_to_form_fields
                    .get(&id)
                    .into_iter()
                    .chain(self.id_to_text_field_form_fields.get(&id))
                    .flatten()
                    .any(|f| f.trafo_name(&self.doc).is_some());
                ReferencedFieldId { id, transformed }
            })
            .collect()
    }

    // ---- fragment overrides ----------------------------------------------

    pub fn set_override(&mut self, frag_id: &str, new_frag_id: &str) -> Result<(), OverrideChainError> {
        self.overrides.insert(frag_id, new_frag_id)
    }

    /// The fragment to insert in place of `frag_id`.
    pub fn override_frag<'a>(&'a self, frag_id: &'a str) -> &'a str {
        self.overrides.resolve(frag_id)
    }

    pub fn overrides(&self) -> &OverrideMap {
        &self.overrides
    }

    // ---- print functions -------------------------------------------------

    pub fn print_functions(&self) -> &BTreeSet<String> {
        &self.print_functions
    }

    pub fn add_print_function(&mut self, name: &str) -> Result<(), StoreError> {
        self.print_functions.insert(name.to_string());
        self.store_print_functions()
    }

    pub fn remove_print_function(&mut self, name: &str) -> Result<(), StoreError> {
        if !self.print_functions.remove(name) {
            return Ok(());
        }
        self.store_print_functions()
    }

    fn store_print_functions(&mut self) -> Result<(), StoreError> {
        let data = persisted::print_functions_to_string(&self.print_functions);
        self.store_data(DataId::PrintFunction, data.as_deref())
    }

    // ---- form description ------------------------------------------------

    /// The merged form description, a `WM` node holding every `Formular`
    /// section of the stored description.
    pub fn form_description(&mut self) -> &ConfNode {
        self.form_description_mut()
    }

    fn form_description_mut(&mut self) -> &mut ConfNode {
        if self.form_description.is_none() {
            let mut wm = ConfNode::new("WM");
            if let Some(data) = self.data(DataId::FormDescription) {
                match ConfNode::parse("", &data) {
                    Ok(conf) => {
                        for formular in conf.query("Formular") {
                            wm.add_child(formular.clone());
                        }
                    }
                    Err(e) => error!("form description is not readable: {e}"),
                }
            }
            self.form_description = Some(wm);
        }
        self.form_description.get_or_insert_with(|| ConfNode::new("WM"))
    }

    /// Replaces the form description and persists it.
    pub fn set_form_description(&mut self, description: &ConfNode) -> Result<(), StoreError> {
        let mut wm = ConfNode::new("WM");
        for formular in description.query("Formular") {
            wm.add_child(formular.clone());
        }
        self.form_description = Some(wm);
        self.store_form_description()
    }

    /// Appends the `Formular` sections of `value` and persists the result.
    pub fn add_to_form_description(&mut self, value: &ConfNode) -> Result<(), StoreError> {
        let sections: Vec<ConfNode> = value.query("Formular").into_iter().cloned().collect();
        let wm = self.form_description_mut();
        for formular in sections {
            wm.add_child(formular);
        }
        self.store_form_description()
    }

    /// The `Funktionen` section of the last `Formular`, created if missing.
    /// Changes become persistent with
    /// [`store_form_description`](Self::store_form_description).
    pub fn funktionen_conf(&mut self) -> &mut ConfNode {
        let formular = last_child_named(self.form_description_mut(), "Formular");
        last_child_named(formular, "Funktionen")
    }

    /// Persists the form description, or removes it if no `Fenster`,
    /// `Sichtbarkeit` or `Funktionen` section has content.
    pub fn store_form_description(&mut self) -> Result<(), StoreError> {
        let wm = self.form_description_mut().clone();
        self.functions = FormDescriptionFunctions::from_form_description(&wm);
        let has_content = ["Fenster", "Sichtbarkeit", "Funktionen"]
            .iter()
            .any(|section| wm.query(section).iter().any(|s| s.count() > 0));
        if has_content {
            self.store_data(DataId::FormDescription, Some(&wm.string_representation()))
        } else {
            self.store_data(DataId::FormDescription, None)
        }
    }

    pub fn functions(&self) -> &FormDescriptionFunctions {
        &self.functions
    }

    // ---- mail merge, filename generator ----------------------------------

    /// The `Seriendruck` section of the stored mail-merge settings; an empty
    /// `Seriendruck` node if there are none.
    pub fn mailmerge_config(&mut self) -> &ConfNode {
        if self.mailmerge_conf.is_none() {
            let conf = self
                .data(DataId::MailMerge)
                .and_then(|data| match ConfNode::parse("", &data) {
                    Ok(conf) => conf
                        .query("WM")
                        .into_iter()
                        .flat_map(|wm| wm.query("Seriendruck"))
                        .last()
                        .cloned(),
                    Err(e) => {
                        error!("mail merge settings are not readable: {e}");
                        None
                    }
                })
                .unwrap_or_else(|| ConfNode::new("Seriendruck"));
            self.mailmerge_conf = Some(conf);
        }
        self.mailmerge_conf
            .get_or_insert_with(|| ConfNode::new("Seriendruck"))
    }

    /// Stores `conf` as `WM(Seriendruck(...))`; an empty node removes the
    /// settings.
    pub fn set_mailmerge_config(&mut self, conf: &ConfNode) -> Result<(), StoreError> {
        let mut seriendruck = conf.clone();
        seriendruck.set_name("Seriendruck");
        let result = if seriendruck.count() > 0 {
            let mut wm = ConfNode::new("WM");
            wm.add_child(seriendruck.clone());
            self.store_data(DataId::MailMerge, Some(&wm.string_representation()))
        } else {
            self.store_data(DataId::MailMerge, None)
        };
        self.mailmerge_conf = Some(seriendruck);
        result
    }

    /// The function that builds file names for this document.
    pub fn filename_generator_func(&self) -> Option<ConfNode> {
        let data = self.data(DataId::FilenameGeneratorFunc)?;
        match ConfNode::parse("func", &data) {
            Ok(conf) => conf.first_child().cloned(),
            Err(e) => {
                error!("filename generator function is not readable: {e}");
                None
            }
        }
    }

    pub fn set_filename_generator_func(&mut self, func: Option<&ConfNode>) -> Result<(), StoreError> {
        let data = func.map(ConfNode::string_representation);
        self.store_data(DataId::FilenameGeneratorFunc, data.as_deref())
    }

    // ---- document type and versions --------------------------------------

    pub fn set_type(&mut self, doc_type: DocumentType) {
        match doc_type {
            DocumentType::NormalTemplate => self.is_template = true,
            DocumentType::TemplateTemplate => self.is_template = false,
            DocumentType::FormDocument => self.is_form_document = true,
        }
    }

    fn set_type_str(&mut self, ty: &str) {
        match DocumentType::parse(ty) {
            Some(doc_type) => self.set_type(doc_type),
            None => warn!("ignoring unknown document type '{ty}'"),
        }
    }

    /// True if opening the document creates a new document. Defaults to
    /// "the document has no URL".
    pub fn is_template(&self) -> bool {
        self.is_template
    }

    pub fn is_form_document(&self) -> bool {
        self.is_form_document
    }

    pub fn mark_as_form_document(&mut self) -> Result<(), StoreError> {
        self.set_type(DocumentType::FormDocument);
        self.store_data(DataId::SetType, Some(DocumentType::FormDocument.as_str()))
    }

    /// Versions that last wrote the document, as read on open.
    pub fn last_touched_versions(&self) -> (&str, &str) {
        (&self.last_touched_version, &self.last_touched_host_version)
    }

    /// Records the current versions. Runs once per state; the document's
    /// modified flag is left as it was.
    pub fn update_last_touched_by_version_info(&mut self) -> Result<(), StoreError> {
        if self.touched {
            return Ok(());
        }
        self.touched = true;
        let modified = self.doc.is_modified();
        let version_stamp = self.options.version_stamp.clone();
        let host_version = self.options.host_version.clone();
        let result = self
            .store_data(DataId::TouchWollmuxVersion, Some(&version_stamp))
            .and_then(|()| self.store_data(DataId::TouchOooVersion, Some(&host_version)));
        self.doc.set_modified(modified);
        result
    }

    // ---- visibility --------------------------------------------------------

    /// Visibility of every group named by a `setGroups` command.
    pub fn visibility_state(&self) -> &BTreeMap<String, bool> {
        &self.visibility
    }

    pub fn set_visible_state(&mut self, group: &str, visible: bool) {
        self.visibility.insert(group.to_string(), visible);
    }

    /// `setGroups` bookmarks belonging to at least one hidden group.
    pub fn hidden_bookmarks(&self) -> Vec<&BookmarkHandle> {
        self.commands
            .iter()
            .filter(|c| match &c.command {
                Command::SetGroups { groups } => groups
                    .iter()
                    .any(|g| !self.visibility.get(g).copied().unwrap_or(true)),
                _ => false,
            })
            .map(|c| &c.bookmark)
            .collect()
    }

    pub fn first_jump_mark(&self) -> Option<&BookmarkHandle> {
        self.commands
            .iter()
            .find(|c| c.command == Command::SetJumpMark)
            .map(|c| &c.bookmark)
    }

    // ---- finishing -----------------------------------------------------------

    /// Turns the form into a plain document: drops the form commands and
    /// the stored form description and values.
    pub fn de_form(&mut self) -> Result<(), StoreError> {
        for name in self.doc.bookmark_names() {
            if kill_pattern().is_match(&name) {
                BookmarkHandle::new(name).remove(&mut self.doc);
            }
        }
        self.store_data(DataId::FormDescription, None)?;
        self.store_data(DataId::FormValues, None)?;
        self.form_description = None;
        self.form_field_values.clear();
        self.rescan();
        info!("form document turned into a plain document");
        Ok(())
    }

    /// Commits writes the store may have batched. If only version stamps
    /// were pending the modified flag is left as it was.
    pub fn flush_persistent_data(&mut self) -> Result<(), StoreError> {
        let modified = self.doc.is_modified();
        let result = self.store.flush(&mut self.doc);
        if !self.unflushed_changes {
            self.doc.set_modified(modified);
        }
        if result.is_ok() {
            self.unflushed_changes = false;
        }
        result
    }
}

/// The last child called `name`, appended if there is none.
fn last_child_named<'a>(node: &'a mut ConfNode, name: &str) -> &'a mut ConfNode {
    match node.iter().rposition(|c| c.name() == name) {
        Some(index) => &mut node.children_mut()[index],
        None => node.add(name),
    }
}

#[cfg(test)]
mod tests;
