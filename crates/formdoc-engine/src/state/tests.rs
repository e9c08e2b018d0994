use super::*;
use crate::host::FieldKind;
use crate::persistence::AnnotationStore;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn annotation_options() -> StateOptions {
    StateOptions {
        store_mode: StoreMode::Annotation,
        version_stamp: "18.2.0".into(),
        host_version: "7.6".into(),
    }
}

fn stored(state: &TextDocumentState, id: DataId) -> Option<String> {
    AnnotationStore::new().get(state.document(), id)
}

/// Appends a paragraph holding an `insertFormValue` bookmark around an
/// input field with `content`.
fn push_input(doc: &mut Document, id: &str, trafo: Option<&str>, content: &str) {
    let body = doc.body();
    let p = doc.push_paragraph(body).unwrap();
    let name = match trafo {
        Some(trafo) => format!("WM(CMD 'insertFormValue' ID '{id}' TRAFO '{trafo}')"),
        None => format!("WM(CMD 'insertFormValue' ID '{id}')"),
    };
    let name = doc.push_bookmark_start(body, p, &name).unwrap();
    doc.push_field(body, p, FieldKind::input(content)).unwrap();
    doc.push_bookmark_end(body, p, &name).unwrap();
}

fn push_command(doc: &mut Document, command: &str) -> String {
    let body = doc.body();
    let p = doc.push_paragraph(body).unwrap();
    let name = doc.push_bookmark_start(body, p, command).unwrap();
    doc.push_text(body, p, "x").unwrap();
    doc.push_bookmark_end(body, p, &name).unwrap();
    name
}

fn doc_with_data(entries: &[(DataId, &str)]) -> Document {
    let mut doc = Document::new();
    let mut store = AnnotationStore::new();
    for (id, value) in entries {
        store.set(&mut doc, *id, value).unwrap();
    }
    doc
}

#[test]
fn opening_reads_persisted_settings() {
    let doc = doc_with_data(&[
        (DataId::FormValues, "WM(Formularwerte((ID 'Name' VALUE 'Huber')))"),
        (DataId::PrintFunction, "Briefkopf"),
        (DataId::SetType, "FORMDOCUMENT"),
        (DataId::TouchWollmuxVersion, "17.0"),
    ]);
    let state = TextDocumentState::new(doc, annotation_options());

    assert_eq!(state.form_field_values()["Name"], "Huber");
    assert_eq!(
        state.print_functions().iter().collect::<Vec<_>>(),
        vec!["Briefkopf"]
    );
    assert!(state.is_form_document());
    assert!(state.is_template());
    assert_eq!(state.last_touched_versions(), ("17.0", UNKNOWN_VERSION));
}

#[test]
fn documents_with_url_are_not_templates() {
    let mut doc = Document::new();
    doc.set_url(Some("file:///tmp/brief.odt".into()));
    let state = TextDocumentState::new(doc, annotation_options());
    assert!(!state.is_template());
    assert!(!state.is_form_document());
}

#[rstest]
#[case("normalTemplate", true)]
#[case("templatetemplate", false)]
fn set_type_commands(#[case] ty: &str, #[case] template: bool) {
    let mut doc = Document::new();
    doc.set_url(Some("file:///tmp/vorlage.ott".into()));
    push_command(&mut doc, &format!("WM(CMD 'setType' TYPE '{ty}')"));
    let state = TextDocumentState::new(doc, annotation_options());
    assert_eq!(state.is_template(), template);
}

#[test]
fn form_values_are_persisted() {
    let mut state = TextDocumentState::new(Document::new(), annotation_options());
    state.set_form_field_value("Name", Some("Huber")).unwrap();
    state.set_form_field_value("Ort", Some("München")).unwrap();
    state.set_form_field_value("Name", None).unwrap();
    assert_eq!(
        stored(&state, DataId::FormValues).as_deref(),
        Some("WM(Formularwerte((ID 'Ort' VALUE 'München')))")
    );

    state.clear_form_field_values().unwrap();
    assert_eq!(state.form_field_values()["Ort"], "");

    let reopened = TextDocumentState::new(state.into_document(), annotation_options());
    assert_eq!(reopened.form_field_values()["Ort"], "");
}

#[test]
fn import_updates_fields() {
    let mut doc = Document::new();
    push_input(&mut doc, "Name", None, "");
    let mut state = TextDocumentState::new(doc, annotation_options());

    let exported = "WM(Formularwerte((ID 'Name' VALUE 'Huber')))";
    let ids = state.import_form_values(exported).unwrap();
    assert_eq!(ids, vec!["Name"]);
    assert_eq!(state.id_to_form_fields()["Name"][0].value(state.document()), "Huber");
    assert_eq!(state.export_form_values(), exported);
}

#[test]
fn update_form_fields_applies_transformations() {
    let mut doc = Document::new();
    push_input(&mut doc, "Name", None, "");
    push_input(&mut doc, "Name", Some("Gross"), "");
    push_input(&mut doc, "Name", Some("Anschrift"), "");
    let body = doc.body();
    doc.push_field(body, 0, FieldKind::input_user("WM(FUNCTION 'Anschrift')"))
        .unwrap();
    let mut state = TextDocumentState::new(doc, annotation_options());

    let description = ConfNode::parse(
        "",
        "WM(Formular(Funktionen(Gross(CAT('Hr. ' VALUE 'x')) Anschrift(CAT(VALUE 'Anrede' ' ' VALUE 'Name')))))",
    )
    .unwrap();
    state.set_form_description(&description).unwrap();
    state.rescan();

    state.set_form_field_value("Anrede", Some("Herr")).unwrap();
    state.set_form_field_value("Name", Some("Huber")).unwrap();
    state.update_form_fields("Name").unwrap();

    let doc = state.document();
    let values: Vec<String> = state.id_to_form_fields()["Name"]
        .iter()
        .map(|f| f.value(doc))
        .collect();
    assert_eq!(values, vec!["Huber", "Hr. Huber", "Huber Huber"]);
    assert_eq!(
        state.id_to_text_field_form_fields()["Name"][0].value(doc),
        "Herr Huber"
    );
}

#[test]
fn preset_values() {
    let mut doc = Document::new();
    push_input(&mut doc, "Einig", None, "a");
    push_input(&mut doc, "Einig", None, "a");
    push_input(&mut doc, "Uneinig", None, "a");
    push_input(&mut doc, "Uneinig", None, "b");
    push_input(&mut doc, "Transformiert", Some("Gross"), "X");
    let mut state = TextDocumentState::new(doc, annotation_options());
    for id in ["Einig", "Uneinig", "Transformiert", "Ohne"] {
        state.set_form_field_value(id, Some("gespeichert")).unwrap();
    }

    let presets = state.id_to_preset_value();
    assert_eq!(presets["Einig"], "a");
    assert_eq!(presets["Uneinig"], FISHY);
    assert_eq!(presets["Transformiert"], "gespeichert");
    assert_eq!(presets["Ohne"], "gespeichert");
}

#[test]
fn referenced_ids_outside_schema() {
    let mut doc = Document::new();
    push_input(&mut doc, "Name", None, "");
    push_input(&mut doc, "Datum", Some("Heute"), "");
    push_input(&mut doc, "Anrede", None, "");
    let state = TextDocumentState::new(doc, annotation_options());

    let schema = BTreeSet::from(["Anrede".to_string()]);
    assert_eq!(
        state.referenced_field_ids_not_in_schema(&schema),
        vec![
            ReferencedFieldId {
                id: "Datum".into(),
                transformed: true
            },
            ReferencedFieldId {
                id: "Name".into(),
                transformed: false
            },
        ]
    );
}

#[test]
fn focus_prefers_untransformed_fields() {
    let mut doc = Document::new();
    push_input(&mut doc, "Name", Some("Gross"), "");
    push_input(&mut doc, "Name", None, "");
    let mut state = TextDocumentState::new(doc, annotation_options());

    state.focus_field("Name");
    let expected = state.id_to_form_fields()["Name"][1].anchor(state.document());
    assert_eq!(state.document().view_cursor(), expected);

    state.focus_field("Fehlt");
    assert_eq!(state.document().view_cursor(), expected);
}

#[test]
fn print_functions_are_stored_on_every_change() {
    let mut state = TextDocumentState::new(Document::new(), annotation_options());
    state.add_print_function("zDruck").unwrap();
    assert_eq!(stored(&state, DataId::PrintFunction).as_deref(), Some("zDruck"));

    state.add_print_function("aDruck").unwrap();
    assert_eq!(
        stored(&state, DataId::PrintFunction).as_deref(),
        Some("WM(Druckfunktionen((FUNCTION 'aDruck')(FUNCTION 'zDruck')))")
    );

    state.remove_print_function("aDruck").unwrap();
    state.remove_print_function("zDruck").unwrap();
    state.remove_print_function("zDruck").unwrap();
    assert_eq!(stored(&state, DataId::PrintFunction), None);
}

#[test]
fn overrides_from_commands_and_calls() {
    let mut doc = Document::new();
    push_command(&mut doc, "WM(CMD 'overrideFrag' FRAG_ID 'Kopf' NEW_FRAG_ID 'KopfNeu')");
    let mut state = TextDocumentState::new(doc, annotation_options());

    assert_eq!(state.override_frag("Kopf"), "KopfNeu");
    assert!(state.set_override("KopfNeu", "Anders").is_err());
    state.set_override("Kopf", "KopfNeu").unwrap();
    state.rescan();
    assert_eq!(state.overrides().len(), 1);
}

#[test]
fn form_description_sections() {
    let mut state = TextDocumentState::new(
        doc_with_data(&[(
            DataId::FormDescription,
            "WM(Formular(TITLE 'Brief' Fenster(Tab(TITLE 'Absender'))))",
        )]),
        annotation_options(),
    );
    assert_eq!(state.form_description().query("Formular").len(), 1);

    state
        .funktionen_conf()
        .add("Gross")
        .add("VALUE")
        .add("Name");
    state.store_form_description().unwrap();
    assert_eq!(
        stored(&state, DataId::FormDescription).as_deref(),
        Some("WM(Formular(TITLE 'Brief' Fenster(Tab(TITLE 'Absender')) Funktionen(Gross(VALUE 'Name'))))")
    );
    assert_eq!(state.functions().names().collect::<Vec<_>>(), vec!["Gross"]);

    let extra = ConfNode::parse("", "Formular(Sichtbarkeit(Gruppe1(VALUE 'x')))").unwrap();
    state.add_to_form_description(&extra).unwrap();
    assert_eq!(state.form_description().count(), 2);
}

#[test]
fn empty_form_description_is_removed() {
    let mut state = TextDocumentState::new(
        doc_with_data(&[(DataId::FormDescription, "WM(Formular(Fenster(Tab(TITLE 'x'))))")]),
        annotation_options(),
    );
    let empty = ConfNode::parse("", "WM(Formular(TITLE 'leer'))").unwrap();
    state.set_form_description(&empty).unwrap();
    assert_eq!(stored(&state, DataId::FormDescription), None);
}

#[test]
fn mailmerge_settings() {
    let mut state = TextDocumentState::new(
        doc_with_data(&[(
            DataId::MailMerge,
            "WM(Seriendruck(DATENQUELLE 'alt') Seriendruck(DATENQUELLE 'neu'))",
        )]),
        annotation_options(),
    );
    assert_eq!(
        state.mailmerge_config().get_string("DATENQUELLE").as_deref(),
        Some("neu")
    );

    let conf = ConfNode::parse("Seriendruck", "TABELLE 'Adressen'").unwrap();
    state.set_mailmerge_config(&conf).unwrap();
    assert_eq!(
        stored(&state, DataId::MailMerge).as_deref(),
        Some("WM(Seriendruck(TABELLE 'Adressen'))")
    );

    state.set_mailmerge_config(&ConfNode::new("x")).unwrap();
    assert_eq!(stored(&state, DataId::MailMerge), None);
    assert_eq!(state.mailmerge_config().name(), "Seriendruck");
}

#[test]
fn filename_generator_function() {
    let mut state = TextDocumentState::new(Document::new(), annotation_options());
    assert_eq!(state.filename_generator_func(), None);

    let func = ConfNode::parse("", "CAT(VALUE 'Name' '.odt')").unwrap();
    let func = func.first_child().unwrap();
    state.set_filename_generator_func(Some(func)).unwrap();
    assert_eq!(state.filename_generator_func().as_ref(), Some(func));

    state.set_filename_generator_func(None).unwrap();
    assert_eq!(stored(&state, DataId::FilenameGeneratorFunc), None);
}

#[test]
fn version_info_is_written_once_without_touching_modified() {
    let mut state = TextDocumentState::new(Document::new(), annotation_options());
    state.document_mut().set_modified(false);
    state.update_last_touched_by_version_info().unwrap();
    assert!(!state.document().is_modified());
    assert_eq!(stored(&state, DataId::TouchWollmuxVersion).as_deref(), Some("18.2.0"));
    assert_eq!(stored(&state, DataId::TouchOooVersion).as_deref(), Some("7.6"));

    let mut store = AnnotationStore::new();
    store
        .set(state.document_mut(), DataId::TouchOooVersion, "other")
        .unwrap();
    state.update_last_touched_by_version_info().unwrap();
    assert_eq!(stored(&state, DataId::TouchOooVersion).as_deref(), Some("other"));
}

#[rstest]
#[case(StoreMode::Transition)]
#[case(StoreMode::Metadata)]
fn flushed_version_info_keeps_modified(#[case] store_mode: StoreMode) {
    let options = StateOptions {
        store_mode,
        ..annotation_options()
    };
    let mut state = TextDocumentState::new(Document::new(), options.clone());
    state.document_mut().set_modified(false);
    state.update_last_touched_by_version_info().unwrap();
    state.flush_persistent_data().unwrap();
    assert!(!state.document().is_modified());

    let reopened = TextDocumentState::new(state.into_document(), options);
    assert_eq!(reopened.last_touched_versions(), ("18.2.0", "7.6"));
}

#[test]
fn flushed_form_values_mark_modified() {
    let options = StateOptions {
        store_mode: StoreMode::Transition,
        ..annotation_options()
    };
    let mut state = TextDocumentState::new(Document::new(), options);
    state.document_mut().set_modified(false);
    state.update_last_touched_by_version_info().unwrap();
    state.set_form_field_value("Name", Some("Huber")).unwrap();
    state.flush_persistent_data().unwrap();
    assert!(state.document().is_modified());
}

#[test]
fn visibility_groups_and_jump_mark() {
    let mut doc = Document::new();
    let anlage = push_command(&mut doc, "WM(CMD 'setGroups' GROUPS('Anlage' 'Kopie'))");
    push_command(&mut doc, "WM(CMD 'setGroups' GROUPS('Kopie'))");
    let jump = push_command(&mut doc, "WM(CMD 'setJumpMark')");
    let mut state = TextDocumentState::new(doc, annotation_options());

    assert_eq!(
        state.visibility_state(),
        &BTreeMap::from([("Anlage".to_string(), true), ("Kopie".to_string(), true)])
    );
    assert!(state.hidden_bookmarks().is_empty());

    state.set_visible_state("Anlage", false);
    let hidden: Vec<&str> = state.hidden_bookmarks().iter().map(|b| b.name()).collect();
    assert_eq!(hidden, vec![anlage.as_str()]);

    state.rescan();
    assert!(!state.visibility_state()["Anlage"]);
    assert_eq!(state.first_jump_mark().map(|b| b.name()), Some(jump.as_str()));
}

#[test]
fn de_form_drops_form_commands_and_data() {
    let mut doc = doc_with_data(&[
        (DataId::FormDescription, "WM(Formular(Fenster(Tab(TITLE 'x'))))"),
        (DataId::FormValues, "WM(Formularwerte((ID 'Name' VALUE 'a')))"),
    ]);
    push_input(&mut doc, "Name", None, "a");
    push_command(&mut doc, "WM(CMD 'form')");
    let jump = push_command(&mut doc, "WM(CMD 'setJumpMark')");
    let mut state = TextDocumentState::new(doc, annotation_options());

    state.mark_as_form_document().unwrap();
    assert_eq!(stored(&state, DataId::SetType).as_deref(), Some("formDocument"));

    state.de_form().unwrap();
    assert_eq!(state.document().bookmark_names(), vec![jump]);
    assert!(state.id_to_form_fields().is_empty());
    assert!(state.form_field_values().is_empty());
    assert_eq!(stored(&state, DataId::FormDescription), None);
    assert_eq!(stored(&state, DataId::FormValues), None);
}

#[test]
fn transition_mode_flushes_metadata() {
    let mut state = TextDocumentState::new(Document::new(), StateOptions::default());
    assert_eq!(state.store_mode(), StoreMode::Transition);
    state.set_form_field_value("Name", Some("Huber")).unwrap();
    state.flush_persistent_data().unwrap();

    let doc = state.into_document();
    let reopened = TextDocumentState::new(doc, annotation_options());
    assert_eq!(reopened.form_field_values()["Name"], "Huber");
}
