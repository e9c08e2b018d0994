use formdoc_engine::host::FieldKind;
use formdoc_engine::persistence::{MAXCHUNK, chunk_count};
use formdoc_engine::{DataId, Document, FaultPlan, StoreError, StoreMode, create_container};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn blob(len: usize) -> String {
    "0123456789".chars().cycle().take(len).collect()
}

fn annotation_chunks(doc: &Document, id: DataId) -> usize {
    doc.fields_in_document_order()
        .into_iter()
        .filter(|f| {
            matches!(
                doc.field_kind(*f),
                Some(FieldKind::Annotation { author, .. }) if author == id.descriptor()
            )
        })
        .count()
}

#[rstest]
fn round_trip_in_every_mode(
    #[values(StoreMode::Annotation, StoreMode::Metadata, StoreMode::Transition)] mode: StoreMode,
    #[values(0, MAXCHUNK, MAXCHUNK + 1, 3 * MAXCHUNK)] len: usize,
) {
    let mut doc = Document::new();
    let mut store = create_container(mode, &doc);
    let value = blob(len);

    store.set(&mut doc, DataId::FormDescription, &value).unwrap();
    store.flush(&mut doc).unwrap();
    assert_eq!(store.get(&doc, DataId::FormDescription), Some(value));

    let expected_chunks = match mode {
        StoreMode::Metadata => 0,
        StoreMode::Annotation | StoreMode::Transition => chunk_count(len),
    };
    assert_eq!(annotation_chunks(&doc, DataId::FormDescription), expected_chunks);
}

#[test]
fn shrinking_leaves_no_stale_chunks() {
    let mut doc = Document::new();
    let mut store = create_container(StoreMode::Annotation, &doc);
    store.set(&mut doc, DataId::FormValues, &blob(40000)).unwrap();
    assert_eq!(annotation_chunks(&doc, DataId::FormValues), 3);

    store.set(&mut doc, DataId::FormValues, &blob(16001)).unwrap();
    assert_eq!(annotation_chunks(&doc, DataId::FormValues), 2);
    assert_eq!(store.get(&doc, DataId::FormValues), Some(blob(16001)));
}

#[rstest]
fn remove_is_idempotent(
    #[values(StoreMode::Annotation, StoreMode::Transition)] mode: StoreMode,
) {
    let mut doc = Document::new();
    let mut store = create_container(mode, &doc);
    store.set(&mut doc, DataId::MailMerge, "WM(Seriendruck(X 'y'))").unwrap();
    store.set(&mut doc, DataId::SetType, "formDocument").unwrap();

    store.remove(&mut doc, DataId::MailMerge).unwrap();
    store.remove(&mut doc, DataId::MailMerge).unwrap();
    store.flush(&mut doc).unwrap();

    assert_eq!(store.get(&doc, DataId::MailMerge), None);
    assert_eq!(store.get(&doc, DataId::SetType).as_deref(), Some("formDocument"));
}

#[test]
fn record_changes_survive_a_failed_write() {
    let mut doc = Document::new();
    doc.set_record_changes(true);
    doc.set_fault_plan(FaultPlan::fail_after_writes(1));
    let mut store = create_container(StoreMode::Annotation, &doc);

    let err = store
        .set(&mut doc, DataId::FormValues, &blob(2 * MAXCHUNK + 5))
        .unwrap_err();
    assert!(matches!(err, StoreError::Write { .. }));
    assert!(doc.record_changes());
}

#[test]
fn refused_container_keeps_existing_state() {
    let mut doc = Document::new();
    doc.set_record_changes(true);
    doc.set_fault_plan(FaultPlan::refuse_frames());
    let mut store = create_container(StoreMode::Annotation, &doc);

    let err = store.set(&mut doc, DataId::PrintFunction, "druck").unwrap_err();
    assert!(matches!(err, StoreError::ContainerUnavailable { .. }));
    assert_eq!(store.get(&doc, DataId::PrintFunction), None);
    assert!(doc.record_changes());
}
