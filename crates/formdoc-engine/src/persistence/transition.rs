use log::debug;

use crate::host::Document;

use super::{AnnotationStore, DataId, MetadataStore, PersistentDataContainer, StoreError};

/// Reads the metadata graph first and falls back to annotations; writes go
/// to both so documents stay readable by either backend.
#[derive(Debug, Default)]
pub struct TransitionStore {
    metadata: MetadataStore,
    annotation: AnnotationStore,
}

impl TransitionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentDataContainer for TransitionStore {
    fn get(&self, doc: &Document, id: DataId) -> Option<String> {
        self.metadata.get(doc, id).or_else(|| {
            debug!("{id} not in metadata, reading annotations");
            self.annotation.get(doc, id)
        })
    }

    fn set(&mut self, doc: &mut Document, id: DataId, value: &str) -> Result<(), StoreError> {
        self.annotation.set(doc, id, value)?;
        self.metadata.set(doc, id, value)
    }

    fn remove(&mut self, doc: &mut Document, id: DataId) -> Result<(), StoreError> {
        self.annotation.remove(doc, id)?;
        self.metadata.remove(doc, id)
    }

    fn flush(&mut self, doc: &mut Document) -> Result<(), StoreError> {
        self.annotation.flush(doc)?;
        self.metadata.flush(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn writes_both_backends() {
        let mut doc = Document::new();
        let mut store = TransitionStore::new();
        store.set(&mut doc, DataId::FormValues, "v").unwrap();
        store.flush(&mut doc).unwrap();

        assert_eq!(AnnotationStore::new().get(&doc, DataId::FormValues).as_deref(), Some("v"));
        assert_eq!(MetadataStore::new().get(&doc, DataId::FormValues).as_deref(), Some("v"));
    }

    #[test]
    fn falls_back_to_annotations() {
        let mut doc = Document::new();
        AnnotationStore::new()
            .set(&mut doc, DataId::PrintFunction, "legacy")
            .unwrap();
        let store = TransitionStore::new();
        assert_eq!(store.get(&doc, DataId::PrintFunction).as_deref(), Some("legacy"));
    }

    #[test]
    fn metadata_wins_over_annotations() {
        let mut doc = Document::new();
        AnnotationStore::new().set(&mut doc, DataId::SetType, "old").unwrap();
        let mut metadata = MetadataStore::new();
        metadata.set(&mut doc, DataId::SetType, "new").unwrap();
        metadata.flush(&mut doc).unwrap();

        assert_eq!(TransitionStore::new().get(&doc, DataId::SetType).as_deref(), Some("new"));
    }

    #[test]
    fn remove_clears_both() {
        let mut doc = Document::new();
        let mut store = TransitionStore::new();
        store.set(&mut doc, DataId::MailMerge, "m").unwrap();
        store.flush(&mut doc).unwrap();
        store.remove(&mut doc, DataId::MailMerge).unwrap();
        store.flush(&mut doc).unwrap();
        assert_eq!(store.get(&doc, DataId::MailMerge), None);
    }
}
