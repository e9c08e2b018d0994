use std::collections::BTreeMap;

use log::{debug, trace};

use crate::host::{Document, HostError};

use super::guard::RecordChangesGuard;
use super::{DataId, PersistentDataContainer, StoreError};

/// Namespace of the metadata graph and its keys.
pub const METADATA_NAMESPACE: &str = "http://www.wollmux.org/WollMuxMetadata#";

/// Name of the metadata graph holding the data.
pub const GRAPH_NAME: &str = "WollMuxDaten";

fn graph() -> String {
    format!("{METADATA_NAMESPACE}{GRAPH_NAME}")
}

fn key(id: DataId) -> String {
    format!("{METADATA_NAMESPACE}{}", id.descriptor())
}

/// Stores one statement per data id in a document metadata graph.
///
/// Writes are queued and only reach the document on [`flush`], reads see
/// queued values first.
///
/// [`flush`]: PersistentDataContainer::flush
#[derive(Debug, Default)]
pub struct MetadataStore {
    pending: BTreeMap<DataId, Option<String>>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// The value stored in the document, ignoring queued writes.
    fn stored(doc: &Document, id: DataId) -> Option<String> {
        match doc.metadata_value(&graph(), &key(id)) {
            Ok(value) => value.map(str::to_string),
            Err(e) => {
                trace!("{e}");
                None
            }
        }
    }

    fn unsupported(doc: &Document) -> Result<(), StoreError> {
        if doc.supports_metadata() {
            Ok(())
        } else {
            Err(StoreError::MetadataUnsupported)
        }
    }
}

impl PersistentDataContainer for MetadataStore {
    fn get(&self, doc: &Document, id: DataId) -> Option<String> {
        match self.pending.get(&id) {
            Some(queued) => queued.clone(),
            None => Self::stored(doc, id),
        }
    }

    fn set(&mut self, doc: &mut Document, id: DataId, value: &str) -> Result<(), StoreError> {
        Self::unsupported(doc)?;
        self.pending.insert(id, Some(value.to_string()));
        Ok(())
    }

    fn remove(&mut self, doc: &mut Document, id: DataId) -> Result<(), StoreError> {
        Self::unsupported(doc)?;
        self.pending.insert(id, None);
        Ok(())
    }

    fn flush(&mut self, doc: &mut Document) -> Result<(), StoreError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut doc = RecordChangesGuard::new(doc);
        let graph = graph();
        while let Some((id, value)) = self.pending.pop_first() {
            let result = match &value {
                Some(v) => doc.set_metadata_value(&graph, &key(id), v),
                None => doc.remove_metadata_value(&graph, &key(id)),
            };
            if let Err(source) = result {
                // keep the failed write queued for the next flush
                self.pending.insert(id, value);
                return Err(match source {
                    HostError::MetadataUnsupported => StoreError::MetadataUnsupported,
                    source => StoreError::Write { id, source },
                });
            }
            debug!("flushed {id} to metadata graph");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::FaultPlan;
    use pretty_assertions::assert_eq;

    #[test]
    fn writes_wait_for_flush() {
        let mut doc = Document::new();
        let mut store = MetadataStore::new();
        store.set(&mut doc, DataId::FormValues, "v").unwrap();

        assert_eq!(store.get(&doc, DataId::FormValues).as_deref(), Some("v"));
        assert_eq!(MetadataStore::stored(&doc, DataId::FormValues), None);

        store.flush(&mut doc).unwrap();
        assert!(!store.has_pending());
        assert_eq!(
            doc.metadata_value(&graph(), &key(DataId::FormValues)).unwrap(),
            Some("v")
        );
        assert_eq!(MetadataStore::new().get(&doc, DataId::FormValues).as_deref(), Some("v"));
    }

    #[test]
    fn remove_hides_value_before_flush() {
        let mut doc = Document::new();
        let mut store = MetadataStore::new();
        store.set(&mut doc, DataId::SetType, "formDocument").unwrap();
        store.flush(&mut doc).unwrap();

        store.remove(&mut doc, DataId::SetType).unwrap();
        assert_eq!(store.get(&doc, DataId::SetType), None);
        store.flush(&mut doc).unwrap();
        assert_eq!(MetadataStore::stored(&doc, DataId::SetType), None);
        store.remove(&mut doc, DataId::SetType).unwrap();
        store.flush(&mut doc).unwrap();
    }

    #[test]
    fn large_values_are_one_statement() {
        let mut doc = Document::new();
        let mut store = MetadataStore::new();
        let value = "x".repeat(48000);
        store.set(&mut doc, DataId::FormDescription, &value).unwrap();
        store.flush(&mut doc).unwrap();
        assert_eq!(MetadataStore::stored(&doc, DataId::FormDescription), Some(value));
    }

    #[test]
    fn unsupported_documents_are_rejected() {
        let mut doc = Document::new();
        doc.set_fault_plan(FaultPlan {
            metadata_unsupported: true,
            ..FaultPlan::default()
        });
        let mut store = MetadataStore::new();
        assert!(matches!(
            store.set(&mut doc, DataId::FormValues, "v"),
            Err(StoreError::MetadataUnsupported)
        ));
        assert_eq!(store.get(&doc, DataId::FormValues), None);
    }

    #[test]
    fn failed_flush_keeps_queue_and_record_changes() {
        let mut doc = Document::new();
        doc.set_record_changes(true);
        let mut store = MetadataStore::new();
        store.set(&mut doc, DataId::FormValues, "a").unwrap();
        store.set(&mut doc, DataId::SetType, "b").unwrap();
        doc.set_fault_plan(FaultPlan::fail_after_writes(1));

        assert!(store.flush(&mut doc).is_err());
        assert!(doc.record_changes());
        assert!(store.has_pending());
        assert_eq!(store.get(&doc, DataId::SetType).as_deref(), Some("b"));
    }
}
