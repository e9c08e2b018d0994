use log::{debug, error};

use crate::host::{AnchorType, Document, FieldId, FieldKind, FrameProps, Portion, TextId};

use super::guard::RecordChangesGuard;
use super::{DataId, PersistentDataContainer, StoreError, split_chunks};

/// Name of the frame holding the data annotations.
pub const FRAME_NAME: &str = "WollMuxDaten";

/// Stores blobs as hidden annotation fields in a tiny frame anchored to the
/// page. Each annotation carries the data id's descriptor as its author and
/// holds one chunk.
#[derive(Debug, Default)]
pub struct AnnotationStore;

impl AnnotationStore {
    pub fn new() -> Self {
        Self
    }

    fn frame_props() -> FrameProps {
        FrameProps {
            width: 5,
            height: 5,
            anchor: AnchorType::AtPage,
            back_transparent: true,
            border_width: 0,
            wrap_through: true,
            automatic_height: false,
            printable: false,
        }
    }

    /// The frame text, created on demand when `create` is set.
    fn container(doc: &mut Document, create: bool) -> Result<Option<TextId>, StoreError> {
        if let Some(frame) = doc.frame_by_name(FRAME_NAME) {
            return Ok(Some(frame.text));
        }
        if !create {
            return Ok(None);
        }
        debug!("creating data frame '{FRAME_NAME}'");
        match doc.create_frame(FRAME_NAME, Self::frame_props()) {
            Ok(text) => Ok(Some(text)),
            Err(source) => {
                error!("cannot create data frame '{FRAME_NAME}': {source}");
                Err(StoreError::ContainerUnavailable {
                    name: FRAME_NAME,
                    source,
                })
            }
        }
    }

    /// Annotation fields tagged with `id`, in document order.
    fn chunks(doc: &Document, frame: TextId, id: DataId) -> Vec<FieldId> {
        (0..doc.block_count(frame))
            .flat_map(|block| doc.portions(frame, block))
            .filter_map(|portion| match portion {
                Portion::TextField(field) => Some(field),
                _ => None,
            })
            .filter(|field| {
                matches!(
                    doc.field_kind(*field),
                    Some(FieldKind::Annotation { author, .. }) if author == id.descriptor()
                )
            })
            .collect()
    }

    /// Makes `frame` hold exactly `count` chunks for `id` and returns them.
    fn resize(doc: &mut Document, frame: TextId, id: DataId, count: usize) -> Result<Vec<FieldId>, StoreError> {
        for block in 0..doc.block_count(frame) {
            // tables in the frame have no character properties
            let _ = doc.set_paragraph_hidden(frame, block, true);
        }

        let mut fields = Self::chunks(doc, frame, id);
        while fields.len() > count {
            if let Some(surplus) = fields.pop() {
                doc.remove_field(surplus)
                    .map_err(|source| StoreError::Write { id, source })?;
            }
        }
        while fields.len() < count {
            let field = doc.create_field(FieldKind::annotation(id.descriptor(), ""));
            doc.append_field(frame, field)
                .map_err(|source| StoreError::Write { id, source })?;
            fields.push(field);
        }
        Ok(fields)
    }
}

impl PersistentDataContainer for AnnotationStore {
    fn get(&self, doc: &Document, id: DataId) -> Option<String> {
        let frame = doc.frame_by_name(FRAME_NAME)?.text;
        let fields = Self::chunks(doc, frame, id);
        if fields.is_empty() {
            return None;
        }
        Some(fields.into_iter().filter_map(|f| doc.field_content(f)).collect())
    }

    fn set(&mut self, doc: &mut Document, id: DataId, value: &str) -> Result<(), StoreError> {
        let mut doc = RecordChangesGuard::new(doc);
        let Some(frame) = Self::container(&mut doc, true)? else {
            return Ok(());
        };
        let chunks = split_chunks(value);
        let fields = Self::resize(&mut doc, frame, id, chunks.len())?;
        for (field, chunk) in fields.into_iter().zip(chunks) {
            doc.set_field_content(field, &chunk)
                .map_err(|source| StoreError::Write { id, source })?;
        }
        debug!("stored {id} in annotation frame");
        Ok(())
    }

    fn remove(&mut self, doc: &mut Document, id: DataId) -> Result<(), StoreError> {
        let mut doc = RecordChangesGuard::new(doc);
        let Some(frame) = Self::container(&mut doc, false)? else {
            return Ok(());
        };
        for field in Self::chunks(&doc, frame, id) {
            doc.remove_field(field)
                .map_err(|source| StoreError::Write { id, source })?;
        }
        Ok(())
    }

    fn flush(&mut self, _doc: &mut Document) -> Result<(), StoreError> {
        Ok(())
    }
}
