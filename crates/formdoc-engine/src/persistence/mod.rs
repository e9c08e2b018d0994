//! Named string blobs stored inside the document itself.
//!
//! Every blob is keyed by a [`DataId`]. Three backends exist: hidden
//! annotation chunks in a tiny frame, a document metadata graph, and a
//! transition mode that writes both. [`create_container`] picks one from a
//! [`StoreMode`].

pub mod annotation;
pub mod guard;
pub mod metadata;
pub mod transition;

use std::fmt;
use std::str::FromStr;

use log::{error, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::host::{Document, HostError};

pub use annotation::AnnotationStore;
pub use guard::RecordChangesGuard;
pub use metadata::MetadataStore;
pub use transition::TransitionStore;

/// Largest number of characters a single chunk holds.
pub const MAXCHUNK: usize = 16000;

/// Number of chunks needed for a blob of `len` characters.
pub fn chunk_count(len: usize) -> usize {
    len.div_ceil(MAXCHUNK).max(1)
}

/// Splits `value` into [`chunk_count`] pieces of at most [`MAXCHUNK`]
/// characters. The empty string yields one empty chunk.
pub fn split_chunks(value: &str) -> Vec<String> {
    let chars: Vec<char> = value.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(MAXCHUNK)
        .map(|c| c.iter().collect())
        .collect()
}

/// Stable keys of persisted blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataId {
    FormDescription,
    FormValues,
    MailMerge,
    PrintFunction,
    FilenameGeneratorFunc,
    SetType,
    TouchWollmuxVersion,
    TouchOooVersion,
}

impl DataId {
    pub const ALL: [DataId; 8] = [
        DataId::FormDescription,
        DataId::FormValues,
        DataId::MailMerge,
        DataId::PrintFunction,
        DataId::FilenameGeneratorFunc,
        DataId::SetType,
        DataId::TouchWollmuxVersion,
        DataId::TouchOooVersion,
    ];

    /// Tag written into every chunk and used as the metadata key.
    pub fn descriptor(self) -> &'static str {
        match self {
            DataId::FormDescription => "WollMuxFormularbeschreibung",
            DataId::FormValues => "WollMuxFormularwerte",
            DataId::MailMerge => "WollMuxSeriendruck",
            DataId::PrintFunction => "PrintFunction",
            DataId::FilenameGeneratorFunc => "FilenameGeneratorFunction",
            DataId::SetType => "SetType",
            DataId::TouchWollmuxVersion => "WollMuxVersion",
            DataId::TouchOooVersion => "OOoVersion",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DataId::FormDescription => "FORMULARBESCHREIBUNG",
            DataId::FormValues => "FORMULARWERTE",
            DataId::MailMerge => "SERIENDRUCK",
            DataId::PrintFunction => "PRINTFUNCTION",
            DataId::FilenameGeneratorFunc => "FILENAMEGENERATORFUNC",
            DataId::SetType => "SETTYPE",
            DataId::TouchWollmuxVersion => "TOUCH_WOLLMUXVERSION",
            DataId::TouchOooVersion => "TOUCH_OOOVERSION",
        }
    }

    /// Version stamps are stored but never interpreted.
    pub fn is_infodata(self) -> bool {
        matches!(self, DataId::TouchWollmuxVersion | DataId::TouchOooVersion)
    }

    /// Case-insensitive lookup by [`DataId::name`] or [`DataId::descriptor`].
    pub fn parse(s: &str) -> Option<Self> {
        DataId::ALL
            .into_iter()
            .find(|id| id.name().eq_ignore_ascii_case(s) || id.descriptor().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot create data container '{name}'")]
    ContainerUnavailable {
        name: &'static str,
        #[source]
        source: HostError,
    },

    #[error("writing {id} failed")]
    Write {
        id: DataId,
        #[source]
        source: HostError,
    },

    #[error("document does not support metadata")]
    MetadataUnsupported,
}

/// Storage of [`DataId`] keyed string blobs inside a document.
pub trait PersistentDataContainer: fmt::Debug {
    /// The stored value, or `None` if nothing is stored under `id`.
    fn get(&self, doc: &Document, id: DataId) -> Option<String>;

    /// Stores `value` under `id`, replacing the previous value.
    fn set(&mut self, doc: &mut Document, id: DataId, value: &str) -> Result<(), StoreError>;

    /// Deletes everything stored under `id`. Removing a missing id is a no-op.
    fn remove(&mut self, doc: &mut Document, id: DataId) -> Result<(), StoreError>;

    /// Commits pending writes.
    fn flush(&mut self, doc: &mut Document) -> Result<(), StoreError>;
}

/// How persistent data is kept in the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    Annotation,
    Metadata,
    #[default]
    Transition,
}

impl StoreMode {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreMode::Annotation => "annotation",
            StoreMode::Metadata => "metadata",
            StoreMode::Transition => "transition",
        }
    }

    /// Parses a configured mode; unknown values fall back to
    /// [`StoreMode::Annotation`].
    pub fn from_config(value: &str) -> Self {
        value.parse().unwrap_or_else(|e| {
            error!("{e}, using annotation mode");
            StoreMode::Annotation
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown persistent data mode '{0}'")]
pub struct UnknownStoreMode(pub String);

impl FromStr for StoreMode {
    type Err = UnknownStoreMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "annotation" => Ok(StoreMode::Annotation),
            "metadata" | "rdf" => Ok(StoreMode::Metadata),
            "transition" => Ok(StoreMode::Transition),
            _ => Err(UnknownStoreMode(s.to_string())),
        }
    }
}

impl fmt::Display for StoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the container for `mode`. Documents without metadata support get
/// the annotation backend whatever the mode.
pub fn create_container(mode: StoreMode, doc: &Document) -> Box<dyn PersistentDataContainer> {
    if mode != StoreMode::Annotation && !doc.supports_metadata() {
        warn!("document has no metadata support, using annotation mode instead of {mode}");
        return Box::new(AnnotationStore::new());
    }
    match mode {
        StoreMode::Annotation => Box::new(AnnotationStore::new()),
        StoreMode::Metadata => Box::new(MetadataStore::new()),
        StoreMode::Transition => Box::new(TransitionStore::new()),
    }
}
