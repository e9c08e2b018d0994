pub mod conf;
pub mod document;
pub mod fields;
pub mod fragments;
pub mod functions;
pub mod host;
pub mod persistence;
pub mod scanner;
pub mod state;

// Re-export key types for easier usage
pub use conf::{ConfError, ConfNode};
pub use document::{BookmarkHandle, Command, DocumentCommand, DocumentType};
pub use fields::{FieldAccess, FieldType, FormField};
pub use fragments::{FragmentError, urls_for_id};
pub use functions::{FormDescriptionFunctions, FunctionLibrary};
pub use host::{Document, FaultPlan, FieldKind, HostError, TextId, TextRange};
pub use persistence::{DataId, PersistentDataContainer, StoreError, StoreMode, create_container};
pub use scanner::{ScanResult, scan};
pub use state::{OverrideChainError, ReferencedFieldId, StateOptions, TextDocumentState};
