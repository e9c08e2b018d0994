//! Document-level building blocks on top of the host model: anchor ordering,
//! bookmark handles and command bookmarks.

pub mod bookmark;
pub mod commands;
pub mod ordering;

pub use bookmark::{BROKEN, BookmarkHandle};
pub use commands::{
    Command, CommandError, DocumentCommand, DocumentType, collect_commands, command_pattern,
    command_text, is_command_bookmark, kill_pattern, pattern_for_command,
};
pub use ordering::{AnchorOrdering, RangeRelation, compare_positions, sort_in_document_order};
