use std::fmt;
use std::sync::OnceLock;

use log::{debug, warn};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::conf::{ConfError, ConfNode};
use crate::host::Document;

use super::bookmark::BookmarkHandle;
use super::ordering::sort_in_document_order;

/// Matches a command bookmark name; group 1 is the command text without the
/// numeric suffix the host appends to duplicate names.
pub fn command_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\A\s*(WM\s*\(.*\))\s*\d*\z").expect("Invalid command regex")
    })
}

/// Bookmarks that can be dropped once a document is turned into a plain
/// document: `form`, `setGroups` and `insertFormValue` commands, and
/// `setType` commands declaring a form document.
pub fn kill_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r"(\A\s*(WM\s*\(.*CMD\s*'((form)|(setGroups)|(insertFormValue))'.*\))\s*\d*\z)",
            r"|(\A\s*(WM\s*\(.*CMD\s*'(setType)'.*'formDocument'\))\s*\d*\z)",
            r"|(\A\s*(WM\s*\(.*'formDocument'.*CMD\s*'(setType)'.*\))\s*\d*\z)",
        ))
        .expect("Invalid kill regex")
    })
}

/// Pattern matching bookmark names of one command. `cmd` is inserted verbatim,
/// so `\w*` matches every command.
pub fn pattern_for_command(cmd: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"\A\s*(WM\s*\(.*CMD\s*'{cmd}'.*\))\s*\d*\z"))
}

pub fn is_command_bookmark(name: &str) -> bool {
    command_pattern().is_match(name)
}

/// The `WM(...)` part of a command bookmark name.
pub fn command_text(name: &str) -> Option<&str> {
    command_pattern()
        .captures(name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DocumentType {
    NormalTemplate,
    TemplateTemplate,
    FormDocument,
}

impl DocumentType {
    /// Case-insensitive parse of `normalTemplate`, `templateTemplate`,
    /// `formDocument`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "normaltemplate" => Some(DocumentType::NormalTemplate),
            "templatetemplate" => Some(DocumentType::TemplateTemplate),
            "formdocument" => Some(DocumentType::FormDocument),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::NormalTemplate => "normalTemplate",
            DocumentType::TemplateTemplate => "templateTemplate",
            DocumentType::FormDocument => "formDocument",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("'{0}' is not a command bookmark")]
    NotACommand(String),

    #[error(transparent)]
    Conf(#[from] ConfError),

    #[error("missing attribute {0}")]
    MissingAttribute(&'static str),

    #[error("invalid TYPE '{0}', expected normalTemplate, templateTemplate or formDocument")]
    InvalidType(String),
}

/// A parsed document command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Command {
    InsertFormValue { id: String, trafo: Option<String> },
    SetGroups { groups: Vec<String> },
    SetType { doc_type: DocumentType },
    OverrideFrag { frag_id: String, new_frag_id: String },
    Form,
    SetJumpMark,
    Other { cmd: String },
}

impl Command {
    /// Parses a bookmark name such as `WM(CMD 'insertFormValue' ID 'Name') 2`.
    pub fn from_bookmark_name(name: &str) -> Result<Self, CommandError> {
        let text = command_text(name).ok_or_else(|| CommandError::NotACommand(name.to_string()))?;
        let conf = ConfNode::parse("", text)?;
        Self::from_conf(&conf)
    }

    /// Interprets a parsed `WM(...)` tree.
    pub fn from_conf(conf: &ConfNode) -> Result<Self, CommandError> {
        let wm = conf.get("WM")?;
        let cmd = wm
            .get_string("CMD")
            .ok_or(CommandError::MissingAttribute("CMD"))?;
        let attr = |name: &'static str| wm.get_string(name).ok_or(CommandError::MissingAttribute(name));

        let command = match cmd.to_ascii_lowercase().as_str() {
            "insertformvalue" => Command::InsertFormValue {
                id: attr("ID")?,
                trafo: wm.get_string("TRAFO"),
            },
            "setgroups" => Command::SetGroups {
                groups: conf
                    .get("GROUPS")
                    .map(|g| g.iter().map(ConfNode::to_string).collect())
                    .unwrap_or_default(),
            },
            "settype" => {
                let ty = attr("TYPE")?;
                Command::SetType {
                    doc_type: DocumentType::parse(&ty).ok_or(CommandError::InvalidType(ty))?,
                }
            }
            "overridefrag" => Command::OverrideFrag {
                frag_id: attr("FRAG_ID")?,
                new_frag_id: wm.get_string("NEW_FRAG_ID").unwrap_or_default(),
            },
            "form" => Command::Form,
            "setjumpmark" => Command::SetJumpMark,
            _ => Command::Other { cmd },
        };
        Ok(command)
    }
}

/// A command together with the bookmark it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentCommand {
    pub bookmark: BookmarkHandle,
    pub command: Command,
}

/// All well-formed command bookmarks of `doc`, in document order.
///
/// Bookmarks that look like commands but do not parse are logged and skipped.
pub fn collect_commands(doc: &Document) -> Vec<DocumentCommand> {
    let mut commands: Vec<DocumentCommand> = doc
        .bookmark_names()
        .into_iter()
        .filter(|name| is_command_bookmark(name))
        .filter_map(|name| match Command::from_bookmark_name(&name) {
            Ok(command) => Some(DocumentCommand {
                bookmark: BookmarkHandle::new(name),
                command,
            }),
            Err(e) => {
                warn!("ignoring malformed command bookmark '{name}': {e}");
                None
            }
        })
        .collect();
    sort_in_document_order(doc, &mut commands, |c| c.bookmark.anchor(doc).map(|r| r.start));
    debug!("{} document commands", commands.len());
    commands
}
