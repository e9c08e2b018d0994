use serde::{Deserialize, Serialize};

use super::TextId;

/// Stable handle of a text field object owned by a [`super::Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(pub usize);

/// Stable handle of a control shape (form control drawn in the text flow).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShapeId(pub usize);

/// The service flavour of a text field and its properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Free text input field (`Content`, `Hint`).
    Input { content: String, hint: String },
    /// Dropdown with a list of items and the selected item.
    DropDown {
        items: Vec<String>,
        selected: String,
    },
    /// Mail-merge database field bound to a data column.
    Database {
        column: String,
        content: String,
        presentation: String,
    },
    /// User variable field; `content` names the shared master.
    InputUser { content: String },
    /// Annotation (comment) field, used as a hidden data chunk.
    Annotation { author: String, content: String },
    /// Any other field service (page numbers, dates, ...).
    Other { service: String },
}

impl FieldKind {
    pub fn input(content: impl Into<String>) -> Self {
        FieldKind::Input {
            content: content.into(),
            hint: String::new(),
        }
    }

    pub fn dropdown<I, S>(items: I, selected: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldKind::DropDown {
            items: items.into_iter().map(Into::into).collect(),
            selected: selected.into(),
        }
    }

    pub fn database(column: impl Into<String>) -> Self {
        let column = column.into();
        FieldKind::Database {
            presentation: format!("<{column}>"),
            content: String::new(),
            column,
        }
    }

    pub fn input_user(content: impl Into<String>) -> Self {
        FieldKind::InputUser {
            content: content.into(),
        }
    }

    pub fn annotation(author: impl Into<String>, content: impl Into<String>) -> Self {
        FieldKind::Annotation {
            author: author.into(),
            content: content.into(),
        }
    }

    /// Name of the office service this kind stands for.
    pub fn service_name(&self) -> &str {
        match self {
            FieldKind::Input { .. } => "com.sun.star.text.TextField.Input",
            FieldKind::DropDown { .. } => "com.sun.star.text.TextField.DropDown",
            FieldKind::Database { .. } => "com.sun.star.text.TextField.Database",
            FieldKind::InputUser { .. } => "com.sun.star.text.TextField.InputUser",
            FieldKind::Annotation { .. } => "com.sun.star.text.TextField.Annotation",
            FieldKind::Other { service } => service,
        }
    }
}

/// A text field object. `attached` is false once the field was removed from
/// the text flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextField {
    pub kind: FieldKind,
    pub attached: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeKind {
    /// Two-state checkbox form control.
    CheckBox { state: bool },
    /// Any other control model (buttons, list boxes, ...).
    Other { service: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlShape {
    pub kind: ShapeKind,
    pub attached: bool,
}

/// Shared master of user variable fields, looked up by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFieldMaster {
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnchorType {
    AtPage,
    AtParagraph,
}

/// Layout properties of a text frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameProps {
    pub width: u32,
    pub height: u32,
    pub anchor: AnchorType,
    pub back_transparent: bool,
    pub border_width: u32,
    pub wrap_through: bool,
    pub automatic_height: bool,
    pub printable: bool,
}

impl Default for FrameProps {
    fn default() -> Self {
        Self {
            width: 2000,
            height: 500,
            anchor: AnchorType::AtParagraph,
            back_transparent: false,
            border_width: 1,
            wrap_through: false,
            automatic_height: true,
            printable: true,
        }
    }
}

/// A named text frame owning its own text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub name: String,
    pub text: TextId,
    pub props: FrameProps,
}
