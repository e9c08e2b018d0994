//! Nested configuration tree.
//!
//! Every command bookmark and every stored blob is written in this syntax:
//! `WM(CMD 'insertFormValue' ID 'Anrede')`. A node has a name and an ordered
//! list of children; a node without children is a leaf whose name is its value.

mod lexer;
mod parser;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfError {
    #[error("syntax error at line {line}, column {column}: {text}")]
    Syntax {
        line: usize,
        column: usize,
        text: String,
    },

    #[error("')' without matching '(' at line {line}, column {column}")]
    UnbalancedClose { line: usize, column: usize },

    #[error("{0} closing parentheses missing")]
    MissingClose(usize),

    #[error("invalid escape '{escape}' at line {line}, column {column}")]
    BadEscape {
        line: usize,
        column: usize,
        escape: String,
    },

    #[error("%include at line {line} is not supported")]
    IncludeUnsupported { line: usize },

    #[error("node '{parent}' has no descendant '{name}'")]
    NodeNotFound { parent: String, name: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfNode {
    name: String,
    children: Vec<ConfNode>,
}

impl ConfNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Parses `input` into a new node called `name`.
    pub fn parse(name: &str, input: &str) -> Result<Self, ConfError> {
        let mut root = ConfNode::new(name);
        parser::parse_into(&mut root, input)?;
        Ok(root)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn children(&self) -> &[ConfNode] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [ConfNode] {
        &mut self.children
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConfNode> {
        self.children.iter()
    }

    pub fn count(&self) -> usize {
        self.children.len()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn first_child(&self) -> Option<&ConfNode> {
        self.children.first()
    }

    pub fn last_child(&self) -> Option<&ConfNode> {
        self.children.last()
    }

    /// Appends a new child called `name` and returns it.
    pub fn add(&mut self, name: impl Into<String>) -> &mut ConfNode {
        self.children.push(ConfNode::new(name));
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn add_child(&mut self, child: ConfNode) {
        self.children.push(child);
    }

    /// First direct child called `name`.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut ConfNode> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Descendants called `name` (this node excluded).
    ///
    /// The search goes level by level and stops at the first level with a
    /// match, so the result holds only the shallowest matches, in order.
    pub fn query(&self, name: &str) -> Vec<&ConfNode> {
        self.query_levels(name, false)
    }

    /// Like [`query`](Self::query), but returns the parents of the matches,
    /// each parent once.
    pub fn query_by_child(&self, name: &str) -> Vec<&ConfNode> {
        self.query_levels(name, true)
    }

    fn query_levels(&self, name: &str, parents: bool) -> Vec<&ConfNode> {
        let mut level: Vec<&ConfNode> = vec![self];
        while !level.is_empty() {
            let mut found: Vec<&ConfNode> = Vec::new();
            let mut next = Vec::new();
            for &node in &level {
                for child in &node.children {
                    if child.name == name {
                        let hit = if parents { node } else { child };
                        if !found.iter().any(|f| std::ptr::eq(*f, hit)) {
                            found.push(hit);
                        }
                    }
                    next.push(child);
                }
            }
            if !found.is_empty() {
                return found;
            }
            level = next;
        }
        Vec::new()
    }

    /// The first of the shallowest descendants called `name`.
    pub fn get(&self, name: &str) -> Result<&ConfNode, ConfError> {
        self.query(name)
            .into_iter()
            .next()
            .ok_or_else(|| ConfError::NodeNotFound {
                parent: self.name.clone(),
                name: name.to_string(),
            })
    }

    /// Value of the descendant called `name`, see [`fmt::Display`].
    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get(name).ok().map(ConfNode::to_string)
    }

    /// True for a node with exactly one leaf child, as in `ID 'x'`.
    pub fn is_key_value(&self) -> bool {
        self.children.len() == 1 && self.children[0].is_leaf()
    }

    /// Serializes the node in parseable single-line form.
    ///
    /// ```
    /// # use formdoc_engine::conf::ConfNode;
    /// let conf = ConfNode::parse("", "WM(CMD 'form')").unwrap();
    /// let wm = conf.get("WM").unwrap();
    /// assert_eq!(wm.string_representation(), "WM(CMD 'form')");
    /// ```
    pub fn string_representation(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out);
        out
    }

    fn write_repr(&self, out: &mut String) {
        if self.is_leaf() {
            quote_into(&self.name, out);
        } else if self.is_key_value() && !self.name.is_empty() {
            out.push_str(&self.name);
            out.push(' ');
            quote_into(&self.children[0].name, out);
        } else {
            out.push_str(&self.name);
            out.push('(');
            for (i, child) in self.children.iter().enumerate() {
                let opens_list = child.name.is_empty() && !child.is_leaf();
                if i > 0 && !opens_list {
                    out.push(' ');
                }
                child.write_repr(out);
            }
            out.push(')');
        }
    }
}

fn quote_into(value: &str, out: &mut String) {
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("''"),
            '%' => out.push_str("%%"),
            '\n' => out.push_str("%n"),
            '\r' => out.push_str("%u000d"),
            c => out.push(c),
        }
    }
    out.push('\'');
}

/// A leaf shows its name; any other node the concatenation of its children.
impl fmt::Display for ConfNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_leaf() {
            return f.write_str(&self.name);
        }
        for child in &self.children {
            fmt::Display::fmt(child, f)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ConfNode {
    type Item = &'a ConfNode;
    type IntoIter = std::slice::Iter<'a, ConfNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.children.iter()
    }
}
