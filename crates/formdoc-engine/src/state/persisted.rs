//! Text formats of the blobs the state reads and writes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use log::error;
use regex::Regex;

use crate::conf::ConfNode;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\A[a-zA-Z_][a-zA-Z_0-9]*\z").expect("Invalid identifier regex")
    })
}

pub fn is_identifier(s: &str) -> bool {
    identifier_pattern().is_match(s)
}

/// Parses `WM(Formularwerte((ID 'x' VALUE 'y') ...))`. Entries without an
/// `ID` are skipped; a missing `VALUE` reads as "".
pub fn parse_form_values(data: &str) -> BTreeMap<String, String> {
    let conf = match ConfNode::parse("", data) {
        Ok(conf) => conf,
        Err(e) => {
            error!("form values are not readable: {e}");
            return BTreeMap::new();
        }
    };
    let mut values = BTreeMap::new();
    for werte in conf.query("Formularwerte") {
        for entry in werte {
            let Some(id) = entry.get_string("ID") else {
                continue;
            };
            values.insert(id, entry.get_string("VALUE").unwrap_or_default());
        }
    }
    values
}

pub fn form_values_to_string(values: &BTreeMap<String, String>) -> String {
    let mut wm = ConfNode::new("WM");
    let werte = wm.add("Formularwerte");
    for (id, value) in values {
        let entry = werte.add("");
        entry.add("ID").add(id.as_str());
        entry.add("VALUE").add(value.as_str());
    }
    wm.string_representation()
}

/// Parses the print function list. Besides
/// `WM(Druckfunktionen((FUNCTION 'a') ...))` a single bare function name is
/// accepted.
pub fn parse_print_functions(data: &str) -> BTreeSet<String> {
    let trimmed = data.trim();
    if trimmed.is_empty() {
        return BTreeSet::new();
    }
    if is_identifier(trimmed) {
        return BTreeSet::from([trimmed.to_string()]);
    }
    match ConfNode::parse("", data) {
        Ok(conf) => conf
            .query_by_child("FUNCTION")
            .into_iter()
            .filter_map(|node| node.get_string("FUNCTION"))
            .filter(|name| !name.is_empty())
            .collect(),
        Err(e) => {
            error!("print functions '{data}' are not readable: {e}");
            BTreeSet::new()
        }
    }
}

/// `None` for an empty set, the bare name for a single function, the sorted
/// structured list otherwise.
pub fn print_functions_to_string(functions: &BTreeSet<String>) -> Option<String> {
    match functions.len() {
        0 => None,
        1 => functions.first().cloned(),
        _ => {
            let mut wm = ConfNode::new("WM");
            let list = wm.add("Druckfunktionen");
            for name in functions {
                list.add("").add("FUNCTION").add(name.as_str());
            }
            Some(wm.string_representation())
        }
    }
}
