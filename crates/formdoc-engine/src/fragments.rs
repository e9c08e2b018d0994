//! Resolution of fragment ids to the URLs of their text fragments.
//!
//! Fragments are declared in `Textfragmente` sections:
//!
//! ```text
//! VAR(NAME 'BASE' VALUE 'file:///vorlagen')
//! Textfragmente(
//!     (FRAG_ID 'Kopf' URL('${BASE}/kopf.odt' 'http://server/kopf.odt'))
//!     (FRAG_ID 'Anlage_(.+)' URL('${BASE}/anlagen/$1.odt'))
//! )
//! ```
//!
//! `FRAG_ID` is a regular expression that must match the whole id. Group
//! references in the URLs are filled from the match.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use log::{error, warn};
use regex::Regex;
use thiserror::Error;

use crate::conf::ConfNode;
use crate::state::persisted::is_identifier;

/// Matches of `${...}` allowed in one string before giving up.
pub const MAX_VARIABLE_MATCHES: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FragmentError {
    #[error("'{0}' is not a valid fragment id")]
    InvalidIdentifier(String),

    #[error("variable expansion of '{0}' does not terminate")]
    EndlessLoop(String),
}

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^\}]*)\}").expect("Invalid variable regex"))
}

/// `NAME -> VALUE` of the `VAR` nodes; later definitions win.
pub fn variables(conf: &ConfNode) -> BTreeMap<String, String> {
    conf.query("VAR")
        .into_iter()
        .filter_map(|var| match (var.get_string("NAME"), var.get_string("VALUE")) {
            (Some(name), Some(value)) => Some((name, value)),
            _ => {
                warn!("ignoring incomplete VAR '{}'", var.string_representation());
                None
            }
        })
        .collect()
}

/// Replaces `${NAME}` with the value of variable `NAME`, starting over after
/// every replacement. Unknown variables are left in place.
pub fn expand_variables(
    input: &str,
    vars: &BTreeMap<String, String>,
) -> Result<String, FragmentError> {
    let mut out = input.to_string();
    let mut from = 0;
    let mut matches = 0;
    loop {
        let Some(caps) = variable_pattern().captures_at(&out, from) else {
            return Ok(out);
        };
        matches += 1;
        if matches >= MAX_VARIABLE_MATCHES {
            return Err(FragmentError::EndlessLoop(input.to_string()));
        }
        let range = caps.get(0).map_or(from..from, |m| m.range());
        let name = caps.get(1).map_or("", |m| m.as_str()).to_string();
        match vars.get(&name) {
            Some(value) => {
                out.replace_range(range, value);
                from = 0;
            }
            None => {
                error!("undefined variable '{name}' in '{input}'");
                from = range.end;
            }
        }
    }
}

/// URLs of the fragment `frag_id`, best candidate first.
///
/// Later `Textfragmente` sections take precedence. A URL whose variables do
/// not terminate is logged and skipped.
pub fn urls_for_id(conf: &ConfNode, frag_id: &str) -> Result<Vec<String>, FragmentError> {
    if !is_identifier(frag_id) {
        return Err(FragmentError::InvalidIdentifier(frag_id.to_string()));
    }
    let vars = variables(conf);
    let mut urls = Vec::new();

    for section in conf.query("Textfragmente").into_iter().rev() {
        for fragment in section.query_by_child("FRAG_ID") {
            let Some(mut pattern) = fragment.get_string("FRAG_ID") else {
                continue;
            };
            // ".*" would also match the empty string at the end of the id
            if pattern == ".*" {
                pattern = ".+".to_string();
            }
            let (Ok(full), Ok(find)) = (Regex::new(&format!(r"\A(?:{pattern})\z")), Regex::new(&pattern))
            else {
                error!("FRAG_ID '{pattern}' is not a valid regular expression");
                continue;
            };
            if !full.is_match(frag_id) {
                continue;
            }
            let Ok(url_list) = fragment.get("URL") else {
                warn!("fragment '{pattern}' has no URL");
                continue;
            };
            for url in url_list {
                match expand_variables(&url.to_string(), &vars) {
                    Ok(url) => urls.push(find.replace_all(frag_id, url.as_str()).into_owned()),
                    Err(e) => error!("{e}"),
                }
            }
        }
    }
    Ok(urls)
}
