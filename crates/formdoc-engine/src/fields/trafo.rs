use std::sync::OnceLock;

use log::trace;
use regex::Regex;

use crate::conf::ConfNode;

/// Content of a user variable field that references a function, e.g.
/// `WM(FUNCTION 'Anrede') 2`.
pub fn user_field_function_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\A\s*(WM\s*\(.*FUNCTION\s*'[^']*'.*\))\s*\d*\z")
            .expect("Invalid user field function regex")
    })
}

/// Name of the function referenced by a user variable field's content.
///
/// `None` unless the content matches [`user_field_function_pattern`], parses,
/// and names exactly one `FUNCTION`.
pub fn function_name_for_user_field(content: &str) -> Option<String> {
    let conf_str = user_field_function_pattern()
        .captures(content)?
        .get(1)?
        .as_str();
    let conf = match ConfNode::parse("INSERT", conf_str) {
        Ok(conf) => conf,
        Err(e) => {
            trace!("{e}");
            return None;
        }
    };
    match conf.query("FUNCTION").as_slice() {
        [function] => Some(function.to_string()),
        _ => None,
    }
}
