//! Transformation functions referenced by fields (`TRAFO`, `FUNCTION`).

use std::collections::BTreeMap;

use log::debug;

use crate::conf::ConfNode;

/// Lookup and evaluation of named functions.
pub trait FunctionLibrary {
    /// Ids of the form values the function reads, or `None` for an unknown
    /// function.
    fn parameters(&self, name: &str) -> Option<Vec<String>>;

    /// Result of the function, reading parameters through `value`. `None` if
    /// the function is unknown, cannot be evaluated, or a parameter is
    /// missing.
    fn evaluate(&self, name: &str, value: &dyn Fn(&str) -> Option<String>) -> Option<String>;
}

/// Functions defined in the `Funktionen` sections of a form description.
///
/// Evaluation understands string literals, `VALUE 'id'` and `CAT(...)`;
/// bodies using anything else only report their parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormDescriptionFunctions {
    functions: BTreeMap<String, ConfNode>,
}

impl FormDescriptionFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Functions of every `Formular(Funktionen(...))` section; later
    /// definitions win.
    pub fn from_form_description(form_description: &ConfNode) -> Self {
        let mut library = Self::new();
        for formular in form_description.query("Formular") {
            for funktionen in formular.query("Funktionen") {
                library.add_all(funktionen);
            }
        }
        library
    }

    /// Adds every child of a `Funktionen` node.
    pub fn add_all(&mut self, funktionen: &ConfNode) {
        for function in funktionen {
            self.functions
                .insert(function.name().to_string(), function.clone());
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

fn collect_values(node: &ConfNode, out: &mut Vec<String>) {
    for child in node {
        if child.name() == "VALUE" && child.is_key_value() {
            let id = child.to_string();
            if !out.contains(&id) {
                out.push(id);
            }
        } else {
            collect_values(child, out);
        }
    }
}

fn eval_sequence(node: &ConfNode, value: &dyn Fn(&str) -> Option<String>) -> Option<String> {
    node.iter().map(|child| eval(child, value)).collect()
}

fn eval(node: &ConfNode, value: &dyn Fn(&str) -> Option<String>) -> Option<String> {
    if node.is_leaf() {
        return Some(node.name().to_string());
    }
    match node.name() {
        "VALUE" => value(&node.to_string()),
        "CAT" | "" => eval_sequence(node, value),
        other => {
            debug!("cannot evaluate function '{other}'");
            None
        }
    }
}

impl FunctionLibrary for FormDescriptionFunctions {
    fn parameters(&self, name: &str) -> Option<Vec<String>> {
        let function = self.functions.get(name)?;
        let mut params = Vec::new();
        collect_values(function, &mut params);
        Some(params)
    }

    fn evaluate(&self, name: &str, value: &dyn Fn(&str) -> Option<String>) -> Option<String> {
        eval_sequence(self.functions.get(name)?, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn library() -> FormDescriptionFunctions {
        let conf = ConfNode::parse(
            "",
            r#"WM(
                Formular(Funktionen(
                    Gross(VALUE 'Name')
                    Anschrift(CAT(VALUE 'Anrede' " " VALUE 'Name'))
                ))
                Formular(Funktionen(
                    Gross(CAT("Hr. " VALUE 'Name'))
                    Datum(EXTERN(URL 'java:x'))
                    Leer()
                ))
            )"#,
        )
        .unwrap();
        FormDescriptionFunctions::from_form_description(&conf)
    }

    #[test]
    fn later_sections_override() {
        let lib = library();
        let names: Vec<&str> = lib.names().collect();
        assert_eq!(names, vec!["Anschrift", "Datum", "Gross", "Leer"]);
        let value = |_: &str| Some("Huber".to_string());
        assert_eq!(lib.evaluate("Gross", &value).as_deref(), Some("Hr. Huber"));
    }

    #[test]
    fn parameters_are_value_references() {
        let lib = library();
        assert_eq!(
            lib.parameters("Anschrift"),
            Some(vec!["Anrede".to_string(), "Name".to_string()])
        );
        assert_eq!(lib.parameters("Datum"), Some(vec![]));
        assert_eq!(lib.parameters("Fehlt"), None);
    }

    #[test]
    fn evaluation() {
        let lib = library();
        let values = |id: &str| match id {
            "Anrede" => Some("Frau".to_string()),
            "Name" => Some("Huber".to_string()),
            _ => None,
        };
        assert_eq!(lib.evaluate("Anschrift", &values).as_deref(), Some("Frau Huber"));
        assert_eq!(lib.evaluate("Datum", &values), None);
        assert_eq!(lib.evaluate("Leer", &values).as_deref(), Some(""));
        assert_eq!(lib.evaluate("Anschrift", &|_| None), None);
    }
}
