// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
use formdoc_engine::{Document, FieldKind};

#[allow(dead_code)]
pub fn generate_blob(len: usize) -> String {
    "WM(Formularwerte((ID 'Name' VALUE 'Huber')))".chars().cycle().take(len).collect()
}

/// A letter with `paragraphs` paragraphs, each holding one bookmark-bound
/// input field, one placeholder bookmark and one merge field.
#[allow(dead_code)]
pub fn generate_form_document(paragraphs: usize) -> Document {
    let mut doc = Document::new();
    let body = doc.body();
    for i in 0..paragraphs {
        let p = doc.push_paragraph(body).unwrap();
        doc.push_text(body, p, "Sehr geehrte ").unwrap();

        let name = doc
            .push_bookmark_start(body, p, &format!("WM(CMD 'insertFormValue' ID 'Feld{}')", i % 20))
            .unwrap();
        doc.push_field(body, p, FieldKind::input(format!("Wert {i}"))).unwrap();
        doc.push_bookmark_end(body, p, &name).unwrap();

        let name = doc
            .push_bookmark_start(body, p, &format!("WM(CMD 'insertFormValue' ID 'Platz{i}')"))
            .unwrap();
        doc.push_text(body, p, "<Platzhalter>").unwrap();
        doc.push_bookmark_end(body, p, &name).unwrap();

        doc.push_field(body, p, FieldKind::database("Vorname")).unwrap();
    }
    doc
}
