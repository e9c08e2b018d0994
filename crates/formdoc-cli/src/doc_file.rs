//! Documents on disk are the JSON form of the engine's [`Document`].

use anyhow::{Context, Result};
use formdoc_engine::Document;
use std::fs;
use std::path::Path;

pub fn load(path: &Path) -> Result<Document> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("cannot read document {}", path.display()))?;
    let doc = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a formdoc document", path.display()))?;
    Ok(doc)
}

pub fn save(path: &Path, doc: &Document) -> Result<()> {
    let contents = serde_json::to_string_pretty(doc)?;
    fs::write(path, contents).with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("brief.json");

        let mut doc = Document::new();
        let body = doc.body();
        doc.push_text(body, 0, "Sehr geehrte Damen und Herren").unwrap();
        save(&path, &doc).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.paragraph_string(body, 0), "Sehr geehrte Damen und Herren");
    }

    #[test]
    fn garbage_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("kaputt.json");
        fs::write(&path, "{ nope").unwrap();

        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("is not a formdoc document"));
    }
}
