//! Single-file JSON store backing the CLI.
//!
//! Rows are `unknown` until parsed: the whole file is read as raw JSON and
//! every row passes the validation gate before it enters memory. Writes go
//! through typed records and are flushed eagerly.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{Store, StoreError};
use crate::gate::{self, Valid};
use crate::schema::{Sense, Subtitle, Word};

#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    words: BTreeMap<String, Word>,
    senses: BTreeMap<i64, Sense>,
    subtitles: BTreeMap<String, Subtitle>,
}

impl JsonStore {
    /// Open a store file, parsing every row through the gate. A missing
    /// file yields an empty store.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut store = Self {
            path: path.to_path_buf(),
            words: BTreeMap::new(),
            senses: BTreeMap::new(),
            subtitles: BTreeMap::new(),
        };
        if !path.is_file() {
            return Ok(store);
        }

        let bytes = fs::read(path)?;
        let root: Value = serde_json::from_slice(&bytes)?;
        for row in rows(&root, "words") {
            let word = gate::enforce::<Word>(row)?.into_inner();
            store.words.insert(word.word_th.clone(), word);
        }
        for row in rows(&root, "senses") {
            let sense = gate::enforce::<Sense>(row)?.into_inner();
            store.senses.insert(sense.id, sense);
        }
        for row in rows(&root, "subtitles") {
            let subtitle = gate::enforce::<Subtitle>(row)?.into_inner();
            store.subtitles.insert(subtitle.id.clone(), subtitle);
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), StoreError> {
        let root = json!({
            "words": self.words.values().collect::<Vec<_>>(),
            "senses": self.senses.values().collect::<Vec<_>>(),
            "subtitles": self.subtitles.values().collect::<Vec<_>>(),
        });
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(&root)?;
        fs::write(&self.path, text.as_bytes())?;
        Ok(())
    }
}

fn rows<'a>(root: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    root.get(key)
        .and_then(Value::as_array)
        .map(|rows| rows.iter())
        .into_iter()
        .flatten()
}

impl Store for JsonStore {
    fn fetch_word(&self, word_th: &str) -> Result<Option<Word>, StoreError> {
        Ok(self.words.get(word_th).cloned())
    }

    fn words(&self) -> Result<Vec<Word>, StoreError> {
        Ok(self.words.values().cloned().collect())
    }

    fn upsert_word(&mut self, word: &Valid<Word>) -> Result<(), StoreError> {
        let word = word.get().clone();
        self.words.insert(word.word_th.clone(), word);
        self.persist()
    }

    fn senses_by_fk(&self, word_th: &str) -> Result<Vec<Sense>, StoreError> {
        Ok(self
            .senses
            .values()
            .filter(|sense| sense.word_th_id.as_deref() == Some(word_th))
            .cloned()
            .collect())
    }

    fn senses_by_ids(&self, ids: &[i64]) -> Result<Vec<Sense>, StoreError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.senses.get(id))
            .cloned()
            .collect())
    }

    fn upsert_sense(&mut self, sense: &Valid<Sense>) -> Result<(), StoreError> {
        let sense = sense.get().clone();
        self.senses.insert(sense.id, sense);
        self.persist()
    }

    fn subtitles(&self) -> Result<Vec<Subtitle>, StoreError> {
        Ok(self.subtitles.values().cloned().collect())
    }

    fn upsert_subtitle(&mut self, subtitle: &Valid<Subtitle>) -> Result<(), StoreError> {
        let subtitle = subtitle.get().clone();
        self.subtitles.insert(subtitle.id.clone(), subtitle);
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(&dir.path().join("records.json")).unwrap();
        assert!(store.subtitles().unwrap().is_empty());
    }

    #[test]
    fn rows_survive_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        let mut store = JsonStore::open(&path).unwrap();
        let word =
            gate::enforce::<Word>(&json!({"word_th": "บ้าน", "g2p": "baan4"})).unwrap();
        store.upsert_word(&word).unwrap();
        let sense = gate::enforce::<Sense>(&json!({
            "id": 7,
            "definition_th": "ที่อยู่อาศัย",
            "word_th_id": "บ้าน",
            "source": "orst",
        }))
        .unwrap();
        store.upsert_sense(&sense).unwrap();

        let reopened = JsonStore::open(&path).unwrap();
        assert_eq!(
            reopened.fetch_word("บ้าน").unwrap().unwrap().g2p.as_deref(),
            Some("baan4")
        );
        assert_eq!(reopened.senses_by_fk("บ้าน").unwrap().len(), 1);
    }

    #[test]
    fn corrupt_row_is_rejected_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let root = json!({
            "words": [{"word_th": "บ้าน", "unexpected": true}],
            "senses": [],
            "subtitles": [],
        });
        fs::write(&path, serde_json::to_string_pretty(&root).unwrap()).unwrap();

        let err = JsonStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
