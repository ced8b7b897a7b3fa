//! In-memory store, used by tests and dry runs.

use std::collections::BTreeMap;

use super::{Store, StoreError};
use crate::gate::Valid;
use crate::schema::{Sense, Subtitle, Word};

#[derive(Debug, Default)]
pub struct MemoryStore {
    words: BTreeMap<String, Word>,
    senses: BTreeMap<i64, Sense>,
    subtitles: BTreeMap<String, Subtitle>,
}

impl Store for MemoryStore {
    fn fetch_word(&self, word_th: &str) -> Result<Option<Word>, StoreError> {
        Ok(self.words.get(word_th).cloned())
    }

    fn words(&self) -> Result<Vec<Word>, StoreError> {
        Ok(self.words.values().cloned().collect())
    }

    fn upsert_word(&mut self, word: &Valid<Word>) -> Result<(), StoreError> {
        let word = word.get().clone();
        self.words.insert(word.word_th.clone(), word);
        Ok(())
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
        Ok(())
    }

    fn subtitles(&self) -> Result<Vec<Subtitle>, StoreError> {
        Ok(self.subtitles.values().cloned().collect())
    }

    fn upsert_subtitle(&mut self, subtitle: &Valid<Subtitle>) -> Result<(), StoreError> {
        let subtitle = subtitle.get().clone();
        self.subtitles.insert(subtitle.id.clone(), subtitle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate;
    use serde_json::json;

    #[test]
    fn upsert_word_converges() {
        let mut store = MemoryStore::default();
        let bare = gate::enforce::<Word>(&json!({"word_th": "บ้าน"})).unwrap();
        store.upsert_word(&bare).unwrap();
        let enriched =
            gate::enforce::<Word>(&json!({"word_th": "บ้าน", "g2p": "baan4"})).unwrap();
        store.upsert_word(&enriched).unwrap();

        let fetched = store.fetch_word("บ้าน").unwrap().unwrap();
        assert_eq!(fetched.g2p.as_deref(), Some("baan4"));
    }

    #[test]
    fn upsert_sense_updates_in_place() {
        let mut store = MemoryStore::default();
        let raw = gate::enforce::<Sense>(&json!({
            "id": 7,
            "definition_th": "ที่อยู่อาศัย",
            "word_th_id": "บ้าน",
            "source": "orst",
        }))
        .unwrap();
        store.upsert_sense(&raw).unwrap();
        let normalized = gate::enforce::<Sense>(&json!({
            "id": 7,
            "definition_th": "ที่อยู่อาศัย",
            "word_th_id": "บ้าน",
            "source": "gpt-normalized",
        }))
        .unwrap();
        store.upsert_sense(&normalized).unwrap();

        let senses = store.senses_by_fk("บ้าน").unwrap();
        assert_eq!(senses.len(), 1);
        assert_eq!(senses[0].source.as_deref(), Some("gpt-normalized"));
    }
}
