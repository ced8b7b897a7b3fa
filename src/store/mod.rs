//! Datastore port and persistence helpers.
//!
//! Writes are upserts keyed by stable identifiers (`word_th` for words, the
//! numeric `id` for senses) so repeated runs converge instead of
//! duplicating. No multi-row transaction spans a word and its senses:
//! callers treat fetch-after-write as the source of truth and re-validate.

use thiserror::Error;

use crate::gate::Valid;
use crate::schema::{SchemaViolation, Sense, Subtitle, Word};

pub mod json;
pub mod memory;

pub use json::JsonStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io failure: {0}")]
    Io(#[from] std::io::Error),
    /// A persisted row failed the validation gate on load.
    #[error("store row rejected: {0}")]
    Corrupt(#[from] SchemaViolation),
    #[error("store serialization failure: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The persistence boundary the batch runner drives. Implementations parse
/// every row through the validation gate before handing it out, and only
/// accept gate-validated records for writing.
pub trait Store {
    fn fetch_word(&self, word_th: &str) -> Result<Option<Word>, StoreError>;

    fn words(&self) -> Result<Vec<Word>, StoreError>;

    fn upsert_word(&mut self, word: &Valid<Word>) -> Result<(), StoreError>;

    /// Senses whose foreign key points at the word.
    fn senses_by_fk(&self, word_th: &str) -> Result<Vec<Sense>, StoreError>;

    /// Senses matching any of the given identifiers.
    fn senses_by_ids(&self, ids: &[i64]) -> Result<Vec<Sense>, StoreError>;

    fn upsert_sense(&mut self, sense: &Valid<Sense>) -> Result<(), StoreError>;

    fn subtitles(&self) -> Result<Vec<Subtitle>, StoreError>;

    fn upsert_subtitle(&mut self, subtitle: &Valid<Subtitle>) -> Result<(), StoreError>;
}

/// How many positional indices the derived-id fallback probes per word.
pub const DERIVED_ID_PROBE: usize = 8;

/// Deterministic fallback identifier for a sense without a foreign-key link:
/// FNV-1a 64-bit over `"{word_th}#{index}"`, folded into the positive `i64`
/// range. Fixed for compatibility with rows that predate the FK column.
pub fn derived_sense_id(word_th: &str, index: usize) -> i64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in format!("{word_th}#{index}").bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    (hash % (i64::MAX as u64)) as i64
}

/// Fetch the senses belonging to a word: the foreign-key link first, and the
/// hash-derived candidate id set when no linked row exists.
pub fn senses_for_word(store: &dyn Store, word_th: &str) -> Result<Vec<Sense>, StoreError> {
    let mut senses = store.senses_by_fk(word_th)?;
    if senses.is_empty() {
        let candidates: Vec<i64> = (0..DERIVED_ID_PROBE)
            .map(|index| derived_sense_id(word_th, index))
            .collect();
        senses = store.senses_by_ids(&candidates)?;
    }
    senses.sort_by_key(|sense| sense.id);
    Ok(senses)
}
