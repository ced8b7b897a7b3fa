//! The validation gate: the single choke point for externally-sourced or
//! externally-bound data.
//!
//! All datastore rows and oracle responses pass through [`enforce`] or
//! [`enforce_layered`] before any other module may treat them as trusted.
//! [`Valid`] is only constructible here, so a function signature taking
//! `&Valid<T>` is proof the value was parsed.

use serde_json::Value;
use thiserror::Error;

use crate::contracts::ContractViolation;
use crate::schema::{SchemaViolation, Sense, Subtitle, Token, Word};

/// A record that can only be produced by its schema parser.
pub trait Record: Sized {
    const ENTITY: &'static str;

    fn parse(value: &Value) -> Result<Self, SchemaViolation>;
}

impl Record for Word {
    const ENTITY: &'static str = "word";

    fn parse(value: &Value) -> Result<Self, SchemaViolation> {
        Word::parse(value)
    }
}

impl Record for Sense {
    const ENTITY: &'static str = "sense";

    fn parse(value: &Value) -> Result<Self, SchemaViolation> {
        Sense::parse(value)
    }
}

impl Record for Subtitle {
    const ENTITY: &'static str = "subtitle";

    fn parse(value: &Value) -> Result<Self, SchemaViolation> {
        Subtitle::parse(value)
    }
}

impl Record for Token {
    const ENTITY: &'static str = "token";

    fn parse(value: &Value) -> Result<Self, SchemaViolation> {
        Token::parse(value)
    }
}

/// Layered gate failure. The two variants are distinct on purpose: callers
/// and tests depend on telling "malformed" apart from "not yet complete".
#[derive(Debug, Clone, Error)]
pub enum GateError {
    #[error(transparent)]
    Schema(#[from] SchemaViolation),
    #[error(transparent)]
    Contract(#[from] ContractViolation),
}

/// A record that passed the gate. Not constructible outside this module.
#[derive(Debug, Clone, PartialEq)]
pub struct Valid<T> {
    inner: T,
}

impl<T> Valid<T> {
    pub fn get(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> AsRef<T> for Valid<T> {
    fn as_ref(&self) -> &T {
        &self.inner
    }
}

/// Parse-or-fail. Used where a structural failure must abort the current
/// operation immediately.
pub fn enforce<T: Record>(value: &Value) -> Result<Valid<T>, SchemaViolation> {
    T::parse(value).map(|inner| Valid { inner })
}

/// Parse the base schema first, then the contract. Structural failure is
/// always reported before any business predicate runs.
pub fn enforce_layered<T, C>(value: &Value, contract: C) -> Result<Valid<T>, GateError>
where
    T: Record,
    C: Fn(&T) -> Result<(), ContractViolation>,
{
    let parsed = T::parse(value)?;
    contract(&parsed)?;
    Ok(Valid { inner: parsed })
}

/// Re-admit an already-typed record by serializing it back through its own
/// parser. Used when a step constructed a record in memory and the result
/// must still prove itself before persistence.
pub fn revalidate<T>(record: &T) -> Result<Valid<T>, SchemaViolation>
where
    T: Record + serde::Serialize,
{
    let value = serde_json::to_value(record).map_err(|err| {
        SchemaViolation::new(
            T::ENTITY,
            vec![crate::schema::FieldViolation::invalid(
                "<root>",
                "could not be serialized for validation",
                "a serializable record",
                err.to_string(),
            )],
        )
    })?;
    enforce::<T>(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::complete_word;
    use serde_json::json;

    #[test]
    fn enforce_accepts_valid_word() {
        let valid = enforce::<Word>(&json!({"word_th": "บ้าน"})).unwrap();
        assert_eq!(valid.get().word_th, "บ้าน");
    }

    #[test]
    fn layered_reports_structural_failure_before_contract() {
        // Structurally invalid AND business-incomplete: must surface as Schema.
        let err = enforce_layered::<Word, _>(&json!({"word_th": 42}), complete_word).unwrap_err();
        assert!(matches!(err, GateError::Schema(_)));
    }

    #[test]
    fn layered_reports_contract_failure_on_valid_shape() {
        let err =
            enforce_layered::<Word, _>(&json!({"word_th": "บ้าน"}), complete_word).unwrap_err();
        match err {
            GateError::Contract(violation) => assert_eq!(violation.contract, "complete_word"),
            GateError::Schema(_) => panic!("expected contract failure"),
        }
    }

    #[test]
    fn layered_passes_complete_record() {
        let valid = enforce_layered::<Word, _>(
            &json!({"word_th": "บ้าน", "g2p": "baan4"}),
            complete_word,
        )
        .unwrap();
        assert_eq!(valid.get().g2p.as_deref(), Some("baan4"));
    }

    #[test]
    fn revalidate_round_trips_a_record() {
        let word = Word::parse(&json!({"word_th": "บ้าน", "g2p": "baan4"})).unwrap();
        let valid = revalidate(&word).unwrap();
        assert_eq!(valid.get(), &word);
    }
}
