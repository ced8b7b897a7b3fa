//! The skip planner.
//!
//! Given a persisted word and its senses, compute the minimal ordered set of
//! workflow steps still required to reach a target tier. Re-running an
//! expensive normalization on already-normalized data is wasted cost;
//! conversely, any raw-marker sense counts as incompleteness no matter what
//! else passes, so normalization is sticky forward-only.

use serde::Serialize;

use crate::contracts::{self, Tier};
use crate::pipeline::{graph_order, StepName};
use crate::schema::{Sense, Word};

/// The planner's output: steps in workflow order, plus the tier the run will
/// actually target after clamping.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub steps: Vec<StepName>,
    pub tier: Tier,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

fn is_blank(field: Option<&str>) -> bool {
    field.map(|text| text.trim().is_empty()).unwrap_or(true)
}

/// Clamp the requested tier to what the persisted senses support: V3
/// enrichment is never attempted on a record that is not yet V2-complete,
/// and V2 enrichment never on one that is not yet normalized. Each run moves
/// at most one tier further; the next planner cycle picks up from there.
pub fn effective_tier(senses: &[Sense], target: Tier) -> Tier {
    if senses.is_empty() {
        return Tier::V1;
    }
    let normalized = senses
        .iter()
        .all(|sense| contracts::normalized_sense(sense).is_ok());
    let v2_complete = senses
        .iter()
        .all(|sense| contracts::v2_complete_sense(sense).is_ok());
    match target {
        Tier::V1 => Tier::V1,
        Tier::V2 => {
            if normalized {
                Tier::V2
            } else {
                Tier::V1
            }
        }
        Tier::V3 => {
            if v2_complete {
                Tier::V3
            } else if normalized {
                Tier::V2
            } else {
                Tier::V1
            }
        }
    }
}

/// Compute the minimal step set for one record (priority order,
/// short-circuiting).
pub fn plan(word: &Word, senses: &[Sense], target: Tier) -> Plan {
    let tier = effective_tier(senses, target);

    // Fully skip: word and senses complete for the tier, at least one sense,
    // nothing still raw-marked.
    if contracts::complete_token(word, senses, tier).is_ok()
        && !senses.is_empty()
        && senses.iter().all(|sense| !sense.has_raw_source())
    {
        return Plan {
            steps: Vec::new(),
            tier,
        };
    }

    let mut steps = Vec::new();

    if contracts::complete_word(word).is_err() {
        if is_blank(word.g2p.as_deref()) {
            steps.push(StepName::G2p);
        }
        if is_blank(word.phonetic_en.as_deref()) {
            steps.push(StepName::Phonetic);
        }
    }

    if senses.is_empty() {
        // Fresh raw senses will carry the raw marker, so they always need
        // the normalize pass right after.
        steps.push(StepName::DictLookup);
        steps.push(StepName::Normalize);
    } else if senses.iter().any(|sense| sense.has_raw_source())
        || senses
            .iter()
            .any(|sense| contracts::sense_satisfies_tier(sense, tier).is_err())
    {
        steps.push(StepName::Normalize);
    }

    Plan {
        steps: graph_order(&steps),
        tier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn word(g2p: Option<&str>, phonetic: Option<&str>) -> Word {
        Word::parse(&json!({
            "word_th": "บ้าน",
            "g2p": g2p,
            "phonetic_en": phonetic,
        }))
        .unwrap()
    }

    fn sense_with(source: &str, extra: serde_json::Value) -> Sense {
        let mut value = json!({
            "id": 1,
            "definition_th": "ที่อยู่อาศัย",
            "word_th_id": "บ้าน",
            "source": source,
        });
        if let Some(map) = extra.as_object() {
            for (key, val) in map {
                value[key] = val.clone();
            }
        }
        Sense::parse(&value).unwrap()
    }

    #[test]
    fn bare_word_plans_the_full_chain() {
        let plan = plan(&word(None, None), &[], Tier::V1);
        assert_eq!(
            plan.steps,
            vec![
                StepName::G2p,
                StepName::Phonetic,
                StepName::DictLookup,
                StepName::Normalize,
            ]
        );
    }

    #[test]
    fn complete_word_with_raw_sense_plans_normalize_only() {
        let senses = vec![sense_with("orst", json!({}))];
        let plan = plan(&word(Some("baan4"), Some("baan")), &senses, Tier::V1);
        assert_eq!(plan.steps, vec![StepName::Normalize]);
    }

    #[test]
    fn normalized_record_plans_nothing() {
        let senses = vec![sense_with("gpt-normalized", json!({}))];
        let plan = plan(&word(Some("baan4"), Some("baan")), &senses, Tier::V1);
        assert!(plan.is_empty());
    }

    #[test]
    fn raw_marker_forces_normalize_even_when_other_contracts_pass() {
        // Forward-only normalization: a raw-marked sense is always selected,
        // here even though a sibling sense is fully normalized.
        let senses = vec![
            sense_with("gpt-normalized", json!({})),
            sense_with("ORST", json!({"id": 2})),
        ];
        let plan = plan(&word(Some("baan4"), Some("baan")), &senses, Tier::V1);
        assert_eq!(plan.steps, vec![StepName::Normalize]);
    }

    #[test]
    fn complete_word_without_senses_still_needs_lookup() {
        let plan = plan(&word(Some("baan4"), Some("baan")), &[], Tier::V1);
        assert_eq!(plan.steps, vec![StepName::DictLookup, StepName::Normalize]);
    }

    #[test]
    fn word_with_only_g2p_is_complete_for_the_word_contract() {
        let senses = vec![sense_with("gpt-normalized", json!({}))];
        let plan = plan(&word(Some("baan4"), None), &senses, Tier::V1);
        assert!(plan.is_empty());
    }

    #[test]
    fn v2_target_on_normalized_v1_record_plans_enrichment() {
        let senses = vec![sense_with("gpt-normalized", json!({}))];
        let plan = plan(&word(Some("baan4"), Some("baan")), &senses, Tier::V2);
        assert_eq!(plan.steps, vec![StepName::Normalize]);
        assert_eq!(plan.tier, Tier::V2);
    }

    #[test]
    fn v3_target_clamps_to_v2_until_v2_is_complete() {
        let senses = vec![sense_with("gpt-normalized", json!({}))];
        let first = plan(&word(Some("baan4"), Some("baan")), &senses, Tier::V3);
        assert_eq!(first.tier, Tier::V2);

        let enriched = vec![sense_with(
            "gpt-normalized",
            json!({
                "pos_th": "นาม",
                "pos_eng": "noun",
                "definition_eng": "a dwelling",
            }),
        )];
        let second = plan(&word(Some("baan4"), Some("baan")), &enriched, Tier::V3);
        assert_eq!(second.tier, Tier::V3);
        assert_eq!(second.steps, vec![StepName::Normalize]);
    }

    #[test]
    fn v3_target_clamps_to_v1_on_raw_senses() {
        let senses = vec![sense_with("orst", json!({}))];
        let plan = plan(&word(Some("baan4"), Some("baan")), &senses, Tier::V3);
        assert_eq!(plan.tier, Tier::V1);
        assert_eq!(plan.steps, vec![StepName::Normalize]);
    }

    #[test]
    fn v3_complete_record_plans_nothing_for_v3_target() {
        let senses = vec![sense_with(
            "gpt-normalized",
            json!({
                "pos_th": "นาม",
                "pos_eng": "noun",
                "definition_eng": "a dwelling",
                "label_eng": "house",
            }),
        )];
        let plan = plan(&word(Some("baan4"), Some("baan")), &senses, Tier::V3);
        assert!(plan.is_empty());
        assert_eq!(plan.tier, Tier::V3);
    }
}
