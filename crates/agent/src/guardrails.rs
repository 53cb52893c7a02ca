use std::collections::BTreeSet;

use crate::conversation::mentioned_amounts;
use crate::phrasing::PhrasedResponse;

pub const MIN_BULLETS: usize = 3;
pub const MAX_BULLETS: usize = 5;

/// Facts a phrased response must keep intact. Amounts are whole rupees so
/// `₹91L` and `₹91 lakh` compare equal. `known_names` lists every proper noun
/// the payload carries (projects, places, developers).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequiredFacts {
    pub amounts: BTreeSet<i64>,
    pub names: Vec<String>,
    pub allowed_amounts: BTreeSet<i64>,
    pub known_names: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Degrade { reason_code: &'static str, detail: String, fallback_path: &'static str },
}

impl GuardrailDecision {
    fn degrade(reason_code: &'static str, detail: impl Into<String>) -> Self {
        Self::Degrade { reason_code, detail: detail.into(), fallback_path: "templated_response" }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub min_bullets: usize,
    pub max_bullets: usize,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { min_bullets: MIN_BULLETS, max_bullets: MAX_BULLETS }
    }
}

impl GuardrailPolicy {
    pub fn evaluate(&self, phrased: &PhrasedResponse, facts: &RequiredFacts) -> GuardrailDecision {
        let count = phrased.answer_bullets.len();
        if count < self.min_bullets || count > self.max_bullets {
            return GuardrailDecision::degrade(
                "bullet_count",
                format!("{count} bullets, expected {}..={}", self.min_bullets, self.max_bullets),
            );
        }
        if phrased.answer_bullets.iter().any(|bullet| !is_single_line(bullet)) {
            return GuardrailDecision::degrade("bullet_shape", "blank or multi-line bullet");
        }
        if !is_single_line(&phrased.pitch_help) {
            return GuardrailDecision::degrade("pitch_shape", "pitch_help must be one line");
        }
        if !is_single_line(&phrased.next_suggestion) {
            return GuardrailDecision::degrade("next_shape", "next_suggestion must be one line");
        }

        let bullets = phrased.answer_bullets.join("\n");
        let stated: BTreeSet<i64> = mentioned_amounts(&bullets).into_iter().collect();
        if let Some(missing) = facts.amounts.iter().find(|amount| !stated.contains(*amount)) {
            return GuardrailDecision::degrade("missing_figure", format!("bullets omit {missing}"));
        }
        let lowered = bullets.to_lowercase();
        if let Some(missing) = facts.names.iter().find(|name| !lowered.contains(&name.to_lowercase())) {
            return GuardrailDecision::degrade("missing_name", format!("bullets omit {missing}"));
        }

        let full_text = format!("{bullets}\n{}\n{}", phrased.pitch_help, phrased.next_suggestion);
        if let Some(unknown) = unknown_proper_noun(&full_text, &facts.known_names, &facts.names) {
            return GuardrailDecision::degrade("unknown_name", format!("{unknown} is not in the payload"));
        }
        if let Some(unknown) = mentioned_amounts(&full_text)
            .into_iter()
            .find(|amount| !facts.allowed_amounts.contains(amount))
        {
            return GuardrailDecision::degrade(
                "unknown_figure",
                format!("{unknown} is not in the payload"),
            );
        }

        GuardrailDecision::Allow
    }
}

/// Two or more adjacent capitalised words that no known name covers read as an
/// invented project. A lone capitalised word is allowed (sentence starts).
fn unknown_proper_noun(text: &str, known: &[String], required: &[String]) -> Option<String> {
    let known: Vec<Vec<String>> = known
        .iter()
        .chain(required)
        .map(|name| name.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>())
        .filter(|words| !words.is_empty())
        .collect();

    for run in capitalised_runs(text) {
        let lowered: Vec<String> = run.iter().map(|word| word.to_lowercase()).collect();
        let mut unknown: Vec<&str> = Vec::new();
        let mut index = 0;
        while index < lowered.len() {
            let covered = known
                .iter()
                .filter(|name| lowered[index..].starts_with(name))
                .map(Vec::len)
                .max();
            match covered {
                Some(len) => {
                    unknown.clear();
                    index += len;
                }
                None => {
                    unknown.push(run[index]);
                    if unknown.len() >= 2 {
                        return Some(unknown.join(" "));
                    }
                    index += 1;
                }
            }
        }
    }
    None
}

/// Splits text into runs of adjacent capitalised words. Punctuation, numbers,
/// lower-case words and the pronoun `I` end a run.
fn capitalised_runs(text: &str) -> Vec<Vec<&str>> {
    let mut runs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for raw in text.split_whitespace() {
        let word = raw.trim_matches(|ch: char| !ch.is_alphanumeric());
        let opens_clause = raw.starts_with(|ch: char| !ch.is_alphanumeric());
        let closes_clause = raw.ends_with(|ch: char| !ch.is_alphanumeric());
        let capitalised = word != "I"
            && word.starts_with(|ch: char| ch.is_uppercase())
            && word.chars().all(char::is_alphabetic);

        if opens_clause || !capitalised {
            runs.push(std::mem::take(&mut current));
        }
        if capitalised {
            current.push(word);
        }
        if closes_clause {
            runs.push(std::mem::take(&mut current));
        }
    }
    runs.push(current);
    runs.retain(|run| run.len() >= 2);
    runs
}

fn is_single_line(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && !trimmed.contains('\n')
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{GuardrailDecision, GuardrailPolicy, RequiredFacts};
    use crate::phrasing::PhrasedResponse;

    fn facts() -> RequiredFacts {
        RequiredFacts {
            amounts: BTreeSet::from([7_000_000, 9_100_000]),
            names: vec!["Cedar Court".to_string()],
            allowed_amounts: BTreeSet::from([7_000_000, 9_000_000, 9_100_000, 2_000_000]),
            known_names: vec![
                "Cedar Court".to_string(),
                "Hebbal".to_string(),
                "North Bangalore".to_string(),
                "Prestige Group".to_string(),
            ],
        }
    }

    fn phrased(bullets: &[&str]) -> PhrasedResponse {
        PhrasedResponse {
            answer_bullets: bullets.iter().map(|bullet| bullet.to_string()).collect(),
            pitch_help: "Cedar Court is a fresh launch in Hebbal.".to_string(),
            next_suggestion: "Shall I book a site visit?".to_string(),
        }
    }

    fn reason(decision: GuardrailDecision) -> &'static str {
        match decision {
            GuardrailDecision::Allow => "allow",
            GuardrailDecision::Degrade { reason_code, .. } => reason_code,
        }
    }

    #[test]
    fn faithful_rewording_is_allowed() {
        let decision = GuardrailPolicy::default().evaluate(
            &phrased(&[
                "Nothing came up under ₹70L.",
                "Stretching to ₹91 lakh finds Cedar Court at ₹90L.",
                "That is the only match in North Bangalore.",
            ]),
            &facts(),
        );
        assert_eq!(decision, GuardrailDecision::Allow);
    }

    #[test]
    fn bullet_count_outside_bounds_degrades() {
        let policy = GuardrailPolicy::default();
        assert_eq!(reason(policy.evaluate(&phrased(&["₹70L", "₹91L Cedar Court"]), &facts())), "bullet_count");
        assert_eq!(reason(policy.evaluate(&phrased(&["x"; 6]), &facts())), "bullet_count");
    }

    #[test]
    fn dropped_relaxation_figure_degrades() {
        let decision = GuardrailPolicy::default().evaluate(
            &phrased(&["Nothing under ₹70L.", "Cedar Court is close.", "It is in Hebbal."]),
            &facts(),
        );
        assert_eq!(reason(decision), "missing_figure");
    }

    #[test]
    fn invented_price_degrades() {
        let decision = GuardrailPolicy::default().evaluate(
            &phrased(&[
                "Nothing under ₹70L.",
                "Cedar Court fits at ₹91L.",
                "A 3BHK there costs ₹1.1Cr.",
            ]),
            &facts(),
        );
        assert_eq!(reason(decision), "unknown_figure");
    }

    #[test]
    fn multi_line_pitch_degrades() {
        let mut response = phrased(&["Nothing under ₹70L.", "Cedar Court at ₹91L.", "Hebbal."]);
        response.pitch_help = "line one\nline two".to_string();
        assert_eq!(reason(GuardrailPolicy::default().evaluate(&response, &facts())), "pitch_shape");
    }

    #[test]
    fn invented_project_name_degrades() {
        let decision = GuardrailPolicy::default().evaluate(
            &phrased(&[
                "Nothing under ₹70L.",
                "Cedar Court fits at ₹91L.",
                "Sunrise Meadows nearby is also worth a look.",
            ]),
            &facts(),
        );
        assert_eq!(reason(decision), "unknown_name");
    }

    #[test]
    fn known_places_and_sentence_starts_are_not_names() {
        let mut response = phrased(&[
            "Nothing under ₹70L in North Bangalore.",
            "Stretching to ₹91L brings up Cedar Court, Hebbal.",
            "Shall I hold it? Prestige Group builds it.",
        ]);
        response.next_suggestion = "Would Cedar Court work for you?".to_string();
        assert_eq!(GuardrailPolicy::default().evaluate(&response, &facts()), GuardrailDecision::Allow);
    }
}
