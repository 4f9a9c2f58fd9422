// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Prompt templates
//!
//! Templates use `{name}` placeholders filled by [`fill`]. Each stage can
//! swap its template, but the placeholders listed on each constant must stay.

use sagemap_core::{Belief, CandidateBelief};

/// Placeholders: `{text}`
pub const EXTRACTION_TEMPLATE: &str = r#"You analyse journal writing and pull out the personal beliefs it expresses.

Belief types:
- core: a fundamental value or principle that guides major decisions
- assumption: something taken for granted without stated evidence
- derived: a conclusion or opinion reached through experience or reasoning

For every belief give:
1. "text": a short, clear statement of the belief in your own words
2. "confidence": how strongly it is held, 1-10
   (1-3 tentative, 4-6 moderate, 7-8 strong, 9-10 certain)
3. "topics": one or more specific topic labels
4. "belief_type": core, assumption or derived

Look for implicit beliefs as well as explicit ones, keep facts apart from opinions
and make every belief distinct. Return at most 10 beliefs. If there are none,
return [].

Journal text:
"{text}"

Respond with ONLY a JSON array, for example:
[
  {"text": "Inner peace matters more than recognition", "confidence": 8, "topics": ["success", "happiness"], "belief_type": "core"}
]"#;

/// Placeholders: `{belief}`, `{confidence}`, `{topics}`, `{existing}`
pub const CONTRADICTION_TEMPLATE: &str = r#"You detect direct logical contradictions between beliefs.

New belief: "{belief}"
Confidence: {confidence}/10
Topics: {topics}

Existing beliefs:
{existing}

Two beliefs contradict when they make opposing claims about the same subject
that cannot both be true, for example "Money is the most important thing" and
"Money doesn't matter at all".

These are NOT contradictions:
- a change of mind over time ("I used to think X, now I think Y"); that is evolution
- beliefs about different aspects of the same topic
- a nuanced version of a general statement

Respond with ONLY a JSON object:
{"hasContradiction": true or false, "contradictingIds": ["<ID of each contradicted belief>"], "explanation": "<one sentence>"}
Use only IDs from the list above."#;

/// Placeholders: `{belief}`, `{confidence}`, `{topics}`, `{existing}`
pub const EVOLUTION_TEMPLATE: &str = r#"You decide whether a new belief is an evolution of an older one.

New belief: "{belief}"
Confidence: {confidence}/10
Topics: {topics}

Existing beliefs:
{existing}

A belief evolved from an older one when it refines or builds on it without
opposing it, for example "Exercise is good" becoming "Regular cardio improves
my mental health". Opposing claims are contradictions, not evolution. Unrelated
beliefs are neither.

Be conservative: if it is unclear, answer false. Name at most one older belief.

Respond with ONLY a JSON object:
{"hasEvolution": true or false, "evolvedFromId": "<ID of the older belief, only when true>", "explanation": "<one sentence>"}
Use only an ID from the list above."#;

/// Placeholders: `{beliefs}`
pub const REFLECTION_TEMPLATE: &str = r#"You write reflection questions for someone examining their own beliefs.

Beliefs:
{beliefs}

Write 3-5 thoughtful questions that help them look deeper: explore tensions
between beliefs, ask where a belief came from, or challenge an assumption.

Respond with ONLY a JSON array of strings, for example:
["What experiences shaped your view of success?"]"#;

/// Beliefs shown to the model when asking for reflection questions
pub const REFLECTION_BELIEF_LIMIT: usize = 10;

/// Substitute `{name}` placeholders in one pass.
///
/// Substituted values are never rescanned, so user text containing a
/// placeholder is inserted literally. Unknown placeholders are left as is.
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];

        let replaced = tail.find('}').and_then(|close| {
            let name = &tail[1..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });

        match replaced {
            Some((close, value)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

pub fn extraction_prompt(template: &str, text: &str) -> String {
    fill(template, &[("text", text)])
}

/// Prompt for a contradiction or evolution judgment over `pool`
pub fn relation_prompt(template: &str, candidate: &CandidateBelief, pool: &[&Belief]) -> String {
    let confidence = candidate.confidence.to_string();
    let topics = candidate.topics.join(", ");
    let existing = pool
        .iter()
        .enumerate()
        .map(|(i, belief)| {
            format!(
                "{}. \"{}\" (Confidence: {}/10, ID: {})",
                i + 1,
                belief.text,
                belief.confidence,
                belief.id
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    fill(
        template,
        &[
            ("belief", candidate.text.as_str()),
            ("confidence", confidence.as_str()),
            ("topics", topics.as_str()),
            ("existing", existing.as_str()),
        ],
    )
}

pub fn reflection_prompt(template: &str, beliefs: &[Belief]) -> String {
    let listed = beliefs
        .iter()
        .take(REFLECTION_BELIEF_LIMIT)
        .map(|belief| format!("- \"{}\" ({})", belief.text, belief.topics.join(", ")))
        .collect::<Vec<_>>()
        .join("\n");

    fill(template, &[("beliefs", listed.as_str())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sagemap_core::BeliefType;

    fn belief(id: &str, text: &str) -> Belief {
        Belief {
            id: id.to_string(),
            text: text.to_string(),
            confidence: 6,
            topics: vec!["money".to_string()],
            belief_type: BeliefType::Core,
            source: "j0".to_string(),
            evolved_from: None,
            created_at: Utc::now(),
            deprecated: false,
        }
    }

    #[test]
    fn test_fill_single_pass() {
        let out = fill("a {x} b {y} c", &[("x", "{y}"), ("y", "Y")]);
        assert_eq!(out, "a {y} b Y c");
    }

    #[test]
    fn test_fill_keeps_unknown_and_json_braces() {
        let out = fill(r#"{"k": {v}} {missing}"#, &[("v", "1")]);
        assert_eq!(out, r#"{"k": 1} {missing}"#);
    }

    #[test]
    fn test_extraction_prompt_embeds_text() {
        let prompt = extraction_prompt(EXTRACTION_TEMPLATE, "I think money buys happiness.");
        assert!(prompt.contains("\"I think money buys happiness.\""));
        assert!(prompt.contains("at most 10 beliefs"));
        assert!(!prompt.contains("{text}"));
    }

    #[test]
    fn test_relation_prompt_lists_pool_with_ids() {
        let candidate =
            CandidateBelief::new("Money buys happiness", 7, ["money", "happiness"], BeliefType::Assumption);
        let e1 = belief("e1", "Money doesn't matter");
        let e2 = belief("e2", "Savings bring security");
        let prompt = relation_prompt(CONTRADICTION_TEMPLATE, &candidate, &[&e1, &e2]);

        assert!(prompt.contains("New belief: \"Money buys happiness\""));
        assert!(prompt.contains("Confidence: 7/10"));
        assert!(prompt.contains("Topics: money, happiness"));
        assert!(prompt.contains("1. \"Money doesn't matter\" (Confidence: 6/10, ID: e1)"));
        assert!(prompt.contains("2. \"Savings bring security\" (Confidence: 6/10, ID: e2)"));
    }

    #[test]
    fn test_reflection_prompt_limits_beliefs() {
        let beliefs: Vec<Belief> = (0..15)
            .map(|i| belief(&format!("b{}", i), &format!("belief number {}", i)))
            .collect();
        let prompt = reflection_prompt(REFLECTION_TEMPLATE, &beliefs);

        assert!(prompt.contains("belief number 9\""));
        assert!(!prompt.contains("belief number 10\""));
    }
}
