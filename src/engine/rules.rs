//! Pre-LLM utterance rules — one enumerable table for every string-matching
//! policy the engines rely on.
//!
//! Classification is substring containment over the trimmed, lower-cased
//! utterance, so "yes that works for me" confirms and "option 2 please"
//! confirms with a choice. Keeping the table here means the state machines
//! never hard-code phrase lists.

use regex::Regex;

/// What an utterance means to the engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceClass {
    /// The user accepted the most recent proposal. `choice` is set when the
    /// text names a numbered option ("option 2").
    Confirmation { choice: Option<usize> },
    /// Frustrated or off-track wording — the workflow redirects to the
    /// current step's focus prompt.
    OffTopic,
    /// Too vague to answer ("idk", "not sure") — the chat path asks for
    /// clarification without calling the model.
    Vague,
    Neutral,
}

/// The enumerated phrase table plus the option-number extractor.
pub struct RuleSet {
    confirmations: Vec<&'static str>,
    off_topic: Vec<&'static str>,
    vague: Vec<&'static str>,
    option_number: Regex,
    option_line: Regex,
}

impl RuleSet {
    /// The coaching defaults: confirmation phrases the workflow commits on,
    /// the off-track wording list, and the vague-reply list.
    pub fn coaching_defaults() -> Self {
        Self {
            confirmations: vec![
                "yes",
                "that works",
                "i like",
                "option 1",
                "option 2",
                "option 3",
                "approved",
            ],
            off_topic: vec![
                "rude",
                "annoying",
                "not helpful",
                "off-track",
                "what are you talking about",
            ],
            vague: vec!["idk", "whatever", "you tell me", "not sure"],
            option_number: Regex::new(r"option\s*(\d+)").unwrap(),
            option_line: Regex::new(r"(?m)^\s*Option\s*\d+\s*[:.\-]\s*(.+?)\s*$").unwrap(),
        }
    }

    /// Classify an utterance. Confirmation wins over the other classes.
    pub fn classify(&self, text: &str) -> UtteranceClass {
        let lowered = text.trim().to_lowercase();

        if self.confirmations.iter().any(|p| lowered.contains(p)) {
            let choice = self
                .option_number
                .captures(&lowered)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<usize>().ok());
            return UtteranceClass::Confirmation { choice };
        }
        if self.off_topic.iter().any(|p| lowered.contains(p)) {
            return UtteranceClass::OffTopic;
        }
        if self.vague.iter().any(|p| lowered.contains(p)) {
            return UtteranceClass::Vague;
        }
        UtteranceClass::Neutral
    }

    /// Whether the utterance contains any confirmation phrase.
    pub fn is_confirmation(&self, text: &str) -> bool {
        matches!(self.classify(text), UtteranceClass::Confirmation { .. })
    }

    /// Extract the bare phrasings from `Option N: ...` lines in a proposal
    /// message, in order. Empty when the text carries no option lines.
    pub fn option_lines(&self, text: &str) -> Vec<String> {
        self.option_line
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::coaching_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_phrases_match_as_substrings() {
        let rules = RuleSet::coaching_defaults();
        assert!(rules.is_confirmation("yes that works for me"));
        assert!(rules.is_confirmation("I like the second one"));
        assert!(rules.is_confirmation("Approved!"));
        assert!(rules.is_confirmation("option 2 please"));
        assert!(!rules.is_confirmation("no, not quite"));
        assert!(!rules.is_confirmation("let me think about it"));
    }

    #[test]
    fn confirmation_extracts_option_choice() {
        let rules = RuleSet::coaching_defaults();
        assert_eq!(
            rules.classify("option 2 please"),
            UtteranceClass::Confirmation { choice: Some(2) }
        );
        assert_eq!(
            rules.classify("Option 1"),
            UtteranceClass::Confirmation { choice: Some(1) }
        );
        assert_eq!(
            rules.classify("yes, that works"),
            UtteranceClass::Confirmation { choice: None }
        );
    }

    #[test]
    fn off_topic_detection() {
        let rules = RuleSet::coaching_defaults();
        assert_eq!(
            rules.classify("this is getting annoying"),
            UtteranceClass::OffTopic
        );
        assert_eq!(
            rules.classify("What are you talking about?"),
            UtteranceClass::OffTopic
        );
    }

    #[test]
    fn vague_detection() {
        let rules = RuleSet::coaching_defaults();
        assert_eq!(rules.classify("idk"), UtteranceClass::Vague);
        assert_eq!(rules.classify("I'm not sure honestly"), UtteranceClass::Vague);
    }

    #[test]
    fn neutral_by_default() {
        let rules = RuleSet::coaching_defaults();
        assert_eq!(
            rules.classify("unanswered calls"),
            UtteranceClass::Neutral
        );
    }

    #[test]
    fn confirmation_wins_over_other_classes() {
        let rules = RuleSet::coaching_defaults();
        // "not sure" is vague, but the leading "yes" confirms.
        assert!(rules.is_confirmation("yes, though I'm not sure about the rest"));
    }

    #[test]
    fn option_lines_extracts_bare_phrasings() {
        let rules = RuleSet::coaching_defaults();
        let text = "Here are a few ways to phrase that:\n\
                    Option 1: Unanswered calls.\n\
                    Option 2: Our team needs to address unanswered calls.\n\
                    Option 3: The goal of this step is to tackle unanswered calls.\n\
                    Which option works best?";
        let lines = rules.option_lines(text);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "Our team needs to address unanswered calls.");
    }

    #[test]
    fn option_lines_empty_without_options() {
        let rules = RuleSet::coaching_defaults();
        assert!(rules.option_lines("just plain text").is_empty());
    }
}
