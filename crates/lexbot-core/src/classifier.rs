//! Keyword intent classifier.
//!
//! An ordered rule table evaluated top to bottom; the first matching rule wins. Matching
//! is deliberately crude: case-insensitive substring tests over the whole message, so a
//! keyword inside a longer word still counts ("showcase" matches "case").

use regex::Regex;

use crate::domain::CapabilityKey;

pub const DEFAULT_LEGAL_KEYWORDS: &[&str] = &["sovereignty", "case", "statute", "law", "precedent"];
pub const DEFAULT_MEMO_KEYWORDS: &[&str] = &["memo", "memorandum", "draft"];
pub const DEFAULT_SCHEDULER_KEYWORDS: &[&str] = &["remind", "schedule", "appointment", "calendar"];

/// `Convert <source> to <format>` at the start of the message. Group 1 is the source,
/// group 2 the format; the greedy source makes the last `to` the separator.
pub const CONVERSION_PATTERN: &str = r"(?is)^\s*convert\s+(\S.*)\s+to\s+(\S.*)$";

#[derive(Clone, Debug)]
pub enum Matcher {
    /// Any keyword appears as a substring of the lowercased text.
    AnyKeyword(Vec<String>),
    /// Regex over the raw text (callers opt into case-insensitivity with `(?i)`).
    Pattern(Regex),
}

impl Matcher {
    pub fn keywords<S: AsRef<str>>(words: &[S]) -> Self {
        Matcher::AnyKeyword(
            words
                .iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        )
    }

    fn matches(&self, text: &str, lower: &str) -> bool {
        match self {
            Matcher::AnyKeyword(words) => words.iter().any(|w| lower.contains(w.as_str())),
            Matcher::Pattern(re) => re.is_match(text),
        }
    }
}

#[derive(Clone, Debug)]
pub struct IntentRule {
    pub key: CapabilityKey,
    pub matcher: Matcher,
}

/// Keyword lists for the topical rules. Rule order is fixed; only the words vary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifierKeywords {
    pub legal: Vec<String>,
    pub memo: Vec<String>,
    pub scheduler: Vec<String>,
}

impl Default for ClassifierKeywords {
    fn default() -> Self {
        let own = |words: &[&str]| words.iter().map(|w| w.to_string()).collect();
        Self {
            legal: own(DEFAULT_LEGAL_KEYWORDS),
            memo: own(DEFAULT_MEMO_KEYWORDS),
            scheduler: own(DEFAULT_SCHEDULER_KEYWORDS),
        }
    }
}

#[derive(Clone, Debug)]
pub struct IntentClassifier {
    rules: Vec<IntentRule>,
    fallback: CapabilityKey,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(&ClassifierKeywords::default())
    }
}

impl IntentClassifier {
    /// Standard rule table: explicit conversion phrasing first, then topical keywords.
    pub fn new(keywords: &ClassifierKeywords) -> Self {
        let conversion = Regex::new(CONVERSION_PATTERN).expect("conversion pattern is valid");
        Self::from_rules(
            vec![
                IntentRule {
                    key: CapabilityKey::FILE_CONVERSION,
                    matcher: Matcher::Pattern(conversion),
                },
                IntentRule {
                    key: CapabilityKey::CASE_LAW_SCHOLAR,
                    matcher: Matcher::keywords(&keywords.legal),
                },
                IntentRule {
                    key: CapabilityKey::MEMO_DRAFTER,
                    matcher: Matcher::keywords(&keywords.memo),
                },
                IntentRule {
                    key: CapabilityKey::N8N_SCHEDULER,
                    matcher: Matcher::keywords(&keywords.scheduler),
                },
            ],
            CapabilityKey::HELP,
        )
    }

    pub fn from_rules(rules: Vec<IntentRule>, fallback: CapabilityKey) -> Self {
        Self { rules, fallback }
    }

    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    pub fn fallback(&self) -> CapabilityKey {
        self.fallback
    }

    pub fn classify(&self, text: &str) -> CapabilityKey {
        let lower = text.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(text, &lower))
            .map(|rule| rule.key)
            .unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> CapabilityKey {
        IntentClassifier::default().classify(text)
    }

    #[test]
    fn reference_phrases() {
        assert_eq!(
            classify("Tell me about tribal sovereignty precedent"),
            CapabilityKey::CASE_LAW_SCHOLAR
        );
        assert_eq!(
            classify("Please draft a memo on quarterly earnings"),
            CapabilityKey::MEMO_DRAFTER
        );
        assert_eq!(
            classify("Remind me tomorrow at 9am"),
            CapabilityKey::N8N_SCHEDULER
        );
        assert_eq!(classify("What's the weather like?"), CapabilityKey::HELP);
        assert_eq!(classify("Explain tribal law in detail"), CapabilityKey::CASE_LAW_SCHOLAR);
    }

    #[test]
    fn conversion_phrasing_beats_topical_keywords() {
        assert_eq!(
            classify("Convert report.pdf to docx"),
            CapabilityKey::FILE_CONVERSION
        );
        // "case" and "law" would otherwise pick the legal rule.
        assert_eq!(
            classify("convert case_law_notes.docx to pdf"),
            CapabilityKey::FILE_CONVERSION
        );
        assert_eq!(
            classify("CONVERT memo.md TO html"),
            CapabilityKey::FILE_CONVERSION
        );
    }

    #[test]
    fn conversion_requires_full_phrasing() {
        assert_eq!(classify("convert"), CapabilityKey::HELP);
        assert_eq!(classify("convert report.pdf"), CapabilityKey::HELP);
        assert_eq!(
            classify("can you convert this case to plain words"),
            CapabilityKey::CASE_LAW_SCHOLAR
        );
    }

    #[test]
    fn legal_keywords_win_for_any_casing_and_substring() {
        for text in [
            "SOVEREIGNTY",
            "a Statute question",
            "showcase of something",
            "lawn care tips",
            "Precedents please",
        ] {
            assert_eq!(classify(text), CapabilityKey::CASE_LAW_SCHOLAR, "{text}");
        }
    }

    #[test]
    fn legal_rule_precedes_memo_and_scheduler() {
        assert_eq!(
            classify("draft a memo about the statute"),
            CapabilityKey::CASE_LAW_SCHOLAR
        );
        assert_eq!(
            classify("schedule a memo review"),
            CapabilityKey::MEMO_DRAFTER
        );
    }

    #[test]
    fn empty_and_whitespace_fall_back() {
        assert_eq!(classify(""), CapabilityKey::HELP);
        assert_eq!(classify("   \n"), CapabilityKey::HELP);
    }

    #[test]
    fn custom_keywords_keep_rule_order() {
        let c = IntentClassifier::new(&ClassifierKeywords {
            legal: vec!["Tort".to_string()],
            memo: vec!["brief".to_string(), "  ".to_string()],
            scheduler: vec![],
        });
        assert_eq!(c.classify("a tort brief"), CapabilityKey::CASE_LAW_SCHOLAR);
        assert_eq!(c.classify("write a brief"), CapabilityKey::MEMO_DRAFTER);
        // Empty keyword lists never match; blank keywords are dropped.
        assert_eq!(c.classify("remind me"), CapabilityKey::HELP);
        assert_eq!(c.classify("sovereignty"), CapabilityKey::HELP);
    }

    #[test]
    fn from_rules_uses_custom_fallback() {
        let c = IntentClassifier::from_rules(
            vec![IntentRule {
                key: CapabilityKey::new("greeting"),
                matcher: Matcher::keywords(&["hello"]),
            }],
            CapabilityKey::new("generic"),
        );
        assert_eq!(c.classify("Hello there"), CapabilityKey::new("greeting"));
        assert_eq!(c.classify("bye"), CapabilityKey::new("generic"));
        assert_eq!(c.fallback(), CapabilityKey::new("generic"));
    }
}
