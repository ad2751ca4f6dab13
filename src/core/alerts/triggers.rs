// Filter predicates used by the classifier.
//
// Both filters are plain substring containment. A keyword embedded in a
// longer word still matches.

use super::model::ProducerKind;

/// Producer pattern list compiled from the filter config
pub struct SourceFilter {
    patterns: Vec<(ProducerKind, String)>,
}

impl SourceFilter {
    pub fn new<'a>(patterns: impl IntoIterator<Item = (ProducerKind, &'a str)>) -> Self {
        Self {
            patterns: patterns
                .into_iter()
                .filter(|(_, p)| !p.is_empty())
                .map(|(kind, p)| (kind, p.to_string()))
                .collect(),
        }
    }

    /// Returns the group of the first pattern contained in `source_id`.
    /// Matching is case-sensitive.
    pub fn matches(&self, source_id: &str) -> Option<ProducerKind> {
        self.patterns
            .iter()
            .find(|(_, pattern)| source_id.contains(pattern.as_str()))
            .map(|(kind, _)| *kind)
    }
}

/// Lower-cased multilingual keyword set
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl KeywordFilter {
    pub fn new<'a>(keywords: impl IntoIterator<Item = &'a String>) -> Self {
        let mut lowered: Vec<String> = keywords
            .into_iter()
            .filter(|k| !k.trim().is_empty())
            .map(|k| k.to_lowercase())
            .collect();
        lowered.sort();
        lowered.dedup();
        Self { keywords: lowered }
    }

    /// Joins title and body with one space, lower-cases, and looks for any keyword.
    pub fn matches(&self, title: &str, body: &str) -> Option<&str> {
        if title.is_empty() && body.is_empty() {
            return None;
        }
        let full_text = format!("{title} {body}").to_lowercase();
        self.keywords
            .iter()
            .find(|k| full_text.contains(k.as_str()))
            .map(String::as_str)
    }
}
