//! Explicit search-trigger detection.
//!
//! Triggers are evaluated in table order, not text order: when a message
//! contains several trigger phrases, the one listed first wins and only its
//! first occurrence is removed to form the query.

use regex::Regex;

#[derive(Debug, thiserror::Error)]
#[error("invalid trigger pattern '{pattern}': {source}")]
pub struct TriggerError {
    pattern: String,
    #[source]
    source: regex::Error,
}

#[derive(Debug, Clone)]
pub enum TriggerMatcher {
    /// Case-insensitive literal phrase
    Literal { phrase: String, regex: Regex },
    /// Case-insensitive regular expression
    Pattern(Regex),
}

impl TriggerMatcher {
    pub fn literal(phrase: &str) -> Result<Self, TriggerError> {
        let regex = compile(&regex::escape(phrase))?;
        Ok(Self::Literal {
            phrase: phrase.to_string(),
            regex,
        })
    }

    pub fn pattern(pattern: &str) -> Result<Self, TriggerError> {
        Ok(Self::Pattern(compile(pattern)?))
    }

    fn regex(&self) -> &Regex {
        match self {
            Self::Literal { regex, .. } => regex,
            Self::Pattern(regex) => regex,
        }
    }

    pub fn describe(&self) -> &str {
        match self {
            Self::Literal { phrase, .. } => phrase,
            Self::Pattern(regex) => regex.as_str(),
        }
    }

    /// Byte span of the first occurrence in `input`
    pub fn find(&self, input: &str) -> Option<(usize, usize)> {
        self.regex()
            .find(input)
            .filter(|m| !m.is_empty())
            .map(|m| (m.start(), m.end()))
    }
}

fn compile(pattern: &str) -> Result<Regex, TriggerError> {
    Regex::new(&format!("(?i){pattern}")).map_err(|source| TriggerError {
        pattern: pattern.to_string(),
        source,
    })
}

#[derive(Debug, Clone)]
pub struct TriggerTable {
    matchers: Vec<TriggerMatcher>,
}

impl TriggerTable {
    pub fn new(matchers: Vec<TriggerMatcher>) -> Self {
        Self { matchers }
    }

    /// Build a table of literal phrases, preserving their order.
    pub fn from_phrases<S: AsRef<str>>(phrases: &[S]) -> Result<Self, TriggerError> {
        let matchers = phrases
            .iter()
            .map(|p| TriggerMatcher::literal(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(matchers))
    }

    pub fn matchers(&self) -> &[TriggerMatcher] {
        &self.matchers
    }

    pub fn is_search_trigger(&self, input: &str) -> bool {
        self.matchers.iter().any(|m| m.find(input).is_some())
    }

    /// Remove the first list-order trigger from `input` and trim the rest.
    /// Returns `None` when no trigger matches.
    pub fn extract_search_query(&self, input: &str) -> Option<String> {
        self.matchers.iter().find_map(|matcher| {
            matcher.find(input).map(|(start, end)| {
                let mut query = String::with_capacity(input.len() - (end - start));
                query.push_str(&input[..start]);
                query.push_str(&input[end..]);
                query.trim().to_string()
            })
        })
    }
}

impl Default for TriggerTable {
    fn default() -> Self {
        let matchers = crate::config::DEFAULT_SEARCH_TRIGGERS
            .iter()
            .filter_map(|phrase| TriggerMatcher::literal(phrase).ok())
            .collect();
        Self::new(matchers)
    }
}
