use crate::tracker::error::TrackerError;

#[derive(Debug, Clone, PartialEq)]
enum PatternKind {
    Exact,
    // "/confirmation/*": one or more segments after the prefix
    Subtree(String),
}

#[derive(Debug, Clone)]
struct Pattern {
    text: String,
    kind: PatternKind,
}

/// Conversion path patterns: an exact path, or a path ending in `/*` that
/// matches anything nested below it. Order matters; the first match wins.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn parse(patterns: &[String]) -> Result<Self, TrackerError> {
        let mut parsed = Vec::with_capacity(patterns.len());

        for text in patterns {
            if !text.starts_with('/') {
                return Err(TrackerError::ConfigurationError(format!(
                    "conversion pattern '{}' must start with '/'",
                    text
                )));
            }

            let kind = match text.strip_suffix("/*") {
                Some(prefix) => {
                    if prefix.contains('*') {
                        return Err(TrackerError::ConfigurationError(format!(
                            "conversion pattern '{}' may only use '*' as a trailing segment",
                            text
                        )));
                    }
                    PatternKind::Subtree(format!("{}/", prefix))
                }
                None => {
                    if text.contains('*') {
                        return Err(TrackerError::ConfigurationError(format!(
                            "conversion pattern '{}' may only use '*' as a trailing segment",
                            text
                        )));
                    }
                    PatternKind::Exact
                }
            };

            parsed.push(Pattern {
                text: text.clone(),
                kind,
            });
        }

        Ok(Self { patterns: parsed })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// First pattern matching the path, if any. Trailing slashes on the
    /// path are ignored so `/thank-you/` converts like `/thank-you`.
    pub fn first_match(&self, path: &str) -> Option<&str> {
        let trimmed = if path.len() > 1 {
            path.trim_end_matches('/')
        } else {
            path
        };

        self.patterns
            .iter()
            .find(|pattern| match &pattern.kind {
                PatternKind::Exact => trimmed == pattern.text,
                PatternKind::Subtree(prefix) => {
                    trimmed.starts_with(prefix.as_str()) && trimmed.len() > prefix.len()
                }
            })
            .map(|pattern| pattern.text.as_str())
    }
}
