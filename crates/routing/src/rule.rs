use std::fmt;

use {
    regex::Regex,
    serde::{Deserialize, Serialize},
    switchyard_workflow::{PipelineRef, WorkflowRegistry},
};

use crate::error::{Error, Result};

/// A rule definition as written in a rules file.
///
/// ```yaml
/// - type: prefix
///   prefix: /help
///   workflow: system/help
/// - type: keyword
///   keywords: [dice, roll]
///   workflow: game/dice
/// - type: regex
///   pattern: "^!(status|ping)\\b"
///   workflow: system/status
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuleSpec {
    Prefix { workflow: String, prefix: String },
    Keyword { workflow: String, keywords: Vec<String> },
    Regex { workflow: String, pattern: String },
}

impl RuleSpec {
    pub fn workflow(&self) -> &str {
        match self {
            Self::Prefix { workflow, .. }
            | Self::Keyword { workflow, .. }
            | Self::Regex { workflow, .. } => workflow,
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Prefix(String),
    /// Stored lowercased.
    Keyword(Vec<String>),
    Regex(Regex),
}

/// A compiled rule bound to a registered workflow.
#[derive(Debug, Clone)]
pub struct Rule {
    matcher: Matcher,
    target: PipelineRef,
}

impl Rule {
    /// Validate `spec` and resolve its workflow against `workflows`.
    pub fn compile(spec: RuleSpec, workflows: &WorkflowRegistry) -> Result<Self> {
        let target = workflows
            .resolve(spec.workflow())
            .cloned()
            .ok_or_else(|| Error::unknown_workflow(spec.workflow()))?;

        let matcher = match spec {
            RuleSpec::Prefix { prefix, .. } => {
                if prefix.is_empty() {
                    return Err(Error::Empty {
                        kind: "prefix",
                        field: "prefix",
                    });
                }
                Matcher::Prefix(prefix)
            },
            RuleSpec::Keyword { keywords, .. } => {
                if keywords.is_empty() || keywords.iter().any(|k| k.trim().is_empty()) {
                    return Err(Error::Empty {
                        kind: "keyword",
                        field: "keyword",
                    });
                }
                Matcher::Keyword(keywords.iter().map(|k| k.to_lowercase()).collect())
            },
            RuleSpec::Regex { pattern, .. } => {
                if pattern.is_empty() {
                    return Err(Error::Empty {
                        kind: "regex",
                        field: "pattern",
                    });
                }
                let compiled = Regex::new(&pattern)
                    .map_err(|source| Error::InvalidRegex { pattern, source })?;
                Matcher::Regex(compiled)
            },
        };

        Ok(Self { matcher, target })
    }

    pub fn matches(&self, text: &str) -> bool {
        match &self.matcher {
            Matcher::Prefix(prefix) => text.starts_with(prefix.as_str()),
            Matcher::Keyword(keywords) => {
                let text = text.to_lowercase();
                keywords.iter().any(|k| text.contains(k.as_str()))
            },
            Matcher::Regex(re) => re.is_match(text),
        }
    }

    pub fn target(&self) -> &PipelineRef {
        &self.target
    }

    pub fn kind(&self) -> &'static str {
        match self.matcher {
            Matcher::Prefix(_) => "prefix",
            Matcher::Keyword(_) => "keyword",
            Matcher::Regex(_) => "regex",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.matcher {
            Matcher::Prefix(p) => write!(f, "prefix {p:?}")?,
            Matcher::Keyword(k) => write!(f, "keyword [{}]", k.join(", "))?,
            Matcher::Regex(re) => write!(f, "regex /{}/", re.as_str())?,
        }
        write!(f, " → {}", self.target)
    }
}
