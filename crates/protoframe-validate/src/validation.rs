use std::sync::Arc;
use std::time::Duration;

use protoframe_codec::MessageStructure;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How response text is matched in PATTERN mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    #[default]
    Contains,
    Regex,
}

/// The check a response must pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationRule {
    /// Any response passes.
    AlwaysPass,
    /// Response text contains or matches `pattern`.
    #[serde(rename_all = "camelCase")]
    Pattern {
        #[serde(default)]
        match_type: MatchType,
        pattern: String,
    },
    /// A sandbox script sees `{data, raw}` and returns `true`, a failure reason, or nothing.
    Script { script: String },
}

/// Validation settings attached to a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandValidation {
    #[serde(flatten)]
    pub rule: ValidationRule,
    /// Milliseconds to wait for a passing response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl CommandValidation {
    pub fn new(rule: ValidationRule) -> Self {
        Self { rule, timeout: None }
    }

    pub fn always_pass() -> Self {
        Self::new(ValidationRule::AlwaysPass)
    }

    pub fn contains(pattern: impl Into<String>) -> Self {
        Self::new(ValidationRule::Pattern {
            match_type: MatchType::Contains,
            pattern: pattern.into(),
        })
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::new(ValidationRule::Pattern {
            match_type: MatchType::Regex,
            pattern: pattern.into(),
        })
    }

    pub fn script(script: impl Into<String>) -> Self {
        Self::new(ValidationRule::Script { script: script.into() })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout.as_millis() as u64);
        self
    }

    /// Declared timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_millis)
    }
}

/// Copies one decoded structure field into a variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldExtraction {
    /// Element name in the parse result.
    pub element: String,
    pub variable_name: String,
    /// Expression over `value` (and the other numeric fields).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
}

/// Extraction rules applied when `condition` holds for a decoded response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePattern {
    /// Expression over the decoded numeric fields, e.g. `function == 3`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub extractions: Vec<FieldExtraction>,
}

/// Copies named capture groups of a regex over the response text into variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegexExtraction {
    pub pattern: String,
    /// Groups to copy. Empty means every named group, under its own name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<CaptureVariable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureVariable {
    pub group: String,
    pub variable_name: String,
}

impl RegexExtraction {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            variables: Vec::new(),
        }
    }

    pub fn with_variable(mut self, group: impl Into<String>, variable_name: impl Into<String>) -> Self {
        self.variables.push(CaptureVariable {
            group: group.into(),
            variable_name: variable_name.into(),
        });
        self
    }
}

/// Everything needed to register one pending validation.
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub validation: CommandValidation,
    /// Human-readable name used in logs and errors.
    pub label: String,
    /// Parameter values bound as `params` for the transform script.
    pub params: Map<String, Value>,
    /// Runs once after a pass with `{params, data, raw, setVar, log}`.
    pub transform_script: Option<String>,
    /// Structure used to decode the passing frame for field extraction.
    pub structure: Option<Arc<MessageStructure>>,
    pub response_patterns: Vec<ResponsePattern>,
    pub regex_extractions: Vec<RegexExtraction>,
}

impl ValidationRequest {
    pub fn new(validation: CommandValidation, label: impl Into<String>) -> Self {
        Self {
            validation,
            label: label.into(),
            params: Map::new(),
            transform_script: None,
            structure: None,
            response_patterns: Vec::new(),
            regex_extractions: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_transform_script(mut self, script: impl Into<String>) -> Self {
        self.transform_script = Some(script.into());
        self
    }

    pub fn with_structure(mut self, structure: Arc<MessageStructure>, patterns: Vec<ResponsePattern>) -> Self {
        self.structure = Some(structure);
        self.response_patterns = patterns;
        self
    }

    pub fn with_regex_extraction(mut self, extraction: RegexExtraction) -> Self {
        self.regex_extractions.push(extraction);
        self
    }
}
