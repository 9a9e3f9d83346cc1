//! Static checks over a [`MessageStructure`] before it is used for build or parse.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::structure::{ElementConfig, ElementSize, MessageStructure};

/// A problem found in a structure definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureIssue {
    /// Offending element, or `None` for structure-wide issues.
    pub element: Option<String>,
    pub message: String,
}

impl StructureIssue {
    fn element(id: &str, message: impl Into<String>) -> Self {
        Self {
            element: Some(id.to_string()),
            message: message.into(),
        }
    }
}

impl fmt::Display for StructureIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.element {
            Some(id) => write!(f, "{id}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Lint a structure. An empty list means build and parse can resolve every element.
pub fn validate_structure(structure: &MessageStructure) -> Vec<StructureIssue> {
    let mut issues = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut variable_ids = Vec::new();

    if structure.elements.is_empty() {
        issues.push(StructureIssue {
            element: None,
            message: "structure has no elements".into(),
        });
    }

    for element in &structure.elements {
        let id = element.id.as_str();
        if !seen.insert(id) {
            issues.push(StructureIssue::element(id, "duplicate element id"));
        }

        if element.size == ElementSize::Fixed(0) {
            issues.push(StructureIssue::element(id, "fixed size must be greater than zero"));
        }

        if element.static_size().is_none() {
            variable_ids.push(id);
        }

        match &element.config {
            ElementConfig::Field { .. } | ElementConfig::Address { .. } => {
                if let (ElementSize::Fixed(n), Some(dt)) = (element.size, element.config.data_type()) {
                    if n != dt.width() {
                        issues.push(StructureIssue::element(
                            id,
                            format!("size {n} does not match {dt:?} width {}", dt.width()),
                        ));
                    }
                }
            }
            ElementConfig::Static { value } => {
                if value.is_empty() {
                    issues.push(StructureIssue::element(id, "static value is empty"));
                }
                if let ElementSize::Fixed(n) = element.size {
                    if n != value.len() {
                        issues.push(StructureIssue::element(
                            id,
                            format!("size {n} does not match static value length {}", value.len()),
                        ));
                    }
                }
            }
            ElementConfig::Length { include_elements, .. }
            | ElementConfig::Checksum { include_elements, .. } => {
                if matches!(element.config, ElementConfig::Length { .. })
                    && !matches!(element.size, ElementSize::Fixed(_))
                {
                    issues.push(StructureIssue::element(id, "LENGTH needs a fixed size"));
                }
                for target in include_elements {
                    if target == id {
                        issues.push(StructureIssue::element(id, "references itself"));
                    } else if !seen.contains(target.as_str()) {
                        let message = if structure.element(target).is_some() {
                            format!("references '{target}' which does not precede it")
                        } else {
                            format!("references unknown element '{target}'")
                        };
                        issues.push(StructureIssue::element(id, message));
                    }
                }
            }
            ElementConfig::Padding { .. } | ElementConfig::Reserved { .. } => {
                if !matches!(element.size, ElementSize::Fixed(_)) {
                    issues.push(StructureIssue::element(
                        id,
                        format!("{} needs a fixed size", element.config.kind()),
                    ));
                }
            }
            ElementConfig::Payload => {}
        }
    }

    if variable_ids.len() > 1 {
        issues.push(StructureIssue {
            element: None,
            message: format!("more than one variable element: {}", variable_ids.join(", ")),
        });
    }

    issues
}
