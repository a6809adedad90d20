use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::ir::{BlockData, ContainerData, Section, SectionContent};

/// One schema constraint a block payload violates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dotted path to the offending field, e.g. `tabs[1].label`.
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Violation {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Structural validator for one block type.
pub trait BlockValidator: Send + Sync {
    fn validate(&self, data: &BlockData) -> Vec<Violation>;
}

/// Where a container type keeps its nested Markdown.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ContainerSchema {
    /// Array field holding the sections, e.g. `tabs`.
    pub items_field: String,
    /// Per-section field holding Markdown, e.g. `content`.
    pub content_field: String,
}

impl ContainerSchema {
    pub fn new(items_field: &str, content_field: &str) -> Self {
        ContainerSchema {
            items_field: items_field.to_string(),
            content_field: content_field.to_string(),
        }
    }
}

/// Validators and container schemas keyed by block type.
#[derive(Default)]
pub struct SchemaRegistry {
    validators: HashMap<String, Box<dyn BlockValidator>>,
    containers: HashMap<String, ContainerSchema>,
}

impl SchemaRegistry {
    /// An empty registry: every component is opaque.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in component schemas.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register_container("ui:tabs", ContainerSchema::new("tabs", "content"));
        registry.register_validator("ui:tabs", TabsValidator);
        registry.register_container("ui:steps", ContainerSchema::new("steps", "content"));
        registry.register_validator("ui:steps", StepsValidator);
        registry.register_container("ui:columns", ContainerSchema::new("columns", "content"));
        registry.register_validator("ui:columns", ColumnsValidator);
        registry.register_validator("ui:callout", CalloutValidator);
        registry
    }

    pub fn register_validator(&mut self, kind: &str, validator: impl BlockValidator + 'static) {
        self.validators
            .insert(kind.to_string(), Box::new(validator));
    }

    /// Declare `kind` a container. Types without their own validator get the
    /// generic section checks.
    pub fn register_container(&mut self, kind: &str, schema: ContainerSchema) {
        self.validators
            .entry(kind.to_string())
            .or_insert_with(|| Box::new(SectionsValidator));
        self.containers.insert(kind.to_string(), schema);
    }

    pub fn container_schema(&self, kind: &str) -> Option<&ContainerSchema> {
        self.containers.get(kind)
    }

    pub fn has_validator(&self, kind: &str) -> bool {
        self.validators.contains_key(kind)
    }

    /// Validate `data` against the schema registered for `kind`.
    /// Types without a validator always pass.
    pub fn validate(&self, kind: &str, data: &BlockData) -> Vec<Violation> {
        self.validators
            .get(kind)
            .map(|v| v.validate(data))
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Built-in validators
// ---------------------------------------------------------------------------

/// Checks every container must pass: a non-empty items array whose entries
/// are mappings carrying string or compiled content.
pub struct SectionsValidator;

impl BlockValidator for SectionsValidator {
    fn validate(&self, data: &BlockData) -> Vec<Violation> {
        match data {
            BlockData::Container(container) => check_sections(container),
            _ => vec![Violation::new("", "expected container data")],
        }
    }
}

pub struct TabsValidator;

impl BlockValidator for TabsValidator {
    fn validate(&self, data: &BlockData) -> Vec<Violation> {
        let BlockData::Container(container) = data else {
            return SectionsValidator.validate(data);
        };
        let mut violations = check_sections(container);
        for_each_entry(container, |path, props| {
            require_label(props, "label", &path, &mut violations);
        });
        violations
    }
}

pub struct StepsValidator;

const STEP_STATUSES: &[&str] = &["pending", "active", "completed"];

impl BlockValidator for StepsValidator {
    fn validate(&self, data: &BlockData) -> Vec<Violation> {
        let BlockData::Container(container) = data else {
            return SectionsValidator.validate(data);
        };
        let mut violations = check_sections(container);
        for_each_entry(container, |path, props| {
            require_label(props, "title", &path, &mut violations);
            if let Some(status) = props.get("status") {
                let valid = status.as_str().is_some_and(|s| STEP_STATUSES.contains(&s));
                if !valid {
                    violations.push(Violation::new(
                        format!("{}.status", path),
                        format!("expected one of {}", STEP_STATUSES.join(", ")),
                    ));
                }
            }
        });
        violations
    }
}

pub struct ColumnsValidator;

impl BlockValidator for ColumnsValidator {
    fn validate(&self, data: &BlockData) -> Vec<Violation> {
        let BlockData::Container(container) = data else {
            return SectionsValidator.validate(data);
        };
        let mut violations = check_sections(container);
        if let Some(ratio) = container.props.get("ratio") {
            let valid = ratio.as_array().is_some_and(|parts| {
                parts.len() == container.sections().len()
                    && parts.iter().all(|p| p.as_f64().is_some_and(|n| n > 0.0))
            });
            if !valid {
                violations.push(Violation::new(
                    "ratio",
                    "expected one positive number per column",
                ));
            }
        }
        violations
    }
}

pub struct CalloutValidator;

const CALLOUT_TYPES: &[&str] = &["info", "warning", "error", "tip"];

impl BlockValidator for CalloutValidator {
    fn validate(&self, data: &BlockData) -> Vec<Violation> {
        let BlockData::Component(component) = data else {
            return vec![Violation::new("", "expected component data")];
        };
        let props = &component.props;
        let mut violations = Vec::new();

        match props.get("type").and_then(Value::as_str) {
            Some(t) if CALLOUT_TYPES.contains(&t) => {}
            _ => violations.push(Violation::new(
                "type",
                format!("expected one of {}", CALLOUT_TYPES.join(", ")),
            )),
        }
        if !props.get("content").is_some_and(Value::is_string) {
            violations.push(Violation::new("content", "expected a string"));
        }
        if props.get("title").is_some_and(|t| !t.is_string()) {
            violations.push(Violation::new("title", "expected a string"));
        }

        violations
    }
}

fn check_sections(container: &ContainerData) -> Vec<Violation> {
    let items = &container.items_field;
    let mut violations = Vec::new();

    let Some(sections) = &container.sections else {
        let message = if container.props.contains_key(items) {
            "expected an array"
        } else {
            "missing required field"
        };
        violations.push(Violation::new(items.clone(), message));
        return violations;
    };

    if sections.is_empty() {
        violations.push(Violation::new(items.clone(), "expected at least 1 entry"));
    }

    for (i, section) in sections.iter().enumerate() {
        let path = format!("{}[{}]", items, i);
        match section {
            Section::Malformed(_) => {
                violations.push(Violation::new(path, "expected a mapping"));
            }
            Section::Entry(entry) => match &entry.content {
                Some(SectionContent::Markdown(_)) | Some(SectionContent::Blocks(_)) => {}
                Some(SectionContent::Other(_)) => violations.push(Violation::new(
                    format!("{}.{}", path, container.content_field),
                    "expected a Markdown string",
                )),
                None => violations.push(Violation::new(
                    format!("{}.{}", path, container.content_field),
                    "missing required field",
                )),
            },
        }
    }

    violations
}

fn for_each_entry(container: &ContainerData, mut f: impl FnMut(String, &Map<String, Value>)) {
    for (i, section) in container.sections().iter().enumerate() {
        if let Section::Entry(entry) = section {
            f(format!("{}[{}]", container.items_field, i), &entry.props);
        }
    }
}

fn require_label(props: &Map<String, Value>, field: &str, path: &str, out: &mut Vec<Violation>) {
    let ok = props
        .get(field)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty());
    if !ok {
        out.push(Violation::new(
            format!("{}.{}", path, field),
            "expected a non-empty string",
        ));
    }
}
