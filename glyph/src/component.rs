//! `ui:*` fenced blocks: YAML payloads, declared refs, and glyph-ids.

use serde_json::{Map, Value};

use crate::ast::SourceRange;
use crate::context::TranslationContext;
use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSource};
use crate::ir::block::GLYPH_ID_KEY;
use crate::ir::{BlockData, ComponentData, ContainerData, ReferenceTarget};

/// Fence language prefix marking a component block.
pub const COMPONENT_PREFIX: &str = "ui:";

const REFS_KEY: &str = "refs";

/// A reference declared in a component's `refs` array.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredRef {
    pub target: ReferenceTarget,
    pub relation: Option<String>,
    pub label: Option<String>,
}

/// Translate the body of a `ui:<name>` fence into block data.
///
/// Container types keep their nested Markdown unparsed for the container
/// compiler. Leaf types with a registered validator are validated here.
pub fn translate_component(
    kind: &str,
    body: &str,
    position: SourceRange,
    ctx: &mut TranslationContext<'_>,
) -> (BlockData, Vec<DeclaredRef>) {
    let props = parse_props(kind, body, position, ctx);
    check_glyph_id(kind, &props, position, ctx);
    let refs = declared_refs(kind, &props, position, ctx);

    if let Some(schema) = ctx.registry.container_schema(kind) {
        let data = ContainerData::from_props(props, &schema.items_field, &schema.content_field);
        return (BlockData::Container(data), refs);
    }

    let data = BlockData::Component(ComponentData { props });
    for violation in ctx.registry.validate(kind, &data) {
        ctx.report(
            Diagnostic::error(
                DiagnosticSource::Translator,
                DiagnosticCode::SchemaValidationError,
                format!("{} block: {}", kind, violation),
            )
            .at(position),
        );
    }
    (data, refs)
}

fn parse_props(
    kind: &str,
    body: &str,
    position: SourceRange,
    ctx: &mut TranslationContext<'_>,
) -> Map<String, Value> {
    if body.trim().is_empty() {
        return Map::new();
    }
    match serde_yaml::from_str::<Value>(body) {
        Ok(Value::Object(props)) => props,
        Ok(Value::Null) => Map::new(),
        Ok(_) => {
            ctx.report(
                Diagnostic::error(
                    DiagnosticSource::Translator,
                    DiagnosticCode::SchemaValidationError,
                    format!("{} block: expected a YAML mapping", kind),
                )
                .at(position),
            );
            Map::new()
        }
        Err(e) => {
            ctx.report(
                Diagnostic::error(
                    DiagnosticSource::Translator,
                    DiagnosticCode::YamlParseError,
                    format!("{} block: invalid YAML: {}", kind, e),
                )
                .at(position),
            );
            Map::new()
        }
    }
}

fn check_glyph_id(
    kind: &str,
    props: &Map<String, Value>,
    position: SourceRange,
    ctx: &mut TranslationContext<'_>,
) {
    let valid = match props.get(GLYPH_ID_KEY) {
        None => true,
        Some(Value::String(id)) => !id.trim().is_empty(),
        Some(_) => false,
    };
    if !valid {
        ctx.report(
            Diagnostic::error(
                DiagnosticSource::Translator,
                DiagnosticCode::SchemaValidationError,
                format!("{} block: {}: expected a non-empty string", kind, GLYPH_ID_KEY),
            )
            .at(position),
        );
    }
}

/// Lift the `refs` array. Each entry is a target string or a mapping with
/// `target` and optional `relation`/`label`. Bad entries are warned and skipped.
fn declared_refs(
    kind: &str,
    props: &Map<String, Value>,
    position: SourceRange,
    ctx: &mut TranslationContext<'_>,
) -> Vec<DeclaredRef> {
    let Some(raw) = props.get(REFS_KEY) else {
        return Vec::new();
    };
    let Some(entries) = raw.as_array() else {
        warn_invalid_ref(kind, "refs must be an array", position, ctx);
        return Vec::new();
    };

    let mut refs = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let parsed = match entry {
            Value::String(target) => ReferenceTarget::from_declared(target).map(|target| DeclaredRef {
                target,
                relation: None,
                label: None,
            }),
            Value::Object(fields) => fields
                .get("target")
                .and_then(Value::as_str)
                .and_then(ReferenceTarget::from_declared)
                .map(|target| DeclaredRef {
                    target,
                    relation: fields.get("relation").and_then(Value::as_str).map(str::to_string),
                    label: fields.get("label").and_then(Value::as_str).map(str::to_string),
                }),
            _ => None,
        };
        match parsed {
            Some(declared) => refs.push(declared),
            None => warn_invalid_ref(
                kind,
                &format!("refs[{}] has no usable target", i),
                position,
                ctx,
            ),
        }
    }
    refs
}

fn warn_invalid_ref(kind: &str, message: &str, position: SourceRange, ctx: &mut TranslationContext<'_>) {
    ctx.report(
        Diagnostic::warning(
            DiagnosticSource::Translator,
            DiagnosticCode::InvalidRef,
            format!("{} block: {}", kind, message),
        )
        .at(position),
    );
}
