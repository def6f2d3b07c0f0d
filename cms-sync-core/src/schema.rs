//! Schema resolution: content models → per-type field partitions and
//! reference projections.
//!
//! Resolution runs in two passes. The first partitions every model's fields
//! into plain fields and reference fields; the second resolves each
//! reference's target types against the complete first-pass map, so the
//! order models arrive in never matters. A reference only ever inlines its
//! target's *plain* fields, which bounds expansion to one level even for
//! circular models (article → author → articles → ...).

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::SiteConfig;
use crate::contract::{FieldDescriptor, ModelDescriptor};

/// Pseudo content type under which asset links resolve.
pub const ASSET_TYPE: &str = "asset";

/// Wildcard accepted in the exclude list.
pub const EXCLUDE_ALL: &str = "*";

/// Shape of a field's value, decided once per field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Scalar,
    Asset,
    /// An array holding only asset links; treated as a plain field.
    AssetArray,
    SingleLink,
    LinkArray,
}

impl FieldKind {
    pub fn of_descriptor(field: &FieldDescriptor) -> Self {
        match field.kind.as_str() {
            "Link" => match field.link_type.as_deref() {
                Some("Asset") => FieldKind::Asset,
                _ => FieldKind::SingleLink,
            },
            "Array" => match field.items.as_ref() {
                Some(items) if items.kind == "Link" => match items.link_type.as_deref() {
                    Some("Asset") => FieldKind::AssetArray,
                    _ => FieldKind::LinkArray,
                },
                _ => FieldKind::Scalar,
            },
            _ => FieldKind::Scalar,
        }
    }

    /// Classification from a value, for fields the schema does not know.
    pub fn infer(value: &Value) -> Self {
        use crate::contract::{Link, LinkType};

        match value {
            Value::Array(items) if !items.is_empty() => {
                let links: Vec<_> = items.iter().map(Link::from_value).collect();
                if links.iter().all(|l| matches!(l, Some(l) if l.link_type == LinkType::Asset)) {
                    FieldKind::AssetArray
                } else if links.iter().any(Option::is_some) {
                    FieldKind::LinkArray
                } else {
                    FieldKind::Scalar
                }
            }
            other => match Link::from_value(other) {
                Some(link) if link.link_type == LinkType::Asset => FieldKind::Asset,
                Some(_) => FieldKind::SingleLink,
                None => FieldKind::Scalar,
            },
        }
    }

    pub fn is_reference(self) -> bool {
        matches!(self, FieldKind::SingleLink | FieldKind::LinkArray)
    }
}

/// What to inline for one target type of a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetFields {
    /// The target's plain fields.
    Inline(Vec<String>),
    /// Target is excluded or unknown: `{id, content_type}` only.
    IdOnly,
}

/// How a reference field resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceSpec {
    /// No target constraint: links resolve to their id only.
    Any,
    /// Allowed target types and their projections, in declared order.
    Targets(IndexMap<String, TargetFields>),
}

impl ReferenceSpec {
    /// Projection for a linked entry of `content_type`.
    ///
    /// A single-target spec applies directly whatever the linked type; a
    /// polymorphic spec must match, otherwise the link is unresolvable.
    pub fn branch_for(&self, content_type: &str) -> Option<&TargetFields> {
        match self {
            ReferenceSpec::Any => Some(&TargetFields::IdOnly),
            ReferenceSpec::Targets(targets) => targets.get(content_type).or_else(|| {
                if targets.len() == 1 {
                    targets.values().next()
                } else {
                    None
                }
            }),
        }
    }

    /// True when a link can be rendered from its id alone, without the
    /// linked entry at hand.
    pub fn resolves_without_entry(&self) -> bool {
        match self {
            ReferenceSpec::Any => true,
            ReferenceSpec::Targets(targets) => {
                targets.values().all(|t| matches!(t, TargetFields::IdOnly))
            }
        }
    }
}

/// Resolved schema of one content type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentTypeSchema {
    pub id: String,
    /// Plain fields (scalars, assets, asset arrays), model order.
    pub fields: Vec<String>,
    pub references: IndexMap<String, ReferenceSpec>,
    pub kinds: IndexMap<String, FieldKind>,
}

impl ContentTypeSchema {
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn kind_of(&self, field: &str) -> Option<FieldKind> {
        self.kinds.get(field).copied()
    }

    pub fn reference(&self, field: &str) -> Option<&ReferenceSpec> {
        self.references.get(field)
    }

    pub fn declares(&self, field: &str) -> bool {
        self.kinds.contains_key(field)
    }
}

/// A recovered problem with one field's reference metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaWarning {
    pub content_type: String,
    pub field: String,
    pub message: String,
}

/// Output of [`resolve_schema`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedSchema {
    pub types: IndexMap<String, ContentTypeSchema>,
    pub warnings: Vec<SchemaWarning>,
}

impl ResolvedSchema {
    pub fn get(&self, type_id: &str) -> Option<&ContentTypeSchema> {
        self.types.get(type_id)
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.types.contains_key(type_id)
    }
}

/// Which content types to leave out of the schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludeList {
    names: Vec<String>,
    wildcard: bool,
    configured: Vec<String>,
}

impl ExcludeList {
    pub fn new(exclude: &[String], configured: &[String]) -> Self {
        Self {
            names: exclude
                .iter()
                .filter(|name| name.as_str() != EXCLUDE_ALL)
                .cloned()
                .collect(),
            wildcard: exclude.iter().any(|name| name == EXCLUDE_ALL),
            configured: configured.to_vec(),
        }
    }

    pub fn from_site(site: &SiteConfig) -> Self {
        Self::new(&site.exclude, &site.configured_names())
    }

    pub fn excludes(&self, type_id: &str) -> bool {
        use crate::inflect::same_collection;

        if self.names.iter().any(|name| same_collection(name, type_id)) {
            return true;
        }
        self.wildcard
            && !self
                .configured
                .iter()
                .any(|name| same_collection(name, type_id))
    }
}

/// First-pass view of one model.
struct Partition {
    schema: ContentTypeSchema,
    /// Reference field → declared targets, or the reason they could not be read.
    raw_references: Vec<(String, Result<Vec<String>, String>)>,
}

/// Builds the schema map for every non-excluded model, plus the `asset` pseudo-type.
pub fn resolve_schema(models: &[ModelDescriptor], exclude: &ExcludeList) -> ResolvedSchema {
    let mut partitions: IndexMap<String, Partition> = IndexMap::new();
    for model in models {
        if exclude.excludes(model.id()) {
            debug!(content_type = model.id(), "Content type excluded from schema");
            continue;
        }
        partitions.insert(model.id().to_string(), partition(model));
    }

    let plain_fields: IndexMap<String, Vec<String>> = partitions
        .iter()
        .map(|(id, p)| (id.clone(), p.schema.fields.clone()))
        .collect();

    let mut resolved = ResolvedSchema::default();
    for (id, Partition { mut schema, raw_references }) in partitions {
        for (field, targets) in raw_references {
            let spec = match targets {
                Ok(targets) if targets.is_empty() => ReferenceSpec::Any,
                Ok(targets) => ReferenceSpec::Targets(
                    targets
                        .into_iter()
                        .map(|target| {
                            let fields = match plain_fields.get(&target) {
                                Some(fields) => TargetFields::Inline(fields.clone()),
                                None => TargetFields::IdOnly,
                            };
                            (target, fields)
                        })
                        .collect(),
                ),
                Err(message) => {
                    warn!(
                        content_type = %id,
                        field = %field,
                        reason = %message,
                        "Malformed reference validation; resolving by id only"
                    );
                    resolved.warnings.push(SchemaWarning {
                        content_type: id.clone(),
                        field: field.clone(),
                        message,
                    });
                    ReferenceSpec::Any
                }
            };
            schema.references.insert(field, spec);
        }
        debug!(
            content_type = %id,
            fields = schema.fields.len(),
            references = schema.references.len(),
            "Resolved content type schema"
        );
        resolved.types.insert(id, schema);
    }

    resolved
        .types
        .entry(ASSET_TYPE.to_string())
        .or_insert_with(|| ContentTypeSchema::empty(ASSET_TYPE));
    resolved
}

fn partition(model: &ModelDescriptor) -> Partition {
    let mut schema = ContentTypeSchema::empty(model.id());
    let mut raw_references = Vec::new();

    for field in &model.fields {
        if field.disabled || field.omitted {
            continue;
        }
        let kind = FieldKind::of_descriptor(field);
        schema.kinds.insert(field.id.clone(), kind);
        if kind.is_reference() {
            let validations = match (&field.items, kind) {
                (Some(items), FieldKind::LinkArray) => &items.validations,
                _ => &field.validations,
            };
            raw_references.push((field.id.clone(), link_content_types(validations)));
        } else if !schema.fields.contains(&field.id) {
            schema.fields.push(field.id.clone());
        }
    }

    Partition {
        schema,
        raw_references,
    }
}

/// Collects `linkContentType` constraints across a field's validations.
fn link_content_types(validations: &[Value]) -> Result<Vec<String>, String> {
    let mut targets: Vec<String> = Vec::new();
    let mut push = |target: &str| {
        if !targets.iter().any(|t| t == target) {
            targets.push(target.to_string());
        }
    };

    for validation in validations {
        let Some(constraint) = validation.get("linkContentType") else {
            continue;
        };
        match constraint {
            Value::String(target) => push(target),
            Value::Array(items) => {
                for item in items {
                    match item.as_str() {
                        Some(target) => push(target),
                        None => return Err(format!("linkContentType entry is not a string: {item}")),
                    }
                }
            }
            other => return Err(format!("unexpected linkContentType shape: {other}")),
        }
    }
    Ok(targets)
}
