//! Document building: one raw entry → front matter, body and destination path.
//!
//! Every field is resolved by its [`FieldKind`]. References are projected
//! through the schema's precomputed [`ReferenceSpec`]: the linked entry
//! contributes its plain fields plus `id` and `content_type`, and any link
//! found inside a projection collapses to `{id}`. Expansion therefore stops
//! after one level whatever the shape of the content model.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::cache::EntryCache;
use crate::config::CollectionConfig;
use crate::contract::{Link, LinkType, RawEntry};
use crate::inflect::{parameterize, pluralize};
use crate::schema::{ContentTypeSchema, FieldKind, ReferenceSpec, ResolvedSchema, TargetFields};
use crate::template::FilenameTemplate;

/// Root of all generated collections, relative to the site.
pub const COLLECTIONS_DIR: &str = "collections";

/// Field used as body when the collection does not name one.
pub const DEFAULT_CONTENT_FIELD: &str = "body";

/// Keys every document's front matter starts with.
const RESERVED_KEYS: &[&str] = &["id", "contentful_id", "content_type"];

/// A materialized entry, ready for the association pass and the writer.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: String,
    content_type: String,
    /// Ordered front matter; the association pass adds keys to it.
    pub front_matter: Map<String, Value>,
    body: Option<String>,
    destination_path: PathBuf,
}

impl Document {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Path relative to the site root, e.g. `collections/_articles/hello.md`.
    pub fn destination_path(&self) -> &Path {
        &self.destination_path
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.front_matter.get(key)
    }
}

/// Builds documents against a resolved schema and the run's entry cache.
pub struct DocumentBuilder<'a> {
    schema: &'a ResolvedSchema,
    cache: &'a EntryCache,
}

impl<'a> DocumentBuilder<'a> {
    pub fn new(schema: &'a ResolvedSchema, cache: &'a EntryCache) -> Self {
        Self { schema, cache }
    }

    pub fn build(&self, raw: &RawEntry, collection: &CollectionConfig) -> Document {
        let content_type = raw.content_type_id().to_string();
        let fallback = ContentTypeSchema::empty(content_type.as_str());
        let type_schema = self.schema.get(&content_type).unwrap_or(&fallback);

        let content_key = content_key(raw, collection);
        let body = content_key
            .and_then(|key| raw.field(key))
            .and_then(body_text);

        let mut front_matter = Map::new();
        front_matter.insert("id".to_string(), Value::String(raw.id().to_string()));
        front_matter.insert("contentful_id".to_string(), Value::String(raw.id().to_string()));
        front_matter.insert("content_type".to_string(), Value::String(content_type.clone()));

        for (name, value) in &raw.fields {
            if Some(name.as_str()) == content_key {
                continue;
            }
            if RESERVED_KEYS.contains(&name.as_str()) {
                debug!(id = raw.id(), field = %name, "Skipping field shadowing a reserved key");
                continue;
            }
            front_matter.insert(name.clone(), self.resolve_field(type_schema, name, value));
        }

        for (alias, source) in &collection.map {
            let value = raw
                .field(source)
                .filter(|_| Some(source.as_str()) != content_key)
                .map(|value| self.resolve_field(type_schema, source, value))
                .unwrap_or(Value::Null);
            front_matter.insert(alias.clone(), value);
        }

        Document {
            id: raw.id().to_string(),
            destination_path: destination_path(raw, collection),
            content_type,
            front_matter,
            body,
        }
    }

    /// Resolves one field value of an entry of `type_schema`.
    pub fn resolve_field(&self, type_schema: &ContentTypeSchema, field: &str, value: &Value) -> Value {
        let kind = type_schema
            .kind_of(field)
            .unwrap_or_else(|| FieldKind::infer(value));
        let spec = type_schema.reference(field).unwrap_or(&ReferenceSpec::Any);

        match (kind, value) {
            (FieldKind::Scalar, value) => value.clone(),
            (FieldKind::Asset | FieldKind::SingleLink, value) => match Link::from_value(value) {
                Some(link) => self.resolve_link(spec, &link).unwrap_or(Value::Null),
                None => value.clone(),
            },
            (FieldKind::AssetArray | FieldKind::LinkArray, Value::Array(items)) => Value::Array(
                items
                    .iter()
                    .filter_map(|item| match Link::from_value(item) {
                        Some(link) => self.resolve_link(spec, &link),
                        None => Some(item.clone()),
                    })
                    .collect(),
            ),
            (FieldKind::AssetArray | FieldKind::LinkArray, value) => value.clone(),
        }
    }

    /// `None` when the link cannot be resolved under `spec`.
    fn resolve_link(&self, spec: &ReferenceSpec, link: &Link) -> Option<Value> {
        if link.link_type == LinkType::Asset {
            return self.resolve_asset(&link.id);
        }
        let Some(entry) = self.cache.entry(&link.id) else {
            if spec.resolves_without_entry() {
                return Some(id_only(&link.id));
            }
            debug!(id = %link.id, "Unresolvable entry link: entry not fetched");
            return None;
        };
        match spec.branch_for(entry.content_type_id()) {
            Some(TargetFields::Inline(fields)) => Some(self.project(entry, fields)),
            Some(TargetFields::IdOnly) => Some(id_and_type(entry)),
            None => {
                debug!(
                    id = %link.id,
                    content_type = entry.content_type_id(),
                    "Unresolvable entry link: content type not allowed here"
                );
                None
            }
        }
    }

    fn resolve_asset(&self, id: &str) -> Option<Value> {
        let Some(asset) = self.cache.asset(id) else {
            debug!(id, "Unresolvable asset link: asset not fetched");
            return None;
        };
        let mut map = Map::new();
        map.insert(
            "url".to_string(),
            asset.url().map(|u| Value::String(u.to_string())).unwrap_or(Value::Null),
        );
        map.insert("id".to_string(), Value::String(asset.id().to_string()));
        Some(Value::Object(map))
    }

    /// Projects `fields` of a linked entry, then `id` and `content_type`.
    fn project(&self, entry: &RawEntry, fields: &[String]) -> Value {
        let mut map = Map::new();
        for field in fields {
            if field == "id" || field == "content_type" {
                continue;
            }
            let Some(value) = entry.field(field).and_then(|v| self.flatten_nested(v)) else {
                continue;
            };
            map.insert(field.clone(), value);
        }
        map.insert("id".to_string(), Value::String(entry.id().to_string()));
        map.insert(
            "content_type".to_string(),
            Value::String(entry.content_type_id().to_string()),
        );
        Value::Object(map)
    }

    /// Value inside a projection: assets resolve, entry links stop at `{id}`.
    fn flatten_nested(&self, value: &Value) -> Option<Value> {
        match value {
            Value::Null => None,
            Value::Array(items) => Some(Value::Array(
                items.iter().filter_map(|item| self.flatten_nested(item)).collect(),
            )),
            other => match Link::from_value(other) {
                Some(link) if link.link_type == LinkType::Asset => self.resolve_asset(&link.id),
                Some(link) => Some(id_only(&link.id)),
                None => Some(other.clone()),
            },
        }
    }
}

fn id_only(id: &str) -> Value {
    let mut map = Map::new();
    map.insert("id".to_string(), Value::String(id.to_string()));
    Value::Object(map)
}

fn id_and_type(entry: &RawEntry) -> Value {
    let mut map = Map::new();
    map.insert("id".to_string(), Value::String(entry.id().to_string()));
    map.insert(
        "content_type".to_string(),
        Value::String(entry.content_type_id().to_string()),
    );
    Value::Object(map)
}

/// The configured body field, else `body` when the entry has one.
fn content_key<'c>(raw: &RawEntry, collection: &'c CollectionConfig) -> Option<&'c str> {
    match collection.content.as_deref() {
        Some(key) => Some(key),
        None if raw.fields.contains_key(DEFAULT_CONTENT_FIELD) => Some(DEFAULT_CONTENT_FIELD),
        None => None,
    }
}

fn body_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// `collections/_<plural type>`.
pub fn collection_dir(content_type: &str) -> PathBuf {
    PathBuf::from(COLLECTIONS_DIR).join(format!("_{}", pluralize(content_type)))
}

/// Slug field, else the parameterized title, else `<type>-<id>`.
pub fn slug_for(raw: &RawEntry) -> String {
    let text = |name: &str| {
        raw.field(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    if let Some(slug) = text("slug") {
        return slug.to_string();
    }
    if let Some(title) = text("title").map(parameterize).filter(|s| !s.is_empty()) {
        return title;
    }
    format!("{}-{}", raw.content_type_id(), raw.id())
}

/// Raw fields with links flattened to their ids, for filename templates.
pub fn template_variables(raw: &RawEntry) -> Map<String, Value> {
    fn flatten(value: &Value) -> Value {
        match value {
            Value::Array(items) => Value::Array(items.iter().map(flatten).collect()),
            other => match Link::from_value(other) {
                Some(link) => Value::String(link.id),
                None => other.clone(),
            },
        }
    }

    let mut variables: Map<String, Value> = raw
        .fields
        .iter()
        .map(|(name, value)| (name.clone(), flatten(value)))
        .collect();
    variables
        .entry("id")
        .or_insert_with(|| Value::String(raw.id().to_string()));
    variables
        .entry("content_type")
        .or_insert_with(|| Value::String(raw.content_type_id().to_string()));
    variables
}

/// Relative output path; a configured filename template replaces the slug.
///
/// The name comes from CMS content, so separators only ever create
/// subdirectories of the collection: `.`, `..` and empty segments are dropped.
pub fn destination_path(raw: &RawEntry, collection: &CollectionConfig) -> PathBuf {
    let name = collection
        .filename
        .as_deref()
        .map(|template| FilenameTemplate::new(template).render(&template_variables(raw)))
        .map(|rendered| rendered.trim().to_string())
        .filter(|rendered| !rendered.is_empty())
        .unwrap_or_else(|| slug_for(raw));
    let relative = confined_name(&name).unwrap_or_else(|| {
        warn!(id = raw.id(), name = %name, "Output name has no usable segment; using the entry id");
        format!("{}-{}", raw.content_type_id(), raw.id()).replace(['/', '\\'], "-")
    });
    if relative != name {
        warn!(id = raw.id(), name = %name, path = %relative, "Output name rewritten to stay inside its collection");
    }
    collection_dir(raw.content_type_id()).join(format!("{relative}.md"))
}

/// Joins the name's segments with `/`, dropping anything that could climb out.
fn confined_name(name: &str) -> Option<String> {
    let segments: Vec<&str> = name
        .split(['/', '\\'])
        .map(str::trim)
        .filter(|segment| !matches!(*segment, "" | "." | ".."))
        .collect();
    (!segments.is_empty()).then(|| segments.join("/"))
}
