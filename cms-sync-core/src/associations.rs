//! Association pass: has-many ordering and belongs-to reverse lookup.
//!
//! Runs once, after every configured type has been built. Related documents
//! are injected as snapshots of their front matter taken before the pass
//! starts, so an injected object never carries another document's
//! `associations` block.
//!
//! # Cost
//! belongs-to is a reverse scan: for each child, every candidate parent's
//! many-side field is searched for the child's id. That is O(N×M) per
//! association (N children, M parents), fine for CMS-sized corpora in the
//! low thousands.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::{AssociationDefinition, BelongsTo};
use crate::document::Document;
use crate::inflect::same_collection;

/// Front matter key under which has-many lists are injected.
pub const ASSOCIATIONS_KEY: &str = "associations";

/// Anything carrying an entry id.
pub trait Identified {
    fn identity(&self) -> &str;
}

impl Identified for Document {
    fn identity(&self) -> &str {
        self.id()
    }
}

/// Front matter of one document as it was before the pass.
#[derive(Debug, Clone, PartialEq)]
struct Snapshot {
    id: String,
    front_matter: Map<String, Value>,
}

impl Identified for Snapshot {
    fn identity(&self) -> &str {
        &self.id
    }
}

/// Orders `list` by the authored `order`.
///
/// Ids follow `order`; duplicate and missing ids are dropped; items whose id
/// is not listed are appended in their original order.
pub fn apply_has_many_ordering<T: Identified>(list: Vec<T>, order: &[String]) -> Vec<T> {
    let mut remaining: Vec<Option<T>> = list.into_iter().map(Some).collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut ordered = Vec::with_capacity(remaining.len());

    for id in order {
        if seen.contains(id) {
            continue;
        }
        let slot = remaining
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|item| item.identity() == id));
        if let Some(item) = slot.and_then(Option::take) {
            seen.insert(id.clone());
            ordered.push(item);
        }
    }
    for item in remaining.into_iter().flatten() {
        if seen.insert(item.identity().to_string()) {
            ordered.push(item);
        }
    }
    ordered
}

/// Ids listed by a relationship field: plain strings or objects with an `id`.
pub fn listed_ids(value: Option<&Value>) -> Vec<String> {
    fn id_of(value: &Value) -> Option<String> {
        match value {
            Value::String(id) => Some(id.clone()),
            Value::Object(map) => map.get("id").and_then(Value::as_str).map(str::to_string),
            _ => None,
        }
    }

    match value {
        Some(Value::Array(items)) => items.iter().filter_map(id_of).collect(),
        Some(other) => id_of(other).into_iter().collect(),
        None => Vec::new(),
    }
}

/// Configured relationships plus the collection-key aliases used to name types.
pub struct AssociationPass<'a> {
    definitions: &'a IndexMap<String, AssociationDefinition>,
    /// Collection key → content type id.
    aliases: IndexMap<String, String>,
}

impl<'a> AssociationPass<'a> {
    /// `definitions` is keyed by content type id.
    pub fn new(definitions: &'a IndexMap<String, AssociationDefinition>) -> Self {
        Self {
            definitions,
            aliases: IndexMap::new(),
        }
    }

    pub fn with_alias(mut self, collection_key: impl Into<String>, type_id: impl Into<String>) -> Self {
        self.aliases.insert(collection_key.into(), type_id.into());
        self
    }

    /// Mutates `documents` (keyed by content type id) in place.
    pub fn apply(&self, documents: &mut IndexMap<String, Vec<Document>>) {
        if self.definitions.values().all(AssociationDefinition::is_empty) {
            return;
        }
        let snapshots: IndexMap<String, Vec<Snapshot>> = documents
            .iter()
            .map(|(type_id, docs)| {
                let snaps = docs
                    .iter()
                    .map(|doc| Snapshot {
                        id: doc.id().to_string(),
                        front_matter: doc.front_matter.clone(),
                    })
                    .collect();
                (type_id.clone(), snaps)
            })
            .collect();

        let mut has_many_links = 0usize;
        let mut belongs_to_links = 0usize;

        for (type_id, docs) in documents.iter_mut() {
            let Some(definition) = self.definitions.get(type_id) else {
                continue;
            };
            for doc in docs.iter_mut() {
                for (field, targets) in &definition.has_many {
                    has_many_links += self.inject_has_many(doc, field, targets, &snapshots);
                }
                for (field, belongs_to) in &definition.belongs_to {
                    if self.inject_belongs_to(doc, type_id, field, belongs_to, &snapshots) {
                        belongs_to_links += 1;
                    }
                }
            }
        }

        info!(has_many_links, belongs_to_links, "Applied associations");
    }

    fn inject_has_many(
        &self,
        doc: &mut Document,
        field: &str,
        targets: &[String],
        snapshots: &IndexMap<String, Vec<Snapshot>>,
    ) -> usize {
        let authored = listed_ids(doc.get(field));
        let wanted: HashSet<&str> = authored.iter().map(String::as_str).collect();

        let related: Vec<Snapshot> = self
            .resolve_types(targets, snapshots)
            .into_iter()
            .flat_map(|type_id| snapshots[type_id.as_str()].iter())
            .filter(|snap| wanted.contains(snap.id.as_str()))
            .cloned()
            .collect();
        let related = apply_has_many_ordering(related, &authored);
        let count = related.len();

        let value = Value::Array(related.into_iter().map(|s| Value::Object(s.front_matter)).collect());
        let associations = doc
            .front_matter
            .entry(ASSOCIATIONS_KEY)
            .or_insert_with(|| Value::Object(Map::new()));
        if !associations.is_object() {
            *associations = Value::Object(Map::new());
        }
        if let Value::Object(map) = associations {
            map.insert(field.to_string(), value);
        }
        debug!(id = doc.id(), field, related = count, "Injected has-many association");
        count
    }

    fn inject_belongs_to(
        &self,
        doc: &mut Document,
        type_id: &str,
        field: &str,
        belongs_to: &BelongsTo,
        snapshots: &IndexMap<String, Vec<Snapshot>>,
    ) -> bool {
        let parent = self
            .resolve_types(&belongs_to.target_types(field), snapshots)
            .into_iter()
            .find_map(|parent_type| {
                let many_side = self.many_side_fields(&parent_type, type_id, belongs_to);
                snapshots[parent_type.as_str()]
                    .iter()
                    .find(|candidate| self.lists(candidate, many_side.as_deref(), doc.id()))
            });

        let found = parent.is_some();
        let value = parent
            .map(|snap| Value::Object(snap.front_matter.clone()))
            .unwrap_or(Value::Null);
        debug!(id = doc.id(), field, found, "Injected belongs-to association");
        doc.front_matter.insert(field.to_string(), value);
        found
    }

    /// Fields on `parent_type` that may list a child; `None` means any array field.
    fn many_side_fields(&self, parent_type: &str, child_type: &str, belongs_to: &BelongsTo) -> Option<Vec<String>> {
        if let Some(via) = belongs_to.via() {
            return Some(vec![via.to_string()]);
        }
        let declared: Vec<String> = self
            .definitions
            .get(parent_type)?
            .has_many
            .iter()
            .filter(|(_, targets)| targets.iter().any(|t| self.names_type(t, child_type)))
            .map(|(field, _)| field.clone())
            .collect();
        (!declared.is_empty()).then_some(declared)
    }

    fn lists(&self, candidate: &Snapshot, fields: Option<&[String]>, child_id: &str) -> bool {
        match fields {
            Some(fields) => fields
                .iter()
                .any(|f| listed_ids(candidate.front_matter.get(f)).iter().any(|id| id == child_id)),
            None => candidate
                .front_matter
                .values()
                .filter(|value| value.is_array())
                .any(|value| listed_ids(Some(value)).iter().any(|id| id == child_id)),
        }
    }

    /// Maps configured names onto the type ids present in `snapshots`.
    fn resolve_types(&self, names: &[String], snapshots: &IndexMap<String, Vec<Snapshot>>) -> Vec<String> {
        let mut resolved: Vec<String> = Vec::new();
        for name in names {
            let found = snapshots.keys().find(|type_id| self.names_type(name, type_id));
            match found {
                Some(type_id) if !resolved.contains(type_id) => resolved.push(type_id.clone()),
                Some(_) => {}
                None => debug!(name = %name, "Association target has no documents in this run"),
            }
        }
        resolved
    }

    /// Exact, plural or singular form, or a collection key aliasing the type.
    fn names_type(&self, name: &str, type_id: &str) -> bool {
        same_collection(name, type_id)
            || self
                .aliases
                .get(name)
                .is_some_and(|aliased| aliased == type_id)
    }
}

/// Applies `definitions` (keyed by content type id) to `documents`.
pub fn apply_associations(
    documents: &mut IndexMap<String, Vec<Document>>,
    definitions: &IndexMap<String, AssociationDefinition>,
) {
    AssociationPass::new(definitions).apply(documents);
}
