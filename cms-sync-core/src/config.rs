use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

/// Default name of the front matter field listing the sites an entry is published to.
pub const DEFAULT_CHANNEL_FIELD: &str = "distribution_channels";

/// The `contentful` section of the site configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Content type ids dropped from the schema; `*` drops everything not configured.
    #[serde(default, deserialize_with = "one_or_many")]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub config: SourceSettings,
    /// Collections to sync, keyed by collection name.
    #[serde(default)]
    pub content_types: IndexMap<String, CollectionConfig>,
}

impl SiteConfig {
    pub fn trace_loaded(&self) {
        info!(
            collections = self.content_types.len(),
            exclude = ?self.exclude,
            "Loaded site config"
        );
        debug!(?self, "Site config loaded (full debug)");
    }

    /// Collection config whose key or remote id names `type_id`.
    pub fn collection_for_type(&self, type_id: &str) -> Option<(&str, &CollectionConfig)> {
        self.content_types
            .iter()
            .find(|(key, cfg)| cfg.type_id(key) == type_id)
            .or_else(|| {
                self.content_types
                    .iter()
                    .find(|(key, _)| crate::inflect::same_collection(key, type_id))
            })
            .map(|(key, cfg)| (key.as_str(), cfg))
    }

    /// Every name the configuration refers to a collection by: keys and remote ids.
    pub fn configured_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for (key, cfg) in &self.content_types {
            names.push(key.clone());
            names.push(cfg.type_id(key).to_string());
        }
        names
    }
}

/// Source-wide knobs (the `config` block).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Field holding distribution channels; defaults to [`DEFAULT_CHANNEL_FIELD`].
    #[serde(default)]
    pub sites: Option<String>,
}

impl SourceSettings {
    pub fn channel_field(&self) -> &str {
        self.sites.as_deref().unwrap_or(DEFAULT_CHANNEL_FIELD)
    }
}

/// Per-collection configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Remote content type id; defaults to the collection key.
    #[serde(default)]
    pub id: Option<String>,
    /// Field whose value becomes the file body.
    #[serde(default)]
    pub content: Option<String>,
    /// Filename template, e.g. `{{ published_at | date: '%Y-%m-%d' }}-{{ slug }}`.
    #[serde(default)]
    pub filename: Option<String>,
    /// Output key → source field aliases.
    #[serde(default)]
    pub map: IndexMap<String, String>,
    #[serde(default)]
    pub has_many: IndexMap<String, TypeList>,
    #[serde(default)]
    pub belongs_to: IndexMap<String, BelongsTo>,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl CollectionConfig {
    pub fn type_id<'a>(&'a self, key: &'a str) -> &'a str {
        self.id.as_deref().unwrap_or(key)
    }

    pub fn associations(&self) -> AssociationDefinition {
        AssociationDefinition {
            has_many: self
                .has_many
                .iter()
                .map(|(field, types)| (field.clone(), types.0.clone()))
                .collect(),
            belongs_to: self.belongs_to.clone(),
        }
    }
}

/// One type name or a list of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypeList(pub Vec<String>);

impl<'de> Deserialize<'de> for TypeList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        one_or_many(deserializer).map(TypeList)
    }
}

/// Declared relationships of one content type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssociationDefinition {
    /// Field → content types whose documents the field lists, in authored order.
    pub has_many: IndexMap<String, Vec<String>>,
    /// Field → where to find the owning document.
    pub belongs_to: IndexMap<String, BelongsTo>,
}

impl AssociationDefinition {
    pub fn is_empty(&self) -> bool {
        self.has_many.is_empty() && self.belongs_to.is_empty()
    }
}

/// Target of a belongs-to field.
///
/// `article: widgets` means "the owner is an `article` whose `widgets` field lists me".
/// A list or a `types` block names the owner type(s) and leaves the
/// many-side field to the owner's own has-many declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BelongsTo {
    Via(String),
    Types(Vec<String>),
    Target {
        #[serde(deserialize_with = "one_or_many")]
        types: Vec<String>,
        #[serde(default)]
        via: Option<String>,
    },
}

impl BelongsTo {
    /// Owner content types; the shorthand form names the owner by the field key.
    pub fn target_types(&self, field: &str) -> Vec<String> {
        match self {
            BelongsTo::Via(_) => vec![field.to_string()],
            BelongsTo::Types(types) | BelongsTo::Target { types, .. } => types.clone(),
        }
    }

    /// Field on the owner that lists child ids, when pinned.
    pub fn via(&self) -> Option<&str> {
        match self {
            BelongsTo::Via(via) => Some(via),
            BelongsTo::Target { via, .. } => via.as_deref(),
            BelongsTo::Types(_) => None,
        }
    }
}

/// Run-wide options, usually from the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOptions {
    /// Only sync these collections (by key or content type id).
    pub collections: Vec<String>,
    pub limit: Option<usize>,
    pub order: Option<String>,
    /// Relative cutoff such as `1.day.ago` or `3 weeks ago`.
    pub recent: Option<String>,
    /// Extra `&`-joined `key=value` parameters, highest precedence.
    pub query: Option<String>,
    /// Delete existing collection files before writing.
    pub clean: bool,
    /// Distribution channel allow-list.
    pub sites: Vec<String>,
}

impl SyncOptions {
    pub fn trace_loaded(&self) {
        info!(
            collections = ?self.collections,
            limit = ?self.limit,
            recent = self.recent.as_deref().unwrap_or("-"),
            clean = self.clean,
            sites = ?self.sites,
            "Sync options"
        );
    }

    pub fn includes_collection(&self, key: &str, type_id: &str) -> bool {
        self.collections.is_empty()
            || self.collections.iter().any(|wanted| {
                crate::inflect::same_collection(wanted, key)
                    || crate::inflect::same_collection(wanted, type_id)
            })
    }
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Nothing(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(one) => vec![one],
        OneOrMany::Many(many) => many,
        OneOrMany::Nothing(()) => Vec::new(),
    })
}
