#![allow(unused)]

//! # contract: the CMS seam
//!
//! This module defines the single trait ([`ContentSource`]) through which the
//! pipeline talks to a headless CMS, plus the wire types it exchanges. The
//! shapes follow the Contentful Delivery API JSON so a real HTTP client can
//! deserialize straight into them.
//!
//! ## Interface & Extensibility
//! - Implement [`ContentSource`] to plug in a real client (see the `cms-sync`
//!   binary crate) or a fixture-backed fake.
//! - All methods are async and return a boxed error; the pipeline decides
//!   whether a failure is fatal.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`; with the `test-export-mocks`
//!   feature (default) integration tests can use `MockContentSource`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use mockall::{automock, predicate::*};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error type for the CMS seam (simple boxed error, like the other pipeline traits).
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// `sys` block of a CMS record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sys {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<SysLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// A `{"sys": {...}}` wrapper, as used for content type pointers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SysLink {
    pub sys: LinkSys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSys {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
}

/// One remote entry, fields left as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    pub sys: Sys,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl RawEntry {
    pub fn new(id: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            sys: Sys {
                id: id.into(),
                kind: Some("Entry".to_string()),
                content_type: Some(SysLink {
                    sys: LinkSys {
                        id: content_type.into(),
                        kind: Some("Link".to_string()),
                        link_type: Some("ContentType".to_string()),
                    },
                }),
                created_at: None,
                updated_at: None,
            },
            fields: Map::new(),
        }
    }

    /// Builder-style helper for fixtures.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn id(&self) -> &str {
        &self.sys.id
    }

    /// Remote content type id, empty when the record carries none.
    pub fn content_type_id(&self) -> &str {
        self.sys
            .content_type
            .as_ref()
            .map(|ct| ct.sys.id.as_str())
            .unwrap_or("")
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// A remote asset (image, file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAsset {
    pub sys: Sys,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl RawAsset {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(
            "file".to_string(),
            serde_json::json!({ "url": url.into() }),
        );
        Self {
            sys: Sys {
                id: id.into(),
                kind: Some("Asset".to_string()),
                content_type: None,
                created_at: None,
                updated_at: None,
            },
            fields,
        }
    }

    pub fn id(&self) -> &str {
        &self.sys.id
    }

    pub fn url(&self) -> Option<&str> {
        self.fields
            .get("file")
            .and_then(|file| file.get("url"))
            .and_then(Value::as_str)
    }
}

/// What a link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Entry,
    Asset,
}

/// A reference to another entry or asset, as found inside a field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub id: String,
    pub link_type: LinkType,
}

impl Link {
    pub fn entry(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            link_type: LinkType::Entry,
        }
    }

    pub fn asset(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            link_type: LinkType::Asset,
        }
    }

    /// Recognises both unresolved links (`sys.type == "Link"`) and records
    /// the API already inlined (`sys.type == "Entry" | "Asset"`).
    pub fn from_value(value: &Value) -> Option<Self> {
        let sys = value.get("sys")?;
        let id = sys.get("id")?.as_str()?.to_string();
        let link_type = match sys.get("type")?.as_str()? {
            "Link" => match sys.get("linkType").and_then(Value::as_str)? {
                "Entry" => LinkType::Entry,
                "Asset" => LinkType::Asset,
                _ => return None,
            },
            "Entry" => LinkType::Entry,
            "Asset" => LinkType::Asset,
            _ => return None,
        };
        Some(Self { id, link_type })
    }

    pub fn to_value(&self) -> Value {
        let link_type = match self.link_type {
            LinkType::Entry => "Entry",
            LinkType::Asset => "Asset",
        };
        serde_json::json!({
            "sys": { "type": "Link", "linkType": link_type, "id": self.id }
        })
    }
}

/// Linked records delivered alongside a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Includes {
    #[serde(rename = "Entry", default)]
    pub entries: Vec<RawEntry>,
    #[serde(rename = "Asset", default)]
    pub assets: Vec<RawAsset>,
}

/// One page of entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryPage {
    #[serde(default)]
    pub items: Vec<RawEntry>,
    #[serde(default)]
    pub includes: Includes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

/// Parameters for fetching one page of a content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub content_type: String,
    /// Filter parameters, already namespaced (`fields.x`, `sys.createdAt[gte]`, ...).
    pub params: BTreeMap<String, String>,
    /// Order expression in API syntax, e.g. `-sys.createdAt`.
    pub order: String,
    pub limit: usize,
    pub skip: usize,
}

impl PageRequest {
    /// Flattens the request into query-string pairs.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("content_type".to_string(), self.content_type.clone()),
            ("order".to_string(), self.order.clone()),
            ("limit".to_string(), self.limit.to_string()),
            ("skip".to_string(), self.skip.to_string()),
        ];
        pairs.extend(self.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        pairs
    }
}

/// Content model as described by the CMS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub sys: LinkSys,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl ModelDescriptor {
    pub fn new(id: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            sys: LinkSys {
                id: id.into(),
                kind: Some("ContentType".to_string()),
                link_type: None,
            },
            name: None,
            fields,
        }
    }

    pub fn id(&self) -> &str {
        &self.sys.id
    }
}

/// One field of a content model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemsDescriptor>,
    /// Kept loosely typed: a malformed validation must not fail deserialization.
    #[serde(default)]
    pub validations: Vec<Value>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub omitted: bool,
}

impl FieldDescriptor {
    pub fn scalar(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            link_type: None,
            items: None,
            validations: Vec::new(),
            disabled: false,
            omitted: false,
        }
    }

    pub fn asset(id: impl Into<String>) -> Self {
        Self {
            link_type: Some("Asset".to_string()),
            ..Self::scalar(id, "Link")
        }
    }

    pub fn entry_link(id: impl Into<String>, targets: &[&str]) -> Self {
        Self {
            link_type: Some("Entry".to_string()),
            validations: link_content_type_validation(targets),
            ..Self::scalar(id, "Link")
        }
    }

    pub fn entry_array(id: impl Into<String>, targets: &[&str]) -> Self {
        Self {
            items: Some(ItemsDescriptor {
                kind: "Link".to_string(),
                link_type: Some("Entry".to_string()),
                validations: link_content_type_validation(targets),
            }),
            ..Self::scalar(id, "Array")
        }
    }

    pub fn asset_array(id: impl Into<String>) -> Self {
        Self {
            items: Some(ItemsDescriptor {
                kind: "Link".to_string(),
                link_type: Some("Asset".to_string()),
                validations: Vec::new(),
            }),
            ..Self::scalar(id, "Array")
        }
    }
}

fn link_content_type_validation(targets: &[&str]) -> Vec<Value> {
    if targets.is_empty() {
        Vec::new()
    } else {
        vec![serde_json::json!({ "linkContentType": targets })]
    }
}

/// Item shape of an `Array` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
    #[serde(default)]
    pub validations: Vec<Value>,
}

/// Trait for reading content from a headless CMS.
///
/// The implementor owns transport, authentication and retries; the pipeline
/// only sees pages of entries and the content model list.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch a single page of entries.
    async fn entries(&self, request: &PageRequest) -> Result<EntryPage, SourceError>;

    /// List every content type model of the space.
    async fn content_type_models(&self) -> Result<Vec<ModelDescriptor>, SourceError>;
}
