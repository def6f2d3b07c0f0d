//! Entry fetching: paginated retrieval of every entry of a content type.
//!
//! # Pagination
//! Pages are requested sequentially at `skip = entries fetched so far`. A
//! page shorter than the page size ends the walk, so a total that is an exact
//! multiple of the page size costs one extra, empty request.
//!
//! # Query assembly
//! Parameters merge in increasing precedence: run options (limit, order,
//! recency), the collection's config (limit, order, query string), then the
//! explicit `--query` string.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Months, TimeDelta, Utc};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{CollectionConfig, SyncOptions};
use crate::contract::{ContentSource, Includes, PageRequest, RawEntry};
use crate::error::SyncError;
use crate::schema::ContentTypeSchema;

/// Largest page the delivery API serves.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Filter parameter added by a recency cutoff.
pub const CREATED_AT_GTE: &str = "sys.createdAt[gte]";

const SYS_PREFIX: &str = "sys.";
const FIELDS_PREFIX: &str = "fields.";

/// Parameters the fetcher owns; dropped from user supplied query strings.
const RESERVED_PARAMS: &[&str] = &["content_type", "skip"];

/// Sort order of a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub descending: bool,
}

impl Default for Order {
    /// Newest first.
    fn default() -> Self {
        Self {
            field: "sys.createdAt".to_string(),
            descending: true,
        }
    }
}

impl Order {
    /// Accepts `title`, `-title`, `title desc`, `title asc`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split_whitespace();
        let field = parts.next()?;
        let direction = parts.next();
        if parts.next().is_some() {
            return None;
        }
        let (field, mut descending) = match field.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (field, false),
        };
        if field.is_empty() {
            return None;
        }
        match direction.map(str::to_ascii_lowercase).as_deref() {
            None => {}
            Some("desc") => descending = true,
            Some("asc") => descending = false,
            Some(_) => return None,
        }
        Some(Self {
            field: field.to_string(),
            descending,
        })
    }

    /// API form: system attributes keep their `sys.` prefix, everything else
    /// lives under `fields.`.
    pub fn to_param(&self) -> String {
        let field = if self.field.starts_with(SYS_PREFIX) || self.field.starts_with(FIELDS_PREFIX) {
            self.field.clone()
        } else {
            format!("{FIELDS_PREFIX}{}", self.field)
        };
        if self.descending {
            format!("-{field}")
        } else {
            field
        }
    }
}

/// Everything needed to fetch one content type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryQuery {
    pub params: BTreeMap<String, String>,
    pub order: Order,
    /// Cap on the total number of entries.
    pub limit: Option<usize>,
}

impl EntryQuery {
    pub fn assemble(options: &SyncOptions, collection: &CollectionConfig, now: DateTime<Utc>) -> Self {
        let mut query = EntryQuery::default();

        // Run options.
        query.apply_limit(options.limit);
        query.apply_order(options.order.as_deref());
        if let Some(recent) = options.recent.as_deref() {
            match parse_recent(recent, now) {
                Some(cutoff) => {
                    query
                        .params
                        .insert(CREATED_AT_GTE.to_string(), cutoff.format("%Y-%m-%d").to_string());
                }
                None => warn!(recent, "Could not parse recency cutoff; fetching without it"),
            }
        }

        // Collection config.
        query.apply_limit(collection.limit);
        query.apply_order(collection.order.as_deref());
        if let Some(raw) = collection.query.as_deref() {
            query.merge_params(parse_query_string(raw));
        }

        // Explicit query string.
        if let Some(raw) = options.query.as_deref() {
            query.merge_params(parse_query_string(raw));
        }
        query
    }

    fn apply_limit(&mut self, limit: Option<usize>) {
        if let Some(limit) = limit.filter(|l| *l > 0) {
            self.limit = Some(limit);
        }
    }

    fn apply_order(&mut self, order: Option<&str>) {
        if let Some(raw) = order {
            match Order::parse(raw) {
                Some(order) => self.order = order,
                None => warn!(order = raw, "Ignoring unparseable order"),
            }
        }
    }

    fn merge_params(&mut self, params: BTreeMap<String, String>) {
        for (key, value) in params {
            match key.as_str() {
                "limit" => match value.parse::<usize>() {
                    Ok(limit) => self.apply_limit(Some(limit)),
                    Err(_) => warn!(limit = %value, "Ignoring non-numeric limit in query"),
                },
                "order" => self.apply_order(Some(&value)),
                reserved if RESERVED_PARAMS.contains(&reserved) => {
                    debug!(param = reserved, "Ignoring reserved query parameter");
                }
                _ => {
                    self.params.insert(key, value);
                }
            }
        }
    }
}

/// Parses `a=1&b=2`; later pairs override earlier ones.
pub fn parse_query_string(raw: &str) -> BTreeMap<String, String> {
    raw.split('&')
        .filter_map(|pair| {
            let pair = pair.trim();
            if pair.is_empty() {
                return None;
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), value.trim().to_string()))
        })
        .collect()
}

static RECENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d+)\s*[.\s]\s*(minute|hour|day|week|month|year)s?(?:\s*[.\s]\s*ago)?\s*$")
        .expect("recency pattern is a valid regex")
});

/// Absolute cutoff for `N.unit.ago` / `N units ago`, relative to `now`.
pub fn parse_recent(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let captures = RECENT.captures(raw)?;
    let amount: i64 = captures[1].parse().ok()?;
    let unit = captures[2].to_ascii_lowercase();
    match unit.as_str() {
        "minute" => now.checked_sub_signed(TimeDelta::try_minutes(amount)?),
        "hour" => now.checked_sub_signed(TimeDelta::try_hours(amount)?),
        "day" => now.checked_sub_signed(TimeDelta::try_days(amount)?),
        "week" => now.checked_sub_signed(TimeDelta::try_weeks(amount)?),
        "month" => now.checked_sub_months(Months::new(u32::try_from(amount).ok()?)),
        "year" => now.checked_sub_months(Months::new(u32::try_from(amount.checked_mul(12)?).ok()?)),
        _ => None,
    }
}

/// Result of fetching one content type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedEntries {
    pub entries: Vec<RawEntry>,
    pub includes: Includes,
    pub pages: usize,
}

/// Pages through a [`ContentSource`].
pub struct EntryFetcher<'a, S: ContentSource + ?Sized> {
    source: &'a S,
    page_size: usize,
}

impl<'a, S: ContentSource + ?Sized> EntryFetcher<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Fetches every entry of `type_id`; any failed page fails the whole fetch.
    pub async fn fetch_all(&self, type_id: &str, query: &EntryQuery) -> Result<FetchedEntries, SyncError> {
        let page_size = match query.limit {
            Some(limit) if limit < self.page_size => limit,
            _ => self.page_size,
        };
        let mut fetched = FetchedEntries::default();

        loop {
            let request = PageRequest {
                content_type: type_id.to_string(),
                params: query.params.clone(),
                order: query.order.to_param(),
                limit: page_size,
                skip: fetched.entries.len(),
            };
            debug!(content_type = type_id, skip = request.skip, limit = page_size, "Requesting page");
            let page = self
                .source
                .entries(&request)
                .await
                .map_err(|source| SyncError::Fetch {
                    content_type: type_id.to_string(),
                    skip: request.skip,
                    source,
                })?;
            fetched.pages += 1;

            let received = page.items.len();
            fetched.entries.extend(page.items);
            fetched.includes.entries.extend(page.includes.entries);
            fetched.includes.assets.extend(page.includes.assets);

            if let Some(limit) = query.limit {
                if fetched.entries.len() >= limit {
                    fetched.entries.truncate(limit);
                    break;
                }
            }
            if received < page_size {
                break;
            }
        }

        info!(
            content_type = type_id,
            entries = fetched.entries.len(),
            pages = fetched.pages,
            "Fetched entries"
        );
        Ok(fetched)
    }
}

/// Drops entries not published to any of `sites`.
///
/// Only applies when an allow-list is given and the content type declares
/// `channel_field`; an entry without the field is dropped.
pub fn filter_channels(
    entries: Vec<RawEntry>,
    schema: Option<&ContentTypeSchema>,
    channel_field: &str,
    sites: &[String],
) -> Vec<RawEntry> {
    if sites.is_empty() || !schema.is_some_and(|s| s.declares(channel_field)) {
        return entries;
    }
    let before = entries.len();
    let kept: Vec<RawEntry> = entries
        .into_iter()
        .filter(|entry| on_channels(entry, schema, channel_field, sites))
        .collect();
    debug!(
        field = channel_field,
        kept = kept.len(),
        dropped = before - kept.len(),
        "Applied distribution channel filter"
    );
    kept
}

/// Whether one entry survives [`filter_channels`].
pub fn on_channels(
    entry: &RawEntry,
    schema: Option<&ContentTypeSchema>,
    channel_field: &str,
    sites: &[String],
) -> bool {
    if sites.is_empty() || !schema.is_some_and(|s| s.declares(channel_field)) {
        return true;
    }
    channels(entry.field(channel_field))
        .iter()
        .any(|channel| sites.iter().any(|site| site == channel))
}

fn channels(value: Option<&Value>) -> Vec<String> {
    fn name(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(map) => ["id", "name", "url"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .map(|s| s.trim().to_string()),
            _ => None,
        }
    }

    match value {
        Some(Value::Array(items)) => items.iter().filter_map(name).collect(),
        Some(other) => name(other).into_iter().collect(),
        None => Vec::new(),
    }
}
