use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use cms_sync_core::config::{CollectionConfig, SyncOptions};
use cms_sync_core::contract::{EntryPage, MockContentSource, PageRequest, RawEntry};
use cms_sync_core::error::SyncError;
use cms_sync_core::fetch::{
    filter_channels, parse_query_string, parse_recent, EntryFetcher, EntryQuery, Order,
    CREATED_AT_GTE,
};
use cms_sync_core::schema::{ContentTypeSchema, FieldKind};
use pretty_assertions::assert_eq;
use serde_json::json;

/// A source serving `total` entries of one type, recording every request.
fn paged_source(total: usize, requests: Arc<Mutex<Vec<PageRequest>>>) -> MockContentSource {
    let mut source = MockContentSource::new();
    source.expect_entries().returning(move |request: &PageRequest| {
        requests.lock().unwrap().push(request.clone());
        let end = (request.skip + request.limit).min(total);
        let items = (request.skip.min(end)..end)
            .map(|i| RawEntry::new(format!("entry-{i}"), request.content_type.clone()))
            .collect();
        Ok(EntryPage {
            items,
            total: Some(total),
            ..EntryPage::default()
        })
    });
    source
}

#[tokio::test]
async fn fetches_every_page_in_order() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let source = paged_source(2500, requests.clone());

    let fetched = EntryFetcher::new(&source)
        .fetch_all("article", &EntryQuery::default())
        .await
        .expect("fetch should succeed");

    assert_eq!(fetched.entries.len(), 2500);
    assert_eq!(fetched.pages, 3);
    let ids: Vec<_> = fetched.entries.iter().map(|e| e.id().to_string()).collect();
    let expected: Vec<_> = (0..2500).map(|i| format!("entry-{i}")).collect();
    assert_eq!(ids, expected);

    let skips: Vec<_> = requests.lock().unwrap().iter().map(|r| r.skip).collect();
    assert_eq!(skips, vec![0, 1000, 2000]);
}

#[tokio::test]
async fn exact_multiple_of_page_size_costs_one_empty_request() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let source = paged_source(2000, requests.clone());

    let fetched = EntryFetcher::new(&source)
        .fetch_all("article", &EntryQuery::default())
        .await
        .expect("an empty final page is not an error");

    assert_eq!(fetched.entries.len(), 2000);
    assert_eq!(requests.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn limit_caps_total_and_shrinks_page_size() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let source = paged_source(500, requests.clone());
    let query = EntryQuery {
        limit: Some(25),
        ..EntryQuery::default()
    };

    let fetched = EntryFetcher::new(&source)
        .with_page_size(10)
        .fetch_all("article", &query)
        .await
        .unwrap();

    assert_eq!(fetched.entries.len(), 25);
    let limits: Vec<_> = requests.lock().unwrap().iter().map(|r| r.limit).collect();
    assert_eq!(limits, vec![10, 10, 10]);

    let requests = Arc::new(Mutex::new(Vec::new()));
    let source = paged_source(500, requests.clone());
    EntryFetcher::new(&source).fetch_all("article", &query).await.unwrap();
    assert_eq!(requests.lock().unwrap()[0].limit, 25);
}

#[tokio::test]
async fn failed_page_aborts_without_partial_data() {
    let mut source = MockContentSource::new();
    source.expect_entries().returning(|request: &PageRequest| {
        if request.skip == 0 {
            Ok(EntryPage {
                items: (0..10).map(|i| RawEntry::new(format!("e{i}"), "article")).collect(),
                ..EntryPage::default()
            })
        } else {
            Err("rate limited".into())
        }
    });

    let result = EntryFetcher::new(&source)
        .with_page_size(10)
        .fetch_all("article", &EntryQuery::default())
        .await;

    match result {
        Err(SyncError::Fetch { content_type, skip, .. }) => {
            assert_eq!(content_type, "article");
            assert_eq!(skip, 10);
        }
        other => panic!("expected a fetch error, got {other:?}"),
    }
}

#[test]
fn order_syntaxes() {
    let cases = [
        ("title", "fields.title"),
        ("-title", "-fields.title"),
        ("title desc", "-fields.title"),
        ("title asc", "fields.title"),
        ("sys.updatedAt", "sys.updatedAt"),
        ("-sys.createdAt", "-sys.createdAt"),
    ];
    for (raw, expected) in cases {
        let order = Order::parse(raw).unwrap_or_else(|| panic!("{raw} should parse"));
        assert_eq!(order.to_param(), expected, "order {raw}");
    }
    assert_eq!(Order::default().to_param(), "-sys.createdAt");
    assert_eq!(Order::parse("title sideways"), None);
}

#[test]
fn query_precedence_is_options_then_collection_then_explicit_query() {
    let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
    let options = SyncOptions {
        limit: Some(100),
        order: Some("title".to_string()),
        query: Some("fields.category=news&limit=5".to_string()),
        ..SyncOptions::default()
    };
    let collection = CollectionConfig {
        limit: Some(50),
        order: Some("-published_at".to_string()),
        query: Some("fields.category=blog&fields.featured=true".to_string()),
        ..CollectionConfig::default()
    };

    let query = EntryQuery::assemble(&options, &collection, now);

    assert_eq!(query.limit, Some(5));
    assert_eq!(query.order.to_param(), "-fields.published_at");
    assert_eq!(query.params.get("fields.category").map(String::as_str), Some("news"));
    assert_eq!(query.params.get("fields.featured").map(String::as_str), Some("true"));
}

#[test]
fn query_string_last_value_wins_and_reserved_keys_are_dropped() {
    let parsed = parse_query_string("a=1&b=2&a=3&&flag");
    assert_eq!(parsed.get("a").map(String::as_str), Some("3"));
    assert_eq!(parsed.get("b").map(String::as_str), Some("2"));
    assert_eq!(parsed.get("flag").map(String::as_str), Some(""));

    let options = SyncOptions {
        query: Some("content_type=other&skip=40&fields.x=1".to_string()),
        ..SyncOptions::default()
    };
    let query = EntryQuery::assemble(&options, &CollectionConfig::default(), Utc::now());
    assert!(!query.params.contains_key("content_type"));
    assert!(!query.params.contains_key("skip"));
    assert!(query.params.contains_key("fields.x"));
}

#[test]
fn recency_cutoffs() {
    let now = Utc.with_ymd_and_hms(2024, 3, 31, 8, 30, 0).unwrap();
    let cases = [
        ("1.day.ago", Utc.with_ymd_and_hms(2024, 3, 30, 8, 30, 0).unwrap()),
        ("2 weeks ago", Utc.with_ymd_and_hms(2024, 3, 17, 8, 30, 0).unwrap()),
        ("3.hours.ago", Utc.with_ymd_and_hms(2024, 3, 31, 5, 30, 0).unwrap()),
        ("1.month.ago", Utc.with_ymd_and_hms(2024, 2, 29, 8, 30, 0).unwrap()),
        ("1 year ago", Utc.with_ymd_and_hms(2023, 3, 31, 8, 30, 0).unwrap()),
    ];
    for (raw, expected) in cases {
        assert_eq!(parse_recent(raw, now), Some(expected), "recent {raw}");
    }
    assert_eq!(parse_recent("yesterday", now), None);

    let options = SyncOptions {
        recent: Some("1.day.ago".to_string()),
        ..SyncOptions::default()
    };
    let query = EntryQuery::assemble(&options, &CollectionConfig::default(), now);
    assert_eq!(query.params.get(CREATED_AT_GTE).map(String::as_str), Some("2024-03-30"));

    let options = SyncOptions {
        recent: Some("soonish".to_string()),
        ..SyncOptions::default()
    };
    let query = EntryQuery::assemble(&options, &CollectionConfig::default(), now);
    assert!(!query.params.contains_key(CREATED_AT_GTE));
}

fn schema_with_channels() -> ContentTypeSchema {
    let mut schema = ContentTypeSchema::empty("article");
    schema.fields.push("distribution_channels".to_string());
    schema
        .kinds
        .insert("distribution_channels".to_string(), FieldKind::Scalar);
    schema
}

#[test]
fn channel_filter_keeps_only_allowed_sites() {
    let entries = vec![
        RawEntry::new("a", "article").with_field("distribution_channels", json!(["main", "blog"])),
        RawEntry::new("b", "article").with_field("distribution_channels", json!(["shop"])),
        RawEntry::new("c", "article"),
        RawEntry::new("d", "article").with_field("distribution_channels", json!([{ "name": "blog" }])),
    ];
    let schema = schema_with_channels();
    let sites = vec!["blog".to_string()];

    let kept = filter_channels(entries.clone(), Some(&schema), "distribution_channels", &sites);
    let ids: Vec<_> = kept.iter().map(|e| e.id()).collect();
    assert_eq!(ids, vec!["a", "d"]);

    // No allow-list, or a type without the field: nothing is dropped.
    assert_eq!(filter_channels(entries.clone(), Some(&schema), "distribution_channels", &[]).len(), 4);
    let plain = ContentTypeSchema::empty("article");
    assert_eq!(filter_channels(entries, Some(&plain), "distribution_channels", &sites).len(), 4);
}
