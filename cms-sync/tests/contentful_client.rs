use cms_sync::contentful::ContentfulClient;
use cms_sync_core::config::{SiteConfig, SyncOptions};
use cms_sync_core::contract::{ContentSource, PageRequest};
use cms_sync_core::synchronise::synchronise;
use cms_sync_core::writer::Writer;
use pretty_assertions::assert_eq;
use serde_json::json;
use serial_test::serial;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use tempfile::tempdir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENTRIES_PATH: &str = "/spaces/space-1/environments/master/entries";
const CONTENT_TYPES_PATH: &str = "/spaces/space-1/environments/master/content_types";

fn client(server: &MockServer) -> ContentfulClient {
    ContentfulClient::new("space-1", "master", "token-123").with_base_url(server.uri())
}

fn request(content_type: &str, skip: usize) -> PageRequest {
    PageRequest {
        content_type: content_type.to_string(),
        params: BTreeMap::from([("fields.featured".to_string(), "true".to_string())]),
        order: "-sys.createdAt".to_string(),
        limit: 1000,
        skip,
    }
}

fn article_page() -> serde_json::Value {
    json!({
        "total": 1,
        "skip": 0,
        "limit": 1000,
        "items": [{
            "sys": {
                "id": "article-1",
                "type": "Entry",
                "createdAt": "2024-01-01T09:00:00Z",
                "contentType": { "sys": { "id": "article", "type": "Link", "linkType": "ContentType" } }
            },
            "fields": {
                "title": "Hello",
                "slug": "hello",
                "author": { "sys": { "type": "Link", "linkType": "Entry", "id": "author-1" } }
            }
        }],
        "includes": {
            "Entry": [{
                "sys": {
                    "id": "author-1",
                    "type": "Entry",
                    "contentType": { "sys": { "id": "author", "type": "Link", "linkType": "ContentType" } }
                },
                "fields": { "full_name": "Jane Doe" }
            }],
            "Asset": [{
                "sys": { "id": "asset-1", "type": "Asset" },
                "fields": { "file": { "url": "//images.example.com/a.png" } }
            }]
        }
    })
}

fn content_types() -> serde_json::Value {
    json!({
        "total": 2,
        "items": [
            {
                "sys": { "id": "article", "type": "ContentType" },
                "name": "Article",
                "fields": [
                    { "id": "title", "type": "Symbol" },
                    { "id": "slug", "type": "Symbol" },
                    {
                        "id": "author",
                        "type": "Link",
                        "linkType": "Entry",
                        "validations": [{ "linkContentType": ["author"] }]
                    },
                    {
                        "id": "gallery",
                        "type": "Array",
                        "items": { "type": "Link", "linkType": "Asset" }
                    }
                ]
            },
            {
                "sys": { "id": "author", "type": "ContentType" },
                "name": "Author",
                "fields": [{ "id": "full_name", "type": "Symbol" }]
            }
        ]
    })
}

#[tokio::test]
async fn entries_sends_page_parameters_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ENTRIES_PATH))
        .and(header("authorization", "Bearer token-123"))
        .and(query_param("content_type", "article"))
        .and(query_param("order", "-sys.createdAt"))
        .and(query_param("limit", "1000"))
        .and(query_param("skip", "1000"))
        .and(query_param("include", "2"))
        .and(query_param("fields.featured", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(article_page()))
        .expect(1)
        .mount(&server)
        .await;

    let page = client(&server)
        .entries(&request("article", 1000))
        .await
        .expect("page should decode");

    assert_eq!(page.total, Some(1));
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id(), "article-1");
    assert_eq!(page.items[0].content_type_id(), "article");
    assert_eq!(page.includes.entries[0].id(), "author-1");
    assert_eq!(page.includes.assets[0].url(), Some("//images.example.com/a.png"));
}

#[tokio::test]
async fn content_type_models_decode_field_descriptors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CONTENT_TYPES_PATH))
        .and(query_param("limit", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(content_types()))
        .mount(&server)
        .await;

    let models = client(&server).content_type_models().await.expect("models decode");

    assert_eq!(models.len(), 2);
    assert_eq!(models[0].id(), "article");
    let author = &models[0].fields[2];
    assert_eq!(author.kind, "Link");
    assert_eq!(author.link_type.as_deref(), Some("Entry"));
    assert_eq!(author.validations.len(), 1);
    let gallery = models[0].fields[3].items.as_ref().expect("array items");
    assert_eq!(gallery.link_type.as_deref(), Some("Asset"));
}

#[tokio::test]
async fn error_status_is_reported_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ENTRIES_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("AccessTokenInvalid"))
        .mount(&server)
        .await;

    let err = client(&server)
        .entries(&request("article", 0))
        .await
        .expect_err("401 must fail");
    let message = err.to_string();
    assert!(message.contains("401"), "unexpected error: {message}");
    assert!(message.contains("AccessTokenInvalid"), "unexpected error: {message}");
}

#[tokio::test]
async fn synchronise_against_the_delivery_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CONTENT_TYPES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(content_types()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ENTRIES_PATH))
        .and(query_param("content_type", "article"))
        .respond_with(ResponseTemplate::new(200).set_body_json(article_page()))
        .expect(1)
        .mount(&server)
        .await;

    let site: SiteConfig = serde_yaml::from_str("content_types:\n  articles:\n    id: article\n")
        .expect("site config parses");
    let dir = tempdir().unwrap();

    let report = synchronise(
        &site,
        &SyncOptions::default(),
        &client(&server),
        &Writer::new(dir.path()),
    )
    .await
    .expect("sync succeeds");

    assert_eq!(report.written(), 1);
    let contents = fs::read_to_string(dir.path().join("collections/_articles/hello.md")).unwrap();
    assert!(contents.starts_with("---\nid: article-1\n"));
    assert!(contents.contains("full_name: Jane Doe"));
}

#[test]
#[serial]
fn new_from_env_reads_only_the_process_environment() {
    env::remove_var("CONTENTFUL_ACCESS_TOKEN");
    env::set_var("CONTENTFUL_SPACE_ID", "space-1");
    assert!(ContentfulClient::new_from_env().is_err());

    env::set_var("CONTENTFUL_ACCESS_TOKEN", "token-123");
    env::remove_var("CONTENTFUL_ENV");
    assert!(ContentfulClient::new_from_env().is_ok());

    env::remove_var("CONTENTFUL_SPACE_ID");
    assert!(ContentfulClient::new_from_env().is_err());
    env::remove_var("CONTENTFUL_ACCESS_TOKEN");
}
