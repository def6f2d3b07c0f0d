use cms_sync_core::config::{BelongsTo, SiteConfig, SyncOptions, DEFAULT_CHANNEL_FIELD};
use pretty_assertions::assert_eq;

#[test]
fn parses_a_full_contentful_section() {
    let yaml = r#"
exclude: "*"
config:
  sites: channels
content_types:
  articles:
    id: blogPost
    content: body
    filename: "{{ published_at | date: '%Y-%m-%d' }}-{{ slug }}"
    map:
      headline: title
    has_many:
      widgets: [widget, banner]
    belongs_to:
      author: articles
    order: -published_at
    query: fields.featured=true
    limit: 20
  widgets:
    belongs_to:
      owner:
        types: article
        via: widgets
      section: [sections, pages]
"#;
    let site: SiteConfig = serde_yaml::from_str(yaml).expect("config parses");

    assert_eq!(site.exclude, vec!["*"]);
    assert_eq!(site.config.channel_field(), "channels");

    let (key, articles) = site.collection_for_type("blogPost").expect("by remote id");
    assert_eq!(key, "articles");
    assert_eq!(articles.content.as_deref(), Some("body"));
    assert_eq!(articles.limit, Some(20));
    assert_eq!(articles.map.get("headline").map(String::as_str), Some("title"));

    let definition = articles.associations();
    assert_eq!(definition.has_many["widgets"], vec!["widget", "banner"]);
    assert_eq!(definition.belongs_to["author"], BelongsTo::Via("articles".to_string()));
    assert_eq!(definition.belongs_to["author"].target_types("author"), vec!["author"]);

    let widgets = &site.content_types["widgets"];
    assert_eq!(widgets.type_id("widgets"), "widgets");
    let owner = &widgets.belongs_to["owner"];
    assert_eq!(owner.target_types("owner"), vec!["article"]);
    assert_eq!(owner.via(), Some("widgets"));
    let section = &widgets.belongs_to["section"];
    assert_eq!(section.target_types("section"), vec!["sections", "pages"]);
    assert_eq!(section.via(), None);

    assert_eq!(
        site.configured_names(),
        vec!["articles", "blogPost", "widgets", "widgets"]
    );
}

#[test]
fn empty_section_uses_defaults() {
    let site: SiteConfig = serde_yaml::from_str("content_types: {}").unwrap();
    assert!(site.exclude.is_empty());
    assert_eq!(site.config.channel_field(), DEFAULT_CHANNEL_FIELD);
    assert!(site.content_types.is_empty());
}

#[test]
fn collection_filter_matches_key_or_type_in_any_number() {
    let options = SyncOptions {
        collections: vec!["article".to_string()],
        ..SyncOptions::default()
    };
    assert!(options.includes_collection("articles", "blogPost"));
    assert!(options.includes_collection("posts", "article"));
    assert!(!options.includes_collection("widgets", "widget"));
    assert!(SyncOptions::default().includes_collection("anything", "anything"));
}
