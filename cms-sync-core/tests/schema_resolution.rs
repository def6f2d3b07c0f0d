use cms_sync_core::contract::{FieldDescriptor, ModelDescriptor};
use cms_sync_core::schema::{
    resolve_schema, ExcludeList, FieldKind, ReferenceSpec, TargetFields, ASSET_TYPE,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn article_model() -> ModelDescriptor {
    ModelDescriptor::new(
        "article",
        vec![
            FieldDescriptor::scalar("title", "Symbol"),
            FieldDescriptor::scalar("slug", "Symbol"),
            FieldDescriptor::asset("hero"),
            FieldDescriptor::entry_link("author", &["author"]),
            FieldDescriptor::entry_array("widgets", &["widget"]),
            FieldDescriptor::asset_array("gallery"),
        ],
    )
}

fn author_model() -> ModelDescriptor {
    ModelDescriptor::new(
        "author",
        vec![
            FieldDescriptor::scalar("full_name", "Symbol"),
            FieldDescriptor::entry_array("articles", &["article"]),
        ],
    )
}

fn widget_model() -> ModelDescriptor {
    ModelDescriptor::new("widget", vec![FieldDescriptor::scalar("label", "Symbol")])
}

#[test]
fn partitions_plain_and_reference_fields() {
    let resolved = resolve_schema(&[article_model()], &ExcludeList::default());
    let article = resolved.get("article").expect("article schema");

    assert_eq!(article.fields, vec!["title", "slug", "hero", "gallery"]);
    assert_eq!(
        article.references.keys().collect::<Vec<_>>(),
        vec!["author", "widgets"]
    );
    assert_eq!(article.kind_of("hero"), Some(FieldKind::Asset));
    assert_eq!(article.kind_of("gallery"), Some(FieldKind::AssetArray));
    assert_eq!(article.kind_of("author"), Some(FieldKind::SingleLink));
    assert_eq!(article.kind_of("widgets"), Some(FieldKind::LinkArray));
}

#[test]
fn resolution_does_not_depend_on_model_order() {
    let forward = resolve_schema(
        &[article_model(), author_model(), widget_model()],
        &ExcludeList::default(),
    );
    let backward = resolve_schema(
        &[widget_model(), author_model(), article_model()],
        &ExcludeList::default(),
    );

    for id in ["article", "author", "widget"] {
        assert_eq!(forward.get(id), backward.get(id), "schema of {id}");
    }
    assert_eq!(
        forward.get("article").unwrap().reference("author"),
        Some(&ReferenceSpec::Targets(
            [("author".to_string(), TargetFields::Inline(vec!["full_name".to_string()]))]
                .into_iter()
                .collect()
        ))
    );
}

#[test]
fn circular_models_inline_only_plain_fields() {
    let resolved = resolve_schema(&[article_model(), author_model()], &ExcludeList::default());

    let Some(ReferenceSpec::Targets(targets)) = resolved.get("author").unwrap().reference("articles") else {
        panic!("articles should have explicit targets");
    };
    // The article projection never includes article's own references.
    assert_eq!(
        targets.get("article"),
        Some(&TargetFields::Inline(vec![
            "title".to_string(),
            "slug".to_string(),
            "hero".to_string(),
            "gallery".to_string(),
        ]))
    );
}

#[test]
fn unconstrained_reference_resolves_to_any() {
    let model = ModelDescriptor::new("page", vec![FieldDescriptor::entry_link("related", &[])]);
    let resolved = resolve_schema(&[model], &ExcludeList::default());
    assert_eq!(
        resolved.get("page").unwrap().reference("related"),
        Some(&ReferenceSpec::Any)
    );
}

#[test]
fn excluded_target_is_id_only() {
    let exclude = ExcludeList::new(&["author".to_string()], &[]);
    let resolved = resolve_schema(&[article_model(), author_model()], &exclude);

    assert!(!resolved.contains("author"));
    let Some(ReferenceSpec::Targets(targets)) = resolved.get("article").unwrap().reference("author") else {
        panic!("author should have explicit targets");
    };
    assert_eq!(targets.get("author"), Some(&TargetFields::IdOnly));
}

#[test]
fn wildcard_excludes_everything_not_configured() {
    let exclude = ExcludeList::new(&["*".to_string()], &["articles".to_string()]);
    let resolved = resolve_schema(
        &[article_model(), author_model(), widget_model()],
        &exclude,
    );

    assert!(resolved.contains("article"), "configured by plural key");
    assert!(!resolved.contains("author"));
    assert!(!resolved.contains("widget"));
    assert!(resolved.contains(ASSET_TYPE));
}

#[test]
fn asset_pseudo_type_is_always_registered() {
    let resolved = resolve_schema(&[], &ExcludeList::default());
    let asset = resolved.get(ASSET_TYPE).expect("asset pseudo-type");
    assert!(asset.fields.is_empty());
    assert!(asset.references.is_empty());
}

#[test]
fn disabled_and_omitted_fields_are_skipped() {
    let mut internal = FieldDescriptor::scalar("internal_note", "Text");
    internal.omitted = true;
    let mut legacy = FieldDescriptor::entry_link("legacy", &["author"]);
    legacy.disabled = true;
    let model = ModelDescriptor::new(
        "article",
        vec![FieldDescriptor::scalar("title", "Symbol"), internal, legacy],
    );

    let resolved = resolve_schema(&[model], &ExcludeList::default());
    let article = resolved.get("article").unwrap();
    assert_eq!(article.fields, vec!["title"]);
    assert!(article.references.is_empty());
    assert!(!article.declares("internal_note"));
}

#[test]
fn malformed_link_validation_warns_and_falls_back_to_any() {
    let mut author = FieldDescriptor::entry_link("author", &[]);
    author.validations = vec![json!({ "linkContentType": { "oops": true } })];
    let model = ModelDescriptor::new("article", vec![author]);

    let resolved = resolve_schema(&[model], &ExcludeList::default());

    assert_eq!(
        resolved.get("article").unwrap().reference("author"),
        Some(&ReferenceSpec::Any)
    );
    assert_eq!(resolved.warnings.len(), 1);
    assert_eq!(resolved.warnings[0].content_type, "article");
    assert_eq!(resolved.warnings[0].field, "author");
}

#[test]
fn polymorphic_branch_requires_a_matching_type() {
    let model = ModelDescriptor::new(
        "page",
        vec![FieldDescriptor::entry_array("blocks", &["widget", "author"])],
    );
    let resolved = resolve_schema(&[model, widget_model(), author_model()], &ExcludeList::default());
    let spec = resolved.get("page").unwrap().reference("blocks").unwrap();

    assert_eq!(
        spec.branch_for("widget"),
        Some(&TargetFields::Inline(vec!["label".to_string()]))
    );
    assert_eq!(spec.branch_for("article"), None);
    assert!(!spec.resolves_without_entry());
}
