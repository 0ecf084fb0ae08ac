use super::*;
use crate::app::{error_stage, stage, Exchange, Flow, Request};

struct Base;

fn noop() -> crate::app::Stage {
    stage(|_ex| Ok(Flow::Next))
}

fn base_api() -> ServerApi<Base> {
    ServerApi::new("Base")
        .provides("base")
        .method(
            MethodApi::new("get_item")
                .get("/items/:id")
                .provides("item")
                .handler(|_s, ex| {
                    ex.res.send("base");
                    Ok(Flow::Done)
                }),
        )
        .method(MethodApi::new("list").get("/items").provides("collection"))
}

#[test]
fn test_default_namespace_is_server_name() {
    let api: ServerApi<Base> = ServerApi::new("Widgets");
    let merged = api.merge();
    assert_eq!(merged.namespaces.len(), 1);
    assert_eq!(merged.namespaces[0].namespace, "Widgets");
    assert_eq!(merged.primary_namespace(), "Widgets");
}

#[test]
fn test_include_places_base_entries_first() {
    let api = ServerApi::new("Derived")
        .include(base_api())
        .provides("derived")
        .method(MethodApi::new("create").post("/items").provides("create"));
    let merged = api.merge();

    let namespaces: Vec<_> = merged.namespaces.iter().map(|n| n.namespace.as_str()).collect();
    assert_eq!(namespaces, vec!["base", "derived"]);
    let methods: Vec<_> = merged.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(methods, vec!["get_item", "list", "create"]);
    assert_eq!(merged.primary_namespace(), "base");
}

#[test]
fn test_override_appends_declarations() {
    let api = ServerApi::new("Derived").include(base_api()).method(
        MethodApi::new("get_item")
            .get("/v2/items/:id")
            .provides("item")
            .provides("latest")
            .handler(|_s, ex| {
                ex.res.send("derived");
                Ok(Flow::Done)
            }),
    );
    let merged = api.merge();
    assert_eq!(merged.methods.len(), 2);

    let get_item = merged.method("get_item").unwrap();
    let paths: Vec<_> = get_item.routes.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["/items/:id", "/v2/items/:id"]);
    let rels: Vec<_> = get_item.provides.iter().map(|p| p.rel.as_str()).collect();
    assert_eq!(rels, vec!["item", "item", "latest"]);
    let linked = |idx: usize| -> Vec<&str> {
        get_item.links_for(&get_item.routes[idx]).map(|p| p.rel.as_str()).collect()
    };
    assert_eq!(linked(0), vec!["item"]);
    assert_eq!(linked(1), vec!["item", "latest"]);

    let handler = get_item.handler.clone().unwrap();
    let mut ex = Exchange::new(Request::get("/items/1"));
    handler(&Base, &mut ex).unwrap();
    assert_eq!(ex.res.body_text(), "derived");
}

#[test]
fn test_handler_survives_undecorated_override() {
    let api = ServerApi::new("Derived")
        .include(base_api())
        .method(MethodApi::new("get_item").middleware(noop()));
    let merged = api.merge();
    let get_item = merged.method("get_item").unwrap();
    assert!(get_item.handler.is_some());
    assert_eq!(get_item.middleware.len(), 1);
}

#[test]
fn test_merge_deduplicates() {
    let shared = noop();
    let api: ServerApi<Base> = ServerApi::new("Dup")
        .provides("dup")
        .provides("dup")
        .middleware(shared.clone())
        .middleware(shared.clone())
        .middleware(noop())
        .method(
            MethodApi::new("m")
                .get("/a")
                .get("/a")
                .provides("x")
                .middleware(shared.clone())
                .filter(|_req| Ok(true)),
        )
        .method(MethodApi::new("m").get("/a").provides("x").middleware(shared));
    let merged = api.merge();
    assert_eq!(merged.namespaces.len(), 1);
    assert_eq!(merged.middleware.len(), 2);
    let m = merged.method("m").unwrap();
    assert_eq!(m.routes.len(), 1);
    assert_eq!(m.middleware.len(), 1);
    assert_eq!(m.filters.len(), 1);
    // one provision per declaration of "m"
    assert_eq!(m.provides.len(), 2);
}

#[test]
fn test_repeated_provision_in_one_declaration_is_kept_once() {
    let api: ServerApi<Base> = ServerApi::new("S").method(
        MethodApi::new("m").get("/a").provides("x").provides("x"),
    );
    assert_eq!(api.merge().methods[0].provides.len(), 1);
}

#[test]
fn test_identical_override_keeps_both_provisions() {
    let api = ServerApi::new("Derived").include(base_api()).method(
        MethodApi::new("get_item")
            .get("/items/:id")
            .provides("item")
            .handler(|_s, ex| {
                ex.res.send("derived");
                Ok(Flow::Done)
            }),
    );
    let merged = api.merge();
    let get_item = merged.method("get_item").unwrap();
    assert_eq!(get_item.routes.len(), 1);
    let rels: Vec<_> = get_item.provides.iter().map(|p| p.rel.as_str()).collect();
    assert_eq!(rels, vec!["item", "item"]);
    assert_eq!(get_item.links_for(&get_item.routes[0]).count(), 2);
}

#[test]
fn test_same_rel_with_different_options_is_kept() {
    let api: ServerApi<Base> = ServerApi::new("S").method(
        MethodApi::new("m")
            .get("/a")
            .provides("x")
            .provides_with("x", RelOptions::discoverable()),
    );
    let merged = api.merge();
    assert_eq!(merged.methods[0].provides.len(), 2);
    let discoverable: Vec<_> = merged.methods[0].discoverable_rels().collect();
    assert_eq!(discoverable, vec!["x"]);
}

#[test]
fn test_error_middleware_is_flagged() {
    let api: ServerApi<Base> = ServerApi::new("S")
        .middleware(noop())
        .error_middleware(error_stage(|_e, _ex| Ok(Flow::Next)));
    let merged = api.merge();
    let flags: Vec<_> = merged.middleware.iter().map(|m| m.is_error_handler()).collect();
    assert_eq!(flags, vec![false, true]);
}

#[test]
fn test_merge_is_stable() {
    let api = ServerApi::new("Derived").include(base_api());
    let a = api.merge();
    let b = api.merge();
    assert_eq!(format!("{:?}", a), format!("{:?}", b));
}

#[test]
fn test_namespace_auto_docs_rules() {
    assert!(NamespaceOptions::default().auto_docs());
    let explicit = NamespaceOptions {
        href: Some("/help/:rel".to_string()),
        ..Default::default()
    };
    assert!(!explicit.auto_docs());
    let forced = NamespaceOptions {
        auto: Some(true),
        ..explicit
    };
    assert!(forced.auto_docs());
}

#[test]
fn test_rel_options_deserialize_with_extra_fields() {
    let options: RelOptions = serde_json::from_value(serde_json::json!({
        "discoverable": true,
        "params": { "id": "itemId" },
        "deprecation": "https://example.com/deprecated"
    }))
    .unwrap();
    assert!(options.discoverable);
    assert_eq!(options.params.get("id").map(String::as_str), Some("itemId"));
    assert!(options.extra.contains_key("deprecation"));
}
