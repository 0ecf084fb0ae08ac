use super::*;
use crate::api::RelOptions;
use crate::app::{Exchange, Request};
use crate::ids::ServerId;
use crate::linker::{LinkOptions, LinkOwner, Linker, Owner};
use crate::template::compile;
use http::Method;
use serde_json::json;
use std::sync::Arc;

struct Items(ServerId);

impl LinkOwner for Items {
    fn id(&self) -> ServerId {
        self.0
    }

    fn name(&self) -> &str {
        "Items"
    }

    fn discoverable_rels(&self) -> Vec<String> {
        Vec::new()
    }
}

fn setup() -> (Arc<Linker>, Owner) {
    let linker = Arc::new(Linker::new());
    let owner: Owner = Arc::new(Items(ServerId::new()));
    linker.register_docs(&owner, "items", "/docs/items/:rel");
    let get = |title: Option<&str>| LinkOptions {
        verb: Method::GET,
        sibling_rels: vec![],
        rel: RelOptions {
            title: title.map(str::to_string),
            ..RelOptions::default()
        },
    };
    linker.register_link(&owner, "items:item", compile("/items/:id").unwrap(), get(Some("An item")));
    linker.register_link(&owner, "items:collection", compile("/items").unwrap(), get(None));
    (linker, owner)
}

fn request(path: &str, id: &str) -> Request {
    let mut req = Request::get(path);
    req.path_params.insert("id".to_string(), id.to_string());
    req
}

#[test]
fn test_create_links_self_and_siblings() {
    let (linker, owner) = setup();
    let rels = vec!["self".to_string(), "item".to_string(), "collection".to_string()];
    let hal = HalResponse::create(linker, Some(owner.id()), "/items/7", &rels, &request("/items/7", "7"));

    assert_eq!(hal.links("self"), &[HalLink::new("/items/7")]);
    assert_eq!(hal.links("items:item")[0].href, "/items/7");
    assert_eq!(hal.links("items:item")[0].title.as_deref(), Some("An item"));
    assert_eq!(hal.links("items:collection")[0].href, "/items");
}

#[test]
fn test_to_json_shapes_links_and_curies() {
    let (linker, owner) = setup();
    let rels = vec!["self".to_string(), "collection".to_string()];
    let hal = HalResponse::create(linker, Some(owner.id()), "/items/7", &rels, &request("/items/7", "7"));

    let doc = hal.to_json(json!({ "id": "7" }));
    assert_eq!(
        doc,
        json!({
            "id": "7",
            "_links": {
                "self": { "href": "/items/7" },
                "items:collection": { "href": "/items" },
                "curies": [{ "href": "/docs/items/{rel}", "templated": true, "name": "items" }]
            }
        })
    );
}

#[test]
fn test_unresolved_link_is_templated() {
    let (linker, owner) = setup();
    let mut hal = HalResponse::create(linker, Some(owner.id()), "/", &[], &Request::get("/"));
    assert_eq!(hal.link("item", &LinkContext::default()), 1);
    let link = &hal.links("items:item")[0];
    assert_eq!(link.href, "/items/:id");
    assert!(link.templated);
}

#[test]
fn test_unknown_rel_adds_nothing() {
    let (linker, _owner) = setup();
    let mut hal = HalResponse::create(linker, None, "/", &[], &Request::get("/"));
    assert_eq!(hal.link("items:missing", &LinkContext::default()), 0);
    assert_eq!(hal.to_json(json!({})), json!({}));
}

#[test]
fn test_multiple_links_render_as_array() {
    let (linker, owner) = setup();
    linker.register_link(
        &owner,
        "items:collection",
        compile("/v2/items").unwrap(),
        LinkOptions {
            verb: Method::GET,
            sibling_rels: vec![],
            rel: RelOptions::default(),
        },
    );
    let mut hal = HalResponse::create(linker, None, "/", &[], &Request::get("/"));
    hal.link("items:collection", &LinkContext::server(owner.id()));
    let doc = hal.to_json(json!({}));
    assert_eq!(
        doc["_links"]["items:collection"],
        json!([{ "href": "/items" }, { "href": "/v2/items" }])
    );
}

#[test]
fn test_embed_collects_repeats() {
    let (linker, _owner) = setup();
    let mut hal = HalResponse::create(linker, None, "/", &[], &Request::get("/"));
    hal.embed("items:item", json!({ "id": 1 }));
    hal.embed("items:item", json!({ "id": 2 }));
    hal.embed("other", json!("x"));
    let doc = hal.to_json(json!("plain"));
    assert_eq!(doc["value"], json!("plain"));
    assert_eq!(doc["_embedded"]["items:item"], json!([{ "id": 1 }, { "id": 2 }]));
    assert_eq!(doc["_embedded"]["other"], json!("x"));
}

#[test]
fn test_exchange_hal_json() {
    let (linker, owner) = setup();
    let mut ex = Exchange::new(Request::get("/items/7"));
    assert!(ex.hal_json(json!({})).is_err());

    let hal = HalResponse::create(linker, Some(owner.id()), "/items/7", &["self".to_string()], &ex.req);
    ex.extensions.insert(hal);
    ex.hal().unwrap().embed("note", json!("hi"));
    ex.hal_json(json!({ "id": "7" })).unwrap();

    assert_eq!(ex.res.get_header("content-type"), Some(HAL_CONTENT_TYPE));
    let body: serde_json::Value = serde_json::from_str(&ex.res.body_text()).unwrap();
    assert_eq!(body["_links"]["self"]["href"], "/items/7");
    assert_eq!(body["_embedded"]["note"], "hi");
}
