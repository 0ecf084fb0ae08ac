mod common;

use common::bodies::json_body;
use common::fixtures::{compose, fresh_linker, Catalogue, Orders};
use halrouter::app::{App, Request};
use halrouter::server::discovery;
use halrouter::template::compile;
use serde_json::json;
use std::sync::Arc;

#[test]
fn test_discovery_without_servers_is_empty_document() {
    let linker = fresh_linker();
    let app = App::new();
    app.get(&compile("/").unwrap(), vec![discovery(linker)]).unwrap();

    let res = app.dispatch(Request::get("/"));
    assert_eq!(res.status, 200);
    assert_eq!(res.get_header("content-type"), Some("application/hal+json"));
    assert_eq!(json_body(&res), json!({}));
}

#[test]
fn test_discovery_lists_only_discoverable_rels() {
    let linker = fresh_linker();
    let root = Arc::new(App::new());
    compose(Catalogue, &linker).mount_into(&root, "/catalogue");
    compose(Orders, &linker).mount_into(&root, "/orders");
    root.get(&compile("/").unwrap(), vec![discovery(linker.clone())]).unwrap();

    let body = json_body(&root.dispatch(Request::get("/")));
    let links = body["_links"].as_object().unwrap();

    assert_eq!(
        links["items:item"],
        json!({ "href": "/catalogue/items/:id", "templated": true, "title": "Item" })
    );
    assert_eq!(links["items:collection"], json!({ "href": "/catalogue/items" }));
    assert!(!links.contains_key("orders:order"));
    assert_eq!(
        links["curies"],
        json!([{ "href": "/catalogue/docs/items/{rel}", "templated": true, "name": "items" }])
    );
}

#[test]
fn test_discovery_sees_servers_composed_later() {
    let linker = fresh_linker();
    let root = Arc::new(App::new());
    root.get(&compile("/").unwrap(), vec![discovery(linker.clone())]).unwrap();

    assert_eq!(json_body(&root.dispatch(Request::get("/"))), json!({}));

    compose(Catalogue, &linker).app();
    let body = json_body(&root.dispatch(Request::get("/")));
    assert_eq!(body["_links"]["items:collection"]["href"], "/items");
}
