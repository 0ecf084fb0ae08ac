mod common;

use common::bodies::json_body;
use common::fixtures::{compose, fresh_linker, Catalogue, Orders};
use halrouter::api::{MethodApi, ServerApi};
use halrouter::app::{App, Flow, Request};
use halrouter::linker::Linker;
use halrouter::server::Server;
use halrouter::template::Params;
use serde_json::json;
use std::sync::Arc;

fn params(pairs: &[(&str, &str)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn hrefs(linker: &Linker, params: &Params, rel: &str) -> Vec<String> {
    linker.resolve(params, rel, |_, entry, _| entry.href.clone())
}

#[test]
fn test_item_rel_resolves_after_composition() {
    let linker = fresh_linker();
    let catalogue = compose(Catalogue, &linker);
    assert!(hrefs(&linker, &params(&[("id", "42")]), "items:item").is_empty());

    catalogue.app();
    let found = linker.resolve(&params(&[("id", "42")]), "items:item", |owner, entry, descriptor| {
        (owner, entry.href.clone(), descriptor.href().to_string())
    });
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, catalogue.id());
    assert_eq!(found[0].1, "/items/42");
    assert_eq!(found[0].2, "/items/:id");
}

#[test]
fn test_expansion_is_repeatable() {
    let linker = fresh_linker();
    compose(Catalogue, &linker).app();
    let p = params(&[("id", "a b")]);
    let first = hrefs(&linker, &p, "items:item");
    let second = hrefs(&linker, &p, "items:item");
    assert_eq!(first, vec!["/items/a%20b"]);
    assert_eq!(first, second);
}

#[test]
fn test_every_get_route_satisfies_self() {
    let linker = fresh_linker();
    compose(Catalogue, &linker).app();
    let selfs = hrefs(&linker, &params(&[("id", "1")]), "items:self");
    assert_eq!(selfs, vec!["/items/1", "/items"]);
}

#[test]
fn test_unknown_rel_is_empty() {
    let linker = fresh_linker();
    compose(Catalogue, &linker).app();
    assert!(hrefs(&linker, &Params::new(), "items:nothing").is_empty());
    assert!(hrefs(&linker, &Params::new(), "nowhere:item").is_empty());
}

struct Extended;

impl Server for Extended {
    fn api() -> ServerApi<Self> {
        ServerApi::new("Extended")
            .include(
                ServerApi::new("Base").provides("items").method(
                    MethodApi::new("get_item")
                        .get("/items/:id")
                        .provides("item")
                        .handler(|_, ex| {
                            ex.res.send("base");
                            Ok(Flow::Done)
                        }),
                ),
            )
            .method(
                MethodApi::new("get_item")
                    .get("/v2/items/:id")
                    .provides("item")
                    .handler(|_, ex| {
                        ex.res.send("extended");
                        Ok(Flow::Done)
                    }),
            )
    }
}

#[test]
fn test_overriding_declarations_append() {
    let linker = fresh_linker();
    let server = compose(Extended, &linker);
    let app = server.app();

    assert_eq!(
        hrefs(&linker, &params(&[("id", "7")]), "items:item"),
        vec!["/items/7", "/v2/items/7"]
    );
    // The override's implementation serves both routes
    assert_eq!(app.dispatch(Request::get("/items/7")).body_text(), "extended");
    assert_eq!(app.dispatch(Request::get("/v2/items/7")).body_text(), "extended");
}

struct Restated;

impl Server for Restated {
    fn api() -> ServerApi<Self> {
        let get_item = || {
            MethodApi::<Restated>::new("get_item")
                .get("/items/:id")
                .provides("item")
        };
        ServerApi::new("Restated")
            .include(
                ServerApi::new("Base")
                    .provides("items")
                    .method(get_item().handler(|_, ex| {
                        ex.res.send("base");
                        Ok(Flow::Done)
                    })),
            )
            .method(get_item().handler(|_, ex| {
                ex.res.send("restated");
                Ok(Flow::Done)
            }))
    }
}

#[test]
fn test_identical_override_registers_twice() {
    let linker = fresh_linker();
    let server = compose(Restated, &linker);
    let app = server.app();

    assert_eq!(
        hrefs(&linker, &params(&[("id", "7")]), "items:item"),
        vec!["/items/7", "/items/7"]
    );
    assert_eq!(app.routes().len(), 2, "one item route plus the docs route");
    assert_eq!(app.dispatch(Request::get("/items/7")).body_text(), "restated");
}

#[test]
fn test_link_callback_applies_at_resolution_time() {
    let linker = fresh_linker();
    let catalogue = compose(Catalogue, &linker);
    catalogue.app();
    let p = params(&[("id", "1")]);

    let before = hrefs(&linker, &p, "items:item");
    linker.set_link_callback(catalogue.id(), |mut entry| {
        entry.href = format!("https://cdn.example{}", entry.href);
        entry
    });
    let during = hrefs(&linker, &p, "items:item");
    linker.set_link_callback(catalogue.id(), |mut entry| {
        entry.href = format!("/mirror{}", entry.href);
        entry
    });
    let after = hrefs(&linker, &p, "items:item");

    assert_eq!(before, vec!["/items/1"]);
    assert_eq!(during, vec!["https://cdn.example/items/1"]);
    assert_eq!(after, vec!["/mirror/items/1"]);
}

#[test]
fn test_mounting_after_registration_prefixes_links() {
    let linker = fresh_linker();
    let catalogue = compose(Catalogue, &linker);
    catalogue.app();
    let p = params(&[("id", "1")]);
    assert_eq!(hrefs(&linker, &p, "items:item"), vec!["/items/1"]);

    let root = Arc::new(App::new());
    let shop = Arc::new(App::new());
    root.mount("/shop", shop.clone());
    catalogue.mount_into(&shop, "/catalogue");

    assert_eq!(hrefs(&linker, &p, "items:item"), vec!["/shop/catalogue/items/1"]);
    let res = root.dispatch(Request::get("/shop/catalogue/items/1"));
    assert_eq!(res.status, 200);
    assert_eq!(json_body(&res)["_links"]["self"]["href"], "/shop/catalogue/items/1");
}

#[test]
fn test_servers_link_across_namespaces() {
    let linker = fresh_linker();
    let root = Arc::new(App::new());
    compose(Catalogue, &linker).mount_into(&root, "/catalogue");
    compose(Orders, &linker).mount_into(&root, "/orders-api");

    let res = root.dispatch(Request::get("/orders-api/orders/5"));
    assert_eq!(res.status, 200);
    assert_eq!(res.get_header("content-type"), Some("application/hal+json"));
    let body = json_body(&res);
    assert_eq!(body["order"], "5");
    assert_eq!(body["_links"]["self"], json!({ "href": "/orders-api/orders/5" }));
    assert_eq!(
        body["_links"]["items:item"],
        json!({ "href": "/catalogue/items/sku-1", "title": "Item" })
    );
    assert_eq!(
        body["_links"]["curies"],
        json!([{ "href": "/catalogue/docs/items/{rel}", "templated": true, "name": "items" }])
    );
}

#[test]
fn test_servers_register_in_first_seen_order() {
    let linker = fresh_linker();
    let orders = compose(Orders, &linker);
    let catalogue = compose(Catalogue, &linker);
    orders.app();
    catalogue.app();
    let ids: Vec<_> = linker.servers().iter().map(|s| s.id()).collect();
    assert_eq!(ids, vec![orders.id(), catalogue.id()]);
    assert_eq!(linker.namespaces(catalogue.id()), vec!["items"]);
}
