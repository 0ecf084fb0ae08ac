#![allow(dead_code)]

pub mod logging {
    use halrouter::otel::{init_logging_with_config, LogConfig};
    use std::sync::Once;

    static INIT: Once = Once::new();

    /// Install a pretty subscriber once per test binary.
    pub fn init() {
        INIT.call_once(|| {
            let mut config = LogConfig::default_dev();
            config.log_level = "warn".to_string();
            // Another test binary harness may already own the global subscriber
            let _ = init_logging_with_config(&config);
        });
    }
}

pub mod fixtures {
    use halrouter::api::{MethodApi, RelOptions, ServerApi};
    use halrouter::app::Flow;
    use halrouter::hal::LinkContext;
    use halrouter::linker::Linker;
    use halrouter::runtime_config::RuntimeConfig;
    use halrouter::server::{HalServer, Server};
    use serde_json::json;
    use std::sync::Arc;

    /// Item catalogue: owns the `items` namespace.
    pub struct Catalogue;

    impl Catalogue {
        pub fn base_api() -> ServerApi<Self> {
            ServerApi::new("Catalogue").provides("items").method(
                MethodApi::new("get_item")
                    .get("/items/:id")
                    .provides_with(
                        "item",
                        RelOptions::discoverable()
                            .with_title("Item")
                            .with_description("A single catalogue item"),
                    )
                    .hal(&["collection"])
                    .handler(|_, ex| {
                        let id = ex.req.get_path_param("id").unwrap_or_default().to_string();
                        ex.hal_json(json!({ "id": id }))
                    }),
            )
        }
    }

    impl Server for Catalogue {
        fn api() -> ServerApi<Self> {
            Catalogue::base_api().method(
                MethodApi::new("list_items")
                    .get("/items")
                    .provides_with("collection", RelOptions::discoverable())
                    .hal(&[])
                    .handler(|_, ex| ex.hal_json(json!({ "count": 0 }))),
            )
        }
    }

    /// Orders: links into the catalogue without knowing its paths.
    pub struct Orders;

    impl Server for Orders {
        fn api() -> ServerApi<Self> {
            ServerApi::new("Orders").provides("orders").method(
                MethodApi::new("get_order")
                    .get("/orders/:order")
                    .provides("order")
                    .hal(&[])
                    .handler(|_, ex| {
                        let order = ex.req.get_path_param("order").unwrap_or_default().to_string();
                        if let Some(hal) = ex.hal() {
                            hal.link("items:item", &LinkContext::default().with_param("id", "sku-1"));
                        }
                        ex.hal_json(json!({ "order": order }))
                    }),
            )
        }
    }

    pub fn fresh_linker() -> Arc<Linker> {
        Arc::new(Linker::new())
    }

    pub fn compose<S: Server>(server: S, linker: &Arc<Linker>) -> HalServer<S> {
        super::logging::init();
        HalServer::with_linker(server, linker.clone()).with_config(RuntimeConfig::default())
    }
}

pub mod bodies {
    use halrouter::app::Response;
    use serde_json::Value;

    pub fn json_body(res: &Response) -> Value {
        serde_json::from_str(&res.body_text()).unwrap()
    }
}
