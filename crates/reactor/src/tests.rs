// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use crate::markup::SECTION_TAG;
use crate::*;
use serde_json::json;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const COUNTER: &str = r#"<script>
function increment()
    count = count + 1
end
</script>
<style>
button { font-weight: bold; }
</style>
<button onclick="increment()">{{count}}</button>"#;

const MENU: &str = r#"<script>
local open = false
local label = "Menu"
function toggle()
    open = not open
end
function rename(value)
    label = value
end
</script>
<nav><h1>{{label}}</h1>{{#open}}<ul>{{#items}}<li>{{name}}</li>{{/items}}</ul>{{/open}}</nav>"#;

fn server() -> ComponentServer {
    let mut server = ComponentServer::new();
    server.register(ComponentDefinition::new("Counter", COUNTER).with_var("count", 0));
    server.register(
        ComponentDefinition::new("Menu", MENU).with_var("items", json!([{"name": "Home"}, {"name": "About"}])),
    );
    server
}

fn reactor_with(config: ReactorConfig, body: &str) -> Reactor<InProcessTransport> {
    let document = Document::from_body(body).unwrap();
    Reactor::new(config, InProcessTransport::new(Arc::new(server())), document).unwrap()
}

fn config() -> ReactorConfig {
    ReactorConfig::builder().engine(Mustache).refresh(|_| {}).build().unwrap()
}

fn text(document: &Document, id: &str) -> String {
    document.element_by_id(id).unwrap().text_content()
}

fn onclick(document: &Document, id: &str) -> String {
    document.element_by_id(id).unwrap().elements_by_tag("button")[0]
        .attribute("onclick")
        .unwrap()
        .to_string()
}

#[cfg(test)]
mod compile_tests {
    use super::*;

    #[test]
    fn test_single_section_compiles_to_one_marker() {
        let template = compile("Demo", "{{#shown}}Hi{{/shown}}", &[]).unwrap();
        let mut root = Element::new("body");
        root.set_inner_html(template.markup()).unwrap();

        let sections = root.elements_by_tag(SECTION_TAG);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].attribute("var"), Some("shown"));
        assert_eq!(sections[0].attribute("op"), Some("#"));
        assert_eq!(sections[0].attribute("depth"), Some("1"));
        assert_eq!(sections[0].inner_html(), "{{#shown}}Hi{{/shown}}");
    }

    #[test]
    fn test_clean_markup_undoes_annotation() {
        let template = compile("Counter", COUNTER, &["count".to_string()]).unwrap();
        assert_eq!(
            template.clean_markup().unwrap(),
            "<button onclick=\"increment()\">{{count}}</button>"
        );
        assert_eq!(
            template.original_script().map(str::trim),
            Some("function increment()\n    count = count + 1\nend")
        );
    }

    #[test]
    fn test_wire_shape() {
        let template = compile("Counter", COUNTER, &["count".to_string()]).unwrap();
        let value = serde_json::to_value(&template).unwrap();
        assert_eq!(value["component"], json!("Counter"));
        assert!(value["cssCode"].as_str().unwrap().contains("font-weight"));
        assert!(value["jsCode"].as_str().unwrap().contains("{{{count}}}"));

        let decoded: Template = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, template);
    }

    #[test]
    fn test_redeclared_server_variable() {
        let err = compile("Counter", "<script>\nlocal count = 1\n</script>{{#open}}", &["count".to_string()]).unwrap_err();
        assert!(matches!(err, CompileError::ServerVariableRedeclared { ref name, .. } if name == "count"));
    }
}

#[cfg(test)]
mod runtime_tests {
    use super::*;

    #[tokio::test]
    async fn test_counter_click_round_trips() {
        let reactor = reactor_with(config(), "<div id=\"counter\"></div>");
        reactor.run("Counter", None, "counter").await.unwrap();
        assert_eq!(text(&reactor.document(), "counter"), "0");
        assert!(reactor.document().has_style("Counter"));

        let handler = onclick(&reactor.document(), "counter");
        assert_eq!(handler, "REACTOR.getComponent('Counter', '').increment()");
        reactor.eval_handler(&handler).await.unwrap();
        reactor.eval_handler(&handler).await.unwrap();

        assert_eq!(text(&reactor.document(), "counter"), "2");
        let count = reactor.with_component("Counter", None, |c| c.server_vars()["count"].clone());
        assert_eq!(count, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_instances_are_isolated() {
        let reactor = reactor_with(config(), "<div id=\"a\"></div><div id=\"b\"></div>");
        reactor.run("Counter", Some("a"), "a").await.unwrap();
        reactor.run("Counter", Some("b"), "b").await.unwrap();

        let handler = onclick(&reactor.document(), "b");
        assert_eq!(handler, "REACTOR.getComponent('Counter', 'b').increment()");
        reactor.eval_handler(&handler).await.unwrap();

        assert_eq!(text(&reactor.document(), "a"), "0");
        assert_eq!(text(&reactor.document(), "b"), "1");
        assert!(reactor.document().has_style("Counter_a"));
        assert!(reactor.document().has_style("Counter_b"));
    }

    #[tokio::test]
    async fn test_client_section_toggle_stays_local() {
        let reactor = reactor_with(config(), "<div id=\"menu\"></div>");
        reactor.run("Menu", None, "menu").await.unwrap();
        assert_eq!(text(&reactor.document(), "menu"), "Menu");

        reactor.call("Menu", None, "toggle", &[]).await.unwrap();
        assert_eq!(text(&reactor.document(), "menu"), "MenuHomeAbout");

        reactor.call("Menu", None, "rename", &[json!("Site")]).await.unwrap();
        assert_eq!(text(&reactor.document(), "menu"), "SiteHomeAbout");

        reactor.call("Menu", None, "toggle", &[]).await.unwrap();
        assert_eq!(text(&reactor.document(), "menu"), "Site");
    }

    #[tokio::test]
    async fn test_second_name_of_a_local_is_tracked() {
        let mut server = ComponentServer::new();
        server.register(ComponentDefinition::new(
            "Tapper",
            "<script>\nlocal label, taps = \"Taps\", 0\nfunction tap()\n    taps = taps + 1\nend\n</script>\n<p>{{label}}: {{taps}}</p>",
        ));
        let document = Document::from_body("<div id=\"tapper\"></div>").unwrap();
        let reactor = Reactor::new(config(), InProcessTransport::new(Arc::new(server)), document).unwrap();

        reactor.run("Tapper", None, "tapper").await.unwrap();
        reactor.call("Tapper", None, "tap", &[]).await.unwrap();
        assert_eq!(text(&reactor.document(), "tapper"), "Taps: 1");
    }

    #[tokio::test]
    async fn test_unknown_function() {
        let reactor = reactor_with(config(), "<div id=\"menu\"></div>");
        reactor.run("Menu", None, "menu").await.unwrap();
        let err = reactor.call("Menu", None, "close", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            ReactorError::Program(ProgramError::UnknownFunction { ref name, .. }) if name == "close"
        ));
    }

    #[tokio::test]
    async fn test_refresh_notifier_sees_updates() {
        let refreshed = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&refreshed);
        let config = ReactorConfig::builder()
            .engine(Mustache)
            .refresh(move |node| sink.borrow_mut().push(node.name.clone()))
            .build()
            .unwrap();
        let reactor = reactor_with(config, "<div id=\"menu\"></div>");

        reactor.run("Menu", None, "menu").await.unwrap();
        reactor.call("Menu", None, "rename", &[json!("Site")]).await.unwrap();
        assert_eq!(*refreshed.borrow(), vec!["div", "reactor"]);
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    const FRAGILE: &str = r#"<script>
local lastError = ""
function increment()
    count = count + 1
end
function onError(message)
    lastError = message
end
</script>
<p>{{count}}</p>"#;

    #[tokio::test]
    async fn test_route_not_found_goes_to_page_hook() {
        let config = ReactorConfig::builder()
            .engine(Mustache)
            .route("^Admin", "/admin")
            .refresh(|_| {})
            .build()
            .unwrap();
        let reactor = reactor_with(config, "<div id=\"counter\"></div>");

        let err = reactor.run("Counter", None, "counter").await.unwrap_err();
        assert!(matches!(err, ReactorError::RouteNotFound(ref name) if name == "Counter"));
        assert!(!reactor.has_component("Counter", None));

        // default hook paints the message
        let document = reactor.document();
        let node = document.element_by_id("counter").unwrap();
        assert!(node.inner_html().starts_with("<span style=\"color: red;\">"));
        assert!(node.text_content().contains("Route not found"));
    }

    #[tokio::test]
    async fn test_server_error_on_first_run() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let config = ReactorConfig::builder()
            .engine(Mustache)
            .refresh(|_| {})
            .on_error(move |err, node| sink.borrow_mut().push((err.to_string(), node.is_some())))
            .build()
            .unwrap();
        let reactor = reactor_with(config, "<div id=\"x\"></div>");

        assert!(reactor.run("Unknown", None, "x").await.is_err());
        assert_eq!(
            *seen.borrow(),
            vec![("Error detected on the server: Component \"Unknown\" not found".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn test_component_hook_receives_errors() {
        let mut server = server();
        server.register(ComponentDefinition::new("Fragile", FRAGILE).with_var("count", 0).with_run(|vars| {
            if vars.get("count") == Some(&json!(1)) {
                return Err("no".to_string());
            }
            Ok(())
        }));
        let page_errors = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&page_errors);
        let config = ReactorConfig::builder()
            .engine(Mustache)
            .refresh(|_| {})
            .on_error(move |_, _| *sink.borrow_mut() += 1)
            .build()
            .unwrap();
        let document = Document::from_body("<div id=\"f\"></div>").unwrap();
        let reactor = Reactor::new(config, InProcessTransport::new(Arc::new(server)), document).unwrap();

        reactor.run("Fragile", None, "f").await.unwrap();
        reactor.call("Fragile", None, "increment", &[]).await.unwrap();

        let last_error = reactor.with_component("Fragile", None, |c| c.program().get_var("lastError").unwrap());
        assert_eq!(
            last_error,
            Some(json!("Error detected on the server: Component \"Fragile\" failed: no"))
        );
        assert_eq!(*page_errors.borrow(), 0);
        // the component survives and keeps its last rendered content
        assert_eq!(text(&reactor.document(), "f"), "0");
    }

    #[tokio::test]
    async fn test_detached_node() {
        let reactor = reactor_with(config(), "<div id=\"menu\"></div>");
        reactor.run("Menu", None, "menu").await.unwrap();
        reactor.with_document_mut(|document| document.remove_element("menu"));

        // the failed reflow leaves the baseline untouched
        reactor.call("Menu", None, "toggle", &[]).await.unwrap();
        assert_eq!(reactor.react("Menu", None).await, Reaction::Failed);
        // the registry entry stays; it is the host's job to unmount it
        assert!(reactor.has_component("Menu", None));
    }

    #[tokio::test]
    async fn test_notification_for_missing_component() {
        let reactor = reactor_with(config(), "");
        assert_eq!(reactor.react("Ghost", None).await, Reaction::Missing);
    }
}

#[cfg(test)]
mod race_tests {
    use super::*;

    /// Answers immediately, then holds each response for a scripted delay.
    struct DelayedTransport {
        inner: InProcessTransport,
        delays: RefCell<VecDeque<u64>>,
    }

    impl Transport for DelayedTransport {
        async fn fetch(&self, url: &str, request: &ComponentRequest) -> std::result::Result<ComponentResponse, TransportError> {
            let delay = self.delays.borrow_mut().pop_front().unwrap_or(0);
            let response = self.inner.fetch(url, request).await;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            response
        }
    }

    #[tokio::test]
    async fn test_last_response_to_complete_wins() {
        let issued = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&issued);
        let mut server = ComponentServer::new();
        server.register(
            ComponentDefinition::new("Ticket", "<p>{{number}}</p>")
                .with_var("number", 0)
                .with_run(move |vars| {
                    let number = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    vars.insert("number".to_string(), json!(number));
                    Ok(())
                }),
        );
        let transport = DelayedTransport {
            inner: InProcessTransport::new(Arc::new(server)),
            delays: RefCell::new(VecDeque::from([50, 5])),
        };
        let document = Document::from_body("<div id=\"ticket\"></div>").unwrap();
        let reactor = Reactor::new(config(), transport, document).unwrap();

        // the first request is answered with 1 but completes after the second (2)
        let (first, second) = tokio::join!(
            reactor.run("Ticket", None, "ticket"),
            reactor.run("Ticket", None, "ticket")
        );
        first.unwrap();
        second.unwrap();

        assert_eq!(issued.load(Ordering::SeqCst), 2);
        assert_eq!(text(&reactor.document(), "ticket"), "1");
        let number = reactor.with_component("Ticket", None, |c| c.server_vars()["number"].clone());
        assert_eq!(number, Some(json!(1)));
    }
}
