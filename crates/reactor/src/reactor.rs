// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The orchestrator.
//!
//! A [`Reactor`] owns one Lua state, the page [`Document`], the registry of
//! live [`Component`]s and a [`Transport`]. Everything runs on one thread;
//! the only suspension point is the round trip inside [`Reactor::run`].
//!
//! # Notifications
//!
//! Wrapped public functions call back into the orchestrator with
//! `(reactorComponent, reactorId)` after every call. The callback only queues
//! the pair; [`Reactor::settle`] drains the queue and reacts to each entry,
//! so Lua is never re-entered from inside a Lua call.
//!
//! # Overlapping runs
//!
//! Two round trips for the same component may be in flight at once. They
//! are not serialized: whichever completes last overwrites the state set by
//! the other.

use std::cell::{Ref, RefCell};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use mlua::{Function, Lua, Table};
use serde_json::Value as JsonValue;

use crate::codegen::Hook;
use crate::component::{component_key, ChangeStatus, Component};
use crate::config::ReactorConfig;
use crate::dom::Document;
use crate::error::{ProgramError, ReactorError};
use crate::renderer::Renderer;
use crate::request::ComponentRequest;
use crate::transport::Transport;

/// Lua side of the registry, reachable from rewritten handlers.
const REGISTRY_CHUNK: &str = r#"
REACTOR = { components = {} }

function REACTOR.getComponent(name, id)
    local key = name
    if id ~= nil and id ~= "" then
        key = name .. "_" .. id
    end
    local component = REACTOR.components[key]
    if component == nil then
        error("Component " .. key .. " is not registered", 0)
    end
    return component
end
"#;

type NotificationQueue = Rc<RefCell<VecDeque<(String, Option<String>)>>>;

/// Outcome of [`Reactor::react`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// No component under that key; logged and ignored.
    Missing,
    /// Nothing changed since the last render.
    Unchanged,
    /// Patched locally, no round trip.
    Reflowed,
    /// A server variable changed and the component was re-fetched.
    Fetched,
    /// The reaction failed; the error went to the error hooks.
    Failed,
}

enum Decision {
    Unchanged,
    Reflow,
    Fetch,
}

/// Runs components on one page.
pub struct Reactor<T: Transport> {
    lua: Rc<Lua>,
    config: ReactorConfig,
    transport: T,
    document: RefCell<Document>,
    components: RefCell<HashMap<String, Component>>,
    registry: Table,
    queue: NotificationQueue,
    notify: Function,
}

impl<T: Transport> std::fmt::Debug for Reactor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor")
            .field("config", &self.config)
            .field("components", &self.components.borrow().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Reactor<T> {
    /// Creates an orchestrator over `document`.
    pub fn new(config: ReactorConfig, transport: T, document: Document) -> Result<Self, ReactorError> {
        let lua = Rc::new(Lua::new());
        lua.load(REGISTRY_CHUNK).set_name("reactor").exec()?;
        let reactor: Table = lua.globals().get("REACTOR")?;
        let registry: Table = reactor.get("components")?;

        let queue = NotificationQueue::default();
        let sink = Rc::clone(&queue);
        let notify = lua.create_function(move |_, (name, id): (String, Option<String>)| {
            sink.borrow_mut().push_back((name, id.filter(|id| !id.is_empty())));
            Ok(())
        })?;

        Ok(Self {
            lua,
            config,
            transport,
            document: RefCell::new(document),
            components: RefCell::new(HashMap::new()),
            registry,
            queue,
            notify,
        })
    }

    /// The configuration.
    pub fn config(&self) -> &ReactorConfig {
        &self.config
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The page document.
    pub fn document(&self) -> Ref<'_, Document> {
        self.document.borrow()
    }

    /// Mutates the page document, e.g. to add mount nodes.
    pub fn with_document_mut<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        f(&mut self.document.borrow_mut())
    }

    /// Returns true if a component is registered under `name` and `id`.
    pub fn has_component(&self, name: &str, id: Option<&str>) -> bool {
        self.components.borrow().contains_key(&component_key(name, id))
    }

    /// Inspects a registered component.
    pub fn with_component<R>(&self, name: &str, id: Option<&str>, f: impl FnOnce(&Component) -> R) -> Option<R> {
        self.components.borrow().get(&component_key(name, id)).map(f)
    }

    /// Fetches and renders a component into the node with id `node`.
    ///
    /// The first run creates the component; later runs send the current
    /// server values and merge the answer. Failures are handed to the
    /// component's `onError` hook, or to the configured error hook when the
    /// component does not exist or has no hook, and then returned.
    pub async fn run(&self, name: &str, id: Option<&str>, node: &str) -> Result<(), ReactorError> {
        let result = self.round_trip(name, id, node).await;
        if let Err(e) = &result {
            self.report(&component_key(name, id), node, e);
        }
        self.settle().await;
        result
    }

    /// Reacts to a notification from component `name`/`id`.
    ///
    /// The `react` hook runs first; a truthy result keeps a server change
    /// local. A server change otherwise triggers a round trip, a client
    /// change a reflow.
    pub async fn react(&self, name: &str, id: Option<&str>) -> Reaction {
        let key = component_key(name, id);
        let decision = {
            let components = self.components.borrow();
            let Some(component) = components.get(&key) else {
                tracing::warn!(component = %key, "notification for unknown component");
                return Reaction::Missing;
            };
            decide(component).map(|decision| (decision, component.node().to_string()))
        };

        match decision {
            Ok((Decision::Unchanged, _)) => Reaction::Unchanged,
            Ok((Decision::Reflow, node)) => match self.reflow(&key) {
                Ok(()) => Reaction::Reflowed,
                Err(e) => {
                    self.report(&key, &node, &e);
                    Reaction::Failed
                }
            },
            Ok((Decision::Fetch, node)) => match self.round_trip(name, id, &node).await {
                Ok(()) => Reaction::Fetched,
                Err(e) => {
                    self.report(&key, &node, &e);
                    Reaction::Failed
                }
            },
            Err(e) => {
                let node = self
                    .with_component(name, id, |c| c.node().to_string())
                    .unwrap_or_default();
                self.report(&key, &node, &ReactorError::from(e));
                Reaction::Failed
            }
        }
    }

    /// Calls a public function of a component, then settles.
    pub async fn call(
        &self,
        name: &str,
        id: Option<&str>,
        function: &str,
        args: &[JsonValue],
    ) -> Result<JsonValue, ReactorError> {
        let key = component_key(name, id);
        let result = {
            let components = self.components.borrow();
            let component = components
                .get(&key)
                .ok_or_else(|| ReactorError::ComponentNotFound(key.clone()))?;
            component.program().call_function(function, args)
        };
        self.settle().await;
        Ok(result?)
    }

    /// Runs handler code, such as a rewritten `onclick` attribute, then settles.
    pub async fn eval_handler(&self, code: &str) -> Result<(), ReactorError> {
        let result = self.lua.load(code).set_name("handler").exec();
        self.settle().await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "event handler failed");
        }
        Ok(result?)
    }

    /// Drains pending notifications, reacting to each in order.
    pub async fn settle(&self) {
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some((name, id)) = next else {
                break;
            };
            let reaction = self.react(&name, id.as_deref()).await;
            tracing::debug!(component = %name, ?reaction, "settled notification");
        }
    }

    /// Runs the `tearDown` hook and drops the component from the registry.
    ///
    /// Returns false if nothing was registered under `name` and `id`.
    pub fn unmount(&self, name: &str, id: Option<&str>) -> Result<bool, ReactorError> {
        let key = component_key(name, id);
        let Some(component) = self.components.borrow_mut().remove(&key) else {
            return Ok(false);
        };
        self.registry.set(key.as_str(), mlua::Value::Nil)?;
        component.program().call_hook(Hook::TearDown, &[])?;
        Ok(true)
    }

    async fn round_trip(&self, name: &str, id: Option<&str>, node: &str) -> Result<(), ReactorError> {
        let key = component_key(name, id);
        let url = self.config.resolve_route(name)?.to_string();

        let mut request = ComponentRequest::new(name);
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            request = request.with_id(id);
        }
        let current = self
            .components
            .borrow()
            .get(&key)
            .map(Component::current_server_vars)
            .transpose()?;
        if let Some(vars) = current {
            request = request.with_server_vars(vars);
        }

        tracing::debug!(component = %key, url = %url, "round trip");
        let response = self.transport.fetch(&url, &request).await?;

        // the registry is looked at again: another run may have completed meanwhile
        let mut components = self.components.borrow_mut();
        let component = match components.entry(key) {
            Entry::Occupied(entry) => {
                let component = entry.into_mut();
                component.update_state_from_server(response.server_vars)?;
                component.program().call_hook(Hook::OnAfterServerChange, &[])?;
                component
            }
            Entry::Vacant(entry) => {
                let component = Component::new(
                    Rc::clone(&self.lua),
                    name,
                    id,
                    node,
                    Rc::new(response.template),
                    response.server_vars,
                    self.notify.clone(),
                )?;
                component.program().call_hook(Hook::TearUp, &[])?;
                self.registry.set(entry.key().as_str(), component.program().table().clone())?;
                entry.insert(component)
            }
        };
        self.render(component)
    }

    fn render(&self, component: &mut Component) -> Result<(), ReactorError> {
        let renderer = Renderer::new(self.config.engine());
        let report = component.render(&mut self.document.borrow_mut(), &renderer)?;
        component.highlight(&report, &|node| self.config.refresh(node))?;
        Ok(())
    }

    fn reflow(&self, key: &str) -> Result<(), ReactorError> {
        let mut components = self.components.borrow_mut();
        let component = components
            .get_mut(key)
            .ok_or_else(|| ReactorError::ComponentNotFound(key.to_string()))?;
        let renderer = Renderer::new(self.config.engine());
        let report = component.reflow(&mut self.document.borrow_mut(), &renderer)?;
        component.highlight(&report, &|node| self.config.refresh(node))?;
        Ok(())
    }

    fn report(&self, key: &str, node: &str, error: &ReactorError) {
        if let Some(component) = self.components.borrow().get(key) {
            match component
                .program()
                .call_hook(Hook::OnError, &[JsonValue::from(error.to_string())])
            {
                Ok(Some(_)) => return,
                Ok(None) => {}
                Err(e) => tracing::warn!(component = %key, error = %e, "onError hook failed"),
            }
        }
        let mut document = self.document.borrow_mut();
        self.config.on_error(error, document.element_by_id_mut(node));
    }
}

fn decide(component: &Component) -> Result<Decision, ProgramError> {
    let suppressed = component
        .program()
        .call_hook(Hook::React, &[])?
        .is_some_and(|value| !matches!(value, JsonValue::Null | JsonValue::Bool(false)));

    Ok(match component.change_status()? {
        ChangeStatus::NoChange => Decision::Unchanged,
        ChangeStatus::ServerChanged if !suppressed => {
            component.program().call_hook(Hook::OnBeforeServerChange, &[])?;
            Decision::Fetch
        }
        ChangeStatus::ServerChanged | ChangeStatus::ClientChanged => Decision::Reflow,
    })
}
