// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Live component instances and change classification.

use std::rc::Rc;

use mlua::{Function, Lua};
use serde_json::Value as JsonValue;

use crate::codegen::{Hook, COMPONENT_VAR, ID_VAR};
use crate::dom::Document;
use crate::error::ProgramError;
use crate::markup::{Element, REACTOR_ID_ATTR};
use crate::mustache::VarMap;
use crate::program::ProgramInstance;
use crate::renderer::{ChangeSet, ReflowReport, RenderTarget, Renderer};
use crate::template::Template;

/// How the state of a component moved since its last render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    /// Nothing differs.
    NoChange,
    /// Only client variables differ.
    ClientChanged,
    /// At least one server variable differs.
    ServerChanged,
}

/// Registry key of a component: the name, or `name_id` when an id is given.
pub fn component_key(name: &str, id: Option<&str>) -> String {
    match id {
        Some(id) if !id.is_empty() => format!("{}_{}", name, id),
        _ => name.to_string(),
    }
}

/// One template bound to one mount node and one running program.
#[derive(Debug)]
pub struct Component {
    key: String,
    name: String,
    id: Option<String>,
    node: String,
    template: Rc<Template>,
    server_vars: VarMap,
    program: ProgramInstance,
    state: VarMap,
}

impl Component {
    /// Instantiates the program of `template` for the node with id `node`.
    ///
    /// The identity variables are set from `name` and `id` before the
    /// program is evaluated.
    pub fn new(
        lua: Rc<Lua>,
        name: &str,
        id: Option<&str>,
        node: &str,
        template: Rc<Template>,
        mut server_vars: VarMap,
        notify: Function,
    ) -> Result<Self, ProgramError> {
        let key = component_key(name, id);
        server_vars.insert(COMPONENT_VAR.to_string(), JsonValue::from(name));
        server_vars.insert(ID_VAR.to_string(), JsonValue::from(id.unwrap_or("")));
        let program = ProgramInstance::instantiate(lua, &key, &template, &server_vars, notify)?;
        let state = program.state()?;

        Ok(Self {
            key,
            name: name.to_string(),
            id: id.map(str::to_string),
            node: node.to_string(),
            template,
            server_vars,
            program,
            state,
        })
    }

    /// Registry key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Component name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instance id.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// `id` attribute of the mount node.
    pub fn node(&self) -> &str {
        &self.node
    }

    /// The compiled template.
    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Server variables as last received.
    pub fn server_vars(&self) -> &VarMap {
        &self.server_vars
    }

    /// The running program.
    pub fn program(&self) -> &ProgramInstance {
        &self.program
    }

    /// Variables as of the last render (as instantiated before that).
    pub fn state(&self) -> &VarMap {
        &self.state
    }

    /// Server values to send on a re-fetch, read from the program.
    pub fn current_server_vars(&self) -> Result<VarMap, ProgramError> {
        let mut vars = VarMap::new();
        for name in self.program.server_var_names() {
            vars.insert(name.clone(), self.program.get_var(name)?);
        }
        Ok(vars)
    }

    /// Classifies the change between the baseline and the program state.
    ///
    /// A differing server variable wins over any number of client changes.
    pub fn change_status(&self) -> Result<ChangeStatus, ProgramError> {
        let current = self.program.state()?;
        let mut status = ChangeStatus::NoChange;
        for (name, old) in &self.state {
            if current.get(name) == Some(old) {
                continue;
            }
            if self.program.is_server_var(name) {
                return Ok(ChangeStatus::ServerChanged);
            }
            status = ChangeStatus::ClientChanged;
        }
        Ok(status)
    }

    /// Variables whose value differs from the baseline.
    pub fn changed_vars(&self, current: &VarMap) -> ChangeSet {
        current
            .iter()
            .filter(|(name, value)| self.state.get(*name) != Some(*value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Merges server values from a round trip into the program.
    pub fn update_state_from_server(&mut self, server_vars: VarMap) -> Result<(), ProgramError> {
        for (name, value) in &server_vars {
            self.program.set_server_var(name, value)?;
        }
        self.server_vars.extend(server_vars);
        Ok(())
    }

    /// Full render (or reflow when the component was rendered before).
    pub fn render(&mut self, document: &mut Document, renderer: &Renderer<'_>) -> Result<ReflowReport, ProgramError> {
        let current = self.program.state()?;
        let changed = self.changed_vars(&current);
        let report = renderer.render(document, self.target(&current), &changed)?;
        self.state = current;
        Ok(report)
    }

    /// Incremental patch against the baseline.
    pub fn reflow(&mut self, document: &mut Document, renderer: &Renderer<'_>) -> Result<ReflowReport, ProgramError> {
        let current = self.program.state()?;
        let changed = self.changed_vars(&current);
        let report = renderer.reflow(document, self.target(&current), &changed)?;
        self.state = current;
        Ok(report)
    }

    /// Highlights the nodes a render touched.
    ///
    /// The `highlight` hook receives the stable id (or `id` attribute) of
    /// each node; without the hook `refresh` is called instead.
    pub fn highlight(&self, report: &ReflowReport, refresh: &dyn Fn(&Element)) -> Result<(), ProgramError> {
        for element in &report.updated {
            let target = element
                .attribute(REACTOR_ID_ATTR)
                .or_else(|| element.attribute("id"))
                .map(JsonValue::from)
                .unwrap_or(JsonValue::Null);
            if self.program.call_hook(Hook::Highlight, &[target])?.is_none() {
                refresh(element);
            }
        }
        Ok(())
    }

    fn target<'a>(&'a self, vars: &'a VarMap) -> RenderTarget<'a> {
        RenderTarget {
            key: &self.key,
            node: &self.node,
            template: &self.template,
            vars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::mustache::Mustache;
    use serde_json::json;
    use std::cell::RefCell;

    const SOURCE: &str = r#"<script>
local label = "a"
function setLabel(value)
    label = value
end
function setCount(value)
    count = value
end
</script>
<p>{{label}} {{count}}</p>"#;

    fn component(document: &mut Document) -> Component {
        let template = compile("Counter", SOURCE, &["count".to_string()]).unwrap();
        let lua = Rc::new(Lua::new());
        let notify = lua.create_function(|_, (_, _): (String, String)| Ok(())).unwrap();
        let mut vars = VarMap::new();
        vars.insert("count".into(), json!(0));
        let mut component =
            Component::new(lua, "Counter", Some("1"), "counter", Rc::new(template), vars, notify).unwrap();
        component.render(document, &Renderer::new(&Mustache)).unwrap();
        component
    }

    #[test]
    fn test_component_key() {
        assert_eq!(component_key("Counter", None), "Counter");
        assert_eq!(component_key("Counter", Some("")), "Counter");
        assert_eq!(component_key("Counter", Some("3")), "Counter_3");
    }

    #[test]
    fn test_identity_vars() {
        let mut document = Document::from_body("<div id=\"counter\"></div>").unwrap();
        let component = component(&mut document);
        assert_eq!(component.key(), "Counter_1");
        assert_eq!(component.state()["reactorComponent"], json!("Counter"));
        assert_eq!(component.state()["reactorId"], json!("1"));
    }

    #[test]
    fn test_no_change() {
        let mut document = Document::from_body("<div id=\"counter\"></div>").unwrap();
        let component = component(&mut document);
        assert_eq!(component.change_status().unwrap(), ChangeStatus::NoChange);
    }

    #[test]
    fn test_client_change_reflows_only_its_var() {
        let mut document = Document::from_body("<div id=\"counter\"></div>").unwrap();
        let mut component = component(&mut document);
        component.program().call_function("setLabel", &[json!("b")]).unwrap();
        assert_eq!(component.change_status().unwrap(), ChangeStatus::ClientChanged);

        let report = component.reflow(&mut document, &Renderer::new(&Mustache)).unwrap();
        assert_eq!(report.updated.len(), 1);
        assert_eq!(report.updated[0].attribute("name"), Some("label"));
        assert_eq!(component.change_status().unwrap(), ChangeStatus::NoChange);
        assert_eq!(document.element_by_id("counter").unwrap().text_content(), "b 0");
    }

    #[test]
    fn test_server_change_takes_precedence() {
        let mut document = Document::from_body("<div id=\"counter\"></div>").unwrap();
        let component = component(&mut document);
        component.program().call_function("setLabel", &[json!("b")]).unwrap();
        component.program().call_function("setCount", &[json!(1)]).unwrap();
        assert_eq!(component.change_status().unwrap(), ChangeStatus::ServerChanged);
    }

    #[test]
    fn test_update_from_server() {
        let mut document = Document::from_body("<div id=\"counter\"></div>").unwrap();
        let mut component = component(&mut document);

        let mut same = VarMap::new();
        same.insert("count".into(), json!(0));
        component.update_state_from_server(same).unwrap();
        assert_eq!(component.change_status().unwrap(), ChangeStatus::NoChange);

        let mut next = VarMap::new();
        next.insert("count".into(), json!(1));
        component.update_state_from_server(next).unwrap();
        assert_eq!(component.server_vars()["count"], json!(1));
        assert_eq!(component.change_status().unwrap(), ChangeStatus::ServerChanged);
    }

    #[test]
    fn test_highlight_falls_back_to_refresh() {
        let mut document = Document::from_body("<div id=\"counter\"></div>").unwrap();
        let mut component = component(&mut document);
        component.program().call_function("setLabel", &[json!("c")]).unwrap();
        let report = component.reflow(&mut document, &Renderer::new(&Mustache)).unwrap();

        let refreshed = RefCell::new(Vec::new());
        component
            .highlight(&report, &|el: &Element| refreshed.borrow_mut().push(el.text_content()))
            .unwrap();
        assert_eq!(*refreshed.borrow(), vec!["c"]);
    }
}
