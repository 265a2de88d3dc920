// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Component program synthesis.
//!
//! Reads the Lua code of a component's `<script>` block, classifies its
//! top-level declarations and wraps it into a self-contained program.
//!
//! # Generated Program Structure
//!
//! ```lua
//! return function(__reactor_notify)
//!     local counter = {{{counter}}}                      -- server variables
//!     local reactorId <const> = {{{reactorId}}}          -- identity, immutable
//!     local reactorComponent <const> = {{{reactorComponent}}}
//!     local increase, react                              -- forward declarations
//!     local function __reactor_guarded(fn, ...) ... end  -- call, then notify
//!     --REACTOR_CLIENT_CODE_STARTS--
//!     ... user code ...
//!     --REACTOR_CLIENT_CODE_ENDS--
//!     return {
//!         increase = function(...) return __reactor_guarded(increase, ...) end,
//!         _reactorGetServerVarNames = function() ... end,
//!         ...
//!     }
//! end
//! ```
//!
//! The `{{{name}}}` placeholders are replaced with Lua literals when the
//! program is instantiated (see [`crate::template::Template::instantiate_source`]).
//!
//! # Declaration Rules
//!
//! Only declarations at the script's base indentation count:
//!
//! - `function f` / `local function f`: public function, unless the name
//!   starts with `_` (private) or is a [`Hook`]
//! - `local x`: client variable; redeclaring a server variable is a
//!   [`CompileError::ServerVariableRedeclared`]

use serde_json::Value as JsonValue;

use crate::error::CompileError;
use crate::indentation::base_indentation;

/// Server variable holding the component name.
pub const COMPONENT_VAR: &str = "reactorComponent";
/// Server variable holding the instance id.
pub const ID_VAR: &str = "reactorId";
/// Marks the start of user code inside a program.
pub const CLIENT_CODE_START: &str = "--REACTOR_CLIENT_CODE_STARTS--";
/// Marks the end of user code inside a program.
pub const CLIENT_CODE_END: &str = "--REACTOR_CLIENT_CODE_ENDS--";
/// Prefix marking a function as private.
pub const PRIVATE_PREFIX: &str = "_";

/// Returns true for the two identity server variables.
pub fn is_identity_var(name: &str) -> bool {
    name == COMPONENT_VAR || name == ID_VAR
}

/// Reserved lifecycle hooks a component script may define.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// Runs after every public call; a truthy return suppresses the round trip.
    React,
    /// Runs before the first render.
    TearUp,
    /// Runs when the component is unmounted.
    TearDown,
    /// Receives error messages instead of the page-level error hook.
    OnError,
    /// Replaces the refresh notifier for updated nodes.
    Highlight,
    /// Runs before a server round trip triggered by a state change.
    OnBeforeServerChange,
    /// Runs after server values were merged.
    OnAfterServerChange,
}

impl Hook {
    /// Every hook, in declaration order.
    pub const ALL: [Hook; 7] = [
        Hook::React,
        Hook::TearUp,
        Hook::TearDown,
        Hook::OnError,
        Hook::Highlight,
        Hook::OnBeforeServerChange,
        Hook::OnAfterServerChange,
    ];

    /// The function name a script uses to define the hook.
    pub fn name(self) -> &'static str {
        match self {
            Hook::React => "react",
            Hook::TearUp => "tearUp",
            Hook::TearDown => "tearDown",
            Hook::OnError => "onError",
            Hook::Highlight => "highlight",
            Hook::OnBeforeServerChange => "onBeforeServerChange",
            Hook::OnAfterServerChange => "onAfterServerChange",
        }
    }

    /// Looks a hook up by function name.
    pub fn from_name(name: &str) -> Option<Hook> {
        Hook::ALL.into_iter().find(|hook| hook.name() == name)
    }
}

/// Output of [`synthesize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// Executable program source with placeholders.
    pub source: String,
    /// Server variable names, identity variables included.
    pub server_vars: Vec<String>,
    /// Client variable names in declaration order.
    pub client_vars: Vec<String>,
    /// Public function names in declaration order.
    pub functions: Vec<String>,
    /// Hooks the script defines.
    pub hooks: Vec<Hook>,
    /// Private function names.
    pub private_functions: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Declaration {
    Function(String),
    Variable(String),
}

/// Builds the program of a component from its script block.
pub fn synthesize(component: &str, script: &str, server_vars: &[String]) -> Result<Program, CompileError> {
    let mut all_server_vars: Vec<String> = Vec::with_capacity(server_vars.len() + 2);
    for name in server_vars.iter().map(String::as_str).chain([ID_VAR, COMPONENT_VAR]) {
        if !is_valid_lua_identifier(name) {
            return Err(CompileError::InvalidVariableName {
                component: component.to_string(),
                name: name.to_string(),
            });
        }
        if !all_server_vars.iter().any(|existing| existing == name) {
            all_server_vars.push(name.to_string());
        }
    }

    let mut client_vars = Vec::new();
    let mut functions = Vec::new();
    let mut hooks = Vec::new();
    let mut private_functions = Vec::new();

    for declaration in top_level_declarations(script) {
        let name = match &declaration {
            Declaration::Function(name) | Declaration::Variable(name) => name.clone(),
        };
        if all_server_vars.contains(&name) {
            return Err(CompileError::ServerVariableRedeclared {
                component: component.to_string(),
                name,
            });
        }
        match declaration {
            Declaration::Variable(_) => push_unique(&mut client_vars, name),
            Declaration::Function(_) => {
                if let Some(hook) = Hook::from_name(&name) {
                    if !hooks.contains(&hook) {
                        hooks.push(hook);
                    }
                } else if name.starts_with(PRIVATE_PREFIX) {
                    push_unique(&mut private_functions, name);
                } else {
                    push_unique(&mut functions, name);
                }
            }
        }
    }

    let mut generator = ProgramGenerator::new(component, base_indentation(script));
    let source = generator.generate(script, &all_server_vars, &client_vars, &functions, &hooks, &private_functions);

    tracing::debug!(
        component,
        client_vars = client_vars.len(),
        functions = functions.len(),
        hooks = hooks.len(),
        "synthesized component program"
    );

    Ok(Program {
        source,
        server_vars: all_server_vars,
        client_vars,
        functions,
        hooks,
        private_functions,
    })
}

fn push_unique(list: &mut Vec<String>, name: String) {
    if !list.contains(&name) {
        list.push(name);
    }
}

/// Scans `script` for declarations at its base indentation.
fn top_level_declarations(script: &str) -> Vec<Declaration> {
    let indent = base_indentation(script);
    let mut declarations = Vec::new();

    for line in script.lines() {
        let Some(rest) = line.strip_prefix(indent) else {
            continue;
        };
        // deeper lines start with more whitespace and fall through here
        if rest.starts_with([' ', '\t']) {
            continue;
        }
        if let Some(rest) = strip_keyword(rest, "local") {
            match strip_keyword(rest, "function") {
                Some(rest) => declarations.extend(function_name(rest).map(Declaration::Function)),
                None => declarations.extend(local_names(rest).into_iter().map(Declaration::Variable)),
            }
        } else if let Some(rest) = strip_keyword(rest, "function") {
            declarations.extend(function_name(rest).map(Declaration::Function));
        }
    }
    declarations
}

/// Name of a `function` declaration; `function M.method` and
/// `function obj:method` are not declarations.
fn function_name(rest: &str) -> Option<String> {
    let name: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    let qualified = rest[name.len()..].starts_with(['.', ':']);
    (is_valid_lua_identifier(&name) && !qualified).then_some(name)
}

/// Names bound by `local a, b <const> = ...`, attributes stripped.
fn local_names(rest: &str) -> Vec<String> {
    let list = rest.split_once('=').map_or(rest, |(names, _)| names);
    let list = list.split_once("--").map_or(list, |(names, _)| names);
    list.split(',')
        .map(|name| name.split_once('<').map_or(name, |(name, _)| name).trim())
        .filter(|name| is_valid_lua_identifier(name))
        .map(str::to_string)
        .collect()
}

/// Strips `keyword` followed by at least one whitespace character.
fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    let trimmed = rest.trim_start_matches([' ', '\t']);
    (trimmed.len() < rest.len()).then_some(trimmed)
}

struct ProgramGenerator {
    component: String,
    unit: String,
    output: String,
    indent_level: usize,
}

impl ProgramGenerator {
    fn new(component: &str, base_indent: &str) -> Self {
        let unit = if base_indent.is_empty() { "    " } else { base_indent };
        Self {
            component: component.to_string(),
            unit: unit.to_string(),
            output: String::new(),
            indent_level: 0,
        }
    }

    fn generate(
        &mut self,
        script: &str,
        server_vars: &[String],
        client_vars: &[String],
        functions: &[String],
        hooks: &[Hook],
        private_functions: &[String],
    ) -> String {
        let declared: Vec<String> = functions
            .iter()
            .cloned()
            .chain(hooks.iter().map(|h| h.name().to_string()))
            .chain(private_functions.iter().cloned())
            .collect();

        self.write_line(&format!("-- Reactor component program: {}", self.component));
        self.write_line("return function(__reactor_notify)");
        self.indent();

        for name in server_vars {
            if is_identity_var(name) {
                self.write_line(&format!("local {} <const> = {{{{{{{}}}}}}}", name, name));
            } else {
                self.write_line(&format!("local {} = {{{{{{{}}}}}}}", name, name));
            }
        }
        if !declared.is_empty() {
            self.write_line(&format!("local {}", declared.join(", ")));
        }

        self.write_line("local function __reactor_guarded(fn, ...)");
        self.indent();
        self.write_line("local result = table.pack(pcall(fn, ...))");
        self.write_line(&format!("__reactor_notify({}, {})", COMPONENT_VAR, ID_VAR));
        self.write_line("if not result[1] then");
        self.indent();
        self.write_line("error(result[2], 0)");
        self.dedent();
        self.write_line("end");
        self.write_line("return table.unpack(result, 2, result.n)");
        self.dedent();
        self.write_line("end");

        self.write_line(CLIENT_CODE_START);
        self.output.push_str(script.trim_matches('\n'));
        self.output.push('\n');
        self.write_line(CLIENT_CODE_END);

        self.write_line("return {");
        self.indent();
        for name in functions {
            self.write_line(&format!(
                "{} = function(...) return __reactor_guarded({}, ...) end,",
                name, name
            ));
        }
        self.write_name_list("_reactorGetServerVarNames", server_vars);
        self.write_name_list("_reactorGetClientVarNames", client_vars);
        self.write_name_list("_reactorGetFunctionNames", functions);
        self.write_name_list("_reactorGetDeclaredFunctionNames", &declared);
        self.generate_get_var(server_vars, client_vars);
        self.generate_set_server_var(server_vars);
        self.generate_call_hook(hooks);
        self.generate_call_function(functions, hooks, private_functions);
        self.dedent();
        self.write_line("}");

        self.dedent();
        self.write_line("end");
        std::mem::take(&mut self.output)
    }

    fn write_name_list(&mut self, key: &str, names: &[String]) {
        let quoted: Vec<String> = names.iter().map(|n| lua_string_literal(n)).collect();
        self.write_line(&format!("{} = function() return {{ {} }} end,", key, quoted.join(", ")));
    }

    fn generate_get_var(&mut self, server_vars: &[String], client_vars: &[String]) {
        self.write_line("_reactorGetVarValue = function(name)");
        self.indent();
        for name in server_vars.iter().chain(client_vars) {
            self.write_line(&format!("if name == \"{}\" then return {} end", name, name));
        }
        self.write_line("return nil");
        self.dedent();
        self.write_line("end,");
    }

    fn generate_set_server_var(&mut self, server_vars: &[String]) {
        self.write_line("_reactorSetServerVar = function(name, value)");
        self.indent();
        self.write_line(&format!(
            "if name == \"{}\" or name == \"{}\" then return end",
            COMPONENT_VAR, ID_VAR
        ));
        for name in server_vars.iter().filter(|n| !is_identity_var(n)) {
            self.write_line(&format!("if name == \"{}\" then {} = value return end", name, name));
        }
        self.write_line("error(\"Undefined server variable \" .. tostring(name), 0)");
        self.dedent();
        self.write_line("end,");
    }

    fn generate_call_hook(&mut self, hooks: &[Hook]) {
        self.write_line("_reactorCallHook = function(name, ...)");
        self.indent();
        for hook in hooks {
            self.write_line(&format!(
                "if name == \"{}\" then return true, {}(...) end",
                hook.name(),
                hook.name()
            ));
        }
        self.write_line("return false");
        self.dedent();
        self.write_line("end,");
    }

    fn generate_call_function(&mut self, functions: &[String], hooks: &[Hook], private_functions: &[String]) {
        self.write_line("_reactorCallFunction = function(name, ...)");
        self.indent();
        for name in functions {
            self.write_line(&format!(
                "if name == \"{}\" then return __reactor_guarded({}, ...) end",
                name, name
            ));
        }
        let unguarded = hooks
            .iter()
            .map(|h| h.name().to_string())
            .chain(private_functions.iter().cloned());
        for name in unguarded {
            self.write_line(&format!("if name == \"{}\" then return {}(...) end", name, name));
        }
        self.write_line("error(\"Undefined function \" .. tostring(name), 0)");
        self.dedent();
        self.write_line("end,");
    }

    fn write_line(&mut self, line: &str) {
        if !line.is_empty() {
            self.output.push_str(&self.unit.repeat(self.indent_level));
        }
        self.output.push_str(line);
        self.output.push('\n');
    }

    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        if self.indent_level > 0 {
            self.indent_level -= 1;
        }
    }
}

const LUA_KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// Returns true if `name` can be used as a Lua local name.
pub fn is_valid_lua_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !LUA_KEYWORDS.contains(&name)
}

/// Quotes a string as a Lua string literal.
pub fn lua_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => out.push_str(&format!("\\{:03}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Encodes a JSON value as a Lua expression.
///
/// `null` becomes `nil`; objects become tables with bracketed string keys.
pub fn lua_literal(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "nil".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => lua_string_literal(s),
        JsonValue::Array(items) => {
            let items: Vec<String> = items.iter().map(lua_literal).collect();
            format!("{{ {} }}", items.join(", "))
        }
        JsonValue::Object(map) => {
            let fields: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("[{}] = {}", lua_string_literal(k), lua_literal(v)))
                .collect();
            format!("{{ {} }}", fields.join(", "))
        }
    }
}
