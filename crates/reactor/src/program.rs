// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Running component programs.
//!
//! A [`ProgramInstance`] wraps the capability table returned by a
//! synthesized program. Every name is checked against the declaration lists
//! before the program is entered, so unknown names surface as typed errors
//! rather than Lua runtime errors.

use std::rc::Rc;

use mlua::{Function, Lua, Result as LuaResult, Table, Value, Variadic};
use serde_json::Value as JsonValue;

use crate::codegen::{is_identity_var, Hook};
use crate::error::ProgramError;
use crate::mustache::VarMap;
use crate::template::Template;

/// One live instance of a component program.
pub struct ProgramInstance {
    lua: Rc<Lua>,
    component: String,
    table: Table,
    server_vars: Vec<String>,
    client_vars: Vec<String>,
    functions: Vec<String>,
    declared: Vec<String>,
}

impl std::fmt::Debug for ProgramInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramInstance")
            .field("component", &self.component)
            .field("server_vars", &self.server_vars)
            .field("client_vars", &self.client_vars)
            .field("functions", &self.functions)
            .finish()
    }
}

impl ProgramInstance {
    /// Evaluates the program of `template` with `server_vars` embedded.
    ///
    /// `notify` is handed to the program factory; wrapped public functions
    /// call it with `(reactorComponent, reactorId)` after every call.
    pub fn instantiate(
        lua: Rc<Lua>,
        component: &str,
        template: &Template,
        server_vars: &VarMap,
        notify: Function,
    ) -> Result<Self, ProgramError> {
        let source = template.instantiate_source(server_vars);
        let instantiate_error = |e: mlua::Error| ProgramError::Instantiate {
            component: template.name().to_string(),
            message: e.to_string(),
        };

        let factory: Function = lua
            .load(&source)
            .set_name(template.name())
            .eval()
            .map_err(instantiate_error)?;
        let table: Table = factory.call(notify).map_err(instantiate_error)?;

        let names = |key: &str| -> Result<Vec<String>, ProgramError> {
            let list: Function = table.get(key)?;
            Ok(list.call(())?)
        };
        let server_vars = names("_reactorGetServerVarNames")?;
        let client_vars = names("_reactorGetClientVarNames")?;
        let functions = names("_reactorGetFunctionNames")?;
        let declared = names("_reactorGetDeclaredFunctionNames")?;

        Ok(Self {
            lua,
            component: component.to_string(),
            table,
            server_vars,
            client_vars,
            functions,
            declared,
        })
    }

    /// Server variable names, identity variables included.
    pub fn server_var_names(&self) -> &[String] {
        &self.server_vars
    }

    /// Client variable names.
    pub fn client_var_names(&self) -> &[String] {
        &self.client_vars
    }

    /// Public function names.
    pub fn function_names(&self) -> &[String] {
        &self.functions
    }

    /// Returns true if `name` is a server variable.
    pub fn is_server_var(&self, name: &str) -> bool {
        self.server_vars.iter().any(|n| n == name)
    }

    /// Current value of a server or client variable.
    pub fn get_var(&self, name: &str) -> Result<JsonValue, ProgramError> {
        if !self.is_server_var(name) && !self.client_vars.iter().any(|n| n == name) {
            return Err(ProgramError::UnknownVariable {
                component: self.component.clone(),
                name: name.to_string(),
            });
        }
        let getter: Function = self.table.get("_reactorGetVarValue")?;
        let value: Value = getter.call(name)?;
        Ok(lua_to_json(&value)?)
    }

    /// Full variable mapping, server variables first.
    pub fn state(&self) -> Result<VarMap, ProgramError> {
        let mut state = VarMap::new();
        for name in self.server_vars.iter().chain(&self.client_vars) {
            state.insert(name.clone(), self.get_var(name)?);
        }
        Ok(state)
    }

    /// Assigns a server variable. The identity variables are accepted and ignored.
    pub fn set_server_var(&self, name: &str, value: &JsonValue) -> Result<(), ProgramError> {
        if is_identity_var(name) {
            return Ok(());
        }
        if !self.is_server_var(name) {
            return Err(ProgramError::UnknownServerVariable {
                component: self.component.clone(),
                name: name.to_string(),
            });
        }
        let setter: Function = self.table.get("_reactorSetServerVar")?;
        setter.call::<()>((name, json_to_lua(&self.lua, value)?))?;
        Ok(())
    }

    /// Calls a declared function (public, private or hook) by name.
    ///
    /// Public functions notify the orchestrator; callers drain the queue.
    pub fn call_function(&self, name: &str, args: &[JsonValue]) -> Result<JsonValue, ProgramError> {
        if !self.declared.iter().any(|n| n == name) {
            return Err(ProgramError::UnknownFunction {
                component: self.component.clone(),
                name: name.to_string(),
            });
        }
        let mut call_args = vec![Value::String(self.lua.create_string(name)?)];
        for arg in args {
            call_args.push(json_to_lua(&self.lua, arg)?);
        }
        let dispatch: Function = self.table.get("_reactorCallFunction")?;
        let result: Value = dispatch.call(Variadic::from_iter(call_args))?;
        Ok(lua_to_json(&result)?)
    }

    /// Invokes `hook` if the script defines it.
    ///
    /// Returns `None` when the hook is not defined so the caller can apply
    /// its default, otherwise the hook's first return value.
    pub fn call_hook(&self, hook: Hook, args: &[JsonValue]) -> Result<Option<JsonValue>, ProgramError> {
        let mut call_args = vec![Value::String(self.lua.create_string(hook.name())?)];
        for arg in args {
            call_args.push(json_to_lua(&self.lua, arg)?);
        }
        let dispatch: Function = self.table.get("_reactorCallHook")?;
        let results: Variadic<Value> = dispatch.call(Variadic::from_iter(call_args))?;

        match results.first() {
            Some(Value::Boolean(true)) => Ok(Some(lua_to_json(results.get(1).unwrap_or(&Value::Nil))?)),
            _ => Ok(None),
        }
    }

    /// The capability table, exposed to Lua through `REACTOR.getComponent`.
    pub fn table(&self) -> &Table {
        &self.table
    }
}

/// Converts a JSON value to a Lua value.
pub fn json_to_lua(lua: &Lua, json: &JsonValue) -> LuaResult<Value> {
    Ok(match json {
        JsonValue::Null => Value::Nil,
        JsonValue::Bool(b) => Value::Boolean(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Number(f)
            } else {
                Value::Nil
            }
        }
        JsonValue::String(s) => Value::String(lua.create_string(s)?),
        JsonValue::Array(arr) => {
            let table = lua.create_table()?;
            for (i, v) in arr.iter().enumerate() {
                table.set(i + 1, json_to_lua(lua, v)?)?;
            }
            Value::Table(table)
        }
        JsonValue::Object(obj) => {
            let table = lua.create_table()?;
            for (k, v) in obj {
                table.set(k.as_str(), json_to_lua(lua, v)?)?;
            }
            Value::Table(table)
        }
    })
}

/// Deepest table nesting [`lua_to_json`] accepts.
pub const MAX_TABLE_DEPTH: usize = 64;

/// Converts a Lua value to JSON.
///
/// Tables with keys `1..n` become arrays. An empty table is read as an empty
/// list, so `local items = {}` stays falsy in sections. Functions and userdata
/// become null. Tables nested deeper than [`MAX_TABLE_DEPTH`], cyclic ones
/// included, are an error.
pub fn lua_to_json(value: &Value) -> LuaResult<JsonValue> {
    to_json(value, 0)
}

fn to_json(value: &Value, depth: usize) -> LuaResult<JsonValue> {
    Ok(match value {
        Value::Nil => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Integer(i) => JsonValue::Number((*i).into()),
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::String(s) => JsonValue::String(s.to_str()?.to_string()),
        Value::Table(_) if depth >= MAX_TABLE_DEPTH => {
            return Err(mlua::Error::RuntimeError(format!(
                "table nested deeper than {} levels",
                MAX_TABLE_DEPTH
            )));
        }
        Value::Table(t) => {
            let mut is_array = true;
            let mut max_index = 0i64;
            let mut count = 0i64;
            for pair in t.clone().pairs::<Value, Value>() {
                let (key, _) = pair?;
                count += 1;
                match key {
                    Value::Integer(i) if i > 0 => max_index = max_index.max(i),
                    _ => {
                        is_array = false;
                        break;
                    }
                }
            }

            if is_array && max_index == count {
                let mut arr = Vec::with_capacity(max_index as usize);
                for i in 1..=max_index {
                    let v: Value = t.get(i)?;
                    arr.push(to_json(&v, depth + 1)?);
                }
                JsonValue::Array(arr)
            } else {
                let mut map = serde_json::Map::new();
                for pair in t.clone().pairs::<Value, Value>() {
                    let (key, val) = pair?;
                    let key = match key {
                        Value::String(s) => s.to_str()?.to_string(),
                        Value::Integer(i) => i.to_string(),
                        _ => continue,
                    };
                    map.insert(key, to_json(&val, depth + 1)?);
                }
                JsonValue::Object(map)
            }
        }
        _ => JsonValue::Null,
    })
}
