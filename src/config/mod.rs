//! Container configuration documents
//!
//! Bootstrap code can describe its bindings as JSON instead of code:
//!
//! ```json
//! {
//!   "definitions": {
//!     "Connection": { "type": "SqliteConnection", "dsn": "sqlite:app.db" },
//!     "mailer": "SmtpMailer"
//!   },
//!   "singletons": {
//!     "finder": { "type": "UserFinder", "params": [{ "$ref": "Connection" }, 25] }
//!   }
//! }
//! ```
//!
//! A string definition names a type (or another identifier). An object
//! definition takes an optional `type`, an optional positional `params` array,
//! and treats every other key as a property, in document order.
//! `{"$ref": "id"}` is an [`InstanceRef`].

use crate::di::{Binding, Config, Container, InstanceRef, Params, Properties, Value};
use crate::error::{MeshweaveError, Result};
use serde::Deserialize;
use serde_json::Map;

const REF_KEY: &str = "$ref";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerConfig {
    #[serde(default)]
    definitions: Map<String, serde_json::Value>,
    #[serde(default)]
    singletons: Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum DefinitionConfig {
    Class(String),
    Config {
        #[serde(rename = "type", default)]
        type_name: Option<String>,
        #[serde(default)]
        params: Vec<serde_json::Value>,
        #[serde(flatten)]
        properties: Map<String, serde_json::Value>,
    },
}

impl ContainerConfig {
    pub fn from_json(document: &str) -> Result<Self> {
        Ok(serde_json::from_str(document)?)
    }

    pub fn from_value(document: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(document)?)
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty() && self.singletons.is_empty()
    }

    /// Register every definition, then every singleton, in document order.
    pub fn apply(&self, container: &Container) -> Result<()> {
        for (id, raw) in &self.definitions {
            let (binding, params) = parse_definition(id, raw)?;
            container.register(id, binding, params)?;
        }
        for (id, raw) in &self.singletons {
            let (binding, params) = parse_definition(id, raw)?;
            container.register_singleton(id, binding, params)?;
        }
        tracing::info!(
            "Applied container configuration: {} definition(s), {} singleton(s)",
            self.definitions.len(),
            self.singletons.len()
        );
        Ok(())
    }
}

fn parse_definition(id: &str, raw: &serde_json::Value) -> Result<(Binding, Params)> {
    let definition: DefinitionConfig = serde_json::from_value(raw.clone()).map_err(|e| {
        MeshweaveError::invalid_config(format!("definition for '{id}' is malformed: {e}"))
    })?;

    match definition {
        DefinitionConfig::Class(type_name) => Ok((Binding::Class(type_name), Params::new())),
        DefinitionConfig::Config {
            type_name,
            params,
            properties,
        } => {
            let params = params
                .into_iter()
                .map(to_value)
                .collect::<Result<Params>>()?;
            let properties = properties
                .into_iter()
                .map(|(name, value)| to_value(value).map(|v| (name, v)))
                .collect::<Result<Properties>>()?;
            Ok((
                Binding::Config(Config {
                    type_name,
                    properties,
                }),
                params,
            ))
        }
    }
}

fn to_value(json: serde_json::Value) -> Result<Value> {
    use serde_json::Value as Json;

    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::Str(s),
        Json::Array(items) => Value::List(items.into_iter().map(to_value).collect::<Result<_>>()?),
        Json::Object(map) => match map.get(REF_KEY) {
            Some(Json::String(id)) if map.len() == 1 => Value::Ref(InstanceRef::of(id.as_str())),
            _ => {
                return Err(MeshweaveError::invalid_config(
                    "nested objects are only allowed as {\"$ref\": \"<id>\"}",
                ));
            }
        },
    })
}
