//! Binding raw `params` onto declared parameters.
//!
//! - Object: by name, then declared default, then zero value
//! - Array: positional, missing trailing slots fall back
//! - Bare scalar: the single parameter of a one-parameter method
//! - Absent or null: every parameter falls back

use crate::bridge::descriptor::{Args, ParamDescriptor};
use crate::bridge::naming::to_camel_case;
use crate::error::RpcError;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which property name is tried first when binding an object argument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NameMatchOrder {
    /// `userId` before `user_id`.
    #[default]
    CamelCaseFirst,
    /// `user_id` before `userId`.
    ExactFirst,
}

pub fn bind_arguments(
    params: &[ParamDescriptor],
    raw: Option<&Value>,
    order: NameMatchOrder,
) -> Result<Args, RpcError> {
    let declared: Vec<&ParamDescriptor> = params.iter().filter(|p| !p.is_cancellation()).collect();
    if declared.is_empty() {
        return Ok(Args::default());
    }

    let values = match raw {
        None | Some(Value::Null) => declared.iter().map(|p| p.fallback()).collect(),
        Some(Value::Object(object)) => declared
            .iter()
            .map(|p| named(object, p, order).unwrap_or_else(|| p.fallback()))
            .collect(),
        Some(Value::Array(items)) => declared
            .iter()
            .enumerate()
            .map(|(index, p)| items.get(index).cloned().unwrap_or_else(|| p.fallback()))
            .collect(),
        Some(scalar) if declared.len() == 1 => vec![scalar.clone()],
        Some(scalar) => {
            return Err(RpcError::internal(format!(
                "Cannot bind {} to {} parameters; use an object or array",
                kind_of(scalar),
                declared.len()
            )));
        }
    };

    Ok(Args::new(values))
}

fn named(object: &Map<String, Value>, param: &ParamDescriptor, order: NameMatchOrder) -> Option<Value> {
    let camel = to_camel_case(param.name);
    let (first, second) = match order {
        NameMatchOrder::CamelCaseFirst => (camel.as_str(), param.name),
        NameMatchOrder::ExactFirst => (param.name, camel.as_str()),
    };
    object.get(first).or_else(|| object.get(second)).cloned()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        _ => "a value",
    }
}
