//! Declarative shapes for `*.jsonc` animation template files.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Float,
    Int,
    Str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_param_type")]
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub default: Option<Value>,
}

fn default_param_type() -> ParamType {
    ParamType::Float
}

/// A value field in a template: a literal, a random range, or a symbolic
/// expression evaluated against the parameter+variable context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueNode {
    RandomFloat { random_float: [f64; 2] },
    RandomInt { random_int: [i64; 2] },
    Expr { expr: String },
    Literal(Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionTemplate {
    pub parameter: String,
    #[serde(default, rename = "from")]
    pub from_value: Option<ValueNode>,
    pub target: ValueNode,
    pub duration: ValueNode,
    #[serde(default = "default_easing")]
    pub easing: String,
    #[serde(default = "default_delay")]
    pub delay: ValueNode,
}

fn default_easing() -> String {
    "linear".to_string()
}

fn default_delay() -> ValueNode {
    ValueNode::Literal(Value::from(0.0))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationTemplateData {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub params: Vec<ParamDef>,
    #[serde(default)]
    pub variables: HashMap<String, ValueNode>,
    pub actions: Vec<ActionTemplate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationTemplate {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: AnimationTemplateData,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnimationInfo {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamDef>,
}

impl From<&AnimationTemplate> for AnimationInfo {
    fn from(t: &AnimationTemplate) -> Self {
        Self { name: t.name.clone(), description: t.data.description.clone(), params: t.data.params.clone() }
    }
}
