//! Safe arithmetic/comparison expression evaluation for template value nodes.
//!
//! Uses `rhai`'s expression-only evaluator (no statements, no assignment)
//! scoped to the template's parameter+variable context, so an expression
//! field can reference names but cannot mutate anything or run a loop.

use std::collections::HashMap;

use rand::Rng;
use rhai::{Dynamic, Engine, Scope};

use crate::error::TemplateError;

use super::template::ValueNode;

pub struct ExprEngine {
    engine: Engine,
}

impl ExprEngine {
    pub fn new() -> Self {
        Self { engine: Engine::new() }
    }

    pub fn eval_number(&self, expr: &str, context: &HashMap<String, f64>) -> Result<f64, TemplateError> {
        let mut scope = Scope::new();
        for (name, value) in context {
            scope.push(name.clone(), *value);
        }
        let result: Dynamic = self
            .engine
            .eval_expression_with_scope(&mut scope, expr)
            .map_err(|e| TemplateError::BadExpression(e.to_string()))?;

        if let Some(v) = result.clone().try_cast::<f64>() {
            Ok(v)
        } else if let Some(v) = result.clone().try_cast::<i64>() {
            Ok(v as f64)
        } else if let Some(v) = result.try_cast::<bool>() {
            Ok(if v { 1.0 } else { 0.0 })
        } else {
            Err(TemplateError::BadExpression(expr.to_string()))
        }
    }

    pub fn resolve(&self, node: &ValueNode, context: &HashMap<String, f64>) -> Result<f64, TemplateError> {
        match node {
            ValueNode::Literal(value) => value.as_f64().ok_or_else(|| TemplateError::BadExpression(format!("{value} is not numeric"))),
            ValueNode::RandomFloat { random_float: [lo, hi] } => Ok(rand::thread_rng().gen_range(*lo..=*hi)),
            ValueNode::RandomInt { random_int: [lo, hi] } => Ok(rand::thread_rng().gen_range(*lo..=*hi) as f64),
            ValueNode::Expr { expr } => self.eval_number(expr, context),
        }
    }
}

impl Default for ExprEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_passes_through() {
        let engine = ExprEngine::new();
        let ctx = HashMap::new();
        assert_eq!(engine.resolve(&ValueNode::Literal(serde_json::json!(2.5)), &ctx).unwrap(), 2.5);
    }

    #[test]
    fn expression_references_context() {
        let engine = ExprEngine::new();
        let mut ctx = HashMap::new();
        ctx.insert("base".to_string(), 10.0);
        let node = ValueNode::Expr { expr: "base * 2.0".to_string() };
        assert_eq!(engine.resolve(&node, &ctx).unwrap(), 20.0);
    }

    #[test]
    fn random_float_stays_within_range() {
        let engine = ExprEngine::new();
        let ctx = HashMap::new();
        let node = ValueNode::RandomFloat { random_float: [1.0, 2.0] };
        let v = engine.resolve(&node, &ctx).unwrap();
        assert!((1.0..=2.0).contains(&v));
    }
}
