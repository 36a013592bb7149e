//! Expands named templates into concrete `animation` actions.
//!
//! Every `list`/`play` call rereads every `*.jsonc` file in the templates
//! directory — a conscious simplicity choice at human-driven call rates,
//! not cached. Duplicate names: the later-loaded file wins, with a warning.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Map;
use tracing::warn;

use crate::error::TemplateError;
use crate::scheduler::action::AnimationAction;
use crate::scheduler::{Action, ActionScheduler};

use super::expr::ExprEngine;
use super::template::{AnimationInfo, AnimationTemplate, ParamType, ValueNode};

const TEMPLATE_PRIORITY: i32 = 3;

pub struct AnimationTemplatePlayer {
    templates_dir: PathBuf,
    scheduler: Arc<ActionScheduler>,
    expr: ExprEngine,
}

impl AnimationTemplatePlayer {
    pub fn new(templates_dir: impl Into<PathBuf>, scheduler: Arc<ActionScheduler>) -> Self {
        Self { templates_dir: templates_dir.into(), scheduler, expr: ExprEngine::new() }
    }

    fn load_all(&self) -> HashMap<String, AnimationTemplate> {
        let mut templates = HashMap::new();
        let entries = match std::fs::read_dir(&self.templates_dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %self.templates_dir.display(), %err, "failed to read templates directory");
                return templates;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonc") {
                continue;
            }
            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(err) => {
                    warn!(file = %path.display(), %err, "failed to read template file");
                    continue;
                }
            };
            match json5::from_str::<AnimationTemplate>(&text) {
                Ok(template) => {
                    if templates.contains_key(&template.name) {
                        warn!(name = %template.name, file = %path.display(), "duplicate template name, later file wins");
                    }
                    templates.insert(template.name.clone(), template);
                }
                Err(err) => {
                    warn!(file = %path.display(), %err, "failed to parse template file");
                }
            }
        }
        templates
    }

    pub fn list_preformed_animations(&self) -> Vec<AnimationInfo> {
        let templates = self.load_all();
        let mut infos: Vec<AnimationInfo> = templates.values().map(AnimationInfo::from).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Resolves `name`'s template against `params` and enqueues the
    /// resulting `animation` actions. Returns the estimated completion
    /// time (max of delay+duration across emitted actions), or an error
    /// if a required parameter is missing or an expression fails.
    pub fn play(&self, name: &str, params: &Map<String, serde_json::Value>, global_delay: f64) -> Result<f64, TemplateError> {
        let templates = self.load_all();
        let template = templates.get(name).ok_or_else(|| TemplateError::NotFound(name.to_string()))?;

        let mut context: HashMap<String, f64> = HashMap::new();
        // Str-typed params never feed the numeric expression context (actions
        // only ever resolve to floats); they're kept here so a template can
        // still declare and supply one without tripping MissingParameter.
        let mut string_context: HashMap<String, String> = HashMap::new();
        for param in &template.data.params {
            let supplied = params.get(&param.name);
            match param.param_type {
                ParamType::Str => {
                    let value = supplied
                        .or(param.default.as_ref())
                        .and_then(|v| v.as_str())
                        .ok_or_else(|| TemplateError::MissingParameter(param.name.clone()))?;
                    string_context.insert(param.name.clone(), value.to_string());
                }
                ParamType::Float | ParamType::Int => {
                    let value = supplied
                        .and_then(numeric_value)
                        .or_else(|| param.default.as_ref().and_then(numeric_value))
                        .ok_or_else(|| TemplateError::MissingParameter(param.name.clone()))?;
                    context.insert(param.name.clone(), value);
                }
            }
        }

        for (name, node) in &template.data.variables {
            let value = self.expr.resolve(node, &context)?;
            context.insert(name.clone(), value);
        }

        let mut max_completion = 0.0f64;
        for action in &template.data.actions {
            let from = action.from_value.as_ref().map(|n| self.expr.resolve(n, &context)).transpose()?;
            let target = self.expr.resolve(&action.target, &context)?;
            let duration = self.expr.resolve(&action.duration, &context)?;
            let delay = global_delay + self.expr.resolve(&action.delay, &context)?;

            max_completion = max_completion.max(delay + duration);

            self.scheduler.add_action(Action::Animation(AnimationAction {
                parameter: action.parameter.clone(),
                from,
                target,
                duration,
                delay,
                easing: action.easing.clone(),
                priority: Some(TEMPLATE_PRIORITY),
            }));
        }

        Ok(max_completion)
    }
}

fn numeric_value(value: &serde_json::Value) -> Option<f64> {
    value.as_f64()
}
