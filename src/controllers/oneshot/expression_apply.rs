//! Applies a configured list of expression activations/deactivations on demand.

use async_trait::async_trait;
use tracing::warn;

use crate::controllers::{ControllerContext, OneShotArgs, OneShotController};
use crate::error::AvatarError;

pub struct ExpressionApplyController;

impl ExpressionApplyController {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExpressionApplyController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OneShotController for ExpressionApplyController {
    fn name(&self) -> &str {
        "ExpressionApply"
    }

    async fn execute(&self, ctx: &ControllerContext, args: OneShotArgs) -> Result<(), AvatarError> {
        let expressions = match args {
            OneShotArgs::ExpressionApply { expressions } => expressions,
            _ => return Ok(()),
        };

        for (file, active) in expressions {
            if let Err(err) = ctx.avatar.activate_expression(&file, active).await {
                warn!(expression = %file, %err, "failed to apply expression");
            }
        }
        Ok(())
    }
}
