pub mod expression_apply;
pub mod mouth_sync;

pub use expression_apply::ExpressionApplyController;
pub use mouth_sync::MouthSyncController;
