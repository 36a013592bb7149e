pub mod blink;
pub mod body_swing;
pub mod breathing;
pub mod mouth_expression;

pub use blink::BlinkCycle;
pub use body_swing::BodySwingCycle;
pub use breathing::BreathingCycle;
pub use mouth_expression::MouthExpressionCycle;
