pub mod action;
pub mod condition;
pub mod trigger;

pub use action::{LogAction, TransformAction};
pub use condition::ConditionCapability;
pub use trigger::TriggerCapability;
