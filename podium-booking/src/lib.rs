pub mod calendar;
pub mod dispatch;
pub mod engine;
pub mod rules;

pub use dispatch::NotificationDispatcher;
pub use engine::ReservationEngine;
pub use rules::{SlotRuleViolation, SlotRules};
