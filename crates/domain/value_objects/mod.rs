pub mod accounts;
pub mod counters;
pub mod entitlements;
pub mod enums;
pub mod generation;
pub mod subscription_events;
pub mod usage;
