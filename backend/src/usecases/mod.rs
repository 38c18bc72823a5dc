pub mod abuse_throttle;
pub mod account;
pub mod billing_webhook;
pub mod content_acquirer;
pub mod cooldown;
pub mod entitlements;
pub mod generate;
pub mod identity;
pub mod quota;
pub mod result_cache;

#[cfg(test)]
pub mod test_support;
