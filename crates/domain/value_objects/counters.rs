use std::time::Duration;

/// Result of counting one hit against a fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    pub count: u64,
    pub resets_in: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    Held { remaining: Duration },
}

/// What a gate does when its backing store cannot answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPolicy {
    Open,
    Closed,
}

impl FailPolicy {
    pub fn from_flag(fail_open: bool) -> Self {
        if fail_open {
            FailPolicy::Open
        } else {
            FailPolicy::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, FailPolicy::Open)
    }
}

/// Whole seconds left in `duration`, rounded up so a caller never retries too early.
pub fn ceil_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
