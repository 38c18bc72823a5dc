use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub usage_count: i32,
    pub usage_limit_monthly: i32,
    pub usage_reset_at: DateTime<Utc>,
}

impl UsageSnapshot {
    pub fn is_exhausted(&self) -> bool {
        self.usage_count >= self.usage_limit_monthly
    }
}

/// First instant (UTC) of the calendar month following `now`.
pub fn next_usage_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };

    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_reset_is_first_instant_of_following_month() {
        let now = Utc.with_ymd_and_hms(2025, 3, 17, 13, 45, 2).unwrap();
        assert_eq!(
            next_usage_reset(now),
            Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn next_reset_rolls_over_year() {
        let now = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(
            next_usage_reset(now),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn exhausted_when_count_reaches_limit() {
        let snapshot = UsageSnapshot {
            usage_count: 5,
            usage_limit_monthly: 5,
            usage_reset_at: Utc::now(),
        };
        assert!(snapshot.is_exhausted());
    }
}
