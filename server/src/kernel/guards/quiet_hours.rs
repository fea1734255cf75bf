//! Quiet-hours suppression (§4.H): within a recipient's configured quiet
//! window, only `urgent` bypasses; everything else is suppressed down to the
//! in-app channel only.

use chrono::{NaiveTime, Utc};

use crate::domains::communications::model::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Urgent,
    Normal,
    Low,
}

#[derive(Debug, Clone, Copy)]
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl QuietHours {
    /// Handles windows that wrap midnight (e.g. 22:00–07:00).
    pub fn contains(&self, at: NaiveTime) -> bool {
        if self.start <= self.end {
            at >= self.start && at < self.end
        } else {
            at >= self.start || at < self.end
        }
    }
}

pub enum QuietHoursDecision {
    Proceed { channel: Channel },
    SuppressToInApp,
}

/// Applies quiet-hours policy for `now` (caller passes the recipient's local
/// time). `urgent` always bypasses; other urgencies collapse to in-app.
pub fn apply(quiet_hours: Option<QuietHours>, urgency: Urgency, requested_channel: Channel, now_local: chrono::DateTime<Utc>) -> QuietHoursDecision {
    let Some(window) = quiet_hours else {
        return QuietHoursDecision::Proceed { channel: requested_channel };
    };

    if !window.contains(now_local.time()) {
        return QuietHoursDecision::Proceed { channel: requested_channel };
    }

    match urgency {
        Urgency::Urgent => QuietHoursDecision::Proceed { channel: requested_channel },
        Urgency::Normal | Urgency::Low => QuietHoursDecision::SuppressToInApp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32, minute: u32) -> chrono::DateTime<Utc> {
        Utc::now()
            .date_naive()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn non_wrapping_window_contains_midday() {
        let window = QuietHours {
            start: NaiveTime::from_hms_opt(1, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(5, 0, 0).unwrap(),
        };
        assert!(window.contains(NaiveTime::from_hms_opt(2, 0, 0).unwrap()));
        assert!(!window.contains(NaiveTime::from_hms_opt(6, 0, 0).unwrap()));
    }

    #[test]
    fn wrapping_window_spans_midnight() {
        let window = QuietHours {
            start: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
        };
        assert!(window.contains(NaiveTime::from_hms_opt(23, 0, 0).unwrap()));
        assert!(window.contains(NaiveTime::from_hms_opt(3, 0, 0).unwrap()));
        assert!(!window.contains(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
    }

    #[test]
    fn urgent_always_bypasses_quiet_hours() {
        let window = QuietHours {
            start: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
        };
        let decision = apply(Some(window), Urgency::Urgent, Channel::Webhook, at(3, 0));
        assert!(matches!(decision, QuietHoursDecision::Proceed { channel: Channel::Webhook }));
    }

    #[test]
    fn normal_urgency_suppressed_to_in_app_during_quiet_hours() {
        let window = QuietHours {
            start: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
        };
        let decision = apply(Some(window), Urgency::Normal, Channel::Webhook, at(3, 0));
        assert!(matches!(decision, QuietHoursDecision::SuppressToInApp));
    }

    #[test]
    fn no_quiet_hours_configured_always_proceeds() {
        let decision = apply(None, Urgency::Normal, Channel::Webhook, at(3, 0));
        assert!(matches!(decision, QuietHoursDecision::Proceed { .. }));
    }

    #[test]
    fn outside_window_proceeds_regardless_of_urgency() {
        let window = QuietHours {
            start: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
        };
        let decision = apply(Some(window), Urgency::Low, Channel::Webhook, at(12, 0));
        assert!(matches!(decision, QuietHoursDecision::Proceed { .. }));
    }
}
