use crate::domain::value_objects::subscription_events::BillingEventKind;

/// Subject and body of a billing notification email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingEmail {
    pub subject: String,
    pub text: String,
}

pub fn billing_email(kind: BillingEventKind, display_name: Option<&str>) -> Option<BillingEmail> {
    let greeting = match display_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => format!("Hi {name},"),
        None => "Hi there,".to_string(),
    };

    let (subject, body) = match kind {
        BillingEventKind::SubscriptionEnded => (
            "Your Creator subscription has ended",
            "Your Creator subscription has expired and your account is back on the Free plan. \
             You can resubscribe at any time to restore URL input, regeneration and higher limits.",
        ),
        BillingEventKind::PaymentSucceeded => (
            "Payment received, thank you",
            "We received your subscription payment. Your Creator plan stays active.",
        ),
        BillingEventKind::PaymentFailed => (
            "We couldn't process your payment",
            "Your latest subscription payment failed. Please update your payment method \
             to keep your Creator plan active.",
        ),
        BillingEventKind::SubscriptionChanged | BillingEventKind::Unhandled => return None,
    };

    Some(BillingEmail {
        subject: subject.to_string(),
        text: format!("{greeting}\n\n{body}\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifying_kinds_have_emails() {
        for kind in [
            BillingEventKind::SubscriptionEnded,
            BillingEventKind::PaymentSucceeded,
            BillingEventKind::PaymentFailed,
        ] {
            assert!(kind.notifies());
            assert!(billing_email(kind, None).is_some());
        }
    }

    #[test]
    fn greeting_uses_display_name() {
        let email = billing_email(BillingEventKind::PaymentFailed, Some("Ada")).unwrap();
        assert!(email.text.starts_with("Hi Ada,"));
        assert!(billing_email(BillingEventKind::Unhandled, None).is_none());
    }
}
