pub mod billing_emails;
pub mod resend_client;
