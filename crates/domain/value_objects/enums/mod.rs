pub mod output_formats;
pub mod plans;
pub mod subscription_statuses;
pub mod tone_presets;
