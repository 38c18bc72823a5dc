pub mod accounts;
pub mod generation_cache;
pub mod generation_jobs;
