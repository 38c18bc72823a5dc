pub mod accounts;
pub mod counter_store;
pub mod generation_jobs;
pub mod result_cache;
