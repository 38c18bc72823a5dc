pub mod counters;
pub mod db;
pub mod result_cache;
