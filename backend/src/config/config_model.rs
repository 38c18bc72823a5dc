use crates::domain::value_objects::{counters::FailPolicy, entitlements::PlanLimits};

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub supabase: Supabase,
    pub counters: Counters,
    pub throttle: Throttle,
    pub cooldown: Cooldown,
    pub plans: PlanLimits,
    pub acquisition: Acquisition,
    pub generator: Generator,
    pub result_cache: ResultCacheStore,
    pub billing: Billing,
    pub email: Option<Email>,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
    /// Read the client address from `X-Forwarded-For` (only behind a trusted proxy).
    pub trust_proxy_headers: bool,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub pool_size: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct Supabase {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct Counters {
    pub redis_url: Option<String>,
    pub redis_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct Throttle {
    pub max_requests: u64,
    pub window_seconds: u64,
    pub fail_policy: FailPolicy,
}

#[derive(Debug, Clone)]
pub struct Cooldown {
    pub paid_seconds: u64,
    pub free_seconds: u64,
    pub fail_policy: FailPolicy,
}

#[derive(Debug, Clone)]
pub struct Acquisition {
    pub timeout_seconds: u64,
    pub max_chars: usize,
    pub min_chars: usize,
}

#[derive(Debug, Clone)]
pub struct Generator {
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCacheStore {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Billing {
    pub webhook_secret: String,
    pub creator_variant_id: String,
}

#[derive(Debug, Clone)]
pub struct Email {
    pub resend_api_key: String,
    pub from: String,
}
