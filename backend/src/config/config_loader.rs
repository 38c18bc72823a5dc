use std::{fmt::Display, str::FromStr};

use anyhow::{Context, Result, bail};
use crates::domain::value_objects::{counters::FailPolicy, entitlements::PlanLimits};

use super::config_model::{
    Acquisition, BackendServer, Billing, Cooldown, Counters, Database, DotEnvyConfig, Email,
    Generator, ResultCacheStore, Supabase, Throttle,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required_parse("SERVER_PORT_BACKEND")?,
        body_limit: required_parse("SERVER_BODY_LIMIT")?,
        timeout: required_parse("SERVER_TIMEOUT")?,
        trust_proxy_headers: bool_or("TRUST_PROXY_HEADERS", false)?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        pool_size: parse_or("DATABASE_POOL_SIZE", 10)?,
        timeout_seconds: parse_or("DATABASE_TIMEOUT_SECONDS", 5)?,
    };

    let supabase = Supabase {
        jwt_secret: required("SUPABASE_JWT_SECRET")?,
    };

    let counters = Counters {
        redis_url: optional("REDIS_URL"),
        redis_timeout_ms: parse_or("REDIS_TIMEOUT_MS", 250)?,
    };

    let throttle = Throttle {
        max_requests: parse_or("THROTTLE_MAX_REQUESTS", 10)?,
        window_seconds: parse_or("THROTTLE_WINDOW_SECONDS", 60)?,
        fail_policy: FailPolicy::from_flag(bool_or("THROTTLE_FAIL_OPEN", true)?),
    };
    if throttle.max_requests == 0 || throttle.window_seconds == 0 {
        bail!("THROTTLE_MAX_REQUESTS and THROTTLE_WINDOW_SECONDS must be positive");
    }

    let cooldown = Cooldown {
        paid_seconds: parse_or("COOLDOWN_PAID_SECONDS", 30)?,
        free_seconds: parse_or("COOLDOWN_FREE_SECONDS", 45)?,
        fail_policy: FailPolicy::from_flag(bool_or("COOLDOWN_FAIL_OPEN", true)?),
    };

    let defaults = PlanLimits::default();
    let plans = PlanLimits {
        free_usage_limit: parse_or("FREE_USAGE_LIMIT", defaults.free_usage_limit)?,
        creator_usage_limit: parse_or("CREATOR_USAGE_LIMIT", defaults.creator_usage_limit)?,
        free_max_input_chars: parse_or("FREE_MAX_INPUT_CHARS", defaults.free_max_input_chars)?,
        creator_max_input_chars: parse_or(
            "CREATOR_MAX_INPUT_CHARS",
            defaults.creator_max_input_chars,
        )?,
    };

    let acquisition = Acquisition {
        timeout_seconds: parse_or("FETCH_TIMEOUT_SECONDS", 15)?,
        max_chars: parse_or("FETCH_MAX_CHARS", 50_000)?,
        min_chars: parse_or("FETCH_MIN_CHARS", 100)?,
    };

    let generator = Generator {
        api_key: required("GEMINI_API_KEY")?,
        model: optional("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.0-flash".to_string()),
        timeout_seconds: parse_or("GENERATION_TIMEOUT_SECONDS", 60)?,
    };

    let result_cache = match optional("RESULT_CACHE_STORE").as_deref() {
        None => ResultCacheStore::Postgres,
        Some(raw) => parse_cache_store(raw)?,
    };

    let billing = Billing {
        webhook_secret: required("LEMON_SQUEEZY_WEBHOOK_SECRET")?,
        creator_variant_id: required("LEMON_SQUEEZY_CREATOR_VARIANT_ID")?,
    };

    let email = match optional("RESEND_API_KEY") {
        Some(resend_api_key) => Some(Email {
            resend_api_key,
            from: required("EMAIL_FROM")?,
        }),
        None => None,
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        supabase,
        counters,
        throttle,
        cooldown,
        plans,
        acquisition,
        generator,
        result_cache,
        billing,
        email,
    })
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(key: &str) -> Result<String> {
    optional(key).with_context(|| format!("{key} is invalid"))
}

fn required_parse<T>(key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = required(key)?;
    raw.parse::<T>()
        .map_err(|err| anyhow::anyhow!("{key} is invalid: {err}"))
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match optional(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("{key} is invalid: {err}")),
        None => Ok(default),
    }
}

fn bool_or(key: &str, default: bool) -> Result<bool> {
    match optional(key) {
        Some(raw) => parse_bool(&raw).with_context(|| format!("{key} is invalid")),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn parse_cache_store(raw: &str) -> Result<ResultCacheStore> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "postgres" => Ok(ResultCacheStore::Postgres),
        "memory" | "in_memory" => Ok(ResultCacheStore::Memory),
        other => bail!("RESULT_CACHE_STORE is invalid: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_cache_store_rejects_unknown_backend() {
        assert_eq!(parse_cache_store("Memory").unwrap(), ResultCacheStore::Memory);
        assert!(parse_cache_store("mongo").is_err());
    }
}
