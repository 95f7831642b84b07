use profile::{ProfileConfig, RuntimeProfile};
use routing::{RoutingConfig, StoreAlias};

pub fn env_with_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .or_else(|| std::env::var(fallback).ok())
}

pub fn parse_env_with_fallback<T>(primary: &str, fallback: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env_with_fallback(primary, fallback).and_then(|value| value.parse::<T>().ok())
}

/// Host sets and overrides are read once here; the resulting config is
/// immutable for the process lifetime.
pub fn routing_config_from_env() -> RoutingConfig {
    let primary_raw = env_with_fallback("PORTFOLIO_PRIMARY_DB_HOSTNAMES", "PRIMARY_DB_HOSTNAMES");
    let secondary_raw =
        env_with_fallback("PORTFOLIO_SECONDARY_DB_HOSTNAMES", "SECONDARY_DB_HOSTNAMES");
    let default_raw = env_with_fallback("PORTFOLIO_DEFAULT_DB_ALIAS", "DEFAULT_DB_ALIAS");
    let mode_raw = env_with_fallback("PORTFOLIO_DB_MODE", "DB_MODE");

    warn_unrecognized_alias("PORTFOLIO_DEFAULT_DB_ALIAS", default_raw.as_deref());
    warn_unrecognized_alias("PORTFOLIO_DB_MODE", mode_raw.as_deref());

    RoutingConfig::from_lists(
        primary_raw.as_deref(),
        secondary_raw.as_deref(),
        default_raw.as_deref(),
        mode_raw.as_deref(),
    )
}

pub fn profile_config_from_env() -> ProfileConfig {
    let override_raw = env_with_fallback("PORTFOLIO_SERVER_PROFILE", "SERVER_PROFILE");
    if let Some(raw) = override_raw.as_deref()
        && !raw.trim().is_empty()
        && RuntimeProfile::parse(raw).is_none()
    {
        eprintln!(
            "portfolio ignoring invalid PORTFOLIO_SERVER_PROFILE='{raw}' (expected workstation or appliance)"
        );
    }

    ProfileConfig::from_parts(
        override_raw.as_deref(),
        env_with_fallback("PORTFOLIO_APPLIANCE_MARKERS", "APPLIANCE_MARKERS").as_deref(),
        env_with_fallback("PORTFOLIO_APPLIANCE_SERVER_IP", "APPLIANCE_SERVER_IP").as_deref(),
        env_with_fallback("PORTFOLIO_WORKSTATION_BIND", "WORKSTATION_BIND").as_deref(),
        env_with_fallback("PORTFOLIO_APPLIANCE_BIND", "APPLIANCE_BIND").as_deref(),
    )
}

fn warn_unrecognized_alias(key: &str, raw: Option<&str>) {
    if let Some(raw) = raw
        && !raw.trim().is_empty()
        && StoreAlias::parse(raw).is_none()
    {
        eprintln!("portfolio ignoring invalid {key}='{raw}' (expected primary or secondary)");
    }
}

/// The workstation serves out of the primary store, the appliance out of the
/// secondary one.
pub fn alias_for_profile(profile: RuntimeProfile) -> StoreAlias {
    match profile {
        RuntimeProfile::Workstation => StoreAlias::Primary,
        RuntimeProfile::Appliance => StoreAlias::Secondary,
    }
}

pub fn http_workers_from_env() -> usize {
    parse_env_with_fallback::<usize>("PORTFOLIO_HTTP_WORKERS", "HTTP_WORKERS")
        .filter(|workers| *workers > 0)
        .unwrap_or_else(default_http_workers)
}

pub fn default_http_workers() -> usize {
    std::thread::available_parallelism()
        .map(|parallelism| parallelism.get().clamp(1, 32))
        .unwrap_or(4)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportRuntime {
    Std,
    Axum,
}

impl TransportRuntime {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Std => "std",
            Self::Axum => "axum",
        }
    }
}

pub fn transport_runtime_from_env() -> TransportRuntime {
    let runtime_raw = env_with_fallback("PORTFOLIO_TRANSPORT_RUNTIME", "TRANSPORT_RUNTIME");
    match runtime_raw.as_deref() {
        Some("axum") => TransportRuntime::Axum,
        _ => TransportRuntime::Std,
    }
}
