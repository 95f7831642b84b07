use std::{cell::Cell, collections::HashSet, marker::PhantomData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreAlias {
    Primary,
    Secondary,
}

impl StoreAlias {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "primary" => Some(Self::Primary),
            "secondary" => Some(Self::Secondary),
            _ => None,
        }
    }
}

pub const DEFAULT_PRIMARY_HOSTNAMES: &str = "localhost,127.0.0.1,192.168.0.107,local";
pub const DEFAULT_SECONDARY_HOSTNAMES: &str = "jakesto.synology.me,192.168.0.250";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingConfig {
    pub primary_hosts: HashSet<String>,
    pub secondary_hosts: HashSet<String>,
    pub default_alias: StoreAlias,
    pub mode_override: Option<StoreAlias>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            primary_hosts: parse_host_list(DEFAULT_PRIMARY_HOSTNAMES),
            secondary_hosts: parse_host_list(DEFAULT_SECONDARY_HOSTNAMES),
            default_alias: StoreAlias::Secondary,
            mode_override: None,
        }
    }
}

impl RoutingConfig {
    pub fn from_lists(
        primary_raw: Option<&str>,
        secondary_raw: Option<&str>,
        default_alias_raw: Option<&str>,
        mode_override_raw: Option<&str>,
    ) -> Self {
        Self {
            primary_hosts: parse_host_list(primary_raw.unwrap_or(DEFAULT_PRIMARY_HOSTNAMES)),
            secondary_hosts: parse_host_list(secondary_raw.unwrap_or(DEFAULT_SECONDARY_HOSTNAMES)),
            default_alias: default_alias_raw
                .and_then(StoreAlias::parse)
                .unwrap_or(StoreAlias::Secondary),
            mode_override: mode_override_raw.and_then(StoreAlias::parse),
        }
    }

    pub fn with_mode_override(mut self, alias: StoreAlias) -> Self {
        self.mode_override = Some(alias);
        self
    }

    pub fn resolve_alias_for_host(&self, host: &str) -> StoreAlias {
        let hostname = normalize_host(host);
        if self.primary_hosts.contains(&hostname) {
            StoreAlias::Primary
        } else if self.secondary_hosts.contains(&hostname) {
            StoreAlias::Secondary
        } else {
            self.default_alias
        }
    }

    // Precedence is fixed: request context, then process-wide override, then default.
    pub fn resolve_current_alias(&self) -> StoreAlias {
        if let Some(alias) = active_alias() {
            return alias;
        }
        self.mode_override.unwrap_or(self.default_alias)
    }
}

pub fn parse_host_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

pub fn normalize_host(host: &str) -> String {
    let host = host.trim();
    // "[::1]:8080" keeps the bracketed address, "localhost:8000" drops the port.
    let bare = if let Some(rest) = host.strip_prefix('[') {
        rest.split_once(']').map(|(addr, _)| addr).unwrap_or(rest)
    } else {
        host.split_once(':').map(|(name, _)| name).unwrap_or(host)
    };
    bare.trim().to_ascii_lowercase()
}

thread_local! {
    static ACTIVE_ALIAS: Cell<Option<StoreAlias>> = const { Cell::new(None) };
}

pub fn active_alias() -> Option<StoreAlias> {
    ACTIVE_ALIAS.get()
}

/// Holds the request's alias in the thread-local context cell and restores
/// the previous value on drop, so scopes nest and survive unwinding.
pub struct AliasScope {
    previous: Option<StoreAlias>,
    // The guard must drop on the thread that entered it.
    _not_send: PhantomData<*const ()>,
}

impl AliasScope {
    #[must_use = "the alias is only active while the scope is held"]
    pub fn enter(alias: StoreAlias) -> Self {
        Self {
            previous: ACTIVE_ALIAS.replace(Some(alias)),
            _not_send: PhantomData,
        }
    }
}

impl Drop for AliasScope {
    fn drop(&mut self) {
        ACTIVE_ALIAS.set(self.previous);
    }
}

pub fn with_alias<T>(alias: StoreAlias, f: impl FnOnce() -> T) -> T {
    let _scope = AliasScope::enter(alias);
    f()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRouter {
    config: RoutingConfig,
}

impl StoreRouter {
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn alias_for_host(&self, host: &str) -> StoreAlias {
        self.config.resolve_alias_for_host(host)
    }

    pub fn alias_for_read(&self) -> StoreAlias {
        self.config.resolve_current_alias()
    }

    pub fn alias_for_write(&self) -> StoreAlias {
        self.config.resolve_current_alias()
    }

    pub fn allow_cross_store_relation(&self, _left: StoreAlias, _right: StoreAlias) -> bool {
        true
    }

    // No opinion: migrations run wherever the caller points them.
    pub fn allow_schema_migration(&self, _alias: StoreAlias) -> Option<bool> {
        None
    }
}
