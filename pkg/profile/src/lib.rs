use std::{
    collections::BTreeSet,
    net::{Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket},
    path::PathBuf,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeProfile {
    Workstation,
    Appliance,
}

impl RuntimeProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Workstation => "workstation",
            Self::Appliance => "appliance",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "workstation" => Some(Self::Workstation),
            "appliance" => Some(Self::Appliance),
            _ => None,
        }
    }
}

pub const DEFAULT_APPLIANCE_MARKERS: &str = "/volume1,/var/services";
pub const DEFAULT_APPLIANCE_SERVER_IP: &str = "192.168.0.250";
pub const DEFAULT_WORKSTATION_BIND: &str = "127.0.0.1:8000";
pub const DEFAULT_APPLIANCE_BIND: &str = "0.0.0.0:8080";

// Vendor strings the appliance firmware bakes into its hostname.
const APPLIANCE_HOSTNAME_MARKERS: [&str; 2] = ["synology", "diskstation"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileConfig {
    pub override_profile: Option<RuntimeProfile>,
    pub marker_paths: Vec<PathBuf>,
    pub appliance_ip: Option<Ipv4Addr>,
    pub workstation_bind: String,
    pub appliance_bind: String,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            override_profile: None,
            marker_paths: parse_marker_list(DEFAULT_APPLIANCE_MARKERS),
            appliance_ip: DEFAULT_APPLIANCE_SERVER_IP.parse().ok(),
            workstation_bind: DEFAULT_WORKSTATION_BIND.to_string(),
            appliance_bind: DEFAULT_APPLIANCE_BIND.to_string(),
        }
    }
}

impl ProfileConfig {
    pub fn from_parts(
        override_raw: Option<&str>,
        markers_raw: Option<&str>,
        appliance_ip_raw: Option<&str>,
        workstation_bind_raw: Option<&str>,
        appliance_bind_raw: Option<&str>,
    ) -> Self {
        Self {
            override_profile: override_raw.and_then(RuntimeProfile::parse),
            marker_paths: parse_marker_list(markers_raw.unwrap_or(DEFAULT_APPLIANCE_MARKERS)),
            appliance_ip: match appliance_ip_raw {
                Some(raw) => raw.trim().parse().ok(),
                None => DEFAULT_APPLIANCE_SERVER_IP.parse().ok(),
            },
            workstation_bind: non_empty_or(workstation_bind_raw, DEFAULT_WORKSTATION_BIND),
            appliance_bind: non_empty_or(appliance_bind_raw, DEFAULT_APPLIANCE_BIND),
        }
    }
}

pub fn parse_marker_list(raw: &str) -> Vec<PathBuf> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn non_empty_or(raw: Option<&str>, default: &str) -> String {
    match raw.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => default.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFacts {
    pub hostname: String,
    pub marker_present: bool,
    pub local_ipv4: BTreeSet<Ipv4Addr>,
}

pub fn observe_host_facts(config: &ProfileConfig) -> HostFacts {
    let hostname = local_hostname();
    HostFacts {
        marker_present: config.marker_paths.iter().any(|path| path.exists()),
        local_ipv4: local_ipv4_addresses(&hostname, config.appliance_ip),
        hostname,
    }
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_default()
}

/// Union of two independent probes; every OS error degrades to "no data".
/// Loopback is always present.
pub fn local_ipv4_addresses(
    hostname: &str,
    probe_target: Option<Ipv4Addr>,
) -> BTreeSet<Ipv4Addr> {
    let mut addresses = BTreeSet::from([Ipv4Addr::LOCALHOST]);

    if !hostname.is_empty()
        && let Ok(resolved) = (hostname, 0u16).to_socket_addrs()
    {
        for addr in resolved {
            if let SocketAddr::V4(v4) = addr {
                addresses.insert(*v4.ip());
            }
        }
    }

    // A connected UDP socket reveals the address this host would route from
    // toward the appliance; no datagram leaves the machine.
    if let Some(target) = probe_target
        && let Ok(socket) = UdpSocket::bind(("0.0.0.0", 0))
        && socket.connect((target, 9)).is_ok()
        && let Ok(SocketAddr::V4(v4)) = socket.local_addr()
    {
        addresses.insert(*v4.ip());
    }

    addresses
}

// First match wins: explicit override, marker path, vendor hostname, bound IP.
pub fn classify(config: &ProfileConfig, facts: &HostFacts) -> RuntimeProfile {
    if let Some(profile) = config.override_profile {
        return profile;
    }
    if facts.marker_present {
        return RuntimeProfile::Appliance;
    }
    let hostname = facts.hostname.to_ascii_lowercase();
    if APPLIANCE_HOSTNAME_MARKERS
        .iter()
        .any(|marker| hostname.contains(marker))
    {
        return RuntimeProfile::Appliance;
    }
    if let Some(ip) = config.appliance_ip
        && facts.local_ipv4.contains(&ip)
    {
        return RuntimeProfile::Appliance;
    }
    RuntimeProfile::Workstation
}

pub fn detect_runtime_profile(config: &ProfileConfig) -> RuntimeProfile {
    classify(config, &observe_host_facts(config))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupSelection {
    pub profile: RuntimeProfile,
    pub bind_addr: String,
}

pub fn bind_addr_for(config: &ProfileConfig, profile: RuntimeProfile) -> &str {
    match profile {
        RuntimeProfile::Workstation => &config.workstation_bind,
        RuntimeProfile::Appliance => &config.appliance_bind,
    }
}

/// Runs the classifier once at process launch and picks the matching listen
/// address.
pub fn select_startup(config: &ProfileConfig) -> StartupSelection {
    let profile = detect_runtime_profile(config);
    StartupSelection {
        profile,
        bind_addr: bind_addr_for(config, profile).to_string(),
    }
}
