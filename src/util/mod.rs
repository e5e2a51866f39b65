use local_ip_address::list_afinet_netifas;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use str0m::{net::Protocol, Candidate};
use systemstat::{Platform, System};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::error::SignalError;

/// Logs to stdout, filtered by `RUST_LOG` (default `info`).
pub fn init_log() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn usable(ip: Ipv4Addr) -> bool {
    !ip.is_loopback() && !ip.is_link_local() && !ip.is_broadcast() && !ip.is_unspecified()
}

/// Pick an IPv4 address that can be shared with a remote ICE peer.
///
/// Iterates over all network interfaces provided by `systemstat`, skipping any
/// loopback, link-local or broadcast addresses.
///
/// ## Returns
///
/// * `Some(IpAddr)`: The first routable network interface.
/// * `None`: If the host exposes no usable IPv4 address.
pub fn select_host_address() -> Option<IpAddr> {
    let system = System::new();
    let networks = system.networks().ok()?;

    networks
        .values()
        .flat_map(|net| net.addrs.iter())
        .find_map(|n| match n.addr {
            systemstat::IpAddr::V4(v) if usable(v) => Some(IpAddr::V4(v)),
            _ => None,
        })
}

/// Host candidates for a socket bound to `local_addr`.
///
/// A concrete bind IP yields exactly that candidate. An unspecified one
/// yields one candidate per usable IPv4 interface on the bound port.
pub fn get_candidates(local_addr: SocketAddr) -> Result<Vec<Candidate>, SignalError> {
    let ips = if local_addr.ip().is_unspecified() {
        interface_addresses()
    } else {
        vec![local_addr.ip()]
    };

    let mut candidates = vec![];
    for ip in ips {
        let addr = SocketAddr::new(ip, local_addr.port());
        match Candidate::host(addr, Protocol::Udp) {
            Ok(c) => candidates.push(c),
            Err(e) => debug!("Skipping candidate {}: {}", addr, e),
        }
    }

    if candidates.is_empty() {
        return Err(SignalError::NoCandidates);
    }

    Ok(candidates)
}

fn interface_addresses() -> Vec<IpAddr> {
    let mut ips = vec![];
    if let Ok(network_interfaces) = list_afinet_netifas() {
        for (name, ip) in network_interfaces {
            debug!("iface: {} / {:?}", name, ip);
            if let IpAddr::V4(ip4) = ip {
                if usable(ip4) && !ips.contains(&ip) {
                    ips.push(ip);
                }
            }
        }
    }

    if ips.is_empty() {
        if let Some(ip) = select_host_address() {
            info!("Falling back to host address {}", ip);
            ips.push(ip);
        }
    }

    ips
}
