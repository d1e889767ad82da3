//! Local and broadcast address derivation.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

/// Address used only to select an outbound interface; nothing is sent to it.
const ROUTE_PROBE: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 80);

/// IPv4 address of the interface carrying the default route.
///
/// Connecting a UDP socket only consults the routing table, so no packet leaves the host.
#[must_use]
pub fn probe_local_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect(ROUTE_PROBE).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

/// Subnet broadcast address, assuming a /24 network.
#[must_use]
pub const fn class_c_broadcast(ip: Ipv4Addr) -> Ipv4Addr {
    let [a, b, c, _] = ip.octets();
    Ipv4Addr::new(a, b, c, 255)
}
