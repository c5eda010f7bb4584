use std::net::{IpAddr, SocketAddr, ToSocketAddrs, UdpSocket};

use anyhow::{Context, Result};
use tracing::{debug, info};

pub const DEFAULT_SOURCE_PORT: u16 = 4321;
pub const DEFAULT_DEST_PORT: u16 = 2500;

const DATAGRAM_SIZE: usize = 2048;
const REPORT_INTERVAL: u64 = 100;

/// Append `port` to `addr` unless it already ends with one.
///
/// IPv6 addresses with a port must be bracketed, e.g., `[::1]:4321`; a bare IPv6 address
/// always gets the default port.
pub fn with_default_port(addr: &str, port: u16) -> String {
    if let Ok(ip @ IpAddr::V6(_)) = addr.parse::<IpAddr>() {
        return SocketAddr::new(ip, port).to_string();
    }
    match addr.rsplit_once(':') {
        Some((_, p)) if p.parse::<u16>().is_ok() => addr.to_string(),
        _ => format!("{addr}:{port}"),
    }
}

fn resolve(addr: &str, port: u16) -> Result<SocketAddr> {
    let addr = with_default_port(addr, port);
    addr.to_socket_addrs()
        .with_context(|| format!("resolving {addr}"))?
        .next()
        .with_context(|| format!("no address for {addr}"))
}

pub struct Relay {
    source: UdpSocket,
    sink: UdpSocket,
    dests: Vec<SocketAddr>,
    count: u64,
    buf: Vec<u8>,
}

impl Relay {
    pub fn new(source: UdpSocket, dests: Vec<SocketAddr>) -> Result<Self> {
        let sink = UdpSocket::bind("0.0.0.0:0").context("binding udp socket")?;
        Ok(Relay {
            source,
            sink,
            dests,
            count: 0,
            buf: vec![0u8; DATAGRAM_SIZE],
        })
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Wait for one datagram and send it to every destination.
    pub fn relay_one(&mut self) -> Result<usize> {
        let (n, from) = self
            .source
            .recv_from(&mut self.buf)
            .context("receiving datagram")?;
        debug!(bytes = n, "datagram from {from}");

        for dest in &self.dests {
            self.sink
                .send_to(&self.buf[..n], dest)
                .with_context(|| format!("sending to {dest}"))?;
        }

        self.count += 1;
        if self.count % REPORT_INTERVAL == 0 {
            info!(count = self.count, "datagrams relayed");
        }
        Ok(n)
    }
}

pub fn relay(source: &str, dests: &[String]) -> Result<()> {
    let source = resolve(source, DEFAULT_SOURCE_PORT)?;
    let dests = dests
        .iter()
        .map(|d| resolve(d, DEFAULT_DEST_PORT))
        .collect::<Result<Vec<_>>>()?;

    let socket = UdpSocket::bind(source).with_context(|| format!("binding {source}"))?;
    info!("relaying {source} to {dests:?}");

    let mut relay = Relay::new(socket, dests)?;
    loop {
        relay.relay_one()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_ports() {
        assert_eq!(with_default_port("localhost", 4321), "localhost:4321");
        assert_eq!(with_default_port("10.0.0.1:99", 4321), "10.0.0.1:99");
        assert_eq!(with_default_port("host:x", 2500), "host:x:2500");
    }

    #[test]
    fn default_ports_ipv6() {
        assert_eq!(with_default_port("::1", 4321), "[::1]:4321");
        assert_eq!(with_default_port("fe80::2:1", 2500), "[fe80::2:1]:2500");
        assert_eq!(with_default_port("[::1]", 4321), "[::1]:4321");
        assert_eq!(with_default_port("[::1]:99", 4321), "[::1]:99");
        assert!(with_default_port("::1", 4321).parse::<SocketAddr>().is_ok());
    }

    #[test]
    fn relays_to_every_destination() {
        let source = UdpSocket::bind("127.0.0.1:0").unwrap();
        let source_addr = source.local_addr().unwrap();

        let dests: Vec<UdpSocket> = (0..2)
            .map(|_| UdpSocket::bind("127.0.0.1:0").unwrap())
            .collect();
        for dest in &dests {
            dest.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        }
        let mut relay = Relay::new(
            source,
            dests.iter().map(|d| d.local_addr().unwrap()).collect(),
        )
        .unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(b"!AIVDM,1,1,,A,1,0*17\r\n", source_addr).unwrap();

        assert_eq!(relay.relay_one().unwrap(), 22);
        assert_eq!(relay.count(), 1);

        let mut buf = [0u8; 64];
        for dest in &dests {
            let n = dest.recv(&mut buf).unwrap();
            assert_eq!(&buf[..n], b"!AIVDM,1,1,,A,1,0*17\r\n");
        }
    }
}
