use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::TcpListener;

const BACKLOG: i32 = 1024;

/// Binds the HTTP listener. A host of `*` listens on every interface,
/// preferring an IPv6 dual-stack socket and falling back to IPv4.
pub async fn create_listener(host: &str, port: u16) -> std::io::Result<(SocketAddr, TcpListener)> {
    let listener = if host == "*" {
        create_wildcard_listener(port)?
    } else {
        let addr = format!("{}:{}", host, port);
        tracing::info!("Attempting to bind server to {}...", addr);
        TcpListener::bind(&addr).await?
    };

    Ok((listener.local_addr()?, listener))
}

fn bind_socket(domain: Domain, addr: SocketAddr, dual_stack: bool) -> std::io::Result<TcpListener> {
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    if dual_stack {
        // Some systems refuse to clear IPV6_V6ONLY; IPv6 alone still works there
        if let Err(e) = socket.set_only_v6(false) {
            tracing::warn!(
                "Failed to set dual-stack mode for IPv6 socket: {}. Continuing anyway.",
                e
            );
        }
    }

    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;
    socket.set_nonblocking(true)?;

    TcpListener::from_std(socket.into())
}

fn create_wildcard_listener(port: u16) -> std::io::Result<TcpListener> {
    let ipv6_addr = SocketAddr::from((Ipv6Addr::UNSPECIFIED, port));
    tracing::info!("Attempting to bind server to {}... (IPv6 + IPv4 dual-stack)", ipv6_addr);

    match bind_socket(Domain::IPV6, ipv6_addr, true) {
        Ok(listener) => Ok(listener),
        Err(e) => {
            tracing::warn!("Failed to bind IPv6 listener: {}. Attempting IPv4 only.", e);

            let ipv4_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
            tracing::info!("Attempting to bind server to {}... (IPv4)", ipv4_addr);
            bind_socket(Domain::IPV4, ipv4_addr, false)
        }
    }
}
