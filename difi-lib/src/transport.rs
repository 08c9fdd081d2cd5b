//! Byte sources for the packet framer.
//!
//! A socket read that times out before any bytes arrive reports 0 bytes, which the engine
//! treats as idle. Once part of a TCP packet has arrived the read keeps waiting for the
//! rest, up to [MAX_STALLS] consecutive timeouts, after which the client is dropped and
//! the partial read returned. A zero read timeout makes TCP client reads blocking.
use std::io::{ErrorKind, Read};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{Config, TransportKind};
use crate::prelude::*;

/// A connection oriented byte stream, e.g., TCP.
pub trait StreamTransport {
    /// True if there is a peer to read from. May accept a pending connection.
    fn is_peer_connected(&mut self) -> bool;

    /// Fill `buf`, returning fewer bytes only if the peer closed or nothing arrived
    /// before the read timeout. Returns 0 when idle.
    ///
    /// # Errors
    /// Any non-timeout I/O error.
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// A datagram source where each datagram holds exactly one packet.
pub trait DatagramTransport {
    /// Receive one datagram into `buf`, returning 0 if none is ready.
    ///
    /// # Errors
    /// Any non-timeout I/O error.
    fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// Consecutive read timeouts tolerated in the middle of a TCP packet.
pub const MAX_STALLS: u32 = 4;

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

fn resolve(address: &str, port: u16) -> Result<SocketAddr> {
    let ip: IpAddr = address
        .parse()
        .map_err(|_| Error::Config(format!("invalid address {address:?}")))?;
    Ok(SocketAddr::new(ip, port))
}

/// TCP listener serving one client at a time.
///
/// Connections are accepted without blocking from [StreamTransport::is_peer_connected].
/// The client is dropped when it closes its end, after which a new client may connect.
#[derive(Debug)]
pub struct TcpServer {
    listener: TcpListener,
    client: Option<TcpStream>,
    read_timeout: Duration,
}

impl TcpServer {
    /// Bind to `address`.
    ///
    /// # Errors
    /// If the listener cannot be bound or configured.
    pub fn bind(address: SocketAddr, read_timeout: Duration) -> Result<Self> {
        let listener = TcpListener::bind(address)?;
        listener.set_nonblocking(true)?;
        info!(addr = %listener.local_addr()?, "listening for DIFI over TCP");
        Ok(TcpServer {
            listener,
            client: None,
            read_timeout,
        })
    }

    /// The bound address; useful when binding to port 0.
    ///
    /// # Errors
    /// If the socket address cannot be determined.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    fn accept(&mut self) -> std::io::Result<Option<TcpStream>> {
        let (stream, peer) = match self.listener.accept() {
            Ok(x) => x,
            Err(err) if is_timeout(&err) => return Ok(None),
            Err(err) => return Err(err),
        };
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(self.read_timeout).filter(|t| !t.is_zero()))?;
        info!(%peer, "client connected");
        Ok(Some(stream))
    }
}

impl StreamTransport for TcpServer {
    fn is_peer_connected(&mut self) -> bool {
        if self.client.is_some() {
            return true;
        }
        match self.accept() {
            Ok(client) => self.client = client,
            Err(err) => warn!(%err, "failed to accept client"),
        }
        self.client.is_some()
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let Some(client) = self.client.as_mut() else {
            return Ok(0);
        };
        let mut filled = 0;
        let mut stalls = 0;
        while filled < buf.len() {
            match client.read(&mut buf[filled..]) {
                Ok(0) => {
                    debug!("client disconnected");
                    self.client = None;
                    break;
                }
                Ok(n) => {
                    filled += n;
                    stalls = 0;
                }
                Err(err) if is_timeout(&err) && filled == 0 => break,
                Err(err) if is_timeout(&err) => {
                    stalls += 1;
                    if stalls >= MAX_STALLS {
                        warn!(
                            got = filled,
                            wanted = buf.len(),
                            "client stalled mid-packet; disconnecting"
                        );
                        self.client = None;
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => {
                    self.client = None;
                    return Err(err);
                }
            }
        }
        Ok(filled)
    }
}

/// UDP socket receiving one packet per datagram.
///
/// Binding to an IPv4 multicast address joins that group on the default interface.
#[derive(Debug)]
pub struct UdpReceiver {
    socket: UdpSocket,
}

impl UdpReceiver {
    /// Bind to `address`, joining the group if it is IPv4 multicast.
    ///
    /// # Errors
    /// If the socket cannot be bound, configured, or the group joined.
    pub fn bind(address: SocketAddr, read_timeout: Duration) -> Result<Self> {
        let socket = match address.ip() {
            IpAddr::V4(group) if group.is_multicast() => {
                let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, address.port()))?;
                socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
                info!(%group, "joined multicast group");
                socket
            }
            _ => UdpSocket::bind(address)?,
        };
        if read_timeout.is_zero() {
            socket.set_nonblocking(true)?;
        } else {
            socket.set_read_timeout(Some(read_timeout))?;
        }
        info!(addr = %socket.local_addr()?, "listening for DIFI over UDP");
        Ok(UdpReceiver { socket })
    }

    /// The bound address; useful when binding to port 0.
    ///
    /// # Errors
    /// If the socket address cannot be determined.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

impl DatagramTransport for UdpReceiver {
    fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.socket.recv(buf) {
            Ok(n) => Ok(n),
            Err(err) if is_timeout(&err) => Ok(0),
            Err(err) => Err(err),
        }
    }
}

/// Stream transport over any [Read], e.g., a capture file.
///
/// The "peer" is connected until the reader reaches EOF.
#[derive(Debug)]
pub struct ReaderTransport<R: Read> {
    reader: R,
    eof: bool,
}

impl<R: Read> ReaderTransport<R> {
    pub fn new(reader: R) -> Self {
        ReaderTransport { reader, eof: false }
    }

    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.eof
    }
}

impl<R: Read> StreamTransport for ReaderTransport<R> {
    fn is_peer_connected(&mut self) -> bool {
        !self.eof
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() && !self.eof {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => self.eof = true,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        Ok(filled)
    }
}

/// The packet source owned by an engine.
pub enum Transport {
    Stream(Box<dyn StreamTransport + Send>),
    Datagram(Box<dyn DatagramTransport + Send>),
}

impl Transport {
    /// Open the socket transport described by `config`.
    ///
    /// # Errors
    /// [Error::Config] for an invalid address, or any error binding the socket.
    pub fn open(config: &Config) -> Result<Self> {
        let addr = resolve(&config.address, config.port)?;
        Ok(match config.transport {
            TransportKind::Tcp => {
                Transport::Stream(Box::new(TcpServer::bind(addr, config.read_timeout)?))
            }
            TransportKind::Udp => {
                Transport::Datagram(Box::new(UdpReceiver::bind(addr, config.read_timeout)?))
            }
        })
    }

    pub fn stream<S: StreamTransport + Send + 'static>(transport: S) -> Self {
        Transport::Stream(Box::new(transport))
    }

    pub fn datagram<D: DatagramTransport + Send + 'static>(transport: D) -> Self {
        Transport::Datagram(Box::new(transport))
    }

    #[must_use]
    pub fn is_stream(&self) -> bool {
        matches!(self, Transport::Stream(_))
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Stream(_) => write!(f, "Transport::Stream"),
            Transport::Datagram(_) => write!(f, "Transport::Datagram"),
        }
    }
}
