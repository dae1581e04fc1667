use crate::{config::Config, errors::WhoisError};
use async_trait::async_trait;
use socket2::{SockRef, TcpKeepalive};
use std::{io, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tracing::debug;

pub const WHOIS_PORT: u16 = 43;

const READ_CHUNK_SIZE: usize = 8192;

/// Byte stream returned by a [`Dialer`].
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

pub type Connection = Box<dyn AsyncStream>;

/// Opens a byte-stream connection to a `host:port` address.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, address: &str) -> io::Result<Connection>;
}

/// Direct TCP connections.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    connect_timeout: Duration,
    keepalive: Duration,
}

impl TcpDialer {
    pub fn new(connect_timeout: Duration, keepalive: Duration) -> Self {
        Self { connect_timeout, keepalive }
    }
}

impl Default for TcpDialer {
    fn default() -> Self {
        let config = Config::default();
        Self::new(config.connect_timeout(), config.keepalive())
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, address: &str) -> io::Result<Connection> {
        let stream = timeout(self.connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;

        // Optimize TCP performance
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }
        let keepalive = TcpKeepalive::new().with_time(self.keepalive);
        if let Err(e) = SockRef::from(&stream).set_tcp_keepalive(&keepalive) {
            debug!("Failed to enable TCP keep-alive: {}", e);
        }

        Ok(Box::new(stream))
    }
}

#[cfg(feature = "socks")]
pub use socks::Socks5Dialer;

#[cfg(feature = "socks")]
mod socks {
    use super::{Connection, Dialer};
    use crate::errors::WhoisError;
    use async_trait::async_trait;
    use percent_encoding::percent_decode_str;
    use std::{io, time::Duration};
    use tokio::time::timeout;
    use tokio_socks::tcp::Socks5Stream;
    use tracing::debug;
    use url::Url;

    /// Tunnels connections through a SOCKS5 proxy.
    ///
    /// The target host name is sent to the proxy unresolved, so name
    /// resolution happens on the proxy side.
    #[derive(Clone)]
    pub struct Socks5Dialer {
        proxy: String,
        credentials: Option<(String, String)>,
        connect_timeout: Duration,
    }

    impl std::fmt::Debug for Socks5Dialer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Socks5Dialer")
                .field("proxy", &self.proxy)
                .field("authenticated", &self.credentials.is_some())
                .field("connect_timeout", &self.connect_timeout)
                .finish()
        }
    }

    impl Socks5Dialer {
        /// Parse `socks5://[user:pass@]host:port`.
        ///
        /// `socks5h://` is accepted as a synonym, since names are always
        /// resolved by the proxy.
        pub fn from_url(proxy_url: &str, connect_timeout: Duration) -> Result<Self, WhoisError> {
            let url = Url::parse(proxy_url)
                .map_err(|e| WhoisError::InvalidProxy(format!("{}: {}", proxy_url, e)))?;

            if !matches!(url.scheme(), "socks5" | "socks5h") {
                return Err(WhoisError::InvalidProxy(format!(
                    "unsupported proxy scheme {:?}",
                    url.scheme()
                )));
            }
            let host = url
                .host_str()
                .filter(|host| !host.is_empty())
                .ok_or_else(|| WhoisError::InvalidProxy(format!("{}: missing host", proxy_url)))?;
            let port = url
                .port()
                .ok_or_else(|| WhoisError::InvalidProxy(format!("{}: missing port", proxy_url)))?;

            let credentials = match (url.username(), url.password()) {
                ("", None) => None,
                (username, Some(password)) if !username.is_empty() && !password.is_empty() => {
                    Some((decode(username)?, decode(password)?))
                }
                _ => {
                    return Err(WhoisError::InvalidProxy(format!(
                        "{}: credentials need both a user name and a password",
                        host
                    )))
                }
            };

            Ok(Self {
                proxy: format!("{}:{}", host, port),
                credentials,
                connect_timeout,
            })
        }

        pub fn proxy_address(&self) -> &str {
            &self.proxy
        }

        pub fn has_credentials(&self) -> bool {
            self.credentials.is_some()
        }

        async fn connect(&self, host: String, port: u16) -> io::Result<Connection> {
            let proxies: Vec<_> = tokio::net::lookup_host(self.proxy.as_str()).await?.collect();
            let stream = match &self.credentials {
                Some((username, password)) => {
                    Socks5Stream::connect_with_password(
                        proxies.as_slice(),
                        (host, port),
                        username,
                        password,
                    )
                    .await
                }
                None => Socks5Stream::connect(proxies.as_slice(), (host, port)).await,
            }
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            Ok(Box::new(stream))
        }
    }

    #[async_trait]
    impl Dialer for Socks5Dialer {
        async fn dial(&self, address: &str) -> io::Result<Connection> {
            let (host, port) = split_host_port(address)?;
            debug!("Dialing {} through SOCKS5 proxy {}", address, self.proxy);
            timeout(self.connect_timeout, self.connect(host, port))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "proxy connect timed out"))?
        }
    }

    fn decode(component: &str) -> Result<String, WhoisError> {
        percent_decode_str(component)
            .decode_utf8()
            .map(|s| s.into_owned())
            .map_err(|_| WhoisError::InvalidProxy("credentials are not valid UTF-8".to_string()))
    }

    fn split_host_port(address: &str) -> io::Result<(String, u16)> {
        let invalid = || io::Error::new(io::ErrorKind::InvalidInput, format!("invalid address {}", address));
        let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
        let port = port.parse().map_err(|_| invalid())?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        Ok((host.to_string(), port))
    }

}

/// Pick the dialer described by the configuration.
pub fn dialer_from_config(config: &Config) -> Result<Arc<dyn Dialer>, WhoisError> {
    match config.proxy_url.as_deref() {
        None => Ok(Arc::new(TcpDialer::new(config.connect_timeout(), config.keepalive()))),
        #[cfg(feature = "socks")]
        Some(url) => Ok(Arc::new(Socks5Dialer::from_url(url, config.connect_timeout())?)),
        #[cfg(not(feature = "socks"))]
        Some(url) => Err(WhoisError::InvalidProxy(format!(
            "{}: built without SOCKS5 support",
            url
        ))),
    }
}

/// Limits applied while reading a response.
#[derive(Debug, Clone)]
pub struct ExchangeOptions {
    /// Deadline for each read on the connection.
    pub read_timeout: Option<Duration>,
    pub max_response_size: usize,
}

impl From<&Config> for ExchangeOptions {
    fn from(config: &Config) -> Self {
        Self {
            read_timeout: config.read_timeout(),
            max_response_size: config.max_response_size,
        }
    }
}

impl Default for ExchangeOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Send `query` to `server` on port 43 and return the normalized reply.
///
/// The connection is owned by this function and closed on every return path.
pub async fn exchange(
    dialer: &dyn Dialer,
    server: &str,
    query: &str,
    options: &ExchangeOptions,
) -> Result<String, WhoisError> {
    let address = join_host_port(server, WHOIS_PORT);

    let mut conn = dialer.dial(&address).await.map_err(|e| {
        debug!("Failed to connect to {}: {}", address, e);
        WhoisError::ConnectionFailed {
            address: address.clone(),
            reason: e.to_string(),
        }
    })?;

    let query_line = format!("{}\r\n", query);
    conn.write_all(query_line.as_bytes()).await?;
    conn.flush().await?;

    let response = read_until_close(&mut conn, options).await?;
    debug!("Received {} bytes from {}", response.len(), address);

    if response.is_empty() {
        return Err(WhoisError::EmptyResponse);
    }

    Ok(normalize_response(&String::from_utf8_lossy(&response)))
}

async fn read_until_close(
    conn: &mut Connection,
    options: &ExchangeOptions,
) -> Result<Vec<u8>, WhoisError> {
    let mut buffer = vec![0u8; READ_CHUNK_SIZE];
    let mut response = Vec::new();

    loop {
        let read = match options.read_timeout {
            Some(limit) => timeout(limit, conn.read(&mut buffer)).await??,
            None => conn.read(&mut buffer).await?,
        };
        if read == 0 {
            break; // EOF
        }
        response.extend_from_slice(&buffer[..read]);
        if response.len() > options.max_response_size {
            return Err(WhoisError::ResponseTooLarge);
        }
    }

    Ok(response)
}

/// Strip every carriage return, turning CRLF line endings into LF.
pub fn normalize_response(text: &str) -> String {
    text.replace('\r', "")
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
