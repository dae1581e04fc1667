//! # Whois Client Library
//!
//! A WHOIS (RFC 3912) client for Rust.
//!
//! ## Features
//!
//! - Bundled public suffix to whois server table, loaded once per client
//! - Strict domain validation and public suffix classification
//! - Raw query/response exchange on TCP port 43
//! - Optional SOCKS5 proxying (`socks5://[user:pass@]host:port`)
//! - Deadline and cancellation aware lookups
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use whois_client::WhoisClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = WhoisClient::new().await?;
//!     let result = client.lookup("google.com").await?;
//!
//!     println!("Server: {}", result.server);
//!     println!("{}", result.raw);
//!
//!     Ok(())
//! }
//! ```

pub mod classifier;
pub mod client;
pub mod config;
pub mod errors;
pub mod splitter;
pub mod suffix_db;
pub mod transport;

// Re-export main types for easy access
pub use classifier::{PublicSuffixClassifier, SuffixClassifier, SuffixInfo};
pub use client::{WhoisClient, WhoisClientBuilder, WhoisResponse};
pub use config::Config;
pub use errors::{DatabaseError, WhoisError};
pub use splitter::SplitDomain;
pub use suffix_db::SuffixDatabase;
#[cfg(feature = "socks")]
pub use transport::Socks5Dialer;
pub use transport::{normalize_response, Dialer, TcpDialer, WHOIS_PORT};
