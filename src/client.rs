use crate::{
    classifier::{PublicSuffixClassifier, SuffixClassifier},
    config::Config,
    errors::WhoisError,
    splitter::{DomainSplitter, SplitDomain},
    suffix_db::{SuffixDatabase, SuffixTable},
    transport::{self, Dialer, ExchangeOptions},
};
use serde::{Deserialize, Serialize};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, info, warn};

/// Result of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoisResponse {
    /// Domain actually sent to the server (`name.suffix`).
    pub domain: String,
    pub name: String,
    pub suffix: String,
    pub server: String,
    /// Server reply with carriage returns removed.
    pub raw: String,
}

/// WHOIS client resolving domains against a bundled suffix table.
///
/// Cheap to clone; clones share the table, the classifier and the dialer.
#[derive(Clone)]
pub struct WhoisClient {
    splitter: Arc<DomainSplitter>,
    dialer: Arc<dyn Dialer>,
    config: Arc<Config>,
}

impl WhoisClient {
    /// Create a client with configuration read from the environment
    pub async fn new() -> Result<Self, WhoisError> {
        let config = Arc::new(Config::load()?);
        Self::new_with_config(config).await
    }

    /// Create a client with custom configuration
    pub async fn new_with_config(config: Arc<Config>) -> Result<Self, WhoisError> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> WhoisClientBuilder {
        WhoisClientBuilder::default()
    }

    /// A client sharing this one's suffix table but dialing through `dialer`.
    pub fn with_dialer(&self, dialer: Arc<dyn Dialer>) -> Self {
        Self {
            splitter: self.splitter.clone(),
            dialer,
            config: self.config.clone(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Decompose `domain` into registrable label, suffix and whois server.
    pub fn split(&self, domain: &str) -> Result<SplitDomain, WhoisError> {
        self.splitter.split(domain)
    }

    /// Snapshot of the suffix to server table used for resolution.
    pub fn whois_list(&self) -> Arc<SuffixTable> {
        self.splitter.database().table()
    }

    pub fn suffix_database(&self) -> &Arc<SuffixDatabase> {
        self.splitter.database()
    }

    /// Look up `domain`, giving up after the configured lookup timeout.
    pub async fn lookup(&self, domain: &str) -> Result<WhoisResponse, WhoisError> {
        self.lookup_with_timeout(domain, self.config.lookup_timeout()).await
    }

    pub async fn lookup_with_timeout(
        &self,
        domain: &str,
        limit: Duration,
    ) -> Result<WhoisResponse, WhoisError> {
        self.lookup_with_deadline(domain, Instant::now() + limit).await
    }

    /// Look up `domain`, giving up at `deadline`.
    ///
    /// A deadline that has already passed fails with [`WhoisError::Timeout`]
    /// without opening a connection. The exchange task is bound by the same
    /// deadline, so its connection is closed once the lookup has timed out.
    pub async fn lookup_with_deadline(
        &self,
        domain: &str,
        deadline: Instant,
    ) -> Result<WhoisResponse, WhoisError> {
        let split = self.splitter.split(domain)?;
        if Instant::now() >= deadline {
            return Err(WhoisError::Timeout);
        }
        self.exchange_until(split, sleep_until(deadline), Some(deadline)).await
    }

    /// Look up `domain`, giving up as soon as `signal` completes.
    ///
    /// The exchange runs on its own task. When the signal wins, this returns
    /// [`WhoisError::Timeout`] right away and the task is left to finish on
    /// its own: it still closes its connection, but its result is dropped
    /// and the remote side is not told to stop. Configure
    /// `read_timeout_seconds` to bound how long such a task can linger, or
    /// use [`WhoisClient::lookup_with_deadline`], which bounds it directly.
    pub async fn lookup_with_signal<S>(
        &self,
        domain: &str,
        signal: S,
    ) -> Result<WhoisResponse, WhoisError>
    where
        S: Future<Output = ()>,
    {
        let split = self.splitter.split(domain)?;
        self.exchange_until(split, signal, None).await
    }

    /// Query `server` directly for `domain`, skipping suffix resolution.
    pub async fn lookup_host(&self, domain: &str, server: &str) -> Result<String, WhoisError> {
        let domain = domain.to_lowercase();
        let options = ExchangeOptions::from(self.config.as_ref());
        transport::exchange(self.dialer.as_ref(), server, &domain, &options).await
    }

    async fn exchange_until<S>(
        &self,
        split: SplitDomain,
        signal: S,
        deadline: Option<Instant>,
    ) -> Result<WhoisResponse, WhoisError>
    where
        S: Future<Output = ()>,
    {
        let domain = split.domain();
        let dialer = self.dialer.clone();
        let server = split.server.clone();
        let query = domain.clone();
        let options = ExchangeOptions::from(self.config.as_ref());

        debug!("Querying {} for {}", server, domain);
        let task = tokio::spawn(async move {
            let exchange = transport::exchange(dialer.as_ref(), &server, &query, &options);
            match deadline {
                Some(deadline) => timeout_at(deadline, exchange)
                    .await
                    .unwrap_or(Err(WhoisError::Timeout)),
                None => exchange.await,
            }
        });

        tokio::select! {
            biased;

            _ = signal => {
                // Dropping the handle detaches the task
                warn!("Lookup for {} abandoned before {} replied", domain, split.server);
                Err(WhoisError::Timeout)
            }
            joined = task => {
                let raw = joined.map_err(|e| WhoisError::Internal(format!("lookup task failed: {}", e)))??;
                Ok(WhoisResponse {
                    domain,
                    name: split.name,
                    suffix: split.suffix,
                    server: split.server,
                    raw,
                })
            }
        }
    }
}

impl std::fmt::Debug for WhoisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhoisClient")
            .field("suffixes", &self.suffix_database().len())
            .field("config", &self.config)
            .finish()
    }
}

/// Assembles a [`WhoisClient`], defaulting every part that is not supplied.
#[derive(Default)]
pub struct WhoisClientBuilder {
    config: Option<Arc<Config>>,
    dialer: Option<Arc<dyn Dialer>>,
    database: Option<Arc<SuffixDatabase>>,
    classifier: Option<Arc<dyn SuffixClassifier>>,
}

impl WhoisClientBuilder {
    pub fn config(mut self, config: Arc<Config>) -> Self {
        self.config = Some(config);
        self
    }

    /// Overrides the dialer derived from the configuration.
    pub fn dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = Some(dialer);
        self
    }

    pub fn database(mut self, database: Arc<SuffixDatabase>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn SuffixClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn build(self) -> Result<WhoisClient, WhoisError> {
        let config = self.config.unwrap_or_default();
        let dialer = match self.dialer {
            Some(dialer) => dialer,
            None => transport::dialer_from_config(&config)?,
        };
        let database = match self.database {
            Some(database) => database,
            None => Arc::new(SuffixDatabase::load()?),
        };
        let classifier: Arc<dyn SuffixClassifier> = match self.classifier {
            Some(classifier) => classifier,
            None => Arc::new(PublicSuffixClassifier::bundled()?),
        };

        info!(
            "WhoisClient initialized with {} whois servers{}",
            database.len(),
            if config.proxy_url.is_some() { " (via SOCKS5 proxy)" } else { "" }
        );

        Ok(WhoisClient {
            splitter: Arc::new(DomainSplitter::new(database, classifier)),
            dialer,
            config,
        })
    }
}
