use crate::errors::DatabaseError;
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};
use tracing::{debug, info};

// Bundled suffix -> whois server table, one entry per public suffix
const BUNDLED_SERVERS: &str = include_str!("../data/whois_servers.json");

pub type SuffixTable = HashMap<String, String>;

/// Read-only mapping from public suffix ("com", "co.uk") to whois host.
///
/// Lookups take a snapshot of the current table. A table can only be
/// replaced as a whole, so readers never observe a partial update.
#[derive(Debug)]
pub struct SuffixDatabase {
    table: RwLock<Arc<SuffixTable>>,
}

impl SuffixDatabase {
    /// Load the table shipped with the crate.
    pub fn load() -> Result<Self, DatabaseError> {
        let db = Self::from_json(BUNDLED_SERVERS)?;
        info!("Loaded {} whois servers from bundled database", db.len());
        Ok(db)
    }

    /// Build a table from a flat JSON object of `suffix: server` strings.
    pub fn from_json(json: &str) -> Result<Self, DatabaseError> {
        let table: HashMap<String, String> = serde_json::from_str(json)?;
        Self::from_map(table)
    }

    pub fn from_map<K, V, I>(entries: I) -> Result<Self, DatabaseError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let table = Self::build_table(entries)?;
        Ok(Self {
            table: RwLock::new(Arc::new(table)),
        })
    }

    /// Server for an exact suffix match.
    pub fn find(&self, suffix: &str) -> Option<String> {
        self.snapshot().get(suffix).cloned()
    }

    /// The table currently used for resolution.
    pub fn table(&self) -> Arc<SuffixTable> {
        self.snapshot()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Swap in a new table. The old one stays valid for anyone holding a snapshot.
    pub fn replace<K, V, I>(&self, entries: I) -> Result<(), DatabaseError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let table = Arc::new(Self::build_table(entries)?);
        let mut guard = self.table.write().unwrap_or_else(|e| e.into_inner());
        debug!("Replacing whois server table ({} -> {} entries)", guard.len(), table.len());
        *guard = table;
        Ok(())
    }

    fn snapshot(&self) -> Arc<SuffixTable> {
        // Writers only ever swap the Arc, so a poisoned lock still holds a whole table
        self.table.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn build_table<K, V, I>(entries: I) -> Result<SuffixTable, DatabaseError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut table = HashMap::new();
        for (suffix, server) in entries {
            let suffix = suffix.as_ref().trim().trim_matches('.').to_lowercase();
            let server = server.as_ref().trim();
            if server.is_empty() {
                return Err(DatabaseError::EmptyServer(suffix));
            }
            if suffix.is_empty() {
                continue;
            }
            table.insert(suffix, server.to_lowercase());
        }

        if table.is_empty() {
            return Err(DatabaseError::Empty);
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_database_loads() {
        let db = SuffixDatabase::load().unwrap();
        assert!(!db.is_empty());
        assert_eq!(db.find("com").as_deref(), Some("whois.verisign-grs.com"));
        assert_eq!(db.find("co.uk").as_deref(), Some("whois.nic.uk"));
        assert!(db.table().values().all(|server| !server.is_empty()));
    }

    #[test]
    fn test_empty_table_is_rejected() {
        assert!(matches!(
            SuffixDatabase::from_json("{}"),
            Err(DatabaseError::Empty)
        ));
        let empty: Vec<(&str, &str)> = Vec::new();
        assert!(matches!(
            SuffixDatabase::from_map(empty),
            Err(DatabaseError::Empty)
        ));
    }

    #[test]
    fn test_empty_server_is_rejected() {
        let result = SuffixDatabase::from_json(r#"{"com": "whois.verisign-grs.com", "net": ""}"#);
        assert!(matches!(result, Err(DatabaseError::EmptyServer(s)) if s == "net"));
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(matches!(
            SuffixDatabase::from_json(r#"{"com": 43}"#),
            Err(DatabaseError::Parse(_))
        ));
        assert!(matches!(
            SuffixDatabase::from_json("com: whois.verisign-grs.com"),
            Err(DatabaseError::Parse(_))
        ));
    }

    #[test]
    fn test_keys_are_normalized() {
        let db = SuffixDatabase::from_map([(" .CO.UK. ", "Whois.Nic.UK")]).unwrap();
        assert_eq!(db.find("co.uk").as_deref(), Some("whois.nic.uk"));
        assert_eq!(db.find("CO.UK"), None);
    }

    #[test]
    fn test_replace_swaps_whole_table() {
        let db = SuffixDatabase::from_map([("com", "a.example"), ("net", "b.example")]).unwrap();
        let before = db.table();

        db.replace([("org", "c.example")]).unwrap();

        assert_eq!(before.len(), 2);
        assert_eq!(db.len(), 1);
        assert_eq!(db.find("com"), None);
        assert_eq!(db.find("org").as_deref(), Some("c.example"));

        let empty: Vec<(&str, &str)> = Vec::new();
        assert!(db.replace(empty).is_err());
        assert_eq!(db.find("org").as_deref(), Some("c.example"));
    }
}
