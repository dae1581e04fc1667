//! Public suffix classification.
//!
//! The splitter only needs to know which suffix a domain falls under and
//! whether that suffix is managed by ICANN. [`SuffixClassifier`] is the seam
//! for that question; [`PublicSuffixClassifier`] answers it from Mozilla's
//! Public Suffix List.

use crate::errors::DatabaseError;
use publicsuffix::{List, Psl, Type};

// Public suffix rules shipped with the crate
pub(crate) const BUNDLED_SUFFIX_LIST: &str = include_str!("../data/public_suffix_list.dat");

/// Public suffix of a domain and whether the suffix is ICANN managed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixInfo {
    pub suffix: String,
    pub icann: bool,
}

pub trait SuffixClassifier: Send + Sync {
    /// `None` when no suffix can be derived at all.
    fn classify(&self, domain: &str) -> Option<SuffixInfo>;
}

pub struct PublicSuffixClassifier {
    list: List,
}

impl PublicSuffixClassifier {
    /// Classifier backed by the bundled list.
    pub fn bundled() -> Result<Self, DatabaseError> {
        Self::from_list_str(BUNDLED_SUFFIX_LIST)
    }

    /// Parse a list in the `public_suffix_list.dat` format.
    pub fn from_list_str(list: &str) -> Result<Self, DatabaseError> {
        let list = list
            .parse::<List>()
            .map_err(|e| DatabaseError::SuffixList(e.to_string()))?;
        Ok(Self { list })
    }
}

impl SuffixClassifier for PublicSuffixClassifier {
    fn classify(&self, domain: &str) -> Option<SuffixInfo> {
        let suffix = self.list.suffix(domain.as_bytes())?;
        let icann = suffix.typ() == Some(Type::Icann);
        let suffix = std::str::from_utf8(suffix.as_bytes()).ok()?;
        Some(SuffixInfo {
            suffix: suffix.to_string(),
            icann,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(domain: &str) -> Option<SuffixInfo> {
        PublicSuffixClassifier::bundled().unwrap().classify(domain)
    }

    #[test]
    fn test_icann_suffixes() {
        assert_eq!(
            classify("www.google.com"),
            Some(SuffixInfo { suffix: "com".to_string(), icann: true })
        );
        assert_eq!(
            classify("bbc.co.uk"),
            Some(SuffixInfo { suffix: "co.uk".to_string(), icann: true })
        );
        assert_eq!(
            classify("co.uk"),
            Some(SuffixInfo { suffix: "co.uk".to_string(), icann: true })
        );
    }

    #[test]
    fn test_private_suffix_is_not_icann() {
        let info = classify("someone.github.io").unwrap();
        assert_eq!(info.suffix, "github.io");
        assert!(!info.icann);
    }

    #[test]
    fn test_unknown_tld_is_not_icann() {
        let info = classify("example.notatld").unwrap();
        assert_eq!(info.suffix, "notatld");
        assert!(!info.icann);
    }

    #[test]
    fn test_rejects_list_without_sections() {
        assert!(PublicSuffixClassifier::from_list_str("// nothing here\n").is_err());
    }
}
