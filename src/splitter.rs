use crate::{
    classifier::SuffixClassifier,
    errors::WhoisError,
    suffix_db::SuffixDatabase,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

// Labels of alphanumerics with internal hyphens, then an alphabetic TLD of 2-24 chars
static DOMAIN_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-z0-9]+(?:-+[a-z0-9]+)*\.)+[a-z]{2,24}$").expect("domain syntax regex is valid")
});

/// A domain decomposed into registrable label, public suffix and whois server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitDomain {
    /// Single label right before the suffix; empty when the domain is the suffix itself.
    pub name: String,
    pub suffix: String,
    pub server: String,
}

impl SplitDomain {
    /// `name.suffix`, or just the suffix when the name is empty.
    pub fn domain(&self) -> String {
        if self.name.is_empty() {
            self.suffix.clone()
        } else {
            format!("{}.{}", self.name, self.suffix)
        }
    }
}

pub struct DomainSplitter {
    db: Arc<SuffixDatabase>,
    classifier: Arc<dyn SuffixClassifier>,
}

impl DomainSplitter {
    pub fn new(db: Arc<SuffixDatabase>, classifier: Arc<dyn SuffixClassifier>) -> Self {
        Self { db, classifier }
    }

    pub fn database(&self) -> &Arc<SuffixDatabase> {
        &self.db
    }

    pub fn split(&self, raw: &str) -> Result<SplitDomain, WhoisError> {
        let domain = raw.to_lowercase();

        if !is_valid_domain(&domain) {
            return Err(WhoisError::InvalidDomain(raw.to_string()));
        }

        let info = self
            .classifier
            .classify(&domain)
            .ok_or_else(|| WhoisError::UnsupportedTld(format!("no public suffix for {}", domain)))?;
        if !info.icann {
            return Err(WhoisError::UnsupportedTld(format!(
                "{} is not an ICANN suffix",
                info.suffix
            )));
        }

        let server = self.db.find(&info.suffix).ok_or_else(|| {
            WhoisError::UnsupportedTld(format!("no whois server for {}", info.suffix))
        })?;

        let name = registrable_label(&domain, &info.suffix).to_string();
        debug!("Split {} into name={:?} suffix={} server={}", domain, name, info.suffix, server);

        Ok(SplitDomain {
            name,
            suffix: info.suffix,
            server,
        })
    }
}

pub fn is_valid_domain(domain: &str) -> bool {
    DOMAIN_SYNTAX.is_match(domain)
}

// Only the label directly in front of the suffix is kept:
// "host.alpha.www.google.com" with suffix "com" gives "google".
fn registrable_label<'a>(domain: &'a str, suffix: &str) -> &'a str {
    let rest = match domain.strip_suffix(suffix) {
        Some(rest) if rest.is_empty() => return "",
        Some(rest) => rest.strip_suffix('.').unwrap_or(rest),
        None => domain,
    };
    rest.rsplit('.').next().unwrap_or(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{PublicSuffixClassifier, SuffixInfo, BUNDLED_SUFFIX_LIST};

    fn splitter() -> DomainSplitter {
        DomainSplitter::new(
            Arc::new(SuffixDatabase::load().unwrap()),
            Arc::new(PublicSuffixClassifier::bundled().unwrap()),
        )
    }

    #[test]
    fn test_split_cases() {
        let cases = [
            ("google.com", Some(("google", "com"))),
            (" google.com.", None),
            ("www.google.com", Some(("google", "com"))),
            ("www.go-ogle.com.", None),
            ("www.go-ogle.com", Some(("go-ogle", "com"))),
            ("host.alpha.host.www.google.com", Some(("google", "com"))),
        ];

        let splitter = splitter();
        for (input, expected) in cases {
            let result = splitter.split(input);
            match expected {
                Some((name, suffix)) => {
                    let split = result.unwrap_or_else(|e| panic!("split({:?}) failed: {}", input, e));
                    assert_eq!(split.name, name, "name for {:?}", input);
                    assert_eq!(split.suffix, suffix, "suffix for {:?}", input);
                    assert!(!split.server.is_empty());
                }
                None => assert!(
                    matches!(result, Err(WhoisError::InvalidDomain(_))),
                    "split({:?}) should be rejected",
                    input
                ),
            }
        }
    }

    #[test]
    fn test_split_is_case_insensitive() {
        let split = splitter().split("WWW.Example.ORG").unwrap();
        assert_eq!(split.name, "example");
        assert_eq!(split.suffix, "org");
        assert_eq!(split.server, "whois.pir.org");
    }

    #[test]
    fn test_multi_label_suffix() {
        let split = splitter().split("news.bbc.co.uk").unwrap();
        assert_eq!(split.name, "bbc");
        assert_eq!(split.suffix, "co.uk");
        assert_eq!(split.server, "whois.nic.uk");
        assert_eq!(split.domain(), "bbc.co.uk");
    }

    #[test]
    fn test_domain_equal_to_suffix_has_empty_name() {
        let split = splitter().split("co.uk").unwrap();
        assert_eq!(split.name, "");
        assert_eq!(split.suffix, "co.uk");
        assert_eq!(split.domain(), "co.uk");
    }

    #[test]
    fn test_invalid_syntax() {
        let splitter = splitter();
        for input in [
            "",
            "com",
            "-google.com",
            "google-.com",
            "goo..gle.com",
            ".google.com",
            "google.c",
            "google.c0m",
            "goo gle.com",
            "google.com ",
            "google.abcdefghijklmnopqrstuvwxy",
        ] {
            assert!(
                matches!(splitter.split(input), Err(WhoisError::InvalidDomain(_))),
                "{:?} should be invalid",
                input
            );
        }
    }

    #[test]
    fn test_unsupported_suffixes() {
        let splitter = splitter();
        // Unknown TLD and private suffixes
        for input in ["example.notatld", "someone.github.io", "someone.blogspot.com"] {
            assert!(
                matches!(splitter.split(input), Err(WhoisError::UnsupportedTld(_))),
                "{:?} should be unsupported",
                input
            );
        }
    }

    #[test]
    fn test_second_level_suffixes_resolve() {
        let splitter = splitter();
        for (input, name, suffix, server) in [
            ("www.example.net.au", "example", "net.au", "whois.auda.org.au"),
            ("shop.example.ltd.uk", "example", "ltd.uk", "whois.nic.uk"),
            ("www.ox.ac.uk", "ox", "ac.uk", "whois.ja.net"),
            ("example.org.nz", "example", "org.nz", "whois.srs.net.nz"),
            ("example.net.br", "example", "net.br", "whois.registro.br"),
        ] {
            let split = splitter
                .split(input)
                .unwrap_or_else(|e| panic!("split({:?}) failed: {}", input, e));
            assert_eq!(split.name, name);
            assert_eq!(split.suffix, suffix);
            assert_eq!(split.server, server);
        }
    }

    #[test]
    fn test_every_icann_rule_has_a_server() {
        let db = SuffixDatabase::load().unwrap();
        let icann_rules = BUNDLED_SUFFIX_LIST
            .lines()
            .skip_while(|line| !line.contains("===BEGIN ICANN DOMAINS==="))
            .take_while(|line| !line.contains("===END ICANN DOMAINS==="))
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("//"));

        let missing: Vec<&str> = icann_rules.filter(|rule| db.find(rule).is_none()).collect();
        assert!(missing.is_empty(), "no whois server for {:?}", missing);
    }

    struct FixedClassifier;

    impl SuffixClassifier for FixedClassifier {
        fn classify(&self, domain: &str) -> Option<SuffixInfo> {
            let suffix = domain.rsplit('.').next()?;
            Some(SuffixInfo { suffix: suffix.to_string(), icann: true })
        }
    }

    #[test]
    fn test_custom_table_and_classifier() {
        let db = Arc::new(SuffixDatabase::from_map([("test", "whois.test.example")]).unwrap());
        let splitter = DomainSplitter::new(db, Arc::new(FixedClassifier));

        let split = splitter.split("a.b.test").unwrap();
        assert_eq!(split.name, "b");
        assert_eq!(split.server, "whois.test.example");

        assert!(matches!(
            splitter.split("google.com"),
            Err(WhoisError::UnsupportedTld(_))
        ));
    }

    #[test]
    fn test_registrable_label() {
        assert_eq!(registrable_label("google.com", "com"), "google");
        assert_eq!(registrable_label("a.b.c.co.uk", "co.uk"), "c");
        assert_eq!(registrable_label("co.uk", "co.uk"), "");
    }
}
