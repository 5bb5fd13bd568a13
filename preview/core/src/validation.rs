use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const VALID_VERSION_CHARS: &str = "abcdefghijklmnopqrstuvwxyz0123456789";

const DNS_LABEL_MAX_LEN: usize = 63;
const DNS_LABEL_REGEX: &str = r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$";

const DNS_SUBDOMAIN_MAX_LEN: usize = 253;
const DNS_SUBDOMAIN_REGEX: &str =
    r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$";

static DNS_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DNS_LABEL_REGEX).expect("DNS label regex must compile"));

static DNS_SUBDOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(DNS_SUBDOMAIN_REGEX).expect("DNS subdomain regex must compile")
});

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum NameError {
    /// A version tag cannot be empty.
    #[error("version tag is missing")]
    EmptyVersion,

    /// Version tags are embedded in object names and split on the first
    /// separator, so they are limited to lowercase letters and digits.
    #[error("version tag {0:?} may only contain lowercase letters and digits")]
    BadVersionChar(String),

    #[error("{name:?} is longer than {max} characters")]
    TooLong { name: String, max: usize },

    #[error("{name:?} must match the regex: {regex}")]
    Invalid { name: String, regex: &'static str },
}

pub(crate) fn validate_version(version: &str) -> Result<(), NameError> {
    if version.is_empty() {
        return Err(NameError::EmptyVersion);
    }
    if version.chars().any(|c| !VALID_VERSION_CHARS.contains(c)) {
        return Err(NameError::BadVersionChar(version.to_string()));
    }
    Ok(())
}

/// Validates that a generated object name is a DNS-1123 label, as required
/// for Service and Namespace names.
pub fn validate_dns_label(name: &str) -> Result<(), NameError> {
    validate(name, DNS_LABEL_MAX_LEN, &DNS_LABEL, DNS_LABEL_REGEX)
}

/// Validates that a generated object name is a DNS-1123 subdomain, as
/// required for Deployment names.
pub fn validate_dns_subdomain(name: &str) -> Result<(), NameError> {
    validate(name, DNS_SUBDOMAIN_MAX_LEN, &DNS_SUBDOMAIN, DNS_SUBDOMAIN_REGEX)
}

fn validate(name: &str, max: usize, re: &Regex, regex: &'static str) -> Result<(), NameError> {
    if name.len() > max {
        return Err(NameError::TooLong {
            name: name.to_string(),
            max,
        });
    }
    if !re.is_match(name) {
        return Err(NameError::Invalid {
            name: name.to_string(),
            regex,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions() {
        assert_eq!(validate_version("42"), Ok(()));
        assert_eq!(validate_version("feat7"), Ok(()));
        assert_eq!(validate_version(""), Err(NameError::EmptyVersion));
        for v in ["4-2", "PR42", "4.2", "42 "] {
            assert_eq!(
                validate_version(v),
                Err(NameError::BadVersionChar(v.to_string())),
                "{v:?} must be rejected"
            );
        }
    }

    #[test]
    fn dns_labels() {
        assert_eq!(validate_dns_label("pr42-checkout"), Ok(()));
        for name in ["pr42-checkout-", "pr42_checkout", "pr42-checkout.v1"] {
            assert_eq!(
                validate_dns_label(name),
                Err(NameError::Invalid {
                    name: name.to_string(),
                    regex: DNS_LABEL_REGEX,
                }),
                "{name:?} must be rejected"
            );
        }
        let long = format!("pr42-{}", "a".repeat(60));
        assert_eq!(
            validate_dns_label(&long),
            Err(NameError::TooLong {
                name: long.clone(),
                max: DNS_LABEL_MAX_LEN,
            })
        );
    }

    #[test]
    fn dns_subdomains() {
        assert_eq!(validate_dns_subdomain("pr42-checkout"), Ok(()));
        assert_eq!(validate_dns_subdomain("pr42-checkout.v1"), Ok(()));
        assert_eq!(validate_dns_subdomain(&"a".repeat(100)), Ok(()));
        for name in ["pr42-checkout.", "pr42..checkout", "pr42-Checkout"] {
            assert_eq!(
                validate_dns_subdomain(name),
                Err(NameError::Invalid {
                    name: name.to_string(),
                    regex: DNS_SUBDOMAIN_REGEX,
                }),
                "{name:?} must be rejected"
            );
        }
        let long = "a".repeat(254);
        assert_eq!(
            validate_dns_subdomain(&long),
            Err(NameError::TooLong {
                name: long.clone(),
                max: DNS_SUBDOMAIN_MAX_LEN,
            })
        );
    }
}
