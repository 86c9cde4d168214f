//! Hostname validation and label paths.

use crate::error::{Error, Result};
use crate::{MAX_LABEL_LENGTH, MAX_NAME_LENGTH};

/// Checks that `hostname` is a fully qualified domain name.
///
/// The rules follow common FQDN validators: at least two labels, a trailing
/// dot is allowed, labels are 1-63 characters of letters, digits, hyphens,
/// underscores or non-ASCII characters, may not start or end with a hyphen,
/// and the top-level label is alphabetic (or an `xn--` A-label) with at
/// least two characters.
pub fn validate_fqdn(hostname: &str) -> Result<()> {
    let name = hostname.strip_suffix('.').unwrap_or(hostname);

    if name.is_empty() {
        return Err(Error::invalid_hostname(hostname, "empty name"));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(Error::invalid_hostname(hostname, "name too long"));
    }

    let labels: Vec<&str> = name.split('.').collect();
    let Some((tld, _)) = labels.split_last() else {
        return Err(Error::invalid_hostname(hostname, "empty name"));
    };
    if labels.len() < 2 {
        return Err(Error::invalid_hostname(hostname, "missing top-level domain"));
    }

    if !is_valid_tld(tld) {
        return Err(Error::invalid_hostname(hostname, "invalid top-level domain"));
    }

    for label in &labels {
        if label.is_empty() {
            return Err(Error::invalid_hostname(hostname, "empty label"));
        }
        if label.len() > MAX_LABEL_LENGTH {
            return Err(Error::invalid_hostname(hostname, "label too long"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::invalid_hostname(hostname, "label starts or ends with a hyphen"));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii())
        {
            return Err(Error::invalid_hostname(hostname, "invalid character in label"));
        }
    }

    Ok(())
}

fn is_valid_tld(tld: &str) -> bool {
    let lower = tld.to_ascii_lowercase();
    if let Some(rest) = lower.strip_prefix("xn") {
        if rest.len() >= 2 && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return true;
        }
    }
    tld.chars().count() >= 2 && tld.chars().all(|c| c.is_alphabetic())
}

/// Returns true if `hostname` is a fully qualified domain name.
pub fn is_fqdn(hostname: &str) -> bool {
    validate_fqdn(hostname).is_ok()
}

/// Converts a hostname into its label path, most significant label first.
///
/// `www.Example.com.` becomes `["com", "example", "www"]`. Labels are
/// lowercased so that lookups are case-insensitive.
pub fn hostname_labels(hostname: &str) -> Result<Vec<String>> {
    validate_fqdn(hostname)?;
    Ok(hostname
        .split('.')
        .filter(|label| !label.is_empty())
        .rev()
        .map(str::to_lowercase)
        .collect())
}
