//! Typed record data.

use crate::rtype::RecordType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed answer, tagged by record type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Record {
    /// IPv4 address in presentation format.
    A(String),
    /// IPv6 address in presentation format.
    #[serde(rename = "AAAA")]
    Aaaa(String),
    /// Canonical name.
    #[serde(rename = "CNAME")]
    Cname(String),
    /// Mail exchange.
    #[serde(rename = "MX")]
    Mx(Mx),
    /// Naming authority pointer.
    #[serde(rename = "NAPTR")]
    Naptr(Naptr),
    /// Name server.
    #[serde(rename = "NS")]
    Ns(String),
    /// Domain name pointer.
    #[serde(rename = "PTR")]
    Ptr(String),
    /// Start of authority.
    #[serde(rename = "SOA")]
    Soa(Soa),
    /// Service locator.
    #[serde(rename = "SRV")]
    Srv(Srv),
    /// Text record; one element per character-string as delivered.
    #[serde(rename = "TXT")]
    Txt(Vec<String>),
    /// A record discovered through a wildcard query.
    #[serde(rename = "ANY")]
    Any(AnyRecord),
}

impl Record {
    /// Returns the record type of this record.
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::A(_) => RecordType::A,
            Self::Aaaa(_) => RecordType::AAAA,
            Self::Cname(_) => RecordType::CNAME,
            Self::Mx(_) => RecordType::MX,
            Self::Naptr(_) => RecordType::NAPTR,
            Self::Ns(_) => RecordType::NS,
            Self::Ptr(_) => RecordType::PTR,
            Self::Soa(_) => RecordType::SOA,
            Self::Srv(_) => RecordType::SRV,
            Self::Txt(_) => RecordType::TXT,
            Self::Any(_) => RecordType::ANY,
        }
    }

    /// Returns the text of single-string records (A, AAAA, CNAME, NS, PTR).
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::A(s) | Self::Aaaa(s) | Self::Cname(s) | Self::Ns(s) | Self::Ptr(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if the record carries no data.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::A(s) | Self::Aaaa(s) | Self::Cname(s) | Self::Ns(s) | Self::Ptr(s) => {
                s.is_empty()
            }
            Self::Txt(strings) => strings.is_empty(),
            Self::Any(any) => any.record.is_empty(),
            Self::Mx(_) | Self::Naptr(_) | Self::Soa(_) | Self::Srv(_) => false,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A(s) | Self::Aaaa(s) | Self::Cname(s) | Self::Ns(s) | Self::Ptr(s) => {
                f.write_str(s)
            }
            Self::Mx(mx) => mx.fmt(f),
            Self::Naptr(naptr) => naptr.fmt(f),
            Self::Soa(soa) => soa.fmt(f),
            Self::Srv(srv) => srv.fmt(f),
            Self::Txt(strings) => {
                for (i, s) in strings.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{s:?}")?;
                }
                Ok(())
            }
            Self::Any(any) => write!(f, "{} {}", any.type_name, any.record),
        }
    }
}

/// MX record data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mx {
    /// Preference (lower is preferred).
    pub priority: u16,
    /// Mail exchange host.
    pub exchange: String,
}

impl fmt::Display for Mx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.priority, self.exchange)
    }
}

/// NAPTR record data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Naptr {
    /// Order (lower = processed first).
    pub order: u16,
    /// Preference among equal order values.
    pub preference: u16,
    /// Flags controlling interpretation.
    pub flags: String,
    /// Service field.
    pub service: String,
    /// Substitution expression.
    pub regexp: String,
    /// Replacement domain name.
    pub replacement: String,
}

impl fmt::Display for Naptr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {:?} {:?} {:?} {}",
            self.order, self.preference, self.flags, self.service, self.regexp, self.replacement
        )
    }
}

/// SOA record data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Soa {
    /// Primary name server.
    pub nsname: String,
    /// Responsible mailbox.
    pub hostmaster: String,
    /// Zone serial.
    pub serial: u32,
    /// Refresh interval (seconds).
    pub refresh: u32,
    /// Retry interval (seconds).
    pub retry: u32,
    /// Expire limit (seconds).
    pub expire: u32,
    /// Negative caching TTL (seconds).
    pub minttl: u32,
}

impl fmt::Display for Soa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {}",
            self.nsname,
            self.hostmaster,
            self.serial,
            self.refresh,
            self.retry,
            self.expire,
            self.minttl
        )
    }
}

/// SRV record data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Srv {
    /// Priority (lower is more preferred).
    pub priority: u16,
    /// Weight for load balancing among equal priority.
    pub weight: u16,
    /// TCP/UDP port number.
    pub port: u16,
    /// Target host name.
    pub name: String,
}

impl fmt::Display for Srv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.priority, self.weight, self.port, self.name
        )
    }
}

/// A record found by a wildcard query, annotated with its discovered type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnyRecord {
    /// Mnemonic of the type the record was discovered as.
    pub type_name: String,
    /// The record itself.
    pub record: Box<Record>,
}

impl AnyRecord {
    /// Annotates a record with its type mnemonic.
    pub fn new(type_name: impl Into<String>, record: Record) -> Self {
        Self {
            type_name: type_name.into(),
            record: Box::new(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_tags() {
        assert_eq!(Record::A("192.0.2.1".into()).record_type(), RecordType::A);
        assert_eq!(
            Record::Txt(vec!["v=spf1 -all".into()]).record_type(),
            RecordType::TXT
        );
        let any = Record::Any(AnyRecord::new("MX", Record::Ns("ns1.example.com".into())));
        assert_eq!(any.record_type(), RecordType::ANY);
    }

    #[test]
    fn test_empty_records() {
        assert!(Record::A(String::new()).is_empty());
        assert!(Record::Txt(Vec::new()).is_empty());
        assert!(!Record::Ns("ns1.example.com".into()).is_empty());
        assert!(!Record::Mx(Mx {
            priority: 0,
            exchange: ".".into(),
        })
        .is_empty());
    }

    #[test]
    fn test_display() {
        let srv = Record::Srv(Srv {
            priority: 10,
            weight: 5,
            port: 5060,
            name: "sip.example.com.".into(),
        });
        assert_eq!(srv.to_string(), "10 5 5060 sip.example.com.");

        let txt = Record::Txt(vec!["hello world".into()]);
        assert_eq!(txt.to_string(), "\"hello world\"");
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_value(Record::Cname("alias.example.com.".into())).unwrap();
        assert_eq!(json["type"], "CNAME");
        assert_eq!(json["value"], "alias.example.com.");
    }
}
