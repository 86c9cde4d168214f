//! # fetchdns protocol types
//!
//! Record types, typed record data and the presentation-format parsers used
//! to turn DNS-over-HTTPS JSON answers into structured records.
//!
//! DoH providers that speak `application/dns-json` return every answer's
//! RDATA as a presentation-format string (`"10 mx.example.com."`). This crate
//! does not handle DNS wire format at all.
//!
//! ## Example
//!
//! ```rust
//! use fetchdns_proto::{parse_answer, Record, RecordType};
//!
//! let record = parse_answer(RecordType::MX, "10 mx.example.com.").unwrap();
//! assert!(matches!(record, Record::Mx(ref mx) if mx.priority == 10));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod json;
pub mod name;
pub mod parse;
pub mod record;
pub mod rtype;

pub use error::{Error, Result};
pub use json::{DohAnswer, DohMessage};
pub use name::{hostname_labels, is_fqdn, validate_fqdn};
pub use parse::parse_answer;
pub use record::{AnyRecord, Mx, Naptr, Record, Soa, Srv};
pub use rtype::{registry, RecordType, RecordTypeRegistry};

/// Maximum length of a DNS label (63 bytes per RFC 1035)
pub const MAX_LABEL_LENGTH: usize = 63;

/// Maximum length of a textual domain name, without the trailing dot.
pub const MAX_NAME_LENGTH: usize = 253;

/// TTL applied when a provider omits an answer's TTL or sends a non-numeric one.
pub const DEFAULT_TTL_SECS: u32 = 3600;
