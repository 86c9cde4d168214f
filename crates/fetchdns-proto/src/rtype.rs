//! DNS record types.
//!
//! [`RecordType`] covers the types this resolver can query and parse. The
//! [`RecordTypeRegistry`] maps every IANA-allocated numeric type code to its
//! mnemonic, which is how answers of a wildcard query are identified.

use crate::error::{Error, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, trace};

/// Record types supported by the resolution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    /// IPv4 address - RFC 1035
    A,

    /// IPv6 address - RFC 3596
    AAAA,

    /// Canonical name (alias) - RFC 1035
    CNAME,

    /// Mail exchange - RFC 1035
    MX,

    /// Naming authority pointer - RFC 3403
    NAPTR,

    /// Authoritative name server - RFC 1035
    NS,

    /// Domain name pointer - RFC 1035
    PTR,

    /// Start of authority - RFC 1035
    SOA,

    /// Server selection - RFC 2782
    SRV,

    /// Text strings - RFC 1035
    TXT,

    /// Wildcard query for all record types.
    ANY,
}

impl RecordType {
    /// All supported types, in declaration order.
    pub const ALL: [RecordType; 11] = [
        Self::A,
        Self::AAAA,
        Self::CNAME,
        Self::MX,
        Self::NAPTR,
        Self::NS,
        Self::PTR,
        Self::SOA,
        Self::SRV,
        Self::TXT,
        Self::ANY,
    ];

    /// Returns the mnemonic.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::AAAA => "AAAA",
            Self::CNAME => "CNAME",
            Self::MX => "MX",
            Self::NAPTR => "NAPTR",
            Self::NS => "NS",
            Self::PTR => "PTR",
            Self::SOA => "SOA",
            Self::SRV => "SRV",
            Self::TXT => "TXT",
            Self::ANY => "ANY",
        }
    }

    /// Returns the value sent as the `type` query parameter.
    ///
    /// The wildcard type is spelled `*` on the wire.
    pub const fn query_param(&self) -> &'static str {
        match self {
            Self::ANY => "*",
            other => other.as_str(),
        }
    }

    /// Returns the numeric type code.
    pub const fn to_u16(&self) -> u16 {
        match self {
            Self::A => 1,
            Self::NS => 2,
            Self::CNAME => 5,
            Self::SOA => 6,
            Self::PTR => 12,
            Self::MX => 15,
            Self::TXT => 16,
            Self::AAAA => 28,
            Self::SRV => 33,
            Self::NAPTR => 35,
            Self::ANY => 255,
        }
    }

    /// Returns true for the wildcard type.
    pub const fn is_any(&self) -> bool {
        matches!(self, Self::ANY)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = Error;

    /// Parses a mnemonic case-insensitively. `*` is accepted for `ANY`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "*" {
            return Ok(Self::ANY);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownRecordType(s.to_string()))
    }
}

// =============================================================================
// IANA registry
// =============================================================================

/// IANA "Resource Record (RR) TYPEs" allocations as `(TYPE, Value)` pairs.
///
/// Values are either a single code or an inclusive `start-stop` range.
pub const IANA_ALLOCATIONS: &[(&str, &str)] = &[
    ("Reserved", "0"),
    ("A", "1"),
    ("NS", "2"),
    ("MD", "3"),
    ("MF", "4"),
    ("CNAME", "5"),
    ("SOA", "6"),
    ("MB", "7"),
    ("MG", "8"),
    ("MR", "9"),
    ("NULL", "10"),
    ("WKS", "11"),
    ("PTR", "12"),
    ("HINFO", "13"),
    ("MINFO", "14"),
    ("MX", "15"),
    ("TXT", "16"),
    ("RP", "17"),
    ("AFSDB", "18"),
    ("X25", "19"),
    ("ISDN", "20"),
    ("RT", "21"),
    ("NSAP", "22"),
    ("NSAP-PTR", "23"),
    ("SIG", "24"),
    ("KEY", "25"),
    ("PX", "26"),
    ("GPOS", "27"),
    ("AAAA", "28"),
    ("LOC", "29"),
    ("NXT", "30"),
    ("EID", "31"),
    ("NIMLOC", "32"),
    ("SRV", "33"),
    ("ATMA", "34"),
    ("NAPTR", "35"),
    ("KX", "36"),
    ("CERT", "37"),
    ("A6", "38"),
    ("DNAME", "39"),
    ("SINK", "40"),
    ("OPT", "41"),
    ("APL", "42"),
    ("DS", "43"),
    ("SSHFP", "44"),
    ("IPSECKEY", "45"),
    ("RRSIG", "46"),
    ("NSEC", "47"),
    ("DNSKEY", "48"),
    ("DHCID", "49"),
    ("NSEC3", "50"),
    ("NSEC3PARAM", "51"),
    ("TLSA", "52"),
    ("SMIMEA", "53"),
    ("Unassigned", "54"),
    ("HIP", "55"),
    ("NINFO", "56"),
    ("RKEY", "57"),
    ("TALINK", "58"),
    ("CDS", "59"),
    ("CDNSKEY", "60"),
    ("OPENPGPKEY", "61"),
    ("CSYNC", "62"),
    ("ZONEMD", "63"),
    ("SVCB", "64"),
    ("HTTPS", "65"),
    ("DSYNC", "66"),
    ("Unassigned", "67-98"),
    ("SPF", "99"),
    ("UINFO", "100"),
    ("UID", "101"),
    ("GID", "102"),
    ("UNSPEC", "103"),
    ("NID", "104"),
    ("L32", "105"),
    ("L64", "106"),
    ("LP", "107"),
    ("EUI48", "108"),
    ("EUI64", "109"),
    ("Unassigned", "110-248"),
    ("TKEY", "249"),
    ("TSIG", "250"),
    ("IXFR", "251"),
    ("AXFR", "252"),
    ("MAILB", "253"),
    ("MAILA", "254"),
    ("*", "255"),
    ("URI", "256"),
    ("CAA", "257"),
    ("AVC", "258"),
    ("DOA", "259"),
    ("AMTRELAY", "260"),
    ("RESINFO", "261"),
    ("WALLET", "262"),
    ("CLA", "263"),
    ("IPN", "264"),
    ("Unassigned", "265-32767"),
    ("TA", "32768"),
    ("DLV", "32769"),
    ("Unassigned", "32770-65279"),
    ("Private use", "65280-65534"),
    ("Reserved", "65535"),
];

/// Allocation kinds that never name a usable type.
const UNUSED_ALLOCATIONS: [&str; 3] = ["Unassigned", "Private use", "Reserved"];

static REGISTRY: OnceCell<RecordTypeRegistry> = OnceCell::new();

/// Returns the process-wide registry, building it on first use.
pub fn registry() -> &'static RecordTypeRegistry {
    REGISTRY.get_or_init(|| RecordTypeRegistry::from_allocations(IANA_ALLOCATIONS))
}

/// Immutable mapping from numeric type code to mnemonic.
#[derive(Debug, Clone)]
pub struct RecordTypeRegistry {
    names: HashMap<u16, &'static str>,
}

impl RecordTypeRegistry {
    /// Builds a registry from an allocation table.
    ///
    /// Unused allocations are skipped, as are ranges with a zero bound and
    /// values that are not numeric.
    pub fn from_allocations(table: &[(&'static str, &'static str)]) -> Self {
        let mut names = HashMap::new();

        for &(name, value) in table {
            if UNUSED_ALLOCATIONS.contains(&name) {
                trace!(name, value, "Skipping unused RRTYPE allocation");
                continue;
            }

            match value.split_once('-') {
                Some((start, stop)) => {
                    let start = start.trim().parse::<u16>().unwrap_or(0);
                    let stop = stop.trim().parse::<u16>().unwrap_or(0);
                    if start == 0 || stop == 0 {
                        debug!(name, value, "Skipping unbounded RRTYPE range");
                        continue;
                    }
                    for code in start..=stop {
                        names.insert(code, name);
                    }
                }
                None => match value.trim().parse::<u16>() {
                    Ok(code) => {
                        names.insert(code, name);
                    }
                    Err(_) => debug!(name, value, "Skipping non-numeric RRTYPE value"),
                },
            }
        }

        Self { names }
    }

    /// Returns the mnemonic for a numeric type code.
    pub fn lookup(&self, code: u16) -> Option<&'static str> {
        let name = self.names.get(&code).copied();
        trace!(code, ?name, "Looked up RRTYPE");
        name
    }

    /// Returns the number of mapped codes.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
