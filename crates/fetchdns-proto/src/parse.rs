//! Presentation-format parsers.
//!
//! DoH JSON answers carry RDATA as text. Each parser here takes that text
//! and produces a typed [`Record`], or `None` when the text cannot be
//! interpreted. Numeric fields are best effort: anything that does not
//! parse becomes zero.

use crate::record::{Mx, Naptr, Record, Soa, Srv};
use crate::rtype::RecordType;
use std::str::FromStr;
use tracing::debug;

/// Parses the `data` field of an answer as the given record type.
///
/// Returns `None` when the record should be dropped. Wildcard answers are
/// never parsed directly; they are resolved per discovered type instead.
pub fn parse_answer(rtype: RecordType, data: &str) -> Option<Record> {
    let record = match rtype {
        RecordType::A => Record::A(data.to_string()),
        RecordType::AAAA => Record::Aaaa(data.to_string()),
        RecordType::CNAME => Record::Cname(data.to_string()),
        RecordType::NS => Record::Ns(data.to_string()),
        RecordType::PTR => Record::Ptr(data.to_string()),
        RecordType::TXT => Record::Txt(vec![data.to_string()]),
        RecordType::MX => Record::Mx(parse_mx(data)?),
        RecordType::SOA => Record::Soa(parse_soa(data)?),
        RecordType::SRV => Record::Srv(parse_srv(data)?),
        RecordType::NAPTR => Record::Naptr(parse_naptr(data)),
        RecordType::ANY => return None,
    };

    if record.is_empty() {
        debug!(%rtype, data, "Dropping empty record");
        return None;
    }

    Some(record)
}

/// Parses `<priority> <exchange>`.
pub fn parse_mx(data: &str) -> Option<Mx> {
    let mut tokens = data.split_whitespace();
    let (Some(priority), Some(exchange)) = (tokens.next(), tokens.next()) else {
        debug!(data, "MX record with empty priority or exchange");
        return None;
    };

    Some(Mx {
        priority: numeric(priority),
        exchange: exchange.to_string(),
    })
}

/// Parses `<nsname> <hostmaster> <serial> <refresh> <retry> <expire> <minttl>`.
pub fn parse_soa(data: &str) -> Option<Soa> {
    let tokens: Vec<&str> = data.split_whitespace().collect();
    let &[nsname, hostmaster, serial, refresh, retry, expire, minttl] = &tokens[..] else {
        debug!(data, fields = tokens.len(), "SOA record without seven fields");
        return None;
    };

    Some(Soa {
        nsname: nsname.to_string(),
        hostmaster: hostmaster.to_string(),
        serial: numeric(serial),
        refresh: numeric(refresh),
        retry: numeric(retry),
        expire: numeric(expire),
        minttl: numeric(minttl),
    })
}

/// Parses the last four whitespace-separated fields as
/// `<priority> <weight> <port> <target>`.
///
/// Some providers prefix the data with owner, class and type; taking the
/// trailing fields handles both shapes.
pub fn parse_srv(data: &str) -> Option<Srv> {
    let tokens: Vec<&str> = data.split_whitespace().collect();
    let Some([priority, weight, port, name]) = tokens
        .len()
        .checked_sub(4)
        .and_then(|start| <[&str; 4]>::try_from(&tokens[start..]).ok())
    else {
        debug!(data, fields = tokens.len(), "SRV record with fewer than four fields");
        return None;
    };

    Some(Srv {
        priority: numeric(priority),
        weight: numeric(weight),
        port: numeric(port),
        name: name.to_string(),
    })
}

/// Parses `<order> <preference> <flags> <service> <regexp> <replacement>`.
///
/// The four trailing fields may be double- or single-quoted, in which case
/// they may contain whitespace. Missing fields are empty strings and
/// unparseable leading numbers are zero.
pub fn parse_naptr(data: &str) -> Naptr {
    let (order, preference, rest) = leading_numbers(data.trim()).unwrap_or(("", "", ""));

    let (flags, rest) = next_token(rest);
    let (service, rest) = next_token(rest);
    let (regexp, rest) = next_token(rest);
    let (replacement, _) = next_token(rest);

    Naptr {
        order: numeric(order),
        preference: numeric(preference),
        flags,
        service,
        regexp,
        replacement,
    }
}

/// Best-effort numeric conversion; anything unparseable is zero.
fn numeric<T: FromStr + Default>(token: &str) -> T {
    token.trim().parse().unwrap_or_default()
}

/// Splits two leading digit runs off the input.
fn leading_numbers(input: &str) -> Option<(&str, &str, &str)> {
    let (first, rest) = split_digits(input)?;
    let (second, rest) = split_digits(rest.trim_start())?;
    Some((first, second, rest.trim_start()))
}

fn split_digits(input: &str) -> Option<(&str, &str)> {
    let end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    if end == 0 {
        None
    } else {
        Some(input.split_at(end))
    }
}

/// Takes one possibly-quoted token off the front of the input.
///
/// Returns the unquoted token and the remaining input with leading
/// whitespace removed. An exhausted input yields an empty token.
fn next_token(input: &str) -> (String, &str) {
    let input = input.trim_start();
    let Some(first) = input.chars().next() else {
        return (String::new(), input);
    };

    if first == '"' || first == '\'' {
        if let Some(end) = closing_quote(&input[1..], first) {
            let token = &input[1..1 + end];
            let rest = &input[1 + end + 1..];
            return (token.to_string(), rest.trim_start());
        }
    }

    let end = input.find(char::is_whitespace).unwrap_or(input.len());
    let (token, rest) = input.split_at(end);
    (token.to_string(), rest.trim_start())
}

/// Finds the byte offset of the first unescaped `quote` in `input`.
fn closing_quote(input: &str, quote: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            c if c == quote && !escaped => return Some(i),
            _ => escaped = false,
        }
    }
    None
}
