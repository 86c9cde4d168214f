//! Address lookup with IPv4/IPv6 policy.

use crate::engine::DohResolver;
use crate::{ResolverError, Result};
use fetchdns_proto::RecordType;
use futures::future::{select_ok, BoxFuture};
use futures::FutureExt;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use tracing::debug;

/// Address family requested from a lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Family {
    /// Either family; IPv4 and IPv6 are raced.
    #[default]
    Any,
    /// IPv4 only.
    V4,
    /// IPv6 only.
    V6,
}

impl Family {
    /// Maps the conventional numeric family (0, 4 or 6).
    pub fn from_number(family: u8) -> Option<Self> {
        match family {
            0 => Some(Self::Any),
            4 => Some(Self::V4),
            6 => Some(Self::V6),
            _ => None,
        }
    }

    /// Returns the conventional numeric family.
    pub const fn number(&self) -> u8 {
        match self {
            Self::Any => 0,
            Self::V4 => 4,
            Self::V6 => 6,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// A looked-up address and the family it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupAddress {
    /// Address in presentation format.
    pub address: String,
    /// 4 or 6.
    pub family: u8,
}

impl LookupAddress {
    fn v4(address: String) -> Self {
        Self { address, family: 4 }
    }

    fn v6(address: String) -> Self {
        Self { address, family: 6 }
    }
}

impl DohResolver {
    /// Looks up one address of `hostname`.
    ///
    /// IPv4 yields the first address, IPv6 a random one. With
    /// [`Family::Any`] both are queried and the first to succeed wins; the
    /// other result is discarded. It fails only when both fail.
    pub async fn lookup(&self, hostname: &str, family: Family) -> Result<LookupAddress> {
        match family {
            Family::V4 => self.lookup4(hostname).await,
            Family::V6 => self.lookup6(hostname).await,
            Family::Any => {
                let racers: Vec<BoxFuture<'_, Result<LookupAddress>>> =
                    vec![self.lookup4(hostname).boxed(), self.lookup6(hostname).boxed()];
                let (address, _) = select_ok(racers).await?;
                debug!(hostname, family = address.family, "Dual-stack lookup settled");
                Ok(address)
            }
        }
    }

    /// Looks up every address of `hostname` in the requested family.
    ///
    /// [`Family::Any`] queries both families concurrently and returns IPv4
    /// addresses first. It fails if either family fails.
    pub async fn lookup_all(&self, hostname: &str, family: Family) -> Result<Vec<LookupAddress>> {
        match family {
            Family::V4 => self.all4(hostname).await,
            Family::V6 => self.all6(hostname).await,
            Family::Any => {
                let (mut v4, v6) = futures::try_join!(self.all4(hostname), self.all6(hostname))?;
                v4.extend(v6);
                Ok(v4)
            }
        }
    }

    /// Reverse lookups have no DoH counterpart.
    pub async fn reverse(&self, ip: IpAddr) -> Result<Vec<String>> {
        Err(ResolverError::NotImplemented(format!("reverse lookup of {ip}")))
    }

    /// Service name lookups have no DoH counterpart.
    pub async fn lookup_service(&self, address: IpAddr, port: u16) -> Result<(String, String)> {
        Err(ResolverError::NotImplemented(format!(
            "service lookup of {address}:{port}"
        )))
    }

    async fn lookup4(&self, hostname: &str) -> Result<LookupAddress> {
        let addresses = self.resolve4(hostname).await?;
        addresses
            .into_iter()
            .next()
            .map(LookupAddress::v4)
            .ok_or_else(|| ResolverError::not_found(hostname, RecordType::A))
    }

    async fn lookup6(&self, hostname: &str) -> Result<LookupAddress> {
        let addresses = self.resolve6(hostname).await?;
        addresses
            .choose(&mut rand::thread_rng())
            .cloned()
            .map(LookupAddress::v6)
            .ok_or_else(|| ResolverError::not_found(hostname, RecordType::AAAA))
    }

    async fn all4(&self, hostname: &str) -> Result<Vec<LookupAddress>> {
        let addresses = self.resolve4(hostname).await?;
        Ok(addresses.into_iter().map(LookupAddress::v4).collect())
    }

    async fn all6(&self, hostname: &str) -> Result<Vec<LookupAddress>> {
        let addresses = self.resolve6(hostname).await?;
        Ok(addresses.into_iter().map(LookupAddress::v6).collect())
    }
}
