//! Allowlist of the network ranges the webhook source sends from.
//!
//! Ranges come from the `hooks` list of the source's metadata endpoint. The
//! current set is an immutable snapshot swapped under a read-mostly lock, so a
//! failed refresh leaves the previous snapshot in place.

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("hubrelay/", env!("CARGO_PKG_VERSION"));
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum AllowlistError {
    #[error("Failed to fetch address ranges: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Invalid CIDR block: {0}")]
    InvalidCidr(String),
}

/// One address block, e.g. `192.30.252.0/22` or `2a0a:a440::/29`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    network: IpAddr,
    prefix: u8,
}

impl Cidr {
    pub fn contains(&self, addr: IpAddr) -> bool {
        let addr = match addr {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(addr, IpAddr::V4),
            IpAddr::V4(_) => addr,
        };
        match (self.network, addr) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.prefix)).unwrap_or(0);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(self.prefix)).unwrap_or(0);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

impl FromStr for Cidr {
    type Err = AllowlistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AllowlistError::InvalidCidr(s.to_string());
        let (addr, prefix) = s.trim().split_once('/').ok_or_else(invalid)?;
        let network: IpAddr = addr.parse().map_err(|_| invalid())?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
        let max = if network.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(invalid());
        }
        Ok(Self { network, prefix })
    }
}

#[derive(Debug, Deserialize)]
struct SourceMeta {
    #[serde(default)]
    hooks: Vec<String>,
}

pub struct OriginAllowlist {
    client: reqwest::Client,
    meta_url: String,
    ranges: RwLock<Arc<Vec<Cidr>>>,
    last_update: RwLock<Option<DateTime<Utc>>>,
}

impl OriginAllowlist {
    pub fn new(meta_url: impl Into<String>) -> Result<Self, AllowlistError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            meta_url: meta_url.into(),
            ranges: RwLock::new(Arc::new(Vec::new())),
            last_update: RwLock::new(None),
        })
    }

    /// Fetch the published ranges and replace the current set.
    ///
    /// Any failure, including a single unparseable block, keeps the old set.
    pub async fn refresh(&self) -> Result<usize, AllowlistError> {
        let meta: SourceMeta = self
            .client
            .get(&self.meta_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let ranges = parse_ranges(&meta.hooks)?;
        let count = ranges.len();
        self.replace(ranges);
        info!(count, url = %self.meta_url, "origin allowlist refreshed");
        Ok(count)
    }

    /// Whether `addr` falls in any allowed range. Unparseable input is never allowed.
    pub fn is_allowed(&self, addr: &str) -> bool {
        let Ok(ip) = addr.trim().parse::<IpAddr>() else {
            debug!(addr, "unparseable remote address");
            return false;
        };
        let ranges = self.snapshot();
        ranges.iter().any(|cidr| cidr.contains(ip))
    }

    /// Install a fixed set of ranges instead of fetching them.
    pub fn set_ranges_for_testing<S: AsRef<str>>(&self, ranges: &[S]) -> Result<(), AllowlistError> {
        let ranges = parse_ranges(ranges)?;
        self.replace(ranges);
        Ok(())
    }

    pub fn snapshot(&self) -> Arc<Vec<Cidr>> {
        Arc::clone(&self.ranges.read())
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.last_update.read()
    }

    fn replace(&self, ranges: Vec<Cidr>) {
        *self.ranges.write() = Arc::new(ranges);
        *self.last_update.write() = Some(Utc::now());
    }

    /// Refresh every `period` until cancelled; failures keep the stale set.
    ///
    /// A zero period starts no refresh loop.
    pub fn spawn_refresher(
        self: Arc<Self>,
        period: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        if period.is_zero() {
            warn!("origin allowlist refresh period is zero, not refreshing");
            return tokio::spawn(async {});
        }
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.refresh().await {
                            warn!(error = %e, "origin allowlist refresh failed, keeping previous ranges");
                        }
                    }
                }
            }
        })
    }
}

fn parse_ranges<S: AsRef<str>>(ranges: &[S]) -> Result<Vec<Cidr>, AllowlistError> {
    ranges.iter().map(|r| r.as_ref().parse()).collect()
}
