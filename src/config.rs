//! Layered configuration
//!
//! `AaeConfig` mirrors spec.md §6's configuration keys and is loaded through
//! the `config` crate's layered builder (defaults → optional file → `AAE_`
//! environment variables), the way `mofa-kernel`'s `config::load_with_env`
//! layers `File`/`Environment` sources before `try_deserialize`ing into a
//! caller-supplied type.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::domain::{BucketId, Scope, ScheduleWants};
use crate::error::CoordinatorError;
use crate::exchange::driver::EndpointConfig;
use crate::http_client::Protocol;

/// `scope` configuration key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    /// Compare the whole key-space under a fixed n-val pair.
    All,
    /// Compare by a rotating bucket list.
    Bucket,
    /// No anti-entropy traffic; schedule degenerates to all-`NoSync`.
    Disabled,
}

/// Raw configuration as loaded from file/environment, before the
/// scope/quota validation spec.md §7 calls for.
#[derive(Clone, Debug, Deserialize)]
pub struct AaeConfig {
    /// `scope`.
    pub scope: ScopeKind,
    /// `localnval`; required when `scope = all`.
    pub localnval: Option<u32>,
    /// `remotenval`; required when `scope = all`.
    pub remotenval: Option<u32>,
    /// `bucket`; required when `scope = bucket`.
    pub bucket: Option<String>,
    /// `buckettype`; required when `scope = bucket`.
    pub buckettype: Option<String>,
    /// `nocheck` quota.
    pub nocheck: u32,
    /// `allcheck` quota.
    pub allcheck: u32,
    /// `hourcheck` quota.
    pub hourcheck: u32,
    /// `daycheck` quota.
    pub daycheck: u32,
    /// `peerip`.
    pub peerip: String,
    /// `peerport`.
    pub peerport: u16,
    /// `peerprotocol`.
    pub peerprotocol: Protocol,
    /// `localip`.
    pub localip: String,
    /// `localport`.
    pub localport: u16,
    /// `localprotocol`.
    pub localprotocol: Protocol,
    /// `queuename`.
    pub queuename: String,
}

/// Everything [`AaeConfig::into_state`] produces: the validated pieces a
/// [`crate::coordinator::CoordinatorInit`] needs, minus the adapters
/// (membership oracle, engine, queue, clock) that are wired up by the
/// binary entry point rather than loaded from configuration.
pub struct CoordinatorConfig {
    /// Validated initial scope.
    pub scope: Scope,
    /// Quotas derived per spec.md §6's table.
    pub schedule_wants: ScheduleWants,
    /// Remote cluster endpoint.
    pub remote_endpoint: EndpointConfig,
    /// Local cluster endpoint.
    pub local_endpoint: EndpointConfig,
    /// Replication queue name.
    pub queue_name: String,
}

impl AaeConfig {
    /// Load configuration layered as defaults → optional TOML file at
    /// `path` (if it exists) → `AAE_`-prefixed environment variables
    /// (double-underscore nesting, matching `mofa-kernel`'s convention).
    pub fn load(path: Option<&str>) -> Result<Self, CoordinatorError> {
        let mut builder = Config::builder()
            .set_default("nocheck", 0)?
            .set_default("allcheck", 0)?
            .set_default("hourcheck", 0)?
            .set_default("daycheck", 0)?
            .set_default("peerprotocol", "http")?
            .set_default("localprotocol", "http")?
            .set_default("queuename", "aae_repair")?;

        if let Some(path) = path {
            if std::path::Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        let config = builder
            .add_source(Environment::with_prefix("AAE").separator("__"))
            .build()
            .map_err(|e| CoordinatorError::Configuration(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| CoordinatorError::Configuration(e.to_string()))
    }

    /// Validate and translate into the pieces a coordinator needs,
    /// implementing spec.md §7's configuration-error taxonomy at startup
    /// rather than per-work-item (invalid configuration should fail fast,
    /// not surface as a recurring per-slice warning).
    pub fn into_state(self) -> Result<CoordinatorConfig, CoordinatorError> {
        let scope = match self.scope {
            ScopeKind::All => {
                let local_nval = self.localnval.ok_or_else(|| {
                    CoordinatorError::Configuration("localnval is required when scope=all".to_string())
                })?;
                let remote_nval = self.remotenval.ok_or_else(|| {
                    CoordinatorError::Configuration("remotenval is required when scope=all".to_string())
                })?;
                if self.hourcheck != 0 || self.daycheck != 0 {
                    return Err(CoordinatorError::Configuration(
                        "scope=all cannot carry hourcheck/daycheck quotas".to_string(),
                    ));
                }
                Scope::All { local_nval, remote_nval }
            }
            ScopeKind::Bucket => {
                let bucket = self.bucket.ok_or_else(|| {
                    CoordinatorError::Configuration("bucket is required when scope=bucket".to_string())
                })?;
                let bucket_type = self.buckettype.ok_or_else(|| {
                    CoordinatorError::Configuration("buckettype is required when scope=bucket".to_string())
                })?;
                Scope::Bucket {
                    buckets: vec![BucketId::new(bucket, bucket_type)],
                }
            }
            ScopeKind::Disabled => Scope::Disabled,
        };

        let schedule_wants = match self.scope {
            ScopeKind::All => ScheduleWants::new(self.nocheck, self.allcheck, 0, 0),
            ScopeKind::Bucket => ScheduleWants::new(self.nocheck, self.allcheck, self.daycheck, self.hourcheck),
            ScopeKind::Disabled => ScheduleWants::disabled(),
        };
        if schedule_wants.slice_count() == 0 {
            return Err(CoordinatorError::Configuration(
                "schedule-wants quotas sum to zero".to_string(),
            ));
        }

        Ok(CoordinatorConfig {
            scope,
            schedule_wants,
            remote_endpoint: EndpointConfig {
                protocol: self.peerprotocol,
                ip: self.peerip,
                port: self.peerport,
            },
            local_endpoint: EndpointConfig {
                protocol: self.localprotocol,
                ip: self.localip,
                port: self.localport,
            },
            queue_name: self.queuename,
        })
    }
}

/// Timeout applied to HTTP clients the driver opens per exchange. Not a
/// configuration key in spec.md §6; fixed the way the teacher fixes its own
/// `network_timeout` in `gossip/config.rs`.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

impl From<config::ConfigError> for CoordinatorError {
    fn from(err: config::ConfigError) -> Self {
        CoordinatorError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AaeConfig {
        AaeConfig {
            scope: ScopeKind::All,
            localnval: Some(3),
            remotenval: Some(3),
            bucket: None,
            buckettype: None,
            nocheck: 23,
            allcheck: 1,
            hourcheck: 0,
            daycheck: 0,
            peerip: "10.0.0.1".to_string(),
            peerport: 8098,
            peerprotocol: Protocol::Http,
            localip: "127.0.0.1".to_string(),
            localport: 8098,
            localprotocol: Protocol::Http,
            queuename: "aae_repair".to_string(),
        }
    }

    #[test]
    fn all_scope_derives_two_quota_wants() {
        let state = base().into_state().unwrap();
        assert_eq!(state.schedule_wants, ScheduleWants::new(23, 1, 0, 0));
        assert!(matches!(state.scope, Scope::All { local_nval: 3, remote_nval: 3 }));
    }

    #[test]
    fn all_scope_rejects_nonzero_hour_or_day_quota() {
        let mut config = base();
        config.hourcheck = 1;
        assert!(config.into_state().is_err());
    }

    #[test]
    fn all_scope_requires_nvals() {
        let mut config = base();
        config.localnval = None;
        assert!(config.into_state().is_err());
    }

    #[test]
    fn bucket_scope_requires_bucket_and_type() {
        let mut config = base();
        config.scope = ScopeKind::Bucket;
        assert!(config.into_state().is_err());
        config.bucket = Some("b".to_string());
        config.buckettype = Some("t".to_string());
        let state = config.into_state().unwrap();
        assert_eq!(state.schedule_wants, ScheduleWants::new(23, 1, 0, 0));
    }

    #[test]
    fn disabled_scope_forces_twenty_four_no_sync_quota() {
        let mut config = base();
        config.scope = ScopeKind::Disabled;
        let state = config.into_state().unwrap();
        assert_eq!(state.schedule_wants, ScheduleWants::disabled());
    }

    #[test]
    fn zero_sum_quotas_are_rejected() {
        let mut config = base();
        config.nocheck = 0;
        config.allcheck = 0;
        assert!(config.into_state().is_err());
    }
}
