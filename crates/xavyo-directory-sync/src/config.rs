//! Synchronization configuration
//!
//! Per-composite encoding policies and fixed-type lists, sub-resource
//! toggles and the timing knobs of one run. Built by the host's
//! configuration loader, validated here once before object types are built.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::error::{SyncError, SyncResult};
use crate::projector::{EncodingPolicy, PRIMARY_KEY};

/// Encoding of one composite field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeConfig {
    #[serde(default)]
    pub format: EncodingPolicy,

    /// Types flattened into their own attributes, in schema order.
    #[serde(default)]
    pub fixed_types: Vec<String>,
}

impl CompositeConfig {
    pub fn new(format: EncodingPolicy) -> Self {
        Self {
            format,
            fixed_types: Vec::new(),
        }
    }

    /// Flatten the given types.
    pub fn flatten<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            format: EncodingPolicy::FlattenKnownTypes,
            fixed_types: types.into_iter().map(Into::into).collect(),
        }
    }

    /// Types that take effect. Only flattening uses them.
    pub fn effective_types(&self) -> Vec<String> {
        match self.format {
            EncodingPolicy::FlattenKnownTypes => self.fixed_types.clone(),
            _ => Vec::new(),
        }
    }

    fn validate(&self, field: &str) -> SyncResult<()> {
        let mut seen = HashSet::new();
        for fixed_type in &self.fixed_types {
            if fixed_type.trim().is_empty() {
                return Err(SyncError::invalid_configuration(format!(
                    "{field}: fixed type names cannot be empty"
                )));
            }
            if fixed_type == PRIMARY_KEY {
                return Err(SyncError::invalid_configuration(format!(
                    "{field}: '{PRIMARY_KEY}' is reserved and cannot be a fixed type"
                )));
            }
            if !seen.insert(fixed_type.as_str()) {
                return Err(SyncError::DuplicateFixedType {
                    field: field.to_string(),
                    fixed_type: fixed_type.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Retry settings for calls that race post-create propagation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// Configuration of one synchronization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub phones: CompositeConfig,
    #[serde(default)]
    pub websites: CompositeConfig,
    #[serde(default)]
    pub organizations: CompositeConfig,
    #[serde(default)]
    pub ims: CompositeConfig,
    #[serde(default)]
    pub addresses: CompositeConfig,
    #[serde(default)]
    pub external_ids: CompositeConfig,
    #[serde(default)]
    pub relations: CompositeConfig,

    /// Exported organizations without a type get the first fixed type.
    #[serde(default)]
    pub force_organizations_fixed_type_on_missing_type: bool,

    #[serde(default)]
    pub make_new_send_as_addresses_default: bool,

    /// Expose the `sendAs` attribute on users.
    #[serde(default = "default_true")]
    pub send_as_enabled: bool,

    /// Wait after creating an object before touching its sub-resources.
    #[serde(default = "default_settling_delay_ms")]
    pub settling_delay_ms: u64,

    /// Objects exported concurrently by the batch driver.
    #[serde(default = "default_export_concurrency")]
    pub export_concurrency: usize,

    #[serde(default)]
    pub admin_retry: RetryConfig,

    /// Users whose primary email does not match are skipped on import.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_filter: Option<String>,

    /// Groups whose email does not match are skipped on import.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_filter: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_settling_delay_ms() -> u64 {
    1000
}

fn default_export_concurrency() -> usize {
    30
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            phones: CompositeConfig::default(),
            websites: CompositeConfig::default(),
            organizations: CompositeConfig::default(),
            ims: CompositeConfig::default(),
            addresses: CompositeConfig::default(),
            external_ids: CompositeConfig::default(),
            relations: CompositeConfig::default(),
            force_organizations_fixed_type_on_missing_type: false,
            make_new_send_as_addresses_default: false,
            send_as_enabled: default_true(),
            settling_delay_ms: default_settling_delay_ms(),
            export_concurrency: default_export_concurrency(),
            admin_retry: RetryConfig::default(),
            user_filter: None,
            group_filter: None,
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SyncError::invalid_configuration(format!("malformed configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_phones(mut self, phones: CompositeConfig) -> Self {
        self.phones = phones;
        self
    }

    pub fn with_websites(mut self, websites: CompositeConfig) -> Self {
        self.websites = websites;
        self
    }

    pub fn with_organizations(mut self, organizations: CompositeConfig) -> Self {
        self.organizations = organizations;
        self
    }

    pub fn with_ims(mut self, ims: CompositeConfig) -> Self {
        self.ims = ims;
        self
    }

    pub fn with_addresses(mut self, addresses: CompositeConfig) -> Self {
        self.addresses = addresses;
        self
    }

    pub fn with_external_ids(mut self, external_ids: CompositeConfig) -> Self {
        self.external_ids = external_ids;
        self
    }

    pub fn with_relations(mut self, relations: CompositeConfig) -> Self {
        self.relations = relations;
        self
    }

    pub fn with_settling_delay_ms(mut self, ms: u64) -> Self {
        self.settling_delay_ms = ms;
        self
    }

    pub fn with_export_concurrency(mut self, concurrency: usize) -> Self {
        self.export_concurrency = concurrency;
        self
    }

    pub fn with_admin_retry(mut self, retry: RetryConfig) -> Self {
        self.admin_retry = retry;
        self
    }

    pub fn with_user_filter(mut self, pattern: impl Into<String>) -> Self {
        self.user_filter = Some(pattern.into());
        self
    }

    pub fn with_group_filter(mut self, pattern: impl Into<String>) -> Self {
        self.group_filter = Some(pattern.into());
        self
    }

    pub fn settling_delay(&self) -> Duration {
        Duration::from_millis(self.settling_delay_ms)
    }

    /// Composite configurations by attribute name, in schema order.
    pub fn composites(&self) -> [(&'static str, &CompositeConfig); 7] {
        [
            ("phones", &self.phones),
            ("websites", &self.websites),
            ("organizations", &self.organizations),
            ("ims", &self.ims),
            ("addresses", &self.addresses),
            ("externalIds", &self.external_ids),
            ("relations", &self.relations),
        ]
    }

    pub fn validate(&self) -> SyncResult<()> {
        for (field, composite) in self.composites() {
            composite.validate(field)?;
        }
        if self.export_concurrency == 0 {
            return Err(SyncError::invalid_configuration(
                "export_concurrency must be greater than zero",
            ));
        }
        self.user_filter_regex()?;
        self.group_filter_regex()?;
        Ok(())
    }

    pub fn user_filter_regex(&self) -> SyncResult<Option<Regex>> {
        compile_filter("user_filter", self.user_filter.as_deref())
    }

    pub fn group_filter_regex(&self) -> SyncResult<Option<Regex>> {
        compile_filter("group_filter", self.group_filter.as_deref())
    }
}

fn compile_filter(field: &str, pattern: Option<&str>) -> SyncResult<Option<Regex>> {
    pattern
        .filter(|p| !p.is_empty())
        .map(|p| {
            Regex::new(p).map_err(|e| {
                SyncError::invalid_configuration(format!("{field} is not a valid regex: {e}"))
            })
        })
        .transpose()
}

/// Split a newline-separated fixed-type list, dropping blank lines.
pub fn fixed_types_from_lines(lines: &str) -> Vec<String> {
    lines
        .split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// What the capability check found on the remote tenant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantCapabilities {
    /// The tenant defines a custom user schema extension.
    #[serde(default)]
    pub custom_schema_present: bool,
}
