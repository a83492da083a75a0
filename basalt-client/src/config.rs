//! Client configuration with a builder surface.
//!
//! Everything that used to be ambient process state in comparable clients
//! (field formatter, class registry, default ACLs, server caps) lives on an
//! explicit configuration value handed to the client at construction.

use std::collections::HashMap;
use std::time::Duration;

use crate::constants::{DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_LIMIT, DEFAULT_MOUNT_PATH};
use crate::naming::{ClassRegistry, FieldFormatter};
use crate::object::Acl;
use crate::query::CompileContext;
use crate::resilience::{ConcurrencyConfig, RetryConfig};

/// Server-enforced limits the client needs to know about. Both values have
/// moved across server versions, so they are configuration with documented
/// defaults rather than constants.
#[derive(Debug, Clone, Copy)]
pub struct ServerCaps {
    /// Operations per batch request.
    pub max_batch_size: usize,
    /// What a max-limit query resolves to.
    pub max_limit: u64,
}

impl Default for ServerCaps {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_limit: DEFAULT_MAX_LIMIT,
        }
    }
}

/// Full client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    /// REST API mount point, prefixed onto every request path.
    pub mount_path: String,
    pub application_id: String,
    pub api_key: Option<String>,
    pub master_key: Option<String>,
    pub field_formatter: FieldFormatter,
    pub classes: ClassRegistry,
    default_acls: HashMap<String, Acl>,
    /// Default cache lifetime; `None` disables caching unless a query asks
    /// for it explicitly.
    pub cache_ttl: Option<Duration>,
    pub retry: RetryConfig,
    pub concurrency: ConcurrencyConfig,
    pub caps: ServerCaps,
}

impl ClientConfig {
    pub fn builder(
        server_url: impl Into<String>,
        application_id: impl Into<String>,
    ) -> ClientConfigBuilder {
        ClientConfigBuilder::new(server_url, application_id)
    }

    /// The configured default ACL for a class, if any rules were declared.
    pub fn default_acl(&self, class_name: &str) -> Option<&Acl> {
        self.default_acls.get(class_name)
    }

    pub(crate) fn compile_context(&self) -> CompileContext {
        CompileContext {
            formatter: self.field_formatter,
            classes: self.classes.clone(),
            caps: self.caps,
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new(server_url: impl Into<String>, application_id: impl Into<String>) -> Self {
        Self {
            config: ClientConfig {
                server_url: server_url.into(),
                mount_path: DEFAULT_MOUNT_PATH.to_string(),
                application_id: application_id.into(),
                api_key: None,
                master_key: None,
                field_formatter: FieldFormatter::default(),
                classes: ClassRegistry::new(),
                default_acls: HashMap::new(),
                cache_ttl: None,
                retry: RetryConfig::default(),
                concurrency: ConcurrencyConfig::default(),
                caps: ServerCaps::default(),
            },
        }
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn master_key(mut self, key: impl Into<String>) -> Self {
        self.config.master_key = Some(key.into());
        self
    }

    pub fn mount_path(mut self, path: impl Into<String>) -> Self {
        self.config.mount_path = path.into();
        self
    }

    pub fn field_formatter(mut self, formatter: FieldFormatter) -> Self {
        self.config.field_formatter = formatter;
        self
    }

    /// Register an explicit field-to-collection mapping for identifier
    /// constraints.
    pub fn register_class(
        mut self,
        field: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        self.config.classes.register(field, collection);
        self
    }

    /// Declare one default ACL rule for a class. Rules accumulate in order;
    /// re-declaring a subject (the public `"*"` subject included) replaces
    /// its previous rule, and a rule granting nothing removes the subject's
    /// entry.
    pub fn default_acl(
        mut self,
        class_name: impl Into<String>,
        subject: impl Into<String>,
        read: bool,
        write: bool,
    ) -> Self {
        self.config
            .default_acls
            .entry(class_name.into())
            .or_default()
            .apply(subject, read, write);
        self
    }

    /// Declare a default role rule for a class; sugar for the
    /// `"role:<name>"` subject.
    pub fn default_role_acl(
        mut self,
        class_name: impl Into<String>,
        role: &str,
        read: bool,
        write: bool,
    ) -> Self {
        self.config
            .default_acls
            .entry(class_name.into())
            .or_default()
            .apply_role(role, read, write);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = Some(ttl);
        self
    }

    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the per-request attempt budget.
    pub fn retry_limit(mut self, limit: u32) -> Self {
        self.config.retry.limit = limit;
        self
    }

    pub fn concurrency_config(mut self, concurrency: ConcurrencyConfig) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    pub fn server_caps(mut self, caps: ServerCaps) -> Self {
        self.config.caps = caps;
        self
    }

    pub fn max_batch_size(mut self, cap: usize) -> Self {
        self.config.caps.max_batch_size = cap;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
