//! Shared AWS configuration context
//!
//! Provides `AwsContext` for loading AWS SDK configuration once per
//! invocation and creating service clients from it, optionally bound to a
//! region other than the default one.

use crate::config::AwsConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use std::marker::PhantomData;
use std::sync::Arc;

/// Shared AWS configuration context for creating service clients.
///
/// Clients are created explicitly from a context and handed to the
/// handlers; nothing is kept in process-wide state.
#[derive(Clone)]
pub struct AwsContext {
    config: Arc<SdkConfig>,
}

impl AwsContext {
    /// Load AWS configuration from the environment, config files and
    /// instance roles, applying the explicit overrides in `config`.
    pub async fn load(config: &AwsConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        Self {
            config: Arc::new(loader.load().await),
        }
    }

    /// Wrap an already loaded SDK config
    pub fn from_sdk_config(config: SdkConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// A context bound to `region`, or this context when `region` is `None`.
    ///
    /// Credentials and every other setting are shared with `self`.
    pub fn for_region(&self, region: Option<&str>) -> Self {
        match region {
            Some(region) if self.region() != Some(region) => Self {
                config: Arc::new(
                    self.config
                        .to_builder()
                        .region(Region::new(region.to_string()))
                        .build(),
                ),
            },
            _ => self.clone(),
        }
    }

    /// Get the underlying SDK config for direct client construction.
    pub fn sdk_config(&self) -> &SdkConfig {
        &self.config
    }

    /// The configured region, if any
    pub fn region(&self) -> Option<&str> {
        self.config.region().map(|r| r.as_ref())
    }

    pub fn acm_client(&self) -> aws_sdk_acm::Client {
        aws_sdk_acm::Client::new(self.sdk_config())
    }

    pub fn cloudformation_client(&self) -> aws_sdk_cloudformation::Client {
        aws_sdk_cloudformation::Client::new(self.sdk_config())
    }

    pub fn ecr_client(&self) -> aws_sdk_ecr::Client {
        aws_sdk_ecr::Client::new(self.sdk_config())
    }

    pub fn logs_client(&self) -> aws_sdk_cloudwatchlogs::Client {
        aws_sdk_cloudwatchlogs::Client::new(self.sdk_config())
    }

    pub fn s3_client(&self) -> aws_sdk_s3::Client {
        aws_sdk_s3::Client::new(self.sdk_config())
    }

    pub fn ssm_client(&self) -> aws_sdk_ssm::Client {
        aws_sdk_ssm::Client::new(self.sdk_config())
    }
}

/// Service clients that can be built from an [`AwsContext`]
pub trait FromAwsContext {
    fn from_context(ctx: &AwsContext) -> Self;
}

/// Source of clients bound to the region of a resource
pub trait RegionalClients: Send + Sync {
    type Client: Send + Sync;

    /// A client for `region`, or for the default region when `None`
    fn client_for(&self, region: Option<&str>) -> Self::Client;
}

/// Builds SDK backed clients of type `C` per region
pub struct Regional<C> {
    ctx: AwsContext,
    _client: PhantomData<fn() -> C>,
}

impl<C> Regional<C> {
    pub fn new(ctx: AwsContext) -> Self {
        Self {
            ctx,
            _client: PhantomData,
        }
    }
}

impl<C: FromAwsContext + Send + Sync> RegionalClients for Regional<C> {
    type Client = C;

    fn client_for(&self, region: Option<&str>) -> C {
        C::from_context(&self.ctx.for_region(region))
    }
}

impl std::fmt::Debug for AwsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsContext")
            .field("region", &self.region())
            .finish_non_exhaustive()
    }
}
