//! Trace instance resolution.
//!
//! Decides whether an application has tracing turned on right now and, if
//! so, builds a live client from its decrypted credentials. The governing
//! `trace_config` comes from the first available source of a
//! [`TraceConfigChain`]:
//!
//! ```text
//! override (explicit model config)  ─┐
//! workflow features                  ├─> first available wins
//! latest app model config (DB)      ─┘
//! ```

mod sources;

use std::sync::Arc;

use tracing::{debug, info_span, warn};

use crate::clients::{ClientOptions, TraceClient, build_client};
use crate::config::OpsTraceConfig;
use crate::error::{Result, TraceError};
use crate::observability::{FIELD_APP_ID, FIELD_MESSAGE_ID, FIELD_SOURCE, SPAN_RESOLVE};
use crate::providers::TracingProvider;
use crate::store::{AppDirectory, ConfigStore};

pub use sources::{
    EffectiveTraceConfig, LatestModelConfigSource, OverrideSource, TraceConfigChain,
    TraceConfigSource, WorkflowSource,
};

/// Builds trace clients for applications.
#[derive(Clone)]
pub struct TraceInstanceResolver {
    store: ConfigStore,
    apps: Arc<dyn AppDirectory>,
    options: ClientOptions,
}

impl TraceInstanceResolver {
    pub fn new(store: ConfigStore, apps: Arc<dyn AppDirectory>, options: ClientOptions) -> Self {
        Self {
            store,
            apps,
            options,
        }
    }

    /// Resolver whose clients use the `[clients]` settings of `config`.
    pub fn from_config(
        store: ConfigStore,
        apps: Arc<dyn AppDirectory>,
        config: &OpsTraceConfig,
    ) -> Self {
        Self::new(store, apps, config.client_options())
    }

    /// Chain with only the database fallback.
    pub fn default_chain(&self) -> TraceConfigChain {
        TraceConfigChain::new().with_source(LatestModelConfigSource::new(self.apps.clone()))
    }

    /// Chain for the conversation that `message_id` belongs to.
    ///
    /// A conversation that names a model config uses that row; inline
    /// override configs are only consulted when it names none. A named row
    /// that no longer exists contributes no source. The database fallback
    /// always comes last.
    ///
    /// # Errors
    ///
    /// `NotFound` if the message does not exist.
    pub fn chain_for_message(&self, message_id: &str) -> Result<TraceConfigChain> {
        let conversation = self
            .apps
            .conversation_for_message(message_id)?
            .ok_or_else(|| TraceError::NotFound(format!("message '{message_id}' not found")))?;

        let mut chain = TraceConfigChain::new();
        match conversation.app_model_config_id.as_deref() {
            Some(id) => match self.apps.app_model_config(id)? {
                Some(row) => chain = chain.with_source(OverrideSource::from_model_config(&row)),
                None => debug!(model_config_id = id, "conversation model config is gone"),
            },
            None => {
                if let Some(overrides) = conversation.override_model_configs.as_ref() {
                    chain = chain.with_source(OverrideSource::from_override_configs(overrides));
                }
            }
        }
        Ok(chain.with_source(LatestModelConfigSource::new(self.apps.clone())))
    }

    /// Client for `app_id`, or `None` when tracing is off.
    ///
    /// # Errors
    ///
    /// - `ConfigNotFound` when no source in `chain` is available
    /// - `AmbiguousConfig` from the database fallback
    /// - `UnsupportedProvider` for an unknown provider tag
    /// - `NotFound` when tracing is enabled but no credentials are stored
    /// - `Crypto` when stored credentials cannot be decrypted
    pub fn resolve(
        &self,
        app_id: &str,
        chain: &TraceConfigChain,
    ) -> Result<Option<Arc<dyn TraceClient>>> {
        let span = info_span!(SPAN_RESOLVE, { FIELD_APP_ID } = %app_id);
        let _enter = span.enter();

        let (source, config) = chain.effective_config(app_id)?;
        debug!({ FIELD_SOURCE } = source, enabled = config.enabled, "trace config selected");

        if !config.enabled {
            return Ok(None);
        }
        let Some(tag) = config.tracing_provider.as_deref() else {
            warn!({ FIELD_SOURCE } = source, "tracing enabled without a provider");
            return Ok(None);
        };
        let provider: TracingProvider = tag.parse()?;

        let credentials = self.store.get_decrypted(app_id, provider)?.ok_or_else(|| {
            TraceError::NotFound(format!(
                "tracing enabled for app '{app_id}' but no {provider} credentials are stored"
            ))
        })?;
        let client = build_client(&credentials, &self.options)?;
        debug!(provider = %provider, "trace client resolved");
        Ok(Some(client))
    }

    /// [`resolve`](Self::resolve) over [`chain_for_message`](Self::chain_for_message).
    pub fn resolve_for_message(
        &self,
        app_id: &str,
        message_id: &str,
    ) -> Result<Option<Arc<dyn TraceClient>>> {
        let chain = {
            let span = info_span!(SPAN_RESOLVE, { FIELD_MESSAGE_ID } = %message_id);
            let _enter = span.enter();
            self.chain_for_message(message_id)?
        };
        self.resolve(app_id, &chain)
    }
}
