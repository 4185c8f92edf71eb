//! Input moderation with best-effort trace dispatch.
//!
//! [`InputModeration::check`] runs the application's sensitive-content
//! policy, forwards a `moderation` trace task when a trace client resolves
//! for the message, and then applies the verdict. Tracing never changes the
//! verdict: resolution and queue failures are logged and dropped.

mod timer;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, info_span, warn};

use crate::error::ModerationError;
use crate::observability::{FIELD_APP_ID, FIELD_MESSAGE_ID, SPAN_MODERATION_CHECK};
use crate::queue::{TimerWindow, TraceEvent, TraceQueue, TraceTask, TraceTaskKind};
use crate::resolver::TraceInstanceResolver;

pub use timer::Timer;

/// What to do with flagged input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModerationAction {
    /// Stop the request and answer with the preset response.
    #[serde(rename = "direct_output")]
    DirectOutput,
    /// Continue with the engine's replacement inputs and query.
    #[serde(rename = "overrided", alias = "overridden")]
    Overridden,
}

impl ModerationAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectOutput => "direct_output",
            Self::Overridden => "overrided",
        }
    }
}

/// Verdict of the moderation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationOutcome {
    pub flagged: bool,
    pub action: ModerationAction,
    #[serde(default)]
    pub preset_response: String,
    #[serde(default)]
    pub inputs: Map<String, Value>,
    #[serde(default)]
    pub query: String,
}

impl ModerationOutcome {
    pub fn pass() -> Self {
        Self {
            flagged: false,
            action: ModerationAction::DirectOutput,
            preset_response: String::new(),
            inputs: Map::new(),
            query: String::new(),
        }
    }
}

/// Sensitive-content policy of an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitiveWordAvoidance {
    /// Engine name, e.g. `keywords` or `openai_moderation`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: Value,
}

/// The part of an application's config that moderation reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub sensitive_word_avoidance: Option<SensitiveWordAvoidance>,
}

/// The moderation engine.
pub trait ModerationRunner: Send + Sync {
    /// # Errors
    ///
    /// `ModerationError::Engine` when the check could not be performed.
    fn moderate_inputs(
        &self,
        policy: &SensitiveWordAvoidance,
        app_id: &str,
        tenant_id: &str,
        inputs: &Map<String, Value>,
        query: &str,
    ) -> Result<ModerationOutcome, ModerationError>;
}

/// Inputs and query the request continues with.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeratedInput {
    pub flagged: bool,
    pub inputs: Map<String, Value>,
    pub query: String,
}

pub struct InputModeration {
    runner: Arc<dyn ModerationRunner>,
    resolver: TraceInstanceResolver,
    queue: Arc<dyn TraceQueue>,
}

impl InputModeration {
    pub fn new(
        runner: Arc<dyn ModerationRunner>,
        resolver: TraceInstanceResolver,
        queue: Arc<dyn TraceQueue>,
    ) -> Self {
        Self {
            runner,
            resolver,
            queue,
        }
    }

    /// Moderate `inputs`/`query` for one message.
    ///
    /// # Errors
    ///
    /// `Blocked(preset_response)` for flagged input under a direct-output
    /// policy, `Engine` if the moderation engine failed.
    pub fn check(
        &self,
        app_id: &str,
        tenant_id: &str,
        app_config: &AppConfig,
        inputs: Map<String, Value>,
        query: String,
        message_id: &str,
    ) -> Result<ModeratedInput, ModerationError> {
        let Some(policy) = app_config.sensitive_word_avoidance.as_ref() else {
            return Ok(ModeratedInput {
                flagged: false,
                inputs,
                query,
            });
        };

        let span = info_span!(
            SPAN_MODERATION_CHECK,
            { FIELD_APP_ID } = %app_id,
            { FIELD_MESSAGE_ID } = %message_id,
            moderation_type = %policy.kind,
        );
        let _enter = span.enter();

        let (outcome, window) = Timer::measure(|| {
            self.runner
                .moderate_inputs(policy, app_id, tenant_id, &inputs, &query)
        });
        let outcome = outcome?;
        debug!(
            flagged = outcome.flagged,
            elapsed_ms = window.elapsed_ms(),
            "moderation finished"
        );

        self.dispatch_trace(app_id, tenant_id, policy, message_id, &inputs, &outcome, window);

        if !outcome.flagged {
            return Ok(ModeratedInput {
                flagged: false,
                inputs,
                query,
            });
        }
        match outcome.action {
            ModerationAction::DirectOutput => Err(ModerationError::Blocked(outcome.preset_response)),
            ModerationAction::Overridden => Ok(ModeratedInput {
                flagged: true,
                inputs: outcome.inputs,
                query: outcome.query,
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch_trace(
        &self,
        app_id: &str,
        tenant_id: &str,
        policy: &SensitiveWordAvoidance,
        message_id: &str,
        inputs: &Map<String, Value>,
        outcome: &ModerationOutcome,
        window: TimerWindow,
    ) {
        let client = match self.resolver.resolve_for_message(app_id, message_id) {
            Ok(Some(client)) => client,
            Ok(None) => {
                debug!("tracing disabled, moderation not traced");
                return;
            }
            Err(e) => {
                warn!(error = %e, code = e.code(), "trace client resolution failed");
                return;
            }
        };

        let event = TraceEvent {
            name: TraceTaskKind::Moderation.as_str().to_owned(),
            inputs: Value::Object(inputs.clone()),
            outputs: json!({
                "flagged": outcome.flagged,
                "action": outcome.action.as_str(),
                "preset_response": outcome.preset_response,
                "inputs": outcome.inputs,
                "query": outcome.query,
            }),
            timer: window,
            metadata: json!({
                "app_id": app_id,
                "tenant_id": tenant_id,
                "message_id": message_id,
                "moderation_type": policy.kind,
            }),
        };
        let task = TraceTask::new(TraceTaskKind::Moderation, message_id, client, event);
        if let Err(e) = self.queue.submit(task) {
            warn!(error = %e, "moderation trace task dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientOptions;
    use crate::credentials::{CredentialCipher, DerivedTenantKeys};
    use crate::error::{Result, TraceError};
    use crate::providers::TracingProvider;
    use crate::store::{AppModelConfigRow, ConfigStore, ConversationRow, SqliteRepository};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedRunner {
        outcome: std::result::Result<ModerationOutcome, ModerationError>,
        calls: AtomicUsize,
    }

    impl FixedRunner {
        fn new(outcome: std::result::Result<ModerationOutcome, ModerationError>) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl ModerationRunner for FixedRunner {
        fn moderate_inputs(
            &self,
            _policy: &SensitiveWordAvoidance,
            _app_id: &str,
            _tenant_id: &str,
            _inputs: &Map<String, Value>,
            _query: &str,
        ) -> std::result::Result<ModerationOutcome, ModerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    #[derive(Default)]
    struct RecordingQueue {
        tasks: Mutex<Vec<TraceTask>>,
    }

    impl TraceQueue for RecordingQueue {
        fn submit(&self, task: TraceTask) -> Result<()> {
            if let Ok(mut tasks) = self.tasks.lock() {
                tasks.push(task);
            }
            Ok(())
        }
    }

    struct RejectingQueue;

    impl TraceQueue for RejectingQueue {
        fn submit(&self, _task: TraceTask) -> Result<()> {
            Err(TraceError::Queue("always full".into()))
        }
    }

    fn resolver(tracing_enabled: bool) -> TraceInstanceResolver {
        let repo = match SqliteRepository::open_in_memory() {
            Ok(r) => Arc::new(r),
            Err(_) => unreachable!("in-memory sqlite should open"),
        };
        let _ = repo.upsert_app("app-1", "tenant-1");
        let keys = match DerivedTenantKeys::new(b"moderation-test-master-secret") {
            Ok(k) => k,
            Err(_) => unreachable!("secret is long enough"),
        };
        let store = ConfigStore::new(
            repo.clone(),
            repo.clone(),
            CredentialCipher::new(Arc::new(keys)),
        );
        let creds = json!({
            "public_key": "pk-lf-1111222233334444",
            "secret_key": "sk-lf-5555666677778888",
            "host": "https://cloud.langfuse.com"
        });
        if let Some(map) = creds.as_object() {
            let _ = store.create("app-1", TracingProvider::Langfuse, map);
        }
        let _ = repo.insert_app_model_config(&AppModelConfigRow {
            id: "cfg-1".into(),
            app_id: "app-1".into(),
            trace_config: Some(json!({"tracing_provider": "langfuse", "enabled": tracing_enabled})),
            updated_at: 100,
        });
        let _ = repo.insert_conversation(&ConversationRow {
            id: "conv-1".into(),
            app_id: "app-1".into(),
            app_model_config_id: Some("cfg-1".into()),
            override_model_configs: None,
        });
        let _ = repo.insert_message("msg-1", "conv-1");
        TraceInstanceResolver::new(store, repo, ClientOptions::default())
    }

    fn policy() -> AppConfig {
        AppConfig {
            sensitive_word_avoidance: Some(SensitiveWordAvoidance {
                kind: "keywords".into(),
                config: json!({"keywords": "bad"}),
            }),
        }
    }

    fn inputs() -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("a".into(), json!("bad words"));
        m
    }

    fn flagged(action: ModerationAction) -> ModerationOutcome {
        let mut replacement = Map::new();
        replacement.insert("a".into(), json!("x"));
        ModerationOutcome {
            flagged: true,
            action,
            preset_response: "Sorry, blocked".into(),
            inputs: replacement,
            query: "q2".into(),
        }
    }

    #[test]
    fn no_policy_short_circuits() {
        let runner = FixedRunner::new(Ok(ModerationOutcome::pass()));
        let queue = Arc::new(RecordingQueue::default());
        let moderation = InputModeration::new(runner.clone(), resolver(true), queue.clone());

        let out = moderation.check("app-1", "tenant-1", &AppConfig::default(), inputs(), "q".into(), "msg-1");
        assert_eq!(
            out.ok(),
            Some(ModeratedInput {
                flagged: false,
                inputs: inputs(),
                query: "q".into()
            })
        );
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
        assert!(queue.tasks.lock().map(|t| t.is_empty()).unwrap_or(false));
    }

    #[test]
    fn pass_returns_inputs_unchanged_and_traces() {
        let queue = Arc::new(RecordingQueue::default());
        let moderation = InputModeration::new(
            FixedRunner::new(Ok(ModerationOutcome::pass())),
            resolver(true),
            queue.clone(),
        );
        let out = moderation.check("app-1", "tenant-1", &policy(), inputs(), "q".into(), "msg-1");
        assert_eq!(out.ok().map(|o| (o.flagged, o.query)), Some((false, "q".to_owned())));

        let tasks = match queue.tasks.lock() {
            Ok(t) => t.clone(),
            Err(_) => unreachable!(),
        };
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].kind, TraceTaskKind::Moderation);
        assert_eq!(tasks[0].message_id, "msg-1");
        assert_eq!(tasks[0].client.provider(), TracingProvider::Langfuse);
        assert_eq!(tasks[0].event.outputs["flagged"], false);
    }

    #[test]
    fn direct_output_is_blocked_with_preset_response() {
        let queue = Arc::new(RecordingQueue::default());
        let moderation = InputModeration::new(
            FixedRunner::new(Ok(flagged(ModerationAction::DirectOutput))),
            resolver(true),
            queue.clone(),
        );
        let out = moderation.check("app-1", "tenant-1", &policy(), inputs(), "q".into(), "msg-1");
        assert_eq!(out, Err(ModerationError::Blocked("Sorry, blocked".into())));
        // The trace goes out before the verdict is applied.
        assert_eq!(queue.tasks.lock().map(|t| t.len()).ok(), Some(1));
    }

    #[test]
    fn override_substitutes_inputs_and_query() {
        let moderation = InputModeration::new(
            FixedRunner::new(Ok(flagged(ModerationAction::Overridden))),
            resolver(true),
            Arc::new(RecordingQueue::default()),
        );
        let out = match moderation.check("app-1", "tenant-1", &policy(), inputs(), "q".into(), "msg-1") {
            Ok(o) => o,
            Err(e) => unreachable!("{e}"),
        };
        assert!(out.flagged);
        assert_eq!(Value::Object(out.inputs), json!({"a": "x"}));
        assert_eq!(out.query, "q2");
    }

    #[test]
    fn rejecting_queue_does_not_change_result() {
        let with_recording = InputModeration::new(
            FixedRunner::new(Ok(flagged(ModerationAction::Overridden))),
            resolver(true),
            Arc::new(RecordingQueue::default()),
        );
        let with_rejecting = InputModeration::new(
            FixedRunner::new(Ok(flagged(ModerationAction::Overridden))),
            resolver(true),
            Arc::new(RejectingQueue),
        );
        let a = with_recording.check("app-1", "tenant-1", &policy(), inputs(), "q".into(), "msg-1");
        let b = with_rejecting.check("app-1", "tenant-1", &policy(), inputs(), "q".into(), "msg-1");
        assert!(a.is_ok());
        assert_eq!(a, b);
    }

    #[test]
    fn resolution_failure_does_not_change_result() {
        let queue = Arc::new(RecordingQueue::default());
        let moderation = InputModeration::new(
            FixedRunner::new(Ok(ModerationOutcome::pass())),
            resolver(true),
            queue.clone(),
        );
        let out = moderation.check("app-1", "tenant-1", &policy(), inputs(), "q".into(), "unknown-message");
        assert_eq!(out.ok().map(|o| o.flagged), Some(false));
        assert_eq!(queue.tasks.lock().map(|t| t.len()).ok(), Some(0));
    }

    #[test]
    fn disabled_tracing_submits_nothing() {
        let queue = Arc::new(RecordingQueue::default());
        let moderation = InputModeration::new(
            FixedRunner::new(Ok(ModerationOutcome::pass())),
            resolver(false),
            queue.clone(),
        );
        assert!(moderation.check("app-1", "tenant-1", &policy(), inputs(), "q".into(), "msg-1").is_ok());
        assert_eq!(queue.tasks.lock().map(|t| t.len()).ok(), Some(0));
    }

    #[test]
    fn engine_failure_propagates() {
        let queue = Arc::new(RecordingQueue::default());
        let moderation = InputModeration::new(
            FixedRunner::new(Err(ModerationError::Engine("timeout".into()))),
            resolver(true),
            queue.clone(),
        );
        let out = moderation.check("app-1", "tenant-1", &policy(), inputs(), "q".into(), "msg-1");
        assert!(matches!(out, Err(ModerationError::Engine(_))));
        assert_eq!(queue.tasks.lock().map(|t| t.len()).ok(), Some(0));
    }

    #[test]
    fn action_wire_names() {
        let parsed: std::result::Result<ModerationAction, _> = serde_json::from_str("\"overrided\"");
        assert_eq!(parsed.ok(), Some(ModerationAction::Overridden));
        let parsed: std::result::Result<ModerationAction, _> = serde_json::from_str("\"direct_output\"");
        assert_eq!(parsed.ok(), Some(ModerationAction::DirectOutput));
    }
}
