use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use protoframe_codec::{parse_structured_message, ParseOptions};
use protoframe_sandbox::Sandbox;
use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::config::EngineConfig;
use crate::error::{Result, ValidationError};
use crate::extract::{extract_regex, extract_variables, run_transform_script};
use crate::matcher::{Matcher, Verdict};
use crate::validation::ValidationRequest;

/// A validation that resolved successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationPass {
    pub label: String,
    /// The frame that satisfied the validation.
    pub response: Vec<u8>,
    /// Variables extracted from the response.
    pub variables: Map<String, Value>,
}

/// Handle to a pending validation. Await [`wait`](Self::wait) for the outcome.
#[derive(Debug)]
pub struct ValidationHandle {
    id: u64,
    label: String,
    rx: oneshot::Receiver<Result<ValidationPass>>,
}

impl ValidationHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Wait until the validation passes, fails, times out or is cleared.
    pub async fn wait(self) -> Result<ValidationPass> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ValidationError::Cancelled { label: self.label }),
        }
    }
}

struct Pending {
    id: u64,
    request: Arc<ValidationRequest>,
    matcher: Arc<Matcher>,
    reply: oneshot::Sender<Result<ValidationPass>>,
    timer: AbortHandle,
}

impl Pending {
    fn resolve(self, outcome: Result<ValidationPass>) {
        self.timer.abort();
        // The caller may have dropped its handle; nothing to deliver then.
        let _ = self.reply.send(outcome);
    }
}

#[derive(Default)]
struct SessionState {
    pending: Mutex<Vec<Pending>>,
    /// Serializes `check_validation` per session so frames are judged in arrival order.
    checking: tokio::sync::Mutex<()>,
}

impl SessionState {
    fn pending(&self) -> MutexGuard<'_, Vec<Pending>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn take(&self, id: u64) -> Option<Pending> {
        let mut pending = self.pending();
        let idx = pending.iter().position(|p| p.id == id)?;
        Some(pending.remove(idx))
    }
}

type SessionMap = Mutex<HashMap<String, Arc<SessionState>>>;

fn lock_sessions(sessions: &SessionMap) -> MutexGuard<'_, HashMap<String, Arc<SessionState>>> {
    match sessions.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Drop `session_id` from the map once `session` has nothing left pending.
///
/// Lock order is map, then pending list.
fn release_if_idle(sessions: &SessionMap, session_id: &str, session: &Arc<SessionState>) {
    let mut map = lock_sessions(sessions);
    let idle = map
        .get(session_id)
        .is_some_and(|current| Arc::ptr_eq(current, session) && current.pending().is_empty());
    if idle {
        map.remove(session_id);
        tracing::trace!(session = session_id, "validation session released");
    }
}

/// Per-session registry of pending response validations.
///
/// Sessions are fully isolated: checks and clears for one session id never
/// touch another's pending list. Timeouts are owned by the pending entry and
/// cancelled with it. A session's entry is dropped as soon as its last pending
/// validation resolves.
pub struct ValidationEngine {
    config: EngineConfig,
    sandbox: Option<Arc<dyn Sandbox>>,
    sessions: Arc<SessionMap>,
    next_id: AtomicU64,
}

impl ValidationEngine {
    /// Create an engine with default config and no script sandbox.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with explicit config.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            sandbox: None,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Attach the sandbox used by SCRIPT validations and transform scripts.
    pub fn with_sandbox(mut self, sandbox: Arc<dyn Sandbox>) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a validation for `session_id` and start its timeout.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register_validation(&self, session_id: &str, request: ValidationRequest) -> ValidationHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let timeout = request
            .validation
            .timeout()
            .unwrap_or(self.config.default_validation_timeout);
        let label = request.label.clone();
        let matcher = Arc::new(Matcher::compile(&request.validation.rule));
        let (reply, rx) = oneshot::channel();

        // Held until the entry is pushed so an idle-session release cannot drop it.
        let mut sessions = self.lock_sessions();
        let session = sessions.entry(session_id.to_string()).or_default().clone();
        let timer = tokio::spawn(expire_after(
            Arc::downgrade(&self.sessions),
            session_id.to_string(),
            Arc::downgrade(&session),
            id,
            timeout,
        ))
        .abort_handle();
        session.pending().push(Pending {
            id,
            request: Arc::new(request),
            matcher,
            reply,
            timer,
        });
        drop(sessions);
        tracing::debug!(session = session_id, %label, id, timeout_ms = timeout.as_millis() as u64, "validation registered");

        ValidationHandle { id, label, rx }
    }

    /// Judge an inbound frame against every pending validation of `session_id`.
    ///
    /// Returns how many validations this frame resolved.
    pub async fn check_validation(&self, raw: &[u8], session_id: &str) -> usize {
        let Some(session) = self.existing_session(session_id) else {
            return 0;
        };
        let _turn = session.checking.lock().await;

        let snapshot: Vec<(u64, Arc<ValidationRequest>, Arc<Matcher>)> = session
            .pending()
            .iter()
            .map(|p| (p.id, p.request.clone(), p.matcher.clone()))
            .collect();

        let mut resolved = 0;
        for (id, request, matcher) in snapshot {
            let verdict = matcher
                .evaluate(raw, self.sandbox.as_deref(), self.config.script_timeout)
                .await;
            let outcome = match verdict {
                Verdict::Pending => continue,
                Verdict::Pass => Ok(()),
                Verdict::Fail(reason) => Err(reason),
            };
            // A timeout or clear may have won the race while the script ran.
            let Some(pending) = session.take(id) else {
                continue;
            };
            resolved += 1;

            match outcome {
                Ok(()) => {
                    let variables = self.extract(&request, raw).await;
                    tracing::debug!(session = session_id, label = %request.label, vars = variables.len(), "validation passed");
                    pending.resolve(Ok(ValidationPass {
                        label: request.label.clone(),
                        response: raw.to_vec(),
                        variables,
                    }));
                }
                Err(reason) => {
                    tracing::debug!(session = session_id, label = %request.label, %reason, "validation failed");
                    pending.resolve(Err(ValidationError::Failed {
                        label: request.label.clone(),
                        reason,
                    }));
                }
            }
        }
        if resolved > 0 {
            release_if_idle(&self.sessions, session_id, &session);
        }
        resolved
    }

    /// Cancel every pending validation of `session_id`. Safe to call repeatedly.
    pub fn clear_validation(&self, session_id: &str) {
        let session = self.lock_sessions().remove(session_id);
        let Some(session) = session else {
            return;
        };
        let drained: Vec<Pending> = session.pending().drain(..).collect();
        if !drained.is_empty() {
            tracing::debug!(session = session_id, count = drained.len(), "validations cleared");
        }
        for pending in drained {
            let label = pending.request.label.clone();
            pending.resolve(Err(ValidationError::Cancelled { label }));
        }
    }

    /// Number of unresolved validations for `session_id`.
    pub fn pending_count(&self, session_id: &str) -> usize {
        self.existing_session(session_id)
            .map_or(0, |session| session.pending().len())
    }

    async fn extract(&self, request: &ValidationRequest, raw: &[u8]) -> Map<String, Value> {
        let mut variables = extract_regex(&String::from_utf8_lossy(raw), &request.regex_extractions);

        if let Some(structure) = &request.structure {
            let parsed = parse_structured_message(raw, structure, ParseOptions::default());
            if parsed.success {
                variables.extend(extract_variables(&parsed, &request.response_patterns));
            } else {
                tracing::debug!(
                    label = %request.label,
                    error = parsed.error.as_deref().unwrap_or_default(),
                    "response does not decode; skipping field extraction"
                );
            }
        }

        if let Some(script) = request.transform_script.as_deref().filter(|s| !s.trim().is_empty()) {
            match self.sandbox.as_deref() {
                Some(sandbox) => {
                    let set = run_transform_script(sandbox, script, &request.params, raw, self.config.script_timeout).await;
                    variables.extend(set);
                }
                None => tracing::warn!(label = %request.label, "transform script without a sandbox; skipped"),
            }
        }
        variables
    }

    fn existing_session(&self, session_id: &str) -> Option<Arc<SessionState>> {
        self.lock_sessions().get(session_id).cloned()
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<String, Arc<SessionState>>> {
        lock_sessions(&self.sessions)
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new()
    }
}

async fn expire_after(
    sessions: Weak<SessionMap>,
    session_id: String,
    session: Weak<SessionState>,
    id: u64,
    timeout: Duration,
) {
    tokio::time::sleep(timeout).await;
    let Some(session) = session.upgrade() else {
        return;
    };
    let Some(pending) = session.take(id) else {
        return;
    };
    let label = pending.request.label.clone();
    tracing::debug!(session = %session_id, %label, id, "validation timed out");
    let _ = pending.reply.send(Err(ValidationError::Timeout { label, timeout }));
    if let Some(sessions) = sessions.upgrade() {
        release_if_idle(&sessions, &session_id, &session);
    }
}

#[cfg(test)]
mod tests {
    use protoframe_codec::{ByteOrder, DataType, ElementConfig, ElementSize, MessageElement, MessageStructure};
    use protoframe_sandbox::{FnSandbox, ScriptContext};
    use serde_json::json;

    use super::*;
    use crate::validation::{CommandValidation, FieldExtraction, RegexExtraction, ResponsePattern};

    #[tokio::test]
    async fn always_pass_resolves_on_first_frame() {
        let engine = ValidationEngine::new();
        let handle = engine.register_validation("s1", ValidationRequest::new(CommandValidation::always_pass(), "ping"));
        assert_eq!(engine.pending_count("s1"), 1);

        assert_eq!(engine.check_validation(b"anything", "s1").await, 1);
        let pass = handle.wait().await.unwrap();
        assert_eq!(pass.label, "ping");
        assert_eq!(pass.response, b"anything".to_vec());
        assert_eq!(engine.pending_count("s1"), 0);
    }

    #[tokio::test]
    async fn pattern_waits_for_matching_frame() {
        let engine = ValidationEngine::new();
        let handle = engine.register_validation("s1", ValidationRequest::new(CommandValidation::contains("OK"), "at"));

        assert_eq!(engine.check_validation(b"AT\r\n", "s1").await, 0);
        assert_eq!(engine.check_validation(b"OK\r\n", "s1").await, 1);
        assert!(handle.wait().await.is_ok());
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let engine = ValidationEngine::new();
        let a = engine.register_validation("a", ValidationRequest::new(CommandValidation::contains("OK"), "a"));
        let _b = engine.register_validation("b", ValidationRequest::new(CommandValidation::contains("OK"), "b"));

        assert_eq!(engine.check_validation(b"OK", "a").await, 1);
        assert!(a.wait().await.is_ok());
        assert_eq!(engine.pending_count("b"), 1);

        engine.clear_validation("a");
        assert_eq!(engine.pending_count("b"), 1);
        assert_eq!(engine.check_validation(b"OK", "unknown").await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fails_validation() {
        let engine = ValidationEngine::new();
        let request = ValidationRequest::new(
            CommandValidation::contains("OK").with_timeout(Duration::from_millis(100)),
            "slow",
        );
        let handle = engine.register_validation("s1", request);

        let err = handle.wait().await.unwrap_err();
        assert_eq!(
            err,
            ValidationError::Timeout {
                label: "slow".into(),
                timeout: Duration::from_millis(100)
            }
        );
        assert_eq!(engine.pending_count("s1"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_are_released() {
        let engine = ValidationEngine::new();
        let first = engine.register_validation("s1", ValidationRequest::new(CommandValidation::contains("A"), "a"));
        let second = engine.register_validation("s1", ValidationRequest::new(CommandValidation::contains("B"), "b"));
        let slow = engine.register_validation(
            "s2",
            ValidationRequest::new(CommandValidation::contains("Z").with_timeout(Duration::from_millis(50)), "z"),
        );
        assert_eq!(engine.lock_sessions().len(), 2);

        assert_eq!(engine.check_validation(b"A", "s1").await, 1);
        assert!(first.wait().await.is_ok());
        assert!(engine.lock_sessions().contains_key("s1"));

        assert_eq!(engine.check_validation(b"B", "s1").await, 1);
        assert!(second.wait().await.is_ok());
        assert!(!engine.lock_sessions().contains_key("s1"));

        assert!(matches!(slow.wait().await, Err(ValidationError::Timeout { .. })));
        assert!(engine.lock_sessions().is_empty());

        let again = engine.register_validation("s1", ValidationRequest::new(CommandValidation::always_pass(), "again"));
        assert_eq!(engine.check_validation(b"x", "s1").await, 1);
        assert!(again.wait().await.is_ok());
        assert!(engine.lock_sessions().is_empty());
    }

    #[tokio::test]
    async fn clear_twice_is_safe() {
        let engine = ValidationEngine::new();
        let h1 = engine.register_validation("s1", ValidationRequest::new(CommandValidation::contains("X"), "one"));
        let h2 = engine.register_validation("s1", ValidationRequest::new(CommandValidation::contains("Y"), "two"));

        engine.clear_validation("s1");
        engine.clear_validation("s1");

        assert_eq!(engine.pending_count("s1"), 0);
        assert!(matches!(h1.wait().await, Err(ValidationError::Cancelled { .. })));
        assert!(matches!(h2.wait().await, Err(ValidationError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn invalid_regex_fails_without_affecting_others() {
        let engine = ValidationEngine::new();
        let bad = engine.register_validation("s1", ValidationRequest::new(CommandValidation::regex("(oops"), "bad"));
        let good = engine.register_validation("s1", ValidationRequest::new(CommandValidation::regex("^OK"), "good"));

        assert_eq!(engine.check_validation(b"OK", "s1").await, 2);
        assert!(matches!(bad.wait().await, Err(ValidationError::Failed { .. })));
        assert!(good.wait().await.is_ok());
    }

    #[tokio::test]
    async fn script_validation_with_reason_and_retry() {
        let sandbox = Arc::new(FnSandbox::new(|_: &str, ctx: &ScriptContext| {
            match ctx.get("data").and_then(Value::as_str).unwrap_or_default() {
                "OK" => Ok(json!(true)),
                "ERR" => Ok(json!("device error")),
                "" => Err(protoframe_sandbox::SandboxError::Script("empty".into())),
                _ => Ok(Value::Null),
            }
        }));
        let engine = ValidationEngine::new().with_sandbox(sandbox);

        let first = engine.register_validation("s1", ValidationRequest::new(CommandValidation::script("check()"), "first"));
        assert_eq!(engine.check_validation(b"", "s1").await, 0);
        assert_eq!(engine.check_validation(b"partial", "s1").await, 0);
        assert_eq!(engine.check_validation(b"OK", "s1").await, 1);
        assert!(first.wait().await.is_ok());

        let second = engine.register_validation("s1", ValidationRequest::new(CommandValidation::script("check()"), "second"));
        engine.check_validation(b"ERR", "s1").await;
        assert_eq!(
            second.wait().await.unwrap_err(),
            ValidationError::Failed {
                label: "second".into(),
                reason: "device error".into()
            }
        );
    }

    #[tokio::test]
    async fn pass_runs_extraction() {
        let structure = Arc::new(MessageStructure::new(
            "reply",
            ByteOrder::BigEndian,
            vec![
                MessageElement::new("hdr", "header", ElementSize::Fixed(1), ElementConfig::Static { value: vec![b'T'] }),
                MessageElement::new("v", "value", ElementSize::Fixed(1), ElementConfig::Field { data_type: DataType::Uint8 }),
            ],
        ));
        let patterns = vec![ResponsePattern {
            condition: Some("value > 0".into()),
            extractions: vec![FieldExtraction {
                element: "value".into(),
                variable_name: "level".into(),
                transform: Some("value * 2".into()),
            }],
        }];
        let request = ValidationRequest::new(CommandValidation::contains("T"), "level")
            .with_structure(structure, patterns)
            .with_regex_extraction(RegexExtraction::new("(?P<tag>T)"));

        let engine = ValidationEngine::new();
        let handle = engine.register_validation("s1", request);
        engine.check_validation(&[b'T', 21], "s1").await;

        let pass = handle.wait().await.unwrap();
        assert_eq!(pass.variables.get("level"), Some(&json!(42)));
        assert_eq!(pass.variables.get("tag"), Some(&json!("T")));
    }

    #[tokio::test]
    async fn transform_script_vars_are_merged() {
        let sandbox = Arc::new(FnSandbox::new(|code: &str, ctx: &ScriptContext| {
            if let Some(host) = &ctx.host {
                let unit = ctx.get("params").and_then(|p| p.get("unit")).cloned();
                host.set_var("unit", unit.unwrap_or(Value::Null));
                return Ok(Value::Null);
            }
            Ok(json!(code == "validate"))
        }));
        let engine = ValidationEngine::new().with_sandbox(sandbox);
        let request = ValidationRequest::new(CommandValidation::always_pass(), "read")
            .with_params(json!({ "unit": "C" }).as_object().cloned().unwrap())
            .with_transform_script("setVar('unit', params.unit)");

        let handle = engine.register_validation("s1", request);
        engine.check_validation(b"21.5", "s1").await;
        let pass = handle.wait().await.unwrap();
        assert_eq!(pass.variables.get("unit"), Some(&json!("C")));
    }
}
