use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{Result, SandboxError};

/// Default wall-clock budget for one script invocation.
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(1);

/// Host callbacks a script may invoke (`setVar`, `log`).
pub trait ScriptHost: Send + Sync {
    fn set_var(&self, name: &str, value: Value);
    fn log(&self, message: &str);
}

/// Values and callbacks bound into a script's scope.
#[derive(Clone, Default)]
pub struct ScriptContext {
    pub bindings: Map<String, Value>,
    pub host: Option<Arc<dyn ScriptHost>>,
}

impl ScriptContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value` in the script scope.
    pub fn bind(mut self, name: impl Into<String>, value: Value) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }

    pub fn with_host(mut self, host: Arc<dyn ScriptHost>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }
}

impl fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptContext")
            .field("bindings", &self.bindings)
            .field("host", &self.host.is_some())
            .finish()
    }
}

/// An external script runtime.
///
/// Implementations run `code` with `context` in scope and return the script's
/// result value. Errors thrown by the script map to [`SandboxError::Script`].
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn execute(&self, code: &str, context: ScriptContext) -> Result<Value>;
}

/// Run a script, abandoning it once `deadline` elapses.
///
/// The sandbox future is dropped on expiry; callers' own state is untouched.
pub async fn execute_with_deadline(
    sandbox: &dyn Sandbox,
    code: &str,
    context: ScriptContext,
    deadline: Duration,
) -> Result<Value> {
    match tokio::time::timeout(deadline, sandbox.execute(code, context)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(timeout_ms = deadline.as_millis() as u64, "script deadline exceeded");
            Err(SandboxError::Timeout(deadline))
        }
    }
}

/// Sandbox backed by a plain closure. Handy for native strategies and tests.
pub struct FnSandbox<F> {
    func: F,
}

impl<F> FnSandbox<F>
where
    F: Fn(&str, &ScriptContext) -> Result<Value> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> Sandbox for FnSandbox<F>
where
    F: Fn(&str, &ScriptContext) -> Result<Value> + Send + Sync,
{
    async fn execute(&self, code: &str, context: ScriptContext) -> Result<Value> {
        (self.func)(code, &context)
    }
}

/// Placeholder for hosts without a script runtime; every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSandbox;

#[async_trait]
impl Sandbox for NoSandbox {
    async fn execute(&self, _code: &str, _context: ScriptContext) -> Result<Value> {
        Err(SandboxError::Unavailable)
    }
}

/// [`ScriptHost`] that records `setVar` calls and forwards `log` to tracing.
#[derive(Debug, Default)]
pub struct CollectingHost {
    vars: Mutex<Map<String, Value>>,
}

impl CollectingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Variables set so far.
    pub fn variables(&self) -> Map<String, Value> {
        match self.vars.lock() {
            Ok(vars) => vars.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ScriptHost for CollectingHost {
    fn set_var(&self, name: &str, value: Value) {
        let mut vars = match self.vars.lock() {
            Ok(vars) => vars,
            Err(poisoned) => poisoned.into_inner(),
        };
        vars.insert(name.to_string(), value);
    }

    fn log(&self, message: &str) {
        tracing::info!(target: "protoframe::script", "{message}");
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Sleeper(Duration);

    #[async_trait]
    impl Sandbox for Sleeper {
        async fn execute(&self, _code: &str, _context: ScriptContext) -> Result<Value> {
            tokio::time::sleep(self.0).await;
            Ok(Value::Bool(true))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_surfaces_timeout() {
        let sandbox = Sleeper(Duration::from_secs(10));
        let err = execute_with_deadline(&sandbox, "loop()", ScriptContext::new(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err, SandboxError::Timeout(Duration::from_millis(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_script_completes() {
        let sandbox = Sleeper(Duration::from_millis(5));
        let value = execute_with_deadline(&sandbox, "ok", ScriptContext::new(), DEFAULT_SCRIPT_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(value, Value::Bool(true));
    }

    #[tokio::test]
    async fn closure_sandbox_sees_bindings() {
        let sandbox = FnSandbox::new(|code: &str, ctx: &ScriptContext| {
            assert_eq!(code, "return data");
            Ok(ctx.get("data").cloned().unwrap_or(Value::Null))
        });
        let ctx = ScriptContext::new().bind("data", json!("OK"));
        let value = sandbox.execute("return data", ctx).await.unwrap();
        assert_eq!(value, json!("OK"));
    }

    #[tokio::test]
    async fn no_sandbox_is_unavailable() {
        let err = NoSandbox.execute("1", ScriptContext::new()).await.unwrap_err();
        assert_eq!(err, SandboxError::Unavailable);
    }

    #[test]
    fn collecting_host_records_vars() {
        let host = CollectingHost::new();
        host.set_var("temp", json!(21.5));
        host.set_var("temp", json!(22.0));
        host.log("hello");
        assert_eq!(host.variables().get("temp"), Some(&json!(22.0)));
    }
}
