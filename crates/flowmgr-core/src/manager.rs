//! Execution manager.
//!
//! Ties launcher, resolver, poller and invokers together behind the three
//! caller-facing operations `run_workflow`, `invoke_function` and `call`,
//! plus the inspection helpers used by the command line.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::{ManagerConfig, PollConfig};
use crate::engine::{HttpWorkflowEngine, WorkflowEngine};
use crate::error::{Error, RemoteError, Result};
use crate::functions::{FunctionInvoker, FunctionService, HttpFunctionService};
use crate::launcher::{ExecutionLauncher, LaunchRequest, Launched};
use crate::outcome::InvocationResult;
use crate::payload::PayloadValidator;
use crate::poller::OutcomePoller;
use crate::resolver::LatestExecutionResolver;
use crate::result_ext::ResultExt;
use crate::state::{HttpStateStore, StateRecordAccessor, StateStore};
use crate::subprocess::SubprocessInvoker;
use crate::types::{ExecutionDescription, ExecutionHandle, RunRecord};

/// A workflow run: launch settings plus per-run poll overrides.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub launch: LaunchRequest,

    /// Overrides the configured poll timeout.
    pub timeout: Option<Duration>,

    /// Overrides the configured poll interval.
    pub interval: Option<Duration>,
}

impl RunRequest {
    pub fn new(workflow: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            launch: LaunchRequest::new(workflow, input),
            timeout: None,
            interval: None,
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.launch = self.launch.with_run_id(run_id);
        self
    }

    pub fn forced(mut self) -> Self {
        self.launch = self.launch.forced();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }
}

/// Coordinates the lifecycle of workflow executions, function invocations
/// and subprocess calls.
#[derive(Clone)]
pub struct ExecutionManager {
    engine: Arc<dyn WorkflowEngine>,
    records: StateRecordAccessor,
    launcher: ExecutionLauncher,
    resolver: LatestExecutionResolver,
    poller: OutcomePoller,
    functions: FunctionInvoker,
    subprocess: SubprocessInvoker,
}

impl ExecutionManager {
    /// Build a manager over explicit collaborators.
    pub fn new(
        engine: Arc<dyn WorkflowEngine>,
        store: Arc<dyn StateStore>,
        functions: Arc<dyn FunctionService>,
        config: &ManagerConfig,
    ) -> Self {
        let records = StateRecordAccessor::new(store);
        let validator =
            PayloadValidator::new(config.max_payload_bytes, config.required_fields.clone());

        Self {
            launcher: ExecutionLauncher::new(engine.clone(), records.clone(), validator),
            resolver: LatestExecutionResolver::new(records.clone()),
            poller: OutcomePoller::new(engine.clone(), config.poll.clone()),
            functions: FunctionInvoker::new(functions),
            subprocess: SubprocessInvoker::new(),
            engine,
            records,
        }
    }

    /// Build a manager talking to the HTTP collaborators named in `config`.
    pub fn from_config(config: &ManagerConfig) -> Self {
        tracing::debug!(
            engine_url = %config.engine_url,
            state_url = %config.state_url,
            functions_url = %config.functions_url,
            "Building HTTP collaborators"
        );

        Self::new(
            Arc::new(HttpWorkflowEngine::new(&config.engine_url, config.request_timeout)),
            Arc::new(HttpStateStore::new(&config.state_url, config.request_timeout)),
            Arc::new(HttpFunctionService::new(
                &config.functions_url,
                config.request_timeout,
            )),
            config,
        )
    }

    /// Replace the subprocess invoker used by [`ExecutionManager::call`].
    pub fn with_subprocess(mut self, subprocess: SubprocessInvoker) -> Self {
        self.subprocess = subprocess;
        self
    }

    /// Start an execution without waiting for it.
    pub async fn launch(&self, request: &LaunchRequest) -> Result<Launched> {
        self.launcher.launch(request).await.log("launching execution")
    }

    /// Start a workflow execution and wait for its outcome.
    pub async fn run_workflow(
        &self,
        request: &RunRequest,
        cancel: &CancellationToken,
    ) -> Result<InvocationResult> {
        let launched = self.launch(&request.launch).await?;
        let config = self.poll_config(request.timeout, request.interval);
        self.poller
            .poll_with(&launched.handle, &config, cancel)
            .await
    }

    /// Wait again for the latest execution of a run.
    pub async fn resume(
        &self,
        run_id: &str,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<InvocationResult> {
        let handle = self
            .resolver
            .resolve(run_id)
            .await
            .log("resolving latest execution")?;
        self.poll_execution(&handle, timeout, cancel).await
    }

    /// Wait for a known execution.
    pub async fn poll_execution(
        &self,
        handle: &ExecutionHandle,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<InvocationResult> {
        let config = self.poll_config(timeout, None);
        self.poller.poll_with(handle, &config, cancel).await
    }

    /// Invoke a remote function synchronously.
    pub async fn invoke_function(
        &self,
        function: &str,
        input: &serde_json::Value,
    ) -> Result<InvocationResult> {
        self.functions.invoke(function, input).await
    }

    /// Run a local command and relay its exit status.
    pub async fn call(
        &self,
        command: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<InvocationResult> {
        self.subprocess.call(command, args, cancel).await
    }

    /// Current description of an execution.
    pub async fn describe_execution(
        &self,
        handle: &ExecutionHandle,
    ) -> Result<ExecutionDescription> {
        self.engine.describe(handle).await.map_err(|e| match e {
            RemoteError::NotFound(_) => {
                Error::UnknownRun(format!("execution {} not found", handle.execution_id))
            }
            other => Error::Remote(other),
        })
    }

    /// Current description of the latest execution of a run.
    pub async fn describe_latest(&self, run_id: &str) -> Result<ExecutionDescription> {
        let handle = self.resolver.resolve(run_id).await?;
        self.describe_execution(&handle).await
    }

    /// The stored record of a run.
    pub async fn get_record(&self, run_id: &str) -> Result<RunRecord> {
        self.records
            .record(run_id)
            .await
            .map_err(Error::Remote)
            .log("loading run record")?
            .ok_or_else(|| Error::UnknownRun(run_id.to_string()))
    }

    fn poll_config(&self, timeout: Option<Duration>, interval: Option<Duration>) -> PollConfig {
        let mut config = self.poller.config().clone();
        if let Some(timeout) = timeout {
            config = config.with_timeout(timeout);
        }
        if let Some(interval) = interval {
            config = config.with_interval(interval);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{InMemoryWorkflowEngine, Script};
    use crate::functions::{FunctionResponse, InMemoryFunctionService};
    use crate::mapper;
    use crate::state::InMemoryStateStore;
    use crate::types::{ErrorDetail, ExecutionState};
    use serde_json::json;
    use tokio::time::Instant;

    struct Fixture {
        engine: InMemoryWorkflowEngine,
        store: InMemoryStateStore,
        manager: ExecutionManager,
    }

    fn fixture() -> Fixture {
        let engine = InMemoryWorkflowEngine::new();
        let store = InMemoryStateStore::new();
        let functions = InMemoryFunctionService::new();
        functions.register("echo", FunctionResponse::Returned);
        functions.register("explode", |_| {
            FunctionResponse::Raised(ErrorDetail::new("ValueError", "bad value"))
        });

        let mut config = ManagerConfig::default();
        config.poll = PollConfig {
            interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(1),
            backoff: 1.0,
            timeout: Duration::from_secs(5),
            timeout_extensions: 0,
        };

        let manager = ExecutionManager::new(
            Arc::new(engine.clone()),
            Arc::new(store.clone()),
            Arc::new(functions),
            &config,
        );

        Fixture {
            engine,
            store,
            manager,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_workflow_success() {
        let f = fixture();
        f.engine.script_next_start(
            Script::running_then(3, ExecutionState::Succeeded).with_output(json!({"rows": 10})),
        );

        let begin = Instant::now();
        let result = f
            .manager
            .run_workflow(
                &RunRequest::new("ingest", json!({"id": "item-1"})).with_run_id("item-1"),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(begin.elapsed(), Duration::from_secs(3));
        assert_eq!(mapper::exit_code(&result), 0);
        assert_eq!(mapper::into_library(result).unwrap(), json!({"rows": 10}));
        assert_eq!(f.store.get("item-1").await.unwrap().unwrap().executions.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_workflow_failure_maps_to_one() {
        let f = fixture();
        f.engine.script_next_start(
            Script::running_then(0, ExecutionState::Failed)
                .with_error(ErrorDetail::new("States.TaskFailed", "boom")),
        );

        let result = f
            .manager
            .run_workflow(&RunRequest::new("ingest", json!({})), &CancellationToken::new())
            .await;

        assert_eq!(mapper::exit_code(&result), 1);
        assert!(matches!(
            mapper::into_library(result),
            Err(Error::ExecutionFailure(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_workflow_timeout_override() {
        let f = fixture();
        f.engine.script_next_start(Script::running());

        let begin = Instant::now();
        let result = f
            .manager
            .run_workflow(
                &RunRequest::new("ingest", json!({})).with_timeout(Duration::from_secs(2)),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(begin.elapsed(), Duration::from_secs(2));
        assert_eq!(mapper::exit_code(&result), 2);
    }

    #[tokio::test]
    async fn test_invalid_payload_maps_to_three() {
        let f = fixture();
        let result = f
            .manager
            .run_workflow(&RunRequest::new("ingest", json!("text")), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(Error::InvalidPayload(_))));
        assert_eq!(mapper::exit_code(&result), 3);
        assert_eq!(f.engine.start_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_uses_latest_attempt() {
        let f = fixture();
        let exec_a = ExecutionHandle::new("exec-a", "ingest");
        let exec_b = ExecutionHandle::new("exec-b", "ingest");
        f.engine.insert(
            exec_a.clone(),
            json!({}),
            Script::running_then(0, ExecutionState::Failed),
        );
        f.engine.insert(
            exec_b.clone(),
            json!({}),
            Script::running_then(0, ExecutionState::Succeeded).with_output(json!("second")),
        );
        f.store.append_execution("item-42", &exec_a).await.unwrap();
        f.store.append_execution("item-42", &exec_b).await.unwrap();

        let result = f
            .manager
            .resume("item-42", None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result, InvocationResult::success(json!("second")));

        let description = f.manager.describe_latest("item-42").await.unwrap();
        assert_eq!(description.handle, exec_b);
    }

    #[tokio::test]
    async fn test_resume_unknown_run() {
        let f = fixture();
        let result = f
            .manager
            .resume("missing", None, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(Error::UnknownRun(_))));
        assert_eq!(mapper::exit_code(&result), 3);
    }

    #[tokio::test]
    async fn test_invoke_function() {
        let f = fixture();

        let ok = f.manager.invoke_function("echo", &json!({"x": 1})).await;
        assert_eq!(mapper::into_library(ok).unwrap(), json!({"x": 1}));

        let raised = f.manager.invoke_function("explode", &json!({})).await;
        assert_eq!(mapper::exit_code(&raised), 1);
        match mapper::into_library(raised) {
            Err(Error::FunctionFailure(detail)) => assert_eq!(detail.kind, "ValueError"),
            other => panic!("unexpected result: {other:?}"),
        }

        let unknown = f.manager.invoke_function("nope", &json!({})).await;
        assert_eq!(mapper::exit_code(&unknown), 3);
    }

    #[tokio::test]
    async fn test_call_exit_code() {
        let f = fixture();
        let result = f
            .manager
            .call(
                "sh",
                &["-c".to_string(), "exit 7".to_string()],
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(mapper::exit_code(&result), 7);
    }

    #[tokio::test]
    async fn test_get_record() {
        let f = fixture();
        f.store
            .append_execution("run-1", &ExecutionHandle::new("e1", "wf"))
            .await
            .unwrap();

        let record = f.manager.get_record("run-1").await.unwrap();
        assert_eq!(record.executions.len(), 1);

        assert!(matches!(
            f.manager.get_record("run-2").await,
            Err(Error::UnknownRun(_))
        ));
    }
}
