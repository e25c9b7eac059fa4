//! Guaranteed-teardown suite runner
//!
//! Drives one [`SuiteLifecycle`] through a whole run: prepare, every test,
//! dispose. Dispose runs on every path out of the suite, including a failed
//! prepare, failing tests and panicking tests.
//!
//! ```rust,ignore
//! let handle = SqliteHandle::open(&config.database, schema)?;
//! let pool = handle.accessor();
//! let mut lifecycle = SuiteLifecycle::from_config(handle, &config);
//!
//! let suite = Suite::from_config("accounts", &config)
//!     .test("creates account", |pool: SqlitePool| async move {
//!         sqlx::query("INSERT INTO accounts (name) VALUES ('a')").execute(&pool).await?;
//!         Ok(())
//!     });
//!
//! let report = run_suite(&mut lifecycle, pool, &suite).await;
//! ```

use crate::handle::ResourceHandle;
use crate::lifecycle::{DisposeOutcome, SuiteLifecycle};
use crate::report::{SuiteOutcome, SuiteReport, TeardownStatus, TestResult, TestStatus};
use chrono::Utc;
use fixtura_common::{ExecutionMode, HarnessConfig};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

type TestBody<A> = Box<dyn Fn(A) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// One named test receiving the domain accessor
pub struct TestCase<A> {
    name: String,
    body: TestBody<A>,
}

impl<A> TestCase<A> {
    pub fn new<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            body: Box::new(move |accessor| body(accessor).boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Tests sharing one setup/teardown lifecycle
pub struct Suite<A> {
    name: String,
    tests: Vec<TestCase<A>>,
    execution: ExecutionMode,
}

impl<A> Suite<A> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tests: Vec::new(),
            execution: ExecutionMode::Sequential,
        }
    }

    /// Empty suite scheduled by `config.lifecycle.execution`
    pub fn from_config(name: impl Into<String>, config: &HarnessConfig) -> Self {
        Self::new(name).execution(config.lifecycle.execution)
    }

    pub fn test<F, Fut>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.tests.push(TestCase::new(name, body));
        self
    }

    pub fn case(mut self, case: TestCase<A>) -> Self {
        self.tests.push(case);
        self
    }

    pub fn execution(mut self, mode: ExecutionMode) -> Self {
        self.execution = mode;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

/// Run `suite` inside the lifecycle bracket and report the outcome.
///
/// Never panics because of a test; never skips `dispose`.
pub async fn run_suite<H, A>(
    lifecycle: &mut SuiteLifecycle<H>,
    accessor: A,
    suite: &Suite<A>,
) -> SuiteReport
where
    H: ResourceHandle,
    A: Clone + Send + 'static,
{
    let run_id = Uuid::new_v4();
    let span = info_span!("suite", run_id = %run_id, suite = %suite.name);

    async move {
        let started_at = Utc::now();
        let resource = lifecycle.resource_id().to_string();

        let (outcome, results) = match lifecycle.prepare().await {
            Err(e) => {
                error!("Suite '{}' aborted, no test was run: {}", suite.name, e);
                (SuiteOutcome::Aborted(e.to_string()), Vec::new())
            }
            Ok(()) => match lifecycle.begin_tests() {
                Err(e) => (SuiteOutcome::Aborted(e.to_string()), Vec::new()),
                Ok(()) => {
                    info!("Running {} tests ({:?})", suite.tests.len(), suite.execution);
                    let results = run_tests(suite, accessor).await;
                    let outcome = if results.iter().all(|r| r.passed()) {
                        SuiteOutcome::Passed
                    } else {
                        SuiteOutcome::Failed
                    };
                    (outcome, results)
                }
            },
        };

        let teardown = match lifecycle.dispose().await {
            Ok(DisposeOutcome::Released) => TeardownStatus::Released,
            Ok(DisposeOutcome::AlreadyDisposed) => TeardownStatus::AlreadyDisposed,
            Err(e) => TeardownStatus::Failed(e.to_string()),
        };

        let report = SuiteReport {
            run_id,
            suite: suite.name.clone(),
            resource,
            started_at,
            finished_at: Utc::now(),
            outcome,
            results,
            teardown,
        };

        if report.is_success() && !report.has_teardown_warning() {
            info!("{}", report.summary_line());
        } else {
            warn!("{}", report.summary_line());
        }

        report
    }
    .instrument(span)
    .await
}

async fn run_tests<A>(suite: &Suite<A>, accessor: A) -> Vec<TestResult>
where
    A: Clone + Send + 'static,
{
    match suite.execution {
        ExecutionMode::Sequential => {
            let mut results = Vec::with_capacity(suite.tests.len());
            for case in &suite.tests {
                results.push(run_case(case, accessor.clone()).await);
            }
            results
        }
        ExecutionMode::Concurrent => {
            join_all(suite.tests.iter().map(|case| run_case(case, accessor.clone()))).await
        }
    }
}

async fn run_case<A>(case: &TestCase<A>, accessor: A) -> TestResult {
    let started = Instant::now();

    // Building the future runs user code too, so it is guarded as well
    let outcome = match std::panic::catch_unwind(AssertUnwindSafe(|| (case.body)(accessor))) {
        Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
        Err(panic) => Err(panic),
    };

    let status = match outcome {
        Ok(Ok(())) => TestStatus::Passed,
        Ok(Err(e)) => {
            warn!("Test '{}' failed: {:#}", case.name, e);
            TestStatus::Failed(format!("{:#}", e))
        }
        Err(panic) => {
            let message = panic_message(panic);
            warn!("Test '{}' panicked: {}", case.name, message);
            TestStatus::Panicked(message)
        }
    };

    TestResult {
        name: case.name.clone(),
        status,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
