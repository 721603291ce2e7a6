//! Case verdicts and the catch-and-cleanup driver.

use crate::config::HarnessConfig;
use crate::error::SiteError;
use crate::fixture::{BaselinePlan, CleanupReport, FixtureSession, FixtureState};
use crate::site::Site;
use crate::token::{TokenGenerator, UniquenessToken};
use serde::Serialize;
use std::any::Any;
use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

/// Fixtures could not be built; the case cannot be evaluated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("skipped: {reason}")]
pub struct Skip {
    pub reason: String,
    /// Release of whatever setup had already created.
    pub cleanup: CleanupReport,
}

impl Skip {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            cleanup: CleanupReport::default(),
        }
    }

    pub fn with_cleanup(mut self, cleanup: CleanupReport) -> Self {
        self.cleanup = cleanup;
        self
    }
}

/// Early exit from a case body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaseError {
    /// Observed behaviour diverged from the expected contract.
    #[error("{0}")]
    Failed(String),

    /// A fixture needed mid-body could not be built.
    #[error("skipped: {0}")]
    Skipped(String),
}

impl CaseError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl From<Skip> for CaseError {
    fn from(skip: Skip) -> Self {
        Self::Skipped(skip.reason)
    }
}

/// An unexpected site error inside a body is an assertion failure.
impl From<SiteError> for CaseError {
    fn from(err: SiteError) -> Self {
        Self::Failed(format!("unexpected site error ({}): {}", err.kind(), err))
    }
}

/// Fail with `message` unless `condition` holds.
pub fn ensure(condition: bool, message: impl Into<String>) -> Result<(), CaseError> {
    if condition {
        Ok(())
    } else {
        Err(CaseError::Failed(message.into()))
    }
}

/// Fail unless `actual == expected`.
pub fn ensure_eq<T: PartialEq + Debug>(actual: T, expected: T, what: &str) -> Result<(), CaseError> {
    if actual == expected {
        Ok(())
    } else {
        Err(CaseError::Failed(format!(
            "{}: expected {:?}, got {:?}",
            what, expected, actual
        )))
    }
}

/// Outcome of one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed { message: String },
    /// The body panicked.
    Errored { message: String },
    Skipped { reason: String },
}

impl Verdict {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Short label for reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Passed => "PASS",
            Self::Failed { .. } => "FAIL",
            Self::Errored { .. } => "ERROR",
            Self::Skipped { .. } => "SKIP",
        }
    }

    /// Failure message or skip reason.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Passed => None,
            Self::Failed { message } | Self::Errored { message } => Some(message),
            Self::Skipped { reason } => Some(reason),
        }
    }

    fn state(&self) -> FixtureState {
        match self {
            Self::Passed => FixtureState::Passed,
            Self::Failed { .. } => FixtureState::Failed,
            Self::Errored { .. } => FixtureState::Errored,
            Self::Skipped { .. } => FixtureState::Skipped,
        }
    }
}

/// Verdict plus teardown details for one case.
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub name: String,
    pub verdict: Verdict,
    /// Token the fixtures were named with; absent when setup was skipped.
    pub token: Option<UniquenessToken>,
    pub duration_ms: u64,
    pub cleanup: CleanupReport,
}

impl CaseReport {
    /// Report for a case that never got past setup.
    pub fn skipped(name: &str, reason: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            verdict: Verdict::Skipped {
                reason: reason.into(),
            },
            token: None,
            duration_ms,
            cleanup: CleanupReport::default(),
        }
    }

    pub fn with_cleanup(mut self, cleanup: CleanupReport) -> Self {
        self.cleanup = cleanup;
        self
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Run `body` between fixture setup and teardown.
///
/// Setup failure yields [`Verdict::Skipped`] without running the body. A
/// panicking body yields [`Verdict::Errored`]. Teardown runs on every path and
/// its problems are reported in [`CaseReport::cleanup`], never in the verdict.
pub fn run_case<S, F>(
    site: &S,
    config: &HarnessConfig,
    tokens: &mut TokenGenerator,
    name: &str,
    plan: BaselinePlan,
    body: F,
) -> CaseReport
where
    S: Site + ?Sized,
    F: FnOnce(&mut FixtureSession<'_, S>) -> Result<(), CaseError>,
{
    let started = Instant::now();

    let mut session = match FixtureSession::begin_with(site, config, plan, tokens) {
        Ok(session) => session,
        Err(skip) => {
            debug!(case = name, reason = %skip.reason, "case skipped during setup");
            let duration_ms = started.elapsed().as_millis() as u64;
            return CaseReport::skipped(name, skip.reason, duration_ms).with_cleanup(skip.cleanup);
        }
    };

    let verdict = match session.advance(FixtureState::BodyRunning) {
        Err(err) => Verdict::Errored {
            message: err.to_string(),
        },
        Ok(()) => match panic::catch_unwind(AssertUnwindSafe(|| body(&mut session))) {
            Ok(Ok(())) => Verdict::Passed,
            Ok(Err(CaseError::Failed(message))) => Verdict::Failed { message },
            Ok(Err(CaseError::Skipped(reason))) => Verdict::Skipped { reason },
            Err(payload) => Verdict::Errored {
                message: panic_message(payload),
            },
        },
    };

    if let Err(err) = session.advance(verdict.state()) {
        warn!(case = name, error = %err, "could not record verdict state");
    }

    let token = session.token();
    let cleanup = session.end();
    if !cleanup.is_clean() {
        warn!(
            case = name,
            errors = cleanup.errors.len(),
            leaked = cleanup.leaked.len(),
            "cleanup was not clean"
        );
    }

    debug!(case = name, verdict = verdict.label(), "case finished");
    CaseReport {
        name: name.to_string(),
        verdict,
        token: Some(token),
        duration_ms: started.elapsed().as_millis() as u64,
        cleanup,
    }
}
