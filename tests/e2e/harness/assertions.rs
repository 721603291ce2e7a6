use super::site::TestSite;
use anyhow::Result;
use wpfix_core::{FixtureState, Verdict};

/// Declarative assertions on harness and site state
pub enum Assertion {
    // Site contents
    SiteEmpty,
    PrincipalCount(usize),
    ContentCount(usize),

    // Active session
    SessionState(FixtureState),
    NoSession,
    TrackedCount(usize),
    BaselineAuthenticates,
    BaselineRejects {
        secret: String,
    },

    // Setup
    SetupSkipped {
        reason_contains: String,
    },

    // Last teardown
    CleanupClean,
    CleanupDeleted(usize),
    CleanupAlreadyGone(usize),
    CleanupRetained(usize),
    CleanupErrors(usize),

    // Last dispatch
    ResponseStatus(u16),
    ResponseCode(String),
    /// String at a JSON pointer in the response body.
    ResponseField {
        pointer: String,
        expected: String,
    },

    // Last case
    CaseVerdict(VerdictMatch),
    CaseDetailContains(String),
    CaseCleanupClean,

    // Last suite
    SuitePassed(usize),
    SuiteSkipped(usize),
    SuiteNoFailures,

    // Tokens
    ConsecutiveTokensDiffer,

    // Custom
    Custom(Box<dyn Fn(&TestSite) -> Result<()> + Send + Sync>),
}

impl std::fmt::Debug for Assertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SiteEmpty => write!(f, "SiteEmpty"),
            Self::PrincipalCount(n) => write!(f, "PrincipalCount({})", n),
            Self::ContentCount(n) => write!(f, "ContentCount({})", n),
            Self::SessionState(s) => write!(f, "SessionState({:?})", s),
            Self::NoSession => write!(f, "NoSession"),
            Self::TrackedCount(n) => write!(f, "TrackedCount({})", n),
            Self::BaselineAuthenticates => write!(f, "BaselineAuthenticates"),
            Self::BaselineRejects { secret } => {
                write!(f, "BaselineRejects {{ secret: {:?} }}", secret)
            }
            Self::SetupSkipped { reason_contains } => {
                write!(f, "SetupSkipped {{ reason_contains: {:?} }}", reason_contains)
            }
            Self::CleanupClean => write!(f, "CleanupClean"),
            Self::CleanupDeleted(n) => write!(f, "CleanupDeleted({})", n),
            Self::CleanupAlreadyGone(n) => write!(f, "CleanupAlreadyGone({})", n),
            Self::CleanupRetained(n) => write!(f, "CleanupRetained({})", n),
            Self::CleanupErrors(n) => write!(f, "CleanupErrors({})", n),
            Self::ResponseStatus(s) => write!(f, "ResponseStatus({})", s),
            Self::ResponseCode(c) => write!(f, "ResponseCode({:?})", c),
            Self::ResponseField { pointer, expected } => {
                write!(f, "ResponseField({} = {:?})", pointer, expected)
            }
            Self::CaseVerdict(v) => write!(f, "CaseVerdict({:?})", v),
            Self::CaseDetailContains(s) => write!(f, "CaseDetailContains({:?})", s),
            Self::CaseCleanupClean => write!(f, "CaseCleanupClean"),
            Self::SuitePassed(n) => write!(f, "SuitePassed({})", n),
            Self::SuiteSkipped(n) => write!(f, "SuiteSkipped({})", n),
            Self::SuiteNoFailures => write!(f, "SuiteNoFailures"),
            Self::ConsecutiveTokensDiffer => write!(f, "ConsecutiveTokensDiffer"),
            Self::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}

impl Assertion {
    /// Wrap a closure as a custom assertion
    pub fn custom(check: impl Fn(&TestSite) -> Result<()> + Send + Sync + 'static) -> Self {
        Self::Custom(Box::new(check))
    }
}

/// Match against case verdicts, ignoring messages
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerdictMatch {
    Passed,
    Failed,
    Errored,
    Skipped,
}

impl VerdictMatch {
    pub fn matches(self, verdict: &Verdict) -> bool {
        matches!(
            (self, verdict),
            (Self::Passed, Verdict::Passed)
                | (Self::Failed, Verdict::Failed { .. })
                | (Self::Errored, Verdict::Errored { .. })
                | (Self::Skipped, Verdict::Skipped { .. })
        )
    }
}
