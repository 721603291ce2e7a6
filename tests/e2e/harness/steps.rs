use super::assertions::Assertion;
use wpfix_core::{BaselinePlan, ContentStatus, RestRequest, Role, SiteOp};

/// Body executed by a `RunCase` step
#[derive(Debug, Clone)]
pub enum CaseBody {
    /// Return success without touching the site
    Pass,
    /// Create `n` published posts, then succeed
    CreatePosts(usize),
    /// Create a post, then fail with the message
    Fail(String),
    /// Create a post, then panic with the message
    Panic(String),
    /// Schedule a fault for `op`, then require a post that needs it
    SkipOnFault(SiteOp),
    /// Create a post and permanently delete it before returning
    DeleteOwnPost,
}

/// All possible actions in a test scenario
#[derive(Debug)]
pub enum ScenarioStep {
    // Session lifecycle
    BeginSession {
        /// `None` follows the configured baseline
        plan: Option<BaselinePlan>,
    },
    EndSession,
    DropSession,
    PanicWithSession {
        message: String,
    },

    // Fixture actions
    CreatePost {
        title: String,
        status: ContentStatus,
    },
    CreatePrincipal {
        role: Role,
    },
    ActAsBaseline,
    ActAsLastPrincipal,
    Dispatch {
        request: RestRequest,
        anonymous: bool,
    },

    // Outside interference
    DeletePostDirectly {
        index: usize,
        permanent: bool,
    },
    InjectFault {
        op: SiteOp,
        message: String,
    },

    // Whole cases
    RunCase {
        name: String,
        body: CaseBody,
    },
    RunSuite {
        filter: Option<String>,
    },

    // Time control
    AdvanceClock {
        seconds: u64,
    },

    // Assertions (can be interspersed)
    Assert {
        assertion: Assertion,
    },
}
