//! wpfix Core Library
//!
//! A fixture-isolated integration-test harness for content-and-identity
//! systems, providing:
//! - Uniquely-named ephemeral fixtures (principals, content items)
//! - Guaranteed cleanup on every exit path, including panics
//! - Skip-on-setup-failure, kept distinct from assertion failures
//! - A built-in conformance suite and an in-memory reference site
//! - An HTTP-backed site for running the suite against a live install
//!
//! # Quick Start
//!
//! ```
//! use wpfix_core::{FixtureSession, HarnessConfig, InMemorySite, Site};
//!
//! let site = InMemorySite::new();
//! let config = HarnessConfig::default();
//!
//! let mut session = FixtureSession::begin(&site, &config).unwrap();
//! let author = session.baseline_id().unwrap();
//! let login = session.baseline().unwrap().login.clone();
//!
//! // Authenticate the baseline principal
//! let principal = site.authenticate(&login, &config.fixtures.secret).unwrap();
//! assert_eq!(principal.id, author);
//!
//! // Everything created through the session is removed by `end`
//! let report = session.end();
//! assert!(report.is_clean());
//! assert_eq!(site.principal_count(), 0);
//! ```
//!
//! # Running cases
//!
//! [`run_case`] wraps a body with setup, panic capture and teardown and
//! returns a [`Verdict`]:
//!
//! ```
//! use wpfix_core::{
//!     ensure, run_case, BaselinePlan, ContentStatus, HarnessConfig, InMemorySite, Site,
//!     TokenGenerator, Verdict,
//! };
//!
//! let site = InMemorySite::new();
//! let config = HarnessConfig::default();
//! let mut tokens = TokenGenerator::new(&config.token);
//!
//! let plan = BaselinePlan::from_config(&config.fixtures);
//! let report = run_case(&site, &config, &mut tokens, "draft_is_stored", plan, |s| {
//!     let id = s.create_post("Draft", ContentStatus::Draft)?;
//!     let item = s.site().lookup_content(id)?;
//!     ensure(item.is_some_and(|i| i.status == ContentStatus::Draft), "draft should resolve")
//! });
//!
//! assert_eq!(report.verdict, Verdict::Passed);
//! assert_eq!(site.content_count(), 0);
//! ```

mod config;
mod error;
mod fixture;
mod http;
mod memory;
mod outcome;
mod rest;
mod site;
mod suite;
mod token;
mod types;

pub use config::{
    Capabilities, CleanupConfig, FixtureConfig, HarnessConfig, SiteConfig, SuiteConfig,
    TokenConfig, CONFIG_FILE_NAME,
};
pub use error::{HarnessError, Result, SiteError, SiteResult};
pub use fixture::{
    BaselinePlan, CleanupFailure, CleanupReport, FixtureSession, FixtureState, TrackedEntity,
};
pub use http::HttpSite;
pub use memory::{InMemorySite, SiteOp};
pub use outcome::{ensure, ensure_eq, run_case, CaseError, CaseReport, Skip, Verdict};
pub use rest::{Method, RestRequest, RestResponse};
pub use site::{Backend, RestDispatch, Site};
pub use suite::{cases, run_suite, Case, SuiteReport};
pub use token::{TokenGenerator, UniquenessToken};
pub use types::*;

/// Time provider trait for testing.
///
/// Allows injecting controlled time into token generation and the in-memory
/// site. Only used when explicitly set via `with_time_provider()`.
pub trait TimeProvider: Send + Sync {
    /// Returns the current Unix timestamp in seconds.
    fn now(&self) -> i64;
}

impl<F> TimeProvider for F
where
    F: Fn() -> i64 + Send + Sync,
{
    fn now(&self) -> i64 {
        self()
    }
}
