//! E2E test harness for wpfix.
//!
//! This module contains test infrastructure with builders, variants and
//! methods that not every scenario uses.

#![allow(dead_code)]

pub mod assertions;
pub mod clock;
pub mod scenario;
pub mod site;
pub mod steps;

// Re-export commonly used types
pub use assertions::{Assertion, VerdictMatch};
pub use scenario::Scenario;
pub use steps::CaseBody;
