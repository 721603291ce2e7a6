use super::assertions::{Assertion, VerdictMatch};
use super::clock::MockClock;
use super::runner::ScenarioRunner;
use super::site::TestSite;
use super::steps::{CaseBody, ScenarioStep};
use wpfix_core::{
    BaselinePlan, ContentStatus, FixtureState, HarnessConfig, RestRequest, Role, SiteOp,
};

/// Fluent DSL for building test scenarios
pub struct Scenario {
    name: String,
    config: HarnessConfig,
    clock: MockClock,
    steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Create a new scenario with the given name and default config
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            config: HarnessConfig::default(),
            clock: MockClock::new(),
            steps: Vec::new(),
        }
    }

    // ===== Initial setup =====

    /// Adjust the config before the site is built
    pub fn configure(mut self, f: impl FnOnce(&mut HarnessConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Freeze the clock at a fixed timestamp
    pub fn clock_at(mut self, timestamp: i64) -> Self {
        self.clock = MockClock::at(timestamp);
        self
    }

    // ===== Session lifecycle =====

    /// Begin a session with the configured baseline
    pub fn begin(mut self) -> Self {
        self.steps.push(ScenarioStep::BeginSession { plan: None });
        self
    }

    /// Begin a session with an explicit baseline plan
    pub fn begin_with(mut self, plan: BaselinePlan) -> Self {
        self.steps.push(ScenarioStep::BeginSession { plan: Some(plan) });
        self
    }

    /// End the session through `end()`
    pub fn end(mut self) -> Self {
        self.steps.push(ScenarioStep::EndSession);
        self
    }

    /// Drop the session without calling `end()`
    pub fn drop_session(mut self) -> Self {
        self.steps.push(ScenarioStep::DropSession);
        self
    }

    /// Panic while the session is held
    pub fn panic_with_session(mut self, message: &str) -> Self {
        self.steps.push(ScenarioStep::PanicWithSession {
            message: message.to_string(),
        });
        self
    }

    // ===== Fixture actions =====

    /// Create a tracked post
    pub fn create_post(mut self, title: &str, status: ContentStatus) -> Self {
        self.steps.push(ScenarioStep::CreatePost {
            title: title.to_string(),
            status,
        });
        self
    }

    /// Create a tracked principal
    pub fn create_principal(mut self, role: Role) -> Self {
        self.steps.push(ScenarioStep::CreatePrincipal { role });
        self
    }

    /// Make later requests and posts act as the baseline
    pub fn act_as_baseline(mut self) -> Self {
        self.steps.push(ScenarioStep::ActAsBaseline);
        self
    }

    /// Make later requests and posts act as the last created principal
    pub fn act_as_last_principal(mut self) -> Self {
        self.steps.push(ScenarioStep::ActAsLastPrincipal);
        self
    }

    /// Dispatch as the acting principal
    pub fn dispatch(mut self, request: RestRequest) -> Self {
        self.steps.push(ScenarioStep::Dispatch {
            request,
            anonymous: false,
        });
        self
    }

    /// Dispatch with no acting principal
    pub fn dispatch_anonymous(mut self, request: RestRequest) -> Self {
        self.steps.push(ScenarioStep::Dispatch {
            request,
            anonymous: true,
        });
        self
    }

    // ===== Outside interference =====

    /// Delete the `index`-th created post behind the session's back
    pub fn delete_post_directly(mut self, index: usize, permanent: bool) -> Self {
        self.steps
            .push(ScenarioStep::DeletePostDirectly { index, permanent });
        self
    }

    /// Fail the next call of `op`
    pub fn inject_fault(mut self, op: SiteOp, message: &str) -> Self {
        self.steps.push(ScenarioStep::InjectFault {
            op,
            message: message.to_string(),
        });
        self
    }

    // ===== Whole cases =====

    /// Run a case through `run_case`
    pub fn run_case(mut self, name: &str, body: CaseBody) -> Self {
        self.steps.push(ScenarioStep::RunCase {
            name: name.to_string(),
            body,
        });
        self
    }

    /// Run the built-in suite
    pub fn run_suite(mut self, filter: Option<&str>) -> Self {
        self.steps.push(ScenarioStep::RunSuite {
            filter: filter.map(str::to_string),
        });
        self
    }

    // ===== Time control =====

    /// Advance the mock clock
    pub fn wait_secs(mut self, seconds: u64) -> Self {
        self.steps.push(ScenarioStep::AdvanceClock { seconds });
        self
    }

    // ===== Assertions =====

    /// Add a general assertion
    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.steps.push(ScenarioStep::Assert { assertion });
        self
    }

    /// Assert nothing is left on the site
    pub fn assert_site_empty(self) -> Self {
        self.assert(Assertion::SiteEmpty)
    }

    /// Assert the active session is in a specific state
    pub fn assert_state(self, state: FixtureState) -> Self {
        self.assert(Assertion::SessionState(state))
    }

    /// Assert the last teardown was clean
    pub fn assert_cleanup_clean(self) -> Self {
        self.assert(Assertion::CleanupClean)
    }

    /// Assert the last dispatch returned `status`
    pub fn assert_status(self, status: u16) -> Self {
        self.assert(Assertion::ResponseStatus(status))
    }

    /// Assert the last dispatch returned `status` with error `code`
    pub fn assert_error(self, status: u16, code: &str) -> Self {
        self.assert(Assertion::ResponseStatus(status))
            .assert(Assertion::ResponseCode(code.to_string()))
    }

    /// Assert the last case's verdict
    pub fn assert_verdict(self, verdict: VerdictMatch) -> Self {
        self.assert(Assertion::CaseVerdict(verdict))
    }

    // ===== Execution =====

    /// Execute the scenario and return results
    pub fn run(self) -> ScenarioResult {
        let test_site = match TestSite::new(self.config, self.clock) {
            Ok(site) => site,
            Err(e) => {
                return ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: 0,
                    failure_step: Some(0),
                    error: Some(format!("Failed to create test site: {:#}", e)),
                }
            }
        };

        let mut runner = ScenarioRunner::new(&test_site);
        match runner.execute(&self.steps) {
            Ok(()) => ScenarioResult {
                name: self.name,
                success: true,
                steps_executed: self.steps.len(),
                failure_step: None,
                error: None,
            },
            Err(e) => {
                let failure_step = runner.current_step();
                ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: failure_step,
                    failure_step: Some(failure_step),
                    error: Some(format!("{:?}", e)),
                }
            }
        }
    }
}

/// Result of running a scenario
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub steps_executed: usize,
    pub failure_step: Option<usize>,
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Unwrap the result, panicking if it failed
    pub fn unwrap(self) {
        if !self.success {
            panic!(
                "Scenario '{}' failed at step {}: {}",
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    /// Expect the result to be successful
    pub fn expect(self, msg: &str) {
        if !self.success {
            panic!(
                "{}: Scenario '{}' failed at step {}: {}",
                msg,
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    /// Expect the scenario to fail
    pub fn unwrap_err(self) -> String {
        if self.success {
            panic!("Scenario '{}' was expected to fail", self.name);
        }
        self.error.unwrap_or_default()
    }
}
