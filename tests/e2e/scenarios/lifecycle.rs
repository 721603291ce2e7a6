use crate::harness::{Assertion, Scenario};
use wpfix_core::{BaselinePlan, ContentStatus, FixtureState, Role, Site};

#[test]
fn test_begin_end_leaves_site_empty() {
    Scenario::new("begin_end")
        .begin()
        .assert_state(FixtureState::FixturesReady)
        .assert(Assertion::PrincipalCount(1))
        .assert(Assertion::BaselineAuthenticates)
        .create_post("First", ContentStatus::Publish)
        .create_post("Second", ContentStatus::Draft)
        .assert(Assertion::TrackedCount(2))
        .assert(Assertion::ContentCount(2))
        .end()
        .assert(Assertion::NoSession)
        .assert(Assertion::CleanupDeleted(3))
        .assert_cleanup_clean()
        .assert_site_empty()
        .run()
        .unwrap();
}

#[test]
fn test_baseline_rejects_wrong_secret() {
    Scenario::new("baseline_wrong_secret")
        .begin()
        .assert(Assertion::BaselineRejects {
            secret: "wrong_password_123".into(),
        })
        .end()
        .assert_site_empty()
        .run()
        .unwrap();
}

#[test]
fn test_no_baseline_plan_creates_nothing() {
    Scenario::new("no_baseline")
        .begin_with(BaselinePlan::None)
        .assert(Assertion::PrincipalCount(0))
        .create_principal(Role::Editor)
        .act_as_last_principal()
        .create_post("By extra principal", ContentStatus::Publish)
        .end()
        .assert(Assertion::CleanupDeleted(2))
        .assert_site_empty()
        .run()
        .unwrap();
}

#[test]
fn test_consecutive_sessions_use_fresh_tokens() {
    // A two-value suffix range on a frozen clock forces the redraw path.
    Scenario::new("fresh_tokens")
        .clock_at(1_700_000_000)
        .configure(|c| {
            c.token.suffix_min = 1;
            c.token.suffix_max = 2;
        })
        .begin()
        .end()
        .begin()
        .end()
        .begin()
        .end()
        .assert(Assertion::ConsecutiveTokensDiffer)
        .assert_site_empty()
        .run()
        .unwrap();
}

#[test]
fn test_fixture_timestamps_follow_clock() {
    Scenario::new("clock_timestamps")
        .clock_at(1_700_000_000)
        .begin()
        .create_post("Early", ContentStatus::Publish)
        .wait_secs(3600)
        .create_post("Late", ContentStatus::Publish)
        .assert(Assertion::custom(|ts| {
            let site = ts.site();
            let filter = wpfix_core::ContentFilter {
                status: Some(ContentStatus::Publish),
                ..Default::default()
            };
            let result = site.query_content(&filter)?;
            anyhow::ensure!(result.items.len() == 2, "expected two posts");
            // Newest first.
            anyhow::ensure!(result.items[0].created_at == 1_700_003_600, "late post time");
            anyhow::ensure!(result.items[1].created_at == 1_700_000_000, "early post time");
            Ok(())
        }))
        .end()
        .assert_site_empty()
        .run()
        .unwrap();
}

#[test]
fn test_config_round_trips_through_file() {
    Scenario::new("config_file")
        .configure(|c| {
            c.fixtures.login_prefix = "e2euser".into();
            c.fixtures.baseline_role = Role::Editor;
            c.cleanup.verify = true;
        })
        .begin()
        .assert(Assertion::custom(|ts| {
            let loaded = wpfix_core::HarnessConfig::load(&ts.config_path())?;
            anyhow::ensure!(loaded.fixtures.login_prefix == "e2euser", "prefix not persisted");
            anyhow::ensure!(loaded.cleanup.verify, "verify flag not persisted");
            anyhow::ensure!(
                ts.site().principal_count() == 1,
                "baseline should exist"
            );
            Ok(())
        }))
        .end()
        .assert_cleanup_clean()
        .assert_site_empty()
        .run()
        .unwrap();
}

#[test]
fn test_missing_session_fails_scenario() {
    let err = Scenario::new("no_session")
        .create_post("Orphan", ContentStatus::Draft)
        .run()
        .unwrap_err();
    assert!(err.contains("No active session"));
}
