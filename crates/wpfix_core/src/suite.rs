//! Built-in conformance cases and the suite runner.
//!
//! Each case runs in its own fixture session. Cases that need request
//! dispatch are skipped when the site does not declare that capability.

use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::fixture::{BaselinePlan, FixtureSession};
use crate::outcome::{ensure, ensure_eq, run_case, CaseError, CaseReport, Verdict};
use crate::rest::{RestRequest, RestResponse};
use crate::site::Backend;
use crate::token::TokenGenerator;
use crate::types::{
    ContentFilter, ContentId, ContentPatch, ContentStatus, ContentType, LookupKey, NewContent,
    NewPrincipal, Principal, Role,
};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

type Session<'a, 's> = &'a mut FixtureSession<'s, dyn Backend>;
type CaseResult = std::result::Result<(), CaseError>;
type CaseFn = fn(Session<'_, '_>, &HarnessConfig) -> CaseResult;

const WRONG_SECRET: &str = "wrong_password_123";
const POSTS_ROUTE: &str = "/wp/v2/posts";

/// A named conformance case.
pub struct Case {
    pub name: &'static str,
    pub description: &'static str,
    /// Baseline role override; `None` follows the configured baseline.
    pub baseline: Option<Role>,
    pub requires_rest: bool,
    run: CaseFn,
}

impl Case {
    const fn new(name: &'static str, description: &'static str, run: CaseFn) -> Self {
        Self {
            name,
            description,
            baseline: None,
            requires_rest: false,
            run,
        }
    }

    const fn rest(mut self, baseline: Role) -> Self {
        self.baseline = Some(baseline);
        self.requires_rest = true;
        self
    }

    /// Whether the case name contains `filter`.
    pub fn matches(&self, filter: Option<&str>) -> bool {
        filter.map_or(true, |f| self.name.contains(f))
    }

    fn plan(&self, config: &HarnessConfig) -> BaselinePlan {
        match self.baseline {
            Some(role) => BaselinePlan::Principal(role),
            None => BaselinePlan::from_config(&config.fixtures),
        }
    }
}

static CASES: &[Case] = &[
    Case::new(
        "auth_accepts_correct_secret",
        "the baseline principal authenticates with the fixture secret",
        auth_accepts_correct_secret,
    ),
    Case::new(
        "auth_rejects_wrong_secret",
        "a wrong secret yields incorrect_secret",
        auth_rejects_wrong_secret,
    ),
    Case::new(
        "auth_rejects_unknown_login",
        "a login that was never created yields unknown_principal",
        auth_rejects_unknown_login,
    ),
    Case::new(
        "principal_lookup_by_login_and_email",
        "id, login and email lookups resolve the same principal",
        principal_lookup_by_login_and_email,
    ),
    Case::new(
        "principal_duplicate_login_rejected",
        "creating a second principal with a taken login fails",
        principal_duplicate_login_rejected,
    ),
    Case::new(
        "content_create_and_read",
        "a created item reads back with the same fields",
        content_create_and_read,
    ),
    Case::new(
        "content_update_changes_fields",
        "an update changes only the patched fields",
        content_update_changes_fields,
    ),
    Case::new(
        "content_trash_then_permanent_delete",
        "a soft delete trashes, a permanent delete removes",
        content_trash_then_permanent_delete,
    ),
    Case::new(
        "content_query_filters_by_status",
        "status filters include and exclude fixture items",
        content_query_filters_by_status,
    ),
    Case::new(
        "content_query_respects_page_size",
        "page size bounds the items but not the matched count",
        content_query_respects_page_size,
    ),
    Case::new(
        "content_query_within_time_budget",
        "a filtered query completes within the configured budget",
        content_query_within_time_budget,
    ),
    Case::new(
        "delete_is_idempotent",
        "deleting an absent item reports nothing deleted",
        delete_is_idempotent,
    ),
    Case::new(
        "rest_create_requires_authentication",
        "anonymous create is rejected with 401",
        rest_create_requires_authentication,
    )
    .rest(Role::Editor),
    Case::new(
        "rest_create_as_editor_returns_201",
        "an editor creates a post and the response carries its id",
        rest_create_as_editor_returns_201,
    )
    .rest(Role::Editor),
    Case::new(
        "rest_read_published_is_public",
        "anonymous callers can read a published post",
        rest_read_published_is_public,
    )
    .rest(Role::Editor),
    Case::new(
        "rest_update_and_delete_round_trip",
        "update, trash and force-delete through dispatch",
        rest_update_and_delete_round_trip,
    )
    .rest(Role::Editor),
    Case::new(
        "rest_users_me_requires_authentication",
        "the current-user route rejects anonymous callers",
        rest_users_me_requires_authentication,
    )
    .rest(Role::Editor),
];

/// All built-in cases in run order.
pub fn cases() -> &'static [Case] {
    CASES
}

/// Aggregate result of a suite run.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub cases: Vec<CaseReport>,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
    pub duration_ms: u64,
}

impl SuiteReport {
    fn from_cases(cases: Vec<CaseReport>, duration_ms: u64) -> Self {
        let mut report = Self {
            cases: Vec::new(),
            passed: 0,
            failed: 0,
            errored: 0,
            skipped: 0,
            duration_ms,
        };
        for case in &cases {
            match case.verdict {
                Verdict::Passed => report.passed += 1,
                Verdict::Failed { .. } => report.failed += 1,
                Verdict::Errored { .. } => report.errored += 1,
                Verdict::Skipped { .. } => report.skipped += 1,
            }
        }
        report.cases = cases;
        report
    }

    /// True when any case failed or errored. Skips do not count.
    pub fn has_failures(&self) -> bool {
        self.failed + self.errored > 0
    }

    /// Cases whose teardown left something behind or hit an error.
    pub fn unclean(&self) -> impl Iterator<Item = &CaseReport> {
        self.cases.iter().filter(|c| !c.cleanup.is_clean())
    }

    pub fn summary(&self) -> String {
        format!(
            "{} cases: {} passed, {} failed, {} errored, {} skipped",
            self.cases.len(),
            self.passed,
            self.failed,
            self.errored,
            self.skipped
        )
    }
}

/// Run every case whose name contains `filter`, calling `on_case` after each.
///
/// One token generator is shared across the run so consecutive cases never
/// reuse fixture names.
pub fn run_suite(
    backend: &(dyn Backend + 'static),
    config: &HarnessConfig,
    filter: Option<&str>,
    mut on_case: impl FnMut(&CaseReport),
) -> Result<SuiteReport> {
    let selected: Vec<&Case> = CASES.iter().filter(|c| c.matches(filter)).collect();
    if selected.is_empty() {
        return Err(HarnessError::NoMatchingCases(
            filter.unwrap_or_default().to_string(),
        ));
    }

    info!(cases = selected.len(), "running suite");
    let started = Instant::now();
    let mut tokens = TokenGenerator::new(&config.token);
    let mut reports = Vec::with_capacity(selected.len());

    for case in selected {
        let report = if case.requires_rest && !config.capabilities.rest_dispatch {
            debug!(case = case.name, "request dispatch not supported");
            CaseReport::skipped(case.name, "site does not support request dispatch", 0)
        } else {
            run_case(
                backend,
                config,
                &mut tokens,
                case.name,
                case.plan(config),
                |s| (case.run)(s, config),
            )
        };
        on_case(&report);
        reports.push(report);
    }

    let report = SuiteReport::from_cases(reports, started.elapsed().as_millis() as u64);
    info!(summary = %report.summary(), "suite finished");
    Ok(report)
}

// ===== Helpers =====

fn baseline(s: &FixtureSession<'_, dyn Backend>) -> std::result::Result<Principal, CaseError> {
    s.baseline()
        .cloned()
        .ok_or_else(|| CaseError::Skipped("case needs a baseline principal".to_string()))
}

fn expect_status(response: &RestResponse, status: u16, what: &str) -> CaseResult {
    if response.status == status {
        Ok(())
    } else {
        Err(CaseError::failed(format!(
            "{}: expected status {}, got {} ({})",
            what,
            status,
            response.status,
            response.error_code().unwrap_or("no error code")
        )))
    }
}

fn post_route(id: ContentId) -> String {
    format!("{}/{}", POSTS_ROUTE, id.0)
}

fn author_filter(author: &Principal, status: ContentStatus) -> ContentFilter {
    ContentFilter {
        content_type: Some(ContentType::Post),
        status: Some(status),
        author: Some(author.id),
        page_size: None,
    }
}

// ===== Identity =====

fn auth_accepts_correct_secret(s: Session<'_, '_>, _: &HarnessConfig) -> CaseResult {
    let base = baseline(s)?;
    let principal = s.site().authenticate(&base.login, s.secret())?;
    ensure_eq(principal.id, base.id, "authenticated principal")?;
    ensure_eq(principal.login.as_str(), base.login.as_str(), "authenticated login")
}

fn auth_rejects_wrong_secret(s: Session<'_, '_>, _: &HarnessConfig) -> CaseResult {
    let base = baseline(s)?;
    match s.site().authenticate(&base.login, WRONG_SECRET) {
        Ok(p) => Err(CaseError::failed(format!(
            "wrong secret authenticated as {}",
            p.id
        ))),
        Err(err) => ensure_eq(err.kind(), "incorrect_secret", "error kind"),
    }
}

fn auth_rejects_unknown_login(s: Session<'_, '_>, _: &HarnessConfig) -> CaseResult {
    let login = s.unique_name("nobody");
    let secret = s.secret().to_string();
    match s.site().authenticate(&login, &secret) {
        Ok(p) => Err(CaseError::failed(format!(
            "unknown login {} authenticated as {}",
            login, p.id
        ))),
        Err(err) => ensure_eq(err.kind(), "unknown_principal", "error kind"),
    }
}

fn principal_lookup_by_login_and_email(s: Session<'_, '_>, _: &HarnessConfig) -> CaseResult {
    let base = baseline(s)?;
    let keys = [
        LookupKey::Id(base.id),
        LookupKey::Login(base.login.clone()),
        LookupKey::Email(base.email.clone()),
    ];
    for key in &keys {
        let found = s.site().lookup_principal(key)?;
        let found = found.ok_or_else(|| CaseError::failed(format!("{:?} did not resolve", key)))?;
        ensure_eq(found.id, base.id, &format!("principal for {:?}", key))?;
    }
    Ok(())
}

fn principal_duplicate_login_rejected(s: Session<'_, '_>, _: &HarnessConfig) -> CaseResult {
    let base = baseline(s)?;
    let local = s.unique_name("dup");
    let domain = base.email.rsplit('@').next().unwrap_or("example.com").to_string();
    let duplicate = NewPrincipal {
        login: base.login.clone(),
        secret: s.secret().to_string(),
        email: format!("{}@{}", local, domain),
        role: Role::Subscriber,
        display_name: None,
    };
    match s.create_principal_with(&duplicate) {
        Ok(id) => Err(CaseError::failed(format!(
            "duplicate login {} was accepted as {}",
            base.login, id
        ))),
        Err(err) => ensure_eq(err.kind(), "existing_login", "error kind"),
    }
}

// ===== Content =====

fn content_create_and_read(s: Session<'_, '_>, _: &HarnessConfig) -> CaseResult {
    let base = baseline(s)?;
    let new = NewContent {
        title: s.token().label("Read Back"),
        body: format!("Body for {}", s.token()),
        status: ContentStatus::Publish,
        author: base.id,
        content_type: ContentType::Post,
    };
    let id = s.create_content(&new)?;
    let item = s
        .site()
        .lookup_content(id)?
        .ok_or_else(|| CaseError::failed(format!("{} did not resolve after create", id)))?;

    ensure_eq(item.id, id, "content id")?;
    ensure_eq(item.title.as_str(), new.title.as_str(), "title")?;
    ensure_eq(item.body.as_str(), new.body.as_str(), "body")?;
    ensure_eq(item.status, ContentStatus::Publish, "status")?;
    ensure_eq(item.author, base.id, "author")
}

fn content_update_changes_fields(s: Session<'_, '_>, _: &HarnessConfig) -> CaseResult {
    let id = s.create_post("Before Update", ContentStatus::Draft)?;
    let original = s
        .site()
        .lookup_content(id)?
        .ok_or_else(|| CaseError::failed(format!("{} did not resolve", id)))?;

    let title = s.token().label("After Update");
    let patch = ContentPatch {
        title: Some(title.clone()),
        body: None,
        status: Some(ContentStatus::Publish),
    };
    let updated_id = s.site().update_content(id, &patch)?;
    ensure_eq(updated_id, id, "updated id")?;

    let item = s
        .site()
        .lookup_content(id)?
        .ok_or_else(|| CaseError::failed(format!("{} vanished after update", id)))?;
    ensure_eq(item.title, title, "title")?;
    ensure_eq(item.status, ContentStatus::Publish, "status")?;
    ensure_eq(item.body, original.body, "untouched body")
}

fn content_trash_then_permanent_delete(s: Session<'_, '_>, _: &HarnessConfig) -> CaseResult {
    let id = s.create_post("Trash Me", ContentStatus::Publish)?;

    let trashed = s.site().delete_content(id, false)?;
    ensure(trashed.is_some(), "soft delete reported nothing deleted")?;
    let item = s.site().lookup_content(id)?;
    ensure_eq(
        item.map(|i| i.status),
        Some(ContentStatus::Trash),
        "status after soft delete",
    )?;

    let removed = s.site().delete_content(id, true)?;
    ensure(removed.is_some(), "permanent delete reported nothing deleted")?;
    ensure(
        s.site().lookup_content(id)?.is_none(),
        format!("{} still resolves after permanent delete", id),
    )
}

fn content_query_filters_by_status(s: Session<'_, '_>, _: &HarnessConfig) -> CaseResult {
    let base = baseline(s)?;
    let published = s.create_post("Published", ContentStatus::Publish)?;
    let draft = s.create_post("Draft", ContentStatus::Draft)?;

    let result = s
        .site()
        .query_content(&author_filter(&base, ContentStatus::Publish))?;
    ensure(result.contains(published), "published post missing from publish query")?;
    ensure(!result.contains(draft), "draft post returned by publish query")?;

    let result = s
        .site()
        .query_content(&author_filter(&base, ContentStatus::Draft))?;
    ensure(result.contains(draft), "draft post missing from draft query")?;
    ensure(!result.contains(published), "published post returned by draft query")
}

fn content_query_respects_page_size(s: Session<'_, '_>, _: &HarnessConfig) -> CaseResult {
    let base = baseline(s)?;
    for n in 1..=3 {
        s.create_post(&format!("Paged {}", n), ContentStatus::Publish)?;
    }

    let filter = ContentFilter {
        page_size: Some(2),
        ..author_filter(&base, ContentStatus::Publish)
    };
    let result = s.site().query_content(&filter)?;
    ensure_eq(result.matched_count, 3, "matched count")?;
    ensure_eq(result.items.len(), 2, "returned items")
}

fn content_query_within_time_budget(s: Session<'_, '_>, config: &HarnessConfig) -> CaseResult {
    let base = baseline(s)?;
    let id = s.create_post("Timed", ContentStatus::Publish)?;

    let budget = config.suite.query_time_budget();
    let started = Instant::now();
    let result = s
        .site()
        .query_content(&author_filter(&base, ContentStatus::Publish))?;
    let elapsed = started.elapsed();

    ensure(result.contains(id), "timed query missed the fixture post")?;
    ensure(
        elapsed <= budget,
        format!("query took {:?}, budget is {:?}", elapsed, budget),
    )
}

fn delete_is_idempotent(s: Session<'_, '_>, _: &HarnessConfig) -> CaseResult {
    let id = s.create_post("Delete Twice", ContentStatus::Publish)?;
    let first = s.site().delete_content(id, true)?;
    ensure(first.is_some(), "first delete reported nothing deleted")?;
    let second = s.site().delete_content(id, true)?;
    ensure(
        second.is_none(),
        format!("second delete of {} reported a deletion", id),
    )
}

// ===== Request dispatch =====

fn rest_create_requires_authentication(s: Session<'_, '_>, _: &HarnessConfig) -> CaseResult {
    let title = s.token().label("Anonymous");
    let request = RestRequest::post(POSTS_ROUTE)
        .param("title", title)
        .param("content", "should not exist")
        .param("status", "publish");
    let response = s.dispatch_anonymous(request);
    expect_status(&response, 401, "anonymous create")?;
    ensure(
        response.entity_id().is_none(),
        "anonymous create returned an entity id",
    )
}

fn rest_create_as_editor_returns_201(s: Session<'_, '_>, _: &HarnessConfig) -> CaseResult {
    let base = baseline(s)?;
    s.act_as(base.id);

    let title = s.token().label("Dispatched");
    let request = RestRequest::post(POSTS_ROUTE)
        .param("title", title.clone())
        .param("content", "created through dispatch")
        .param("status", "publish");
    let response = s.dispatch(request);
    expect_status(&response, 201, "editor create")?;

    let id = response
        .entity_id()
        .map(ContentId)
        .ok_or_else(|| CaseError::failed("create response has no positive id"))?;
    let item = s
        .site()
        .lookup_content(id)?
        .ok_or_else(|| CaseError::failed(format!("{} from create does not resolve", id)))?;
    ensure_eq(item.author, base.id, "author")?;
    ensure_eq(item.title, title, "title")
}

fn rest_read_published_is_public(s: Session<'_, '_>, _: &HarnessConfig) -> CaseResult {
    let id = s.create_post("Public", ContentStatus::Publish)?;
    let response = s.dispatch_anonymous(RestRequest::get(post_route(id)));
    expect_status(&response, 200, "anonymous read")?;
    ensure_eq(response.entity_id(), Some(id.0), "response id")
}

fn rest_update_and_delete_round_trip(s: Session<'_, '_>, _: &HarnessConfig) -> CaseResult {
    let base = baseline(s)?;
    s.act_as(base.id);
    let id = s.create_post("Round Trip", ContentStatus::Draft)?;
    let route = post_route(id);

    let title = s.token().label("Round Trip Updated");
    let response = s.dispatch(RestRequest::post(route.clone()).param("title", title.clone()));
    expect_status(&response, 200, "update")?;
    ensure_eq(
        response.body["title"]["rendered"].as_str(),
        Some(title.as_str()),
        "updated title",
    )?;

    let response = s.dispatch(RestRequest::delete(route.clone()));
    expect_status(&response, 200, "trash")?;
    ensure_eq(response.body["status"].as_str(), Some("trash"), "status after trash")?;

    let response = s.dispatch(RestRequest::delete(route).param("force", true));
    expect_status(&response, 200, "force delete")?;
    ensure_eq(response.body["deleted"].as_bool(), Some(true), "deleted flag")?;
    ensure(
        s.site().lookup_content(id)?.is_none(),
        format!("{} still resolves after force delete", id),
    )
}

fn rest_users_me_requires_authentication(s: Session<'_, '_>, _: &HarnessConfig) -> CaseResult {
    let base = baseline(s)?;
    let response = s.dispatch_anonymous(RestRequest::get("/wp/v2/users/me"));
    expect_status(&response, 401, "anonymous current user")?;

    let secret = s.secret().to_string();
    let principal = s.authenticate_as(&base.login, &secret)?;
    ensure_eq(s.acting_principal(), Some(principal.id), "acting principal")?;
    let response = s.dispatch(RestRequest::get("/wp/v2/users/me"));
    expect_status(&response, 200, "authenticated current user")?;
    ensure_eq(response.entity_id(), Some(base.id.0), "current user id")?;

    s.clear_acting();
    let response = s.dispatch(RestRequest::get("/wp/v2/users/me"));
    expect_status(&response, 401, "current user after clearing the acting principal")
}
