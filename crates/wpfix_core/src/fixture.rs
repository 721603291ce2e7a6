//! Fixture lifecycle for a single test case.
//!
//! A [`FixtureSession`] is opened by [`FixtureSession::begin`], which draws a
//! uniqueness token and creates the baseline principal. Every entity created
//! through the session is tracked and removed again by [`FixtureSession::end`].
//! If `end` is never reached, for example because the test body panicked, the
//! same cleanup runs from `Drop`. Cleanup runs exactly once either way.

use crate::config::{Capabilities, CleanupConfig, FixtureConfig, HarnessConfig};
use crate::error::{HarnessError, Result, SiteError, SiteResult};
use crate::outcome::Skip;
use crate::rest::{Method, RestRequest, RestResponse};
use crate::site::{RestDispatch, Site};
use crate::token::{TokenGenerator, UniquenessToken};
use crate::types::{
    ContentId, ContentStatus, ContentType, EntityRef, LookupKey, NewContent, NewPrincipal,
    Principal, PrincipalId, Role,
};
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// Lifecycle states of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureState {
    NotStarted,
    FixturesReady,
    BodyRunning,
    Passed,
    Failed,
    Errored,
    Skipped,
    CleanedUp,
}

impl FixtureState {
    fn can_transition_to(self, to: FixtureState) -> bool {
        use FixtureState::*;
        match (self, to) {
            (CleanedUp, _) | (_, CleanedUp) => false,
            (NotStarted, FixturesReady | Skipped) => true,
            (FixturesReady, BodyRunning) => true,
            (BodyRunning, Passed | Failed | Errored | Skipped) => true,
            _ => false,
        }
    }
}

impl fmt::Display for FixtureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Which baseline entities to create before the body runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselinePlan {
    /// Create nothing.
    None,
    /// Create one principal with the given role.
    Principal(Role),
}

impl BaselinePlan {
    pub fn from_config(config: &FixtureConfig) -> Self {
        if config.create_baseline {
            Self::Principal(config.baseline_role)
        } else {
            Self::None
        }
    }
}

/// An entity created during a case, with the token it was named with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackedEntity {
    pub entity: EntityRef,
    pub token: UniquenessToken,
}

/// A teardown delete that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    pub entity: EntityRef,
    pub message: String,
}

/// What teardown did for each entity.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Entities removed by teardown.
    pub deleted: Vec<EntityRef>,
    /// Entities that no longer existed when teardown reached them.
    pub already_gone: Vec<EntityRef>,
    /// Entities kept because the environment cannot delete them.
    pub retained: Vec<EntityRef>,
    /// Entities still resolvable after a successful delete (only with `cleanup.verify`).
    pub leaked: Vec<EntityRef>,
    /// Lookups or deletes that errored.
    pub errors: Vec<CleanupFailure>,
}

impl CleanupReport {
    /// True when no errors occurred and nothing leaked.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.leaked.is_empty()
    }
}

/// Test run context: fixtures, tracked entities and the acting principal for one case.
pub struct FixtureSession<'s, S: Site + ?Sized> {
    site: &'s S,
    fixtures: FixtureConfig,
    capabilities: Capabilities,
    cleanup: CleanupConfig,
    token: UniquenessToken,
    baseline: Option<Principal>,
    acting: Option<PrincipalId>,
    tracked: Vec<TrackedEntity>,
    state: FixtureState,
    released: bool,
    created_principals: u32,
}

impl<'s, S: Site + ?Sized> FixtureSession<'s, S> {
    /// Open a session with the configured baseline and a fresh token generator.
    pub fn begin(site: &'s S, config: &HarnessConfig) -> std::result::Result<Self, Skip> {
        let mut tokens = TokenGenerator::new(&config.token);
        Self::begin_with(
            site,
            config,
            BaselinePlan::from_config(&config.fixtures),
            &mut tokens,
        )
    }

    /// Open a session, drawing the token from `tokens`.
    ///
    /// Fails with [`Skip`] when the baseline cannot be created; the body must
    /// not run in that case.
    pub fn begin_with(
        site: &'s S,
        config: &HarnessConfig,
        plan: BaselinePlan,
        tokens: &mut TokenGenerator,
    ) -> std::result::Result<Self, Skip> {
        let token = tokens.next_token();
        let mut session = Self {
            site,
            fixtures: config.fixtures.clone(),
            capabilities: config.capabilities,
            cleanup: config.cleanup.clone(),
            token,
            baseline: None,
            acting: None,
            tracked: Vec::new(),
            state: FixtureState::NotStarted,
            released: false,
            created_principals: 0,
        };

        if let BaselinePlan::Principal(role) = plan {
            let new = NewPrincipal {
                login: token.login(&session.fixtures.login_prefix),
                secret: session.fixtures.secret.clone(),
                email: token.email(&session.fixtures.login_prefix, &session.fixtures.email_domain),
                role,
                display_name: None,
            };
            let id = match site.create_principal(&new) {
                Ok(id) => id,
                Err(err) => {
                    warn!(%token, error = %err, "baseline fixture setup failed");
                    return Err(session.abandon(err));
                }
            };
            match site.lookup_principal(&LookupKey::Id(id)) {
                Ok(Some(principal)) => {
                    debug!(id = %principal.id, login = %principal.login, "baseline principal created");
                    session.baseline = Some(principal);
                }
                Ok(None) => {
                    session.track(id);
                    let err = SiteError::Backend(format!("baseline principal {} vanished", new.login));
                    warn!(%token, error = %err, "baseline fixture setup failed");
                    return Err(session.abandon(err));
                }
                Err(err) => {
                    // Created but unreadable: still ours to remove.
                    session.track(id);
                    warn!(%token, error = %err, "baseline fixture setup failed");
                    return Err(session.abandon(err));
                }
            }
        }

        session.state = FixtureState::FixturesReady;
        debug!(%token, "fixtures ready");
        Ok(session)
    }

    pub fn site(&self) -> &'s S {
        self.site
    }

    pub fn token(&self) -> UniquenessToken {
        self.token
    }

    pub fn state(&self) -> FixtureState {
        self.state
    }

    pub fn baseline(&self) -> Option<&Principal> {
        self.baseline.as_ref()
    }

    pub fn baseline_id(&self) -> Option<PrincipalId> {
        self.baseline.as_ref().map(|p| p.id)
    }

    /// Secret given to every principal the session creates.
    pub fn secret(&self) -> &str {
        &self.fixtures.secret
    }

    pub fn acting_principal(&self) -> Option<PrincipalId> {
        self.acting
    }

    /// Act as `principal` for dispatched requests and content authorship.
    pub fn act_as(&mut self, principal: PrincipalId) {
        self.acting = Some(principal);
    }

    pub fn clear_acting(&mut self) {
        self.acting = None;
    }

    /// Authenticate and, on success, act as the returned principal.
    pub fn authenticate_as(&mut self, login: &str, secret: &str) -> SiteResult<Principal> {
        let principal = self.site.authenticate(login, secret)?;
        self.acting = Some(principal.id);
        Ok(principal)
    }

    /// Move the case to another lifecycle state.
    ///
    /// `CleanedUp` is only reachable through [`FixtureSession::end`] or drop.
    pub fn advance(&mut self, to: FixtureState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(HarnessError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        debug!(from = %self.state, %to, "fixture state");
        self.state = to;
        Ok(())
    }

    /// Record an entity created outside the session helpers.
    ///
    /// Only pass identifiers of successful creations.
    pub fn track(&mut self, entity: impl Into<EntityRef>) {
        self.tracked.push(TrackedEntity {
            entity: entity.into(),
            token: self.token,
        });
    }

    pub fn tracked(&self) -> &[TrackedEntity] {
        &self.tracked
    }

    /// A name unique to this case: `"{base}{n}_{token}"`.
    pub fn unique_name(&mut self, base: &str) -> String {
        self.created_principals += 1;
        format!("{}{}_{}", base, self.created_principals, self.token)
    }

    /// Create and track an extra principal with a unique login and email.
    pub fn create_principal(&mut self, role: Role) -> SiteResult<PrincipalId> {
        let prefix = self.fixtures.login_prefix.clone();
        let login = self.unique_name(&prefix);
        let new = NewPrincipal {
            email: format!("{}@{}", login, self.fixtures.email_domain),
            login,
            secret: self.fixtures.secret.clone(),
            role,
            display_name: None,
        };
        self.create_principal_with(&new)
    }

    /// Create and track a principal from explicit fields.
    pub fn create_principal_with(&mut self, new: &NewPrincipal) -> SiteResult<PrincipalId> {
        let id = self.site.create_principal(new)?;
        self.track(id);
        Ok(id)
    }

    /// Create and track a content item.
    pub fn create_content(&mut self, new: &NewContent) -> SiteResult<ContentId> {
        let id = self.site.create_content(new)?;
        self.track(id);
        Ok(id)
    }

    /// Create and track a post titled `"{title} {token}"`, authored by the
    /// acting principal or else the baseline.
    pub fn create_post(&mut self, title: &str, status: ContentStatus) -> SiteResult<ContentId> {
        let author = self
            .acting
            .or_else(|| self.baseline_id())
            .ok_or(SiteError::MissingAuthor)?;
        let new = NewContent {
            title: self.token.label(title),
            body: format!("Fixture body for {}", self.token),
            status,
            author,
            content_type: ContentType::Post,
        };
        self.create_content(&new)
    }

    /// Turn a fixture-building failure inside the body into a [`Skip`].
    pub fn require<T>(&self, result: SiteResult<T>, what: &str) -> std::result::Result<T, Skip> {
        result.map_err(|err| Skip::new(format!("{}: {}", what, err)))
    }

    /// Release all fixtures and return what teardown did.
    pub fn end(mut self) -> CleanupReport {
        self.release()
    }

    /// Release partial fixtures after a setup failure and produce the skip.
    fn abandon(&mut self, err: SiteError) -> Skip {
        self.state = FixtureState::Skipped;
        let report = self.release();
        if !report.is_clean() {
            warn!(?report, "cleanup after failed setup was not clean");
        }
        Skip::new(err.to_string()).with_cleanup(report)
    }

    fn release(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        if self.released {
            return report;
        }
        self.released = true;

        let tracked = std::mem::take(&mut self.tracked);
        for entry in tracked.iter().rev() {
            self.release_entity(entry.entity, &mut report);
        }
        if let Some(baseline) = self.baseline.take() {
            self.release_entity(EntityRef::Principal(baseline.id), &mut report);
        }

        self.acting = None;
        self.state = FixtureState::CleanedUp;
        debug!(
            token = %self.token,
            deleted = report.deleted.len(),
            already_gone = report.already_gone.len(),
            errors = report.errors.len(),
            "fixtures released"
        );
        report
    }

    fn exists(&self, entity: EntityRef) -> SiteResult<bool> {
        match entity {
            EntityRef::Principal(id) => self
                .site
                .lookup_principal(&LookupKey::Id(id))
                .map(|found| found.is_some()),
            EntityRef::Content(id) => self.site.lookup_content(id).map(|found| found.is_some()),
        }
    }

    fn release_entity(&self, entity: EntityRef, report: &mut CleanupReport) {
        if matches!(entity, EntityRef::Principal(_)) && !self.capabilities.principal_deletion {
            debug!(%entity, "principal deletion unsupported, retaining");
            report.retained.push(entity);
            return;
        }

        match self.exists(entity) {
            Ok(false) => {
                report.already_gone.push(entity);
                return;
            }
            Ok(true) => {}
            Err(err) => {
                warn!(%entity, error = %err, "cleanup lookup failed");
                report.errors.push(CleanupFailure {
                    entity,
                    message: err.to_string(),
                });
                return;
            }
        }

        let deleted = match entity {
            EntityRef::Principal(id) => self.site.delete_principal(id).map(|_| ()),
            EntityRef::Content(id) => self.site.delete_content(id, true).map(|_| ()),
        };
        if let Err(err) = deleted {
            warn!(%entity, error = %err, "cleanup delete failed");
            report.errors.push(CleanupFailure {
                entity,
                message: err.to_string(),
            });
            return;
        }
        report.deleted.push(entity);

        if self.cleanup.verify {
            match self.exists(entity) {
                Ok(false) => {}
                Ok(true) => {
                    warn!(%entity, "entity still resolvable after delete");
                    report.leaked.push(entity);
                }
                Err(err) => {
                    warn!(%entity, error = %err, "cleanup verification failed");
                    report.errors.push(CleanupFailure {
                        entity,
                        message: err.to_string(),
                    });
                }
            }
        }
    }
}

impl<'s, S: Site + RestDispatch + ?Sized> FixtureSession<'s, S> {
    /// Dispatch a request. A request with no acting principal is sent as the
    /// session's acting principal, if any. Successful creations (201 with an
    /// `id`) are tracked.
    pub fn dispatch(&mut self, mut request: RestRequest) -> RestResponse {
        if request.acting_principal.is_none() {
            request.acting_principal = self.acting;
        }
        self.dispatch_tracked(&request)
    }

    /// Dispatch a request with no acting principal, regardless of session state.
    pub fn dispatch_anonymous(&mut self, mut request: RestRequest) -> RestResponse {
        request.acting_principal = None;
        self.dispatch_tracked(&request)
    }

    fn dispatch_tracked(&mut self, request: &RestRequest) -> RestResponse {
        let response = self.site.dispatch(request);
        if request.method == Method::Post && response.status == 201 {
            if let Some(id) = response.entity_id() {
                if request.route.contains("/users") {
                    self.track(PrincipalId(id));
                } else {
                    self.track(ContentId(id));
                }
            }
        }
        response
    }
}

impl<'s, S: Site + ?Sized> Drop for FixtureSession<'s, S> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let report = self.release();
        if !report.is_clean() {
            warn!(?report, "fixture cleanup on drop was not clean");
        }
    }
}
