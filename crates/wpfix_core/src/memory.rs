//! In-memory reference implementation of the system under test.
//!
//! `InMemorySite` keeps principals and content items behind a mutex and serves
//! a small subset of the `/wp/v2` routes through [`RestDispatch`]. Failures can
//! be scheduled per operation with [`InMemorySite::fail_next`] to exercise
//! setup-skip and cleanup-error paths.

use crate::error::{SiteError, SiteResult};
use crate::rest::{InvalidParam, Method, RestRequest, RestResponse};
use crate::site::{RestDispatch, Site};
use crate::token::current_timestamp;
use crate::types::{
    ContentFilter, ContentId, ContentItem, ContentPatch, ContentStatus, ContentType, LookupKey,
    NewContent, NewPrincipal, Principal, PrincipalId, QueryResult,
};
use crate::TimeProvider;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

/// Default `per_page` for list routes.
const DEFAULT_PER_PAGE: usize = 10;
/// Upper bound accepted for `per_page`.
const MAX_PER_PAGE: usize = 100;

/// Operations that can be scheduled to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteOp {
    CreatePrincipal,
    DeletePrincipal,
    LookupPrincipal,
    Authenticate,
    CreateContent,
    UpdateContent,
    DeleteContent,
    LookupContent,
    QueryContent,
}

struct StoredPrincipal {
    principal: Principal,
    salt: String,
    secret_digest: blake3::Hash,
}

#[derive(Default)]
struct SiteState {
    principals: BTreeMap<u64, StoredPrincipal>,
    content: BTreeMap<u64, ContentItem>,
    next_principal_id: u64,
    next_content_id: u64,
    faults: HashMap<SiteOp, VecDeque<String>>,
}

impl SiteState {
    fn take_fault(&mut self, op: SiteOp) -> SiteResult<()> {
        match self.faults.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(message) => {
                debug!(?op, %message, "injected fault");
                Err(SiteError::Backend(message))
            }
            None => Ok(()),
        }
    }

    fn find_login(&self, login: &str) -> Option<&StoredPrincipal> {
        self.principals
            .values()
            .find(|p| p.principal.login.eq_ignore_ascii_case(login))
    }

    fn find_email(&self, email: &str) -> Option<&StoredPrincipal> {
        self.principals
            .values()
            .find(|p| p.principal.email.eq_ignore_ascii_case(email))
    }
}

/// Shared in-memory content-and-identity store.
#[derive(Default)]
pub struct InMemorySite {
    state: Mutex<SiteState>,
    time_provider: Option<Arc<dyn TimeProvider>>,
}

impl InMemorySite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a controlled clock for entity timestamps.
    pub fn with_time_provider(mut self, provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = Some(provider);
        self
    }

    /// Make the next call of `op` fail with `SiteError::Backend(message)`.
    ///
    /// Calls queue: scheduling twice fails the next two calls.
    pub fn fail_next(&self, op: SiteOp, message: &str) {
        self.state()
            .faults
            .entry(op)
            .or_default()
            .push_back(message.to_string());
    }

    pub fn principal_count(&self) -> usize {
        self.state().principals.len()
    }

    pub fn content_count(&self) -> usize {
        self.state().content.len()
    }

    fn state(&self) -> MutexGuard<'_, SiteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> i64 {
        match &self.time_provider {
            Some(provider) => provider.now(),
            None => current_timestamp(),
        }
    }
}

fn digest_secret(salt: &str, secret: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(secret.as_bytes());
    hasher.finalize()
}

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

impl Site for InMemorySite {
    fn create_principal(&self, new: &NewPrincipal) -> SiteResult<PrincipalId> {
        let now = self.now();
        let mut state = self.state();
        state.take_fault(SiteOp::CreatePrincipal)?;

        let login = new.login.trim();
        if login.is_empty() {
            return Err(SiteError::EmptyLogin);
        }
        if !is_valid_email(&new.email) {
            return Err(SiteError::InvalidEmail(new.email.clone()));
        }
        if state.find_login(login).is_some() {
            return Err(SiteError::ExistingLogin(login.to_string()));
        }
        if state.find_email(&new.email).is_some() {
            return Err(SiteError::ExistingEmail(new.email.clone()));
        }

        state.next_principal_id += 1;
        let id = PrincipalId(state.next_principal_id);
        let salt = Uuid::new_v4().to_string();
        let secret_digest = digest_secret(&salt, &new.secret);
        let principal = Principal {
            id,
            login: login.to_string(),
            email: new.email.clone(),
            display_name: new.display_name.clone().unwrap_or_else(|| login.to_string()),
            role: new.role,
            registered_at: now,
        };
        state.principals.insert(
            id.0,
            StoredPrincipal {
                principal,
                salt,
                secret_digest,
            },
        );

        debug!(%id, login, "principal created");
        Ok(id)
    }

    fn delete_principal(&self, id: PrincipalId) -> SiteResult<Option<Principal>> {
        let mut state = self.state();
        state.take_fault(SiteOp::DeletePrincipal)?;

        let Some(stored) = state.principals.remove(&id.0) else {
            return Ok(None);
        };
        let before = state.content.len();
        state.content.retain(|_, item| item.author != id);
        debug!(
            %id,
            removed_content = before - state.content.len(),
            "principal deleted"
        );
        Ok(Some(stored.principal))
    }

    fn lookup_principal(&self, key: &LookupKey) -> SiteResult<Option<Principal>> {
        let mut state = self.state();
        state.take_fault(SiteOp::LookupPrincipal)?;

        let found = match key {
            LookupKey::Id(id) => state.principals.get(&id.0),
            LookupKey::Login(login) => state.find_login(login),
            LookupKey::Email(email) => state.find_email(email),
        };
        Ok(found.map(|p| p.principal.clone()))
    }

    fn authenticate(&self, login: &str, secret: &str) -> SiteResult<Principal> {
        let mut state = self.state();
        state.take_fault(SiteOp::Authenticate)?;

        if login.trim().is_empty() {
            return Err(SiteError::EmptyLogin);
        }
        let stored = if login.contains('@') {
            state.find_email(login)
        } else {
            state.find_login(login)
        }
        .ok_or_else(|| SiteError::UnknownPrincipal(login.to_string()))?;

        if digest_secret(&stored.salt, secret) != stored.secret_digest {
            return Err(SiteError::IncorrectSecret {
                login: stored.principal.login.clone(),
            });
        }
        Ok(stored.principal.clone())
    }

    fn create_content(&self, new: &NewContent) -> SiteResult<ContentId> {
        let now = self.now();
        let mut state = self.state();
        state.take_fault(SiteOp::CreateContent)?;

        if !state.principals.contains_key(&new.author.0) {
            return Err(SiteError::InvalidPrincipal(new.author.0));
        }
        if new.title.trim().is_empty() && new.body.trim().is_empty() {
            return Err(SiteError::EmptyContent);
        }

        state.next_content_id += 1;
        let id = ContentId(state.next_content_id);
        state.content.insert(
            id.0,
            ContentItem {
                id,
                title: new.title.clone(),
                body: new.body.clone(),
                status: new.status,
                author: new.author,
                content_type: new.content_type,
                created_at: now,
                modified_at: now,
            },
        );

        debug!(%id, status = %new.status, "content created");
        Ok(id)
    }

    fn update_content(&self, id: ContentId, patch: &ContentPatch) -> SiteResult<ContentId> {
        let now = self.now();
        let mut state = self.state();
        state.take_fault(SiteOp::UpdateContent)?;

        let item = state
            .content
            .get_mut(&id.0)
            .ok_or(SiteError::InvalidContent(id.0))?;

        let title = patch.title.as_deref().unwrap_or(&item.title);
        let body = patch.body.as_deref().unwrap_or(&item.body);
        if title.trim().is_empty() && body.trim().is_empty() {
            return Err(SiteError::EmptyContent);
        }

        if let Some(title) = &patch.title {
            item.title = title.clone();
        }
        if let Some(body) = &patch.body {
            item.body = body.clone();
        }
        if let Some(status) = patch.status {
            item.status = status;
        }
        item.modified_at = now;
        Ok(id)
    }

    fn delete_content(&self, id: ContentId, permanent: bool) -> SiteResult<Option<ContentItem>> {
        let now = self.now();
        let mut state = self.state();
        state.take_fault(SiteOp::DeleteContent)?;

        if permanent {
            let removed = state.content.remove(&id.0);
            if removed.is_some() {
                debug!(%id, "content deleted");
            }
            return Ok(removed);
        }

        Ok(state.content.get_mut(&id.0).map(|item| {
            if item.status != ContentStatus::Trash {
                item.status = ContentStatus::Trash;
                item.modified_at = now;
                debug!(%id, "content trashed");
            }
            item.clone()
        }))
    }

    fn lookup_content(&self, id: ContentId) -> SiteResult<Option<ContentItem>> {
        let mut state = self.state();
        state.take_fault(SiteOp::LookupContent)?;
        Ok(state.content.get(&id.0).cloned())
    }

    fn query_content(&self, filter: &ContentFilter) -> SiteResult<QueryResult> {
        let mut state = self.state();
        state.take_fault(SiteOp::QueryContent)?;

        let mut matched: Vec<&ContentItem> = state
            .content
            .values()
            .filter(|item| filter.content_type.map_or(true, |t| item.content_type == t))
            .filter(|item| match filter.status {
                Some(status) => item.status == status,
                // Unfiltered queries never surface trashed items.
                None => item.status != ContentStatus::Trash,
            })
            .filter(|item| filter.author.map_or(true, |a| item.author == a))
            .collect();

        // Newest first.
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let matched_count = matched.len();
        let limit = filter.page_size.unwrap_or(matched_count);
        Ok(QueryResult {
            matched_count,
            items: matched.into_iter().take(limit).cloned().collect(),
        })
    }
}

// ===== REST surface =====

fn post_json(item: &ContentItem) -> Value {
    json!({
        "id": item.id.0,
        "date": item.created_at,
        "modified": item.modified_at,
        "status": item.status.as_str(),
        "type": item.content_type.as_str(),
        "author": item.author.0,
        "link": format!("/?p={}", item.id.0),
        "title": { "rendered": item.title },
        "content": { "rendered": item.body, "protected": false },
    })
}

fn user_json(principal: &Principal) -> Value {
    json!({
        "id": principal.id.0,
        "name": principal.display_name,
        "slug": principal.login,
        "roles": [principal.role.as_str()],
    })
}

fn site_error_response(err: SiteError) -> RestResponse {
    match err {
        SiteError::InvalidContent(_) => {
            RestResponse::error(404, "rest_post_invalid_id", "Invalid post ID.")
        }
        SiteError::InvalidPrincipal(_) => {
            RestResponse::error(400, "rest_invalid_author", "Invalid author ID.")
        }
        SiteError::Backend(message) => RestResponse::error(500, "internal_error", &message),
        other => RestResponse::error(400, other.kind(), &other.to_string()),
    }
}

/// Accepts `"text"` or `{"raw": "text"}`.
fn text_param(request: &RestRequest, key: &str) -> Option<String> {
    match request.params.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("raw").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn status_param(request: &RestRequest) -> Result<Option<ContentStatus>, RestResponse> {
    match request.str_param("status") {
        Some(raw) => raw.parse().map(Some).map_err(|_| {
            RestResponse::error(
                400,
                "rest_invalid_param",
                &format!("Invalid parameter(s): status ({})", raw),
            )
        }),
        None => Ok(None),
    }
}

fn can_modify(actor: &Principal, item: &ContentItem) -> bool {
    if item.author == actor.id {
        actor.role.can_edit_posts()
    } else {
        actor.role.can_edit_others()
    }
}

/// Publishing, private and scheduled statuses need publish rights on create
/// and update alike.
fn publish_gate(actor: &Principal, status: ContentStatus) -> Option<RestResponse> {
    let restricted = matches!(
        status,
        ContentStatus::Publish | ContentStatus::Private | ContentStatus::Future
    );
    (restricted && !actor.role.can_publish()).then(|| {
        RestResponse::error(
            403,
            "rest_cannot_publish",
            "Sorry, you are not allowed to publish posts as this user.",
        )
    })
}

/// 401 for anonymous callers, 403 for authenticated ones.
fn denied(actor: Option<&Principal>, code: &str, message: &str) -> RestResponse {
    let status = if actor.is_some() { 403 } else { 401 };
    RestResponse::error(status, code, message)
}

impl InMemorySite {
    fn resolve_actor(&self, request: &RestRequest) -> Option<Principal> {
        let id = request.acting_principal?;
        self.state()
            .principals
            .get(&id.0)
            .map(|p| p.principal.clone())
    }

    fn list_posts(&self, request: &RestRequest, actor: Option<&Principal>) -> RestResponse {
        let status = match status_param(request) {
            Ok(status) => status.unwrap_or(ContentStatus::Publish),
            Err(resp) => return resp,
        };
        if status != ContentStatus::Publish && !actor.is_some_and(|a| a.role.can_edit_posts()) {
            return denied(actor, "rest_forbidden_status", "Status is forbidden.");
        }

        let per_page = match request.uint_param("per_page") {
            Ok(per_page) => per_page.unwrap_or(DEFAULT_PER_PAGE as u64),
            Err(invalid) => return invalid.response(),
        };
        if per_page == 0 || per_page > MAX_PER_PAGE as u64 {
            return InvalidParam("per_page".to_string()).response();
        }
        let per_page = per_page as usize;
        let author = match request.uint_param("author") {
            Ok(author) => author.map(PrincipalId),
            Err(invalid) => return invalid.response(),
        };

        let filter = ContentFilter {
            content_type: Some(ContentType::Post),
            status: Some(status),
            author,
            page_size: Some(per_page),
        };
        match self.query_content(&filter) {
            Ok(result) => {
                let pages = result.matched_count.div_ceil(per_page);
                let items: Vec<Value> = result.items.iter().map(post_json).collect();
                RestResponse::new(200, Value::Array(items))
                    .with_header("X-WP-Total", result.matched_count.to_string())
                    .with_header("X-WP-TotalPages", pages.to_string())
            }
            Err(err) => site_error_response(err),
        }
    }

    fn create_post(&self, request: &RestRequest, actor: Option<&Principal>) -> RestResponse {
        let Some(actor) = actor.filter(|a| a.role.can_edit_posts()) else {
            return denied(
                actor,
                "rest_cannot_create",
                "Sorry, you are not allowed to create posts as this user.",
            );
        };

        let status = match status_param(request) {
            Ok(status) => status.unwrap_or(ContentStatus::Draft),
            Err(resp) => return resp,
        };
        if let Some(resp) = publish_gate(actor, status) {
            return resp;
        }

        let author = match request.uint_param("author") {
            Ok(author) => author.map(PrincipalId).unwrap_or(actor.id),
            Err(invalid) => return invalid.response(),
        };
        if author != actor.id && !actor.role.can_edit_others() {
            return RestResponse::error(
                403,
                "rest_cannot_edit_others",
                "Sorry, you are not allowed to create posts as this user.",
            );
        }

        let new = NewContent {
            title: text_param(request, "title").unwrap_or_default(),
            body: text_param(request, "content").unwrap_or_default(),
            status,
            author,
            content_type: ContentType::Post,
        };
        let created = self
            .create_content(&new)
            .and_then(|id| self.lookup_content(id));
        match created {
            Ok(Some(item)) => RestResponse::new(201, post_json(&item))
                .with_header("Location", format!("/wp/v2/posts/{}", item.id.0)),
            Ok(None) => RestResponse::error(500, "internal_error", "Created post vanished."),
            Err(err) => site_error_response(err),
        }
    }

    fn get_post(&self, id: ContentId, actor: Option<&Principal>) -> RestResponse {
        let item = match self.lookup_content(id) {
            Ok(Some(item)) => item,
            Ok(None) => return site_error_response(SiteError::InvalidContent(id.0)),
            Err(err) => return site_error_response(err),
        };
        if item.status != ContentStatus::Publish && !actor.is_some_and(|a| can_modify(a, &item)) {
            return denied(
                actor,
                "rest_forbidden",
                "Sorry, you are not allowed to do that.",
            );
        }
        RestResponse::new(200, post_json(&item))
    }

    fn update_post(
        &self,
        id: ContentId,
        request: &RestRequest,
        actor: Option<&Principal>,
    ) -> RestResponse {
        let item = match self.lookup_content(id) {
            Ok(Some(item)) => item,
            Ok(None) => return site_error_response(SiteError::InvalidContent(id.0)),
            Err(err) => return site_error_response(err),
        };
        let Some(actor) = actor.filter(|a| can_modify(a, &item)) else {
            return denied(
                actor,
                "rest_cannot_edit",
                "Sorry, you are not allowed to edit this post.",
            );
        };

        let status = match status_param(request) {
            Ok(status) => status,
            Err(resp) => return resp,
        };
        if let Some(resp) = status.and_then(|status| publish_gate(actor, status)) {
            return resp;
        }

        let patch = ContentPatch {
            title: text_param(request, "title"),
            body: text_param(request, "content"),
            status,
        };
        let updated = self
            .update_content(id, &patch)
            .and_then(|id| self.lookup_content(id));
        match updated {
            Ok(Some(item)) => RestResponse::new(200, post_json(&item)),
            Ok(None) => site_error_response(SiteError::InvalidContent(id.0)),
            Err(err) => site_error_response(err),
        }
    }

    fn delete_post(
        &self,
        id: ContentId,
        request: &RestRequest,
        actor: Option<&Principal>,
    ) -> RestResponse {
        let item = match self.lookup_content(id) {
            Ok(Some(item)) => item,
            Ok(None) => return site_error_response(SiteError::InvalidContent(id.0)),
            Err(err) => return site_error_response(err),
        };
        if !actor.is_some_and(|a| can_modify(a, &item)) {
            return denied(
                actor,
                "rest_cannot_delete",
                "Sorry, you are not allowed to delete this post.",
            );
        }

        let force = request.flag_param("force");
        if !force && item.status == ContentStatus::Trash {
            return RestResponse::error(
                410,
                "rest_already_trashed",
                "The post has already been deleted.",
            );
        }

        match self.delete_content(id, force) {
            Ok(Some(removed)) if force => RestResponse::new(
                200,
                json!({ "deleted": true, "previous": post_json(&removed) }),
            ),
            Ok(Some(trashed)) => RestResponse::new(200, post_json(&trashed)),
            Ok(None) => site_error_response(SiteError::InvalidContent(id.0)),
            Err(err) => site_error_response(err),
        }
    }
}

impl RestDispatch for InMemorySite {
    fn dispatch(&self, request: &RestRequest) -> RestResponse {
        let actor = self.resolve_actor(request);
        let actor = actor.as_ref();
        let segments: Vec<&str> = request
            .route
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        debug!(method = %request.method, route = %request.route, "dispatch");

        match (request.method, segments.as_slice()) {
            (Method::Get, ["wp", "v2", "posts"]) => self.list_posts(request, actor),
            (Method::Post, ["wp", "v2", "posts"]) => self.create_post(request, actor),
            (method, ["wp", "v2", "posts", raw_id]) => {
                let Ok(id) = raw_id.parse::<u64>() else {
                    return no_route();
                };
                let id = ContentId(id);
                match method {
                    Method::Get => self.get_post(id, actor),
                    Method::Post | Method::Put | Method::Patch => {
                        self.update_post(id, request, actor)
                    }
                    Method::Delete => self.delete_post(id, request, actor),
                }
            }
            (Method::Get, ["wp", "v2", "users", "me"]) => match actor {
                Some(principal) => RestResponse::new(200, user_json(principal)),
                None => RestResponse::error(
                    401,
                    "rest_not_logged_in",
                    "You are not currently logged in.",
                ),
            },
            _ => no_route(),
        }
    }
}

fn no_route() -> RestResponse {
    RestResponse::error(
        404,
        "rest_no_route",
        "No route was found matching the URL and request method.",
    )
}
