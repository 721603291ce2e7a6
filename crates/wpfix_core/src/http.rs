//! Site reached over the WordPress REST API.
//!
//! Fixture operations run with the configured administrator credentials.
//! Dispatched requests run with the credentials of their acting principal,
//! which must have been created or authenticated through the same `HttpSite`.
//! Application passwords are sent as HTTP basic auth.

use crate::config::SiteConfig;
use crate::error::{HarnessError, Result, SiteError, SiteResult};
use crate::rest::{Method, RestRequest, RestResponse};
use crate::site::{RestDispatch, Site};
use crate::types::{
    ContentFilter, ContentId, ContentItem, ContentPatch, ContentStatus, ContentType, LookupKey,
    NewContent, NewPrincipal, Principal, PrincipalId, QueryResult, Role,
};
use chrono::{DateTime, NaiveDateTime};
use reqwest::blocking::{Client, Response};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

const API_PREFIX: &str = "/wp-json";
/// Largest `per_page` the REST API accepts.
const MAX_PAGE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Credentials {
    login: String,
    secret: String,
}

/// What this client has learned about entities it created.
#[derive(Default)]
struct Registry {
    credentials: HashMap<PrincipalId, Credentials>,
    content_types: HashMap<ContentId, ContentType>,
}

/// A live site driven through its `/wp-json` routes.
pub struct HttpSite {
    client: Client,
    base_url: String,
    admin: Option<Credentials>,
    registry: Mutex<Registry>,
}

impl HttpSite {
    /// Build a client for `config.url`.
    pub fn new(config: &SiteConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| HarnessError::ConfigError("site.url is not set".into()))?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| HarnessError::ConfigError(format!("failed to build HTTP client: {}", e)))?;
        let admin = match (&config.username, &config.application_password) {
            (Some(login), Some(secret)) => Some(Credentials {
                login: login.clone(),
                secret: secret.clone(),
            }),
            _ => None,
        };
        if admin.is_none() {
            warn!(url, "no administrator credentials; fixture setup will likely be skipped");
        }

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            admin,
            registry: Mutex::default(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn url(&self, route: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            API_PREFIX,
            route.trim_start_matches('/')
        )
    }

    fn content_route(&self, id: ContentId) -> String {
        let content_type = self
            .registry()
            .content_types
            .get(&id)
            .copied()
            .unwrap_or_default();
        format!("/wp/v2/{}/{}", collection(content_type), id.0)
    }

    /// Send `request`; query parameters for GET and DELETE, a JSON body otherwise.
    fn call(
        &self,
        request: &RestRequest,
        credentials: Option<&Credentials>,
    ) -> reqwest::Result<RestResponse> {
        let url = self.url(&request.route);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Patch => self.client.patch(&url),
            Method::Delete => self.client.delete(&url),
        };
        if let Some(creds) = credentials {
            builder = builder.basic_auth(&creds.login, Some(&creds.secret));
        }
        builder = match request.method {
            Method::Get | Method::Delete => builder.query(&query_pairs(&request.params)),
            Method::Post | Method::Put | Method::Patch => builder.json(&request.params),
        };
        into_rest_response(builder.send()?)
    }

    fn admin_call(&self, request: RestRequest) -> SiteResult<RestResponse> {
        self.call(&request, self.admin.as_ref())
            .map_err(transport_error)
    }
}

fn collection(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Post => "posts",
        ContentType::Page => "pages",
    }
}

fn query_pairs(params: &BTreeMap<String, Value>) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

fn into_rest_response(response: Response) -> reqwest::Result<RestResponse> {
    let status = response.status().as_u16();
    let headers: BTreeMap<String, String> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    let text = response.text()?;
    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };
    Ok(RestResponse {
        status,
        body,
        headers,
    })
}

fn transport_error(err: reqwest::Error) -> SiteError {
    SiteError::Backend(format!("request failed: {}", err))
}

fn response_error(response: &RestResponse) -> SiteError {
    let message = response
        .body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("no message");
    SiteError::Backend(format!(
        "{} {}: {}",
        response.status,
        response.error_code().unwrap_or("unknown_error"),
        message
    ))
}

fn malformed(what: &str) -> SiteError {
    SiteError::Backend(format!("malformed response: {}", what))
}

/// `{"raw": ..}` under `context=edit`, `{"rendered": ..}` otherwise.
fn text_field(body: &Value, key: &str) -> String {
    let field = &body[key];
    field["raw"]
        .as_str()
        .or_else(|| field["rendered"].as_str())
        .or_else(|| field.as_str())
        .unwrap_or_default()
        .to_string()
}

/// GMT timestamps come without an offset, e.g. `2024-03-01T09:30:00`.
fn gmt_timestamp(value: &Value) -> i64 {
    value
        .as_str()
        .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok())
        .map(|t| t.and_utc().timestamp())
        .unwrap_or_default()
}

fn parse_content(body: &Value) -> SiteResult<ContentItem> {
    let id = body["id"].as_u64().ok_or_else(|| malformed("post without id"))?;
    let status = body["status"]
        .as_str()
        .and_then(|s| s.parse::<ContentStatus>().ok())
        .ok_or_else(|| malformed("post without a known status"))?;
    let content_type = match body["type"].as_str() {
        Some("page") => ContentType::Page,
        _ => ContentType::Post,
    };
    Ok(ContentItem {
        id: ContentId(id),
        title: text_field(body, "title"),
        body: text_field(body, "content"),
        status,
        author: PrincipalId(body["author"].as_u64().unwrap_or_default()),
        content_type,
        created_at: gmt_timestamp(&body["date_gmt"]),
        modified_at: gmt_timestamp(&body["modified_gmt"]),
    })
}

fn parse_principal(body: &Value) -> SiteResult<Principal> {
    let id = body["id"].as_u64().ok_or_else(|| malformed("user without id"))?;
    let login = body["username"]
        .as_str()
        .or_else(|| body["slug"].as_str())
        .ok_or_else(|| malformed("user without username"))?
        .to_string();
    // Custom roles have no counterpart here and get the least privilege.
    let role = body["roles"][0]
        .as_str()
        .and_then(|r| r.parse::<Role>().ok())
        .unwrap_or(Role::Subscriber);
    let registered_at = body["registered_date"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.timestamp())
        .unwrap_or_default();
    Ok(Principal {
        id: PrincipalId(id),
        display_name: body["name"].as_str().unwrap_or(&login).to_string(),
        email: body["email"].as_str().unwrap_or_default().to_string(),
        login,
        role,
        registered_at,
    })
}

impl Site for HttpSite {
    fn create_principal(&self, new: &NewPrincipal) -> SiteResult<PrincipalId> {
        let login = new.login.trim();
        if login.is_empty() {
            return Err(SiteError::EmptyLogin);
        }
        let request = RestRequest::post("/wp/v2/users")
            .param("username", login)
            .param("email", new.email.as_str())
            .param("password", new.secret.as_str())
            .param("roles", json!([new.role.as_str()]))
            .param(
                "name",
                new.display_name.clone().unwrap_or_else(|| login.to_string()),
            );
        let response = self.admin_call(request)?;
        if response.status != 201 {
            return Err(match response.error_code() {
                Some("existing_user_login") => SiteError::ExistingLogin(login.to_string()),
                Some("existing_user_email") => SiteError::ExistingEmail(new.email.clone()),
                Some("rest_invalid_param" | "invalid_email") => {
                    SiteError::InvalidEmail(new.email.clone())
                }
                _ => response_error(&response),
            });
        }

        let id = response
            .entity_id()
            .map(PrincipalId)
            .ok_or_else(|| malformed("created user has no id"))?;
        self.registry().credentials.insert(
            id,
            Credentials {
                login: login.to_string(),
                secret: new.secret.clone(),
            },
        );
        debug!(%id, login, "principal created");
        Ok(id)
    }

    fn delete_principal(&self, id: PrincipalId) -> SiteResult<Option<Principal>> {
        let Some(principal) = self.lookup_principal(&LookupKey::Id(id))? else {
            return Ok(None);
        };
        // `reassign=false` removes the principal's content with it.
        let request = RestRequest::delete(format!("/wp/v2/users/{}", id.0))
            .param("force", true)
            .param("reassign", false);
        let response = self.admin_call(request)?;
        match response.status {
            200 => {
                self.registry().credentials.remove(&id);
                debug!(%id, "principal deleted");
                Ok(Some(principal))
            }
            404 => Ok(None),
            _ => Err(response_error(&response)),
        }
    }

    fn lookup_principal(&self, key: &LookupKey) -> SiteResult<Option<Principal>> {
        let (needle, by_login) = match key {
            LookupKey::Id(id) => {
                let request =
                    RestRequest::get(format!("/wp/v2/users/{}", id.0)).param("context", "edit");
                let response = self.admin_call(request)?;
                return match response.status {
                    200 => parse_principal(&response.body).map(Some),
                    404 => Ok(None),
                    _ => Err(response_error(&response)),
                };
            }
            LookupKey::Login(login) => (login, true),
            LookupKey::Email(email) => (email, false),
        };

        let request = RestRequest::get("/wp/v2/users")
            .param("context", "edit")
            .param("search", needle.as_str())
            .param("per_page", MAX_PAGE as u64);
        let response = self.admin_call(request)?;
        if response.status != 200 {
            return Err(response_error(&response));
        }
        // Search is fuzzy; only an exact, case-insensitive match counts.
        for user in response.body.as_array().map(Vec::as_slice).unwrap_or_default() {
            let principal = parse_principal(user)?;
            let field = if by_login {
                &principal.login
            } else {
                &principal.email
            };
            if field.eq_ignore_ascii_case(needle) {
                return Ok(Some(principal));
            }
        }
        Ok(None)
    }

    fn authenticate(&self, login: &str, secret: &str) -> SiteResult<Principal> {
        if login.trim().is_empty() {
            return Err(SiteError::EmptyLogin);
        }
        let credentials = Credentials {
            login: login.to_string(),
            secret: secret.to_string(),
        };
        let request = RestRequest::get("/wp/v2/users/me").param("context", "edit");
        let response = self
            .call(&request, Some(&credentials))
            .map_err(transport_error)?;
        if response.status != 200 {
            return Err(match response.error_code() {
                Some("incorrect_password") => SiteError::IncorrectSecret {
                    login: login.to_string(),
                },
                Some("invalid_username" | "invalid_email") => {
                    SiteError::UnknownPrincipal(login.to_string())
                }
                _ => response_error(&response),
            });
        }

        let principal = parse_principal(&response.body)?;
        self.registry()
            .credentials
            .insert(principal.id, credentials);
        Ok(principal)
    }

    fn create_content(&self, new: &NewContent) -> SiteResult<ContentId> {
        if new.title.trim().is_empty() && new.body.trim().is_empty() {
            return Err(SiteError::EmptyContent);
        }
        let request = RestRequest::post(format!("/wp/v2/{}", collection(new.content_type)))
            .param("title", new.title.as_str())
            .param("content", new.body.as_str())
            .param("status", new.status.as_str())
            .param("author", new.author.0);
        let response = self.admin_call(request)?;
        if response.status != 201 {
            return Err(match response.error_code() {
                Some("rest_invalid_author") => SiteError::InvalidPrincipal(new.author.0),
                Some("empty_content") => SiteError::EmptyContent,
                _ => response_error(&response),
            });
        }

        let id = response
            .entity_id()
            .map(ContentId)
            .ok_or_else(|| malformed("created post has no id"))?;
        self.registry().content_types.insert(id, new.content_type);
        debug!(%id, status = %new.status, "content created");
        Ok(id)
    }

    fn update_content(&self, id: ContentId, patch: &ContentPatch) -> SiteResult<ContentId> {
        if patch.is_empty() {
            return match self.lookup_content(id)? {
                Some(_) => Ok(id),
                None => Err(SiteError::InvalidContent(id.0)),
            };
        }

        let mut request = RestRequest::post(self.content_route(id));
        if let Some(title) = &patch.title {
            request = request.param("title", title.as_str());
        }
        if let Some(body) = &patch.body {
            request = request.param("content", body.as_str());
        }
        if let Some(status) = patch.status {
            request = request.param("status", status.as_str());
        }
        let response = self.admin_call(request)?;
        match response.status {
            200 => Ok(id),
            404 => Err(SiteError::InvalidContent(id.0)),
            _ => Err(match response.error_code() {
                Some("empty_content") => SiteError::EmptyContent,
                _ => response_error(&response),
            }),
        }
    }

    fn delete_content(&self, id: ContentId, permanent: bool) -> SiteResult<Option<ContentItem>> {
        let Some(item) = self.lookup_content(id)? else {
            return Ok(None);
        };
        let request = RestRequest::delete(self.content_route(id)).param("force", permanent);
        let response = self.admin_call(request)?;
        match response.status {
            200 if permanent => {
                self.registry().content_types.remove(&id);
                debug!(%id, "content deleted");
                Ok(Some(item))
            }
            200 => parse_content(&response.body).map(Some),
            // Trashing an item already in the trash.
            410 => Ok(Some(item)),
            404 => Ok(None),
            _ => Err(response_error(&response)),
        }
    }

    fn lookup_content(&self, id: ContentId) -> SiteResult<Option<ContentItem>> {
        let request = RestRequest::get(self.content_route(id)).param("context", "edit");
        let response = self.admin_call(request)?;
        match response.status {
            200 => parse_content(&response.body).map(Some),
            404 => Ok(None),
            _ => Err(response_error(&response)),
        }
    }

    /// Queries one collection; a filter without a type queries posts.
    fn query_content(&self, filter: &ContentFilter) -> SiteResult<QueryResult> {
        let per_page = filter.page_size.unwrap_or(MAX_PAGE).clamp(1, MAX_PAGE);
        let route = format!("/wp/v2/{}", collection(filter.content_type.unwrap_or_default()));
        let mut request = RestRequest::get(route)
            .param("context", "edit")
            .param("per_page", per_page as u64)
            .param("orderby", "date")
            .param("order", "desc")
            // `any` excludes trash, as unfiltered queries should.
            .param("status", filter.status.map_or("any", ContentStatus::as_str));
        if let Some(author) = filter.author {
            request = request.param("author", author.0);
        }

        let response = self.admin_call(request)?;
        if response.status != 200 {
            return Err(response_error(&response));
        }
        let items = response
            .body
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(parse_content)
            .collect::<SiteResult<Vec<_>>>()?;
        let matched_count = response
            .header("X-WP-Total")
            .and_then(|total| total.parse().ok())
            .unwrap_or(items.len());
        Ok(QueryResult {
            matched_count,
            items,
        })
    }
}

impl RestDispatch for HttpSite {
    fn dispatch(&self, request: &RestRequest) -> RestResponse {
        let credentials = match request.acting_principal {
            Some(id) => {
                let known = self.registry().credentials.get(&id).cloned();
                match known {
                    Some(creds) => Some(creds),
                    None => {
                        return RestResponse::error(
                            500,
                            "unknown_acting_principal",
                            &format!("no credentials for principal {}", id),
                        )
                    }
                }
            }
            None => None,
        };

        debug!(method = %request.method, route = %request.route, "dispatch over http");
        match self.call(request, credentials.as_ref()) {
            Ok(response) => response,
            Err(err) => {
                warn!(route = %request.route, error = %err, "request failed");
                RestResponse::error(503, "http_request_failed", &err.to_string())
            }
        }
    }
}
