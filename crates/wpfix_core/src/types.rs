//! Core data types shared by the harness and the systems it drives.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a principal (user) in the system under test.
///
/// The harness treats it as an opaque delete key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub u64);

/// Identifier of a content item (post, page) in the system under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub u64);

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user#{}", self.0)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "post#{}", self.0)
    }
}

/// Any entity the harness can create and later delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    /// A principal.
    Principal(PrincipalId),
    /// A content item.
    Content(ContentId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Principal(id) => id.fmt(f),
            Self::Content(id) => id.fmt(f),
        }
    }
}

impl From<PrincipalId> for EntityRef {
    fn from(id: PrincipalId) -> Self {
        Self::Principal(id)
    }
}

impl From<ContentId> for EntityRef {
    fn from(id: ContentId) -> Self {
        Self::Content(id)
    }
}

/// Role granted to a principal, ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Can only read.
    Subscriber,
    /// Can write drafts of own content.
    Contributor,
    /// Can publish own content.
    Author,
    /// Can publish and edit anyone's content.
    Editor,
    /// Everything.
    Administrator,
}

impl Role {
    /// Can create and edit own content.
    pub fn can_edit_posts(self) -> bool {
        self >= Role::Contributor
    }

    /// Can move content to `publish`.
    pub fn can_publish(self) -> bool {
        self >= Role::Author
    }

    /// Can edit and delete content authored by someone else.
    pub fn can_edit_others(self) -> bool {
        self >= Role::Editor
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subscriber => "subscriber",
            Self::Contributor => "contributor",
            Self::Author => "author",
            Self::Editor => "editor",
            Self::Administrator => "administrator",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscriber" => Ok(Self::Subscriber),
            "contributor" => Ok(Self::Contributor),
            "author" => Ok(Self::Author),
            "editor" => Ok(Self::Editor),
            "administrator" => Ok(Self::Administrator),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Publication status of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Publish,
    Draft,
    Pending,
    Private,
    Future,
    /// Soft-deleted; still resolvable by lookup.
    Trash,
}

impl ContentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Private => "private",
            Self::Future => "future",
            Self::Trash => "trash",
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "publish" => Ok(Self::Publish),
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "private" => Ok(Self::Private),
            "future" => Ok(Self::Future),
            "trash" => Ok(Self::Trash),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// Kind of content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Post,
    Page,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Page => "page",
        }
    }
}

/// A registered principal as reported by the system under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub login: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    /// Unix timestamp of registration.
    pub registered_at: i64,
}

/// A stored content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ContentId,
    pub title: String,
    pub body: String,
    pub status: ContentStatus,
    pub author: PrincipalId,
    pub content_type: ContentType,
    pub created_at: i64,
    pub modified_at: i64,
}

/// Input for creating a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPrincipal {
    pub login: String,
    pub secret: String,
    pub email: String,
    pub role: Role,
    /// Defaults to the login when absent.
    pub display_name: Option<String>,
}

/// Input for creating a content item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContent {
    pub title: String,
    pub body: String,
    pub status: ContentStatus,
    pub author: PrincipalId,
    pub content_type: ContentType,
}

impl NewContent {
    /// A published post.
    pub fn post(title: impl Into<String>, body: impl Into<String>, author: PrincipalId) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            status: ContentStatus::Publish,
            author,
            content_type: ContentType::Post,
        }
    }

    pub fn with_status(mut self, status: ContentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }
}

/// Partial update of a content item. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub status: Option<ContentStatus>,
}

impl ContentPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.status.is_none()
    }
}

/// How to look a principal up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupKey {
    Id(PrincipalId),
    Login(String),
    Email(String),
}

/// Filter for content queries. `None` fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentFilter {
    pub content_type: Option<ContentType>,
    pub status: Option<ContentStatus>,
    pub author: Option<PrincipalId>,
    /// Maximum items returned; `matched_count` still counts every match.
    pub page_size: Option<usize>,
}

/// Result of a content query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    /// Total number of matching items, independent of page size.
    pub matched_count: usize,
    pub items: Vec<ContentItem>,
}

impl QueryResult {
    pub fn contains(&self, id: ContentId) -> bool {
        self.items.iter().any(|item| item.id == id)
    }
}
