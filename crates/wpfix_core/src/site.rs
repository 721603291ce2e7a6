//! Interfaces of the content-and-identity system under test.

use crate::error::SiteResult;
use crate::rest::{RestRequest, RestResponse};
use crate::types::{
    ContentFilter, ContentId, ContentItem, ContentPatch, LookupKey, NewContent, NewPrincipal,
    Principal, PrincipalId, QueryResult,
};

/// Identity and content operations exposed by the system under test.
///
/// Every call is a blocking round-trip against a shared, mutable store.
pub trait Site {
    /// Register a principal.
    fn create_principal(&self, new: &NewPrincipal) -> SiteResult<PrincipalId>;

    /// Remove a principal together with the content it authored.
    ///
    /// Returns `Ok(None)` when the principal does not exist.
    fn delete_principal(&self, id: PrincipalId) -> SiteResult<Option<Principal>>;

    fn lookup_principal(&self, key: &LookupKey) -> SiteResult<Option<Principal>>;

    /// Check a login/secret pair.
    fn authenticate(&self, login: &str, secret: &str) -> SiteResult<Principal>;

    fn create_content(&self, new: &NewContent) -> SiteResult<ContentId>;

    fn update_content(&self, id: ContentId, patch: &ContentPatch) -> SiteResult<ContentId>;

    /// Trash (`permanent == false`) or permanently remove a content item.
    ///
    /// Returns `Ok(None)` when the item does not exist.
    fn delete_content(&self, id: ContentId, permanent: bool) -> SiteResult<Option<ContentItem>>;

    fn lookup_content(&self, id: ContentId) -> SiteResult<Option<ContentItem>>;

    fn query_content(&self, filter: &ContentFilter) -> SiteResult<QueryResult>;
}

/// Network-facing request/response surface of the system under test.
pub trait RestDispatch {
    fn dispatch(&self, request: &RestRequest) -> RestResponse;
}

/// A system that offers both surfaces.
pub trait Backend: Site + RestDispatch {}

impl<T: Site + RestDispatch + ?Sized> Backend for T {}
