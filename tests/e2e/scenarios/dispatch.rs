use crate::harness::{Assertion, Scenario};
use wpfix_core::{BaselinePlan, ContentStatus, RestRequest, Role};

fn create_request(status: &str) -> RestRequest {
    RestRequest::post("/wp/v2/posts")
        .param("title", "Dispatched post")
        .param("content", "Body")
        .param("status", status)
}

#[test]
fn test_anonymous_create_is_unauthorized() {
    Scenario::new("anonymous_create")
        .begin()
        .dispatch_anonymous(create_request("publish"))
        .assert_error(401, "rest_cannot_create")
        .assert(Assertion::ContentCount(0))
        .end()
        .assert_site_empty()
        .run()
        .unwrap();
}

#[test]
fn test_editor_create_is_tracked_and_cleaned() {
    Scenario::new("editor_create")
        .begin_with(BaselinePlan::Principal(Role::Editor))
        .act_as_baseline()
        .dispatch(create_request("publish"))
        .assert_status(201)
        .assert(Assertion::TrackedCount(1))
        .assert(Assertion::ContentCount(1))
        .end()
        .assert(Assertion::CleanupDeleted(2))
        .assert_site_empty()
        .run()
        .unwrap();
}

#[test]
fn test_contributor_cannot_publish() {
    Scenario::new("contributor_publish")
        .begin()
        .create_principal(Role::Contributor)
        .act_as_last_principal()
        .dispatch(create_request("publish"))
        .assert_error(403, "rest_cannot_publish")
        .dispatch(create_request("draft"))
        .assert_status(201)
        .end()
        .assert_site_empty()
        .run()
        .unwrap();
}

#[test]
fn test_subscriber_cannot_create() {
    Scenario::new("subscriber_create")
        .begin()
        .create_principal(Role::Subscriber)
        .act_as_last_principal()
        .dispatch(create_request("draft"))
        .assert_error(403, "rest_cannot_create")
        .end()
        .assert_site_empty()
        .run()
        .unwrap();
}

#[test]
fn test_create_defaults_to_draft() {
    Scenario::new("default_draft")
        .begin_with(BaselinePlan::Principal(Role::Editor))
        .act_as_baseline()
        .dispatch(RestRequest::post("/wp/v2/posts").param("title", "No status"))
        .assert_status(201)
        .dispatch(RestRequest::get("/wp/v2/posts/{post}"))
        .assert(Assertion::ResponseStatus(200))
        .dispatch_anonymous(RestRequest::get("/wp/v2/posts/{post}"))
        .assert_error(401, "rest_forbidden")
        .end()
        .assert_site_empty()
        .run()
        .unwrap();
}

#[test]
fn test_published_post_is_public() {
    Scenario::new("public_read")
        .begin()
        .create_post("Public", ContentStatus::Publish)
        .dispatch_anonymous(RestRequest::get("/wp/v2/posts/{post}"))
        .assert_status(200)
        .end()
        .assert_site_empty()
        .run()
        .unwrap();
}

#[test]
fn test_trash_twice_is_gone() {
    Scenario::new("double_trash")
        .begin()
        .act_as_baseline()
        .create_post("Trash twice", ContentStatus::Publish)
        .dispatch(RestRequest::delete("/wp/v2/posts/{post}"))
        .assert_status(200)
        .dispatch(RestRequest::delete("/wp/v2/posts/{post}"))
        .assert_error(410, "rest_already_trashed")
        .dispatch(RestRequest::delete("/wp/v2/posts/{post}").param("force", true))
        .assert_status(200)
        .dispatch(RestRequest::get("/wp/v2/posts/{post}"))
        .assert_error(404, "rest_post_invalid_id")
        .end()
        .assert(Assertion::CleanupAlreadyGone(1))
        .assert_site_empty()
        .run()
        .unwrap();
}

#[test]
fn test_author_cannot_edit_others_post() {
    Scenario::new("edit_others")
        .begin()
        .create_post("Owned by baseline", ContentStatus::Publish)
        .create_principal(Role::Author)
        .act_as_last_principal()
        .dispatch(RestRequest::post("/wp/v2/posts/{post}").param("title", "Hijacked"))
        .assert_error(403, "rest_cannot_edit")
        .end()
        .assert_site_empty()
        .run()
        .unwrap();
}

#[test]
fn test_draft_listing_needs_edit_rights() {
    Scenario::new("draft_listing")
        .begin()
        .dispatch_anonymous(RestRequest::get("/wp/v2/posts").param("status", "draft"))
        .assert_error(401, "rest_forbidden_status")
        .act_as_baseline()
        .dispatch(RestRequest::get("/wp/v2/posts").param("status", "draft"))
        .assert_status(200)
        .dispatch(RestRequest::get("/wp/v2/posts").param("status", "bogus"))
        .assert_error(400, "rest_invalid_param")
        .end()
        .run()
        .unwrap();
}

#[test]
fn test_users_me() {
    Scenario::new("users_me")
        .begin()
        .dispatch_anonymous(RestRequest::get("/wp/v2/users/me"))
        .assert_error(401, "rest_not_logged_in")
        .act_as_baseline()
        .dispatch(RestRequest::get("/wp/v2/users/me"))
        .assert_status(200)
        .end()
        .run()
        .unwrap();
}

#[test]
fn test_unknown_route() {
    Scenario::new("unknown_route")
        .begin()
        .dispatch_anonymous(RestRequest::get("/wp/v2/widgets"))
        .assert_error(404, "rest_no_route")
        .end()
        .run()
        .unwrap();
}

#[test]
fn test_contributor_cannot_make_own_draft_private() {
    Scenario::new("contributor_update_private")
        .begin()
        .create_principal(Role::Contributor)
        .act_as_last_principal()
        .dispatch(create_request("private"))
        .assert_error(403, "rest_cannot_publish")
        .dispatch(create_request("draft"))
        .assert_status(201)
        .dispatch(RestRequest::post("/wp/v2/posts/{post}").param("status", "private"))
        .assert_error(403, "rest_cannot_publish")
        .dispatch(RestRequest::get("/wp/v2/posts/{post}"))
        .assert_status(200)
        .assert(Assertion::ResponseField {
            pointer: "/status".into(),
            expected: "draft".into(),
        })
        .end()
        .assert_site_empty()
        .run()
        .unwrap();
}

#[test]
fn test_malformed_numeric_params_are_rejected() {
    Scenario::new("malformed_numbers")
        .begin()
        .dispatch_anonymous(RestRequest::get("/wp/v2/posts").param("per_page", -1))
        .assert_error(400, "rest_invalid_param")
        .dispatch_anonymous(RestRequest::get("/wp/v2/posts").param("per_page", "abc"))
        .assert_error(400, "rest_invalid_param")
        .dispatch_anonymous(RestRequest::get("/wp/v2/posts").param("per_page", 2.5))
        .assert_error(400, "rest_invalid_param")
        .dispatch_anonymous(RestRequest::get("/wp/v2/posts").param("author", "someone"))
        .assert_error(400, "rest_invalid_param")
        .end()
        .run()
        .unwrap();
}
