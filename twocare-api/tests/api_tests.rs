/// End-to-end tests for the TwoCare API
///
/// Requests go through the full router (auth middleware, extractors, error
/// envelope, security headers) backed by the in-memory store.
mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::TestContext;
use serde_json::json;
use twocare_shared::models::membership::FamilyRole;

async fn create_family(ctx: &TestContext, token: &str, name: &str) -> String {
    let (status, body) = ctx
        .json("POST", "/v1/families", Some(token), Some(json!({ "name": name })))
        .await;
    assert_eq!(status, 201, "{}", body);
    body["id"].as_str().unwrap().to_string()
}

async fn create_baby(ctx: &TestContext, token: &str, family_id: &str) -> String {
    let (status, body) = ctx
        .json(
            "POST",
            "/v1/babies",
            Some(token),
            Some(json!({ "name": "Ada", "dateOfBirth": "2024-03-01", "familyId": family_id })),
        )
        .await;
    assert_eq!(status, 201, "{}", body);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let ctx = TestContext::new();

    let (status, body) = ctx.json("GET", "/health", None, None).await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "up");
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let ctx = TestContext::new();

    let response = ctx
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert!(response.headers().get("strict-transport-security").is_none());
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let ctx = TestContext::new();

    let (status, body) = ctx.json("GET", "/v1/families", None, None).await;

    assert_eq!(status, 401);
    assert_eq!(body["statusCode"], 401);
    assert_eq!(body["error"], "Unauthorized");
    assert_eq!(body["path"], "/v1/families");

    let (status, _) = ctx.json("GET", "/v1/families", Some("not-a-jwt"), None).await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn test_unknown_route_envelope() {
    let ctx = TestContext::new();

    let (status, body) = ctx.json("GET", "/v1/nothing-here", None, None).await;

    assert_eq!(status, 404);
    assert_eq!(body["message"], "Cannot GET /v1/nothing-here");
    assert_eq!(body["error"], "Not Found");
    assert_eq!(body["path"], "/v1/nothing-here");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_register_login_refresh() {
    let ctx = TestContext::new();

    let (status, body) = ctx
        .json(
            "POST",
            "/v1/auth/register",
            None,
            Some(json!({ "email": "Ana@Example.com", "password": "correct horse", "firstName": "Ana" })),
        )
        .await;
    assert_eq!(status, 201, "{}", body);
    assert_eq!(body["user"]["email"], "ana@example.com");
    assert!(body["user"].get("passwordHash").is_none());

    let (status, body) = ctx
        .json(
            "POST",
            "/v1/auth/register",
            None,
            Some(json!({ "email": "ana@example.com", "password": "another one", "firstName": "Ana" })),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["message"], "Email already exists");

    let (status, body) = ctx
        .json(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({ "email": "ana@example.com", "password": "wrong password" })),
        )
        .await;
    assert_eq!(status, 401);
    assert_eq!(body["message"], "Invalid credentials");

    let (status, login) = ctx
        .json(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({ "email": "ana@example.com", "password": "correct horse" })),
        )
        .await;
    assert_eq!(status, 200, "{}", login);
    let refresh_token = login["refreshToken"].as_str().unwrap();

    let (status, rotated) = ctx
        .json(
            "POST",
            "/v1/auth/refresh",
            None,
            Some(json!({ "refreshToken": refresh_token })),
        )
        .await;
    assert_eq!(status, 200, "{}", rotated);
    assert_ne!(rotated["refreshToken"], login["refreshToken"]);

    // The old refresh token was rotated out
    let (status, body) = ctx
        .json(
            "POST",
            "/v1/auth/refresh",
            None,
            Some(json!({ "refreshToken": refresh_token })),
        )
        .await;
    assert_eq!(status, 401);
    assert_eq!(body["message"], "Refresh token has been revoked");

    let access_token = rotated["accessToken"].as_str().unwrap();
    let (status, body) = ctx.json("GET", "/v1/users/me", Some(access_token), None).await;
    assert_eq!(status, 200);
    assert_eq!(body["firstName"], "Ana");
}

#[tokio::test]
async fn test_invite_and_join_flow() {
    let ctx = TestContext::new();
    let (_, owner) = ctx.user("Olu");
    let (carer, carer_token) = ctx.user("Cam");

    let family_id = create_family(&ctx, &owner, "The Okafors").await;

    let (status, invite) = ctx
        .json(
            "POST",
            &format!("/v1/families/{}/invite", family_id),
            Some(&owner),
            Some(json!({ "role": "CAREGIVER" })),
        )
        .await;
    assert_eq!(status, 201, "{}", invite);
    let token = invite["token"].as_str().unwrap();
    assert_eq!(
        invite["inviteLink"],
        format!("https://app.twocare.test/families/join/{}", token)
    );

    // Not yet a member
    let (status, body) = ctx
        .json("GET", &format!("/v1/families/{}", family_id), Some(&carer_token), None)
        .await;
    assert_eq!(status, 403);
    assert_eq!(body["message"], "You are not a member of this family");

    let (status, family) = ctx
        .json("POST", "/v1/families/join", Some(&carer_token), Some(json!({ "token": token })))
        .await;
    assert_eq!(status, 201, "{}", family);
    assert_eq!(family["members"].as_array().unwrap().len(), 2);

    let (status, _) = ctx
        .json("POST", "/v1/families/join", Some(&carer_token), Some(json!({ "token": token })))
        .await;
    assert_eq!(status, 409);

    let (status, members) = ctx
        .json("GET", &format!("/v1/families/{}/members", family_id), Some(&carer_token), None)
        .await;
    assert_eq!(status, 200);
    assert_eq!(members["total"], 2);
    let joined = members["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["userId"] == carer.id.to_string())
        .unwrap();
    assert_eq!(joined["role"], "CAREGIVER");
    assert_eq!(joined["user"]["firstName"], "Cam");
}

#[tokio::test]
async fn test_viewer_cannot_add_baby() {
    let ctx = TestContext::new();
    let (_, owner) = ctx.user("Olu");
    let (viewer, viewer_token) = ctx.user("Vic");

    let family_id = create_family(&ctx, &owner, "Family").await;
    ctx.store
        .insert_member(family_id.parse().unwrap(), viewer.id, FamilyRole::Viewer);

    let (status, body) = ctx
        .json(
            "POST",
            "/v1/babies",
            Some(&viewer_token),
            Some(json!({ "name": "Ada", "dateOfBirth": "2024-03-01", "familyId": family_id })),
        )
        .await;

    assert_eq!(status, 403);
    assert_eq!(body["statusCode"], 403);
    assert_eq!(body["message"], "Only PRIMARY_PARENT or CO_PARENT can add babies");
    assert_eq!(body["error"], "Forbidden");
    assert_eq!(body["path"], "/v1/babies");
}

#[tokio::test]
async fn test_validation_error_details() {
    let ctx = TestContext::new();
    let (_, token) = ctx.user("Olu");

    let (status, body) = ctx
        .json("POST", "/v1/families", Some(&token), Some(json!({ "name": "" })))
        .await;

    assert_eq!(status, 400);
    assert_eq!(body["message"], "Validation failed");
    assert_eq!(body["details"][0]["field"], "name");
}

#[tokio::test]
async fn test_malformed_requests_are_bad_request() {
    let ctx = TestContext::new();
    let (_, token) = ctx.user("Olu");

    let (status, body) = ctx.json("GET", "/v1/babies/not-a-uuid", Some(&token), None).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Bad Request");

    let request = Request::builder()
        .method("POST")
        .uri("/v1/families")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = ctx.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_activity_logging_and_listing() {
    let ctx = TestContext::new();
    let (_, token) = ctx.user("Olu");
    let family_id = create_family(&ctx, &token, "Family").await;
    let baby_id = create_baby(&ctx, &token, &family_id).await;

    for (activity_type, metadata) in [
        ("FEEDING", json!({ "amount": 120, "unit": "ml" })),
        ("FEEDING", json!({ "amount": 90, "unit": "ml" })),
        ("SLEEP", json!({})),
    ] {
        let (status, body) = ctx
            .json(
                "POST",
                "/v1/activities",
                Some(&token),
                Some(json!({ "babyId": baby_id, "type": activity_type, "metadata": metadata })),
            )
            .await;
        assert_eq!(status, 201, "{}", body);
    }

    let (status, body) = ctx
        .json(
            "POST",
            "/v1/activities",
            Some(&token),
            Some(json!({ "babyId": baby_id, "type": "FEEDING", "metadata": { "foo": 1 } })),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(
        body["message"],
        "Invalid metadata for type FEEDING: metadata.foo: Unrecognized key"
    );

    let (status, body) = ctx
        .json("GET", &format!("/v1/activities?babyId={}", baby_id), Some(&token), None)
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["total"], 3);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let (status, body) = ctx
        .json(
            "GET",
            &format!("/v1/activities?babyId={}&type=FEEDING&pageSize=1", baby_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["total"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = ctx
        .json(
            "GET",
            &format!("/v1/activities?babyId={}&pageSize=500", baby_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_patch_with_null_clears_or_rejects() {
    let ctx = TestContext::new();
    let (_, token) = ctx.user("Olu");
    let family_id = create_family(&ctx, &token, "Family").await;
    let baby_id = create_baby(&ctx, &token, &family_id).await;

    let (status, body) = ctx
        .json(
            "POST",
            "/v1/activities",
            Some(&token),
            Some(json!({ "babyId": baby_id, "type": "FEEDING", "notes": "fussy", "metadata": { "amount": 60 } })),
        )
        .await;
    assert_eq!(status, 201, "{}", body);
    let uri = format!("/v1/activities/{}", body["id"].as_str().unwrap());

    let (status, body) = ctx.json("PATCH", &uri, Some(&token), Some(json!({ "notes": null }))).await;
    assert_eq!(status, 200, "{}", body);
    assert!(body["notes"].is_null());
    assert_eq!(body["metadata"], json!({ "amount": 60 }));

    let (status, body) = ctx.json("PATCH", &uri, Some(&token), Some(json!({ "metadata": null }))).await;
    assert_eq!(status, 400);
    assert_eq!(
        body["message"],
        "Invalid metadata for type FEEDING: metadata: Expected object, received null"
    );

    let (status, body) = ctx
        .json(
            "PATCH",
            &format!("/v1/babies/{}", baby_id),
            Some(&token),
            Some(json!({ "gender": "MALE" })),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["gender"], "MALE");

    let (status, body) = ctx
        .json(
            "PATCH",
            &format!("/v1/babies/{}", baby_id),
            Some(&token),
            Some(json!({ "gender": null })),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    assert!(body["gender"].is_null());
    assert_eq!(body["name"], "Ada");
}

#[tokio::test]
async fn test_delete_family_hides_babies() {
    let ctx = TestContext::new();
    let (_, token) = ctx.user("Olu");
    let family_id = create_family(&ctx, &token, "Family").await;
    let baby_id = create_baby(&ctx, &token, &family_id).await;

    let (status, body) = ctx
        .json("DELETE", &format!("/v1/families/{}", family_id), Some(&token), None)
        .await;
    assert_eq!(status, 204);
    assert!(body.is_null());

    let (status, body) = ctx.json("GET", &format!("/v1/babies/{}", baby_id), Some(&token), None).await;
    assert_eq!(status, 404);
    assert_eq!(body["message"], "Baby not found");

    let (status, body) = ctx.json("GET", "/v1/families", Some(&token), None).await;
    assert_eq!(status, 200);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_avatar_upload() {
    let ctx = TestContext::new();
    let (_, token) = ctx.user("Olu");

    let (status, body) = ctx.upload("/v1/users/me/avatar", &token, "image/png", b"\x89PNG").await;
    assert_eq!(status, 200, "{}", body);
    let url = body["avatarUrl"].as_str().unwrap();
    assert!(ctx.storage.contains(url));

    let (status, body) = ctx.upload("/v1/users/me/avatar", &token, "text/plain", b"hello").await;
    assert_eq!(status, 400);
    assert_eq!(ctx.storage.len(), 1, "{}", body);

    let (status, body) = ctx.json("DELETE", "/v1/users/me/avatar", Some(&token), None).await;
    assert_eq!(status, 200);
    assert!(body["avatarUrl"].is_null());
    assert!(ctx.storage.is_empty());
}

#[tokio::test]
async fn test_baby_photo_upload() {
    let ctx = TestContext::new();
    let (_, token) = ctx.user("Olu");
    let family_id = create_family(&ctx, &token, "Family").await;
    let baby_id = create_baby(&ctx, &token, &family_id).await;

    let (status, photo) = ctx
        .upload(&format!("/v1/babies/{}/photos", baby_id), &token, "image/jpeg", b"jpeg")
        .await;
    assert_eq!(status, 201, "{}", photo);
    assert_eq!(photo["babyId"], baby_id);

    let (status, photos) = ctx
        .json("GET", &format!("/v1/babies/{}/photos", baby_id), Some(&token), None)
        .await;
    assert_eq!(status, 200);
    assert_eq!(photos["total"], 1);
    assert_eq!(photos["data"][0]["url"], photo["url"]);
}
