/// Integration tests for the Warden API
///
/// These drive the full router (auth middleware, handlers, engine, Postgres):
/// - Invite, accept, create, share by link, resolve until the quota runs out
/// - Last-owner protection
/// - Tenant isolation
/// - Saved views: any member saves, only managers delete
/// - Status codes for unauthenticated and malformed requests

mod common;

use axum::http::StatusCode;
use common::TestContext;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_health_reports_database() {
    let Some(ctx) = TestContext::new().await else { return };

    let (status, body) = ctx.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");
    assert_eq!(body["rate_limiter"], "disabled");
}

#[tokio::test]
async fn test_invite_share_and_link_quota_scenario() {
    let Some(ctx) = TestContext::new().await else { return };

    let (owner, workspace) = ctx.register(Some("Scenario")).await;
    let workspace = workspace.unwrap();
    let (editor, _) = ctx.register(None).await;

    // Invite the second user as editor
    let (status, invite) = ctx
        .send(
            "POST",
            &format!("/v1/workspaces/{workspace}/members"),
            Some(&owner.token),
            Some(json!({ "email": editor.email.to_uppercase(), "role": "editor" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{invite}");
    assert_eq!(invite["membership"]["invite_email"], editor.email);
    let invite_token = invite["token"].as_str().unwrap().to_string();
    assert!(invite["accept_url"].as_str().unwrap().ends_with(&invite_token));

    // Inviting again is a conflict
    let (status, _) = ctx
        .send(
            "POST",
            &format!("/v1/workspaces/{workspace}/members"),
            Some(&owner.token),
            Some(json!({ "email": editor.email, "role": "member" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Accept, then accepting again fails
    let (status, membership) = ctx
        .send(
            "POST",
            "/v1/invites/accept",
            Some(&editor.token),
            Some(json!({ "token": invite_token })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{membership}");
    assert_eq!(membership["status"], "accepted");

    let (status, _) = ctx
        .send(
            "POST",
            "/v1/invites/accept",
            Some(&editor.token),
            Some(json!({ "token": invite_token })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The editor creates a list
    let (status, list) = ctx
        .send(
            "POST",
            &format!("/v1/workspaces/{workspace}/lists"),
            Some(&editor.token),
            Some(json!({ "name": "Roadmap" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{list}");
    let list_id = list["id"].as_str().unwrap();

    // The owner shares it by link with two views
    let (status, link) = ctx
        .send(
            "POST",
            &format!("/v1/workspaces/{workspace}/links"),
            Some(&owner.token),
            Some(json!({ "resource_type": "list", "resource_id": list_id, "max_views": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{link}");
    let url = link["url"].as_str().unwrap().to_string();

    for expected_views in 1..=2 {
        let (status, resolved) = ctx.send("GET", &url, None, None).await;
        assert_eq!(status, StatusCode::OK, "{resolved}");
        assert_eq!(resolved["resource_type"], "list");
        assert_eq!(resolved["list"]["name"], "Roadmap");
        assert_eq!(resolved["view_count"], expected_views);
    }

    let (status, body) = ctx.send("GET", &url, None, None).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"], "gone");
    assert_eq!(body["message"], "Link expired (max views)");

    // Every step left an audit row
    let (status, audit) = ctx
        .send(
            "GET",
            &format!("/v1/workspaces/{workspace}/audit?limit=50"),
            Some(&editor.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<&str> = audit
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["action"].as_str().unwrap())
        .collect();
    for action in [
        "workspace.create",
        "membership.invite",
        "membership.accept",
        "list.create",
        "share.link.create",
        "share.link.view",
    ] {
        assert!(actions.contains(&action), "missing {action} in {actions:?}");
    }
    assert_eq!(actions.iter().filter(|a| **a == "share.link.view").count(), 2);

    ctx.cleanup(workspace).await;
}

#[tokio::test]
async fn test_sole_owner_cannot_leave() {
    let Some(ctx) = TestContext::new().await else { return };

    let (owner, workspace) = ctx.register(Some("Solo")).await;
    let workspace = workspace.unwrap();

    let (status, members) = ctx
        .send("GET", &format!("/v1/workspaces/{workspace}/members"), Some(&owner.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let membership_id = members[0]["id"].as_str().unwrap();

    let (status, body) = ctx
        .send(
            "DELETE",
            &format!("/v1/workspaces/{workspace}/members/{membership_id}"),
            Some(&owner.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, _) = ctx
        .send(
            "PATCH",
            &format!("/v1/workspaces/{workspace}/members/{membership_id}"),
            Some(&owner.token),
            Some(json!({ "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    ctx.cleanup(workspace).await;
}

#[tokio::test]
async fn test_outsider_sees_not_found() {
    let Some(ctx) = TestContext::new().await else { return };

    let (owner, workspace) = ctx.register(Some("Private")).await;
    let workspace = workspace.unwrap();
    let (outsider, _) = ctx.register(None).await;

    let (_, list) = ctx
        .send(
            "POST",
            &format!("/v1/workspaces/{workspace}/lists"),
            Some(&owner.token),
            Some(json!({ "name": "Secret" })),
        )
        .await;
    let list_id = list["id"].as_str().unwrap();

    for uri in [
        format!("/v1/workspaces/{workspace}"),
        format!("/v1/workspaces/{workspace}/lists"),
        format!("/v1/workspaces/{workspace}/lists/{list_id}"),
        format!("/v1/workspaces/{workspace}/audit"),
    ] {
        let (status, _) = ctx.send("GET", &uri, Some(&outsider.token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }

    let (status, _) = ctx
        .send(
            "PATCH",
            &format!("/v1/workspaces/{workspace}/lists/{list_id}"),
            Some(&outsider.token),
            Some(json!({ "name": "Mine now" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.cleanup(workspace).await;
}

#[tokio::test]
async fn test_credentials_and_input_errors() {
    let Some(ctx) = TestContext::new().await else { return };

    let (status, body) = ctx.send("GET", "/v1/workspaces", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or missing credentials");

    let (status, body) = ctx.send("GET", "/v1/workspaces", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or missing credentials");

    let (user, _) = ctx.register(None).await;
    let (status, body) = ctx
        .send("POST", "/v1/workspaces", Some(&user.token), Some(json!({ "name": "" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = ctx
        .send("GET", &format!("/s/shr_{}", "x".repeat(32)), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx.send("GET", "/s/garbage", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx
        .send("GET", &format!("/v1/workspaces/{}", Uuid::new_v4()), Some(&user.token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_saved_views_by_role() {
    let Some(ctx) = TestContext::new().await else { return };

    let (owner, workspace) = ctx.register(Some("Views")).await;
    let workspace = workspace.unwrap();
    let (member, _) = ctx.register(None).await;

    let (status, invite) = ctx
        .send(
            "POST",
            &format!("/v1/workspaces/{workspace}/members"),
            Some(&owner.token),
            Some(json!({ "email": member.email, "role": "member" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{invite}");
    let (status, _) = ctx
        .send(
            "POST",
            "/v1/invites/accept",
            Some(&member.token),
            Some(json!({ "token": invite["token"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, view) = ctx
        .send(
            "POST",
            &format!("/v1/workspaces/{workspace}/views"),
            Some(&member.token),
            Some(json!({
                "name": "Open deals",
                "resource_type": "items",
                "filters": { "status": "open" }
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{view}");
    assert_eq!(view["created_by"], member.id.to_string());
    assert_eq!(view["filters"]["status"], "open");
    assert_eq!(view["columns"], json!({}));
    let view_id = view["id"].as_str().unwrap().to_string();

    let (status, listed) = ctx
        .send(
            "GET",
            &format!("/v1/workspaces/{workspace}/views?resource_type=items"),
            Some(&owner.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (_, listed) = ctx
        .send(
            "GET",
            &format!("/v1/workspaces/{workspace}/views?resource_type=lists"),
            Some(&member.token),
            None,
        )
        .await;
    assert!(listed.as_array().unwrap().is_empty());

    let uri = format!("/v1/workspaces/{workspace}/views/{view_id}");
    let (status, _) = ctx.send("DELETE", &uri, Some(&member.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx.send("DELETE", &uri, Some(&owner.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = ctx.send("DELETE", &uri, Some(&owner.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.cleanup(workspace).await;
}
