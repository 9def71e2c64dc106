//! End-to-end API tests against an in-memory database
//!
//! Each test builds a fresh router and drives it with tower's `oneshot`,
//! asserting on the `{isSuccess, message, data}` envelope.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use vlab_server::{build_router, AppState};

async fn test_app() -> Router {
    let pool = vlab_common::db::open_in_memory()
        .await
        .expect("in-memory database");
    build_router(AppState::new(pool))
}

/// Send one request; `user` becomes the X-User-Id header when present
async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-User-Id", user);
    }
    let request = match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

async fn create_session(app: &Router, user: &str, title: &str, is_public: bool) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/sessions",
        Some(user),
        Some(json!({ "title": title, "isPublic": is_public })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isSuccess"], true);
    body["data"].clone()
}

async fn create_meeting(app: &Router, user: &str, session_id: &str, extra: Value) -> Value {
    let mut payload = json!({ "sessionId": session_id });
    if let (Some(obj), Some(extra)) = (payload.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            obj.insert(k.clone(), v.clone());
        }
    }
    let (status, body) = send(app, Method::POST, "/meetings", Some(user), Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    body["data"].clone()
}

async fn add_transcript(app: &Router, user: &str, meeting_id: &str, round: i64, seq: i64, content: &str) {
    let (status, body) = send(
        app,
        Method::POST,
        "/transcripts",
        Some(user),
        Some(json!({
            "meetingId": meeting_id,
            "role": "assistant",
            "agentName": "Ada",
            "content": content,
            "roundNumber": round,
            "sequenceNumber": seq,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "transcript insert failed: {}", body);
}

#[tokio::test]
async fn test_health() {
    let app = test_app().await;
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_create_session_requires_title() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/sessions",
        Some("alice"),
        Some(json!({ "title": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["isSuccess"], false);
}

#[tokio::test]
async fn test_create_session_requires_identity() {
    let app = test_app().await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/sessions",
        None,
        Some(json!({ "title": "No caller" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_creating_second_session_deactivates_first() {
    let app = test_app().await;
    let s1 = create_session(&app, "alice", "First", false).await;
    let s2 = create_session(&app, "alice", "Second", false).await;
    assert_eq!(s1["isActive"], true);
    assert_eq!(s2["isActive"], true);

    let (_, body) = send(&app, Method::GET, "/sessions", Some("alice"), None).await;
    let sessions = body["data"].as_array().expect("session list");
    assert_eq!(sessions.len(), 2);

    let active: Vec<&Value> = sessions
        .iter()
        .filter(|s| s["isActive"] == true)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["id"], s2["id"]);
}

#[tokio::test]
async fn test_activate_switches_exclusively() {
    let app = test_app().await;
    let s1 = create_session(&app, "alice", "First", false).await;
    let _s2 = create_session(&app, "alice", "Second", false).await;

    let uri = format!("/sessions/{}/activate", s1["id"].as_str().unwrap());
    let (status, body) = send(&app, Method::PUT, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isActive"], true);

    let (_, body) = send(&app, Method::GET, "/sessions/active", Some("alice"), None).await;
    assert_eq!(body["data"]["id"], s1["id"]);
}

#[tokio::test]
async fn test_deactivate_clears_active_flag() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Paused", false).await;

    let uri = format!("/sessions/{}/deactivate", s["id"].as_str().unwrap());
    let (status, body) = send(&app, Method::PUT, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isActive"], false);

    let (_, body) = send(&app, Method::GET, "/sessions/active", Some("alice"), None).await;
    assert_eq!(body["data"], Value::Null);
}

#[tokio::test]
async fn test_activate_foreign_session_is_not_found() {
    let app = test_app().await;
    let s1 = create_session(&app, "alice", "Mine", true).await;

    let uri = format!("/sessions/{}/activate", s1["id"].as_str().unwrap());
    let (status, _) = send(&app, Method::PUT, &uri, Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_active_session_none_is_successful_null() {
    let app = test_app().await;
    let (status, body) = send(&app, Method::GET, "/sessions/active", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isSuccess"], true);
    assert_eq!(body["data"], Value::Null);
    assert_eq!(body["message"], "No active session found");
}

#[tokio::test]
async fn test_private_session_is_invisible_to_others() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Secret", false).await;
    let uri = format!("/sessions/{}", s["id"].as_str().unwrap());

    let (status, _) = send(&app, Method::GET, &uri, Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::GET, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Secret");
}

#[tokio::test]
async fn test_public_session_readable_by_anonymous() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Open science", true).await;
    let uri = format!("/sessions/{}", s["id"].as_str().unwrap());

    let (status, body) = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isPublic"], true);
}

#[tokio::test]
async fn test_update_is_owner_only() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Open", true).await;
    let uri = format!("/sessions/{}", s["id"].as_str().unwrap());

    // Public session: existence is known, so the refusal is explicit
    let (status, _) = send(
        &app,
        Method::PUT,
        &uri,
        Some("bob"),
        Some(json!({ "title": "Hijacked" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Method::PUT,
        &uri,
        Some("alice"),
        Some(json!({ "title": "Renamed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Renamed");
}

#[tokio::test]
async fn test_update_with_no_fields_is_rejected() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Open", true).await;
    let uri = format!("/sessions/{}", s["id"].as_str().unwrap());

    let (status, _) = send(&app, Method::PUT, &uri, Some("alice"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bot_user_id_claim_trusted_only_without_header() {
    let app = test_app().await;

    // No verified identity: the claimed userId is trusted
    let (status, body) = send(
        &app,
        Method::POST,
        "/sessions",
        None,
        Some(json!({ "userId": "bot-7", "title": "Bot session" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["userId"], "bot-7");

    // Verified identity wins over the claim
    let (_, body) = send(
        &app,
        Method::POST,
        "/sessions",
        Some("alice"),
        Some(json!({ "userId": "mallory", "title": "Claimed" })),
    )
    .await;
    assert_eq!(body["data"]["userId"], "alice");
}

#[tokio::test]
async fn test_end_and_reopen_session() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Long running", false).await;
    let id = s["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/sessions/{}/end", id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isActive"], false);

    // Reopen reactivates and spawns a fresh pending meeting
    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/sessions/{}/reopen", id),
        Some("alice"),
        Some(json!({ "title": "Round two", "maxRounds": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["session"]["isActive"], true);
    assert_eq!(body["data"]["meeting"]["status"], "pending");
    assert_eq!(body["data"]["meeting"]["title"], "Round two");
    assert_eq!(body["data"]["meeting"]["maxRounds"], 5);
    assert_eq!(body["data"]["meeting"]["sessionId"], id);
}

#[tokio::test]
async fn test_reopen_requires_owner() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Mine", true).await;
    let uri = format!("/sessions/{}/reopen", s["id"].as_str().unwrap());

    let (status, _) = send(&app, Method::PUT, &uri, Some("bob"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_meeting_end_is_idempotent() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Research", false).await;
    let m = create_meeting(&app, "alice", s["id"].as_str().unwrap(), json!({})).await;
    let uri = format!("/meetings/{}/end", m["id"].as_str().unwrap());

    let (status, first) = send(&app, Method::PUT, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["status"], "completed");

    // A second end returns the row unchanged, completion time included
    let (status, second) = send(&app, Method::PUT, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["completedAt"], first["data"]["completedAt"]);
}

#[tokio::test]
async fn test_end_session_meetings_reports_count() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Research", false).await;
    let sid = s["id"].as_str().unwrap();
    let m1 = create_meeting(&app, "alice", sid, json!({})).await;
    let _m2 = create_meeting(&app, "alice", sid, json!({})).await;

    // Only in-progress meetings are bulk-completed; m2 stays pending
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/meetings/{}", m1["id"].as_str().unwrap()),
        Some("alice"),
        Some(json!({ "status": "in_progress" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/sessions/{}/end-meetings", sid);
    let (status, body) = send(&app, Method::PUT, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ended"], 1);

    let (_, body) = send(&app, Method::PUT, &uri, Some("alice"), None).await;
    assert_eq!(body["data"]["ended"], 0);
}

#[tokio::test]
async fn test_parallel_meetings_group_by_index() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Parallel", false).await;
    let sid = s["id"].as_str().unwrap();

    let m1 = create_meeting(&app, "alice", sid, json!({ "isParallel": true, "parallelIndex": 2 })).await;
    let m2 = create_meeting(&app, "alice", sid, json!({ "isParallel": true, "parallelIndex": 2 })).await;
    let m3 = create_meeting(&app, "alice", sid, json!({ "isParallel": true, "parallelIndex": 0 })).await;

    let uri = format!(
        "/meetings/parallel?sessionId={}&baseMeetingId={}",
        sid,
        m1["id"].as_str().unwrap()
    );
    let (status, body) = send(&app, Method::GET, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);

    let ids: Vec<&str> = body["data"]
        .as_array()
        .expect("meeting list")
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&m1["id"].as_str().unwrap()));
    assert!(ids.contains(&m2["id"].as_str().unwrap()));
    assert!(!ids.contains(&m3["id"].as_str().unwrap()));
}

#[tokio::test]
async fn test_active_meetings_are_pending_or_in_progress() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Research", false).await;
    let sid = s["id"].as_str().unwrap();
    let m1 = create_meeting(&app, "alice", sid, json!({})).await;
    let m2 = create_meeting(&app, "alice", sid, json!({})).await;

    let (_, _) = send(
        &app,
        Method::PUT,
        &format!("/meetings/{}/end", m1["id"].as_str().unwrap()),
        None,
        None,
    )
    .await;

    let uri = format!("/meetings/active?sessionId={}", sid);
    let (_, body) = send(&app, Method::GET, &uri, Some("alice"), None).await;
    let active = body["data"].as_array().expect("meeting list");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["id"], m2["id"]);
}

#[tokio::test]
async fn test_transcripts_return_in_conversational_order() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Ordered", false).await;
    let m = create_meeting(&app, "alice", s["id"].as_str().unwrap(), json!({})).await;
    let mid = m["id"].as_str().unwrap();

    // Inserted out of order on purpose
    add_transcript(&app, "alice", mid, 2, 1, "third").await;
    add_transcript(&app, "alice", mid, 1, 2, "second").await;
    add_transcript(&app, "alice", mid, 1, 1, "first").await;

    let uri = format!("/transcripts?meetingId={}", mid);
    let (status, body) = send(&app, Method::GET, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);

    let contents: Vec<&str> = body["data"]
        .as_array()
        .expect("transcript list")
        .iter()
        .map(|t| t["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["first", "second", "third"]);

    // limit truncates after ordering
    let uri = format!("/transcripts?meetingId={}&limit=2", mid);
    let (_, body) = send(&app, Method::GET, &uri, Some("alice"), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_transcripts_of_private_meeting_are_hidden() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Secret", false).await;
    let m = create_meeting(&app, "alice", s["id"].as_str().unwrap(), json!({})).await;
    add_transcript(&app, "alice", m["id"].as_str().unwrap(), 1, 1, "hidden").await;

    let uri = format!("/transcripts?meetingId={}", m["id"].as_str().unwrap());
    let (status, _) = send(&app, Method::GET, &uri, Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_transcript_count_spans_meetings() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Counted", false).await;
    let sid = s["id"].as_str().unwrap();
    let m1 = create_meeting(&app, "alice", sid, json!({})).await;
    let m2 = create_meeting(&app, "alice", sid, json!({})).await;

    add_transcript(&app, "alice", m1["id"].as_str().unwrap(), 1, 1, "a").await;
    add_transcript(&app, "alice", m1["id"].as_str().unwrap(), 1, 2, "b").await;
    add_transcript(&app, "alice", m2["id"].as_str().unwrap(), 1, 1, "c").await;

    let uri = format!("/sessions/{}/transcript-count", sid);
    let (status, body) = send(&app, Method::GET, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 3);
}

#[tokio::test]
async fn test_vote_upsert_replaces_previous_value() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Votable", true).await;
    let sid = s["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        "/votes",
        Some("bob"),
        Some(json!({ "sessionId": sid, "value": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Vote created successfully");

    let (_, body) = send(
        &app,
        Method::POST,
        "/votes",
        Some("bob"),
        Some(json!({ "sessionId": sid, "value": -1 })),
    )
    .await;
    assert_eq!(body["message"], "Vote updated successfully");
    assert_eq!(body["data"]["value"], -1);

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/votes/{}/count", sid),
        None,
        None,
    )
    .await;
    assert_eq!(body["data"]["upvotes"], 0);
    assert_eq!(body["data"]["downvotes"], 1);
    assert_eq!(body["data"]["total"], -1);
}

#[tokio::test]
async fn test_vote_value_is_clamped() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Votable", true).await;
    let sid = s["id"].as_str().unwrap();

    let (_, body) = send(
        &app,
        Method::POST,
        "/votes",
        Some("carol"),
        Some(json!({ "sessionId": sid, "value": 5 })),
    )
    .await;
    assert_eq!(body["data"]["value"], 1);
}

#[tokio::test]
async fn test_vote_on_private_foreign_session_is_not_found() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Private", false).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/votes",
        Some("bob"),
        Some(json!({ "sessionId": s["id"], "value": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_vote_none_is_successful_null() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Votable", true).await;

    let uri = format!("/votes/{}", s["id"].as_str().unwrap());
    let (status, body) = send(&app, Method::GET, &uri, Some("bob"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isSuccess"], true);
    assert_eq!(body["data"], Value::Null);
}

#[tokio::test]
async fn test_gallery_lists_only_public_with_search_and_paging() {
    let app = test_app().await;
    create_session(&app, "alice", "Quantum computing", true).await;
    create_session(&app, "bob", "Quantum biology", true).await;
    create_session(&app, "carol", "Classical optics", true).await;
    create_session(&app, "dave", "Private quantum", false).await;

    let (status, body) = send(&app, Method::GET, "/sessions/public", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalCount"], 3);

    let (_, body) = send(
        &app,
        Method::GET,
        "/sessions/public?search=Quantum",
        None,
        None,
    )
    .await;
    assert_eq!(body["data"]["sessions"].as_array().unwrap().len(), 2);

    let (_, body) = send(
        &app,
        Method::GET,
        "/sessions/public?pageSize=2&page=2",
        None,
        None,
    )
    .await;
    assert_eq!(body["data"]["currentPage"], 2);
    assert_eq!(body["data"]["totalPages"], 2);
    assert_eq!(body["data"]["sessions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_leaderboard_orders_by_vote_total() {
    let app = test_app().await;
    let s1 = create_session(&app, "alice", "Loved", true).await;
    let s2 = create_session(&app, "bob", "Contested", true).await;

    for voter in ["v1", "v2"] {
        send(
            &app,
            Method::POST,
            "/votes",
            Some(voter),
            Some(json!({ "sessionId": s1["id"], "value": 1 })),
        )
        .await;
    }
    send(
        &app,
        Method::POST,
        "/votes",
        Some("v1"),
        Some(json!({ "sessionId": s2["id"], "value": -1 })),
    )
    .await;

    let (status, body) = send(&app, Method::GET, "/leaderboard", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let rows = body["data"].as_array().expect("leaderboard rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], s1["id"]);
    assert_eq!(rows[0]["total"], 2);
    assert_eq!(rows[0]["upvotes"], 2);
    assert_eq!(rows[1]["total"], -1);
    assert_eq!(rows[1]["downvotes"], 1);
}

#[tokio::test]
async fn test_agent_prompt_is_generated_from_fields() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/agents",
        Some("alice"),
        Some(json!({
            "name": "Ada",
            "role": "Biologist",
            "expertise": "genomics",
            "goal": "design a CRISPR screen",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["prompt"],
        "You are Ada, a Biologist with expertise in genomics. Your goal is to design a CRISPR screen"
    );
    assert_eq!(body["data"]["model"], "openai");
    assert_eq!(body["data"]["status"], "active");
}

#[tokio::test]
async fn test_agents_are_owner_private() {
    let app = test_app().await;
    let (_, body) = send(
        &app,
        Method::POST,
        "/agents",
        Some("alice"),
        Some(json!({ "name": "Ada", "role": "Biologist" })),
    )
    .await;
    let uri = format!("/agents/{}", body["data"]["id"].as_str().unwrap());

    let (status, _) = send(&app, Method::GET, &uri, Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_transcript_stream_is_access_checked() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Streamed", false).await;
    let m = create_meeting(&app, "alice", s["id"].as_str().unwrap(), json!({})).await;
    let uri = format!("/transcripts/{}/stream", m["id"].as_str().unwrap());

    let request = Request::builder()
        .method(Method::GET)
        .uri(&uri)
        .header("X-User-Id", "bob")
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Owner connects; only headers are inspected, the body never ends
    let request = Request::builder()
        .method(Method::GET)
        .uri(&uri)
        .header("X-User-Id", "alice")
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("text/event-stream")
    );
}

/// Open the SSE endpoint and hand back the still-running body
async fn open_stream(app: &Router, uri: &str, user: &str, last_event_id: Option<i64>) -> Body {
    let mut builder = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("X-User-Id", user);
    if let Some(id) = last_event_id {
        builder = builder.header("Last-Event-ID", id.to_string());
    }
    let request = builder.body(Body::empty()).expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    response.into_body()
}

/// Read one event off an open stream, returning its id and JSON payload.
/// The stream never ends on its own, hence the timeout.
async fn next_event(body: &mut Body) -> (i64, Value) {
    let mut raw = String::new();
    while !raw.contains("\n\n") {
        let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
            .await
            .expect("event before timeout")
            .expect("stream still open")
            .expect("frame");
        if let Some(data) = frame.data_ref() {
            raw.push_str(std::str::from_utf8(data).expect("utf8 frame"));
        }
    }
    let mut id = None;
    let mut data = None;
    for line in raw.lines() {
        if let Some(v) = line.strip_prefix("id:") {
            id = v.trim().parse::<i64>().ok();
        } else if let Some(v) = line.strip_prefix("data:") {
            data = serde_json::from_str(v.trim()).ok();
        }
    }
    (id.expect("event id"), data.expect("event data"))
}

#[tokio::test]
async fn test_stream_initial_frame_is_sent_even_when_empty() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Quiet", true).await;
    let m = create_meeting(&app, "alice", s["id"].as_str().unwrap(), json!({})).await;
    let uri = format!("/transcripts/{}/stream", m["id"].as_str().unwrap());

    let mut body = open_stream(&app, &uri, "alice", None).await;
    let (id, data) = next_event(&mut body).await;
    assert_eq!(data, json!([]));
    // With nothing to send the watermark stays at the epoch
    assert_eq!(id, 0);
}

#[tokio::test]
async fn test_stream_backlog_then_resume_via_last_event_id() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Live", true).await;
    let m = create_meeting(&app, "alice", s["id"].as_str().unwrap(), json!({})).await;
    let mid = m["id"].as_str().unwrap();
    let uri = format!("/transcripts/{}/stream", mid);

    // Spaced out so the rows land in distinct milliseconds
    add_transcript(&app, "alice", mid, 1, 1, "r1s1").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    add_transcript(&app, "alice", mid, 1, 2, "r1s2").await;

    let mut body = open_stream(&app, &uri, "alice", None).await;
    let (id, data) = next_event(&mut body).await;
    let rows = data.as_array().expect("batch");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["content"], "r1s1");
    assert_eq!(rows[1]["content"], "r1s2");

    // The event id is the newest row's creation time in epoch millis
    let newest = chrono::DateTime::parse_from_rfc3339(
        rows[1]["createdAt"].as_str().expect("createdAt"),
    )
    .expect("timestamp");
    assert_eq!(id, newest.timestamp_millis());
    drop(body);

    tokio::time::sleep(Duration::from_millis(5)).await;
    add_transcript(&app, "alice", mid, 2, 1, "r2s1").await;

    // Reconnect from the delivered id. Ids truncate to milliseconds, so
    // the boundary row may repeat, but rows strictly before it never do.
    let mut body = open_stream(&app, &uri, "alice", Some(id)).await;
    let (resumed_id, data) = next_event(&mut body).await;
    let contents: Vec<&str> = data
        .as_array()
        .expect("batch")
        .iter()
        .map(|t| t["content"].as_str().expect("content"))
        .collect();
    assert!(contents.contains(&"r2s1"));
    assert!(!contents.contains(&"r1s1"));
    assert!(resumed_id > id);
}

#[tokio::test]
async fn test_stream_for_missing_meeting_is_not_found() {
    let app = test_app().await;
    let (status, _) = send(
        &app,
        Method::GET,
        "/transcripts/nope/stream",
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_full_meeting_lifecycle_end_to_end() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Full run", true).await;
    let sid = s["id"].as_str().unwrap();
    let m = create_meeting(&app, "alice", sid, json!({ "maxRounds": 2 })).await;
    let mid = m["id"].as_str().unwrap();

    add_transcript(&app, "alice", mid, 1, 1, "r1s1").await;
    add_transcript(&app, "alice", mid, 1, 2, "r1s2").await;
    add_transcript(&app, "alice", mid, 1, 3, "r1s3").await;
    add_transcript(&app, "alice", mid, 2, 1, "r2s1").await;

    // A public session's transcript is readable anonymously, in order
    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/transcripts?meetingId={}", mid),
        None,
        None,
    )
    .await;
    let contents: Vec<&str> = body["data"]
        .as_array()
        .expect("transcript list")
        .iter()
        .map(|t| t["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["r1s1", "r1s2", "r1s3", "r2s1"]);

    let (_, body) = send(
        &app,
        Method::PUT,
        &format!("/meetings/{}/end", mid),
        None,
        None,
    )
    .await;
    assert_eq!(body["data"]["status"], "completed");

    // Nothing left in progress, so the bulk end reports zero
    let (_, body) = send(
        &app,
        Method::PUT,
        &format!("/sessions/{}/end-meetings", sid),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(body["data"]["ended"], 0);
}

#[tokio::test]
async fn test_deleting_session_cascades() {
    let app = test_app().await;
    let s = create_session(&app, "alice", "Doomed", false).await;
    let sid = s["id"].as_str().unwrap();
    let m = create_meeting(&app, "alice", sid, json!({})).await;
    add_transcript(&app, "alice", m["id"].as_str().unwrap(), 1, 1, "gone").await;

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/sessions/{}", sid),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/meetings/{}", m["id"].as_str().unwrap()),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
