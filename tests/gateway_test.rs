//! End-to-end behaviour of the gateway against mock consensus nodes.

mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{start_mock_node, start_slow_mock_node, TestGateway};
use signing_gateway::auth::{Action, PermissionStore, ResourceId, Role};
use signing_gateway::http::GatewayServer;
use signing_gateway::signing::{schnorr, SignedPayload};

fn decode_envelope(body: &[u8]) -> (SignedPayload, Value) {
    let envelope: SignedPayload = serde_json::from_slice(body).unwrap();
    let raw = URL_SAFE.decode(&envelope.payload).unwrap();
    let message = serde_json::from_slice(&raw).unwrap();
    (envelope, message)
}

#[tokio::test]
async fn test_proxy_mutation_requires_grant() {
    let gw = TestGateway::new("http://127.0.0.1:1");
    let body = json!({"NodeAddr": "node-1:2001", "Proxy": "http://proxy-1:9000"});

    let (status, text) = gw
        .send(Method::POST, "/api/proxies", None, Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text, "Unauthorized - only admins and operators allowed");

    let voter = gw.login_as(2, Role::Voter);
    let (status, _) = gw
        .send(Method::POST, "/api/proxies", Some(&voter), Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(gw.state.proxies.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_operator_manages_proxies() {
    let gw = TestGateway::new("http://127.0.0.1:1");
    let operator = gw.login_as(1, Role::Operator);

    let (status, text) = gw
        .send(
            Method::POST,
            "/api/proxies",
            Some(&operator),
            Some(json!({"NodeAddr": "node-1:2001", "Proxy": "http://proxy-1:9000"})),
        )
        .await;
    assert_eq!((status, text.as_str()), (StatusCode::OK, "ok"));

    let (status, text) = gw.send(Method::GET, "/api/proxies", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let list: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(list, json!({"Proxies": {"node-1:2001": "http://proxy-1:9000"}}));

    let (status, text) = gw
        .send(Method::GET, "/api/proxies/node-1%3A2001", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let entry: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
        entry,
        json!({"NodeAddr": "node-1:2001", "Proxy": "http://proxy-1:9000"})
    );

    let (status, _) = gw
        .send(
            Method::PUT,
            "/api/proxies/node-1:2001",
            Some(&operator),
            Some(json!({"Proxy": "http://proxy-2:9000", "NewNode": "node-2:2002"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gw.state.proxies.get("node-1:2001").unwrap(), None);
    assert_eq!(
        gw.state.proxies.get("node-2:2002").unwrap().as_deref(),
        Some("http://proxy-2:9000")
    );

    let (status, _) = gw
        .send(Method::DELETE, "/api/proxies/node-2:2002", Some(&operator), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(gw.state.proxies.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_proxy_update_edge_cases() {
    let gw = TestGateway::new("http://127.0.0.1:1");
    let admin = gw.login_as(1, Role::Admin);

    let (status, text) = gw
        .send(
            Method::PUT,
            "/api/proxies/missing",
            Some(&admin),
            Some(json!({"Proxy": "http://p"})),
        )
        .await;
    assert_eq!((status, text.as_str()), (StatusCode::NOT_FOUND, "not found"));

    gw.state.proxies.put("node-1", "http://p1").unwrap();
    let (status, text) = gw
        .send(Method::PUT, "/api/proxies/node-1", Some(&admin), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text, "bad request, proxy is undefined");

    let (status, _) = gw
        .send(Method::DELETE, "/api/proxies/missing", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_default_proxy_is_open() {
    let gw = TestGateway::new("http://node-0:9000");
    let (status, text) = gw.send(Method::GET, "/api/config/proxy", None, None).await;
    assert_eq!((status, text.as_str()), (StatusCode::OK, "http://node-0:9000"));
}

#[tokio::test]
async fn test_dkg_setup_goes_to_explicit_proxy() {
    let default_node = start_mock_node(200, "{}").await;
    let proxy = start_mock_node(200, r#"{"status":"started"}"#).await;
    let gw = TestGateway::new(&default_node.url());
    let owner = gw.login(7);
    gw.grant_ownership(7, "f1");

    let (status, text) = gw
        .send(
            Method::PUT,
            "/api/evoting/services/dkg/actors/f1",
            Some(&owner),
            Some(json!({"Action": "setup", "Proxy": proxy.url()})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, r#"{"status":"started"}"#);

    assert!(default_node.requests().is_empty());
    let received = proxy.requests();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].method, Method::PUT);
    assert_eq!(received[0].path, "/evoting/services/dkg/actors/f1");

    let (envelope, message) = decode_envelope(&received[0].body);
    assert!(envelope.verify(&gw.keys));
    assert_eq!(message, json!({"Action": "setup"}));
}

#[tokio::test]
async fn test_dkg_setup_without_proxy_is_rejected() {
    let default_node = start_mock_node(200, "{}").await;
    let gw = TestGateway::new(&default_node.url());
    let owner = gw.login(7);
    gw.grant_ownership(7, "f1");

    let (status, text) = gw
        .send(
            Method::PUT,
            "/api/evoting/services/dkg/actors/f1",
            Some(&owner),
            Some(json!({"Action": "setup"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text, "proxy undefined in body");
    assert!(default_node.requests().is_empty());
}

#[tokio::test]
async fn test_dkg_setup_resolves_node_through_directory() {
    let proxy = start_mock_node(200, "{}").await;
    let gw = TestGateway::new("http://127.0.0.1:1");
    gw.state.proxies.put("node-3:2003", &proxy.url()).unwrap();
    let owner = gw.login(7);
    gw.grant_ownership(7, "f1");

    let (status, _) = gw
        .send(
            Method::PUT,
            "/api/evoting/services/dkg/actors/f1",
            Some(&owner),
            Some(json!({"Action": "setup", "NodeAddr": "node-3:2003"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(proxy.requests().len(), 1);

    let (status, _) = gw
        .send(
            Method::PUT,
            "/api/evoting/services/dkg/actors/f1",
            Some(&owner),
            Some(json!({"Action": "setup", "NodeAddr": "unknown"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_form_update_with_node_addr_goes_to_default_node() {
    let node = start_mock_node(200, "{}").await;
    let gw = TestGateway::new(&node.url());
    let owner = gw.login(7);
    gw.grant_ownership(7, "f1");

    let (status, _) = gw
        .send(
            Method::PUT,
            "/api/evoting/forms/f1",
            Some(&owner),
            Some(json!({"Action": "open", "NodeAddr": "node-9:2009"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let requests = node.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/evoting/forms/f1");
}

#[tokio::test]
async fn test_dkg_actor_requires_ownership() {
    let node = start_mock_node(200, "{}").await;
    let gw = TestGateway::new(&node.url());
    let stranger = gw.login(8);
    gw.grant_ownership(7, "f1");

    let (status, text) = gw
        .send(
            Method::PUT,
            "/api/evoting/services/dkg/actors/f1",
            Some(&stranger),
            Some(json!({"Action": "computePubshares"})),
        )
        .await;
    assert_eq!((status, text.as_str()), (StatusCode::BAD_REQUEST, "Unauthorized"));
    assert!(node.requests().is_empty());
}

#[tokio::test]
async fn test_dkg_create_signs_form_id_only() {
    let node = start_mock_node(200, "{}").await;
    let gw = TestGateway::new(&node.url());
    let owner = gw.login(7);
    gw.grant_ownership(7, "f1");

    let (status, _) = gw
        .send(
            Method::POST,
            "/api/evoting/services/dkg/actors",
            Some(&owner),
            Some(json!({"FormID": "f1", "Extra": true})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let received = node.requests();
    assert_eq!(received[0].path, "/evoting/services/dkg/actors");
    let (envelope, message) = decode_envelope(&received[0].body);
    assert!(envelope.verify(&gw.keys));
    assert_eq!(message, json!({"FormID": "f1"}));

    let (status, _) = gw
        .send(
            Method::POST,
            "/api/evoting/services/dkg/actors",
            Some(&owner),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_vote_injects_anonymous_submitter() {
    let node = start_mock_node(200, "{}").await;
    let gw = TestGateway::new(&node.url());
    let voter = gw.login(3);
    let ballot = json!({"Ballot": [{"K": "aa", "C": "bb"}]});

    for _ in 0..2 {
        let (status, _) = gw
            .send(
                Method::POST,
                "/api/evoting/forms/f1/vote",
                Some(&voter),
                Some(ballot.clone()),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let received = node.requests();
    assert_eq!(received.len(), 2);
    let ids: Vec<String> = received
        .iter()
        .map(|r| {
            let (envelope, message) = decode_envelope(&r.body);
            assert!(envelope.verify(&gw.keys));
            assert_eq!(message["Ballot"], ballot["Ballot"]);
            message["UserID"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(ids[0].len(), 10);
    assert_ne!(ids[0], ids[1]);
    assert_ne!(ids[0], "3");
}

#[tokio::test]
async fn test_generic_forward_requires_session() {
    let node = start_mock_node(200, "[]").await;
    let gw = TestGateway::new(&node.url());

    let (status, text) = gw.send(Method::GET, "/api/evoting/forms", None, None).await;
    assert_eq!((status, text.as_str()), (StatusCode::BAD_REQUEST, "Unauthorized"));
    assert!(node.requests().is_empty());

    let user = gw.login(4);
    let (status, text) = gw
        .send(Method::GET, "/api/evoting/forms", Some(&user), None)
        .await;
    assert_eq!((status, text.as_str()), (StatusCode::OK, "[]"));

    let (envelope, message) = decode_envelope(&node.requests()[0].body);
    assert!(envelope.verify(&gw.keys));
    assert_eq!(message, json!({}));
}

#[tokio::test]
async fn test_upstream_status_is_relayed() {
    let node = start_mock_node(201, r#"{"FormID":"f9"}"#).await;
    let gw = TestGateway::new(&node.url());
    let user = gw.login(4);

    let (status, text) = gw
        .send(
            Method::POST,
            "/api/evoting/forms",
            Some(&user),
            Some(json!({"Configuration": {}})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(text, r#"{"FormID":"f9"}"#);
}

#[tokio::test]
async fn test_upstream_failure_is_translated() {
    let node = start_mock_node(503, r#""busy""#).await;
    let gw = TestGateway::new(&node.url());
    let user = gw.login(4);

    let (status, text) = gw
        .send(Method::GET, "/api/evoting/forms", Some(&user), None)
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        text,
        format!(
            "failed to proxy request: GET {}/evoting/forms - status 503 - \"busy\"",
            node.url()
        )
    );
    assert!(!text.contains(&gw.keys.private_hex()));
}

#[tokio::test]
async fn test_unreachable_node_is_translated() {
    let gw = TestGateway::new("http://127.0.0.1:1");
    let user = gw.login(4);

    let (status, text) = gw
        .send(Method::GET, "/api/evoting/forms", Some(&user), None)
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(text.starts_with("failed to proxy request: GET http://127.0.0.1:1/evoting/forms - "));
}

#[tokio::test]
async fn test_stalled_node_times_out() {
    let node = start_slow_mock_node(200, "{}", Duration::from_secs(10)).await;
    let gw = TestGateway::with_config(&node.url(), |c| c.upstream.forward_timeout_secs = 1);
    let user = gw.login(4);

    let (status, text) = gw
        .send(Method::GET, "/api/evoting/forms", Some(&user), None)
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(text.contains("timed out after 1s"));
}

#[tokio::test]
async fn test_delete_form_uses_raw_signature_and_revokes() {
    let node = start_mock_node(200, "").await;
    let gw = TestGateway::new(&node.url());
    let owner = gw.login(7);
    gw.grant_ownership(7, "f1");

    let (status, _) = gw
        .send(Method::DELETE, "/api/evoting/forms/f1", Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let received = node.requests();
    assert_eq!(received[0].method, Method::DELETE);
    assert_eq!(received[0].path, "/evoting/forms/f1");
    assert!(received[0].body.is_empty());
    let signature = hex::decode(
        received[0]
            .headers
            .get("authorization")
            .unwrap()
            .to_str()
            .unwrap(),
    )
    .unwrap();
    assert!(schnorr::verify(gw.keys.public(), b"f1", &signature));

    assert!(!gw
        .state
        .gate
        .permissions()
        .is_authorized(7, &ResourceId::form("f1"), Action::Own));
}

#[tokio::test]
async fn test_failed_delete_keeps_ownership() {
    let node = start_mock_node(500, r#""nope""#).await;
    let gw = TestGateway::new(&node.url());
    let owner = gw.login(7);
    gw.grant_ownership(7, "f1");

    let (status, _) = gw
        .send(Method::DELETE, "/api/evoting/forms/f1", Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(gw
        .state
        .gate
        .permissions()
        .is_authorized(7, &ResourceId::form("f1"), Action::Own));
}

#[tokio::test]
async fn test_strict_routes_answer_401_without_session() {
    let node = start_mock_node(200, "{}").await;
    let gw = TestGateway::new(&node.url());

    let (status, text) = gw
        .send(Method::DELETE, "/api/evoting/forms/f1", None, None)
        .await;
    assert_eq!((status, text.as_str()), (StatusCode::UNAUTHORIZED, "Unauthenticated"));

    let (status, _) = gw
        .send(Method::PUT, "/api/evoting/services/shuffle/f1", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let stranger = gw.login(9);
    let (status, text) = gw
        .send(Method::PUT, "/api/evoting/services/shuffle/f1", Some(&stranger), None)
        .await;
    assert_eq!((status, text.as_str()), (StatusCode::BAD_REQUEST, "Unauthorized"));
    assert!(node.requests().is_empty());
}

#[tokio::test]
async fn test_election_creator_claims_ownership() {
    let gw = TestGateway::new("http://127.0.0.1:1");
    let operator = gw.login_as(5, Role::Operator);
    let voter = gw.login(6);

    let (status, _) = gw
        .send(
            Method::PUT,
            "/api/evoting/authorizations",
            Some(&voter),
            Some(json!({"FormID": "f5"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, text) = gw
        .send(
            Method::PUT,
            "/api/evoting/authorizations",
            Some(&operator),
            Some(json!({"FormID": "f5"})),
        )
        .await;
    assert_eq!((status, text.as_str()), (StatusCode::OK, "ok"));
    assert!(gw
        .state
        .gate
        .permissions()
        .is_authorized(5, &ResourceId::form("f5"), Action::Own));
}

#[tokio::test]
async fn test_unsaved_ownership_claim_is_not_granted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("permissions.json");
    let permissions = PermissionStore::new(Some(path.clone()));
    permissions.assign_role(5, Role::Operator).unwrap();
    std::fs::create_dir(path.with_extension("tmp")).unwrap();

    let gw = TestGateway::with_permissions("http://127.0.0.1:1", permissions);
    let operator = gw.login(5);

    let (status, _) = gw
        .send(
            Method::PUT,
            "/api/evoting/authorizations",
            Some(&operator),
            Some(json!({"FormID": "f5"})),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!gw
        .state
        .gate
        .permissions()
        .is_authorized(5, &ResourceId::form("f5"), Action::Own));
}

#[tokio::test]
async fn test_fallback_escapes_url() {
    let gw = TestGateway::new("http://127.0.0.1:1");
    let (status, text) = gw
        .send(Method::GET, "/unknown?q='onmouseover='x'", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        text,
        "not found http://localhost/unknown?q=&#39;onmouseover=&#39;x&#39;"
    );
}

#[tokio::test]
async fn test_middleware_stack_limits_body_and_tags_request() {
    let gw = TestGateway::with_config("http://127.0.0.1:1", |c| c.security.max_body_size = 16);
    let router = GatewayServer::new(&gw.config, gw.state.clone()).into_router();

    let body = json!({"NodeAddr": "node-1:2001", "Proxy": "http://proxy-1:9000"}).to_string();
    let response = router
        .clone()
        .oneshot(
            Request::post("/api/proxies")
                .header("content-type", "application/json")
                .header("content-length", body.len())
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let response = router
        .oneshot(
            Request::get("/api/config/proxy")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-42");
}
