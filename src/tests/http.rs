//! Router-level tests driving the API the way a game server and the panel would.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value as JsonValue};
use tower::util::ServiceExt;
use uuid::Uuid;

use crate::auth::{Role, SessionDoc};
use crate::database::Collection;
use crate::staff::Staff;
use crate::{server, Result, State};

/// The tenant every test runs against.
const TENANT: &str = "lobby";

/// The tenant's API key.
const API_KEY: &str = "test-api-key";

/// The panel host of the tenant.
const PANEL_HOST: &str = "lobby.warden.test";

/// A logged-in moderator session id.
const SESSION_ID: &str = "session-1";

/// Boots a state with one tenant, one moderator and one session.
async fn test_state() -> Result<State> {
	let state = State::for_tests().await?;

	state.tenants.register(TENANT, API_KEY).await?;

	let db = state.tenants.datastore(TENANT).await?;

	db.upsert_staff(&Staff {
		username: "modster".to_owned(),
		email: None,
		role: Role::Admin,
		assigned_minecraft_uuid: None,
		assigned_minecraft_username: Some("Modster".to_owned()),
		subscribed_tickets: Vec::new(),
	})
	.await?;

	db.upsert(
		Collection::Sessions,
		SESSION_ID,
		&SessionDoc {
			username: "modster".to_owned(),
			expires: None,
		},
	)
	.await?;

	Ok(state)
}

/// Sends one request to the router and returns `(status, body)`.
async fn call(
	state: &State,
	method: Method,
	uri: &str,
	headers: &[(header::HeaderName, &str)],
	body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
	let mut request = Request::builder().method(method).uri(uri);

	for (name, value) in headers {
		request = request.header(name, *value);
	}

	let request = match body {
		Some(body) => request
			.header(header::CONTENT_TYPE, "application/json")
			.body(Body::from(body.to_string())),
		None => request.body(Body::empty()),
	}
	.expect("request builds");

	let response = server(state.clone())
		.oneshot(request)
		.await
		.expect("infallible");

	let status = response.status();
	let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("body reads");

	let body = if bytes.is_empty() {
		JsonValue::Null
	} else {
		serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
	};

	(status, body)
}

/// Shorthand for a key-authenticated Minecraft-surface request.
async fn minecraft(
	state: &State,
	method: Method,
	path: &str,
	body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
	let headers = [(header::HeaderName::from_static("x-api-key"), API_KEY)];

	call(state, method, &format!("/api/minecraft{path}"), &headers, body).await
}

/// Shorthand for a session-authenticated panel-surface request.
async fn panel(
	state: &State,
	method: Method,
	path: &str,
	body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
	let cookie = format!("warden_session={SESSION_ID}");
	let headers = [
		(header::HOST, PANEL_HOST),
		(header::COOKIE, cookie.as_str()),
	];

	call(state, method, &format!("/api/panel{path}"), &headers, body).await
}

#[tokio::test]
async fn the_openapi_document_is_served_with_permissive_cors() -> Result<()> {
	let state = test_state().await?;

	let request = Request::builder()
		.method(Method::GET)
		.uri("/docs/openapi.json")
		.header(header::ORIGIN, "https://tools.example.com")
		.body(Body::empty())
		.expect("request builds");

	let response = server(state).oneshot(request).await.expect("infallible");

	assert_eq!(response.status(), StatusCode::OK);

	// Anyone may fetch the document cross-origin.
	assert_eq!(
		response
			.headers()
			.get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
			.and_then(|value| value.to_str().ok()),
		Some("*")
	);

	let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("body reads");
	let document: JsonValue = serde_json::from_slice(&bytes).expect("valid JSON");

	assert!(document.pointer("/paths/~1sync").is_some());
	assert!(document.pointer("/paths/~1appeals").is_some());

	Ok(())
}

#[tokio::test]
async fn minecraft_routes_require_an_api_key() -> Result<()> {
	let state = test_state().await?;

	let (status, body) = call(
		&state,
		Method::POST,
		"/api/minecraft/sync",
		&[],
		Some(json!({ "onlinePlayers": [] })),
	)
	.await;

	assert_eq!(status, StatusCode::UNAUTHORIZED);
	assert_eq!(body.get("status").and_then(JsonValue::as_u64), Some(401));

	let (status, _) = call(
		&state,
		Method::POST,
		"/api/minecraft/sync",
		&[(header::HeaderName::from_static("x-api-key"), "wrong-key")],
		Some(json!({ "onlinePlayers": [] })),
	)
	.await;

	assert_eq!(status, StatusCode::UNAUTHORIZED);

	Ok(())
}

#[tokio::test]
async fn ban_lifecycle_over_the_wire() -> Result<()> {
	let state = test_state().await?;
	let player = Uuid::new_v4();

	// Login: no punishments yet.
	let (status, body) = minecraft(
		&state,
		Method::POST,
		"/player/login",
		Some(json!({
			"minecraftUuid": player,
			"username": "griefer",
			"ipAddress": "203.0.113.7",
			"ipInfo": { "country": "DE", "proxy": false, "hosting": false },
		})),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(
		body.get("activePunishments").and_then(JsonValue::as_array).map(Vec::len),
		Some(0)
	);

	// Staff issues a one-hour ban.
	let (status, body) = minecraft(
		&state,
		Method::POST,
		"/punishment/create",
		Some(json!({
			"minecraftUuid": player,
			"issuerName": "Modster",
			"type": "ban",
			"reason": "grief",
			"duration": 3_600_000_i64,
		})),
	)
	.await;

	assert_eq!(status, StatusCode::CREATED);

	let ban_id = body
		.pointer("/punishment/id")
		.and_then(JsonValue::as_str)
		.expect("created ban has an id")
		.to_owned();

	// The next login carries the unstarted ban.
	let (_, body) = minecraft(
		&state,
		Method::POST,
		"/player/login",
		Some(json!({
			"minecraftUuid": player,
			"username": "griefer",
			"ipAddress": "203.0.113.7",
			"ipInfo": {},
		})),
	)
	.await;

	let sent = body
		.get("activePunishments")
		.and_then(JsonValue::as_array)
		.expect("active punishments present");

	assert_eq!(sent.len(), 1);
	assert_eq!(
		sent.first().and_then(|punishment| punishment.get("type")).and_then(JsonValue::as_str),
		Some("ban")
	);

	// The game server acknowledges execution; the sync window picks it up as started.
	let before_ack = chrono::Utc::now().timestamp_millis() - 1_000;

	let (status, _) = minecraft(
		&state,
		Method::POST,
		"/punishment/acknowledge",
		Some(json!({
			"punishmentId": ban_id,
			"playerUuid": player,
			"success": true,
		})),
	)
	.await;

	assert_eq!(status, StatusCode::OK);

	let (status, body) = minecraft(
		&state,
		Method::POST,
		"/sync",
		Some(json!({
			"onlinePlayers": [],
			"lastSyncTimestamp": before_ack,
		})),
	)
	.await;

	assert_eq!(status, StatusCode::OK);

	let started = body
		.get("recentlyStartedPunishments")
		.and_then(JsonValue::as_array)
		.expect("recently started present");

	assert!(started
		.iter()
		.any(|entry| entry.get("id").and_then(JsonValue::as_str) == Some(ban_id.as_str())));

	// A pardon lands in the next sync's modification feed...
	let before_pardon = chrono::Utc::now().timestamp_millis() - 1_000;

	let (status, _) = minecraft(
		&state,
		Method::POST,
		&format!("/punishment/{ban_id}/pardon"),
		Some(json!({
			"issuerName": "Modster",
			"expectedType": "ban",
			"reason": "resolved",
		})),
	)
	.await;

	assert_eq!(status, StatusCode::OK);

	let (_, body) = minecraft(
		&state,
		Method::POST,
		"/sync",
		Some(json!({
			"onlinePlayers": [],
			"lastSyncTimestamp": before_pardon,
		})),
	)
	.await;

	let modified = body
		.get("recentlyModifiedPunishments")
		.and_then(JsonValue::as_array)
		.expect("recently modified present");

	let entry = modified
		.iter()
		.find(|entry| {
			entry.get("punishmentId").and_then(JsonValue::as_str) == Some(ban_id.as_str())
		})
		.expect("pardoned ban is in the feed");

	assert_eq!(
		entry.get("effectiveActive").and_then(JsonValue::as_bool),
		Some(false)
	);

	// ... and the ban is gone from logins.
	let (_, body) = minecraft(
		&state,
		Method::POST,
		"/player/login",
		Some(json!({
			"minecraftUuid": player,
			"username": "griefer",
			"ipAddress": "203.0.113.7",
			"ipInfo": {},
		})),
	)
	.await;

	assert_eq!(
		body.get("activePunishments").and_then(JsonValue::as_array).map(Vec::len),
		Some(0)
	);

	// Pardoning twice conflicts.
	let (status, _) = minecraft(
		&state,
		Method::POST,
		&format!("/punishment/{ban_id}/pardon"),
		Some(json!({ "issuerName": "Modster" })),
	)
	.await;

	assert_eq!(status, StatusCode::CONFLICT);

	Ok(())
}

#[tokio::test]
async fn appeal_flow_over_the_wire() -> Result<()> {
	let state = test_state().await?;
	let player = Uuid::new_v4();

	minecraft(
		&state,
		Method::POST,
		"/player/login",
		Some(json!({
			"minecraftUuid": player,
			"username": "appellant",
			"ipAddress": "203.0.113.9",
			"ipInfo": {},
		})),
	)
	.await;

	let (_, body) = minecraft(
		&state,
		Method::POST,
		"/punishment/create",
		Some(json!({
			"minecraftUuid": player,
			"issuerName": "Modster",
			"type": "ban",
			"reason": "cheating",
		})),
	)
	.await;

	let ban_id = body
		.pointer("/punishment/id")
		.and_then(JsonValue::as_str)
		.expect("created ban has an id")
		.to_owned();

	// The player files an appeal through the panel (no session required).
	let appeal = json!({
		"punishmentId": ban_id,
		"playerUuid": player,
		"email": "appellant@example.com",
		"reason": "false positive",
	});

	let (status, body) = call(
		&state,
		Method::POST,
		"/api/panel/appeals",
		&[(header::HOST, PANEL_HOST)],
		Some(appeal.clone()),
	)
	.await;

	assert_eq!(status, StatusCode::CREATED);

	let ticket_id = body
		.get("id")
		.and_then(JsonValue::as_str)
		.expect("created appeal has an id")
		.to_owned();

	assert!(ticket_id.starts_with("APPEAL-"));

	// A second appeal for the same punishment is rejected.
	let (status, _) = call(
		&state,
		Method::POST,
		"/api/panel/appeals",
		&[(header::HOST, PANEL_HOST)],
		Some(appeal),
	)
	.await;

	assert_eq!(status, StatusCode::CONFLICT);

	// Staff approves the appeal; the punishment dies with it.
	let (status, _) = panel(
		&state,
		Method::PATCH,
		&format!("/appeals/{ticket_id}/status"),
		Some(json!({
			"status": "Closed",
			"resolution": "Approved",
		})),
	)
	.await;

	assert_eq!(status, StatusCode::OK);

	let (_, body) = minecraft(
		&state,
		Method::GET,
		&format!("/player?minecraftUuid={player}"),
		None,
	)
	.await;

	let punishment = body
		.get("punishments")
		.and_then(JsonValue::as_array)
		.and_then(|punishments| {
			punishments.iter().find(|punishment| {
				punishment.get("id").and_then(JsonValue::as_str)
					== Some(ban_id.as_str())
			})
		})
		.expect("the ban is on the profile");

	assert_eq!(
		punishment.pointer("/data/active").and_then(JsonValue::as_bool),
		Some(false)
	);
	assert_eq!(
		punishment
			.pointer("/data/appealTicketId")
			.and_then(JsonValue::as_str),
		Some(ticket_id.as_str())
	);

	// The ticket now carries the punishment reference on the player side too.
	let (status, body) = panel(&state, Method::GET, &format!("/appeals/{ticket_id}"), None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(
		body.pointer("/data/resolution").and_then(JsonValue::as_str),
		Some("Approved")
	);

	Ok(())
}
