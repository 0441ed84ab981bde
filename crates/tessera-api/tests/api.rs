use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use serde_json::{Value, json};
use tessera_api::{ApiServer, ApiState, ProblemDetails, SettingsListResponse};
use tessera_auth::{
    Identity, PermissionConfig, PermissionOverrides, PermissionResolver, SessionData,
    UnauthenticatedAction,
};
use tessera_config::{
    AppEnvironment, ConfigRegistry, ConfigStore, MASKED_VALUE, MemorySettingsRepository,
    NewSetting, SettingInput, SettingRecord, SettingType, ValueCodec,
};
use tessera_test_support::fixtures::{APP_SETTINGS, TEST_ENCRYPTION_KEY};
use tower::ServiceExt;

const FLASH: &str = "x-tessera-flash";

struct Harness {
    router: Router,
    store: ConfigStore,
    secret: SettingRecord,
}

async fn harness(overrides: PermissionOverrides) -> Result<Harness> {
    let records = APP_SETTINGS.iter().map(|fixture| NewSetting {
        module: Some(fixture.module.to_string()),
        key: fixture.key.to_string(),
        raw_value: fixture.value.to_string(),
        setting_type: SettingType::parse(fixture.setting_type),
        options: None,
    });
    let registry = ConfigRegistry::builder(Arc::new(MemorySettingsRepository::with_records(
        records,
    )))
    .codec(ValueCodec::from_secret(Some(TEST_ENCRYPTION_KEY)))
    .hook(Arc::new(AppEnvironment::new(false)))
    .build();
    let store = ConfigStore::new(Arc::new(registry));
    let secret = store
        .create(SettingInput::new("App.apiToken", "first-secret", "encrypted"))
        .await?;

    let config = PermissionConfig::merged(overrides)?;
    let state = ApiState::new(store.clone(), PermissionResolver::new(Arc::new(config)));
    Ok(Harness {
        router: ApiServer::new(state).into_router(),
        store,
        secret,
    })
}

fn staffed(action: UnauthenticatedAction) -> PermissionOverrides {
    PermissionOverrides {
        view_roles: Some(vec!["admin".into(), "manager".into()]),
        update_roles: Some(vec!["admin".into()]),
        bypass_roles: Some(vec!["superadmin".into()]),
        unauthenticated_action: Some(action),
        ..PermissionOverrides::default()
    }
}

fn as_role(role: &str) -> Identity {
    Identity::from(json!({"id": 1, "role": role}))
}

fn request(method: Method, uri: &str, identity: Option<Identity>, body: Body) -> Request<Body> {
    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "settings.test")
        .body(body)
        .expect("request");
    if let Some(identity) = identity {
        req.extensions_mut().insert(identity);
    }
    req
}

fn form(method: Method, uri: &str, identity: Option<Identity>, body: &str) -> Request<Body> {
    let mut req = request(method, uri, identity, Body::from(body.to_string()));
    req.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    req
}

fn json_body(method: Method, uri: &str, identity: Option<Identity>, body: &Value) -> Request<Body> {
    let mut req = request(method, uri, identity, Body::from(body.to_string()));
    req.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    req
}

fn flash(response: &Response) -> Option<&str> {
    response.headers().get(FLASH).and_then(|v| v.to_str().ok())
}

fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    serde_json::from_slice(&bytes).context("decode response body")
}

#[tokio::test]
async fn anonymous_requests_follow_the_configured_action() -> Result<()> {
    let redirect = harness(staffed(UnauthenticatedAction::Redirect)).await?;
    let response = redirect
        .router
        .oneshot(request(Method::GET, "/db-config", None, Body::empty()))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/users/login"));
    assert_eq!(
        flash(&response),
        Some("error:Please log in to access this page.")
    );

    let deny = harness(staffed(UnauthenticatedAction::Deny)).await?;
    let response = deny
        .router
        .oneshot(request(Method::GET, "/db-config", None, Body::empty()))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let problem: ProblemDetails = read_json(response).await?;
    assert_eq!(problem.detail.as_deref(), Some("Authentication required."));

    let allow = harness(staffed(UnauthenticatedAction::Allow)).await?;
    let response = allow
        .router
        .clone()
        .oneshot(request(Method::GET, "/db-config", None, Body::empty()))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let listing: SettingsListResponse = read_json(response).await?;
    assert!(!listing.can_update);

    let response = allow
        .router
        .oneshot(form(
            Method::POST,
            &format!("/db-config/{}", allow.secret.id),
            None,
            "value=changed",
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        flash(&response),
        Some("error:You do not have permission to update settings.")
    );
    Ok(())
}

#[tokio::test]
async fn roles_outside_view_list_are_forbidden() -> Result<()> {
    let harness = harness(staffed(UnauthenticatedAction::Deny)).await?;
    let response = harness
        .router
        .oneshot(request(
            Method::GET,
            "/db-config",
            Some(as_role("user")),
            Body::empty(),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let problem: ProblemDetails = read_json(response).await?;
    assert_eq!(
        problem.detail.as_deref(),
        Some("You do not have permission to access settings.")
    );
    Ok(())
}

#[tokio::test]
async fn index_lists_app_module_with_masked_secrets() -> Result<()> {
    let harness = harness(staffed(UnauthenticatedAction::Deny)).await?;
    let response = harness
        .router
        .clone()
        .oneshot(request(
            Method::GET,
            "/db-config?page=1&limit=10&id=2",
            Some(as_role("manager")),
            Body::empty(),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let listing: SettingsListResponse = read_json(response).await?;
    assert!(!listing.can_update);
    assert_eq!(listing.id, Some(2));
    assert_eq!(listing.total, 4);
    let token = listing
        .settings
        .iter()
        .find(|setting| setting.config_key == "App.apiToken")
        .context("token listed")?;
    assert_eq!(token.value, MASKED_VALUE);

    let response = harness
        .router
        .oneshot(request(
            Method::GET,
            "/db-config",
            Some(as_role("superadmin")),
            Body::empty(),
        ))
        .await?;
    let listing: SettingsListResponse = read_json(response).await?;
    assert!(listing.can_update);
    Ok(())
}

#[tokio::test]
async fn view_only_roles_cannot_update() -> Result<()> {
    let harness = harness(staffed(UnauthenticatedAction::Deny)).await?;
    let timezone = harness
        .store
        .list(&tessera_config::SettingsFilter::default())
        .await?
        .records
        .into_iter()
        .find(|record| record.key == "App.defaultTimezone")
        .context("timezone seeded")?;

    let response = harness
        .router
        .oneshot(form(
            Method::PATCH,
            &format!("/db-config/{}", timezone.id),
            Some(as_role("manager")),
            "value=Europe%2FBerlin",
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/db-config"));
    assert_eq!(
        flash(&response),
        Some("error:You do not have permission to update settings.")
    );
    assert_eq!(
        harness.store.get(timezone.id).await?.raw_value,
        "UTC",
        "value untouched"
    );
    Ok(())
}

#[tokio::test]
async fn admin_updates_are_saved_and_published() -> Result<()> {
    let harness = harness(staffed(UnauthenticatedAction::Deny)).await?;
    let timezone = harness
        .store
        .list(&tessera_config::SettingsFilter::default())
        .await?
        .records
        .into_iter()
        .find(|record| record.key == "App.defaultTimezone")
        .context("timezone seeded")?;

    let response = harness
        .router
        .oneshot(form(
            Method::POST,
            &format!("/db-config/{}", timezone.id),
            Some(as_role("admin")),
            "value=Europe%2FBerlin",
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(flash(&response), Some("success:The app setting has been saved."));
    assert_eq!(
        harness.store.registry().get_str("App.defaultTimezone").as_deref(),
        Some("Europe/Berlin")
    );
    assert_eq!(
        harness.store.registry().environment().timezone,
        "Europe/Berlin"
    );
    Ok(())
}

#[tokio::test]
async fn empty_encrypted_submission_keeps_ciphertext() -> Result<()> {
    let harness = harness(staffed(UnauthenticatedAction::Deny)).await?;
    let uri = format!("/db-config/{}", harness.secret.id);

    let response = harness
        .router
        .clone()
        .oneshot(form(Method::PUT, &uri, Some(as_role("admin")), "value="))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        flash(&response),
        Some("info:No changes made. Value was empty.")
    );
    assert_eq!(
        harness.store.get(harness.secret.id).await?.raw_value,
        harness.secret.raw_value
    );

    let response = harness
        .router
        .oneshot(json_body(
            Method::PATCH,
            &uri,
            Some(as_role("admin")),
            &json!({"value": "second-secret"}),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let stored = harness.store.get(harness.secret.id).await?;
    assert_ne!(stored.raw_value, harness.secret.raw_value);
    assert_ne!(stored.raw_value, "second-secret");
    assert_eq!(
        harness.store.registry().get_str("App.apiToken").as_deref(),
        Some("second-secret")
    );
    Ok(())
}

#[tokio::test]
async fn invalid_values_report_a_failed_save() -> Result<()> {
    let harness = harness(staffed(UnauthenticatedAction::Deny)).await?;
    let duration = harness
        .store
        .list(&tessera_config::SettingsFilter::default())
        .await?
        .records
        .into_iter()
        .find(|record| record.key == "Cache.default.duration")
        .context("duration seeded")?;

    let response = harness
        .router
        .oneshot(form(
            Method::POST,
            &format!("/db-config/{}", duration.id),
            Some(as_role("admin")),
            "value=soon",
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        flash(&response),
        Some("error:The app setting could not be saved. Please, try again.")
    );
    let problem: ProblemDetails = read_json(response).await?;
    let params = problem.invalid_params.context("invalid params")?;
    assert_eq!(params[0].pointer, "/value");
    assert_eq!(harness.store.registry().get_i64("Cache.default.duration"), Some(3600));
    Ok(())
}

#[tokio::test]
async fn blocked_keys_cannot_be_created() -> Result<()> {
    let harness = harness(staffed(UnauthenticatedAction::Deny)).await?;
    let response = harness
        .router
        .oneshot(json_body(
            Method::POST,
            "/db-config",
            Some(as_role("admin")),
            &json!({"config_key": "Security.salt", "value": "x", "type": "string"}),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = String::from_utf8(bytes.to_vec())?;
    assert!(body.contains("not allowed"), "{body}");
    assert!(harness.store.registry().get("Security.salt").is_none());
    Ok(())
}

#[tokio::test]
async fn create_and_delete_round_trip() -> Result<()> {
    let harness = harness(staffed(UnauthenticatedAction::Deny)).await?;
    let response = harness
        .router
        .clone()
        .oneshot(json_body(
            Method::POST,
            "/db-config",
            Some(as_role("admin")),
            &json!({"config_key": "Custom.greeting", "value": "hello", "type": "string"}),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = read_json(response).await?;
    let id = created["id"].as_i64().context("id")?;
    assert_eq!(created["module"], "App");
    assert_eq!(
        harness.store.registry().get_str("Custom.greeting").as_deref(),
        Some("hello")
    );

    let response = harness
        .router
        .clone()
        .oneshot(request(
            Method::DELETE,
            &format!("/db-config/{id}"),
            Some(as_role("admin")),
            Body::empty(),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(harness.store.registry().get("Custom.greeting").is_none());

    let response = harness
        .router
        .oneshot(request(
            Method::GET,
            &format!("/db-config/{id}"),
            Some(as_role("admin")),
            Body::empty(),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn session_identities_are_honoured() -> Result<()> {
    let mut overrides = staffed(UnauthenticatedAction::Deny);
    overrides.identity_resolver = Some(tessera_auth::IdentityResolver::Session);
    let harness = harness(overrides).await?;

    let mut req = request(Method::GET, "/db-config", None, Body::empty());
    req.extensions_mut()
        .insert(SessionData::authenticated(json!({"id": 3, "role": "admin"})));
    let response = harness.router.clone().oneshot(req).await?;
    assert_eq!(response.status(), StatusCode::OK);

    // An attribute identity is ignored when sessions are configured.
    let response = harness
        .router
        .oneshot(request(
            Method::GET,
            "/db-config",
            Some(as_role("admin")),
            Body::empty(),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn request_host_feeds_the_derived_base_url() -> Result<()> {
    let harness = harness(staffed(UnauthenticatedAction::Deny)).await?;
    let response = harness
        .router
        .oneshot(request(
            Method::GET,
            "/db-config",
            Some(as_role("admin")),
            Body::empty(),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    harness.store.registry().reload().await?;
    assert_eq!(
        harness.store.registry().environment().full_base_url.as_deref(),
        Some("http://settings.test")
    );
    Ok(())
}

#[tokio::test]
async fn responses_carry_a_request_id() -> Result<()> {
    let harness = harness(staffed(UnauthenticatedAction::Deny)).await?;
    let generated = harness
        .router
        .clone()
        .oneshot(request(Method::GET, "/db-config", None, Body::empty()))
        .await?;
    assert!(generated.headers().contains_key("x-request-id"));

    let mut supplied = request(Method::GET, "/db-config", None, Body::empty());
    supplied.headers_mut().insert(
        "x-request-id",
        header::HeaderValue::from_static("trace-42"),
    );
    let echoed = harness.router.oneshot(supplied).await?;
    assert_eq!(
        echoed
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("trace-42")
    );
    Ok(())
}
