mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::{
    body_json, cookie_value, is_removal, json_request, location, set_cookie, with_cookie, FakeBackend, RefreshMode,
    TestApp, FAKE_EMAIL, FAKE_PASSWORD, FAKE_USER_ID, LOGIN_URL, UNREACHABLE_BACKEND,
};

#[tokio::test]
async fn login_opens_both_sessions() -> Result<()> {
    let backend = FakeBackend::spawn(RefreshMode::Succeed).await?;
    let app = TestApp::with_backend(&backend.base_url);
    app.seed(
        "profiles",
        vec![json!({ "id": FAKE_USER_ID, "name": "Anna Beispiel", "is_fraction_leadership": true, "wahlkreis": "WK 75" })],
    )
    .await;

    let res = app
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": FAKE_EMAIL, "password": FAKE_PASSWORD }),
        ))
        .await?;

    assert_eq!(res.status(), StatusCode::OK);
    let session = set_cookie(&res, "wk_session").expect("primary session cookie");
    assert!(set_cookie(&res, "sb-access-token").is_some());
    assert_eq!(
        set_cookie(&res, "sb-refresh-token").map(|c| cookie_value(&c)).as_deref(),
        Some("rotated-refresh-token")
    );

    let body = body_json(res).await?;
    assert_eq!(body["data"]["sub"], FAKE_USER_ID);
    assert_eq!(body["data"]["name"], "Anna Beispiel");
    assert_eq!(body["data"]["is_fraction_leadership"], true);

    // The issued token opens protected pages
    let cookie = app.session_cookie(&cookie_value(&session));
    let res = app.send(with_cookie("/api/session", "GET", &cookie)).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await?;
    assert_eq!(body["data"]["wahlkreis"], "WK 75");
    Ok(())
}

#[tokio::test]
async fn login_without_profile_row_uses_email() -> Result<()> {
    let backend = FakeBackend::spawn(RefreshMode::Succeed).await?;
    let app = TestApp::with_backend(&backend.base_url);

    let res = app
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": FAKE_EMAIL, "password": FAKE_PASSWORD }),
        ))
        .await?;

    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await?;
    assert_eq!(body["data"]["name"], FAKE_EMAIL);
    assert_eq!(body["data"]["is_fraction_leadership"], false);
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_unauthorized() -> Result<()> {
    let backend = FakeBackend::spawn(RefreshMode::Succeed).await?;
    let app = TestApp::with_backend(&backend.base_url);

    let res = app
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": FAKE_EMAIL, "password": "wrong" }),
        ))
        .await?;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie(&res, "wk_session").is_none());
    let body = body_json(res).await?;
    assert_eq!(body["error"], "Invalid credentials");
    Ok(())
}

#[tokio::test]
async fn unreachable_auth_service_is_a_generic_server_error() -> Result<()> {
    let app = TestApp::with_backend(UNREACHABLE_BACKEND);

    let res = app
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": FAKE_EMAIL, "password": FAKE_PASSWORD }),
        ))
        .await?;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookie(&res, "wk_session").is_none());
    let body = body_json(res).await?;
    assert_eq!(body["code"], "INTERNAL_SERVER_ERROR");
    assert_eq!(body["error"], "An error occurred while processing your request");
    Ok(())
}

#[tokio::test]
async fn blank_credentials_are_a_bad_request() -> Result<()> {
    let backend = FakeBackend::spawn(RefreshMode::Succeed).await?;
    let app = TestApp::with_backend(&backend.base_url);

    let res = app
        .send(json_request("POST", "/api/auth/login", None, json!({ "email": "  ", "password": "" })))
        .await?;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn logout_clears_both_sessions_and_revokes_backend_session() -> Result<()> {
    let backend = FakeBackend::spawn(RefreshMode::Succeed).await?;
    let app = TestApp::with_backend(&backend.base_url);
    let cookie = format!(
        "{}; sb-access-token={}; sb-refresh-token=r1",
        app.session_cookie(&app.token_for("u1")),
        common::backend_token("u1", 3600)
    );

    let res = app.send(with_cookie("/api/auth/logout", "POST", &cookie)).await?;

    assert_eq!(res.status(), StatusCode::OK);
    for name in ["wk_session", "sb-access-token", "sb-refresh-token"] {
        let header = set_cookie(&res, name).unwrap_or_else(|| panic!("{} removal missing", name));
        assert!(is_removal(&header), "{}", header);
    }
    assert_eq!(backend.state.logout_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn logout_page_redirects_to_login() -> Result<()> {
    let backend = FakeBackend::spawn(RefreshMode::Succeed).await?;
    let app = TestApp::with_backend(&backend.base_url);
    let cookie = app.session_cookie(&app.token_for("u1"));

    let res = app.send(with_cookie("/abmelden", "GET", &cookie)).await?;

    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(location(&res).as_deref(), Some(LOGIN_URL));
    let session = set_cookie(&res, "wk_session").expect("session removal");
    assert!(is_removal(&session));
    Ok(())
}

#[tokio::test]
async fn logout_wins_over_a_refreshed_backend_session() -> Result<()> {
    let backend = FakeBackend::spawn(RefreshMode::Succeed).await?;
    let app = TestApp::with_backend(&backend.base_url);
    let cookie = format!(
        "{}; sb-access-token={}; sb-refresh-token=r1",
        app.session_cookie(&app.token_for("u1")),
        common::backend_token("u1", -120)
    );

    let res = app.send(with_cookie("/api/auth/logout", "POST", &cookie)).await?;

    assert_eq!(res.status(), StatusCode::OK);
    // The bridge refreshed the backend session, but the handler's removal stands
    assert_eq!(backend.state.refresh_calls(), 1);
    let access: Vec<_> = common::set_cookies(&res)
        .into_iter()
        .filter(|c| c.starts_with("sb-access-token="))
        .collect();
    assert_eq!(access.len(), 1);
    assert!(is_removal(&access[0]));
    Ok(())
}
