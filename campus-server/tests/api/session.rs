use campus_core::auth::Role;
use campus_server::api::v1::session::{Account, Login, Logout, Refresh, Register, TokenPair};

use crate::{TestApp, TestUser, TEST_PASSWORD};

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn register_creates_an_administrator_account() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Anonymous).await;

    let account: Account = client
        .post(
            "/api/v1/register",
            Register {
                email: "head@campus.test".to_string(),
                password: "a-long-enough-password".to_string(),
            },
        )
        .await
        .expect("failed to register");

    assert_eq!("head@campus.test", account.email);
    assert_eq!(Role::Administrator, account.role);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn register_rejects_a_malformed_email() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Anonymous).await;

    let (status, body) = client
        .post_raw(
            "/api/v1/register",
            Register {
                email: "not-an-email".to_string(),
                password: "a-long-enough-password".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(400, status);
    assert_eq!("failure", body["result"]);
    assert_eq!("email address is malformed", body["message"]);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn register_rejects_a_short_password() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Anonymous).await;

    let (status, body) = client
        .post_raw(
            "/api/v1/register",
            Register {
                email: "head@campus.test".to_string(),
                password: "2short".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(400, status);
    assert_eq!("password must be at least 8 characters", body["message"]);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn register_rejects_a_duplicate_email() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Anonymous).await;

    let request = Register {
        email: "head@campus.test".to_string(),
        password: "a-long-enough-password".to_string(),
    };
    let _: Account = client.post("/api/v1/register", &request).await.unwrap();

    let (status, _) = client.post_raw("/api/v1/register", &request).await.unwrap();

    assert_eq!(409, status);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn login_issues_a_usable_token_pair() {
    let (app, client) = TestApp::start_and_connect(TestUser::Anonymous).await;

    let pair: TokenPair = client
        .post(
            "/api/v1/login",
            Login {
                email: "admin@campus.test".to_string(),
                password: TEST_PASSWORD.to_string(),
            },
        )
        .await
        .expect("failed to log in");

    assert_eq!("Bearer", pair.token_type);
    assert_eq!(3600, pair.expires_in);
    assert_eq!(Role::Administrator, pair.role);

    let authed = app.connect_with_access_token(&pair.access_token);
    let identity: serde_json::Value = authed.get("/api/v1/identity").await.unwrap();
    assert_eq!("admin@campus.test", identity["email"]);
    assert_eq!("ADMINISTRATOR", identity["role"]);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn any_login_mismatch_reads_invalid_credentials() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Anonymous).await;

    let (status, body) = client
        .post_raw(
            "/api/v1/login",
            Login {
                email: "admin@campus.test".to_string(),
                password: "wrong-password-here".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(400, status);
    assert_eq!("Invalid Credentials", body["message"]);

    let (status, body) = client
        .post_raw(
            "/api/v1/login",
            Login {
                email: "nobody@campus.test".to_string(),
                password: TEST_PASSWORD.to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(400, status);
    assert_eq!("Invalid Credentials", body["message"]);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn refresh_rotates_the_refresh_token() {
    let (app, client) = TestApp::start_and_connect(TestUser::Anonymous).await;

    let pair: TokenPair = client
        .post(
            "/api/v1/login",
            Login {
                email: "admin@campus.test".to_string(),
                password: TEST_PASSWORD.to_string(),
            },
        )
        .await
        .unwrap();

    let rotated: TokenPair = client
        .post(
            "/api/v1/session/refresh",
            Refresh {
                refresh_token: pair.refresh_token.clone(),
            },
        )
        .await
        .expect("failed to refresh session");

    let authed = app.connect_with_access_token(&rotated.access_token);
    let identity: serde_json::Value = authed.get("/api/v1/identity").await.unwrap();
    assert_eq!("admin@campus.test", identity["email"]);

    // the old refresh token was revoked by the rotation
    let (status, _) = client
        .post_raw(
            "/api/v1/session/refresh",
            Refresh {
                refresh_token: pair.refresh_token,
            },
        )
        .await
        .unwrap();
    assert_eq!(401, status);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn logout_revokes_the_refresh_token() {
    let (app, client) = TestApp::start_and_connect(TestUser::Anonymous).await;

    let pair: TokenPair = client
        .post(
            "/api/v1/login",
            Login {
                email: "admin@campus.test".to_string(),
                password: TEST_PASSWORD.to_string(),
            },
        )
        .await
        .unwrap();

    let authed = app.connect_with_access_token(&pair.access_token);
    let (status, _) = authed
        .post_raw(
            "/api/v1/session/logout",
            Logout {
                refresh_token: pair.refresh_token.clone(),
            },
        )
        .await
        .unwrap();
    assert_eq!(200, status);

    let (status, _) = client
        .post_raw(
            "/api/v1/session/refresh",
            Refresh {
                refresh_token: pair.refresh_token.clone(),
            },
        )
        .await
        .unwrap();
    assert_eq!(401, status);

    // revoking twice is reported, not silently accepted
    let (status, body) = authed
        .post_raw(
            "/api/v1/session/logout",
            Logout {
                refresh_token: pair.refresh_token,
            },
        )
        .await
        .unwrap();
    assert_eq!(400, status);
    assert_eq!("refresh token is not active", body["message"]);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn anonymous_requests_to_protected_routes_are_rejected() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Anonymous).await;

    let (status, body) = client.get_raw("/api/v1/identity").await.unwrap();

    assert_eq!(401, status);
    assert_eq!("failure", body["result"]);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn a_token_for_an_unknown_user_is_rejected() {
    let (_app, client) = TestApp::start_and_connect(TestUser::Stranger).await;

    let (status, _) = client.get_raw("/api/v1/identity").await.unwrap();

    assert_eq!(401, status);
}
