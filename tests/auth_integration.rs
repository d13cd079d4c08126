use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::net::TcpListener;
use std::time::Duration;
use user_auth::auth::{CredentialHasher, RoleSet, ADMIN_ROLE};
use user_auth::configuration::{AuthSettings, DatabaseSettings};
use user_auth::startup::{get_connection_pool, migrate, run};
use user_auth::users::UserRepository;

pub struct TestApp {
    pub address: String,
    pub db_pool: SqlitePool,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn register(&self, username: &str, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(&format!("{}/auth/register", &self.address))
            .json(&json!({
                "username": username,
                "email": email,
                "password": password
            }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(&format!("{}/auth/login", &self.address))
            .json(&json!({
                "email": email,
                "password": password
            }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(&format!("{}{}", &self.address, path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn disable(&self, token: &str, email: &str) -> reqwest::Response {
        self.client
            .patch(&format!("{}/auth/disable", &self.address))
            .bearer_auth(token)
            .json(&json!({ "email": email }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Register a user and return its id and auth token
    pub async fn registered_user(&self, username: &str, email: &str, password: &str) -> (i64, String) {
        let response = self.register(username, email, password).await;
        assert_eq!(201, response.status().as_u16());
        let body: Value = response.json().await.expect("Failed to parse response");
        (
            body["id"].as_i64().expect("id is an integer"),
            body["auth_token"].as_str().expect("auth_token is a string").to_string(),
        )
    }

    pub async fn grant_admin(&self, user_id: i64) {
        UserRepository::new(self.db_pool.clone(), CredentialHasher::new(4 /* bcrypt minimum cost */))
            .set_privileges(user_id, &RoleSet::new([ADMIN_ROLE]), true)
            .await
            .expect("Failed to grant admin role");
    }
}

async fn spawn_app(min_refresh_interval: i64) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // One connection per in-memory database keeps every request on the same data
    let connection_pool = get_connection_pool(&DatabaseSettings {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    })
    .await
    .expect("Failed to open in-memory database.");
    migrate(&connection_pool)
        .await
        .expect("Failed to migrate the database.");

    let auth_config = AuthSettings {
        secret: "test-secret-key-at-least-32-characters-long".to_string(),
        issuer: "test".to_string(),
        access_token_lifespan: 900,
        refresh_token_lifespan: 3600,
        min_refresh_interval,
        hash_cost: 4 /* bcrypt minimum cost */,
        bootstrap_admin: None,
    };
    let server = run(listener, connection_pool.clone(), auth_config)
        .expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        db_pool: connection_pool,
        client: reqwest::Client::new(),
    }
}

// --- Registration Tests ---

#[tokio::test]
async fn register_returns_201_for_valid_credentials() {
    let app = spawn_app(900).await;

    let response = app.register("test", "test@test.com", "test").await;

    assert_eq!(201, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["username"], "test");
    assert_eq!(body["email"], "test@test.com");
    assert_eq!(body["admin"], false);
    assert_eq!(body["is_active"], true);
    assert!(body["auth_token"].is_string());
    assert!(body["refresh_token"].is_string());
    assert!(body.get("password").is_none());

    // The token resolves back to the new user
    let token = body["auth_token"].as_str().unwrap();
    let status = app.get_with_token("/auth/status", token).await;
    assert_eq!(200, status.status().as_u16());
    let status: Value = status.json().await.unwrap();
    assert_eq!(status["id"], body["id"]);
    assert_eq!(status["username"], "test");
}

#[tokio::test]
async fn register_stores_hashed_password() {
    let app = spawn_app(900).await;
    app.registered_user("test", "test@test.com", "test").await;

    let stored: String = sqlx::query_scalar("SELECT password FROM users WHERE email = 'test@test.com'")
        .fetch_one(&app.db_pool)
        .await
        .expect("Failed to fetch created user");

    assert_ne!(stored, "test");
    assert!(CredentialHasher::new(4 /* bcrypt minimum cost */).verify("test", &stored).await);
}

#[tokio::test]
async fn register_returns_409_for_duplicate_email() {
    let app = spawn_app(900).await;
    app.registered_user("test", "test@test.com", "test").await;

    let response = app.register("test_me", "test@test.com", "test").await;

    assert_eq!(409, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status_code"], 409);
    assert_eq!(body["error"], "DuplicateEntityError");
    assert!(body["message"].as_str().unwrap().contains("test@test.com"));
}

#[tokio::test]
async fn register_returns_409_for_duplicate_username() {
    let app = spawn_app(900).await;
    app.registered_user("test", "test@test.com", "test").await;

    let response = app.register("test", "test@test.com2", "test").await;

    assert_eq!(409, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "DuplicateEntityError");
    assert!(body["message"].as_str().unwrap().contains("test"));
    assert!(body["message"].as_str().unwrap().starts_with("Username"));
}

#[tokio::test]
async fn register_returns_400_for_missing_fields() {
    let app = spawn_app(900).await;

    let test_cases = vec![
        (json!({"email": "test@test.com", "password": "test"}), "missing username"),
        (json!({"username": "test", "password": "test"}), "missing email"),
        (json!({"username": "test", "email": "test@test.com"}), "missing password"),
        (json!({}), "missing all fields"),
    ];

    for (body, reason) in test_cases {
        let response = app
            .client
            .post(&format!("{}/auth/register", &app.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(400, response.status().as_u16(), "Should reject request: {}", reason);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "ValidationError");
        assert!(body["message"]
            .as_str()
            .unwrap()
            .starts_with("Input payload validation failed"));
    }
}

#[tokio::test]
async fn register_returns_400_for_invalid_input() {
    let app = spawn_app(900).await;

    let test_cases = vec![
        ("test", "notanemail", "test", "invalid email"),
        ("", "test@test.com", "test", "empty username"),
        ("test", "test@test.com", "", "empty password"),
    ];

    for (username, email, password, reason) in test_cases {
        let response = app.register(username, email, password).await;
        assert_eq!(400, response.status().as_u16(), "Should reject request: {}", reason);
    }
}

#[tokio::test]
async fn register_rejects_out_of_range_lifespan() {
    let app = spawn_app(900).await;

    let response = app
        .client
        .post(&format!("{}/auth/register", &app.address))
        .json(&json!({
            "username": "test",
            "email": "test@test.com",
            "password": "test",
            "access_lifespan": -5
        }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
}

// --- Login Tests ---

#[tokio::test]
async fn login_returns_200_for_valid_credentials() {
    let app = spawn_app(900).await;
    app.registered_user("test", "test@test.com", "test").await;

    let response = app.login("test@test.com", "test").await;

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["email"], "test@test.com");
    assert!(body["auth_token"].is_string());
    assert!(body["refresh_token"].is_string());
}

#[tokio::test]
async fn login_returns_401_for_unknown_email_or_wrong_password() {
    let app = spawn_app(900).await;
    app.registered_user("test", "test@test.com", "test").await;

    for (email, password) in [("nobody@test.com", "test"), ("test@test.com", "wrong")] {
        let response = app.login(email, password).await;
        assert_eq!(401, response.status().as_u16());
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "AuthenticationError");
    }
}

#[tokio::test]
async fn login_returns_400_for_missing_fields() {
    let app = spawn_app(900).await;

    let response = app.login("", "").await;
    assert_eq!(400, response.status().as_u16());

    let response = app
        .client
        .post(&format!("{}/auth/login", &app.address))
        .json(&json!({"email": "test@test.com"}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(400, response.status().as_u16());
}

// --- Logout and Status Tests ---

#[tokio::test]
async fn logout_returns_success_message() {
    let app = spawn_app(900).await;
    let (_, token) = app.registered_user("test", "test@test.com", "test").await;

    let response = app.get_with_token("/auth/logout", &token).await;

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Successfully logged out.");
}

#[tokio::test]
async fn logout_rejects_invalid_token() {
    let app = spawn_app(900).await;

    let response = app.get_with_token("/auth/logout", "invalid").await;

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "InvalidTokenHeader");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Not enough segments"));
}

#[tokio::test]
async fn protected_routes_require_authorization_header() {
    let app = spawn_app(900).await;

    for path in ["/auth/status", "/auth/logout", "/users/"] {
        let response = app
            .client
            .get(&format!("{}{}", &app.address, path))
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(401, response.status().as_u16(), "{} should be protected", path);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "MissingTokenHeader");
    }
}

#[tokio::test]
async fn refresh_token_cannot_access_protected_routes() {
    let app = spawn_app(900).await;
    let response = app.register("test", "test@test.com", "test").await;
    let body: Value = response.json().await.unwrap();
    let refresh_token = body["refresh_token"].as_str().unwrap();

    let response = app.get_with_token("/auth/status", refresh_token).await;

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "MisusedRefreshToken");
}

// --- Refresh Tests ---

#[tokio::test]
async fn refresh_right_after_login_is_too_early() {
    let app = spawn_app(900).await;
    let (_, token) = app.registered_user("test", "test@test.com", "test").await;

    let response = app.get_with_token("/auth/refresh", &token).await;

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status_code"], 401);
    assert_eq!(body["error"], "EarlyRefreshError");
}

#[tokio::test]
async fn refresh_after_interval_returns_new_token() {
    let app = spawn_app(1).await;
    let (_, token) = app.registered_user("test", "test@test.com", "test").await;

    tokio::time::sleep(Duration::from_secs(2)).await;
    let response = app.get_with_token("/auth/refresh", &token).await;

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    let new_token = body["auth_token"].as_str().unwrap();
    assert_ne!(new_token, token);

    let status = app.get_with_token("/auth/status", new_token).await;
    assert_eq!(200, status.status().as_u16());
}

#[tokio::test]
async fn refresh_rejects_garbage_token() {
    let app = spawn_app(1).await;

    let response = app.get_with_token("/auth/refresh", "not.a.token").await;

    assert_eq!(401, response.status().as_u16());
}

// --- Disable Tests ---

#[tokio::test]
async fn disable_requires_admin_role() {
    let app = spawn_app(900).await;
    let (_, token) = app.registered_user("test", "test@test.com", "test").await;
    app.registered_user("test2", "test2@test.com", "test2").await;

    let response = app.disable(&token, "test2@test.com").await;

    assert_eq!(403, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "MissingRoleError");
    assert!(body["message"].as_str().unwrap().contains("admin"));
}

#[tokio::test]
async fn disabled_user_is_locked_out() {
    let app = spawn_app(900).await;
    let (admin_id, admin_token) = app.registered_user("admin", "admin@test.com", "admin").await;
    app.grant_admin(admin_id).await;
    let (_, target_token) = app.registered_user("test", "test@test.com", "test").await;

    let response = app.disable(&admin_token, "test@test.com").await;
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "disabled user test");

    // Login with the right password is refused
    let response = app.login("test@test.com", "test").await;
    assert_eq!(403, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "InactiveUserError");

    // So is the token issued before the account was disabled
    let response = app.get_with_token("/auth/status", &target_token).await;
    assert_eq!(403, response.status().as_u16());

    // Logout keeps working until the token expires
    let response = app.get_with_token("/auth/logout", &target_token).await;
    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn disable_unknown_email_returns_404() {
    let app = spawn_app(900).await;
    let (admin_id, admin_token) = app.registered_user("admin", "admin@test.com", "admin").await;
    app.grant_admin(admin_id).await;

    let response = app.disable(&admin_token, "ghost@test.com").await;

    assert_eq!(404, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "NotFoundError");
}
