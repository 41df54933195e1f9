use axum::headers::HeaderMap;
use axum::http::HeaderValue;
use lazy_static::lazy_static;
use openssl::rsa::Rsa;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{Connection, PgConnection};
use std::{
    error::Error,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener},
    path::PathBuf,
    sync::Once,
    time::Duration,
};
use thiserror::Error;
use tracing::Level;
use url::Url;
use uuid::Uuid;

use campus_core::auth::Role;
use campus_core::jwks::Jwks;
use campus_core::jwt::{DEFAULT_AUDIENCE, DEFAULT_ISSUER};
use campus_core::{jwt, JWKS_ENV, SERVER_CERTIFICATE_ENV};

use campus_server::{
    app::{App, Args},
    database::Database,
    shortid::ShortId,
};

const BASE_DATABASE_URL: &str = "postgres://127.0.0.1:5432";

const ADMINISTRATOR_UUID: &str = "0b55f545-bd95-4a2f-a483-bb0e72f7ac19";
const TEACHER_UUID: &str = "7fd4f4d3-7a0b-4b8c-9ff0-3a9cbd52a41f";
const PARENT_UUID: &str = "c3c07a81-12a6-4f7a-9f4b-0c557a1808f3";
const STRANGER_UUID: &str = "9f0e5a92-0243-4b6e-a1ec-a53c0d6fa6cd";

/// Password every seeded user is created with, so tests can log in.
pub const TEST_PASSWORD: &str = "correct-horse-battery";

pub mod api;

lazy_static! {
    static ref SERVER_KEY_PEM: String = {
        let rsa = Rsa::generate(2048).expect("failed to generate test RSA key");
        String::from_utf8(
            rsa.private_key_to_pem()
                .expect("failed to serialize test RSA key"),
        )
        .expect("PEM is not UTF-8")
    };
}

static INSTALL_TEST_KEYS: Once = Once::new();

/// Points JWKS and SERVER_CERTIFICATE at a keypair generated for this test
/// run, so the server can be started without any provisioning.
fn install_test_keys() {
    INSTALL_TEST_KEYS.call_once(|| {
        let jwks = Jwks::from_pem(SERVER_KEY_PEM.as_bytes())
            .expect("failed to derive JWKS from test key")
            .to_string();
        std::env::set_var(JWKS_ENV, jwks);
        std::env::set_var(SERVER_CERTIFICATE_ENV, SERVER_KEY_PEM.as_str());
    });
}

pub struct TestApp {
    database_name: String,
    database: Database,
    url: Url,
    uploads_dir: PathBuf,
    jwt_generator: jwt::Generator,
}

#[derive(Error, Debug)]
pub enum TestError {
    #[error("failed to connect to test server: {0}")]
    ConnectError(#[source] reqwest::Error),
    #[error("failed to check test server health")]
    HealthCheckError,
    #[error("failed to parse URL: {0}")]
    UrlError(#[from] url::ParseError),
    #[error("failed to execute request: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("failed to generate JWT to use for tests")]
    JWTGenerationError(#[source] campus_core::Error),
    #[error("failed to serialize/deserialize JSON: {0}")]
    JSONSerializationError(#[from] serde_json::Error),
}

pub enum TestUser {
    Anonymous,
    Administrator,
    Teacher,
    Parent,
    /// Carries a valid token whose subject matches no user row.
    Stranger,
}

impl TestApp {
    pub async fn start_and_connect(user: TestUser) -> (Self, TestClient) {
        let app = Self::start().await;
        let client = app.connect(user).await.unwrap();
        (app, client)
    }

    pub async fn start() -> Self {
        dotenv::dotenv().ok();
        install_test_keys();

        let database_name = format!("it_{}", Uuid::new_v4().simple());
        let mut conn = PgConnection::connect(BASE_DATABASE_URL)
            .await
            .expect("failed to connect to database");
        sqlx::query(&format!("CREATE DATABASE \"{}\"", database_name))
            .execute(&mut conn)
            .await
            .expect("failed to create test database");
        conn.close()
            .await
            .expect("failed to close temporary connection");

        tracing::trace!("created test database {}", database_name);

        let database_url = format!("{}/{}", BASE_DATABASE_URL, database_name);
        let database = Database::new(&database_url, 1, 2)
            .await
            .expect("failed to connect to test database");
        database
            .migrate()
            .await
            .expect("failed to migrate test database");

        seed_users(&database).await;

        let uploads_dir = std::env::temp_dir().join(format!("{}-uploads", database_name));
        let port = next_available_port();
        let listen_address = SocketAddr::from(([127, 0, 0, 1], port));

        let app = App::with_args(Args {
            listen_address,
            database_url,
            uploads_dir: uploads_dir
                .to_str()
                .expect("uploads path is not UTF-8")
                .to_string(),
            disable_background_jobs: true,
            ..Args::default()
        });

        let jwt_generator =
            jwt::Generator::new_from_pem(SERVER_KEY_PEM.as_bytes(), DEFAULT_ISSUER, DEFAULT_AUDIENCE)
                .expect("failed to create JWT generator");

        let _ = tokio::spawn(async move { app.run().await });

        let url =
            Url::parse(&format!("http://127.0.0.1:{}", port)).expect("failed to generate URL");

        Self {
            database_name,
            database,
            url,
            uploads_dir,
            jwt_generator,
        }
    }

    pub async fn connect(&self, user: TestUser) -> Result<TestClient, TestError> {
        let client = reqwest::Client::new();
        self.wait_until_healthy(&client).await?;

        let auth = match user {
            TestUser::Anonymous => None,
            TestUser::Administrator => Some((ADMINISTRATOR_UUID, vec![Role::Administrator])),
            TestUser::Teacher => Some((TEACHER_UUID, vec![Role::Teacher])),
            TestUser::Parent => Some((PARENT_UUID, vec![Role::Parent])),
            TestUser::Stranger => Some((STRANGER_UUID, vec![Role::Administrator])),
        };

        Ok(TestClient(
            client,
            self.url.clone(),
            match auth {
                None => None,
                Some((subject_uuid, roles)) => {
                    let uuid = Uuid::parse_str(subject_uuid).unwrap();
                    let subject = ShortId::from_uuid(&uuid).to_string();
                    Some(
                        self.jwt_generator
                            .generate(&subject, 5, Some(roles))
                            .map_err(TestError::JWTGenerationError)?,
                    )
                }
            },
        ))
    }

    /// A client carrying a token obtained elsewhere, e.g. from a login
    /// response.
    pub fn connect_with_access_token(&self, token: &str) -> TestClient {
        TestClient(
            reqwest::Client::new(),
            self.url.clone(),
            Some(token.to_string()),
        )
    }

    async fn wait_until_healthy(&self, client: &reqwest::Client) -> Result<(), TestError> {
        let mut remaining_tries = 50;

        while remaining_tries > 0 {
            let result = client
                .request(reqwest::Method::GET, self.url.join("/health").unwrap())
                .send()
                .await;
            match result {
                Ok(res) => {
                    if res.text().await.unwrap().trim() == "OK" {
                        return Ok(());
                    } else {
                        return Err(TestError::HealthCheckError);
                    }
                }
                Err(e) => {
                    if let Some(source) = e.source() {
                        if let Some(hyper_error) = source.downcast_ref::<hyper::Error>() {
                            if hyper_error.is_connect() {
                                std::thread::sleep(Duration::from_millis(20));
                                remaining_tries -= 1;
                                continue;
                            }
                        }
                    }
                    return Err(TestError::ConnectError(e));
                }
            }
        }

        Err(TestError::HealthCheckError)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn uploads_dir(&self) -> &PathBuf {
        &self.uploads_dir
    }
}

async fn seed_users(database: &Database) {
    let password_hash = bcrypt::hash(TEST_PASSWORD, 4).expect("failed to hash test password");
    let mut conn = database
        .connection()
        .await
        .expect("failed to get connection for seeding");

    for (uuid, email, role) in [
        (ADMINISTRATOR_UUID, "admin@campus.test", "ADMINISTRATOR"),
        (TEACHER_UUID, "teacher@campus.test", "TEACHER"),
        (PARENT_UUID, "parent@campus.test", "PARENT"),
    ] {
        sqlx::query(
            r"INSERT INTO users (uuid, email, password_hash, role) VALUES ($1, $2, $3, $4::user_role)",
        )
        .bind(Uuid::parse_str(uuid).unwrap())
        .bind(email)
        .bind(&password_hash)
        .bind(role)
        .execute(&mut *conn)
        .await
        .expect("failed to seed test user");
    }
}

pub struct TestClient(reqwest::Client, Url, Option<String>);

pub type TestResult<T> = Result<T, TestError>;

impl TestClient {
    pub async fn get_string(&self, path: &str) -> TestResult<String> {
        Ok(self
            .0
            .request(reqwest::Method::GET, self.1.join(path)?)
            .headers(self.headers())
            .send()
            .await?
            .text()
            .await?)
    }

    pub async fn get_bytes(&self, path: &str) -> TestResult<Vec<u8>> {
        let response = self
            .0
            .request(reqwest::Method::GET, self.1.join(path)?)
            .headers(self.headers())
            .send()
            .await?;
        response
            .error_for_status_ref()
            .map_err(TestError::RequestError)?;
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn get<RS: DeserializeOwned>(&self, path: &str) -> TestResult<RS> {
        self.execute_json_request_response(reqwest::Method::GET, path, None::<()>)
            .await
    }

    pub async fn post<RQ: Serialize, RS: DeserializeOwned>(
        &self,
        path: &str,
        body: RQ,
    ) -> TestResult<RS> {
        self.execute_json_request_response(reqwest::Method::POST, path, Some(body))
            .await
    }

    pub async fn patch<RQ: Serialize, RS: DeserializeOwned>(
        &self,
        path: &str,
        body: RQ,
    ) -> TestResult<RS> {
        self.execute_json_request_response(reqwest::Method::PATCH, path, Some(body))
            .await
    }

    pub async fn delete<RS: DeserializeOwned>(&self, path: &str) -> TestResult<RS> {
        self.execute_json_request_response(reqwest::Method::DELETE, path, None::<()>)
            .await
    }

    /// DELETE where a successful response carries no body.
    pub async fn delete_empty(&self, path: &str) -> TestResult<()> {
        let response = self
            .0
            .request(reqwest::Method::DELETE, self.1.join(path)?)
            .headers(self.headers())
            .send()
            .await?;
        response
            .error_for_status_ref()
            .map_err(TestError::RequestError)?;
        Ok(())
    }

    pub async fn post_multipart<RS: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> TestResult<RS> {
        let response = self
            .0
            .request(reqwest::Method::POST, self.1.join(path)?)
            .headers(self.headers())
            .multipart(form)
            .send()
            .await?;
        response
            .error_for_status_ref()
            .map_err(TestError::RequestError)?;
        Ok(response.json().await?)
    }

    /// POST a multipart form, returning status and body without treating
    /// error statuses as failures.
    pub async fn post_multipart_raw(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> TestResult<(u16, serde_json::Value)> {
        let response = self
            .0
            .request(reqwest::Method::POST, self.1.join(path)?)
            .headers(self.headers())
            .multipart(form)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.json().await?;
        Ok((status, body))
    }

    /// POST JSON, returning status and body without treating error
    /// statuses as failures. Useful for asserting error envelopes.
    pub async fn post_raw<RQ: Serialize>(
        &self,
        path: &str,
        body: RQ,
    ) -> TestResult<(u16, serde_json::Value)> {
        let response = self
            .0
            .request(reqwest::Method::POST, self.1.join(path)?)
            .headers(self.headers())
            .json(&body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.json().await?;
        Ok((status, body))
    }

    pub async fn patch_raw<RQ: Serialize>(
        &self,
        path: &str,
        body: RQ,
    ) -> TestResult<(u16, serde_json::Value)> {
        let response = self
            .0
            .request(reqwest::Method::PATCH, self.1.join(path)?)
            .headers(self.headers())
            .json(&body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.json().await?;
        Ok((status, body))
    }

    pub async fn delete_raw(&self, path: &str) -> TestResult<(u16, serde_json::Value)> {
        let response = self
            .0
            .request(reqwest::Method::DELETE, self.1.join(path)?)
            .headers(self.headers())
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.json().await?;
        Ok((status, body))
    }

    pub async fn get_raw(&self, path: &str) -> TestResult<(u16, serde_json::Value)> {
        let response = self
            .0
            .request(reqwest::Method::GET, self.1.join(path)?)
            .headers(self.headers())
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.json().await?;
        Ok((status, body))
    }

    async fn execute_json_request_response<RQ: Serialize, RS: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<RQ>,
    ) -> Result<RS, TestError> {
        let mut req = self.0.request(method, self.1.join(path)?);
        req = req.headers(self.headers());
        if let Some(body) = body {
            if tracing::event_enabled!(Level::DEBUG) {
                tracing::debug!(
                    body = serde_json::to_string(&body).unwrap(),
                    "sending request"
                );
            }
            req = req.json(&body);
        }
        let response = self.0.execute(req.build()?).await?;
        response
            .error_for_status_ref()
            .map_err(TestError::RequestError)?;
        if tracing::event_enabled!(Level::DEBUG) {
            let bytes = response.bytes().await?;
            let json: serde_json::Value = serde_json::from_slice(&bytes)?;
            tracing::debug!(
                body = serde_json::to_string(&json).unwrap(),
                "received response"
            );
            Ok(serde_json::from_value(json)?)
        } else {
            Ok(response.json().await?)
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.2 {
            headers.insert(
                "Authorization",
                HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
            );
        }
        headers
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        tokio::task::block_in_place(|| {
            futures::executor::block_on(async {
                self.database.close().await;
                if let Ok(mut conn) = PgConnection::connect(BASE_DATABASE_URL).await {
                    if let Err(e) = sqlx::query(&format!(
                        "DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)",
                        self.database_name
                    ))
                    .execute(&mut conn)
                    .await
                    {
                        tracing::error!(
                            "failed to drop test database {}: {}",
                            self.database_name,
                            e
                        )
                    }
                    conn.close()
                        .await
                        .expect("failed to close temporary connection");
                }
            })
        });

        let _ = std::fs::remove_dir_all(&self.uploads_dir);

        tracing::trace!("test database {} dropped", self.database_name);
    }
}

fn next_available_port() -> u16 {
    for _ in 0..10 {
        if let Some(port) = bind_os_available_port() {
            return port;
        }
    }

    panic!("no port available")
}

fn bind_os_available_port() -> Option<u16> {
    TcpListener::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .ok()
}
