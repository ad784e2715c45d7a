use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use account_service::application::Adapters;
use account_service::application::Application;
use account_service::application::Settings;
use account_service::domain::account::lockout::LockoutPolicy;
use account_service::domain::account::models::Account;
use account_service::domain::account::models::EmailAddress;
use account_service::domain::account::models::Role;
use account_service::domain::account::ports::AccountRepository;
use account_service::domain::auth::errors::NotifierError;
use account_service::domain::auth::ports::AccountNotifier;
use account_service::domain::clock::ManualClock;
use account_service::domain::session::models::SessionPolicy;
use account_service::inbound::http::router::HttpSettings;
use account_service::outbound::cache::InMemoryResponseCache;
use account_service::outbound::repositories::InMemoryAccountRepository;
use account_service::outbound::repositories::InMemorySessionRepository;
use async_trait::async_trait;
use auth::PasswordHasher;
use auth::TokenIssuerConfig;
use chrono::Utc;
use serde_json::json;

pub const PASSWORD: &str = "Str0ng!Pass123";

/// Captures verification tokens instead of mailing them.
#[derive(Default)]
pub struct RecordingNotifier {
    tokens: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn token_for(&self, email: &str) -> Option<String> {
        self.tokens
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(address, _)| address == email)
            .map(|(_, token)| token.clone())
    }
}

#[async_trait]
impl AccountNotifier for RecordingNotifier {
    async fn verification_issued(
        &self,
        account: &Account,
        token: &str,
    ) -> Result<(), NotifierError> {
        self.tokens
            .lock()
            .unwrap()
            .push((account.email.as_str().to_string(), token.to_string()));
        Ok(())
    }
}

/// Test application serving the real router over in-memory storage.
pub struct TestApp {
    pub address: String,
    pub api_client: reqwest::Client,
    pub clock: Arc<ManualClock>,
    pub accounts: Arc<InMemoryAccountRepository>,
    pub notifier: Arc<RecordingNotifier>,
    pub application: Application<InMemorySessionRepository>,
}

impl TestApp {
    /// Spawn the application in a background task and return TestApp
    pub async fn spawn() -> Self {
        Self::spawn_with_policy(SessionPolicy::Single).await
    }

    pub async fn spawn_with_policy(session_policy: SessionPolicy) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();
        let address = format!("http://127.0.0.1:{}", port);

        // Tokens are verified against wall time, so start the clock at now.
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let accounts = Arc::new(InMemoryAccountRepository::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let adapters = Adapters {
            accounts: Arc::clone(&accounts),
            sessions: Arc::new(InMemorySessionRepository::new()),
            notifier: Arc::clone(&notifier),
            cache: Arc::new(InMemoryResponseCache::new(64, clock.clone())),
            clock: clock.clone(),
        };
        let settings = Settings {
            issuer: TokenIssuerConfig {
                access_secret: b"test-access-secret-for-signing-at-least-32-bytes".to_vec(),
                refresh_secret: b"test-refresh-secret-for-signing-at-least-32-bytes".to_vec(),
                access_ttl: chrono::Duration::minutes(15),
                refresh_ttl: chrono::Duration::days(7),
            },
            hasher: PasswordHasher::with_params(1024, 1, 1).expect("valid hashing params"),
            lockout: LockoutPolicy::default(),
            session_policy,
            http: HttpSettings {
                auth_timeout: Duration::from_secs(5),
                cache_default_ttl: chrono::Duration::seconds(60),
                cache_max_body_bytes: 64 * 1024,
                cookie_secure: false,
            },
        };

        let application =
            Application::build(adapters, settings).expect("Failed to build application");
        let router = application.router();

        tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Server error");
        });

        Self {
            address,
            api_client: reqwest::Client::builder()
                .cookie_store(true)
                .build()
                .expect("Failed to create reqwest client"),
            clock,
            accounts,
            notifier,
            application,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Helper to make GET request
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.get(self.url(path))
    }

    /// Helper to make POST request
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.post(self.url(path))
    }

    /// Helper to make GET request with Bearer token
    pub fn get_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.get(path).bearer_auth(token)
    }

    /// Helper to make POST request with Bearer token
    pub fn post_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.post(path).bearer_auth(token)
    }

    /// Helper to make PUT request with Bearer token
    pub fn put_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.api_client.put(self.url(path)).bearer_auth(token)
    }

    /// Helper to make PATCH request with Bearer token
    pub fn patch_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.api_client.patch(self.url(path)).bearer_auth(token)
    }

    /// Helper to make DELETE request with Bearer token
    pub fn delete_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.api_client.delete(self.url(path)).bearer_auth(token)
    }

    pub async fn register(&self, name: &str, email: &str) -> reqwest::Response {
        self.post("/api/v1/auth/register")
            .json(&json!({
                "name": name,
                "email": email,
                "password": PASSWORD,
                "confirmPassword": PASSWORD,
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.post("/api/v1/auth/login")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn verify(&self, email: &str) -> reqwest::Response {
        let token = self
            .notifier
            .token_for(email)
            .expect("No verification token was issued");
        self.post("/api/v1/auth/verify-email")
            .json(&json!({ "token": token }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Register, verify and log in; returns the access token and account id.
    pub async fn signed_in(&self, name: &str, email: &str) -> (String, String) {
        let response = self.register(name, email).await;
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        assert!(self.verify(email).await.status().is_success());

        let response = self.login(email, PASSWORD).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = response.json().await.expect("Failed to parse response");

        (
            body["data"]["accessToken"].as_str().unwrap().to_string(),
            body["data"]["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    /// Grant `role` to the account registered under `email`.
    pub async fn grant_role(&self, email: &str, role: Role) {
        let email = EmailAddress::new(email.to_string()).unwrap();
        let mut account = self
            .accounts
            .find_by_email(&email)
            .await
            .unwrap()
            .expect("Account not found");
        account.roles.push(role);
        self.accounts.update(account).await.unwrap();
    }
}

/// Value of the refresh cookie set by `response`, if any.
pub fn refresh_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| value.strip_prefix("refreshToken="))
        .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
}
