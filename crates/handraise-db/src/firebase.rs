//! Firebase Realtime Database over its REST API.
//!
//! Every location is addressed as `{db_url}/{path}.json`. Service-account
//! credentials are exchanged for an OAuth2 access token through the JWT bearer
//! grant; the token is cached until shortly before it expires.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::{Client, Method, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::DbError;
use crate::path::DbPath;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SCOPES: &str =
    "https://www.googleapis.com/auth/firebase.database https://www.googleapis.com/auth/userinfo.email";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The fields we need from a Google service-account key file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccount {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read service account file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid service account file {}", path.display()))
    }
}

pub enum Credentials {
    ServiceAccount(ServiceAccount),
    /// Legacy database secret, sent as the `auth` query parameter.
    DatabaseSecret(String),
    /// No credentials; only works against open rules or the emulator.
    Anonymous,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

struct AccessToken {
    token: String,
    expires_at: i64,
}

pub struct FirebaseStore {
    http: Client,
    base_url: Url,
    credentials: Credentials,
    token: Mutex<Option<AccessToken>>,
}

impl FirebaseStore {
    pub fn new(db_url: &str, credentials: Credentials) -> Result<Self> {
        let base_url =
            Url::parse(db_url).with_context(|| format!("Invalid database URL {db_url:?}"))?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            bail!("Database URL must be an http(s) URL, got {db_url:?}");
        }

        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        info!("Using Firebase database at {}", base_url);
        Ok(Self {
            http,
            base_url,
            credentials,
            token: Mutex::new(None),
        })
    }

    pub async fn get(&self, path: &DbPath) -> Result<Option<Value>> {
        let value: Value = self
            .send(Method::GET, path, None, false)
            .await?
            .json()
            .await
            .context("Invalid JSON from Firebase")?;

        Ok((!value.is_null()).then_some(value))
    }

    pub async fn set(&self, path: &DbPath, value: &Value) -> Result<()> {
        self.send(Method::PUT, path, Some(value), true).await?;
        Ok(())
    }

    pub async fn push(&self, path: &DbPath, value: &Value) -> Result<String> {
        let pushed: PushResponse = self
            .send(Method::POST, path, Some(value), false)
            .await?
            .json()
            .await
            .context("Invalid push response from Firebase")?;

        Ok(pushed.name)
    }

    pub async fn delete(&self, path: &DbPath) -> Result<()> {
        self.send(Method::DELETE, path, None, true).await?;
        Ok(())
    }

    async fn send(
        &self,
        method: Method,
        path: &DbPath,
        body: Option<&Value>,
        silent: bool,
    ) -> Result<Response> {
        let url = location_url(&self.base_url, path)?;
        debug!("Firebase {} /{}", method, path);

        let mut req = self.http.request(method.clone(), url);
        if let Some((name, value)) = self.auth_param().await? {
            req = req.query(&[(name, value)]);
        }
        if silent {
            req = req.query(&[("print", "silent")]);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("Firebase {} /{} failed", method, path))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(DbError::Firebase {
                status,
                message: error_message(&body),
            }
            .into());
        }

        Ok(resp)
    }

    async fn auth_param(&self) -> Result<Option<(&'static str, String)>> {
        match &self.credentials {
            Credentials::ServiceAccount(account) => {
                Ok(Some(("access_token", self.access_token(account).await?)))
            }
            Credentials::DatabaseSecret(secret) => Ok(Some(("auth", secret.clone()))),
            Credentials::Anonymous => Ok(None),
        }
    }

    async fn access_token(&self, account: &ServiceAccount) -> Result<String> {
        let mut cached = self.token.lock().await;
        let now = chrono::Utc::now().timestamp();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - REFRESH_MARGIN_SECS > now {
                return Ok(token.token.clone());
            }
        }

        let fresh = fetch_access_token(&self.http, account, now).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

/// `{base}/{segments...}.json`, with each segment percent-encoded.
fn location_url(base: &Url, path: &DbPath) -> Result<Url> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| anyhow!("Database URL cannot be a base"))?;
        segments.pop_if_empty();

        match path.segments().split_last() {
            None => {
                segments.push(".json");
            }
            Some((last, parents)) => {
                segments.extend(parents);
                segments.push(&format!("{last}.json"));
            }
        }
    }
    Ok(url)
}

/// Firebase reports failures as `{"error": "..."}`; fall back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn build_assertion(account: &ServiceAccount, now: i64) -> Result<String> {
    let claims = AssertionClaims {
        iss: &account.client_email,
        scope: SCOPES,
        aud: &account.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };

    let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
        .context("Service account private key is not a valid RSA PEM")?;

    Ok(encode(&Header::new(Algorithm::RS256), &claims, &key)?)
}

async fn fetch_access_token(
    http: &Client,
    account: &ServiceAccount,
    now: i64,
) -> Result<AccessToken> {
    let assertion = build_assertion(account, now)?;

    let resp = http
        .post(&account.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await
        .context("Token request failed")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("Token endpoint returned {}: {}", status, body.trim());
    }

    let token: TokenResponse = resp.json().await.context("Invalid token response")?;
    info!(
        "Obtained access token for {} (expires in {}s)",
        account.client_email, token.expires_in
    );

    Ok(AccessToken {
        token: token.access_token,
        expires_at: now + token.expires_in,
    })
}
