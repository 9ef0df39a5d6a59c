// Firebase Firestore REST API client
// Using service account JWT authentication

use anyhow::{anyhow, Result};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Firebase service account credentials
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    pub private_key: String,
    pub client_email: String,
}

/// JWT claims for Google OAuth2
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,
    sub: String,
    aud: String,
    iat: u64,
    exp: u64,
    scope: String,
}

/// Cached access token
struct CachedToken {
    token: String,
    expires_at: u64,
}

enum Auth {
    ServiceAccount {
        account: ServiceAccount,
        token_cache: Arc<RwLock<Option<CachedToken>>>,
    },
    /// Fixed bearer token (the emulator accepts `owner`)
    Static(String),
}

/// Firebase REST API client
pub struct FirebaseClient {
    client: Client,
    base_url: String,
    auth: Auth,
}

impl FirebaseClient {
    /// Create a new Firebase client from service account JSON file
    pub fn from_file(client: Client, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let account: ServiceAccount = serde_json::from_str(&content)?;

        // FIRESTORE_EMULATOR_HOST wins, the same way Google's SDKs behave
        if let Ok(host) = std::env::var("FIRESTORE_EMULATOR_HOST") {
            let base_url = format!("http://{}", host);
            return Ok(Self::with_static_token(client, &base_url, &account.project_id, "owner"));
        }

        Ok(Self {
            client,
            base_url: documents_url("https://firestore.googleapis.com", &account.project_id),
            auth: Auth::ServiceAccount {
                account,
                token_cache: Arc::new(RwLock::new(None)),
            },
        })
    }

    /// Client for an emulator or test server at `host_url`
    pub fn with_static_token(client: Client, host_url: &str, project_id: &str, token: &str) -> Self {
        Self {
            client,
            base_url: documents_url(host_url, project_id),
            auth: Auth::Static(token.to_string()),
        }
    }

    /// Get access token (with caching)
    async fn get_access_token(&self) -> Result<String> {
        let (account, token_cache) = match &self.auth {
            Auth::Static(token) => return Ok(token.clone()),
            Auth::ServiceAccount {
                account,
                token_cache,
            } => (account, token_cache),
        };

        {
            let cache = token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                // Return cached token if still valid (with 60s buffer)
                if cached.expires_at > unix_now()? + 60 {
                    return Ok(cached.token.clone());
                }
            }
        }

        let token = self.generate_access_token(account).await?;

        let mut cache = token_cache.write().await;
        *cache = Some(CachedToken {
            token: token.clone(),
            expires_at: unix_now()? + 3600, // 1 hour
        });

        Ok(token)
    }

    /// Generate a new access token using JWT
    async fn generate_access_token(&self, account: &ServiceAccount) -> Result<String> {
        let now = unix_now()?;

        let claims = Claims {
            iss: account.client_email.clone(),
            sub: account.client_email.clone(),
            aud: "https://oauth2.googleapis.com/token".to_string(),
            iat: now,
            exp: now + 3600,
            scope: "https://www.googleapis.com/auth/datastore".to_string(),
        };

        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())?;
        let jwt = encode(&Header::new(Algorithm::RS256), &claims, &key)?;

        // Exchange JWT for access token
        let response = self
            .client
            .post("https://oauth2.googleapis.com/token")
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await?;
            error!("Failed to get access token: {}", body);
            return Err(anyhow!("Failed to get access token"));
        }

        let data: Value = response.json().await?;
        let token = data["access_token"]
            .as_str()
            .ok_or_else(|| anyhow!("No access_token in response"))?;

        Ok(token.to_string())
    }

    /// Get a document by path
    pub async fn get_document(&self, collection: &str, doc_id: &str) -> Result<Option<Value>> {
        let token = self.get_access_token().await?;
        let url = format!(
            "{}/{}/{}",
            self.base_url,
            collection,
            urlencoding::encode(doc_id)
        );

        let response = self.client.get(&url).bearer_auth(&token).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            debug!("Firebase error: {}", body);
            return Err(anyhow!("Firebase error: {}", status));
        }

        let doc: Value = response.json().await?;
        Ok(Some(from_firestore_document(&doc)))
    }

    /// Create a document with a chosen ID. Returns `false` when a document
    /// with that ID already exists.
    pub async fn create_document(&self, collection: &str, doc_id: &str, data: &Value) -> Result<bool> {
        let token = self.get_access_token().await?;
        let url = format!(
            "{}/{}?documentId={}",
            self.base_url,
            collection,
            urlencoding::encode(doc_id)
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&to_firestore_document(data))
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            return Ok(false);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            debug!("Firebase create error: {}", body);
            return Err(anyhow!("Firebase create error: {}", status));
        }

        Ok(true)
    }

    /// Set/update a document (merge on the top-level fields of `data`)
    pub async fn set_document(&self, collection: &str, doc_id: &str, data: &Value) -> Result<()> {
        let token = self.get_access_token().await?;

        // Build updateMask from top-level field names
        let field_paths: String = data
            .as_object()
            .map(|obj| {
                obj.keys()
                    .map(|k| format!("updateMask.fieldPaths={}", k))
                    .collect::<Vec<_>>()
                    .join("&")
            })
            .unwrap_or_default();

        let url = format!(
            "{}/{}/{}?{}",
            self.base_url,
            collection,
            urlencoding::encode(doc_id),
            field_paths
        );

        let response = self
            .client
            .patch(&url)
            .bearer_auth(&token)
            .json(&to_firestore_document(data))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            debug!("Firebase error: {}", body);
            return Err(anyhow!("Firebase error: {}", status));
        }

        Ok(())
    }
}

fn documents_url(host_url: &str, project_id: &str) -> String {
    format!(
        "{}/v1/projects/{}/databases/(default)/documents",
        host_url.trim_end_matches('/'),
        project_id
    )
}

fn unix_now() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Convert Firestore document to regular JSON
fn from_firestore_document(doc: &Value) -> Value {
    if let Some(fields) = doc.get("fields") {
        from_firestore_value(&json!({ "mapValue": { "fields": fields } }))
    } else {
        Value::Null
    }
}

/// Convert Firestore value to regular JSON value
fn from_firestore_value(value: &Value) -> Value {
    if let Some(s) = value.get("stringValue") {
        return s.clone();
    }
    if let Some(n) = value.get("integerValue") {
        if let Some(s) = n.as_str() {
            return s.parse::<i64>().map(Value::from).unwrap_or(Value::Null);
        }
        return n.clone();
    }
    if let Some(n) = value.get("doubleValue") {
        return n.clone();
    }
    if let Some(b) = value.get("booleanValue") {
        return b.clone();
    }
    if value.get("nullValue").is_some() {
        return Value::Null;
    }
    if let Some(array) = value.get("arrayValue") {
        // An empty array comes back as `{"arrayValue": {}}`
        let values = array
            .get("values")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().map(from_firestore_value).collect())
            .unwrap_or_default();
        return Value::Array(values);
    }
    if let Some(map) = value.get("mapValue") {
        let fields: serde_json::Map<String, Value> = map
            .get("fields")
            .and_then(|f| f.as_object())
            .map(|obj| {
                obj.iter()
                    .map(|(k, v)| (k.clone(), from_firestore_value(v)))
                    .collect()
            })
            .unwrap_or_default();
        return Value::Object(fields);
    }
    Value::Null
}

/// Convert regular JSON to Firestore document format
fn to_firestore_document(data: &Value) -> Value {
    json!({
        "fields": to_firestore_fields(data)
    })
}

/// Convert JSON object to Firestore fields
fn to_firestore_fields(data: &Value) -> Value {
    if let Some(obj) = data.as_object() {
        let fields: serde_json::Map<String, Value> = obj
            .iter()
            .map(|(k, v)| (k.clone(), to_firestore_value(v)))
            .collect();
        Value::Object(fields)
    } else {
        json!({})
    }
}

/// Convert JSON value to Firestore value format
fn to_firestore_value(value: &Value) -> Value {
    match value {
        Value::String(s) => json!({ "stringValue": s }),
        Value::Number(n) => {
            if n.is_f64() {
                json!({ "doubleValue": n })
            } else {
                json!({ "integerValue": n.to_string() })
            }
        }
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Array(arr) => {
            let values: Vec<Value> = arr.iter().map(to_firestore_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(_) => json!({ "mapValue": { "fields": to_firestore_fields(value) } }),
        Value::Null => json!({ "nullValue": null }),
    }
}
