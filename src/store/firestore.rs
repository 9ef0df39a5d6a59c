// Firestore-backed config store
// One document per server in `server_configs`, document ID = server ID

use std::sync::Arc;

use async_trait::async_trait;

use super::{ConfigStore, StoreError};
use crate::api::firebase::FirebaseClient;
use crate::models::guild::GuildConfig;

const COLLECTION: &str = "server_configs";

pub struct FirestoreStore {
    firebase: Arc<FirebaseClient>,
}

impl FirestoreStore {
    pub fn new(firebase: Arc<FirebaseClient>) -> Self {
        Self { firebase }
    }
}

#[async_trait]
impl ConfigStore for FirestoreStore {
    async fn find(&self, server_id: &str) -> Result<Option<GuildConfig>, StoreError> {
        match self.firebase.get_document(COLLECTION, server_id).await? {
            Some(doc) => {
                let mut config: GuildConfig = serde_json::from_value(doc)?;
                // Older documents may predate the serverId field
                if config.server_id.is_empty() {
                    config.server_id = server_id.to_string();
                }
                Ok(Some(config))
            }
            None => Ok(None),
        }
    }

    async fn insert(&self, config: &GuildConfig) -> Result<(), StoreError> {
        let doc = serde_json::to_value(config)?;
        if self
            .firebase
            .create_document(COLLECTION, &config.server_id, &doc)
            .await?
        {
            Ok(())
        } else {
            Err(StoreError::DuplicateKey(config.server_id.clone()))
        }
    }

    async fn save(&self, config: &GuildConfig) -> Result<(), StoreError> {
        let doc = serde_json::to_value(config)?;
        self.firebase
            .set_document(COLLECTION, &config.server_id, &doc)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DOCS: &str = "/v1/projects/demo/databases/(default)/documents/server_configs";

    async fn store(server: &MockServer) -> FirestoreStore {
        let client = FirebaseClient::with_static_token(
            reqwest::Client::new(),
            &server.uri(),
            "demo",
            "owner",
        );
        FirestoreStore::new(Arc::new(client))
    }

    #[tokio::test]
    async fn test_find_missing_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/1", DOCS)))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(store(&server).await.find("1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_decodes_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/1", DOCS)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/demo/databases/(default)/documents/server_configs/1",
                "fields": {
                    "serverId": { "stringValue": "1" },
                    "rules": { "arrayValue": { "values": [
                        { "mapValue": { "fields": {
                            "ruleNo": { "integerValue": "3" },
                            "description": { "stringValue": "no spam" }
                        } } }
                    ] } }
                }
            })))
            .mount(&server)
            .await;

        let config = store(&server).await.find("1").await.unwrap().unwrap();
        assert_eq!(config.rule(3).unwrap().description, "no spam");
        assert!(config.word_images.is_empty());
    }

    #[tokio::test]
    async fn test_insert_conflict_is_duplicate_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(DOCS))
            .and(query_param("documentId", "1"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let err = store(&server)
            .await
            .insert(&GuildConfig::new("1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!("{}/1", DOCS)))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = store(&server)
            .await
            .save(&GuildConfig::new("1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
