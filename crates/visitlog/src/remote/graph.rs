//! Microsoft Graph client for a SharePoint list.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{ListItem, RemoteList};
use crate::config::{Config, RemoteSettings};
use crate::error::{Error, Result};

/// OAuth scope requested for Graph access.
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Response key signalling that more pages exist.
const NEXT_LINK_KEY: &str = "@odata.nextLink";

/// Client-credentials authenticated access to one SharePoint list.
///
/// A fresh token is requested for every operation; each request is bounded
/// by the configured timeout.
#[derive(Debug, Clone)]
pub struct GraphClient {
    settings: RemoteSettings,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemsPage {
    #[serde(default)]
    value: Vec<ListItem>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

impl GraphClient {
    /// Create a client from validated settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: RemoteSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { settings, http })
    }

    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if any credential or list identifier is
    /// missing; no network call is made in that case.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.remote_settings()?)
    }

    /// The settings this client was built with.
    #[must_use]
    pub fn settings(&self) -> &RemoteSettings {
        &self.settings
    }

    /// Exchange the client credentials for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the token endpoint rejects the request or
    /// its reply has no `access_token`, and [`Error::Remote`] on transport
    /// failure.
    pub async fn authenticate(&self) -> Result<String> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.settings.authority_url, self.settings.tenant_id
        );
        debug!(%url, "Requesting access token");

        let form = [
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("scope", GRAPH_SCOPE),
            ("grant_type", "client_credentials"),
        ];
        let response = self.http.post(&url).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Token request rejected");
            return Err(Error::auth(non_empty_or(body, status.as_str())));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| Error::auth(format!("unreadable token response: {e}")))?;
        token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::auth("token endpoint returned no access_token"))
    }

    fn items_url(&self) -> String {
        format!(
            "{}/sites/{}/lists/{}/items",
            self.settings.graph_url, self.settings.site_id, self.settings.list_id
        )
    }

    /// Send an authenticated request and parse the JSON reply.
    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let token = self.authenticate().await?;
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Remote list request failed");
            return Err(Error::remote_status(
                status.as_u16(),
                non_empty_or(body, status.as_str()),
            ));
        }

        if body.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        serde_json::from_str(&body)
            .map_err(|e| Error::remote_status(status.as_u16(), format!("malformed response: {e}")))
    }
}

#[async_trait]
impl RemoteList for GraphClient {
    async fn create(&self, fields: Map<String, Value>) -> Result<Value> {
        debug!(columns = fields.len(), "Creating list item");
        let body = serde_json::json!({ "fields": fields });
        self.send(self.http.post(self.items_url()).json(&body)).await
    }

    async fn list(&self) -> Result<Vec<ListItem>> {
        let url = format!("{}?expand=fields", self.items_url());
        let reply = self.send(self.http.get(url)).await?;

        let page: ItemsPage = serde_json::from_value(reply)
            .map_err(|e| Error::remote(format!("malformed item list: {e}")))?;
        if let Some(next) = page.next_link {
            return Err(Error::remote(format!(
                "item list is paginated ({NEXT_LINK_KEY}: {next}); refusing a partial scan"
            )));
        }

        debug!(items = page.value.len(), "Listed items");
        Ok(page.value)
    }

    async fn update(&self, item_id: &str, fields: Map<String, Value>) -> Result<Value> {
        debug!(item_id, columns = fields.len(), "Updating list item");
        let url = format!("{}/{item_id}/fields", self.items_url());
        self.send(self.http.patch(url).json(&fields)).await
    }
}

fn non_empty_or(body: String, fallback: &str) -> String {
    if body.trim().is_empty() {
        fallback.to_string()
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;

    use super::*;
    use crate::record::departure_update;
    use crate::remote::{create_fields, update_fields};
    use crate::VisitorRecord;

    const ITEMS_PATH: &str = "/v1.0/sites/site-1/lists/list-1/items";

    fn client_for(server: &ServerGuard) -> GraphClient {
        GraphClient::new(RemoteSettings {
            tenant_id: "tenant-1".to_string(),
            client_id: "client-1".to_string(),
            client_secret: "s3cret".to_string(),
            site_id: "site-1".to_string(),
            list_id: "list-1".to_string(),
            authority_url: server.url(),
            graph_url: format!("{}/v1.0", server.url()),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_authenticate_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stalled = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        let client = GraphClient::new(RemoteSettings {
            tenant_id: "tenant-1".to_string(),
            client_id: "client-1".to_string(),
            client_secret: "s3cret".to_string(),
            site_id: "site-1".to_string(),
            list_id: "list-1".to_string(),
            authority_url: format!("http://{addr}"),
            graph_url: format!("http://{addr}/v1.0"),
            timeout: Duration::from_millis(200),
        })
        .unwrap();

        let err = client.authenticate().await.unwrap_err();

        assert!(err.is_remote());
        assert!(err.to_string().contains("timed out"), "{err}");
        stalled.abort();
    }

    async fn mock_token(server: &mut ServerGuard) -> mockito::Mock {
        server
            .mock("POST", "/tenant-1/oauth2/v2.0/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("client_id".into(), "client-1".into()),
                Matcher::UrlEncoded("client_secret".into(), "s3cret".into()),
                Matcher::UrlEncoded("scope".into(), GRAPH_SCOPE.into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "tok-123", "token_type": "Bearer"}"#)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_authenticate_returns_token() {
        let mut server = Server::new_async().await;
        let token_mock = mock_token(&mut server).await;

        let token = client_for(&server).authenticate().await.unwrap();

        token_mock.assert_async().await;
        assert_eq!(token, "tok-123");
    }

    #[tokio::test]
    async fn test_authenticate_without_token_is_auth_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/tenant-1/oauth2/v2.0/token")
            .with_status(200)
            .with_body(r#"{"error": "nope"}"#)
            .create_async()
            .await;

        let err = client_for(&server).authenticate().await.unwrap_err();
        assert!(matches!(err, Error::Auth { .. }));
    }

    #[tokio::test]
    async fn test_authenticate_rejected_is_auth_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/tenant-1/oauth2/v2.0/token")
            .with_status(401)
            .with_body("invalid_client")
            .create_async()
            .await;

        let err = client_for(&server).authenticate().await.unwrap_err();
        assert!(matches!(err, Error::Auth { .. }));
        assert!(err.to_string().contains("invalid_client"));
    }

    #[tokio::test]
    async fn test_create_posts_fields() {
        let mut server = Server::new_async().await;
        mock_token(&mut server).await;
        let fields = create_fields(&VisitorRecord::default());
        let create_mock = server
            .mock("POST", ITEMS_PATH)
            .match_header("authorization", "Bearer tok-123")
            .match_body(Matcher::Json(json!({ "fields": fields.clone() })))
            .with_status(201)
            .with_body(r#"{"id": "42", "fields": {"Title": "Visitante"}}"#)
            .create_async()
            .await;

        let result = client_for(&server).create(fields).await.unwrap();

        create_mock.assert_async().await;
        assert_eq!(result["id"], "42");
    }

    #[tokio::test]
    async fn test_create_failure_carries_body() {
        let mut server = Server::new_async().await;
        mock_token(&mut server).await;
        server
            .mock("POST", ITEMS_PATH)
            .with_status(400)
            .with_body(r#"{"error": {"code": "invalidRequest"}}"#)
            .create_async()
            .await;

        let err = client_for(&server).create(Map::new()).await.unwrap_err();
        match err {
            Error::Remote { status, detail } => {
                assert_eq!(status, Some(400));
                assert!(detail.contains("invalidRequest"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_remote_error() {
        let mut server = Server::new_async().await;
        mock_token(&mut server).await;
        server
            .mock("POST", ITEMS_PATH)
            .with_status(200)
            .with_body("<html>proxy</html>")
            .create_async()
            .await;

        let err = client_for(&server).create(Map::new()).await.unwrap_err();
        assert!(err.is_remote());
    }

    #[tokio::test]
    async fn test_list_and_find_by_field() {
        let mut server = Server::new_async().await;
        mock_token(&mut server).await;
        server
            .mock("GET", ITEMS_PATH)
            .match_query(Matcher::UrlEncoded("expand".into(), "fields".into()))
            .with_status(200)
            .with_body(
                json!({
                    "value": [
                        {"id": "1", "fields": {"Cedula": "1-111-111"}},
                        {"id": "2", "fields": {"Cedula": "8-888-888"}}
                    ]
                })
                .to_string(),
            )
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server);
        let items = client.list().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "1");

        let found = client.find_by_field("Cedula", "8-888-888").await.unwrap();
        assert_eq!(found.unwrap().id, "2");
    }

    #[tokio::test]
    async fn test_list_refuses_pagination() {
        let mut server = Server::new_async().await;
        mock_token(&mut server).await;
        server
            .mock("GET", ITEMS_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({
                    "value": [{"id": "1", "fields": {}}],
                    "@odata.nextLink": "https://graph/next"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let err = client_for(&server).list().await.unwrap_err();
        assert!(err.is_remote());
        assert!(err.to_string().contains("paginated"));
    }

    #[tokio::test]
    async fn test_list_without_value_is_empty() {
        let mut server = Server::new_async().await;
        mock_token(&mut server).await;
        server
            .mock("GET", ITEMS_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        assert!(client_for(&server).list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_patches_fields() {
        let mut server = Server::new_async().await;
        mock_token(&mut server).await;
        let patch_mock = server
            .mock("PATCH", format!("{ITEMS_PATH}/2/fields").as_str())
            .match_header("authorization", "Bearer tok-123")
            .match_body(Matcher::Json(json!({"HoraSalida": "17:00"})))
            .with_status(200)
            .with_body(r#"{"HoraSalida": "17:00"}"#)
            .create_async()
            .await;

        let result = client_for(&server)
            .update("2", update_fields(&departure_update("17:00")))
            .await
            .unwrap();

        patch_mock.assert_async().await;
        assert_eq!(result["HoraSalida"], "17:00");
    }

    #[tokio::test]
    async fn test_update_failure_is_remote_error() {
        let mut server = Server::new_async().await;
        mock_token(&mut server).await;
        server
            .mock("PATCH", format!("{ITEMS_PATH}/9/fields").as_str())
            .with_status(404)
            .with_body("")
            .create_async()
            .await;

        let err = client_for(&server).update("9", Map::new()).await.unwrap_err();
        match err {
            Error::Remote { status, detail } => {
                assert_eq!(status, Some(404));
                assert_eq!(detail, "404");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_config_requires_settings() {
        let err = GraphClient::from_config(&Config::default()).unwrap_err();
        assert!(err.is_configuration());
    }
}
