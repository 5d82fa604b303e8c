//! Authenticated Azure Resource Manager requests and long-running operations.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::TokenCredential;
use crate::config::AzureConfig;
use crate::error::{Error, Result};

const ASYNC_OPERATION: &str = "azure-asyncoperation";
const LOCATION: &str = "location";

#[derive(Deserialize, Default)]
struct ErrorEnvelope {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize, Default)]
struct ErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct OperationStatus {
    status: String,
    #[serde(default)]
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProvisionedResource {
    properties: Option<ProvisionedProperties>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProvisionedProperties {
    provisioning_state: Option<String>,
}

/// What to poll after a create-or-update request was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PollTarget {
    AsyncOperation(String),
    Location(String),
    Resource(String),
}

#[derive(Debug, PartialEq, Eq)]
enum Progress {
    Running,
    Succeeded,
    Failed(String),
}

fn classify(state: &str) -> Progress {
    match state.to_ascii_lowercase().as_str() {
        "succeeded" => Progress::Succeeded,
        "failed" | "canceled" | "cancelled" => Progress::Failed(state.to_string()),
        _ => Progress::Running,
    }
}

/// Resource Manager client shared by the workspace and registry clients.
#[derive(Clone)]
pub struct ArmClient {
    http: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
    scope: String,
    api_version: String,
    poll_interval: Duration,
}

impl ArmClient {
    pub fn new(credential: Arc<dyn TokenCredential>, config: &AzureConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("hfoundry/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            credential,
            scope: config.management_scope(),
            api_version: config.api_version.clone(),
            poll_interval: config.poll_interval(),
        })
    }

    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let token = self.credential.get_token(&self.scope).await?;
        Ok(self.http.request(method, url).bearer_auth(token.token))
    }

    async fn versioned(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        Ok(self
            .request(method, url)
            .await?
            .query(&[("api-version", self.api_version.as_str())]))
    }

    /// GET a versioned resource.
    pub async fn get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        debug!(%url, "GET");
        let response = self.versioned(Method::GET, url).await?.query(query).send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// GET an endpoint that takes no `api-version`.
    pub async fn get_unversioned<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(%url, "GET");
        let response = self.request(Method::GET, url).await?.send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// POST a resource action without a body, e.g. `listKeys`.
    pub async fn post<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(%url, "POST");
        let response = self
            .versioned(Method::POST, url)
            .await?
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// PUT a resource and wait until its provisioning reaches a terminal state.
    ///
    /// There is no timeout; the wait ends when the platform reports success,
    /// failure or cancellation.
    pub async fn put_and_wait<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        resource: &str,
    ) -> Result<()> {
        debug!(%url, "PUT");
        let response = self.versioned(Method::PUT, url).await?.json(body).send().await?;
        let response = check(response).await?;

        let headers = response.headers().clone();
        let delay = retry_after(&headers).unwrap_or(self.poll_interval);
        let text = response.text().await?;

        if let Some(target) = poll_target(&headers) {
            return self.poll(target, delay, resource).await;
        }

        let state = serde_json::from_str::<ProvisionedResource>(&text)
            .ok()
            .and_then(|r| r.properties)
            .and_then(|p| p.provisioning_state);
        match state.as_deref().map(classify) {
            Some(Progress::Succeeded) => Ok(()),
            Some(Progress::Failed(status)) => Err(Error::OperationFailed {
                resource: resource.to_string(),
                status,
                message: None,
            }),
            Some(Progress::Running) | None => {
                self.poll(PollTarget::Resource(url.to_string()), delay, resource)
                    .await
            }
        }
    }

    async fn poll(&self, target: PollTarget, mut delay: Duration, resource: &str) -> Result<()> {
        loop {
            tokio::time::sleep(delay).await;

            let request = match &target {
                PollTarget::AsyncOperation(url) | PollTarget::Location(url) => {
                    self.request(Method::GET, url).await?
                }
                PollTarget::Resource(url) => self.versioned(Method::GET, url).await?,
            };
            let response = check(request.send().await?).await?;
            delay = retry_after(response.headers()).unwrap_or(self.poll_interval);

            let progress = match &target {
                PollTarget::AsyncOperation(_) => {
                    let operation: OperationStatus = response.json().await?;
                    match classify(&operation.status) {
                        Progress::Failed(status) => {
                            return Err(Error::OperationFailed {
                                resource: resource.to_string(),
                                status,
                                message: operation.error.and_then(|e| e.message),
                            });
                        }
                        progress => progress,
                    }
                }
                PollTarget::Location(_) => {
                    if response.status() == StatusCode::ACCEPTED {
                        Progress::Running
                    } else {
                        Progress::Succeeded
                    }
                }
                PollTarget::Resource(_) => {
                    let state = response
                        .json::<ProvisionedResource>()
                        .await?
                        .properties
                        .and_then(|p| p.provisioning_state)
                        .unwrap_or_default();
                    match classify(&state) {
                        Progress::Failed(status) => {
                            return Err(Error::OperationFailed {
                                resource: resource.to_string(),
                                status,
                                message: None,
                            });
                        }
                        progress => progress,
                    }
                }
            };

            debug!(%resource, ?progress, "Polled operation");
            if progress == Progress::Succeeded {
                return Ok(());
            }
        }
    }
}

fn poll_target(headers: &HeaderMap) -> Option<PollTarget> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    header(ASYNC_OPERATION)
        .map(PollTarget::AsyncOperation)
        .or_else(|| header(LOCATION).map(PollTarget::Location))
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Map a non-success response to [`Error::Api`] using the ARM error envelope.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await?;
    let detail = serde_json::from_str::<ErrorEnvelope>(&body)
        .unwrap_or_default()
        .error
        .unwrap_or_default();
    Err(Error::Api {
        status: status.as_u16(),
        code: detail.code,
        message: detail.message.unwrap_or(body),
    })
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::auth::tests::StaticCredential;

    fn client() -> ArmClient {
        let config = AzureConfig {
            poll_interval_secs: 0,
            ..AzureConfig::default()
        };
        ArmClient::new(Arc::new(StaticCredential::ok("arm-token")), &config).unwrap()
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("Succeeded"), Progress::Succeeded);
        assert_eq!(classify("Failed"), Progress::Failed("Failed".to_string()));
        assert_eq!(classify("Canceled"), Progress::Failed("Canceled".to_string()));
        assert_eq!(classify("InProgress"), Progress::Running);
        assert_eq!(classify("Creating"), Progress::Running);
    }

    #[tokio::test]
    async fn test_put_follows_async_operation_until_succeeded() {
        let server = MockServer::start().await;
        let operation = format!("{}/operations/1", server.uri());

        Mock::given(method("PUT"))
            .and(path("/things/a"))
            .and(query_param("api-version", "2024-04-01"))
            .and(header("Authorization", "Bearer arm-token"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("Azure-AsyncOperation", operation.as_str())
                    .set_body_json(serde_json::json!({
                        "properties": { "provisioningState": "Creating" }
                    })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "status": "InProgress" })),
            )
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "status": "Succeeded" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        client()
            .put_and_wait(
                &format!("{}/things/a", server.uri()),
                &serde_json::json!({}),
                "thing a",
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_put_reports_failed_operation() {
        let server = MockServer::start().await;
        let operation = format!("{}/operations/2", server.uri());

        Mock::given(method("PUT"))
            .respond_with(
                ResponseTemplate::new(202)
                    .insert_header("Azure-AsyncOperation", operation.as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "Failed",
                "error": { "code": "QuotaExceeded", "message": "Not enough quota" }
            })))
            .mount(&server)
            .await;

        match client()
            .put_and_wait(
                &format!("{}/things/b", server.uri()),
                &serde_json::json!({}),
                "thing b",
            )
            .await
        {
            Err(Error::OperationFailed {
                resource,
                status,
                message,
            }) => {
                assert_eq!(resource, "thing b");
                assert_eq!(status, "Failed");
                assert_eq!(message.as_deref(), Some("Not enough quota"));
            }
            other => panic!("expected OperationFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_put_follows_location_header() {
        let server = MockServer::start().await;
        let location = format!("{}/results/3", server.uri());

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(202).insert_header("Location", location.as_str()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/results/3"))
            .respond_with(ResponseTemplate::new(202))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/results/3"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client()
            .put_and_wait(
                &format!("{}/things/c", server.uri()),
                &serde_json::json!({}),
                "thing c",
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_put_polls_resource_without_operation_headers() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/things/d"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "properties": { "provisioningState": "Updating" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/things/d"))
            .and(query_param("api-version", "2024-04-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": { "provisioningState": "Succeeded" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        client()
            .put_and_wait(
                &format!("{}/things/d", server.uri()),
                &serde_json::json!({}),
                "thing d",
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_put_already_succeeded_does_not_poll() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": { "provisioningState": "Succeeded" }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        client()
            .put_and_wait(
                &format!("{}/things/e", server.uri()),
                &serde_json::json!({}),
                "thing e",
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_error_envelope_is_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {
                    "code": "AuthorizationFailed",
                    "message": "The client does not have authorization"
                }
            })))
            .mount(&server)
            .await;

        let result: Result<serde_json::Value> = client()
            .get(&format!("{}/things/f", server.uri()), &[])
            .await;
        match result {
            Err(Error::Api {
                status,
                code,
                message,
            }) => {
                assert_eq!(status, 403);
                assert_eq!(code.as_deref(), Some("AuthorizationFailed"));
                assert_eq!(message, "The client does not have authorization");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(RETRY_AFTER, "15".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(15)));
    }
}
