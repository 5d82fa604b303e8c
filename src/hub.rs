//! Hugging Face Hub model metadata.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::IgnoredAny;
use tracing::debug;

use crate::error::{Error, Result};

const ERROR_CODE_HEADER: &str = "x-error-code";
const REPO_NOT_FOUND: &str = "RepoNotFound";

/// Metadata the deploy workflow needs about a hub model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: String,
    pub gated: bool,
}

#[async_trait]
pub trait ModelHub: Send + Sync {
    /// Look up `model_id`, failing with [`Error::ModelNotFound`] if the hub
    /// does not know it.
    async fn model_info(&self, model_id: &str) -> Result<ModelInfo>;
}

/// `gated` is `false` or the gating mode (`"auto"`, `"manual"`).
#[derive(Deserialize)]
#[serde(untagged)]
enum Gated {
    Flag(bool),
    Mode(IgnoredAny),
}

impl Gated {
    const fn is_gated(&self) -> bool {
        match self {
            Self::Flag(flag) => *flag,
            Self::Mode(_) => true,
        }
    }
}

#[derive(Deserialize)]
struct ModelInfoResponse {
    id: String,
    #[serde(default)]
    gated: Option<Gated>,
}

#[derive(Clone)]
pub struct HuggingFaceHub {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HuggingFaceHub {
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("hfoundry/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Build a client using the locally configured hub token, if any.
    pub fn from_env(endpoint: &str) -> Result<Self> {
        Self::new(endpoint, resolve_token())
    }
}

#[async_trait]
impl ModelHub for HuggingFaceHub {
    async fn model_info(&self, model_id: &str) -> Result<ModelInfo> {
        let url = format!("{}/api/models/{model_id}", self.endpoint);
        debug!(%url, authenticated = self.token.is_some(), "Fetching model info");

        let mut request = self.http.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        let error_code = response
            .headers()
            .get(ERROR_CODE_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        // A 401 is either a missing repository or a rejected token; only the
        // error code tells them apart.
        let repo_not_found = error_code.as_deref() == Some(REPO_NOT_FOUND);
        if status == StatusCode::NOT_FOUND
            || (status == StatusCode::UNAUTHORIZED && repo_not_found)
        {
            return Err(Error::ModelNotFound {
                model_id: model_id.to_string(),
            });
        }
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                code: error_code,
                message: response.text().await?,
            });
        }

        let info: ModelInfoResponse = response.json().await?;
        Ok(ModelInfo {
            id: info.id,
            gated: info.gated.as_ref().is_some_and(Gated::is_gated),
        })
    }
}

/// `HF_TOKEN`, then `HUGGING_FACE_HUB_TOKEN`, then the token file written by
/// `huggingface-cli login`.
fn resolve_token() -> Option<String> {
    resolve_token_from(|name| std::env::var(name).ok(), token_path().as_deref())
}

fn resolve_token_from(
    env: impl Fn(&str) -> Option<String>,
    token_file: Option<&std::path::Path>,
) -> Option<String> {
    env("HF_TOKEN")
        .or_else(|| env("HUGGING_FACE_HUB_TOKEN"))
        .or_else(|| token_file.and_then(|path| std::fs::read_to_string(path).ok()))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn token_path() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("HF_HOME") {
        return Some(PathBuf::from(home).join("token"));
    }
    dirs::home_dir().map(|home| home.join(".cache").join("huggingface").join("token"))
}
