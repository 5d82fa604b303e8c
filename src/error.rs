use thiserror::Error;

/// Errors raised while provisioning a deployment.
///
/// Remote failures are surfaced as-is; nothing in the crate retries or
/// recovers from them.
#[derive(Error, Debug)]
pub enum Error {
    #[error(
        "The environment variable(s) {} not set. To run `hfoundry deploy` you need to set the \
         following environment variables: `SUBSCRIPTION_ID`, `RESOURCE_GROUP`, and \
         `FOUNDRY_PROJECT` (Microsoft Foundry Hub-based project)",
        format_names(.missing)
    )]
    MissingEnvironment { missing: Vec<&'static str> },

    #[error("Invalid model id '{model_id}': {reason}")]
    InvalidModelId { model_id: String, reason: String },

    #[error("Model '{model_id}' not found on Hugging Face")]
    ModelNotFound { model_id: String },

    #[error("Model '{name}' not found in the '{registry}' registry")]
    RegistryModelNotFound { name: String, registry: String },

    #[error("Unsupported model label '{0}', only 'latest' is supported")]
    UnsupportedLabel(String),

    #[error("Request failed with status {status}: {}", format_api_message(.code.as_deref(), .message))]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Operation on {resource} finished with status {status}: {}", .message.as_deref().unwrap_or("no details"))]
    OperationFailed {
        resource: String,
        status: String,
        message: Option<String>,
    },

    #[error("Failed to acquire Azure credentials:\n{}", .attempts.join("\n"))]
    Credential { attempts: Vec<String> },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

fn format_names(names: &[&str]) -> String {
    names
        .iter()
        .map(|name| format!("`{name}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_api_message(code: Option<&str>, message: &str) -> String {
    match code {
        Some(code) => format!("{code}: {message}"),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_environment_names_every_variable() {
        let err = Error::MissingEnvironment {
            missing: vec!["SUBSCRIPTION_ID", "FOUNDRY_PROJECT"],
        };
        let message = err.to_string();
        assert!(message.starts_with(
            "The environment variable(s) `SUBSCRIPTION_ID`, `FOUNDRY_PROJECT` not set."
        ));
        assert!(message.contains("`RESOURCE_GROUP`"));
    }

    #[test]
    fn test_api_error_display() {
        let err = Error::Api {
            status: 403,
            code: Some("AuthorizationFailed".to_string()),
            message: "no access".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Request failed with status 403: AuthorizationFailed: no access"
        );

        let err = Error::Api {
            status: 500,
            code: None,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Request failed with status 500: boom");
    }
}
