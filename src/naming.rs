//! Resource names and model URIs.

use uuid::Uuid;

use crate::error::{Error, Result};

const SUFFIX_LEN: usize = 8;
const MAX_NAME_LEN: usize = 96;

/// Check `model_id` is a plain hub repo id (`name` or `namespace/name`), so
/// the hub, the registry and the deployment all refer to the same model.
pub fn validate_model_id(model_id: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidModelId {
        model_id: model_id.to_string(),
        reason: reason.to_string(),
    };

    let (namespace, name) = match model_id.split_once('/') {
        Some((namespace, name)) => (Some(namespace), name),
        None => (None, model_id),
    };
    if name.contains('/') {
        return Err(invalid("at most one '/' is allowed"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid("name is longer than 96 characters"));
    }

    for part in namespace.into_iter().chain([name]) {
        if part.is_empty() {
            return Err(invalid("empty namespace or name"));
        }
        if !part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(invalid("only letters, digits, '-', '_' and '.' are allowed"));
        }
        if part.starts_with(['-', '.']) || part.ends_with(['-', '.']) {
            return Err(invalid("cannot start or end with '-' or '.'"));
        }
    }
    if model_id.contains("--") || model_id.contains("..") {
        return Err(invalid("'--' and '..' are forbidden"));
    }
    if model_id.ends_with(".git") {
        return Err(invalid("cannot end with '.git'"));
    }

    Ok(())
}

/// Canonical registry name for a hub model id, e.g. `Org/Name_v2` -> `org-name-v2`.
pub fn canonical_name(model_id: &str) -> String {
    model_id.replace(['/', '_'], "-").to_lowercase()
}

/// URI of the latest version of `name` in an Azure ML registry.
pub fn registry_model_uri(registry: &str, name: &str) -> String {
    format!("azureml://registries/{registry}/models/{name}/labels/latest")
}

pub fn endpoint_name() -> String {
    format!("endpoint-{}", random_suffix())
}

pub fn deployment_name() -> String {
    format!("deployment-{}", random_suffix())
}

/// Eight lowercase hex characters. Uniqueness is best effort.
fn random_suffix() -> String {
    let mut suffix = Uuid::new_v4().simple().to_string();
    suffix.truncate(SUFFIX_LEN);
    suffix
}
