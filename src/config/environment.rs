//! Workspace scope resolved from the process environment.

use crate::error::{Error, Result};

pub const SUBSCRIPTION_ID: &str = "SUBSCRIPTION_ID";
pub const RESOURCE_GROUP: &str = "RESOURCE_GROUP";
pub const FOUNDRY_PROJECT: &str = "FOUNDRY_PROJECT";

/// The variables every deploy run requires, in reporting order.
pub const REQUIRED: [&str; 3] = [SUBSCRIPTION_ID, RESOURCE_GROUP, FOUNDRY_PROJECT];

/// Target of every endpoint and deployment operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceScope {
    pub subscription_id: String,
    pub resource_group: String,
    /// Microsoft Foundry hub-based project, i.e. the Azure ML workspace name.
    pub workspace: String,
}

impl WorkspaceScope {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve the scope through `lookup`. Every missing or empty variable is
    /// collected before failing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |name: &str| lookup(name).filter(|value| !value.is_empty());

        match (read(SUBSCRIPTION_ID), read(RESOURCE_GROUP), read(FOUNDRY_PROJECT)) {
            (Some(subscription_id), Some(resource_group), Some(workspace)) => Ok(Self {
                subscription_id,
                resource_group,
                workspace,
            }),
            _ => Err(Error::MissingEnvironment {
                missing: REQUIRED
                    .into_iter()
                    .filter(|&name| read(name).is_none())
                    .collect(),
            }),
        }
    }

    /// ARM resource id of the workspace.
    pub fn resource_id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.MachineLearningServices/workspaces/{}",
            self.subscription_id, self.resource_group, self.workspace
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_all_present() {
        let scope = WorkspaceScope::from_lookup(lookup_from(&[
            (SUBSCRIPTION_ID, "sub"),
            (RESOURCE_GROUP, "rg"),
            (FOUNDRY_PROJECT, "project"),
        ]))
        .unwrap();

        assert_eq!(scope.subscription_id, "sub");
        assert_eq!(scope.resource_group, "rg");
        assert_eq!(scope.workspace, "project");
        assert_eq!(
            scope.resource_id(),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/project"
        );
    }

    #[test]
    fn test_every_missing_subset_is_named() {
        // Bit i set means REQUIRED[i] is present.
        for mask in 0u8..7 {
            let present: Vec<(&str, &str)> = REQUIRED
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, name)| (*name, "value"))
                .collect();
            let expected: Vec<&str> = REQUIRED
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) == 0)
                .map(|(_, name)| *name)
                .collect();

            match WorkspaceScope::from_lookup(lookup_from(&present)) {
                Err(Error::MissingEnvironment { missing }) => {
                    assert_eq!(missing, expected, "mask {mask:#05b}");
                    let message = Error::MissingEnvironment { missing }.to_string();
                    let named = message.split(" not set").next().unwrap();
                    for name in REQUIRED {
                        assert_eq!(
                            named.contains(&format!("`{name}`")),
                            expected.contains(&name),
                            "mask {mask:#05b}: {named}"
                        );
                    }
                }
                other => panic!("expected MissingEnvironment for mask {mask:#05b}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let err = WorkspaceScope::from_lookup(lookup_from(&[
            (SUBSCRIPTION_ID, "sub"),
            (RESOURCE_GROUP, ""),
            (FOUNDRY_PROJECT, "project"),
        ]))
        .unwrap_err();

        assert!(matches!(
            err,
            Error::MissingEnvironment { ref missing } if missing == &vec![RESOURCE_GROUP]
        ));
    }
}
