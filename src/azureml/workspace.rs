//! Online endpoints and deployments in an Azure ML workspace.

use async_trait::async_trait;
use serde::Deserialize;

use crate::azureml::client::ArmClient;
use crate::azureml::model::{
    EndpointDetails, EndpointKeys, EndpointResource, OnlineDeployment, OnlineEndpoint,
};
use crate::azureml::ControlPlane;
use crate::config::WorkspaceScope;
use crate::error::Result;

#[derive(Deserialize)]
struct WorkspaceResource {
    location: String,
}

/// Control-plane client scoped to one workspace.
#[derive(Clone)]
pub struct WorkspaceClient {
    arm: ArmClient,
    base_url: String,
    location: String,
}

impl WorkspaceClient {
    /// Connect to the workspace, failing if it does not exist or is not
    /// accessible.
    pub async fn connect(
        arm: ArmClient,
        resource_manager_url: &str,
        scope: &WorkspaceScope,
    ) -> Result<Self> {
        let base_url = format!(
            "{}{}",
            resource_manager_url.trim_end_matches('/'),
            scope.resource_id()
        );
        let workspace: WorkspaceResource = arm.get(&base_url, &[]).await?;

        Ok(Self {
            arm,
            base_url,
            location: workspace.location,
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    fn endpoint_url(&self, name: &str) -> String {
        format!("{}/onlineEndpoints/{name}", self.base_url)
    }
}

#[async_trait]
impl ControlPlane for WorkspaceClient {
    async fn create_or_update_endpoint(&self, endpoint: &OnlineEndpoint) -> Result<()> {
        self.arm
            .put_and_wait(
                &self.endpoint_url(&endpoint.name),
                &endpoint.to_resource(&self.location),
                &format!("endpoint {}", endpoint.name),
            )
            .await
    }

    async fn create_or_update_deployment(&self, deployment: &OnlineDeployment) -> Result<()> {
        let url = format!(
            "{}/deployments/{}",
            self.endpoint_url(&deployment.endpoint_name),
            deployment.name
        );
        self.arm
            .put_and_wait(
                &url,
                &deployment.to_resource(&self.location),
                &format!("deployment {}", deployment.name),
            )
            .await
    }

    async fn get_endpoint(&self, name: &str) -> Result<EndpointDetails> {
        let resource: EndpointResource = self.arm.get(&self.endpoint_url(name), &[]).await?;
        Ok(resource.into())
    }

    async fn get_endpoint_keys(&self, name: &str) -> Result<EndpointKeys> {
        self.arm
            .post(&format!("{}/listKeys", self.endpoint_url(name)))
            .await
    }
}
