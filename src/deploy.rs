//! The `deploy` workflow.
//!
//! Runs strictly in order: validate the environment, build clients, resolve
//! the model on the hub and in the registry, create the endpoint, create the
//! deployment, report connection details. The first failure aborts the run.
//! Resources created before the failure are left in place.

use std::fmt;

use tracing::{debug, error, info};

use crate::auth::DefaultAzureCredential;
use crate::azureml::{
    ArmClient, ControlPlane, LATEST_LABEL, ModelRegistry, OnlineDeployment, OnlineEndpoint,
    RegistryClient, WorkspaceClient,
};
use crate::cli::{DeployArgs, InstanceType};
use crate::config::{AppConfig, WorkspaceScope};
use crate::error::{Error, Result};
use crate::hub::{HuggingFaceHub, ModelHub};
use crate::naming;
use crate::report::Report;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    pub model_id: String,
    pub instance_type: InstanceType,
    pub instance_count: u32,
}

impl From<DeployArgs> for DeployRequest {
    fn from(args: DeployArgs) -> Self {
        Self {
            model_id: args.model_id,
            instance_type: args.instance_type,
            instance_count: args.instance_count,
        }
    }
}

/// A model validated on both the hub and the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    pub name: String,
    pub gated: bool,
    pub uri: String,
}

/// Progress of a run. A failure leaves the stage at the last one reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    EnvValidated,
    ClientReady,
    ModelResolved,
    EndpointReady,
    DeploymentReady,
    Reported,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::EnvValidated => "env-validated",
            Self::ClientReady => "client-ready",
            Self::ModelResolved => "model-resolved",
            Self::EndpointReady => "endpoint-ready",
            Self::DeploymentReady => "deployment-ready",
            Self::Reported => "reported",
        };
        f.write_str(name)
    }
}

/// Validate the environment, connect to Azure and run the deploy pipeline.
pub async fn run(args: DeployArgs, config: &AppConfig) -> Result<Report> {
    let mut stage = Stage::Init;
    let result = connect_and_deploy(args, config, &mut stage).await;
    if let Err(err) = &result {
        error!(%stage, %err, "Deployment aborted");
    }
    result
}

async fn connect_and_deploy(
    args: DeployArgs,
    config: &AppConfig,
    stage: &mut Stage,
) -> Result<Report> {
    let scope = WorkspaceScope::from_env()?;
    let request = DeployRequest::from(args);
    *stage = Stage::EnvValidated;

    let credential = DefaultAzureCredential::new(&config.azure)?.into_shared();
    let arm = ArmClient::new(credential, &config.azure)?;

    info!("WORKSPACE CLIENT INIT");
    info!("    SUBSCRIPTION_ID={}", scope.subscription_id);
    info!("    RESOURCE_GROUP_NAME={}", scope.resource_group);
    info!("    WORKSPACE_NAME={}", scope.workspace);
    let workspace =
        WorkspaceClient::connect(arm.clone(), &config.azure.resource_manager_url, &scope).await?;
    debug!(location = workspace.location(), "Workspace resolved");
    info!("WORKSPACE CLIENT SUCCESS");

    info!("REGISTRY CLIENT INIT");
    info!("    REGISTRY_NAME={}", config.azure.registry);
    let registry =
        RegistryClient::connect(arm, &config.azure.registry_discovery_url, &config.azure.registry)
            .await?;
    info!("REGISTRY CLIENT SUCCESS");

    let hub = HuggingFaceHub::from_env(&config.hub.endpoint)?;
    *stage = Stage::ClientReady;

    let mut deployer = Deployer::new(&hub, &registry, &workspace);
    let result = deployer.deploy(&request).await;
    *stage = deployer.stage();
    result
}

/// Drives a deploy run against its collaborators.
pub struct Deployer<'a> {
    hub: &'a dyn ModelHub,
    registry: &'a dyn ModelRegistry,
    control_plane: &'a dyn ControlPlane,
    stage: Stage,
}

impl<'a> Deployer<'a> {
    pub fn new(
        hub: &'a dyn ModelHub,
        registry: &'a dyn ModelRegistry,
        control_plane: &'a dyn ControlPlane,
    ) -> Self {
        Self {
            hub,
            registry,
            control_plane,
            stage: Stage::ClientReady,
        }
    }

    pub const fn stage(&self) -> Stage {
        self.stage
    }

    fn advance(&mut self, stage: Stage) {
        debug!(from = %self.stage, to = %stage, "Stage complete");
        self.stage = stage;
    }

    pub async fn deploy(&mut self, request: &DeployRequest) -> Result<Report> {
        let model = self.resolve_model(&request.model_id).await?;
        self.advance(Stage::ModelResolved);

        let endpoint = self.provision_endpoint(&model).await?;
        self.advance(Stage::EndpointReady);

        let deployment = self.provision_deployment(&endpoint, &model, request).await?;
        self.advance(Stage::DeploymentReady);

        let report = self.report(&endpoint, &deployment).await?;
        report.log();
        self.advance(Stage::Reported);

        Ok(report)
    }

    /// Check the model exists on the hub, then in the registry mirror. The
    /// mirror can lag behind the hub, so both lookups are needed.
    pub async fn resolve_model(&self, model_id: &str) -> Result<ResolvedModel> {
        naming::validate_model_id(model_id)?;

        let info = match self.hub.model_info(model_id).await {
            Ok(info) => {
                debug!(model = %info.id, gated = info.gated, "Found model on hub");
                info
            }
            Err(err @ Error::ModelNotFound { .. }) => {
                error!("MODEL={model_id} NOT FOUND ON HUGGING FACE");
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let name = naming::canonical_name(model_id);
        let registry = self.registry.name();
        match self.registry.get_model(&name, LATEST_LABEL).await {
            Ok(version) => debug!(
                id = %version.id,
                name = %version.name,
                version = %version.version,
                "Resolved registry model"
            ),
            Err(err @ Error::RegistryModelNotFound { .. }) => {
                error!("MODEL={name} NOT FOUND ON REGISTRY={registry}");
                return Err(err);
            }
            Err(err) => return Err(err),
        }

        Ok(ResolvedModel {
            uri: naming::registry_model_uri(registry, &name),
            name,
            gated: info.gated,
        })
    }

    pub async fn provision_endpoint(&self, model: &ResolvedModel) -> Result<OnlineEndpoint> {
        let endpoint = OnlineEndpoint::for_model(naming::endpoint_name(), model.gated);

        info!("ENDPOINT={} BEGIN", endpoint.name);
        info!("ENDPOINT={} CREATE / UPDATE", endpoint.name);
        self.control_plane
            .create_or_update_endpoint(&endpoint)
            .await?;
        info!("ENDPOINT={} SUCCESS", endpoint.name);

        Ok(endpoint)
    }

    pub async fn provision_deployment(
        &self,
        endpoint: &OnlineEndpoint,
        model: &ResolvedModel,
        request: &DeployRequest,
    ) -> Result<OnlineDeployment> {
        let deployment = OnlineDeployment {
            name: naming::deployment_name(),
            endpoint_name: endpoint.name.clone(),
            model: model.uri.clone(),
            instance_type: request.instance_type.sku().to_string(),
            instance_count: request.instance_count,
        };

        info!("DEPLOYMENT={} BEGIN", deployment.name);
        info!("    ENDPOINT={}", deployment.endpoint_name);
        info!("    MODEL={}", deployment.model);
        info!(
            "    INSTANCE={} x {}",
            deployment.instance_type, deployment.instance_count
        );
        info!("DEPLOYMENT={} CREATE / UPDATE", deployment.name);
        self.control_plane
            .create_or_update_deployment(&deployment)
            .await?;
        info!("DEPLOYMENT={} SUCCESS", deployment.name);

        Ok(deployment)
    }

    /// Keys are only fetched under key authentication.
    pub async fn report(
        &self,
        endpoint: &OnlineEndpoint,
        deployment: &OnlineDeployment,
    ) -> Result<Report> {
        let details = self.control_plane.get_endpoint(&endpoint.name).await?;
        let keys = if details.auth_mode.is_key() {
            Some(self.control_plane.get_endpoint_keys(&endpoint.name).await?)
        } else {
            None
        };

        Ok(Report {
            endpoint_name: details.name,
            deployment_name: deployment.name.clone(),
            scoring_uri: details.scoring_uri,
            auth_mode: details.auth_mode,
            keys,
        })
    }
}
