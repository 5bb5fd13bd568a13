//! Access to the cluster state the pipeline reads and writes.

use crate::{
    k8s::{
        Api, Client, DeleteParams, Deployment, ListParams, Patch, PatchParams, PostParams,
        Resource, ResourceExt, Service, VirtualService,
    },
    Error, Result,
};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

/// Services and Deployments in the application namespace.
#[async_trait]
pub trait WorkloadRegistry {
    fn namespace(&self) -> &str;

    async fn list_services(&self) -> Result<Vec<Service>>;

    async fn create_service(&self, service: &Service) -> Result<Service>;

    async fn delete_service(&self, name: &str) -> Result<()>;

    async fn list_deployments(&self) -> Result<Vec<Deployment>>;

    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment>;

    async fn delete_deployment(&self, name: &str) -> Result<()>;
}

/// Istio routing objects across all namespaces.
#[async_trait]
pub trait RoutingRegistry {
    async fn list_virtual_services(&self) -> Result<Vec<VirtualService>>;

    async fn create_virtual_service(&self, vs: &VirtualService) -> Result<VirtualService>;

    /// Submits `document` as a server-side apply patch.
    async fn apply_virtual_service(
        &self,
        namespace: &str,
        name: &str,
        document: serde_json::Value,
        params: &PatchParams,
    ) -> Result<VirtualService>;

    async fn delete_virtual_service(&self, namespace: &str, name: &str) -> Result<()>;
}

/// Registries backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeRegistry {
    client: Client,
    namespace: String,
    field_manager: String,
}

// === impl KubeRegistry ===

impl KubeRegistry {
    pub fn new(client: Client, namespace: impl ToString, field_manager: impl ToString) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
            field_manager: field_manager.to_string(),
        }
    }

    fn api<K>(&self) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            dry_run: false,
            field_manager: Some(self.field_manager.clone()),
        }
    }

    async fn create<K>(&self, kind: &'static str, api: Api<K>, object: &K) -> Result<K>
    where
        K: Resource + Clone + Debug + Serialize + DeserializeOwned,
    {
        match api.create(&self.post_params(), object).await {
            Ok(created) => {
                tracing::info!(
                    kind,
                    namespace = %created.namespace().unwrap_or_default(),
                    name = %created.name_any(),
                    "Created"
                );
                Ok(created)
            }
            Err(kube::Error::Api(rsp)) if rsp.code == 409 => Err(Error::AlreadyExists {
                kind,
                namespace: object
                    .namespace()
                    .unwrap_or_else(|| self.namespace.clone()),
                name: object.name_any(),
            }),
            Err(error) => Err(Error::transport("create", kind, error)),
        }
    }
}

/// Deletes an object, treating an already-absent object as deleted.
async fn delete<K>(kind: &'static str, api: Api<K>, name: &str) -> Result<()>
where
    K: Resource + Clone + Debug + DeserializeOwned,
{
    match api.delete(name, &DeleteParams::background()).await {
        Ok(_) => {
            tracing::info!(kind, %name, "Deleted");
            Ok(())
        }
        Err(kube::Error::Api(rsp)) if rsp.code == 404 => {
            tracing::debug!(kind, %name, "Already deleted");
            Ok(())
        }
        Err(error) => Err(Error::transport("delete", kind, error)),
    }
}

#[async_trait]
impl WorkloadRegistry for KubeRegistry {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn list_services(&self) -> Result<Vec<Service>> {
        let list = self
            .api::<Service>()
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::transport("list", "Service", e))?;
        Ok(list.items)
    }

    async fn create_service(&self, service: &Service) -> Result<Service> {
        self.create("Service", self.api(), service).await
    }

    async fn delete_service(&self, name: &str) -> Result<()> {
        delete("Service", self.api::<Service>(), name).await
    }

    async fn list_deployments(&self) -> Result<Vec<Deployment>> {
        let list = self
            .api::<Deployment>()
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::transport("list", "Deployment", e))?;
        Ok(list.items)
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment> {
        self.create("Deployment", self.api(), deployment).await
    }

    async fn delete_deployment(&self, name: &str) -> Result<()> {
        delete("Deployment", self.api::<Deployment>(), name).await
    }
}

#[async_trait]
impl RoutingRegistry for KubeRegistry {
    async fn list_virtual_services(&self) -> Result<Vec<VirtualService>> {
        let list = Api::<VirtualService>::all(self.client.clone())
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::transport("list", "VirtualService", e))?;
        Ok(list.items)
    }

    async fn create_virtual_service(&self, vs: &VirtualService) -> Result<VirtualService> {
        let ns = vs.namespace().unwrap_or_else(|| self.namespace.clone());
        let api = Api::<VirtualService>::namespaced(self.client.clone(), &ns);
        self.create("VirtualService", api, vs).await
    }

    async fn apply_virtual_service(
        &self,
        namespace: &str,
        name: &str,
        document: serde_json::Value,
        params: &PatchParams,
    ) -> Result<VirtualService> {
        Api::<VirtualService>::namespaced(self.client.clone(), namespace)
            .patch(name, params, &Patch::Apply(document))
            .await
            .map_err(|e| Error::transport("apply", "VirtualService", e))
    }

    async fn delete_virtual_service(&self, namespace: &str, name: &str) -> Result<()> {
        delete(
            "VirtualService",
            Api::<VirtualService>::namespaced(self.client.clone(), namespace),
            name,
        )
        .await
    }
}
