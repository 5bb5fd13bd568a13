use crate::{
    k8s::{PatchParams, ResourceExt, VirtualService},
    registry::RoutingRegistry,
    Result,
};

/// Submits routing objects with server-side apply.
///
/// Fields owned by the applier's field manager are overwritten; with `force`
/// set, conflicting ownership held by other managers is taken over. Fields
/// owned only by other managers are left alone.
#[derive(Clone, Debug)]
pub struct PatchApplier {
    field_manager: String,
    force: bool,
}

// === impl PatchApplier ===

impl PatchApplier {
    pub fn new(field_manager: impl ToString) -> Self {
        Self {
            field_manager: field_manager.to_string(),
            force: true,
        }
    }

    pub fn params(&self) -> PatchParams {
        let params = PatchParams::apply(&self.field_manager);
        if self.force {
            params.force()
        } else {
            params
        }
    }

    pub async fn apply<R>(&self, registry: &R, vs: &VirtualService) -> Result<VirtualService>
    where
        R: RoutingRegistry + Sync + ?Sized,
    {
        let name = vs.name_any();
        let namespace = vs.namespace().unwrap_or_default();
        let document = serde_json::to_value(vs)?;

        tracing::debug!(%namespace, %name, field_manager = %self.field_manager, "Applying");
        let applied = registry
            .apply_virtual_service(&namespace, &name, document, &self.params())
            .await?;
        tracing::info!(%namespace, %name, "Applied VirtualService");
        Ok(applied)
    }
}
