//! Object synchronizer
//!
//! Runs one object through a full export cycle (build or fetch the remote
//! object, apply adapters, write it, then drive sub-resources) and projects
//! remote objects back into attribute changes on import.

use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::adapter::confirmed_changes;
use crate::change::{ModificationType, ObjectChange};
use crate::error::{SyncError, SyncResult};
use crate::model::DirectoryObject;
use crate::schema::ObjectType;
use crate::store::ObjectStore;
use crate::subresource::{ObjectContext, SubResource};

/// Exports object changes of one logical object type.
#[async_trait]
pub trait ObjectExporter: Send + Sync {
    /// Logical object type name this exporter handles.
    fn type_name(&self) -> &str;

    /// Apply `change` remotely and return the confirmed change.
    async fn export(&self, change: &ObjectChange) -> SyncResult<ObjectChange>;
}

/// Synchronizes objects of type `T` against an [`ObjectStore`].
pub struct ObjectSynchronizer<T> {
    object_type: Arc<ObjectType<T>>,
    store: Arc<dyn ObjectStore<T>>,
    sub_resources: Vec<Arc<dyn SubResource>>,
    settling_delay: Duration,
    filter: Option<Regex>,
}

impl<T: DirectoryObject> ObjectSynchronizer<T> {
    pub fn new(object_type: Arc<ObjectType<T>>, store: Arc<dyn ObjectStore<T>>) -> Self {
        Self {
            object_type,
            store,
            sub_resources: Vec::new(),
            settling_delay: Duration::ZERO,
            filter: None,
        }
    }

    /// Sub-resources run in the order given, after the base object.
    #[must_use]
    pub fn with_sub_resources(mut self, sub_resources: Vec<Arc<dyn SubResource>>) -> Self {
        self.sub_resources = sub_resources;
        self
    }

    /// Wait between creating an object and touching its sub-resources.
    #[must_use]
    pub fn with_settling_delay(mut self, delay: Duration) -> Self {
        self.settling_delay = delay;
        self
    }

    /// Skip imported objects whose display identity does not match.
    #[must_use]
    pub fn with_filter(mut self, filter: Option<Regex>) -> Self {
        self.filter = filter;
        self
    }

    pub fn object_type(&self) -> &ObjectType<T> {
        &self.object_type
    }

    pub fn name(&self) -> &str {
        self.object_type.name()
    }

    /// Apply one object change and return what was confirmed.
    #[instrument(
        skip(self, change),
        fields(object_type = %self.name(), identity = %change.dn, modification = %change.modification)
    )]
    pub async fn export(&self, change: &ObjectChange) -> SyncResult<ObjectChange> {
        if change.object_type != self.name() {
            return Err(SyncError::invalid_configuration(format!(
                "change for object type '{}' routed to the '{}' synchronizer",
                change.object_type,
                self.name()
            )));
        }
        self.object_type.schema().check_change(change)?;

        match change.modification {
            ModificationType::Add => self.create(change).await,
            ModificationType::Replace | ModificationType::Update => self.modify(change).await,
            ModificationType::Delete => self.delete(change).await,
        }
    }

    async fn create(&self, change: &ObjectChange) -> SyncResult<ObjectChange> {
        let mut object = T::for_identity(&change.dn);
        for adapter in self.object_type.adapters() {
            adapter.apply(change, &mut object)?;
        }

        let created = self
            .store
            .create(&object)
            .await
            .map_err(|e| SyncError::remote("create", &change.dn, e))?;
        let id = created.id().unwrap_or(&change.dn).to_string();
        info!(id = %id, "Object created");

        let mut confirmed = ObjectChange::new(self.name(), ModificationType::Add, &change.dn).with_anchor(&id);
        confirmed.changes = confirmed_changes(
            self.object_type.adapters(),
            change,
            &change.dn,
            ModificationType::Add,
            &created,
        );

        if self.has_pending_sub_resources(change) && !self.settling_delay.is_zero() {
            debug!(delay_ms = self.settling_delay.as_millis() as u64, "Waiting for the new object to settle");
            tokio::time::sleep(self.settling_delay).await;
        }

        let primary = created.primary_identity().unwrap_or(&change.dn).to_string();
        self.run_sub_resources(change, &id, &primary, &mut confirmed).await?;
        Ok(confirmed)
    }

    async fn modify(&self, change: &ObjectChange) -> SyncResult<ObjectChange> {
        let identity = change.identity();
        let adapters = self.object_type.adapters();
        let mut confirmed = ObjectChange::new(self.name(), change.modification, change.effective_dn());
        confirmed.anchor = change.anchor.clone();

        let base_pending = change.new_dn.is_some() || adapters.iter().any(|a| a.is_pending(change));
        if base_pending {
            let can_patch = adapters.iter().all(|a| a.can_patch(change));
            let needs_prior_state = !can_patch || adapters.iter().any(|a| a.needs_prior_state(change));

            let mut object = if needs_prior_state {
                debug!(can_patch, "Fetching current object");
                self.store
                    .get(identity)
                    .await
                    .map_err(|e| SyncError::remote("get", identity, e))?
            } else {
                T::default()
            };

            let mut changed = false;
            if let Some(new_dn) = &change.new_dn {
                info!(new_dn = %new_dn, "Renaming object");
                object.set_primary_identity(new_dn);
                changed = true;
            }
            for adapter in adapters {
                changed |= adapter.apply(change, &mut object)?;
            }

            if changed {
                let written = if can_patch {
                    self.store.patch(identity, &object).await
                } else {
                    self.store.update(identity, &object).await
                }
                .map_err(|e| SyncError::remote(if can_patch { "patch" } else { "update" }, identity, e))?;
                info!(patched = can_patch, "Object updated");

                confirmed.changes = confirmed_changes(adapters, change, identity, change.modification, &written);
                if let Some(id) = written.id() {
                    confirmed.anchor = Some(id.to_string());
                }
            } else {
                debug!("No base fields changed");
            }
        }

        let id = confirmed.anchor.clone().unwrap_or_else(|| identity.to_string());
        self.run_sub_resources(change, &id, change.effective_dn(), &mut confirmed)
            .await?;
        Ok(confirmed)
    }

    async fn delete(&self, change: &ObjectChange) -> SyncResult<ObjectChange> {
        let identity = change.identity();
        match self.store.delete(identity).await {
            Ok(()) => info!("Object deleted"),
            Err(e) if e.is_not_found() => warn!(error = %e, "Object already deleted"),
            Err(e) => return Err(SyncError::remote("delete", identity, e)),
        }
        let mut confirmed = ObjectChange::new(self.name(), ModificationType::Delete, &change.dn);
        confirmed.anchor = change.anchor.clone();
        Ok(confirmed)
    }

    fn has_pending_sub_resources(&self, change: &ObjectChange) -> bool {
        self.sub_resources.iter().any(|r| r.is_pending(change))
    }

    async fn run_sub_resources(
        &self,
        change: &ObjectChange,
        id: &str,
        primary_identity: &str,
        confirmed: &mut ObjectChange,
    ) -> SyncResult<()> {
        let ctx = ObjectContext {
            object_type: self.name(),
            id,
            primary_identity,
            modification: change.modification,
        };
        for resource in self.sub_resources.iter().filter(|r| r.is_pending(change)) {
            debug!(sub_resource = %resource.name(), "Applying sub-resource");
            confirmed.changes.extend(resource.apply(&ctx, change).await?);
        }
        Ok(())
    }

    /// Fetch an object by anchor or primary email and project it.
    #[instrument(skip(self), fields(object_type = %self.name()))]
    pub async fn import(&self, key: &str) -> SyncResult<Option<ObjectChange>> {
        let object = self
            .store
            .get(key)
            .await
            .map_err(|e| SyncError::remote("get", key, e))?;
        self.import_object(&object, ModificationType::Add).await
    }

    /// Project `source` into an object change. `None` when the configured
    /// filter rejects the object.
    pub async fn import_object(
        &self,
        source: &T,
        modification: ModificationType,
    ) -> SyncResult<Option<ObjectChange>> {
        let Some(dn) = source.primary_identity().or_else(|| source.id()) else {
            return Err(SyncError::invalid_value(
                self.object_type.schema().anchor().name(),
                "imported object has neither an id nor a primary identity",
            ));
        };
        if let Some(filter) = &self.filter {
            if !filter.is_match(dn) {
                debug!(identity = %dn, "Object excluded by filter");
                return Ok(None);
            }
        }

        let mut imported = ObjectChange::new(self.name(), modification, dn);
        imported.anchor = source.id().map(str::to_string);
        for adapter in self.object_type.adapters().iter().filter(|a| !a.is_anchor()) {
            imported
                .changes
                .extend(adapter.produce_changes(dn, modification, source));
        }

        let id = source.id().unwrap_or(dn);
        let ctx = ObjectContext {
            object_type: self.name(),
            id,
            primary_identity: dn,
            modification,
        };
        for resource in &self.sub_resources {
            imported.changes.extend(resource.import(&ctx).await?);
        }
        Ok(Some(imported))
    }
}

#[async_trait]
impl<T: DirectoryObject> ObjectExporter for ObjectSynchronizer<T> {
    fn type_name(&self) -> &str {
        self.name()
    }

    async fn export(&self, change: &ObjectChange) -> SyncResult<ObjectChange> {
        ObjectSynchronizer::export(self, change).await
    }
}
