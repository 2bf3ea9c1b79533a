//! Sub-resources: attributes served by calls other than the base object's
//!
//! Aliases, send-as addresses and group membership go through a
//! [`ChangeReconciler`], group settings through their own settings API,
//! and the admin flag through a dedicated role call. The synchronizer runs
//! every pending sub-resource after the base object has been written.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::adapter::{confirmed_changes, AttributeAdapter};
use crate::change::{AttributeChange, ModificationType, ObjectChange};
use crate::error::{SyncError, SyncResult};
use crate::model::GroupSettings;
use crate::reconciler::ChangeReconciler;
use crate::retry::RetryPolicy;
use crate::schema::{FieldDescriptor, ValueType};
use crate::store::{AdminStore, SettingsStore};

/// The object a sub-resource works on.
#[derive(Debug, Clone, Copy)]
pub struct ObjectContext<'a> {
    pub object_type: &'a str,
    /// Remote id, or the display identity when the id is unknown.
    pub id: &'a str,
    /// Primary email after any rename.
    pub primary_identity: &'a str,
    pub modification: ModificationType,
}

impl<'a> ObjectContext<'a> {
    fn owner(&self, key: OwnerKey) -> &'a str {
        match key {
            OwnerKey::Id => self.id,
            OwnerKey::PrimaryIdentity => self.primary_identity,
        }
    }
}

/// Which identifier a sub-resource API is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKey {
    Id,
    PrimaryIdentity,
}

/// An attribute group written and read outside the base object.
#[async_trait]
pub trait SubResource: Send + Sync {
    fn name(&self) -> &str;

    /// Descriptors this sub-resource adds to the schema. Empty when a base
    /// adapter already reads the attribute off the object.
    fn descriptors(&self) -> Vec<FieldDescriptor>;

    /// Whether `change` carries anything for this sub-resource.
    fn is_pending(&self, change: &ObjectChange) -> bool;

    /// Write the pending attributes and return the confirmed changes.
    async fn apply(&self, ctx: &ObjectContext<'_>, change: &ObjectChange) -> SyncResult<Vec<AttributeChange>>;

    /// Read the current state as attribute changes.
    async fn import(&self, ctx: &ObjectContext<'_>) -> SyncResult<Vec<AttributeChange>>;
}

/// A reconciled value collection (aliases, send-as, members of a role).
pub struct CollectionSubResource {
    reconciler: ChangeReconciler,
    owner: OwnerKey,
    descriptor: Option<FieldDescriptor>,
}

impl CollectionSubResource {
    pub fn new(reconciler: ChangeReconciler, owner: OwnerKey) -> Self {
        Self {
            reconciler,
            owner,
            descriptor: None,
        }
    }

    /// Expose the attribute in the schema and read it live on import.
    #[must_use]
    pub fn with_live_import(mut self) -> Self {
        self.descriptor = Some(
            FieldDescriptor::new(self.reconciler.attribute(), self.reconciler.attribute(), ValueType::String)
                .multi_valued()
                .with_patch(false),
        );
        self
    }
}

#[async_trait]
impl SubResource for CollectionSubResource {
    fn name(&self) -> &str {
        self.reconciler.attribute()
    }

    fn descriptors(&self) -> Vec<FieldDescriptor> {
        self.descriptor.iter().cloned().collect()
    }

    fn is_pending(&self, change: &ObjectChange) -> bool {
        change.modification == ModificationType::Replace || change.contains(self.name())
    }

    async fn apply(&self, ctx: &ObjectContext<'_>, change: &ObjectChange) -> SyncResult<Vec<AttributeChange>> {
        let confirmed = self
            .reconciler
            .reconcile(
                ctx.owner(self.owner),
                ctx.primary_identity,
                change.get(self.name()),
                ctx.modification,
            )
            .await?;
        Ok(confirmed.into_iter().collect())
    }

    async fn import(&self, ctx: &ObjectContext<'_>) -> SyncResult<Vec<AttributeChange>> {
        if self.descriptor.is_none() {
            return Ok(Vec::new());
        }
        let owner = ctx.owner(self.owner);
        let values = self
            .reconciler
            .store()
            .list(owner)
            .await
            .map_err(|e| SyncError::reconciliation(owner, self.name(), e))?;
        if values.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![AttributeChange::for_state(
            self.name(),
            ctx.modification,
            values,
        )])
    }
}

/// Group settings, patched through the settings API keyed by group email.
pub struct GroupSettingsResource {
    adapters: Vec<AttributeAdapter<GroupSettings>>,
    store: Arc<dyn SettingsStore>,
}

impl GroupSettingsResource {
    pub fn new(adapters: Vec<AttributeAdapter<GroupSettings>>, store: Arc<dyn SettingsStore>) -> Self {
        Self { adapters, store }
    }
}

#[async_trait]
impl SubResource for GroupSettingsResource {
    fn name(&self) -> &str {
        "settings"
    }

    fn descriptors(&self) -> Vec<FieldDescriptor> {
        self.adapters
            .iter()
            .flat_map(|a| a.descriptors().iter().cloned())
            .collect()
    }

    fn is_pending(&self, change: &ObjectChange) -> bool {
        self.adapters.iter().any(|a| a.is_pending(change))
    }

    #[instrument(skip(self, ctx, change), fields(group = %ctx.primary_identity))]
    async fn apply(&self, ctx: &ObjectContext<'_>, change: &ObjectChange) -> SyncResult<Vec<AttributeChange>> {
        let mut settings = GroupSettings::default();
        let mut changed = false;
        for adapter in &self.adapters {
            changed |= adapter.apply(change, &mut settings)?;
        }
        if !changed {
            debug!("No settings changed");
            return Ok(Vec::new());
        }

        let written = self
            .store
            .patch(ctx.primary_identity, &settings)
            .await
            .map_err(|e| SyncError::remote("patch_settings", ctx.primary_identity, e))?;
        info!("Group settings patched");

        Ok(confirmed_changes(
            &self.adapters,
            change,
            ctx.primary_identity,
            ctx.modification,
            &written,
        ))
    }

    async fn import(&self, ctx: &ObjectContext<'_>) -> SyncResult<Vec<AttributeChange>> {
        let settings = self
            .store
            .get(ctx.primary_identity)
            .await
            .map_err(|e| SyncError::remote("get_settings", ctx.primary_identity, e))?;
        Ok(self
            .adapters
            .iter()
            .flat_map(|a| a.produce_changes(ctx.primary_identity, ctx.modification, &settings))
            .collect())
    }
}

/// The `isAdmin` flag, set through the role API.
///
/// The base adapter reads the flag off the user on import, so this only
/// writes.
pub struct AdminRoleResource {
    store: Arc<dyn AdminStore>,
    retry: RetryPolicy,
}

impl AdminRoleResource {
    pub const ATTRIBUTE: &'static str = "isAdmin";

    pub fn new(store: Arc<dyn AdminStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }
}

#[async_trait]
impl SubResource for AdminRoleResource {
    fn name(&self) -> &str {
        Self::ATTRIBUTE
    }

    fn descriptors(&self) -> Vec<FieldDescriptor> {
        Vec::new()
    }

    fn is_pending(&self, change: &ObjectChange) -> bool {
        change.contains(Self::ATTRIBUTE)
    }

    #[instrument(skip(self, ctx, change), fields(user = %ctx.id))]
    async fn apply(&self, ctx: &ObjectContext<'_>, change: &ObjectChange) -> SyncResult<Vec<AttributeChange>> {
        let Some(requested) = change.get(Self::ATTRIBUTE) else {
            return Ok(Vec::new());
        };
        let is_admin = match requested.modification() {
            ModificationType::Delete => false,
            _ => match requested.first_add() {
                Some(value) => value.as_boolean().ok_or_else(|| {
                    SyncError::invalid_value(Self::ATTRIBUTE, format!("expected boolean, got {} '{value}'", value.kind()))
                })?,
                None => false,
            },
        };

        self.retry
            .execute("set_admin", || self.store.set_admin(ctx.id, is_admin))
            .await
            .map_err(|e| SyncError::remote("set_admin", ctx.id, e))?;
        info!(is_admin, "Admin role updated");

        let confirmed = if requested.modification() == ModificationType::Delete {
            AttributeChange::delete(Self::ATTRIBUTE)
        } else {
            AttributeChange::for_state(Self::ATTRIBUTE, ctx.modification, [is_admin])
        };
        Ok(vec![confirmed])
    }

    async fn import(&self, _ctx: &ObjectContext<'_>) -> SyncResult<Vec<AttributeChange>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{FieldBinding, SimpleAdapter};
    use crate::error::RemoteError;
    use crate::model::Nullable;
    use crate::store::{CollectionStore, RemoteResult};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn ctx(modification: ModificationType) -> ObjectContext<'static> {
        ObjectContext {
            object_type: "group",
            id: "g-1",
            primary_identity: "eng@x.com",
            modification,
        }
    }

    #[derive(Default)]
    struct Values {
        values: Mutex<Vec<String>>,
        owners: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CollectionStore for Values {
        async fn list(&self, owner: &str) -> RemoteResult<Vec<String>> {
            self.owners.lock().unwrap().push(owner.to_string());
            Ok(self.values.lock().unwrap().clone())
        }

        async fn add(&self, owner: &str, value: &str) -> RemoteResult<()> {
            self.owners.lock().unwrap().push(owner.to_string());
            self.values.lock().unwrap().push(value.to_string());
            Ok(())
        }

        async fn remove(&self, _owner: &str, value: &str) -> RemoteResult<()> {
            self.values.lock().unwrap().retain(|v| v != value);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_collection_resource_uses_owner_key() {
        let store = Arc::new(Values::default());
        let resource = CollectionSubResource::new(
            ChangeReconciler::new("member", store.clone()),
            OwnerKey::PrimaryIdentity,
        )
        .with_live_import();

        let change = ObjectChange::new("group", ModificationType::Update, "eng@x.com")
            .with_change(AttributeChange::add("member", ["a@x.com"]));
        let confirmed = resource
            .apply(&ctx(ModificationType::Update), &change)
            .await
            .unwrap();

        assert_eq!(confirmed, vec![AttributeChange::update("member", ["a@x.com"], Vec::<&str>::new())]);
        assert_eq!(*store.owners.lock().unwrap(), vec!["eng@x.com"]);
    }

    #[tokio::test]
    async fn test_collection_resource_live_import() {
        let store = Arc::new(Values::default());
        store.values.lock().unwrap().push("a@x.com".into());
        let live = CollectionSubResource::new(ChangeReconciler::new("member", store.clone()), OwnerKey::Id)
            .with_live_import();
        let imported = live.import(&ctx(ModificationType::Add)).await.unwrap();
        assert_eq!(imported, vec![AttributeChange::add("member", ["a@x.com"])]);
        assert_eq!(live.descriptors().len(), 1);

        let read_off_object = CollectionSubResource::new(ChangeReconciler::new("aliases", store), OwnerKey::Id);
        assert!(read_off_object.import(&ctx(ModificationType::Add)).await.unwrap().is_empty());
        assert!(read_off_object.descriptors().is_empty());
    }

    #[derive(Default)]
    struct Settings {
        patched: Mutex<Vec<GroupSettings>>,
    }

    #[async_trait]
    impl SettingsStore for Settings {
        async fn get(&self, _group_email: &str) -> RemoteResult<GroupSettings> {
            Ok(GroupSettings {
                who_can_join: Nullable::Value("INVITED_CAN_JOIN".to_string()),
                ..GroupSettings::default()
            })
        }

        async fn patch(&self, _group_email: &str, settings: &GroupSettings) -> RemoteResult<GroupSettings> {
            self.patched.lock().unwrap().push(settings.clone());
            Ok(settings.clone())
        }
    }

    fn settings_resource(store: Arc<Settings>) -> GroupSettingsResource {
        let who_can_join = SimpleAdapter::field(
            "whoCanJoin",
            "whoCanJoin",
            FieldBinding::string(|s: &GroupSettings| &s.who_can_join, |s| &mut s.who_can_join),
        );
        GroupSettingsResource::new(vec![who_can_join.into()], store)
    }

    #[tokio::test]
    async fn test_settings_patched_only_when_changed() {
        let store = Arc::new(Settings::default());
        let resource = settings_resource(store.clone());

        let untouched = ObjectChange::new("group", ModificationType::Update, "eng@x.com")
            .with_change(AttributeChange::replace("description", ["x"]));
        assert!(!resource.is_pending(&untouched));
        assert!(resource.apply(&ctx(ModificationType::Update), &untouched).await.unwrap().is_empty());
        assert!(store.patched.lock().unwrap().is_empty());

        let change = ObjectChange::new("group", ModificationType::Update, "eng@x.com")
            .with_change(AttributeChange::replace("whoCanJoin", ["ALL_IN_DOMAIN_CAN_JOIN"]));
        let confirmed = resource.apply(&ctx(ModificationType::Update), &change).await.unwrap();
        assert_eq!(confirmed, vec![AttributeChange::replace("whoCanJoin", ["ALL_IN_DOMAIN_CAN_JOIN"])]);
        assert_eq!(store.patched.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_settings_import_reads_live() {
        let resource = settings_resource(Arc::new(Settings::default()));
        let imported = resource.import(&ctx(ModificationType::Add)).await.unwrap();
        assert_eq!(imported, vec![AttributeChange::add("whoCanJoin", ["INVITED_CAN_JOIN"])]);
    }

    #[derive(Default)]
    struct Admins {
        calls: AtomicU32,
        not_found_first: u32,
        last: Mutex<Option<bool>>,
    }

    #[async_trait]
    impl AdminStore for Admins {
        async fn set_admin(&self, user: &str, is_admin: bool) -> RemoteResult<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.not_found_first {
                return Err(RemoteError::not_found(user));
            }
            *self.last.lock().unwrap() = Some(is_admin);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_admin_retries_not_found_after_create() {
        let store = Arc::new(Admins {
            not_found_first: 2,
            ..Admins::default()
        });
        let resource = AdminRoleResource::new(store.clone(), RetryPolicy::new(5, 0));
        let change = ObjectChange::new("user", ModificationType::Add, "bob@x.com")
            .with_change(AttributeChange::add("isAdmin", [true]));

        let confirmed = resource.apply(&ctx(ModificationType::Add), &change).await.unwrap();
        assert_eq!(confirmed, vec![AttributeChange::add("isAdmin", [true])]);
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
        assert_eq!(*store.last.lock().unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_admin_delete_revokes() {
        let store = Arc::new(Admins::default());
        let resource = AdminRoleResource::new(store.clone(), RetryPolicy::none());
        let change = ObjectChange::new("user", ModificationType::Update, "bob@x.com")
            .with_change(AttributeChange::delete("isAdmin"));

        let confirmed = resource.apply(&ctx(ModificationType::Update), &change).await.unwrap();
        assert_eq!(confirmed, vec![AttributeChange::delete("isAdmin")]);
        assert_eq!(*store.last.lock().unwrap(), Some(false));
    }

    #[tokio::test]
    async fn test_admin_rejects_non_boolean() {
        let resource = AdminRoleResource::new(Arc::new(Admins::default()), RetryPolicy::none());
        let change = ObjectChange::new("user", ModificationType::Update, "bob@x.com")
            .with_change(AttributeChange::replace("isAdmin", ["yes"]));
        let err = resource.apply(&ctx(ModificationType::Update), &change).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_VALUE");
    }
}
