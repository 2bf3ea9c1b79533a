//! Remote store traits
//!
//! Contracts of the transport collaborators the engine drives. Implementors
//! own the wire format, pagination and retries; every call either completes
//! or fails with a [`RemoteError`] whose `NotFound`/`InvalidInput` cases are
//! distinguishable from other failures.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::RemoteError;
use crate::model::{GroupSettings, Member, MemberRole, SendAs};

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// CRUD on a top-level directory object (user, group).
///
/// `id` is the anchor when known, otherwise the primary email; the
/// directory API accepts either as a key.
#[async_trait]
pub trait ObjectStore<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Create the object, returning it with its assigned id.
    async fn create(&self, object: &T) -> RemoteResult<T>;

    /// Full replace.
    async fn update(&self, id: &str, object: &T) -> RemoteResult<T>;

    /// Partial update; omitted fields are left untouched.
    async fn patch(&self, id: &str, object: &T) -> RemoteResult<T>;

    async fn delete(&self, id: &str) -> RemoteResult<()>;

    async fn get(&self, id: &str) -> RemoteResult<T>;
}

/// An unordered string collection owned by an object, with no delta
/// semantics (aliases, send-as addresses, members of one role).
#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn list(&self, owner: &str) -> RemoteResult<Vec<String>>;

    async fn add(&self, owner: &str, value: &str) -> RemoteResult<()>;

    /// Must fail with `NotFound` when `value` is not present.
    async fn remove(&self, owner: &str, value: &str) -> RemoteResult<()>;
}

/// Send-as addresses of a user mailbox.
#[async_trait]
pub trait SendAsStore: Send + Sync {
    async fn list(&self, user: &str) -> RemoteResult<Vec<SendAs>>;

    async fn create(&self, user: &str, send_as: &SendAs) -> RemoteResult<SendAs>;

    async fn delete(&self, user: &str, send_as_email: &str) -> RemoteResult<()>;
}

/// Group membership.
#[async_trait]
pub trait MemberStore: Send + Sync {
    async fn list(&self, group: &str) -> RemoteResult<Vec<Member>>;

    async fn insert(&self, group: &str, member: &Member) -> RemoteResult<()>;

    async fn remove(&self, group: &str, email: &str) -> RemoteResult<()>;
}

/// Group settings, keyed by group email.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, group_email: &str) -> RemoteResult<GroupSettings>;

    async fn patch(&self, group_email: &str, settings: &GroupSettings) -> RemoteResult<GroupSettings>;
}

/// Super-admin role assignment.
#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn set_admin(&self, user: &str, is_admin: bool) -> RemoteResult<()>;
}

/// Members of one role viewed as a plain collection of emails.
#[derive(Clone)]
pub struct RoleMembers {
    store: Arc<dyn MemberStore>,
    role: MemberRole,
}

impl RoleMembers {
    pub fn new(store: Arc<dyn MemberStore>, role: MemberRole) -> Self {
        Self { store, role }
    }

    pub fn role(&self) -> MemberRole {
        self.role
    }
}

#[async_trait]
impl CollectionStore for RoleMembers {
    async fn list(&self, owner: &str) -> RemoteResult<Vec<String>> {
        Ok(self
            .store
            .list(owner)
            .await?
            .into_iter()
            .filter(|m| m.role == self.role)
            .map(|m| m.email)
            .collect())
    }

    async fn add(&self, owner: &str, value: &str) -> RemoteResult<()> {
        let member = Member {
            email: value.to_string(),
            role: self.role,
        };
        self.store.insert(owner, &member).await
    }

    async fn remove(&self, owner: &str, value: &str) -> RemoteResult<()> {
        self.store.remove(owner, value).await
    }
}
