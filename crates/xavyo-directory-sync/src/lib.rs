//! # Directory Sync
//!
//! Attribute synchronization between an identity store's delta vocabulary
//! and a hosted directory API (users, groups, group settings, aliases,
//! send-as addresses).
//!
//! The identity store speaks flat attribute changes (add / replace /
//! update / delete, single- or multi-valued). The directory speaks nested
//! JSON objects plus sibling collections that have no delta semantics.
//! This crate maps between the two in both directions.
//!
//! ## Architecture
//!
//! - [`FieldDescriptor`] - one exposed attribute and how it maps remotely
//! - [`project`] - expands a composite field (phones, addresses, ...) per
//!   its [`EncodingPolicy`]
//! - [`AttributeAdapter`] - Simple / Nested / Collection adapters that read
//!   and write a typed remote object graph
//! - [`ChangeReconciler`] - diffs delta-less remote collections live
//! - [`ObjectSynchronizer`] - one object's export or import cycle
//! - [`BatchSynchronizer`] - bounded, cancellable concurrent export
//!
//! Remote calls go through the async traits in [`store`]; transport,
//! authentication and pagination live behind those traits.
//!
//! ## Example
//!
//! ```ignore
//! use xavyo_directory_sync::prelude::*;
//!
//! let config = SyncConfig::from_json(&config_json)?;
//! let directory = Directory::build(&config, &capabilities, &stores)?;
//!
//! let change = ObjectChange::new("user", ModificationType::Update, "bob@example.com")
//!     .with_anchor("1234")
//!     .with_change(AttributeChange::update("aliases", ["b@example.com"], ["a@example.com"]));
//! let confirmed = directory.users.export(&change).await?;
//!
//! let batch = BatchSynchronizer::new(directory.exporters(), config.export_concurrency);
//! let report = batch.run(changes, CancellationToken::new()).await;
//! ```
//!
//! ## Crate Organization
//!
//! - [`error`] - Error types with transient/permanent classification
//! - [`change`] - Attribute and object change vocabulary
//! - [`schema`] - Field descriptors, object types, schema registry
//! - [`projector`] - Composite field projection
//! - [`model`] - Remote object graph
//! - [`adapter`] - Attribute adapters
//! - [`store`] - Remote store traits
//! - [`reconciler`] - Collection reconciliation
//! - [`sendas`] - Send-as address formatting
//! - [`subresource`] - Sub-resource seam
//! - [`retry`] - Backoff for post-create propagation lag
//! - [`directory`] - Concrete user and group types
//! - [`synchronizer`] - Object synchronizer
//! - [`batch`] - Batch driver
//! - [`config`] - Run configuration

pub mod adapter;
pub mod batch;
pub mod change;
pub mod config;
pub mod directory;
pub mod error;
pub mod model;
pub mod projector;
pub mod reconciler;
pub mod retry;
pub mod schema;
pub mod sendas;
pub mod store;
pub mod subresource;
pub mod synchronizer;

pub use adapter::AttributeAdapter;
pub use batch::BatchSynchronizer;
pub use projector::{project, EncodingPolicy};
pub use reconciler::ChangeReconciler;
pub use schema::FieldDescriptor;
pub use synchronizer::ObjectSynchronizer;

/// Prelude module for convenient imports.
///
/// ```
/// use xavyo_directory_sync::prelude::*;
/// ```
pub mod prelude {
    // Error handling
    pub use crate::error::{RemoteError, SyncError, SyncResult};

    // Changes
    pub use crate::change::{AttributeChange, AttributeValue, ModificationType, ObjectChange};

    // Schema
    pub use crate::schema::{
        AttributeOperation, FieldDescriptor, Multiplicity, ObjectType, SchemaRegistry, TypeSchema,
        ValueType,
    };
    pub use crate::projector::{project, CompositeShape, EncodingPolicy};

    // Adapters
    pub use crate::adapter::{
        AttributeAdapter, CollectionAdapter, CollectionItem, FieldBinding, NestedAdapter,
        SimpleAdapter,
    };

    // Remote model
    pub use crate::model::{
        DirectoryObject, Group, GroupSettings, Member, MemberRole, Nullable, SendAs, User,
    };

    // Stores
    pub use crate::store::{
        AdminStore, CollectionStore, MemberStore, ObjectStore, RemoteResult, SendAsStore,
        SettingsStore,
    };

    // Reconciliation and sub-resources
    pub use crate::reconciler::{ChangeReconciler, ValueComparison};
    pub use crate::subresource::{ObjectContext, SubResource};

    // Synchronization
    pub use crate::batch::{BatchReport, BatchSynchronizer, ObjectOutcome};
    pub use crate::directory::{Directory, DirectoryStores};
    pub use crate::synchronizer::{ObjectExporter, ObjectSynchronizer};

    // Configuration
    pub use crate::config::{CompositeConfig, RetryConfig, SyncConfig, TenantCapabilities};

    pub use tokio_util::sync::CancellationToken;
}

// Re-export async_trait for store implementors
pub use async_trait::async_trait;
