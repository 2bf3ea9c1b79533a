//! Change reconciliation for delta-less remote collections
//!
//! Aliases, send-as addresses and group members are plain sets on the
//! remote side. The reconciler turns an attribute delta into remove/add
//! calls against a [`CollectionStore`], diffing against a live read when
//! the delta carries full state, and reports back only what was done.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::change::{AttributeChange, ModificationType};
use crate::error::{SyncError, SyncResult};
use crate::store::CollectionStore;

/// How collection values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueComparison {
    /// Email-like values.
    CaseInsensitive,
    Exact,
}

impl ValueComparison {
    pub fn eq(&self, a: &str, b: &str) -> bool {
        match self {
            ValueComparison::CaseInsensitive => a.eq_ignore_ascii_case(b),
            ValueComparison::Exact => a == b,
        }
    }

    fn contains(&self, list: &[String], value: &str) -> bool {
        list.iter().any(|v| self.eq(v, value))
    }
}

/// Remote mutations needed for one attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub adds: Vec<String>,
    pub deletes: Vec<String>,
    /// Desired values already present remotely.
    pub retained: Vec<String>,
    /// The whole collection is being removed.
    pub full_clear: bool,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.deletes.is_empty()
    }
}

/// Mutations that completed, including convergent ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileResult {
    pub added: Vec<String>,
    pub deleted: Vec<String>,
}

/// Reconciles one collection-valued attribute against a remote store.
#[derive(Clone)]
pub struct ChangeReconciler {
    attribute: String,
    store: Arc<dyn CollectionStore>,
    comparison: ValueComparison,
}

impl ChangeReconciler {
    pub fn new(attribute: impl Into<String>, store: Arc<dyn CollectionStore>) -> Self {
        Self {
            attribute: attribute.into(),
            store,
            comparison: ValueComparison::CaseInsensitive,
        }
    }

    #[must_use]
    pub fn with_comparison(mut self, comparison: ValueComparison) -> Self {
        self.comparison = comparison;
        self
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn store(&self) -> &Arc<dyn CollectionStore> {
        &self.store
    }

    /// Work out adds and deletes for `change` under an object-level
    /// `modification`. `None` means there is nothing to reconcile.
    ///
    /// A full-state change (object `Replace`, attribute `Replace`) and an
    /// attribute `Delete` read the live collection; `Add` and `Update`
    /// take their values straight from the delta.
    pub async fn plan(
        &self,
        owner: &str,
        change: Option<&AttributeChange>,
        modification: ModificationType,
    ) -> SyncResult<Option<ReconcilePlan>> {
        if modification == ModificationType::Delete {
            return Err(SyncError::UnsupportedModificationType {
                attribute: self.attribute.clone(),
                modification: modification.to_string(),
            });
        }

        let change = match (modification, change) {
            (ModificationType::Replace, change) => return self.plan_full_state(owner, change).await,
            (_, None) => return Ok(None),
            (_, Some(change)) => change,
        };

        let plan = match change.modification() {
            ModificationType::Replace => return self.plan_full_state(owner, Some(change)).await,
            ModificationType::Add => ReconcilePlan {
                adds: change.string_adds().map(str::to_string).collect(),
                ..ReconcilePlan::default()
            },
            ModificationType::Update => ReconcilePlan {
                adds: change.string_adds().map(str::to_string).collect(),
                deletes: change.string_deletes().map(str::to_string).collect(),
                ..ReconcilePlan::default()
            },
            ModificationType::Delete => ReconcilePlan {
                deletes: self.list(owner).await?,
                full_clear: true,
                ..ReconcilePlan::default()
            },
        };
        Ok(Some(plan))
    }

    async fn plan_full_state(
        &self,
        owner: &str,
        change: Option<&AttributeChange>,
    ) -> SyncResult<Option<ReconcilePlan>> {
        let desired: Vec<String> = change
            .map(|c| c.string_adds().map(str::to_string).collect())
            .unwrap_or_default();
        let current = self.list(owner).await?;
        let (retained, adds): (Vec<String>, Vec<String>) = dedup(desired, self.comparison)
            .into_iter()
            .partition(|v| self.comparison.contains(&current, v));
        let deletes = current
            .into_iter()
            .filter(|v| !self.comparison.contains(&retained, v))
            .collect();
        Ok(Some(ReconcilePlan {
            adds,
            deletes,
            retained,
            full_clear: false,
        }))
    }

    /// Issue the plan: deletes first, then adds.
    ///
    /// Values equal to `primary_identity` are never sent to the remote
    /// store; they are reported as done. A remove that finds the value
    /// already gone counts as done. Any other failure aborts.
    #[instrument(skip(self, plan), fields(attribute = %self.attribute))]
    pub async fn execute(
        &self,
        owner: &str,
        primary_identity: &str,
        plan: &ReconcilePlan,
    ) -> SyncResult<ReconcileResult> {
        let mut result = ReconcileResult::default();

        for value in &plan.deletes {
            if value.eq_ignore_ascii_case(primary_identity) {
                debug!(value = %value, "Skipping removal of primary identity");
                result.deleted.push(value.clone());
                continue;
            }
            match self.store.remove(owner, value).await {
                Ok(()) => info!(value = %value, "Removed value"),
                Err(e) if e.is_already_absent() => {
                    info!(value = %value, "Value does not exist remotely");
                }
                Err(e) => return Err(SyncError::reconciliation(owner, &self.attribute, e)),
            }
            result.deleted.push(value.clone());
        }

        for value in &plan.adds {
            if value.eq_ignore_ascii_case(primary_identity) {
                debug!(value = %value, "Skipping add of primary identity");
                result.added.push(value.clone());
                continue;
            }
            self.store
                .add(owner, value)
                .await
                .map_err(|e| SyncError::reconciliation(owner, &self.attribute, e))?;
            info!(value = %value, "Added value");
            result.added.push(value.clone());
        }

        Ok(result)
    }

    /// Plan, execute and build the confirmed change.
    pub async fn reconcile(
        &self,
        owner: &str,
        primary_identity: &str,
        change: Option<&AttributeChange>,
        modification: ModificationType,
    ) -> SyncResult<Option<AttributeChange>> {
        let Some(plan) = self.plan(owner, change, modification).await? else {
            return Ok(None);
        };
        let result = self.execute(owner, primary_identity, &plan).await?;
        Ok(self.confirm(modification, &plan, &result))
    }

    /// The change to commit upstream.
    ///
    /// Delta runs (`Update`) report what changed: a `Delete` when the
    /// collection held values and was fully cleared, otherwise an `Update` with the values
    /// actually added and removed. Full-state runs report an `Add` with the
    /// values now present. Nothing to report yields `None`.
    pub fn confirm(
        &self,
        modification: ModificationType,
        plan: &ReconcilePlan,
        result: &ReconcileResult,
    ) -> Option<AttributeChange> {
        if modification == ModificationType::Update {
            if plan.full_clear
                && !plan.deletes.is_empty()
                && result.deleted.len() == plan.deletes.len()
            {
                return Some(AttributeChange::delete(&self.attribute));
            }
            if result.added.is_empty() && result.deleted.is_empty() {
                return None;
            }
            return Some(AttributeChange::update(
                &self.attribute,
                result.added.iter().map(String::as_str),
                result.deleted.iter().map(String::as_str),
            ));
        }

        let present: Vec<&str> = plan
            .retained
            .iter()
            .chain(&result.added)
            .map(String::as_str)
            .collect();
        if present.is_empty() {
            return None;
        }
        Some(AttributeChange::add(&self.attribute, present))
    }

    async fn list(&self, owner: &str) -> SyncResult<Vec<String>> {
        self.store
            .list(owner)
            .await
            .map_err(|e| SyncError::reconciliation(owner, &self.attribute, e))
    }
}

fn dedup(values: Vec<String>, comparison: ValueComparison) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if !comparison.contains(&out, &value) {
            out.push(value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::store::RemoteResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeAliases {
        values: Mutex<Vec<String>>,
        calls: Mutex<Vec<String>>,
        fail_remove: Mutex<Option<RemoteError>>,
    }

    impl FakeAliases {
        fn with(values: &[&str]) -> Arc<Self> {
            let fake = Self::default();
            *fake.values.lock().unwrap() = values.iter().map(|v| v.to_string()).collect();
            Arc::new(fake)
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CollectionStore for FakeAliases {
        async fn list(&self, _owner: &str) -> RemoteResult<Vec<String>> {
            Ok(self.values.lock().unwrap().clone())
        }

        async fn add(&self, _owner: &str, value: &str) -> RemoteResult<()> {
            self.calls.lock().unwrap().push(format!("add {value}"));
            self.values.lock().unwrap().push(value.to_string());
            Ok(())
        }

        async fn remove(&self, _owner: &str, value: &str) -> RemoteResult<()> {
            self.calls.lock().unwrap().push(format!("remove {value}"));
            if let Some(e) = self.fail_remove.lock().unwrap().clone() {
                return Err(e);
            }
            let mut values = self.values.lock().unwrap();
            let before = values.len();
            values.retain(|v| v != value);
            if values.len() == before {
                return Err(RemoteError::not_found(value));
            }
            Ok(())
        }
    }

    fn reconciler(store: Arc<FakeAliases>) -> ChangeReconciler {
        ChangeReconciler::new("aliases", store)
    }

    #[tokio::test]
    async fn test_replace_under_update_reports_delta() {
        let store = FakeAliases::with(&["a@x.com", "b@x.com"]);
        let change = AttributeChange::replace("aliases", ["b@x.com", "c@x.com"]);

        let confirmed = reconciler(store.clone())
            .reconcile("1", "p@x.com", Some(&change), ModificationType::Update)
            .await
            .unwrap();

        assert_eq!(store.calls(), vec!["remove a@x.com", "add c@x.com"]);
        assert_eq!(
            confirmed,
            Some(AttributeChange::update("aliases", ["c@x.com"], ["a@x.com"]))
        );
    }

    #[tokio::test]
    async fn test_replace_twice_is_idempotent() {
        let store = FakeAliases::with(&["a@x.com", "b@x.com"]);
        let change = AttributeChange::replace("aliases", ["b@x.com", "c@x.com"]);
        let r = reconciler(store.clone());

        r.reconcile("1", "p@x.com", Some(&change), ModificationType::Replace)
            .await
            .unwrap();
        let first = store.calls().len();
        let confirmed = r
            .reconcile("1", "p@x.com", Some(&change), ModificationType::Replace)
            .await
            .unwrap();

        assert_eq!(store.calls().len(), first);
        assert_eq!(
            confirmed,
            Some(AttributeChange::add("aliases", ["b@x.com", "c@x.com"]))
        );
    }

    #[tokio::test]
    async fn test_delete_never_removes_primary_identity() {
        let store = FakeAliases::with(&["a@x.com", "P@x.com"]);
        let confirmed = reconciler(store.clone())
            .reconcile(
                "1",
                "p@x.com",
                Some(&AttributeChange::delete("aliases")),
                ModificationType::Update,
            )
            .await
            .unwrap();

        assert_eq!(store.calls(), vec!["remove a@x.com"]);
        assert_eq!(confirmed, Some(AttributeChange::delete("aliases")));
    }

    #[tokio::test]
    async fn test_update_takes_values_from_delta() {
        let store = FakeAliases::with(&["a@x.com"]);
        let change = AttributeChange::update("aliases", ["c@x.com"], ["a@x.com"]);
        let plan = reconciler(store.clone())
            .plan("1", Some(&change), ModificationType::Update)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(plan.adds, vec!["c@x.com"]);
        assert_eq!(plan.deletes, vec!["a@x.com"]);
        assert!(!plan.full_clear);
    }

    #[tokio::test]
    async fn test_not_found_on_remove_counts_as_done() {
        let store = FakeAliases::with(&[]);
        let change = AttributeChange::update("aliases", Vec::<String>::new(), ["gone@x.com"]);
        let confirmed = reconciler(store.clone())
            .reconcile("1", "p@x.com", Some(&change), ModificationType::Update)
            .await
            .unwrap();
        assert_eq!(
            confirmed,
            Some(AttributeChange::update("aliases", Vec::<String>::new(), ["gone@x.com"]))
        );
    }

    #[tokio::test]
    async fn test_already_absent_invalid_input_counts_as_done() {
        let store = FakeAliases::with(&["a@x.com"]);
        *store.fail_remove.lock().unwrap() =
            Some(RemoteError::invalid_input("Invalid Input: resource_id"));
        let change = AttributeChange::update("aliases", Vec::<String>::new(), ["a@x.com"]);
        let result = reconciler(store)
            .reconcile("1", "p@x.com", Some(&change), ModificationType::Update)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_other_remove_failure_aborts_before_adds() {
        let store = FakeAliases::with(&["a@x.com"]);
        *store.fail_remove.lock().unwrap() = Some(RemoteError::failed("backend"));
        let change = AttributeChange::update("aliases", ["c@x.com"], ["a@x.com"]);
        let err = reconciler(store.clone())
            .reconcile("1", "p@x.com", Some(&change), ModificationType::Update)
            .await
            .unwrap_err();
        assert_eq!(err.attribute(), Some("aliases"));
        assert_eq!(store.calls(), vec!["remove a@x.com"]);
    }

    #[tokio::test]
    async fn test_no_change_is_no_op() {
        let store = FakeAliases::with(&["a@x.com"]);
        let confirmed = reconciler(store.clone())
            .reconcile("1", "p@x.com", None, ModificationType::Update)
            .await
            .unwrap();
        assert!(confirmed.is_none());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_of_empty_collection_reports_nothing() {
        let store = FakeAliases::with(&[]);
        let confirmed = reconciler(store.clone())
            .reconcile(
                "1",
                "p@x.com",
                Some(&AttributeChange::delete("aliases")),
                ModificationType::Update,
            )
            .await
            .unwrap();
        assert!(store.calls().is_empty());
        assert!(confirmed.is_none());
    }

    #[tokio::test]
    async fn test_object_replace_without_change_clears_collection() {
        let store = FakeAliases::with(&["a@x.com"]);
        let confirmed = reconciler(store.clone())
            .reconcile("1", "p@x.com", None, ModificationType::Replace)
            .await
            .unwrap();
        assert_eq!(store.calls(), vec!["remove a@x.com"]);
        assert!(confirmed.is_none());
    }

    #[tokio::test]
    async fn test_add_confirms_added_values() {
        let store = FakeAliases::with(&[]);
        let change = AttributeChange::add("aliases", ["a@x.com", "p@x.com"]);
        let confirmed = reconciler(store.clone())
            .reconcile("1", "p@x.com", Some(&change), ModificationType::Add)
            .await
            .unwrap();
        assert_eq!(store.calls(), vec!["add a@x.com"]);
        assert_eq!(
            confirmed,
            Some(AttributeChange::add("aliases", ["a@x.com", "p@x.com"]))
        );
    }

    #[tokio::test]
    async fn test_object_delete_is_rejected() {
        let store = FakeAliases::with(&[]);
        let err = reconciler(store)
            .plan("1", None, ModificationType::Delete)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_MODIFICATION");
    }

    #[test]
    fn test_value_comparison() {
        assert!(ValueComparison::CaseInsensitive.eq("A@x.com", "a@X.com"));
        assert!(!ValueComparison::Exact.eq("A@x.com", "a@x.com"));
    }
}
