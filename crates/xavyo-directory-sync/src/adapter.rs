//! Attribute adapters
//!
//! An adapter moves values between the flat attribute vocabulary and one
//! part of a typed remote object graph. Three shapes exist:
//!
//! - [`SimpleAdapter`] binds one scalar or list field.
//! - [`NestedAdapter`] binds an object-valued sub-field through child
//!   simple adapters (`name_givenName` -> `name.givenName`).
//! - [`CollectionAdapter`] binds a typed item collection projected by an
//!   [`EncodingPolicy`].
//!
//! Field access is bound at construction through plain accessor functions,
//! so an adapter graph never looks anything up by name at runtime.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use tracing::{trace, warn};

use crate::change::{AttributeChange, AttributeValue, ModificationType, ObjectChange};
use crate::model::Nullable;
use crate::projector::{
    project_fields, CompositeShape, EncodingPolicy, FieldRole, SlotKey, SubField,
};
use crate::schema::{FieldDescriptor, ValueType};
use crate::error::{SyncError, SyncResult};

/// Accessor pair for one field of `T`.
pub enum FieldBinding<T> {
    String {
        get: fn(&T) -> &Nullable<String>,
        get_mut: fn(&mut T) -> &mut Nullable<String>,
    },
    Boolean {
        get: fn(&T) -> &Nullable<bool>,
        get_mut: fn(&mut T) -> &mut Nullable<bool>,
    },
    Integer {
        get: fn(&T) -> &Nullable<i64>,
        get_mut: fn(&mut T) -> &mut Nullable<i64>,
    },
    /// Multi-valued string list.
    Strings {
        get: fn(&T) -> &Nullable<Vec<String>>,
        get_mut: fn(&mut T) -> &mut Nullable<Vec<String>>,
    },
    /// Arbitrary JSON exposed as a serialized string.
    Json {
        get: fn(&T) -> &Nullable<serde_json::Value>,
        get_mut: fn(&mut T) -> &mut Nullable<serde_json::Value>,
    },
}

impl<T> Clone for FieldBinding<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FieldBinding<T> {}

impl<T> fmt::Debug for FieldBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            FieldBinding::String { .. } => "String",
            FieldBinding::Boolean { .. } => "Boolean",
            FieldBinding::Integer { .. } => "Integer",
            FieldBinding::Strings { .. } => "Strings",
            FieldBinding::Json { .. } => "Json",
        };
        f.debug_tuple("FieldBinding").field(&kind).finish()
    }
}

impl<T> FieldBinding<T> {
    pub fn string(get: fn(&T) -> &Nullable<String>, get_mut: fn(&mut T) -> &mut Nullable<String>) -> Self {
        FieldBinding::String { get, get_mut }
    }

    pub fn boolean(get: fn(&T) -> &Nullable<bool>, get_mut: fn(&mut T) -> &mut Nullable<bool>) -> Self {
        FieldBinding::Boolean { get, get_mut }
    }

    pub fn integer(get: fn(&T) -> &Nullable<i64>, get_mut: fn(&mut T) -> &mut Nullable<i64>) -> Self {
        FieldBinding::Integer { get, get_mut }
    }

    pub fn strings(
        get: fn(&T) -> &Nullable<Vec<String>>,
        get_mut: fn(&mut T) -> &mut Nullable<Vec<String>>,
    ) -> Self {
        FieldBinding::Strings { get, get_mut }
    }

    pub fn json(
        get: fn(&T) -> &Nullable<serde_json::Value>,
        get_mut: fn(&mut T) -> &mut Nullable<serde_json::Value>,
    ) -> Self {
        FieldBinding::Json { get, get_mut }
    }

    /// Value type exposed for this binding.
    pub fn value_type(&self) -> ValueType {
        match self {
            FieldBinding::Boolean { .. } => ValueType::Boolean,
            FieldBinding::Integer { .. } => ValueType::Integer,
            _ => ValueType::String,
        }
    }

    pub fn is_multi_valued(&self) -> bool {
        matches!(self, FieldBinding::Strings { .. })
    }

    /// Whether the field currently holds a value (not absent, not null).
    pub fn has_value(&self, source: &T) -> bool {
        match self {
            FieldBinding::String { get, .. } => get(source).is_value(),
            FieldBinding::Boolean { get, .. } => get(source).is_value(),
            FieldBinding::Integer { get, .. } => get(source).is_value(),
            FieldBinding::Strings { get, .. } => get(source).is_value(),
            FieldBinding::Json { get, .. } => get(source).is_value(),
        }
    }

    /// Current values; `None` when absent, null or an empty list.
    fn read(&self, source: &T) -> Option<Vec<AttributeValue>> {
        match self {
            FieldBinding::String { get, .. } => get(source).value().map(|v| vec![v.clone().into()]),
            FieldBinding::Boolean { get, .. } => get(source).value().map(|v| vec![(*v).into()]),
            FieldBinding::Integer { get, .. } => get(source).value().map(|v| vec![(*v).into()]),
            FieldBinding::Strings { get, .. } => get(source)
                .value()
                .filter(|values| !values.is_empty())
                .map(|values| values.iter().map(|v| v.as_str().into()).collect()),
            FieldBinding::Json { get, .. } => get(source)
                .value()
                .filter(|v| !v.is_null())
                .map(|v| vec![v.to_string().into()]),
        }
    }

    /// Replace the field with `values`. No values writes an explicit null.
    fn set(&self, attribute: &str, target: &mut T, values: &[AttributeValue]) -> SyncResult<()> {
        match self {
            FieldBinding::Strings { get_mut, .. } => {
                let list = values
                    .iter()
                    .map(|v| expect_string(attribute, v).map(str::to_string))
                    .collect::<SyncResult<Vec<_>>>()?;
                *get_mut(target) = Nullable::Value(list);
                Ok(())
            }
            _ => match values.first() {
                Some(value) => self.set_single(attribute, target, value),
                None => {
                    self.set_null(target);
                    Ok(())
                }
            },
        }
    }

    fn set_single(&self, attribute: &str, target: &mut T, value: &AttributeValue) -> SyncResult<()> {
        match self {
            FieldBinding::String { get_mut, .. } => {
                *get_mut(target) = Nullable::Value(expect_string(attribute, value)?.to_string());
            }
            FieldBinding::Boolean { get_mut, .. } => {
                let b = value.as_boolean().ok_or_else(|| mismatch(attribute, "boolean", value))?;
                *get_mut(target) = Nullable::Value(b);
            }
            FieldBinding::Integer { get_mut, .. } => {
                let i = value.as_integer().ok_or_else(|| mismatch(attribute, "integer", value))?;
                *get_mut(target) = Nullable::Value(i);
            }
            FieldBinding::Strings { get_mut, .. } => {
                *get_mut(target) =
                    Nullable::Value(vec![expect_string(attribute, value)?.to_string()]);
            }
            FieldBinding::Json { get_mut, .. } => {
                let raw = expect_string(attribute, value)?;
                let parsed = serde_json::from_str(raw).map_err(|source| SyncError::Serialization {
                    attribute: attribute.to_string(),
                    source,
                })?;
                *get_mut(target) = Nullable::Value(parsed);
            }
        }
        Ok(())
    }

    fn set_null(&self, target: &mut T) {
        match self {
            FieldBinding::String { get_mut, .. } => *get_mut(target) = Nullable::Null,
            FieldBinding::Boolean { get_mut, .. } => *get_mut(target) = Nullable::Null,
            FieldBinding::Integer { get_mut, .. } => *get_mut(target) = Nullable::Null,
            FieldBinding::Strings { get_mut, .. } => *get_mut(target) = Nullable::Null,
            FieldBinding::Json { get_mut, .. } => *get_mut(target) = Nullable::Null,
        }
    }

    /// Apply value adds/deletes to a list field.
    fn merge(
        &self,
        attribute: &str,
        target: &mut T,
        adds: &[AttributeValue],
        deletes: &[AttributeValue],
    ) -> SyncResult<()> {
        let FieldBinding::Strings { get_mut, .. } = self else {
            return Err(SyncError::UnsupportedModificationType {
                attribute: attribute.to_string(),
                modification: "merge on single-valued field".to_string(),
            });
        };

        let slot = get_mut(target);
        let mut list = slot.take_value().unwrap_or_default();
        for delete in deletes {
            let delete = expect_string(attribute, delete)?;
            list.retain(|v| v != delete);
        }
        for add in adds {
            let add = expect_string(attribute, add)?;
            if !list.iter().any(|v| v == add) {
                list.push(add.to_string());
            }
        }
        *slot = Nullable::Value(list);
        Ok(())
    }
}

fn expect_string<'v>(attribute: &str, value: &'v AttributeValue) -> SyncResult<&'v str> {
    value.as_str().ok_or_else(|| mismatch(attribute, "string", value))
}

fn mismatch(attribute: &str, expected: &str, value: &AttributeValue) -> SyncError {
    SyncError::invalid_value(
        attribute,
        format!("expected {expected}, got {} '{value}'", value.kind()),
    )
}

/// Adapter for one scalar or list field.
pub struct SimpleAdapter<T> {
    descriptor: FieldDescriptor,
    binding: FieldBinding<T>,
    delegated: bool,
}

impl<T> SimpleAdapter<T> {
    pub fn new(descriptor: FieldDescriptor, binding: FieldBinding<T>) -> Self {
        Self {
            descriptor,
            binding,
            delegated: false,
        }
    }

    /// Build a descriptor from the binding's shape.
    pub fn field(name: impl Into<String>, remote_path: impl Into<String>, binding: FieldBinding<T>) -> Self {
        let mut descriptor = FieldDescriptor::new(name, remote_path, binding.value_type());
        if binding.is_multi_valued() {
            descriptor = descriptor.multi_valued();
        }
        Self::new(descriptor, binding)
    }

    /// Anchor adapter over a string field.
    pub fn anchor(
        name: impl Into<String>,
        get: fn(&T) -> &Nullable<String>,
        get_mut: fn(&mut T) -> &mut Nullable<String>,
    ) -> Self {
        let name = name.into();
        Self::new(
            FieldDescriptor::anchor(name.clone(), name),
            FieldBinding::string(get, get_mut),
        )
    }

    #[must_use]
    pub fn import_only(mut self) -> Self {
        self.descriptor = self.descriptor.import_only();
        self
    }

    #[must_use]
    pub fn export_only(mut self) -> Self {
        self.descriptor = self.descriptor.export_only();
        self
    }

    #[must_use]
    pub fn with_patch(mut self, supports_patch: bool) -> Self {
        self.descriptor = self.descriptor.with_patch(supports_patch);
        self
    }

    #[must_use]
    pub fn with_null_representation(mut self, value: impl Into<AttributeValue>) -> Self {
        self.descriptor = self.descriptor.with_null_representation(value);
        self
    }

    /// The field is read by this adapter on import, but written on export by
    /// a sub-resource (reconciler, admin role call).
    #[must_use]
    pub fn delegated(mut self) -> Self {
        self.delegated = true;
        self
    }

    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    fn writes(&self) -> bool {
        !self.descriptor.is_read_only() && !self.delegated
    }

    /// Whether `pending` carries a change this adapter would write.
    pub fn is_pending(&self, pending: &ObjectChange) -> bool {
        self.writes() && pending.contains(self.name())
    }

    pub fn produce(&self, modification: ModificationType, source: &T) -> Option<AttributeChange> {
        if !self.descriptor.operation().can_import() {
            return None;
        }
        self.binding
            .read(source)
            .map(|values| AttributeChange::for_state(self.name(), modification, values))
    }

    pub fn apply(&self, changes: &ObjectChange, target: &mut T) -> SyncResult<bool> {
        if !self.writes() {
            return Ok(false);
        }
        match changes.get(self.name()) {
            Some(change) => self.apply_change(change, target),
            None => Ok(false),
        }
    }

    /// Write one change to `target`. The caller has matched the name.
    pub fn apply_change(&self, change: &AttributeChange, target: &mut T) -> SyncResult<bool> {
        let attribute = self.name();
        match change.modification() {
            ModificationType::Add | ModificationType::Replace => {
                self.binding.set(attribute, target, change.value_adds())?;
            }
            ModificationType::Update if self.descriptor.is_multi_valued() => {
                self.binding
                    .merge(attribute, target, change.value_adds(), change.value_deletes())?;
            }
            ModificationType::Update => match change.first_add() {
                Some(value) => self.binding.set_single(attribute, target, value)?,
                None if !change.value_deletes().is_empty() => self.clear(target)?,
                None => return Ok(false),
            },
            ModificationType::Delete => self.clear(target)?,
        }
        trace!(attribute, modification = %change.modification(), "field written");
        Ok(true)
    }

    /// Write the null placeholder.
    fn clear(&self, target: &mut T) -> SyncResult<()> {
        match self.descriptor.null_representation() {
            Some(placeholder) => self.binding.set_single(self.name(), target, placeholder),
            None => {
                self.binding.set_null(target);
                Ok(())
            }
        }
    }

    pub fn can_patch(&self, pending: &ObjectChange) -> bool {
        self.descriptor.supports_patch() || !pending.contains(self.name())
    }
}

trait NestedField<T>: Send + Sync {
    fn apply(&self, changes: &ObjectChange, target: &mut T) -> SyncResult<bool>;

    fn produce<'a>(
        &'a self,
        modification: ModificationType,
        source: &'a T,
    ) -> Box<dyn Iterator<Item = AttributeChange> + 'a>;

    fn is_pending(&self, pending: &ObjectChange) -> bool;
}

struct NestedBinding<T, C> {
    get: fn(&T) -> Option<&C>,
    slot: fn(&mut T) -> &mut Option<C>,
    children: Vec<SimpleAdapter<C>>,
}

impl<T, C> NestedField<T> for NestedBinding<T, C>
where
    C: Default + Send + Sync + 'static,
    T: 'static,
{
    fn apply(&self, changes: &ObjectChange, target: &mut T) -> SyncResult<bool> {
        if !self.is_pending(changes) {
            return Ok(false);
        }

        let slot = (self.slot)(target);
        let created = slot.is_none();
        let mut child = slot.take().unwrap_or_default();
        let result = self
            .children
            .iter()
            .try_fold(false, |changed, adapter| Ok(adapter.apply(changes, &mut child)? || changed));

        // A fresh sub-object is only attached when something was written to it.
        if !created || matches!(result, Ok(true)) {
            *slot = Some(child);
        }
        result
    }

    fn produce<'a>(
        &'a self,
        modification: ModificationType,
        source: &'a T,
    ) -> Box<dyn Iterator<Item = AttributeChange> + 'a> {
        match (self.get)(source) {
            Some(child) => Box::new(
                self.children
                    .iter()
                    .filter_map(move |adapter| adapter.produce(modification, child)),
            ),
            None => Box::new(std::iter::empty()),
        }
    }

    fn is_pending(&self, pending: &ObjectChange) -> bool {
        self.children.iter().any(|c| c.is_pending(pending))
    }
}

/// Adapter for an object-valued sub-field composed of child fields named
/// `{base}_{child}`.
pub struct NestedAdapter<T> {
    base_name: String,
    descriptors: Vec<FieldDescriptor>,
    inner: Box<dyn NestedField<T>>,
}

impl<T: 'static> NestedAdapter<T> {
    pub fn builder<C>(
        base_name: impl Into<String>,
        get: fn(&T) -> Option<&C>,
        slot: fn(&mut T) -> &mut Option<C>,
    ) -> NestedAdapterBuilder<T, C>
    where
        C: Default + Send + Sync + 'static,
    {
        NestedAdapterBuilder {
            base_name: base_name.into(),
            supports_patch: true,
            binding: NestedBinding {
                get,
                slot,
                children: Vec::new(),
            },
        }
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }
}

/// Builder for [`NestedAdapter`].
pub struct NestedAdapterBuilder<T, C> {
    base_name: String,
    supports_patch: bool,
    binding: NestedBinding<T, C>,
}

impl<T, C> NestedAdapterBuilder<T, C>
where
    T: 'static,
    C: Default + Send + Sync + 'static,
{
    /// Whether the sub-object may be sent in a partial update.
    #[must_use]
    pub fn with_patch(mut self, supports_patch: bool) -> Self {
        self.supports_patch = supports_patch;
        self
    }

    #[must_use]
    pub fn field(mut self, child_name: &str, binding: FieldBinding<C>) -> Self {
        let adapter = SimpleAdapter::field(
            format!("{}_{child_name}", self.base_name),
            format!("{}.{child_name}", self.base_name),
            binding,
        );
        self.binding.children.push(adapter);
        self
    }

    #[must_use]
    pub fn read_only_field(mut self, child_name: &str, binding: FieldBinding<C>) -> Self {
        self = self.field(child_name, binding);
        if let Some(last) = self.binding.children.pop() {
            self.binding.children.push(last.import_only());
        }
        self
    }

    pub fn build(mut self) -> NestedAdapter<T> {
        let supports_patch = self.supports_patch;
        self.binding.children = self
            .binding
            .children
            .into_iter()
            .map(|c| c.with_patch(supports_patch))
            .collect();
        let descriptors = self
            .binding
            .children
            .iter()
            .map(|c| c.descriptor().clone())
            .collect();
        NestedAdapter {
            base_name: self.base_name,
            descriptors,
            inner: Box::new(self.binding),
        }
    }
}

/// An item of a typed remote collection (phones, addresses, ...).
pub trait CollectionItem:
    Default + Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Whether items carry an explicit primary flag. Without one no item is
    /// primary and the collection is only reachable through typed slots.
    const HAS_PRIMARY_FLAG: bool = true;

    /// Whether a typed slot exposes every item of its type as one
    /// multi-valued field. Only meaningful for single-value items.
    const MULTI_VALUED_TYPE_SLOTS: bool = false;

    /// Value-bearing sub-fields, in schema order.
    fn sub_fields() -> Vec<(SubField, FieldBinding<Self>)>;

    /// Effective type key (custom type label when the type is custom).
    fn type_key(&self) -> Option<&str>;

    fn set_type_key(&mut self, key: &str);

    fn clear_type_key(&mut self);

    fn is_primary(&self) -> bool {
        false
    }

    fn set_primary(&mut self) {}

    fn shape(supports_patch: bool) -> CompositeShape {
        let mut shape = CompositeShape::new(
            Self::sub_fields().into_iter().map(|(sub, _)| sub).collect(),
            supports_patch,
        );
        if !Self::HAS_PRIMARY_FLAG {
            shape = shape.without_primary();
        }
        if Self::MULTI_VALUED_TYPE_SLOTS {
            shape = shape.with_multi_valued_types();
        }
        shape
    }
}

enum EntryKind<E> {
    Json,
    Value(SimpleAdapter<E>),
    TypeValues(FieldBinding<E>),
    ItemType,
}

struct CollectionEntry<E> {
    descriptor: FieldDescriptor,
    slot: Option<SlotKey>,
    kind: EntryKind<E>,
}

trait CollectionField<T>: Send + Sync {
    fn apply(&self, changes: &ObjectChange, target: &mut T) -> SyncResult<bool>;

    fn produce<'a>(
        &'a self,
        modification: ModificationType,
        source: &'a T,
    ) -> Box<dyn Iterator<Item = AttributeChange> + 'a>;
}

struct CollectionBinding<T, E> {
    name: String,
    policy: EncodingPolicy,
    get: fn(&T) -> Option<&Vec<E>>,
    slot: fn(&mut T) -> &mut Option<Vec<E>>,
    entries: Vec<CollectionEntry<E>>,
    value_bindings: Vec<FieldBinding<E>>,
    fallback_type: Option<String>,
}

impl<T, E: CollectionItem> CollectionBinding<T, E> {
    fn primary_index(items: &[E]) -> Option<usize> {
        if !E::HAS_PRIMARY_FLAG {
            return None;
        }
        items.iter().position(CollectionItem::is_primary)
    }

    /// Index of the item a slot addresses. Typed slots never match the
    /// primary item; it is only reachable through the primary slot.
    fn locate(items: &[E], slot: &SlotKey) -> Option<usize> {
        let primary = Self::primary_index(items);
        match slot {
            SlotKey::Primary => primary,
            SlotKey::Type(key) => items
                .iter()
                .enumerate()
                .position(|(i, item)| Some(i) != primary && item.type_key() == Some(key.as_str())),
        }
    }

    fn locate_or_insert(items: &mut Vec<E>, slot: &SlotKey) -> usize {
        if let Some(index) = Self::locate(items, slot) {
            return index;
        }
        let mut item = E::default();
        match slot {
            SlotKey::Primary => item.set_primary(),
            SlotKey::Type(key) => item.set_type_key(key),
        }
        items.push(item);
        items.len() - 1
    }

    /// Values of `binding` across the non-primary items typed `key`.
    fn type_values(items: &[E], key: &str, binding: FieldBinding<E>) -> Vec<AttributeValue> {
        let primary = Self::primary_index(items);
        items
            .iter()
            .enumerate()
            .filter(|(i, item)| Some(*i) != primary && item.type_key() == Some(key))
            .filter_map(|(_, item)| binding.read(item))
            .flatten()
            .collect()
    }

    /// Make the non-primary items typed `key` hold exactly the requested
    /// values. Surviving items keep their other fields and their order.
    fn apply_type_values(
        attribute: &str,
        key: &str,
        binding: FieldBinding<E>,
        change: &AttributeChange,
        items: &mut Vec<E>,
    ) -> SyncResult<bool> {
        let before = Self::type_values(items, key, binding);
        let mut desired: Vec<AttributeValue> = if change.modification() == ModificationType::Update {
            before
                .iter()
                .filter(|v| !change.value_deletes().contains(v))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        if change.modification() != ModificationType::Delete {
            for value in change.value_adds() {
                if !desired.contains(value) {
                    desired.push(value.clone());
                }
            }
        }

        let primary = Self::primary_index(items);
        let mut kept: Vec<AttributeValue> = Vec::new();
        let mut index = 0;
        items.retain(|item| {
            let position = index;
            index += 1;
            if Some(position) == primary || item.type_key() != Some(key) {
                return true;
            }
            match binding.read(item).and_then(|values| values.into_iter().next()) {
                Some(value) if desired.contains(&value) && !kept.contains(&value) => {
                    kept.push(value);
                    true
                }
                _ => false,
            }
        });

        for value in desired.iter().filter(|v| !kept.contains(v)) {
            let mut item = E::default();
            item.set_type_key(key);
            binding.set_single(attribute, &mut item, value)?;
            items.push(item);
        }

        let changed = before != Self::type_values(items, key, binding);
        if changed {
            trace!(attribute, values = desired.len(), "typed slot written");
        }
        Ok(changed)
    }

    fn is_empty_item(&self, item: &E) -> bool {
        !self.value_bindings.iter().any(|b| b.has_value(item))
    }

    fn apply_entries(&self, changes: &ObjectChange, items: &mut Vec<E>) -> SyncResult<bool> {
        let mut changed = false;
        for entry in &self.entries {
            let Some(change) = changes.get(entry.descriptor.name()) else {
                continue;
            };
            let removal = is_removal(change);

            match (&entry.kind, &entry.slot) {
                (EntryKind::Json, _) => {
                    *items = match change.first_add() {
                        Some(value) if !removal => {
                            let raw = expect_string(&self.name, value)?;
                            serde_json::from_str(raw).map_err(|source| {
                                SyncError::Serialization {
                                    attribute: self.name.clone(),
                                    source,
                                }
                            })?
                        }
                        _ => Vec::new(),
                    };
                    changed = true;
                }
                (EntryKind::Value(adapter), Some(slot)) => {
                    let index = if removal {
                        match Self::locate(items, slot) {
                            Some(index) => index,
                            None => continue,
                        }
                    } else {
                        Self::locate_or_insert(items, slot)
                    };
                    changed |= adapter.apply_change(change, &mut items[index])?;
                }
                (EntryKind::TypeValues(binding), Some(SlotKey::Type(key))) => {
                    changed |= Self::apply_type_values(
                        entry.descriptor.name(),
                        key,
                        *binding,
                        change,
                        items,
                    )?;
                }
                (EntryKind::ItemType, Some(slot)) => {
                    if removal {
                        if let Some(index) = Self::locate(items, slot) {
                            items[index].clear_type_key();
                            changed = true;
                        }
                        continue;
                    }
                    if let Some(value) = change.first_add() {
                        let key = expect_string(entry.descriptor.name(), value)?;
                        let index = Self::locate_or_insert(items, slot);
                        items[index].set_type_key(key);
                        changed = true;
                    }
                }
                _ => {}
            }
        }
        Ok(changed)
    }

    fn finish(&self, items: &mut Vec<E>) {
        items.retain(|item| !self.is_empty_item(item));
        if let Some(fallback) = &self.fallback_type {
            for item in items.iter_mut().filter(|i| i.type_key().is_none()) {
                item.set_type_key(fallback);
            }
        }
    }

    fn produce_entry(
        &self,
        entry: &CollectionEntry<E>,
        modification: ModificationType,
        items: &[E],
    ) -> Option<AttributeChange> {
        match (&entry.kind, &entry.slot) {
            (EntryKind::Json, _) => {
                if items.is_empty() {
                    return None;
                }
                match serde_json::to_string(items) {
                    Ok(json) => Some(AttributeChange::for_state(
                        entry.descriptor.name(),
                        modification,
                        [json],
                    )),
                    Err(error) => {
                        warn!(attribute = %self.name, error = %error, "Failed to serialize collection");
                        None
                    }
                }
            }
            (EntryKind::Value(adapter), Some(slot)) => Self::locate(items, slot)
                .and_then(|index| adapter.produce(modification, &items[index])),
            (EntryKind::TypeValues(binding), Some(SlotKey::Type(key))) => {
                let values = Self::type_values(items, key, *binding);
                if values.is_empty() {
                    None
                } else {
                    Some(AttributeChange::for_state(entry.descriptor.name(), modification, values))
                }
            }
            (EntryKind::ItemType, Some(slot)) => Self::locate(items, slot)
                .and_then(|index| items[index].type_key())
                .map(|key| AttributeChange::for_state(entry.descriptor.name(), modification, [key])),
            _ => None,
        }
    }
}

fn is_removal(change: &AttributeChange) -> bool {
    change.modification() == ModificationType::Delete || change.value_adds().is_empty()
}

impl<T, E> CollectionField<T> for CollectionBinding<T, E>
where
    T: 'static,
    E: CollectionItem,
{
    fn apply(&self, changes: &ObjectChange, target: &mut T) -> SyncResult<bool> {
        let slot = (self.slot)(target);
        let created = slot.is_none();
        let mut items = slot.take().unwrap_or_default();

        let result = self.apply_entries(changes, &mut items);
        if self.policy != EncodingPolicy::Json && matches!(result, Ok(true)) {
            self.finish(&mut items);
        }
        if !created || matches!(result, Ok(true)) {
            *slot = Some(items);
        }
        result
    }

    fn produce<'a>(
        &'a self,
        modification: ModificationType,
        source: &'a T,
    ) -> Box<dyn Iterator<Item = AttributeChange> + 'a> {
        match (self.get)(source) {
            Some(items) => Box::new(
                self.entries
                    .iter()
                    .filter_map(move |entry| self.produce_entry(entry, modification, items)),
            ),
            None => Box::new(std::iter::empty()),
        }
    }
}

/// Adapter for a typed item collection, projected by an encoding policy.
pub struct CollectionAdapter<T> {
    name: String,
    policy: EncodingPolicy,
    descriptors: Vec<FieldDescriptor>,
    inner: Box<dyn CollectionField<T>>,
}

impl<T: 'static> CollectionAdapter<T> {
    pub fn builder<E: CollectionItem>(
        name: impl Into<String>,
        get: fn(&T) -> Option<&Vec<E>>,
        slot: fn(&mut T) -> &mut Option<Vec<E>>,
    ) -> CollectionAdapterBuilder<T, E> {
        CollectionAdapterBuilder {
            name: name.into(),
            get,
            slot,
            policy: EncodingPolicy::default(),
            types: Vec::new(),
            supports_patch: true,
            force_type_on_missing_type: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> EncodingPolicy {
        self.policy
    }
}

/// Builder for [`CollectionAdapter`].
pub struct CollectionAdapterBuilder<T, E> {
    name: String,
    get: fn(&T) -> Option<&Vec<E>>,
    slot: fn(&mut T) -> &mut Option<Vec<E>>,
    policy: EncodingPolicy,
    types: Vec<String>,
    supports_patch: bool,
    force_type_on_missing_type: bool,
}

impl<T: 'static, E: CollectionItem> CollectionAdapterBuilder<T, E> {
    #[must_use]
    pub fn with_policy(mut self, policy: EncodingPolicy, types: Vec<String>) -> Self {
        self.policy = policy;
        self.types = types;
        self
    }

    #[must_use]
    pub fn with_patch(mut self, supports_patch: bool) -> Self {
        self.supports_patch = supports_patch;
        self
    }

    /// On export, give untyped items the first configured type.
    #[must_use]
    pub fn force_type_on_missing_type(mut self, force: bool) -> Self {
        self.force_type_on_missing_type = force;
        self
    }

    pub fn build(self) -> CollectionAdapter<T> {
        let sub_fields = E::sub_fields();
        let value_bindings: Vec<FieldBinding<E>> = sub_fields.iter().map(|(_, b)| *b).collect();
        let shape = E::shape(self.supports_patch);

        let entries: Vec<CollectionEntry<E>> =
            project_fields(&self.name, &shape, self.policy, &self.types)
                .into_iter()
                .map(|projected| {
                    let kind = match projected.role {
                        FieldRole::Json => EntryKind::Json,
                        FieldRole::ItemType => EntryKind::ItemType,
                        FieldRole::TypeValues(index) => EntryKind::TypeValues(value_bindings[index]),
                        FieldRole::Value(index) => EntryKind::Value(SimpleAdapter::new(
                            projected.descriptor.clone(),
                            value_bindings[index],
                        )),
                    };
                    CollectionEntry {
                        descriptor: projected.descriptor,
                        slot: projected.slot,
                        kind,
                    }
                })
                .collect();

        let descriptors = entries.iter().map(|e| e.descriptor.clone()).collect();
        let fallback_type = if self.force_type_on_missing_type && self.policy != EncodingPolicy::Json {
            self.types.first().cloned()
        } else {
            None
        };

        CollectionAdapter {
            name: self.name.clone(),
            policy: self.policy,
            descriptors,
            inner: Box::new(CollectionBinding {
                name: self.name,
                policy: self.policy,
                get: self.get,
                slot: self.slot,
                entries,
                value_bindings,
                fallback_type,
            }),
        }
    }
}

/// Any attribute adapter.
pub enum AttributeAdapter<T> {
    Simple(SimpleAdapter<T>),
    Nested(NestedAdapter<T>),
    Collection(CollectionAdapter<T>),
}

impl<T: 'static> AttributeAdapter<T> {
    /// Descriptors this adapter owns.
    pub fn descriptors(&self) -> &[FieldDescriptor] {
        match self {
            AttributeAdapter::Simple(a) => std::slice::from_ref(&a.descriptor),
            AttributeAdapter::Nested(a) => &a.descriptors,
            AttributeAdapter::Collection(a) => &a.descriptors,
        }
    }

    /// Whether this adapter owns the anchor.
    pub fn is_anchor(&self) -> bool {
        matches!(self, AttributeAdapter::Simple(a) if a.descriptor.is_anchor())
    }

    /// Read the adapter's fields off `source` as attribute changes.
    ///
    /// Absent values produce nothing. A missing nested sub-object or
    /// collection produces nothing either.
    pub fn produce_changes<'a>(
        &'a self,
        identity: &str,
        modification: ModificationType,
        source: &'a T,
    ) -> Box<dyn Iterator<Item = AttributeChange> + 'a> {
        trace!(identity, adapter = %self.label(), "producing changes");
        match self {
            AttributeAdapter::Simple(a) => Box::new(a.produce(modification, source).into_iter()),
            AttributeAdapter::Nested(a) => a.inner.produce(modification, source),
            AttributeAdapter::Collection(a) => a.inner.produce(modification, source),
        }
    }

    /// Write the changes addressed to this adapter into `target`.
    pub fn apply(&self, changes: &ObjectChange, target: &mut T) -> SyncResult<bool> {
        match self {
            AttributeAdapter::Simple(a) => a.apply(changes, target),
            AttributeAdapter::Nested(a) => a.inner.apply(changes, target),
            AttributeAdapter::Collection(a) => {
                if !self.is_pending(changes) {
                    return Ok(false);
                }
                a.inner.apply(changes, target)
            }
        }
    }

    /// Whether a partial update can carry this adapter's pending changes.
    pub fn can_patch(&self, pending: &ObjectChange) -> bool {
        self.descriptors()
            .iter()
            .all(|d| d.supports_patch() || !pending.contains(d.name()))
    }

    /// Whether `pending` carries a change this adapter writes.
    pub fn is_pending(&self, pending: &ObjectChange) -> bool {
        match self {
            AttributeAdapter::Simple(a) => a.is_pending(pending),
            AttributeAdapter::Nested(a) => a.inner.is_pending(pending),
            AttributeAdapter::Collection(a) => a
                .descriptors
                .iter()
                .any(|d| !d.is_read_only() && pending.contains(d.name())),
        }
    }

    /// Whether applying `pending` depends on the object's current state.
    pub fn needs_prior_state(&self, pending: &ObjectChange) -> bool {
        !matches!(self, AttributeAdapter::Simple(_)) && self.is_pending(pending)
    }

    fn label(&self) -> &str {
        match self {
            AttributeAdapter::Simple(a) => a.name(),
            AttributeAdapter::Nested(a) => &a.base_name,
            AttributeAdapter::Collection(a) => &a.name,
        }
    }
}

impl<T> From<SimpleAdapter<T>> for AttributeAdapter<T> {
    fn from(adapter: SimpleAdapter<T>) -> Self {
        AttributeAdapter::Simple(adapter)
    }
}

impl<T> From<NestedAdapter<T>> for AttributeAdapter<T> {
    fn from(adapter: NestedAdapter<T>) -> Self {
        AttributeAdapter::Nested(adapter)
    }
}

impl<T> From<CollectionAdapter<T>> for AttributeAdapter<T> {
    fn from(adapter: CollectionAdapter<T>) -> Self {
        AttributeAdapter::Collection(adapter)
    }
}

/// Confirmed changes for the `pending` attributes written by `adapters`,
/// read back from `written`, the object as the remote store returned it.
///
/// Deletes are echoed. Export-only fields cannot be read back and are
/// echoed too. A value the store no longer reports is confirmed as a
/// `Delete`.
pub fn confirmed_changes<T: 'static>(
    adapters: &[AttributeAdapter<T>],
    pending: &ObjectChange,
    identity: &str,
    modification: ModificationType,
    written: &T,
) -> Vec<AttributeChange> {
    let mut confirmed = Vec::new();
    for adapter in adapters.iter().filter(|a| a.is_pending(pending)) {
        let mut produced: Vec<AttributeChange> = adapter
            .produce_changes(identity, modification, written)
            .filter(|c| pending.contains(c.name()))
            .collect();
        for descriptor in adapter.descriptors().iter().filter(|d| !d.is_read_only()) {
            let Some(requested) = pending.get(descriptor.name()) else {
                continue;
            };
            let position = produced.iter().position(|c| c.name() == descriptor.name());
            if requested.modification() == ModificationType::Delete {
                if let Some(index) = position {
                    produced.remove(index);
                }
                confirmed.push(AttributeChange::delete(descriptor.name()));
            } else if !descriptor.operation().can_import() {
                confirmed.push(requested.clone());
            } else if let Some(index) = position {
                confirmed.push(produced.remove(index));
            } else if modification != ModificationType::Add {
                confirmed.push(AttributeChange::delete(descriptor.name()));
            }
        }
    }
    confirmed
}
