//! Directory sync schema types
//!
//! Field descriptors, the per-type schema they form, and the registry that
//! is built once per run and passed to every component that needs it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::adapter::AttributeAdapter;
use crate::change::{AttributeValue, ObjectChange};
use crate::error::{SyncError, SyncResult};

/// Data type of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Boolean,
    Integer,
    /// A string referencing another object (e.g. a member email).
    Reference,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Boolean => "boolean",
            ValueType::Integer => "integer",
            ValueType::Reference => "reference",
        }
    }

    /// Whether `value` is a legal value of this type.
    pub fn accepts(&self, value: &AttributeValue) -> bool {
        matches!(
            (self, value),
            (ValueType::String | ValueType::Reference, AttributeValue::String(_))
                | (ValueType::Boolean, AttributeValue::Boolean(_))
                | (ValueType::Integer, AttributeValue::Integer(_))
        )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Multiplicity {
    Single,
    Multi,
}

/// Direction(s) in which a field flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeOperation {
    ImportOnly,
    ExportOnly,
    ImportExport,
}

impl AttributeOperation {
    pub fn can_import(&self) -> bool {
        !matches!(self, AttributeOperation::ExportOnly)
    }

    pub fn can_export(&self) -> bool {
        !matches!(self, AttributeOperation::ImportOnly)
    }
}

/// Declarative definition of one exposed attribute.
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    name: String,
    remote_path: String,
    value_type: ValueType,
    multiplicity: Multiplicity,
    operation: AttributeOperation,
    is_anchor: bool,
    supports_patch: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    null_representation: Option<AttributeValue>,
}

impl FieldDescriptor {
    /// Create a single-valued, import/export, patchable descriptor.
    pub fn new(
        name: impl Into<String>,
        remote_path: impl Into<String>,
        value_type: ValueType,
    ) -> Self {
        Self {
            name: name.into(),
            remote_path: remote_path.into(),
            value_type,
            multiplicity: Multiplicity::Single,
            operation: AttributeOperation::ImportExport,
            is_anchor: false,
            supports_patch: true,
            null_representation: None,
        }
    }

    /// Anchor descriptor. Anchors are always import-only.
    pub fn anchor(name: impl Into<String>, remote_path: impl Into<String>) -> Self {
        Self {
            is_anchor: true,
            operation: AttributeOperation::ImportOnly,
            ..Self::new(name, remote_path, ValueType::String)
        }
    }

    #[must_use]
    pub fn multi_valued(mut self) -> Self {
        self.multiplicity = Multiplicity::Multi;
        self
    }

    #[must_use]
    pub fn import_only(mut self) -> Self {
        self.operation = AttributeOperation::ImportOnly;
        self
    }

    #[must_use]
    pub fn export_only(mut self) -> Self {
        self.operation = AttributeOperation::ExportOnly;
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: AttributeOperation) -> Self {
        self.operation = operation;
        self
    }

    #[must_use]
    pub fn with_patch(mut self, supports_patch: bool) -> Self {
        self.supports_patch = supports_patch;
        self
    }

    /// Value written on `Delete` instead of an explicit null.
    #[must_use]
    pub fn with_null_representation(mut self, value: impl Into<AttributeValue>) -> Self {
        self.null_representation = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn multiplicity(&self) -> Multiplicity {
        self.multiplicity
    }

    pub fn is_multi_valued(&self) -> bool {
        self.multiplicity == Multiplicity::Multi
    }

    pub fn operation(&self) -> AttributeOperation {
        self.operation
    }

    pub fn is_read_only(&self) -> bool {
        self.operation == AttributeOperation::ImportOnly
    }

    pub fn is_anchor(&self) -> bool {
        self.is_anchor
    }

    pub fn supports_patch(&self) -> bool {
        self.supports_patch
    }

    pub fn null_representation(&self) -> Option<&AttributeValue> {
        self.null_representation.as_ref()
    }
}

/// The descriptors of one logical object type, validated.
#[derive(Debug, Clone, Serialize)]
pub struct TypeSchema {
    name: String,
    descriptors: Vec<FieldDescriptor>,
    #[serde(skip)]
    anchor: usize,
}

impl TypeSchema {
    /// Validate and build. Exactly one read-only anchor and unique names
    /// are required.
    pub fn new(name: impl Into<String>, descriptors: Vec<FieldDescriptor>) -> SyncResult<Self> {
        let name = name.into();
        let invalid = |message: String| SyncError::InvalidSchema {
            object_type: name.clone(),
            message,
        };

        let anchors: Vec<usize> = descriptors
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_anchor)
            .map(|(i, _)| i)
            .collect();
        let anchor = match anchors.as_slice() {
            [i] if descriptors[*i].is_read_only() => *i,
            [i] => {
                return Err(invalid(format!(
                    "anchor '{}' must be read-only",
                    descriptors[*i].name
                )));
            }
            [] => return Err(invalid("no anchor field defined".into())),
            _ => return Err(invalid(format!("{} anchor fields defined", anchors.len()))),
        };

        let mut seen = HashSet::new();
        if let Some(duplicate) = descriptors.iter().find(|d| !seen.insert(d.name.as_str())) {
            return Err(invalid(format!("field '{}' defined twice", duplicate.name)));
        }

        Ok(Self {
            name,
            descriptors,
            anchor,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptors(&self) -> &[FieldDescriptor] {
        &self.descriptors
    }

    pub fn anchor(&self) -> &FieldDescriptor {
        &self.descriptors[self.anchor]
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Reject any change naming an attribute outside this type.
    pub fn check_change(&self, change: &ObjectChange) -> SyncResult<()> {
        match change.names().find(|n| !self.has_attribute(n)) {
            Some(unknown) => Err(SyncError::UnknownAttribute {
                attribute: unknown.to_string(),
                object_type: self.name.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// A logical object type bound to its remote model `T`: the adapters that
/// own base-object fields plus the descriptors owned by sub-resources.
pub struct ObjectType<T> {
    schema: TypeSchema,
    adapters: Vec<AttributeAdapter<T>>,
}

impl<T: 'static> ObjectType<T> {
    /// Build from the base adapters and the descriptors handled by
    /// sub-resources (reconcilers, settings, admin role).
    pub fn new(
        name: impl Into<String>,
        adapters: Vec<AttributeAdapter<T>>,
        delegated: Vec<FieldDescriptor>,
    ) -> SyncResult<Self> {
        let descriptors = adapters
            .iter()
            .flat_map(|a| a.descriptors().iter().cloned())
            .chain(delegated)
            .collect();
        let schema = TypeSchema::new(name, descriptors)?;
        Ok(Self { schema, adapters })
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &TypeSchema {
        &self.schema
    }

    pub fn adapters(&self) -> &[AttributeAdapter<T>] {
        &self.adapters
    }
}

impl<T> fmt::Debug for ObjectType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectType")
            .field("name", &self.schema.name)
            .field("adapters", &self.adapters.len())
            .finish()
    }
}

/// Read-only registry of logical object type schemas for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaRegistry {
    types: BTreeMap<String, TypeSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type schema, rejecting a second registration of the same name.
    pub fn register(&mut self, schema: TypeSchema) -> SyncResult<()> {
        if self.types.contains_key(schema.name()) {
            return Err(SyncError::invalid_configuration(format!(
                "object type '{}' registered twice",
                schema.name()
            )));
        }
        self.types.insert(schema.name().to_string(), schema);
        Ok(())
    }

    pub fn get(&self, object_type: &str) -> Option<&TypeSchema> {
        self.types.get(object_type)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
