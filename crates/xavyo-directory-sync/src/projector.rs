//! Schema projection for composite fields
//!
//! Expands one logical composite field (phones, addresses, ...) into the
//! flat descriptors exposed in the schema, according to its encoding policy
//! and configured sub-types. Pure: identical inputs give identical output.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::{FieldDescriptor, ValueType};

/// Key of the primary slot in generated names.
pub const PRIMARY_KEY: &str = "primary";

/// How a composite field is encoded as flat attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingPolicy {
    /// One string attribute holding the serialized array.
    #[default]
    Json,
    /// Attributes for the item flagged primary only.
    PrimaryValueOnly,
    /// The primary attributes plus one attribute group per configured type.
    FlattenKnownTypes,
}

impl EncodingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodingPolicy::Json => "json",
            EncodingPolicy::PrimaryValueOnly => "primary_value_only",
            EncodingPolicy::FlattenKnownTypes => "flatten_known_types",
        }
    }
}

impl fmt::Display for EncodingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value-bearing sub-field of a composite item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubField {
    /// Name suffix; `None` for items with a single value.
    pub suffix: Option<&'static str>,
    pub remote_name: &'static str,
    pub value_type: ValueType,
}

impl SubField {
    pub const fn new(
        suffix: Option<&'static str>,
        remote_name: &'static str,
        value_type: ValueType,
    ) -> Self {
        Self {
            suffix,
            remote_name,
            value_type,
        }
    }
}

/// Shape of a composite item type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeShape {
    pub sub_fields: Vec<SubField>,
    pub supports_patch: bool,
    /// Items carry a primary flag. Without one there is no primary slot and
    /// only typed slots are projected.
    pub has_primary: bool,
    /// A typed slot holds every non-primary item of its type as one
    /// multi-valued field.
    pub multi_valued_types: bool,
}

impl CompositeShape {
    pub fn new(sub_fields: Vec<SubField>, supports_patch: bool) -> Self {
        Self {
            sub_fields,
            supports_patch,
            has_primary: true,
            multi_valued_types: false,
        }
    }

    #[must_use]
    pub fn without_primary(mut self) -> Self {
        self.has_primary = false;
        self
    }

    #[must_use]
    pub fn with_multi_valued_types(mut self) -> Self {
        self.multi_valued_types = true;
        self
    }
}

/// Which collection item a projected field addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotKey {
    Primary,
    Type(String),
}

impl SlotKey {
    pub fn as_str(&self) -> &str {
        match self {
            SlotKey::Primary => PRIMARY_KEY,
            SlotKey::Type(t) => t,
        }
    }
}

/// What a projected field carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// The whole collection, serialized.
    Json,
    /// A value sub-field, by index into [`CompositeShape::sub_fields`].
    Value(usize),
    /// The values of a sub-field across every non-primary item of a type.
    TypeValues(usize),
    /// The type of the primary item.
    ItemType,
}

/// A generated descriptor with the slot and role it maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedField {
    pub descriptor: FieldDescriptor,
    pub slot: Option<SlotKey>,
    pub role: FieldRole,
}

/// Project a composite field to its exposed descriptors.
pub fn project(
    name: &str,
    shape: &CompositeShape,
    policy: EncodingPolicy,
    configured_types: &[String],
) -> Vec<FieldDescriptor> {
    project_fields(name, shape, policy, configured_types)
        .into_iter()
        .map(|f| f.descriptor)
        .collect()
}

/// Project a composite field, keeping the slot/role binding of each
/// generated descriptor.
pub fn project_fields(
    name: &str,
    shape: &CompositeShape,
    policy: EncodingPolicy,
    configured_types: &[String],
) -> Vec<ProjectedField> {
    if policy == EncodingPolicy::Json {
        return vec![ProjectedField {
            descriptor: FieldDescriptor::new(name, name, ValueType::String)
                .with_patch(shape.supports_patch),
            slot: None,
            role: FieldRole::Json,
        }];
    }

    let mut fields = Vec::new();
    if shape.has_primary {
        fields = slot_fields(name, shape, &SlotKey::Primary);
        fields.push(ProjectedField {
            descriptor: FieldDescriptor::new(
                format!("{name}_{PRIMARY_KEY}_type"),
                format!("{name}[{PRIMARY_KEY}].type"),
                ValueType::String,
            )
            .with_patch(shape.supports_patch),
            slot: Some(SlotKey::Primary),
            role: FieldRole::ItemType,
        });
    }

    if policy == EncodingPolicy::FlattenKnownTypes || !shape.has_primary {
        for item_type in configured_types {
            fields.extend(slot_fields(name, shape, &SlotKey::Type(item_type.clone())));
        }
    }

    fields
}

fn slot_fields(name: &str, shape: &CompositeShape, slot: &SlotKey) -> Vec<ProjectedField> {
    let key = slot.as_str();
    let (selector, multi_valued) = match slot {
        SlotKey::Primary => (PRIMARY_KEY.to_string(), false),
        SlotKey::Type(t) => (format!("type={t}"), shape.multi_valued_types),
    };

    shape
        .sub_fields
        .iter()
        .enumerate()
        .map(|(index, sub)| {
            let exposed = match sub.suffix {
                Some(suffix) => format!("{name}_{key}_{suffix}"),
                None => format!("{name}_{key}"),
            };
            let mut descriptor = FieldDescriptor::new(
                exposed,
                format!("{name}[{selector}].{}", sub.remote_name),
                sub.value_type,
            )
            .with_patch(shape.supports_patch);
            if multi_valued {
                descriptor = descriptor.multi_valued();
            }
            ProjectedField {
                descriptor,
                slot: Some(slot.clone()),
                role: if multi_valued {
                    FieldRole::TypeValues(index)
                } else {
                    FieldRole::Value(index)
                },
            }
        })
        .collect()
}
