//! Identity-store delta vocabulary
//!
//! Attribute values, attribute-level changes and object-level changes
//! exchanged with the identity store in both directions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A string value (also used for references).
    String(String),
    /// An integer value.
    Integer(i64),
    /// A boolean value.
    Boolean(bool),
}

impl AttributeValue {
    /// Get as a string if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as an integer if this is an integer value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as a boolean if this is a boolean value.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            AttributeValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            AttributeValue::String(_) => "string",
            AttributeValue::Integer(_) => "integer",
            AttributeValue::Boolean(_) => "boolean",
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => f.write_str(s),
            AttributeValue::Integer(i) => write!(f, "{i}"),
            AttributeValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Integer(i)
    }
}

impl From<i32> for AttributeValue {
    fn from(i: i32) -> Self {
        AttributeValue::Integer(i64::from(i))
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Boolean(b)
    }
}

/// How an attribute or object is being modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModificationType {
    /// New attribute or object; carries the full state.
    Add,
    /// Full-state replacement.
    Replace,
    /// Incremental change carrying both added and removed values.
    Update,
    /// Removal.
    Delete,
}

impl ModificationType {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModificationType::Add => "add",
            ModificationType::Replace => "replace",
            ModificationType::Update => "update",
            ModificationType::Delete => "delete",
        }
    }
}

impl fmt::Display for ModificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attribute-level delta.
///
/// Constructors enforce the shape rules: `Delete` carries no values,
/// `Add`/`Replace` carry no value deletes, `Update` may carry both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeChange {
    name: String,
    modification: ModificationType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    value_adds: Vec<AttributeValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    value_deletes: Vec<AttributeValue>,
}

impl AttributeChange {
    pub fn add<V: Into<AttributeValue>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            name: name.into(),
            modification: ModificationType::Add,
            value_adds: values.into_iter().map(Into::into).collect(),
            value_deletes: Vec::new(),
        }
    }

    pub fn replace<V: Into<AttributeValue>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            name: name.into(),
            modification: ModificationType::Replace,
            value_adds: values.into_iter().map(Into::into).collect(),
            value_deletes: Vec::new(),
        }
    }

    pub fn update<A: Into<AttributeValue>, D: Into<AttributeValue>>(
        name: impl Into<String>,
        adds: impl IntoIterator<Item = A>,
        deletes: impl IntoIterator<Item = D>,
    ) -> Self {
        Self {
            name: name.into(),
            modification: ModificationType::Update,
            value_adds: adds.into_iter().map(Into::into).collect(),
            value_deletes: deletes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn delete(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modification: ModificationType::Delete,
            value_adds: Vec::new(),
            value_deletes: Vec::new(),
        }
    }

    /// Build a change whose value set reflects `modification` when producing
    /// state from a remote object: `Update` runs report `Replace`, full-state
    /// runs report `Add`.
    pub fn for_state<V: Into<AttributeValue>>(
        name: impl Into<String>,
        modification: ModificationType,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        match modification {
            ModificationType::Update => Self::replace(name, values),
            _ => Self::add(name, values),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn modification(&self) -> ModificationType {
        self.modification
    }

    pub fn value_adds(&self) -> &[AttributeValue] {
        &self.value_adds
    }

    pub fn value_deletes(&self) -> &[AttributeValue] {
        &self.value_deletes
    }

    /// First added value, for single-valued fields.
    pub fn first_add(&self) -> Option<&AttributeValue> {
        self.value_adds.first()
    }

    /// Added values that are strings; other kinds are skipped.
    pub fn string_adds(&self) -> impl Iterator<Item = &str> {
        self.value_adds.iter().filter_map(AttributeValue::as_str)
    }

    /// Deleted values that are strings; other kinds are skipped.
    pub fn string_deletes(&self) -> impl Iterator<Item = &str> {
        self.value_deletes.iter().filter_map(AttributeValue::as_str)
    }
}

/// An object-level delta: the unit handed to the Object Synchronizer and the
/// confirmed change handed back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectChange {
    /// Logical object type name (`user`, `group`).
    pub object_type: String,
    pub modification: ModificationType,
    /// Display identity, e.g. the primary email.
    pub dn: String,
    /// Anchor value, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
    /// New display identity for a rename.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_dn: Option<String>,
    pub changes: Vec<AttributeChange>,
}

impl ObjectChange {
    pub fn new(
        object_type: impl Into<String>,
        modification: ModificationType,
        dn: impl Into<String>,
    ) -> Self {
        Self {
            object_type: object_type.into(),
            modification,
            dn: dn.into(),
            anchor: None,
            new_dn: None,
            changes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    #[must_use]
    pub fn with_new_dn(mut self, new_dn: impl Into<String>) -> Self {
        self.new_dn = Some(new_dn.into());
        self
    }

    #[must_use]
    pub fn with_change(mut self, change: AttributeChange) -> Self {
        self.changes.push(change);
        self
    }

    /// Identifier used to address the remote object: the anchor if known,
    /// otherwise the display identity.
    pub fn identity(&self) -> &str {
        self.anchor.as_deref().unwrap_or(&self.dn)
    }

    /// Display identity after any rename.
    pub fn effective_dn(&self) -> &str {
        self.new_dn.as_deref().unwrap_or(&self.dn)
    }

    pub fn get(&self, name: &str) -> Option<&AttributeChange> {
        self.changes.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(AttributeChange::name)
    }
}
