//! Remote object graph
//!
//! Typed mirrors of the directory API resources. Writable scalar fields use
//! [`Nullable`] so that "never set" (omitted from the payload) and
//! "explicitly cleared" (sent as JSON `null`) stay distinct.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::adapter::{CollectionItem, FieldBinding};
use crate::projector::SubField;
use crate::schema::ValueType;

/// A field that is absent, explicitly null, or set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Nullable<T> {
    /// Not present; omitted on serialization.
    #[default]
    Absent,
    /// Explicitly cleared; serialized as `null`.
    Null,
    Value(T),
}

impl<T> Nullable<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Nullable::Absent)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Nullable::Null)
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Nullable::Value(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Nullable::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Take the value out, leaving `Absent`.
    pub fn take_value(&mut self) -> Option<T> {
        match std::mem::take(self) {
            Nullable::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl Nullable<String> {
    pub fn as_deref(&self) -> Option<&str> {
        self.value().map(String::as_str)
    }
}

impl<T> From<Option<T>> for Nullable<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Nullable::Value(v),
            None => Nullable::Null,
        }
    }
}

impl<T: Serialize> Serialize for Nullable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Nullable::Value(v) => v.serialize(serializer),
            Nullable::Absent | Nullable::Null => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Nullable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<T>::deserialize(deserializer)?.into())
    }
}

/// Identity accessors shared by top-level directory objects.
pub trait DirectoryObject: Default + Clone + Send + Sync + 'static {
    /// Remote primary key.
    fn id(&self) -> Option<&str>;

    /// Primary email, the display identity.
    fn primary_identity(&self) -> Option<&str>;

    fn set_primary_identity(&mut self, identity: &str);

    /// A new object addressed by `identity`, for creation.
    fn for_identity(identity: &str) -> Self {
        let mut object = Self::default();
        object.set_primary_identity(identity);
        object
    }
}

/// Directory user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub id: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub primary_email: Nullable<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<UserName>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub password: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub hash_function: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub suspended: Nullable<bool>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub suspension_reason: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub include_in_global_address_list: Nullable<bool>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub org_unit_path: Nullable<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<UserNotes>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub aliases: Nullable<Vec<String>>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub non_editable_aliases: Nullable<Vec<String>>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub is_admin: Nullable<bool>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub is_delegated_admin: Nullable<bool>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub agreed_to_terms: Nullable<bool>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub change_password_at_next_login: Nullable<bool>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub ip_whitelisted: Nullable<bool>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub is_mailbox_setup: Nullable<bool>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub last_login_time: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub creation_time: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub deletion_time: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub thumbnail_photo_url: Nullable<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phones: Option<Vec<Phone>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub websites: Option<Vec<Website>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizations: Option<Vec<Organization>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ims: Option<Vec<Im>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<Address>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ids: Option<Vec<ExternalId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relations: Option<Vec<Relation>>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub custom_schemas: Nullable<serde_json::Value>,
}

impl DirectoryObject for User {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn primary_identity(&self) -> Option<&str> {
        self.primary_email.as_deref()
    }

    fn set_primary_identity(&mut self, identity: &str) {
        self.primary_email = Nullable::Value(identity.to_string());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserName {
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub given_name: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub family_name: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub full_name: Nullable<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNotes {
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub value: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub content_type: Nullable<String>,
}

fn effective_type<'a>(kind: &'a Nullable<String>, custom: &'a Nullable<String>) -> Option<&'a str> {
    match kind.as_deref() {
        Some("custom") => custom.as_deref(),
        other => other,
    }
}

fn assign_type(kind: &mut Nullable<String>, custom: &mut Nullable<String>, key: &str, known: &[&str]) {
    if known.contains(&key) {
        *kind = Nullable::Value(key.to_string());
        *custom = Nullable::Absent;
    } else {
        *kind = Nullable::Value("custom".to_string());
        *custom = Nullable::Value(key.to_string());
    }
}

fn is_flagged(primary: &Nullable<bool>) -> bool {
    primary.value().copied().unwrap_or(false)
}

/// Standard phone types; anything else is sent as a custom type.
pub const PHONE_TYPES: &[&str] = &[
    "assistant", "callback", "car", "company_main", "grand_central", "home", "home_fax", "isdn",
    "main", "mobile", "other", "other_fax", "pager", "radio", "telex", "tty_tdd", "work",
    "work_fax", "work_mobile", "work_pager",
];

pub const WEBSITE_TYPES: &[&str] = &[
    "app_install_page", "blog", "ftp", "home", "home_page", "other", "profile", "reservations",
    "resume", "work",
];

pub const ORGANIZATION_TYPES: &[&str] = &["domain_only", "school", "unknown", "work"];

pub const IM_TYPES: &[&str] = &["home", "other", "work"];

pub const ADDRESS_TYPES: &[&str] = &["home", "other", "work"];

pub const EXTERNAL_ID_TYPES: &[&str] = &["account", "customer", "login_id", "network", "organization"];

pub const RELATION_TYPES: &[&str] = &[
    "admin_assistant", "assistant", "brother", "child", "dotted_line_manager", "domestic_partner",
    "exec_assistant", "father", "friend", "manager", "mother", "parent", "partner", "referred_by",
    "relative", "sister", "spouse",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phone {
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub value: Nullable<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Nullable::is_absent")]
    pub r#type: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub custom_type: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub primary: Nullable<bool>,
}

impl CollectionItem for Phone {
    const MULTI_VALUED_TYPE_SLOTS: bool = true;

    fn sub_fields() -> Vec<(SubField, FieldBinding<Self>)> {
        vec![(
            SubField::new(None, "value", ValueType::String),
            FieldBinding::string(|p: &Phone| &p.value, |p| &mut p.value),
        )]
    }

    fn type_key(&self) -> Option<&str> {
        effective_type(&self.r#type, &self.custom_type)
    }

    fn set_type_key(&mut self, key: &str) {
        assign_type(&mut self.r#type, &mut self.custom_type, key, PHONE_TYPES);
    }

    fn clear_type_key(&mut self) {
        self.r#type = Nullable::Null;
        self.custom_type = Nullable::Absent;
    }

    fn is_primary(&self) -> bool {
        is_flagged(&self.primary)
    }

    fn set_primary(&mut self) {
        self.primary = Nullable::Value(true);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Website {
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub value: Nullable<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Nullable::is_absent")]
    pub r#type: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub custom_type: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub primary: Nullable<bool>,
}

impl CollectionItem for Website {
    const MULTI_VALUED_TYPE_SLOTS: bool = true;

    fn sub_fields() -> Vec<(SubField, FieldBinding<Self>)> {
        vec![(
            SubField::new(None, "value", ValueType::String),
            FieldBinding::string(|w: &Website| &w.value, |w| &mut w.value),
        )]
    }

    fn type_key(&self) -> Option<&str> {
        effective_type(&self.r#type, &self.custom_type)
    }

    fn set_type_key(&mut self, key: &str) {
        assign_type(&mut self.r#type, &mut self.custom_type, key, WEBSITE_TYPES);
    }

    fn clear_type_key(&mut self) {
        self.r#type = Nullable::Null;
        self.custom_type = Nullable::Absent;
    }

    fn is_primary(&self) -> bool {
        is_flagged(&self.primary)
    }

    fn set_primary(&mut self) {
        self.primary = Nullable::Value(true);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub title: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub location: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub name: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub description: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub department: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub symbol: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub domain: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub cost_center: Nullable<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Nullable::is_absent")]
    pub r#type: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub custom_type: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub primary: Nullable<bool>,
}

impl CollectionItem for Organization {
    fn sub_fields() -> Vec<(SubField, FieldBinding<Self>)> {
        vec![
            (
                SubField::new(Some("title"), "title", ValueType::String),
                FieldBinding::string(|o: &Organization| &o.title, |o| &mut o.title),
            ),
            (
                SubField::new(Some("location"), "location", ValueType::String),
                FieldBinding::string(|o: &Organization| &o.location, |o| &mut o.location),
            ),
            (
                SubField::new(Some("name"), "name", ValueType::String),
                FieldBinding::string(|o: &Organization| &o.name, |o| &mut o.name),
            ),
            (
                SubField::new(Some("description"), "description", ValueType::String),
                FieldBinding::string(|o: &Organization| &o.description, |o| &mut o.description),
            ),
            (
                SubField::new(Some("department"), "department", ValueType::String),
                FieldBinding::string(|o: &Organization| &o.department, |o| &mut o.department),
            ),
            (
                SubField::new(Some("symbol"), "symbol", ValueType::String),
                FieldBinding::string(|o: &Organization| &o.symbol, |o| &mut o.symbol),
            ),
            (
                SubField::new(Some("domain"), "domain", ValueType::String),
                FieldBinding::string(|o: &Organization| &o.domain, |o| &mut o.domain),
            ),
            (
                SubField::new(Some("costCenter"), "costCenter", ValueType::String),
                FieldBinding::string(|o: &Organization| &o.cost_center, |o| &mut o.cost_center),
            ),
        ]
    }

    fn type_key(&self) -> Option<&str> {
        effective_type(&self.r#type, &self.custom_type)
    }

    fn set_type_key(&mut self, key: &str) {
        assign_type(&mut self.r#type, &mut self.custom_type, key, ORGANIZATION_TYPES);
    }

    fn clear_type_key(&mut self) {
        self.r#type = Nullable::Null;
        self.custom_type = Nullable::Absent;
    }

    fn is_primary(&self) -> bool {
        is_flagged(&self.primary)
    }

    fn set_primary(&mut self) {
        self.primary = Nullable::Value(true);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Im {
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub protocol: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub im: Nullable<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Nullable::is_absent")]
    pub r#type: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub custom_type: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub primary: Nullable<bool>,
}

impl CollectionItem for Im {
    fn sub_fields() -> Vec<(SubField, FieldBinding<Self>)> {
        vec![
            (
                SubField::new(Some("protocol"), "protocol", ValueType::String),
                FieldBinding::string(|i: &Im| &i.protocol, |i| &mut i.protocol),
            ),
            (
                SubField::new(Some("im"), "im", ValueType::String),
                FieldBinding::string(|i: &Im| &i.im, |i| &mut i.im),
            ),
        ]
    }

    fn type_key(&self) -> Option<&str> {
        effective_type(&self.r#type, &self.custom_type)
    }

    fn set_type_key(&mut self, key: &str) {
        assign_type(&mut self.r#type, &mut self.custom_type, key, IM_TYPES);
    }

    fn clear_type_key(&mut self) {
        self.r#type = Nullable::Null;
        self.custom_type = Nullable::Absent;
    }

    fn is_primary(&self) -> bool {
        is_flagged(&self.primary)
    }

    fn set_primary(&mut self) {
        self.primary = Nullable::Value(true);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub source_is_structured: Nullable<bool>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub formatted: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub po_box: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub extended_address: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub street_address: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub locality: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub region: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub postal_code: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub country: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub country_code: Nullable<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Nullable::is_absent")]
    pub r#type: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub custom_type: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub primary: Nullable<bool>,
}

impl CollectionItem for Address {
    fn sub_fields() -> Vec<(SubField, FieldBinding<Self>)> {
        vec![
            (
                SubField::new(Some("sourceIsStructured"), "sourceIsStructured", ValueType::Boolean),
                FieldBinding::boolean(|a: &Address| &a.source_is_structured, |a| {
                    &mut a.source_is_structured
                }),
            ),
            (
                SubField::new(Some("formatted"), "formatted", ValueType::String),
                FieldBinding::string(|a: &Address| &a.formatted, |a| &mut a.formatted),
            ),
            (
                SubField::new(Some("poBox"), "poBox", ValueType::String),
                FieldBinding::string(|a: &Address| &a.po_box, |a| &mut a.po_box),
            ),
            (
                SubField::new(Some("extendedAddress"), "extendedAddress", ValueType::String),
                FieldBinding::string(|a: &Address| &a.extended_address, |a| {
                    &mut a.extended_address
                }),
            ),
            (
                SubField::new(Some("streetAddress"), "streetAddress", ValueType::String),
                FieldBinding::string(|a: &Address| &a.street_address, |a| &mut a.street_address),
            ),
            (
                SubField::new(Some("locality"), "locality", ValueType::String),
                FieldBinding::string(|a: &Address| &a.locality, |a| &mut a.locality),
            ),
            (
                SubField::new(Some("region"), "region", ValueType::String),
                FieldBinding::string(|a: &Address| &a.region, |a| &mut a.region),
            ),
            (
                SubField::new(Some("postalCode"), "postalCode", ValueType::String),
                FieldBinding::string(|a: &Address| &a.postal_code, |a| &mut a.postal_code),
            ),
            (
                SubField::new(Some("country"), "country", ValueType::String),
                FieldBinding::string(|a: &Address| &a.country, |a| &mut a.country),
            ),
            (
                SubField::new(Some("countryCode"), "countryCode", ValueType::String),
                FieldBinding::string(|a: &Address| &a.country_code, |a| &mut a.country_code),
            ),
        ]
    }

    fn type_key(&self) -> Option<&str> {
        effective_type(&self.r#type, &self.custom_type)
    }

    fn set_type_key(&mut self, key: &str) {
        assign_type(&mut self.r#type, &mut self.custom_type, key, ADDRESS_TYPES);
    }

    fn clear_type_key(&mut self) {
        self.r#type = Nullable::Null;
        self.custom_type = Nullable::Absent;
    }

    fn is_primary(&self) -> bool {
        is_flagged(&self.primary)
    }

    fn set_primary(&mut self) {
        self.primary = Nullable::Value(true);
    }
}

/// External identifier. These carry no primary flag, so only typed slots
/// address them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalId {
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub value: Nullable<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Nullable::is_absent")]
    pub r#type: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub custom_type: Nullable<String>,
}

impl CollectionItem for ExternalId {
    const HAS_PRIMARY_FLAG: bool = false;

    fn sub_fields() -> Vec<(SubField, FieldBinding<Self>)> {
        vec![(
            SubField::new(None, "value", ValueType::String),
            FieldBinding::string(|e: &ExternalId| &e.value, |e| &mut e.value),
        )]
    }

    fn type_key(&self) -> Option<&str> {
        effective_type(&self.r#type, &self.custom_type)
    }

    fn set_type_key(&mut self, key: &str) {
        assign_type(&mut self.r#type, &mut self.custom_type, key, EXTERNAL_ID_TYPES);
    }

    fn clear_type_key(&mut self) {
        self.r#type = Nullable::Null;
        self.custom_type = Nullable::Absent;
    }
}

/// Relation to another person. No primary flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub value: Nullable<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Nullable::is_absent")]
    pub r#type: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub custom_type: Nullable<String>,
}

impl CollectionItem for Relation {
    const HAS_PRIMARY_FLAG: bool = false;

    fn sub_fields() -> Vec<(SubField, FieldBinding<Self>)> {
        vec![(
            SubField::new(None, "value", ValueType::String),
            FieldBinding::string(|r: &Relation| &r.value, |r| &mut r.value),
        )]
    }

    fn type_key(&self) -> Option<&str> {
        effective_type(&self.r#type, &self.custom_type)
    }

    fn set_type_key(&mut self, key: &str) {
        assign_type(&mut self.r#type, &mut self.custom_type, key, RELATION_TYPES);
    }

    fn clear_type_key(&mut self) {
        self.r#type = Nullable::Null;
        self.custom_type = Nullable::Absent;
    }
}

/// Directory group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub id: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub email: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub name: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub description: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub admin_created: Nullable<bool>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub direct_members_count: Nullable<i64>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub aliases: Nullable<Vec<String>>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub non_editable_aliases: Nullable<Vec<String>>,
}

impl DirectoryObject for Group {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn primary_identity(&self) -> Option<&str> {
        self.email.as_deref()
    }

    fn set_primary_identity(&mut self, identity: &str) {
        self.email = Nullable::Value(identity.to_string());
    }
}

/// Settings resource of a group, served by a separate API keyed by the
/// group email. Boolean-like settings travel as `"true"`/`"false"` strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSettings {
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub who_can_join: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub who_can_view_membership: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub who_can_view_group: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub who_can_invite: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub who_can_post_message: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub who_can_leave_group: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub who_can_contact_owner: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub allow_external_members: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub allow_web_posting: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub primary_language: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub max_message_bytes: Nullable<i64>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub is_archived: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub archive_only: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub message_moderation_level: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub reply_to: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub custom_reply_to: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub send_message_deny_notification: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub default_message_deny_notification_text: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub show_in_group_directory: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub allow_google_communication: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub members_can_post_as_the_group: Nullable<String>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub include_in_global_address_list: Nullable<String>,
}

/// Send-as address of a user mailbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAs {
    pub send_as_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_address: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub treat_as_alias: bool,
}

/// Role of a group member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemberRole {
    Member,
    Manager,
    Owner,
}

impl MemberRole {
    /// Attribute name exposing members of this role.
    pub fn attribute_name(&self) -> &'static str {
        match self {
            MemberRole::Member => "member",
            MemberRole::Manager => "manager",
            MemberRole::Owner => "owner",
        }
    }
}

/// Membership entry of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub email: String,
    pub role: MemberRole,
}
