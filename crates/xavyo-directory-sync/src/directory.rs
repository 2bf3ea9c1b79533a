//! Concrete directory object types
//!
//! Builds the `user` and `group` object types, their sub-resources and
//! the schema registry for one run from the validated [`SyncConfig`] and
//! the tenant's [`TenantCapabilities`].

use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::adapter::{
    AttributeAdapter, CollectionAdapter, CollectionItem, FieldBinding, NestedAdapter, SimpleAdapter,
};
use crate::config::{CompositeConfig, SyncConfig, TenantCapabilities};
use crate::error::SyncResult;
use crate::model::{Group, GroupSettings, MemberRole, User, UserName, UserNotes};
use crate::reconciler::{ChangeReconciler, ValueComparison};
use crate::retry::RetryPolicy;
use crate::schema::{FieldDescriptor, ObjectType, SchemaRegistry};
use crate::sendas::SendAsCollection;
use crate::store::{
    AdminStore, CollectionStore, MemberStore, ObjectStore, RoleMembers, SendAsStore, SettingsStore,
};
use crate::subresource::{
    AdminRoleResource, CollectionSubResource, GroupSettingsResource, OwnerKey, SubResource,
};
use crate::synchronizer::{ObjectExporter, ObjectSynchronizer};

pub const USER: &str = "user";
pub const GROUP: &str = "group";

macro_rules! bind {
    ($kind:ident, $ty:ty, $field:ident) => {
        FieldBinding::$kind(|o: &$ty| &o.$field, |o: &mut $ty| &mut o.$field)
    };
}

/// Shorthand for a simple adapter whose remote path equals its name.
fn simple<T>(name: &str, binding: FieldBinding<T>) -> SimpleAdapter<T> {
    SimpleAdapter::field(name, name, binding)
}

/// Remote collaborators the directory object types are wired to.
#[derive(Clone)]
pub struct DirectoryStores {
    pub users: Arc<dyn ObjectStore<User>>,
    pub groups: Arc<dyn ObjectStore<Group>>,
    pub user_aliases: Arc<dyn CollectionStore>,
    pub group_aliases: Arc<dyn CollectionStore>,
    pub send_as: Arc<dyn SendAsStore>,
    pub members: Arc<dyn MemberStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub admin: Arc<dyn AdminStore>,
}

/// Base-object adapters of the user type.
pub fn user_adapters(config: &SyncConfig, capabilities: &TenantCapabilities) -> Vec<AttributeAdapter<User>> {
    let mut adapters: Vec<AttributeAdapter<User>> = vec![
        SimpleAdapter::anchor("id", |u: &User| &u.id, |u| &mut u.id).into(),
        simple("primaryEmail", bind!(string, User, primary_email)).import_only().into(),
        simple("suspended", bind!(boolean, User, suspended)).into(),
        simple("includeInGlobalAddressList", bind!(boolean, User, include_in_global_address_list)).into(),
        simple("suspensionReason", bind!(string, User, suspension_reason)).import_only().into(),
        simple("orgUnitPath", bind!(string, User, org_unit_path)).into(),
        simple("isDelegatedAdmin", bind!(boolean, User, is_delegated_admin)).import_only().into(),
        simple("agreedToTerms", bind!(boolean, User, agreed_to_terms)).import_only().into(),
        simple("changePasswordAtNextLogin", bind!(boolean, User, change_password_at_next_login)).into(),
        simple("ipWhitelisted", bind!(boolean, User, ip_whitelisted)).into(),
        simple("isMailboxSetup", bind!(boolean, User, is_mailbox_setup)).import_only().into(),
        simple("lastLoginTime", bind!(string, User, last_login_time)).import_only().into(),
        simple("creationTime", bind!(string, User, creation_time)).import_only().into(),
        simple("thumbnailPhotoUrl", bind!(string, User, thumbnail_photo_url)).import_only().into(),
        simple("deletionTime", bind!(string, User, deletion_time)).import_only().into(),
        simple("nonEditableAliases", bind!(strings, User, non_editable_aliases)).import_only().into(),
        simple("password", bind!(string, User, password)).export_only().into(),
        simple("hashFunction", bind!(string, User, hash_function)).export_only().into(),
        simple("aliases", bind!(strings, User, aliases))
            .with_patch(false)
            .delegated()
            .into(),
        simple(AdminRoleResource::ATTRIBUTE, bind!(boolean, User, is_admin))
            .delegated()
            .into(),
        NestedAdapter::builder("name", |u: &User| u.name.as_ref(), |u: &mut User| &mut u.name)
            .field("givenName", bind!(string, UserName, given_name))
            .field("familyName", bind!(string, UserName, family_name))
            .read_only_field("fullName", bind!(string, UserName, full_name))
            .with_patch(false)
            .build()
            .into(),
        NestedAdapter::builder("notes", |u: &User| u.notes.as_ref(), |u: &mut User| &mut u.notes)
            .field("value", bind!(string, UserNotes, value))
            .field("contentType", bind!(string, UserNotes, content_type))
            .with_patch(false)
            .build()
            .into(),
    ];

    adapters.extend([
        composite("phones", &config.phones, |u: &User| u.phones.as_ref(), |u: &mut User| &mut u.phones, false),
        composite("websites", &config.websites, |u: &User| u.websites.as_ref(), |u: &mut User| &mut u.websites, false),
        composite(
            "organizations",
            &config.organizations,
            |u: &User| u.organizations.as_ref(),
            |u: &mut User| &mut u.organizations,
            config.force_organizations_fixed_type_on_missing_type,
        ),
        composite("ims", &config.ims, |u: &User| u.ims.as_ref(), |u: &mut User| &mut u.ims, false),
        composite("addresses", &config.addresses, |u: &User| u.addresses.as_ref(), |u: &mut User| &mut u.addresses, false),
        composite(
            "externalIds",
            &config.external_ids,
            |u: &User| u.external_ids.as_ref(),
            |u: &mut User| &mut u.external_ids,
            false,
        ),
        composite("relations", &config.relations, |u: &User| u.relations.as_ref(), |u: &mut User| &mut u.relations, false),
    ]);

    if capabilities.custom_schema_present {
        adapters.push(simple("customSchemas", bind!(json, User, custom_schemas)).into());
    }
    adapters
}

fn composite<E: CollectionItem>(
    name: &str,
    config: &CompositeConfig,
    get: fn(&User) -> Option<&Vec<E>>,
    slot: fn(&mut User) -> &mut Option<Vec<E>>,
    force_type_on_missing_type: bool,
) -> AttributeAdapter<User> {
    // Without a primary flag the typed slots are the only way in.
    let types = if E::HAS_PRIMARY_FLAG {
        config.effective_types()
    } else {
        config.fixed_types.clone()
    };
    CollectionAdapter::builder(name, get, slot)
        .with_policy(config.format, types)
        .with_patch(false)
        .force_type_on_missing_type(force_type_on_missing_type)
        .build()
        .into()
}

/// Base-object adapters of the group type.
pub fn group_adapters() -> Vec<AttributeAdapter<Group>> {
    vec![
        SimpleAdapter::anchor("id", |g: &Group| &g.id, |g| &mut g.id).into(),
        simple("email", bind!(string, Group, email)).import_only().into(),
        simple("name", bind!(string, Group, name)).into(),
        simple("description", bind!(string, Group, description)).into(),
        simple("adminCreated", bind!(boolean, Group, admin_created)).import_only().into(),
        simple("directMembersCount", bind!(integer, Group, direct_members_count)).import_only().into(),
        simple("nonEditableAliases", bind!(strings, Group, non_editable_aliases)).import_only().into(),
        simple("aliases", bind!(strings, Group, aliases)).delegated().into(),
    ]
}

/// Adapters of the group settings resource.
pub fn group_settings_adapters() -> Vec<AttributeAdapter<GroupSettings>> {
    vec![
        simple("whoCanJoin", bind!(string, GroupSettings, who_can_join)).into(),
        simple("whoCanViewMembership", bind!(string, GroupSettings, who_can_view_membership)).into(),
        simple("whoCanViewGroup", bind!(string, GroupSettings, who_can_view_group)).into(),
        simple("whoCanInvite", bind!(string, GroupSettings, who_can_invite)).into(),
        simple("whoCanPostMessage", bind!(string, GroupSettings, who_can_post_message)).into(),
        simple("allowExternalMembers", bind!(string, GroupSettings, allow_external_members)).into(),
        simple("allowWebPosting", bind!(string, GroupSettings, allow_web_posting)).into(),
        simple("primaryLanguage", bind!(string, GroupSettings, primary_language)).into(),
        simple("maxMessageBytes", bind!(integer, GroupSettings, max_message_bytes)).into(),
        simple("isArchived", bind!(string, GroupSettings, is_archived)).into(),
        simple("archiveOnly", bind!(string, GroupSettings, archive_only)).into(),
        simple("messageModerationLevel", bind!(string, GroupSettings, message_moderation_level)).into(),
        simple("replyTo", bind!(string, GroupSettings, reply_to)).into(),
        simple("customReplyTo", bind!(string, GroupSettings, custom_reply_to)).into(),
        simple("sendMessageDenyNotification", bind!(string, GroupSettings, send_message_deny_notification)).into(),
        simple(
            "defaultMessageDenyNotificationText",
            bind!(string, GroupSettings, default_message_deny_notification_text),
        )
        .into(),
        simple("showInGroupDirectory", bind!(string, GroupSettings, show_in_group_directory)).into(),
        simple("allowGoogleCommunication", bind!(string, GroupSettings, allow_google_communication)).into(),
        simple("membersCanPostAsTheGroup", bind!(string, GroupSettings, members_can_post_as_the_group)).into(),
        simple("includeInGlobalAddressList", bind!(string, GroupSettings, include_in_global_address_list)).into(),
        simple("whoCanLeaveGroup", bind!(string, GroupSettings, who_can_leave_group)).into(),
        simple("whoCanContactOwner", bind!(string, GroupSettings, who_can_contact_owner)).into(),
    ]
}

/// Sub-resources of the user type, in execution order.
pub fn user_sub_resources(config: &SyncConfig, stores: &DirectoryStores) -> Vec<Arc<dyn SubResource>> {
    let mut resources: Vec<Arc<dyn SubResource>> = vec![Arc::new(CollectionSubResource::new(
        ChangeReconciler::new("aliases", stores.user_aliases.clone()),
        OwnerKey::Id,
    ))];
    if config.send_as_enabled {
        let send_as = SendAsCollection::new(stores.send_as.clone())
            .make_new_addresses_default(config.make_new_send_as_addresses_default);
        resources.push(Arc::new(
            CollectionSubResource::new(
                ChangeReconciler::new("sendAs", Arc::new(send_as)).with_comparison(ValueComparison::Exact),
                OwnerKey::PrimaryIdentity,
            )
            .with_live_import(),
        ));
    }
    resources.push(Arc::new(AdminRoleResource::new(
        stores.admin.clone(),
        RetryPolicy::from(&config.admin_retry),
    )));
    resources
}

/// Sub-resources of the group type, in execution order.
pub fn group_sub_resources(stores: &DirectoryStores) -> Vec<Arc<dyn SubResource>> {
    let mut resources: Vec<Arc<dyn SubResource>> = vec![Arc::new(CollectionSubResource::new(
        ChangeReconciler::new("aliases", stores.group_aliases.clone()),
        OwnerKey::Id,
    ))];
    for role in [MemberRole::Member, MemberRole::Owner, MemberRole::Manager] {
        let members = RoleMembers::new(stores.members.clone(), role);
        resources.push(Arc::new(
            CollectionSubResource::new(
                ChangeReconciler::new(role.attribute_name(), Arc::new(members)),
                OwnerKey::Id,
            )
            .with_live_import(),
        ));
    }
    resources.push(Arc::new(GroupSettingsResource::new(
        group_settings_adapters(),
        stores.settings.clone(),
    )));
    resources
}

fn sub_resource_descriptors(resources: &[Arc<dyn SubResource>]) -> Vec<FieldDescriptor> {
    resources.iter().flat_map(|r| r.descriptors()).collect()
}

/// The object types and synchronizers of one run.
pub struct Directory {
    pub users: Arc<ObjectSynchronizer<User>>,
    pub groups: Arc<ObjectSynchronizer<Group>>,
    registry: SchemaRegistry,
}

impl Directory {
    /// Validate `config` and build every object type.
    pub fn build(
        config: &SyncConfig,
        capabilities: &TenantCapabilities,
        stores: &DirectoryStores,
    ) -> SyncResult<Self> {
        config.validate()?;

        let user_resources = user_sub_resources(config, stores);
        let user_type = Arc::new(ObjectType::new(
            USER,
            user_adapters(config, capabilities),
            sub_resource_descriptors(&user_resources),
        )?);

        let group_resources = group_sub_resources(stores);
        let group_type = Arc::new(ObjectType::new(
            GROUP,
            group_adapters(),
            sub_resource_descriptors(&group_resources),
        )?);

        let mut registry = SchemaRegistry::new();
        registry.register(user_type.schema().clone())?;
        registry.register(group_type.schema().clone())?;
        info!(
            user_fields = user_type.schema().descriptors().len(),
            group_fields = group_type.schema().descriptors().len(),
            custom_schema = capabilities.custom_schema_present,
            "Directory schema built"
        );

        let users = ObjectSynchronizer::new(user_type, stores.users.clone())
            .with_sub_resources(user_resources)
            .with_settling_delay(config.settling_delay())
            .with_filter(config.user_filter_regex()?);
        let groups = ObjectSynchronizer::new(group_type, stores.groups.clone())
            .with_sub_resources(group_resources)
            .with_settling_delay(config.settling_delay())
            .with_filter(config.group_filter_regex()?);

        Ok(Self {
            users: Arc::new(users),
            groups: Arc::new(groups),
            registry,
        })
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Exporters keyed by object type name, for the batch driver.
    pub fn exporters(&self) -> HashMap<String, Arc<dyn ObjectExporter>> {
        let mut exporters: HashMap<String, Arc<dyn ObjectExporter>> = HashMap::new();
        exporters.insert(USER.to_string(), self.users.clone());
        exporters.insert(GROUP.to_string(), self.groups.clone());
        exporters
    }
}
