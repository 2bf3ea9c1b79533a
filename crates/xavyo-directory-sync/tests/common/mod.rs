//! Integration test helpers for xavyo-directory-sync.
//!
//! In-memory remote stores that record every call in one shared log, with
//! injectable failures, plus factories for configs and directories.

#![allow(dead_code)]

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};
use xavyo_directory_sync::async_trait;
use xavyo_directory_sync::prelude::*;

static INIT: Once = Once::new();

/// Initialize logging for tests (once).
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

/// Ordered log of remote calls shared by all fakes.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    /// Calls starting with `prefix`.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.calls().into_iter().filter(|c| c.starts_with(prefix)).collect()
    }
}

/// Failures keyed by call prefix (`"users.patch"`), consumed on use.
#[derive(Clone, Default)]
pub struct Failures(Arc<Mutex<HashMap<String, RemoteError>>>);

impl Failures {
    pub fn inject(&self, call: &str, error: RemoteError) {
        self.0.lock().unwrap().insert(call.to_string(), error);
    }

    fn take(&self, call: &str) -> RemoteResult<()> {
        match self.0.lock().unwrap().remove(call) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Overlay the fields present in `patch` onto `current`.
fn merge<T: Serialize + DeserializeOwned>(current: &T, patch: &T) -> T {
    let mut base = serde_json::to_value(current).unwrap();
    let overlay = serde_json::to_value(patch).unwrap();
    if let (Some(base), Some(overlay)) = (base.as_object_mut(), overlay.as_object()) {
        for (key, value) in overlay {
            base.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(base).unwrap()
}

/// Directory objects keyed by id, addressable by id or primary identity.
pub struct FakeObjects<T> {
    prefix: &'static str,
    log: CallLog,
    failures: Failures,
    objects: Mutex<Vec<T>>,
    next_id: Mutex<u32>,
}

impl<T: DirectoryObject + Serialize + DeserializeOwned> FakeObjects<T> {
    pub fn new(prefix: &'static str, log: CallLog, failures: Failures) -> Self {
        Self {
            prefix,
            log,
            failures,
            objects: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
        }
    }

    pub fn insert(&self, object: T) {
        self.objects.lock().unwrap().push(object);
    }

    pub fn find(&self, key: &str) -> Option<T> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|o| matches_key(*o, key))
            .cloned()
    }

    fn call(&self, op: &str, key: &str) -> RemoteResult<()> {
        let call = format!("{}.{op}", self.prefix);
        self.log.push(format!("{call} {key}"));
        self.failures.take(&call)
    }

    fn replace_with(&self, key: &str, f: impl FnOnce(&T) -> T) -> RemoteResult<T> {
        let mut objects = self.objects.lock().unwrap();
        let Some(current) = objects.iter_mut().find(|o| matches_key(*o, key)) else {
            return Err(RemoteError::not_found(key));
        };
        let next = f(&*current);
        *current = next.clone();
        Ok(next)
    }
}

fn matches_key<T: DirectoryObject>(object: &T, key: &str) -> bool {
    object.id() == Some(key)
        || object
            .primary_identity()
            .is_some_and(|p| p.eq_ignore_ascii_case(key))
}

#[async_trait]
impl<T> ObjectStore<T> for FakeObjects<T>
where
    T: DirectoryObject + Serialize + DeserializeOwned,
{
    async fn create(&self, object: &T) -> RemoteResult<T> {
        let key = object.primary_identity().unwrap_or_default().to_string();
        self.call("create", &key)?;
        let id = {
            let mut next = self.next_id.lock().unwrap();
            let id = format!("{}-{}", &self.prefix[..1], *next);
            *next += 1;
            id
        };
        let mut json = serde_json::to_value(object).unwrap();
        json["id"] = serde_json::Value::String(id);
        let created: T = serde_json::from_value(json).unwrap();
        self.objects.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: &str, object: &T) -> RemoteResult<T> {
        self.call("update", id)?;
        self.replace_with(id, |current| {
            let mut json = serde_json::to_value(object).unwrap();
            if let Some(existing) = current.id() {
                json["id"] = serde_json::Value::String(existing.to_string());
            }
            serde_json::from_value(json).unwrap()
        })
    }

    async fn patch(&self, id: &str, object: &T) -> RemoteResult<T> {
        self.call("patch", id)?;
        self.replace_with(id, |current| merge(current, object))
    }

    async fn delete(&self, id: &str) -> RemoteResult<()> {
        self.call("delete", id)?;
        let mut objects = self.objects.lock().unwrap();
        let before = objects.len();
        objects.retain(|o| !matches_key(o, id));
        if objects.len() == before {
            return Err(RemoteError::not_found(id));
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> RemoteResult<T> {
        self.call("get", id)?;
        self.find(id).ok_or_else(|| RemoteError::not_found(id))
    }
}

/// A plain string collection per owner (aliases).
pub struct FakeCollection {
    prefix: &'static str,
    log: CallLog,
    failures: Failures,
    values: Mutex<HashMap<String, Vec<String>>>,
}

impl FakeCollection {
    pub fn new(prefix: &'static str, log: CallLog, failures: Failures) -> Self {
        Self {
            prefix,
            log,
            failures,
            values: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed(&self, owner: &str, values: &[&str]) {
        self.values
            .lock()
            .unwrap()
            .insert(owner.to_string(), values.iter().map(|v| v.to_string()).collect());
    }

    pub fn values(&self, owner: &str) -> Vec<String> {
        self.values.lock().unwrap().get(owner).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CollectionStore for FakeCollection {
    async fn list(&self, owner: &str) -> RemoteResult<Vec<String>> {
        self.log.push(format!("{}.list {owner}", self.prefix));
        self.failures.take(&format!("{}.list", self.prefix))?;
        Ok(self.values(owner))
    }

    async fn add(&self, owner: &str, value: &str) -> RemoteResult<()> {
        self.log.push(format!("{}.add {owner} {value}", self.prefix));
        self.failures.take(&format!("{}.add", self.prefix))?;
        self.values
            .lock()
            .unwrap()
            .entry(owner.to_string())
            .or_default()
            .push(value.to_string());
        Ok(())
    }

    async fn remove(&self, owner: &str, value: &str) -> RemoteResult<()> {
        self.log.push(format!("{}.remove {owner} {value}", self.prefix));
        self.failures.take(&format!("{}.remove", self.prefix))?;
        let mut values = self.values.lock().unwrap();
        let list = values.entry(owner.to_string()).or_default();
        let before = list.len();
        list.retain(|v| !v.eq_ignore_ascii_case(value));
        if list.len() == before {
            return Err(RemoteError::not_found(value));
        }
        Ok(())
    }
}

pub struct FakeSendAs {
    log: CallLog,
    entries: Mutex<HashMap<String, Vec<SendAs>>>,
}

impl FakeSendAs {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed(&self, user: &str, entries: Vec<SendAs>) {
        self.entries.lock().unwrap().insert(user.to_string(), entries);
    }

    pub fn entries(&self, user: &str) -> Vec<SendAs> {
        self.entries.lock().unwrap().get(user).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl SendAsStore for FakeSendAs {
    async fn list(&self, user: &str) -> RemoteResult<Vec<SendAs>> {
        self.log.push(format!("sendas.list {user}"));
        Ok(self.entries(user))
    }

    async fn create(&self, user: &str, send_as: &SendAs) -> RemoteResult<SendAs> {
        self.log.push(format!("sendas.create {user} {}", send_as.send_as_email));
        self.entries
            .lock()
            .unwrap()
            .entry(user.to_string())
            .or_default()
            .push(send_as.clone());
        Ok(send_as.clone())
    }

    async fn delete(&self, user: &str, send_as_email: &str) -> RemoteResult<()> {
        self.log.push(format!("sendas.delete {user} {send_as_email}"));
        let mut entries = self.entries.lock().unwrap();
        let list = entries.entry(user.to_string()).or_default();
        let before = list.len();
        list.retain(|s| s.send_as_email != send_as_email);
        if list.len() == before {
            return Err(RemoteError::not_found(send_as_email));
        }
        Ok(())
    }
}

pub struct FakeMembers {
    log: CallLog,
    members: Mutex<HashMap<String, Vec<Member>>>,
}

impl FakeMembers {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            members: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed(&self, group: &str, members: &[(&str, MemberRole)]) {
        self.members.lock().unwrap().insert(
            group.to_string(),
            members
                .iter()
                .map(|(email, role)| Member {
                    email: email.to_string(),
                    role: *role,
                })
                .collect(),
        );
    }

    pub fn members(&self, group: &str) -> Vec<Member> {
        self.members.lock().unwrap().get(group).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl MemberStore for FakeMembers {
    async fn list(&self, group: &str) -> RemoteResult<Vec<Member>> {
        self.log.push(format!("members.list {group}"));
        Ok(self.members(group))
    }

    async fn insert(&self, group: &str, member: &Member) -> RemoteResult<()> {
        self.log.push(format!("members.insert {group} {}", member.email));
        self.members
            .lock()
            .unwrap()
            .entry(group.to_string())
            .or_default()
            .push(member.clone());
        Ok(())
    }

    async fn remove(&self, group: &str, email: &str) -> RemoteResult<()> {
        self.log.push(format!("members.remove {group} {email}"));
        let mut members = self.members.lock().unwrap();
        let list = members.entry(group.to_string()).or_default();
        let before = list.len();
        list.retain(|m| !m.email.eq_ignore_ascii_case(email));
        if list.len() == before {
            return Err(RemoteError::not_found(email));
        }
        Ok(())
    }
}

pub struct FakeSettings {
    log: CallLog,
    settings: Mutex<HashMap<String, GroupSettings>>,
}

impl FakeSettings {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            settings: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed(&self, group_email: &str, settings: GroupSettings) {
        self.settings.lock().unwrap().insert(group_email.to_string(), settings);
    }

    pub fn settings(&self, group_email: &str) -> GroupSettings {
        self.settings.lock().unwrap().get(group_email).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl SettingsStore for FakeSettings {
    async fn get(&self, group_email: &str) -> RemoteResult<GroupSettings> {
        self.log.push(format!("settings.get {group_email}"));
        Ok(self.settings(group_email))
    }

    async fn patch(&self, group_email: &str, settings: &GroupSettings) -> RemoteResult<GroupSettings> {
        self.log.push(format!("settings.patch {group_email}"));
        let merged = merge(&self.settings(group_email), settings);
        self.seed(group_email, merged.clone());
        Ok(merged)
    }
}

/// Admin role store answering `NotFound` for the first calls, like a
/// freshly created user that has not propagated yet.
pub struct FakeAdmin {
    log: CallLog,
    not_found_remaining: Mutex<u32>,
    admins: Mutex<HashMap<String, bool>>,
}

impl FakeAdmin {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            not_found_remaining: Mutex::new(0),
            admins: Mutex::new(HashMap::new()),
        }
    }

    pub fn lag(&self, calls: u32) {
        *self.not_found_remaining.lock().unwrap() = calls;
    }

    pub fn is_admin(&self, user: &str) -> Option<bool> {
        self.admins.lock().unwrap().get(user).copied()
    }
}

#[async_trait]
impl AdminStore for FakeAdmin {
    async fn set_admin(&self, user: &str, is_admin: bool) -> RemoteResult<()> {
        self.log.push(format!("admin.set {user} {is_admin}"));
        {
            let mut remaining = self.not_found_remaining.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RemoteError::not_found(user));
            }
        }
        self.admins.lock().unwrap().insert(user.to_string(), is_admin);
        Ok(())
    }
}

/// Every fake behind one call log.
pub struct FakeDirectory {
    pub log: CallLog,
    pub failures: Failures,
    pub users: Arc<FakeObjects<User>>,
    pub groups: Arc<FakeObjects<Group>>,
    pub user_aliases: Arc<FakeCollection>,
    pub group_aliases: Arc<FakeCollection>,
    pub send_as: Arc<FakeSendAs>,
    pub members: Arc<FakeMembers>,
    pub settings: Arc<FakeSettings>,
    pub admin: Arc<FakeAdmin>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        let log = CallLog::default();
        let failures = Failures::default();
        Self {
            users: Arc::new(FakeObjects::new("users", log.clone(), failures.clone())),
            groups: Arc::new(FakeObjects::new("groups", log.clone(), failures.clone())),
            user_aliases: Arc::new(FakeCollection::new("user_aliases", log.clone(), failures.clone())),
            group_aliases: Arc::new(FakeCollection::new("group_aliases", log.clone(), failures.clone())),
            send_as: Arc::new(FakeSendAs::new(log.clone())),
            members: Arc::new(FakeMembers::new(log.clone())),
            settings: Arc::new(FakeSettings::new(log.clone())),
            admin: Arc::new(FakeAdmin::new(log.clone())),
            log,
            failures,
        }
    }

    pub fn stores(&self) -> DirectoryStores {
        DirectoryStores {
            users: self.users.clone(),
            groups: self.groups.clone(),
            user_aliases: self.user_aliases.clone(),
            group_aliases: self.group_aliases.clone(),
            send_as: self.send_as.clone(),
            members: self.members.clone(),
            settings: self.settings.clone(),
            admin: self.admin.clone(),
        }
    }

    /// Build the directory against these fakes.
    pub fn directory(&self, config: &SyncConfig) -> Directory {
        Directory::build(config, &TenantCapabilities::default(), &self.stores()).unwrap()
    }
}

/// Config with no settling delay and instant admin retries.
pub fn test_config() -> SyncConfig {
    SyncConfig::default()
        .with_settling_delay_ms(0)
        .with_admin_retry(RetryConfig {
            max_attempts: 5,
            base_delay_ms: 0,
        })
}

/// A stored user with id and primary email.
pub fn user(id: &str, email: &str) -> User {
    User {
        id: Nullable::Value(id.to_string()),
        primary_email: Nullable::Value(email.to_string()),
        ..User::default()
    }
}

/// A stored group with id and email.
pub fn group(id: &str, email: &str) -> Group {
    Group {
        id: Nullable::Value(id.to_string()),
        email: Nullable::Value(email.to_string()),
        ..Group::default()
    }
}
