//! Send-as addresses as a flat value collection
//!
//! Values are mail-address strings: `Display Name <user@example.com>` or a
//! bare address. The mailbox's primary send-as entry is owned by the
//! directory and never surfaces here.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::error::RemoteError;
use crate::model::SendAs;
use crate::store::{CollectionStore, RemoteResult, SendAsStore};

/// A parsed mail address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAddress {
    pub display_name: Option<String>,
    pub address: String,
}

impl MailAddress {
    pub fn new(address: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            display_name: display_name.filter(|n| !n.trim().is_empty()),
            address: address.into(),
        }
    }

    /// Parse `Name <addr>`, `"Name, Quoted" <addr>`, `<addr>` or `addr`.
    pub fn parse(value: &str) -> Result<Self, RemoteError> {
        let value = value.trim();
        let invalid = || RemoteError::invalid_input(format!("invalid mail address '{value}'"));

        let (display_name, address) = match (value.rfind('<'), value.ends_with('>')) {
            (Some(open), true) => {
                let name = value[..open].trim().trim_matches('"').trim();
                let address = value[open + 1..value.len() - 1].trim();
                (Some(name.to_string()), address)
            }
            (None, false) => (None, value),
            _ => return Err(invalid()),
        };

        let valid = match address.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && !domain.is_empty() && !address.contains(char::is_whitespace)
            }
            None => false,
        };
        if !valid {
            return Err(invalid());
        }

        Ok(Self::new(address, display_name))
    }
}

impl fmt::Display for MailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.display_name {
            Some(name) if name.contains(',') => write!(f, "\"{name}\" <{}>", self.address),
            Some(name) => write!(f, "{name} <{}>", self.address),
            None => f.write_str(&self.address),
        }
    }
}

impl From<&SendAs> for MailAddress {
    fn from(send_as: &SendAs) -> Self {
        MailAddress::new(send_as.send_as_email.clone(), send_as.display_name.clone())
    }
}

/// Non-primary send-as entries of a mailbox as formatted address strings.
#[derive(Clone)]
pub struct SendAsCollection {
    store: Arc<dyn SendAsStore>,
    make_default: bool,
}

impl SendAsCollection {
    pub fn new(store: Arc<dyn SendAsStore>) -> Self {
        Self {
            store,
            make_default: false,
        }
    }

    /// Mark newly added addresses as the mailbox default.
    #[must_use]
    pub fn make_new_addresses_default(mut self, make_default: bool) -> Self {
        self.make_default = make_default;
        self
    }
}

#[async_trait]
impl CollectionStore for SendAsCollection {
    async fn list(&self, owner: &str) -> RemoteResult<Vec<String>> {
        Ok(self
            .store
            .list(owner)
            .await?
            .iter()
            .filter(|s| !s.is_primary)
            .map(|s| MailAddress::from(s).to_string())
            .collect())
    }

    async fn add(&self, owner: &str, value: &str) -> RemoteResult<()> {
        let address = MailAddress::parse(value)?;
        let send_as = SendAs {
            send_as_email: address.address,
            display_name: address.display_name,
            is_default: self.make_default,
            ..SendAs::default()
        };
        self.store.create(owner, &send_as).await.map(|_| ())
    }

    async fn remove(&self, owner: &str, value: &str) -> RemoteResult<()> {
        let address = MailAddress::parse(value)?;
        self.store.delete(owner, &address.address).await
    }
}
