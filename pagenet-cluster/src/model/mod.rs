mod validate;

use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

pub use validate::{ConstraintViolation, Validate};

/// Normalizes an entity name for use as a state key.
///
/// Names are case-insensitive identities, the normalized form is what every
/// map in the replicated state is keyed by.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// An entity stored in the replicated state under a unique,
/// case-insensitive name.
pub trait NamedEntity {
    fn name(&self) -> &str;

    fn normalized_name(&self) -> String {
        normalize_name(self.name())
    }
}

pub(crate) fn unix_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// An operator account.
#[repr(C)]
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[archive(check_bytes)]
pub struct User {
    pub name: String,
    /// The salted password hash produced by [crate::auth::hash_password].
    pub hash: String,
    pub mail: String,
    pub admin: bool,
}

impl User {
    pub fn new(
        name: impl Into<String>,
        hash: impl Into<String>,
        mail: impl Into<String>,
        admin: bool,
    ) -> Self {
        Self {
            name: name.into(),
            hash: hash.into(),
            mail: mail.into(),
            admin,
        }
    }

    /// The administrator account created when a brand-new cluster is formed.
    ///
    /// The placeholder password is run through the password hashing facility
    /// before it is stored, it is expected to be changed by the operator
    /// immediately after the first login.
    pub fn genesis() -> Self {
        Self::new(
            "admin",
            crate::auth::hash_password("admin"),
            "admin@example.com",
            true,
        )
    }
}

impl NamedEntity for User {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Operational status of a transmitter node.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[archive(check_bytes)]
pub enum NodeStatus {
    Online,
    Offline,
    Suspended,
}

/// A transmitter node record.
///
/// Records are created during bootstrap or by administrative operation and
/// are never silently deleted. The address and status are refreshed whenever
/// the owning process reconnects.
#[repr(C)]
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[archive(check_bytes)]
pub struct Node {
    pub name: String,
    pub address: SocketAddr,
    /// Monotonic counter bumped on out-of-band state reconciliation.
    pub version: String,
    /// Monotonic counter bumped on out-of-band configuration reconciliation.
    pub config_version: String,
    pub status: NodeStatus,
    pub owner_names: Vec<String>,
}

impl Node {
    pub fn new(
        name: impl Into<String>,
        address: SocketAddr,
        version: impl Into<String>,
        config_version: impl Into<String>,
        status: NodeStatus,
    ) -> Self {
        Self {
            name: name.into(),
            address,
            version: version.into(),
            config_version: config_version.into(),
            status,
            owner_names: Vec::new(),
        }
    }

    /// The node record created for the founding member of a brand-new cluster.
    pub fn genesis(name: impl Into<String>, address: SocketAddr) -> Self {
        let mut node = Self::new(name, address, "0", "0", NodeStatus::Online);
        node.owner_names = vec!["admin".to_string()];
        node
    }
}

impl NamedEntity for Node {
    fn name(&self) -> &str {
        &self.name
    }
}

/// An ephemeral paging request submitted by a user.
#[repr(C)]
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[archive(check_bytes)]
pub struct Call {
    pub owner_name: String,
    pub text: String,
    /// Unix timestamp in milliseconds, stamped when the call is created.
    pub timestamp_ms: u64,
}

impl Call {
    /// The maximum length of the message payload.
    pub const MAX_TEXT_LEN: usize = 80;

    pub fn new(owner_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            owner_name: owner_name.into(),
            text: text.into(),
            timestamp_ms: unix_timestamp_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Admin"), "admin");
        assert_eq!(normalize_name("  Node-1 "), "node-1");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn test_genesis_user() {
        let user = User::genesis();
        assert_eq!(user.name, "admin");
        assert!(user.admin);
        assert_ne!(user.hash, "admin", "Password must be stored hashed.");
        assert!(crate::auth::verify_password("admin", &user.hash));
    }

    #[test]
    fn test_genesis_node() {
        let addr = "127.0.0.1:7010".parse().unwrap();
        let node = Node::genesis("node-1", addr);
        assert_eq!(node.version, "0");
        assert_eq!(node.config_version, "0");
        assert_eq!(node.status, NodeStatus::Online);
        assert_eq!(node.owner_names, vec!["admin".to_string()]);
    }

    #[test]
    fn test_call_is_stamped() {
        let call = Call::new("admin", "hello");
        assert!(call.timestamp_ms > 0);
    }
}
