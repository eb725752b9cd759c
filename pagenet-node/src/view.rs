use std::collections::BTreeMap;
use std::net::SocketAddr;

/// A single member of the cluster.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClusterMember {
    /// The unique name of the node in the cluster.
    pub name: String,
    /// The public address of the node's RPC server.
    pub public_addr: SocketAddr,
}

impl ClusterMember {
    pub fn new(name: impl Into<String>, public_addr: SocketAddr) -> Self {
        Self {
            name: name.into(),
            public_addr,
        }
    }
}

/// A snapshot of the members currently reachable through the gossip layer.
///
/// Views are replaced wholesale whenever the membership changes, they are
/// never mutated in place. The local member is always part of its own view.
#[derive(Clone, Debug)]
pub struct ClusterView {
    local: ClusterMember,
    members: BTreeMap<String, ClusterMember>,
}

impl ClusterView {
    /// Creates a view containing only the local member.
    pub fn new(local: ClusterMember) -> Self {
        let members = BTreeMap::from_iter([(local.name.clone(), local.clone())]);
        Self { local, members }
    }

    /// Creates a view from a set of members.
    ///
    /// The local member is inserted if the provided set does not already
    /// contain it.
    pub fn from_members(
        local: ClusterMember,
        members: impl IntoIterator<Item = ClusterMember>,
    ) -> Self {
        let mut members: BTreeMap<String, ClusterMember> = members
            .into_iter()
            .map(|member| (member.name.clone(), member))
            .collect();
        members
            .entry(local.name.clone())
            .or_insert_with(|| local.clone());
        Self { local, members }
    }

    /// The member this process runs as.
    pub fn local(&self) -> &ClusterMember {
        &self.local
    }

    /// The number of reachable members, the local member included.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether a member with the given name is part of the view.
    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ClusterMember> {
        self.members.get(name)
    }

    /// All reachable members, the local member included.
    pub fn members(&self) -> impl Iterator<Item = &ClusterMember> {
        self.members.values()
    }

    /// All reachable members excluding the local member.
    pub fn peers(&self) -> impl Iterator<Item = &ClusterMember> {
        let local_name = self.local.name.as_str();
        self.members
            .values()
            .filter(move |member| member.name != local_name)
    }
}
