use async_trait::async_trait;

use crate::PagenetNode;

#[async_trait]
/// An extension of the base node/cluster.
///
/// This can be used to extend a base node to include additional
/// functionality, like the replicated state core or anything else which
/// may want to use the membership and RPC systems.
pub trait NodeExtension {
    type Output;
    type Error;

    async fn init_extension(self, node: &PagenetNode) -> Result<Self::Output, Self::Error>;
}
