use crate::error::OperationError;
use crate::model::{normalize_name, Call, Node, User, Validate};

/// The type of entity an operation identity refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Node,
}

/// A named state operation.
///
/// Every reachable member applies the same operation against its own state,
/// in the same order, which is what keeps the replicas converged.
#[derive(Debug, Clone, PartialEq, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
#[archive(check_bytes)]
pub enum Operation {
    PutUser(User),
    DeleteUser(String),
    PutNode(Node),
    DeleteNode(String),
    PutCall(Call),
}

impl Operation {
    /// A stable label for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::PutUser(_) => "put_user",
            Operation::DeleteUser(_) => "delete_user",
            Operation::PutNode(_) => "put_node",
            Operation::DeleteNode(_) => "delete_node",
            Operation::PutCall(_) => "put_call",
        }
    }

    /// Checks the operand against the entity's structural constraints.
    pub(crate) fn validate(&self) -> Result<(), OperationError> {
        match self {
            Operation::PutUser(user) => user.validate().map_err(OperationError::Validation),
            Operation::PutNode(node) => node.validate().map_err(OperationError::Validation),
            Operation::PutCall(call) => call.validate().map_err(OperationError::Validation),
            Operation::DeleteUser(name) | Operation::DeleteNode(name) => {
                if normalize_name(name).is_empty() {
                    Err(OperationError::EmptyInput)
                } else {
                    Ok(())
                }
            },
        }
    }

    /// The identity a deletion operates on, if this is a deletion.
    pub(crate) fn delete_target(&self) -> Option<(EntityKind, &str)> {
        match self {
            Operation::DeleteUser(name) => Some((EntityKind::User, name)),
            Operation::DeleteNode(name) => Some((EntityKind::Node, name)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_with_empty_name_is_empty_input() {
        let op = Operation::DeleteUser("   ".to_string());
        assert!(matches!(op.validate(), Err(OperationError::EmptyInput)));
    }

    #[test]
    fn test_put_with_invalid_payload_is_validation_error() {
        let op = Operation::PutUser(User::new("", "", "", false));
        assert!(matches!(
            op.validate(),
            Err(OperationError::Validation(_))
        ));
    }

    #[test]
    fn test_delete_target() {
        let op = Operation::DeleteNode("Node-1".to_string());
        assert_eq!(op.delete_target(), Some((EntityKind::Node, "Node-1")));

        let op = Operation::PutCall(Call::new("admin", "hello"));
        assert_eq!(op.delete_target(), None);
    }
}
