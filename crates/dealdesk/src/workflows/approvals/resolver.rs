//! Approver chains. A chain depends on the request type and nothing else.

use super::domain::{ApprovalLevel, LevelStatus, RequestType};
use crate::workflows::common::Role;

/// Request types whose final sign-off belongs to the founder.
pub const fn routes_to_founder(request_type: RequestType) -> bool {
    matches!(
        request_type,
        RequestType::DealAbove1Cr
            | RequestType::HighRiskCase
            | RequestType::AgentMisconduct
            | RequestType::StrategicException
    )
}

pub fn approver_roles(request_type: RequestType) -> Vec<Role> {
    if routes_to_founder(request_type) {
        vec![Role::OpsManager, Role::Founder]
    } else {
        vec![Role::OpsManager]
    }
}

pub fn build_chain(request_type: RequestType) -> Vec<ApprovalLevel> {
    approver_roles(request_type)
        .into_iter()
        .enumerate()
        .map(|(index, approver_role)| ApprovalLevel {
            level: index + 1,
            approver_role,
            status: LevelStatus::Pending,
            decided_by: None,
            decided_at: None,
            comments: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chains_are_a_function_of_type_alone() {
        for request_type in RequestType::ALL {
            assert_eq!(build_chain(request_type), build_chain(request_type));
            let chain = build_chain(request_type);
            assert!(!chain.is_empty());
            assert_eq!(chain.first().map(|l| l.approver_role), Some(Role::OpsManager));
            let last = chain.last().map(|l| l.approver_role);
            if routes_to_founder(request_type) {
                assert_eq!(last, Some(Role::Founder));
            } else {
                assert_eq!(chain.len(), 1);
            }
        }
    }

    #[test]
    fn levels_are_numbered_from_one() {
        let chain = build_chain(RequestType::StrategicException);
        assert_eq!(
            chain.iter().map(|level| level.level).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }
}
