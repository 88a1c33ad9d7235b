//! Static action catalog.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a catalog action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionId {
    SplitTicket,
    Reassign,
    MoveToBacklog,
    EscalatePriority,
    FlagBlocked,
    TransitionForward,
    LinkRelated,
    #[serde(rename = "re-estimate")]
    Reestimate,
    BroadcastNote,
    CreateSubtask,
}

impl ActionId {
    /// Every action, in catalog order.
    pub const ALL: [ActionId; 10] = [
        Self::SplitTicket,
        Self::Reassign,
        Self::MoveToBacklog,
        Self::EscalatePriority,
        Self::FlagBlocked,
        Self::TransitionForward,
        Self::LinkRelated,
        Self::Reestimate,
        Self::BroadcastNote,
        Self::CreateSubtask,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SplitTicket => "split-ticket",
            Self::Reassign => "reassign",
            Self::MoveToBacklog => "move-to-backlog",
            Self::EscalatePriority => "escalate-priority",
            Self::FlagBlocked => "flag-blocked",
            Self::TransitionForward => "transition-forward",
            Self::LinkRelated => "link-related",
            Self::Reestimate => "re-estimate",
            Self::BroadcastNote => "broadcast-note",
            Self::CreateSubtask => "create-subtask",
        }
    }

    /// The catalog entry for this action.
    pub fn definition(&self) -> &'static ActionDefinition {
        &CATALOG[*self as usize]
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown action identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action '{0}'")]
pub struct UnknownAction(pub String);

impl FromStr for ActionId {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

/// What kind of intervention an action is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Scope,
    Ownership,
    Priority,
    Visibility,
    Flow,
    Dependencies,
    Estimation,
    Communication,
}

/// Tracker write the action would trigger if taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOperation {
    CreateIssues,
    UpdateAssignee,
    RemoveFromSprint,
    UpdatePriority,
    SetFlag,
    TransitionIssue,
    CreateIssueLink,
    UpdateEstimate,
    AddComment,
    CreateSubtask,
}

/// A catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionDefinition {
    pub id: ActionId,
    pub category: Category,
    pub name: &'static str,
    pub description: &'static str,
    pub operation: WriteOperation,
}

/// The action catalog, indexed by `ActionId` discriminant.
pub static CATALOG: [ActionDefinition; 10] = [
    ActionDefinition {
        id: ActionId::SplitTicket,
        category: Category::Scope,
        name: "Split ticket",
        description: "Break a large or stuck item into smaller deliverable pieces",
        operation: WriteOperation::CreateIssues,
    },
    ActionDefinition {
        id: ActionId::Reassign,
        category: Category::Ownership,
        name: "Reassign",
        description: "Hand the item to someone with capacity",
        operation: WriteOperation::UpdateAssignee,
    },
    ActionDefinition {
        id: ActionId::MoveToBacklog,
        category: Category::Scope,
        name: "Move to backlog",
        description: "Defer the item out of the current sprint",
        operation: WriteOperation::RemoveFromSprint,
    },
    ActionDefinition {
        id: ActionId::EscalatePriority,
        category: Category::Priority,
        name: "Escalate priority",
        description: "Raise the item's priority so it gets attention",
        operation: WriteOperation::UpdatePriority,
    },
    ActionDefinition {
        id: ActionId::FlagBlocked,
        category: Category::Visibility,
        name: "Flag as blocked",
        description: "Mark the item as impeded so the team can see it",
        operation: WriteOperation::SetFlag,
    },
    ActionDefinition {
        id: ActionId::TransitionForward,
        category: Category::Flow,
        name: "Move forward",
        description: "Transition the item to its next workflow status",
        operation: WriteOperation::TransitionIssue,
    },
    ActionDefinition {
        id: ActionId::LinkRelated,
        category: Category::Dependencies,
        name: "Link blocker",
        description: "Link the item to whatever is blocking it",
        operation: WriteOperation::CreateIssueLink,
    },
    ActionDefinition {
        id: ActionId::Reestimate,
        category: Category::Estimation,
        name: "Re-estimate",
        description: "Revisit the item's size estimate",
        operation: WriteOperation::UpdateEstimate,
    },
    ActionDefinition {
        id: ActionId::BroadcastNote,
        category: Category::Communication,
        name: "Post status note",
        description: "Comment on the item to tell stakeholders where it stands",
        operation: WriteOperation::AddComment,
    },
    ActionDefinition {
        id: ActionId::CreateSubtask,
        category: Category::Scope,
        name: "Add sub-task",
        description: "Track the remaining work as sub-tasks",
        operation: WriteOperation::CreateSubtask,
    },
];

/// How strongly an action applies to an item.
///
/// Ordered most to least urgent, so sorting ascending puts `Critical` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    Critical,
    Recommended,
    Available,
    Hidden,
}

impl fmt::Display for Relevance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Critical => "critical",
            Self::Recommended => "recommended",
            Self::Available => "available",
            Self::Hidden => "hidden",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_indexed_by_id() {
        for id in ActionId::ALL {
            assert_eq!(id.definition().id, id);
        }
    }

    #[test]
    fn test_action_id_round_trip_names() {
        assert_eq!("split-ticket".parse::<ActionId>(), Ok(ActionId::SplitTicket));
        assert_eq!(" Re-Estimate ".parse::<ActionId>(), Ok(ActionId::Reestimate));
        assert!("teleport".parse::<ActionId>().is_err());
        assert_eq!(
            serde_json::to_string(&ActionId::Reestimate).unwrap(),
            "\"re-estimate\""
        );
        assert_eq!(
            serde_json::to_string(&ActionId::MoveToBacklog).unwrap(),
            "\"move-to-backlog\""
        );
    }

    #[test]
    fn test_relevance_order() {
        assert!(Relevance::Critical < Relevance::Recommended);
        assert!(Relevance::Recommended < Relevance::Available);
        assert!(Relevance::Available < Relevance::Hidden);
    }
}
