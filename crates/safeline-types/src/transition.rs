//! Incident transition table
//!
//! Every status change an incident may undergo is listed in [`TRANSITIONS`].
//! Callers query the table; they never encode status rules of their own.

use crate::incident::IncidentStatus::{self, Assigned, Closed, InProgress, Reported, Resolved};
use serde::{Deserialize, Serialize};

/// Operation that requests a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Explicit status change
    SetStatus,
    /// (Re)assignment to an employee
    Assign,
}

/// Precondition attached to an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Guard {
    /// No precondition
    None,
    /// The incident must already carry an assignee
    RequiresAssignee,
    /// The new assignee must pass the assignment policy (checked by the engine
    /// against the directory before the edge is taken)
    EligibleAssignee,
}

/// One permitted edge of the incident state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: IncidentStatus,
    pub to: IncidentStatus,
    pub trigger: Trigger,
    pub guard: Guard,
}

const fn edge(from: IncidentStatus, to: IncidentStatus, trigger: Trigger, guard: Guard) -> Transition {
    Transition {
        from,
        to,
        trigger,
        guard,
    }
}

/// The complete incident state machine.
///
/// `Closed` has no outgoing edges. `Resolved` cannot be reassigned, and
/// reassignment of `Assigned`/`InProgress` incidents keeps their status.
pub const TRANSITIONS: &[Transition] = &[
    edge(Reported, Assigned, Trigger::Assign, Guard::EligibleAssignee),
    edge(Assigned, Assigned, Trigger::Assign, Guard::EligibleAssignee),
    edge(InProgress, InProgress, Trigger::Assign, Guard::EligibleAssignee),
    edge(Assigned, InProgress, Trigger::SetStatus, Guard::RequiresAssignee),
    edge(Assigned, Resolved, Trigger::SetStatus, Guard::None),
    edge(InProgress, Resolved, Trigger::SetStatus, Guard::None),
    edge(Resolved, Closed, Trigger::SetStatus, Guard::None),
    // Administrative override: any open incident may be closed
    edge(Reported, Closed, Trigger::SetStatus, Guard::None),
    edge(Assigned, Closed, Trigger::SetStatus, Guard::None),
    edge(InProgress, Closed, Trigger::SetStatus, Guard::None),
];

/// Look up the edge for an explicit status change
pub fn status_change(from: IncidentStatus, to: IncidentStatus) -> Option<&'static Transition> {
    TRANSITIONS
        .iter()
        .find(|t| t.trigger == Trigger::SetStatus && t.from == from && t.to == to)
}

/// Look up the edge taken when an incident in `from` is (re)assigned
pub fn assignment(from: IncidentStatus) -> Option<&'static Transition> {
    TRANSITIONS
        .iter()
        .find(|t| t.trigger == Trigger::Assign && t.from == from)
}

/// Statuses reachable from `from` through an explicit status change
pub fn status_targets(from: IncidentStatus) -> Vec<IncidentStatus> {
    TRANSITIONS
        .iter()
        .filter(|t| t.trigger == Trigger::SetStatus && t.from == from)
        .map(|t| t.to)
        .collect()
}

/// Whether the incident may still be reassigned in `from`
pub fn can_assign(from: IncidentStatus) -> bool {
    assignment(from).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_is_terminal() {
        assert!(TRANSITIONS.iter().all(|t| t.from != Closed));
        assert!(status_targets(Closed).is_empty());
        assert!(!can_assign(Closed));
    }

    #[test]
    fn test_in_progress_requires_prior_assignment() {
        assert!(status_change(Reported, InProgress).is_none());
        let edge = status_change(Assigned, InProgress).unwrap();
        assert_eq!(edge.guard, Guard::RequiresAssignee);
    }

    #[test]
    fn test_assignment_targets() {
        assert_eq!(assignment(Reported).unwrap().to, Assigned);
        assert_eq!(assignment(Assigned).unwrap().to, Assigned);
        assert_eq!(assignment(InProgress).unwrap().to, InProgress);
        assert!(assignment(Resolved).is_none());
    }

    #[test]
    fn test_every_open_status_can_close() {
        for from in [Reported, Assigned, InProgress, Resolved] {
            assert!(status_change(from, Closed).is_some(), "{from} must close");
        }
    }

    #[test]
    fn test_set_status_never_targets_assigned() {
        for from in IncidentStatus::ALL {
            assert!(status_change(from, Assigned).is_none());
        }
    }

    #[test]
    fn test_no_self_loops_on_set_status() {
        for from in IncidentStatus::ALL {
            assert!(status_change(from, from).is_none());
        }
    }
}
