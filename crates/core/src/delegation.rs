//! Walks the reporting chain from an unreachable approver to the next employee
//! who can act on a leave request, ending at HR when the chain runs out.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::availability::AvailabilityOracle;
use crate::domain::approval::{DelegationHop, DelegationReason};
use crate::domain::employee::{Employee, EmployeeId};
use crate::domain::leave::DateRange;
use crate::org::OrgGraph;
use crate::ports::CollaboratorError;

/// Upper bound on escalations a single request may accumulate before it goes to HR.
pub const MAX_ESCALATIONS: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DelegationQuery {
    pub start_approver: EmployeeId,
    /// Never selected as the resolution.
    pub requester: EmployeeId,
    pub range: DateRange,
    pub reason: DelegationReason,
    pub escalation_count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationResolution {
    pub approver: EmployeeId,
    pub hops: Vec<DelegationHop>,
    pub reached_hr: bool,
}

impl DelegationResolution {
    /// A resolution without hops leaves the request as it is.
    pub fn changes_approver(&self) -> bool {
        !self.hops.is_empty()
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DelegationError {
    #[error("no approver could be resolved from `{start_approver}` after {hops_walked} hop(s)")]
    ResolutionFailure { start_approver: EmployeeId, hops_walked: usize },
    #[error("delegation lookup failed: {0}")]
    Lookup(#[from] CollaboratorError),
}

#[derive(Clone)]
pub struct DelegationEngine {
    org: Arc<dyn OrgGraph>,
    availability: Arc<dyn AvailabilityOracle>,
}

impl DelegationEngine {
    pub fn new(org: Arc<dyn OrgGraph>, availability: Arc<dyn AvailabilityOracle>) -> Self {
        Self { org, availability }
    }

    pub async fn find_next_available_approver(
        &self,
        query: &DelegationQuery,
    ) -> Result<DelegationResolution, DelegationError> {
        let mut walk = Walk { query, visited: HashSet::new(), hops: Vec::new() };

        let Some(mut node) = self.org.employee(query.start_approver).await? else {
            return self.hr_fallback(walk, query.start_approver).await;
        };
        walk.visited.insert(node.id);

        loop {
            if node.is_hr() && node.id != query.requester {
                return Ok(walk.resolve(node.id, true));
            }

            if node.id != query.start_approver
                && node.id != query.requester
                && !self.availability.is_unavailable(node.id, &query.range).await?
            {
                return Ok(walk.resolve(node.id, false));
            }

            if walk.would_exceed_cap() {
                return self.hr_fallback(walk, node.id).await;
            }

            let Some(manager) = self.next_manager(&node, &walk.visited).await? else {
                return self.hr_fallback(walk, node.id).await;
            };

            walk.visited.insert(manager.id);
            walk.push_hop(node.id, manager.id);
            node = manager;
        }
    }

    /// `None` when the chain ends, loops back, or points at an unknown employee.
    async fn next_manager(
        &self,
        node: &Employee,
        visited: &HashSet<EmployeeId>,
    ) -> Result<Option<Employee>, CollaboratorError> {
        let Some(manager_id) = node.manager_id else {
            return Ok(None);
        };
        if visited.contains(&manager_id) {
            return Ok(None);
        }
        self.org.employee(manager_id).await
    }

    async fn hr_fallback(
        &self,
        mut walk: Walk<'_>,
        from: EmployeeId,
    ) -> Result<DelegationResolution, DelegationError> {
        let candidate = self
            .org
            .hr_employees()
            .await?
            .into_iter()
            .map(|employee| employee.id)
            .find(|id| !walk.visited.contains(id) && *id != walk.query.requester);

        let Some(hr_id) = candidate else {
            return Err(DelegationError::ResolutionFailure {
                start_approver: walk.query.start_approver,
                hops_walked: walk.hops.len(),
            });
        };

        walk.push_hop(from, hr_id);
        Ok(walk.resolve(hr_id, true))
    }
}

struct Walk<'q> {
    query: &'q DelegationQuery,
    visited: HashSet<EmployeeId>,
    hops: Vec<DelegationHop>,
}

impl Walk<'_> {
    fn would_exceed_cap(&self) -> bool {
        let taken = u32::try_from(self.hops.len()).unwrap_or(u32::MAX);
        self.query.escalation_count.saturating_add(taken).saturating_add(1) > MAX_ESCALATIONS
    }

    fn push_hop(&mut self, from: EmployeeId, to: EmployeeId) {
        let reason = if self.hops.is_empty() {
            self.query.reason
        } else {
            DelegationReason::AlsoUnavailable
        };
        self.hops.push(DelegationHop { from_approver_id: from, to_approver_id: to, reason });
    }

    fn resolve(self, approver: EmployeeId, reached_hr: bool) -> DelegationResolution {
        DelegationResolution { approver, hops: self.hops, reached_hr }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::{DelegationEngine, DelegationError, DelegationQuery, MAX_ESCALATIONS};
    use crate::availability::InMemoryAvailabilityOracle;
    use crate::domain::approval::DelegationReason;
    use crate::domain::employee::{Employee, EmployeeId, EmployeeRole};
    use crate::domain::leave::DateRange;
    use crate::org::test_support::employee;
    use crate::org::InMemoryOrgGraph;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 7, 1).expect("start"),
            NaiveDate::from_ymd_opt(2024, 7, 3).expect("end"),
        )
        .expect("range")
    }

    fn engine(employees: Vec<Employee>, on_leave: &[i64]) -> DelegationEngine {
        let leave = on_leave.iter().map(|id| (EmployeeId(*id), range())).collect();
        DelegationEngine::new(
            Arc::new(InMemoryOrgGraph::new(employees)),
            Arc::new(InMemoryAvailabilityOracle::with_leave(leave)),
        )
    }

    fn query(start: i64, requester: i64, escalation_count: u32) -> DelegationQuery {
        DelegationQuery {
            start_approver: EmployeeId(start),
            requester: EmployeeId(requester),
            range: range(),
            reason: DelegationReason::UnavailableOnLeave,
            escalation_count,
        }
    }

    #[tokio::test]
    async fn unavailable_manager_delegates_to_available_grand_manager() {
        let engine = engine(
            vec![
                employee(1, EmployeeRole::Individual, Some(2)),
                employee(2, EmployeeRole::Manager, Some(3)),
                employee(3, EmployeeRole::Manager, None),
                employee(9, EmployeeRole::Hr, None),
            ],
            &[2],
        );

        let resolution = engine.find_next_available_approver(&query(2, 1, 0)).await.expect("resolves");

        assert_eq!(resolution.approver, EmployeeId(3));
        assert!(!resolution.reached_hr);
        assert_eq!(resolution.hops.len(), 1);
        assert_eq!(resolution.hops[0].from_approver_id, EmployeeId(2));
        assert_eq!(resolution.hops[0].reason, DelegationReason::UnavailableOnLeave);
    }

    #[tokio::test]
    async fn later_hops_are_tagged_also_unavailable() {
        let engine = engine(
            vec![
                employee(1, EmployeeRole::Individual, Some(2)),
                employee(2, EmployeeRole::Manager, Some(3)),
                employee(3, EmployeeRole::Manager, Some(4)),
                employee(4, EmployeeRole::Manager, None),
            ],
            &[2, 3],
        );
        let mut timeout = query(2, 1, 0);
        timeout.reason = DelegationReason::Timeout;

        let resolution = engine.find_next_available_approver(&timeout).await.expect("resolves");

        assert_eq!(resolution.approver, EmployeeId(4));
        let reasons: Vec<_> = resolution.hops.iter().map(|hop| hop.reason).collect();
        assert_eq!(reasons, vec![DelegationReason::Timeout, DelegationReason::AlsoUnavailable]);
    }

    #[tokio::test]
    async fn top_of_chain_without_manager_falls_back_to_first_hr() {
        let engine = engine(
            vec![
                employee(1, EmployeeRole::Individual, Some(2)),
                employee(2, EmployeeRole::Manager, None),
                employee(12, EmployeeRole::Hr, None),
                employee(11, EmployeeRole::Hr, None),
            ],
            &[2],
        );

        let resolution = engine.find_next_available_approver(&query(2, 1, 0)).await.expect("resolves");

        assert_eq!(resolution.approver, EmployeeId(11));
        assert!(resolution.reached_hr);
        assert_eq!(resolution.hops.len(), 1);
    }

    #[tokio::test]
    async fn hr_in_chain_is_terminal_even_when_on_leave() {
        let engine = engine(
            vec![
                employee(1, EmployeeRole::Individual, Some(2)),
                employee(2, EmployeeRole::Manager, Some(7)),
                employee(7, EmployeeRole::Hr, None),
            ],
            &[2, 7],
        );

        let resolution = engine.find_next_available_approver(&query(2, 1, 0)).await.expect("resolves");
        assert_eq!(resolution.approver, EmployeeId(7));
        assert!(resolution.reached_hr);
    }

    #[tokio::test]
    async fn cyclic_chain_terminates_within_cap_plus_one_hops() {
        let engine = engine(
            vec![
                employee(1, EmployeeRole::Individual, Some(2)),
                employee(2, EmployeeRole::Manager, Some(3)),
                employee(3, EmployeeRole::Manager, Some(4)),
                employee(4, EmployeeRole::Manager, Some(2)),
                employee(20, EmployeeRole::Hr, None),
            ],
            &[2, 3, 4],
        );

        let resolution = engine.find_next_available_approver(&query(2, 1, 0)).await.expect("resolves");

        assert_eq!(resolution.approver, EmployeeId(20));
        assert!(resolution.hops.len() <= MAX_ESCALATIONS as usize + 1);
        assert_eq!(resolution.hops.last().map(|hop| hop.from_approver_id), Some(EmployeeId(4)));
    }

    #[tokio::test]
    async fn every_chain_shape_terminates_within_bound() {
        // Each manager points at a fixed successor; the table covers self-loops,
        // long chains, short cycles and dangling references.
        let shapes: Vec<Vec<(i64, Option<i64>)>> = vec![
            vec![(2, Some(2))],
            vec![(2, Some(3)), (3, Some(2))],
            (2..12).map(|id| (id, Some(id + 1))).collect(),
            vec![(2, Some(99))],
            vec![(2, Some(3)), (3, Some(4)), (4, Some(3))],
        ];

        for shape in shapes {
            for escalation_count in 0..=MAX_ESCALATIONS {
                let mut employees = vec![employee(1, EmployeeRole::Individual, Some(2))];
                employees.extend(
                    shape.iter().map(|(id, manager)| employee(*id, EmployeeRole::Manager, *manager)),
                );
                let on_leave: Vec<i64> = shape.iter().map(|(id, _)| *id).collect();
                let engine = engine(employees, &on_leave);

                let outcome =
                    engine.find_next_available_approver(&query(2, 1, escalation_count)).await;

                match outcome {
                    Ok(resolution) => {
                        assert!(resolution.hops.len() <= MAX_ESCALATIONS as usize + 1)
                    }
                    Err(DelegationError::ResolutionFailure { hops_walked, .. }) => {
                        assert!(hops_walked <= MAX_ESCALATIONS as usize)
                    }
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
        }
    }

    #[tokio::test]
    async fn cap_reached_goes_straight_to_hr() {
        let engine = engine(
            vec![
                employee(1, EmployeeRole::Individual, Some(2)),
                employee(2, EmployeeRole::Manager, Some(3)),
                employee(3, EmployeeRole::Manager, None),
                employee(8, EmployeeRole::Hr, None),
            ],
            &[2],
        );

        let resolution = engine
            .find_next_available_approver(&query(2, 1, MAX_ESCALATIONS))
            .await
            .expect("resolves");

        assert_eq!(resolution.approver, EmployeeId(8));
        assert_eq!(resolution.hops.len(), 1);
    }

    #[tokio::test]
    async fn cap_reached_without_reachable_hr_is_resolution_failure() {
        // The only HR employee is the requester, who can never approve their own leave.
        let engine = engine(
            vec![
                employee(5, EmployeeRole::Hr, Some(2)),
                employee(2, EmployeeRole::Manager, Some(3)),
                employee(3, EmployeeRole::Manager, None),
            ],
            &[2],
        );

        let error = engine
            .find_next_available_approver(&query(2, 5, MAX_ESCALATIONS))
            .await
            .expect_err("nothing left to try");

        assert_eq!(
            error,
            DelegationError::ResolutionFailure { start_approver: EmployeeId(2), hops_walked: 0 }
        );
    }

    #[tokio::test]
    async fn requester_in_chain_is_skipped() {
        // Manager-role requester 4 sits above their own acting approver in a
        // malformed chain; the walk must move past them.
        let engine = engine(
            vec![
                employee(2, EmployeeRole::Manager, Some(4)),
                employee(4, EmployeeRole::Manager, Some(6)),
                employee(6, EmployeeRole::Manager, None),
            ],
            &[2],
        );

        let resolution = engine.find_next_available_approver(&query(2, 4, 0)).await.expect("resolves");
        assert_eq!(resolution.approver, EmployeeId(6));
        assert_eq!(resolution.hops.len(), 2);
    }

    #[tokio::test]
    async fn unknown_start_approver_falls_back_to_hr() {
        let engine = engine(vec![employee(3, EmployeeRole::Hr, None)], &[]);

        let resolution = engine.find_next_available_approver(&query(42, 1, 0)).await.expect("resolves");
        assert_eq!(resolution.approver, EmployeeId(3));
        assert_eq!(resolution.hops[0].from_approver_id, EmployeeId(42));
    }
}
