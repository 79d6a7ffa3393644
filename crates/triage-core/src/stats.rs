//! Derived dashboard statistics
//!
//! Computed fresh from the role-visible record sets on every call,
//! never stored. Closed issues count toward the total but get no
//! bucket of their own.

use serde::{Deserialize, Serialize};

use crate::issue::{Issue, Priority, Status};
use crate::project::Project;

/// Aggregate numbers for the dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_issues: usize,
    pub open_issues: usize,
    pub in_progress_issues: usize,
    pub resolved_issues: usize,
    /// Priority=critical regardless of status
    pub critical_issues: usize,
    pub total_projects: usize,
    /// round(resolved / total * 100); 0 when there are no issues
    pub completion_rate: u8,
}

impl DashboardStats {
    pub fn compute(issues: &[Issue], projects: &[Project]) -> Self {
        let total_issues = issues.len();
        let resolved_issues = issues
            .iter()
            .filter(|i| i.status == Status::Resolved)
            .count();

        let completion_rate = if total_issues == 0 {
            0
        } else {
            ((resolved_issues as f64 / total_issues as f64) * 100.0).round() as u8
        };

        Self {
            total_issues,
            open_issues: issues.iter().filter(|i| i.status == Status::Open).count(),
            in_progress_issues: issues
                .iter()
                .filter(|i| i.status == Status::InProgress)
                .count(),
            resolved_issues,
            critical_issues: issues
                .iter()
                .filter(|i| i.priority == Priority::Critical)
                .count(),
            total_projects: projects.len(),
            completion_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::NewIssue;

    fn issue_with(status: Status, priority: Priority) -> Issue {
        let mut issue = Issue::new(
            crate::id::generate_id(<Issue as crate::store::Record>::ID_PREFIX),
            NewIssue {
                title: "t".into(),
                description: None,
                priority: Some(priority),
                project_id: "prj-1".into(),
                assignee_id: None,
            },
            "usr-1".into(),
        );
        issue.status = status;
        issue
    }

    #[test]
    fn test_empty_set_has_zero_rate() {
        let stats = DashboardStats::compute(&[], &[]);
        assert_eq!(stats, DashboardStats::default());
    }

    #[test]
    fn test_scenario_two_open_one_in_progress_one_resolved() {
        let issues = vec![
            issue_with(Status::Open, Priority::Medium),
            issue_with(Status::Open, Priority::Medium),
            issue_with(Status::InProgress, Priority::Medium),
            issue_with(Status::Resolved, Priority::Medium),
        ];
        let stats = DashboardStats::compute(&issues, &[]);
        assert_eq!(stats.total_issues, 4);
        assert_eq!(stats.open_issues, 2);
        assert_eq!(stats.in_progress_issues, 1);
        assert_eq!(stats.resolved_issues, 1);
        assert_eq!(stats.completion_rate, 25);
    }

    #[test]
    fn test_closed_counts_in_total_only() {
        let issues = vec![
            issue_with(Status::Closed, Priority::Low),
            issue_with(Status::Resolved, Priority::Low),
        ];
        let stats = DashboardStats::compute(&issues, &[]);
        assert_eq!(stats.total_issues, 2);
        assert_eq!(stats.open_issues + stats.in_progress_issues + stats.resolved_issues, 1);
        assert_eq!(stats.completion_rate, 50);
    }

    #[test]
    fn test_critical_counted_across_statuses() {
        let issues = vec![
            issue_with(Status::Open, Priority::Critical),
            issue_with(Status::Closed, Priority::Critical),
            issue_with(Status::Resolved, Priority::Low),
        ];
        let stats = DashboardStats::compute(&issues, &[]);
        assert_eq!(stats.critical_issues, 2);
    }

    #[test]
    fn test_rate_rounds_to_nearest() {
        let issues = vec![
            issue_with(Status::Resolved, Priority::Low),
            issue_with(Status::Open, Priority::Low),
            issue_with(Status::Open, Priority::Low),
        ];
        // 1/3 -> 33.33 -> 33
        assert_eq!(DashboardStats::compute(&issues, &[]).completion_rate, 33);
    }
}
