use serde::{Deserialize, Serialize};

/// Summary counters for the dashboard home, scoped to the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DashboardStats {
    pub entities: i64,
    pub users: i64,
    pub open_tasks: i64,
    pub overdue_tasks: i64,
    pub tasks_completed_30d: i64,
    pub upcoming_meetings_7d: i64,
    pub communications_sent_30d: i64,
    pub upcoming_hearings: i64,
    pub unread_notifications: i64,
}
