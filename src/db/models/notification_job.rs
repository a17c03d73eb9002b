use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One pending delivery of a notification to one recipient.
///
/// Lifecycle: `unclaimed -> claimed -> terminal`. A terminal row is never
/// touched again; a failed delivery with budget left spawns a *new* row
/// instead of mutating this one.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct NotificationJob {
    pub id: i64,
    pub notification_id: i64,
    pub recipient_id: i64,

    /// Copied from the parent notification at creation; drives dequeue order.
    pub priority: i64,

    pub created_at: NaiveDateTime,

    /// Earliest legal claim time.
    pub not_before: NaiveDateTime,

    /// Remaining retry budget; non-increasing along a retry chain.
    pub retries_remaining: i64,

    /// Fleet-instance identifier of the claimant, null while unclaimed.
    pub owner: Option<String>,
    pub start_at: Option<NaiveDateTime>,
    pub end_at: Option<NaiveDateTime>,

    /// Null while in flight, then the delivery outcome.
    pub successful: Option<bool>,
}

#[allow(dead_code)]
impl NotificationJob {
    pub fn is_claimed(&self) -> bool {
        self.owner.is_some() && self.start_at.is_some() && self.end_at.is_none()
    }

    pub fn is_terminal(&self) -> bool {
        self.end_at.is_some()
    }

    pub fn is_eligible(&self, now: NaiveDateTime) -> bool {
        self.owner.is_none()
            && self.start_at.is_none()
            && self.end_at.is_none()
            && self.not_before <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn job() -> NotificationJob {
        let now = Utc::now().naive_utc();
        NotificationJob {
            id: 1,
            notification_id: 1,
            recipient_id: 1,
            priority: 50,
            created_at: now,
            not_before: now,
            retries_remaining: 3,
            owner: None,
            start_at: None,
            end_at: None,
            successful: None,
        }
    }

    #[test]
    fn fresh_job_is_eligible() {
        let job = job();
        let now = Utc::now().naive_utc();
        assert!(job.is_eligible(now));
        assert!(!job.is_claimed());
        assert!(!job.is_terminal());
    }

    #[test]
    fn future_not_before_blocks_eligibility() {
        let mut job = job();
        job.not_before = job.not_before + chrono::Duration::seconds(60);
        assert!(!job.is_eligible(Utc::now().naive_utc()));
    }

    #[test]
    fn claimed_and_terminal_states_are_disjoint() {
        let now = Utc::now().naive_utc();
        let mut job = job();
        job.owner = Some("instance-a".to_string());
        job.start_at = Some(now);
        assert!(job.is_claimed());
        assert!(!job.is_eligible(now));

        job.end_at = Some(now);
        job.successful = Some(true);
        assert!(job.is_terminal());
        assert!(!job.is_claimed());
    }
}
