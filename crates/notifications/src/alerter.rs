//! Disconnected-channel alerts.
//!
//! Candidates whose organization's channel is disconnected are not
//! dispatched. The scheduler collects them during a run and hands them here
//! once at the end, grouped per organization.

use std::collections::BTreeMap;
use std::sync::Arc;

use agenda_core::types::DbId;
use agenda_db::models::candidate::NotificationCandidate;

use crate::delivery::email::AlertMailer;

/// Pending notifications of one organization blocked by its channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectedGroup {
    pub organization_id: DbId,
    pub organization_name: String,
    pub contact_email: Option<String>,
    pub instance_name: String,
    pub pending: usize,
}

/// Subject line for a disconnection alert.
pub fn alert_subject(pending: usize) -> String {
    format!("Channel Disconnected — {pending} pending notifications")
}

fn alert_body(group: &DisconnectedGroup) -> String {
    format!(
        "Hello {},\n\n\
         Your messaging channel \"{}\" is disconnected, so {} appointment \
         notification(s) could not be sent. Reconnect the channel and they \
         will be delivered automatically on the next run while still due.\n",
        group.organization_name, group.instance_name, group.pending
    )
}

pub struct DisconnectionAlerter {
    mailer: Option<Arc<dyn AlertMailer>>,
}

impl DisconnectionAlerter {
    /// `mailer = None` logs alerts without e-mailing them.
    pub fn new(mailer: Option<Arc<dyn AlertMailer>>) -> Self {
        Self { mailer }
    }

    /// Group candidates by organization, ordered by organization id.
    pub fn group(candidates: &[NotificationCandidate]) -> Vec<DisconnectedGroup> {
        let mut groups: BTreeMap<DbId, DisconnectedGroup> = BTreeMap::new();
        for candidate in candidates {
            groups
                .entry(candidate.organization_id)
                .or_insert_with(|| DisconnectedGroup {
                    organization_id: candidate.organization_id,
                    organization_name: candidate.organization_name.clone(),
                    contact_email: candidate
                        .organization_contact_email
                        .clone()
                        .filter(|e| !e.trim().is_empty()),
                    instance_name: candidate.channel_instance_name.clone(),
                    pending: 0,
                })
                .pending += 1;
        }
        groups.into_values().collect()
    }

    /// Log every group and e-mail those with a contact address. Returns the
    /// number of e-mails sent.
    pub async fn alert(&self, groups: &[DisconnectedGroup]) -> usize {
        let mut emailed = 0;

        for group in groups {
            tracing::warn!(
                organization_id = group.organization_id,
                instance = %group.instance_name,
                pending = group.pending,
                "Messaging channel disconnected, notifications held back"
            );

            let (Some(mailer), Some(to)) = (&self.mailer, &group.contact_email) else {
                continue;
            };

            match mailer
                .send_alert(to, &alert_subject(group.pending), &alert_body(group))
                .await
            {
                Ok(()) => emailed += 1,
                Err(e) => tracing::error!(
                    organization_id = group.organization_id,
                    error = %e,
                    "Failed to send disconnection alert"
                ),
            }
        }

        emailed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::delivery::email::EmailError;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl AlertMailer for RecordingMailer {
        async fn send_alert(&self, to: &str, subject: &str, _body: &str) -> Result<(), EmailError> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }

    fn candidate(organization_id: DbId, email: Option<&str>) -> NotificationCandidate {
        NotificationCandidate {
            appointment_id: 1,
            organization_id,
            organization_name: format!("Org {organization_id}"),
            organization_contact_email: email.map(str::to_string),
            organization_timezone: "UTC".to_string(),
            address: None,
            channel_instance_name: format!("instance-{organization_id}"),
            channel_connected: false,
            recipient_phone: Some("32998220082".to_string()),
            recipient_name: "Ana".to_string(),
            scheduled_at: Utc::now(),
            service_name: None,
            employee_name: None,
            price_cents: None,
            notification_type: "REMINDER".to_string(),
            hours_before: 2,
            message_template: None,
        }
    }

    #[test]
    fn groups_by_organization_with_counts() {
        let groups = DisconnectionAlerter::group(&[
            candidate(2, None),
            candidate(1, Some("a@example.com")),
            candidate(2, None),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].organization_id, 1);
        assert_eq!(groups[0].pending, 1);
        assert_eq!(groups[1].organization_id, 2);
        assert_eq!(groups[1].pending, 2);
    }

    #[test]
    fn subject_names_pending_count() {
        assert_eq!(
            alert_subject(3),
            "Channel Disconnected — 3 pending notifications"
        );
    }

    #[tokio::test]
    async fn emails_only_organizations_with_contact() {
        let mailer = Arc::new(RecordingMailer::default());
        let alerter = DisconnectionAlerter::new(Some(mailer.clone()));
        let groups = DisconnectionAlerter::group(&[
            candidate(1, Some("a@example.com")),
            candidate(1, Some("a@example.com")),
            candidate(2, None),
            candidate(3, Some("  ")),
        ]);

        assert_eq!(alerter.alert(&groups).await, 1);
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(
            *sent,
            vec![(
                "a@example.com".to_string(),
                "Channel Disconnected — 2 pending notifications".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn without_mailer_nothing_is_emailed() {
        let alerter = DisconnectionAlerter::new(None);
        let groups = DisconnectionAlerter::group(&[candidate(1, Some("a@example.com"))]);
        assert_eq!(alerter.alert(&groups).await, 0);
    }
}
