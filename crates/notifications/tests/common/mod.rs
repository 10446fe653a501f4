//! Fixtures and fakes shared by the scheduler integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use agenda_core::rate_limit::RateLimitPolicy;
use agenda_core::types::{DbId, Timestamp};
use agenda_notifications::delivery::email::{AlertMailer, EmailError};
use agenda_notifications::delivery::gateway::{DispatchError, DispatchReceipt, MessageGateway};
use agenda_notifications::recorder::DEFAULT_QUEUE_CAPACITY;
use agenda_notifications::{
    NotificationScheduler, OutcomeRecorder, OutcomeRecorderService, SchedulerConfig,
};
use async_trait::async_trait;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

pub struct Tenant {
    pub organization_id: DbId,
    pub client_id: DbId,
    pub instance_name: String,
}

pub async fn seed_tenant(pool: &PgPool, name: &str, connected: bool) -> Tenant {
    let organization_id: DbId = sqlx::query_scalar(
        "INSERT INTO organizations (name, address, contact_email, timezone) \
         VALUES ($1, 'Rua das Flores, 100', 'owner@example.com', 'UTC') RETURNING id",
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .unwrap();

    let client_id: DbId = sqlx::query_scalar(
        "INSERT INTO clients (organization_id, name, phone) VALUES ($1, 'Ana', '32998220082') RETURNING id",
    )
    .bind(organization_id)
    .fetch_one(pool)
    .await
    .unwrap();

    let instance_name = format!("instance-{organization_id}");
    sqlx::query(
        "INSERT INTO messaging_channels (organization_id, instance_name, is_connected) VALUES ($1, $2, $3)",
    )
    .bind(organization_id)
    .bind(&instance_name)
    .bind(connected)
    .execute(pool)
    .await
    .unwrap();

    Tenant {
        organization_id,
        client_id,
        instance_name,
    }
}

pub async fn seed_appointment(
    pool: &PgPool,
    tenant: &Tenant,
    scheduled_at: Timestamp,
    status: &str,
) -> DbId {
    sqlx::query_scalar(
        "INSERT INTO appointments (organization_id, client_id, scheduled_at, status) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(tenant.organization_id)
    .bind(tenant.client_id)
    .bind(scheduled_at)
    .bind(status)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn seed_rule(
    pool: &PgPool,
    organization_id: DbId,
    notification_type: &str,
    hours_before: i32,
    template: Option<&str>,
) {
    sqlx::query(
        "INSERT INTO notification_rules (organization_id, notification_type, hours_before, message_template) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(organization_id)
    .bind(notification_type)
    .bind(hours_before)
    .bind(template)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn appointment_status(pool: &PgPool, id: DbId) -> String {
    sqlx::query_scalar("SELECT status FROM appointments WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentText {
    pub instance: String,
    pub number: String,
    pub text: String,
}

/// Gateway double. Each call pops one scripted HTTP status; an empty script
/// or `None` means success.
#[derive(Default)]
pub struct FakeGateway {
    pub calls: Mutex<Vec<SentText>>,
    script: Mutex<VecDeque<Option<u16>>>,
    cancel_on_send: Option<CancellationToken>,
}

impl FakeGateway {
    pub fn failing_with(statuses: &[u16]) -> Self {
        Self {
            script: Mutex::new(statuses.iter().map(|s| Some(*s)).collect()),
            ..Self::default()
        }
    }

    /// Fires `cancel` during the first dispatch.
    pub fn cancelling(cancel: CancellationToken) -> Self {
        Self {
            cancel_on_send: Some(cancel),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentText> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageGateway for FakeGateway {
    async fn send_text(
        &self,
        instance: &str,
        number: &str,
        text: &str,
    ) -> Result<DispatchReceipt, DispatchError> {
        let call_no = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(SentText {
                instance: instance.to_string(),
                number: number.to_string(),
                text: text.to_string(),
            });
            calls.len()
        };

        if let Some(cancel) = &self.cancel_on_send {
            cancel.cancel();
        }

        match self.script.lock().unwrap().pop_front().flatten() {
            Some(status) => Err(DispatchError::HttpStatus {
                status,
                body: "Internal Server Error".to_string(),
            }),
            None => Ok(DispatchReceipt {
                remote_jid: Some(format!("{number}@s.whatsapp.net")),
                message_id: Some(format!("MSG{call_no}")),
            }),
        }
    }
}

#[derive(Default)]
pub struct FakeMailer {
    pub sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl AlertMailer for FakeMailer {
    async fn send_alert(&self, to: &str, subject: &str, _body: &str) -> Result<(), EmailError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Default configuration with pacing disabled.
pub fn test_config() -> SchedulerConfig {
    SchedulerConfig {
        rate_limit: RateLimitPolicy::disabled(),
        ..SchedulerConfig::default()
    }
}

/// A scheduler backed by a running recorder service.
pub fn scheduler(
    pool: &PgPool,
    config: SchedulerConfig,
    gateway: Arc<FakeGateway>,
) -> NotificationScheduler {
    let (recorder, receiver) = OutcomeRecorder::channel(DEFAULT_QUEUE_CAPACITY);
    tokio::spawn(OutcomeRecorderService::run(pool.clone(), receiver));
    NotificationScheduler::new(pool.clone(), config, gateway, recorder)
}
