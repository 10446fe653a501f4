//! Row fixtures for repository tests. Booking entities are owned by another
//! service, so they are inserted with plain SQL.

#![allow(dead_code)]

use agenda_core::types::{DbId, Timestamp};
use sqlx::PgPool;

pub struct Tenant {
    pub organization_id: DbId,
    pub client_id: DbId,
    pub service_id: DbId,
    pub employee_id: DbId,
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

    let service_id: DbId = sqlx::query_scalar(
        "INSERT INTO services (organization_id, name, price_cents) VALUES ($1, 'Corte', 15000) RETURNING id",
    )
    .bind(organization_id)
    .fetch_one(pool)
    .await
    .unwrap();

    let employee_id: DbId = sqlx::query_scalar(
        "INSERT INTO employees (organization_id, name) VALUES ($1, 'Bruno') RETURNING id",
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
        service_id,
        employee_id,
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
        "INSERT INTO appointments (organization_id, client_id, employee_id, service_id, scheduled_at, status) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind(tenant.organization_id)
    .bind(tenant.client_id)
    .bind(tenant.employee_id)
    .bind(tenant.service_id)
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
    is_active: bool,
) -> DbId {
    sqlx::query_scalar(
        "INSERT INTO notification_rules (organization_id, notification_type, hours_before, is_active) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(organization_id)
    .bind(notification_type)
    .bind(hours_before)
    .bind(is_active)
    .fetch_one(pool)
    .await
    .unwrap()
}
