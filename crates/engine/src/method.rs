//! Notification method service: the device tokens, numbers and addresses
//! riders register for alerts.

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use delay_common::error::AppError;
use delay_common::types::{MethodKind, NotificationMethod};

use crate::store::NotificationMethodStore;

/// Parameters for registering a notification method.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewNotificationMethod {
    pub user_id: Uuid,
    pub kind: MethodKind,
    pub name: String,
    pub value: String,
}

pub struct NotificationMethodService;

impl NotificationMethodService {
    pub async fn create(
        pool: &PgPool,
        params: &NewNotificationMethod,
    ) -> Result<NotificationMethod, AppError> {
        if params.value.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "A {} notification method needs a value",
                params.kind
            )));
        }

        let method: NotificationMethod = sqlx::query_as(
            r#"
            INSERT INTO notification_methods (id, user_id, kind, name, value, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, kind, name, value, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(params.user_id)
        .bind(params.kind)
        .bind(&params.name)
        .bind(&params.value)
        .bind(Utc::now().trunc_subsecs(0))
        .fetch_one(pool)
        .await?;

        tracing::info!(
            method_id = %method.id,
            user_id = %method.user_id,
            kind = %method.kind,
            "Notification method created"
        );

        Ok(method)
    }

    pub async fn get(pool: &PgPool, method_id: Uuid) -> Result<NotificationMethod, AppError> {
        sqlx::query_as(
            r#"
            SELECT id, user_id, kind, name, value, created_at
            FROM notification_methods
            WHERE id = $1
            "#,
        )
        .bind(method_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification method {} not found", method_id)))
    }

    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<NotificationMethod>, AppError> {
        let methods = sqlx::query_as(
            r#"
            SELECT id, user_id, kind, name, value, created_at
            FROM notification_methods
            WHERE user_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(methods)
    }

    /// Delete a notification method. Returns true if it was deleted.
    pub async fn delete(pool: &PgPool, method_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM notification_methods WHERE id = $1")
            .bind(method_id)
            .execute(pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(method_id = %method_id, "Notification method deleted");
        }

        Ok(deleted)
    }
}

/// [`NotificationMethodStore`] over PostgreSQL.
pub struct PgNotificationMethodStore {
    pool: PgPool,
}

impl PgNotificationMethodStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationMethodStore for PgNotificationMethodStore {
    async fn get(&self, method_id: Uuid) -> Result<NotificationMethod, AppError> {
        NotificationMethodService::get(&self.pool, method_id).await
    }
}
