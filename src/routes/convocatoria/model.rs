use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::Validate;

use crate::utils::not_blank;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Convocatoria {
    pub id: i32,
    pub titulo: String,
    pub descripcion: String,
    pub publico: bool,
    pub fecha_creacion: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConvocatoriaRequest {
    #[validate(custom(function = "not_blank", message = "El título es obligatorio"))]
    pub titulo: String,
    #[validate(custom(function = "not_blank", message = "La descripción es obligatoria"))]
    pub descripcion: String,
    #[serde(default)]
    pub publico: bool,
}

impl Convocatoria {
    pub async fn list(pool: &PgPool, include_private: bool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Convocatoria>(
            r#"
            SELECT id, titulo, descripcion, publico, fecha_creacion
            FROM convocatorias
            WHERE ($1 OR publico)
            ORDER BY fecha_creacion DESC, id DESC
            "#,
        )
        .bind(include_private)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: i32,
        include_private: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Convocatoria>(
            r#"
            SELECT id, titulo, descripcion, publico, fecha_creacion
            FROM convocatorias
            WHERE id = $1 AND ($2 OR publico)
            "#,
        )
        .bind(id)
        .bind(include_private)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(pool: &PgPool, req: &ConvocatoriaRequest) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Convocatoria>(
            r#"
            INSERT INTO convocatorias (titulo, descripcion, publico)
            VALUES ($1, $2, $3)
            RETURNING id, titulo, descripcion, publico, fecha_creacion
            "#,
        )
        .bind(req.titulo.trim())
        .bind(&req.descripcion)
        .bind(req.publico)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: i32,
        req: &ConvocatoriaRequest,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Convocatoria>(
            r#"
            UPDATE convocatorias
            SET titulo = $1, descripcion = $2, publico = $3
            WHERE id = $4
            RETURNING id, titulo, descripcion, publico, fecha_creacion
            "#,
        )
        .bind(req.titulo.trim())
        .bind(&req.descripcion)
        .bind(req.publico)
        .bind(id)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM convocatorias WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
