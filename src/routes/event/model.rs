use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::Validate;

use crate::utils::not_blank;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: i32,
    pub titulo: String,
    pub descripcion: String,
    pub fecha_evento: DateTime<Utc>,
    pub ubicacion: String,
    pub publico: bool,
    pub fecha_creacion: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EventRequest {
    #[validate(custom(function = "not_blank", message = "El título es obligatorio"))]
    pub titulo: String,
    #[validate(custom(function = "not_blank", message = "La descripción es obligatoria"))]
    pub descripcion: String,
    pub fecha_evento: DateTime<Utc>,
    #[validate(custom(function = "not_blank", message = "La ubicación es obligatoria"))]
    pub ubicacion: String,
    #[serde(default)]
    pub publico: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventFilter {
    /// 仅返回尚未开始的活动
    #[serde(default)]
    pub proximos: bool,
}

const EVENT_COLUMNS: &str = "id, titulo, descripcion, fecha_evento, ubicacion, publico, fecha_creacion";

impl Event {
    pub async fn list(
        pool: &PgPool,
        include_private: bool,
        filter: &EventFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Event>(&format!(
            r#"
            SELECT {} FROM eventos
            WHERE ($1 OR publico) AND (NOT $2 OR fecha_evento >= NOW())
            ORDER BY fecha_evento ASC, id ASC
            "#,
            EVENT_COLUMNS
        ))
        .bind(include_private)
        .bind(filter.proximos)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: i32,
        include_private: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM eventos WHERE id = $1 AND ($2 OR publico)",
            EVENT_COLUMNS
        ))
        .bind(id)
        .bind(include_private)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(pool: &PgPool, req: &EventRequest) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Event>(&format!(
            r#"
            INSERT INTO eventos (titulo, descripcion, fecha_evento, ubicacion, publico)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(req.titulo.trim())
        .bind(&req.descripcion)
        .bind(req.fecha_evento)
        .bind(req.ubicacion.trim())
        .bind(req.publico)
        .fetch_one(pool)
        .await
    }

    pub async fn update(pool: &PgPool, id: i32, req: &EventRequest) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Event>(&format!(
            r#"
            UPDATE eventos
            SET titulo = $1, descripcion = $2, fecha_evento = $3, ubicacion = $4, publico = $5
            WHERE id = $6
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(req.titulo.trim())
        .bind(&req.descripcion)
        .bind(req.fecha_evento)
        .bind(req.ubicacion.trim())
        .bind(req.publico)
        .bind(id)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM eventos WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_event_date() {
        let req: EventRequest = serde_json::from_str(
            r#"{"titulo":"Seminario","descripcion":"Charla","fecha_evento":"2024-05-10T16:00:00Z","ubicacion":"Aula 3"}"#,
        )
        .unwrap();
        assert!(!req.publico);
        assert!(req.validate().is_ok());
        assert_eq!(req.fecha_evento.to_rfc3339(), "2024-05-10T16:00:00+00:00");
    }

    #[test]
    fn blank_location_is_rejected() {
        let req = EventRequest {
            titulo: "Seminario".into(),
            descripcion: "Charla".into(),
            fecha_evento: Utc::now(),
            ubicacion: "".into(),
            publico: true,
        };
        assert!(req.validate().unwrap_err().field_errors().contains_key("ubicacion"));
    }
}
