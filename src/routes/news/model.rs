use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::Validate;

use crate::{error::AppError, utils::not_blank};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct News {
    pub id: i32,
    pub titulo: String,
    pub contenido: String,
    pub imagen_base64: Option<String>,
    pub ispublica: bool,
    pub fecha_creacion: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewsRequest {
    #[validate(custom(function = "not_blank", message = "El título es obligatorio"))]
    pub titulo: String,
    #[validate(custom(function = "not_blank", message = "El contenido es obligatorio"))]
    pub contenido: String,
    pub imagen_base64: Option<String>,
    #[serde(default)]
    pub ispublica: bool,
}

/// 校验内联图片：允许 data URL 前缀，解码后不得超过上限
pub fn validate_image(data: &str, max_bytes: usize) -> Result<(), AppError> {
    let payload = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:image/") => rest,
        Some(_) => {
            return Err(AppError::Validation(
                "La imagen debe ser de tipo image/*".into(),
            ));
        }
        None => data,
    };

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| AppError::Validation("La imagen no es base64 válido".into()))?;

    if bytes.len() > max_bytes {
        return Err(AppError::Validation(format!(
            "La imagen supera el tamaño máximo de {} bytes",
            max_bytes
        )));
    }
    Ok(())
}

impl NewsRequest {
    /// 空字符串视为无图片
    fn image(&self) -> Option<&str> {
        self.imagen_base64
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn check(&self, max_image_bytes: usize) -> Result<(), AppError> {
        self.validate()?;
        if let Some(image) = self.image() {
            validate_image(image, max_image_bytes)?;
        }
        Ok(())
    }
}

const NEWS_COLUMNS: &str = "id, titulo, contenido, imagen_base64, ispublica, fecha_creacion";

impl News {
    pub async fn list(pool: &PgPool, include_private: bool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, News>(&format!(
            "SELECT {} FROM noticias WHERE ($1 OR ispublica) ORDER BY fecha_creacion DESC, id DESC",
            NEWS_COLUMNS
        ))
        .bind(include_private)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: i32,
        include_private: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, News>(&format!(
            "SELECT {} FROM noticias WHERE id = $1 AND ($2 OR ispublica)",
            NEWS_COLUMNS
        ))
        .bind(id)
        .bind(include_private)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(pool: &PgPool, req: &NewsRequest) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, News>(&format!(
            r#"
            INSERT INTO noticias (titulo, contenido, imagen_base64, ispublica)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            NEWS_COLUMNS
        ))
        .bind(req.titulo.trim())
        .bind(&req.contenido)
        .bind(req.image())
        .bind(req.ispublica)
        .fetch_one(pool)
        .await
    }

    pub async fn update(pool: &PgPool, id: i32, req: &NewsRequest) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, News>(&format!(
            r#"
            UPDATE noticias
            SET titulo = $1, contenido = $2, imagen_base64 = $3, ispublica = $4
            WHERE id = $5
            RETURNING {}
            "#,
            NEWS_COLUMNS
        ))
        .bind(req.titulo.trim())
        .bind(&req.contenido)
        .bind(req.image())
        .bind(req.ispublica)
        .bind(id)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM noticias WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
