use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityType {
    pub id: i32,
    pub nombre: String,
    pub requiere_grupo: bool,
    pub requiere_estudiantes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub id: i32,
    pub usuario_id: i32,
    pub tipo_actividad_id: i32,
    pub nombre_tipo_actividad: String,
    pub fecha: NaiveDate,
    pub horas_dedicadas: f64,
    pub grupo_clase: Option<String>,
    pub cantidad_estudiantes: Option<i32>,
    pub descripcion_adicional: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityRequest {
    pub tipo_actividad_id: i32,
    pub fecha: NaiveDate,
    pub horas_dedicadas: f64,
    pub grupo_clase: Option<String>,
    pub cantidad_estudiantes: Option<i32>,
    pub descripcion_adicional: Option<String>,
}

/// 按类型汇总的学时
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PlanSummary {
    pub tipo_actividad_id: i32,
    pub nombre_tipo_actividad: String,
    pub total_horas: f64,
}

/// 同一次读取得到的活动列表与汇总
#[derive(Debug, Serialize)]
pub struct PlanOverview {
    pub fecha_inicio: NaiveDate,
    pub fecha_fin: NaiveDate,
    pub actividades: Vec<Activity>,
    pub resumen: Vec<PlanSummary>,
    pub total_horas: f64,
}

/// 日期区间查询参数，日期格式 YYYY-MM-DD
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub fecha_inicio: Option<String>,
    pub fecha_fin: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub inicio: NaiveDate,
    pub fin: NaiveDate,
}

fn parse_date(field: &str, value: Option<&str>) -> Result<NaiveDate, AppError> {
    let raw = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("El parámetro {} es obligatorio", field)))?;

    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        AppError::Validation(format!(
            "El parámetro {} debe tener formato AAAA-MM-DD",
            field
        ))
    })
}

impl DateRange {
    /// 解析查询参数中的起止日期
    pub fn parse(inicio: Option<&str>, fin: Option<&str>) -> Result<Self, AppError> {
        let inicio = parse_date("fecha_inicio", inicio)?;
        let fin = parse_date("fecha_fin", fin)?;
        Self::new(inicio, fin)
    }

    pub fn new(inicio: NaiveDate, fin: NaiveDate) -> Result<Self, AppError> {
        if inicio > fin {
            return Err(AppError::Validation(
                "La fecha de inicio no puede ser posterior a la fecha de fin".into(),
            ));
        }
        Ok(Self { inicio, fin })
    }
}

impl RangeQuery {
    pub fn date_range(&self) -> Result<DateRange, AppError> {
        DateRange::parse(self.fecha_inicio.as_deref(), self.fecha_fin.as_deref())
    }

    pub fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

fn blank(value: Option<&str>) -> bool {
    value.map(str::trim).is_none_or(str::is_empty)
}

impl ActivityRequest {
    /// 与类型无关的校验，可在访问数据库前执行
    pub fn check_basic(&self) -> Result<(), AppError> {
        if !self.horas_dedicadas.is_finite() || self.horas_dedicadas <= 0.0 {
            return Err(AppError::Validation(
                "Las horas dedicadas deben ser mayores que 0".into(),
            ));
        }
        if matches!(self.cantidad_estudiantes, Some(n) if n <= 0) {
            return Err(AppError::Validation(
                "La cantidad de estudiantes debe ser mayor que 0".into(),
            ));
        }
        Ok(())
    }

    /// 根据活动类型的要求校验
    pub fn check(&self, tipo: &ActivityType) -> Result<(), AppError> {
        self.check_basic()?;

        if tipo.id != self.tipo_actividad_id {
            return Err(AppError::Internal(format!(
                "Activity type mismatch: {} != {}",
                tipo.id, self.tipo_actividad_id
            )));
        }
        if tipo.requiere_grupo && blank(self.grupo_clase.as_deref()) {
            return Err(AppError::Validation(format!(
                "El tipo de actividad '{}' requiere indicar el grupo",
                tipo.nombre
            )));
        }
        if tipo.requiere_estudiantes && self.cantidad_estudiantes.is_none() {
            return Err(AppError::Validation(format!(
                "El tipo de actividad '{}' requiere indicar la cantidad de estudiantes",
                tipo.nombre
            )));
        }
        Ok(())
    }

    fn grupo(&self) -> Option<&str> {
        self.grupo_clase
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
    }

    fn descripcion(&self) -> Option<&str> {
        self.descripcion_adicional
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

/// 文本过滤：类型名、描述、班级，不区分大小写
pub fn matches_search(activity: &Activity, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    [
        Some(activity.nombre_tipo_actividad.as_str()),
        activity.descripcion_adicional.as_deref(),
        activity.grupo_clase.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(&needle))
}

/// 由活动列表计算汇总，按类型名排序
pub fn summarize(activities: &[Activity]) -> Vec<PlanSummary> {
    let mut by_type: BTreeMap<i32, PlanSummary> = BTreeMap::new();
    for activity in activities {
        by_type
            .entry(activity.tipo_actividad_id)
            .or_insert_with(|| PlanSummary {
                tipo_actividad_id: activity.tipo_actividad_id,
                nombre_tipo_actividad: activity.nombre_tipo_actividad.clone(),
                total_horas: 0.0,
            })
            .total_horas += activity.horas_dedicadas;
    }

    let mut summary: Vec<PlanSummary> = by_type.into_values().collect();
    summary.sort_by(|a, b| {
        a.nombre_tipo_actividad
            .cmp(&b.nombre_tipo_actividad)
            .then(a.tipo_actividad_id.cmp(&b.tipo_actividad_id))
    });
    summary
}

impl PlanOverview {
    /// 汇总始终覆盖整个区间，过滤只作用于列表
    pub fn build(range: DateRange, activities: Vec<Activity>, search: Option<&str>) -> Self {
        let resumen = summarize(&activities);
        let total_horas = resumen.iter().map(|s| s.total_horas).sum();
        let actividades = match search {
            Some(q) => activities
                .into_iter()
                .filter(|a| matches_search(a, q))
                .collect(),
            None => activities,
        };

        Self {
            fecha_inicio: range.inicio,
            fecha_fin: range.fin,
            actividades,
            resumen,
            total_horas,
        }
    }
}

const ACTIVITY_SELECT: &str = r#"
    SELECT
        a.id, a.usuario_id, a.tipo_actividad_id, t.nombre AS nombre_tipo_actividad,
        a.fecha, a.horas_dedicadas, a.grupo_clase, a.cantidad_estudiantes,
        a.descripcion_adicional
    FROM actividades a
    JOIN tipos_actividad t ON t.id = a.tipo_actividad_id
"#;

impl ActivityType {
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ActivityType>(
            "SELECT id, nombre, requiere_grupo, requiere_estudiantes FROM tipos_actividad ORDER BY nombre",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ActivityType>(
            "SELECT id, nombre, requiere_grupo, requiere_estudiantes FROM tipos_actividad WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}

impl Activity {
    pub async fn list(
        pool: &PgPool,
        usuario_id: i32,
        range: DateRange,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Activity>(&format!(
            "{} WHERE a.usuario_id = $1 AND a.fecha BETWEEN $2 AND $3 ORDER BY a.fecha, a.id",
            ACTIVITY_SELECT
        ))
        .bind(usuario_id)
        .bind(range.inicio)
        .bind(range.fin)
        .fetch_all(pool)
        .await
    }

    pub async fn find(
        pool: &PgPool,
        usuario_id: i32,
        id: i32,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Activity>(&format!(
            "{} WHERE a.id = $1 AND a.usuario_id = $2",
            ACTIVITY_SELECT
        ))
        .bind(id)
        .bind(usuario_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        usuario_id: i32,
        req: &ActivityRequest,
    ) -> Result<Self, sqlx::Error> {
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO actividades (
                usuario_id, tipo_actividad_id, fecha, horas_dedicadas,
                grupo_clase, cantidad_estudiantes, descripcion_adicional
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(usuario_id)
        .bind(req.tipo_actividad_id)
        .bind(req.fecha)
        .bind(req.horas_dedicadas)
        .bind(req.grupo())
        .bind(req.cantidad_estudiantes)
        .bind(req.descripcion())
        .fetch_one(pool)
        .await?;

        Self::find(pool, usuario_id, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn update(
        pool: &PgPool,
        usuario_id: i32,
        id: i32,
        req: &ActivityRequest,
    ) -> Result<Self, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE actividades
            SET tipo_actividad_id = $1, fecha = $2, horas_dedicadas = $3,
                grupo_clase = $4, cantidad_estudiantes = $5, descripcion_adicional = $6
            WHERE id = $7 AND usuario_id = $8
            "#,
        )
        .bind(req.tipo_actividad_id)
        .bind(req.fecha)
        .bind(req.horas_dedicadas)
        .bind(req.grupo())
        .bind(req.cantidad_estudiantes)
        .bind(req.descripcion())
        .bind(id)
        .bind(usuario_id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Self::find(pool, usuario_id, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn delete(pool: &PgPool, usuario_id: i32, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM actividades WHERE id = $1 AND usuario_id = $2")
            .bind(id)
            .bind(usuario_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// 数据库侧汇总，覆盖整个区间
    pub async fn summary(
        pool: &PgPool,
        usuario_id: i32,
        range: DateRange,
    ) -> Result<Vec<PlanSummary>, sqlx::Error> {
        sqlx::query_as::<_, PlanSummary>(
            r#"
            SELECT
                t.id AS tipo_actividad_id,
                t.nombre AS nombre_tipo_actividad,
                COALESCE(SUM(a.horas_dedicadas), 0)::float8 AS total_horas
            FROM actividades a
            JOIN tipos_actividad t ON t.id = a.tipo_actividad_id
            WHERE a.usuario_id = $1 AND a.fecha BETWEEN $2 AND $3
            GROUP BY t.id, t.nombre
            ORDER BY t.nombre, t.id
            "#,
        )
        .bind(usuario_id)
        .bind(range.inicio)
        .bind(range.fin)
        .fetch_all(pool)
        .await
    }
}
