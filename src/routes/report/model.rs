use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::{
    error::AppError,
    routes::{planning::model::DateRange, user::model::Categoria},
    utils::csv_quote,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    pub fecha_inicio: Option<String>,
    pub fecha_fin: Option<String>,
    pub categoria_id: Option<i32>,
    pub usuario_id: Option<i32>,
}

impl ReportQuery {
    pub fn date_range(&self) -> Result<DateRange, AppError> {
        DateRange::parse(self.fecha_inicio.as_deref(), self.fecha_fin.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    TeachingOverload,
    OverloadPayment,
}

impl ReportKind {
    pub fn slug(self) -> &'static str {
        match self {
            ReportKind::TeachingOverload => "teaching-overload",
            ReportKind::OverloadPayment => "overload-payment",
        }
    }
}

impl FromStr for ReportKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "teaching-overload" => Ok(ReportKind::TeachingOverload),
            "overload-payment" => Ok(ReportKind::OverloadPayment),
            other => Err(AppError::Validation(format!(
                "Tipo de informe desconocido: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Csv,
    Json,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Json => "json",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ReportFormat::Csv => "text/csv; charset=utf-8",
            ReportFormat::Json => "application/json",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "json" => Ok(ReportFormat::Json),
            _ => Err(AppError::Validation(format!(
                "Formato de informe no soportado: {}",
                s
            ))),
        }
    }
}

/// 每个用户在区间内的学时合计
#[derive(Debug, Clone, FromRow)]
pub struct UserHours {
    pub usuario_id: i32,
    pub nombre: String,
    pub apellidos: String,
    pub categoria_nombre: Option<String>,
    pub horas_docencia_base: Option<f64>,
    pub total_horas: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverloadEntry {
    pub usuario_id: i32,
    pub nombre_completo: String,
    pub categoria: Option<String>,
    pub total_horas: f64,
    pub horas_base: f64,
    pub horas_sobrecarga: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentEntry {
    pub usuario_id: i32,
    pub nombre_completo: String,
    pub categoria: Option<String>,
    pub horas_sobrecarga: f64,
    pub tarifa_hora: f64,
    pub importe: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentReport {
    pub entradas: Vec<PaymentEntry>,
    pub total_importe: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserOption {
    pub id: i32,
    pub nombre_completo: String,
}

#[derive(Debug, Serialize)]
pub struct ReportFilters {
    pub categorias: Vec<Categoria>,
    pub usuarios: Vec<UserOption>,
    pub anios: Vec<i32>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 超额学时 = max(0, 合计 - 基准)；基准优先取分类设置
pub fn compute_overload(rows: &[UserHours], default_baseline: f64) -> Vec<OverloadEntry> {
    rows.iter()
        .map(|row| {
            let horas_base = row.horas_docencia_base.unwrap_or(default_baseline);
            OverloadEntry {
                usuario_id: row.usuario_id,
                nombre_completo: format!("{} {}", row.nombre, row.apellidos),
                categoria: row.categoria_nombre.clone(),
                total_horas: round2(row.total_horas),
                horas_base,
                horas_sobrecarga: round2((row.total_horas - horas_base).max(0.0)),
            }
        })
        .collect()
}

/// 只保留有超额学时的用户
pub fn compute_payments(entries: &[OverloadEntry], hourly_rate: f64) -> PaymentReport {
    let entradas: Vec<PaymentEntry> = entries
        .iter()
        .filter(|e| e.horas_sobrecarga > 0.0)
        .map(|e| PaymentEntry {
            usuario_id: e.usuario_id,
            nombre_completo: e.nombre_completo.clone(),
            categoria: e.categoria.clone(),
            horas_sobrecarga: e.horas_sobrecarga,
            tarifa_hora: hourly_rate,
            importe: round2(e.horas_sobrecarga * hourly_rate),
        })
        .collect();
    let total_importe = round2(entradas.iter().map(|e| e.importe).sum());

    PaymentReport {
        entradas,
        total_importe,
    }
}

pub fn overload_csv(entries: &[OverloadEntry]) -> String {
    let mut csv =
        String::from("usuario_id,nombre_completo,categoria,total_horas,horas_base,horas_sobrecarga\n");
    for e in entries {
        csv.push_str(&format!(
            "{},{},{},{:.2},{:.2},{:.2}\n",
            e.usuario_id,
            csv_quote(&e.nombre_completo),
            csv_quote(e.categoria.as_deref().unwrap_or("")),
            e.total_horas,
            e.horas_base,
            e.horas_sobrecarga
        ));
    }
    csv
}

pub fn payment_csv(report: &PaymentReport) -> String {
    let mut csv = String::from(
        "usuario_id,nombre_completo,categoria,horas_sobrecarga,tarifa_hora,importe\n",
    );
    for e in &report.entradas {
        csv.push_str(&format!(
            "{},{},{},{:.2},{:.2},{:.2}\n",
            e.usuario_id,
            csv_quote(&e.nombre_completo),
            csv_quote(e.categoria.as_deref().unwrap_or("")),
            e.horas_sobrecarga,
            e.tarifa_hora,
            e.importe
        ));
    }
    csv.push_str(&format!(",TOTAL,,,,{:.2}\n", report.total_importe));
    csv
}

impl UserHours {
    pub async fn load(
        pool: &PgPool,
        range: DateRange,
        categoria_id: Option<i32>,
        usuario_id: Option<i32>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserHours>(
            r#"
            SELECT
                u.id AS usuario_id, u.nombre, u.apellidos,
                c.nombre AS categoria_nombre, c.horas_docencia_base,
                COALESCE(SUM(a.horas_dedicadas), 0)::float8 AS total_horas
            FROM usuarios u
            LEFT JOIN categorias c ON c.id = u.categoria_id
            LEFT JOIN actividades a
                ON a.usuario_id = u.id AND a.fecha BETWEEN $1 AND $2
            WHERE u.aprobado
              AND ($3::int IS NULL OR u.categoria_id = $3)
              AND ($4::int IS NULL OR u.id = $4)
            GROUP BY u.id, u.nombre, u.apellidos, c.nombre, c.horas_docencia_base
            ORDER BY u.apellidos, u.nombre
            "#,
        )
        .bind(range.inicio)
        .bind(range.fin)
        .bind(categoria_id)
        .bind(usuario_id)
        .fetch_all(pool)
        .await
    }
}

impl UserOption {
    /// 非管理员只能看到自己
    pub async fn list(pool: &PgPool, only: Option<i32>) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserOption>(
            r#"
            SELECT id, nombre || ' ' || apellidos AS nombre_completo
            FROM usuarios
            WHERE aprobado AND ($1::int IS NULL OR id = $1)
            ORDER BY apellidos, nombre
            "#,
        )
        .bind(only)
        .fetch_all(pool)
        .await
    }
}

pub async fn activity_years(pool: &PgPool) -> Result<Vec<i32>, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        "SELECT DISTINCT EXTRACT(YEAR FROM fecha)::int AS anio FROM actividades ORDER BY anio DESC",
    )
    .fetch_all(pool)
    .await
}
