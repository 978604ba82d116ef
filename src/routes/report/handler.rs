use axum::{
    extract::{Extension, State},
    http::header,
    response::{IntoResponse, Response},
};
use futures_util::future::try_join3;

use crate::{
    AppState,
    error::{ApiResult, AppError},
    extract::{Path, Query},
    routes::user::model::Categoria,
    utils::{Claims, success_to_api_response},
};

use super::model::{
    OverloadEntry, PaymentReport, ReportFilters, ReportFormat, ReportKind, ReportQuery,
    UserHours, UserOption, activity_years, compute_overload, compute_payments, overload_csv,
    payment_csv,
};

/// 非管理员只能查询自己的数据
fn scoped_user(claims: &Claims, requested: Option<i32>) -> Result<Option<i32>, AppError> {
    if claims.is_admin() {
        Ok(requested)
    } else {
        claims.user_id().map(Some).ok_or(AppError::Unauthorized)
    }
}

async fn overload_entries(
    state: &AppState,
    claims: &Claims,
    query: &ReportQuery,
) -> Result<Vec<OverloadEntry>, AppError> {
    let range = query.date_range()?;
    let usuario_id = scoped_user(claims, query.usuario_id)?;
    let rows = UserHours::load(&state.pool, range, query.categoria_id, usuario_id).await?;
    Ok(compute_overload(&rows, state.config.overload_baseline_hours))
}

async fn payment_report(
    state: &AppState,
    claims: &Claims,
    query: &ReportQuery,
) -> Result<PaymentReport, AppError> {
    let entries = overload_entries(state, claims, query).await?;
    Ok(compute_payments(&entries, state.config.overload_hourly_rate))
}

#[axum::debug_handler]
pub async fn get_filters(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<ReportFilters> {
    let only = scoped_user(&claims, None)?;
    let (categorias, usuarios, anios) = try_join3(
        Categoria::list(&state.pool),
        UserOption::list(&state.pool, only),
        activity_years(&state.pool),
    )
    .await?;

    Ok(success_to_api_response(ReportFilters {
        categorias,
        usuarios,
        anios,
    }))
}

#[axum::debug_handler]
pub async fn teaching_overload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Vec<OverloadEntry>> {
    let entries = overload_entries(&state, &claims, &query).await?;
    Ok(success_to_api_response(entries))
}

#[axum::debug_handler]
pub async fn overload_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<PaymentReport> {
    let report = payment_report(&state, &claims, &query).await?;
    Ok(success_to_api_response(report))
}

/// 以附件形式下载报表
#[axum::debug_handler]
pub async fn download(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((kind, format)): Path<(String, String)>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, AppError> {
    let kind: ReportKind = kind.parse()?;
    let format: ReportFormat = format.parse()?;
    let range = query.date_range()?;

    let body = match (kind, format) {
        (ReportKind::TeachingOverload, ReportFormat::Csv) => {
            overload_csv(&overload_entries(&state, &claims, &query).await?)
        }
        (ReportKind::TeachingOverload, ReportFormat::Json) => {
            serde_json::to_string_pretty(&overload_entries(&state, &claims, &query).await?)
                .map_err(|e| AppError::Internal(e.to_string()))?
        }
        (ReportKind::OverloadPayment, ReportFormat::Csv) => {
            payment_csv(&payment_report(&state, &claims, &query).await?)
        }
        (ReportKind::OverloadPayment, ReportFormat::Json) => {
            serde_json::to_string_pretty(&payment_report(&state, &claims, &query).await?)
                .map_err(|e| AppError::Internal(e.to_string()))?
        }
    };

    let filename = format!(
        "{}_{}_{}.{}",
        kind.slug(),
        range.inicio,
        range.fin,
        format.extension()
    );
    tracing::info!("Report {} generated for user {}", filename, claims.sub);

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(rol: &str) -> Claims {
        Claims {
            sub: "9".into(),
            rol: rol.into(),
            exp: 0,
            iat: 0,
        }
    }

    #[test]
    fn non_admin_is_scoped_to_self() {
        assert_eq!(scoped_user(&claims("usuario"), Some(3)).unwrap(), Some(9));
        assert_eq!(scoped_user(&claims("usuario"), None).unwrap(), Some(9));
    }

    #[test]
    fn admin_keeps_requested_user() {
        assert_eq!(scoped_user(&claims("admin"), Some(3)).unwrap(), Some(3));
        assert_eq!(scoped_user(&claims("admin"), None).unwrap(), None);
    }
}
