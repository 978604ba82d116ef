use axum::{
    extract::{Extension, State},
    http::StatusCode,
};

use crate::{
    AppState,
    error::{ApiResult, AppError, CreatedResult},
    extract::{Json, Path, Query},
    routes::{admin::model::DeletedResponse, user::model::User},
    utils::{Claims, success_to_api_response},
};

use super::model::{
    Activity, ActivityRequest, ActivityType, PlanOverview, PlanSummary, RangeQuery,
    matches_search,
};

fn activity_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Actividad {} no encontrada", id))
}

fn caller_id(claims: &Claims) -> Result<i32, AppError> {
    claims.user_id().ok_or(AppError::Unauthorized)
}

/// 管理员代操作时确认目标用户存在
async fn target_user(state: &AppState, user_id: i32) -> Result<i32, AppError> {
    match User::find_by_id(&state.pool, user_id).await? {
        Some(user) => Ok(user.id),
        None => Err(AppError::NotFound(format!(
            "Usuario {} no encontrado",
            user_id
        ))),
    }
}

async fn load_type(state: &AppState, req: &ActivityRequest) -> Result<ActivityType, AppError> {
    ActivityType::find_by_id(&state.pool, req.tipo_actividad_id)
        .await?
        .ok_or_else(|| {
            AppError::Validation(format!(
                "El tipo de actividad {} no existe",
                req.tipo_actividad_id
            ))
        })
}

async fn list_for(state: &AppState, owner: i32, query: &RangeQuery) -> ApiResult<Vec<Activity>> {
    let range = query.date_range()?;
    let mut activities = Activity::list(&state.pool, owner, range).await?;
    if let Some(q) = query.search() {
        activities.retain(|a| matches_search(a, q));
    }
    Ok(success_to_api_response(activities))
}

async fn summary_for(
    state: &AppState,
    owner: i32,
    query: &RangeQuery,
) -> ApiResult<Vec<PlanSummary>> {
    let range = query.date_range()?;
    Ok(success_to_api_response(
        Activity::summary(&state.pool, owner, range).await?,
    ))
}

async fn overview_for(state: &AppState, owner: i32, query: &RangeQuery) -> ApiResult<PlanOverview> {
    let range = query.date_range()?;
    let activities = Activity::list(&state.pool, owner, range).await?;
    Ok(success_to_api_response(PlanOverview::build(
        range,
        activities,
        query.search(),
    )))
}

async fn create_for(state: &AppState, owner: i32, req: ActivityRequest) -> CreatedResult<Activity> {
    let tipo = load_type(state, &req).await?;
    req.check(&tipo)?;

    let activity = Activity::create(&state.pool, owner, &req).await?;
    tracing::info!("Activity {} created for user {}", activity.id, owner);
    Ok((StatusCode::CREATED, success_to_api_response(activity)))
}

async fn update_for(
    state: &AppState,
    owner: i32,
    id: i32,
    req: ActivityRequest,
) -> ApiResult<Activity> {
    let tipo = load_type(state, &req).await?;
    req.check(&tipo)?;

    let activity = Activity::update(&state.pool, owner, id, &req)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::NotFound(_) => activity_not_found(id),
            other => other,
        })?;
    Ok(success_to_api_response(activity))
}

async fn delete_for(state: &AppState, owner: i32, id: i32) -> ApiResult<DeletedResponse> {
    if !Activity::delete(&state.pool, owner, id).await? {
        return Err(activity_not_found(id));
    }
    tracing::info!("Activity {} deleted for user {}", id, owner);
    Ok(success_to_api_response(DeletedResponse { id }))
}

#[axum::debug_handler]
pub async fn list_activity_types(State(state): State<AppState>) -> ApiResult<Vec<ActivityType>> {
    Ok(success_to_api_response(ActivityType::list(&state.pool).await?))
}

// 当前用户

#[axum::debug_handler]
pub async fn list_activities(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Vec<Activity>> {
    list_for(&state, caller_id(&claims)?, &query).await
}

#[axum::debug_handler]
pub async fn get_summary(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Vec<PlanSummary>> {
    summary_for(&state, caller_id(&claims)?, &query).await
}

#[axum::debug_handler]
pub async fn get_overview(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<PlanOverview> {
    overview_for(&state, caller_id(&claims)?, &query).await
}

#[axum::debug_handler]
pub async fn create_activity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ActivityRequest>,
) -> CreatedResult<Activity> {
    req.check_basic()?;
    create_for(&state, caller_id(&claims)?, req).await
}

#[axum::debug_handler]
pub async fn update_activity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    Json(req): Json<ActivityRequest>,
) -> ApiResult<Activity> {
    req.check_basic()?;
    update_for(&state, caller_id(&claims)?, id, req).await
}

#[axum::debug_handler]
pub async fn delete_activity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> ApiResult<DeletedResponse> {
    delete_for(&state, caller_id(&claims)?, id).await
}

// 管理员代指定用户操作

#[axum::debug_handler]
pub async fn admin_list_activities(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Vec<Activity>> {
    query.date_range()?;
    let owner = target_user(&state, user_id).await?;
    list_for(&state, owner, &query).await
}

#[axum::debug_handler]
pub async fn admin_get_summary(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Vec<PlanSummary>> {
    query.date_range()?;
    let owner = target_user(&state, user_id).await?;
    summary_for(&state, owner, &query).await
}

#[axum::debug_handler]
pub async fn admin_get_overview(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<PlanOverview> {
    query.date_range()?;
    let owner = target_user(&state, user_id).await?;
    overview_for(&state, owner, &query).await
}

#[axum::debug_handler]
pub async fn admin_create_activity(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    Json(req): Json<ActivityRequest>,
) -> CreatedResult<Activity> {
    req.check_basic()?;
    let owner = target_user(&state, user_id).await?;
    create_for(&state, owner, req).await
}

#[axum::debug_handler]
pub async fn admin_update_activity(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(i32, i32)>,
    Json(req): Json<ActivityRequest>,
) -> ApiResult<Activity> {
    req.check_basic()?;
    let owner = target_user(&state, user_id).await?;
    update_for(&state, owner, id, req).await
}

#[axum::debug_handler]
pub async fn admin_delete_activity(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(i32, i32)>,
) -> ApiResult<DeletedResponse> {
    let owner = target_user(&state, user_id).await?;
    delete_for(&state, owner, id).await
}
