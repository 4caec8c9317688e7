use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::AuthUser,
    error::ApiError,
    extract::{JsonBody, QueryParams},
    state::AppState,
    tasks::{
        dto::{
            parse_task_id, BulkUpdateRequest, BulkUpdateResponse, CreateTaskRequest, ListQuery,
            SearchQuery, SearchResponse, SingleTaskResponse, StatsBody, StatsQuery,
            StatsResponse, TaskListResponse, TaskResponse, UpdateTaskRequest,
        },
        query::TaskFilter,
        services,
        stats::TimeRange,
    },
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks))
        .route("/tasks/stats", get(task_stats))
        .route("/tasks/search", get(search_tasks))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", post(create_task))
        .route("/tasks/bulk", post(bulk_update))
        .route(
            "/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/tasks/:id/toggle", patch(toggle_task))
}

#[instrument(skip(state, auth, query), fields(user_id = auth.id))]
pub async fn list_tasks(
    State(state): State<AppState>,
    auth: AuthUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<TaskListResponse>, ApiError> {
    let filter = TaskFilter::from_query(&query)?;
    let (tasks, totals) = services::list(&state, auth.id, &filter).await?;
    Ok(Json(TaskListResponse {
        tasks,
        meta: (&totals).into(),
    }))
}

#[instrument(skip(state, auth), fields(user_id = auth.id))]
pub async fn get_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<SingleTaskResponse>, ApiError> {
    let id = parse_task_id(&id)?;
    let task = services::get(&state, auth.id, id).await?;
    Ok(Json(SingleTaskResponse { task }))
}

#[instrument(skip(state, auth, payload), fields(user_id = auth.id))]
pub async fn create_task(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(payload): JsonBody<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), ApiError> {
    let task = services::create(&state, auth.id, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(TaskResponse {
            message: "Task created successfully",
            task,
        }),
    ))
}

#[instrument(skip(state, auth, payload), fields(user_id = auth.id))]
pub async fn update_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    let id = parse_task_id(&id)?;
    let task = services::update(&state, auth.id, id, payload).await?;
    Ok(Json(TaskResponse {
        message: "Task updated successfully",
        task,
    }))
}

#[instrument(skip(state, auth), fields(user_id = auth.id))]
pub async fn delete_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, ApiError> {
    let id = parse_task_id(&id)?;
    let task = services::delete(&state, auth.id, id).await?;
    Ok(Json(TaskResponse {
        message: "Task deleted successfully",
        task,
    }))
}

#[instrument(skip(state, auth), fields(user_id = auth.id))]
pub async fn toggle_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, ApiError> {
    let id = parse_task_id(&id)?;
    let task = services::toggle(&state, auth.id, id).await?;
    let message = if task.completed {
        "Task marked as completed"
    } else {
        "Task marked as incomplete"
    };
    Ok(Json(TaskResponse { message, task }))
}

#[instrument(skip(state, auth, query), fields(user_id = auth.id))]
pub async fn task_stats(
    State(state): State<AppState>,
    auth: AuthUser,
    QueryParams(query): QueryParams<StatsQuery>,
) -> Result<Json<StatsResponse>, ApiError> {
    let range = TimeRange::parse(query.time_range.as_deref());
    let report = services::stats(&state, auth.id, range).await?;
    let completion_rate = report.stats.completion_rate();
    Ok(Json(StatsResponse {
        stats: StatsBody {
            stats: report.stats,
            completion_rate,
        },
        by_category: report.by_category,
        upcoming: report.upcoming,
    }))
}

#[instrument(skip(state, auth, payload), fields(user_id = auth.id))]
pub async fn bulk_update(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(payload): JsonBody<BulkUpdateRequest>,
) -> Result<Json<BulkUpdateResponse>, ApiError> {
    let outcome = services::bulk_update(&state, auth.id, payload).await?;
    let updated = outcome.tasks.len();
    Ok(Json(BulkUpdateResponse {
        message: format!("Updated {updated} tasks successfully"),
        updated,
        failed: outcome.failed,
        tasks: outcome.tasks,
    }))
}

#[instrument(skip(state, auth, query), fields(user_id = auth.id))]
pub async fn search_tasks(
    State(state): State<AppState>,
    auth: AuthUser,
    QueryParams(query): QueryParams<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let tasks = services::search(&state, auth.id, query.query.as_deref()).await?;
    Ok(Json(SearchResponse {
        count: tasks.len(),
        tasks,
        query: query.query.unwrap_or_default(),
    }))
}
