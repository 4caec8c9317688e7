use serde_json::Value;
use time::{Date, Time};
use tracing::{debug, info, warn};

use crate::{
    db::RepoError,
    error::{ApiError, OrInternal},
    state::AppState,
    tasks::{
        dto::{bulk_task_id, BulkFields, BulkUpdateRequest, CreateTaskRequest, UpdateTaskRequest},
        query::{today, TaskFilter},
        repo::OPEN_SLOT_CONSTRAINT,
        repo_types::Task,
        stats::{self, CategoryCount, TaskStats, TimeRange},
    },
    validation::{char_len, validate},
};

pub const MIN_SEARCH_LEN: usize = 2;

/// Whether another open task of the user already holds the slot. Tasks without both a
/// date and a time never conflict.
pub async fn has_time_conflict(
    state: &AppState,
    user_id: i64,
    due_date: Option<Date>,
    start_time: Option<Time>,
    exclude_id: Option<i64>,
) -> Result<bool, RepoError> {
    match (due_date, start_time) {
        (Some(date), Some(time)) => {
            state
                .tasks
                .slot_taken(user_id, date, time, exclude_id)
                .await
        }
        _ => Ok(false),
    }
}

fn is_slot_violation(e: &RepoError) -> bool {
    matches!(e, RepoError::Duplicate { constraint } if constraint == OPEN_SLOT_CONSTRAINT)
}

pub async fn list(
    state: &AppState,
    user_id: i64,
    filter: &TaskFilter,
) -> Result<(Vec<Task>, TaskStats), ApiError> {
    let all = state
        .tasks
        .list_for_user(user_id)
        .await
        .or_internal("TASKS_FETCH_FAILED", "Failed to fetch tasks")?;
    let today = today();
    let totals = TaskStats::compute(&all, today);
    let tasks = filter.apply(all, today);
    debug!(user_id, count = tasks.len(), "tasks listed");
    Ok((tasks, totals))
}

pub async fn get(state: &AppState, user_id: i64, id: i64) -> Result<Task, ApiError> {
    state
        .tasks
        .find(user_id, id)
        .await
        .or_internal("TASK_FETCH_FAILED", "Failed to fetch task")?
        .ok_or_else(ApiError::task_not_found)
}

pub async fn create(
    state: &AppState,
    user_id: i64,
    req: CreateTaskRequest,
) -> Result<Task, ApiError> {
    validate(&req, CreateTaskRequest::RULES)?;
    let new = req.into_new_task();

    let taken = has_time_conflict(state, user_id, new.due_date, new.start_time, None)
        .await
        .or_internal("TASK_CREATE_FAILED", "Failed to create task")?;
    if taken {
        warn!(user_id, due_date = ?new.due_date, start_time = ?new.start_time, "time conflict");
        return Err(ApiError::time_conflict());
    }

    let task = match state.tasks.insert(user_id, &new).await {
        Ok(task) => task,
        Err(e) if is_slot_violation(&e) => {
            warn!(user_id, "time conflict detected by store");
            return Err(ApiError::time_conflict());
        }
        Err(e) => return Err(e).or_internal("TASK_CREATE_FAILED", "Failed to create task"),
    };

    info!(user_id, task_id = task.id, "task created");
    Ok(task)
}

pub async fn update(
    state: &AppState,
    user_id: i64,
    id: i64,
    req: UpdateTaskRequest,
) -> Result<Task, ApiError> {
    validate(&req, UpdateTaskRequest::RULES)?;
    let changes = req.into_changes();
    if changes.is_empty() {
        return Err(ApiError::bad_request("NO_UPDATES", "No updates provided"));
    }

    if changes.touches_slot() {
        let current = state
            .tasks
            .find(user_id, id)
            .await
            .or_internal("TASK_UPDATE_FAILED", "Failed to update task")?
            .ok_or_else(ApiError::task_not_found)?;
        let (due_date, start_time) = changes.resulting_slot(&current);
        let taken = has_time_conflict(state, user_id, due_date, start_time, Some(id))
            .await
            .or_internal("TASK_UPDATE_FAILED", "Failed to update task")?;
        if taken {
            warn!(user_id, task_id = id, ?due_date, ?start_time, "time conflict");
            return Err(ApiError::time_conflict());
        }
    }

    let task = match state.tasks.update(user_id, id, &changes).await {
        Ok(Some(task)) => task,
        Ok(None) => return Err(ApiError::task_not_found()),
        Err(e) if is_slot_violation(&e) => {
            warn!(user_id, task_id = id, "time conflict detected by store");
            return Err(ApiError::time_conflict());
        }
        Err(e) => return Err(e).or_internal("TASK_UPDATE_FAILED", "Failed to update task"),
    };

    info!(user_id, task_id = id, "task updated");
    Ok(task)
}

pub async fn delete(state: &AppState, user_id: i64, id: i64) -> Result<Task, ApiError> {
    let task = state
        .tasks
        .delete(user_id, id)
        .await
        .or_internal("TASK_DELETE_FAILED", "Failed to delete task")?
        .ok_or_else(ApiError::task_not_found)?;
    info!(user_id, task_id = id, "task deleted");
    Ok(task)
}

/// Flips completion. Reopening a task into a slot another open task now holds is a
/// time conflict.
pub async fn toggle(state: &AppState, user_id: i64, id: i64) -> Result<Task, ApiError> {
    let task = match state.tasks.toggle(user_id, id).await {
        Ok(Some(task)) => task,
        Ok(None) => return Err(ApiError::task_not_found()),
        Err(e) if is_slot_violation(&e) => {
            warn!(user_id, task_id = id, "reopening task into an occupied slot");
            return Err(ApiError::time_conflict());
        }
        Err(e) => return Err(e).or_internal("TOGGLE_FAILED", "Failed to toggle task"),
    };
    info!(user_id, task_id = id, completed = task.completed, "task toggled");
    Ok(task)
}

pub struct TaskStatsReport {
    pub stats: TaskStats,
    pub by_category: Vec<CategoryCount>,
    pub upcoming: Vec<Task>,
}

pub async fn stats(
    state: &AppState,
    user_id: i64,
    range: TimeRange,
) -> Result<TaskStatsReport, ApiError> {
    let all = state
        .tasks
        .list_for_user(user_id)
        .await
        .or_internal("STATS_FETCH_FAILED", "Failed to get task statistics")?;
    let today = today();
    let in_range: Vec<&Task> = all.iter().filter(|t| range.contains(t, today)).collect();
    Ok(TaskStatsReport {
        stats: TaskStats::compute(in_range.iter().copied(), today),
        by_category: stats::by_category(in_range.iter().copied()),
        upcoming: stats::upcoming(&all, today),
    })
}

#[derive(Debug)]
pub struct BulkOutcome {
    pub tasks: Vec<Task>,
    pub failed: usize,
}

/// Applies the same allowed changes to each id on its own; one failing id does not
/// stop the others.
pub async fn bulk_update(
    state: &AppState,
    user_id: i64,
    req: BulkUpdateRequest,
) -> Result<BulkOutcome, ApiError> {
    let ids = match req.task_ids {
        Some(Value::Array(ids)) if !ids.is_empty() => ids,
        _ => {
            return Err(ApiError::bad_request(
                "INVALID_TASK_IDS",
                "Task IDs array is required",
            ))
        }
    };
    let updates = match req.updates {
        Some(Value::Object(updates)) if !updates.is_empty() => updates,
        _ => return Err(ApiError::bad_request("NO_UPDATES", "Updates are required")),
    };
    let Some(fields) = BulkFields::pick(&updates) else {
        return Err(ApiError::bad_request(
            "INVALID_UPDATES",
            "No valid updates provided",
        ));
    };
    validate(&fields, BulkFields::RULES)?;
    let changes = fields.into_changes();

    let mut outcome = BulkOutcome {
        tasks: Vec::with_capacity(ids.len()),
        failed: 0,
    };
    for raw in &ids {
        let Some(id) = bulk_task_id(raw) else {
            outcome.failed += 1;
            continue;
        };
        match state.tasks.update(user_id, id, &changes).await {
            Ok(Some(task)) => outcome.tasks.push(task),
            Ok(None) => outcome.failed += 1,
            Err(e) => {
                warn!(error = %e, user_id, task_id = id, "bulk update of task failed");
                outcome.failed += 1;
            }
        }
    }

    info!(
        user_id,
        updated = outcome.tasks.len(),
        failed = outcome.failed,
        "bulk update finished"
    );
    Ok(outcome)
}

/// Case-insensitive search over title and description.
pub async fn search(
    state: &AppState,
    user_id: i64,
    query: Option<&str>,
) -> Result<Vec<Task>, ApiError> {
    let needle = query.map(str::trim).unwrap_or_default();
    if char_len(needle) < MIN_SEARCH_LEN {
        return Err(ApiError::bad_request(
            "INVALID_QUERY",
            "Search query must be at least 2 characters",
        ));
    }
    let all = state
        .tasks
        .list_for_user(user_id)
        .await
        .or_internal("SEARCH_FAILED", "Search failed")?;
    Ok(TaskFilter::search(needle).apply(all, today()))
}
