use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    error::{ApiError, FieldError},
    tasks::{
        repo_types::{Category, NewTask, Task, TaskChanges, PRIORITY_MEDIUM},
        stats::{CategoryCount, TaskStats},
        wire::{self, nullable},
    },
    validation::{char_len, Rule},
};

pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_DESCRIPTION_LEN: usize = 1000;

/// Priority as sent by clients: a number or a numeric string, 1 through 3.
pub fn parse_priority(value: &Value) -> Option<i32> {
    let n = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    (1..=3).contains(&n).then_some(n as i32)
}

/// Path ids must be positive integers.
pub fn parse_task_id(raw: &str) -> Result<i64, ApiError> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::Validation(vec![FieldError::new(
            "id",
            "Task ID must be a positive integer",
        )])),
    }
}

fn title_error(title: &Value) -> Option<FieldError> {
    match title.as_str().map(|t| char_len(t.trim())) {
        Some(len) if (1..=MAX_TITLE_LEN).contains(&len) => None,
        _ => Some(FieldError::new("title", "Title must be between 1-255 characters")),
    }
}

fn description_error(description: Option<&Value>) -> Option<FieldError> {
    match description {
        None | Some(Value::Null) => None,
        Some(Value::String(d)) if char_len(d.trim()) <= MAX_DESCRIPTION_LEN => None,
        Some(Value::String(_)) => Some(FieldError::new(
            "description",
            "Description cannot exceed 1000 characters",
        )),
        Some(_) => Some(FieldError::new("description", "Description must be text")),
    }
}

fn category_error(category: Option<&Value>) -> Option<FieldError> {
    category
        .filter(|c| !c.is_null())
        .filter(|c| c.as_str().and_then(|c| c.trim().parse::<Category>().ok()).is_none())
        .map(|_| FieldError::new("category", "Invalid category"))
}

fn priority_error(priority: Option<&Value>) -> Option<FieldError> {
    priority
        .filter(|p| !p.is_null() && parse_priority(p).is_none())
        .map(|_| FieldError::new("priority", "Priority must be between 1-3"))
}

fn completed_error(completed: Option<&Value>) -> Option<FieldError> {
    completed
        .filter(|v| !v.is_boolean())
        .map(|_| FieldError::new("completed", "Completed must be true or false"))
}

/// Blank strings and `null` pass; anything else must parse.
fn format_error<T>(
    value: Option<&Value>,
    parse: fn(&str) -> Option<T>,
    field: &'static str,
    message: &'static str,
) -> Option<FieldError> {
    let valid = match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty() || parse(s).is_some(),
        Some(_) => false,
    };
    (!valid).then(|| FieldError::new(field, message))
}

fn due_date_error(due_date: Option<&Value>) -> Option<FieldError> {
    format_error(due_date, wire::parse_date, "due_date", "Invalid date format")
}

fn start_time_error(start_time: Option<&Value>) -> Option<FieldError> {
    format_error(start_time, wire::parse_time, "start_time", "Invalid time format")
}

/// String view of a loosely typed field.
fn as_text(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str)
}

/// Trimmed text; blank becomes `None`.
fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Body fields stay loosely typed so a wrong JSON type is reported per field.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateTaskRequest {
    pub title: Option<Value>,
    pub description: Option<Value>,
    pub category: Option<Value>,
    pub priority: Option<Value>,
    pub due_date: Option<Value>,
    pub start_time: Option<Value>,
}

impl CreateTaskRequest {
    pub const RULES: &'static [Rule<Self>] = &[
        |r| match r.title.as_ref() {
            None | Some(Value::Null) => Some(FieldError::new("title", "Title is required")),
            Some(Value::String(t)) if t.trim().is_empty() => {
                Some(FieldError::new("title", "Title is required"))
            }
            Some(title) => title_error(title),
        },
        |r| description_error(r.description.as_ref()),
        |r| {
            let blank = as_text(r.category.as_ref()).is_some_and(|c| c.trim().is_empty());
            category_error(r.category.as_ref().filter(|_| !blank))
        },
        |r| priority_error(r.priority.as_ref()),
        |r| due_date_error(r.due_date.as_ref()),
        |r| start_time_error(r.start_time.as_ref()),
    ];

    /// Only meaningful after [`Self::RULES`] passed.
    pub fn into_new_task(self) -> NewTask {
        NewTask {
            title: as_text(self.title.as_ref())
                .unwrap_or_default()
                .trim()
                .to_string(),
            description: trimmed(as_text(self.description.as_ref())),
            category: as_text(self.category.as_ref())
                .and_then(|c| c.trim().parse().ok())
                .unwrap_or_default(),
            priority: self
                .priority
                .as_ref()
                .and_then(parse_priority)
                .unwrap_or(PRIORITY_MEDIUM),
            due_date: as_text(self.due_date.as_ref()).and_then(wire::parse_date),
            start_time: as_text(self.start_time.as_ref()).and_then(wire::parse_time),
        }
    }
}

/// Partial update. An explicit `null` (or blank string) on a nullable field clears it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateTaskRequest {
    pub title: Option<Value>,
    #[serde(deserialize_with = "nullable")]
    pub description: Option<Option<Value>>,
    pub completed: Option<Value>,
    pub category: Option<Value>,
    pub priority: Option<Value>,
    #[serde(deserialize_with = "nullable")]
    pub due_date: Option<Option<Value>>,
    #[serde(deserialize_with = "nullable")]
    pub start_time: Option<Option<Value>>,
}

impl UpdateTaskRequest {
    pub const RULES: &'static [Rule<Self>] = &[
        |r| r.title.as_ref().and_then(title_error),
        |r| description_error(r.description.as_ref().and_then(Option::as_ref)),
        |r| completed_error(r.completed.as_ref()),
        |r| category_error(r.category.as_ref()),
        |r| priority_error(r.priority.as_ref()),
        |r| due_date_error(r.due_date.as_ref().and_then(Option::as_ref)),
        |r| start_time_error(r.start_time.as_ref().and_then(Option::as_ref)),
    ];

    /// Only meaningful after [`Self::RULES`] passed.
    pub fn into_changes(self) -> TaskChanges {
        TaskChanges {
            title: as_text(self.title.as_ref()).map(|t| t.trim().to_string()),
            description: self.description.map(|d| trimmed(as_text(d.as_ref()))),
            completed: self.completed.as_ref().and_then(Value::as_bool),
            category: as_text(self.category.as_ref()).and_then(|c| c.trim().parse().ok()),
            priority: self.priority.as_ref().and_then(parse_priority),
            due_date: self
                .due_date
                .map(|d| as_text(d.as_ref()).and_then(wire::parse_date)),
            start_time: self
                .start_time
                .map(|t| as_text(t.as_ref()).and_then(wire::parse_time)),
        }
    }
}

/// `{taskIds, updates}`. Both are kept loosely typed so shape errors get their own codes.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BulkUpdateRequest {
    #[serde(rename = "taskIds")]
    pub task_ids: Option<Value>,
    pub updates: Option<Value>,
}

/// Fields a bulk update may touch.
pub const BULK_FIELDS: [&str; 3] = ["completed", "category", "priority"];

#[derive(Debug, Default)]
pub struct BulkFields {
    pub completed: Option<Value>,
    pub category: Option<Value>,
    pub priority: Option<Value>,
}

impl BulkFields {
    pub const RULES: &'static [Rule<Self>] = &[
        |r| completed_error(r.completed.as_ref()),
        |r| {
            r.category
                .as_ref()
                .filter(|v| v.as_str().and_then(|c| c.parse::<Category>().ok()).is_none())
                .map(|_| FieldError::new("category", "Invalid category"))
        },
        |r| {
            r.priority
                .as_ref()
                .filter(|v| parse_priority(v).is_none())
                .map(|_| FieldError::new("priority", "Priority must be between 1-3"))
        },
    ];

    /// Keeps only the [`BULK_FIELDS`]; `None` when none remain.
    pub fn pick(updates: &Map<String, Value>) -> Option<Self> {
        let mut fields = BulkFields::default();
        for (key, value) in updates.iter().filter(|(k, _)| BULK_FIELDS.contains(&k.as_str())) {
            let slot = match key.as_str() {
                "completed" => &mut fields.completed,
                "category" => &mut fields.category,
                _ => &mut fields.priority,
            };
            *slot = Some(value.clone());
        }
        (fields.completed.is_some() || fields.category.is_some() || fields.priority.is_some())
            .then_some(fields)
    }

    /// Only meaningful after [`Self::RULES`] passed.
    pub fn into_changes(self) -> TaskChanges {
        TaskChanges {
            completed: self.completed.as_ref().and_then(Value::as_bool),
            category: self
                .category
                .as_ref()
                .and_then(Value::as_str)
                .and_then(|c| c.parse().ok()),
            priority: self.priority.as_ref().and_then(parse_priority),
            ..TaskChanges::default()
        }
    }
}

/// A bulk id that is not a positive integer cannot match any task.
pub fn bulk_task_id(value: &Value) -> Option<i64> {
    let id = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    (id > 0).then_some(id)
}

/// Query string of `GET /tasks`. Empty values count as absent.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub completed: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub search: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatsQuery {
    #[serde(rename = "timeRange")]
    pub time_range: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub message: &'static str,
    pub task: Task,
}

#[derive(Debug, Serialize)]
pub struct SingleTaskResponse {
    pub task: Task,
}

#[derive(Debug, Serialize)]
pub struct ListMeta {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

impl From<&TaskStats> for ListMeta {
    fn from(s: &TaskStats) -> Self {
        Self {
            total: s.total,
            completed: s.completed,
            pending: s.pending,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
    pub meta: ListMeta,
}

#[derive(Debug, Serialize)]
pub struct StatsBody {
    #[serde(flatten)]
    pub stats: TaskStats,
    pub completion_rate: u32,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub stats: StatsBody,
    #[serde(rename = "byCategory")]
    pub by_category: Vec<CategoryCount>,
    pub upcoming: Vec<Task>,
}

#[derive(Debug, Serialize)]
pub struct BulkUpdateResponse {
    pub message: String,
    pub updated: usize,
    pub failed: usize,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub tasks: Vec<Task>,
    pub count: usize,
    pub query: String,
}
