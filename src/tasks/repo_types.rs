use std::{fmt, str::FromStr};

use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime, Time};

use crate::tasks::wire;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Work,
    Personal,
    Shopping,
    Health,
    Education,
    #[default]
    General,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Work,
        Category::Personal,
        Category::Shopping,
        Category::Health,
        Category::Education,
        Category::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Work => "work",
            Category::Personal => "personal",
            Category::Shopping => "shopping",
            Category::Health => "health",
            Category::Education => "education",
            Category::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

impl TryFrom<String> for Category {
    type Error = UnknownCategory;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

pub const PRIORITY_LOW: i32 = 1;
pub const PRIORITY_MEDIUM: i32 = 2;
pub const PRIORITY_HIGH: i32 = 3;

/// Task record in the database.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Task {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    #[sqlx(try_from = "String")]
    pub category: Category,
    pub priority: i32, // 1 = low, 2 = medium, 3 = high
    #[serde(serialize_with = "wire::date::option::serialize")]
    pub due_date: Option<Date>,
    #[serde(serialize_with = "wire::time_of_day::option::serialize")]
    pub start_time: Option<Time>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Task {
    /// Due strictly before `today` and still open.
    pub fn is_overdue(&self, today: Date) -> bool {
        !self.completed && self.due_date.is_some_and(|d| d < today)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub priority: i32,
    pub due_date: Option<Date>,
    pub start_time: Option<Time>,
}

/// Field-level update. `Some(None)` on a nullable field clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
    pub category: Option<Category>,
    pub priority: Option<i32>,
    pub due_date: Option<Option<Date>>,
    pub start_time: Option<Option<Time>>,
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        *self == TaskChanges::default()
    }

    pub fn touches_slot(&self) -> bool {
        self.due_date.is_some() || self.start_time.is_some()
    }

    /// Date and time the task will hold once these changes are applied to `current`.
    pub fn resulting_slot(&self, current: &Task) -> (Option<Date>, Option<Time>) {
        (
            self.due_date.unwrap_or(current.due_date),
            self.start_time.unwrap_or(current.start_time),
        )
    }
}
