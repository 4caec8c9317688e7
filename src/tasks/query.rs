//! Filtering and ordering of a user's task list.
//!
//! Overdue tasks always lead. Inside each group the requested sort applies, then
//! open tasks come before completed ones, then newer ids first.

use std::cmp::Ordering;

use time::{Date, OffsetDateTime};

use crate::{
    auth::dto::non_blank,
    error::{ApiError, FieldError},
    tasks::{dto::ListQuery, repo_types::Task},
    validation::{validate, Rule},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    DueDate,
    Priority,
    Title,
}

impl SortField {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "created_at" => Some(SortField::CreatedAt),
            "updated_at" => Some(SortField::UpdatedAt),
            "due_date" => Some(SortField::DueDate),
            "priority" => Some(SortField::Priority),
            "title" => Some(SortField::Title),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    fn apply(self, ord: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_priority(s: &str) -> Option<i32> {
    s.trim().parse::<i32>().ok().filter(|p| (1..=3).contains(p))
}

/// Parsed list filters. All criteria are optional and combine with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub completed: Option<bool>,
    pub category: Option<String>,
    pub priority: Option<i32>,
    /// Lowercased search needle.
    pub search: Option<String>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl ListQuery {
    pub const RULES: &'static [Rule<Self>] = &[
        |q| {
            non_blank(&q.completed)
                .filter(|c| parse_bool(c).is_none())
                .map(|_| FieldError::new("completed", "Completed must be true or false"))
        },
        |q| {
            non_blank(&q.priority)
                .filter(|p| parse_priority(p).is_none())
                .map(|_| FieldError::new("priority", "Priority must be between 1-3"))
        },
        |q| {
            non_blank(&q.sort_by)
                .filter(|s| SortField::parse(s).is_none())
                .map(|_| FieldError::new("sortBy", "Invalid sort field"))
        },
        |q| {
            non_blank(&q.sort_order)
                .filter(|s| SortOrder::parse(s).is_none())
                .map(|_| FieldError::new("sortOrder", "Sort order must be asc or desc"))
        },
    ];
}

impl TaskFilter {
    pub fn from_query(q: &ListQuery) -> Result<Self, ApiError> {
        validate(q, ListQuery::RULES)?;
        Ok(Self {
            completed: non_blank(&q.completed).and_then(parse_bool),
            category: non_blank(&q.category).map(|c| c.trim().to_string()),
            priority: non_blank(&q.priority).and_then(parse_priority),
            search: non_blank(&q.search).map(|s| s.trim().to_lowercase()),
            sort_by: non_blank(&q.sort_by)
                .and_then(SortField::parse)
                .unwrap_or_default(),
            sort_order: non_blank(&q.sort_order)
                .and_then(SortOrder::parse)
                .unwrap_or_default(),
        })
    }

    /// Search-only filter with the default ordering.
    pub fn search(needle: &str) -> Self {
        Self {
            search: Some(needle.trim().to_lowercase()),
            ..Self::default()
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        if self.completed.is_some_and(|c| task.completed != c) {
            return false;
        }
        if self
            .category
            .as_deref()
            .is_some_and(|c| task.category.as_str() != c)
        {
            return false;
        }
        if self.priority.is_some_and(|p| task.priority != p) {
            return false;
        }
        if let Some(needle) = &self.search {
            let in_title = task.title.to_lowercase().contains(needle.as_str());
            let in_description = task
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(needle.as_str()));
            if !in_title && !in_description {
                return false;
            }
        }
        true
    }

    pub fn compare(&self, a: &Task, b: &Task, today: Date) -> Ordering {
        b.is_overdue(today)
            .cmp(&a.is_overdue(today))
            .then_with(|| self.compare_field(a, b))
            .then_with(|| a.completed.cmp(&b.completed))
            .then_with(|| b.id.cmp(&a.id))
    }

    fn compare_field(&self, a: &Task, b: &Task) -> Ordering {
        let order = self.sort_order;
        match self.sort_by {
            SortField::CreatedAt => order.apply(a.created_at.cmp(&b.created_at)),
            SortField::UpdatedAt => order.apply(a.updated_at.cmp(&b.updated_at)),
            SortField::Priority => order.apply(a.priority.cmp(&b.priority)),
            SortField::Title => order.apply(
                a.title
                    .to_lowercase()
                    .cmp(&b.title.to_lowercase())
                    .then_with(|| a.title.cmp(&b.title)),
            ),
            SortField::DueDate => nulls_last(a.due_date, b.due_date, order)
                .then_with(|| nulls_last(a.start_time, b.start_time, order)),
        }
    }

    /// Keeps the matching tasks and orders them.
    pub fn apply(&self, tasks: Vec<Task>, today: Date) -> Vec<Task> {
        let mut kept: Vec<Task> = tasks.into_iter().filter(|t| self.matches(t)).collect();
        kept.sort_by(|a, b| self.compare(a, b, today));
        kept
    }
}

/// Orders present values by `order`; missing values go last either way.
fn nulls_last<T: Ord>(a: Option<T>, b: Option<T>, order: SortOrder) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => order.apply(a.cmp(&b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// The current UTC calendar day.
pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::repo_types::Category;
    use time::macros::{date, datetime, time};
    use time::Time;

    const TODAY: Date = date!(2025 - 06 - 10);

    fn task(id: i64, title: &str) -> Task {
        Task {
            id,
            user_id: 1,
            title: title.into(),
            description: None,
            completed: false,
            category: Category::General,
            priority: 2,
            due_date: None,
            start_time: None,
            created_at: datetime!(2025-06-01 12:00 UTC) + time::Duration::minutes(id),
            updated_at: datetime!(2025-06-01 12:00 UTC) + time::Duration::minutes(id),
        }
    }

    fn due(mut t: Task, d: Date, at: Option<Time>) -> Task {
        t.due_date = Some(d);
        t.start_time = at;
        t
    }

    fn ids(tasks: &[Task]) -> Vec<i64> {
        tasks.iter().map(|t| t.id).collect()
    }

    fn query(pairs: &[(&str, &str)]) -> ListQuery {
        let mut q = ListQuery::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "completed" => q.completed = v,
                "category" => q.category = v,
                "priority" => q.priority = v,
                "search" => q.search = v,
                "sortBy" => q.sort_by = v,
                "sortOrder" => q.sort_order = v,
                _ => unreachable!(),
            }
        }
        q
    }

    #[test]
    fn empty_query_values_are_ignored() {
        let f = TaskFilter::from_query(&query(&[
            ("completed", ""),
            ("category", ""),
            ("priority", ""),
            ("search", ""),
        ]))
        .unwrap();
        assert_eq!(f, TaskFilter::default());
    }

    #[test]
    fn bad_query_values_are_rejected_together() {
        let err = TaskFilter::from_query(&query(&[
            ("completed", "maybe"),
            ("priority", "9"),
            ("sortBy", "owner"),
            ("sortOrder", "sideways"),
        ]))
        .unwrap_err();
        let ApiError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["completed", "priority", "sortBy", "sortOrder"]);
    }

    #[test]
    fn filters_combine() {
        let mut a = task(1, "Write report");
        a.category = Category::Work;
        a.priority = 3;
        let mut b = task(2, "Groceries");
        b.category = Category::Shopping;
        b.description = Some("Milk and REPORT paper".into());
        let mut c = task(3, "Report bug");
        c.category = Category::Work;
        c.completed = true;

        let f = TaskFilter::from_query(&query(&[("category", "work"), ("completed", "false")]))
            .unwrap();
        assert_eq!(ids(&f.apply(vec![a.clone(), b.clone(), c.clone()], TODAY)), vec![1]);

        let f = TaskFilter::search("report");
        assert_eq!(ids(&f.apply(vec![a.clone(), b.clone(), c.clone()], TODAY)), vec![3, 2, 1]);

        let f = TaskFilter::from_query(&query(&[("priority", "3")])).unwrap();
        assert_eq!(ids(&f.apply(vec![a, b, c], TODAY)), vec![1]);
    }

    #[test]
    fn overdue_first_then_requested_order() {
        let old = due(task(1, "late"), date!(2025 - 06 - 01), None);
        let mut done_late = due(task(2, "done late"), date!(2025 - 06 - 01), None);
        done_late.completed = true;
        let newest = task(3, "new");
        let tasks = vec![old, done_late, newest];

        let f = TaskFilter::default();
        assert_eq!(ids(&f.apply(tasks.clone(), TODAY)), vec![1, 3, 2]);

        let f = TaskFilter::from_query(&query(&[("sortOrder", "asc")])).unwrap();
        assert_eq!(ids(&f.apply(tasks, TODAY)), vec![1, 2, 3]);
    }

    #[test]
    fn due_date_sort_uses_start_time_and_puts_nulls_last() {
        let d = date!(2025 - 06 - 20);
        let tasks = vec![
            task(1, "undated"),
            due(task(2, "afternoon"), d, Some(time!(15:00))),
            due(task(3, "morning"), d, Some(time!(09:00))),
            due(task(4, "all day"), d, None),
            due(task(5, "earlier day"), date!(2025 - 06 - 15), Some(time!(18:00))),
        ];

        let asc = TaskFilter::from_query(&query(&[("sortBy", "due_date"), ("sortOrder", "asc")]))
            .unwrap();
        assert_eq!(ids(&asc.apply(tasks.clone(), TODAY)), vec![5, 3, 2, 4, 1]);

        let desc = TaskFilter::from_query(&query(&[("sortBy", "due_date")])).unwrap();
        assert_eq!(ids(&desc.apply(tasks, TODAY)), vec![2, 3, 4, 5, 1]);
    }

    #[test]
    fn ties_put_open_tasks_before_completed() {
        let mut a = task(1, "a");
        a.priority = 3;
        a.completed = true;
        let mut b = task(2, "b");
        b.priority = 3;
        let f = TaskFilter::from_query(&query(&[("sortBy", "priority")])).unwrap();
        assert_eq!(ids(&f.apply(vec![a, b], TODAY)), vec![2, 1]);
    }

    #[test]
    fn title_sort_ignores_case() {
        let tasks = vec![task(1, "banana"), task(2, "Apple"), task(3, "cherry")];
        let f = TaskFilter::from_query(&query(&[("sortBy", "title"), ("sortOrder", "asc")]))
            .unwrap();
        assert_eq!(ids(&f.apply(tasks, TODAY)), vec![2, 1, 3]);
    }
}
