use std::collections::BTreeMap;

use serde::Serialize;
use time::{Date, Duration, OffsetDateTime};

use crate::tasks::repo_types::{Category, Task, PRIORITY_HIGH, PRIORITY_LOW, PRIORITY_MEDIUM};

/// How many days ahead count as upcoming.
pub const UPCOMING_DAYS: i64 = 7;
pub const UPCOMING_LIMIT: usize = 10;

/// Creation window used by the statistics endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeRange {
    Week,
    Month,
    Year,
    #[default]
    All,
}

impl TimeRange {
    /// Unknown or missing values mean `All`.
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(str::trim) {
            Some("week") => TimeRange::Week,
            Some("month") => TimeRange::Month,
            Some("year") => TimeRange::Year,
            _ => TimeRange::All,
        }
    }

    fn days(self) -> Option<i64> {
        match self {
            TimeRange::Week => Some(7),
            TimeRange::Month => Some(30),
            TimeRange::Year => Some(365),
            TimeRange::All => None,
        }
    }

    /// Earliest creation instant inside the range: midnight UTC, `days` before `today`.
    pub fn since(self, today: Date) -> Option<OffsetDateTime> {
        self.days()
            .map(|n| (today - Duration::days(n)).midnight().assume_utc())
    }

    pub fn contains(self, task: &Task, today: Date) -> bool {
        self.since(today).map_or(true, |since| task.created_at >= since)
    }
}

/// Aggregate counters over a set of tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub low_priority: usize,
    pub medium_priority: usize,
    pub high_priority: usize,
    pub overdue: usize,
    pub categories_count: usize,
}

impl TaskStats {
    pub fn compute<'a>(tasks: impl IntoIterator<Item = &'a Task>, today: Date) -> Self {
        let mut stats = TaskStats::default();
        let mut categories = Vec::new();
        for task in tasks {
            stats.total += 1;
            if task.completed {
                stats.completed += 1;
            } else {
                stats.pending += 1;
            }
            match task.priority {
                PRIORITY_LOW => stats.low_priority += 1,
                PRIORITY_MEDIUM => stats.medium_priority += 1,
                PRIORITY_HIGH => stats.high_priority += 1,
                _ => {}
            }
            if task.is_overdue(today) {
                stats.overdue += 1;
            }
            if !categories.contains(&task.category) {
                categories.push(task.category);
            }
        }
        stats.categories_count = categories.len();
        stats
    }

    /// Completed share in whole percent; 0 for an empty set.
    pub fn completion_rate(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (self.completed as f64 / self.total as f64 * 100.0).round() as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub total: usize,
    pub completed: usize,
}

/// Per-category totals, largest first; equal totals ordered by name.
pub fn by_category<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Vec<CategoryCount> {
    let mut counts: BTreeMap<&'static str, CategoryCount> = BTreeMap::new();
    for task in tasks {
        let entry = counts
            .entry(task.category.as_str())
            .or_insert_with(|| CategoryCount {
                category: task.category,
                total: 0,
                completed: 0,
            });
        entry.total += 1;
        if task.completed {
            entry.completed += 1;
        }
    }
    let mut out: Vec<CategoryCount> = counts.into_values().collect();
    // stable sort keeps the name order from the map for equal totals
    out.sort_by(|a, b| b.total.cmp(&a.total));
    out
}

/// Open tasks due between `today` and `today + 7` inclusive: soonest first, then
/// highest priority.
pub fn upcoming<'a>(tasks: impl IntoIterator<Item = &'a Task>, today: Date) -> Vec<Task> {
    let horizon = today + Duration::days(UPCOMING_DAYS);
    let mut out: Vec<Task> = tasks
        .into_iter()
        .filter(|t| !t.completed)
        .filter(|t| t.due_date.is_some_and(|d| d >= today && d <= horizon))
        .cloned()
        .collect();
    out.sort_by(|a, b| {
        a.due_date
            .cmp(&b.due_date)
            .then_with(|| b.priority.cmp(&a.priority))
            .then_with(|| a.start_time.cmp(&b.start_time))
            .then_with(|| a.id.cmp(&b.id))
    });
    out.truncate(UPCOMING_LIMIT);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    const TODAY: Date = date!(2025 - 06 - 10);

    fn task(id: i64, created: OffsetDateTime) -> Task {
        Task {
            id,
            user_id: 1,
            title: format!("task {id}"),
            description: None,
            completed: false,
            category: Category::General,
            priority: 2,
            due_date: None,
            start_time: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn time_range_parsing_and_bounds() {
        assert_eq!(TimeRange::parse(Some("week")), TimeRange::Week);
        assert_eq!(TimeRange::parse(Some("decade")), TimeRange::All);
        assert_eq!(TimeRange::parse(None), TimeRange::All);
        assert_eq!(
            TimeRange::Week.since(TODAY),
            Some(datetime!(2025-06-03 00:00 UTC))
        );
        assert_eq!(
            TimeRange::Month.since(TODAY),
            Some(datetime!(2025-05-11 00:00 UTC))
        );
        assert_eq!(TimeRange::All.since(TODAY), None);
    }

    #[test]
    fn week_range_starts_at_midnight() {
        let inside = task(1, datetime!(2025-06-03 00:00 UTC));
        let outside = task(2, datetime!(2025-06-02 23:59 UTC));
        assert!(TimeRange::Week.contains(&inside, TODAY));
        assert!(!TimeRange::Week.contains(&outside, TODAY));
        assert!(TimeRange::All.contains(&outside, TODAY));
    }

    #[test]
    fn counters_add_up() {
        let now = datetime!(2025-06-09 08:00 UTC);
        let mut a = task(1, now);
        a.priority = 3;
        a.category = Category::Work;
        a.due_date = Some(date!(2025 - 06 - 01));
        let mut b = task(2, now);
        b.completed = true;
        b.priority = 1;
        b.due_date = Some(date!(2025 - 06 - 01));
        let c = task(3, now);

        let stats = TaskStats::compute(&[a, b, c], TODAY);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed + stats.pending, stats.total);
        assert_eq!(
            (stats.low_priority, stats.medium_priority, stats.high_priority),
            (1, 1, 1)
        );
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.categories_count, 2);
        assert_eq!(stats.completion_rate(), 33);
        assert_eq!(TaskStats::default().completion_rate(), 0);
    }

    #[test]
    fn categories_by_total_then_name() {
        let now = datetime!(2025-06-09 08:00 UTC);
        let mut tasks = Vec::new();
        for (id, category, completed) in [
            (1, Category::Work, false),
            (2, Category::Work, true),
            (3, Category::Shopping, false),
            (4, Category::Health, true),
        ] {
            let mut t = task(id, now);
            t.category = category;
            t.completed = completed;
            tasks.push(t);
        }
        let counts = by_category(&tasks);
        let summary: Vec<_> = counts
            .iter()
            .map(|c| (c.category.as_str(), c.total, c.completed))
            .collect();
        assert_eq!(
            summary,
            vec![("work", 2, 1), ("health", 1, 1), ("shopping", 1, 0)]
        );
    }

    #[test]
    fn upcoming_window_and_order() {
        let now = datetime!(2025-06-01 08:00 UTC);
        let mut tasks = Vec::new();
        for (id, due, priority, completed) in [
            (1, date!(2025 - 06 - 12), 1, false),
            (2, date!(2025 - 06 - 12), 3, false),
            (3, date!(2025 - 06 - 10), 2, false),
            (4, date!(2025 - 06 - 17), 2, false),
            (5, date!(2025 - 06 - 18), 3, false),
            (6, date!(2025 - 06 - 09), 3, false),
            (7, date!(2025 - 06 - 11), 3, true),
        ] {
            let mut t = task(id, now);
            t.due_date = Some(due);
            t.priority = priority;
            t.completed = completed;
            tasks.push(t);
        }
        let ids: Vec<i64> = upcoming(&tasks, TODAY).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 2, 1, 4]);
    }

    #[test]
    fn upcoming_is_capped() {
        let now = datetime!(2025-06-01 08:00 UTC);
        let tasks: Vec<Task> = (1..=15)
            .map(|id| {
                let mut t = task(id, now);
                t.due_date = Some(TODAY);
                t
            })
            .collect();
        assert_eq!(upcoming(&tasks, TODAY).len(), UPCOMING_LIMIT);
    }
}
