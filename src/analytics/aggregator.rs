use crate::domain::models::{
    CategoryBreakdown, DailyRollup, Issue, IssueStatus, LocationHotspot, PriorityBreakdown,
};
use crate::time_utils::{day_of, day_key, hours_between, round2, trailing_days};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const DASHBOARD_HOTSPOTS: usize = 5;
pub const RECENT_WINDOW_DAYS: i64 = 7;
pub const DEFAULT_TREND_DAYS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_issues: u64,
    pub open_issues: u64,
    pub in_progress_issues: u64,
    pub resolved_issues: u64,
    pub category_breakdown: CategoryBreakdown,
    pub priority_breakdown: PriorityBreakdown,
    pub location_hotspots: Vec<LocationHotspot>,
    pub avg_resolution_time: f64,
    pub recent_issues_count: u64,
    pub resolution_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: String,
    pub created: u64,
    pub resolved: u64,
}

/// Counts shared by the live dashboard and the persisted rollup.
struct Tally {
    total: u64,
    open: u64,
    in_progress: u64,
    resolved: u64,
    categories: CategoryBreakdown,
    priorities: PriorityBreakdown,
    hotspots: Vec<LocationHotspot>,
    avg_resolution_hours: f64,
}

fn tally(issues: &[Issue]) -> Tally {
    let mut out = Tally {
        total: issues.len() as u64,
        open: 0,
        in_progress: 0,
        resolved: 0,
        categories: CategoryBreakdown::default(),
        priorities: PriorityBreakdown::default(),
        hotspots: Vec::new(),
        avg_resolution_hours: 0.0,
    };

    let mut block_index: HashMap<&str, usize> = HashMap::new();
    let mut resolution_sum = 0.0;
    let mut resolution_count = 0u64;

    for issue in issues {
        match issue.status {
            IssueStatus::Open => out.open += 1,
            IssueStatus::InProgress => out.in_progress += 1,
            IssueStatus::Resolved => out.resolved += 1,
        }
        out.categories.bump(issue.category);
        out.priorities.bump(issue.priority);

        let block = issue.location.block.as_str();
        match block_index.get(block) {
            Some(&idx) => out.hotspots[idx].count += 1,
            None => {
                block_index.insert(block, out.hotspots.len());
                out.hotspots.push(LocationHotspot {
                    block: block.to_string(),
                    count: 1,
                });
            }
        }

        if issue.status == IssueStatus::Resolved {
            if let Some(resolved_at) = issue.resolved_at {
                resolution_sum += hours_between(issue.created_at, resolved_at);
                resolution_count += 1;
            }
        }
    }

    // stable sort: ties keep first-seen order
    out.hotspots.sort_by(|a, b| b.count.cmp(&a.count));

    if resolution_count > 0 {
        out.avg_resolution_hours = resolution_sum / resolution_count as f64;
    }
    out
}

fn resolution_rate(resolved: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    (resolved as f64 / total as f64 * 100.0).round() as u32
}

pub fn compute_dashboard(issues: &[Issue], now: DateTime<Utc>) -> DashboardSummary {
    let mut t = tally(issues);
    t.hotspots.truncate(DASHBOARD_HOTSPOTS);

    let recent_cutoff = now - Duration::days(RECENT_WINDOW_DAYS);
    let recent_issues_count = issues
        .iter()
        .filter(|i| i.created_at > recent_cutoff)
        .count() as u64;

    DashboardSummary {
        total_issues: t.total,
        open_issues: t.open,
        in_progress_issues: t.in_progress,
        resolved_issues: t.resolved,
        category_breakdown: t.categories,
        priority_breakdown: t.priorities,
        location_hotspots: t.hotspots,
        avg_resolution_time: round2(t.avg_resolution_hours),
        recent_issues_count,
        resolution_rate: resolution_rate(t.resolved, t.total),
    }
}

/// Dense per-day created/resolved counts for the `days` dates ending at `today`.
pub fn compute_trend(issues: &[Issue], days: u32, today: NaiveDate) -> Vec<TrendPoint> {
    let mut buckets: BTreeMap<NaiveDate, (u64, u64)> = trailing_days(today, days)
        .into_iter()
        .map(|d| (d, (0, 0)))
        .collect();

    for issue in issues {
        if let Some(slot) = buckets.get_mut(&day_of(issue.created_at)) {
            slot.0 += 1;
        }
        if let Some(resolved_at) = issue.resolved_at {
            if let Some(slot) = buckets.get_mut(&day_of(resolved_at)) {
                slot.1 += 1;
            }
        }
    }

    buckets
        .into_iter()
        .map(|(date, (created, resolved))| TrendPoint {
            date: day_key(date),
            created,
            resolved,
        })
        .collect()
}

/// Snapshot for the rollup table: every hotspot, unrounded average.
pub fn compute_full_rollup(issues: &[Issue], today: NaiveDate) -> DailyRollup {
    let t = tally(issues);
    DailyRollup {
        date: today,
        total_issues: t.total,
        resolved_issues: t.resolved,
        avg_resolution_time: t.avg_resolution_hours,
        category_breakdown: t.categories,
        priority_breakdown: t.priorities,
        location_hotspots: t.hotspots,
    }
}
