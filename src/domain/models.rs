use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "issue_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Maintenance,
    Safety,
    Food,
    Cleaning,
    Others,
}

impl Category {
    #[cfg(test)]
    pub const ALL: [Category; 5] = [
        Category::Maintenance,
        Category::Safety,
        Category::Food,
        Category::Cleaning,
        Category::Others,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Maintenance => "maintenance",
            Category::Safety => "safety",
            Category::Food => "food",
            Category::Cleaning => "cleaning",
            Category::Others => "others",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownVariant;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "maintenance" => Ok(Category::Maintenance),
            "safety" => Ok(Category::Safety),
            "food" => Ok(Category::Food),
            "cleaning" => Ok(Category::Cleaning),
            "others" => Ok(Category::Others),
            _ => Err(UnknownVariant::new("category", raw)),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "issue_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = UnknownVariant;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(UnknownVariant::new("priority", raw)),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "issue_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Open,
    InProgress,
    Resolved,
}

impl IssueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Open => "open",
            IssueStatus::InProgress => "in_progress",
            IssueStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = UnknownVariant;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "open" => Ok(IssueStatus::Open),
            "in_progress" => Ok(IssueStatus::InProgress),
            "resolved" => Ok(IssueStatus::Resolved),
            _ => Err(UnknownVariant::new("status", raw)),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Hosteler,
    Authority,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Hosteler => "hosteler",
            UserRole::Authority => "authority",
            UserRole::Admin => "admin",
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Authority | UserRole::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = UnknownVariant;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "hosteler" => Ok(UserRole::Hosteler),
            "authority" => Ok(UserRole::Authority),
            "admin" => Ok(UserRole::Admin),
            _ => Err(UnknownVariant::new("role", raw)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("issue is already resolved")]
    AlreadyResolved,
}

impl IssueStatus {
    /// Resolved is terminal: `resolved_at` is written exactly once.
    pub fn transition_to(self, next: IssueStatus) -> Result<IssueStatus, TransitionError> {
        match self {
            IssueStatus::Resolved => Err(TransitionError::AlreadyResolved),
            IssueStatus::Open | IssueStatus::InProgress => Ok(next),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub block: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reporter {
    Identified { reporter_id: Uuid },
    Anonymous { display_name: String },
}

impl Reporter {
    pub fn reporter_id(&self) -> Option<Uuid> {
        match self {
            Reporter::Identified { reporter_id } => Some(*reporter_id),
            Reporter::Anonymous { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub author_id: Uuid,
    pub author_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Fields the classifier derives once at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub priority: Priority,
    pub summary: String,
    pub recommendations: Vec<String>,
    pub sentiment_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub priority: Priority,
    pub summary: String,
    pub recommendations: Vec<String>,
    pub sentiment_score: f64,
    pub status: IssueStatus,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
    pub location: Location,
    pub reporter: Reporter,
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// A classified submission ready for insertion; the store assigns id and creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIssue {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub analysis: Analysis,
    pub location: Location,
    pub reporter: Reporter,
    pub attachments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusPatch {
    pub status: IssueStatus,
    pub resolution_notes: Option<String>,
    pub at: DateTime<Utc>,
}

impl Issue {
    pub fn from_new(id: Uuid, created_at: DateTime<Utc>, new: NewIssue) -> Self {
        Self {
            id,
            created_at,
            title: new.title,
            description: new.description,
            category: new.category,
            priority: new.analysis.priority,
            summary: new.analysis.summary,
            recommendations: new.analysis.recommendations,
            sentiment_score: new.analysis.sentiment_score,
            status: IssueStatus::Open,
            resolved_at: None,
            resolution_notes: None,
            location: new.location,
            reporter: new.reporter,
            attachments: new.attachments,
            comments: Vec::new(),
        }
    }

    /// Applies a status change in place, keeping `resolved_at` set iff the issue is resolved.
    pub fn apply_status(&mut self, patch: StatusPatch) -> Result<(), TransitionError> {
        self.status = self.status.transition_to(patch.status)?;
        if self.status == IssueStatus::Resolved {
            self.resolved_at = Some(patch.at);
        }
        if patch.resolution_notes.is_some() {
            self.resolution_notes = patch.resolution_notes;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueFilter {
    pub status: Option<IssueStatus>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub limit: usize,
}

impl IssueFilter {
    pub fn matches(&self, issue: &Issue) -> bool {
        self.status.map_or(true, |s| issue.status == s)
            && self.category.map_or(true, |c| issue.category == c)
            && self.priority.map_or(true, |p| issue.priority == p)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub term: String,
    pub filter: IssueFilter,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub maintenance: u64,
    pub safety: u64,
    pub food: u64,
    pub cleaning: u64,
    pub others: u64,
}

impl CategoryBreakdown {
    pub fn bump(&mut self, category: Category) {
        let slot = match category {
            Category::Maintenance => &mut self.maintenance,
            Category::Safety => &mut self.safety,
            Category::Food => &mut self.food,
            Category::Cleaning => &mut self.cleaning,
            Category::Others => &mut self.others,
        };
        *slot += 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorityBreakdown {
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

impl PriorityBreakdown {
    pub fn bump(&mut self, priority: Priority) {
        let slot = match priority {
            Priority::High => &mut self.high,
            Priority::Medium => &mut self.medium,
            Priority::Low => &mut self.low,
        };
        *slot += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationHotspot {
    pub block: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRollup {
    pub date: NaiveDate,
    pub total_issues: u64,
    pub resolved_issues: u64,
    pub avg_resolution_time: f64,
    pub category_breakdown: CategoryBreakdown,
    pub priority_breakdown: PriorityBreakdown,
    pub location_hotspots: Vec<LocationHotspot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub role: UserRole,
    pub name: String,
    pub email: String,
    pub hostel_block: Option<String>,
    pub room_number: Option<String>,
    pub department: Option<String>,
    pub is_active: bool,
}
