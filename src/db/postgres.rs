use super::{IssueStore, StoreError, StoreResult, SEARCH_LIMIT};
use crate::domain::models::{
    Category, CategoryBreakdown, Comment, DailyRollup, Issue, IssueFilter, IssueStatus,
    Location, LocationHotspot, NewIssue, Priority, PriorityBreakdown, Reporter, SearchQuery,
    StatusPatch, UserProfile, UserRole,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

const ISSUE_COLUMNS: &str = r#"
    id,
    created_at,
    title,
    description,
    category,
    priority,
    summary,
    recommendations,
    sentiment_score,
    status,
    resolved_at,
    resolution_notes,
    location_block,
    location_floor,
    location_room,
    reporter_id,
    reporter_name,
    is_anonymous,
    attachments
"#;

#[derive(Debug, FromRow)]
struct IssueRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    title: String,
    description: String,
    category: Category,
    priority: Priority,
    summary: String,
    recommendations: Vec<String>,
    sentiment_score: f64,
    status: IssueStatus,
    resolved_at: Option<DateTime<Utc>>,
    resolution_notes: Option<String>,
    location_block: String,
    location_floor: Option<String>,
    location_room: Option<String>,
    reporter_id: Option<Uuid>,
    reporter_name: Option<String>,
    is_anonymous: bool,
    attachments: Vec<String>,
}

impl IssueRow {
    fn into_issue(self, comments: Vec<Comment>) -> StoreResult<Issue> {
        // the table CHECK constraint keeps exactly one of these populated
        let reporter = match (self.is_anonymous, self.reporter_id, self.reporter_name) {
            (false, Some(reporter_id), _) => Reporter::Identified { reporter_id },
            (true, _, Some(display_name)) => Reporter::Anonymous { display_name },
            _ => {
                return Err(StoreError::Conflict(format!(
                    "issue {} has inconsistent reporter columns",
                    self.id
                )))
            }
        };

        Ok(Issue {
            id: self.id,
            created_at: self.created_at,
            title: self.title,
            description: self.description,
            category: self.category,
            priority: self.priority,
            summary: self.summary,
            recommendations: self.recommendations,
            sentiment_score: self.sentiment_score,
            status: self.status,
            resolved_at: self.resolved_at,
            resolution_notes: self.resolution_notes,
            location: Location {
                block: self.location_block,
                floor: self.location_floor,
                room: self.location_room,
            },
            reporter,
            attachments: self.attachments,
            comments,
        })
    }
}

#[derive(Debug, FromRow)]
struct CommentRow {
    issue_id: Uuid,
    author_id: Uuid,
    author_name: String,
    content: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct RollupRow {
    date: NaiveDate,
    total_issues: i64,
    resolved_issues: i64,
    avg_resolution_time: f64,
    category_breakdown: Json<CategoryBreakdown>,
    priority_breakdown: Json<PriorityBreakdown>,
    location_hotspots: Json<Vec<LocationHotspot>>,
}

impl From<RollupRow> for DailyRollup {
    fn from(row: RollupRow) -> Self {
        DailyRollup {
            date: row.date,
            total_issues: row.total_issues.max(0) as u64,
            resolved_issues: row.resolved_issues.max(0) as u64,
            avg_resolution_time: row.avg_resolution_time,
            category_breakdown: row.category_breakdown.0,
            priority_breakdown: row.priority_breakdown.0,
            location_hotspots: row.location_hotspots.0,
        }
    }
}

#[derive(Debug, FromRow)]
struct ProfileRow {
    user_id: Uuid,
    role: UserRole,
    name: String,
    email: String,
    hostel_block: Option<String>,
    room_number: Option<String>,
    department: Option<String>,
    is_active: bool,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        UserProfile {
            user_id: row.user_id,
            role: row.role,
            name: row.name,
            email: row.email,
            hostel_block: row.hostel_block,
            room_number: row.room_number,
            department: row.department,
            is_active: row.is_active,
        }
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn comments_for(&self, ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<Comment>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT issue_id, author_id, author_name, content, created_at
            FROM issue_comments
            WHERE issue_id = ANY($1)
            ORDER BY seq ASC
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<Comment>> = HashMap::new();
        for row in rows {
            grouped.entry(row.issue_id).or_default().push(Comment {
                author_id: row.author_id,
                author_name: row.author_name,
                content: row.content,
                timestamp: row.created_at,
            });
        }
        Ok(grouped)
    }

    async fn hydrate(&self, rows: Vec<IssueRow>) -> StoreResult<Vec<Issue>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut comments = self.comments_for(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let thread = comments.remove(&row.id).unwrap_or_default();
                row.into_issue(thread)
            })
            .collect()
    }

    async fn fetch_one(&self, id: Uuid) -> StoreResult<Option<Issue>> {
        let row = sqlx::query_as::<_, IssueRow>(&format!(
            "SELECT {ISSUE_COLUMNS} FROM issues WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl IssueStore for PgStore {
    async fn all_issues(&self) -> StoreResult<Vec<Issue>> {
        // aggregation never reads comments, so skip the second query
        let rows = sqlx::query_as::<_, IssueRow>(&format!(
            "SELECT {ISSUE_COLUMNS} FROM issues ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(|r| r.into_issue(Vec::new())).collect()
    }

    async fn list_issues(&self, filter: &IssueFilter) -> StoreResult<Vec<Issue>> {
        let rows = sqlx::query_as::<_, IssueRow>(&format!(
            r#"
            SELECT {ISSUE_COLUMNS}
            FROM issues
            WHERE ($1::issue_status IS NULL OR status = $1)
              AND ($2::issue_category IS NULL OR category = $2)
              AND ($3::issue_priority IS NULL OR priority = $3)
            ORDER BY created_at DESC
            LIMIT $4
            "#
        ))
        .bind(filter.status)
        .bind(filter.category)
        .bind(filter.priority)
        .bind(filter.limit as i64)
        .fetch_all(&self.pool)
        .await?;
        self.hydrate(rows).await
    }

    async fn issues_by_reporter(&self, reporter_id: Uuid) -> StoreResult<Vec<Issue>> {
        let rows = sqlx::query_as::<_, IssueRow>(&format!(
            "SELECT {ISSUE_COLUMNS} FROM issues WHERE reporter_id = $1 ORDER BY created_at DESC"
        ))
        .bind(reporter_id)
        .fetch_all(&self.pool)
        .await?;
        self.hydrate(rows).await
    }

    async fn search_issues(&self, query: &SearchQuery) -> StoreResult<Vec<Issue>> {
        let rows = sqlx::query_as::<_, IssueRow>(&format!(
            r#"
            SELECT {ISSUE_COLUMNS}
            FROM issues
            WHERE to_tsvector('english', description) @@ plainto_tsquery('english', $1)
              AND ($2::issue_status IS NULL OR status = $2)
              AND ($3::issue_category IS NULL OR category = $3)
              AND ($4::issue_priority IS NULL OR priority = $4)
            ORDER BY ts_rank(to_tsvector('english', description), plainto_tsquery('english', $1)) DESC,
                     created_at DESC
            LIMIT $5
            "#
        ))
        .bind(&query.term)
        .bind(query.filter.status)
        .bind(query.filter.category)
        .bind(query.filter.priority)
        .bind(SEARCH_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;
        self.hydrate(rows).await
    }

    async fn get_issue(&self, id: Uuid) -> StoreResult<Option<Issue>> {
        self.fetch_one(id).await
    }

    async fn insert_issue(&self, issue: NewIssue) -> StoreResult<Issue> {
        let (reporter_id, reporter_name, is_anonymous) = match &issue.reporter {
            Reporter::Identified { reporter_id } => (Some(*reporter_id), None, false),
            Reporter::Anonymous { display_name } => (None, Some(display_name.clone()), true),
        };

        let row = sqlx::query_as::<_, IssueRow>(&format!(
            r#"
            INSERT INTO issues (
                id, title, description, category, priority, summary, recommendations,
                sentiment_score, status, location_block, location_floor, location_room,
                reporter_id, reporter_name, is_anonymous, attachments
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'open', $9, $10, $11, $12, $13, $14, $15)
            RETURNING {ISSUE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&issue.title)
        .bind(&issue.description)
        .bind(issue.category)
        .bind(issue.analysis.priority)
        .bind(&issue.analysis.summary)
        .bind(&issue.analysis.recommendations)
        .bind(issue.analysis.sentiment_score)
        .bind(&issue.location.block)
        .bind(&issue.location.floor)
        .bind(&issue.location.room)
        .bind(reporter_id)
        .bind(reporter_name)
        .bind(is_anonymous)
        .bind(&issue.attachments)
        .fetch_one(&self.pool)
        .await?;

        row.into_issue(Vec::new())
    }

    async fn update_status(&self, id: Uuid, patch: StatusPatch) -> StoreResult<Issue> {
        let mut tx = self.pool.begin().await?;

        let current: Option<IssueStatus> =
            sqlx::query_scalar("SELECT status FROM issues WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let current = current.ok_or(StoreError::NotFound)?;
        let next = current.transition_to(patch.status)?;
        let resolved_at = (next == IssueStatus::Resolved).then_some(patch.at);

        sqlx::query(
            r#"
            UPDATE issues
            SET status = $2,
                resolved_at = $3,
                resolution_notes = COALESCE($4, resolution_notes)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(next)
        .bind(resolved_at)
        .bind(&patch.resolution_notes)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.fetch_one(id).await?.ok_or(StoreError::NotFound)
    }

    async fn append_comment(&self, id: Uuid, comment: Comment) -> StoreResult<Issue> {
        let result = sqlx::query(
            r#"
            INSERT INTO issue_comments (issue_id, author_id, author_name, content, created_at)
            SELECT id, $2, $3, $4, $5 FROM issues WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(comment.author_id)
        .bind(&comment.author_name)
        .bind(&comment.content)
        .bind(comment.timestamp)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        self.fetch_one(id).await?.ok_or(StoreError::NotFound)
    }

    async fn get_rollup(&self, date: NaiveDate) -> StoreResult<Option<DailyRollup>> {
        let row = sqlx::query_as::<_, RollupRow>(
            r#"
            SELECT date, total_issues, resolved_issues, avg_resolution_time,
                   category_breakdown, priority_breakdown, location_hotspots
            FROM daily_rollups
            WHERE date = $1
            "#,
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(DailyRollup::from))
    }

    async fn upsert_rollup(&self, rollup: &DailyRollup) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO daily_rollups (
                date, total_issues, resolved_issues, avg_resolution_time,
                category_breakdown, priority_breakdown, location_hotspots, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            ON CONFLICT (date) DO UPDATE SET
                total_issues = EXCLUDED.total_issues,
                resolved_issues = EXCLUDED.resolved_issues,
                avg_resolution_time = EXCLUDED.avg_resolution_time,
                category_breakdown = EXCLUDED.category_breakdown,
                priority_breakdown = EXCLUDED.priority_breakdown,
                location_hotspots = EXCLUDED.location_hotspots,
                updated_at = NOW()
            "#,
        )
        .bind(rollup.date)
        .bind(rollup.total_issues as i64)
        .bind(rollup.resolved_issues as i64)
        .bind(rollup.avg_resolution_time)
        .bind(Json(&rollup.category_breakdown))
        .bind(Json(&rollup.priority_breakdown))
        .bind(Json(&rollup.location_hotspots))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_rollups(&self, from: NaiveDate, to: NaiveDate) -> StoreResult<Vec<DailyRollup>> {
        let rows = sqlx::query_as::<_, RollupRow>(
            r#"
            SELECT date, total_issues, resolved_issues, avg_resolution_time,
                   category_breakdown, priority_breakdown, location_hotspots
            FROM daily_rollups
            WHERE date BETWEEN $1 AND $2
            ORDER BY date ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(DailyRollup::from).collect())
    }

    async fn get_profile(&self, user_id: Uuid) -> StoreResult<Option<UserProfile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT user_id, role, name, email, hostel_block, room_number, department, is_active
            FROM user_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserProfile::from))
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> StoreResult<UserProfile> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            INSERT INTO user_profiles (
                user_id, role, name, email, hostel_block, room_number, department, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id) DO UPDATE SET
                role = EXCLUDED.role,
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                hostel_block = EXCLUDED.hostel_block,
                room_number = EXCLUDED.room_number,
                department = EXCLUDED.department,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            RETURNING user_id, role, name, email, hostel_block, room_number, department, is_active
            "#,
        )
        .bind(profile.user_id)
        .bind(profile.role)
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(&profile.hostel_block)
        .bind(&profile.room_number)
        .bind(&profile.department)
        .bind(profile.is_active)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn profiles_by_role(&self, role: UserRole) -> StoreResult<Vec<UserProfile>> {
        let rows = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT user_id, role, name, email, hostel_block, room_number, department, is_active
            FROM user_profiles
            WHERE role = $1
            ORDER BY name ASC
            "#,
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(UserProfile::from).collect())
    }
}
