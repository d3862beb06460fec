use super::{IssueStore, StoreError, StoreResult, SEARCH_LIMIT};
use crate::domain::models::{
    Comment, DailyRollup, Issue, IssueFilter, NewIssue, SearchQuery, StatusPatch, UserProfile,
    UserRole,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    // insertion order == creation order
    issues: Vec<Issue>,
    rollups: BTreeMap<NaiveDate, DailyRollup>,
    profiles: HashMap<Uuid, UserProfile>,
}

/// Process-local store for tests and database-less runs.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn rollup_count(&self) -> usize {
        self.tables.read().await.rollups.len()
    }
}

fn search_matches(term: &str, issue: &Issue) -> bool {
    let haystack = issue.description.to_lowercase();
    term.to_lowercase()
        .split_whitespace()
        .all(|word| haystack.contains(word))
}

#[async_trait]
impl IssueStore for MemoryStore {
    async fn all_issues(&self) -> StoreResult<Vec<Issue>> {
        Ok(self.tables.read().await.issues.clone())
    }

    async fn list_issues(&self, filter: &IssueFilter) -> StoreResult<Vec<Issue>> {
        let tables = self.tables.read().await;
        Ok(tables
            .issues
            .iter()
            .rev()
            .filter(|i| filter.matches(i))
            .take(filter.limit)
            .cloned()
            .collect())
    }

    async fn issues_by_reporter(&self, reporter_id: Uuid) -> StoreResult<Vec<Issue>> {
        let tables = self.tables.read().await;
        Ok(tables
            .issues
            .iter()
            .rev()
            .filter(|i| i.reporter.reporter_id() == Some(reporter_id))
            .cloned()
            .collect())
    }

    async fn search_issues(&self, query: &SearchQuery) -> StoreResult<Vec<Issue>> {
        let tables = self.tables.read().await;
        Ok(tables
            .issues
            .iter()
            .rev()
            .filter(|i| query.filter.matches(i) && search_matches(&query.term, i))
            .take(SEARCH_LIMIT)
            .cloned()
            .collect())
    }

    async fn get_issue(&self, id: Uuid) -> StoreResult<Option<Issue>> {
        let tables = self.tables.read().await;
        Ok(tables.issues.iter().find(|i| i.id == id).cloned())
    }

    async fn insert_issue(&self, issue: NewIssue) -> StoreResult<Issue> {
        let stored = Issue::from_new(Uuid::new_v4(), Utc::now(), issue);
        self.tables.write().await.issues.push(stored.clone());
        Ok(stored)
    }

    async fn update_status(&self, id: Uuid, patch: StatusPatch) -> StoreResult<Issue> {
        let mut tables = self.tables.write().await;
        let issue = tables
            .issues
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(StoreError::NotFound)?;
        issue.apply_status(patch)?;
        Ok(issue.clone())
    }

    async fn append_comment(&self, id: Uuid, comment: Comment) -> StoreResult<Issue> {
        let mut tables = self.tables.write().await;
        let issue = tables
            .issues
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(StoreError::NotFound)?;
        issue.comments.push(comment);
        Ok(issue.clone())
    }

    async fn get_rollup(&self, date: NaiveDate) -> StoreResult<Option<DailyRollup>> {
        Ok(self.tables.read().await.rollups.get(&date).cloned())
    }

    async fn upsert_rollup(&self, rollup: &DailyRollup) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .rollups
            .insert(rollup.date, rollup.clone());
        Ok(())
    }

    async fn list_rollups(&self, from: NaiveDate, to: NaiveDate) -> StoreResult<Vec<DailyRollup>> {
        if from > to {
            return Ok(Vec::new());
        }
        let tables = self.tables.read().await;
        Ok(tables.rollups.range(from..=to).map(|(_, r)| r.clone()).collect())
    }

    async fn get_profile(&self, user_id: Uuid) -> StoreResult<Option<UserProfile>> {
        Ok(self.tables.read().await.profiles.get(&user_id).cloned())
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> StoreResult<UserProfile> {
        self.tables
            .write()
            .await
            .profiles
            .insert(profile.user_id, profile.clone());
        Ok(profile.clone())
    }

    async fn profiles_by_role(&self, role: UserRole) -> StoreResult<Vec<UserProfile>> {
        let tables = self.tables.read().await;
        let mut out: Vec<UserProfile> = tables
            .profiles
            .values()
            .filter(|p| p.role == role)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Category, IssueStatus, Location, Reporter};
    use crate::services::classifier::classify;

    fn new_issue(title: &str, description: &str, category: Category) -> NewIssue {
        NewIssue {
            title: title.to_string(),
            description: description.to_string(),
            category,
            analysis: classify(title, description, category),
            location: Location {
                block: "B".to_string(),
                floor: Some("2".to_string()),
                room: None,
            },
            reporter: Reporter::Anonymous {
                display_name: "Anonymous".to_string(),
            },
            attachments: vec![],
        }
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_filtered() {
        let store = MemoryStore::new();
        store
            .insert_issue(new_issue("Cold showers", "no hot water", Category::Maintenance))
            .await
            .unwrap();
        store
            .insert_issue(new_issue("Dusty hall", "needs sweeping", Category::Cleaning))
            .await
            .unwrap();
        let last = store
            .insert_issue(new_issue("Stale bread", "at breakfast", Category::Food))
            .await
            .unwrap();

        let all = store
            .list_issues(&IssueFilter {
                limit: 50,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, last.id);

        let cleaning = store
            .list_issues(&IssueFilter {
                category: Some(Category::Cleaning),
                limit: 50,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(cleaning.len(), 1);
        assert_eq!(cleaning[0].title, "Dusty hall");

        let limited = store
            .list_issues(&IssueFilter {
                limit: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_update_status_rejects_after_resolution() {
        let store = MemoryStore::new();
        let issue = store
            .insert_issue(new_issue("Broken lock", "door 12", Category::Safety))
            .await
            .unwrap();
        let at = Utc::now();
        let resolved = store
            .update_status(
                issue.id,
                StatusPatch {
                    status: IssueStatus::Resolved,
                    resolution_notes: Some("Lock replaced".to_string()),
                    at,
                },
            )
            .await
            .unwrap();
        assert_eq!(resolved.resolved_at, Some(at));

        let again = store
            .update_status(
                issue.id,
                StatusPatch {
                    status: IssueStatus::InProgress,
                    resolution_notes: None,
                    at,
                },
            )
            .await;
        assert!(matches!(again, Err(StoreError::Conflict(_))));

        let missing = store
            .update_status(
                Uuid::new_v4(),
                StatusPatch {
                    status: IssueStatus::Resolved,
                    resolution_notes: None,
                    at,
                },
            )
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_search_matches_description_terms() {
        let store = MemoryStore::new();
        store
            .insert_issue(new_issue("Water", "Hot water heater broken", Category::Maintenance))
            .await
            .unwrap();
        store
            .insert_issue(new_issue("Food", "Rice was cold", Category::Food))
            .await
            .unwrap();

        let hits = store
            .search_issues(&SearchQuery {
                term: "water HEATER".to_string(),
                filter: IssueFilter::default(),
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Water");

        let filtered = store
            .search_issues(&SearchQuery {
                term: "cold".to_string(),
                filter: IssueFilter {
                    category: Some(Category::Maintenance),
                    ..Default::default()
                },
            })
            .await
            .unwrap();
        assert!(filtered.is_empty());
    }

    #[tokio::test]
    async fn test_comments_append_in_order() {
        let store = MemoryStore::new();
        let issue = store
            .insert_issue(new_issue("Noise", "loud music", Category::Others))
            .await
            .unwrap();
        for text in ["first", "second"] {
            store
                .append_comment(
                    issue.id,
                    Comment {
                        author_id: Uuid::new_v4(),
                        author_name: "Warden".to_string(),
                        content: text.to_string(),
                        timestamp: Utc::now(),
                    },
                )
                .await
                .unwrap();
        }
        let stored = store.get_issue(issue.id).await.unwrap().unwrap();
        let contents: Vec<&str> = stored.comments.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }
}
