//! In-memory store.
//!
//! Backs the test suite and `DATABASE_URL=memory://` runs. Mirrors the Postgres
//! store's semantics: unique emails, owner-scoped task access, and the same
//! ordering rules for listings. Titles compare by bytes, which the Postgres
//! store matches with `COLLATE "C"`.

use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    Difficulty, NewUser, PageRequest, Progress, Role, SortField, SortOrder, Task, TaskFields,
    TaskFilter, User,
};
use crate::store::{TaskStore, UserStore};

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    tasks: RwLock<Vec<Task>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw view of every stored user, including password hashes.
    pub async fn users(&self) -> Vec<User> {
        self.users.read().await.clone()
    }

    /// Raw view of every stored task, regardless of owner.
    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.read().await.clone()
    }
}

fn filter_matches(task: &Task, filter: &TaskFilter) -> bool {
    task.created_by == filter.owner
        && filter.progress.map_or(true, |p| task.progress == p)
        && filter.difficulty.map_or(true, |d| task.difficulty == d)
        && filter
            .deadline_before
            .map_or(true, |limit| task.deadline.map_or(false, |d| d <= limit))
}

fn compare(a: &Task, b: &Task, field: SortField, order: SortOrder) -> Ordering {
    let directed = |ordering: Ordering| match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    };
    let primary = match field {
        SortField::CreatedAt => directed(a.created_at.cmp(&b.created_at)),
        SortField::UpdatedAt => directed(a.updated_at.cmp(&b.updated_at)),
        SortField::Title => directed(a.title.cmp(&b.title)),
        SortField::Difficulty => directed(a.difficulty.cmp(&b.difficulty)),
        SortField::Progress => directed(a.progress.cmp(&b.progress)),
        // Missing deadlines go last whatever the direction.
        SortField::Deadline => match (a.deadline, b.deadline) {
            (Some(x), Some(y)) => directed(x.cmp(&y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("Email already registered".into()));
        }
        let user = User::from_new(user);
        users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self, limit: i64) -> Result<Vec<User>, AppError> {
        let mut users = self.users.read().await.clone();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        users.truncate(limit.max(0) as usize);
        Ok(users)
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<User>, AppError> {
        let mut users = self.users.write().await;
        Ok(users.iter_mut().find(|u| u.id == id).map(|user| {
            user.role = role;
            user.clone()
        }))
    }

    async fn admin_exists(&self) -> Result<bool, AppError> {
        Ok(self.users.read().await.iter().any(User::is_admin))
    }

    async fn insert_first_admin(&self, user: NewUser) -> Result<Option<User>, AppError> {
        let mut users = self.users.write().await;
        if users.iter().any(User::is_admin) {
            return Ok(None);
        }
        if users.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("Email already registered".into()));
        }
        let user = User::from_new(NewUser {
            role: Role::Admin,
            ..user
        });
        users.push(user.clone());
        Ok(Some(user))
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn count_tasks(&self, filter: &TaskFilter) -> Result<u64, AppError> {
        let tasks = self.tasks.read().await;
        Ok(tasks.iter().filter(|t| filter_matches(t, filter)).count() as u64)
    }

    async fn find_tasks(
        &self,
        filter: &TaskFilter,
        page: &PageRequest,
    ) -> Result<Vec<Task>, AppError> {
        let tasks = self.tasks.read().await;
        let mut selected: Vec<Task> = tasks
            .iter()
            .filter(|t| filter_matches(t, filter))
            .cloned()
            .collect();
        selected.sort_by(|a, b| compare(a, b, page.sort_field, page.sort_order));
        Ok(selected
            .into_iter()
            .skip(page.offset.max(0) as usize)
            .take(page.limit.max(0) as usize)
            .collect())
    }

    async fn insert_task(&self, task: Task) -> Result<Task, AppError> {
        self.tasks.write().await.push(task.clone());
        Ok(task)
    }

    async fn find_task(&self, id: Uuid, owner: Uuid) -> Result<Option<Task>, AppError> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .iter()
            .find(|t| t.id == id && t.created_by == owner)
            .cloned())
    }

    async fn update_task(
        &self,
        id: Uuid,
        owner: Uuid,
        fields: TaskFields,
    ) -> Result<Option<Task>, AppError> {
        let mut tasks = self.tasks.write().await;
        Ok(tasks
            .iter_mut()
            .find(|t| t.id == id && t.created_by == owner)
            .map(|task| {
                task.apply(fields);
                task.clone()
            }))
    }

    async fn set_progress(
        &self,
        id: Uuid,
        owner: Uuid,
        progress: Progress,
    ) -> Result<Option<Task>, AppError> {
        let mut tasks = self.tasks.write().await;
        Ok(tasks
            .iter_mut()
            .find(|t| t.id == id && t.created_by == owner)
            .map(|task| {
                task.progress = progress;
                task.updated_at = Utc::now();
                task.clone()
            }))
    }

    async fn set_difficulty(
        &self,
        id: Uuid,
        owner: Uuid,
        difficulty: Difficulty,
    ) -> Result<Option<Task>, AppError> {
        let mut tasks = self.tasks.write().await;
        Ok(tasks
            .iter_mut()
            .find(|t| t.id == id && t.created_by == owner)
            .map(|task| {
                task.difficulty = difficulty;
                task.updated_at = Utc::now();
                task.clone()
            }))
    }

    async fn delete_task(&self, id: Uuid, owner: Uuid) -> Result<Option<Task>, AppError> {
        let mut tasks = self.tasks.write().await;
        let position = tasks
            .iter()
            .position(|t| t.id == id && t.created_by == owner);
        Ok(position.map(|index| tasks.remove(index)))
    }
}
