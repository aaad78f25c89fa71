//! Persistence seams.
//!
//! Handlers reach users and tasks only through [`UserStore`] and [`TaskStore`].
//! Every task operation that addresses a single task takes the owner id along with
//! the task id, so a lookup for someone else's task behaves exactly like a lookup
//! for a task that does not exist.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    Difficulty, NewUser, PageRequest, Progress, Role, Task, TaskFields, TaskFilter, User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user. Fails with `Conflict` when the email is already taken.
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Oldest accounts first.
    async fn list_users(&self, limit: i64) -> Result<Vec<User>, AppError>;

    /// Returns the updated user, or `None` when no user has that id.
    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<User>, AppError>;

    async fn admin_exists(&self) -> Result<bool, AppError>;

    /// Inserts `user` as an admin only while no admin exists, as one atomic step.
    /// Returns `None` when an admin is already present.
    async fn insert_first_admin(&self, user: NewUser) -> Result<Option<User>, AppError>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn count_tasks(&self, filter: &TaskFilter) -> Result<u64, AppError>;

    /// Tasks matching `filter`, ordered by the requested field with ties broken by
    /// id ascending. Tasks without a deadline sort last in both directions.
    async fn find_tasks(
        &self,
        filter: &TaskFilter,
        page: &PageRequest,
    ) -> Result<Vec<Task>, AppError>;

    async fn insert_task(&self, task: Task) -> Result<Task, AppError>;

    async fn find_task(&self, id: Uuid, owner: Uuid) -> Result<Option<Task>, AppError>;

    async fn update_task(
        &self,
        id: Uuid,
        owner: Uuid,
        fields: TaskFields,
    ) -> Result<Option<Task>, AppError>;

    async fn set_progress(
        &self,
        id: Uuid,
        owner: Uuid,
        progress: Progress,
    ) -> Result<Option<Task>, AppError>;

    async fn set_difficulty(
        &self,
        id: Uuid,
        owner: Uuid,
        difficulty: Difficulty,
    ) -> Result<Option<Task>, AppError>;

    /// Removes the task and returns its last state.
    async fn delete_task(&self, id: Uuid, owner: Uuid) -> Result<Option<Task>, AppError>;
}
