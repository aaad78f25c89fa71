use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    Difficulty, NewUser, PageRequest, Progress, Role, Task, TaskFields, TaskFilter, User,
};
use crate::store::{TaskStore, UserStore};

const TASK_COLUMNS: &str = "id, title, description, progress, difficulty, deadline, tags, \
                            created_at, updated_at, created_by";
const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at";
const BOOTSTRAP_LOCK_KEY: i64 = 0x7461_736b_6c76;

/// PostgreSQL-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects and brings the schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Migration failed: {}", e)))?;
        log::info!("Database migrations applied");

        Ok(Self::new(pool))
    }
}

// Appends `WHERE created_by = $n AND ...` for the filter.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &TaskFilter) {
    builder.push(" WHERE created_by = ");
    builder.push_bind(filter.owner);
    if let Some(progress) = filter.progress {
        builder.push(" AND progress = ");
        builder.push_bind(progress);
    }
    if let Some(difficulty) = filter.difficulty {
        builder.push(" AND difficulty = ");
        builder.push_bind(difficulty);
    }
    if let Some(deadline) = filter.deadline_before {
        builder.push(" AND deadline <= ");
        builder.push_bind(deadline);
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        let user = User::from_new(user);
        let sql = format!(
            "INSERT INTO users ({cols}) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {cols}",
            cols = USER_COLUMNS
        );
        let inserted = sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role)
            .bind(user.created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(inserted)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_users(&self, limit: i64) -> Result<Vec<User>, AppError> {
        let sql = format!(
            "SELECT {} FROM users ORDER BY created_at ASC, id ASC LIMIT $1",
            USER_COLUMNS
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<User>, AppError> {
        let sql = format!(
            "UPDATE users SET role = $1 WHERE id = $2 RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(role)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn insert_first_admin(&self, user: NewUser) -> Result<Option<User>, AppError> {
        let user = User::from_new(NewUser {
            role: Role::Admin,
            ..user
        });
        let mut tx = self.pool.begin().await?;
        // Serialises concurrent bootstraps until commit.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(BOOTSTRAP_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        let sql = format!(
            "INSERT INTO users ({cols}) \
             SELECT $1, $2, $3, $4, $5, $6 \
             WHERE NOT EXISTS (SELECT 1 FROM users WHERE role = $5) \
             RETURNING {cols}",
            cols = USER_COLUMNS
        );
        let inserted = sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role)
            .bind(user.created_at)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn admin_exists(&self) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE role = $1)")
                .bind(Role::Admin)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn count_tasks(&self, filter: &TaskFilter) -> Result<u64, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tasks");
        push_filter(&mut builder, filter);
        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn find_tasks(
        &self,
        filter: &TaskFilter,
        page: &PageRequest,
    ) -> Result<Vec<Task>, AppError> {
        let mut builder =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM tasks", TASK_COLUMNS));
        push_filter(&mut builder, filter);
        // Column and keyword come from closed enums, never from request text.
        builder.push(format!(
            " ORDER BY {} {} NULLS LAST, id ASC",
            page.sort_field.column(),
            page.sort_order.keyword()
        ));
        builder.push(" LIMIT ");
        builder.push_bind(page.limit);
        builder.push(" OFFSET ");
        builder.push_bind(page.offset);

        let tasks = builder
            .build_query_as::<Task>()
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }

    async fn insert_task(&self, task: Task) -> Result<Task, AppError> {
        let sql = format!(
            "INSERT INTO tasks ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {cols}",
            cols = TASK_COLUMNS
        );
        let inserted = sqlx::query_as::<_, Task>(&sql)
            .bind(task.id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.progress)
            .bind(task.difficulty)
            .bind(task.deadline)
            .bind(&task.tags)
            .bind(task.created_at)
            .bind(task.updated_at)
            .bind(task.created_by)
            .fetch_one(&self.pool)
            .await?;
        Ok(inserted)
    }

    async fn find_task(&self, id: Uuid, owner: Uuid) -> Result<Option<Task>, AppError> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE id = $1 AND created_by = $2",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn update_task(
        &self,
        id: Uuid,
        owner: Uuid,
        fields: TaskFields,
    ) -> Result<Option<Task>, AppError> {
        let sql = format!(
            "UPDATE tasks \
             SET title = $1, description = $2, progress = $3, difficulty = $4, deadline = $5, \
                 tags = $6, updated_at = $7 \
             WHERE id = $8 AND created_by = $9 \
             RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(&fields.title)
            .bind(&fields.description)
            .bind(fields.progress)
            .bind(fields.difficulty)
            .bind(fields.deadline)
            .bind(&fields.tags)
            .bind(Utc::now())
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn set_progress(
        &self,
        id: Uuid,
        owner: Uuid,
        progress: Progress,
    ) -> Result<Option<Task>, AppError> {
        let sql = format!(
            "UPDATE tasks SET progress = $1, updated_at = $2 \
             WHERE id = $3 AND created_by = $4 RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(progress)
            .bind(Utc::now())
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn set_difficulty(
        &self,
        id: Uuid,
        owner: Uuid,
        difficulty: Difficulty,
    ) -> Result<Option<Task>, AppError> {
        let sql = format!(
            "UPDATE tasks SET difficulty = $1, updated_at = $2 \
             WHERE id = $3 AND created_by = $4 RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(difficulty)
            .bind(Utc::now())
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn delete_task(&self, id: Uuid, owner: Uuid) -> Result<Option<Task>, AppError> {
        let sql = format!(
            "DELETE FROM tasks WHERE id = $1 AND created_by = $2 RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }
}
