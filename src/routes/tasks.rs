use crate::{
    auth::AuthenticatedUser,
    error::AppError,
    models::{
        exp_for_transition, DifficultyUpdate, Paginated, Pagination, ProgressOutcome,
        ProgressUpdate, Task, TaskFields, TaskInput, TaskQuery,
    },
    state::AppState,
};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

fn task_not_found() -> AppError {
    AppError::NotFound("Task not found".into())
}

/// Retrieves a page of the authenticated user's tasks.
///
/// ## Query Parameters:
/// - `page`, `limit` (optional): positive integers, defaults 1 and 10, `limit` at most 100.
/// - `sortBy` (optional): `createdAt` (default), `updatedAt`, `title`, `deadline`,
///   `difficulty` or `progress`.
/// - `sortOrder` (optional): `asc` or `desc` (default).
/// - `progress`, `difficulty` (optional): exact match. `priority` is accepted for `difficulty`.
/// - `deadline` (optional): RFC 3339 instant; keeps tasks due at or before it.
///
/// ## Responses:
/// - `200 OK`: `{data, pagination}`. A page past the end has empty `data`.
/// - `400 Bad Request`: a parameter is invalid; the body names it.
/// - `401 Unauthorized` / `403 Forbidden`: token problems.
#[get("")]
pub async fn get_tasks(
    state: web::Data<AppState>,
    query_params: web::Query<TaskQuery>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let params = query_params.into_inner().into_params(identity.user_id)?;

    let total_tasks = state.tasks.count_tasks(&params.filter).await?;
    let pagination = Pagination::new(total_tasks, params.page, params.limit);

    // Count and fetch are separate reads; a concurrent write can skew them slightly.
    let offset_past_end =
        u64::try_from(params.page_request.offset).map_or(true, |offset| offset >= total_tasks);
    let data = if offset_past_end {
        Vec::new()
    } else {
        state
            .tasks
            .find_tasks(&params.filter, &params.page_request)
            .await?
    };

    Ok(HttpResponse::Ok().json(Paginated { data, pagination }))
}

/// Creates a new task owned by the authenticated user.
///
/// ## Responses:
/// - `201 Created`: the stored task.
/// - `400 Bad Request`: the body is not valid JSON for a task.
/// - `422 Unprocessable Entity`: field validation failed.
#[post("")]
pub async fn create_task(
    state: web::Data<AppState>,
    task_data: web::Json<TaskInput>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;

    let task = Task::new(TaskFields::from(task_data.into_inner()), identity.user_id);
    let task = state.tasks.insert_task(task).await?;
    log::debug!("User {} created task {}", identity.user_id, task.id);

    Ok(HttpResponse::Created().json(task))
}

/// Retrieves one of the authenticated user's tasks.
///
/// Someone else's task is reported as `404 Not Found`, the same as a missing one.
#[get("/{id}")]
pub async fn get_task(
    state: web::Data<AppState>,
    task_id: web::Path<Uuid>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let task = state
        .tasks
        .find_task(task_id.into_inner(), identity.user_id)
        .await?
        .ok_or_else(task_not_found)?;

    Ok(HttpResponse::Ok().json(task))
}

/// Replaces every mutable field of a task. Omitted optional fields take their defaults.
#[put("/{id}")]
pub async fn update_task(
    state: web::Data<AppState>,
    task_id: web::Path<Uuid>,
    task_data: web::Json<TaskInput>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;

    let task = state
        .tasks
        .update_task(
            task_id.into_inner(),
            identity.user_id,
            TaskFields::from(task_data.into_inner()),
        )
        .await?
        .ok_or_else(task_not_found)?;

    Ok(HttpResponse::Ok().json(task))
}

/// Moves a task to a new progress state and reports the experience earned.
///
/// Only the move into `completed` pays out, by difficulty.
#[put("/{id}/progress")]
pub async fn update_progress(
    state: web::Data<AppState>,
    task_id: web::Path<Uuid>,
    update: web::Json<ProgressUpdate>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let task_id = task_id.into_inner();
    let next = update.into_inner().progress;

    let previous = state
        .tasks
        .find_task(task_id, identity.user_id)
        .await?
        .ok_or_else(task_not_found)?;
    let task = state
        .tasks
        .set_progress(task_id, identity.user_id, next)
        .await?
        .ok_or_else(task_not_found)?;

    let exp_earned = exp_for_transition(task.difficulty, previous.progress, next);
    if exp_earned > 0 {
        log::info!(
            "User {} completed task {} for {} exp",
            identity.user_id,
            task.id,
            exp_earned
        );
    }

    Ok(HttpResponse::Ok().json(ProgressOutcome { task, exp_earned }))
}

/// Changes only the difficulty of a task.
#[put("/{id}/difficulty")]
pub async fn update_difficulty(
    state: web::Data<AppState>,
    task_id: web::Path<Uuid>,
    update: web::Json<DifficultyUpdate>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let task = state
        .tasks
        .set_difficulty(
            task_id.into_inner(),
            identity.user_id,
            update.into_inner().difficulty,
        )
        .await?
        .ok_or_else(task_not_found)?;

    Ok(HttpResponse::Ok().json(task))
}

/// Deletes a task and echoes its last state.
#[delete("/{id}")]
pub async fn delete_task(
    state: web::Data<AppState>,
    task_id: web::Path<Uuid>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let task = state
        .tasks
        .delete_task(task_id.into_inner(), identity.user_id)
        .await?
        .ok_or_else(task_not_found)?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Task deleted",
        "task": task,
    })))
}
