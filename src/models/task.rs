use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::borrow::Cow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub const MAX_TAGS: usize = 2;
pub const MAX_TAG_CHARS: usize = 30;

/// Where a task stands. Corresponds to the `task_progress` SQL enum.
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type,
)]
#[sqlx(type_name = "task_progress", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Progress {
    Pending,
    InProgress,
    Completed,
}

impl Default for Progress {
    fn default() -> Self {
        Progress::Pending
    }
}

/// Difficulty tier, easiest first. Corresponds to the `task_difficulty` SQL enum,
/// whose declaration order matches so sorting agrees between stores.
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type,
)]
#[sqlx(type_name = "task_difficulty")]
pub enum Difficulty {
    /// Very easy.
    E,
    /// Easy.
    D,
    /// Normal.
    C,
    /// Hard.
    B,
    /// Very hard.
    A,
    /// Nightmare.
    S,
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::E
    }
}

impl Difficulty {
    /// Experience awarded when a task of this tier is completed.
    pub fn exp_reward(self) -> u32 {
        match self {
            Difficulty::E => 500,
            Difficulty::D => 1000,
            Difficulty::C => 2000,
            Difficulty::B => 3000,
            Difficulty::A => 4500,
            Difficulty::S => 6000,
        }
    }
}

/// Experience earned by moving a task from `previous` to `next`.
///
/// Only the transition into `completed` pays out; re-completing an already
/// completed task earns nothing.
pub fn exp_for_transition(difficulty: Difficulty, previous: Progress, next: Progress) -> u32 {
    if previous != Progress::Completed && next == Progress::Completed {
        difficulty.exp_reward()
    } else {
        0
    }
}

fn validate_deadline(deadline: &DateTime<Utc>) -> Result<(), ValidationError> {
    if *deadline <= Utc::now() {
        let mut error = ValidationError::new("future");
        error.message = Some(Cow::from("deadline must be in the future"));
        return Err(error);
    }
    Ok(())
}

fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
    let bad_tag = tags
        .iter()
        .any(|tag| tag.trim().is_empty() || tag.chars().count() > MAX_TAG_CHARS);
    if bad_tag {
        let mut error = ValidationError::new("tag_length");
        error.message = Some(Cow::from(format!(
            "each tag must be between 1 and {} characters",
            MAX_TAG_CHARS
        )));
        return Err(error);
    }
    Ok(())
}

/// Input structure for creating or updating a task.
/// The same schema applies to both; updates replace every field.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    /// Between 3 and 100 characters.
    #[validate(length(min = 3, max = 100, message = "title must be between 3 and 100 characters"))]
    pub title: String,

    #[validate(length(max = 1000, message = "description must be at most 1000 characters"))]
    pub description: Option<String>,

    /// Defaults to `E` when omitted.
    pub difficulty: Option<Difficulty>,

    /// Defaults to `pending` when omitted.
    pub progress: Option<Progress>,

    /// Must lie strictly in the future when supplied.
    #[validate(custom = "validate_deadline")]
    pub deadline: Option<DateTime<Utc>>,

    #[serde(default)]
    #[validate(
        length(max = 2, message = "at most 2 tags are allowed"),
        custom = "validate_tags"
    )]
    pub tags: Vec<String>,
}

/// Validated task fields with defaults applied, ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFields {
    pub title: String,
    pub description: Option<String>,
    pub difficulty: Difficulty,
    pub progress: Progress,
    pub deadline: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

impl From<TaskInput> for TaskFields {
    fn from(input: TaskInput) -> Self {
        Self {
            title: input.title,
            description: input.description,
            difficulty: input.difficulty.unwrap_or_default(),
            progress: input.progress.unwrap_or_default(),
            deadline: input.deadline,
            tags: input.tags,
        }
    }
}

/// Body of `PUT /tasks/{id}/progress`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub progress: Progress,
}

/// Body of `PUT /tasks/{id}/difficulty`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifficultyUpdate {
    pub difficulty: Difficulty,
}

/// Represents a task entity as stored in the database and returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier for the task (UUID v4).
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub progress: Progress,
    pub difficulty: Difficulty,
    pub deadline: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    /// Set once at creation.
    pub created_at: DateTime<Utc>,
    /// Refreshed on every mutation.
    pub updated_at: DateTime<Utc>,
    /// Owner. Set once at creation from the authenticated identity.
    pub created_by: Uuid,
}

impl Task {
    /// Creates a new `Task` owned by `owner` from validated fields.
    pub fn new(fields: TaskFields, owner: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: fields.title,
            description: fields.description,
            progress: fields.progress,
            difficulty: fields.difficulty,
            deadline: fields.deadline,
            tags: fields.tags,
            created_at: now,
            updated_at: now,
            created_by: owner,
        }
    }

    /// Overwrites the mutable fields. `id`, `created_at` and `created_by` are kept.
    pub fn apply(&mut self, fields: TaskFields) {
        self.title = fields.title;
        self.description = fields.description;
        self.progress = fields.progress;
        self.difficulty = fields.difficulty;
        self.deadline = fields.deadline;
        self.tags = fields.tags;
        self.updated_at = Utc::now();
    }
}

/// Response of a progress change.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressOutcome {
    pub task: Task,
    pub exp_earned: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn input(title: &str) -> TaskInput {
        TaskInput {
            title: title.to_string(),
            description: Some("Two litres".to_string()),
            difficulty: Some(Difficulty::D),
            progress: None,
            deadline: Some(Utc::now() + Duration::days(1)),
            tags: vec!["home".to_string()],
        }
    }

    #[test]
    fn test_task_creation_applies_defaults() {
        let mut raw = input("Buy milk");
        raw.difficulty = None;
        let owner = Uuid::new_v4();
        let task = Task::new(raw.into(), owner);

        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.created_by, owner);
        assert_eq!(task.progress, Progress::Pending);
        assert_eq!(task.difficulty, Difficulty::E);
        assert_eq!(task.created_at, task.updated_at);
    }

    #[test]
    fn test_apply_keeps_identity_fields() {
        let owner = Uuid::new_v4();
        let mut task = Task::new(input("Buy milk").into(), owner);
        let (id, created_at) = (task.id, task.created_at);

        let mut changed = input("Buy oat milk");
        changed.progress = Some(Progress::InProgress);
        task.apply(changed.into());

        assert_eq!(task.id, id);
        assert_eq!(task.created_at, created_at);
        assert_eq!(task.created_by, owner);
        assert_eq!(task.title, "Buy oat milk");
        assert_eq!(task.progress, Progress::InProgress);
    }

    #[test]
    fn test_task_input_validation() {
        assert!(input("Buy milk").validate().is_ok());

        let cases: Vec<(TaskInput, &str)> = vec![
            (input("ab"), "title"),
            (input(&"a".repeat(101)), "title"),
            (
                TaskInput {
                    description: Some("b".repeat(1001)),
                    ..input("Buy milk")
                },
                "description",
            ),
            (
                TaskInput {
                    deadline: Some(Utc::now() - Duration::minutes(1)),
                    ..input("Buy milk")
                },
                "deadline",
            ),
            (
                TaskInput {
                    tags: vec!["a".into(), "b".into(), "c".into()],
                    ..input("Buy milk")
                },
                "tags",
            ),
            (
                TaskInput {
                    tags: vec!["x".repeat(MAX_TAG_CHARS + 1)],
                    ..input("Buy milk")
                },
                "tags",
            ),
            (
                TaskInput {
                    tags: vec!["  ".into()],
                    ..input("Buy milk")
                },
                "tags",
            ),
        ];

        for (candidate, field) in cases {
            let errors = candidate.validate().unwrap_err();
            assert!(
                errors.field_errors().contains_key(field),
                "expected an error on {}, got {:?}",
                field,
                errors
            );
        }
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::json!({
            "title": "Buy milk",
            "difficulty": "S",
            "progress": "in_progress"
        });
        let parsed: TaskInput = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.difficulty, Some(Difficulty::S));
        assert_eq!(parsed.progress, Some(Progress::InProgress));
        assert!(parsed.tags.is_empty());

        let bad = serde_json::json!({ "title": "Buy milk", "difficulty": "Z" });
        assert!(serde_json::from_value::<TaskInput>(bad).is_err());

        let task = Task::new(input("Buy milk").into(), Uuid::new_v4());
        let value = serde_json::to_value(&task).unwrap();
        assert!(value.get("createdBy").is_some());
        assert!(value.get("createdAt").is_some());
        assert_eq!(value["progress"], "pending");
    }

    #[test]
    fn test_exp_rewards() {
        assert_eq!(Difficulty::D.exp_reward(), 1000);
        assert_eq!(Difficulty::S.exp_reward(), 6000);
        assert!(Difficulty::E < Difficulty::S);

        assert_eq!(
            exp_for_transition(Difficulty::D, Progress::InProgress, Progress::Completed),
            1000
        );
        assert_eq!(
            exp_for_transition(Difficulty::D, Progress::Pending, Progress::InProgress),
            0
        );
        assert_eq!(
            exp_for_transition(Difficulty::S, Progress::Completed, Progress::Completed),
            0
        );
        assert_eq!(
            exp_for_transition(Difficulty::A, Progress::Completed, Progress::Pending),
            0
        );
    }
}
