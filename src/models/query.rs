//! Task listing parameters: parsing and validation of the raw query string, the
//! store-facing filter/sort description, and the paginated response shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::task::{Difficulty, Progress};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

/// Raw query parameters of `GET /tasks`. Everything arrives as text so that a bad
/// value can be reported against its field instead of failing extraction.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub progress: Option<String>,
    #[serde(alias = "priority")]
    pub difficulty: Option<String>,
    pub deadline: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    Deadline,
    Difficulty,
    Progress,
}

impl SortField {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "createdAt" => Some(SortField::CreatedAt),
            "updatedAt" => Some(SortField::UpdatedAt),
            "title" => Some(SortField::Title),
            "deadline" => Some(SortField::Deadline),
            "difficulty" => Some(SortField::Difficulty),
            "progress" => Some(SortField::Progress),
            _ => None,
        }
    }

    /// Column name in the `tasks` table.
    pub fn column(self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            // Byte order, matching the in-memory store whatever the database locale.
            SortField::Title => "title COLLATE \"C\"",
            SortField::Deadline => "deadline",
            SortField::Difficulty => "difficulty",
            SortField::Progress => "progress",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// AND-combined task filter. `owner` is always present.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFilter {
    pub owner: Uuid,
    pub progress: Option<Progress>,
    pub difficulty: Option<Difficulty>,
    /// Inclusive upper bound; tasks without a deadline never match.
    pub deadline_before: Option<DateTime<Utc>>,
}

impl TaskFilter {
    pub fn owned_by(owner: Uuid) -> Self {
        Self {
            owner,
            progress: None,
            difficulty: None,
            deadline_before: None,
        }
    }
}

/// One page of a sorted listing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRequest {
    pub sort_field: SortField,
    pub sort_order: SortOrder,
    pub offset: i64,
    pub limit: i64,
}

/// Validated listing parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    pub page: u64,
    pub limit: u64,
    pub filter: TaskFilter,
    pub page_request: PageRequest,
}

impl TaskQuery {
    /// Validates every parameter for `owner`. Fails on the first offending field,
    /// never clamps.
    pub fn into_params(self, owner: Uuid) -> Result<ListParams, AppError> {
        let page = parse_positive("page", self.page.as_deref(), DEFAULT_PAGE)?;
        let limit = parse_positive("limit", self.limit.as_deref(), DEFAULT_LIMIT)?;
        if limit > MAX_LIMIT {
            return Err(AppError::invalid_argument(
                "limit",
                format!("limit must be at most {}", MAX_LIMIT),
            ));
        }

        let sort_field = match self.sort_by.as_deref() {
            None => SortField::default(),
            Some(raw) => SortField::parse(raw).ok_or_else(|| {
                AppError::invalid_argument(
                    "sortBy",
                    "sortBy must be one of createdAt, updatedAt, title, deadline, difficulty, progress",
                )
            })?,
        };

        let sort_order = match self.sort_order.as_deref() {
            None => SortOrder::default(),
            Some("asc") => SortOrder::Asc,
            Some("desc") => SortOrder::Desc,
            Some(_) => {
                return Err(AppError::invalid_argument(
                    "sortOrder",
                    "sortOrder must be asc or desc",
                ))
            }
        };

        let progress = self
            .progress
            .as_deref()
            .map(|raw| parse_enum::<Progress>("progress", raw))
            .transpose()?;
        let difficulty = self
            .difficulty
            .as_deref()
            .map(|raw| parse_enum::<Difficulty>("difficulty", raw))
            .transpose()?;
        let deadline_before = self
            .deadline
            .as_deref()
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|d| d.with_timezone(&Utc))
                    .map_err(|_| {
                        AppError::invalid_argument("deadline", "deadline must be an RFC 3339 timestamp")
                    })
            })
            .transpose()?;

        let offset = (page - 1)
            .checked_mul(limit)
            .and_then(|offset| i64::try_from(offset).ok())
            .ok_or_else(|| AppError::invalid_argument("page", "page is out of range"))?;

        Ok(ListParams {
            page,
            limit,
            filter: TaskFilter {
                owner,
                progress,
                difficulty,
                deadline_before,
            },
            page_request: PageRequest {
                sort_field,
                sort_order,
                offset,
                // MAX_LIMIT fits.
                limit: limit as i64,
            },
        })
    }
}

fn parse_positive(field: &str, raw: Option<&str>, default: u64) -> Result<u64, AppError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(value) if value >= 1 => Ok(value),
        _ => Err(AppError::invalid_argument(
            field,
            format!("{} must be a positive integer", field),
        )),
    }
}

// Reuses the serde wire names so query values match body values.
fn parse_enum<T: for<'de> Deserialize<'de>>(field: &str, raw: &str) -> Result<T, AppError> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| AppError::invalid_argument(field, format!("unknown {} '{}'", field, raw)))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total_tasks: u64,
    pub total_pages: u64,
    pub current_page: u64,
    pub page_size: u64,
}

impl Pagination {
    pub fn new(total_tasks: u64, page: u64, limit: u64) -> Self {
        Self {
            total_tasks,
            total_pages: total_tasks.div_ceil(limit),
            current_page: page,
            page_size: limit,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}
