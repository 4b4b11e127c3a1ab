//! Work order types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::attachment::Attachments;

/// Work order lifecycle status.
///
/// Transitions are unrestricted here; the CRUD layer owns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    #[default]
    Draft,
    ConsultingVendors,
    ReadyForReview,
    QuoteApproved,
    Scheduled,
    WorkInProgress,
    Completed,
    Incomplete,
    Cancelled,
}

impl WorkOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkOrderStatus::Draft => "draft",
            WorkOrderStatus::ConsultingVendors => "consulting_vendors",
            WorkOrderStatus::ReadyForReview => "ready_for_review",
            WorkOrderStatus::QuoteApproved => "quote_approved",
            WorkOrderStatus::Scheduled => "scheduled",
            WorkOrderStatus::WorkInProgress => "work_in_progress",
            WorkOrderStatus::Completed => "completed",
            WorkOrderStatus::Incomplete => "incomplete",
            WorkOrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkOrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(WorkOrderStatus::Draft),
            "consulting_vendors" => Ok(WorkOrderStatus::ConsultingVendors),
            "ready_for_review" => Ok(WorkOrderStatus::ReadyForReview),
            "quote_approved" => Ok(WorkOrderStatus::QuoteApproved),
            "scheduled" => Ok(WorkOrderStatus::Scheduled),
            "work_in_progress" => Ok(WorkOrderStatus::WorkInProgress),
            "completed" => Ok(WorkOrderStatus::Completed),
            "incomplete" => Ok(WorkOrderStatus::Incomplete),
            "cancelled" => Ok(WorkOrderStatus::Cancelled),
            other => Err(format!("invalid work order status: '{other}'")),
        }
    }
}

/// A service request raised by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: i64,
    pub description: String,
    pub location: Option<String>,
    pub status: WorkOrderStatus,
    pub scheduled_date: Option<NaiveDate>,
    pub owner_user_id: i64,
    /// Blob references in upload order. Signed URLs in responses.
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Attachments for WorkOrder {
    fn entity_id(&self) -> i64 {
        self.id
    }

    fn attachment_refs(&self) -> Vec<String> {
        self.attachments.clone()
    }

    fn attachment_slots(&mut self) -> Vec<&mut String> {
        self.attachments.iter_mut().collect()
    }
}

/// Insert payload for a work order. Attachments start empty.
#[derive(Debug, Clone)]
pub struct NewWorkOrder {
    pub owner_user_id: i64,
    pub description: String,
    pub location: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
}

/// Client input for creating a work order. The owner is the caller.
#[derive(Debug, Clone, Default)]
pub struct CreateWorkOrderRequest {
    pub description: String,
    pub location: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
}

/// Partial update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct WorkOrderPatch {
    pub description: Option<String>,
    pub location: Option<String>,
    pub status: Option<WorkOrderStatus>,
    pub scheduled_date: Option<NaiveDate>,
}

impl WorkOrderPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.location.is_none()
            && self.status.is_none()
            && self.scheduled_date.is_none()
    }
}

/// Validate a work order description.
pub fn validate_description(description: &str) -> Result<String, String> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err("description is required".to_string());
    }
    Ok(trimmed.to_string())
}

/// Parse a `YYYY-MM-DD` scheduled date.
pub fn parse_scheduled_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| "scheduled_date must be in valid YYYY-MM-DD format".to_string())
}
