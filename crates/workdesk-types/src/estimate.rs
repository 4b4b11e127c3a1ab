//! Vendor estimate types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attachment::Attachments;

/// A vendor's priced estimate for a work order. Holds at most one attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Estimate {
    pub id: i64,
    pub work_order_id: i64,
    pub vendor_id: i64,
    pub cost: f64,
    pub attachment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Attachments for Estimate {
    fn entity_id(&self) -> i64 {
        self.id
    }

    fn attachment_refs(&self) -> Vec<String> {
        self.attachment.iter().cloned().collect()
    }

    fn attachment_slots(&mut self) -> Vec<&mut String> {
        self.attachment.iter_mut().collect()
    }
}

#[derive(Debug, Clone)]
pub struct NewEstimate {
    pub work_order_id: i64,
    pub vendor_id: i64,
    pub cost: f64,
}

#[derive(Debug, Clone, Default)]
pub struct EstimatePatch {
    pub vendor_id: Option<i64>,
    pub cost: Option<f64>,
}

/// Filters for listing estimates.
#[derive(Debug, Clone, Default)]
pub struct EstimateFilter {
    pub work_order_id: Option<i64>,
    pub vendor_id: Option<i64>,
    /// Restrict to estimates on work orders owned by this user.
    pub owner_user_id: Option<i64>,
    pub limit: Option<i64>,
}

/// Cost must be finite, non-negative and carry at most two decimal places.
pub fn validate_cost(cost: f64) -> Result<f64, String> {
    if !cost.is_finite() || cost < 0.0 {
        return Err("cost must be a non-negative number".to_string());
    }
    let cents = cost * 100.0;
    if (cents - cents.round()).abs() > 1e-6 {
        return Err("cost must have at most two decimal places".to_string());
    }
    Ok(cost)
}
