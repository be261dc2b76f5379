use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============ Database Models ============

/// One row of the credit-applications table.
///
/// `app_ref` is the natural key; every other column is nullable. The same
/// struct is used for reading rows and for the create payload, where a
/// missing `app_ref` deserializes to an empty string and is rejected by
/// validation before any store access.
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
pub struct CreditApplication {
    /// Unique application reference (natural key).
    #[serde(default)]
    pub app_ref: String,

    // Application metadata
    /// Current status: APPROVED, REJECTED, IN_REVIEW or PENDING.
    pub app_status: Option<String>,
    pub loan_purpose: Option<String>,
    /// Origination channel (e.g. BRANCH, ONLINE, BROKER).
    pub application_channel: Option<String>,
    pub submission_timestamp: Option<DateTime<Utc>>,

    // Requested product terms
    pub product_code: Option<String>,
    pub product_name: Option<String>,
    pub product_type: Option<String>,
    pub requested_amount: Option<BigDecimal>,
    pub requested_term_months: Option<i32>,
    pub currency: Option<String>,
    pub product_min_amount: Option<BigDecimal>,
    pub product_max_amount: Option<BigDecimal>,
    pub product_min_term_months: Option<i32>,
    pub product_max_term_months: Option<i32>,

    // Customer identity and demographics
    /// Owning customer; stored uppercase, required at creation.
    pub cis_customer_number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub customer_segment: Option<String>,
    pub risk_band: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub residential_status: Option<String>,
    pub marital_status: Option<String>,
    pub dependents_count: Option<i32>,
    pub employment_status: Option<String>,

    // Affordability and behavioural inputs
    pub annual_income: Option<BigDecimal>,
    pub net_monthly_income: Option<BigDecimal>,
    pub monthly_expenses: Option<BigDecimal>,
    pub existing_debt_total: Option<BigDecimal>,
    pub account_tenure_months: Option<i32>,
    pub avg_account_balance: Option<BigDecimal>,
    pub missed_payments_12m: Option<i32>,
    pub delinquency_flag: Option<bool>,
    pub bureau_defaults_count: Option<i32>,

    // Scoring outputs
    pub score_provider: Option<String>,
    pub score_value: Option<i32>,
    pub score_band: Option<String>,
    pub eligibility_flag: Option<bool>,
    pub eligibility_failure_reasons: Option<String>,
    pub scored_at: Option<DateTime<Utc>>,

    // Recommendation outputs
    pub recommended_product_code: Option<String>,
    pub recommended_amount: Option<BigDecimal>,
    pub recommended_term_months: Option<i32>,
    pub recommended_rate: Option<BigDecimal>,
    pub recommendation_conditions: Option<String>,
    pub recommendation_rationale: Option<String>,
    pub recommended_at: Option<DateTime<Utc>>,
}

/// The closed set of application statuses accepted on status-changing
/// operations. Input is matched case-insensitively; the stored value is
/// always the uppercase form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationStatus {
    Approved,
    Rejected,
    InReview,
    Pending,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 4] = [
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
        ApplicationStatus::InReview,
        ApplicationStatus::Pending,
    ];

    /// Parses a status value, accepting any casing. Returns `None` for
    /// anything outside the enumeration.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_uppercase().as_str() {
            "APPROVED" => Some(ApplicationStatus::Approved),
            "REJECTED" => Some(ApplicationStatus::Rejected),
            "IN_REVIEW" => Some(ApplicationStatus::InReview),
            "PENDING" => Some(ApplicationStatus::Pending),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Approved => "APPROVED",
            ApplicationStatus::Rejected => "REJECTED",
            ApplicationStatus::InReview => "IN_REVIEW",
            ApplicationStatus::Pending => "PENDING",
        }
    }

    /// Comma-separated list of accepted values, for error messages.
    pub fn allowed_values() -> String {
        Self::ALL
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ============ Request Models ============

/// Raw query parameters for the list endpoint.
///
/// Everything arrives as text so that malformed numeric input can be
/// rejected with the service's own 400 response instead of a framework
/// rejection.
#[derive(Debug, Default, Deserialize)]
pub struct ListQueryParams {
    pub status: Option<String>,
    pub customer_id: Option<String>,
    pub product_code: Option<String>,
    pub min_amount: Option<String>,
    pub max_amount: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// Query parameters for the search endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

/// Body of the status-transition endpoint.
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: Option<String>,
    /// Optional rejection reason; persisted alongside a REJECTED status.
    pub reason: Option<String>,
}

// ============ Aggregate Models ============

/// Portfolio-wide aggregates. On an empty table the counts are zero and the
/// measures are null.
#[derive(Debug, FromRow, Serialize)]
pub struct OverviewStats {
    pub total_applications: i64,
    pub distinct_customers: i64,
    pub total_requested_amount: Option<BigDecimal>,
    pub average_requested_amount: Option<BigDecimal>,
    pub min_requested_amount: Option<BigDecimal>,
    pub max_requested_amount: Option<BigDecimal>,
    pub average_score: Option<BigDecimal>,
    pub approved_count: i64,
    pub rejected_count: i64,
    pub in_review_count: i64,
    pub pending_count: i64,
}

/// Per-status aggregates.
#[derive(Debug, FromRow, Serialize)]
pub struct StatusStats {
    pub app_status: Option<String>,
    pub application_count: i64,
    pub total_requested_amount: Option<BigDecimal>,
    pub average_requested_amount: Option<BigDecimal>,
}

/// Per-product aggregates.
#[derive(Debug, FromRow, Serialize)]
pub struct ProductStats {
    pub product_code: Option<String>,
    pub product_name: Option<String>,
    pub application_count: i64,
    pub total_requested_amount: Option<BigDecimal>,
    pub average_requested_amount: Option<BigDecimal>,
}

/// Aggregate summary for one customer. A zero `total_applications` means the
/// customer has no records and is reported as not found.
#[derive(Debug, FromRow, Serialize)]
pub struct CustomerSummary {
    pub total_applications: i64,
    pub approved_count: i64,
    pub rejected_count: i64,
    pub in_review_count: i64,
    pub pending_count: i64,
    pub total_requested_amount: Option<BigDecimal>,
    pub average_requested_amount: Option<BigDecimal>,
    pub max_requested_amount: Option<BigDecimal>,
    pub first_submission: Option<DateTime<Utc>>,
    pub latest_submission: Option<DateTime<Utc>>,
}
