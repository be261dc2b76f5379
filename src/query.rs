//! Pure translation from validated request intent into statement text plus
//! an ordered parameter list. No I/O happens here.
//!
//! Every caller-supplied *value* is bound positionally through a `$n`
//! placeholder. The only identifiers ever interpolated are the
//! startup-validated schema/table pair and column names taken from the
//! fixed allow-list below.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::str::FromStr;

use crate::errors::AppError;
use crate::models::{ApplicationStatus, CreditApplication, ListQueryParams};

/// Default page size for the list endpoint.
pub const DEFAULT_PAGE_SIZE: i64 = 100;
/// Hard cap on search results.
pub const SEARCH_ROW_CAP: i64 = 50;
/// Minimum significant characters in a search term.
pub const MIN_SEARCH_LEN: usize = 2;
/// Currency assigned at creation when the payload supplies none.
pub const DEFAULT_CURRENCY: &str = "GBP";

/// The immutable natural key. Never updatable.
pub const KEY_COLUMN: &str = "app_ref";

/// One positionally bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Numeric(BigDecimal),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

/// Bind-type class of a column, used to coerce update-payload values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Numeric,
    Boolean,
    Date,
    Timestamp,
}

/// The full attribute set of the table. Column names arriving in an update
/// payload must resolve here before they are spliced into statement text;
/// anything else is rejected.
pub const COLUMNS: &[(&str, ColumnKind)] = &[
    ("app_ref", ColumnKind::Text),
    // application metadata
    ("app_status", ColumnKind::Text),
    ("loan_purpose", ColumnKind::Text),
    ("application_channel", ColumnKind::Text),
    ("submission_timestamp", ColumnKind::Timestamp),
    // requested product terms
    ("product_code", ColumnKind::Text),
    ("product_name", ColumnKind::Text),
    ("product_type", ColumnKind::Text),
    ("requested_amount", ColumnKind::Numeric),
    ("requested_term_months", ColumnKind::Integer),
    ("currency", ColumnKind::Text),
    ("product_min_amount", ColumnKind::Numeric),
    ("product_max_amount", ColumnKind::Numeric),
    ("product_min_term_months", ColumnKind::Integer),
    ("product_max_term_months", ColumnKind::Integer),
    // customer identity and demographics
    ("cis_customer_number", ColumnKind::Text),
    ("first_name", ColumnKind::Text),
    ("last_name", ColumnKind::Text),
    ("date_of_birth", ColumnKind::Date),
    ("customer_segment", ColumnKind::Text),
    ("risk_band", ColumnKind::Text),
    ("email", ColumnKind::Text),
    ("phone_number", ColumnKind::Text),
    ("residential_status", ColumnKind::Text),
    ("marital_status", ColumnKind::Text),
    ("dependents_count", ColumnKind::Integer),
    ("employment_status", ColumnKind::Text),
    // affordability and behavioural inputs
    ("annual_income", ColumnKind::Numeric),
    ("net_monthly_income", ColumnKind::Numeric),
    ("monthly_expenses", ColumnKind::Numeric),
    ("existing_debt_total", ColumnKind::Numeric),
    ("account_tenure_months", ColumnKind::Integer),
    ("avg_account_balance", ColumnKind::Numeric),
    ("missed_payments_12m", ColumnKind::Integer),
    ("delinquency_flag", ColumnKind::Boolean),
    ("bureau_defaults_count", ColumnKind::Integer),
    // scoring outputs
    ("score_provider", ColumnKind::Text),
    ("score_value", ColumnKind::Integer),
    ("score_band", ColumnKind::Text),
    ("eligibility_flag", ColumnKind::Boolean),
    ("eligibility_failure_reasons", ColumnKind::Text),
    ("scored_at", ColumnKind::Timestamp),
    // recommendation outputs
    ("recommended_product_code", ColumnKind::Text),
    ("recommended_amount", ColumnKind::Numeric),
    ("recommended_term_months", ColumnKind::Integer),
    ("recommended_rate", ColumnKind::Numeric),
    ("recommendation_conditions", ColumnKind::Text),
    ("recommendation_rationale", ColumnKind::Text),
    ("recommended_at", ColumnKind::Timestamp),
];

/// Looks up a column in the allow-list.
pub fn column_kind(name: &str) -> Option<ColumnKind> {
    COLUMNS.iter().find(|(c, _)| *c == name).map(|(_, k)| *k)
}

// ============ List Filters ============

/// Validated filter set for the list operation. Absent predicates contribute
/// nothing to the statement.
#[derive(Debug, Clone)]
pub struct ListFilter {
    pub status: Option<ApplicationStatus>,
    pub customer_number: Option<String>,
    pub product_code: Option<String>,
    pub min_amount: Option<BigDecimal>,
    pub max_amount: Option<BigDecimal>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            status: None,
            customer_number: None,
            product_code: None,
            min_amount: None,
            max_amount: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl ListFilter {
    /// Validates raw query parameters into a filter set.
    ///
    /// String equality values are normalized to uppercase here so the
    /// builder only ever binds canonical forms. Non-numeric amount or
    /// pagination input is rejected; blank values count as absent.
    pub fn from_params(params: &ListQueryParams) -> Result<Self, AppError> {
        let status = match present(&params.status) {
            Some(raw) => Some(ApplicationStatus::parse(raw).ok_or_else(|| {
                AppError::BadRequest(format!(
                    "status must be one of {}",
                    ApplicationStatus::allowed_values()
                ))
            })?),
            None => None,
        };

        let min_amount = present(&params.min_amount)
            .map(|raw| parse_amount("min_amount", raw))
            .transpose()?;
        let max_amount = present(&params.max_amount)
            .map(|raw| parse_amount("max_amount", raw))
            .transpose()?;

        let limit = match present(&params.limit) {
            Some(raw) => parse_window("limit", raw)?,
            None => DEFAULT_PAGE_SIZE,
        };
        let offset = match present(&params.offset) {
            Some(raw) => parse_window("offset", raw)?,
            None => 0,
        };

        Ok(Self {
            status,
            customer_number: present(&params.customer_id).map(|s| s.to_uppercase()),
            product_code: present(&params.product_code).map(|s| s.to_uppercase()),
            min_amount,
            max_amount,
            limit,
            offset,
        })
    }
}

fn present(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Parses a monetary filter value. Non-numeric input is a client error.
pub fn parse_amount(field: &str, raw: &str) -> Result<BigDecimal, AppError> {
    BigDecimal::from_str(raw.trim())
        .map_err(|_| AppError::BadRequest(format!("{} must be numeric, got '{}'", field, raw)))
}

/// Parses a limit/offset value. Non-numeric or negative input is a client
/// error, applied consistently with amount parsing.
fn parse_window(field: &str, raw: &str) -> Result<i64, AppError> {
    let n = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| AppError::BadRequest(format!("{} must be an integer, got '{}'", field, raw)))?;
    if n < 0 {
        return Err(AppError::BadRequest(format!(
            "{} must not be negative",
            field
        )));
    }
    Ok(n)
}

// ============ Statement Builders ============

/// Builds the filtered/paginated list statement.
///
/// One `column OP $n` clause per present predicate, AND-joined. Ordering is
/// always newest submission first; rows sharing a timestamp have no further
/// defined order.
pub fn build_list_query(table: &str, filter: &ListFilter) -> (String, Vec<SqlValue>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<SqlValue> = Vec::new();

    if let Some(status) = filter.status {
        params.push(SqlValue::Text(status.as_str().to_string()));
        clauses.push(format!("app_status = ${}", params.len()));
    }
    if let Some(cis) = &filter.customer_number {
        params.push(SqlValue::Text(cis.clone()));
        clauses.push(format!("cis_customer_number = ${}", params.len()));
    }
    if let Some(code) = &filter.product_code {
        params.push(SqlValue::Text(code.clone()));
        clauses.push(format!("product_code = ${}", params.len()));
    }
    if let Some(min) = &filter.min_amount {
        params.push(SqlValue::Numeric(min.clone()));
        clauses.push(format!("requested_amount >= ${}", params.len()));
    }
    if let Some(max) = &filter.max_amount {
        params.push(SqlValue::Numeric(max.clone()));
        clauses.push(format!("requested_amount <= ${}", params.len()));
    }

    let mut sql = format!("SELECT * FROM {}", table);
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    params.push(SqlValue::Int(filter.limit));
    sql.push_str(&format!(
        " ORDER BY submission_timestamp DESC LIMIT ${}",
        params.len()
    ));
    params.push(SqlValue::Int(filter.offset));
    sql.push_str(&format!(" OFFSET ${}", params.len()));

    (sql, params)
}

/// All applications for one customer, newest first. The customer number is
/// expected pre-normalized to uppercase.
pub fn build_customer_query(table: &str, cis_customer_number: &str) -> (String, Vec<SqlValue>) {
    let sql = format!(
        "SELECT * FROM {} WHERE cis_customer_number = $1 ORDER BY submission_timestamp DESC",
        table
    );
    (sql, vec![SqlValue::Text(cis_customer_number.to_string())])
}

/// Builds the cross-field substring search.
///
/// The `%TERM%` pattern is one bound parameter reused across all five
/// columns; it is never interpolated into the statement text.
pub fn build_search_query(table: &str, term: &str) -> Result<(String, Vec<SqlValue>), AppError> {
    let term = term.trim();
    if term.chars().count() < MIN_SEARCH_LEN {
        return Err(AppError::BadRequest(format!(
            "search query must be at least {} characters",
            MIN_SEARCH_LEN
        )));
    }

    let pattern = format!("%{}%", term.to_uppercase());
    let sql = format!(
        "SELECT * FROM {} WHERE UPPER(first_name) LIKE $1 \
         OR UPPER(last_name) LIKE $1 \
         OR UPPER(email) LIKE $1 \
         OR UPPER(cis_customer_number) LIKE $1 \
         OR UPPER(app_ref) LIKE $1 \
         ORDER BY submission_timestamp DESC LIMIT {}",
        table, SEARCH_ROW_CAP
    );
    Ok((sql, vec![SqlValue::Text(pattern)]))
}

/// Builds a partial update from a column→value payload.
///
/// The key column is dropped from the payload if present; an empty remainder
/// is a client error. Column names are lowercased and must resolve in the
/// allow-list, and each value must coerce to its column's bind type. JSON
/// null renders a literal `NULL` and binds nothing. Assignments follow the
/// payload map's deterministic key order.
pub fn build_update_query(
    table: &str,
    app_ref: &str,
    payload: &serde_json::Map<String, Value>,
) -> Result<(String, Vec<SqlValue>), AppError> {
    let mut assignments: Vec<String> = Vec::new();
    let mut params: Vec<SqlValue> = Vec::new();

    for (name, value) in payload {
        let column = name.trim().to_lowercase();
        if column == KEY_COLUMN {
            continue;
        }
        let kind = column_kind(&column)
            .ok_or_else(|| AppError::BadRequest(format!("unknown column '{}'", name)))?;

        match coerce_value(&column, kind, value)? {
            Some(v) => {
                params.push(v);
                assignments.push(format!("{} = ${}", column, params.len()));
            }
            None => assignments.push(format!("{} = NULL", column)),
        }
    }

    if assignments.is_empty() {
        return Err(AppError::BadRequest(
            "no updatable fields supplied".to_string(),
        ));
    }

    params.push(SqlValue::Text(app_ref.to_string()));
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ${}",
        table,
        assignments.join(", "),
        KEY_COLUMN,
        params.len()
    );
    Ok((sql, params))
}

/// Coerces one JSON payload value to the column's bind type. `Ok(None)`
/// means an explicit null.
fn coerce_value(column: &str, kind: ColumnKind, value: &Value) -> Result<Option<SqlValue>, AppError> {
    if value.is_null() {
        return Ok(None);
    }

    // Status stays inside the enumeration no matter which path writes it.
    if column == "app_status" {
        let status = value
            .as_str()
            .and_then(ApplicationStatus::parse)
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "app_status must be one of {}",
                    ApplicationStatus::allowed_values()
                ))
            })?;
        return Ok(Some(SqlValue::Text(status.as_str().to_string())));
    }

    let coerced = match kind {
        ColumnKind::Text => value.as_str().map(|s| SqlValue::Text(s.to_string())),
        ColumnKind::Integer => value.as_i64().map(SqlValue::Int),
        ColumnKind::Numeric => match value {
            Value::Number(n) => BigDecimal::from_str(&n.to_string()).ok().map(SqlValue::Numeric),
            Value::String(s) => BigDecimal::from_str(s.trim()).ok().map(SqlValue::Numeric),
            _ => None,
        },
        ColumnKind::Boolean => value.as_bool().map(SqlValue::Bool),
        ColumnKind::Date => value
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .map(SqlValue::Date),
        ColumnKind::Timestamp => value
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| SqlValue::Timestamp(d.with_timezone(&Utc))),
    };

    coerced
        .map(Some)
        .ok_or_else(|| AppError::BadRequest(format!("invalid value for column '{}'", column)))
}

/// Builds the status transition. A rejection reason, when supplied with
/// REJECTED, lands in the failure-reason column within the same statement.
pub fn build_status_update(
    table: &str,
    app_ref: &str,
    status: ApplicationStatus,
    reason: Option<&str>,
) -> (String, Vec<SqlValue>) {
    let mut params = vec![SqlValue::Text(status.as_str().to_string())];
    let mut assignments = vec!["app_status = $1".to_string()];

    if status == ApplicationStatus::Rejected {
        if let Some(reason) = reason {
            params.push(SqlValue::Text(reason.to_string()));
            assignments.push(format!("eligibility_failure_reasons = ${}", params.len()));
        }
    }

    params.push(SqlValue::Text(app_ref.to_string()));
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ${}",
        table,
        assignments.join(", "),
        KEY_COLUMN,
        params.len()
    );
    (sql, params)
}

/// Builds the insert over exactly the supplied attributes. Submission
/// timestamp and currency fall back to server-side defaults; the record is
/// expected pre-validated (non-empty key, present customer number,
/// canonical status casing).
pub fn build_insert(
    table: &str,
    app: &CreditApplication,
    now: DateTime<Utc>,
) -> (String, Vec<SqlValue>) {
    let mut b = InsertBuilder::default();

    b.push(KEY_COLUMN, Some(SqlValue::Text(app.app_ref.clone())));
    b.text("app_status", &app.app_status);
    b.text("loan_purpose", &app.loan_purpose);
    b.text("application_channel", &app.application_channel);
    b.push(
        "submission_timestamp",
        Some(SqlValue::Timestamp(app.submission_timestamp.unwrap_or(now))),
    );
    b.text("product_code", &app.product_code);
    b.text("product_name", &app.product_name);
    b.text("product_type", &app.product_type);
    b.numeric("requested_amount", &app.requested_amount);
    b.int("requested_term_months", app.requested_term_months);
    b.push(
        "currency",
        Some(SqlValue::Text(
            app.currency
                .clone()
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        )),
    );
    b.numeric("product_min_amount", &app.product_min_amount);
    b.numeric("product_max_amount", &app.product_max_amount);
    b.int("product_min_term_months", app.product_min_term_months);
    b.int("product_max_term_months", app.product_max_term_months);
    b.text("cis_customer_number", &app.cis_customer_number);
    b.text("first_name", &app.first_name);
    b.text("last_name", &app.last_name);
    b.date("date_of_birth", app.date_of_birth);
    b.text("customer_segment", &app.customer_segment);
    b.text("risk_band", &app.risk_band);
    b.text("email", &app.email);
    b.text("phone_number", &app.phone_number);
    b.text("residential_status", &app.residential_status);
    b.text("marital_status", &app.marital_status);
    b.int("dependents_count", app.dependents_count);
    b.text("employment_status", &app.employment_status);
    b.numeric("annual_income", &app.annual_income);
    b.numeric("net_monthly_income", &app.net_monthly_income);
    b.numeric("monthly_expenses", &app.monthly_expenses);
    b.numeric("existing_debt_total", &app.existing_debt_total);
    b.int("account_tenure_months", app.account_tenure_months);
    b.numeric("avg_account_balance", &app.avg_account_balance);
    b.int("missed_payments_12m", app.missed_payments_12m);
    b.boolean("delinquency_flag", app.delinquency_flag);
    b.int("bureau_defaults_count", app.bureau_defaults_count);
    b.text("score_provider", &app.score_provider);
    b.int("score_value", app.score_value);
    b.text("score_band", &app.score_band);
    b.boolean("eligibility_flag", app.eligibility_flag);
    b.text("eligibility_failure_reasons", &app.eligibility_failure_reasons);
    b.timestamp("scored_at", app.scored_at);
    b.text("recommended_product_code", &app.recommended_product_code);
    b.numeric("recommended_amount", &app.recommended_amount);
    b.int("recommended_term_months", app.recommended_term_months);
    b.numeric("recommended_rate", &app.recommended_rate);
    b.text("recommendation_conditions", &app.recommendation_conditions);
    b.text("recommendation_rationale", &app.recommendation_rationale);
    b.timestamp("recommended_at", app.recommended_at);

    let placeholders: Vec<String> = (1..=b.params.len()).map(|i| format!("${}", i)).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        b.columns.join(", "),
        placeholders.join(", ")
    );
    (sql, b.params)
}

#[derive(Default)]
struct InsertBuilder {
    columns: Vec<&'static str>,
    params: Vec<SqlValue>,
}

impl InsertBuilder {
    fn push(&mut self, column: &'static str, value: Option<SqlValue>) {
        if let Some(v) = value {
            self.columns.push(column);
            self.params.push(v);
        }
    }

    fn text(&mut self, column: &'static str, value: &Option<String>) {
        self.push(column, value.clone().map(SqlValue::Text));
    }

    fn int(&mut self, column: &'static str, value: Option<i32>) {
        self.push(column, value.map(|v| SqlValue::Int(i64::from(v))));
    }

    fn numeric(&mut self, column: &'static str, value: &Option<BigDecimal>) {
        self.push(column, value.clone().map(SqlValue::Numeric));
    }

    fn boolean(&mut self, column: &'static str, value: Option<bool>) {
        self.push(column, value.map(SqlValue::Bool));
    }

    fn date(&mut self, column: &'static str, value: Option<NaiveDate>) {
        self.push(column, value.map(SqlValue::Date));
    }

    fn timestamp(&mut self, column: &'static str, value: Option<DateTime<Utc>>) {
        self.push(column, value.map(SqlValue::Timestamp));
    }
}

// ============ Fixed Templates ============

/// Existence probe on the key.
pub fn exists_query(table: &str) -> String {
    format!("SELECT {} FROM {} WHERE {} = $1", KEY_COLUMN, table, KEY_COLUMN)
}

/// Single record by key.
pub fn get_query(table: &str) -> String {
    format!("SELECT * FROM {} WHERE {} = $1", table, KEY_COLUMN)
}

/// Delete by key.
pub fn delete_query(table: &str) -> String {
    format!("DELETE FROM {} WHERE {} = $1", table, KEY_COLUMN)
}

/// Total row count for the info endpoint.
pub fn count_query(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", table)
}

/// Portfolio-wide aggregates. Zero rows means zero counts and null measures,
/// never an error.
pub fn overview_stats_query(table: &str) -> String {
    format!(
        "SELECT COUNT(*) AS total_applications, \
         COUNT(DISTINCT cis_customer_number) AS distinct_customers, \
         SUM(requested_amount) AS total_requested_amount, \
         AVG(requested_amount) AS average_requested_amount, \
         MIN(requested_amount) AS min_requested_amount, \
         MAX(requested_amount) AS max_requested_amount, \
         AVG(score_value) AS average_score, \
         COUNT(*) FILTER (WHERE app_status = 'APPROVED') AS approved_count, \
         COUNT(*) FILTER (WHERE app_status = 'REJECTED') AS rejected_count, \
         COUNT(*) FILTER (WHERE app_status = 'IN_REVIEW') AS in_review_count, \
         COUNT(*) FILTER (WHERE app_status = 'PENDING') AS pending_count \
         FROM {}",
        table
    )
}

/// Aggregates grouped by status.
pub fn status_stats_query(table: &str) -> String {
    format!(
        "SELECT app_status, \
         COUNT(*) AS application_count, \
         SUM(requested_amount) AS total_requested_amount, \
         AVG(requested_amount) AS average_requested_amount \
         FROM {} GROUP BY app_status ORDER BY application_count DESC",
        table
    )
}

/// Aggregates grouped by requested product.
pub fn product_stats_query(table: &str) -> String {
    format!(
        "SELECT product_code, product_name, \
         COUNT(*) AS application_count, \
         SUM(requested_amount) AS total_requested_amount, \
         AVG(requested_amount) AS average_requested_amount \
         FROM {} GROUP BY product_code, product_name ORDER BY application_count DESC",
        table
    )
}

/// Aggregate summary for one customer; binds the uppercased customer number.
pub fn customer_summary_query(table: &str) -> String {
    format!(
        "SELECT COUNT(*) AS total_applications, \
         COUNT(*) FILTER (WHERE app_status = 'APPROVED') AS approved_count, \
         COUNT(*) FILTER (WHERE app_status = 'REJECTED') AS rejected_count, \
         COUNT(*) FILTER (WHERE app_status = 'IN_REVIEW') AS in_review_count, \
         COUNT(*) FILTER (WHERE app_status = 'PENDING') AS pending_count, \
         SUM(requested_amount) AS total_requested_amount, \
         AVG(requested_amount) AS average_requested_amount, \
         MAX(requested_amount) AS max_requested_amount, \
         MIN(submission_timestamp) AS first_submission, \
         MAX(submission_timestamp) AS latest_submission \
         FROM {} WHERE cis_customer_number = $1",
        table
    )
}
