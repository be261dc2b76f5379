use std::env;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use bigdecimal::BigDecimal;
use serde_json::json;
use uuid::Uuid;

use credit_apps_api::config::Config;
use credit_apps_api::errors::AppError;
use credit_apps_api::handlers::{self, AppState};
use credit_apps_api::models::{
    CreditApplication, ListQueryParams, SearchParams, StatusUpdateRequest,
};
use credit_apps_api::store::ApplicationStore;

/// Integration smoke tests exercising the record operations end to end.
/// Marked ignored to avoid running against production by accident; set
/// TEST_DATABASE_URL to run. Each test creates its table if missing and
/// uses unique keys so repeated runs stay independent.
const TEST_TABLE: &str = "credit_applications_it";

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS public.credit_applications_it (\
    app_ref TEXT PRIMARY KEY, \
    app_status TEXT, loan_purpose TEXT, application_channel TEXT, \
    submission_timestamp TIMESTAMPTZ, \
    product_code TEXT, product_name TEXT, product_type TEXT, \
    requested_amount NUMERIC, requested_term_months INTEGER, currency TEXT, \
    product_min_amount NUMERIC, product_max_amount NUMERIC, \
    product_min_term_months INTEGER, product_max_term_months INTEGER, \
    cis_customer_number TEXT, first_name TEXT, last_name TEXT, \
    date_of_birth DATE, customer_segment TEXT, risk_band TEXT, \
    email TEXT, phone_number TEXT, residential_status TEXT, \
    marital_status TEXT, dependents_count INTEGER, employment_status TEXT, \
    annual_income NUMERIC, net_monthly_income NUMERIC, monthly_expenses NUMERIC, \
    existing_debt_total NUMERIC, account_tenure_months INTEGER, \
    avg_account_balance NUMERIC, missed_payments_12m INTEGER, \
    delinquency_flag BOOLEAN, bureau_defaults_count INTEGER, \
    score_provider TEXT, score_value INTEGER, score_band TEXT, \
    eligibility_flag BOOLEAN, eligibility_failure_reasons TEXT, scored_at TIMESTAMPTZ, \
    recommended_product_code TEXT, recommended_amount NUMERIC, \
    recommended_term_months INTEGER, recommended_rate NUMERIC, \
    recommendation_conditions TEXT, recommendation_rationale TEXT, \
    recommended_at TIMESTAMPTZ)";

async fn test_state() -> anyhow::Result<Arc<AppState>> {
    let database_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let config = Config {
        database_url,
        port: 0,
        db_schema: "public".to_string(),
        table_name: TEST_TABLE.to_string(),
    };
    let store = ApplicationStore::connect(&config).await?;
    store.execute(CREATE_TABLE, Vec::new()).await.map_err(|e| {
        anyhow::anyhow!("failed to create test table: {}", e)
    })?;

    Ok(Arc::new(AppState { store, config }))
}

fn unique_ref() -> String {
    format!("APP-{}", Uuid::new_v4().simple())
}

fn sample_application(app_ref: &str, cis: &str) -> CreditApplication {
    CreditApplication {
        app_ref: app_ref.to_string(),
        app_status: Some("pending".to_string()),
        loan_purpose: Some("HOME_IMPROVEMENT".to_string()),
        product_code: Some("PL01".to_string()),
        product_name: Some("Personal Loan".to_string()),
        requested_amount: Some(BigDecimal::from(25000)),
        requested_term_months: Some(48),
        cis_customer_number: Some(cis.to_string()),
        first_name: Some("Ada".to_string()),
        last_name: Some("Lovelace".to_string()),
        email: Some("ada@example.com".to_string()),
        score_value: Some(712),
        ..CreditApplication::default()
    }
}

async fn fetch_by_ref(state: &Arc<AppState>, app_ref: &str) -> Result<CreditApplication, AppError> {
    let response =
        handlers::get_application(State(state.clone()), Path(app_ref.to_string())).await?;
    let application = response.0["application"].clone();
    Ok(serde_json::from_value(application).expect("application payload deserializes"))
}

#[tokio::test]
#[ignore]
async fn create_fetch_update_delete_round_trip() -> anyhow::Result<()> {
    let state = test_state().await?;
    let app_ref = unique_ref();
    let cis = format!("CIS{:08}", Uuid::new_v4().as_u128() % 100_000_000);

    // Create
    let body = sample_application(&app_ref, &cis);
    let (status, response) =
        handlers::create_application(State(state.clone()), Json(body.clone()))
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response.0["success"], json!(true));

    // Duplicate create conflicts and leaves the row count for this key at one
    let err = handlers::create_application(State(state.clone()), Json(body.clone()))
        .await
        .expect_err("duplicate create must conflict");
    assert!(matches!(err, AppError::Conflict(_)));

    // Round-trip: supplied values come back, defaults were assigned
    let fetched = fetch_by_ref(&state, &app_ref).await?;
    assert_eq!(fetched.app_ref, app_ref);
    assert_eq!(fetched.app_status.as_deref(), Some("PENDING"));
    assert_eq!(fetched.cis_customer_number.as_deref(), Some(cis.as_str()));
    assert_eq!(fetched.requested_amount, Some(BigDecimal::from(25000)));
    assert_eq!(fetched.score_value, Some(712));
    assert_eq!(fetched.currency.as_deref(), Some("GBP"));
    assert!(fetched.submission_timestamp.is_some());

    // Status transition with a rejection reason sets both columns
    let patch = StatusUpdateRequest {
        status: Some("rejected".to_string()),
        reason: Some("income below threshold".to_string()),
    };
    handlers::update_status(State(state.clone()), Path(app_ref.clone()), Json(patch))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let fetched = fetch_by_ref(&state, &app_ref).await?;
    assert_eq!(fetched.app_status.as_deref(), Some("REJECTED"));
    assert_eq!(
        fetched.eligibility_failure_reasons.as_deref(),
        Some("income below threshold")
    );

    // Partial field update
    let update = json!({
        "loan_purpose": "CAR",
        "requested_amount": 18000,
        "recommendation_rationale": null,
    });
    handlers::update_application(
        State(state.clone()),
        Path(app_ref.clone()),
        Json(update.as_object().unwrap().clone()),
    )
    .await
    .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let fetched = fetch_by_ref(&state, &app_ref).await?;
    assert_eq!(fetched.loan_purpose.as_deref(), Some("CAR"));
    assert_eq!(fetched.requested_amount, Some(BigDecimal::from(18000)));
    assert_eq!(fetched.recommendation_rationale, None);

    // Customer listing and summary see the record under the uppercased key
    let listing = handlers::customer_applications(State(state.clone()), Path(cis.to_lowercase()))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(listing.0["count"], json!(1));

    let summary = handlers::customer_summary(State(state.clone()), Path(cis.clone()))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(summary.0["summary"]["total_applications"], json!(1));
    assert_eq!(summary.0["summary"]["rejected_count"], json!(1));

    // Search by a fragment of the reference finds it
    let params = SearchParams {
        query: Some(app_ref[4..12].to_string()),
    };
    let found = handlers::search_applications(State(state.clone()), Query(params))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert!(found.0["count"].as_u64().unwrap() >= 1);

    // Delete, then the key is gone
    handlers::delete_application(State(state.clone()), Path(app_ref.clone()))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let err = fetch_by_ref(&state, &app_ref)
        .await
        .expect_err("deleted application must be gone");
    assert!(matches!(err, AppError::NotFound(_)));

    Ok(())
}

#[tokio::test]
#[ignore]
async fn missing_keys_short_circuit_before_mutation() -> anyhow::Result<()> {
    let state = test_state().await?;
    let missing = unique_ref();

    let err = fetch_by_ref(&state, &missing)
        .await
        .expect_err("unknown key must be not found");
    assert!(matches!(err, AppError::NotFound(_)));

    let patch = StatusUpdateRequest {
        status: Some("APPROVED".to_string()),
        reason: None,
    };
    let err = handlers::update_status(State(state.clone()), Path(missing.clone()), Json(patch))
        .await
        .expect_err("status update on unknown key must be not found");
    assert!(matches!(err, AppError::NotFound(_)));

    let update = json!({"loan_purpose": "CAR"});
    let err = handlers::update_application(
        State(state.clone()),
        Path(missing.clone()),
        Json(update.as_object().unwrap().clone()),
    )
    .await
    .expect_err("field update on unknown key must be not found");
    assert!(matches!(err, AppError::NotFound(_)));

    let err = handlers::delete_application(State(state.clone()), Path(missing))
        .await
        .expect_err("delete on unknown key must be not found");
    assert!(matches!(err, AppError::NotFound(_)));

    Ok(())
}

#[tokio::test]
#[ignore]
async fn list_filters_and_stats_work_against_live_store() -> anyhow::Result<()> {
    let state = test_state().await?;
    let cis = format!("CIS{:08}", Uuid::new_v4().as_u128() % 100_000_000);

    let mut approved = sample_application(&unique_ref(), &cis);
    approved.app_status = Some("APPROVED".to_string());
    let mut pending = sample_application(&unique_ref(), &cis);
    pending.app_status = Some("PENDING".to_string());
    pending.requested_amount = Some(BigDecimal::from(90000));

    for body in [approved.clone(), pending.clone()] {
        handlers::create_application(State(state.clone()), Json(body))
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    }

    // Status + customer filter narrows to the approved record
    let params = ListQueryParams {
        status: Some("approved".to_string()),
        customer_id: Some(cis.to_lowercase()),
        ..ListQueryParams::default()
    };
    let listed = handlers::list_applications(State(state.clone()), Query(params))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(listed.0["count"], json!(1));
    assert_eq!(
        listed.0["applications"][0]["app_ref"],
        json!(approved.app_ref)
    );

    // Amount lower bound excludes the smaller request
    let params = ListQueryParams {
        customer_id: Some(cis.clone()),
        min_amount: Some("50000".to_string()),
        ..ListQueryParams::default()
    };
    let listed = handlers::list_applications(State(state.clone()), Query(params))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(listed.0["count"], json!(1));
    assert_eq!(
        listed.0["applications"][0]["app_ref"],
        json!(pending.app_ref)
    );

    // Aggregates run without error and see at least these rows
    let overview = handlers::stats_overview(State(state.clone()))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert!(overview.0["stats"]["total_applications"].as_i64().unwrap() >= 2);

    let by_status = handlers::stats_by_status(State(state.clone()))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert!(by_status.0["stats"].as_array().unwrap().len() >= 1);

    // Cleanup
    for app_ref in [approved.app_ref, pending.app_ref] {
        handlers::delete_application(State(state.clone()), Path(app_ref))
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    }

    Ok(())
}

#[tokio::test]
#[ignore]
async fn stats_on_empty_table_yield_zero_counts_and_null_measures() -> anyhow::Result<()> {
    let database_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let config = Config {
        database_url,
        port: 0,
        db_schema: "public".to_string(),
        table_name: "credit_applications_it_empty".to_string(),
    };
    let store = ApplicationStore::connect(&config).await?;
    let ddl = CREATE_TABLE.replace(TEST_TABLE, "credit_applications_it_empty");
    store
        .execute(&ddl, Vec::new())
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    store
        .execute("DELETE FROM public.credit_applications_it_empty", Vec::new())
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let state = Arc::new(AppState { store, config });

    let overview = handlers::stats_overview(State(state.clone()))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(overview.0["stats"]["total_applications"], json!(0));
    assert_eq!(overview.0["stats"]["total_requested_amount"], json!(null));
    assert_eq!(overview.0["stats"]["average_score"], json!(null));

    let by_status = handlers::stats_by_status(State(state.clone()))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(by_status.0["stats"], json!([]));

    Ok(())
}
