/// Property-based tests using proptest
/// Tests invariants that should hold for all inputs to the query builders.
use bigdecimal::BigDecimal;
use credit_apps_api::models::{ApplicationStatus, ListQueryParams};
use credit_apps_api::query::{
    build_list_query, build_search_query, build_update_query, ListFilter, SqlValue,
};
use proptest::prelude::*;
use serde_json::{Map, Value};

const TABLE: &str = "public.credit_applications";

fn status_strategy() -> impl Strategy<Value = Option<ApplicationStatus>> {
    proptest::option::of(prop_oneof![
        Just(ApplicationStatus::Approved),
        Just(ApplicationStatus::Rejected),
        Just(ApplicationStatus::InReview),
        Just(ApplicationStatus::Pending),
    ])
}

fn filter_strategy() -> impl Strategy<Value = ListFilter> {
    (
        status_strategy(),
        proptest::option::of("[A-Z0-9]{1,12}"),
        proptest::option::of("[A-Z0-9]{1,8}"),
        proptest::option::of(0i64..10_000_000),
        proptest::option::of(0i64..10_000_000),
        0i64..10_000,
        0i64..10_000,
    )
        .prop_map(
            |(status, customer, product, min, max, limit, offset)| ListFilter {
                status,
                customer_number: customer,
                product_code: product,
                min_amount: min.map(BigDecimal::from),
                max_amount: max.map(BigDecimal::from),
                limit,
                offset,
            },
        )
}

fn predicate_count(filter: &ListFilter) -> usize {
    [
        filter.status.is_some(),
        filter.customer_number.is_some(),
        filter.product_code.is_some(),
        filter.min_amount.is_some(),
        filter.max_amount.is_some(),
    ]
    .iter()
    .filter(|p| **p)
    .count()
}

// Property: parameter validation never panics, whatever text arrives
proptest! {
    #[test]
    fn from_params_never_panics(
        status in proptest::option::of("\\PC*"),
        customer in proptest::option::of("\\PC*"),
        product in proptest::option::of("\\PC*"),
        min in proptest::option::of("\\PC*"),
        max in proptest::option::of("\\PC*"),
        limit in proptest::option::of("\\PC*"),
        offset in proptest::option::of("\\PC*")
    ) {
        let params = ListQueryParams {
            status,
            customer_id: customer,
            product_code: product,
            min_amount: min,
            max_amount: max,
            limit,
            offset,
        };
        // Returning an error is fine; panicking is not.
        let _ = ListFilter::from_params(&params);
    }
}

// Property: one clause per present predicate, AND-joined
proptest! {
    #[test]
    fn clause_count_matches_present_predicates(filter in filter_strategy()) {
        let (sql, _) = build_list_query(TABLE, &filter);
        let predicates = predicate_count(&filter);
        if predicates == 0 {
            prop_assert!(!sql.contains(" WHERE "));
        } else {
            prop_assert!(sql.contains(" WHERE "));
            prop_assert_eq!(sql.matches(" AND ").count(), predicates - 1);
        }
    }

    #[test]
    fn placeholders_are_consecutive_and_match_parameters(filter in filter_strategy()) {
        let (sql, params) = build_list_query(TABLE, &filter);
        // predicates + limit + offset
        prop_assert_eq!(params.len(), predicate_count(&filter) + 2);
        for i in 1..=params.len() {
            prop_assert!(sql.contains(&format!("${}", i)), "missing ${}", i);
        }
        prop_assert!(!sql.contains(&format!("${}", params.len() + 1)));
    }

    #[test]
    fn ordering_clause_is_always_present(filter in filter_strategy()) {
        let (sql, _) = build_list_query(TABLE, &filter);
        prop_assert!(sql.contains("ORDER BY submission_timestamp DESC"));
    }
}

// Property: search terms bind exactly one pattern parameter
proptest! {
    #[test]
    fn search_never_panics(term in "\\PC*") {
        let _ = build_search_query(TABLE, &term);
    }

    #[test]
    fn valid_search_terms_bind_one_uppercased_pattern(term in "[a-zA-Z0-9]{2,24}") {
        let (sql, params) = build_search_query(TABLE, &term).unwrap();
        prop_assert_eq!(params.len(), 1);
        match &params[0] {
            SqlValue::Text(pattern) => {
                prop_assert_eq!(pattern.clone(), format!("%{}%", term.to_uppercase()));
                // The pattern travels as a parameter, not as statement text
                prop_assert!(!sql.contains(pattern.as_str()));
            }
            other => prop_assert!(false, "unexpected parameter {:?}", other),
        }
    }

    #[test]
    fn short_search_terms_are_rejected(term in "[a-zA-Z0-9]{0,1}") {
        prop_assert!(build_search_query(TABLE, &term).is_err());
    }
}

// Property: update payloads with unlisted columns never reach statement text
proptest! {
    #[test]
    fn unknown_columns_are_always_rejected(
        column in "[a-z_]{1,20}",
        value in "\\PC*"
    ) {
        prop_assume!(credit_apps_api::query::column_kind(&column).is_none());
        let mut body = Map::new();
        body.insert(column, Value::String(value));
        prop_assert!(build_update_query(TABLE, "APP1", &body).is_err());
    }

    #[test]
    fn text_column_updates_never_panic(value in "\\PC*") {
        let mut body = Map::new();
        body.insert("loan_purpose".to_string(), Value::String(value.clone()));
        let (sql, params) = build_update_query(TABLE, "APP1", &body).unwrap();
        prop_assert!(sql.contains("loan_purpose = $1"));
        // Whatever the value contains, it is bound, never spliced
        prop_assert_eq!(params.len(), 2);
        prop_assert!(sql.ends_with("WHERE app_ref = $2"));
    }
}
