//! HTTP-level tests for `/api/v1/chain-rules`, including the read-only
//! propagation onto target fields and dry-run evaluation.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};
use sqlx::PgPool;

use common::{
    body_json, build_test_app, create_test_user, delete_auth, get_auth, manager_token,
    post_json_auth, post_raw_auth, put_json_auth, token_for, ROLE_USER,
};

async fn create_field(pool: &PgPool, token: &str, module: &str, label: &str) -> i64 {
    let response = post_json_auth(
        build_test_app(pool.clone()),
        "/api/v1/field-definitions",
        json!({ "module": module, "field_label": label, "field_type": "TEXT" }),
        token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}

async fn field_is_read_only(pool: &PgPool, token: &str, id: i64) -> bool {
    let response = get_auth(
        build_test_app(pool.clone()),
        &format!("/api/v1/field-definitions/{id}"),
        token,
    )
    .await;
    body_json(response).await["data"]["is_read_only"]
        .as_bool()
        .unwrap()
}

async fn create_rule(pool: &PgPool, token: &str, body: Value) -> (StatusCode, Value) {
    let response = post_json_auth(
        build_test_app(pool.clone()),
        "/api/v1/chain-rules",
        body,
        token,
    )
    .await;
    let status = response.status();
    (status, body_json(response).await)
}

fn simple_rule(source: i64, target: i64, trigger: &str, value: &str) -> Value {
    json!({
        "rule_name": "Country to region",
        "module": "leads",
        "source_field_id": source,
        "target_field_id": target,
        "comparison_operator": "equals",
        "trigger_value": trigger,
        "target_value": value
    })
}

async fn rule_count(pool: &PgPool, token: &str) -> usize {
    let response = get_auth(build_test_app(pool.clone()), "/api/v1/chain-rules", token).await;
    body_json(response).await["data"].as_array().unwrap().len()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_marks_target_read_only(pool: PgPool) {
    let token = manager_token(&pool).await;
    let country = create_field(&pool, &token, "leads", "Country").await;
    let region = create_field(&pool, &token, "leads", "Region").await;

    let (status, json) = create_rule(&pool, &token, simple_rule(country, region, "India", "APAC")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(json["id"].as_i64().is_some());
    assert_eq!(
        json["message"],
        "Chain rule created. Field 'Region' is now read-only."
    );

    assert!(field_is_read_only(&pool, &token, region).await);
    assert!(!field_is_read_only(&pool, &token, country).await);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_same_source_and_target_rejected(pool: PgPool) {
    let token = manager_token(&pool).await;
    let country = create_field(&pool, &token, "leads", "Country").await;

    let (status, json) = create_rule(&pool, &token, simple_rule(country, country, "India", "APAC")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");

    assert_eq!(rule_count(&pool, &token).await, 0);
    assert!(!field_is_read_only(&pool, &token, country).await);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_validation_errors(pool: PgPool) {
    let token = manager_token(&pool).await;
    let country = create_field(&pool, &token, "leads", "Country").await;
    let region = create_field(&pool, &token, "leads", "Region").await;
    let industry = create_field(&pool, &token, "accounts", "Industry").await;

    let mut missing_name = simple_rule(country, region, "India", "APAC");
    missing_name["rule_name"] = json!("   ");

    let mut bad_operator = simple_rule(country, region, "India", "APAC");
    bad_operator["comparison_operator"] = json!("roughly");

    let mut missing_trigger = simple_rule(country, region, "India", "APAC");
    missing_trigger["trigger_value"] = Value::Null;

    let mut other_module = simple_rule(country, industry, "India", "APAC");
    other_module["module"] = json!("leads");

    let unknown_field = simple_rule(country, 987_654, "India", "APAC");

    let empty_bulk = json!({
        "rule_name": "Empty",
        "module": "leads",
        "source_field_id": country,
        "target_field_id": region,
        "rule_type": "bulk_mapping",
        "bulk_mappings": []
    });

    for body in [missing_name, bad_operator, missing_trigger, other_module, unknown_field, empty_bulk] {
        let (status, json) = create_rule(&pool, &token, body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }

    assert_eq!(rule_count(&pool, &token).await, 0);
    assert!(!field_is_read_only(&pool, &token, region).await);
    assert!(!field_is_read_only(&pool, &token, industry).await);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_value_less_operator_needs_no_trigger(pool: PgPool) {
    let token = manager_token(&pool).await;
    let country = create_field(&pool, &token, "leads", "Country").await;
    let region = create_field(&pool, &token, "leads", "Region").await;

    let (status, json) = create_rule(
        &pool,
        &token,
        json!({
            "rule_name": "Unknown country",
            "module": "leads",
            "source_field_id": country,
            "target_field_id": region,
            "comparison_operator": "is_empty",
            "target_value": "Unassigned"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let response = get_auth(
        build_test_app(pool),
        &format!("/api/v1/chain-rules/{}", json["id"]),
        &token,
    )
    .await;
    let rule = body_json(response).await["data"].clone();
    assert_eq!(rule["comparison_operator"], "is_empty");
    assert_eq!(rule["trigger_value"], Value::Null);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_get_includes_field_details(pool: PgPool) {
    let token = manager_token(&pool).await;
    let country = create_field(&pool, &token, "leads", "Country").await;
    let region = create_field(&pool, &token, "leads", "Region").await;
    let (_, created) = create_rule(&pool, &token, simple_rule(country, region, "India", "APAC")).await;

    let response = get_auth(
        build_test_app(pool),
        &format!("/api/v1/chain-rules/{}", created["id"]),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let rule = body_json(response).await["data"].clone();
    assert_eq!(rule["rule_type"], "simple");
    assert_eq!(rule["source_field_name"], "country");
    assert_eq!(rule["target_field_label"], "Region");
    assert_eq!(rule["is_active"], true);
    assert!(rule.get("mappings").is_none() || rule["mappings"].is_null());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_malformed_body_is_validation_error(pool: PgPool) {
    let token = manager_token(&pool).await;

    let response = post_raw_auth(
        build_test_app(pool.clone()),
        "/api/v1/chain-rules",
        "{\"rule_name\": \"Broken\",",
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(json["error"].as_str().unwrap().starts_with("Invalid request body"));

    let (status, json) = create_rule(
        &pool,
        &token,
        json!({
            "rule_name": "Wrong type",
            "module": "leads",
            "source_field_id": "abc",
            "target_field_id": 2,
            "comparison_operator": "equals",
            "trigger_value": "x",
            "target_value": "y"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(rule_count(&pool, &token).await, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_numeric_values_are_stored_as_text(pool: PgPool) {
    let token = manager_token(&pool).await;
    let revenue = create_field(&pool, &token, "leads", "Revenue").await;
    let tier = create_field(&pool, &token, "leads", "Tier").await;
    let flag = create_field(&pool, &token, "leads", "Flag").await;

    let (status, created) = create_rule(
        &pool,
        &token,
        json!({
            "rule_name": "Big deals",
            "module": "leads",
            "source_field_id": revenue,
            "target_field_id": tier,
            "comparison_operator": "greater_than",
            "trigger_value": 100,
            "target_value": 5
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let response = get_auth(
        build_test_app(pool.clone()),
        &format!("/api/v1/chain-rules/{}", created["id"]),
        &token,
    )
    .await;
    let rule = body_json(response).await["data"].clone();
    assert_eq!(rule["trigger_value"], "100");
    assert_eq!(rule["target_value"], "5");

    let (status, created) = create_rule(
        &pool,
        &token,
        json!({
            "rule_name": "Flag by tier",
            "module": "leads",
            "source_field_id": tier,
            "target_field_id": flag,
            "comparison_operator": "equals",
            "rule_type": "bulk_mapping",
            "bulk_mappings": [{ "trigger_value": 5, "target_value": true }]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let response = get_auth(
        build_test_app(pool),
        &format!("/api/v1/chain-rules/{}", created["id"]),
        &token,
    )
    .await;
    let rule = body_json(response).await["data"].clone();
    assert_eq!(rule["mappings"][0]["trigger_value"], "5");
    assert_eq!(rule["mappings"][0]["target_value"], "true");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_bulk_rule_returns_mappings(pool: PgPool) {
    let token = manager_token(&pool).await;
    let country = create_field(&pool, &token, "leads", "Country").await;
    let region = create_field(&pool, &token, "leads", "Region").await;

    let (status, created) = create_rule(
        &pool,
        &token,
        json!({
            "rule_name": "Country lookup",
            "module": "leads",
            "source_field_id": country,
            "target_field_id": region,
            "rule_type": "bulk_mapping",
            "bulk_mappings": [
                { "trigger_value": "India", "target_value": "APAC" },
                { "trigger_value": "France", "target_value": "EMEA" }
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let response = get_auth(
        build_test_app(pool),
        &format!("/api/v1/chain-rules/{}", created["id"]),
        &token,
    )
    .await;
    let rule = body_json(response).await["data"].clone();
    assert_eq!(rule["rule_type"], "bulk_mapping");
    let mappings = rule["mappings"].as_array().unwrap();
    assert_eq!(mappings.len(), 2);
    assert_eq!(mappings[0]["trigger_value"], "India");
    assert_eq!(mappings[1]["target_value"], "EMEA");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_operator_and_values(pool: PgPool) {
    let token = manager_token(&pool).await;
    let country = create_field(&pool, &token, "leads", "Country").await;
    let region = create_field(&pool, &token, "leads", "Region").await;
    let (_, created) = create_rule(&pool, &token, simple_rule(country, region, "India", "APAC")).await;
    let uri = format!("/api/v1/chain-rules/{}", created["id"]);

    let response = put_json_auth(
        build_test_app(pool.clone()),
        &uri,
        json!({
            "rule_name": "Blank country",
            "target_field_id": region,
            "comparison_operator": "is_empty",
            "target_value": "Unassigned"
        }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Chain rule updated.");

    let rule = body_json(get_auth(build_test_app(pool.clone()), &uri, &token).await).await["data"].clone();
    assert_eq!(rule["rule_name"], "Blank country");
    assert_eq!(rule["comparison_operator"], "is_empty");
    assert_eq!(rule["trigger_value"], Value::Null);
    assert_eq!(rule["target_value"], "Unassigned");

    // Back to equals: the trigger is required again.
    let response = put_json_auth(
        build_test_app(pool.clone()),
        &uri,
        json!({
            "rule_name": "Blank country",
            "target_field_id": region,
            "comparison_operator": "equals",
            "target_value": "Unassigned"
        }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = put_json_auth(
        build_test_app(pool.clone()),
        &uri,
        json!({
            "rule_name": "Country to region",
            "target_field_id": region,
            "comparison_operator": "equals",
            "trigger_value": "France",
            "target_value": "EMEA"
        }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let rule = body_json(get_auth(build_test_app(pool.clone()), &uri, &token).await).await["data"].clone();
    assert_eq!(rule["trigger_value"], "France");
    assert!(field_is_read_only(&pool, &token, region).await);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_retarget_moves_read_only_flag(pool: PgPool) {
    let token = manager_token(&pool).await;
    let country = create_field(&pool, &token, "leads", "Country").await;
    let region = create_field(&pool, &token, "leads", "Region").await;
    let territory = create_field(&pool, &token, "leads", "Territory").await;
    let (_, created) = create_rule(&pool, &token, simple_rule(country, region, "India", "APAC")).await;

    let response = put_json_auth(
        build_test_app(pool.clone()),
        &format!("/api/v1/chain-rules/{}", created["id"]),
        json!({
            "rule_name": "Country to territory",
            "target_field_id": territory,
            "trigger_value": "India",
            "target_value": "South"
        }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["message"],
        "Chain rule updated. Field 'Territory' is now read-only."
    );

    assert!(!field_is_read_only(&pool, &token, region).await);
    assert!(field_is_read_only(&pool, &token, territory).await);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_delete_releases_target_only_when_last(pool: PgPool) {
    let token = manager_token(&pool).await;
    let country = create_field(&pool, &token, "leads", "Country").await;
    let status_field = create_field(&pool, &token, "leads", "Status").await;
    let region = create_field(&pool, &token, "leads", "Region").await;

    let (_, first) = create_rule(&pool, &token, simple_rule(country, region, "India", "APAC")).await;
    let (_, second) = create_rule(&pool, &token, simple_rule(status_field, region, "Won", "Closed")).await;

    let response = delete_auth(
        build_test_app(pool.clone()),
        &format!("/api/v1/chain-rules/{}", first["id"]),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Chain rule deleted.");
    assert!(field_is_read_only(&pool, &token, region).await);

    let response = delete_auth(
        build_test_app(pool.clone()),
        &format!("/api/v1/chain-rules/{}", second["id"]),
        &token,
    )
    .await;
    assert_eq!(
        body_json(response).await["message"],
        "Chain rule deleted. Target field is no longer read-only."
    );
    assert!(!field_is_read_only(&pool, &token, region).await);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_missing_rule_is_404(pool: PgPool) {
    let token = manager_token(&pool).await;
    let region = create_field(&pool, &token, "leads", "Region").await;

    let response = get_auth(build_test_app(pool.clone()), "/api/v1/chain-rules/555", &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = put_json_auth(
        build_test_app(pool.clone()),
        "/api/v1/chain-rules/555",
        json!({ "rule_name": "x", "target_field_id": region, "trigger_value": "a", "target_value": "b" }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = delete_auth(build_test_app(pool), "/api/v1/chain-rules/555", &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_active_toggle_controls_read_only(pool: PgPool) {
    let token = manager_token(&pool).await;
    let country = create_field(&pool, &token, "leads", "Country").await;
    let region = create_field(&pool, &token, "leads", "Region").await;
    let (_, created) = create_rule(&pool, &token, simple_rule(country, region, "India", "APAC")).await;
    let uri = format!("/api/v1/chain-rules/{}/active", created["id"]);

    let response = put_json_auth(build_test_app(pool.clone()), &uri, json!({ "is_active": false }), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["message"],
        "Chain rule deactivated. Target field is no longer read-only."
    );
    assert!(!field_is_read_only(&pool, &token, region).await);

    let response = put_json_auth(build_test_app(pool.clone()), &uri, json!({ "is_active": true }), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(field_is_read_only(&pool, &token, region).await);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_plain_user_cannot_mutate_rules(pool: PgPool) {
    let manager = manager_token(&pool).await;
    let country = create_field(&pool, &manager, "leads", "Country").await;
    let region = create_field(&pool, &manager, "leads", "Region").await;

    let viewer = create_test_user(&pool, "viewer", ROLE_USER).await;
    let token = token_for(&viewer);

    let (status, _) = create_rule(&pool, &token, simple_rule(country, region, "India", "APAC")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let response = get_auth(build_test_app(pool.clone()), "/api/v1/chain-rules", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!field_is_read_only(&pool, &token, region).await);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_filters_by_module(pool: PgPool) {
    let token = manager_token(&pool).await;
    let country = create_field(&pool, &token, "leads", "Country").await;
    let region = create_field(&pool, &token, "leads", "Region").await;
    let industry = create_field(&pool, &token, "accounts", "Industry").await;
    let segment = create_field(&pool, &token, "accounts", "Segment").await;

    create_rule(&pool, &token, simple_rule(country, region, "India", "APAC")).await;
    let mut account_rule = simple_rule(industry, segment, "Banking", "Finance");
    account_rule["module"] = json!("accounts");
    let (status, _) = create_rule(&pool, &token, account_rule).await;
    assert_eq!(status, StatusCode::CREATED);

    let response = get_auth(build_test_app(pool.clone()), "/api/v1/chain-rules?module=accounts", &token).await;
    let json = body_json(response).await;
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["source_field_name"], "industry");

    assert_eq!(rule_count(&pool, &token).await, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_evaluate_applies_active_rules(pool: PgPool) {
    let token = manager_token(&pool).await;
    let country = create_field(&pool, &token, "leads", "Country").await;
    let region = create_field(&pool, &token, "leads", "Region").await;
    let team = create_field(&pool, &token, "leads", "Team").await;

    create_rule(&pool, &token, simple_rule(country, region, "India", "APAC")).await;
    // Chained: reads the value the first rule assigns.
    create_rule(&pool, &token, simple_rule(region, team, "APAC", "Asia Sales")).await;

    let response = post_json_auth(
        build_test_app(pool.clone()),
        "/api/v1/chain-rules/evaluate",
        json!({ "module": "leads", "record": { "country": "India" } }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = body_json(response).await["data"].clone();
    let assignments = outcome["assignments"].as_array().unwrap();
    assert_eq!(assignments.len(), 2);
    assert_eq!(assignments[0]["field_name"], "region");
    assert_eq!(assignments[0]["value"], "APAC");
    assert_eq!(outcome["record"]["team"], "Asia Sales");

    // Nothing fires for a non-matching record.
    let response = post_json_auth(
        build_test_app(pool.clone()),
        "/api/v1/chain-rules/evaluate",
        json!({ "module": "leads", "record": { "country": "Peru" } }),
        &token,
    )
    .await;
    let outcome = body_json(response).await["data"].clone();
    assert_eq!(outcome["assignments"], json!([]));

    let response = post_json_auth(
        build_test_app(pool),
        "/api/v1/chain-rules/evaluate",
        json!({ "module": "planets", "record": {} }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
