//! Statistics rollup through `GET /api/v1/stats`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::http::StatusCode;
use common::types::ActorId;
use scope_test_utils::{
    actor_entry, assert_aggregates_cover_own, assert_not_displayed,
    assert_own_totals_sum_to_bucket_total, boss_scenario, report_buckets, OrgFixture, TestApp,
};
use serde_json::Value;
use std::collections::HashMap;

const STATS: &str = "/api/v1/stats";

/// The only bucket in a single-bucket report.
fn single_bucket(report: &Value) -> &Value {
    let buckets = report_buckets(report);
    assert_eq!(buckets.len(), 1, "expected exactly one bucket: {report}");
    buckets.into_iter().next().map(|(.., b)| b).unwrap()
}

fn totals(bucket: &Value, actor: ActorId) -> (u64, u64) {
    let entry = actor_entry(bucket, actor).expect("actor should be displayed");
    (
        entry["own_total"].as_u64().unwrap(),
        entry["aggregate_total"].as_u64().unwrap(),
    )
}

#[tokio::test]
async fn test_manager_view_collapses_to_own_key() -> Result<(), anyhow::Error> {
    let org = boss_scenario(false);
    let app = TestApp::new(org.store());

    let (status, report) = app.get(STATS, Some(org.id("Boss"))).await?;
    assert_eq!(status, StatusCode::OK);

    let bucket = single_bucket(&report);
    assert_eq!(bucket["total"], 6);
    assert_eq!(bucket["actors"].as_object().unwrap().len(), 1);
    assert_eq!(totals(bucket, org.id("Boss")), (1, 6));
    assert_eq!(
        actor_entry(bucket, org.id("Boss")).unwrap()["display_name"],
        "Boss"
    );

    Ok(())
}

#[tokio::test]
async fn test_admin_view_shows_every_key() -> Result<(), anyhow::Error> {
    let org = boss_scenario(false);
    let app = TestApp::new(org.store());

    let (status, report) = app.get(STATS, Some(org.id("Admin"))).await?;
    assert_eq!(status, StatusCode::OK);

    let bucket = single_bucket(&report);
    assert_eq!(bucket["actors"].as_object().unwrap().len(), 4);
    assert_eq!(totals(bucket, org.id("Admin")), (0, 0));
    assert_eq!(totals(bucket, org.id("Boss")), (1, 6));
    assert_eq!(totals(bucket, org.id("Rep1")), (3, 3));
    assert_eq!(totals(bucket, org.id("Rep2")), (2, 2));
    assert_own_totals_sum_to_bucket_total(&report);
    assert_aggregates_cover_own(&report);

    Ok(())
}

#[tokio::test]
async fn test_leaf_rep_sees_only_itself() -> Result<(), anyhow::Error> {
    let org = boss_scenario(false);
    let app = TestApp::new(org.store());

    let (_, report) = app.get(STATS, Some(org.id("Rep2"))).await?;
    let bucket = single_bucket(&report);
    assert_eq!(bucket["total"], 2);
    assert_eq!(totals(bucket, org.id("Rep2")), (2, 2));
    assert_not_displayed(&report, &[org.id("Boss"), org.id("Rep1")]);

    Ok(())
}

#[tokio::test]
async fn test_placeholder_contacts_roll_into_manager() -> Result<(), anyhow::Error> {
    let org = boss_scenario(true);
    let app = TestApp::new(org.store());

    for caller in ["Boss", "Admin"] {
        let (status, report) = app.get(STATS, Some(org.id(caller))).await?;
        assert_eq!(status, StatusCode::OK);

        let bucket = single_bucket(&report);
        assert_eq!(bucket["total"], 6);
        assert_eq!(totals(bucket, org.id("Boss")), (4, 6));
        assert_not_displayed(&report, &[org.id("Rep1")]);
    }

    let (_, admin_report) = app.get(STATS, Some(org.id("Admin"))).await?;
    assert_own_totals_sum_to_bucket_total(&admin_report);

    Ok(())
}

#[tokio::test]
async fn test_placeholder_in_middle_of_chain_is_skipped() -> Result<(), anyhow::Error> {
    let org = OrgFixture::new()
        .admin("Admin")
        .manager("Director")
        .placeholder("Demo Lead")
        .manager("Rep")
        .reports_to("Demo Lead", "Director")
        .reports_to("Rep", "Demo Lead")
        .contacts("Rep", 5)
        .contacts("Demo Lead", 2);
    let app = TestApp::new(org.store());

    let (_, report) = app.get(STATS, Some(org.id("Admin"))).await?;
    let bucket = single_bucket(&report);
    assert_eq!(totals(bucket, org.id("Rep")), (5, 5));
    assert_eq!(totals(bucket, org.id("Director")), (2, 7));
    assert_not_displayed(&report, &[org.id("Demo Lead")]);
    assert_own_totals_sum_to_bucket_total(&report);

    Ok(())
}

#[tokio::test]
async fn test_unknown_caller_gets_empty_report() -> Result<(), anyhow::Error> {
    let org = boss_scenario(false);
    let app = TestApp::new(org.store());

    let (status, report) = app.get(STATS, Some(ActorId::new())).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(report_buckets(&report).is_empty());

    Ok(())
}

#[tokio::test]
async fn test_cycle_reports_statistics_unavailable() -> Result<(), anyhow::Error> {
    let org = OrgFixture::new()
        .admin("Admin")
        .manager("A")
        .manager("B")
        .reports_to("A", "B")
        .reports_to("B", "A")
        .contacts("A", 2);
    let app = TestApp::new(org.store());

    let (status, body) = app.get(STATS, Some(org.id("Admin"))).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "STATISTICS_UNAVAILABLE");
    assert_eq!(
        body["error"]["message"],
        "Statistics temporarily unavailable"
    );
    assert!(body.get("organizations").is_none());

    Ok(())
}

#[tokio::test]
async fn test_depth_ceiling_reports_statistics_unavailable() -> Result<(), anyhow::Error> {
    let org = OrgFixture::new()
        .admin("Admin")
        .manager("L0")
        .manager("L1")
        .manager("L2")
        .manager("L3")
        .reports_to("L1", "L0")
        .reports_to("L2", "L1")
        .reports_to("L3", "L2")
        .contacts("L3", 1)
        .manager("Solo")
        .contacts("Solo", 2);
    let vars = HashMap::from([("HIERARCHY_MAX_DEPTH".to_string(), "2".to_string())]);
    let app = TestApp::with_vars(org.store(), vars);

    let (status, _) = app.get(STATS, Some(org.id("Admin"))).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = app.get(STATS, Some(org.id("L0"))).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // A separate shallow tree is unaffected.
    let (status, report) = app.get(STATS, Some(org.id("Solo"))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(single_bucket(&report)["total"], 2);

    Ok(())
}

#[tokio::test]
async fn test_cohort_range_is_zero_filled() -> Result<(), anyhow::Error> {
    let org = boss_scenario(false);
    let app = TestApp::new(org.store());
    let bucket = org.bucket();

    let uri = format!(
        "{STATS}?organization={}&program={}&cohort_from=2022&cohort_to=2025",
        bucket.organization_id, bucket.program_id
    );
    let (status, report) = app.get(&uri, Some(org.id("Boss"))).await?;
    assert_eq!(status, StatusCode::OK);

    let buckets = report_buckets(&report);
    assert_eq!(buckets.len(), 4);
    for (_, _, cohort, stats) in buckets {
        let expected = if cohort == "2024" { 6 } else { 0 };
        assert_eq!(stats["total"], expected, "cohort {cohort}");
    }

    Ok(())
}

#[tokio::test]
async fn test_filters_restrict_buckets() -> Result<(), anyhow::Error> {
    let org = boss_scenario(false);
    let other_year = org.bucket_for_year(2019);
    let org = org.contacts_in("Rep2", other_year, 4);
    let app = TestApp::new(org.store());

    let (_, report) = app.get(STATS, Some(org.id("Admin"))).await?;
    assert_eq!(report_buckets(&report).len(), 2);

    let (_, report) = app
        .get(&format!("{STATS}?cohort_from=2020"), Some(org.id("Admin")))
        .await?;
    let bucket = single_bucket(&report);
    assert_eq!(bucket["total"], 6);

    Ok(())
}

#[tokio::test]
async fn test_invalid_cohort_range_is_bad_request() -> Result<(), anyhow::Error> {
    let org = boss_scenario(false);
    let app = TestApp::new(org.store());

    let (status, body) = app
        .get(
            &format!("{STATS}?cohort_from=2025&cohort_to=2020"),
            Some(org.id("Boss")),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, _) = app
        .get(
            &format!("{STATS}?cohort_from=1900&cohort_to=2024"),
            Some(org.id("Boss")),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}
