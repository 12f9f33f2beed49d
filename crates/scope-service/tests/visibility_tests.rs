//! Contact visibility through `GET /api/v1/contacts/visible`.

use axum::http::StatusCode;
use common::types::ActorId;
use scope_test_utils::{boss_scenario, OrgFixture, TestApp};
use serde_json::Value;
use std::collections::BTreeSet;

const VISIBLE: &str = "/api/v1/contacts/visible";

fn leaf_ids(body: &Value) -> BTreeSet<String> {
    body["leaf_ids"]
        .as_array()
        .map(|ids| {
            ids.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn owned_by(org: &OrgFixture, names: &[&str]) -> BTreeSet<String> {
    let owners: Vec<ActorId> = names.iter().map(|n| org.id(n)).collect();
    org.leaves()
        .iter()
        .filter(|l| owners.contains(&l.owner_actor_id))
        .map(|l| l.id.to_string())
        .collect()
}

#[tokio::test]
async fn test_manager_sees_own_and_subordinate_contacts() -> Result<(), anyhow::Error> {
    let org = boss_scenario(false);
    let app = TestApp::new(org.store());

    let (status, body) = app.get(VISIBLE, Some(org.id("Boss"))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 6);
    assert_eq!(leaf_ids(&body), owned_by(&org, &["Boss", "Rep1", "Rep2"]));

    let (_, body) = app.get(VISIBLE, Some(org.id("Rep1"))).await?;
    assert_eq!(body["count"], 3);
    assert_eq!(leaf_ids(&body), owned_by(&org, &["Rep1"]));

    Ok(())
}

#[tokio::test]
async fn test_admin_sees_everything() -> Result<(), anyhow::Error> {
    let org = boss_scenario(false).manager("Elsewhere").contacts("Elsewhere", 4);
    let app = TestApp::new(org.store());

    let (status, body) = app.get(VISIBLE, Some(org.id("Admin"))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 10);

    Ok(())
}

#[tokio::test]
async fn test_unknown_caller_sees_nothing() -> Result<(), anyhow::Error> {
    let org = boss_scenario(false);
    let app = TestApp::new(org.store());

    let (status, body) = app.get(VISIBLE, Some(ActorId::new())).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);

    Ok(())
}

#[tokio::test]
async fn test_missing_caller_is_unauthorized() -> Result<(), anyhow::Error> {
    let app = TestApp::new(boss_scenario(false).store());

    let (status, body) = app.get(VISIBLE, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    Ok(())
}

#[tokio::test]
async fn test_creator_keeps_access_after_reassignment() -> Result<(), anyhow::Error> {
    let org = boss_scenario(false)
        .manager("Outsider")
        .reassigned_contact("Outsider", "Rep2");
    let app = TestApp::new(org.store());

    let (_, body) = app.get(VISIBLE, Some(org.id("Outsider"))).await?;
    assert_eq!(body["count"], 1);

    // Owner's chain sees it too.
    let (_, body) = app.get(VISIBLE, Some(org.id("Boss"))).await?;
    assert_eq!(body["count"], 7);

    Ok(())
}

#[tokio::test]
async fn test_cycle_fails_instead_of_returning_partial_scope() -> Result<(), anyhow::Error> {
    let org = OrgFixture::new()
        .manager("A")
        .manager("B")
        .reports_to("A", "B")
        .reports_to("B", "A")
        .contacts("A", 1);
    let app = TestApp::new(org.store());

    let (status, body) = app.get(VISIBLE, Some(org.id("A"))).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "STATISTICS_UNAVAILABLE");

    Ok(())
}

#[tokio::test]
async fn test_repeated_reads_return_identical_sets() -> Result<(), anyhow::Error> {
    let org = boss_scenario(true).manager("Elsewhere").contacts("Elsewhere", 2);
    let app = TestApp::new(org.store());

    for caller in ["Boss", "Admin", "Rep2"] {
        let (first_status, first) = app.get(VISIBLE, Some(org.id(caller))).await?;
        let (second_status, second) = app.get(VISIBLE, Some(org.id(caller))).await?;
        assert_eq!(first_status, StatusCode::OK);
        assert_eq!(second_status, StatusCode::OK);
        assert_eq!(first, second, "{caller}");
        assert_eq!(leaf_ids(&first), leaf_ids(&second), "{caller}");
    }

    Ok(())
}
