//! Invariant checks on statistics output.
//!
//! Work on the JSON body returned by `GET /api/v1/stats` so integration tests
//! check exactly what callers receive.

use common::types::ActorId;
use serde_json::Value;

/// Every bucket in the report as `(organization, program, cohort, bucket)`.
pub fn report_buckets(report: &Value) -> Vec<(String, String, String, &Value)> {
    let mut out = Vec::new();
    let orgs = report["organizations"]
        .as_object()
        .expect("report should have an organizations object");
    for (org, programs) in orgs {
        for (program, cohorts) in programs.as_object().expect("programs object") {
            for (cohort, bucket) in cohorts.as_object().expect("cohorts object") {
                out.push((org.clone(), program.clone(), cohort.clone(), bucket));
            }
        }
    }
    out
}

/// Stats entry for `actor` in `bucket`, if displayed.
pub fn actor_entry<'a>(bucket: &'a Value, actor: ActorId) -> Option<&'a Value> {
    bucket["actors"].get(actor.to_string())
}

/// Sum of `own_total` over displayed keys equals the bucket total.
///
/// Holds for admin views, where no key is hidden.
pub fn assert_own_totals_sum_to_bucket_total(report: &Value) {
    for (org, program, cohort, bucket) in report_buckets(report) {
        let total = bucket["total"].as_u64().expect("total should be a number");
        let own_sum: u64 = bucket["actors"]
            .as_object()
            .expect("actors object")
            .values()
            .map(|s| s["own_total"].as_u64().expect("own_total"))
            .sum();
        assert_eq!(
            own_sum, total,
            "own totals do not sum to bucket total in {org}/{program}/{cohort}"
        );
    }
}

/// No bucket displays any of `actors` as a key.
pub fn assert_not_displayed(report: &Value, actors: &[ActorId]) {
    for (org, program, cohort, bucket) in report_buckets(report) {
        for actor in actors {
            assert!(
                actor_entry(bucket, *actor).is_none(),
                "actor {actor} displayed in {org}/{program}/{cohort}"
            );
        }
    }
}

/// Aggregate of every displayed key is at least its own total.
pub fn assert_aggregates_cover_own(report: &Value) {
    for (org, program, cohort, bucket) in report_buckets(report) {
        for (key, stat) in bucket["actors"].as_object().expect("actors object") {
            let own = stat["own_total"].as_u64().expect("own_total");
            let agg = stat["aggregate_total"].as_u64().expect("aggregate_total");
            assert!(
                agg >= own,
                "aggregate below own total for {key} in {org}/{program}/{cohort}"
            );
        }
    }
}
