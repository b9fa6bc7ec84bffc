//! Scenario tests for manifest resolution against a reference manifest

use chrono::{Duration, NaiveDate};
use pressroom::manifest::Manifest;
use pressroom::resolver::resolve;

/// Reference manifest: 3 declared groups, 3 recommenders, 3 phases
const REFERENCE_MANIFEST: &str = r#"
    [experiment]
    description = "front page personalization study"
    duration = "4 weeks"
    start_date = "2026-09-01"

    [owner]
    name = "audience-research"
    members = ["1d1f84f2-96c5-4d8c-9a20-9e44ac6d0de8"]

    [users.groups.control]
    minimum_size = 200

    [users.groups.personalized]
    minimum_size = 200

    [users.groups.holdout]
    identical_to = "personalized"

    [recommenders]
    x = "http://recs.internal/x"
    topical = "http://recs.internal/topical"
    editorial = "http://recs.internal/editorial"

    [phases]
    sequence = ["baseline", "rollout", "washout"]

    [phases.baseline]
    duration = "1 week"

    [phases.baseline.assignments.control]
    recommender = "editorial"

    [phases.baseline.assignments.personalized]
    recommender = "topical"

    [phases.baseline.assignments.holdout]
    recommender = "x"
    template = "funkyTemplate.html"

    [phases.rollout]
    duration = "2 weeks"

    [phases.rollout.assignments.control]
    recommender = "editorial"

    [phases.rollout.assignments.personalized]
    recommender = "x"

    [phases.rollout.assignments.holdout]
    recommender = "topical"

    [phases.washout]
    duration = "1 week"

    [phases.washout.assignments.control]
    recommender = "editorial"

    [phases.washout.assignments.personalized]
    recommender = "editorial"

    [phases.washout.assignments.holdout]
    recommender = "editorial"
"#;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 15).unwrap()
}

#[test]
fn test_reference_manifest_shape() {
    let manifest = Manifest::from_toml_str(REFERENCE_MANIFEST).unwrap();
    let experiment = resolve(&manifest, today()).unwrap();

    assert_eq!(experiment.groups().len(), 3);
    assert_eq!(experiment.recommenders().len(), 3);
    assert_eq!(experiment.phases.len(), 3);
}

#[test]
fn test_reference_manifest_phase_one_treatments() {
    let manifest = Manifest::from_toml_str(REFERENCE_MANIFEST).unwrap();
    let experiment = resolve(&manifest, today()).unwrap();

    let baseline = &experiment.phases[0];
    assert_eq!(baseline.name, "baseline");
    assert_eq!(baseline.treatments.len(), 3);

    let x_treatments: Vec<_> = baseline
        .treatments
        .iter()
        .filter(|t| t.recommender.name == "x")
        .collect();
    assert_eq!(x_treatments.len(), 1);
    assert_eq!(
        x_treatments[0].template.as_deref(),
        Some("funkyTemplate.html")
    );
}

#[test]
fn test_reference_manifest_dates() {
    let manifest = Manifest::from_toml_str(REFERENCE_MANIFEST).unwrap();
    let experiment = resolve(&manifest, today()).unwrap();

    let start = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
    assert_eq!(experiment.start_date, start);
    // 4 weeks, both ends inclusive
    assert_eq!(experiment.end_date, start + Duration::days(27));

    // 1 + 2 + 1 weeks, contiguous
    assert_eq!(experiment.phases[0].start_date, start);
    assert_eq!(experiment.phases[0].end_date, start + Duration::weeks(1));
    assert_eq!(experiment.phases[1].start_date, start + Duration::weeks(1));
    assert_eq!(experiment.phases[1].end_date, start + Duration::weeks(3));
    assert_eq!(experiment.phases[2].start_date, start + Duration::weeks(3));
    assert_eq!(experiment.phases[2].end_date, start + Duration::weeks(4));
}

#[test]
fn test_cloned_group_is_independent() {
    let manifest = Manifest::from_toml_str(REFERENCE_MANIFEST).unwrap();
    let experiment = resolve(&manifest, today()).unwrap();

    let groups = experiment.groups();
    let personalized = groups.iter().find(|g| g.name == "personalized").unwrap();
    let holdout = groups.iter().find(|g| g.name == "holdout").unwrap();

    assert_eq!(holdout.minimum_size, personalized.minimum_size);
    assert_ne!(holdout.group_id, personalized.group_id);
}

#[test]
fn test_team_carried_from_owner_section() {
    let manifest = Manifest::from_toml_str(REFERENCE_MANIFEST).unwrap();
    let experiment = resolve(&manifest, today()).unwrap();

    let team = experiment.team.as_ref().unwrap();
    assert_eq!(team.name, "audience-research");
    assert_eq!(team.members.len(), 1);
}

#[test]
fn test_resolution_is_repeatable_apart_from_ids() {
    let manifest = Manifest::from_toml_str(REFERENCE_MANIFEST).unwrap();
    let a = resolve(&manifest, today()).unwrap();
    let b = resolve(&manifest, today()).unwrap();

    assert_eq!(a.start_date, b.start_date);
    assert_eq!(a.end_date, b.end_date);
    assert_ne!(a.experiment_id, b.experiment_id);

    let names = |e: &pressroom::Experiment| -> Vec<String> {
        e.recommenders().iter().map(|r| r.name.clone()).collect()
    };
    assert_eq!(names(&a), names(&b));
}
