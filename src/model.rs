//! Resolved experiment domain model
//!
//! The [`Experiment`] is the root aggregate: it owns its [`Phase`]s, phases
//! own [`Treatment`]s, and treatments reference the [`Group`] and
//! [`Recommender`] they pair. Deduplicated group/recommender views are
//! computed from the treatments, ordered by first appearance.
//!
//! All types serialize field-for-field as flat records with UUIDs as strings
//! and dates in ISO-8601, for reporting/export consumers.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Team owning one or more experiments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub team_id: Uuid,
    pub name: String,
    /// Member account identifiers
    pub members: Vec<Uuid>,
}

/// A user group with a size constraint.
///
/// Two groups may share size constraints (via `identical_to` in the manifest)
/// while keeping independent identities and assignment sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub group_id: Uuid,
    pub name: String,
    /// Minimum required member count
    pub minimum_size: u32,
}

/// A recommendation endpoint participating in an experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommender {
    pub recommender_id: Uuid,
    pub name: String,
    /// Callable endpoint URL
    pub endpoint: String,
}

/// The pairing of one group with one recommender during one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treatment {
    pub treatment_id: Uuid,
    pub group: Group,
    pub recommender: Recommender,
    /// Optional newsletter template identifier
    pub template: Option<String>,
}

/// A contiguous time segment of an experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub phase_id: Uuid,
    /// Unique within an experiment
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub treatments: Vec<Treatment>,
}

impl Phase {
    pub fn duration(&self) -> Duration {
        self.end_date - self.start_date
    }
}

/// Root aggregate: a fully resolved experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: Uuid,
    /// Owning dataset reference, if any
    pub dataset_id: Option<Uuid>,
    pub team: Option<Team>,
    pub description: String,
    /// Inclusive; first phase starts here
    pub start_date: NaiveDate,
    /// Inclusive; `start_date - 1 day + sum(phase durations)`
    pub end_date: NaiveDate,
    pub phases: Vec<Phase>,
}

impl Experiment {
    /// Distinct recommenders referenced by any treatment, deduplicated by
    /// name and ordered by first appearance (first phase, first treatment).
    pub fn recommenders(&self) -> Vec<&Recommender> {
        let mut seen = Vec::new();
        for phase in &self.phases {
            for treatment in &phase.treatments {
                if !seen
                    .iter()
                    .any(|r: &&Recommender| r.name == treatment.recommender.name)
                {
                    seen.push(&treatment.recommender);
                }
            }
        }
        seen
    }

    /// Distinct groups referenced by any treatment, same ordering rule as
    /// [`Experiment::recommenders`].
    pub fn groups(&self) -> Vec<&Group> {
        let mut seen = Vec::new();
        for phase in &self.phases {
            for treatment in &phase.treatments {
                if !seen.iter().any(|g: &&Group| g.name == treatment.group.name) {
                    seen.push(&treatment.group);
                }
            }
        }
        seen
    }
}

/// Concrete placement of one account into one experiment group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub assignment_id: Uuid,
    pub account_id: Uuid,
    pub group_id: Uuid,
    /// Soft withdrawal flag; the record is kept when a user opts out
    #[serde(default)]
    pub opted_out: bool,
}

impl Assignment {
    pub fn new(account_id: Uuid, group_id: Uuid) -> Assignment {
        Assignment {
            assignment_id: Uuid::new_v4(),
            account_id,
            group_id,
            opted_out: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str) -> Group {
        Group {
            group_id: Uuid::new_v4(),
            name: name.to_string(),
            minimum_size: 10,
        }
    }

    fn recommender(name: &str) -> Recommender {
        Recommender {
            recommender_id: Uuid::new_v4(),
            name: name.to_string(),
            endpoint: format!("http://recs/{}", name),
        }
    }

    fn treatment(g: &Group, r: &Recommender) -> Treatment {
        Treatment {
            treatment_id: Uuid::new_v4(),
            group: g.clone(),
            recommender: r.clone(),
            template: None,
        }
    }

    fn phase(name: &str, treatments: Vec<Treatment>) -> Phase {
        Phase {
            phase_id: Uuid::new_v4(),
            name: name.to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 8).unwrap(),
            treatments,
        }
    }

    #[test]
    fn test_recommender_dedup_order() {
        let g = group("g");
        let (a, b, c) = (recommender("a"), recommender("b"), recommender("c"));

        let experiment = Experiment {
            experiment_id: Uuid::new_v4(),
            dataset_id: None,
            team: None,
            description: String::new(),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 14).unwrap(),
            phases: vec![
                phase("p1", vec![treatment(&g, &a), treatment(&g, &b)]),
                phase("p2", vec![treatment(&g, &b), treatment(&g, &c)]),
            ],
        };

        let names: Vec<&str> = experiment
            .recommenders()
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_group_dedup_order() {
        let (g1, g2) = (group("g1"), group("g2"));
        let r = recommender("r");

        let experiment = Experiment {
            experiment_id: Uuid::new_v4(),
            dataset_id: None,
            team: None,
            description: String::new(),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 14).unwrap(),
            phases: vec![
                phase("p1", vec![treatment(&g1, &r)]),
                phase("p2", vec![treatment(&g2, &r), treatment(&g1, &r)]),
            ],
        };

        let names: Vec<&str> = experiment.groups().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["g1", "g2"]);
    }

    #[test]
    fn test_phase_duration() {
        let p = phase("p", vec![]);
        assert_eq!(p.duration(), Duration::days(7));
    }

    #[test]
    fn test_serialization_shape() {
        let g = group("control");
        let json = serde_json::to_value(&g).unwrap();
        assert!(json["group_id"].is_string());
        assert_eq!(json["name"], "control");
        assert_eq!(json["minimum_size"], 10);

        let p = phase("p", vec![]);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["start_date"], "2026-01-01");
        assert_eq!(json["end_date"], "2026-01-08");
    }
}
