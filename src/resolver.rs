//! Manifest resolution
//!
//! Pure transformation from a parsed [`Manifest`] into a fully resolved
//! [`Experiment`] graph: absolute phase date ranges computed from relative
//! durations, `identical_to` group aliases materialized as deep copies, and
//! treatments wired to their group/recommender objects.
//!
//! Resolution is deterministic given the same manifest, the same `today`, and
//! the same [`IdSource`]. Production callers use [`resolve`], which draws
//! random v4 identities; tests inject a sequential source via
//! [`resolve_with`].

use crate::duration::convert_duration;
use crate::manifest::{GroupSpec, Manifest};
use crate::model::{Experiment, Group, Phase, Recommender, Team, Treatment};
use crate::{Error, Result};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Source of fresh identities for resolved entities
pub trait IdSource {
    fn next_id(&mut self) -> Uuid;
}

/// Default identity source: random v4 UUIDs
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&mut self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Resolve a manifest into an experiment graph.
///
/// `today` anchors the default start date: when the manifest gives no
/// explicit `start_date`, the experiment starts tomorrow relative to `today`.
pub fn resolve(manifest: &Manifest, today: NaiveDate) -> Result<Experiment> {
    resolve_with(manifest, today, &mut RandomIds)
}

/// [`resolve`] with an explicit identity source, for deterministic tests.
pub fn resolve_with(
    manifest: &Manifest,
    today: NaiveDate,
    ids: &mut dyn IdSource,
) -> Result<Experiment> {
    let start_date = manifest
        .experiment
        .start_date
        .unwrap_or(today + Duration::days(1));
    let total = convert_duration(&manifest.experiment.duration)?;

    // Phase durations sum to exactly the experiment span, both ends inclusive.
    let end_date = start_date - Duration::days(1) + total;

    let team = Team {
        team_id: manifest.owner.team_id.unwrap_or_else(|| ids.next_id()),
        name: manifest.owner.name.clone(),
        members: manifest.owner.members.clone(),
    };

    let recommenders: BTreeMap<String, Recommender> = manifest
        .recommenders
        .iter()
        .map(|(name, endpoint)| {
            (
                name.clone(),
                Recommender {
                    recommender_id: ids.next_id(),
                    name: name.clone(),
                    endpoint: endpoint.clone(),
                },
            )
        })
        .collect();

    let groups = resolve_groups(manifest, ids)?;

    let mut experiment = Experiment {
        experiment_id: manifest.experiment.id.unwrap_or_else(|| ids.next_id()),
        dataset_id: manifest.experiment.dataset_id,
        team: Some(team),
        description: manifest.experiment.description.clone(),
        start_date,
        end_date,
        phases: Vec::new(),
    };

    for phase_name in &manifest.phases.sequence {
        let spec = manifest
            .phases
            .phases
            .get(phase_name)
            .ok_or_else(|| Error::UnknownReference(phase_name.clone()))?;

        // Placement is derived from the phases already appended, so each
        // phase starts exactly where the prior coverage ends.
        let elapsed: Duration = experiment
            .phases
            .iter()
            .map(|p| p.duration())
            .fold(Duration::zero(), |acc, d| acc + d);
        let phase_start = experiment.start_date + elapsed;
        let phase_end = phase_start + convert_duration(&spec.duration)?;

        let mut treatments = Vec::new();
        for (group_name, assignment) in &spec.assignments {
            let group = groups
                .get(group_name)
                .ok_or_else(|| Error::UnknownReference(group_name.clone()))?;
            let recommender = recommenders
                .get(&assignment.recommender)
                .ok_or_else(|| Error::UnknownReference(assignment.recommender.clone()))?;

            treatments.push(Treatment {
                treatment_id: ids.next_id(),
                group: group.clone(),
                recommender: recommender.clone(),
                template: assignment.template.clone(),
            });
        }

        experiment.phases.push(Phase {
            phase_id: ids.next_id(),
            name: phase_name.clone(),
            start_date: phase_start,
            end_date: phase_end,
            treatments,
        });
    }

    Ok(experiment)
}

/// Build the group set, materializing `identical_to` aliases as deep copies
/// with fresh identities.
///
/// Aliases are resolved by fixed-point passes over the unresolved entries, so
/// a group may alias one declared after it. A target name absent from the
/// manifest fails with `UnknownReference`; an alias cycle fails with
/// `Validation` naming the stuck groups.
fn resolve_groups(manifest: &Manifest, ids: &mut dyn IdSource) -> Result<BTreeMap<String, Group>> {
    let mut resolved: BTreeMap<String, Group> = BTreeMap::new();
    let mut pending: BTreeMap<&String, &String> = BTreeMap::new();

    for (name, spec) in &manifest.users.groups {
        match spec {
            GroupSpec::Sized(sized) => {
                resolved.insert(
                    name.clone(),
                    Group {
                        group_id: ids.next_id(),
                        name: name.clone(),
                        minimum_size: sized.minimum_size,
                    },
                );
            }
            GroupSpec::IdenticalTo(alias) => {
                if !manifest.users.groups.contains_key(&alias.identical_to) {
                    return Err(Error::UnknownReference(alias.identical_to.clone()));
                }
                pending.insert(name, &alias.identical_to);
            }
        }
    }

    while !pending.is_empty() {
        let ready: Vec<String> = pending
            .iter()
            .filter(|(_, target)| resolved.contains_key(**target))
            .map(|(name, _)| (*name).clone())
            .collect();

        if ready.is_empty() {
            let stuck: Vec<&str> = pending.keys().map(|n| n.as_str()).collect();
            return Err(Error::Validation(format!(
                "group alias cycle involving: {}",
                stuck.join(", ")
            )));
        }

        for name in ready {
            if let Some(target) = pending.remove(&name) {
                let template = resolved[target].clone();
                resolved.insert(
                    name.clone(),
                    Group {
                        group_id: ids.next_id(),
                        name,
                        ..template
                    },
                );
            }
        }
    }

    Ok(resolved)
}
