//! Experiment manifest model
//!
//! A manifest is the declarative TOML description of an experiment before any
//! identities are assigned or dates resolved. Example:
//!
//! ```toml
//! [experiment]
//! description = "headline personalization pilot"
//! duration = "3 weeks"
//! start_date = "2026-09-01"      # optional, defaults to tomorrow
//!
//! [owner]
//! name = "recs-team"
//! members = ["5a831047-3dcb-4595-a834-21f47a3e0f99"]
//!
//! [users.groups.control]
//! minimum_size = 100
//!
//! [users.groups.shadow]
//! identical_to = "control"
//!
//! [recommenders]
//! x = "http://recs.internal/x"
//!
//! [phases]
//! sequence = ["warmup"]
//!
//! [phases.warmup]
//! duration = "1 week"
//!
//! [phases.warmup.assignments.control]
//! recommender = "x"
//! template = "funkyTemplate.html"
//! ```
//!
//! The model is ephemeral: parsed, handed to the resolver, discarded.

use crate::{Error, Result};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Deserialize;
use uuid::Uuid;

/// Top-level manifest document
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub experiment: ExperimentSpec,
    pub owner: OwnerSpec,
    pub users: UsersSpec,
    /// Recommender name -> callable endpoint URL, in declaration order
    pub recommenders: IndexMap<String, String>,
    pub phases: PhasesSpec,
}

/// `[experiment]` section
#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentSpec {
    /// Explicit experiment identity; generated when absent
    pub id: Option<Uuid>,
    /// Owning dataset reference, if any
    pub dataset_id: Option<Uuid>,
    pub description: String,
    /// Total experiment length, e.g. `"8 weeks"`
    pub duration: String,
    /// ISO-8601 calendar date; defaults to tomorrow at resolution time
    pub start_date: Option<NaiveDate>,
}

/// `[owner]` section: the team running the experiment
#[derive(Debug, Clone, Deserialize)]
pub struct OwnerSpec {
    /// Explicit team identity; generated when absent
    pub team_id: Option<Uuid>,
    pub name: String,
    /// Member account identifiers
    #[serde(default)]
    pub members: Vec<Uuid>,
}

/// `[users]` section
#[derive(Debug, Clone, Deserialize)]
pub struct UsersSpec {
    pub groups: IndexMap<String, GroupSpec>,
}

/// One `[users.groups.<name>]` entry.
///
/// A group is either sized directly or declared structurally identical to
/// another group. The two forms are mutually exclusive; `deny_unknown_fields`
/// on the variants makes a table carrying both keys fail validation instead
/// of silently picking one.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GroupSpec {
    Sized(SizedGroupSpec),
    IdenticalTo(AliasGroupSpec),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SizedGroupSpec {
    /// Minimum required member count
    #[serde(deserialize_with = "positive_size")]
    pub minimum_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AliasGroupSpec {
    /// Name of the group to clone size constraints from
    pub identical_to: String,
}

fn positive_size<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let size = u32::deserialize(deserializer)?;
    if size == 0 {
        return Err(serde::de::Error::custom("minimum_size must be positive"));
    }
    Ok(size)
}

/// `[phases]` section: an explicit ordering plus one sub-table per phase
#[derive(Debug, Clone, Deserialize)]
pub struct PhasesSpec {
    /// Phase names in chronological order
    pub sequence: Vec<String>,
    /// Named phase definitions (keys beyond `sequence` are phase tables)
    #[serde(flatten)]
    pub phases: IndexMap<String, PhaseSpec>,
}

/// One `[phases.<name>]` table
#[derive(Debug, Clone, Deserialize)]
pub struct PhaseSpec {
    /// Phase length, e.g. `"1 week"`
    pub duration: String,
    /// Group name -> treatment assignment for this phase, in declaration order
    #[serde(default)]
    pub assignments: IndexMap<String, TreatmentSpec>,
}

/// One `[phases.<name>.assignments.<group>]` table
#[derive(Debug, Clone, Deserialize)]
pub struct TreatmentSpec {
    /// Recommender name (must appear in `[recommenders]`)
    pub recommender: String,
    /// Optional newsletter template identifier
    pub template: Option<String>,
}

impl Manifest {
    /// Parse and validate a TOML manifest document.
    ///
    /// Missing or mistyped fields fail with [`Error::Validation`] naming the
    /// offending field; resolution never proceeds on a bad document.
    pub fn from_toml_str(text: &str) -> Result<Manifest> {
        let manifest: Manifest =
            toml::from_str(text).map_err(|e| Error::Validation(e.message().to_string()))?;

        // Every name in the sequence needs a phase table, and vice versa.
        for name in &manifest.phases.sequence {
            if !manifest.phases.phases.contains_key(name) {
                return Err(Error::Validation(format!(
                    "phases.sequence names {:?} but no [phases.{}] table exists",
                    name, name
                )));
            }
        }
        for name in manifest.phases.phases.keys() {
            if !manifest.phases.sequence.contains(name) {
                return Err(Error::Validation(format!(
                    "[phases.{}] is defined but missing from phases.sequence",
                    name
                )));
            }
        }

        Ok(manifest)
    }
}
