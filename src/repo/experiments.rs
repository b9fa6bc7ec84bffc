//! Experiment graph persistence
//!
//! The resolved experiment graph is written in a single transaction: the
//! experiment row, its team, the deduplicated groups and recommenders, every
//! phase and every treatment either all commit or none do. A partial write
//! (phases without treatments) would break the contiguous-coverage invariant
//! the eligibility queries depend on.

use crate::db::models::{AssignmentRow, ExperimentRow, PhaseRow};
use crate::model::{Assignment, Experiment, Team};
use crate::repo::accounts::conflict_on_unique;
use crate::{Error, Result};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;
use uuid::Uuid;

pub struct ExperimentRepository {
    pool: SqlitePool,
}

impl ExperimentRepository {
    pub fn new(pool: SqlitePool) -> ExperimentRepository {
        ExperimentRepository { pool }
    }

    /// Persist a resolved experiment graph, all-or-nothing.
    ///
    /// A uniqueness violation anywhere in the graph (e.g. a duplicate group
    /// name within the experiment) rolls the whole transaction back and
    /// surfaces as [`Error::Conflict`]; nothing is retried.
    pub async fn store_experiment(&self, experiment: &Experiment) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if let Some(team) = &experiment.team {
            insert_team(&mut tx, team).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO experiments (experiment_id, dataset_id, team_id, description, start_date, end_date)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(experiment.experiment_id.to_string())
        .bind(experiment.dataset_id.map(|id| id.to_string()))
        .bind(experiment.team.as_ref().map(|t| t.team_id.to_string()))
        .bind(&experiment.description)
        .bind(experiment.start_date)
        .bind(experiment.end_date)
        .execute(&mut *tx)
        .await
        .map_err(conflict_on_unique)?;

        for group in experiment.groups() {
            sqlx::query(
                r#"
                INSERT INTO experiment_groups (group_id, experiment_id, name, minimum_size)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(group.group_id.to_string())
            .bind(experiment.experiment_id.to_string())
            .bind(&group.name)
            .bind(group.minimum_size as i64)
            .execute(&mut *tx)
            .await
            .map_err(conflict_on_unique)?;
        }

        for recommender in experiment.recommenders() {
            sqlx::query(
                r#"
                INSERT INTO recommenders (recommender_id, experiment_id, name, endpoint)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(recommender.recommender_id.to_string())
            .bind(experiment.experiment_id.to_string())
            .bind(&recommender.name)
            .bind(&recommender.endpoint)
            .execute(&mut *tx)
            .await
            .map_err(conflict_on_unique)?;
        }

        for phase in &experiment.phases {
            sqlx::query(
                r#"
                INSERT INTO phases (phase_id, experiment_id, name, start_date, end_date)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(phase.phase_id.to_string())
            .bind(experiment.experiment_id.to_string())
            .bind(&phase.name)
            .bind(phase.start_date)
            .bind(phase.end_date)
            .execute(&mut *tx)
            .await
            .map_err(conflict_on_unique)?;

            for treatment in &phase.treatments {
                sqlx::query(
                    r#"
                    INSERT INTO treatments (treatment_id, phase_id, group_id, recommender_id, template)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(treatment.treatment_id.to_string())
                .bind(phase.phase_id.to_string())
                .bind(treatment.group.group_id.to_string())
                .bind(treatment.recommender.recommender_id.to_string())
                .bind(treatment.template.as_deref())
                .execute(&mut *tx)
                .await
                .map_err(conflict_on_unique)?;
            }
        }

        tx.commit().await?;

        info!(
            "Stored experiment {} ({} phases, {} groups, {} recommenders)",
            experiment.experiment_id,
            experiment.phases.len(),
            experiment.groups().len(),
            experiment.recommenders().len()
        );
        Ok(())
    }

    pub async fn fetch_experiment(&self, experiment_id: Uuid) -> Result<ExperimentRow> {
        sqlx::query_as::<_, ExperimentRow>(
            r#"
            SELECT experiment_id, dataset_id, team_id, description, start_date, end_date
            FROM experiments
            WHERE experiment_id = ?
            "#,
        )
        .bind(experiment_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("experiment {}", experiment_id)))
    }

    /// Phases of one experiment in chronological order
    pub async fn fetch_phases(&self, experiment_id: Uuid) -> Result<Vec<PhaseRow>> {
        let rows = sqlx::query_as::<_, PhaseRow>(
            r#"
            SELECT phase_id, experiment_id, name, start_date, end_date
            FROM phases
            WHERE experiment_id = ?
            ORDER BY start_date ASC
            "#,
        )
        .bind(experiment_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Place an account into an experiment group
    pub async fn store_assignment(&self, assignment: &Assignment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO assignments (assignment_id, account_id, group_id, opted_out)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(assignment.assignment_id.to_string())
        .bind(assignment.account_id.to_string())
        .bind(assignment.group_id.to_string())
        .bind(assignment.opted_out)
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique)?;

        Ok(())
    }

    /// Soft withdrawal: flags the assignment, the record is kept
    pub async fn set_opt_out(&self, assignment_id: Uuid) -> Result<()> {
        let result = sqlx::query("UPDATE assignments SET opted_out = 1 WHERE assignment_id = ?")
            .bind(assignment_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("assignment {}", assignment_id)));
        }

        Ok(())
    }

    /// Assignments for one group
    pub async fn fetch_assignments(&self, group_id: Uuid) -> Result<Vec<AssignmentRow>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT assignment_id, account_id, group_id, opted_out
            FROM assignments
            WHERE group_id = ?
            "#,
        )
        .bind(group_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

async fn insert_team(tx: &mut Transaction<'_, Sqlite>, team: &Team) -> Result<()> {
    sqlx::query("INSERT INTO teams (team_id, name) VALUES (?, ?)")
        .bind(team.team_id.to_string())
        .bind(&team.name)
        .execute(&mut **tx)
        .await
        .map_err(conflict_on_unique)?;

    for member in &team.members {
        sqlx::query("INSERT INTO team_members (team_id, account_id) VALUES (?, ?)")
            .bind(team.team_id.to_string())
            .bind(member.to_string())
            .execute(&mut **tx)
            .await
            .map_err(conflict_on_unique)?;
    }

    Ok(())
}
