use std::collections::BTreeSet;

use sea_orm::sea_query::{Alias, Condition, Expr};

use crate::error::Result;
use crate::migrations::{create_and_fill, StepState};
use crate::models::access::{AllowList, DenyList};
use crate::services::rows::{Kind, Row};
use crate::services::schema::{Field, Key};
use crate::services::storage::Storage;

/// Legacy column naming the denied group in every deny table
const DENIED_GROUP: &str = "member_group";

/// Turns one legacy "no access" table into a role allow list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolarityFlip {
    /// Allow table created by the flip
    pub target: &'static str,
    /// Entity column in both the allow and the deny table
    pub entity_column: &'static str,
    pub deny_table: &'static str,
    pub entity_table: &'static str,
    /// Id column of `entity_table`
    pub entity_id: &'static str,
    /// Optional `column = value` filter on `entity_table`
    pub entity_filter: Option<(&'static str, i64)>,
    /// Roles that never get rows
    pub excluded_roles: &'static [i64],
}

impl PolarityFlip {
    pub async fn state(&self, db: &dyn Storage) -> Result<StepState> {
        if db.table_exists(self.target).await? {
            return Ok(StepState::Applied);
        }
        if !db.table_exists(self.deny_table).await? {
            return Ok(StepState::Partial(format!(
                "neither {} nor {} exists",
                self.target, self.deny_table
            )));
        }
        Ok(StepState::Pending)
    }

    async fn eligible_roles(&self, db: &dyn Storage) -> Result<BTreeSet<i64>> {
        let filter = Condition::all().add(
            Expr::col(Alias::new("role_id")).is_not_in(self.excluded_roles.iter().copied()),
        );
        db.select_rows("roles", &[("role_id", Kind::Int)], Some(filter))
            .await?
            .iter()
            .map(|row| row.int("role_id"))
            .collect()
    }

    async fn entities(&self, db: &dyn Storage) -> Result<BTreeSet<i64>> {
        let filter = self
            .entity_filter
            .map(|(column, value)| Condition::all().add(Expr::col(Alias::new(column)).eq(value)));
        db.select_rows(self.entity_table, &[(self.entity_id, Kind::Int)], filter)
            .await?
            .iter()
            .map(|row| row.int(self.entity_id))
            .collect()
    }

    async fn deny_list(&self, db: &dyn Storage) -> Result<DenyList> {
        db.select_rows(
            self.deny_table,
            &[(self.entity_column, Kind::Int), (DENIED_GROUP, Kind::Int)],
            None,
        )
        .await?
        .iter()
        .map(|row| -> Result<(i64, i64)> {
            Ok((row.int(self.entity_column)?, row.int(DENIED_GROUP)?))
        })
        .collect()
    }

    pub async fn apply(&self, db: &dyn Storage) -> Result<()> {
        let roles = self.eligible_roles(db).await?;
        let entities = self.entities(db).await?;
        let deny = self.deny_list(db).await?;

        let allow = AllowList::flip(&roles, &entities, &deny);
        let rows: Vec<Row> = allow
            .pairs()
            .map(|(role_id, entity_id)| {
                Row::new()
                    .with("role_id", role_id)
                    .with(self.entity_column, entity_id)
            })
            .collect();

        let inserted = create_and_fill(
            db,
            self.target,
            &[Field::int("role_id"), Field::int(self.entity_column)],
            &[Key::primary(&["role_id", self.entity_column])],
            rows,
        )
        .await?;

        db.drop_table(self.deny_table).await?;

        tracing::info!(
            "Flipped {} into {} with {} rows ({} roles, {} entities)",
            self.deny_table,
            self.target,
            inserted,
            roles.len(),
            entities.len()
        );
        Ok(())
    }
}
