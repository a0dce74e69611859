//! Read path: entity-scoped selects mapped to typed entities.
//!
//! # Responsibility
//! - Scope a select to one entity table and expose it as a chainable value.
//! - Map rows to entities and resolve requested relationships.
//!
//! # Invariants
//! - Soft-deletable entities never yield flagged rows unless
//!   `include_deleted()` was called.
//! - Relationship rows are fetched per mapped entity, one query per
//!   relationship.

use crate::db::{decode_value, IntoValue, Value};
use crate::driver::Driver;
use crate::error::{OrmError, OrmResult};
use crate::model::{Entity, RelationKind, Relationship};
use crate::query::{
    Conjunction, Direction, Filter, Join, JoinClause, QueryBuilder, Select, TableTarget,
    WhereClause,
};
use std::marker::PhantomData;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum RelationSelection {
    #[default]
    None,
    All,
    Named(Vec<String>),
}

/// Chainable select over `E`, consumed by one of its terminals.
pub struct Retriever<E: Entity> {
    driver: Rc<Driver>,
    select: Select,
    include_deleted: bool,
    relationships: RelationSelection,
    criteria: Option<String>,
    _entity: PhantomData<E>,
}

impl<E: Entity> Retriever<E> {
    /// `SELECT * FROM E::table()` on `driver`.
    pub fn find(driver: Rc<Driver>) -> Self {
        let select = driver.select().entity::<E>();
        Self {
            driver,
            select,
            include_deleted: false,
            relationships: RelationSelection::None,
            criteria: None,
            _entity: PhantomData,
        }
    }

    /// `find` narrowed to one primary key value.
    pub fn find_one(driver: Rc<Driver>, id: impl IntoValue) -> Self {
        let id = id.into_value();
        let criteria = format!("{} = {}", E::primary_key(), describe(&id));
        let mut retriever = Self::find(driver).where_eq(E::primary_key(), id);
        retriever.criteria = Some(criteria);
        retriever
    }

    /// Same as `find`; pair with `get_count`.
    pub fn count(driver: Rc<Driver>) -> Self {
        Self::find(driver)
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = self.select.columns(columns);
        self
    }

    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.select = self.select.group_by(column);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.select = self.select.order_by(column, direction);
        self
    }

    pub fn order_by_asc(self, column: impl Into<String>) -> Self {
        self.order_by(column, Direction::Asc)
    }

    pub fn order_by_desc(self, column: impl Into<String>) -> Self {
        self.order_by(column, Direction::Desc)
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.select = self.select.limit(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.select = self.select.offset(offset);
        self
    }

    /// Also return rows flagged as soft deleted.
    pub fn include_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// Resolves the named relationships for every mapped entity.
    pub fn with_relationships<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relationships = RelationSelection::Named(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_all_relationships(mut self) -> Self {
        self.relationships = RelationSelection::All;
        self
    }

    pub fn without_relationships(mut self) -> Self {
        self.relationships = RelationSelection::None;
        self
    }

    /// SQL the row terminals would run.
    pub fn get_query_string(&self) -> OrmResult<String> {
        Ok(self.scoped_select().get_query_string()?)
    }

    pub fn get_result(self) -> OrmResult<Vec<E>> {
        let relationships = self.selected_relationships()?;
        let select = self.scoped_select();
        let mut entities: Vec<E> = select
            .create_query(self.driver.adapter())?
            .get_result()?;
        for entity in &mut entities {
            self.attach(entity, &relationships)?;
        }
        Ok(entities)
    }

    /// First matching entity; adds `LIMIT 1` unless a limit was set.
    pub fn get_one_or_null(self) -> OrmResult<Option<E>> {
        let relationships = self.selected_relationships()?;
        let mut select = self.scoped_select();
        if !select.has_limit() {
            select = select.limit(1);
        }
        let entity: Option<E> = select
            .create_query(self.driver.adapter())?
            .get_one_or_null()?;
        match entity {
            Some(mut entity) => {
                self.attach(&mut entity, &relationships)?;
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    /// # Errors
    /// - `OrmError::EntityNotFound` when no row matches.
    pub fn get_one_or_fail(self) -> OrmResult<E> {
        let criteria = match &self.criteria {
            Some(criteria) => criteria.clone(),
            None => format!("query `{}`", self.get_query_string()?),
        };
        self.get_one_or_null()?.ok_or_else(|| OrmError::EntityNotFound {
            table: E::table().to_string(),
            criteria,
        })
    }

    /// Number of matching rows, ignoring ordering and paging.
    pub fn get_count(self) -> OrmResult<u64> {
        let compiled = self.scoped_select().count_query()?;
        let query = self.driver.query_compiled(compiled);
        let count: i64 = match query.get_scalar()? {
            Some(value) => decode_value("aggregate", &value)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn scoped_select(&self) -> Select {
        let mut select = self.select.clone();
        let Some(columns) = E::soft_delete().filter(|_| !self.include_deleted) else {
            return select;
        };

        let reference = select.table_reference().unwrap_or(E::table()).to_string();
        let flag = format!("{reference}.{}", columns.flag);
        let exclusion = WhereClause::default()
            .where_eq(flag.clone(), 0)
            .where_type(Conjunction::Or)
            .where_null(flag);

        let user = std::mem::take(select.where_clause_mut());
        let mut scoped = WhereClause::default();
        scoped.and_group(user);
        scoped.and_group(exclusion);
        *select.where_clause_mut() = scoped;
        select
    }

    fn selected_relationships(&self) -> OrmResult<Vec<Relationship>> {
        match &self.relationships {
            RelationSelection::None => Ok(Vec::new()),
            RelationSelection::All => Ok(E::relationships()),
            RelationSelection::Named(names) => names
                .iter()
                .map(|name| {
                    E::relationship(name).ok_or_else(|| OrmError::UnknownRelationship {
                        table: E::table().to_string(),
                        name: name.clone(),
                    })
                })
                .collect(),
        }
    }

    fn attach(&self, entity: &mut E, relationships: &[Relationship]) -> OrmResult<()> {
        for relationship in relationships {
            let local = entity
                .values()
                .into_iter()
                .find(|(column, _)| *column == relationship.local_key)
                .map(|(_, value)| value)
                .unwrap_or(Value::Null);
            let records = if local == Value::Null {
                Vec::new()
            } else {
                let mut select = self
                    .driver
                    .select()
                    .table(relationship.table)
                    .where_eq(relationship.foreign_key, local);
                if relationship.kind == RelationKind::One {
                    select = select.limit(1);
                }
                select.create_query(self.driver.adapter())?.get_records()?
            };
            entity.attach_relationship(relationship.name, records)?;
        }
        Ok(())
    }
}

impl<E: Entity> Filter for Retriever<E> {
    fn where_clause_mut(&mut self) -> &mut WhereClause {
        self.select.where_clause_mut()
    }
}

impl<E: Entity> Join for Retriever<E> {
    fn joins_mut(&mut self) -> &mut Vec<JoinClause> {
        self.select.joins_mut()
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(number) => number.to_string(),
        Value::Real(number) => number.to_string(),
        Value::Text(text) => format!("'{text}'"),
        Value::Blob(bytes) => format!("<{} bytes>", bytes.len()),
    }
}
