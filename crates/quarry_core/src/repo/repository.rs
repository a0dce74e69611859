//! Per-entity facade over a driver's retriever and persister.

use crate::db::IntoValue;
use crate::driver::Driver;
use crate::error::OrmResult;
use crate::model::Entity;
use crate::repo::persister::WriteOutcome;
use crate::repo::retriever::Retriever;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::rc::Rc;

/// Reads and writes `E` rows on one driver.
pub struct Repository<E: Entity> {
    driver: Rc<Driver>,
    class: String,
    _entity: PhantomData<E>,
}

impl<E: Entity> Repository<E> {
    pub fn new(driver: Rc<Driver>, class: impl Into<String>) -> Self {
        Self {
            driver,
            class: class.into(),
            _entity: PhantomData,
        }
    }

    pub fn driver(&self) -> &Rc<Driver> {
        &self.driver
    }

    /// Repository class id this repository was resolved from.
    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn find(&self) -> Retriever<E> {
        self.driver.find()
    }

    pub fn find_one(&self, id: impl IntoValue) -> Retriever<E> {
        self.driver.find_one(id)
    }

    pub fn count(&self) -> Retriever<E> {
        self.driver.count()
    }

    pub fn create(&self, entity: &mut E, defer: bool) -> OrmResult<WriteOutcome> {
        self.driver.create(entity, defer)
    }

    pub fn save(&self, entity: &mut E, defer: bool) -> OrmResult<WriteOutcome> {
        self.driver.save(entity, defer)
    }

    pub fn delete(&self, entity: &mut E, defer: bool) -> OrmResult<WriteOutcome> {
        self.driver.delete_entity(entity, defer)
    }

    pub fn soft_delete(&self, entity: &mut E, defer: bool) -> OrmResult<WriteOutcome> {
        self.driver.soft_delete(entity, defer)
    }
}

impl<E: Entity> Debug for Repository<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("class", &self.class)
            .field("table", &E::table())
            .field("driver", &self.driver)
            .finish()
    }
}
