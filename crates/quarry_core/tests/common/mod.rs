#![allow(dead_code)]

use quarry_core::db::decode_value;
use quarry_core::model::{SoftDeleteColumns, TimestampColumns};
use quarry_core::schema::{Column, Constraint, ReferentialAction, Table};
use quarry_core::{
    Entity, EntityState, Orm, OrmConfig, OrmResult, Record, Relationship, Value,
};

#[derive(Debug, Clone, Default)]
pub struct User {
    pub id: Option<i64>,
    pub name: String,
    pub age: i64,
    pub email: Option<String>,
    pub posts: Vec<Post>,
    pub state: EntityState,
}

impl User {
    pub fn new(name: &str, age: i64) -> Self {
        Self {
            name: name.to_string(),
            age,
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }
}

impl Entity for User {
    fn table() -> &'static str {
        "users"
    }

    fn relationships() -> Vec<Relationship> {
        vec![Relationship::many("posts", "posts", "id", "user_id")]
    }

    fn from_record(record: &Record) -> OrmResult<Self> {
        Ok(Self {
            id: record.get("id")?,
            name: record.get("name")?,
            age: record.get("age")?,
            email: record.get("email")?,
            posts: Vec::new(),
            state: EntityState::default(),
        })
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.map_or(Value::Null, Value::Integer)),
            ("name", Value::Text(self.name.clone())),
            ("age", Value::Integer(self.age)),
            ("email", self.email.clone().map_or(Value::Null, Value::Text)),
        ]
    }

    fn set_field(&mut self, column: &str, value: Value) -> OrmResult<()> {
        match column {
            "id" => self.id = decode_value(column, &value)?,
            "name" => self.name = decode_value(column, &value)?,
            "age" => self.age = decode_value(column, &value)?,
            "email" => self.email = decode_value(column, &value)?,
            _ => {}
        }
        Ok(())
    }

    fn state(&self) -> &EntityState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EntityState {
        &mut self.state
    }

    fn attach_relationship(&mut self, name: &str, records: Vec<Record>) -> OrmResult<()> {
        match name {
            "posts" => {
                self.posts = records
                    .iter()
                    .map(Post::from_record)
                    .collect::<OrmResult<_>>()?;
                Ok(())
            }
            other => Err(quarry_core::OrmError::UnknownRelationship {
                table: Self::table().to_string(),
                name: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Post {
    pub id: Option<i64>,
    pub user_id: i64,
    pub title: String,
    pub state: EntityState,
}

impl Post {
    pub fn new(user_id: i64, title: &str) -> Self {
        Self {
            user_id,
            title: title.to_string(),
            ..Self::default()
        }
    }
}

impl Entity for Post {
    fn table() -> &'static str {
        "posts"
    }

    fn from_record(record: &Record) -> OrmResult<Self> {
        Ok(Self {
            id: record.get("id")?,
            user_id: record.get("user_id")?,
            title: record.get("title")?,
            state: EntityState::default(),
        })
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.map_or(Value::Null, Value::Integer)),
            ("user_id", Value::Integer(self.user_id)),
            ("title", Value::Text(self.title.clone())),
        ]
    }

    fn set_field(&mut self, column: &str, value: Value) -> OrmResult<()> {
        match column {
            "id" => self.id = decode_value(column, &value)?,
            "user_id" => self.user_id = decode_value(column, &value)?,
            "title" => self.title = decode_value(column, &value)?,
            _ => {}
        }
        Ok(())
    }

    fn state(&self) -> &EntityState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EntityState {
        &mut self.state
    }
}

/// Soft-deletable, dated entity.
#[derive(Debug, Clone, Default)]
pub struct Article {
    pub id: Option<i64>,
    pub title: String,
    pub deleted: i64,
    pub deleted_date: Option<String>,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub state: EntityState,
}

impl Article {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }
}

impl Entity for Article {
    fn table() -> &'static str {
        "articles"
    }

    fn soft_delete() -> Option<SoftDeleteColumns> {
        Some(SoftDeleteColumns::default())
    }

    fn timestamps() -> Option<TimestampColumns> {
        Some(TimestampColumns::default())
    }

    fn from_record(record: &Record) -> OrmResult<Self> {
        Ok(Self {
            id: record.get("id")?,
            title: record.get("title")?,
            deleted: record.get("deleted")?,
            deleted_date: record.get("deleted_date")?,
            created: record.get("created")?,
            modified: record.get("modified")?,
            state: EntityState::default(),
        })
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        let text = |value: &Option<String>| value.clone().map_or(Value::Null, Value::Text);
        vec![
            ("id", self.id.map_or(Value::Null, Value::Integer)),
            ("title", Value::Text(self.title.clone())),
            ("deleted", Value::Integer(self.deleted)),
            ("deleted_date", text(&self.deleted_date)),
            ("created", text(&self.created)),
            ("modified", text(&self.modified)),
        ]
    }

    fn set_field(&mut self, column: &str, value: Value) -> OrmResult<()> {
        match column {
            "id" => self.id = decode_value(column, &value)?,
            "title" => self.title = decode_value(column, &value)?,
            "deleted" => self.deleted = decode_value(column, &value)?,
            "deleted_date" => self.deleted_date = decode_value(column, &value)?,
            "created" => self.created = decode_value(column, &value)?,
            "modified" => self.modified = decode_value(column, &value)?,
            _ => {}
        }
        Ok(())
    }

    fn state(&self) -> &EntityState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EntityState {
        &mut self.state
    }
}

pub fn fixture_tables() -> Vec<Table> {
    vec![
        Table::create("users")
            .column(Column::integer("id").auto_increment())
            .column(Column::text("name").not_null())
            .column(Column::integer("age").not_null().default_value(0))
            .column(Column::text("email").nullable().unique()),
        Table::create("posts")
            .column(Column::integer("id").auto_increment())
            .column(Column::integer("user_id").not_null())
            .column(Column::text("title").not_null())
            .constraint(
                Constraint::foreign_key("user_id", "users", "id")
                    .on_delete(ReferentialAction::Cascade),
            ),
        Table::create("articles")
            .column(Column::integer("id").auto_increment())
            .column(Column::text("title").not_null())
            .column(Column::integer("deleted").not_null().default_value(0))
            .column(Column::date_time("deleted_date").nullable())
            .column(Column::date_time("created").nullable())
            .column(Column::date_time("modified").nullable()),
    ]
}

/// In-memory manager with the fixture tables created.
pub fn orm() -> Orm {
    let orm = Orm::new(OrmConfig::sqlite_memory("main")).unwrap();
    let driver = orm.default_connection().unwrap();
    let mut schema = driver.schema();
    for table in fixture_tables() {
        schema.table(table);
    }
    schema.execute_all().unwrap();
    orm
}

/// Inserts users immediately and returns their ids.
pub fn seed_users(orm: &Orm, users: &[(&str, i64)]) -> Vec<i64> {
    users
        .iter()
        .map(|(name, age)| {
            let mut user = User::new(name, *age);
            orm.create(&mut user, false).unwrap();
            user.id.unwrap()
        })
        .collect()
}

pub fn row_count(orm: &Orm, table: &str) -> i64 {
    let driver = orm.default_connection().unwrap();
    let value = driver
        .query(format!("SELECT COUNT(*) FROM {table}"))
        .get_scalar()
        .unwrap();
    match value {
        Some(Value::Integer(count)) => count,
        other => panic!("unexpected count value: {other:?}"),
    }
}
