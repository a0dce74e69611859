//! Table constraints rendered inline in CREATE TABLE.

use crate::query::{BuilderResult, Dialect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    fn sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintKind {
    PrimaryKey(Vec<String>),
    Unique(Vec<String>),
    ForeignKey {
        columns: Vec<String>,
        references: String,
        referenced_columns: Vec<String>,
        on_delete: Option<ReferentialAction>,
        on_update: Option<ReferentialAction>,
    },
    /// Raw boolean expression.
    Check(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintAction {
    Create,
    Rename(String),
    Drop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub(crate) name: Option<String>,
    pub(crate) kind: ConstraintKind,
    pub(crate) action: ConstraintAction,
}

impl Constraint {
    fn with_kind(kind: ConstraintKind) -> Self {
        Self {
            name: None,
            kind,
            action: ConstraintAction::Create,
        }
    }

    pub fn primary_key<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(ConstraintKind::PrimaryKey(collect(columns)))
    }

    pub fn unique<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(ConstraintKind::Unique(collect(columns)))
    }

    /// `FOREIGN KEY (column) REFERENCES references (referenced_column)`.
    pub fn foreign_key(
        column: impl Into<String>,
        references: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        Self::with_kind(ConstraintKind::ForeignKey {
            columns: vec![column.into()],
            references: references.into(),
            referenced_columns: vec![referenced_column.into()],
            on_delete: None,
            on_update: None,
        })
    }

    pub fn check(expression: impl Into<String>) -> Self {
        Self::with_kind(ConstraintKind::Check(expression.into()))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Only meaningful for foreign keys.
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        if let ConstraintKind::ForeignKey { on_delete, .. } = &mut self.kind {
            *on_delete = Some(action);
        }
        self
    }

    /// Only meaningful for foreign keys.
    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        if let ConstraintKind::ForeignKey { on_update, .. } = &mut self.kind {
            *on_update = Some(action);
        }
        self
    }

    pub fn drop(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            kind: ConstraintKind::Check(String::new()),
            action: ConstraintAction::Drop,
        }
    }

    pub fn rename(name: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            kind: ConstraintKind::Check(String::new()),
            action: ConstraintAction::Rename(to.into()),
        }
    }

    pub(crate) fn definition(&self, dialect: Dialect) -> BuilderResult<String> {
        let mut sql = match &self.name {
            Some(name) => format!("CONSTRAINT {} ", dialect.quote_identifier(name)?),
            None => String::new(),
        };
        match &self.kind {
            ConstraintKind::PrimaryKey(columns) => {
                sql.push_str(&format!("PRIMARY KEY ({})", quote_all(columns, dialect)?));
            }
            ConstraintKind::Unique(columns) => {
                sql.push_str(&format!("UNIQUE ({})", quote_all(columns, dialect)?));
            }
            ConstraintKind::ForeignKey {
                columns,
                references,
                referenced_columns,
                on_delete,
                on_update,
            } => {
                sql.push_str(&format!(
                    "FOREIGN KEY ({}) REFERENCES {} ({})",
                    quote_all(columns, dialect)?,
                    dialect.quote_identifier(references)?,
                    quote_all(referenced_columns, dialect)?
                ));
                if let Some(action) = on_delete {
                    sql.push_str(" ON DELETE ");
                    sql.push_str(action.sql());
                }
                if let Some(action) = on_update {
                    sql.push_str(" ON UPDATE ");
                    sql.push_str(action.sql());
                }
            }
            ConstraintKind::Check(expression) => {
                sql.push_str(&format!("CHECK ({expression})"));
            }
        }
        Ok(sql)
    }
}

fn collect<I, S>(columns: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    columns.into_iter().map(Into::into).collect()
}

fn quote_all(columns: &[String], dialect: Dialect) -> BuilderResult<String> {
    Ok(columns
        .iter()
        .map(|column| dialect.quote_identifier(column))
        .collect::<BuilderResult<Vec<_>>>()?
        .join(", "))
}
