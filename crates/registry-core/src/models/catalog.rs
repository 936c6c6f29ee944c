//! Institutions, users and the preserved content they own.
//!
//! These rows are managed elsewhere; the registry only reads them to check
//! ownership, state and permissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[serde(rename = "admin")]
    SysAdmin,
    #[serde(rename = "institutional_admin")]
    InstAdmin,
    #[serde(rename = "institutional_user")]
    InstUser,
    None,
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Role::SysAdmin => write!(f, "admin"),
            Role::InstAdmin => write!(f, "institutional_admin"),
            Role::InstUser => write!(f, "institutional_user"),
            Role::None => write!(f, "none"),
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::SysAdmin),
            "institutional_admin" => Ok(Role::InstAdmin),
            "institutional_user" => Ok(Role::InstUser),
            "none" => Ok(Role::None),
            _ => Err(anyhow::anyhow!("Invalid role: {}", s)),
        }
    }
}

/// Preservation state of an object or file: active or deleted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub enum State {
    #[serde(rename = "A")]
    Active,
    #[serde(rename = "D")]
    Deleted,
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            State::Active => write!(f, "A"),
            State::Deleted => write!(f, "D"),
        }
    }
}

impl FromStr for State {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(State::Active),
            "D" => Ok(State::Deleted),
            _ => Err(anyhow::anyhow!("Invalid state: {}", s)),
        }
    }
}

/// Glacier storage options keep no copy in hot storage.
pub fn is_glacier_only(storage_option: &str) -> bool {
    storage_option.starts_with("Glacier-")
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Institution {
    pub id: i64,
    pub name: String,
    pub identifier: String,
    pub state: State,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub institution_id: i64,
    pub role: Role,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.deactivated_at.is_none()
    }

    pub fn is_sys_admin(&self) -> bool {
        self.role == Role::SysAdmin && self.is_active()
    }

    /// Institutional admin of this specific institution.
    pub fn is_admin_of(&self, institution_id: i64) -> bool {
        self.role == Role::InstAdmin && self.institution_id == institution_id && self.is_active()
    }

    /// Any active member of the institution, admin or not.
    pub fn belongs_to(&self, institution_id: i64) -> bool {
        matches!(self.role, Role::InstAdmin | Role::InstUser)
            && self.institution_id == institution_id
            && self.is_active()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IntellectualObject {
    pub id: i64,
    pub institution_id: i64,
    pub identifier: String,
    pub bag_name: String,
    pub title: String,
    pub state: State,
    pub storage_option: String,
    pub size: i64,
}

impl IntellectualObject {
    pub fn is_deleted(&self) -> bool {
        self.state == State::Deleted
    }

    pub fn is_glacier_only(&self) -> bool {
        is_glacier_only(&self.storage_option)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenericFile {
    pub id: i64,
    pub institution_id: i64,
    pub intellectual_object_id: i64,
    pub identifier: String,
    pub size: i64,
    pub state: State,
    pub storage_option: String,
}

impl GenericFile {
    pub fn is_deleted(&self) -> bool {
        self.state == State::Deleted
    }
}

#[cfg(feature = "sqlx")]
mod rows {
    use super::*;
    use sqlx::postgres::PgRow;
    use sqlx::{FromRow, Row};

    fn parse<T: FromStr<Err = anyhow::Error>>(row: &PgRow, column: &str) -> Result<T, sqlx::Error> {
        row.get::<String, _>(column).parse().map_err(|e| {
            sqlx::Error::Decode(format!("Failed to parse {}: {}", column, e).into())
        })
    }

    impl FromRow<'_, PgRow> for Institution {
        fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
            Ok(Institution {
                id: row.get("id"),
                name: row.get("name"),
                identifier: row.get("identifier"),
                state: parse(row, "state")?,
            })
        }
    }

    impl FromRow<'_, PgRow> for User {
        fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
            Ok(User {
                id: row.get("id"),
                name: row.get("name"),
                email: row.get("email"),
                institution_id: row.get("institution_id"),
                role: parse(row, "role")?,
                deactivated_at: row.get("deactivated_at"),
            })
        }
    }

    impl FromRow<'_, PgRow> for IntellectualObject {
        fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
            Ok(IntellectualObject {
                id: row.get("id"),
                institution_id: row.get("institution_id"),
                identifier: row.get("identifier"),
                bag_name: row.get("bag_name"),
                title: row.get("title"),
                state: parse(row, "state")?,
                storage_option: row.get("storage_option"),
                size: row.get("size"),
            })
        }
    }

    impl FromRow<'_, PgRow> for GenericFile {
        fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
            Ok(GenericFile {
                id: row.get("id"),
                institution_id: row.get("institution_id"),
                intellectual_object_id: row.get("intellectual_object_id"),
                identifier: row.get("identifier"),
                size: row.get("size"),
                state: parse(row, "state")?,
                storage_option: row.get("storage_option"),
            })
        }
    }
}
