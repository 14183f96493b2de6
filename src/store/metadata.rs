//! The transactional SQL metadata store. Roles v2 are durably recorded
//! here (name, owner, audit fields); v1 roles have no metadata row at all
//! (their state lives entirely in the graph store).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use crate::pid::Pid;
use crate::store::error::StoreError;

#[derive(Debug, Clone)]
pub struct RoleRow {
    pub id: Pid,
    pub name: String,
    pub resource_id: Pid,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One role-metadata transaction: BEGIN has already happened by the time
/// callers receive this object. The engine calls `commit` as the very last
/// step of a two-store write, so that a failed commit is the last
/// failure-visible point (DESIGN.md "two-store consistency").
#[async_trait]
pub trait MetadataTx: Send {
    async fn lock_role_for_update(&mut self, id: &Pid) -> Result<Option<RoleRow>, StoreError>;
    async fn insert_role(&mut self, row: &RoleRow) -> Result<(), StoreError>;
    async fn update_role(
        &mut self,
        id: &Pid,
        name: &str,
        updated_by: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    async fn delete_role(&mut self, id: &Pid) -> Result<bool, StoreError>;
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn MetadataTx>, StoreError>;
    async fn get_role(&self, id: &Pid) -> Result<Option<RoleRow>, StoreError>;
    async fn get_role_by_name(
        &self,
        resource_id: &Pid,
        name: &str,
    ) -> Result<Option<RoleRow>, StoreError>;
    async fn list_roles(&self, resource_id: &Pid) -> Result<Vec<RoleRow>, StoreError>;
}

pub struct PostgresMetadataStore {
    pool: PgPool,
}

impl PostgresMetadataStore {
    pub async fn connect(dsn: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(10).connect(dsn).await?;
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            StoreError::Metadata(sqlx::Error::Configuration(e.to_string().into()))
        })?;
        Ok(Self { pool })
    }

    fn row_to_role(row: &sqlx::postgres::PgRow) -> RoleRow {
        RoleRow {
            id: Pid::parse(row.get::<&str, _>("id")).expect("persisted pid is well-formed"),
            name: row.get("name"),
            resource_id: Pid::parse(row.get::<&str, _>("resource_id"))
                .expect("persisted pid is well-formed"),
            created_by: row.get("created_by"),
            updated_by: row.get("updated_by"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl MetadataStore for PostgresMetadataStore {
    async fn begin(&self) -> Result<Box<dyn MetadataTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgMetadataTx { tx }))
    }

    async fn get_role(&self, id: &Pid) -> Result<Option<RoleRow>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, resource_id, created_by, updated_by, created_at, updated_at \
             FROM roles WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Self::row_to_role(&r)))
    }

    async fn get_role_by_name(
        &self,
        resource_id: &Pid,
        name: &str,
    ) -> Result<Option<RoleRow>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, resource_id, created_by, updated_by, created_at, updated_at \
             FROM roles WHERE resource_id = $1 AND name = $2",
        )
        .bind(resource_id.as_str())
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Self::row_to_role(&r)))
    }

    async fn list_roles(&self, resource_id: &Pid) -> Result<Vec<RoleRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, resource_id, created_by, updated_by, created_at, updated_at \
             FROM roles WHERE resource_id = $1 ORDER BY created_at ASC",
        )
        .bind(resource_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(Self::row_to_role).collect())
    }
}

struct PgMetadataTx {
    tx: sqlx::Transaction<'static, sqlx::Postgres>,
}

#[async_trait]
impl MetadataTx for PgMetadataTx {
    async fn lock_role_for_update(&mut self, id: &Pid) -> Result<Option<RoleRow>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, resource_id, created_by, updated_by, created_at, updated_at \
             FROM roles WHERE id = $1 FOR UPDATE",
        )
        .bind(id.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(|r| PostgresMetadataStore::row_to_role(&r)))
    }

    async fn insert_role(&mut self, row: &RoleRow) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO roles (id, name, resource_id, created_by, updated_by, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(row.id.as_str())
        .bind(&row.name)
        .bind(row.resource_id.as_str())
        .bind(&row.created_by)
        .bind(&row.updated_by)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::NameTaken)
            }
            Err(e) => Err(StoreError::Metadata(e)),
        }
    }

    async fn update_role(
        &mut self,
        id: &Pid,
        name: &str,
        updated_by: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE roles SET name = $1, updated_by = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(name)
        .bind(updated_by)
        .bind(updated_at)
        .bind(id.as_str())
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::NameTaken)
            }
            Err(e) => Err(StoreError::Metadata(e)),
        }
    }

    async fn delete_role(&mut self, id: &Pid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
pub mod fake {
    //! In-memory metadata store used by engine unit tests (DESIGN.md "test
    //! tooling"), avoiding a live Postgres dependency.
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct FakeMetadataStore {
        rows: Mutex<Vec<RoleRow>>,
    }

    #[async_trait]
    impl MetadataStore for FakeMetadataStore {
        async fn begin(&self) -> Result<Box<dyn MetadataTx>, StoreError> {
            Ok(Box::new(FakeTx {
                rows: self.rows.lock().unwrap().clone(),
                store: self,
                locked: None,
            }))
        }

        async fn get_role(&self, id: &Pid) -> Result<Option<RoleRow>, StoreError> {
            Ok(self.rows.lock().unwrap().iter().find(|r| &r.id == id).cloned())
        }

        async fn get_role_by_name(
            &self,
            resource_id: &Pid,
            name: &str,
        ) -> Result<Option<RoleRow>, StoreError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|r| &r.resource_id == resource_id && r.name == name)
                .cloned())
        }

        async fn list_roles(&self, resource_id: &Pid) -> Result<Vec<RoleRow>, StoreError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| &r.resource_id == resource_id)
                .cloned()
                .collect())
        }
    }

    struct FakeTx<'a> {
        rows: Vec<RoleRow>,
        store: &'a FakeMetadataStore,
        locked: Option<Pid>,
    }

    #[async_trait]
    impl<'a> MetadataTx for FakeTx<'a> {
        async fn lock_role_for_update(&mut self, id: &Pid) -> Result<Option<RoleRow>, StoreError> {
            self.locked = Some(id.clone());
            Ok(self.rows.iter().find(|r| &r.id == id).cloned())
        }

        async fn insert_role(&mut self, row: &RoleRow) -> Result<(), StoreError> {
            if self
                .rows
                .iter()
                .any(|r| r.resource_id == row.resource_id && r.name == row.name)
            {
                return Err(StoreError::NameTaken);
            }
            self.rows.push(row.clone());
            Ok(())
        }

        async fn update_role(
            &mut self,
            id: &Pid,
            name: &str,
            updated_by: &str,
            updated_at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            if self
                .rows
                .iter()
                .any(|r| &r.id != id && r.name == name && {
                    let owner = self.rows.iter().find(|x| &x.id == id).map(|x| x.resource_id.clone());
                    owner.as_ref() == Some(&r.resource_id)
                })
            {
                return Err(StoreError::NameTaken);
            }
            if let Some(row) = self.rows.iter_mut().find(|r| &r.id == id) {
                row.name = name.to_string();
                row.updated_by = updated_by.to_string();
                row.updated_at = updated_at;
            }
            Ok(())
        }

        async fn delete_role(&mut self, id: &Pid) -> Result<bool, StoreError> {
            let before = self.rows.len();
            self.rows.retain(|r| &r.id != id);
            Ok(self.rows.len() != before)
        }

        async fn commit(self: Box<Self>) -> Result<(), StoreError> {
            *self.store.rows.lock().unwrap() = self.rows;
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
            Ok(())
        }
    }
}
