//! Shared CRUD surface implemented by every persisted model.
//!
//! Mirrors the teacher's `Record` trait: each model names its table and id
//! type once, and gets `find_by_id`/`insert`/`update`/`delete` for free at
//! the call site, even though every impl still hand-writes its own queries
//! (sqlx's macro-free `query_as` doesn't give us a blanket impl).

use async_trait::async_trait;
use sqlx::PgPool;

#[async_trait]
pub trait Record: Sized + Send + Sync + Unpin {
    const TABLE: &'static str;
    type Id: Send + Sync;

    async fn find_by_id(pool: &PgPool, id: Self::Id) -> sqlx::Result<Option<Self>>;
    async fn insert(&self, pool: &PgPool) -> sqlx::Result<()>;
    async fn delete(pool: &PgPool, id: Self::Id) -> sqlx::Result<()>;
}
