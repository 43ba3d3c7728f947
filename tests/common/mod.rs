//! Shared Postgres container for the integration tests in this directory.
//! The container and migrations are set up once and reused across tests,
//! matching the reference stack's shared-testcontainers harness.

use sqlx::PgPool;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct SharedDb {
    url: String,
    _container: ContainerAsync<Postgres>,
}

static SHARED_DB: OnceCell<SharedDb> = OnceCell::const_new();

async fn init() -> SharedDb {
    let container = Postgres::default()
        .start()
        .await
        .expect("failed to start postgres container");
    let host = container.get_host().await.expect("container host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("container port");
    let url = format!("postgresql://postgres:postgres@{host}:{port}/postgres");

    let pool = PgPool::connect(&url)
        .await
        .expect("failed to connect to test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");
    pool.close().await;

    SharedDb {
        url,
        _container: container,
    }
}

/// Returns a fresh connection pool against the shared, already-migrated
/// test database.
pub async fn test_pool() -> PgPool {
    let shared = SHARED_DB.get_or_init(init).await;
    PgPool::connect(&shared.url)
        .await
        .expect("failed to connect to test database")
}
