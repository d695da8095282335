use githook_core::{Error, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Open a connection pool the way every teacher service does it
/// (`PgPool::connect(&database_url)`), mapping the connection failure into
/// the shared error taxonomy instead of leaking `sqlx::Error`.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|e| Error::StorageUnavailable(e.to_string()))
}

/// Run the embedded migration set against `pool`. Mirrors
/// `sqlx::migrate!("./migrations")` + `migrator.run(&db)` from the teacher's
/// `product-service::main`.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| Error::StorageUnavailable(e.to_string()))
}
