use sea_orm::sea_query::{Expr, TableCreateStatement};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, Schema,
    Statement,
};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::entity::{
    access_request, department, monthly_kpi, project, role, task, task_assignee, task_review,
    user, user_assignment,
};

/// Initialize database connection and auto-migrate tables
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let database_url = config.connection_url();

    if config.is_sqlite() {
        info!("Connecting to sqlite database: {}", config.name);
    } else {
        info!("Connecting to database: {}:{}/{}", config.host, config.port, config.name);
    }

    let mut opt = ConnectOptions::new(&database_url);
    opt.max_connections(config.max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug);
    if config.is_sqlite() {
        // An in-memory database lives only as long as its single connection.
        opt.max_connections(1);
    } else {
        opt.set_schema_search_path("public");
    }

    let db = Database::connect(opt).await?;
    info!("Database connection established");

    auto_migrate(&db).await?;

    Ok(db)
}

/// Connect to `url` and create missing tables; used by tests and tooling.
pub async fn connect(url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(url);
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await?;
    auto_migrate(&db).await?;
    Ok(db)
}

/// Create every table that does not exist yet
pub async fn auto_migrate(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    info!("Running auto-migration for all entities...");

    // 1. Independent tables first
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(department::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(role::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(user::Entity)).await?;

    // 2. Tables with foreign key dependencies
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(user_assignment::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(project::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(task::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(task_assignee::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(access_request::Entity)).await?;

    // 3. Scored tables
    let mut reviews = schema.create_table_from_entity(task_review::Entity);
    reviews.check(Expr::col(task_review::Column::Score).between(0, 100));
    create_table_if_not_exists(db, backend, reviews).await?;

    let mut kpis = schema.create_table_from_entity(monthly_kpi::Entity);
    kpis.check(Expr::col(monthly_kpi::Column::Score).between(0, 100));
    kpis.check(Expr::col(monthly_kpi::Column::Month).between(1, 12));
    create_table_if_not_exists(db, backend, kpis).await?;

    info!("Auto-migration completed successfully");
    Ok(())
}

/// Create a table if it doesn't exist
async fn create_table_if_not_exists(
    db: &DatabaseConnection,
    backend: DbBackend,
    mut stmt: TableCreateStatement,
) -> Result<(), DbErr> {
    stmt.if_not_exists();

    let sql = backend.build(&stmt);

    db.execute(Statement::from_string(backend, sql.to_string())).await?;

    Ok(())
}
