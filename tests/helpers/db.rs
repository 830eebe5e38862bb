use acl_aggregator::aggregator::services::RoleAssignmentCrudEventHandler;
use acl_aggregator::aggregator::{Aggregator, Collaborators};
use acl_aggregator::settings::Settings;
use acl_aggregator::storage::SeaOrmStore;
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Test database with automatic cleanup
pub struct TestDb {
    connection: DatabaseConnection,
    _temp_file: NamedTempFile,
}

impl TestDb {
    /// Create a new test database with migrations applied
    pub async fn new() -> Self {
        // Create temporary SQLite database file
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let db_path = temp_file.path().to_str().expect("Invalid temp file path");
        let db_url = format!("sqlite://{}?mode=rwc", db_path);

        // Connect to database
        let connection = Database::connect(&db_url)
            .await
            .expect("Failed to connect to test database");

        // Run migrations
        migration::Migrator::up(&connection, None)
            .await
            .expect("Failed to run migrations");

        Self {
            connection,
            _temp_file: temp_file,
        }
    }

    /// Get database connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    pub fn store(&self) -> Arc<SeaOrmStore> {
        Arc::new(SeaOrmStore::new(self.connection.clone()))
    }

    /// Aggregator over this database with a small worker pool
    pub fn aggregator(&self) -> Aggregator {
        Aggregator::new(Collaborators::from_store(self.store()), &test_settings())
    }

    pub fn aggregator_with_crud_events(
        &self,
        handler: Arc<dyn RoleAssignmentCrudEventHandler>,
    ) -> Aggregator {
        Aggregator::new(
            Collaborators::from_store(self.store()).with_crud_events(handler),
            &test_settings(),
        )
    }
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.aggregator.worker_threads = Some(4);
    settings
}
