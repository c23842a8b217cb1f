use sea_orm_migration::prelude::*;

mod m20240301_000001_create_topics_table;
mod m20240301_000002_create_posts_table;
mod m20240301_000003_create_reports_table;
mod m20240301_000004_create_notifications_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_topics_table::Migration),
            Box::new(m20240301_000002_create_posts_table::Migration),
            Box::new(m20240301_000003_create_reports_table::Migration),
            Box::new(m20240301_000004_create_notifications_table::Migration),
        ]
    }
}
