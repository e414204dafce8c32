use sea_orm_migration::prelude::*;

mod m20240301_000001_create_users_and_clients;
mod m20240301_000002_create_appointments;
mod m20240315_000001_create_comments_and_files;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_users_and_clients::Migration),
            Box::new(m20240301_000002_create_appointments::Migration),
            Box::new(m20240315_000001_create_comments_and_files::Migration),
        ]
    }
}
