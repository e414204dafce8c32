use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Comment and file tables exist once per parent (client, appointment) and
/// share the same shape apart from the parent column.
fn comment_table<P: Iden + Copy + 'static>(
    table: impl Iden + Copy + 'static,
    parent_col: impl Iden + Copy + 'static,
    parent_table: P,
    parent_id: impl Iden + Copy + 'static,
    fk_name: &str,
) -> TableCreateStatement {
    Table::create()
        .table(table)
        .if_not_exists()
        .col(
            ColumnDef::new(Common::Id)
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(ColumnDef::new(parent_col).integer().not_null())
        .col(ColumnDef::new(Common::Content).text().not_null())
        .col(
            ColumnDef::new(Common::CreatedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .foreign_key(
            ForeignKey::create()
                .name(fk_name)
                .from(table, parent_col)
                .to(parent_table, parent_id)
                .on_delete(ForeignKeyAction::Cascade)
                .on_update(ForeignKeyAction::Cascade),
        )
        .to_owned()
}

fn file_table<P: Iden + Copy + 'static>(
    table: impl Iden + Copy + 'static,
    parent_col: impl Iden + Copy + 'static,
    parent_table: P,
    parent_id: impl Iden + Copy + 'static,
    fk_name: &str,
) -> TableCreateStatement {
    Table::create()
        .table(table)
        .if_not_exists()
        .col(
            ColumnDef::new(Common::Id)
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(ColumnDef::new(parent_col).integer().not_null())
        .col(ColumnDef::new(Common::Name).string().not_null())
        .col(ColumnDef::new(Common::Url).text().not_null())
        .col(ColumnDef::new(Common::Description).text())
        .col(
            ColumnDef::new(Common::Type)
                .string()
                .not_null()
                .default("document"),
        )
        .col(
            ColumnDef::new(Common::CreatedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .foreign_key(
            ForeignKey::create()
                .name(fk_name)
                .from(table, parent_col)
                .to(parent_table, parent_id)
                .on_delete(ForeignKeyAction::Cascade)
                .on_update(ForeignKeyAction::Cascade),
        )
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(comment_table(
                ClientComments::Table,
                ClientComments::ClientId,
                Clients::Table,
                Clients::Id,
                "fk-client_comment-client_id",
            ))
            .await?;
        manager
            .create_table(file_table(
                ClientFiles::Table,
                ClientFiles::ClientId,
                Clients::Table,
                Clients::Id,
                "fk-client_file-client_id",
            ))
            .await?;
        manager
            .create_table(comment_table(
                AppointmentComments::Table,
                AppointmentComments::AppointmentId,
                Appointments::Table,
                Appointments::Id,
                "fk-appointment_comment-appointment_id",
            ))
            .await?;
        manager
            .create_table(file_table(
                AppointmentFiles::Table,
                AppointmentFiles::AppointmentId,
                Appointments::Table,
                Appointments::Id,
                "fk-appointment_file-appointment_id",
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AppointmentFiles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AppointmentComments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ClientFiles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ClientComments::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden, Clone, Copy)]
enum Common {
    Id,
    Content,
    Name,
    Url,
    Description,
    Type,
    CreatedAt,
}

#[derive(DeriveIden, Clone, Copy)]
enum ClientComments {
    Table,
    ClientId,
}

#[derive(DeriveIden, Clone, Copy)]
enum ClientFiles {
    Table,
    ClientId,
}

#[derive(DeriveIden, Clone, Copy)]
enum AppointmentComments {
    Table,
    AppointmentId,
}

#[derive(DeriveIden, Clone, Copy)]
enum AppointmentFiles {
    Table,
    AppointmentId,
}

#[derive(DeriveIden, Clone, Copy)]
enum Clients {
    Table,
    Id,
}

#[derive(DeriveIden, Clone, Copy)]
enum Appointments {
    Table,
    Id,
}
