use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // id is a digest of the row identity, so re-inserting a row is a no-op
        manager
            .create_table(
                Table::create()
                    .table(Acls::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Acls::Id).string().not_null().primary_key())
                    .col(string(Acls::RoleAssignmentId))
                    .col(string(Acls::ScopeIdentifier))
                    .col(string(Acls::PermissionIdentifier))
                    .col(string(Acls::PrincipalType))
                    .col(string(Acls::PrincipalIdentifier))
                    .col(string(Acls::ResourceSelector))
                    .col(boolean(Acls::Conditional).default(false))
                    .col(text_null(Acls::Condition))
                    .col(boolean(Acls::Implicit).default(false))
                    .col(string(Acls::RoleIdentifier))
                    .col(string(Acls::ResourceGroupIdentifier))
                    .col(string_null(Acls::UserGroupIdentifier))
                    .col(string(Acls::AclQueryString))
                    .col(big_integer(Acls::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_acls_role_assignment_selector")
                    .table(Acls::Table)
                    .col(Acls::RoleAssignmentId)
                    .col(Acls::ResourceSelector)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_acls_role_assignment_permission")
                    .table(Acls::Table)
                    .col(Acls::RoleAssignmentId)
                    .col(Acls::PermissionIdentifier)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_acls_role_assignment_principal")
                    .table(Acls::Table)
                    .col(Acls::RoleAssignmentId)
                    .col(Acls::PrincipalIdentifier)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_acls_query_string")
                    .table(Acls::Table)
                    .col(Acls::AclQueryString)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Acls::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Acls {
    Table,
    Id,
    RoleAssignmentId,
    ScopeIdentifier,
    PermissionIdentifier,
    PrincipalType,
    PrincipalIdentifier,
    ResourceSelector,
    Conditional,
    Condition,
    Implicit,
    RoleIdentifier,
    ResourceGroupIdentifier,
    UserGroupIdentifier,
    AclQueryString,
    CreatedAt,
}
