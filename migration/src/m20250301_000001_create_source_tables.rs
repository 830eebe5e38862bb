use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Roles: NULL scope_identifier marks a managed role visible in every scope
        manager
            .create_table(
                Table::create()
                    .table(Roles::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Roles::Id).string().not_null().primary_key())
                    .col(string(Roles::Identifier))
                    .col(string_null(Roles::ScopeIdentifier))
                    .col(text(Roles::Permissions))
                    .col(big_integer(Roles::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_roles_identifier_scope")
                    .table(Roles::Table)
                    .col(Roles::Identifier)
                    .col(Roles::ScopeIdentifier)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserGroups::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserGroups::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(string(UserGroups::Identifier))
                    .col(string(UserGroups::ScopeIdentifier))
                    .col(text(UserGroups::Users))
                    .col(big_integer(UserGroups::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_user_groups_identifier_scope")
                    .table(UserGroups::Table)
                    .col(UserGroups::Identifier)
                    .col(UserGroups::ScopeIdentifier)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ResourceGroups::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ResourceGroups::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(string(ResourceGroups::Identifier))
                    .col(string_null(ResourceGroups::ScopeIdentifier))
                    .col(text(ResourceGroups::ResourceSelectors))
                    .col(text(ResourceGroups::ResourceSelectorsV2))
                    .col(text(ResourceGroups::ScopeSelectors))
                    .col(big_integer(ResourceGroups::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_resource_groups_identifier_scope")
                    .table(ResourceGroups::Table)
                    .col(ResourceGroups::Identifier)
                    .col(ResourceGroups::ScopeIdentifier)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RoleAssignments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RoleAssignments::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(string(RoleAssignments::Identifier))
                    .col(string(RoleAssignments::ScopeIdentifier))
                    .col(string(RoleAssignments::RoleIdentifier))
                    .col(string(RoleAssignments::ResourceGroupIdentifier))
                    .col(string(RoleAssignments::PrincipalType))
                    .col(string(RoleAssignments::PrincipalIdentifier))
                    .col(string_null(RoleAssignments::PrincipalScopeLevel))
                    .col(boolean(RoleAssignments::Disabled).default(false))
                    .col(big_integer(RoleAssignments::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_role_assignments_identifier_scope")
                    .table(RoleAssignments::Table)
                    .col(RoleAssignments::Identifier)
                    .col(RoleAssignments::ScopeIdentifier)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Lookups by referenced resource group / role / principal drive the fan-out
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_role_assignments_resource_group")
                    .table(RoleAssignments::Table)
                    .col(RoleAssignments::ResourceGroupIdentifier)
                    .col(RoleAssignments::ScopeIdentifier)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_role_assignments_role")
                    .table(RoleAssignments::Table)
                    .col(RoleAssignments::RoleIdentifier)
                    .col(RoleAssignments::ScopeIdentifier)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_role_assignments_principal")
                    .table(RoleAssignments::Table)
                    .col(RoleAssignments::PrincipalType)
                    .col(RoleAssignments::PrincipalIdentifier)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RoleAssignments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ResourceGroups::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserGroups::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Roles::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Roles {
    Table,
    Id,
    Identifier,
    ScopeIdentifier,
    Permissions,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum UserGroups {
    Table,
    Id,
    Identifier,
    ScopeIdentifier,
    Users,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ResourceGroups {
    Table,
    Id,
    Identifier,
    ScopeIdentifier,
    ResourceSelectors,
    ResourceSelectorsV2,
    ScopeSelectors,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum RoleAssignments {
    Table,
    Id,
    Identifier,
    ScopeIdentifier,
    RoleIdentifier,
    ResourceGroupIdentifier,
    PrincipalType,
    PrincipalIdentifier,
    PrincipalScopeLevel,
    Disabled,
    UpdatedAt,
}
