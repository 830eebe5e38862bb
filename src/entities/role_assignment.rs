use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "role_assignments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub identifier: String,
    pub scope_identifier: String,
    pub role_identifier: String,
    pub resource_group_identifier: String,
    pub principal_type: String, // "USER" | "USER_GROUP" | "SERVICE_ACCOUNT"
    pub principal_identifier: String,
    pub principal_scope_level: Option<String>,
    pub disabled: bool,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
