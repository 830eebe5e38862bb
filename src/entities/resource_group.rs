use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "resource_groups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub identifier: String,
    pub scope_identifier: Option<String>, // NULL for managed resource groups
    pub resource_selectors: String,       // JSON array of strings
    pub resource_selectors_v2: String,    // JSON array of {selector, conditional, condition}
    pub scope_selectors: String,          // JSON array of {scope_identifier, include_child_scopes}
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
