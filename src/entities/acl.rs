use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "acls")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String, // digest of the row identity
    pub role_assignment_id: String,
    pub scope_identifier: String,
    pub permission_identifier: String,
    pub principal_type: String,
    pub principal_identifier: String,
    pub resource_selector: String,
    pub conditional: bool,
    pub condition: Option<String>,
    pub implicit: bool,
    pub role_identifier: String,
    pub resource_group_identifier: String,
    pub user_group_identifier: Option<String>,
    pub acl_query_string: String,
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
