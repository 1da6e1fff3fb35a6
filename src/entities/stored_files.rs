use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One row per stored file. `stored_name` is the on-disk name inside the
/// owner's namespace; `original_name` is display-only and never used as a
/// path component.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stored_files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_id: String,
    pub stored_name: String,
    pub original_name: String,
    pub size_bytes: i64,
    pub created_at: DateTimeUtc,
    #[sea_orm(unique)]
    pub share_id: String,
    pub share_password_hash: Option<String>,
    pub trashed: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::OwnerId",
        to = "super::users::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Owner,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
