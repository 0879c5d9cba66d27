//! SeaORM Entity for questions table

use sea_orm::entity::prelude::*;

/// The closed set of answer kinds a question can take. Stored as a
/// lowercase string column; freshly added questions hold the empty
/// string until the author commits a type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnswerType {
    Text,
    Radio,
    Checkbox,
    Dropdown,
}

impl AnswerType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "radio" => Some(Self::Radio),
            "checkbox" => Some(Self::Checkbox),
            "dropdown" => Some(Self::Dropdown),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Radio => "radio",
            Self::Checkbox => "checkbox",
            Self::Dropdown => "dropdown",
        }
    }

    /// Text questions carry no option rows; every other kind does.
    pub fn has_options(self) -> bool {
        !matches!(self, Self::Text)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "questions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub text: String,
    /// One of the [`AnswerType`] string values, or "" while unset.
    pub answer_type: String,
    /// Cached count of option rows. Always 0 for text questions.
    pub option_count: i32,
    /// false marks a question under edit, not yet part of the visible form.
    pub saved: bool,
    pub sort_order: i32,
    pub form_id: String,
}

impl Model {
    pub fn kind(&self) -> Option<AnswerType> {
        AnswerType::parse(&self.answer_type)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::forms::Entity",
        from = "Column::FormId",
        to = "super::forms::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Form,
    #[sea_orm(has_many = "super::options::Entity")]
    Options,
    #[sea_orm(has_many = "super::responses::Entity")]
    Responses,
}

impl Related<super::forms::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Form.def()
    }
}

impl Related<super::options::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Options.def()
    }
}

impl Related<super::responses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Responses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
