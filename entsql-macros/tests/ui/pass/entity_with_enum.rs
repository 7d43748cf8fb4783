// Pass: enum property inside an entity
use entsql::{ClientType, Entity, SqlEnum};

#[derive(SqlEnum, Default, Debug, PartialEq, Eq)]
pub enum Status {
    #[default]
    Active,
    Suspended,
}

#[derive(Entity, Default)]
#[entity(map = "Accounts")]
pub struct Account {
    pub id: i32,
    pub status: Status,
}

fn main() {
    let desc = Account::descriptor();
    assert_eq!(desc.map, Some("Accounts"));
    assert_eq!(
        desc.properties[1].client_type,
        Some(ClientType::Enum(<Status as SqlEnum>::INFO))
    );
}
