// Pass: entity and column attributes
use entsql::{DbType, Entity, Value};

#[derive(Entity, Default)]
#[entity(table = "Customers", schema = "sales")]
pub struct Customer {
    #[column(primary, identity)]
    pub id: i64,
    #[column(name = "FullName", db_type = "AnsiString")]
    pub name: String,
    #[column(skip)]
    pub cached: Vec<String>,
    secret: String,
}

fn main() {
    let desc = Customer::descriptor();
    assert_eq!(desc.table, Some("Customers"));
    assert_eq!(desc.schema, Some("sales"));

    let id = &desc.properties[0];
    assert!(id.primary && id.identity);
    let name = &desc.properties[1];
    assert_eq!(name.column, Some("FullName"));
    assert_eq!(name.db_type, Some(DbType::AnsiString));
    assert!(desc.properties[2].not_mapped);
    assert!(!desc.properties[3].accessible);

    let mut customer = Customer::default();
    customer.assign(1, Value::String("Grace".into())).unwrap();
    customer.assign(3, Value::String("ignored".into())).unwrap();
    assert_eq!(customer.name, "Grace");
    assert!(customer.secret.is_empty());
}
