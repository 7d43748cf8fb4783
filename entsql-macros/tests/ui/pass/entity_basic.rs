// Pass: plain struct, every property mapped by convention
use entsql::{Entity, Value};

#[derive(Entity, Default)]
pub struct Person {
    pub id: i32,
    pub name: String,
    pub nickname: Option<String>,
}

fn main() {
    let desc = Person::descriptor();
    assert_eq!(desc.name, "Person");
    assert_eq!(desc.properties.len(), 3);
    assert!(desc.table.is_none());

    let person = Person { id: 7, name: "Ada".into(), nickname: None };
    assert_eq!(
        person.values(),
        vec![Value::Int(7), Value::String("Ada".into()), Value::Null]
    );
}
