// Pass: fieldless enum stored by member name
use entsql::{FromValue, SqlEnum, ToValue, Value};

#[derive(SqlEnum, Debug, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right = 5,
    Up,
}

fn main() {
    assert_eq!(Direction::INFO.members, &[("Left", 0), ("Right", 5), ("Up", 6)]);
    assert_eq!(Direction::Right.to_value(), Value::String("Right".into()));
    assert_eq!(Direction::from_value(Value::String("Up".into())).unwrap(), Direction::Up);
    assert_eq!(Direction::from_value(Value::Int(5)).unwrap(), Direction::Right);
    assert!(Direction::from_value(Value::String("right".into())).is_err());
}
