//! User-defined flag values.

use std::cell::RefCell;
use std::rc::Rc;

/// A settable, printable value that a flag can be bound to.
///
/// `set` receives every explicit occurrence of the flag, in order, after
/// config and environment values have been merged.
pub trait Value {
    /// Type shown in help, e.g. `level`.
    fn type_name(&self) -> String;
    fn to_string(&self) -> String;
    fn set(&mut self, raw: &str) -> Result<(), String>;
}

/// Shared handle to a bound value; the caller keeps a clone to read it back.
pub type SharedValue = Rc<RefCell<dyn Value>>;

/// Wrap a value so it can be bound to a flag.
pub fn shared<V: Value + 'static>(value: V) -> Rc<RefCell<V>> {
    Rc::new(RefCell::new(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Level(u8);

    impl Value for Level {
        fn type_name(&self) -> String {
            "level".into()
        }

        fn to_string(&self) -> String {
            match self.0 {
                0 => "low",
                1 => "mid",
                _ => "high",
            }
            .into()
        }

        fn set(&mut self, raw: &str) -> Result<(), String> {
            self.0 = match raw {
                "low" => 0,
                "mid" => 1,
                "high" => 2,
                other => return Err(format!("unknown level {other:?}")),
            };
            Ok(())
        }
    }

    #[test]
    fn shared_handles_see_each_others_writes() {
        let level = shared(Level(0));
        let erased: SharedValue = level.clone();
        erased.borrow_mut().set("high").unwrap();
        assert_eq!(Value::to_string(&*level.borrow()), "high");
        assert!(erased.borrow_mut().set("max").is_err());
        assert_eq!(erased.borrow().type_name(), "level");
    }
}
