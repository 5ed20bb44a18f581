//! Command-line argument parsing
//!
//! A small, permissive parser in the style of `minimist`:
//!
//! - `--key=value`, `--key value` and bare `--flag` (true)
//! - `--no-flag` (false)
//! - `-abc` sets `a`, `b` and `c`; `-k value` gives the last short flag a value
//! - `--` ends option parsing
//! - numeric-looking values become numbers, `true`/`false` after a long key
//!   become booleans, dotted keys nest (`--db.port 5432`)
//! - everything else is collected, in order, under `_`
//!
//! Repeating a key collects its values into an array.

use serde_json::{Map, Value};

use crate::dot_path;

/// Key under which positional arguments are stored
pub const POSITIONAL: &str = "_";

/// Parsed command-line arguments
#[derive(Debug, Clone, PartialEq)]
pub struct CommandArgs {
    values: Value,
}

impl Default for CommandArgs {
    fn default() -> Self {
        Self::parse(std::iter::empty::<String>())
    }
}

impl CommandArgs {
    /// Parse arguments, excluding the program name
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
        let mut parsed = Parsed::default();
        let mut i = 0;

        while i < args.len() {
            let arg = args[i].as_str();

            if arg == "--" {
                parsed.positional.extend(args[i + 1..].iter().map(|a| Value::String(a.clone())));
                break;
            }

            if let Some(long) = arg.strip_prefix("--") {
                if let Some((key, value)) = long.split_once('=') {
                    parsed.set(key, coerce(value));
                } else if let Some(negated) = long.strip_prefix("no-") {
                    parsed.set(negated, Value::Bool(false));
                } else if let Some(next) = args.get(i + 1).filter(|next| takes_value(next)) {
                    let value = match next.as_str() {
                        "true" => Value::Bool(true),
                        "false" => Value::Bool(false),
                        other => coerce(other),
                    };
                    parsed.set(long, value);
                    i += 1;
                } else {
                    parsed.set(long, Value::Bool(true));
                }
            } else if let Some(short) = arg.strip_prefix('-').filter(|s| !s.is_empty() && !is_number(arg)) {
                let letters: Vec<char> = short.chars().collect();
                let (last, rest) = letters.split_last().map_or((None, &[][..]), |(l, r)| (Some(*l), r));
                for letter in rest {
                    parsed.set(&letter.to_string(), Value::Bool(true));
                }
                if let Some(last) = last {
                    match args.get(i + 1).filter(|next| takes_value(next)) {
                        Some(next) => {
                            parsed.set(&last.to_string(), coerce(next));
                            i += 1;
                        }
                        None => parsed.set(&last.to_string(), Value::Bool(true)),
                    }
                }
            } else {
                parsed.positional.push(coerce(arg));
            }

            i += 1;
        }

        parsed.finish()
    }

    /// Parse the current process arguments
    pub fn from_env() -> Self {
        Self::parse(std::env::args().skip(1))
    }

    /// Look up an argument by (dotted) name
    pub fn get(&self, name: &str) -> Option<&Value> {
        dot_path::lookup(&self.values, name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Positional arguments
    pub fn positional(&self) -> &[Value] {
        self.values
            .get(POSITIONAL)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every parsed argument as one object
    pub fn all(&self) -> &Value {
        &self.values
    }
}

#[derive(Default)]
struct Parsed {
    named: Map<String, Value>,
    positional: Vec<Value>,
}

impl Parsed {
    fn set(&mut self, key: &str, value: Value) {
        let segments = dot_path::split(key);
        let existing = segments
            .split_first()
            .and_then(|(first, _)| self.named.get(*first))
            .and_then(|found| dot_path::lookup_segments(found, &segments[1..]));
        let value = match existing {
            Some(Value::Array(existing)) => {
                let mut all = existing.clone();
                all.push(value);
                Value::Array(all)
            }
            Some(existing) if !existing.is_object() => Value::Array(vec![existing.clone(), value]),
            _ => value,
        };
        dot_path::insert_nested(&mut self.named, &segments, value);
    }

    fn finish(self) -> CommandArgs {
        let mut values = self.named;
        values.insert(POSITIONAL.to_string(), Value::Array(self.positional));
        CommandArgs {
            values: Value::Object(values),
        }
    }
}

fn takes_value(next: &str) -> bool {
    !next.starts_with('-') || is_number(next)
}

fn is_number(s: &str) -> bool {
    s.parse::<f64>().is_ok_and(f64::is_finite)
}

/// Numbers for numeric-looking strings, strings otherwise
fn coerce(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if is_number(raw) {
        if let Some(n) = raw.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_long_options() {
        let args = CommandArgs::parse(["--type=dev", "--port", "8080", "--verbose", "--no-color"]);
        assert_eq!(args.get("type"), Some(&json!("dev")));
        assert_eq!(args.get("port"), Some(&json!(8080)));
        assert_eq!(args.get("verbose"), Some(&json!(true)));
        assert_eq!(args.get("color"), Some(&json!(false)));
    }

    #[test]
    fn test_short_flags() {
        let args = CommandArgs::parse(["-abc", "-n", "3"]);
        assert_eq!(args.get("a"), Some(&json!(true)));
        assert_eq!(args.get("c"), Some(&json!(true)));
        assert_eq!(args.get("n"), Some(&json!(3)));
    }

    #[test]
    fn test_positional_and_double_dash() {
        let args = CommandArgs::parse(["serve", "--debug", "false", "file.txt", "--", "--raw"]);
        assert_eq!(args.get("debug"), Some(&json!(false)));
        assert_eq!(args.positional(), &[json!("serve"), json!("file.txt"), json!("--raw")]);
    }

    #[test]
    fn test_dotted_keys_nest() {
        let args = CommandArgs::parse(["--db.port", "5432", "--db.host=localhost"]);
        assert_eq!(args.get("db"), Some(&json!({ "port": 5432, "host": "localhost" })));
        assert_eq!(args.get("db.port"), Some(&json!(5432)));
        assert!(args.has("db.host"));
        assert!(!args.has("db.user"));
    }

    #[test]
    fn test_repeated_keys_collect() {
        let args = CommandArgs::parse(["--tag", "a", "--tag", "b", "--tag=c"]);
        assert_eq!(args.get("tag"), Some(&json!(["a", "b", "c"])));
    }

    #[test]
    fn test_negative_numbers_are_values() {
        let args = CommandArgs::parse(["--offset", "-5", "-1.5"]);
        assert_eq!(args.get("offset"), Some(&json!(-5)));
        assert_eq!(args.positional(), &[json!(-1.5)]);
    }
}
