//! Task Wire Format
//!
//! A value map crosses the process boundary as command-line flags:
//! `--key value` for text, one `--key value` per entry for lists, a bare
//! `--key` for a set flag, nothing for an unset flag.

use crate::error::StageError;
use crate::graph::{Value, ValueMap};

/// Serializes a value map into an argument vector.
pub fn to_args(map: &ValueMap) -> Vec<String> {
    let mut args = Vec::new();

    for (key, value) in map.iter() {
        let flag = format!("--{}", key);
        match value {
            Value::Flag(true) => args.push(flag),
            Value::Flag(false) => {}
            Value::Text(s) => {
                args.push(flag);
                args.push(s.clone());
            }
            Value::List(items) => {
                for item in items {
                    args.push(flag.clone());
                    args.push(item.clone());
                }
            }
        }
    }

    args
}

/// Parses an argument vector back into a value map.
///
/// A repeated key becomes a list; a key with no value becomes a set flag.
/// A single-entry list therefore comes back as text, which
/// [`Value::items`] treats the same way.
pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<ValueMap, StageError> {
    let mut map = ValueMap::new();
    let mut iter = args.iter().map(AsRef::as_ref).peekable();

    while let Some(token) = iter.next() {
        let key = token
            .strip_prefix("--")
            .filter(|k| !k.is_empty())
            .ok_or_else(|| StageError::MalformedArgument(token.to_string()))?;

        let takes_value = iter.peek().is_some_and(|next| !next.starts_with("--"));
        let value = if takes_value {
            iter.next().map(str::to_string)
        } else {
            None
        };

        match value {
            None => {
                map.insert(key, true);
            }
            Some(value) => {
                let merged = match map.get(key) {
                    Some(Value::Text(first)) => Value::List(vec![first.clone(), value]),
                    Some(Value::List(items)) => {
                        let mut items = items.clone();
                        items.push(value);
                        Value::List(items)
                    }
                    Some(Value::Flag(_)) | None => Value::Text(value),
                };
                map.insert(key, merged);
            }
        }
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_args_shapes() {
        let map = ValueMap::new()
            .with("index", "/ref/star")
            .with("fastq", Value::list(["a.fq", "b.fq"]))
            .with("dry-run", true)
            .with("verbose", false);

        assert_eq!(
            to_args(&map),
            vec!["--index", "/ref/star", "--fastq", "a.fq", "--fastq", "b.fq", "--dry-run"]
        );
    }

    #[test]
    fn test_to_args_empty_list_is_omitted() {
        let map = ValueMap::new().with("sample", Value::List(Vec::new()));
        assert!(to_args(&map).is_empty());
    }

    #[test]
    fn test_from_args_repeated_key_becomes_list() {
        let args = ["--fastq", "a.fq", "--index", "/ref", "--fastq", "b.fq", "--dry-run"];
        let map = from_args(&args).unwrap();

        assert_eq!(map.get("fastq"), Some(&Value::list(["a.fq", "b.fq"])));
        assert_eq!(map.get_str("index"), Some("/ref"));
        assert!(map.get("dry-run").unwrap().is_set());
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["fastq", "index", "dry-run"]);
    }

    #[test]
    fn test_from_args_three_entries() {
        let args = ["--sample", "s1", "--sample", "s2", "--sample", "s3"];
        let map = from_args(&args).unwrap();
        assert_eq!(map.get_items("sample"), vec!["s1", "s2", "s3"]);
    }

    #[test]
    fn test_from_args_rejects_positional() {
        let err = from_args(&["stray"]).unwrap_err();
        assert!(matches!(err, StageError::MalformedArgument(arg) if arg == "stray"));
        assert!(from_args(&["--"]).is_err());
    }

    #[test]
    fn test_from_args_negative_number_is_a_value() {
        let map = from_args(&["--offset", "-1"]).unwrap();
        assert_eq!(map.get_str("offset"), Some("-1"));
    }
}
