//! Layering and legacy conversion for config trees

use serde_yaml::Value as YamlValue;
use toml::{Table, Value};

/// Layer `user` over `defaults`.
///
/// Keys missing from the user tree are copied from the defaults, at every
/// nesting level. Where both sides hold a table the merge recurses; anything
/// else (scalars, arrays, or a type mismatch) keeps the user's value as-is.
pub fn merge_config(mut user: Table, defaults: &Table) -> Table {
    merge_into(&mut user, defaults);
    user
}

fn merge_into(user: &mut Table, defaults: &Table) {
    for (key, default_value) in defaults {
        match user.get_mut(key) {
            None => {
                user.insert(key.clone(), default_value.clone());
            }
            Some(Value::Table(user_table)) => {
                if let Value::Table(default_table) = default_value {
                    merge_into(user_table, default_table);
                }
            }
            Some(_) => {}
        }
    }
}

/// Convert a parsed legacy (YAML) document into a TOML table.
///
/// Mapping keys are coerced to strings (YAML happily produces integer or
/// boolean keys) and null values are dropped since TOML cannot express them.
/// Returns `None` when the document is not a mapping; an empty document
/// becomes an empty table.
pub fn legacy_to_table(doc: YamlValue) -> Option<Table> {
    match doc {
        YamlValue::Null => Some(Table::new()),
        YamlValue::Mapping(_) | YamlValue::Tagged(_) => match yaml_to_toml(doc)? {
            Value::Table(table) => Some(table),
            _ => None,
        },
        _ => None,
    }
}

fn yaml_to_toml(value: YamlValue) -> Option<Value> {
    match value {
        YamlValue::Null => None,
        YamlValue::Bool(b) => Some(Value::Boolean(b)),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Value::Integer(i))
            } else {
                n.as_f64().map(Value::Float)
            }
        }
        YamlValue::String(s) => Some(Value::String(s)),
        YamlValue::Sequence(items) => Some(Value::Array(
            items.into_iter().filter_map(yaml_to_toml).collect(),
        )),
        YamlValue::Mapping(mapping) => {
            let mut table = Table::new();
            for (key, value) in mapping {
                if let Some(value) = yaml_to_toml(value) {
                    table.insert(key_to_string(&key), value);
                }
            }
            Some(Value::Table(table))
        }
        YamlValue::Tagged(tagged) => yaml_to_toml(tagged.value),
    }
}

fn key_to_string(key: &YamlValue) -> String {
    match key {
        YamlValue::String(s) => s.clone(),
        YamlValue::Number(n) => n.to_string(),
        // spelled the way older releases wrote them back out
        YamlValue::Bool(true) => "True".to_string(),
        YamlValue::Bool(false) => "False".to_string(),
        YamlValue::Null => "None".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(src: &str) -> Table {
        toml::from_str(src).expect("test toml should parse")
    }

    #[test]
    fn test_user_value_wins_at_leaf() {
        let merged = merge_config(table("a = 2"), &table("a = 1\nb = 3"));
        assert_eq!(merged["a"].as_integer(), Some(2));
        assert_eq!(merged["b"].as_integer(), Some(3));
    }

    #[test]
    fn test_defaults_fill_nested_tables() {
        let defaults = table(
            r#"
            [ui.display]
            type = "inky"
            rotation = 180
            [ui.web]
            port = 8080
            "#,
        );
        let user = table(
            r#"
            [ui.display]
            rotation = 0
            "#,
        );

        let merged = merge_config(user, &defaults);
        let display = merged["ui"]["display"].as_table().unwrap();
        assert_eq!(display["rotation"].as_integer(), Some(0));
        assert_eq!(display["type"].as_str(), Some("inky"));
        assert_eq!(merged["ui"]["web"]["port"].as_integer(), Some(8080));
    }

    #[test]
    fn test_arrays_are_replaced_not_merged() {
        let merged = merge_config(
            table(r#"whitelist = ["home"]"#),
            &table(r#"whitelist = ["a", "b", "c"]"#),
        );
        let list = merged["whitelist"].as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].as_str(), Some("home"));
    }

    #[test]
    fn test_user_scalar_shadows_default_table() {
        let merged = merge_config(table("ui = false"), &table("[ui]\nfps = 1"));
        assert_eq!(merged["ui"].as_bool(), Some(false));
    }

    #[test]
    fn test_merge_keeps_every_default_key_and_is_idempotent() {
        let defaults = table(
            r#"
            name = "unit"
            [main]
            iface = "mon0"
            plugins = { grid = { enabled = true }, led = { enabled = false } }
            [personality]
            deauth = true
            channels = []
            "#,
        );
        let user = table(
            r#"
            name = "custom"
            [main.plugins.led]
            enabled = true
            [personality]
            channels = [1, 6, 11]
            "#,
        );

        let once = merge_config(user, &defaults);
        let twice = merge_config(once.clone(), &defaults);
        assert_eq!(once, twice);

        assert_eq!(once["name"].as_str(), Some("custom"));
        assert_eq!(once["main"]["iface"].as_str(), Some("mon0"));
        assert_eq!(once["main"]["plugins"]["grid"]["enabled"].as_bool(), Some(true));
        assert_eq!(once["main"]["plugins"]["led"]["enabled"].as_bool(), Some(true));
        assert_eq!(once["personality"]["deauth"].as_bool(), Some(true));
        assert_eq!(once["personality"]["channels"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_legacy_keys_are_coerced_to_strings() {
        let doc: YamlValue = serde_yaml::from_str(
            r#"
main:
  name: unit
  custom_channels:
    1: low
    6: mid
  flags:
    true: on
    false: off
    ~: unset
ratio: 0.5
missing: ~
"#,
        )
        .unwrap();

        let converted = legacy_to_table(doc).unwrap();
        assert_eq!(converted["main"]["name"].as_str(), Some("unit"));
        assert_eq!(converted["main"]["custom_channels"]["1"].as_str(), Some("low"));
        assert_eq!(converted["main"]["custom_channels"]["6"].as_str(), Some("mid"));
        assert_eq!(converted["main"]["flags"]["True"].as_str(), Some("on"));
        assert_eq!(converted["main"]["flags"]["False"].as_str(), Some("off"));
        assert_eq!(converted["main"]["flags"]["None"].as_str(), Some("unset"));
        assert_eq!(converted["ratio"].as_float(), Some(0.5));
        assert!(!converted.contains_key("missing"));

        // the result must be writable as TOML
        let rendered = toml::to_string(&converted).unwrap();
        assert_eq!(toml::from_str::<Table>(&rendered).unwrap(), converted);
    }

    #[test]
    fn test_legacy_mappings_inside_sequences_are_converted() {
        let doc: YamlValue = serde_yaml::from_str("list:\n  - 1\n  - {2: two, gone: null}\n").unwrap();

        let converted = legacy_to_table(doc).unwrap();
        let list = converted["list"].as_array().unwrap();
        assert_eq!(list[0].as_integer(), Some(1));
        assert_eq!(list[1]["2"].as_str(), Some("two"));
        assert!(!list[1].as_table().unwrap().contains_key("gone"));
    }

    #[test]
    fn test_empty_legacy_document_is_empty_table() {
        let doc: YamlValue = serde_yaml::from_str("").unwrap();
        assert_eq!(legacy_to_table(doc), Some(Table::new()));
    }

    #[test]
    fn test_legacy_document_must_be_a_mapping() {
        let doc: YamlValue = serde_yaml::from_str("- a\n- b\n").unwrap();
        assert_eq!(legacy_to_table(doc), None);
    }
}
