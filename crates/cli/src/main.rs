use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use mblock_query::QueryOptions;
use mblock_scopes::{ScopeRegistry, check_value, default_roles_path, load_roles_from_path};
use mblock_types::Record;
use serde_json::Value;
use tracing::{Level, debug, warn};

fn main() -> Result<()> {
    init_tracing();
    let matches = build_cli().get_matches();
    run_command(&matches)
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_cli() -> Command {
    Command::new("mblock")
        .about("Evaluate where conditions and authorization scopes")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("match")
                .about("Test a single record against a where condition")
                .arg(Arg::new("record").long("record").short('r').required(true).action(ArgAction::Set).help("Record as a JSON object"))
                .arg(Arg::new("where").long("where").short('w').required(true).action(ArgAction::Set).help("Condition as JSON")),
        )
        .subcommand(
            Command::new("filter")
                .about("Print the records in a JSON file that match a where condition")
                .arg(Arg::new("records").long("records").short('f').required(true).action(ArgAction::Set).help("Path to a JSON array of records"))
                .arg(Arg::new("where").long("where").short('w').action(ArgAction::Set).help("Condition as JSON; omit to select every record"))
                .arg(
                    Arg::new("columns")
                        .long("columns")
                        .short('c')
                        .action(ArgAction::Set)
                        .value_delimiter(',')
                        .num_args(1..)
                        .help("Comma-separated columns to keep"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Check caller claims against required scopes")
                .arg(Arg::new("required").long("required").required(true).action(ArgAction::Set).help("Required scopes: JSON string or array"))
                .arg(Arg::new("claims").long("claims").required(true).action(ArgAction::Set).help("Claimed scopes: JSON string or array")),
        )
        .subcommand(
            Command::new("roles")
                .about("Print the flattened scopes granted by roles")
                .arg(Arg::new("config").long("config").action(ArgAction::Set).help("Roles file (defaults to $MBLOCK_ROLES_PATH or the user config dir)"))
                .arg(Arg::new("role").required(true).action(ArgAction::Append).num_args(1..).help("Role names")),
        )
}

fn run_command(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("match", sub)) => {
            let record = record_arg(sub, "record")?;
            let condition = json_arg(sub, "where")?;
            println!("{}", mblock_query::matches(&record, &condition)?);
        }
        Some(("filter", sub)) => {
            let path = sub.get_one::<String>("records").context("--records is required")?;
            let records = load_records(Path::new(path))?;
            let mut options = QueryOptions::default();
            if sub.contains_id("where") {
                options.condition = Some(json_arg(sub, "where")?);
            }
            if let Some(columns) = sub.get_many::<String>("columns") {
                options = options.columns(columns.cloned());
            }
            let found = filter_records(records, &options)?;
            println!("{}", serde_json::to_string_pretty(&found)?);
        }
        Some(("check", sub)) => {
            let required = json_or_string_arg(sub, "required")?;
            let claims = json_or_string_arg(sub, "claims")?;
            println!("{}", check_value(&required, &claims)?);
        }
        Some(("roles", sub)) => {
            let path = sub.get_one::<String>("config").map(PathBuf::from).unwrap_or_else(default_roles_path);
            let roles: Vec<&str> = sub.get_many::<String>("role").into_iter().flatten().map(String::as_str).collect();
            let scopes = resolve_roles(&path, &roles)?;
            println!("{}", serde_json::to_string_pretty(&scopes)?);
        }
        _ => bail!("unknown command; run `mblock --help`"),
    }
    Ok(())
}

fn json_arg(matches: &ArgMatches, name: &str) -> Result<Value> {
    let raw = matches.get_one::<String>(name).with_context(|| format!("--{name} is required"))?;
    serde_json::from_str(raw).with_context(|| format!("--{name} is not valid JSON"))
}

/// Like [`json_arg`], but a bare word such as `read` is taken as a JSON string.
fn json_or_string_arg(matches: &ArgMatches, name: &str) -> Result<Value> {
    let raw = matches.get_one::<String>(name).with_context(|| format!("--{name} is required"))?;
    Ok(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone())))
}

fn record_arg(matches: &ArgMatches, name: &str) -> Result<Record> {
    match json_arg(matches, name)? {
        Value::Object(record) => Ok(record),
        other => bail!("--{name} must be a JSON object, got {other}"),
    }
}

fn load_records(path: &Path) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let value: Value = serde_json::from_str(&content).with_context(|| format!("parse {}", path.display()))?;
    let Value::Array(items) = value else {
        bail!("{} must contain a JSON array of records", path.display());
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(record) => Ok(record),
            other => bail!("item {index} in {} is not an object: {other}", path.display()),
        })
        .collect()
}

/// Filters every loaded record in file order. Records need no `id`, and
/// repeated ids are all kept.
fn filter_records(records: Vec<Record>, options: &QueryOptions) -> Result<Vec<Record>> {
    let condition = options.compile().context("invalid --where condition")?;
    let total = records.len();
    let found: Vec<Record> = records
        .iter()
        .filter(|record| condition.evaluate(record))
        .map(|record| options.project(record))
        .collect();
    debug!(record_count = total, result_count = found.len(), "filtered records");
    Ok(found)
}

fn resolve_roles(path: &Path, roles: &[&str]) -> Result<Vec<String>> {
    let config = load_roles_from_path(path)?;
    let mut registry = ScopeRegistry::new();
    config.apply(&mut registry)?;
    for role in roles.iter().filter(|role| !registry.has_role(role)) {
        warn!(role = %role, path = %path.display(), "role is not defined");
    }
    Ok(registry.scopes_by_role(roles.iter().copied()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(args: &[&str]) -> ArgMatches {
        build_cli().try_get_matches_from(args).expect("valid arguments")
    }

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn columns_split_on_commas() {
        let matches = parse(&["mblock", "filter", "--records", "r.json", "--columns", "id,name"]);
        let (_, sub) = matches.subcommand().expect("subcommand");
        let columns: Vec<&String> = sub.get_many::<String>("columns").expect("columns").collect();
        assert_eq!(columns, ["id", "name"]);
    }

    #[test]
    fn check_accepts_bare_scope_names() {
        let matches = parse(&["mblock", "check", "--required", "read", "--claims", r#"["read","write"]"#]);
        let (_, sub) = matches.subcommand().expect("subcommand");
        assert_eq!(json_or_string_arg(sub, "required").expect("required"), json!("read"));
        assert_eq!(json_or_string_arg(sub, "claims").expect("claims"), json!(["read", "write"]));
    }

    #[test]
    fn match_rejects_non_object_records() {
        let matches = parse(&["mblock", "match", "--record", "[1]", "--where", "{}"]);
        let (_, sub) = matches.subcommand().expect("subcommand");
        assert!(record_arg(sub, "record").is_err());
    }

    #[test]
    fn filter_loads_file_and_applies_options() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("records.json");
        std::fs::write(&path, r#"[{"id": 1, "kind": "a"}, {"id": 2, "kind": "b"}, {"id": 3, "kind": "a"}]"#).expect("write records");

        let records = load_records(&path).expect("load");
        let options = QueryOptions::with_condition(json!({"kind": "a"})).columns(["id"]);
        let found = filter_records(records, &options).expect("filter");
        assert_eq!(Value::from(found.into_iter().map(Value::Object).collect::<Vec<_>>()), json!([{"id": 1}, {"id": 3}]));
    }

    #[test]
    fn load_records_requires_an_array_of_objects() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"[{"id": 1}, 2]"#).expect("write records");
        let error = load_records(&path).expect_err("non-object item");
        assert!(error.to_string().contains("item 1"));
    }

    #[test]
    fn roles_resolve_from_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("roles.yaml");
        std::fs::write(&path, "roles:\n  user:\n    scopes: [read]\n  admin:\n    scopes: [write]\n    include: [user]\n")
            .expect("write roles");

        assert_eq!(resolve_roles(&path, &["admin"]).expect("roles"), ["write", "read"]);
        assert!(resolve_roles(&path, &["ghost"]).expect("roles").is_empty());
    }

    #[test]
    fn roles_file_without_root_key_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("roles.yaml");
        std::fs::write(&path, "user:\n  scopes: [read]\n").expect("write roles");

        let message = resolve_roles(&path, &["user"]).expect_err("missing roles key").to_string();
        assert!(message.contains("Failed to parse roles file"), "{message}");
        assert!(message.contains("roles.yaml"), "{message}");
    }

    #[test]
    fn filter_keeps_records_with_repeated_or_missing_ids() {
        let records = vec![
            json!({"id": 1, "kind": "a"}),
            json!({"id": "1", "kind": "a"}),
            json!({"id": 1, "kind": "a", "copy": true}),
            json!({"kind": "a"}),
            json!({"id": 2, "kind": "b"}),
        ]
        .into_iter()
        .filter_map(|value| value.as_object().cloned())
        .collect();

        let found = filter_records(records, &QueryOptions::with_condition(json!({"kind": "a"}))).expect("filter");
        assert_eq!(found.len(), 4);
        assert_eq!(found[2].get("copy"), Some(&json!(true)));
    }

    #[test]
    fn filter_rejects_unknown_operators() {
        let options = QueryOptions::with_condition(json!({"kind": {"regex": "a"}}));
        assert!(filter_records(Vec::new(), &options).is_err());
    }
}
