use mblock_scopes::{ScopeRegistry, check, load_roles_from_path};
use mblock_types::Scopes;

const ROLES_YAML: &str = r#"
roles:
  reader:
    scopes: ["posts:read"]
  writer:
    scopes: ["posts:write"]
    include: reader
  admin:
    scopes: ["users:manage"]
    include: [writer, reader]
"#;

#[test]
fn roles_file_drives_permission_checks() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("roles.yaml");
    std::fs::write(&path, ROLES_YAML).expect("write roles file");

    let config = load_roles_from_path(&path).expect("load roles file");
    let mut registry = ScopeRegistry::new();
    config.apply(&mut registry).expect("apply roles");

    let admin_claims = Scopes::from(registry.scopes_by_role(["admin"]));
    assert_eq!(admin_claims, Scopes::from(["users:manage", "posts:write", "posts:read"]));
    assert!(check(Some(&Scopes::from(["posts:read", "posts:write"])), &admin_claims));

    let reader_claims = Scopes::from(registry.scopes_by_role(["reader"]));
    assert!(!check(Some(&Scopes::from(["posts:read", "posts:write"])), &reader_claims));
    assert!(check(Some(&Scopes::from("posts:read")), &reader_claims));
}

#[test]
fn json_roles_files_are_accepted() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("roles.json");
    std::fs::write(&path, r#"{"roles": {"user": {"scopes": "read"}}}"#).expect("write roles file");

    let config = load_roles_from_path(&path).expect("load roles file");
    let mut registry = ScopeRegistry::new();
    config.apply(&mut registry).expect("apply roles");
    assert_eq!(registry.scopes_by_role(["user"]), ["read"]);
}

#[test]
fn malformed_roles_file_reports_its_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("roles.yaml");
    std::fs::write(&path, "roles:\n  user:\n    unexpected: true\n").expect("write roles file");

    let error = load_roles_from_path(&path).expect_err("unknown fields are rejected");
    assert!(error.to_string().contains("roles.yaml"), "error should mention the file: {error}");
}
