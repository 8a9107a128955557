//! Structural checks for devfile 2.0.0, run on the untyped YAML tree.
//!
//! Each check reports the first violation it finds, with a dotted location such
//! as `components[1].container`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::{Mapping, Value};

use crate::validator::ValidationError;

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("valid name pattern"));

const MAX_NAME_LEN: usize = 63;

const TOP_LEVEL_KEYS: &[&str] = &[
    "schemaVersion",
    "metadata",
    "parent",
    "projects",
    "starterProjects",
    "components",
    "commands",
    "events",
];

const COMPONENT_TYPES: &[&str] = &["container", "kubernetes", "openshift", "volume", "plugin"];
const COMMAND_TYPES: &[&str] = &["exec", "apply", "composite", "vscodeTask", "vscodeLaunch"];
const PROJECT_SOURCES: &[&str] = &["git", "github", "zip"];
const EVENT_PHASES: &[&str] = &["preStart", "postStart", "preStop", "postStop"];
const GROUP_KINDS: &[&str] = &["build", "run", "test", "debug"];
const EXPOSURES: &[&str] = &["public", "internal", "none"];
const PROTOCOLS: &[&str] = &["http", "https", "ws", "wss", "tcp", "udp"];

type SchemaResult<T = ()> = Result<T, ValidationError>;

// =============================================================================
// PRIMITIVE CHECKS
// =============================================================================

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "array",
        Value::Mapping(_) => "object",
        Value::Tagged(_) => "tagged value",
    }
}

fn invalid_type(location: &str, expected: &str, value: &Value) -> ValidationError {
    ValidationError::schema(
        location,
        format!("invalid type: expected {}, found {}", expected, type_name(value)),
    )
}

fn child(location: &str, key: &str) -> String {
    format!("{}.{}", location, key)
}

fn object<'a>(value: &'a Value, location: &str) -> SchemaResult<&'a Mapping> {
    value
        .as_mapping()
        .ok_or_else(|| invalid_type(location, "object", value))
}

fn array<'a>(value: &'a Value, location: &str) -> SchemaResult<&'a [Value]> {
    value
        .as_sequence()
        .map(Vec::as_slice)
        .ok_or_else(|| invalid_type(location, "array", value))
}

fn string<'a>(value: &'a Value, location: &str) -> SchemaResult<&'a str> {
    value
        .as_str()
        .ok_or_else(|| invalid_type(location, "string", value))
}

fn boolean(value: &Value, location: &str) -> SchemaResult {
    value
        .as_bool()
        .map(|_| ())
        .ok_or_else(|| invalid_type(location, "boolean", value))
}

fn integer(value: &Value, location: &str) -> SchemaResult<i64> {
    value
        .as_i64()
        .ok_or_else(|| invalid_type(location, "integer", value))
}

fn string_array(value: &Value, location: &str) -> SchemaResult {
    for (i, item) in array(value, location)?.iter().enumerate() {
        string(item, &format!("{}[{}]", location, i))?;
    }
    Ok(())
}

fn one_of(value: &str, allowed: &[&str], location: &str) -> SchemaResult {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::schema(
            location,
            format!("value {:?} must be one of [{}]", value, allowed.join(", ")),
        ))
    }
}

/// Rejects keys outside `allowed`.
fn known_keys(map: &Mapping, allowed: &[&str], location: &str) -> SchemaResult {
    for (key, _) in map.iter() {
        let Some(key) = key.as_str() else {
            return Err(invalid_type(location, "string keys", key));
        };
        if !allowed.contains(&key) {
            return Err(ValidationError::schema(
                location,
                format!("additional property {} is not allowed", key),
            ));
        }
    }
    Ok(())
}

fn required<'a>(map: &'a Mapping, key: &str, location: &str) -> SchemaResult<&'a Value> {
    match map.get(key) {
        Some(value) if !value.is_null() => Ok(value),
        _ => Err(ValidationError::schema(
            location,
            format!("missing required field: {}", key),
        )),
    }
}

fn optional<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|v| !v.is_null())
}

/// Returns the single key from `options` that is present.
fn exactly_one<'m>(map: &Mapping, options: &[&'m str], location: &str) -> SchemaResult<&'m str> {
    let present: Vec<&str> = options
        .iter()
        .copied()
        .filter(|key| optional(map, key).is_some())
        .collect();
    match present.as_slice() {
        [single] => Ok(*single),
        [] => Err(ValidationError::schema(
            location,
            format!("must set exactly one of [{}], found none", options.join(", ")),
        )),
        many => Err(ValidationError::schema(
            location,
            format!(
                "must set exactly one of [{}], found {}",
                options.join(", "),
                many.join(", ")
            ),
        )),
    }
}

/// Names and ids are lowercase DNS labels.
fn name(value: &Value, location: &str) -> SchemaResult {
    let name = string(value, location)?;
    if name.len() > MAX_NAME_LEN {
        return Err(ValidationError::schema(
            location,
            format!("{:?} is longer than {} characters", name, MAX_NAME_LEN),
        ));
    }
    if !NAME_PATTERN.is_match(name) {
        return Err(ValidationError::schema(
            location,
            format!("{:?} does not match pattern {}", name, NAME_PATTERN.as_str()),
        ));
    }
    Ok(())
}

fn optional_with<F>(map: &Mapping, key: &str, location: &str, check: F) -> SchemaResult
where
    F: FnOnce(&Value, &str) -> SchemaResult,
{
    match optional(map, key) {
        Some(value) => check(value, &child(location, key)),
        None => Ok(()),
    }
}

fn each<F>(value: &Value, location: &str, mut check: F) -> SchemaResult
where
    F: FnMut(&Value, &str) -> SchemaResult,
{
    for (i, item) in array(value, location)?.iter().enumerate() {
        check(item, &format!("{}[{}]", location, i))?;
    }
    Ok(())
}

// =============================================================================
// DOCUMENT
// =============================================================================

/// Checks the whole document against the 2.0.0 structure.
pub fn check_v200(root: &Mapping) -> SchemaResult {
    let location = "devfile";
    known_keys(root, TOP_LEVEL_KEYS, location)?;
    string(required(root, "schemaVersion", location)?, "schemaVersion")?;

    optional_with(root, "metadata", location, check_metadata)?;
    optional_with(root, "parent", location, check_parent)?;
    if let Some(projects) = optional(root, "projects") {
        each(projects, "projects", |v, loc| check_project(v, loc, false))?;
    }
    if let Some(projects) = optional(root, "starterProjects") {
        each(projects, "starterProjects", |v, loc| check_project(v, loc, true))?;
    }
    if let Some(components) = optional(root, "components") {
        each(components, "components", check_component)?;
    }
    if let Some(commands) = optional(root, "commands") {
        each(commands, "commands", check_command)?;
    }
    if let Some(events) = optional(root, "events") {
        check_events(events, "events")?;
    }
    Ok(())
}

fn check_metadata(value: &Value, location: &str) -> SchemaResult {
    let map = object(value, location)?;
    for key in ["name", "version", "displayName", "description"] {
        optional_with(map, key, location, |v, loc| string(v, loc).map(|_| ()))?;
    }
    Ok(())
}

fn check_parent(value: &Value, location: &str) -> SchemaResult {
    let map = object(value, location)?;
    known_keys(
        map,
        &[
            "uri",
            "id",
            "kubernetes",
            "registryUrl",
            "attributes",
            "projects",
            "starterProjects",
            "components",
            "commands",
        ],
        location,
    )?;
    exactly_one(map, &["uri", "id", "kubernetes"], location)?;
    Ok(())
}

fn check_group(value: &Value, location: &str) -> SchemaResult {
    let map = object(value, location)?;
    known_keys(map, &["kind", "isDefault"], location)?;
    let kind_location = child(location, "kind");
    let kind = string(required(map, "kind", location)?, &kind_location)?;
    one_of(kind, GROUP_KINDS, &kind_location)?;
    optional_with(map, "isDefault", location, boolean)
}

fn check_env(value: &Value, location: &str) -> SchemaResult {
    each(value, location, |item, loc| {
        let map = object(item, loc)?;
        known_keys(map, &["name", "value"], loc)?;
        string(required(map, "name", loc)?, &child(loc, "name"))?;
        string(required(map, "value", loc)?, &child(loc, "value"))?;
        Ok(())
    })
}

// =============================================================================
// COMPONENTS
// =============================================================================

fn check_component(value: &Value, location: &str) -> SchemaResult {
    let map = object(value, location)?;
    let mut allowed = vec!["name", "attributes"];
    allowed.extend_from_slice(COMPONENT_TYPES);
    known_keys(map, &allowed, location)?;
    name(required(map, "name", location)?, &child(location, "name"))?;

    let kind = exactly_one(map, COMPONENT_TYPES, location)?;
    let body = required(map, kind, location)?;
    let body_location = child(location, kind);
    match kind {
        "container" => check_container(body, &body_location),
        "kubernetes" | "openshift" => check_kubernetes_like(body, &body_location),
        "volume" => check_volume(body, &body_location),
        _ => check_plugin(body, &body_location),
    }
}

fn check_container(value: &Value, location: &str) -> SchemaResult {
    let map = object(value, location)?;
    known_keys(
        map,
        &[
            "image",
            "env",
            "volumeMounts",
            "endpoints",
            "memoryLimit",
            "mountSources",
            "sourceMapping",
            "dedicatedPod",
            "command",
            "args",
        ],
        location,
    )?;
    string(required(map, "image", location)?, &child(location, "image"))?;
    optional_with(map, "env", location, check_env)?;
    optional_with(map, "volumeMounts", location, |v, loc| {
        each(v, loc, |item, item_loc| {
            let mount = object(item, item_loc)?;
            known_keys(mount, &["name", "path"], item_loc)?;
            name(required(mount, "name", item_loc)?, &child(item_loc, "name"))?;
            optional_with(mount, "path", item_loc, |p, l| string(p, l).map(|_| ()))
        })
    })?;
    optional_with(map, "endpoints", location, check_endpoints)?;
    optional_with(map, "memoryLimit", location, |v, loc| string(v, loc).map(|_| ()))?;
    optional_with(map, "sourceMapping", location, |v, loc| string(v, loc).map(|_| ()))?;
    optional_with(map, "mountSources", location, boolean)?;
    optional_with(map, "dedicatedPod", location, boolean)?;
    optional_with(map, "command", location, string_array)?;
    optional_with(map, "args", location, string_array)
}

fn check_endpoints(value: &Value, location: &str) -> SchemaResult {
    each(value, location, |item, loc| {
        let map = object(item, loc)?;
        known_keys(
            map,
            &[
                "name",
                "targetPort",
                "exposure",
                "protocol",
                "secure",
                "path",
                "attributes",
            ],
            loc,
        )?;
        name(required(map, "name", loc)?, &child(loc, "name"))?;
        let port_location = child(loc, "targetPort");
        let port = integer(required(map, "targetPort", loc)?, &port_location)?;
        if !(1..=65535).contains(&port) {
            return Err(ValidationError::schema(
                port_location,
                format!("targetPort {} is out of range 1-65535", port),
            ));
        }
        optional_with(map, "exposure", loc, |v, l| one_of(string(v, l)?, EXPOSURES, l))?;
        optional_with(map, "protocol", loc, |v, l| one_of(string(v, l)?, PROTOCOLS, l))?;
        optional_with(map, "secure", loc, boolean)?;
        optional_with(map, "path", loc, |v, l| string(v, l).map(|_| ()))
    })
}

fn check_kubernetes_like(value: &Value, location: &str) -> SchemaResult {
    let map = object(value, location)?;
    known_keys(map, &["uri", "inlined", "endpoints"], location)?;
    let source = exactly_one(map, &["uri", "inlined"], location)?;
    string(required(map, source, location)?, &child(location, source))?;
    optional_with(map, "endpoints", location, check_endpoints)
}

fn check_volume(value: &Value, location: &str) -> SchemaResult {
    // `volume: {}` is a valid declaration.
    let map = object(value, location)?;
    known_keys(map, &["size"], location)?;
    optional_with(map, "size", location, |v, loc| string(v, loc).map(|_| ()))
}

fn check_plugin(value: &Value, location: &str) -> SchemaResult {
    let map = object(value, location)?;
    known_keys(
        map,
        &["id", "uri", "kubernetes", "registryUrl", "components", "commands"],
        location,
    )?;
    exactly_one(map, &["id", "uri", "kubernetes"], location)?;
    Ok(())
}

// =============================================================================
// COMMANDS
// =============================================================================

fn check_command(value: &Value, location: &str) -> SchemaResult {
    let map = object(value, location)?;
    let mut allowed = vec!["id", "attributes"];
    allowed.extend_from_slice(COMMAND_TYPES);
    known_keys(map, &allowed, location)?;
    name(required(map, "id", location)?, &child(location, "id"))?;

    let kind = exactly_one(map, COMMAND_TYPES, location)?;
    let body = required(map, kind, location)?;
    let body_location = child(location, kind);
    match kind {
        "exec" => check_exec(body, &body_location),
        "apply" => check_apply(body, &body_location),
        "composite" => check_composite(body, &body_location),
        _ => check_vscode(body, &body_location),
    }
}

fn check_exec(value: &Value, location: &str) -> SchemaResult {
    let map = object(value, location)?;
    known_keys(
        map,
        &[
            "commandLine",
            "component",
            "workingDir",
            "env",
            "label",
            "group",
            "hotReloadCapable",
        ],
        location,
    )?;
    string(required(map, "commandLine", location)?, &child(location, "commandLine"))?;
    string(required(map, "component", location)?, &child(location, "component"))?;
    optional_with(map, "workingDir", location, |v, loc| string(v, loc).map(|_| ()))?;
    optional_with(map, "label", location, |v, loc| string(v, loc).map(|_| ()))?;
    optional_with(map, "env", location, check_env)?;
    optional_with(map, "hotReloadCapable", location, boolean)?;
    optional_with(map, "group", location, check_group)
}

fn check_apply(value: &Value, location: &str) -> SchemaResult {
    let map = object(value, location)?;
    known_keys(map, &["component", "label", "group"], location)?;
    string(required(map, "component", location)?, &child(location, "component"))?;
    optional_with(map, "label", location, |v, loc| string(v, loc).map(|_| ()))?;
    optional_with(map, "group", location, check_group)
}

fn check_composite(value: &Value, location: &str) -> SchemaResult {
    let map = object(value, location)?;
    known_keys(map, &["commands", "parallel", "label", "group"], location)?;
    optional_with(map, "commands", location, string_array)?;
    optional_with(map, "parallel", location, boolean)?;
    optional_with(map, "label", location, |v, loc| string(v, loc).map(|_| ()))?;
    optional_with(map, "group", location, check_group)
}

fn check_vscode(value: &Value, location: &str) -> SchemaResult {
    let map = object(value, location)?;
    known_keys(map, &["uri", "inlined", "group"], location)?;
    let source = exactly_one(map, &["uri", "inlined"], location)?;
    string(required(map, source, location)?, &child(location, source))?;
    optional_with(map, "group", location, check_group)
}

// =============================================================================
// PROJECTS AND EVENTS
// =============================================================================

fn check_project(value: &Value, location: &str, starter: bool) -> SchemaResult {
    let map = object(value, location)?;
    let mut allowed = vec!["name", "attributes"];
    if starter {
        allowed.extend_from_slice(&["description", "subDir"]);
    } else {
        allowed.extend_from_slice(&["clonePath", "sparseCheckoutDirs"]);
    }
    allowed.extend_from_slice(PROJECT_SOURCES);
    known_keys(map, &allowed, location)?;
    name(required(map, "name", location)?, &child(location, "name"))?;
    for key in ["description", "subDir", "clonePath"] {
        optional_with(map, key, location, |v, loc| string(v, loc).map(|_| ()))?;
    }
    optional_with(map, "sparseCheckoutDirs", location, string_array)?;

    let source = exactly_one(map, PROJECT_SOURCES, location)?;
    let body = required(map, source, location)?;
    let body_location = child(location, source);
    let body_map = object(body, &body_location)?;
    if source == "zip" {
        known_keys(body_map, &["location"], &body_location)?;
        return optional_with(body_map, "location", &body_location, |v, loc| {
            string(v, loc).map(|_| ())
        });
    }

    known_keys(body_map, &["remotes", "checkoutFrom"], &body_location)?;
    let remotes_location = child(&body_location, "remotes");
    let remotes = object(required(body_map, "remotes", &body_location)?, &remotes_location)?;
    if remotes.is_empty() {
        return Err(ValidationError::schema(
            remotes_location,
            "at least one remote is required",
        ));
    }
    for (remote, url) in remotes {
        let remote = string(remote, &remotes_location)?;
        string(url, &child(&remotes_location, remote))?;
    }
    optional_with(body_map, "checkoutFrom", &body_location, |v, loc| {
        let checkout = object(v, loc)?;
        known_keys(checkout, &["remote", "revision"], loc)?;
        optional_with(checkout, "remote", loc, |r, l| string(r, l).map(|_| ()))?;
        optional_with(checkout, "revision", loc, |r, l| string(r, l).map(|_| ()))
    })
}

fn check_events(value: &Value, location: &str) -> SchemaResult {
    let map = object(value, location)?;
    known_keys(map, EVENT_PHASES, location)?;
    for phase in EVENT_PHASES {
        optional_with(map, phase, location, string_array)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(yaml: &str) -> SchemaResult {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        check_v200(value.as_mapping().unwrap())
    }

    fn detail(yaml: &str) -> String {
        check(yaml).unwrap_err().to_string()
    }

    #[test]
    fn accepts_a_typical_document() {
        let yaml = r#"
schemaVersion: "2.0.0"
metadata:
  name: nodejs
projects:
  - name: nodejs-starter
    git:
      remotes:
        origin: "https://github.com/odo-devfiles/nodejs-ex.git"
components:
  - name: runtime
    container:
      image: registry.access.redhat.com/ubi8/nodejs-12:1-36
      memoryLimit: 1024Mi
      endpoints:
        - name: http-3000
          targetPort: 3000
      volumeMounts:
        - name: cache
  - name: cache
    volume: {}
commands:
  - id: install
    exec:
      component: runtime
      commandLine: npm install
      group:
        kind: build
        isDefault: true
events:
  postStart: [install]
"#;
        assert!(check(yaml).is_ok());
    }

    #[test]
    fn missing_component_name() {
        let msg = detail("schemaVersion: \"2.0.0\"\ncomponents:\n  - container:\n      image: x\n");
        assert_eq!(
            msg,
            "schema error: missing required field: name at components[0]"
        );
    }

    #[test]
    fn component_needs_exactly_one_type() {
        let none = detail("schemaVersion: \"2.0.0\"\ncomponents:\n  - name: a\n");
        assert!(none.contains("must set exactly one of"), "{none}");
        assert!(none.contains("found none"));

        let two = detail(
            "schemaVersion: \"2.0.0\"\ncomponents:\n  - name: a\n    volume: {}\n    container:\n      image: x\n",
        );
        assert!(two.contains("found container, volume"), "{two}");
    }

    #[test]
    fn unknown_top_level_key() {
        let msg = detail("schemaVersion: \"2.0.0\"\nwidgets: []\n");
        assert!(msg.contains("additional property widgets is not allowed"));
    }

    #[test]
    fn names_must_be_dns_labels() {
        let msg = detail("schemaVersion: \"2.0.0\"\ncomponents:\n  - name: Bad_Name\n    volume: {}\n");
        assert!(msg.contains("does not match pattern"), "{msg}");
        assert!(msg.ends_with("at components[0].name"));
    }

    #[test]
    fn endpoint_port_must_be_an_integer() {
        let msg = detail(
            "schemaVersion: \"2.0.0\"\ncomponents:\n  - name: a\n    container:\n      image: x\n      endpoints:\n        - name: web\n          targetPort: http\n",
        );
        assert!(msg.contains("invalid type: expected integer, found string"), "{msg}");
    }

    #[test]
    fn exec_requires_command_line() {
        let msg = detail("schemaVersion: \"2.0.0\"\ncommands:\n  - id: run\n    exec:\n      component: a\n");
        assert_eq!(
            msg,
            "schema error: missing required field: commandLine at commands[0].exec"
        );
    }

    #[test]
    fn group_kind_is_an_enum() {
        let msg = detail(
            "schemaVersion: \"2.0.0\"\ncommands:\n  - id: run\n    exec:\n      component: a\n      commandLine: x\n      group:\n        kind: deploy\n",
        );
        assert!(msg.contains("must be one of [build, run, test, debug]"), "{msg}");
    }

    #[test]
    fn events_must_be_string_lists() {
        let msg = detail("schemaVersion: \"2.0.0\"\nevents:\n  preStart: build\n");
        assert!(msg.contains("expected array, found string"), "{msg}");
        let msg = detail("schemaVersion: \"2.0.0\"\nevents:\n  onSave: [a]\n");
        assert!(msg.contains("additional property onSave"));
    }

    #[test]
    fn git_project_needs_remotes() {
        let msg = detail("schemaVersion: \"2.0.0\"\nprojects:\n  - name: p\n    git: {}\n");
        assert!(msg.contains("missing required field: remotes"), "{msg}");
    }
}
