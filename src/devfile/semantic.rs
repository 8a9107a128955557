//! Cross-reference rules that need the whole typed document.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::devfile::model::{ComponentType, DevfileV200, GroupKind};
use crate::validator::ValidationError;

type SemanticResult = Result<(), ValidationError>;

/// Runs every semantic rule, returning the first violation.
pub fn check(devfile: &DevfileV200) -> SemanticResult {
    unique(devfile.components.iter().map(|c| c.name.as_str()), "component name")?;
    unique(devfile.commands.iter().map(|c| c.id.as_str()), "command id")?;
    unique(devfile.projects.iter().map(|p| p.name.as_str()), "project name")?;
    unique(
        devfile.starter_projects.iter().map(|p| p.name.as_str()),
        "starter project name",
    )?;
    unique(
        devfile
            .components
            .iter()
            .flat_map(|c| c.endpoints())
            .map(|e| e.name.as_str()),
        "endpoint name",
    )?;
    check_volume_mounts(devfile)?;
    check_command_targets(devfile)?;
    check_composites(devfile)?;
    check_events(devfile)?;
    check_default_groups(devfile)
}

fn unique<'a>(names: impl Iterator<Item = &'a str>, what: &str) -> SemanticResult {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ValidationError::semantic(format!(
                "duplicate {} {:?}",
                what, name
            )));
        }
    }
    Ok(())
}

fn check_volume_mounts(devfile: &DevfileV200) -> SemanticResult {
    for component in &devfile.components {
        let Some(container) = &component.container else {
            continue;
        };
        for mount in &container.volume_mounts {
            match devfile.component(&mount.name).and_then(|c| c.component_type()) {
                Some(ComponentType::Volume) => {}
                Some(other) => {
                    return Err(ValidationError::semantic(format!(
                        "container {:?} mounts {:?}, which is a {} component, not a volume",
                        component.name, mount.name, other
                    )))
                }
                None => {
                    return Err(ValidationError::semantic(format!(
                        "container {:?} mounts unknown volume {:?}",
                        component.name, mount.name
                    )))
                }
            }
        }
    }
    Ok(())
}

fn check_command_targets(devfile: &DevfileV200) -> SemanticResult {
    for command in &devfile.commands {
        let Some(target) = command.target_component() else {
            continue;
        };
        if devfile.component(target).is_none() {
            return Err(ValidationError::semantic(format!(
                "command {:?} references unknown component {:?}",
                command.id, target
            )));
        }
    }
    Ok(())
}

fn check_composites(devfile: &DevfileV200) -> SemanticResult {
    let mut graph: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for command in &devfile.commands {
        let Some(composite) = &command.composite else {
            continue;
        };
        for member in &composite.commands {
            if member == &command.id {
                return Err(ValidationError::semantic(format!(
                    "composite command {:?} references itself",
                    command.id
                )));
            }
            if devfile.command(member).is_none() {
                return Err(ValidationError::semantic(format!(
                    "composite command {:?} references unknown command {:?}",
                    command.id, member
                )));
            }
        }
        graph.insert(
            command.id.as_str(),
            composite.commands.iter().map(String::as_str).collect(),
        );
    }

    let mut finished = HashSet::new();
    for &start in graph.keys() {
        let mut path = Vec::new();
        if let Some(cycle) = find_cycle(start, &graph, &mut path, &mut finished) {
            return Err(ValidationError::semantic(format!(
                "composite command cycle: {}",
                cycle.join(" -> ")
            )));
        }
    }
    Ok(())
}

/// Depth-first search over composite members; returns the looping path.
fn find_cycle<'a>(
    node: &'a str,
    graph: &BTreeMap<&'a str, Vec<&'a str>>,
    path: &mut Vec<&'a str>,
    finished: &mut HashSet<&'a str>,
) -> Option<Vec<&'a str>> {
    if finished.contains(node) {
        return None;
    }
    if let Some(pos) = path.iter().position(|n| *n == node) {
        let mut cycle = path[pos..].to_vec();
        cycle.push(node);
        return Some(cycle);
    }
    path.push(node);
    for &next in graph.get(node).into_iter().flatten() {
        if let Some(cycle) = find_cycle(next, graph, path, finished) {
            return Some(cycle);
        }
    }
    path.pop();
    finished.insert(node);
    None
}

fn check_events(devfile: &DevfileV200) -> SemanticResult {
    let Some(events) = &devfile.events else {
        return Ok(());
    };
    for (phase, id) in events.bindings() {
        if devfile.command(id).is_none() {
            return Err(ValidationError::semantic(format!(
                "{} event references unknown command {:?}",
                phase, id
            )));
        }
    }
    Ok(())
}

fn check_default_groups(devfile: &DevfileV200) -> SemanticResult {
    let mut defaults: HashMap<GroupKind, Vec<&str>> = HashMap::new();
    for command in &devfile.commands {
        if let Some(group) = command.group().filter(|g| g.is_default) {
            defaults.entry(group.kind).or_default().push(&command.id);
        }
    }
    let mut conflicts: Vec<_> = defaults.into_iter().filter(|(_, ids)| ids.len() > 1).collect();
    conflicts.sort_by_key(|(kind, _)| *kind);
    match conflicts.first() {
        Some((kind, ids)) => Err(ValidationError::semantic(format!(
            "command group {} has more than one default: {}",
            kind,
            ids.join(", ")
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_yaml(yaml: &str) -> SemanticResult {
        let devfile: DevfileV200 = serde_yaml::from_str(yaml).unwrap();
        check(&devfile)
    }

    fn message(yaml: &str) -> String {
        check_yaml(yaml).unwrap_err().to_string()
    }

    const TOOLS: &str = r#"
schemaVersion: "2.0.0"
components:
  - name: tools
    container:
      image: quay.io/devfile/tools
"#;

    #[test]
    fn duplicate_component_names() {
        let yaml = format!("{TOOLS}  - name: tools\n    volume: {{}}\n");
        assert_eq!(
            message(&yaml),
            "validation error: duplicate component name \"tools\""
        );
    }

    #[test]
    fn exec_must_target_existing_component() {
        let yaml = format!(
            "{TOOLS}commands:\n  - id: build\n    exec:\n      component: runtime\n      commandLine: make\n"
        );
        assert!(message(&yaml).contains("references unknown component \"runtime\""));
    }

    #[test]
    fn volume_mounts_must_point_at_volumes() {
        let yaml = r#"
schemaVersion: "2.0.0"
components:
  - name: tools
    container:
      image: x
      volumeMounts:
        - name: other
  - name: other
    container:
      image: y
"#;
        assert!(message(yaml).contains("which is a container component, not a volume"));
    }

    #[test]
    fn composite_self_reference_and_cycles() {
        let own = format!(
            "{TOOLS}commands:\n  - id: all\n    composite:\n      commands: [all]\n"
        );
        assert!(message(&own).contains("references itself"));

        let cycle = format!(
            "{TOOLS}commands:\n  - id: a\n    composite:\n      commands: [b]\n  - id: b\n    composite:\n      commands: [a]\n"
        );
        assert_eq!(
            message(&cycle),
            "validation error: composite command cycle: a -> b -> a"
        );
    }

    #[test]
    fn events_must_reference_commands() {
        let yaml = format!("{TOOLS}events:\n  preStart: [init]\n");
        assert_eq!(
            message(&yaml),
            "validation error: preStart event references unknown command \"init\""
        );
    }

    #[test]
    fn single_default_per_group() {
        let yaml = format!(
            "{TOOLS}commands:
  - id: one
    exec:
      component: tools
      commandLine: a
      group: {{ kind: build, isDefault: true }}
  - id: two
    exec:
      component: tools
      commandLine: b
      group: {{ kind: build, isDefault: true }}
  - id: three
    exec:
      component: tools
      commandLine: c
      group: {{ kind: run, isDefault: true }}
"
        );
        assert_eq!(
            message(&yaml),
            "validation error: command group build has more than one default: one, two"
        );
    }

    #[test]
    fn consistent_document_passes() {
        let yaml = format!(
            "{TOOLS}commands:\n  - id: build\n    exec:\n      component: tools\n      commandLine: make\nevents:\n  postStart: [build]\n"
        );
        assert!(check_yaml(&yaml).is_ok());
    }
}
