//! Typed representation of a devfile 2.0.0 document.
//!
//! Union types (component and command kinds, project sources) are modelled as
//! sibling `Option` fields; the schema pass has already guaranteed that exactly
//! one of them is set by the time a document is deserialized into these types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Reads an explicit null as the empty value, matching the schema pass, which
/// treats `key: ~` like an absent key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevfileV200 {
    pub schema_version: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub parent: Option<serde_yaml::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub projects: Vec<Project>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub starter_projects: Vec<Project>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub components: Vec<Component>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub commands: Vec<Command>,
    #[serde(default)]
    pub events: Option<Events>,
}

impl DevfileV200 {
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn command(&self, id: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub name: Option<String>,
    pub version: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
}

// =============================================================================
// COMPONENTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    Container,
    Kubernetes,
    Openshift,
    Volume,
    Plugin,
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentType::Container => "container",
            ComponentType::Kubernetes => "kubernetes",
            ComponentType::Openshift => "openshift",
            ComponentType::Volume => "volume",
            ComponentType::Plugin => "plugin",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    pub container: Option<Container>,
    pub kubernetes: Option<KubernetesLike>,
    pub openshift: Option<KubernetesLike>,
    pub volume: Option<Volume>,
    pub plugin: Option<serde_yaml::Value>,
}

impl Component {
    pub fn component_type(&self) -> Option<ComponentType> {
        if self.container.is_some() {
            Some(ComponentType::Container)
        } else if self.kubernetes.is_some() {
            Some(ComponentType::Kubernetes)
        } else if self.openshift.is_some() {
            Some(ComponentType::Openshift)
        } else if self.volume.is_some() {
            Some(ComponentType::Volume)
        } else if self.plugin.is_some() {
            Some(ComponentType::Plugin)
        } else {
            None
        }
    }

    /// Endpoints declared by container, kubernetes or openshift components.
    pub fn endpoints(&self) -> &[Endpoint] {
        if let Some(container) = &self.container {
            &container.endpoints
        } else if let Some(k8s) = self.kubernetes.as_ref().or(self.openshift.as_ref()) {
            &k8s.endpoints
        } else {
            &[]
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub image: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub env: Vec<EnvVar>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub volume_mounts: Vec<VolumeMount>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub endpoints: Vec<Endpoint>,
    pub memory_limit: Option<String>,
    pub mount_sources: Option<bool>,
    pub source_mapping: Option<String>,
    pub dedicated_pod: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub command: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub name: String,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub name: String,
    pub target_port: u32,
    pub exposure: Option<String>,
    pub protocol: Option<String>,
    pub secure: Option<bool>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KubernetesLike {
    pub uri: Option<String>,
    pub inlined: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub size: Option<String>,
}

// =============================================================================
// COMMANDS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    Build,
    Run,
    Test,
    Debug,
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GroupKind::Build => "build",
            GroupKind::Run => "run",
            GroupKind::Test => "test",
            GroupKind::Debug => "debug",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandGroup {
    pub kind: GroupKind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub id: String,
    pub exec: Option<ExecCommand>,
    pub apply: Option<ApplyCommand>,
    pub composite: Option<CompositeCommand>,
    pub vscode_task: Option<VscodeCommand>,
    pub vscode_launch: Option<VscodeCommand>,
}

impl Command {
    pub fn group(&self) -> Option<&CommandGroup> {
        if let Some(exec) = &self.exec {
            exec.group.as_ref()
        } else if let Some(apply) = &self.apply {
            apply.group.as_ref()
        } else if let Some(composite) = &self.composite {
            composite.group.as_ref()
        } else {
            self.vscode_task
                .as_ref()
                .or(self.vscode_launch.as_ref())
                .and_then(|v| v.group.as_ref())
        }
    }

    /// The component an exec or apply command runs against.
    pub fn target_component(&self) -> Option<&str> {
        self.exec
            .as_ref()
            .map(|e| e.component.as_str())
            .or_else(|| self.apply.as_ref().map(|a| a.component.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecCommand {
    pub command_line: String,
    pub component: String,
    pub working_dir: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub env: Vec<EnvVar>,
    pub label: Option<String>,
    pub group: Option<CommandGroup>,
    pub hot_reload_capable: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyCommand {
    pub component: String,
    pub label: Option<String>,
    pub group: Option<CommandGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeCommand {
    #[serde(default, deserialize_with = "null_as_default")]
    pub commands: Vec<String>,
    pub parallel: Option<bool>,
    pub label: Option<String>,
    pub group: Option<CommandGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VscodeCommand {
    pub uri: Option<String>,
    pub inlined: Option<String>,
    pub group: Option<CommandGroup>,
}

// =============================================================================
// EVENTS AND PROJECTS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Events {
    #[serde(default, deserialize_with = "null_as_default")]
    pub pre_start: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub post_start: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pre_stop: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub post_stop: Vec<String>,
}

impl Events {
    /// Every (phase, command id) pair, in declaration order.
    pub fn bindings(&self) -> impl Iterator<Item = (&'static str, &str)> {
        let phases: [(&'static str, &Vec<String>); 4] = [
            ("preStart", &self.pre_start),
            ("postStart", &self.post_start),
            ("preStop", &self.pre_stop),
            ("postStop", &self.post_stop),
        ];
        phases
            .into_iter()
            .flat_map(|(phase, ids)| ids.iter().map(move |id| (phase, id.as_str())))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    pub clone_path: Option<String>,
    pub description: Option<String>,
    pub sub_dir: Option<String>,
    pub git: Option<GitSource>,
    pub github: Option<GitSource>,
    pub zip: Option<ZipSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitSource {
    pub remotes: BTreeMap<String, String>,
    pub checkout_from: Option<CheckoutFrom>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckoutFrom {
    pub remote: Option<String>,
    pub revision: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZipSource {
    pub location: Option<String>,
}
