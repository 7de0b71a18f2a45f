use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use glam::{Mat4, Quat, Vec3};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

use crate::geometry::Ray;
use crate::highlight::Material;
use crate::obj::MeshGeometry;

new_key_type! {
    /// Stable handle to a node in a [`Scene`]; stale handles simply fail to resolve.
    pub struct NodeId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Group,
    Mesh,
    Camera,
}

impl NodeKind {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "group" => Ok(Self::Group),
            "mesh" => Ok(Self::Mesh),
            "camera" => Ok(Self::Camera),
            other => Err(anyhow!("unsupported object type: {other}")),
        }
    }
}

/// Named, transformable object in the scene graph.
///
/// Transform fields are local to the parent. Only mesh leaves carry geometry
/// and a material.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub kind: NodeKind,
    pub position: Vec3,
    /// Euler angles in degrees, applied Z * Y * X.
    pub rotation: Vec3,
    pub scale: Vec3,
    pub fov: f32,
    /// Axis/grid/gizmo style helpers never take part in picking or highlighting.
    pub helper: bool,
    pub geometry: Option<Arc<MeshGeometry>>,
    pub material: Option<Arc<Material>>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            fov: 45.0,
            helper: false,
            geometry: None,
            material: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    pub fn mesh(name: impl Into<String>, geometry: Arc<MeshGeometry>, material: Arc<Material>) -> Self {
        Self {
            geometry: Some(geometry),
            material: Some(material),
            ..Self::new(name, NodeKind::Mesh)
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn as_helper(mut self) -> Self {
        self.helper = true;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn local_matrix(&self) -> Mat4 {
        let rotation = Quat::from_rotation_z(self.rotation.z.to_radians())
            * Quat::from_rotation_y(self.rotation.y.to_radians())
            * Quat::from_rotation_x(self.rotation.x.to_radians());
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub node: NodeId,
    pub distance: f32,
    pub point: Vec3,
}

/// Arena backed scene graph with a single implicit root.
#[derive(Debug, Clone)]
pub struct Scene {
    nodes: SlotMap<NodeId, SceneNode>,
    root: NodeId,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SceneNode::group("Scene"));
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    /// Inserts `node` under `parent`, falling back to the root for unknown parents.
    pub fn add_node(&mut self, parent: NodeId, mut node: SceneNode) -> NodeId {
        let parent = if self.nodes.contains_key(parent) {
            parent
        } else {
            self.root
        };
        node.parent = Some(parent);
        node.children.clear();
        let id = self.nodes.insert(node);
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.push(id);
        }
        id
    }

    /// Removes a node and its whole subtree. The root cannot be removed.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.nodes.contains_key(id) {
            return false;
        }
        let mut doomed = vec![id];
        doomed.extend(self.descendants(id));
        if let Some(parent) = self.nodes.get(id).and_then(|n| n.parent) {
            if let Some(parent) = self.nodes.get_mut(parent) {
                parent.children.retain(|child| *child != id);
            }
        }
        for node in doomed {
            self.nodes.remove(node);
        }
        true
    }

    pub fn set_position(&mut self, id: NodeId, position: Vec3) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.position = position;
                true
            }
            None => false,
        }
    }

    /// Children of the root: the units of selection and highlighting.
    pub fn top_level_children(&self) -> &[NodeId] {
        self.nodes
            .get(self.root)
            .map(|root| root.children.as_slice())
            .unwrap_or(&[])
    }

    /// Visits every node below the root in deterministic pre-order.
    pub fn traverse<F>(&self, mut visitor: F)
    where
        F: FnMut(NodeId, &SceneNode),
    {
        for id in self.descendants(self.root) {
            if let Some(node) = self.nodes.get(id) {
                visitor(id, node);
            }
        }
    }

    /// Pre-order list of every node below `start`, excluding `start` itself.
    pub fn descendants(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.nodes.get(start) {
            Some(node) => node.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(id) {
                out.push(id);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    pub fn subtree(&self, start: NodeId) -> Vec<NodeId> {
        if !self.nodes.contains_key(start) {
            return Vec::new();
        }
        let mut out = vec![start];
        out.extend(self.descendants(start));
        out
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|id| self.nodes.get(*id).is_some_and(|node| node.name == name))
    }

    pub fn find_by_kind(&self, kind: NodeKind) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|id| self.nodes.get(*id).is_some_and(|node| node.kind == kind))
    }

    /// True when the node or any ancestor is flagged as a helper.
    pub fn is_helper(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.nodes.get(node_id) else {
                return false;
            };
            if node.helper {
                return true;
            }
            current = node.parent;
        }
        false
    }

    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.nodes.get(node_id) else {
                break;
            };
            matrix = node.local_matrix() * matrix;
            current = node.parent;
        }
        matrix
    }

    pub fn world_position(&self, id: NodeId) -> Vec3 {
        self.world_matrix(id).transform_point3(Vec3::ZERO)
    }

    /// Nearest hit over every mesh leaf accepted by `filter`.
    pub fn intersect_ray<F>(&self, ray: &Ray, filter: F) -> Option<RayHit>
    where
        F: Fn(NodeId) -> bool,
    {
        let mut best: Option<RayHit> = None;
        for id in self.descendants(self.root) {
            let Some(geometry) = self.nodes.get(id).and_then(|n| n.geometry.as_ref()) else {
                continue;
            };
            if !filter(id) {
                continue;
            }
            let world = self.world_matrix(id);
            if world.determinant().abs() <= f32::EPSILON {
                continue;
            }
            let local_ray = ray.transformed(&world.inverse());
            if let Some(t) = geometry.intersect_ray(&local_ray) {
                if best.map_or(true, |hit| t < hit.distance) {
                    best = Some(RayHit {
                        node: id,
                        distance: t,
                        point: ray.at(t),
                    });
                }
            }
        }
        best
    }

    /// Parses a scene using only built-in primitives for `<mesh>` references.
    pub fn from_xml(xml: &str) -> Result<Self> {
        Self::from_xml_with(xml, |name| match name {
            "cube" => Ok(MeshGeometry::cube()),
            other => Err(anyhow!("no mesh resolver for {other}")),
        })
    }

    /// Parses the hierarchical scene XML, resolving `<mesh>` references via `resolve_mesh`.
    pub fn from_xml_with<R>(xml: &str, mut resolve_mesh: R) -> Result<Self>
    where
        R: FnMut(&str) -> Result<MeshGeometry>,
    {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let root_element = document.root_element();
        if !root_element.has_tag_name("scene") {
            bail!("expected <scene> root element");
        }

        let mut scene = Self::new();
        let mut meshes: HashMap<String, Arc<MeshGeometry>> = HashMap::new();
        let mut resolve = |name: &str| -> Result<Arc<MeshGeometry>> {
            if let Some(mesh) = meshes.get(name) {
                return Ok(Arc::clone(mesh));
            }
            let mesh = Arc::new(
                resolve_mesh(name).with_context(|| format!("failed to load mesh {name}"))?,
            );
            meshes.insert(name.to_string(), Arc::clone(&mesh));
            Ok(mesh)
        };

        let mut pending: Vec<(Node<'_, '_>, NodeId)> = object_children(&root_element)
            .map(|element| (element, scene.root))
            .collect();
        pending.reverse();
        while let Some((element, parent)) = pending.pop() {
            let node = parse_object(&element, &mut resolve)?;
            let id = scene.add_node(parent, node);
            let mut children: Vec<_> = object_children(&element).map(|c| (c, id)).collect();
            children.reverse();
            pending.extend(children);
        }

        Ok(scene)
    }
}

fn object_children<'a, 'input>(
    node: &Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|child| child.has_tag_name("object"))
}

fn parse_object<R>(node: &Node<'_, '_>, resolve: &mut R) -> Result<SceneNode>
where
    R: FnMut(&str) -> Result<Arc<MeshGeometry>>,
{
    let name = required_text(node, "name")?;
    let mesh_ref = optional_text(node, "mesh");
    let kind = match optional_text(node, "type") {
        Some(kind) => NodeKind::parse(&kind).with_context(|| format!("object {name}"))?,
        None if mesh_ref.is_some() => NodeKind::Mesh,
        None => NodeKind::Group,
    };

    let mut object = SceneNode::new(name.clone(), kind);
    object.position = parse_vec3(optional_text(node, "position"), object.position)?;
    object.rotation = parse_vec3(optional_text(node, "rotation"), object.rotation)?;
    object.scale = parse_vec3(optional_text(node, "scale"), object.scale)?;
    object.fov = parse_f32(optional_text(node, "fov"), object.fov)?;
    object.helper = matches!(optional_text(node, "helper").as_deref(), Some("true" | "1"));

    if kind == NodeKind::Mesh {
        let mesh_name = mesh_ref.unwrap_or_else(|| "cube".to_string());
        object.geometry = Some(resolve(&mesh_name).with_context(|| format!("object {name}"))?);
        let color = parse_color(optional_text(node, "color"), Vec3::ONE)?;
        object.material = Some(Arc::new(Material::Standard { color }));
    }
    Ok(object)
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_components(value: &str, what: &str) -> Result<Vec3> {
    let numbers = value
        .split_whitespace()
        .map(|component| component.parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| anyhow!("{what} has a non-numeric component: {err}"))?;
    match numbers.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(anyhow!("{what} must have exactly 3 components")),
    }
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    match value {
        Some(value) => parse_components(&value, "vector"),
        None => Ok(default),
    }
}

fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3> {
    match value {
        Some(value) => Ok(parse_components(&value, "color")? / 255.0),
        None => Ok(default),
    }
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float: {err}")),
        None => Ok(default),
    }
}
