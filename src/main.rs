use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use glam::Vec2;
use log::info;

use exploded_view::{
    load_obj_from_str, ExplodedViewer, ExplosionConfigStore, InputEvent, Material, MeshGeometry,
    Modifiers, NodeId, Scene, ScreenRect, ViewerEvent, ViewerOptions,
};

const USAGE: &str = "Usage: exploded-view <scene.xml> [--config <explosion.json>] \
[--options <viewer.json>] [--progress <p>] [--sequence] [--click <x>,<y>[,<modifiers>]]... \
[--viewport <w>x<h>] [--export <out.json>]";

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;

    let scene = load_scene(&options.scene)?;
    println!(
        "Loaded scene with {} node(s)",
        scene.descendants(scene.root()).len()
    );

    let mut viewer_options = match &options.options {
        Some(path) => ViewerOptions::load(path)?,
        None => ViewerOptions::default(),
    };
    if options.sequence {
        viewer_options.animation_config.use_sequence_anim = true;
    }

    let mut viewer = ExplodedViewer::new(viewer_options);
    viewer.set_scene(scene);
    match &options.config {
        Some(path) => {
            viewer.load_explosion_config(path);
        }
        None => viewer.set_explosion_config(ExplosionConfigStore::new()),
    }
    println!("Derived {} animatable item(s)", viewer.items().len());

    if let Some(progress) = options.progress {
        viewer.set_exp_factor(progress);
    }
    viewer.frame(Duration::ZERO);
    println!("Progress {:.2}", viewer.exp_factor());

    for click in &options.clicks {
        let event = InputEvent::Click {
            position: click.position,
            modifiers: click.modifiers,
        };
        viewer.handle_input(event, &options.viewport);
    }

    let events = viewer.drain_events();
    print_events(&viewer, &events);
    print_final_state(&viewer);

    if let Some(path) = &options.export {
        let json = viewer.export_config()?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        println!("Exported config to {}", path.display());
    }

    viewer.destroy();
    Ok(())
}

/// Parses the scene, resolving non-builtin meshes as OBJ files next to it.
fn load_scene(path: &Path) -> Result<Scene> {
    let xml = fs::read_to_string(path)
        .with_context(|| format!("failed to read scene {}", path.display()))?;
    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let scene = Scene::from_xml_with(&xml, |name| {
        if name == "cube" {
            return Ok(MeshGeometry::cube());
        }
        let mesh_path = base.join(name);
        let data = fs::read_to_string(&mesh_path)
            .with_context(|| format!("failed to read mesh {}", mesh_path.display()))?;
        load_obj_from_str(&data)
    })
    .with_context(|| format!("failed to parse scene {}", path.display()))?;
    info!("scene {} parsed", path.display());
    Ok(scene)
}

fn node_name(viewer: &ExplodedViewer, node: NodeId) -> String {
    viewer
        .data_model()
        .read(|scene| scene.node(node).map(|n| n.name.clone()))
        .flatten()
        .unwrap_or_else(|| "<unknown>".to_string())
}

fn print_events(viewer: &ExplodedViewer, events: &[ViewerEvent]) {
    for event in events {
        match *event {
            ViewerEvent::ItemsDerived(count) => println!("event: items derived ({count})"),
            ViewerEvent::SelectionChanged(Some(node)) => {
                println!("event: selected {}", node_name(viewer, node))
            }
            ViewerEvent::SelectionChanged(None) => println!("event: selection cleared"),
            ViewerEvent::HighlightReset => println!("event: highlight reset"),
            ViewerEvent::ObjectSelected {
                node,
                position,
                multi_select,
            } => println!(
                "event: edit {} at ({:.2}, {:.2}, {:.2}) multi={multi_select}",
                node_name(viewer, node),
                position.x,
                position.y,
                position.z
            ),
        }
    }
}

fn print_final_state(viewer: &ExplodedViewer) {
    println!("Final node states:");
    viewer.data_model().read(|scene| {
        scene.traverse(|_, node| {
            let material = match node.material.as_deref() {
                Some(Material::Standard { .. }) => " material=standard",
                Some(Material::Wireframe { .. }) => " material=wireframe",
                Some(Material::Ghost { .. }) => " material=ghost",
                None => "",
            };
            println!(
                " - {} pos=({:.2}, {:.2}, {:.2}){material}",
                node.name, node.position.x, node.position.y, node.position.z
            );
        });
    });
}

struct Click {
    position: Vec2,
    modifiers: Modifiers,
}

impl Click {
    fn parse(value: &str) -> Result<Self> {
        let mut parts = value.split(',');
        let mut coordinate = |axis: &str| -> Result<f32> {
            let text = parts
                .next()
                .ok_or_else(|| anyhow!("click {value:?} is missing its {axis} coordinate"))?;
            text.trim()
                .parse::<f32>()
                .with_context(|| format!("click {value:?} has an invalid {axis} coordinate"))
        };
        let x = coordinate("x")?;
        let y = coordinate("y")?;
        let modifiers = match parts.next() {
            Some(names) => Modifiers::from_names(names)
                .ok_or_else(|| anyhow!("click {value:?} has unknown modifiers {names:?}"))?,
            None => Modifiers::NONE,
        };
        Ok(Self {
            position: Vec2::new(x, y),
            modifiers,
        })
    }
}

struct CliOptions {
    scene: PathBuf,
    config: Option<PathBuf>,
    options: Option<PathBuf>,
    progress: Option<f32>,
    sequence: bool,
    clicks: Vec<Click>,
    viewport: ScreenRect,
    export: Option<PathBuf>,
}

impl CliOptions {
    fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut scene = None;
        let mut config = None;
        let mut options = None;
        let mut progress = None;
        let mut sequence = false;
        let mut clicks = Vec::new();
        let mut viewport = ScreenRect::new(1280.0, 720.0);
        let mut export = None;

        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| anyhow!("{flag} expects a value\n{USAGE}"))
            };
            match arg.as_str() {
                "--config" => config = Some(PathBuf::from(value("--config")?)),
                "--options" => options = Some(PathBuf::from(value("--options")?)),
                "--export" => export = Some(PathBuf::from(value("--export")?)),
                "--progress" => {
                    let text = value("--progress")?;
                    let parsed = text
                        .parse::<f32>()
                        .with_context(|| format!("invalid progress {text:?}"))?;
                    progress = Some(parsed);
                }
                "--sequence" => sequence = true,
                "--click" => clicks.push(Click::parse(&value("--click")?)?),
                "--viewport" => {
                    let text = value("--viewport")?;
                    viewport = ScreenRect::parse(&text)
                        .ok_or_else(|| anyhow!("invalid viewport {text:?}, expected WxH"))?;
                }
                other if other.starts_with("--") => {
                    bail!("Unknown argument: {other}\n{USAGE}");
                }
                path => {
                    if scene.is_some() {
                        bail!("unexpected extra argument {path:?}\n{USAGE}");
                    }
                    scene = Some(PathBuf::from(path));
                }
            }
        }

        let Some(scene) = scene else {
            bail!("{USAGE}");
        };
        Ok(Self {
            scene,
            config,
            options,
            progress,
            sequence,
            clicks,
            viewport,
            export,
        })
    }
}
