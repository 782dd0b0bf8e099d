//! Headless lattice demo: builds a few structures, runs the simulation and
//! exports the result.
//!
//! Usage:
//! ```text
//! cargo run --example lattice                       # default settings
//! cargo run --example lattice -- config.json        # settings from a file
//! RUST_LOG=solidforge=debug cargo run --example lattice
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use solidforge::color::Color;
use solidforge::engine::{DebugDraw, SharedWorld, SimpleWorld};
use solidforge::export::LayeredTriangles;
use solidforge::factory::{FactoryConfig, LatticeDims, NeighborLinks};
use solidforge::link_mesh::{LinkMesh, LinkParams};
use solidforge::math::{Isometry3, Point3, Vector3};
use solidforge::scene::Scene;
use solidforge::visual::Canvas;

const TICKS: usize = 120;

/// Canvas that only counts what it is asked to draw.
#[derive(Debug, Default)]
struct CountingCanvas {
    primitives: usize,
    triangles: usize,
}

impl Canvas for CountingCanvas {
    fn sphere(&mut self, _pose: &Isometry3, _radius: f64, _color: Color) {
        self.primitives += 1;
    }

    fn cuboid(&mut self, _pose: &Isometry3, _half_extents: &Vector3, _color: Color) {
        self.primitives += 1;
    }

    fn plane(&mut self, _pose: &Isometry3, _dimensions: &Vector3, _color: Color) {
        self.primitives += 1;
    }

    fn triangles(&mut self, triangles: &[[Point3; 3]], _normals: &[Vector3], _color: Color) {
        self.triangles += triangles.len();
    }
}

#[derive(Debug, Default)]
struct LineCounter(usize);

impl DebugDraw for LineCounter {
    fn line(&mut self, _from: &Point3, _to: &Point3, _color: Color) {
        self.0 += 1;
    }
}

fn main() -> solidforge::Result<()> {
    // Default: WARN for everything, INFO for solidforge.
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into())
        .add_directive("lattice=info".parse().unwrap_or_default())
        .add_directive("solidforge=info".parse().unwrap_or_default());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = match std::env::args().nth(1) {
        Some(path) => FactoryConfig::load(path)?,
        None => FactoryConfig::default(),
    };

    let world: SharedWorld = Rc::new(RefCell::new(SimpleWorld::default()));
    let mut scene = Scene::new(world, config);

    let factory = scene.factory_mut();
    let ground = factory.create_plane(Vector3::new(200.0, 0.0, 200.0), Point3::origin())?;
    let container = factory.create_sphere_container()?;
    let contents = factory.create_sphere_matrix(
        Point3::new(-2.0, 8.0, -2.0),
        1.0,
        LatticeDims::new(2, 2, 2),
        NeighborLinks::None,
    )?;
    let lattice = factory.create_rigid_sphere_matrix(
        Point3::new(-10.0, 20.0, -10.0),
        1.0,
        LatticeDims::new(3, 3, 3),
        NeighborLinks::Linked,
    )?;
    let pair = factory.create_linked_spheres(Point3::new(15.0, 15.0, 0.0), 2.0)?;
    let bag = factory.create_bag(Point3::new(-20.0, 30.0, 10.0), 5.0, true)?;
    let cylinder = factory.create_soft_cylinder(
        Point3::new(20.0, 10.0, 20.0),
        Point3::new(20.0, 18.0, 20.0),
        2.0,
        24,
    )?;
    let mesh = LinkMesh::create(factory, &LinkParams::default())?;

    scene.add_solid(ground);
    scene.add_solid(container);
    scene.add_solids(contents);
    scene.add_solids(lattice);
    scene.add_solids(pair);
    scene.add_solid(bag);
    scene.add_solid(cylinder);
    scene.add_link_mesh(mesh);

    let mut steps = 0;
    for tick in 0..TICKS {
        if tick == TICKS / 2 {
            scene.factory_mut().set_gravity(-3.0)?;
        }
        steps += scene.update()?;
    }

    let mut canvas = CountingCanvas::default();
    let mut lines = LineCounter::default();
    scene.factory_mut().config_mut().debug_draw = true;
    scene.draw(&mut canvas, &mut lines);

    let mut export = LayeredTriangles::new();
    scene.export(&mut export);

    tracing::info!(
        ticks = TICKS,
        steps,
        solids = scene.registry().len(),
        primitives = canvas.primitives,
        drawn_triangles = canvas.triangles,
        debug_lines = lines.0,
        layers = export.layers.len(),
        exported_triangles = export.triangle_count(),
        hinges = export.hinges.len(),
        "lattice demo finished"
    );
    Ok(())
}
