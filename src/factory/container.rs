use tracing::{debug, warn};

use crate::engine::{CollisionShape, RigidBodyDesc};
use crate::error::Result;
use crate::mesh::{load_obj, DedupMode, Deduplicate, TriangleMesh};
use crate::solid::Solid;

use super::primitives::rotation_x;
use super::StructureFactory;

impl StructureFactory {
    /// Loads the configured container asset and makes it an immovable
    /// concave collider.
    ///
    /// # Errors
    ///
    /// Returns an error if the asset cannot be read or parsed, or the
    /// engine rejects the body.
    pub fn create_sphere_container(&mut self) -> Result<Solid> {
        let path = self.config.container.asset.clone();
        let mesh = load_obj(&path)?;
        debug!(path = %path.display(), triangles = mesh.num_triangles(), "container asset loaded");
        self.create_container_from_mesh(&mesh)
    }

    /// Makes `mesh` an immovable, invisible concave collider placed by the
    /// container settings.
    ///
    /// The deduplicated mesh is kept alive by the factory for as long as the
    /// world exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the body.
    pub fn create_container_from_mesh(&mut self, mesh: &TriangleMesh) -> Result<Solid> {
        let prepared = Deduplicate::new(DedupMode::Exact).execute(mesh);
        if !prepared.is_clean() {
            warn!(
                orphaned = prepared.orphaned_triangles.len(),
                "container mesh has unmatched triangle corners"
            );
        }
        let mesh = self.retain_mesh(prepared.mesh);

        let container = &self.config.container;
        let desc = RigidBodyDesc::new(
            CollisionShape::TriangleMesh {
                mesh,
                scale: container.scale_vector(),
                margin: container.margin,
            },
            container.position,
            0.0,
        )
        .with_rotation(rotation_x(container.rotation_x));

        let body = self.world.borrow_mut().add_rigid_body(desc)?;
        debug!(?body, retained = self.retained_meshes.len(), "sphere container created");
        Ok(Solid::rigid(std::rc::Rc::clone(&self.world), body, None))
    }
}
