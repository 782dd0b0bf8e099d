//! Ownership of live solids, in creation order.

use slotmap::SlotMap;
use tracing::{debug, warn};

use crate::error::{OperationError, Result};
use crate::factory::InteractionSettings;
use crate::math::Ray;
use crate::solid::{SelectionChange, Solid};
use crate::visual::Canvas;

slotmap::new_key_type! {
    /// Identifier of a solid owned by a [`SolidRegistry`].
    pub struct SolidId;
}

/// UI panel for editing the force on a selected deformable solid.
pub trait ForcePanel {
    /// Shows the panel for `solid`.
    fn attach(&mut self, solid: SolidId);

    /// Hides the panel.
    fn detach(&mut self);
}

/// Arena of live solids that remembers insertion order.
///
/// Iteration, drawing and [`clear`](Self::clear) all follow the order in
/// which solids were added.
#[derive(Debug, Default)]
pub struct SolidRegistry {
    solids: SlotMap<SolidId, Solid>,
    order: Vec<SolidId>,
}

impl SolidRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `solid` and returns its ID.
    pub fn add(&mut self, solid: Solid) -> SolidId {
        let id = self.solids.insert(solid);
        self.order.push(id);
        id
    }

    /// Takes ownership of every solid, keeping their order.
    pub fn extend(&mut self, solids: Vec<Solid>) -> Vec<SolidId> {
        solids.into_iter().map(|s| self.add(s)).collect()
    }

    /// Gives the solid back to the caller. Dropping it removes its body.
    pub fn remove(&mut self, id: SolidId) -> Option<Solid> {
        let solid = self.solids.remove(id)?;
        self.order.retain(|other| *other != id);
        Some(solid)
    }

    /// Returns the solid, or an error if it is not registered.
    ///
    /// # Errors
    ///
    /// Returns an error if no solid has this ID.
    pub fn get(&self, id: SolidId) -> Result<&Solid> {
        self.solids
            .get(id)
            .ok_or_else(|| OperationError::NotFound("solid").into())
    }

    /// Returns the solid mutably, or an error if it is not registered.
    ///
    /// # Errors
    ///
    /// Returns an error if no solid has this ID.
    pub fn get_mut(&mut self, id: SolidId) -> Result<&mut Solid> {
        self.solids
            .get_mut(id)
            .ok_or_else(|| OperationError::NotFound("solid").into())
    }

    #[must_use]
    pub fn contains(&self, id: SolidId) -> bool {
        self.solids.contains_key(id)
    }

    /// Solids in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (SolidId, &Solid)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.solids.get(*id).map(|s| (*id, s)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.solids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.solids.is_empty()
    }

    /// The nearest solid hit by `ray`, measured to where the ray enters its
    /// picking sphere. Solids whose sphere contains the ray origin are
    /// skipped.
    #[must_use]
    pub fn pick(&self, ray: &Ray) -> Option<SolidId> {
        self.iter()
            .filter_map(|(id, solid)| solid.hit_distance(ray).map(|d| (id, d)))
            .filter(|(_, d)| *d >= 0.0)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// Toggles selection of `id` and carries out the force-panel request.
    ///
    /// # Errors
    ///
    /// Returns an error if no solid has this ID.
    pub fn select(
        &mut self,
        id: SolidId,
        settings: &InteractionSettings,
        panel: &mut dyn ForcePanel,
    ) -> Result<SelectionChange> {
        let change = self.get_mut(id)?.select(settings);
        dispatch(id, change, panel);
        Ok(change)
    }

    /// Sets the selection state of `id` and carries out the force-panel
    /// request.
    ///
    /// # Errors
    ///
    /// Returns an error if no solid has this ID.
    pub fn set_selected(
        &mut self,
        id: SolidId,
        selected: bool,
        settings: &InteractionSettings,
        panel: &mut dyn ForcePanel,
    ) -> Result<SelectionChange> {
        let change = self.get_mut(id)?.set_selected(selected, settings);
        dispatch(id, change, panel);
        Ok(change)
    }

    /// Pushes `g` to every solid (see [`Solid::set_gravity`]). A failing
    /// solid is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns the first error from a solid whose body is gone.
    pub fn set_gravity_all(&self, g: f64) -> Result<()> {
        let mut first_error = None;
        for (id, solid) in self.iter() {
            if let Err(err) = solid.set_gravity(g) {
                warn!(?id, %err, "gravity not applied");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Re-applies sustained forces.
    ///
    /// # Errors
    ///
    /// Returns the first error from a solid whose body is gone.
    pub fn update(&self) -> Result<()> {
        for (_, solid) in self.iter() {
            solid.update()?;
        }
        Ok(())
    }

    pub fn draw(&self, canvas: &mut dyn Canvas) {
        for (_, solid) in self.iter() {
            solid.draw(canvas);
        }
    }

    /// Drops every solid in insertion order.
    pub fn clear(&mut self) {
        let count = self.order.len();
        for id in std::mem::take(&mut self.order) {
            drop(self.solids.remove(id));
        }
        debug!(count, "solid registry cleared");
    }
}

fn dispatch(id: SolidId, change: SelectionChange, panel: &mut dyn ForcePanel) {
    match change {
        SelectionChange::Selected {
            attach_force_panel: true,
        } => panel.attach(id),
        SelectionChange::Deselected {
            detach_force_panel: true,
        } => panel.detach(),
        _ => {}
    }
}

impl Drop for SolidRegistry {
    fn drop(&mut self) {
        self.clear();
    }
}
