use crate::cell::{Cell, CellKind};
use crate::types::CellId;

/// Owns every cell of a plant, addressed by stable [`CellId`]s.
///
/// Also keeps the two registries the renderer walks: all stems in creation
/// order (never shrinks) and all live leaves in creation order (a leaf is
/// spliced out when it is removed).
#[derive(Debug, Default)]
pub struct CellArena {
    cells: Vec<Option<Cell>>,
    stems: Vec<CellId>,
    leaves: Vec<CellId>,
}

impl CellArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next inserted cell will receive.
    pub fn next_id(&self) -> CellId {
        self.cells.len()
    }

    /// Stores `cell` and registers it. `cell.id` must equal
    /// [`CellArena::next_id`].
    pub fn insert(&mut self, cell: Cell) -> CellId {
        let id = self.cells.len();
        debug_assert_eq!(cell.id, id);
        match cell.kind {
            CellKind::Stem(_) => self.stems.push(id),
            CellKind::Leaf(_) => self.leaves.push(id),
        }
        self.cells.push(Some(cell));
        id
    }

    pub fn get(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: CellId) -> Option<&mut Cell> {
        self.cells.get_mut(id).and_then(Option::as_mut)
    }

    /// Removes a leaf and unregisters it. Returns `None` for stems and for
    /// leaves that are already gone, so repeated calls are harmless.
    pub fn remove_leaf(&mut self, id: CellId) -> Option<Cell> {
        let slot = self.cells.get_mut(id)?;
        if !matches!(slot.as_ref()?.kind, CellKind::Leaf(_)) {
            return None;
        }
        let cell = slot.take()?;
        if let Some(pos) = self.leaves.iter().position(|&l| l == id) {
            self.leaves.remove(pos);
        }
        Some(cell)
    }

    pub fn stem_ids(&self) -> &[CellId] {
        &self.stems
    }

    pub fn leaf_ids(&self) -> &[CellId] {
        &self.leaves
    }

    pub fn stems(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.stems.iter().filter_map(|&id| self.get(id))
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.leaves.iter().filter_map(|&id| self.get(id))
    }

    pub fn stem_count(&self) -> usize {
        self.stems.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Direct children of `id`, found by a full scan since cells only
    /// point at their parents.
    pub fn children_of(&self, id: CellId) -> impl Iterator<Item = &Cell> + '_ {
        self.cells
            .iter()
            .filter_map(Option::as_ref)
            .filter(move |c| c.parent == Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Leaf, Stem, StemPhase};
    use crate::template::GrowthTemplate;
    use crate::types::BodyHandle;
    use glam::Vec2;
    use std::rc::Rc;

    fn cell(id: CellId, parent: Option<CellId>, kind: CellKind) -> Cell {
        Cell {
            id,
            parent,
            age: 0,
            generation: 0,
            branch_depth: 0,
            growth_angle: 0.0,
            template: Rc::new(GrowthTemplate::tree()),
            body: BodyHandle(id as u32),
            constraints: Vec::new(),
            kind,
        }
    }

    fn stem_kind() -> CellKind {
        CellKind::Stem(Stem {
            width: 1.0,
            segment_length: 0,
            phase: StemPhase::Growing,
            color: GrowthTemplate::tree().transition_colors.start,
            pin_body: None,
            anchored_at: Vec2::ZERO,
        })
    }

    #[test]
    fn insert_registers_by_kind() {
        let mut arena = CellArena::new();
        let s = arena.insert(cell(arena.next_id(), None, stem_kind()));
        let l = arena.insert(cell(arena.next_id(), Some(s), CellKind::Leaf(Leaf::default())));

        assert_eq!(arena.stem_ids(), &[s]);
        assert_eq!(arena.leaf_ids(), &[l]);
        assert_eq!(arena.children_of(s).map(|c| c.id).collect::<Vec<_>>(), vec![l]);
    }

    #[test]
    fn remove_leaf_is_idempotent_and_ignores_stems() {
        let mut arena = CellArena::new();
        let s = arena.insert(cell(arena.next_id(), None, stem_kind()));
        let l = arena.insert(cell(arena.next_id(), Some(s), CellKind::Leaf(Leaf::default())));

        assert!(arena.remove_leaf(s).is_none());
        assert_eq!(arena.stem_count(), 1);

        assert!(arena.remove_leaf(l).is_some());
        assert!(arena.remove_leaf(l).is_none());
        assert_eq!(arena.leaf_count(), 0);
        assert!(arena.get(l).is_none());
        // Ids are not recycled.
        assert_eq!(arena.next_id(), 2);
    }
}
