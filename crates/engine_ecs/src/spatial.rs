//! Spatial index used by queries.
//!
//! The index stores one point per member entity, with one coordinate per
//! active axis. Each axis keeps its own ordered set of `(coordinate, entity)`
//! pairs, so a range lookup walks only the slice of one axis that falls
//! inside the requested bounds and checks the remaining axes per candidate.
//!
//! The index is N-dimensional; queries use at most three axes.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use engine_component::Entity;

/// Number of axes a query exposes.
pub const QUERY_AXES: usize = 3;

/// `f64` with a total order so it can key an ordered set. Signed zeros
/// compare equal.
#[derive(Debug, Clone, Copy)]
struct Coord(f64);

impl PartialEq for Coord {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Coord {}

impl PartialOrd for Coord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Coord {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.0 + 0.0).total_cmp(&(other.0 + 0.0))
    }
}

/// Coordinate-wise equality under the index's ordering, so `-0.0` and `0.0`
/// are the same point.
pub(crate) fn same_point(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(&x, &y)| Coord(x) == Coord(y))
}

/// Inclusive bounds on one axis; `None` leaves that side open.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl AxisRange {
    /// Bounds on one axis.
    #[must_use]
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// Whether either side is bounded.
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    /// `min <= value <= max` on every supplied side. NaN never matches a
    /// bounded side.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|min| min <= value) && self.max.is_none_or(|max| value <= max)
    }

    /// `true` when no value can satisfy both sides.
    fn is_empty(&self) -> bool {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Coord(min) > Coord(max),
            _ => false,
        }
    }
}

/// Per-axis bounds for a query evaluation, one [`AxisRange`] for each of the
/// query's three fields.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QueryBounds {
    axes: [AxisRange; QUERY_AXES],
}

impl QueryBounds {
    /// Bounds that match every indexed entity.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Build bounds from the minimum and maximum of each axis.
    #[must_use]
    pub fn from_min_max(min: [Option<f64>; QUERY_AXES], max: [Option<f64>; QUERY_AXES]) -> Self {
        let mut bounds = Self::default();
        for axis in 0..QUERY_AXES {
            bounds.axes[axis] = AxisRange::new(min[axis], max[axis]);
        }
        bounds
    }

    /// Set the range of the first axis.
    #[must_use]
    pub fn first(mut self, min: f64, max: f64) -> Self {
        self.axes[0] = AxisRange::new(Some(min), Some(max));
        self
    }

    /// Set the range of the second axis.
    #[must_use]
    pub fn second(mut self, min: f64, max: f64) -> Self {
        self.axes[1] = AxisRange::new(Some(min), Some(max));
        self
    }

    /// Set the range of the third axis.
    #[must_use]
    pub fn third(mut self, min: f64, max: f64) -> Self {
        self.axes[2] = AxisRange::new(Some(min), Some(max));
        self
    }

    /// Replace one axis, leaving sides open where `None` is given. Axes past
    /// the third are ignored.
    #[must_use]
    pub fn axis(mut self, axis: usize, min: Option<f64>, max: Option<f64>) -> Self {
        if let Some(range) = self.axes.get_mut(axis) {
            *range = AxisRange::new(min, max);
        }
        self
    }

    /// Bounds on one query axis.
    #[must_use]
    pub fn get(&self, axis: usize) -> AxisRange {
        self.axes.get(axis).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
struct IndexedPoint {
    entity: Entity,
    coords: Vec<f64>,
}

/// An ordered multi-axis index over entity points.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    axes: Vec<BTreeSet<(Coord, u64)>>,
    points: BTreeMap<u64, IndexedPoint>,
}

impl SpatialIndex {
    /// Create an empty index over `dims` axes. Zero axes is allowed: the
    /// index is then a plain membership set.
    #[must_use]
    pub fn new(dims: usize) -> Self {
        Self {
            axes: vec![BTreeSet::new(); dims],
            points: BTreeMap::new(),
        }
    }

    /// Number of axes.
    #[must_use]
    pub fn dims(&self) -> usize {
        self.axes.len()
    }

    /// Number of member entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the index has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether the entity is a member.
    #[must_use]
    pub fn contains(&self, entity_id: u64) -> bool {
        self.points.contains_key(&entity_id)
    }

    /// Current coordinates of a member.
    #[must_use]
    pub fn coords(&self, entity_id: u64) -> Option<&[f64]> {
        self.points.get(&entity_id).map(|p| p.coords.as_slice())
    }

    /// Members in id order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.points.values().map(|p| p.entity)
    }

    /// Insert a member or move it to new coordinates. Returns `true` if the
    /// entity was not a member before.
    pub fn upsert(&mut self, entity: Entity, mut coords: Vec<f64>) -> bool {
        debug_assert_eq!(coords.len(), self.axes.len(), "point dimension mismatch");
        for value in &mut coords {
            *value += 0.0;
        }

        let inserted = match self.points.get(&entity.id) {
            Some(existing) if same_point(&existing.coords, &coords) => return false,
            Some(_) => {
                self.unlink(entity.id);
                false
            }
            None => true,
        };
        for (axis, &value) in self.axes.iter_mut().zip(&coords) {
            axis.insert((Coord(value), entity.id));
        }
        self.points.insert(entity.id, IndexedPoint { entity, coords });

        debug_assert!(self.axes.iter().all(|a| a.len() == self.points.len()));
        inserted
    }

    /// Remove a member. Returns `true` if it was present.
    pub fn remove(&mut self, entity_id: u64) -> bool {
        let removed = self.unlink(entity_id);
        debug_assert!(self.axes.iter().all(|a| a.len() == self.points.len()));
        removed
    }

    fn unlink(&mut self, entity_id: u64) -> bool {
        let Some(point) = self.points.remove(&entity_id) else {
            return false;
        };
        for (axis, &value) in self.axes.iter_mut().zip(&point.coords) {
            let found = axis.remove(&(Coord(value), entity_id));
            debug_assert!(found, "axis entry missing for entity {entity_id}");
        }
        true
    }

    /// Remove every member for which `keep` returns `false`.
    pub fn retain(&mut self, mut keep: impl FnMut(Entity) -> bool) -> usize {
        let dropped: Vec<u64> = self
            .points
            .values()
            .filter(|p| !keep(p.entity))
            .map(|p| p.entity.id)
            .collect();
        for id in &dropped {
            self.unlink(*id);
        }
        dropped.len()
    }

    /// Members whose coordinates fall inside `ranges`, one range per axis,
    /// ordered by entity id.
    #[must_use]
    pub fn range(&self, ranges: &[AxisRange]) -> Vec<Entity> {
        debug_assert_eq!(ranges.len(), self.axes.len());

        let Some(driver) = ranges.iter().position(AxisRange::is_bounded) else {
            return self.entities().collect();
        };
        if ranges.iter().any(AxisRange::is_empty) {
            return Vec::new();
        }

        let range = ranges[driver];
        let lower = range
            .min
            .map_or(Bound::Unbounded, |min| Bound::Included((Coord(min), 0)));
        let upper = range
            .max
            .map_or(Bound::Unbounded, |max| Bound::Included((Coord(max), u64::MAX)));

        let mut hits: Vec<Entity> = self.axes[driver]
            .range((lower, upper))
            .filter_map(|&(_, id)| {
                let point = self.points.get(&id)?;
                ranges
                    .iter()
                    .zip(&point.coords)
                    .all(|(r, &value)| r.contains(value))
                    .then_some(point.entity)
            })
            .collect();
        hits.sort_unstable_by_key(|e| e.id);
        hits
    }

    /// Check that every axis agrees with the point table.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (index, axis) in self.axes.iter().enumerate() {
            if axis.len() != self.points.len() {
                return Err(format!(
                    "axis {index} has {} entries for {} points",
                    axis.len(),
                    self.points.len()
                ));
            }
        }
        for (id, point) in &self.points {
            if point.entity.id != *id {
                return Err(format!("point keyed {id} belongs to {}", point.entity));
            }
            for (index, (axis, &value)) in self.axes.iter().zip(&point.coords).enumerate() {
                if !axis.contains(&(Coord(value), *id)) {
                    return Err(format!("axis {index} is missing entity {id} at {value}"));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use engine_component::EntityKind;

    use super::*;

    fn e(id: u64) -> Entity {
        Entity::new(id, EntityKind::Entity)
    }

    fn bounded(min: f64, max: f64) -> AxisRange {
        AxisRange::new(Some(min), Some(max))
    }

    fn grid() -> SpatialIndex {
        let mut index = SpatialIndex::new(2);
        for id in 1..=25u64 {
            let x = ((id - 1) % 5) as f64;
            let y = ((id - 1) / 5) as f64;
            index.upsert(e(id), vec![x, y]);
        }
        index
    }

    #[test]
    fn test_range_both_axes() {
        let index = grid();
        let hits = index.range(&[bounded(1.0, 2.0), bounded(3.0, 4.0)]);
        let ids: Vec<u64> = hits.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![17, 18, 22, 23]);
    }

    #[test]
    fn test_open_sides() {
        let index = grid();
        let hits = index.range(&[AxisRange::new(None, Some(0.0)), AxisRange::new(Some(4.0), None)]);
        assert_eq!(hits, vec![e(21)]);
        assert_eq!(index.range(&[AxisRange::default(), AxisRange::default()]).len(), 25);
    }

    #[test]
    fn test_inverted_bounds_match_nothing() {
        let index = grid();
        assert!(index.range(&[bounded(3.0, 1.0), AxisRange::default()]).is_empty());
        assert!(index.range(&[AxisRange::default(), bounded(3.0, 1.0)]).is_empty());
    }

    #[test]
    fn test_upsert_moves_point() {
        let mut index = grid();
        assert!(!index.upsert(e(1), vec![10.0, 10.0]));
        assert_eq!(index.coords(1), Some(&[10.0, 10.0][..]));
        assert!(index.range(&[bounded(0.0, 0.0), bounded(0.0, 0.0)]).is_empty());
        assert_eq!(index.range(&[bounded(9.0, 11.0), bounded(9.0, 11.0)]), vec![e(1)]);
        index.check_invariants().unwrap();
    }

    #[test]
    fn test_duplicate_coordinates() {
        let mut index = SpatialIndex::new(1);
        index.upsert(e(1), vec![5.0]);
        index.upsert(e(2), vec![5.0]);
        index.upsert(e(3), vec![5.0]);
        assert_eq!(index.range(&[bounded(5.0, 5.0)]), vec![e(1), e(2), e(3)]);
        assert!(index.remove(2));
        assert_eq!(index.range(&[bounded(5.0, 5.0)]), vec![e(1), e(3)]);
        index.check_invariants().unwrap();
    }

    #[test]
    fn test_nan_never_matches_bounds() {
        let mut index = SpatialIndex::new(1);
        index.upsert(e(1), vec![f64::NAN]);
        index.upsert(e(2), vec![1.0]);
        assert_eq!(index.range(&[AxisRange::new(Some(f64::MIN), None)]), vec![e(2)]);
        assert_eq!(index.range(&[AxisRange::default()]).len(), 2);
    }

    #[test]
    fn test_negative_zero() {
        let mut index = SpatialIndex::new(1);
        index.upsert(e(1), vec![-0.0]);
        assert_eq!(index.range(&[bounded(0.0, 1.0)]), vec![e(1)]);
        assert!(index.remove(1));
        index.check_invariants().unwrap();
    }

    #[test]
    fn test_negative_zero_moves_in_place() {
        let mut index = SpatialIndex::new(2);
        index.upsert(e(1), vec![0.0, 1.0]);
        assert!(!index.upsert(e(1), vec![-0.0, 1.0]));
        assert_eq!(index.coords(1).map(|c| c[0].is_sign_positive()), Some(true));
        index.check_invariants().unwrap();
        assert!(same_point(&[-0.0, 1.0], &[0.0, 1.0]));
        assert!(!same_point(&[f64::NAN], &[0.0]));
    }

    #[test]
    fn test_zero_width_range_across_signed_zeros() {
        let mut index = SpatialIndex::new(1);
        index.upsert(e(1), vec![0.0]);
        index.upsert(e(2), vec![-0.0]);
        assert_eq!(index.range(&[bounded(0.0, -0.0)]), vec![e(1), e(2)]);
        assert_eq!(index.range(&[bounded(-0.0, 0.0)]), vec![e(1), e(2)]);
        assert_eq!(index.range(&[bounded(0.0, -1.0)]), Vec::<Entity>::new());
    }

    #[test]
    fn test_zero_dims_is_a_set() {
        let mut index = SpatialIndex::new(0);
        index.upsert(e(2), Vec::new());
        index.upsert(e(1), Vec::new());
        assert_eq!(index.range(&[]), vec![e(1), e(2)]);
    }

    #[test]
    fn test_retain() {
        let mut index = grid();
        let dropped = index.retain(|entity| entity.id % 2 == 0);
        assert_eq!(dropped, 13);
        assert_eq!(index.len(), 12);
        index.check_invariants().unwrap();
    }

    #[test]
    fn test_query_bounds_builder() {
        let bounds = QueryBounds::unbounded().first(0.0, 10.0).axis(2, None, Some(3.0));
        assert_eq!(bounds.get(0), bounded(0.0, 10.0));
        assert!(!bounds.get(1).is_bounded());
        assert_eq!(bounds.get(2), AxisRange::new(None, Some(3.0)));
        assert_eq!(bounds.get(7), AxisRange::default());
    }
}
