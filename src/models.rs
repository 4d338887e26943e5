use serde::Serialize;

use crate::error::{Result, SlicerError};
use crate::geometry::{Point, Quadrilateral, convex_hull};

/// A connected foreground component found during segmentation
#[derive(Debug, Clone)]
pub struct Region {
    pub label: u32,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    pub pixel_count: u64,
    /// Pixel-corner points of the leftmost and rightmost pixel on every row
    pub outline: Vec<Point>,
}

impl Region {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    pub fn area(&self) -> u64 {
        self.pixel_count
    }

    pub fn hull(&self) -> Vec<Point> {
        convex_hull(&self.outline)
    }
}

/// A candidate or confirmed photograph boundary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoSlice {
    boundary: Quadrilateral,
    locked: bool,
    order: usize,
}

impl PhotoSlice {
    pub fn new(boundary: Quadrilateral, order: usize) -> Self {
        Self {
            boundary,
            locked: false,
            order,
        }
    }

    pub fn boundary(&self) -> &Quadrilateral {
        &self.boundary
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn toggle_locked(&mut self) {
        self.locked = !self.locked;
    }

    /// Replace one corner. On failure the boundary is left untouched.
    pub fn move_corner(&mut self, index: usize, point: Point) -> Result<()> {
        self.boundary = self.boundary.with_corner(index, point)?;
        Ok(())
    }
}

/// The slices currently shown for one source image
#[derive(Debug, Clone, Default)]
pub struct SliceList {
    slices: Vec<PhotoSlice>,
    next_order: usize,
}

impl SliceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in the result of a detection run
    pub fn replace(&mut self, slices: Vec<PhotoSlice>) {
        self.next_order = slices.iter().map(|s| s.order + 1).max().unwrap_or(0);
        self.slices = slices;
    }

    /// Add an operator-drawn boundary; it starts out locked
    pub fn insert_manual(&mut self, boundary: Quadrilateral) -> &PhotoSlice {
        let mut slice = PhotoSlice::new(boundary, self.next_order);
        slice.locked = true;
        self.next_order += 1;
        self.slices.push(slice);
        &self.slices[self.slices.len() - 1]
    }

    pub fn remove(&mut self, order: usize) -> Option<PhotoSlice> {
        let idx = self.slices.iter().position(|s| s.order == order)?;
        Some(self.slices.remove(idx))
    }

    pub fn get(&self, order: usize) -> Option<&PhotoSlice> {
        self.slices.iter().find(|s| s.order == order)
    }

    pub fn get_mut(&mut self, order: usize) -> Option<&mut PhotoSlice> {
        self.slices.iter_mut().find(|s| s.order == order)
    }

    /// Like `get_mut`, but an unknown order is a geometry error
    pub fn require_mut(&mut self, order: usize) -> Result<&mut PhotoSlice> {
        self.get_mut(order)
            .ok_or_else(|| SlicerError::InvalidGeometry(format!("no slice numbered {}", order)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhotoSlice> {
        self.slices.iter()
    }

    /// Locked slices in display order
    pub fn locked(&self) -> Vec<&PhotoSlice> {
        let mut locked: Vec<&PhotoSlice> = self.slices.iter().filter(|s| s.locked).collect();
        locked.sort_by_key(|s| s.order);
        locked
    }

    /// Lock one slice; already locked slices stay locked
    pub fn lock(&mut self, order: usize) -> Result<()> {
        self.require_mut(order)?.locked = true;
        Ok(())
    }

    pub fn lock_all(&mut self) {
        for slice in &mut self.slices {
            slice.locked = true;
        }
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn as_slice(&self) -> &[PhotoSlice] {
        &self.slices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f64, y: f64) -> Quadrilateral {
        Quadrilateral::from_rect(x, y, 100.0, 50.0).unwrap()
    }

    #[test]
    fn toggle_only_flips_lock() {
        let mut slice = PhotoSlice::new(rect(0.0, 0.0), 3);
        slice.toggle_locked();
        assert!(slice.is_locked());
        assert_eq!(slice.order(), 3);
        assert_eq!(*slice.boundary(), rect(0.0, 0.0));
        slice.toggle_locked();
        assert!(!slice.is_locked());
    }

    #[test]
    fn move_corner_is_atomic_on_failure() {
        let mut slice = PhotoSlice::new(rect(0.0, 0.0), 0);
        let before = *slice.boundary();

        // Drag the top-left corner onto the line through both right-hand corners
        let err = slice.move_corner(0, Point::new(100.0, -50.0)).unwrap_err();
        assert!(matches!(err, SlicerError::InvalidGeometry(_)));
        assert_eq!(*slice.boundary(), before);

        assert!(slice.move_corner(7, Point::new(1.0, 1.0)).is_err());
        assert_eq!(*slice.boundary(), before);

        slice.move_corner(0, Point::new(-5.0, -5.0)).unwrap();
        assert_eq!(slice.boundary().corner(0), Some(Point::new(-5.0, -5.0)));
    }

    #[test]
    fn manual_slices_are_locked_and_numbered_after_detected() {
        let mut list = SliceList::new();
        list.replace(vec![PhotoSlice::new(rect(0.0, 0.0), 0), PhotoSlice::new(rect(0.0, 100.0), 1)]);

        let manual = list.insert_manual(rect(200.0, 0.0));
        assert!(manual.is_locked());
        assert_eq!(manual.order(), 2);
        assert_eq!(list.locked().len(), 1);
    }

    #[test]
    fn lock_after_lock_all_keeps_slice_locked() {
        let mut list = SliceList::new();
        list.replace(vec![PhotoSlice::new(rect(0.0, 0.0), 0), PhotoSlice::new(rect(0.0, 100.0), 1)]);
        list.lock_all();
        list.lock(1).unwrap();
        assert_eq!(list.locked().len(), 2);
        assert!(matches!(list.lock(5), Err(SlicerError::InvalidGeometry(_))));
    }

    #[test]
    fn orders_survive_edits_and_removal() {
        let mut list = SliceList::new();
        list.replace(vec![
            PhotoSlice::new(rect(0.0, 0.0), 0),
            PhotoSlice::new(rect(0.0, 100.0), 1),
            PhotoSlice::new(rect(0.0, 200.0), 2),
        ]);

        list.require_mut(2).unwrap().toggle_locked();
        list.require_mut(0).unwrap().toggle_locked();
        list.remove(1);

        let orders: Vec<usize> = list.iter().map(|s| s.order()).collect();
        assert_eq!(orders, vec![0, 2]);
        let locked: Vec<usize> = list.locked().iter().map(|s| s.order()).collect();
        assert_eq!(locked, vec![0, 2]);

        assert_eq!(list.insert_manual(rect(300.0, 0.0)).order(), 3);
        assert!(list.require_mut(1).is_err());
    }
}
