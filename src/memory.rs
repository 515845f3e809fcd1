//! Snapshots of watched values around split scopes.
//!
//! The state a split scope works on is any type implementing [`Watch`]: it exposes
//! its domain values as an ordered list of [`Slot`]s. [`SaveMemory`] captures that
//! list before the first alternative and restores it before each following one.
//! [`MergeMemory`] folds the values each alternative ends with into one value per
//! slot. Both check that the list has the same length and slot types every time.

use std::any::Any;
use std::fmt;

use log::debug;

use crate::error::PreconditionError;
use crate::path::ExecutionPath;

/// A domain value that can be joined with another one on branch reconvergence.
pub trait Mergeable: Clone + fmt::Debug + 'static {
    /// Widens `self` so that it also encloses `source`; the implementation value
    /// of the result is the one of `source`.
    fn merge_with(&mut self, source: &Self, path: &ExecutionPath);

    /// Simplifies the value at the end of an alternative. Returns false if the value
    /// became unusable, which drops the alternative.
    fn optimize_value(&mut self, path: &ExecutionPath) -> bool {
        let _ = path;
        true
    }
}

/// A boxed copy of one watched value.
pub trait Snapshot: fmt::Debug {
    fn as_any(&self) -> &dyn Any;

    /// Joins `other` into this snapshot. The implementation value comes from `other`
    /// when `take_implementation` is set, otherwise it is kept.
    fn merge(
        &mut self,
        other: &dyn Snapshot,
        take_implementation: bool,
        path: &ExecutionPath,
    ) -> Result<(), PreconditionError>;
}

impl<T: Mergeable> Snapshot for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn merge(
        &mut self,
        other: &dyn Snapshot,
        take_implementation: bool,
        path: &ExecutionPath,
    ) -> Result<(), PreconditionError> {
        let other = downcast::<T>(other)?;
        if take_implementation {
            self.merge_with(other, path);
        } else {
            let mut merged = other.clone();
            merged.merge_with(self, path);
            *self = merged;
        }
        Ok(())
    }
}

fn downcast<T: 'static>(snapshot: &dyn Snapshot) -> Result<&T, PreconditionError> {
    snapshot.as_any().downcast_ref::<T>().ok_or_else(|| {
        PreconditionError::new(format!(
            "watched value changed type, expected {}",
            std::any::type_name::<T>()
        ))
    })
}

/// A watched value, seen through the state of a split scope.
pub trait Slot {
    fn save(&self) -> Box<dyn Snapshot>;

    fn restore(&mut self, snapshot: &dyn Snapshot) -> Result<(), PreconditionError>;

    fn optimize(&mut self, path: &ExecutionPath) -> bool;
}

impl<T: Mergeable> Slot for T {
    fn save(&self) -> Box<dyn Snapshot> {
        Box::new(self.clone())
    }

    fn restore(&mut self, snapshot: &dyn Snapshot) -> Result<(), PreconditionError> {
        *self = downcast::<T>(snapshot)?.clone();
        Ok(())
    }

    fn optimize(&mut self, path: &ExecutionPath) -> bool {
        self.optimize_value(path)
    }
}

/// The watched variables of a split scope, in a fixed order.
pub trait Watch {
    fn slots(&mut self) -> Vec<&mut dyn Slot>;
}

impl<T: Mergeable> Watch for Vec<T> {
    fn slots(&mut self) -> Vec<&mut dyn Slot> {
        self.iter_mut().map(|value| value as &mut dyn Slot).collect()
    }
}

impl<T: Mergeable, const N: usize> Watch for [T; N] {
    fn slots(&mut self) -> Vec<&mut dyn Slot> {
        self.iter_mut().map(|value| value as &mut dyn Slot).collect()
    }
}

impl Watch for () {
    fn slots(&mut self) -> Vec<&mut dyn Slot> {
        Vec::new()
    }
}

macro_rules! impl_watch_for_tuple {
    ($($name:ident : $index:tt),+) => {
        impl<$($name: Mergeable),+> Watch for ($($name,)+) {
            fn slots(&mut self) -> Vec<&mut dyn Slot> {
                vec![$(&mut self.$index as &mut dyn Slot),+]
            }
        }
    };
}

impl_watch_for_tuple!(A: 0);
impl_watch_for_tuple!(A: 0, B: 1);
impl_watch_for_tuple!(A: 0, B: 1, C: 2);
impl_watch_for_tuple!(A: 0, B: 1, C: 2, D: 3);
impl_watch_for_tuple!(A: 0, B: 1, C: 2, D: 3, F: 4);
impl_watch_for_tuple!(A: 0, B: 1, C: 2, D: 3, F: 4, G: 5);

fn length_mismatch(expected: usize, found: usize) -> PreconditionError {
    PreconditionError::new(format!(
        "watched values changed between snapshots: expected {} values, found {}",
        expected, found
    ))
}

/// Values of the watched variables at the entry of a split scope.
#[derive(Debug)]
pub struct SaveMemory {
    snapshots: Vec<Box<dyn Snapshot>>,
}

impl SaveMemory {
    pub fn capture<S: Watch + ?Sized>(state: &mut S) -> Self {
        let snapshots: Vec<_> = state.slots().iter().map(|slot| slot.save()).collect();
        debug!("SaveMemory::capture({} values)", snapshots.len());
        Self { snapshots }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn restore<S: Watch + ?Sized>(&self, state: &mut S) -> Result<(), PreconditionError> {
        let mut slots = state.slots();
        if slots.len() != self.snapshots.len() {
            return Err(length_mismatch(self.snapshots.len(), slots.len()));
        }
        for (slot, snapshot) in slots.iter_mut().zip(&self.snapshots) {
            slot.restore(snapshot.as_ref())?;
        }
        Ok(())
    }
}

/// Join of the values the alternatives of a split scope end with.
#[derive(Debug, Default)]
pub struct MergeMemory {
    merged: Option<Vec<Box<dyn Snapshot>>>,
    has_implementation: bool,
    absorbed: usize,
    dropped: usize,
}

impl MergeMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no alternative has been absorbed yet.
    pub fn is_empty(&self) -> bool {
        self.merged.is_none()
    }

    /// Number of alternatives that contributed to the join.
    pub fn absorbed(&self) -> usize {
        self.absorbed
    }

    /// Number of alternatives dropped because a value could not be optimized.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Folds the values of a completed alternative into the join.
    ///
    /// `follows_implementation` tells whether the alternative is the floating-point
    /// flow; the join then takes its implementation values. Returns false when the
    /// alternative is dropped.
    pub fn absorb<S: Watch + ?Sized>(
        &mut self,
        path: &ExecutionPath,
        state: &mut S,
        follows_implementation: bool,
    ) -> Result<bool, PreconditionError> {
        let mut slots = state.slots();
        for slot in slots.iter_mut() {
            if !slot.optimize(path) {
                debug!("MergeMemory::absorb: value is degenerate, dropping the alternative");
                self.dropped += 1;
                return Ok(false);
            }
        }
        match &mut self.merged {
            None => {
                self.merged = Some(slots.iter().map(|slot| slot.save()).collect());
                self.has_implementation = follows_implementation;
            }
            Some(merged) => {
                if merged.len() != slots.len() {
                    return Err(length_mismatch(merged.len(), slots.len()));
                }
                let take_implementation = follows_implementation || !self.has_implementation;
                for (value, slot) in merged.iter_mut().zip(slots.iter()) {
                    value.merge(slot.save().as_ref(), take_implementation, path)?;
                }
                self.has_implementation |= follows_implementation;
            }
        }
        self.absorbed += 1;
        Ok(true)
    }

    /// Writes the join back into the watched variables.
    pub fn store_into<S: Watch + ?Sized>(&self, state: &mut S) -> Result<(), PreconditionError> {
        let merged = match &self.merged {
            Some(merged) => merged,
            None => return Err(PreconditionError::new("no alternative to merge")),
        };
        let mut slots = state.slots();
        if slots.len() != merged.len() {
            return Err(length_mismatch(merged.len(), slots.len()));
        }
        for (slot, value) in slots.iter_mut().zip(merged) {
            slot.restore(value.as_ref())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::config::Config;

    /// A toy domain: a range with a chosen point.
    #[derive(Debug, Clone, PartialEq)]
    struct Range {
        point: i32,
        min: i32,
        max: i32,
    }

    impl Range {
        fn new(point: i32) -> Self {
            Self {
                point,
                min: point,
                max: point,
            }
        }
    }

    impl Mergeable for Range {
        fn merge_with(&mut self, source: &Self, _path: &ExecutionPath) {
            self.min = self.min.min(source.min);
            self.max = self.max.max(source.max);
            self.point = source.point;
        }

        fn optimize_value(&mut self, _path: &ExecutionPath) -> bool {
            self.max - self.min < 100
        }
    }

    #[derive(Debug, Clone)]
    struct Other;

    impl Mergeable for Other {
        fn merge_with(&mut self, _source: &Self, _path: &ExecutionPath) {}
    }

    #[test]
    fn test_save_restore() {
        let mut state = (Range::new(1), Range::new(2));
        let saved = SaveMemory::capture(&mut state);
        assert_eq!(saved.len(), 2);
        state.0 = Range::new(10);
        state.1.max = 20;
        saved.restore(&mut state).unwrap();
        assert_eq!(state, (Range::new(1), Range::new(2)));
    }

    #[test]
    fn test_restore_checks_shape() {
        let mut values = vec![Range::new(1)];
        let saved = SaveMemory::capture(&mut values);
        values.push(Range::new(2));
        assert!(saved.restore(&mut values).is_err());
        let mut other = (Other,);
        assert!(saved.restore(&mut other).is_err());
    }

    #[test]
    fn test_merge_alternatives() {
        let path = ExecutionPath::new(Config::default());
        let mut merged = MergeMemory::new();
        assert!(merged.is_empty());

        let mut state = [Range::new(3)];
        assert!(merged.absorb(&path, &mut state, true).unwrap());
        let mut state = [Range::new(-4)];
        assert!(merged.absorb(&path, &mut state, false).unwrap());
        assert_eq!(merged.absorbed(), 2);

        let mut result = [Range::new(0)];
        merged.store_into(&mut result).unwrap();
        // The implementation point stays the one of the floating-point flow.
        assert_eq!(result[0], Range { point: 3, min: -4, max: 3 });
    }

    #[test]
    fn test_degenerate_alternative_is_dropped() {
        let path = ExecutionPath::new(Config::default());
        let mut merged = MergeMemory::new();
        let mut state = [Range { point: 0, min: 0, max: 1000 }];
        assert!(!merged.absorb(&path, &mut state, true).unwrap());
        assert!(merged.is_empty());
        assert_eq!(merged.dropped(), 1);
        assert!(merged.store_into(&mut state).is_err());
    }
}
