//! State cells with pending/committed values
//!
//! A [`Store`] owns every cell of a page. Reads always see the last committed
//! value; writes land in a pending slot that the scheduler commits at the
//! start of its next pass. Commit compares by value, so setting a cell to
//! what it already holds is not a change.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

/// Index of a cell inside its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(usize);

/// Typed handle to one cell.
///
/// Handles are plain `Copy` values; they carry no data of their own and can
/// be captured freely by effects and handlers.
pub struct State<T> {
    id: CellId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> State<T> {
    /// The untyped id, used when declaring effect dependencies.
    pub fn id(&self) -> CellId {
        self.id
    }
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for State<T> {}

impl<T> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("State").field(&self.id.0).finish()
    }
}

/// Type-erased view of a cell so the store can commit heterogeneous values.
trait Slot: Send {
    fn name(&self) -> &'static str;
    fn is_dirty(&self) -> bool;
    /// Moves the pending value into place. Returns true if the value changed.
    fn commit(&mut self) -> bool;
    fn version(&self) -> u64;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Cell<T> {
    name: &'static str,
    value: T,
    pending: Option<T>,
    version: u64,
}

impl<T> Slot for Cell<T>
where
    T: PartialEq + Send + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_dirty(&self) -> bool {
        self.pending.is_some()
    }

    fn commit(&mut self) -> bool {
        match self.pending.take() {
            Some(next) if next != self.value => {
                self.value = next;
                self.version += 1;
                true
            }
            _ => false,
        }
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Owner of all state cells.
#[derive(Default)]
pub struct Store {
    slots: Vec<Box<dyn Slot>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a new cell with an initial committed value.
    pub fn declare<T>(&mut self, name: &'static str, initial: T) -> State<T>
    where
        T: PartialEq + Send + 'static,
    {
        let id = CellId(self.slots.len());
        self.slots.push(Box::new(Cell {
            name,
            value: initial,
            pending: None,
            version: 0,
        }));
        State {
            id,
            _marker: PhantomData,
        }
    }

    /// The last committed value of a cell.
    pub fn get<T: 'static>(&self, state: State<T>) -> &T {
        &self.cell(state).value
    }

    /// Record a pending value. Later sets before the next commit win.
    pub fn set<T: 'static>(&mut self, state: State<T>, value: T) {
        self.cell_mut(state).pending = Some(value);
    }

    /// True if any cell holds an uncommitted value.
    pub fn is_dirty(&self) -> bool {
        self.slots.iter().any(|slot| slot.is_dirty())
    }

    /// Commit every pending value and return the cells whose value changed.
    pub fn commit(&mut self) -> Vec<CellId> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| slot.commit().then_some(CellId(index)))
            .collect()
    }

    /// Version counter of a cell; bumped only when a commit changes its value.
    pub fn version(&self, id: CellId) -> u64 {
        self.slots.get(id.0).map_or(0, |slot| slot.version())
    }

    pub fn name(&self, id: CellId) -> &'static str {
        self.slots.get(id.0).map_or("<unknown>", |slot| slot.name())
    }

    /// # Panics
    ///
    /// Panics if the handle was issued by a different store. Handles are only
    /// created by [`Store::declare`], so this is a wiring bug, not a runtime
    /// condition.
    fn cell<T: 'static>(&self, state: State<T>) -> &Cell<T> {
        self.slots
            .get(state.id.0)
            .and_then(|slot| slot.as_any().downcast_ref::<Cell<T>>())
            .unwrap_or_else(|| panic!("state handle {:?} does not belong to this store", state))
    }

    fn cell_mut<T: 'static>(&mut self, state: State<T>) -> &mut Cell<T> {
        self.slots
            .get_mut(state.id.0)
            .and_then(|slot| slot.as_any_mut().downcast_mut::<Cell<T>>())
            .unwrap_or_else(|| panic!("state handle {:?} does not belong to this store", state))
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("cells", &self.slots.len())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}
