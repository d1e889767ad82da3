//! Bounded stores of remote objects and their tiles.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::protocol::{Metrics, TileLayout};

use super::error::{RegistryError, StoreKind};
use super::session::{Session, SessionState};

/// Maximum registered integer variables.
pub const INT_CAPACITY: usize = 256;
/// Maximum registered firmware functions.
pub const FUNCTION_CAPACITY: usize = 10;
/// Maximum tiles, including the built-in setup tile.
pub const TILE_CAPACITY: usize = 256;

/// Named integer exposed by the peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntVariable {
    /// Slot, assigned in arrival order
    pub index: u8,
    /// Last value reported by the device
    pub value: i32,
    /// Lower bound
    pub min: i32,
    /// Upper bound
    pub max: i32,
    /// Raw layout word
    pub flags: u32,
    /// Display name
    pub name: String,
}

/// Callable function exposed by the peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FirmwareFunction {
    /// Slot, assigned in arrival order
    pub index: u8,
    /// Display name
    pub name: String,
    /// Raw layout word
    pub flags: i32,
}

/// What a tile points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum TileKind {
    /// Entry in the function store
    Function = 0,
    /// Entry in the integer-variable store
    IntVariable = 1,
    /// Built-in "request setup" control
    SetupRequest = 255,
}

/// Layout descriptor for one on-screen control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GuiTile {
    /// Target store
    pub kind: TileKind,
    /// Index into the target store
    pub ref_index: u8,
    /// Placement on the 16×16 grid
    pub layout: TileLayout,
}

impl GuiTile {
    const SETUP_REQUEST: Self = Self {
        kind: TileKind::SetupRequest,
        ref_index: 0,
        layout: TileLayout {
            x: 0,
            y: 0,
            w: 0,
            h: 0,
            c1: 0,
            c2: 0,
            reserved: 0,
        },
    };
}

/// Host-side mirror of everything the peer has registered.
///
/// Tile 0 is always the setup-request tile, so
/// `tile_count() == int_count() + function_count() + 1` holds at all times.
#[derive(Debug)]
pub struct Registry {
    ints: Vec<IntVariable>,
    functions: Vec<FirmwareFunction>,
    tiles: Vec<GuiTile>,
    peer: Option<SocketAddr>,
    session: Session,
}

impl Registry {
    /// Create an empty registry holding only the setup tile.
    #[must_use]
    pub fn new() -> Self {
        let mut tiles = Vec::with_capacity(TILE_CAPACITY);
        tiles.push(GuiTile::SETUP_REQUEST);
        Self {
            ints: Vec::new(),
            functions: Vec::with_capacity(FUNCTION_CAPACITY),
            tiles,
            peer: None,
            session: Session::default(),
        }
    }

    /// Register a function; returns its slot.
    pub fn register_function(
        &mut self,
        name: impl Into<String>,
        flags: i32,
    ) -> Result<u8, RegistryError> {
        check_capacity(self.functions.len(), FUNCTION_CAPACITY, StoreKind::Functions)?;
        check_capacity(self.tiles.len(), TILE_CAPACITY, StoreKind::Tiles)?;

        let index = slot(self.functions.len());
        self.functions.push(FirmwareFunction {
            index,
            name: name.into(),
            flags,
        });
        self.tiles.push(GuiTile {
            kind: TileKind::Function,
            ref_index: index,
            layout: TileLayout::from_flags(function_layout_bits(flags)),
        });
        self.session.record_setup();
        Ok(index)
    }

    /// Register an integer variable; returns its slot.
    pub fn register_int_variable(
        &mut self,
        value: i32,
        min: i32,
        max: i32,
        flags: u32,
        name: impl Into<String>,
    ) -> Result<u8, RegistryError> {
        check_capacity(self.ints.len(), INT_CAPACITY, StoreKind::IntVariables)?;
        check_capacity(self.tiles.len(), TILE_CAPACITY, StoreKind::Tiles)?;

        let index = slot(self.ints.len());
        self.ints.push(IntVariable {
            index,
            value,
            min,
            max,
            flags,
            name: name.into(),
        });
        self.tiles.push(GuiTile {
            kind: TileKind::IntVariable,
            ref_index: index,
            layout: TileLayout::from_flags(flags),
        });
        self.session.record_setup();
        Ok(index)
    }

    /// Overwrite `values.len()` consecutive variables starting at `start`.
    ///
    /// All-or-nothing: an update that runs past the registered variables changes nothing.
    pub fn update_int(&mut self, start: usize, values: &[i32]) -> Result<(), RegistryError> {
        let count = self.ints.len();
        let end = start
            .checked_add(values.len())
            .filter(|end| *end <= count)
            .ok_or(RegistryError::Range {
                start,
                len: values.len(),
                count,
            })?;

        for (var, value) in self.ints[start..end].iter_mut().zip(values) {
            var.value = *value;
        }
        Ok(())
    }

    /// Drop every registered object and return the session to `Idle`. Only the peer
    /// endpoint survives.
    pub fn reset(&mut self) {
        self.session.clear();
        self.ints.clear();
        self.functions.clear();
        self.tiles.clear();
        self.tiles.push(GuiTile::SETUP_REQUEST);
        Metrics::record_reset();
    }

    /// Copy of the current state for the presentation layer.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            tiles: self.tiles.clone(),
            ints: self.ints.clone(),
            functions: self.functions.clone(),
            peer: self.peer,
            session: self.session.state(),
        }
    }

    /// Record the most recent sender.
    pub fn set_peer(&mut self, peer: SocketAddr) {
        self.peer = Some(peer);
    }

    /// Forget the current peer.
    pub fn clear_peer(&mut self) {
        self.peer = None;
    }

    /// Current peer, if any device has been heard from.
    #[must_use]
    pub const fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Registered integer variables.
    #[must_use]
    pub fn int_count(&self) -> usize {
        self.ints.len()
    }

    /// Registered functions.
    #[must_use]
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Tiles, including the setup tile.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Variable at `index`.
    #[must_use]
    pub fn int_variable(&self, index: usize) -> Option<&IntVariable> {
        self.ints.get(index)
    }

    /// Function at `index`.
    #[must_use]
    pub fn function(&self, index: usize) -> Option<&FirmwareFunction> {
        self.functions.get(index)
    }

    /// Current handshake state.
    #[must_use]
    pub const fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub(crate) fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn check_capacity(len: usize, capacity: usize, store: StoreKind) -> Result<(), RegistryError> {
    if len >= capacity {
        return Err(RegistryError::Capacity { store, capacity });
    }
    Ok(())
}

#[allow(clippy::cast_sign_loss)]
const fn function_layout_bits(flags: i32) -> u32 {
    flags as u32
}

// Capacities never exceed 256, so every slot fits in a byte.
#[allow(clippy::cast_possible_truncation)]
const fn slot(len: usize) -> u8 {
    len as u8
}

/// Point-in-time copy of a [`Registry`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegistrySnapshot {
    /// Tiles in display order
    pub tiles: Vec<GuiTile>,
    /// Integer variables by slot
    pub ints: Vec<IntVariable>,
    /// Functions by slot
    pub functions: Vec<FirmwareFunction>,
    /// Current peer
    pub peer: Option<SocketAddr>,
    /// Handshake state
    pub session: SessionState,
}

/// Remote object a tile refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileTarget<'a> {
    /// Function tile
    Function(&'a FirmwareFunction),
    /// Variable tile
    IntVariable(&'a IntVariable),
    /// The built-in setup tile
    SetupRequest,
}

impl RegistrySnapshot {
    /// Resolve a tile against the typed stores.
    #[must_use]
    pub fn target(&self, tile: &GuiTile) -> Option<TileTarget<'_>> {
        let index = usize::from(tile.ref_index);
        match tile.kind {
            TileKind::Function => self.functions.get(index).map(TileTarget::Function),
            TileKind::IntVariable => self.ints.get(index).map(TileTarget::IntVariable),
            TileKind::SetupRequest => Some(TileTarget::SetupRequest),
        }
    }

    /// Tiles paired with the objects they display, in display order.
    pub fn resolved_tiles(&self) -> impl Iterator<Item = (&GuiTile, TileTarget<'_>)> {
        self.tiles
            .iter()
            .filter_map(|tile| self.target(tile).map(|target| (tile, target)))
    }
}

/// Registry shared between the worker threads and the presentation layer.
///
/// One mutex guards the stores, the peer endpoint and the session together.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl SharedRegistry {
    /// Wrap a fresh registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the registry. A poisoned lock is recovered, since every mutation is
    /// all-or-nothing.
    pub fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.lock().snapshot()
    }

    /// Current peer.
    #[must_use]
    pub fn peer(&self) -> Option<SocketAddr> {
        self.lock().peer()
    }

    /// Current handshake state.
    #[must_use]
    pub fn session_state(&self) -> SessionState {
        self.lock().session_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invariant(registry: &Registry) {
        assert_eq!(
            registry.tile_count(),
            registry.int_count() + registry.function_count() + 1
        );
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.tiles[0].kind, TileKind::SetupRequest);
        for tile in &snapshot.tiles {
            assert!(snapshot.target(tile).is_some(), "dangling tile {tile:?}");
        }
    }

    #[test]
    fn test_new_registry() {
        let registry = Registry::new();
        assert_eq!(registry.tile_count(), 1);
        assert_eq!(registry.int_count(), 0);
        assert_eq!(registry.function_count(), 0);
        assert_eq!(registry.session_state(), SessionState::Idle);
        assert_invariant(&registry);
    }

    #[test]
    fn test_register_function() {
        let mut registry = Registry::new();
        let index = registry.register_function("Ping", 0).unwrap();

        assert_eq!(index, 0);
        assert_eq!(
            registry.function(0),
            Some(&FirmwareFunction {
                index: 0,
                name: "Ping".to_owned(),
                flags: 0,
            })
        );
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.tiles[1].kind, TileKind::Function);
        assert_eq!(snapshot.tiles[1].ref_index, 0);
        assert_eq!(registry.tile_count(), 2);
        assert_eq!(registry.session_state(), SessionState::Populated);
    }

    #[test]
    fn test_slots_follow_arrival_order() {
        let mut registry = Registry::new();
        registry.register_int_variable(1, 0, 10, 0, "a").unwrap();
        registry.register_function("f", 0).unwrap();
        registry.register_int_variable(2, 0, 10, 0xDE32_0F00, "b").unwrap();

        let snapshot = registry.snapshot();
        let kinds: Vec<_> = snapshot.tiles.iter().map(|t| (t.kind, t.ref_index)).collect();
        assert_eq!(
            kinds,
            vec![
                (TileKind::SetupRequest, 0),
                (TileKind::IntVariable, 0),
                (TileKind::Function, 0),
                (TileKind::IntVariable, 1),
            ]
        );
        assert_eq!(snapshot.tiles[3].layout.x, 13);
        assert_invariant(&registry);
    }

    #[test]
    fn test_update_int() {
        let mut registry = Registry::new();
        registry.register_int_variable(10, 0, 100, 0, "Speed").unwrap();
        registry.update_int(0, &[42]).unwrap();
        assert_eq!(registry.int_variable(0).unwrap().value, 42);
    }

    #[test]
    fn test_update_int_out_of_range_is_atomic() {
        let mut registry = Registry::new();
        registry.register_int_variable(1, 0, 100, 0, "a").unwrap();
        registry.register_int_variable(2, 0, 100, 0, "b").unwrap();
        let before = registry.snapshot();

        let err = registry.update_int(1, &[7, 8]).unwrap_err();
        assert_eq!(
            err,
            RegistryError::Range {
                start: 1,
                len: 2,
                count: 2,
            }
        );
        assert_eq!(registry.snapshot(), before);

        assert!(registry.update_int(usize::MAX, &[1]).is_err());
        assert_eq!(registry.snapshot(), before);
    }

    #[test]
    fn test_update_empty_run() {
        let mut registry = Registry::new();
        registry.update_int(0, &[]).unwrap();
        assert!(registry.update_int(1, &[]).is_err());
    }

    #[test]
    fn test_function_capacity() {
        let mut registry = Registry::new();
        for i in 0..FUNCTION_CAPACITY {
            registry.register_function(format!("f{i}"), 0).unwrap();
        }
        let before = registry.snapshot();
        let err = registry.register_function("overflow", 0).unwrap_err();
        assert_eq!(
            err,
            RegistryError::Capacity {
                store: StoreKind::Functions,
                capacity: FUNCTION_CAPACITY,
            }
        );
        assert_eq!(registry.snapshot(), before);
    }

    #[test]
    fn test_tile_capacity_bounds_variables() {
        let mut registry = Registry::new();
        for i in 0..TILE_CAPACITY - 1 {
            registry.register_int_variable(0, 0, 0, 0, format!("v{i}")).unwrap();
        }
        let err = registry.register_int_variable(0, 0, 0, 0, "x").unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Capacity {
                store: StoreKind::Tiles,
                ..
            }
        ));
        assert_invariant(&registry);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut registry = Registry::new();
        let peer: SocketAddr = "192.168.1.50:55555".parse().unwrap();
        registry.set_peer(peer);
        registry.register_function("Ping", 0).unwrap();
        registry.register_int_variable(1, 0, 1, 0, "v").unwrap();

        registry.reset();
        assert_eq!(registry.tile_count(), 1);
        assert_eq!(registry.int_count(), 0);
        assert_eq!(registry.function_count(), 0);
        assert_eq!(registry.peer(), Some(peer));
        let once = registry.snapshot();

        registry.reset();
        assert_eq!(registry.snapshot(), once);
        assert_invariant(&registry);
    }

    #[test]
    fn test_reset_leaves_session_idle() {
        let mut registry = Registry::new();
        registry.register_function("Ping", 0).unwrap();
        assert_eq!(registry.session_state(), SessionState::Populated);

        registry.reset();
        assert_eq!(registry.function_count(), 0);
        assert_eq!(registry.session_state(), SessionState::Idle);
        assert_eq!(registry.snapshot().session, SessionState::Idle);

        registry.session_mut().request_setup(std::time::Instant::now());
        registry.reset();
        assert_eq!(registry.session_state(), SessionState::Idle);
    }

    #[test]
    fn test_shared_registry_snapshot_is_detached() {
        let shared = SharedRegistry::new();
        shared.lock().register_int_variable(5, 0, 9, 0, "v").unwrap();
        let snapshot = shared.snapshot();
        shared.lock().update_int(0, &[6]).unwrap();
        assert_eq!(snapshot.ints[0].value, 5);
        assert_eq!(shared.snapshot().ints[0].value, 6);
    }

    #[test]
    fn test_concurrent_registration_keeps_counts() {
        let shared = SharedRegistry::new();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for i in 0..20 {
                        shared
                            .lock()
                            .register_int_variable(i, 0, 100, 0, format!("t{t}-{i}"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let registry = shared.lock();
        assert_eq!(registry.int_count(), 80);
        for (slot, var) in registry.snapshot().ints.iter().enumerate() {
            assert_eq!(usize::from(var.index), slot);
        }
        assert_invariant(&registry);
    }
}
