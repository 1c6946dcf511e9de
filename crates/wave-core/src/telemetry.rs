//! The compiler's "unified field" bookkeeping.
//!
//! Everything in this module is cosmetic: it is populated from an
//! optional `unified{}` block and from fixed startup constants, and it
//! feeds the human-readable report the CLI prints after a successful
//! build. None of it is read by `crate::encode` or `crate::driver` when
//! deciding what bytes to emit — an image compiled with a `unified{}`
//! block and one compiled without it are byte-identical.

/// The three `i`/`e`/`r` fields a `unified{}` block can set, each clamped
/// to `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnifiedField {
    pub i: f64,
    pub e: f64,
    pub r: f64,
}

impl Default for UnifiedField {
    fn default() -> Self {
        UnifiedField {
            i: 0.5,
            e: 0.5,
            r: 0.5,
        }
    }
}

impl UnifiedField {
    pub fn set(&mut self, field: &str, value: f64) {
        let clamped = value.clamp(0.0, 1.0);
        match field {
            "i" => self.i = clamped,
            "e" => self.e = clamped,
            "r" => self.r = clamped,
            _ => {}
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemoryPool {
    pub base: u64,
    pub size: u64,
    pub used: u64,
    pub purpose: String,
}

#[derive(Debug, Clone, Default)]
pub struct TileManager {
    pools: Vec<MemoryPool>,
}

impl TileManager {
    pub fn add_pool(&mut self, base: u64, size: u64, purpose: &str) {
        self.pools.push(MemoryPool {
            base,
            size,
            used: 0,
            purpose: purpose.to_string(),
        });
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    pub fn total_used(&self) -> u64 {
        self.pools.iter().map(|p| p.used).sum()
    }

    pub fn total_capacity(&self) -> u64 {
        self.pools.iter().map(|p| p.size).sum()
    }

    pub fn pools(&self) -> &[MemoryPool] {
        &self.pools
    }
}

/// Accumulates a running "learned" history and a per-tick marginal score.
/// `on` mirrors the `fate on`/`fate off` statements; ticking while off is
/// a no-op.
#[derive(Debug, Clone)]
pub struct FateScheduler {
    pub on: bool,
    pub ticks: u64,
    pub marginal_threshold: f64,
    pub field: UnifiedField,
    learned: Vec<(String, f64)>,
}

impl Default for FateScheduler {
    fn default() -> Self {
        FateScheduler {
            on: true,
            ticks: 0,
            marginal_threshold: 0.1,
            field: UnifiedField::default(),
            learned: Vec::new(),
        }
    }
}

impl FateScheduler {
    pub fn tick(&mut self, tile: &TileManager) {
        if !self.on {
            return;
        }
        self.ticks += 1;
        let occupancy = if tile.total_capacity() > 0 {
            tile.total_used() as f64 / tile.total_capacity() as f64
        } else {
            0.0
        };
        if occupancy > self.marginal_threshold {
            self.learned.push(("occupancy".to_string(), occupancy));
        }
    }

    pub fn learned_count(&self) -> usize {
        self.learned.len()
    }

    /// Dynamic score reported alongside the static `marginal_threshold`.
    pub fn dynamic_score(&self) -> f64 {
        if self.learned.is_empty() {
            0.0
        } else {
            self.learned.iter().map(|(_, v)| v).sum::<f64>() / self.learned.len() as f64
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Platform {
    pub id: u32,
    pub syscall_base: u64,
}

impl Platform {
    /// Assigns an id the way `FateScheduler::tick` assigns weight: purely
    /// cosmetic, derived from a fixed constant rather than real probing.
    /// Wave targets Linux x86-64 only, the one branch of the reference's
    /// platform switch whose `syscall_base` is `0`.
    pub fn probe() -> Self {
        Platform {
            id: 1,
            syscall_base: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Telemetry {
    pub tiles: TileManager,
    pub fate: FateScheduler,
    pub platform: Platform,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    pub fn new() -> Self {
        let mut tiles = TileManager::default();
        tiles.add_pool(0x10000, 0x10000, "blackhole");
        tiles.add_pool(0x20000, 0x10000, "meshbrain");
        tiles.add_pool(0x30000, 0x10000, "multinova");
        tiles.add_pool(0x40000, 0x10000, "baseforce");
        Telemetry {
            tiles,
            fate: FateScheduler::default(),
            platform: Platform::probe(),
        }
    }

    /// Called once per compiled statement so the report has something to
    /// show; does not affect codegen.
    pub fn observe_statement(&mut self) {
        for pool in self.tiles.pools.iter_mut() {
            pool.used = (pool.used + 64).min(pool.size);
        }
        self.fate.tick(&self.tiles);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unified_field_clamps_to_unit_interval() {
        let mut f = UnifiedField::default();
        f.set("i", 5.0);
        f.set("e", -3.0);
        assert_eq!(f.i, 1.0);
        assert_eq!(f.e, 0.0);
    }

    #[test]
    fn new_telemetry_has_four_pools() {
        let t = Telemetry::new();
        assert_eq!(t.tiles.pool_count(), 4);
    }

    #[test]
    fn fate_off_does_not_tick() {
        let mut t = Telemetry::new();
        t.fate.on = false;
        t.observe_statement();
        assert_eq!(t.fate.ticks, 0);
    }

    #[test]
    fn observing_statements_never_touches_code_bytes() {
        // telemetry has no reference to ByteBuffer/Emitter at all; this
        // test documents the invariant rather than exercising it.
        let mut t = Telemetry::new();
        for _ in 0..10 {
            t.observe_statement();
        }
        assert!(t.tiles.total_used() > 0);
    }
}
