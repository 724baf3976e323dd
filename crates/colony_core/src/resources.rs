//! Resource kinds, enum-indexed tables and the colony stockpile.

use serde::{Deserialize, Serialize};

/// Every resource the colony accounts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Currency from taxes and the bank.
    Gold,
    /// Raw wood from trees.
    Wood,
    /// Raw stone.
    Stone,
    /// Raw clay.
    Clay,
    /// Raw iron.
    Iron,
    /// Raw sulfur.
    Sulfur,
}

impl ResourceKind {
    /// All kinds in table order.
    pub const ALL: [Self; 6] = [
        Self::Gold,
        Self::Wood,
        Self::Stone,
        Self::Clay,
        Self::Iron,
        Self::Sulfur,
    ];

    /// Kinds that can be dug from deposits, shafts and mines.
    pub const MINABLE: [Self; 4] = [Self::Stone, Self::Clay, Self::Iron, Self::Sulfur];

    /// Position in [`ResourceKind::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Gold => 0,
            Self::Wood => 1,
            Self::Stone => 2,
            Self::Clay => 3,
            Self::Iron => 4,
            Self::Sulfur => 5,
        }
    }

    /// Whether this kind can be mined.
    #[must_use]
    pub const fn is_minable(self) -> bool {
        matches!(self, Self::Stone | Self::Clay | Self::Iron | Self::Sulfur)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Gold => "gold",
            Self::Wood => "wood",
            Self::Stone => "stone",
            Self::Clay => "clay",
            Self::Iron => "iron",
            Self::Sulfur => "sulfur",
        };
        f.write_str(name)
    }
}

/// Fixed-size table with one slot per [`ResourceKind`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceTable<T> {
    slots: [T; 6],
}

impl<T: Copy> ResourceTable<T> {
    /// Table with every slot set to `value`.
    #[must_use]
    pub const fn filled(value: T) -> Self {
        Self { slots: [value; 6] }
    }

    /// Iterate `(kind, value)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, T)> + '_ {
        ResourceKind::ALL.iter().map(|&k| (k, self.slots[k.index()]))
    }
}

impl<T> std::ops::Index<ResourceKind> for ResourceTable<T> {
    type Output = T;

    fn index(&self, kind: ResourceKind) -> &T {
        &self.slots[kind.index()]
    }
}

impl<T> std::ops::IndexMut<ResourceKind> for ResourceTable<T> {
    fn index_mut(&mut self, kind: ResourceKind) -> &mut T {
        &mut self.slots[kind.index()]
    }
}

/// Amounts of several resources, e.g. a building cost.
pub type ResourceAmounts = Vec<(ResourceKind, f64)>;

/// Colony-wide resource stock.
///
/// Raw goods come from serfs and mines; refined goods come out of refiners
/// and are tracked separately so a refiner never feeds its own input.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Stockpile {
    amounts: ResourceTable<f64>,
    refined: ResourceTable<f64>,
}

impl Stockpile {
    /// Empty stockpile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stockpile seeded with the given amounts.
    #[must_use]
    pub fn with_amounts(amounts: &[(ResourceKind, f64)]) -> Self {
        let mut stock = Self::new();
        for &(kind, amount) in amounts {
            stock.add(kind, amount);
        }
        stock
    }

    /// Current amount of a resource.
    #[must_use]
    pub fn get(&self, kind: ResourceKind) -> f64 {
        self.amounts[kind]
    }

    /// Add to a resource; negative input is ignored.
    pub fn add(&mut self, kind: ResourceKind, amount: f64) {
        if amount > 0.0 {
            self.amounts[kind] += amount;
        }
    }

    /// Take up to `amount`, returning what was actually taken.
    pub fn take(&mut self, kind: ResourceKind, amount: f64) -> f64 {
        let taken = amount.clamp(0.0, self.amounts[kind]);
        self.amounts[kind] -= taken;
        taken
    }

    /// Whether every listed amount is available.
    #[must_use]
    pub fn can_afford(&self, cost: &[(ResourceKind, f64)]) -> bool {
        cost.iter().all(|&(kind, amount)| self.amounts[kind] >= amount)
    }

    /// Deduct a cost if affordable. Returns `true` if the transaction succeeded.
    pub fn spend(&mut self, cost: &[(ResourceKind, f64)]) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        for &(kind, amount) in cost {
            self.amounts[kind] -= amount;
        }
        true
    }

    /// Refined amount of a resource.
    #[must_use]
    pub fn refined(&self, kind: ResourceKind) -> f64 {
        self.refined[kind]
    }

    /// Add refined output; negative input is ignored.
    pub fn add_refined(&mut self, kind: ResourceKind, amount: f64) {
        if amount > 0.0 {
            self.refined[kind] += amount;
        }
    }

    /// Raw amounts table.
    #[must_use]
    pub const fn table(&self) -> &ResourceTable<f64> {
        &self.amounts
    }

    /// Refined amounts table.
    #[must_use]
    pub const fn refined_table(&self) -> &ResourceTable<f64> {
        &self.refined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_all_order() {
        for (i, kind) in ResourceKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_take_is_capped() {
        let mut stock = Stockpile::with_amounts(&[(ResourceKind::Iron, 3.0)]);
        assert_eq!(stock.take(ResourceKind::Iron, 5.0), 3.0);
        assert_eq!(stock.get(ResourceKind::Iron), 0.0);
        assert_eq!(stock.take(ResourceKind::Iron, 1.0), 0.0);
    }

    #[test]
    fn test_spend_all_or_nothing() {
        let mut stock =
            Stockpile::with_amounts(&[(ResourceKind::Gold, 100.0), (ResourceKind::Wood, 5.0)]);
        let cost = vec![(ResourceKind::Gold, 50.0), (ResourceKind::Wood, 10.0)];
        assert!(!stock.spend(&cost));
        assert_eq!(stock.get(ResourceKind::Gold), 100.0);

        let cheap = vec![(ResourceKind::Gold, 50.0), (ResourceKind::Wood, 5.0)];
        assert!(stock.spend(&cheap));
        assert_eq!(stock.get(ResourceKind::Gold), 50.0);
        assert_eq!(stock.get(ResourceKind::Wood), 0.0);
    }
}
