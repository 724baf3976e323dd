//! Tax level, blessings and the global morale multiplier.

use serde::{Deserialize, Serialize};

/// Tax setting applied on every income cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum TaxLevel {
    /// No tax.
    None,
    /// Low tax.
    Low,
    /// Normal tax.
    #[default]
    Normal,
    /// High tax.
    High,
    /// Very high tax.
    VeryHigh,
}

impl TaxLevel {
    /// All levels in ascending order.
    pub const ALL: [Self; 5] = [Self::None, Self::Low, Self::Normal, Self::High, Self::VeryHigh];

    /// Level from its index `0..=4`.
    #[must_use]
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    /// Gold per worker per income cycle.
    #[must_use]
    pub const fn gold_per_worker(self) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Low => 5.0,
            Self::Normal => 10.0,
            Self::High => 15.0,
            Self::VeryHigh => 20.0,
        }
    }

    /// Base morale change per income cycle.
    #[must_use]
    pub const fn morale_change(self) -> f64 {
        match self {
            Self::None => 0.20,
            Self::Low => 0.08,
            Self::Normal => 0.0,
            Self::High => -0.08,
            Self::VeryHigh => -0.12,
        }
    }
}

/// Morale tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoraleConfig {
    /// Seconds between income payouts.
    pub income_cycle: f64,
    /// Lower morale bound.
    pub min: f64,
    /// Upper morale bound.
    pub max: f64,
    /// Morale added while a blessing is active.
    pub blessing_bonus: f64,
    /// Seconds a blessing lasts.
    pub blessing_duration: f64,
    /// Seconds after a blessing before the next one.
    pub blessing_cooldown: f64,
}

impl Default for MoraleConfig {
    fn default() -> Self {
        Self {
            income_cycle: 40.0,
            min: 0.25,
            max: 3.0,
            blessing_bonus: 0.3,
            blessing_duration: 180.0,
            blessing_cooldown: 180.0,
        }
    }
}

/// Colony morale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Morale {
    config: MoraleConfig,
    tax: TaxLevel,
    base: f64,
    income_timer: f64,
    blessing_left: f64,
    cooldown_left: f64,
}

impl Default for Morale {
    fn default() -> Self {
        Self::new(MoraleConfig::default())
    }
}

impl Morale {
    /// Neutral morale at the normal tax level.
    #[must_use]
    pub fn new(config: MoraleConfig) -> Self {
        Self {
            config,
            tax: TaxLevel::default(),
            base: 1.0,
            income_timer: 0.0,
            blessing_left: 0.0,
            cooldown_left: 0.0,
        }
    }

    /// Current tax level.
    #[must_use]
    pub const fn tax_level(&self) -> TaxLevel {
        self.tax
    }

    /// Change the tax level.
    pub fn set_tax_level(&mut self, level: TaxLevel) {
        self.tax = level;
    }

    /// Morale before blessing.
    #[must_use]
    pub const fn base(&self) -> f64 {
        self.base
    }

    /// Whether a blessing is in effect.
    #[must_use]
    pub fn is_blessed(&self) -> bool {
        self.blessing_left > 0.0
    }

    /// Whether [`Morale::bless`] would succeed.
    #[must_use]
    pub fn can_bless(&self) -> bool {
        self.cooldown_left <= 0.0
    }

    /// Start a blessing. Returns `false` while on cooldown.
    pub fn bless(&mut self) -> bool {
        if !self.can_bless() {
            return false;
        }
        self.blessing_left = self.config.blessing_duration;
        self.cooldown_left = self.config.blessing_cooldown;
        true
    }

    /// Effective multiplier fed to eat/rest regeneration.
    #[must_use]
    pub fn multiplier(&self) -> f64 {
        let bonus = if self.is_blessed() {
            self.config.blessing_bonus
        } else {
            0.0
        };
        (self.base + bonus).clamp(self.config.min, self.config.max)
    }

    /// Advance by `dt` seconds with `workers` taxable workers.
    ///
    /// Returns the gold collected.
    pub fn tick(&mut self, dt: f64, workers: usize) -> f64 {
        self.blessing_left = (self.blessing_left - dt).max(0.0);
        self.cooldown_left = (self.cooldown_left - dt).max(0.0);

        if self.config.income_cycle <= 0.0 {
            return 0.0;
        }
        let mut income = 0.0;
        self.income_timer += dt;
        while self.income_timer >= self.config.income_cycle {
            self.income_timer -= self.config.income_cycle;
            income += self.tax.gold_per_worker() * workers as f64;
            self.base = (self.base + self.tax.morale_change()).clamp(self.config.min, self.config.max);
        }
        income
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_income_every_cycle() {
        let mut morale = Morale::default();
        let mut gold = 0.0;
        for _ in 0..39 {
            gold += morale.tick(1.0, 10);
        }
        assert_eq!(gold, 0.0);
        gold += morale.tick(1.0, 10);
        assert_eq!(gold, 100.0);
        assert_eq!(morale.base(), 1.0);
    }

    #[test]
    fn test_tax_moves_base_within_bounds() {
        let mut morale = Morale::default();
        morale.set_tax_level(TaxLevel::VeryHigh);
        for _ in 0..20 {
            morale.tick(40.0, 1);
        }
        assert_eq!(morale.base(), 0.25);

        morale.set_tax_level(TaxLevel::None);
        for _ in 0..30 {
            morale.tick(40.0, 1);
        }
        assert_eq!(morale.base(), 3.0);
    }

    #[test]
    fn test_blessing_and_cooldown() {
        let mut morale = Morale::default();
        assert!(morale.bless());
        assert!((morale.multiplier() - 1.3).abs() < 1e-12);
        assert!(!morale.bless());

        morale.tick(179.0, 0);
        assert!(morale.is_blessed());
        morale.tick(1.0, 0);
        assert!(!morale.is_blessed());
        assert_eq!(morale.multiplier(), 1.0);
        assert!(morale.can_bless());
    }

    #[test]
    fn test_from_index() {
        assert_eq!(TaxLevel::from_index(0), Some(TaxLevel::None));
        assert_eq!(TaxLevel::from_index(4), Some(TaxLevel::VeryHigh));
        assert_eq!(TaxLevel::from_index(5), None);
    }
}
