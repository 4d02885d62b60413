use crate::binding_model::ResourceCategory;

/// Re-derive the slot ranges from scratch after every slot write and abort on divergence.
pub const VALIDATE_RANGES_ENV: &str = "D3D11_BINDINGS_VALIDATE_RANGES";

/// Validate `u#` slots against the D3D11.1 register count (64) instead of D3D11.0's (8).
pub const UAV_SLOTS_11_1_ENV: &str = "D3D11_BINDINGS_UAV_SLOTS_11_1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Brute-force check of the range list after every slot write. Costs a full slot-array scan
    /// per write; intended for debug builds and tests.
    pub validate_ranges: bool,
    /// Reject reflected parameters bound past the per-stage register count.
    pub enforce_slot_limits: bool,
    /// Use the D3D11.1 UAV register count when enforcing limits.
    pub d3d11_1_uavs: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            validate_ranges: cfg!(debug_assertions),
            enforce_slot_limits: true,
            d3d11_1_uavs: false,
        }
    }
}

impl TrackerConfig {
    /// [`TrackerConfig::default`] with overrides from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if env_var_truthy(VALIDATE_RANGES_ENV) {
            config.validate_ranges = true;
        }
        if env_var_truthy(UAV_SLOTS_11_1_ENV) {
            config.d3d11_1_uavs = true;
        }
        config
    }

    /// Slot limit to enforce for `category`, or `None` when limits are disabled.
    pub fn slot_limit(&self, category: ResourceCategory) -> Option<u32> {
        self.enforce_slot_limits
            .then(|| category.slot_limit(self.d3d11_1_uavs))
    }
}

fn env_var_truthy(name: &str) -> bool {
    let Ok(raw) = std::env::var(name) else {
        return false;
    };

    let v = raw.trim();
    v == "1"
        || v.eq_ignore_ascii_case("true")
        || v.eq_ignore_ascii_case("yes")
        || v.eq_ignore_ascii_case("on")
}
