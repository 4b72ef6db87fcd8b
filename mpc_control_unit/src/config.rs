//! Configuration bundle loading.
//!
//! One TOML file carries every section (`[shared]`, `[mpc]`, `[solver]`,
//! `[simulation]`). Parsing rejects missing and unknown fields; all section
//! validators run before anything is returned.

use std::path::Path;

use mpc_common::config::{ConfigError, ConfigLoader, SharedConfig};
use mpc_common::mpc::config::{MpcConfig, MpcFileConfig, SimulationConfig, SolverConfig};
use tracing::debug;

/// Validated configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub shared: SharedConfig,
    /// Controller (and prediction model) parameters.
    pub mpc: MpcConfig,
    pub solver: SolverConfig,
    pub simulation: SimulationConfig,
}

/// Effective parameters of the simulated plant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlantSettings {
    pub gain: f64,
    pub time_constant: f64,
    pub dead_time: u32,
}

impl LoadedConfig {
    /// Plant parameters: the prediction model's, unless overridden in
    /// `[simulation.plant]`.
    pub fn plant(&self) -> PlantSettings {
        let over = &self.simulation.plant;
        PlantSettings {
            gain: over.gain.unwrap_or(self.mpc.gain),
            time_constant: over.time_constant.unwrap_or(self.mpc.time_constant),
            dead_time: over.dead_time.unwrap_or(self.mpc.dead_time),
        }
    }

    /// True when the plant differs from the prediction model.
    pub fn has_model_mismatch(&self) -> bool {
        let plant = self.plant();
        plant.gain != self.mpc.gain
            || plant.time_constant != self.mpc.time_constant
            || plant.dead_time != self.mpc.dead_time
    }
}

impl TryFrom<MpcFileConfig> for LoadedConfig {
    type Error = ConfigError;

    fn try_from(file: MpcFileConfig) -> Result<Self, Self::Error> {
        file.validate()?;
        Ok(Self {
            shared: file.shared,
            mpc: file.mpc,
            solver: file.solver,
            simulation: file.simulation,
        })
    }
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let file = MpcFileConfig::load(path)?;
    let loaded = LoadedConfig::try_from(file)?;
    debug!(path = %path.display(), "configuration loaded");
    Ok(loaded)
}

/// Parse and validate configuration text.
pub fn load_config_from_str(content: &str) -> Result<LoadedConfig, ConfigError> {
    LoadedConfig::try_from(MpcFileConfig::from_toml_str(content)?)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
[mpc]
gain = 3.0
time_constant = 5.0
dead_time = 1
prediction_horizon = 6
control_horizon = 3
control_period = 1.0
tracking_weight = 20.0
move_weight = 20.0
max_move = 2.0
disturbance_amplitude = 0.0
"#;

    #[test]
    fn plant_defaults_to_model() {
        let cfg = load_config_from_str(BASE).unwrap();
        assert_eq!(
            cfg.plant(),
            PlantSettings {
                gain: 3.0,
                time_constant: 5.0,
                dead_time: 1
            }
        );
        assert!(!cfg.has_model_mismatch());
    }

    #[test]
    fn plant_override_applies_per_field() {
        let text = format!("{BASE}\n[simulation.plant]\ndead_time = 3\n");
        let cfg = load_config_from_str(&text).unwrap();
        let plant = cfg.plant();
        assert_eq!(plant.dead_time, 3);
        assert_eq!(plant.gain, 3.0);
        assert!(cfg.has_model_mismatch());
    }

    #[test]
    fn validation_runs_on_load() {
        let text = BASE.replace("control_horizon = 3", "control_horizon = 7");
        assert!(matches!(
            load_config_from_str(&text),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn missing_file() {
        assert_eq!(
            load_config(Path::new("/nonexistent/mpc.toml")),
            Err(ConfigError::FileNotFound)
        );
    }
}
