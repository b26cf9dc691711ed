//! Session-scoped setting overrides.
//!
//! A small, explicitly threaded struct rather than a process-global map:
//! values set here win over the persisted configuration when a request is
//! assembled, live only for the current run, and are never written back.
//! The allow-list of tunable parameters is fixed; anything else is a
//! validation error.

use anyhow::{bail, Result};

/// Parameters a user may override with `!settings <param> <value>`.
const ALLOWED_PARAMS: &[(&str, &str)] = &[("temperature", "float")];

#[derive(Debug, Default, Clone)]
pub struct SessionSettings {
    temperature: Option<f64>,
}

impl SessionSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and apply one override. The error message names the
    /// offending parameter or the expected type.
    pub fn set(&mut self, param: &str, value: &str) -> Result<()> {
        match param {
            "temperature" => {
                let parsed: f64 = value.parse().map_err(|_| {
                    anyhow::anyhow!("Invalid value for 'temperature'. Expected a float.")
                })?;
                self.temperature = Some(parsed);
                Ok(())
            }
            other => bail!(
                "Unknown parameter '{}'. Allowed parameters are: {}",
                other,
                ALLOWED_PARAMS
                    .iter()
                    .map(|(name, _)| *name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    /// Session temperature, falling back to the configured default.
    pub fn temperature_or(&self, configured: f64) -> f64 {
        self.temperature.unwrap_or(configured)
    }

    pub fn allowed_params() -> impl Iterator<Item = &'static str> {
        ALLOWED_PARAMS.iter().map(|(name, _)| *name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_temperature() {
        let mut settings = SessionSettings::new();
        settings.set("temperature", "0.2").unwrap();
        assert!((settings.temperature_or(0.7) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_default_falls_back_to_config() {
        let settings = SessionSettings::new();
        assert!((settings.temperature_or(0.7) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_param_rejected() {
        let mut settings = SessionSettings::new();
        let err = settings.set("top_p", "0.9").unwrap_err();
        assert!(err.to_string().contains("Unknown parameter 'top_p'"));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let mut settings = SessionSettings::new();
        let err = settings.set("temperature", "warm").unwrap_err();
        assert!(err.to_string().contains("Expected a float"));
        // Failed set must not clobber the previous value
        assert!((settings.temperature_or(0.7) - 0.7).abs() < 1e-9);
    }
}
