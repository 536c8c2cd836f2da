use crate::error::{PortfolioError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_TOP_N: usize = 7;
pub const DEFAULT_AMOUNT_SCALE: f64 = 1_000_000.0;

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_amount_scale() -> f64 {
    DEFAULT_AMOUNT_SCALE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineConfig {
    #[serde(default)]
    #[schemars(
        description = "Virtual regions that do not appear in the data, mapped to the fixed list of country codes they stand for."
    )]
    pub composite_regions: BTreeMap<String, Vec<String>>,

    #[serde(default = "default_top_n")]
    #[schemars(description = "Number of sectors kept under their own label in stacked views")]
    pub top_n: usize,

    #[serde(default = "default_amount_scale")]
    #[schemars(
        description = "Divisor applied to USD amounts before the amount-range filter (1e6 = millions)"
    )]
    pub amount_scale: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            composite_regions: BTreeMap::new(),
            top_n: DEFAULT_TOP_N,
            amount_scale: DEFAULT_AMOUNT_SCALE,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.amount_scale.is_finite() || self.amount_scale <= 0.0 {
            return Err(PortfolioError::InvalidConfig(format!(
                "amount_scale must be a positive number, got {}",
                self.amount_scale
            )));
        }

        for (name, countries) in &self.composite_regions {
            if name.trim().is_empty() {
                return Err(PortfolioError::InvalidConfig(
                    "composite region with an empty name".to_string(),
                ));
            }
            if countries.is_empty() {
                return Err(PortfolioError::InvalidConfig(format!(
                    "composite region '{}' lists no countries",
                    name
                )));
            }
        }

        Ok(())
    }

    pub fn with_composite_region(mut self, name: &str, countries: &[&str]) -> Self {
        self.composite_regions.insert(
            name.to_string(),
            countries.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    /// Country codes of a composite region, if `region` names one.
    pub fn composite_countries(&self, region: &str) -> Option<&[String]> {
        self.composite_regions.get(region).map(|v| v.as_slice())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(PipelineConfig)
    }
}
