use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxConfig {
    pub influx: InfluxSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxSettings {
    pub host: String,
    pub token: String,
    pub database: String,
    pub retention_policy: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExplorerConfig {
    #[serde(default)]
    pub point_budget: PointBudgetSettings,
}

/// Bounds for the duration-proportional auto point budget.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PointBudgetSettings {
    #[serde(default = "default_min_auto_points")]
    pub min_auto_points: i64,
    #[serde(default = "default_max_auto_points")]
    pub max_auto_points: i64,
    #[serde(default = "default_points_per_second")]
    pub points_per_second: i64,
}

fn default_min_auto_points() -> i64 {
    500
}

fn default_max_auto_points() -> i64 {
    5_000
}

fn default_points_per_second() -> i64 {
    4
}

impl Default for PointBudgetSettings {
    fn default() -> Self {
        Self {
            min_auto_points: default_min_auto_points(),
            max_auto_points: default_max_auto_points(),
            points_per_second: default_points_per_second(),
        }
    }
}

pub fn load_influx_config() -> anyhow::Result<InfluxConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/influx"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Explorer tuning is optional; absent file means defaults throughout.
pub fn load_explorer_config() -> anyhow::Result<ExplorerConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/explorer").required(false))
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_budget_defaults() {
        let budget = PointBudgetSettings::default();
        assert_eq!(budget.min_auto_points, 500);
        assert_eq!(budget.max_auto_points, 5_000);
        assert_eq!(budget.points_per_second, 4);
    }

    #[test]
    fn test_partial_budget_toml_fills_defaults() {
        let config: ExplorerConfig =
            toml::from_str("[point_budget]\nmax_auto_points = 2000\n").unwrap();
        assert_eq!(config.point_budget.max_auto_points, 2_000);
        assert_eq!(config.point_budget.min_auto_points, 500);
    }
}
