//! 配置校验模块
//!
//! 校验规则：
//! - worker_threads >= 1
//! - 插件目标尺寸（如设置）>= 1
//! - 日志级别非空，日志格式合法

use contracts::{ContractError, LoaderConfig};

const LOG_FORMATS: [&str; 3] = ["json", "pretty", "compact"];

/// 校验 LoaderConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &LoaderConfig) -> Result<(), ContractError> {
    validate_pool(config)?;
    validate_target(config)?;
    validate_observability(config)?;
    Ok(())
}

fn validate_pool(config: &LoaderConfig) -> Result<(), ContractError> {
    if config.loader.worker_threads == 0 {
        return Err(ContractError::config_validation(
            "loader.worker_threads",
            "worker_threads must be >= 1",
        ));
    }
    Ok(())
}

/// 校验插件目标尺寸
fn validate_target(config: &LoaderConfig) -> Result<(), ContractError> {
    let target = &config.plugins.target;
    for (field, value) in [
        ("plugins.max_width", target.max_width),
        ("plugins.max_height", target.max_height),
    ] {
        if value == Some(0) {
            return Err(ContractError::config_validation(
                field,
                "must be >= 1 when set (omit for unbounded)",
            ));
        }
    }
    Ok(())
}

fn validate_observability(config: &LoaderConfig) -> Result<(), ContractError> {
    let obs = &config.observability;

    if obs.log_level.trim().is_empty() {
        return Err(ContractError::config_validation(
            "observability.log_level",
            "log_level must not be empty",
        ));
    }

    if !LOG_FORMATS.contains(&obs.log_format.to_lowercase().as_str()) {
        return Err(ContractError::config_validation(
            "observability.log_format",
            format!(
                "unknown log_format '{}', expected one of {:?}",
                obs.log_format, LOG_FORMATS
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::TargetSize;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&LoaderConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_workers() {
        let mut config = LoaderConfig::default();
        config.loader.worker_threads = 0;
        let err = validate(&config).unwrap_err();
        assert!(
            matches!(err, ContractError::ConfigValidation { ref field, .. } if field == "loader.worker_threads")
        );
    }

    #[test]
    fn test_zero_target_dimension() {
        let mut config = LoaderConfig::default();
        config.plugins.target = TargetSize {
            max_width: Some(320),
            max_height: Some(0),
        };
        let err = validate(&config).unwrap_err();
        assert!(
            matches!(err, ContractError::ConfigValidation { ref field, .. } if field == "plugins.max_height")
        );
    }

    #[test]
    fn test_empty_log_level() {
        let mut config = LoaderConfig::default();
        config.observability.log_level = "  ".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_log_format() {
        let mut config = LoaderConfig::default();
        config.observability.log_format = "xml".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("xml"));
    }
}
