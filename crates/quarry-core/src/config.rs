//! Translator configuration.

/// Parameter name used when a dynamic filter does not name one.
pub const DEFAULT_PARAMETER: &str = "x";

/// How `FieldByName` sort keys are resolved without a field mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameResolution {
    /// Look the name up in the entity shape and read it through `Entity::field`.
    #[default]
    Reflection,
    /// Refuse: every name-based key must go through a field mapper.
    MapperRequired,
}

/// Configuration shared by the translators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    pub name_resolution: NameResolution,

    /// Parameter name for dynamic filters built from bare text.
    pub default_parameter: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            name_resolution: NameResolution::default(),
            default_parameter: DEFAULT_PARAMETER.to_string(),
        }
    }
}

impl QueryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration that refuses name-based sorts without a mapper.
    pub fn strict() -> Self {
        Self {
            name_resolution: NameResolution::MapperRequired,
            ..Default::default()
        }
    }

    pub fn with_name_resolution(mut self, name_resolution: NameResolution) -> Self {
        self.name_resolution = name_resolution;
        self
    }

    pub fn with_default_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.default_parameter = parameter.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QueryConfig::default();
        assert_eq!(config.name_resolution, NameResolution::Reflection);
        assert_eq!(config.default_parameter, "x");

        let strict = QueryConfig::strict().with_default_parameter("p");
        assert_eq!(strict.name_resolution, NameResolution::MapperRequired);
        assert_eq!(strict.default_parameter, "p");
    }
}
