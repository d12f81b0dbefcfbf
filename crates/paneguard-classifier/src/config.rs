//! Tunable thresholds for [`classify`](crate::classify::classify).

/// Configuration for the output classifier.
///
/// Constructed via [`ClassifierConfig::builder`], mirroring the builder
/// convention used by every other component crate in the workspace.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    context_low_threshold: f64,
    sample_length: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            context_low_threshold: 0.20,
            sample_length: 4096,
        }
    }
}

impl ClassifierConfig {
    pub fn builder() -> ClassifierConfigBuilder {
        ClassifierConfigBuilder::default()
    }

    /// Fraction of context remaining (0.0-1.0) at or below which
    /// `is_context_low` is set.
    pub fn context_low_threshold(&self) -> f64 {
        self.context_low_threshold
    }

    /// Maximum length, in bytes, of the `raw_sample` retained on the
    /// classification result. Longer input is truncated from the tail,
    /// keeping the most recent output.
    pub fn sample_length(&self) -> usize {
        self.sample_length
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClassifierConfigBuilder {
    context_low_threshold: Option<f64>,
    sample_length: Option<usize>,
}

impl ClassifierConfigBuilder {
    pub fn context_low_threshold(mut self, value: f64) -> Self {
        self.context_low_threshold = Some(value);
        self
    }

    pub fn sample_length(mut self, value: usize) -> Self {
        self.sample_length = Some(value);
        self
    }

    pub fn build(self) -> ClassifierConfig {
        let defaults = ClassifierConfig::default();
        ClassifierConfig {
            context_low_threshold: self
                .context_low_threshold
                .unwrap_or(defaults.context_low_threshold),
            sample_length: self.sample_length.unwrap_or(defaults.sample_length),
        }
    }
}
