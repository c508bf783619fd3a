use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricKind {
    #[default]
    Gauge,
    Counter,
}

impl MetricKind {
    pub fn as_prometheus_type(&self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Counter => "counter",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObservationValue {
    Bool(bool),
    Integer(u64),
    Float(f64),
}

impl ObservationValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Bool(value) => f64::from(u8::from(*value)),
            Self::Integer(value) => *value as f64,
            Self::Float(value) => *value,
        }
    }
}

impl From<bool> for ObservationValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u64> for ObservationValue {
    fn from(value: u64) -> Self {
        Self::Integer(value)
    }
}

impl From<usize> for ObservationValue {
    fn from(value: usize) -> Self {
        Self::Integer(value as u64)
    }
}

impl From<f64> for ObservationValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Label sets compare as unordered maps; `BTreeMap` keeps rendering stable.
pub type Labels = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub name: String,
    pub value: ObservationValue,
    pub kind: MetricKind,
    pub labels: Labels,
    pub help_text: String,
}

impl Observation {
    pub fn new(name: impl Into<String>, value: impl Into<ObservationValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind: MetricKind::Gauge,
            labels: Labels::new(),
            help_text: String::new(),
        }
    }

    pub fn with_kind(mut self, kind: MetricKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_help(mut self, help_text: impl Into<String>) -> Self {
        self.help_text = help_text.into();
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_labels(mut self, labels: &Labels) -> Self {
        self.labels
            .extend(labels.iter().map(|(key, value)| (key.clone(), value.clone())));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: Labels,
    pub value: ObservationValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub samples: Vec<Sample>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_observation_defaults_to_unlabelled_gauge() {
        let observation = Observation::new("test_metric", 10_u64);

        assert_eq!(observation.name, "test_metric");
        assert_eq!(observation.value, ObservationValue::Integer(10));
        assert!(observation.labels.is_empty());
        assert_eq!(observation.help_text, "");
        assert_eq!(observation.kind, MetricKind::Gauge);
    }

    #[test]
    fn label_insertion_order_does_not_matter() {
        let left = Observation::new("m", true)
            .with_label("status", "uploading")
            .with_label("category", "Movies");
        let right = Observation::new("m", true)
            .with_label("category", "Movies")
            .with_label("status", "uploading");

        assert_eq!(left, right);
    }

    #[test]
    fn booleans_convert_to_zero_or_one() {
        assert_eq!(ObservationValue::Bool(true).as_f64(), 1.0);
        assert_eq!(ObservationValue::Bool(false).as_f64(), 0.0);
        assert_eq!(ObservationValue::Integer(7).as_f64(), 7.0);
    }
}
