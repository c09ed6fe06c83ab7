use crate::sender::{Label, METRIC_NAME_LABEL};

pub const CLIENT_ID_LABEL: &str = "client_id";
pub const SHARD_LABEL: &str = "extra";
pub const POD_LABEL: &str = "pod";
pub const POD_NAME_ENV: &str = "POD_NAME";

/// Labels appended to every series a writer emits.
///
/// Insertion order is kept; setting a name twice replaces the earlier value
/// in place. Labels with empty values are dropped, matching how remote-write
/// receivers treat them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraLabels {
    labels: Vec<Label>,
}

impl ExtraLabels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if name.is_empty() || name == METRIC_NAME_LABEL {
            return;
        }
        if value.is_empty() {
            self.labels.retain(|l| l.name != name);
            return;
        }
        match self.labels.iter_mut().find(|l| l.name == name) {
            Some(existing) => existing.value = value,
            None => self.labels.push(Label { name, value }),
        }
    }

    /// Shard label distinguishing parallel writers (1-based index).
    pub fn shard(index: usize) -> Self {
        Self::new().with(SHARD_LABEL, index.to_string())
    }

    /// `pod` label taken from `POD_NAME` when the variable is set.
    pub fn from_env() -> Self {
        let mut labels = Self::new();
        if let Ok(pod) = std::env::var(POD_NAME_ENV) {
            labels.set(POD_LABEL, pod);
        }
        labels
    }

    pub fn extend(&mut self, other: ExtraLabels) {
        for label in other.labels {
            self.set(label.name, label.value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for ExtraLabels {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut labels = Self::new();
        for (name, value) in iter {
            labels.set(name, value);
        }
        labels
    }
}
