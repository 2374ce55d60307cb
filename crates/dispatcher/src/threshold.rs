//! Per-sink minimum severities.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use event_core::{Severity, SinkKind};

use crate::error::DispatchError;

/// Which severities each sink is alerted for.
///
/// A sink missing from the table never receives alerts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdTable {
    minimums: BTreeMap<SinkKind, Severity>,
}

impl Default for ThresholdTable {
    /// Discord from moderate up, email from severe up.
    fn default() -> Self {
        Self::empty()
            .with(SinkKind::Discord, Severity::Moderate)
            .with(SinkKind::Email, Severity::Severe)
    }
}

impl ThresholdTable {
    /// No sink enabled.
    pub fn empty() -> Self {
        Self {
            minimums: BTreeMap::new(),
        }
    }

    pub fn with(mut self, sink: SinkKind, minimum: Severity) -> Self {
        self.minimums.insert(sink, minimum);
        self
    }

    pub fn without(mut self, sink: SinkKind) -> Self {
        self.minimums.remove(&sink);
        self
    }

    pub fn minimum(&self, sink: SinkKind) -> Option<Severity> {
        self.minimums.get(&sink).copied()
    }

    /// Whether `severity` crosses the threshold for `sink`.
    pub fn qualifies(&self, sink: SinkKind, severity: Severity) -> bool {
        self.minimum(sink).is_some_and(|min| severity >= min)
    }

    /// Sinks whose threshold `severity` crosses, in a stable order.
    pub fn sinks_for(&self, severity: Severity) -> Vec<SinkKind> {
        self.minimums
            .iter()
            .filter(|(_, min)| severity >= **min)
            .map(|(sink, _)| *sink)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SinkKind, Severity)> + '_ {
        self.minimums.iter().map(|(k, v)| (*k, *v))
    }
}

impl FromStr for ThresholdTable {
    type Err = DispatchError;

    /// Parse `discord:moderate,email:severe`. Severities may also be given
    /// as scores (`email:4`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut table = Self::empty();

        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (sink, severity) = entry.split_once(':').ok_or_else(|| {
                DispatchError::Config(format!("threshold entry {:?} is not sink:severity", entry))
            })?;

            let sink: SinkKind = sink
                .parse()
                .map_err(|e| DispatchError::Config(format!("{}", e)))?;

            let severity = severity.trim();
            let severity = match severity.parse::<i64>() {
                Ok(score) => Severity::from_score(score).ok_or_else(|| {
                    DispatchError::Config(format!("severity score {} is outside 1-5", score))
                })?,
                Err(_) => severity
                    .parse::<Severity>()
                    .map_err(|e| DispatchError::Config(format!("{}", e)))?,
            };

            table.minimums.insert(sink, severity);
        }

        Ok(table)
    }
}

impl fmt::Display for ThresholdTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(sink, min)| format!("{}:{}", sink, min))
            .collect();
        f.write_str(&parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let table = ThresholdTable::default();
        assert_eq!(table.to_string(), "discord:moderate,email:severe");

        assert!(!table.qualifies(SinkKind::Discord, Severity::Mild));
        assert!(table.qualifies(SinkKind::Discord, Severity::Moderate));
        assert!(!table.qualifies(SinkKind::Email, Severity::Moderate));
        assert!(table.qualifies(SinkKind::Email, Severity::Severe));
        assert!(table.qualifies(SinkKind::Email, Severity::Critical));
    }

    #[test]
    fn test_every_severity_against_every_minimum() {
        for min in Severity::ALL {
            let table = ThresholdTable::empty().with(SinkKind::Email, min);
            for severity in Severity::ALL {
                assert_eq!(
                    table.qualifies(SinkKind::Email, severity),
                    severity.score() >= min.score(),
                    "{} vs minimum {}",
                    severity,
                    min
                );
                assert!(!table.qualifies(SinkKind::Discord, severity));
            }
        }
    }

    #[test]
    fn test_parse() {
        let table: ThresholdTable = " discord:critical , email:4 ".parse().unwrap();
        assert_eq!(table.minimum(SinkKind::Discord), Some(Severity::Critical));
        assert_eq!(table.minimum(SinkKind::Email), Some(Severity::Severe));
        assert_eq!(table.sinks_for(Severity::Severe), vec![SinkKind::Email]);
        assert_eq!(
            table.sinks_for(Severity::Critical),
            vec![SinkKind::Discord, SinkKind::Email]
        );

        let email_only: ThresholdTable = "email:severe".parse().unwrap();
        assert_eq!(email_only.minimum(SinkKind::Discord), None);

        assert!("".parse::<ThresholdTable>().unwrap().sinks_for(Severity::Critical).is_empty());
        assert!("discord".parse::<ThresholdTable>().is_err());
        assert!("slack:severe".parse::<ThresholdTable>().is_err());
        assert!("email:9".parse::<ThresholdTable>().is_err());
        assert!("email:catastrophic".parse::<ThresholdTable>().is_err());
    }
}
