// ============================================================
// Layer 7 — Timed List
// ============================================================
// An append-only list that stamps every value with the wall-clock
// time (seconds since the Unix epoch) at which it was appended.
// Used for ad-hoc progress logs such as per-step losses.

use std::fmt::Display;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::error::{Result, VocoderError};

/// Every 100th append is logged when `debug` is on.
const LOG_EVERY: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct TimedList<T> {
    pub name:  Option<String>,
    pub debug: bool,
    values:    Vec<T>,
    times:     Vec<f64>,
}

impl<T> Default for TimedList<T> {
    fn default() -> Self {
        Self { name: None, debug: true, values: Vec::new(), times: Vec::new() }
    }
}

impl<T> TimedList<T> {
    pub fn new(name: Option<String>, debug: bool) -> Self {
        Self { name, debug, values: Vec::new(), times: Vec::new() }
    }

    /// Rebuild a list from stored parts.
    ///
    /// `values` and `times` must be given together and be the same length.
    pub fn from_parts(
        name: Option<String>,
        debug: bool,
        values: Option<Vec<T>>,
        times: Option<Vec<f64>>,
    ) -> Result<Self> {
        match (values, times) {
            (None, None) => Ok(Self::new(name, debug)),
            (Some(values), Some(times)) => {
                if values.len() != times.len() {
                    return Err(VocoderError::Consistency(format!(
                        "values and times must be of equal length ({} vs {})",
                        values.len(),
                        times.len()
                    )));
                }
                Ok(Self { name, debug, values, times })
            }
            _ => Err(VocoderError::Consistency("both values and times must be given".into())),
        }
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&T, f64)> {
        self.values.iter().zip(self.times.iter().copied())
    }
}

impl<T: Display> TimedList<T> {
    pub fn append(&mut self, value: T) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        if self.debug && self.values.len() % LOG_EVERY == 0 {
            tracing::info!(
                "{} = {} at time {:.3}",
                self.name.as_deref().unwrap_or("<unnamed>"),
                value,
                now
            );
        }
        self.values.push(value);
        self.times.push(now);
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_stamps_monotonic_times() {
        let mut list = TimedList::new(Some("loss".into()), false);
        for v in [3.0, 2.0, 1.0] {
            list.append(v);
        }
        assert_eq!(list.values(), &[3.0, 2.0, 1.0]);
        assert_eq!(list.times().len(), 3);
        assert!(list.times().windows(2).all(|w| w[0] <= w[1]));
        assert!(list.times()[0] > 0.0);
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let err = TimedList::from_parts(None, true, Some(vec![1, 2]), Some(vec![0.0])).unwrap_err();
        assert!(matches!(err, VocoderError::Consistency(_)));
    }

    #[test]
    fn test_one_sided_parts_rejected() {
        assert!(TimedList::<i32>::from_parts(None, true, Some(vec![1]), None).is_err());
        assert!(TimedList::<i32>::from_parts(None, true, None, Some(vec![1.0])).is_err());
    }

    #[test]
    fn test_from_parts_keeps_data() {
        let list = TimedList::from_parts(Some("x".into()), true, Some(vec![1, 2]), Some(vec![10.0, 11.0]))
            .unwrap();
        let pairs: Vec<(i32, f64)> = list.iter().map(|(v, t)| (*v, t)).collect();
        assert_eq!(pairs, vec![(1, 10.0), (2, 11.0)]);
        assert_eq!(TimedList::<i32>::default().len(), 0);
    }
}
