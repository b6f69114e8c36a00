//! Continuous-action label: text parsing and the binary cache layout.
//!
//! Text grammar, one token per cost entry: `action[:cost[:probability]]`.
//! Cache layout: `[count: usize][count × (action, cost, probability, reserved): f32]`,
//! all little-endian.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CbContError, Result};

/// Cost of an entry whose outcome was not observed.
pub const UNKNOWN_COST: f32 = f32::INFINITY;

const WORD_BYTES: usize = std::mem::size_of::<usize>();
const ENTRY_BYTES: usize = 4 * std::mem::size_of::<f32>();

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEntry {
    pub action: f32,
    pub cost: f32,
    pub probability: f32,
    /// Unused; kept so the cache layout stays four floats wide.
    pub reserved: f32,
}

impl CostEntry {
    pub fn new(action: f32, cost: f32, probability: f32) -> Self {
        Self {
            action,
            cost,
            probability,
            reserved: 0.0,
        }
    }

    pub fn is_observed(&self) -> bool {
        self.cost != UNKNOWN_COST && self.probability > 0.0
    }
}

impl fmt::Display for CostEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.action, self.cost, self.probability)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContinuousLabel {
    pub costs: Vec<CostEntry>,
}

impl ContinuousLabel {
    /// Parses whitespace-separated label tokens.
    ///
    /// Probabilities outside `[0, 1]` are clamped with a warning; every other
    /// defect in a token is an error.
    pub fn parse<'a, I>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut label = Self::default();
        for token in tokens {
            label.costs.push(parse_entry(token)?);
        }
        Ok(label)
    }

    /// A label without any entry that has both a known cost and a positive
    /// probability carries no training signal.
    pub fn is_test(&self) -> bool {
        !self.costs.iter().any(CostEntry::is_observed)
    }

    /// Importance is carried by the cost/probability pairs, never by the label.
    pub fn weight(&self) -> f32 {
        1.0
    }

    pub fn copy_from(&mut self, src: &ContinuousLabel) {
        self.costs.clone_from(&src.costs);
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(WORD_BYTES + ENTRY_BYTES * self.costs.len());
        self.cache(&mut buf);
        buf
    }

    /// Appends the cache representation of this label to `buf`.
    pub fn cache(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.costs.len().to_le_bytes());
        for entry in &self.costs {
            for value in [entry.action, entry.cost, entry.probability, entry.reserved] {
                buf.extend_from_slice(&value.to_le_bytes());
            }
        }
    }

    /// Replaces this label with the one cached at the start of `bytes` and
    /// returns the number of bytes consumed.
    ///
    /// On a short read the label is left empty and `TruncatedCache` is
    /// returned; callers treat that as a zero-length read.
    pub fn read_cached(&mut self, bytes: &[u8]) -> Result<usize> {
        self.costs.clear();
        let Some(header) = bytes.get(..WORD_BYTES) else {
            return Err(CbContError::TruncatedCache {
                needed: WORD_BYTES,
                available: bytes.len(),
            });
        };
        let mut word = [0u8; WORD_BYTES];
        word.copy_from_slice(header);
        let count = usize::from_le_bytes(word);

        let body_len = count.checked_mul(ENTRY_BYTES).ok_or(CbContError::TruncatedCache {
            needed: usize::MAX,
            available: bytes.len(),
        })?;
        let needed = WORD_BYTES.saturating_add(body_len);
        let Some(body) = bytes.get(WORD_BYTES..needed) else {
            return Err(CbContError::TruncatedCache {
                needed,
                available: bytes.len(),
            });
        };

        self.costs.reserve(count);
        for chunk in body.chunks_exact(ENTRY_BYTES) {
            let mut fields = chunk.chunks_exact(4).map(|raw| {
                let mut le = [0u8; 4];
                le.copy_from_slice(raw);
                f32::from_le_bytes(le)
            });
            let mut next = || fields.next().unwrap_or_default();
            self.costs.push(CostEntry {
                action: next(),
                cost: next(),
                probability: next(),
                reserved: next(),
            });
        }
        Ok(needed)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<(Self, usize)> {
        let mut label = Self::default();
        let consumed = label.read_cached(bytes)?;
        Ok((label, consumed))
    }
}

fn parse_entry(token: &str) -> Result<CostEntry> {
    let fields: Vec<&str> = token.split(':').collect();
    if token.is_empty() || fields.len() > 3 {
        return Err(CbContError::MalformedLabel(token.to_string()));
    }

    let action_text = fields[0];
    let action = match action_text.parse::<f32>() {
        Ok(action) if !action.is_nan() => action,
        _ => return Err(CbContError::MalformedLabel(token.to_string())),
    };

    let cost = match fields.get(1) {
        Some(text) => match text.parse::<f32>() {
            Ok(cost) if !cost.is_nan() => cost,
            _ => {
                return Err(CbContError::InvalidCost {
                    action: action_text.to_string(),
                    text: text.to_string(),
                })
            }
        },
        None => UNKNOWN_COST,
    };

    let mut probability = match fields.get(2) {
        Some(text) => match text.parse::<f32>() {
            Ok(p) if !p.is_nan() => p,
            _ => {
                return Err(CbContError::InvalidProbability {
                    action: action_text.to_string(),
                    text: text.to_string(),
                })
            }
        },
        None => 0.0,
    };
    if probability > 1.0 {
        warn!(token, "invalid probability > 1 specified for an action, resetting to 1");
        probability = 1.0;
    }
    if probability < 0.0 {
        warn!(token, "invalid probability < 0 specified for an action, resetting to 0");
        probability = 0.0;
    }

    Ok(CostEntry::new(action, cost, probability))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<ContinuousLabel> {
        ContinuousLabel::parse(text.split_whitespace())
    }

    #[test]
    fn parses_full_token() {
        let label = parse("1.5:0.4:0.8").unwrap();
        assert_eq!(label.costs, vec![CostEntry::new(1.5, 0.4, 0.8)]);
        assert!(!label.is_test());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let label = parse("2.25").unwrap();
        assert_eq!(label.costs[0].cost, UNKNOWN_COST);
        assert_eq!(label.costs[0].probability, 0.0);
        assert!(label.is_test());

        let label = parse("2.25:1.0").unwrap();
        assert_eq!(label.costs[0].cost, 1.0);
        assert_eq!(label.costs[0].probability, 0.0);
        assert!(label.is_test(), "zero probability carries no signal");
    }

    #[test]
    fn entries_keep_input_order() {
        let label = parse("3 1:0.5:0.2 2:1:1").unwrap();
        let actions: Vec<f32> = label.costs.iter().map(|c| c.action).collect();
        assert_eq!(actions, vec![3.0, 1.0, 2.0]);
        assert!(!label.is_test());
    }

    #[test]
    fn probability_is_clamped() {
        let label = parse("1:0.5:2.0").unwrap();
        assert_eq!(label.costs[0].probability, 1.0);
        let label = parse("1:0.5:-0.5").unwrap();
        assert_eq!(label.costs[0].probability, 0.0);
    }

    #[test]
    fn too_many_fields_is_malformed() {
        let err = parse("1:2:0.5:7").unwrap_err();
        assert!(matches!(err, CbContError::MalformedLabel(ref t) if t == "1:2:0.5:7"));
    }

    #[test]
    fn empty_token_is_malformed() {
        let err = ContinuousLabel::parse([""]).unwrap_err();
        assert!(matches!(err, CbContError::MalformedLabel(_)));
    }

    #[test]
    fn nan_or_garbage_cost_is_rejected() {
        assert!(matches!(
            parse("1:NaN:0.5").unwrap_err(),
            CbContError::InvalidCost { .. }
        ));
        assert!(matches!(
            parse("1:abc").unwrap_err(),
            CbContError::InvalidCost { .. }
        ));
        assert!(matches!(
            parse("1:0.5:nan").unwrap_err(),
            CbContError::InvalidProbability { .. }
        ));
    }

    #[test]
    fn nan_action_is_malformed() {
        for text in ["nan:0.5:0.5", "NaN", "-nan:1"] {
            let err = parse(text).unwrap_err();
            assert!(matches!(err, CbContError::MalformedLabel(ref t) if t == text), "{text}");
        }
        // Infinite actions parse; the transform drops them as out of range.
        assert_eq!(parse("inf:0.5:0.5").unwrap().costs[0].action, f32::INFINITY);
    }

    #[test]
    fn empty_label_is_test() {
        let label = parse("").unwrap();
        assert!(label.costs.is_empty());
        assert!(label.is_test());
        assert_eq!(label.weight(), 1.0);
    }

    #[test]
    fn cache_round_trip_is_exact() {
        let mut label = parse("1.5:0.4:0.8 0.25 7:-3:1").unwrap();
        label.costs[1].reserved = 42.0;
        let bytes = label.serialize();
        assert_eq!(bytes.len(), WORD_BYTES + 3 * ENTRY_BYTES);

        let (decoded, consumed) = ContinuousLabel::deserialize(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, label);
    }

    #[test]
    fn cached_labels_can_be_read_back_to_back() {
        let first = parse("1:2:0.5").unwrap();
        let second = parse("3:4:0.25 5").unwrap();
        let mut buf = Vec::new();
        first.cache(&mut buf);
        second.cache(&mut buf);

        let mut label = ContinuousLabel::default();
        let used = label.read_cached(&buf).unwrap();
        assert_eq!(label, first);
        label.read_cached(&buf[used..]).unwrap();
        assert_eq!(label, second);
    }

    #[test]
    fn truncated_cache_reports_and_clears() {
        let label = parse("1:2:0.5 3:4:0.25").unwrap();
        let bytes = label.serialize();

        let mut target = parse("9:9:0.9").unwrap();
        let err = target.read_cached(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, CbContError::TruncatedCache { .. }));
        assert!(err.is_recoverable());
        assert!(target.costs.is_empty());

        let err = target.read_cached(&bytes[..3]).unwrap_err();
        assert!(matches!(
            err,
            CbContError::TruncatedCache { needed, available: 3 } if needed == WORD_BYTES
        ));
    }

    #[test]
    fn copy_replaces_entries() {
        let src = parse("1:2:0.5").unwrap();
        let mut dst = parse("4 5 6").unwrap();
        dst.copy_from(&src);
        assert_eq!(dst, src);
    }
}
