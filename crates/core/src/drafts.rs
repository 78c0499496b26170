//! In-progress configurations and the merge applied when a guest signs in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::katana::{KatanaConfig, KatanaConfigInput};
use crate::validation::ValidationErrors;

/// Smallest quantity a draft can hold.
pub const MIN_DRAFT_QUANTITY: u8 = 1;
/// Largest quantity a draft can hold.
pub const MAX_DRAFT_QUANTITY: u8 = 10;

/// What a draft stores: a configuration and a quantity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftContent {
    #[serde(flatten)]
    pub config: KatanaConfig,
    pub quantity: u8,
}

/// Draft content with the time it was last edited.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    #[serde(flatten)]
    pub content: DraftContent,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Unvalidated draft content.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftContentInput {
    #[serde(flatten)]
    pub config: KatanaConfigInput,
    pub quantity: i64,
}

/// Unvalidated snapshot, e.g. the copy a browser kept in local storage.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshotInput {
    #[serde(flatten)]
    pub content: DraftContentInput,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl DraftContentInput {
    /// Validate configuration and quantity.
    ///
    /// # Errors
    ///
    /// Returns every invalid field.
    pub fn validate(&self) -> Result<DraftContent, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let content = self.validate_into(&mut errors);
        match content {
            Some(content) if errors.is_empty() => Ok(content),
            _ => Err(errors),
        }
    }

    fn validate_into(&self, errors: &mut ValidationErrors) -> Option<DraftContent> {
        let config = self.config.validate_into(errors);
        let quantity = match u8::try_from(self.quantity) {
            Ok(q) if q < MIN_DRAFT_QUANTITY => {
                errors.add("quantity", "Quantite minimale 1");
                None
            }
            Ok(q) if q <= MAX_DRAFT_QUANTITY => Some(q),
            Ok(_) => {
                errors.add("quantity", "Quantite maximale 10");
                None
            }
            Err(_) if self.quantity < 0 => {
                errors.add("quantity", "Quantite minimale 1");
                None
            }
            Err(_) => {
                errors.add("quantity", "Quantite maximale 10");
                None
            }
        };
        Some(DraftContent {
            config: config?,
            quantity: quantity?,
        })
    }
}

/// Validate a snapshot, stamping it with `now` when it carries no timestamp.
///
/// # Errors
///
/// Returns every invalid field, including a malformed `updatedAt`.
pub fn parse_snapshot(
    input: &DraftSnapshotInput,
    now: DateTime<Utc>,
) -> Result<DraftSnapshot, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let content = input.content.validate_into(&mut errors);
    let updated_at = match input.updated_at.as_deref() {
        None => Some(now),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| errors.add("updatedAt", "Date invalide"))
            .ok(),
    };

    match (content, updated_at) {
        (Some(content), Some(updated_at)) if errors.is_empty() => Ok(DraftSnapshot {
            content,
            updated_at: Some(updated_at),
        }),
        _ => Err(errors),
    }
}

fn timestamp(snapshot: &DraftSnapshot) -> DateTime<Utc> {
    snapshot.updated_at.unwrap_or(DateTime::UNIX_EPOCH)
}

/// Merge two snapshots of the same draft.
///
/// The configuration comes from the most recently edited side (ties go to
/// `incoming`), the quantity is the larger of the two, and the result is
/// stamped with the later timestamp.
#[must_use]
pub fn merge_snapshots(
    base: Option<&DraftSnapshot>,
    incoming: Option<&DraftSnapshot>,
) -> Option<DraftSnapshot> {
    match (base, incoming) {
        (None, None) => None,
        (None, Some(only)) | (Some(only), None) => Some(only.clone()),
        (Some(base), Some(incoming)) => {
            let base_ts = timestamp(base);
            let incoming_ts = timestamp(incoming);
            let latest = if incoming_ts >= base_ts { incoming } else { base };

            Some(DraftSnapshot {
                content: DraftContent {
                    config: latest.content.config.clone(),
                    quantity: base.content.quantity.max(incoming.content.quantity),
                },
                updated_at: Some(base_ts.max(incoming_ts)),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::HexColor;
    use chrono::TimeZone;

    fn snapshot(handle: &str, quantity: u8, ts: Option<i64>) -> DraftSnapshot {
        DraftSnapshot {
            content: DraftContent {
                config: KatanaConfig {
                    handle_color: HexColor::parse(handle).unwrap(),
                    ..KatanaConfig::default()
                },
                quantity,
            },
            updated_at: ts.map(|secs| Utc.timestamp_opt(secs, 0).unwrap()),
        }
    }

    #[test]
    fn test_merge_none() {
        assert_eq!(merge_snapshots(None, None), None);
    }

    #[test]
    fn test_merge_single_side() {
        let a = snapshot("#111111", 2, Some(10));
        assert_eq!(merge_snapshots(Some(&a), None), Some(a.clone()));
        assert_eq!(merge_snapshots(None, Some(&a)), Some(a));
    }

    #[test]
    fn test_merge_latest_config_wins_and_max_quantity() {
        let base = snapshot("#111111", 5, Some(200));
        let incoming = snapshot("#222222", 2, Some(100));
        let merged = merge_snapshots(Some(&base), Some(&incoming)).unwrap();
        assert_eq!(merged.content.config.handle_color.as_str(), "#111111");
        assert_eq!(merged.content.quantity, 5);
        assert_eq!(merged.updated_at, base.updated_at);
    }

    #[test]
    fn test_merge_tie_favours_incoming() {
        let base = snapshot("#111111", 1, Some(100));
        let incoming = snapshot("#222222", 3, Some(100));
        let merged = merge_snapshots(Some(&base), Some(&incoming)).unwrap();
        assert_eq!(merged.content.config.handle_color.as_str(), "#222222");
        assert_eq!(merged.content.quantity, 3);
    }

    #[test]
    fn test_merge_missing_timestamp_counts_as_epoch() {
        let base = snapshot("#111111", 1, None);
        let incoming = snapshot("#222222", 1, Some(5));
        let merged = merge_snapshots(Some(&base), Some(&incoming)).unwrap();
        assert_eq!(merged.content.config.handle_color.as_str(), "#222222");

        let merged = merge_snapshots(Some(&incoming), Some(&base)).unwrap();
        assert_eq!(merged.content.config.handle_color.as_str(), "#222222");
        assert_eq!(merged.updated_at, incoming.updated_at);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let base = snapshot("#111111", 4, Some(300));
        let incoming = snapshot("#222222", 7, Some(100));
        let merged = merge_snapshots(Some(&base), Some(&incoming)).unwrap();
        let again = merge_snapshots(Some(&merged), Some(&incoming)).unwrap();
        assert_eq!(again, merged);
        let again = merge_snapshots(Some(&base), Some(&merged)).unwrap();
        assert_eq!(again, merged);
    }

    #[test]
    fn test_parse_snapshot_defaults_timestamp() {
        let input: DraftSnapshotInput = serde_json::from_str(
            r##"{"handleColor":"#8b1e1e","bladeTint":"#d9d2c5","metalness":0.6,"roughness":0.35,"quantity":2}"##,
        )
        .unwrap();
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let parsed = parse_snapshot(&input, now).unwrap();
        assert_eq!(parsed.updated_at, Some(now));
        assert_eq!(parsed.content.quantity, 2);
    }

    #[test]
    fn test_parse_snapshot_rejects_bad_values() {
        let input: DraftSnapshotInput = serde_json::from_str(
            r##"{"handleColor":"#8b1e1e","bladeTint":"#d9d2c5","metalness":0.6,"roughness":0.35,"quantity":11,"updatedAt":"soon"}"##,
        )
        .unwrap();
        let errors = parse_snapshot(&input, Utc::now()).unwrap_err();
        assert_eq!(errors.field("quantity"), ["Quantite maximale 10"]);
        assert!(errors.has_field("updatedAt"));
    }

    #[test]
    fn test_content_quantity_bounds() {
        let mut input = DraftContentInput {
            config: (&KatanaConfig::default()).into(),
            quantity: 0,
        };
        assert_eq!(
            input.validate().unwrap_err().field("quantity"),
            ["Quantite minimale 1"]
        );
        input.quantity = -3;
        assert!(input.validate().is_err());
        input.quantity = 10;
        assert_eq!(input.validate().unwrap().quantity, 10);
    }

    #[test]
    fn test_snapshot_serializes_flat() {
        let json = serde_json::to_value(snapshot("#111111", 2, Some(0))).unwrap();
        assert_eq!(json["handleColor"], "#111111");
        assert_eq!(json["quantity"], 2);
        assert_eq!(json["updatedAt"], "1970-01-01T00:00:00Z");
    }
}
