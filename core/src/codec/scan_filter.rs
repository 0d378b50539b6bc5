/// Scan filter codec
///
/// Each filter condition is its own variant carrying only the fields that
/// kind needs. Encoding flattens it into the stack's uniform
/// add/remove call, leaving unused slots empty.

use super::address::{parse_address, DeviceAddress};
use super::uuid::Uuid128;
use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// Add or delete a filter condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterAction {
    Add,
    Delete,
}

impl FilterAction {
    pub fn code(&self) -> u8 {
        match self {
            FilterAction::Add => 0,
            FilterAction::Delete => 1,
        }
    }
}

/// A single scan filter condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanFilterCondition {
    Address {
        address: DeviceAddress,
        address_type: u8,
    },
    ServiceData {
        pattern: Vec<u8>,
        mask: Vec<u8>,
    },
    ServiceUuid {
        uuid: Uuid128,
        mask: Option<Uuid128>,
    },
    SolicitationUuid {
        uuid: Uuid128,
        mask: Option<Uuid128>,
    },
    LocalName {
        name: String,
    },
    ManufacturerData {
        company_id: u16,
        company_mask: u16,
        pattern: Vec<u8>,
        mask: Vec<u8>,
    },
    ServiceDataPattern {
        company_id: u16,
        company_mask: u16,
        pattern: Vec<u8>,
        mask: Vec<u8>,
    },
}

impl ScanFilterCondition {
    /// Stack discriminant for the filter kind
    pub fn filter_type(&self) -> u8 {
        match self {
            ScanFilterCondition::Address { .. } => 0,
            ScanFilterCondition::ServiceData { .. } => 1,
            ScanFilterCondition::ServiceUuid { .. } => 2,
            ScanFilterCondition::SolicitationUuid { .. } => 3,
            ScanFilterCondition::LocalName { .. } => 4,
            ScanFilterCondition::ManufacturerData { .. } => 5,
            ScanFilterCondition::ServiceDataPattern { .. } => 6,
        }
    }
}

/// Uniform stack filter add/remove call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanFilterCall {
    pub action: u8,
    pub filter_type: u8,
    pub filter_index: u8,
    pub company_id: u16,
    pub company_mask: u16,
    pub uuid: Option<Uuid128>,
    pub uuid_mask: Option<Uuid128>,
    pub address: Option<DeviceAddress>,
    pub address_type: u8,
    pub data: Vec<u8>,
    pub mask: Vec<u8>,
}

/// Encode a condition into a stack call.
///
/// Returns `None` only for a local-name filter with an empty name: that case
/// issues no call at all.
pub fn encode_filter(
    action: FilterAction,
    filter_index: u8,
    condition: &ScanFilterCondition,
) -> Option<ScanFilterCall> {
    let base = ScanFilterCall {
        action: action.code(),
        filter_type: condition.filter_type(),
        filter_index,
        ..Default::default()
    };

    let call = match condition {
        ScanFilterCondition::Address {
            address,
            address_type,
        } => ScanFilterCall {
            address: Some(*address),
            address_type: *address_type,
            ..base
        },
        ScanFilterCondition::ServiceData { pattern, mask } => ScanFilterCall {
            data: pattern.clone(),
            mask: mask.clone(),
            ..base
        },
        ScanFilterCondition::ServiceUuid { uuid, mask }
        | ScanFilterCondition::SolicitationUuid { uuid, mask } => ScanFilterCall {
            uuid: Some(*uuid),
            // An all-zero mask means exact match, same as no mask
            uuid_mask: mask.filter(|m| !m.is_nil()),
            ..base
        },
        ScanFilterCondition::LocalName { name } => {
            if name.is_empty() {
                return None;
            }
            ScanFilterCall {
                data: name.as_bytes().to_vec(),
                ..base
            }
        }
        ScanFilterCondition::ManufacturerData {
            company_id,
            company_mask,
            pattern,
            mask,
        }
        | ScanFilterCondition::ServiceDataPattern {
            company_id,
            company_mask,
            pattern,
            mask,
        } => ScanFilterCall {
            company_id: *company_id,
            company_mask: *company_mask,
            data: pattern.clone(),
            mask: mask.clone(),
            ..base
        },
    };

    Some(call)
}

/// Positional filter arguments as legacy callers supply them
#[derive(Debug, Clone, Default)]
pub struct RawScanFilter {
    pub filter_type: u8,
    pub company_id: u16,
    pub company_mask: u16,
    pub uuid: Option<Uuid128>,
    pub uuid_mask: Option<Uuid128>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub address_type: u8,
    pub data: Option<Vec<u8>>,
    pub mask: Option<Vec<u8>>,
}

impl TryFrom<RawScanFilter> for ScanFilterCondition {
    type Error = BridgeError;

    fn try_from(raw: RawScanFilter) -> Result<Self, Self::Error> {
        let missing = |field: &str| {
            BridgeError::InvalidArgument(format!(
                "filter type {} requires {}",
                raw.filter_type, field
            ))
        };

        match raw.filter_type {
            0 => {
                let text = raw.address.as_deref().ok_or_else(|| missing("address"))?;
                Ok(ScanFilterCondition::Address {
                    address: parse_address(text)?,
                    address_type: raw.address_type,
                })
            }
            1 => Ok(ScanFilterCondition::ServiceData {
                pattern: raw.data.clone().ok_or_else(|| missing("data"))?,
                mask: raw.mask.clone().ok_or_else(|| missing("mask"))?,
            }),
            2 => Ok(ScanFilterCondition::ServiceUuid {
                uuid: raw.uuid.ok_or_else(|| missing("uuid"))?,
                mask: raw.uuid_mask,
            }),
            3 => Ok(ScanFilterCondition::SolicitationUuid {
                uuid: raw.uuid.ok_or_else(|| missing("uuid"))?,
                mask: raw.uuid_mask,
            }),
            4 => Ok(ScanFilterCondition::LocalName {
                name: raw.name.clone().ok_or_else(|| missing("name"))?,
            }),
            5 => Ok(ScanFilterCondition::ManufacturerData {
                company_id: raw.company_id,
                company_mask: raw.company_mask,
                pattern: raw.data.clone().ok_or_else(|| missing("data"))?,
                mask: raw.mask.clone().ok_or_else(|| missing("mask"))?,
            }),
            6 => Ok(ScanFilterCondition::ServiceDataPattern {
                company_id: raw.company_id,
                company_mask: raw.company_mask,
                pattern: raw.data.clone().ok_or_else(|| missing("data"))?,
                mask: raw.mask.clone().ok_or_else(|| missing("mask"))?,
            }),
            other => Err(BridgeError::InvalidArgument(format!(
                "unknown filter type {}",
                other
            ))),
        }
    }
}

/// Scan filter parameter setup action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterParamAction {
    Add,
    Delete,
    ClearAll,
}

impl FilterParamAction {
    pub fn code(&self) -> u8 {
        match self {
            FilterParamAction::Add => 0,
            FilterParamAction::Delete => 1,
            FilterParamAction::ClearAll => 2,
        }
    }
}

/// Per-index filter parameters (feature selection, logic, timeouts, RSSI window)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterParams {
    pub scanner_id: u8,
    pub filter_index: u8,
    pub feature_selection: u16,
    pub list_logic_type: u16,
    pub filter_logic_type: u8,
    pub delivery_mode: u8,
    pub found_timeout: u16,
    pub lost_timeout: u16,
    pub found_timeout_count: u8,
    pub num_of_tracking_entries: u16,
    pub rssi_high_threshold: i8,
    pub rssi_low_threshold: i8,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid() -> Uuid128 {
        Uuid128::from_u16(0xFE95)
    }

    #[test]
    fn test_address_filter() {
        let address = parse_address("AA:BB:CC:DD:EE:FF").unwrap();
        let call = encode_filter(
            FilterAction::Add,
            3,
            &ScanFilterCondition::Address {
                address,
                address_type: 1,
            },
        )
        .expect("call issued");

        assert_eq!(call.filter_type, 0);
        assert_eq!(call.filter_index, 3);
        assert_eq!(call.address, Some(address));
        assert_eq!(call.address_type, 1);
        assert!(call.uuid.is_none());
        assert!(call.data.is_empty() && call.mask.is_empty());
    }

    #[test]
    fn test_zero_mask_same_as_no_mask() {
        let with_zero = encode_filter(
            FilterAction::Add,
            0,
            &ScanFilterCondition::ServiceUuid {
                uuid: uuid(),
                mask: Some(Uuid128::NIL),
            },
        );
        let without = encode_filter(
            FilterAction::Add,
            0,
            &ScanFilterCondition::ServiceUuid {
                uuid: uuid(),
                mask: None,
            },
        );
        assert_eq!(with_zero, without);
        assert!(with_zero.unwrap().uuid_mask.is_none());
    }

    #[test]
    fn test_partial_mask_forwarded() {
        let mask = super::super::uuid::encode_uuid(0, 0xFFFF);
        let call = encode_filter(
            FilterAction::Add,
            0,
            &ScanFilterCondition::SolicitationUuid {
                uuid: uuid(),
                mask: Some(mask),
            },
        )
        .unwrap();
        assert_eq!(call.filter_type, 3);
        assert_eq!(call.uuid_mask, Some(mask));
    }

    #[test]
    fn test_empty_local_name_is_noop() {
        let call = encode_filter(
            FilterAction::Add,
            0,
            &ScanFilterCondition::LocalName {
                name: String::new(),
            },
        );
        assert!(call.is_none());
    }

    #[test]
    fn test_local_name_bytes() {
        let call = encode_filter(
            FilterAction::Delete,
            2,
            &ScanFilterCondition::LocalName {
                name: "Tag".to_string(),
            },
        )
        .unwrap();
        assert_eq!(call.action, 1);
        assert_eq!(call.data, b"Tag".to_vec());
        assert!(call.mask.is_empty());
    }

    #[test]
    fn test_manufacturer_and_pattern_share_encoding() {
        let manufacturer = encode_filter(
            FilterAction::Add,
            1,
            &ScanFilterCondition::ManufacturerData {
                company_id: 0x004C,
                company_mask: 0xFFFF,
                pattern: vec![0x02, 0x15],
                mask: vec![0xFF, 0xFF],
            },
        )
        .unwrap();
        let pattern = encode_filter(
            FilterAction::Add,
            1,
            &ScanFilterCondition::ServiceDataPattern {
                company_id: 0x004C,
                company_mask: 0xFFFF,
                pattern: vec![0x02, 0x15],
                mask: vec![0xFF, 0xFF],
            },
        )
        .unwrap();

        assert_eq!(manufacturer.filter_type, 5);
        assert_eq!(pattern.filter_type, 6);
        assert_eq!(
            ScanFilterCall {
                filter_type: 0,
                ..manufacturer
            },
            ScanFilterCall {
                filter_type: 0,
                ..pattern
            }
        );
    }

    #[test]
    fn test_add_and_delete_differ_only_in_action() {
        let condition = ScanFilterCondition::ServiceData {
            pattern: vec![1, 2, 3],
            mask: vec![0xFF, 0, 0xFF],
        };
        let add = encode_filter(FilterAction::Add, 4, &condition).unwrap();
        let delete = encode_filter(FilterAction::Delete, 4, &condition).unwrap();
        assert_eq!(add.action, 0);
        assert_eq!(delete.action, 1);
        assert_eq!(ScanFilterCall { action: 1, ..add }, delete);
    }

    #[test]
    fn test_raw_uuid_filter_without_uuid_rejected() {
        let raw = RawScanFilter {
            filter_type: 2,
            ..Default::default()
        };
        assert!(matches!(
            ScanFilterCondition::try_from(raw),
            Err(BridgeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_raw_address_filter_malformed() {
        let raw = RawScanFilter {
            filter_type: 0,
            address: Some("AA:BB".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            ScanFilterCondition::try_from(raw),
            Err(BridgeError::MalformedAddress(_))
        ));
    }

    #[test]
    fn test_raw_unknown_type_rejected() {
        let raw = RawScanFilter {
            filter_type: 7,
            ..Default::default()
        };
        assert!(ScanFilterCondition::try_from(raw).is_err());
    }

    #[test]
    fn test_raw_manufacturer_filter() {
        let raw = RawScanFilter {
            filter_type: 5,
            company_id: 0x00E0,
            company_mask: 0xFFFF,
            data: Some(vec![1]),
            mask: Some(vec![0xFF]),
            ..Default::default()
        };
        let condition = ScanFilterCondition::try_from(raw).unwrap();
        assert_eq!(condition.filter_type(), 5);
    }

    #[test]
    fn test_filter_param_action_codes() {
        assert_eq!(FilterParamAction::Add.code(), 0);
        assert_eq!(FilterParamAction::Delete.code(), 1);
        assert_eq!(FilterParamAction::ClearAll.code(), 2);
    }
}
