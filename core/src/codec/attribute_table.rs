/// GATT attribute table codec
///
/// Converts between the application's ordered rows and the stack's flat
/// element array. Row order is significant and always preserved; consumers
/// rebuild the service hierarchy from start/end handle ranges.

use super::uuid::Uuid128;
use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Kind of an attribute table row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeKind {
    PrimaryService,
    SecondaryService,
    IncludedService,
    Characteristic,
    Descriptor,
}

impl AttributeKind {
    /// Stack discriminant for this kind
    pub fn discriminant(&self) -> u8 {
        match self {
            AttributeKind::PrimaryService => 0,
            AttributeKind::SecondaryService => 1,
            AttributeKind::IncludedService => 2,
            AttributeKind::Characteristic => 3,
            AttributeKind::Descriptor => 4,
        }
    }

    pub fn from_discriminant(value: u8) -> Option<Self> {
        match value {
            0 => Some(AttributeKind::PrimaryService),
            1 => Some(AttributeKind::SecondaryService),
            2 => Some(AttributeKind::IncludedService),
            3 => Some(AttributeKind::Characteristic),
            4 => Some(AttributeKind::Descriptor),
            _ => None,
        }
    }

    pub fn is_service(&self) -> bool {
        matches!(
            self,
            AttributeKind::PrimaryService | AttributeKind::SecondaryService
        )
    }
}

/// Application-side attribute table row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRow {
    pub id: u16,
    /// Required on encode; rows built by hand may leave it unset
    pub uuid: Option<Uuid128>,
    pub kind: AttributeKind,
    pub attribute_handle: u16,
    pub start_handle: u16,
    pub end_handle: u16,
    pub properties: u8,
    pub permissions: u16,
}

impl AttributeRow {
    /// Convenience constructor for a row with a known UUID and zeroed handles
    pub fn new(kind: AttributeKind, uuid: Uuid128) -> Self {
        Self {
            id: 0,
            uuid: Some(uuid),
            kind,
            attribute_handle: 0,
            start_handle: 0,
            end_handle: 0,
            properties: 0,
            permissions: 0,
        }
    }

    pub fn with_handles(mut self, attribute: u16, start: u16, end: u16) -> Self {
        self.attribute_handle = attribute;
        self.start_handle = start;
        self.end_handle = end;
        self
    }

    pub fn with_properties(mut self, properties: u8) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_permissions(mut self, permissions: u16) -> Self {
        self.permissions = permissions;
        self
    }
}

/// Stack-side flat database element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDbElement {
    pub id: u16,
    pub uuid: Uuid128,
    pub element_type: u8,
    pub attribute_handle: u16,
    pub start_handle: u16,
    pub end_handle: u16,
    pub properties: u8,
    pub permissions: u16,
}

/// Encode rows into the stack element array, one element per row
pub fn encode_table(rows: &[AttributeRow]) -> Result<Vec<StackDbElement>, BridgeError> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let uuid = row.uuid.ok_or_else(|| BridgeError::InvalidRow {
                index,
                reason: "missing uuid".to_string(),
            })?;
            Ok(StackDbElement {
                id: row.id,
                uuid,
                element_type: row.kind.discriminant(),
                attribute_handle: row.attribute_handle,
                start_handle: row.start_handle,
                end_handle: row.end_handle,
                properties: row.properties,
                permissions: row.permissions,
            })
        })
        .collect()
}

/// Decode a stack element array in delivery order
pub fn decode_table(elements: &[StackDbElement]) -> Result<Vec<AttributeRow>, BridgeError> {
    elements
        .iter()
        .enumerate()
        .map(|(index, element)| {
            let kind = AttributeKind::from_discriminant(element.element_type).ok_or_else(|| {
                BridgeError::InvalidRow {
                    index,
                    reason: format!("unknown attribute type {}", element.element_type),
                }
            })?;
            Ok(AttributeRow {
                id: element.id,
                uuid: Some(element.uuid),
                kind,
                attribute_handle: element.attribute_handle,
                start_handle: element.start_handle,
                end_handle: element.end_handle,
                properties: element.properties,
                permissions: element.permissions,
            })
        })
        .collect()
}

/// First attribute handle that appears more than once, if any
pub fn duplicate_handle(rows: &[AttributeRow]) -> Option<u16> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(|row| row.attribute_handle)
        .find(|handle| !seen.insert(*handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_service() -> Vec<AttributeRow> {
        vec![
            AttributeRow::new(AttributeKind::PrimaryService, Uuid128::from_u16(0x180D))
                .with_handles(1, 1, 5),
            AttributeRow::new(AttributeKind::Characteristic, Uuid128::from_u16(0x2A37))
                .with_handles(3, 0, 0)
                .with_properties(0x10)
                .with_permissions(0x01),
            AttributeRow::new(AttributeKind::Descriptor, Uuid128::from_u16(0x2902))
                .with_handles(4, 0, 0)
                .with_permissions(0x11),
            AttributeRow::new(AttributeKind::Characteristic, Uuid128::from_u16(0x2A38))
                .with_handles(5, 0, 0)
                .with_properties(0x02),
        ]
    }

    #[test]
    fn test_encode_decode_preserves_order_and_fields() {
        let rows = sample_service();
        let elements = encode_table(&rows).expect("encode");
        assert_eq!(elements.len(), rows.len());
        assert_eq!(elements[0].element_type, 0);
        assert_eq!(elements[2].element_type, 4);

        let decoded = decode_table(&elements).expect("decode");
        assert_eq!(decoded, rows);
    }

    #[test]
    fn test_decode_keeps_stack_order_unsorted() {
        let mut rows = sample_service();
        rows.reverse();
        let decoded = decode_table(&encode_table(&rows).unwrap()).unwrap();
        let handles: Vec<u16> = decoded.iter().map(|r| r.attribute_handle).collect();
        assert_eq!(handles, vec![5, 4, 3, 1]);
    }

    #[test]
    fn test_encode_missing_uuid_reports_row() {
        let mut rows = sample_service();
        rows[2].uuid = None;
        match encode_table(&rows) {
            Err(BridgeError::InvalidRow { index, .. }) => assert_eq!(index, 2),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_type() {
        let mut elements = encode_table(&sample_service()).unwrap();
        elements[1].element_type = 9;
        assert!(matches!(
            decode_table(&elements),
            Err(BridgeError::InvalidRow { index: 1, .. })
        ));
    }

    #[test]
    fn test_empty_table() {
        assert!(encode_table(&[]).unwrap().is_empty());
        assert!(decode_table(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_handle_detection() {
        let mut rows = sample_service();
        assert_eq!(duplicate_handle(&rows), None);
        rows[3].attribute_handle = 3;
        assert_eq!(duplicate_handle(&rows), Some(3));
    }

    #[test]
    fn test_kind_discriminants_roundtrip() {
        for value in 0..5u8 {
            let kind = AttributeKind::from_discriminant(value).expect("known kind");
            assert_eq!(kind.discriminant(), value);
        }
        assert!(AttributeKind::from_discriminant(5).is_none());
        assert!(AttributeKind::PrimaryService.is_service());
        assert!(!AttributeKind::Descriptor.is_service());
    }
}
