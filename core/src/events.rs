//! Structured events delivered to the consumer
//!
//! One variant per stack callback kind. Identifiers, status codes, handles,
//! RSSI and MTU values are carried exactly as the stack reported them.

use crate::codec::{AttributeRow, Uuid128};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Actor namespace an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorKind {
    Client,
    Scanner,
    Advertiser,
    Server,
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorKind::Client => write!(f, "Client"),
            ActorKind::Scanner => write!(f, "Scanner"),
            ActorKind::Advertiser => write!(f, "Advertiser"),
            ActorKind::Server => write!(f, "Server"),
        }
    }
}

/// Whether a server-side request targets a characteristic or a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeTarget {
    Characteristic,
    Descriptor,
}

/// Advertisement tracking report with the address already formatted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvTrackingInfo {
    pub scanner_id: i32,
    pub filter_index: u8,
    pub advertiser_state: u8,
    pub advertiser_info_present: u8,
    pub address: String,
    pub address_type: u8,
    pub tx_power: i8,
    pub rssi: i8,
    pub timestamp: u16,
    pub adv_packet: Vec<u8>,
    pub scan_response: Vec<u8>,
}

/// Decoded stack event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GattEvent {
    // Client
    ClientRegistered {
        status: i32,
        client_if: i32,
        uuid_msb: u64,
        uuid_lsb: u64,
    },
    Connected {
        client_if: i32,
        conn_id: i32,
        status: i32,
        address: String,
    },
    Disconnected {
        client_if: i32,
        conn_id: i32,
        status: i32,
        address: String,
    },
    SearchCompleted {
        conn_id: i32,
        status: i32,
    },
    NotificationRegistered {
        conn_id: i32,
        status: i32,
        registered: bool,
        handle: u16,
    },
    Notify {
        conn_id: i32,
        address: String,
        handle: u16,
        is_notify: bool,
        value: Vec<u8>,
    },
    CharacteristicRead {
        conn_id: i32,
        status: i32,
        handle: u16,
        value: Vec<u8>,
    },
    CharacteristicWritten {
        conn_id: i32,
        status: i32,
        handle: u16,
    },
    DescriptorRead {
        conn_id: i32,
        status: i32,
        handle: u16,
        value: Vec<u8>,
    },
    DescriptorWritten {
        conn_id: i32,
        status: i32,
        handle: u16,
    },
    ExecuteWriteCompleted {
        conn_id: i32,
        status: i32,
    },
    RemoteRssiRead {
        client_if: i32,
        address: String,
        rssi: i32,
        status: i32,
    },
    MtuConfigured {
        conn_id: i32,
        status: i32,
        mtu: i32,
    },
    ClientCongestion {
        conn_id: i32,
        congested: bool,
    },
    GattDbRetrieved {
        conn_id: i32,
        rows: Vec<AttributeRow>,
    },

    // Scanner
    ScannerRegistered {
        status: u8,
        scanner_id: u8,
        uuid_msb: u64,
        uuid_lsb: u64,
    },
    ScanResult {
        address: String,
        rssi: i32,
        adv_data: Vec<u8>,
    },
    ScanFilterConfigured {
        action: u8,
        status: i32,
        scanner_id: i32,
        filter_type: u8,
        available_space: i32,
    },
    ScanFilterParamsConfigured {
        action: u8,
        status: i32,
        scanner_id: i32,
        available_space: i32,
    },
    ScanFilterEnabled {
        enable: bool,
        status: i32,
        scanner_id: i32,
    },
    BatchScanStorageConfigured {
        status: i32,
        scanner_id: i32,
    },
    BatchScanStartStopped {
        start: bool,
        status: i32,
        scanner_id: i32,
    },
    BatchScanReports {
        status: i32,
        scanner_id: i32,
        report_format: i32,
        num_records: i32,
        data: Vec<u8>,
    },
    BatchScanThresholdCrossed {
        scanner_id: i32,
    },
    TrackAdvFoundLost(AdvTrackingInfo),
    ScanParamSetupCompleted {
        status: i32,
        scanner_id: i32,
    },

    // Advertiser
    AdvertiserRegistered {
        status: u8,
        advertiser_id: u8,
        uuid_msb: u64,
        uuid_lsb: u64,
    },
    AdvertiserStarted {
        status: u8,
        advertiser_id: u8,
    },
    AdvertiserEnabled {
        status: u8,
        advertiser_id: u8,
        enable: bool,
    },

    // Server
    ServerRegistered {
        status: i32,
        server_if: i32,
        uuid_msb: u64,
        uuid_lsb: u64,
    },
    ServerConnection {
        address: String,
        connected: bool,
        conn_id: i32,
        server_if: i32,
    },
    ServiceAdded {
        status: i32,
        server_if: i32,
        rows: Vec<AttributeRow>,
    },
    ServiceStopped {
        status: i32,
        server_if: i32,
        service_handle: u16,
    },
    ServiceDeleted {
        status: i32,
        server_if: i32,
        service_handle: u16,
    },
    ServerReadRequest {
        target: AttributeTarget,
        address: String,
        conn_id: i32,
        trans_id: i32,
        attr_handle: u16,
        offset: u16,
        is_long: bool,
    },
    ServerWriteRequest {
        target: AttributeTarget,
        address: String,
        conn_id: i32,
        trans_id: i32,
        attr_handle: u16,
        offset: u16,
        length: usize,
        need_rsp: bool,
        is_prep: bool,
        value: Vec<u8>,
    },
    ExecuteWriteRequest {
        address: String,
        conn_id: i32,
        trans_id: i32,
        execute: bool,
    },
    ResponseSendCompleted {
        status: i32,
        handle: u16,
    },
    NotificationSent {
        conn_id: i32,
        status: i32,
    },
    ServerCongestion {
        conn_id: i32,
        congested: bool,
    },
    MtuChanged {
        conn_id: i32,
        mtu: i32,
    },
}

impl GattEvent {
    /// Actor namespace whose channel receives this event
    pub fn actor_kind(&self) -> ActorKind {
        use GattEvent::*;
        match self {
            ClientRegistered { .. }
            | Connected { .. }
            | Disconnected { .. }
            | SearchCompleted { .. }
            | NotificationRegistered { .. }
            | Notify { .. }
            | CharacteristicRead { .. }
            | CharacteristicWritten { .. }
            | DescriptorRead { .. }
            | DescriptorWritten { .. }
            | ExecuteWriteCompleted { .. }
            | RemoteRssiRead { .. }
            | MtuConfigured { .. }
            | ClientCongestion { .. }
            | GattDbRetrieved { .. } => ActorKind::Client,

            ScannerRegistered { .. }
            | ScanResult { .. }
            | ScanFilterConfigured { .. }
            | ScanFilterParamsConfigured { .. }
            | ScanFilterEnabled { .. }
            | BatchScanStorageConfigured { .. }
            | BatchScanStartStopped { .. }
            | BatchScanReports { .. }
            | BatchScanThresholdCrossed { .. }
            | TrackAdvFoundLost(_)
            | ScanParamSetupCompleted { .. } => ActorKind::Scanner,

            AdvertiserRegistered { .. } | AdvertiserStarted { .. } | AdvertiserEnabled { .. } => {
                ActorKind::Advertiser
            }

            ServerRegistered { .. }
            | ServerConnection { .. }
            | ServiceAdded { .. }
            | ServiceStopped { .. }
            | ServiceDeleted { .. }
            | ServerReadRequest { .. }
            | ServerWriteRequest { .. }
            | ExecuteWriteRequest { .. }
            | ResponseSendCompleted { .. }
            | NotificationSent { .. }
            | ServerCongestion { .. }
            | MtuChanged { .. } => ActorKind::Server,
        }
    }

    /// Status code carried by completion events
    pub fn status(&self) -> Option<i32> {
        use GattEvent::*;
        match self {
            ClientRegistered { status, .. }
            | Connected { status, .. }
            | Disconnected { status, .. }
            | SearchCompleted { status, .. }
            | NotificationRegistered { status, .. }
            | CharacteristicRead { status, .. }
            | CharacteristicWritten { status, .. }
            | DescriptorRead { status, .. }
            | DescriptorWritten { status, .. }
            | ExecuteWriteCompleted { status, .. }
            | RemoteRssiRead { status, .. }
            | MtuConfigured { status, .. }
            | ScanFilterConfigured { status, .. }
            | ScanFilterParamsConfigured { status, .. }
            | ScanFilterEnabled { status, .. }
            | BatchScanStorageConfigured { status, .. }
            | BatchScanStartStopped { status, .. }
            | BatchScanReports { status, .. }
            | ScanParamSetupCompleted { status, .. }
            | ServerRegistered { status, .. }
            | ServiceAdded { status, .. }
            | ServiceStopped { status, .. }
            | ServiceDeleted { status, .. }
            | ResponseSendCompleted { status, .. }
            | NotificationSent { status, .. } => Some(*status),
            ScannerRegistered { status, .. }
            | AdvertiserRegistered { status, .. }
            | AdvertiserStarted { status, .. }
            | AdvertiserEnabled { status, .. } => Some(*status as i32),
            _ => None,
        }
    }

    /// App UUID reported by a registration completion
    pub fn registered_uuid(&self) -> Option<Uuid128> {
        use GattEvent::*;
        match self {
            ClientRegistered {
                uuid_msb, uuid_lsb, ..
            }
            | ScannerRegistered {
                uuid_msb, uuid_lsb, ..
            }
            | AdvertiserRegistered {
                uuid_msb, uuid_lsb, ..
            }
            | ServerRegistered {
                uuid_msb, uuid_lsb, ..
            } => Some(crate::codec::encode_uuid(*uuid_msb, *uuid_lsb)),
            _ => None,
        }
    }
}

impl fmt::Display for GattEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use GattEvent::*;
        match self {
            ClientRegistered {
                status, client_if, ..
            } => write!(f, "ClientRegistered {{ client_if: {}, status: {} }}", client_if, status),
            Connected {
                conn_id, address, status, ..
            } => write!(f, "Connected {{ conn_id: {}, address: {}, status: {} }}", conn_id, address, status),
            Disconnected {
                conn_id, address, status, ..
            } => write!(f, "Disconnected {{ conn_id: {}, address: {}, status: {} }}", conn_id, address, status),
            CharacteristicRead {
                conn_id,
                handle,
                status,
                value,
            } => write!(
                f,
                "CharacteristicRead {{ conn_id: {}, handle: 0x{:04x}, status: {}, value_len: {} }}",
                conn_id,
                handle,
                status,
                value.len()
            ),
            DescriptorRead {
                conn_id,
                handle,
                status,
                value,
            } => write!(
                f,
                "DescriptorRead {{ conn_id: {}, handle: 0x{:04x}, status: {}, value_len: {} }}",
                conn_id,
                handle,
                status,
                value.len()
            ),
            Notify {
                conn_id,
                handle,
                value,
                ..
            } => write!(
                f,
                "Notify {{ conn_id: {}, handle: 0x{:04x}, value_len: {} }}",
                conn_id,
                handle,
                value.len()
            ),
            GattDbRetrieved { conn_id, rows } => {
                write!(f, "GattDbRetrieved {{ conn_id: {}, rows: {} }}", conn_id, rows.len())
            }
            ServiceAdded {
                status,
                server_if,
                rows,
            } => write!(
                f,
                "ServiceAdded {{ server_if: {}, status: {}, rows: {} }}",
                server_if,
                status,
                rows.len()
            ),
            ScanResult { address, rssi, .. } => {
                write!(f, "ScanResult {{ address: {}, rssi: {} }}", address, rssi)
            }
            ServerReadRequest {
                target,
                conn_id,
                trans_id,
                attr_handle,
                ..
            } => write!(
                f,
                "ServerReadRequest {{ {:?}, conn_id: {}, trans_id: {}, handle: 0x{:04x} }}",
                target, conn_id, trans_id, attr_handle
            ),
            ServerWriteRequest {
                target,
                conn_id,
                trans_id,
                attr_handle,
                length,
                ..
            } => write!(
                f,
                "ServerWriteRequest {{ {:?}, conn_id: {}, trans_id: {}, handle: 0x{:04x}, len: {} }}",
                target, conn_id, trans_id, attr_handle, length
            ),
            SearchCompleted { conn_id, status } => {
                write!(f, "SearchCompleted {{ conn_id: {}, status: {} }}", conn_id, status)
            }
            NotificationRegistered {
                conn_id,
                status,
                registered,
                handle,
            } => write!(
                f,
                "NotificationRegistered {{ conn_id: {}, handle: 0x{:04x}, registered: {}, status: {} }}",
                conn_id, handle, registered, status
            ),
            CharacteristicWritten {
                conn_id,
                status,
                handle,
            } => write!(
                f,
                "CharacteristicWritten {{ conn_id: {}, handle: 0x{:04x}, status: {} }}",
                conn_id, handle, status
            ),
            DescriptorWritten {
                conn_id,
                status,
                handle,
            } => write!(
                f,
                "DescriptorWritten {{ conn_id: {}, handle: 0x{:04x}, status: {} }}",
                conn_id, handle, status
            ),
            ExecuteWriteCompleted { conn_id, status } => {
                write!(f, "ExecuteWriteCompleted {{ conn_id: {}, status: {} }}", conn_id, status)
            }
            RemoteRssiRead {
                client_if,
                address,
                rssi,
                status,
            } => write!(
                f,
                "RemoteRssiRead {{ client_if: {}, address: {}, rssi: {}, status: {} }}",
                client_if, address, rssi, status
            ),
            MtuConfigured {
                conn_id,
                status,
                mtu,
            } => write!(f, "MtuConfigured {{ conn_id: {}, mtu: {}, status: {} }}", conn_id, mtu, status),
            ClientCongestion { conn_id, congested } => {
                write!(f, "ClientCongestion {{ conn_id: {}, congested: {} }}", conn_id, congested)
            }
            ScannerRegistered {
                status, scanner_id, ..
            } => write!(f, "ScannerRegistered {{ scanner_id: {}, status: {} }}", scanner_id, status),
            ScanFilterConfigured {
                action,
                status,
                scanner_id,
                filter_type,
                available_space,
            } => write!(
                f,
                "ScanFilterConfigured {{ scanner_id: {}, action: {}, filter_type: {}, available_space: {}, status: {} }}",
                scanner_id, action, filter_type, available_space, status
            ),
            ScanFilterParamsConfigured {
                action,
                status,
                scanner_id,
                available_space,
            } => write!(
                f,
                "ScanFilterParamsConfigured {{ scanner_id: {}, action: {}, available_space: {}, status: {} }}",
                scanner_id, action, available_space, status
            ),
            ScanFilterEnabled {
                enable,
                status,
                scanner_id,
            } => write!(
                f,
                "ScanFilterEnabled {{ scanner_id: {}, enable: {}, status: {} }}",
                scanner_id, enable, status
            ),
            BatchScanStorageConfigured { status, scanner_id } => write!(
                f,
                "BatchScanStorageConfigured {{ scanner_id: {}, status: {} }}",
                scanner_id, status
            ),
            BatchScanStartStopped {
                start,
                status,
                scanner_id,
            } => write!(
                f,
                "BatchScanStartStopped {{ scanner_id: {}, start: {}, status: {} }}",
                scanner_id, start, status
            ),
            BatchScanReports {
                status,
                scanner_id,
                report_format,
                num_records,
                data,
            } => write!(
                f,
                "BatchScanReports {{ scanner_id: {}, format: {}, records: {}, data_len: {}, status: {} }}",
                scanner_id,
                report_format,
                num_records,
                data.len(),
                status
            ),
            BatchScanThresholdCrossed { scanner_id } => {
                write!(f, "BatchScanThresholdCrossed {{ scanner_id: {} }}", scanner_id)
            }
            TrackAdvFoundLost(info) => write!(
                f,
                "TrackAdvFoundLost {{ scanner_id: {}, filter_index: {}, address: {}, state: {}, rssi: {} }}",
                info.scanner_id, info.filter_index, info.address, info.advertiser_state, info.rssi
            ),
            ScanParamSetupCompleted { status, scanner_id } => write!(
                f,
                "ScanParamSetupCompleted {{ scanner_id: {}, status: {} }}",
                scanner_id, status
            ),
            AdvertiserRegistered {
                status,
                advertiser_id,
                ..
            } => write!(
                f,
                "AdvertiserRegistered {{ advertiser_id: {}, status: {} }}",
                advertiser_id, status
            ),
            AdvertiserStarted {
                status,
                advertiser_id,
            } => write!(
                f,
                "AdvertiserStarted {{ advertiser_id: {}, status: {} }}",
                advertiser_id, status
            ),
            AdvertiserEnabled {
                status,
                advertiser_id,
                enable,
            } => write!(
                f,
                "AdvertiserEnabled {{ advertiser_id: {}, enable: {}, status: {} }}",
                advertiser_id, enable, status
            ),
            ServerRegistered {
                status, server_if, ..
            } => write!(f, "ServerRegistered {{ server_if: {}, status: {} }}", server_if, status),
            ServerConnection {
                address,
                connected,
                conn_id,
                server_if,
            } => write!(
                f,
                "ServerConnection {{ server_if: {}, conn_id: {}, address: {}, connected: {} }}",
                server_if, conn_id, address, connected
            ),
            ServiceStopped {
                status,
                server_if,
                service_handle,
            } => write!(
                f,
                "ServiceStopped {{ server_if: {}, handle: 0x{:04x}, status: {} }}",
                server_if, service_handle, status
            ),
            ServiceDeleted {
                status,
                server_if,
                service_handle,
            } => write!(
                f,
                "ServiceDeleted {{ server_if: {}, handle: 0x{:04x}, status: {} }}",
                server_if, service_handle, status
            ),
            ExecuteWriteRequest {
                address,
                conn_id,
                trans_id,
                execute,
            } => write!(
                f,
                "ExecuteWriteRequest {{ conn_id: {}, address: {}, trans_id: {}, execute: {} }}",
                conn_id, address, trans_id, execute
            ),
            ResponseSendCompleted { status, handle } => write!(
                f,
                "ResponseSendCompleted {{ handle: 0x{:04x}, status: {} }}",
                handle, status
            ),
            NotificationSent { conn_id, status } => {
                write!(f, "NotificationSent {{ conn_id: {}, status: {} }}", conn_id, status)
            }
            ServerCongestion { conn_id, congested } => {
                write!(f, "ServerCongestion {{ conn_id: {}, congested: {} }}", conn_id, congested)
            }
            MtuChanged { conn_id, mtu } => {
                write!(f, "MtuChanged {{ conn_id: {}, mtu: {} }}", conn_id, mtu)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_kind_routing() {
        let event = GattEvent::SearchCompleted {
            conn_id: 1,
            status: 0,
        };
        assert_eq!(event.actor_kind(), ActorKind::Client);

        let event = GattEvent::BatchScanThresholdCrossed { scanner_id: 2 };
        assert_eq!(event.actor_kind(), ActorKind::Scanner);

        let event = GattEvent::AdvertiserStarted {
            status: 0,
            advertiser_id: 1,
        };
        assert_eq!(event.actor_kind(), ActorKind::Advertiser);

        let event = GattEvent::MtuChanged {
            conn_id: 3,
            mtu: 185,
        };
        assert_eq!(event.actor_kind(), ActorKind::Server);
    }

    #[test]
    fn test_status_passthrough() {
        let event = GattEvent::MtuConfigured {
            conn_id: 1,
            status: 0x87,
            mtu: 23,
        };
        assert_eq!(event.status(), Some(0x87));
        assert_eq!(GattEvent::ClientCongestion { conn_id: 1, congested: true }.status(), None);
    }

    #[test]
    fn test_registered_uuid() {
        let event = GattEvent::ServerRegistered {
            status: 0,
            server_if: 4,
            uuid_msb: 1,
            uuid_lsb: 2,
        };
        assert_eq!(
            event.registered_uuid(),
            Some(crate::codec::encode_uuid(1, 2))
        );
    }

    #[test]
    fn test_event_display() {
        let event = GattEvent::CharacteristicRead {
            conn_id: 7,
            status: 0,
            handle: 0x2a,
            value: vec![1, 2, 3],
        };
        let display = event.to_string();
        assert!(display.contains("CharacteristicRead"));
        assert!(display.contains("0x002a"));
        assert!(display.contains("value_len: 3"));
    }

    #[test]
    fn test_server_event_display_matches_client() {
        let server = GattEvent::ServerConnection {
            address: "12:34:56:78:9A:BC".to_string(),
            connected: true,
            conn_id: 3,
            server_if: 1,
        }
        .to_string();
        assert_eq!(
            server,
            "ServerConnection { server_if: 1, conn_id: 3, address: 12:34:56:78:9A:BC, connected: true }"
        );
        assert!(!server.contains('"'));

        let client = GattEvent::Connected {
            client_if: 1,
            conn_id: 3,
            status: 0,
            address: "12:34:56:78:9A:BC".to_string(),
        }
        .to_string();
        assert!(client.contains("address: 12:34:56:78:9A:BC"));

        let scan = GattEvent::ScanFilterEnabled {
            enable: true,
            status: 0,
            scanner_id: 2,
        }
        .to_string();
        assert_eq!(scan, "ScanFilterEnabled { scanner_id: 2, enable: true, status: 0 }");

        let response = GattEvent::ResponseSendCompleted {
            status: 0,
            handle: 0x2a,
        }
        .to_string();
        assert_eq!(response, "ResponseSendCompleted { handle: 0x002a, status: 0 }");
    }

    #[test]
    fn test_actor_kind_display() {
        assert_eq!(ActorKind::Advertiser.to_string(), "Advertiser");
    }
}
