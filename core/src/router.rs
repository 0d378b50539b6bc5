//! Handle-correlated callback router
//!
//! Implements `StackCallbacks`. Every stack callback is decoded into exactly
//! one `GattEvent` carrying the identifiers from the callback arguments
//! verbatim; nothing is inferred from earlier calls. The event then goes to a
//! registered waiter for its correlation key, or else to the channel of its
//! actor kind. With no sink installed the event is dropped, never queued.
//!
//! Callbacks may arrive on any stack thread, concurrently with outbound calls
//! made on consumer threads.

use crate::codec::{
    self, decode_table, duplicate_handle, format_address, AttributeRow, DeviceAddress,
    StackDbElement, Uuid128,
};
use crate::events::{ActorKind, AdvTrackingInfo, AttributeTarget, GattEvent};
use crate::pending::{CorrelationKey, Pending, PendingTable};
use crate::stack::{NotifyParams, ReadParams, StackCallbacks, TrackAdvInfo};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Legacy advertisement report size forwarded with raw scan results
pub const ADV_REPORT_LEN: usize = 62;

/// Sending half of the per-actor event channels
#[derive(Debug, Clone)]
pub struct EventSink {
    client: mpsc::UnboundedSender<GattEvent>,
    scanner: mpsc::UnboundedSender<GattEvent>,
    advertiser: mpsc::UnboundedSender<GattEvent>,
    server: mpsc::UnboundedSender<GattEvent>,
}

/// Receiving half of the per-actor event channels
#[derive(Debug)]
pub struct EventReceivers {
    pub client: mpsc::UnboundedReceiver<GattEvent>,
    pub scanner: mpsc::UnboundedReceiver<GattEvent>,
    pub advertiser: mpsc::UnboundedReceiver<GattEvent>,
    pub server: mpsc::UnboundedReceiver<GattEvent>,
}

impl EventSink {
    /// Create a sink and the matching receivers
    pub fn channel() -> (EventSink, EventReceivers) {
        let (client_tx, client_rx) = mpsc::unbounded_channel();
        let (scanner_tx, scanner_rx) = mpsc::unbounded_channel();
        let (advertiser_tx, advertiser_rx) = mpsc::unbounded_channel();
        let (server_tx, server_rx) = mpsc::unbounded_channel();
        (
            EventSink {
                client: client_tx,
                scanner: scanner_tx,
                advertiser: advertiser_tx,
                server: server_tx,
            },
            EventReceivers {
                client: client_rx,
                scanner: scanner_rx,
                advertiser: advertiser_rx,
                server: server_rx,
            },
        )
    }

    fn sender(&self, kind: ActorKind) -> &mpsc::UnboundedSender<GattEvent> {
        match kind {
            ActorKind::Client => &self.client,
            ActorKind::Scanner => &self.scanner,
            ActorKind::Advertiser => &self.advertiser,
            ActorKind::Server => &self.server,
        }
    }

    fn send(&self, event: GattEvent) -> bool {
        self.sender(event.actor_kind()).send(event).is_ok()
    }
}

/// Outcome of routing one stack callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Sent on the actor channel
    Delivered,
    /// Handed to a waiter registered for the correlation key
    Correlated,
    /// No sink installed, or the consumer hung up
    Dropped,
}

/// Decodes stack callbacks and delivers them to the consumer
pub struct CallbackRouter {
    sink: RwLock<Option<EventSink>>,
    pending: PendingTable,
    adv_report_len: usize,
}

impl Default for CallbackRouter {
    fn default() -> Self {
        Self::new(ADV_REPORT_LEN)
    }
}

impl CallbackRouter {
    pub fn new(adv_report_len: usize) -> Self {
        Self {
            sink: RwLock::new(None),
            pending: PendingTable::new(),
            adv_report_len,
        }
    }

    pub fn install_sink(&self, sink: EventSink) {
        *self.sink.write() = Some(sink);
    }

    /// Remove the sink and cancel every outstanding waiter
    pub fn remove_sink(&self) -> Option<EventSink> {
        let cancelled = self.pending.clear();
        if cancelled > 0 {
            debug!("Cancelled {} pending waiters", cancelled);
        }
        self.sink.write().take()
    }

    pub fn has_sink(&self) -> bool {
        self.sink.read().is_some()
    }

    pub fn pending(&self) -> &PendingTable {
        &self.pending
    }

    pub(crate) fn register_waiter(&self, key: CorrelationKey) -> Pending {
        self.pending.register(key)
    }

    /// Route one decoded event
    pub fn deliver(&self, key: Option<CorrelationKey>, event: GattEvent) -> Delivery {
        let sink = self.sink.read();
        let Some(sink) = sink.as_ref() else {
            debug!("Dropping {}: no delivery sink installed", event);
            return Delivery::Dropped;
        };

        let event = match key {
            Some(key) => match self.pending.complete(&key, event) {
                Ok(()) => return Delivery::Correlated,
                Err(event) => event,
            },
            None => event,
        };

        let kind = event.actor_kind();
        if sink.send(event) {
            Delivery::Delivered
        } else {
            debug!("Dropping {} event: receiver closed", kind);
            Delivery::Dropped
        }
    }

    fn decode_rows(&self, context: &str, elements: &[StackDbElement]) -> Vec<AttributeRow> {
        let rows = match decode_table(elements) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("{}: {}; skipping undecodable elements", context, e);
                elements
                    .iter()
                    .filter_map(|element| {
                        decode_table(std::slice::from_ref(element))
                            .ok()
                            .and_then(|mut rows| rows.pop())
                    })
                    .collect()
            }
        };
        if let Some(handle) = duplicate_handle(&rows) {
            warn!("{}: attribute handle {} appears more than once", context, handle);
        }
        rows
    }
}

fn uuid_halves(uuid: &Uuid128) -> (u64, u64) {
    codec::decode_uuid(uuid)
}

impl StackCallbacks for CallbackRouter {
    // ------------------------------------------------------------------
    // Client
    // ------------------------------------------------------------------

    fn register_client_cb(&self, status: i32, client_if: i32, app_uuid: Uuid128) {
        let (uuid_msb, uuid_lsb) = uuid_halves(&app_uuid);
        self.deliver(
            Some(CorrelationKey::Registration {
                kind: ActorKind::Client,
                app_uuid,
            }),
            GattEvent::ClientRegistered {
                status,
                client_if,
                uuid_msb,
                uuid_lsb,
            },
        );
    }

    fn open_cb(&self, conn_id: i32, status: i32, client_if: i32, address: DeviceAddress) {
        self.deliver(
            None,
            GattEvent::Connected {
                client_if,
                conn_id,
                status,
                address: format_address(&address),
            },
        );
    }

    fn close_cb(&self, conn_id: i32, status: i32, client_if: i32, address: DeviceAddress) {
        self.deliver(
            None,
            GattEvent::Disconnected {
                client_if,
                conn_id,
                status,
                address: format_address(&address),
            },
        );
    }

    fn search_complete_cb(&self, conn_id: i32, status: i32) {
        self.deliver(
            Some(CorrelationKey::ServiceSearch { conn_id }),
            GattEvent::SearchCompleted { conn_id, status },
        );
    }

    fn register_for_notification_cb(&self, conn_id: i32, registered: bool, status: i32, handle: u16) {
        self.deliver(
            None,
            GattEvent::NotificationRegistered {
                conn_id,
                status,
                registered,
                handle,
            },
        );
    }

    fn notify_cb(&self, conn_id: i32, params: NotifyParams) {
        self.deliver(
            None,
            GattEvent::Notify {
                conn_id,
                address: format_address(&params.address),
                handle: params.handle,
                is_notify: params.is_notify,
                value: params.value,
            },
        );
    }

    fn read_characteristic_cb(&self, conn_id: i32, status: i32, params: ReadParams) {
        let handle = params.handle;
        self.deliver(
            Some(CorrelationKey::CharacteristicRead { conn_id, handle }),
            GattEvent::CharacteristicRead {
                conn_id,
                status,
                handle,
                value: codec::from_stack(status, &params.value),
            },
        );
    }

    fn write_characteristic_cb(&self, conn_id: i32, status: i32, handle: u16) {
        self.deliver(
            Some(CorrelationKey::CharacteristicWrite { conn_id, handle }),
            GattEvent::CharacteristicWritten {
                conn_id,
                status,
                handle,
            },
        );
    }

    fn read_descriptor_cb(&self, conn_id: i32, status: i32, params: ReadParams) {
        let handle = params.handle;
        self.deliver(
            Some(CorrelationKey::DescriptorRead { conn_id, handle }),
            GattEvent::DescriptorRead {
                conn_id,
                status,
                handle,
                value: codec::from_stack(status, &params.value),
            },
        );
    }

    fn write_descriptor_cb(&self, conn_id: i32, status: i32, handle: u16) {
        self.deliver(
            Some(CorrelationKey::DescriptorWrite { conn_id, handle }),
            GattEvent::DescriptorWritten {
                conn_id,
                status,
                handle,
            },
        );
    }

    fn execute_write_cb(&self, conn_id: i32, status: i32) {
        self.deliver(
            Some(CorrelationKey::ExecuteWrite { conn_id }),
            GattEvent::ExecuteWriteCompleted { conn_id, status },
        );
    }

    fn remote_rssi_cb(&self, client_if: i32, address: DeviceAddress, rssi: i32, status: i32) {
        self.deliver(
            Some(CorrelationKey::RemoteRssi { client_if, address }),
            GattEvent::RemoteRssiRead {
                client_if,
                address: format_address(&address),
                rssi,
                status,
            },
        );
    }

    fn configure_mtu_cb(&self, conn_id: i32, status: i32, mtu: i32) {
        self.deliver(
            Some(CorrelationKey::Mtu { conn_id }),
            GattEvent::MtuConfigured {
                conn_id,
                status,
                mtu,
            },
        );
    }

    fn congestion_cb(&self, conn_id: i32, congested: bool) {
        self.deliver(None, GattEvent::ClientCongestion { conn_id, congested });
    }

    fn get_gatt_db_cb(&self, conn_id: i32, db: Vec<StackDbElement>) {
        let rows = self.decode_rows("get_gatt_db", &db);
        self.deliver(
            Some(CorrelationKey::GattDb { conn_id }),
            GattEvent::GattDbRetrieved { conn_id, rows },
        );
    }

    // ------------------------------------------------------------------
    // Scanner
    // ------------------------------------------------------------------

    fn register_scanner_cb(&self, app_uuid: Uuid128, scanner_id: u8, status: u8) {
        let (uuid_msb, uuid_lsb) = uuid_halves(&app_uuid);
        self.deliver(
            Some(CorrelationKey::Registration {
                kind: ActorKind::Scanner,
                app_uuid,
            }),
            GattEvent::ScannerRegistered {
                status,
                scanner_id,
                uuid_msb,
                uuid_lsb,
            },
        );
    }

    fn scan_result_cb(&self, address: DeviceAddress, rssi: i32, adv_data: Vec<u8>) {
        self.deliver(
            None,
            GattEvent::ScanResult {
                address: format_address(&address),
                rssi,
                adv_data: codec::value::fixed_report(&adv_data, self.adv_report_len),
            },
        );
    }

    fn scan_filter_cfg_cb(
        &self,
        action: u8,
        scanner_id: i32,
        status: i32,
        filter_type: u8,
        available_space: i32,
    ) {
        self.deliver(
            None,
            GattEvent::ScanFilterConfigured {
                action,
                status,
                scanner_id,
                filter_type,
                available_space,
            },
        );
    }

    fn scan_filter_param_cb(&self, action: u8, scanner_id: i32, status: i32, available_space: i32) {
        self.deliver(
            None,
            GattEvent::ScanFilterParamsConfigured {
                action,
                status,
                scanner_id,
                available_space,
            },
        );
    }

    fn scan_filter_status_cb(&self, enable: bool, scanner_id: i32, status: i32) {
        self.deliver(
            None,
            GattEvent::ScanFilterEnabled {
                enable,
                status,
                scanner_id,
            },
        );
    }

    fn batchscan_cfg_storage_cb(&self, scanner_id: i32, status: i32) {
        self.deliver(
            None,
            GattEvent::BatchScanStorageConfigured { status, scanner_id },
        );
    }

    fn batchscan_startstop_cb(&self, start: bool, scanner_id: i32, status: i32) {
        self.deliver(
            None,
            GattEvent::BatchScanStartStopped {
                start,
                status,
                scanner_id,
            },
        );
    }

    fn batchscan_reports_cb(
        &self,
        scanner_id: i32,
        status: i32,
        report_format: i32,
        num_records: i32,
        data: Vec<u8>,
    ) {
        self.deliver(
            None,
            GattEvent::BatchScanReports {
                status,
                scanner_id,
                report_format,
                num_records,
                data,
            },
        );
    }

    fn batchscan_threshold_cb(&self, scanner_id: i32) {
        self.deliver(None, GattEvent::BatchScanThresholdCrossed { scanner_id });
    }

    fn track_adv_event_cb(&self, info: TrackAdvInfo) {
        self.deliver(
            None,
            GattEvent::TrackAdvFoundLost(AdvTrackingInfo {
                scanner_id: info.scanner_id,
                filter_index: info.filter_index,
                advertiser_state: info.advertiser_state,
                advertiser_info_present: info.advertiser_info_present,
                address: format_address(&info.address),
                address_type: info.address_type,
                tx_power: info.tx_power,
                rssi: info.rssi,
                timestamp: info.timestamp,
                adv_packet: info.adv_packet,
                scan_response: info.scan_response,
            }),
        );
    }

    fn scan_parameter_setup_completed_cb(&self, scanner_id: i32, status: i32) {
        self.deliver(
            None,
            GattEvent::ScanParamSetupCompleted { status, scanner_id },
        );
    }

    // ------------------------------------------------------------------
    // Advertiser
    // ------------------------------------------------------------------

    fn advertiser_register_cb(&self, app_uuid: Uuid128, advertiser_id: u8, status: u8) {
        let (uuid_msb, uuid_lsb) = uuid_halves(&app_uuid);
        self.deliver(
            Some(CorrelationKey::Registration {
                kind: ActorKind::Advertiser,
                app_uuid,
            }),
            GattEvent::AdvertiserRegistered {
                status,
                advertiser_id,
                uuid_msb,
                uuid_lsb,
            },
        );
    }

    fn advertiser_start_cb(&self, advertiser_id: u8, status: u8) {
        self.deliver(
            None,
            GattEvent::AdvertiserStarted {
                status,
                advertiser_id,
            },
        );
    }

    fn advertiser_enable_cb(&self, enable: bool, advertiser_id: u8, status: u8) {
        self.deliver(
            None,
            GattEvent::AdvertiserEnabled {
                status,
                advertiser_id,
                enable,
            },
        );
    }

    // ------------------------------------------------------------------
    // Server
    // ------------------------------------------------------------------

    fn register_server_cb(&self, status: i32, server_if: i32, app_uuid: Uuid128) {
        let (uuid_msb, uuid_lsb) = uuid_halves(&app_uuid);
        self.deliver(
            Some(CorrelationKey::Registration {
                kind: ActorKind::Server,
                app_uuid,
            }),
            GattEvent::ServerRegistered {
                status,
                server_if,
                uuid_msb,
                uuid_lsb,
            },
        );
    }

    fn connection_cb(&self, conn_id: i32, server_if: i32, connected: bool, address: DeviceAddress) {
        self.deliver(
            None,
            GattEvent::ServerConnection {
                address: format_address(&address),
                connected,
                conn_id,
                server_if,
            },
        );
    }

    fn service_added_cb(&self, status: i32, server_if: i32, service: Vec<StackDbElement>) {
        let rows = self.decode_rows("service_added", &service);
        self.deliver(
            None,
            GattEvent::ServiceAdded {
                status,
                server_if,
                rows,
            },
        );
    }

    fn service_stopped_cb(&self, status: i32, server_if: i32, service_handle: u16) {
        self.deliver(
            None,
            GattEvent::ServiceStopped {
                status,
                server_if,
                service_handle,
            },
        );
    }

    fn service_deleted_cb(&self, status: i32, server_if: i32, service_handle: u16) {
        self.deliver(
            None,
            GattEvent::ServiceDeleted {
                status,
                server_if,
                service_handle,
            },
        );
    }

    fn request_read_characteristic_cb(
        &self,
        conn_id: i32,
        trans_id: i32,
        address: DeviceAddress,
        attr_handle: u16,
        offset: u16,
        is_long: bool,
    ) {
        self.deliver(
            None,
            GattEvent::ServerReadRequest {
                target: AttributeTarget::Characteristic,
                address: format_address(&address),
                conn_id,
                trans_id,
                attr_handle,
                offset,
                is_long,
            },
        );
    }

    fn request_read_descriptor_cb(
        &self,
        conn_id: i32,
        trans_id: i32,
        address: DeviceAddress,
        attr_handle: u16,
        offset: u16,
        is_long: bool,
    ) {
        self.deliver(
            None,
            GattEvent::ServerReadRequest {
                target: AttributeTarget::Descriptor,
                address: format_address(&address),
                conn_id,
                trans_id,
                attr_handle,
                offset,
                is_long,
            },
        );
    }

    fn request_write_characteristic_cb(
        &self,
        conn_id: i32,
        trans_id: i32,
        address: DeviceAddress,
        attr_handle: u16,
        offset: u16,
        need_rsp: bool,
        is_prep: bool,
        value: Vec<u8>,
    ) {
        self.deliver(
            None,
            GattEvent::ServerWriteRequest {
                target: AttributeTarget::Characteristic,
                address: format_address(&address),
                conn_id,
                trans_id,
                attr_handle,
                offset,
                length: value.len(),
                need_rsp,
                is_prep,
                value,
            },
        );
    }

    fn request_write_descriptor_cb(
        &self,
        conn_id: i32,
        trans_id: i32,
        address: DeviceAddress,
        attr_handle: u16,
        offset: u16,
        need_rsp: bool,
        is_prep: bool,
        value: Vec<u8>,
    ) {
        self.deliver(
            None,
            GattEvent::ServerWriteRequest {
                target: AttributeTarget::Descriptor,
                address: format_address(&address),
                conn_id,
                trans_id,
                attr_handle,
                offset,
                length: value.len(),
                need_rsp,
                is_prep,
                value,
            },
        );
    }

    fn request_exec_write_cb(&self, conn_id: i32, trans_id: i32, address: DeviceAddress, execute: bool) {
        self.deliver(
            None,
            GattEvent::ExecuteWriteRequest {
                address: format_address(&address),
                conn_id,
                trans_id,
                execute,
            },
        );
    }

    fn response_confirmation_cb(&self, status: i32, handle: u16) {
        self.deliver(None, GattEvent::ResponseSendCompleted { status, handle });
    }

    fn indication_sent_cb(&self, conn_id: i32, status: i32) {
        self.deliver(None, GattEvent::NotificationSent { conn_id, status });
    }

    fn server_congestion_cb(&self, conn_id: i32, congested: bool) {
        self.deliver(None, GattEvent::ServerCongestion { conn_id, congested });
    }

    fn mtu_changed_cb(&self, conn_id: i32, mtu: i32) {
        self.deliver(None, GattEvent::MtuChanged { conn_id, mtu });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{
        encode_table, encode_uuid, parse_address, AttributeKind, READ_FAILURE_SENTINEL,
    };

    fn router_with_sink() -> (CallbackRouter, EventReceivers) {
        let router = CallbackRouter::default();
        let (sink, receivers) = EventSink::channel();
        router.install_sink(sink);
        (router, receivers)
    }

    fn addr() -> DeviceAddress {
        parse_address("AA:BB:CC:DD:EE:FF").unwrap()
    }

    #[test]
    fn test_register_client_reports_same_halves() {
        let (router, mut rx) = router_with_sink();
        let uuid = encode_uuid(0x0102030405060708, 0x0a0b0c0d0e0f1011);
        router.register_client_cb(0, 5, uuid);

        assert_eq!(
            rx.client.try_recv().unwrap(),
            GattEvent::ClientRegistered {
                status: 0,
                client_if: 5,
                uuid_msb: 0x0102030405060708,
                uuid_lsb: 0x0a0b0c0d0e0f1011,
            }
        );
    }

    #[test]
    fn test_close_reports_formatted_address() {
        let (router, mut rx) = router_with_sink();
        router.close_cb(3, 0, 1, addr());
        match rx.client.try_recv().unwrap() {
            GattEvent::Disconnected { address, conn_id, .. } => {
                assert_eq!(address, "AA:BB:CC:DD:EE:FF");
                assert_eq!(conn_id, 3);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_no_sink_drops() {
        let router = CallbackRouter::default();
        let delivery = router.deliver(
            None,
            GattEvent::MtuChanged {
                conn_id: 1,
                mtu: 100,
            },
        );
        assert_eq!(delivery, Delivery::Dropped);
    }

    #[test]
    fn test_events_not_queued_across_sink_install() {
        let router = CallbackRouter::default();
        router.mtu_changed_cb(1, 185);

        let (sink, mut rx) = EventSink::channel();
        router.install_sink(sink);
        assert!(rx.server.try_recv().is_err());

        router.mtu_changed_cb(1, 247);
        assert_eq!(
            rx.server.try_recv().unwrap(),
            GattEvent::MtuChanged {
                conn_id: 1,
                mtu: 247
            }
        );
    }

    #[test]
    fn test_events_routed_by_actor_kind() {
        let (router, mut rx) = router_with_sink();
        router.batchscan_threshold_cb(2);
        router.advertiser_start_cb(1, 0);
        router.indication_sent_cb(4, 0);
        router.congestion_cb(4, true);

        assert!(matches!(
            rx.scanner.try_recv().unwrap(),
            GattEvent::BatchScanThresholdCrossed { scanner_id: 2 }
        ));
        assert!(matches!(
            rx.advertiser.try_recv().unwrap(),
            GattEvent::AdvertiserStarted { advertiser_id: 1, .. }
        ));
        assert!(matches!(
            rx.server.try_recv().unwrap(),
            GattEvent::NotificationSent { conn_id: 4, .. }
        ));
        assert!(matches!(
            rx.client.try_recv().unwrap(),
            GattEvent::ClientCongestion {
                conn_id: 4,
                congested: true
            }
        ));
    }

    #[test]
    fn test_failed_reads_use_sentinel_on_both_paths() {
        let (router, mut rx) = router_with_sink();
        let params = ReadParams {
            handle: 9,
            value: vec![],
        };
        router.read_characteristic_cb(1, 0x0A, params.clone());
        router.read_descriptor_cb(1, 0x0A, params);

        for _ in 0..2 {
            match rx.client.try_recv().unwrap() {
                GattEvent::CharacteristicRead { value, .. }
                | GattEvent::DescriptorRead { value, .. } => {
                    assert_eq!(value, vec![READ_FAILURE_SENTINEL])
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[test]
    fn test_successful_empty_read_stays_empty() {
        let (router, mut rx) = router_with_sink();
        router.read_descriptor_cb(
            1,
            0,
            ReadParams {
                handle: 9,
                value: vec![],
            },
        );
        match rx.client.try_recv().unwrap() {
            GattEvent::DescriptorRead { value, status, .. } => {
                assert_eq!(status, 0);
                assert!(value.is_empty());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_waiter_takes_precedence_over_channel() {
        let (router, mut rx) = router_with_sink();
        let waiter = router.register_waiter(CorrelationKey::CharacteristicRead {
            conn_id: 1,
            handle: 0x21,
        });

        router.read_characteristic_cb(
            1,
            0,
            ReadParams {
                handle: 0x21,
                value: vec![0xAA],
            },
        );
        router.read_characteristic_cb(
            1,
            0,
            ReadParams {
                handle: 0x22,
                value: vec![0xBB],
            },
        );

        match waiter.await.unwrap() {
            GattEvent::CharacteristicRead { handle, value, .. } => {
                assert_eq!(handle, 0x21);
                assert_eq!(value, vec![0xAA]);
            }
            other => panic!("unexpected event {:?}", other),
        }
        match rx.client.try_recv().unwrap() {
            GattEvent::CharacteristicRead { handle, .. } => assert_eq!(handle, 0x22),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.client.try_recv().is_err());
    }

    #[test]
    fn test_scan_result_normalised_to_report_len() {
        let (router, mut rx) = router_with_sink();
        router.scan_result_cb(addr(), -60, vec![0x02, 0x01, 0x06]);
        match rx.scanner.try_recv().unwrap() {
            GattEvent::ScanResult { adv_data, rssi, .. } => {
                assert_eq!(adv_data.len(), ADV_REPORT_LEN);
                assert_eq!(&adv_data[..3], &[0x02, 0x01, 0x06]);
                assert_eq!(rssi, -60);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_gatt_db_decoded_in_order() {
        let (router, mut rx) = router_with_sink();
        let rows = vec![
            AttributeRow::new(AttributeKind::PrimaryService, Uuid128::from_u16(0x180F))
                .with_handles(1, 1, 3),
            AttributeRow::new(AttributeKind::Characteristic, Uuid128::from_u16(0x2A19))
                .with_handles(3, 0, 0)
                .with_properties(0x12),
        ];
        router.get_gatt_db_cb(2, encode_table(&rows).unwrap());
        assert_eq!(
            rx.client.try_recv().unwrap(),
            GattEvent::GattDbRetrieved { conn_id: 2, rows }
        );
    }

    #[test]
    fn test_gatt_db_skips_unknown_elements() {
        let (router, mut rx) = router_with_sink();
        let rows = vec![
            AttributeRow::new(AttributeKind::PrimaryService, Uuid128::from_u16(0x180F))
                .with_handles(1, 1, 3),
            AttributeRow::new(AttributeKind::Characteristic, Uuid128::from_u16(0x2A19))
                .with_handles(3, 0, 0),
        ];
        let mut elements = encode_table(&rows).unwrap();
        elements[0].element_type = 42;
        router.get_gatt_db_cb(2, elements);
        match rx.client.try_recv().unwrap() {
            GattEvent::GattDbRetrieved { rows: decoded, .. } => {
                assert_eq!(decoded, vec![rows[1].clone()])
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_server_write_request_carries_transaction() {
        let (router, mut rx) = router_with_sink();
        router.request_write_descriptor_cb(6, 77, addr(), 0x2b, 0, true, false, vec![1, 0]);
        assert_eq!(
            rx.server.try_recv().unwrap(),
            GattEvent::ServerWriteRequest {
                target: AttributeTarget::Descriptor,
                address: "AA:BB:CC:DD:EE:FF".to_string(),
                conn_id: 6,
                trans_id: 77,
                attr_handle: 0x2b,
                offset: 0,
                length: 2,
                need_rsp: true,
                is_prep: false,
                value: vec![1, 0],
            }
        );
    }

    #[tokio::test]
    async fn test_remove_sink_cancels_waiters() {
        let (router, _rx) = router_with_sink();
        let waiter = router.register_waiter(CorrelationKey::Mtu { conn_id: 1 });
        assert!(router.remove_sink().is_some());
        assert!(!router.has_sink());
        assert_eq!(waiter.await, Err(crate::error::BridgeError::Cancelled));
    }

    #[test]
    fn test_closed_receiver_drops() {
        let router = CallbackRouter::default();
        let (sink, receivers) = EventSink::channel();
        router.install_sink(sink);
        drop(receivers);
        assert_eq!(
            router.deliver(None, GattEvent::BatchScanThresholdCrossed { scanner_id: 1 }),
            Delivery::Dropped
        );
    }
}
