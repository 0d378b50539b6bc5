//! Boundary with the underlying GATT controller stack
//!
//! `GattStack` is the outbound call surface the bridge drives. `StackCallbacks`
//! is the inbound surface the stack invokes, from its own threads, when an
//! operation completes or a remote event arrives. Every outbound call is
//! fire-and-forget: results come back later through the matching callback.

use crate::codec::{
    DeviceAddress, FilterParams, ScanFilterCall, StackBuffer, StackDbElement, Uuid128,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Connection parameter update request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionParameters {
    pub min_interval: u16,
    pub max_interval: u16,
    pub latency: u16,
    pub timeout: u16,
}

/// Batch scan storage split (percentages of controller storage)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchScanStorage {
    pub max_full_reports_percent: u8,
    pub max_truncated_reports_percent: u8,
    pub notify_threshold_percent: u8,
}

/// Batch scan enable parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchScanParams {
    pub scan_mode: u8,
    pub scan_interval: u32,
    pub scan_window: u32,
    pub address_type: u8,
    pub discard_rule: u8,
}

/// Advertising set parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdvertiseParameters {
    pub event_properties: u16,
    pub min_interval: u32,
    pub max_interval: u32,
    pub channel_map: u8,
    pub tx_power: i8,
    pub primary_phy: u8,
    pub secondary_phy: u8,
    pub scan_request_notification_enable: bool,
}

/// Server response to an incoming read/write request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattResponse {
    pub handle: u16,
    pub offset: u16,
    pub auth_req: u8,
    pub value: StackBuffer,
}

/// Notification or indication received from a remote server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyParams {
    pub address: DeviceAddress,
    pub handle: u16,
    pub is_notify: bool,
    pub value: Vec<u8>,
}

/// Value delivered with a read completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadParams {
    pub handle: u16,
    pub value: Vec<u8>,
}

/// Advertisement tracking (found/lost) report
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackAdvInfo {
    pub scanner_id: i32,
    pub filter_index: u8,
    pub advertiser_state: u8,
    pub advertiser_info_present: u8,
    pub address: DeviceAddress,
    pub address_type: u8,
    pub tx_power: i8,
    pub rssi: i8,
    pub timestamp: u16,
    pub adv_packet: Vec<u8>,
    pub scan_response: Vec<u8>,
}

/// Outbound call surface of the GATT controller stack
#[cfg_attr(test, mockall::automock)]
pub trait GattStack: Send + Sync {
    /// Install callbacks. `Err(status)` means the stack refused to start.
    fn init(&self, callbacks: Arc<dyn StackCallbacks>) -> Result<(), i32>;
    fn cleanup(&self);

    // Client
    fn get_device_type(&self, address: DeviceAddress) -> i32;
    fn register_client(&self, app_uuid: Uuid128);
    fn unregister_client(&self, client_if: i32);
    fn connect(&self, client_if: i32, address: DeviceAddress, is_direct: bool, transport: i32);
    fn disconnect(&self, client_if: i32, address: DeviceAddress, conn_id: i32);
    fn refresh(&self, client_if: i32, address: DeviceAddress);
    fn search_service(&self, conn_id: i32, filter_uuid: Option<Uuid128>);
    fn get_gatt_db(&self, conn_id: i32);
    fn read_characteristic(&self, conn_id: i32, handle: u16, auth_req: i32);
    fn read_descriptor(&self, conn_id: i32, handle: u16, auth_req: i32);
    fn write_characteristic(
        &self,
        conn_id: i32,
        handle: u16,
        write_type: i32,
        auth_req: i32,
        value: Vec<u8>,
    );
    fn write_descriptor(&self, conn_id: i32, handle: u16, auth_req: i32, value: Vec<u8>);
    fn execute_write(&self, conn_id: i32, execute: bool);
    fn register_for_notification(&self, client_if: i32, address: DeviceAddress, handle: u16);
    fn deregister_for_notification(&self, client_if: i32, address: DeviceAddress, handle: u16);
    fn read_remote_rssi(&self, client_if: i32, address: DeviceAddress);
    fn configure_mtu(&self, conn_id: i32, mtu: i32);
    fn conn_parameter_update(&self, address: DeviceAddress, params: ConnectionParameters);

    // Scanner
    fn register_scanner(&self, app_uuid: Uuid128);
    fn unregister_scanner(&self, scanner_id: i32);
    fn scan(&self, start: bool);
    fn set_scan_parameters(&self, scanner_id: i32, scan_interval: u32, scan_window: u32);
    fn scan_filter_param_setup(
        &self,
        scanner_id: i32,
        action: u8,
        filter_index: u8,
        params: Option<FilterParams>,
    );
    fn scan_filter_add_remove(&self, scanner_id: i32, call: ScanFilterCall);
    fn scan_filter_clear(&self, scanner_id: i32, filter_index: u8);
    fn scan_filter_enable(&self, scanner_id: i32, enable: bool);
    fn batchscan_config_storage(&self, scanner_id: i32, storage: BatchScanStorage);
    fn batchscan_enable(&self, scanner_id: i32, params: BatchScanParams);
    fn batchscan_disable(&self, scanner_id: i32);
    fn batchscan_read_reports(&self, scanner_id: i32, scan_type: u8);

    // Advertiser
    fn register_advertiser(&self, app_uuid: Uuid128);
    fn start_advertising(
        &self,
        advertiser_id: u8,
        params: AdvertiseParameters,
        adv_data: Vec<u8>,
        scan_response: Vec<u8>,
        timeout_s: u16,
    );
    fn enable_advertising(&self, advertiser_id: u8, enable: bool, timeout_s: u16);
    fn unregister_advertiser(&self, advertiser_id: u8);

    // Server
    fn register_server(&self, app_uuid: Uuid128);
    fn unregister_server(&self, server_if: i32);
    fn server_connect(&self, server_if: i32, address: DeviceAddress, is_direct: bool, transport: i32);
    fn server_disconnect(&self, server_if: i32, address: DeviceAddress, conn_id: i32);
    fn add_service(&self, server_if: i32, service: Vec<StackDbElement>);
    fn stop_service(&self, server_if: i32, service_handle: u16);
    fn delete_service(&self, server_if: i32, service_handle: u16);
    fn send_indication(
        &self,
        server_if: i32,
        attr_handle: u16,
        conn_id: i32,
        confirm: bool,
        value: Vec<u8>,
    );
    fn send_response(&self, conn_id: i32, trans_id: i32, status: i32, response: GattResponse);
}

/// Inbound callbacks invoked by the stack, possibly from several threads
pub trait StackCallbacks: Send + Sync {
    // Client
    fn register_client_cb(&self, status: i32, client_if: i32, app_uuid: Uuid128);
    fn open_cb(&self, conn_id: i32, status: i32, client_if: i32, address: DeviceAddress);
    fn close_cb(&self, conn_id: i32, status: i32, client_if: i32, address: DeviceAddress);
    fn search_complete_cb(&self, conn_id: i32, status: i32);
    fn register_for_notification_cb(&self, conn_id: i32, registered: bool, status: i32, handle: u16);
    fn notify_cb(&self, conn_id: i32, params: NotifyParams);
    fn read_characteristic_cb(&self, conn_id: i32, status: i32, params: ReadParams);
    fn write_characteristic_cb(&self, conn_id: i32, status: i32, handle: u16);
    fn read_descriptor_cb(&self, conn_id: i32, status: i32, params: ReadParams);
    fn write_descriptor_cb(&self, conn_id: i32, status: i32, handle: u16);
    fn execute_write_cb(&self, conn_id: i32, status: i32);
    fn remote_rssi_cb(&self, client_if: i32, address: DeviceAddress, rssi: i32, status: i32);
    fn configure_mtu_cb(&self, conn_id: i32, status: i32, mtu: i32);
    fn congestion_cb(&self, conn_id: i32, congested: bool);
    fn get_gatt_db_cb(&self, conn_id: i32, db: Vec<StackDbElement>);

    // Scanner
    fn register_scanner_cb(&self, app_uuid: Uuid128, scanner_id: u8, status: u8);
    fn scan_result_cb(&self, address: DeviceAddress, rssi: i32, adv_data: Vec<u8>);
    fn scan_filter_cfg_cb(
        &self,
        action: u8,
        scanner_id: i32,
        status: i32,
        filter_type: u8,
        available_space: i32,
    );
    fn scan_filter_param_cb(&self, action: u8, scanner_id: i32, status: i32, available_space: i32);
    fn scan_filter_status_cb(&self, enable: bool, scanner_id: i32, status: i32);
    fn batchscan_cfg_storage_cb(&self, scanner_id: i32, status: i32);
    fn batchscan_startstop_cb(&self, start: bool, scanner_id: i32, status: i32);
    fn batchscan_reports_cb(
        &self,
        scanner_id: i32,
        status: i32,
        report_format: i32,
        num_records: i32,
        data: Vec<u8>,
    );
    fn batchscan_threshold_cb(&self, scanner_id: i32);
    fn track_adv_event_cb(&self, info: TrackAdvInfo);
    fn scan_parameter_setup_completed_cb(&self, scanner_id: i32, status: i32);

    // Advertiser
    fn advertiser_register_cb(&self, app_uuid: Uuid128, advertiser_id: u8, status: u8);
    fn advertiser_start_cb(&self, advertiser_id: u8, status: u8);
    fn advertiser_enable_cb(&self, enable: bool, advertiser_id: u8, status: u8);

    // Server
    fn register_server_cb(&self, status: i32, server_if: i32, app_uuid: Uuid128);
    fn connection_cb(&self, conn_id: i32, server_if: i32, connected: bool, address: DeviceAddress);
    fn service_added_cb(&self, status: i32, server_if: i32, service: Vec<StackDbElement>);
    fn service_stopped_cb(&self, status: i32, server_if: i32, service_handle: u16);
    fn service_deleted_cb(&self, status: i32, server_if: i32, service_handle: u16);
    fn request_read_characteristic_cb(
        &self,
        conn_id: i32,
        trans_id: i32,
        address: DeviceAddress,
        attr_handle: u16,
        offset: u16,
        is_long: bool,
    );
    fn request_read_descriptor_cb(
        &self,
        conn_id: i32,
        trans_id: i32,
        address: DeviceAddress,
        attr_handle: u16,
        offset: u16,
        is_long: bool,
    );
    #[allow(clippy::too_many_arguments)]
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
    );
    #[allow(clippy::too_many_arguments)]
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
    );
    fn request_exec_write_cb(&self, conn_id: i32, trans_id: i32, address: DeviceAddress, execute: bool);
    fn response_confirmation_cb(&self, status: i32, handle: u16);
    fn indication_sent_cb(&self, conn_id: i32, status: i32);
    fn server_congestion_cb(&self, conn_id: i32, congested: bool);
    fn mtu_changed_cb(&self, conn_id: i32, mtu: i32);
}
