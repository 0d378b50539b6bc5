/// In-process loopback GATT stack
///
/// Answers every outbound call by invoking the matching callback from its own
/// worker thread, the way a real controller stack reports completions
/// asynchronously. Remote peers are simulated from a fixed attribute database,
/// and the `simulate_*` methods inject remote-originated events (incoming
/// server requests, notifications, congestion) for demos and tests.

use crate::codec::{
    encode_table, AttributeRow, DeviceAddress, FilterParams, ScanFilterCall, StackDbElement,
    Uuid128,
};
use crate::stack::{
    AdvertiseParameters, BatchScanParams, BatchScanStorage, ConnectionParameters, GattResponse,
    GattStack, NotifyParams, ReadParams, StackCallbacks, TrackAdvInfo,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, warn};

pub const STATUS_SUCCESS: i32 = 0;
pub const STATUS_INVALID_HANDLE: i32 = 0x01;
pub const STATUS_ERROR: i32 = 0x85;

/// Device type reported for known peers (LE only)
pub const DEVICE_TYPE_LE: i32 = 2;

const MIN_MTU: i32 = 23;
const MAX_MTU: i32 = 517;
const FILTER_SLOTS: i32 = 16;

type Job = Box<dyn FnOnce(&dyn StackCallbacks) + Send>;

/// A simulated remote device
#[derive(Debug, Clone)]
pub struct LoopbackPeer {
    pub address: DeviceAddress,
    pub rssi: i32,
    pub adv_data: Vec<u8>,
    pub database: Vec<AttributeRow>,
    pub values: HashMap<u16, Vec<u8>>,
}

impl LoopbackPeer {
    pub fn new(address: DeviceAddress) -> Self {
        Self {
            address,
            rssi: -60,
            adv_data: Vec::new(),
            database: Vec::new(),
            values: HashMap::new(),
        }
    }

    pub fn with_rssi(mut self, rssi: i32) -> Self {
        self.rssi = rssi;
        self
    }

    pub fn with_adv_data(mut self, adv_data: Vec<u8>) -> Self {
        self.adv_data = adv_data;
        self
    }

    pub fn with_database(mut self, rows: Vec<AttributeRow>) -> Self {
        self.database = rows;
        self
    }

    pub fn with_value(mut self, handle: u16, value: Vec<u8>) -> Self {
        self.values.insert(handle, value);
        self
    }
}

/// Response captured by `send_response`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedResponse {
    pub conn_id: i32,
    pub trans_id: i32,
    pub status: i32,
    pub response: GattResponse,
}

#[derive(Default)]
struct LoopbackState {
    peers: HashMap<DeviceAddress, LoopbackPeer>,
    connections: HashMap<i32, DeviceAddress>,
    notifications: HashSet<(DeviceAddress, u16)>,
    local_services: HashMap<u16, Vec<StackDbElement>>,
    filter_slots_used: i32,
    next_client_if: i32,
    next_scanner_id: u8,
    next_advertiser_id: u8,
    next_server_if: i32,
    next_conn_id: i32,
    next_trans_id: i32,
    next_handle: u16,
    responses: Vec<RecordedResponse>,
    indications: Vec<(i32, u16, bool, Vec<u8>)>,
}

impl LoopbackState {
    fn new() -> Self {
        Self {
            next_client_if: 1,
            next_scanner_id: 1,
            next_advertiser_id: 1,
            next_server_if: 1,
            next_conn_id: 1,
            next_trans_id: 1,
            next_handle: 1,
            ..Default::default()
        }
    }

    fn open_connection(&mut self, address: DeviceAddress) -> i32 {
        let conn_id = self.next_conn_id;
        self.next_conn_id += 1;
        self.connections.insert(conn_id, address);
        conn_id
    }

    fn conn_for(&self, address: &DeviceAddress) -> Option<i32> {
        self.connections
            .iter()
            .find(|(_, a)| *a == address)
            .map(|(conn_id, _)| *conn_id)
    }

    fn peer_for_conn(&mut self, conn_id: i32) -> Option<&mut LoopbackPeer> {
        let address = self.connections.get(&conn_id)?;
        self.peers.get_mut(address)
    }

    fn mint_trans_id(&mut self) -> i32 {
        let trans_id = self.next_trans_id;
        self.next_trans_id += 1;
        trans_id
    }
}

struct Worker {
    tx: mpsc::Sender<Job>,
    handle: JoinHandle<()>,
}

/// Loopback implementation of `GattStack`
pub struct LoopbackStack {
    state: Mutex<LoopbackState>,
    worker: Mutex<Option<Worker>>,
    muted: AtomicBool,
}

impl Default for LoopbackStack {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackStack {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LoopbackState::new()),
            worker: Mutex::new(None),
            muted: AtomicBool::new(false),
        }
    }

    pub fn with_peer(self, peer: LoopbackPeer) -> Self {
        self.add_peer(peer);
        self
    }

    pub fn add_peer(&self, peer: LoopbackPeer) {
        self.state.lock().peers.insert(peer.address, peer);
    }

    /// While muted, calls are accepted but no callback is ever fired
    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Responses the bridge has sent, in order
    pub fn responses(&self) -> Vec<RecordedResponse> {
        self.state.lock().responses.clone()
    }

    /// Indications and notifications sent: (conn_id, handle, confirm, value)
    pub fn indications(&self) -> Vec<(i32, u16, bool, Vec<u8>)> {
        self.state.lock().indications.clone()
    }

    /// Block until every callback queued so far has run
    pub fn flush(&self) {
        let (done_tx, done_rx) = mpsc::channel();
        if self.enqueue(move |_| {
            let _ = done_tx.send(());
        }) {
            let _ = done_rx.recv();
        }
    }

    fn enqueue<F>(&self, job: F) -> bool
    where
        F: FnOnce(&dyn StackCallbacks) + Send + 'static,
    {
        if self.muted.load(Ordering::SeqCst) {
            debug!("Loopback stack muted; callback swallowed");
            return false;
        }
        match self.worker.lock().as_ref() {
            Some(worker) => worker.tx.send(Box::new(job)).is_ok(),
            None => {
                debug!("Loopback stack not running; call ignored");
                false
            }
        }
    }

    fn stop_worker(&self) {
        let worker = self.worker.lock().take();
        if let Some(Worker { tx, handle }) = worker {
            drop(tx);
            if handle.join().is_err() {
                warn!("Loopback worker panicked");
            }
        }
    }

    // ------------------------------------------------------------------
    // Remote-originated events
    // ------------------------------------------------------------------

    /// A remote client reads a local attribute; returns the minted transaction id
    pub fn simulate_read_request(
        &self,
        conn_id: i32,
        attr_handle: u16,
        offset: u16,
        is_long: bool,
        descriptor: bool,
    ) -> Option<i32> {
        let (trans_id, address) = {
            let mut state = self.state.lock();
            let address = *state.connections.get(&conn_id)?;
            (state.mint_trans_id(), address)
        };
        self.enqueue(move |cb| {
            if descriptor {
                cb.request_read_descriptor_cb(conn_id, trans_id, address, attr_handle, offset, is_long)
            } else {
                cb.request_read_characteristic_cb(conn_id, trans_id, address, attr_handle, offset, is_long)
            }
        })
        .then_some(trans_id)
    }

    /// A remote client writes a local attribute; returns the minted transaction id
    #[allow(clippy::too_many_arguments)]
    pub fn simulate_write_request(
        &self,
        conn_id: i32,
        attr_handle: u16,
        offset: u16,
        need_rsp: bool,
        is_prep: bool,
        descriptor: bool,
        value: Vec<u8>,
    ) -> Option<i32> {
        let (trans_id, address) = {
            let mut state = self.state.lock();
            let address = *state.connections.get(&conn_id)?;
            (state.mint_trans_id(), address)
        };
        self.enqueue(move |cb| {
            if descriptor {
                cb.request_write_descriptor_cb(
                    conn_id, trans_id, address, attr_handle, offset, need_rsp, is_prep, value,
                )
            } else {
                cb.request_write_characteristic_cb(
                    conn_id, trans_id, address, attr_handle, offset, need_rsp, is_prep, value,
                )
            }
        })
        .then_some(trans_id)
    }

    pub fn simulate_exec_write_request(&self, conn_id: i32, execute: bool) -> Option<i32> {
        let (trans_id, address) = {
            let mut state = self.state.lock();
            let address = *state.connections.get(&conn_id)?;
            (state.mint_trans_id(), address)
        };
        self.enqueue(move |cb| cb.request_exec_write_cb(conn_id, trans_id, address, execute))
            .then_some(trans_id)
    }

    /// The remote server behind `conn_id` notifies a value change
    pub fn simulate_notification(&self, conn_id: i32, handle: u16, value: Vec<u8>) -> bool {
        let Some(address) = self.state.lock().connections.get(&conn_id).copied() else {
            return false;
        };
        self.enqueue(move |cb| {
            cb.notify_cb(
                conn_id,
                NotifyParams {
                    address,
                    handle,
                    is_notify: true,
                    value,
                },
            )
        })
    }

    pub fn simulate_congestion(&self, conn_id: i32, congested: bool, server: bool) -> bool {
        self.enqueue(move |cb| {
            if server {
                cb.server_congestion_cb(conn_id, congested)
            } else {
                cb.congestion_cb(conn_id, congested)
            }
        })
    }

    pub fn simulate_mtu_changed(&self, conn_id: i32, mtu: i32) -> bool {
        self.enqueue(move |cb| cb.mtu_changed_cb(conn_id, mtu))
    }

    /// A remote central connects to the local server
    pub fn simulate_server_connection(&self, server_if: i32, address: DeviceAddress) -> i32 {
        let conn_id = self.state.lock().open_connection(address);
        self.enqueue(move |cb| cb.connection_cb(conn_id, server_if, true, address));
        conn_id
    }

    pub fn simulate_track_adv(&self, info: TrackAdvInfo) -> bool {
        self.enqueue(move |cb| cb.track_adv_event_cb(info))
    }

    pub fn simulate_batchscan_threshold(&self, scanner_id: i32) -> bool {
        self.enqueue(move |cb| cb.batchscan_threshold_cb(scanner_id))
    }
}

impl Drop for LoopbackStack {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

impl GattStack for LoopbackStack {
    fn init(&self, callbacks: Arc<dyn StackCallbacks>) -> Result<(), i32> {
        self.stop_worker();

        let (tx, rx) = mpsc::channel::<Job>();
        let handle = std::thread::Builder::new()
            .name("loopback-gatt".to_string())
            .spawn(move || {
                for job in rx {
                    job(callbacks.as_ref());
                }
                debug!("Loopback worker exiting");
            })
            .map_err(|e| {
                warn!("Failed to spawn loopback worker: {}", e);
                STATUS_ERROR
            })?;

        *self.worker.lock() = Some(Worker { tx, handle });
        Ok(())
    }

    fn cleanup(&self) {
        self.stop_worker();
        let mut state = self.state.lock();
        state.connections.clear();
        state.notifications.clear();
    }

    // ------------------------------------------------------------------
    // Client
    // ------------------------------------------------------------------

    fn get_device_type(&self, address: DeviceAddress) -> i32 {
        if self.state.lock().peers.contains_key(&address) {
            DEVICE_TYPE_LE
        } else {
            0
        }
    }

    fn register_client(&self, app_uuid: Uuid128) {
        let client_if = {
            let mut state = self.state.lock();
            let id = state.next_client_if;
            state.next_client_if += 1;
            id
        };
        self.enqueue(move |cb| cb.register_client_cb(STATUS_SUCCESS, client_if, app_uuid));
    }

    fn unregister_client(&self, client_if: i32) {
        debug!("Loopback client {} unregistered", client_if);
    }

    fn connect(&self, client_if: i32, address: DeviceAddress, _is_direct: bool, _transport: i32) {
        let conn_id = {
            let mut state = self.state.lock();
            if state.peers.contains_key(&address) {
                Some(state.open_connection(address))
            } else {
                None
            }
        };
        match conn_id {
            Some(conn_id) => {
                self.enqueue(move |cb| cb.open_cb(conn_id, STATUS_SUCCESS, client_if, address))
            }
            None => self.enqueue(move |cb| cb.open_cb(0, STATUS_ERROR, client_if, address)),
        };
    }

    fn disconnect(&self, client_if: i32, address: DeviceAddress, conn_id: i32) {
        let status = match self.state.lock().connections.remove(&conn_id) {
            Some(_) => STATUS_SUCCESS,
            None => STATUS_ERROR,
        };
        self.enqueue(move |cb| cb.close_cb(conn_id, status, client_if, address));
    }

    fn refresh(&self, _client_if: i32, address: DeviceAddress) {
        debug!("Loopback refresh for {}", address);
    }

    fn search_service(&self, conn_id: i32, _filter_uuid: Option<Uuid128>) {
        let status = if self.state.lock().connections.contains_key(&conn_id) {
            STATUS_SUCCESS
        } else {
            STATUS_ERROR
        };
        self.enqueue(move |cb| cb.search_complete_cb(conn_id, status));
    }

    fn get_gatt_db(&self, conn_id: i32) {
        let db = {
            let mut state = self.state.lock();
            match state.peer_for_conn(conn_id) {
                Some(peer) => encode_table(&peer.database).unwrap_or_else(|e| {
                    warn!("Loopback peer database does not encode: {}", e);
                    Vec::new()
                }),
                None => Vec::new(),
            }
        };
        self.enqueue(move |cb| cb.get_gatt_db_cb(conn_id, db));
    }

    fn read_characteristic(&self, conn_id: i32, handle: u16, _auth_req: i32) {
        let (status, value) = self.read_value(conn_id, handle);
        self.enqueue(move |cb| cb.read_characteristic_cb(conn_id, status, ReadParams { handle, value }));
    }

    fn read_descriptor(&self, conn_id: i32, handle: u16, _auth_req: i32) {
        let (status, value) = self.read_value(conn_id, handle);
        self.enqueue(move |cb| cb.read_descriptor_cb(conn_id, status, ReadParams { handle, value }));
    }

    fn write_characteristic(
        &self,
        conn_id: i32,
        handle: u16,
        _write_type: i32,
        _auth_req: i32,
        value: Vec<u8>,
    ) {
        let (status, notify) = self.write_value(conn_id, handle, value);
        self.enqueue(move |cb| {
            cb.write_characteristic_cb(conn_id, status, handle);
            if let Some(params) = notify {
                cb.notify_cb(conn_id, params);
            }
        });
    }

    fn write_descriptor(&self, conn_id: i32, handle: u16, _auth_req: i32, value: Vec<u8>) {
        let (status, _) = self.write_value(conn_id, handle, value);
        self.enqueue(move |cb| cb.write_descriptor_cb(conn_id, status, handle));
    }

    fn execute_write(&self, conn_id: i32, _execute: bool) {
        self.enqueue(move |cb| cb.execute_write_cb(conn_id, STATUS_SUCCESS));
    }

    fn register_for_notification(&self, _client_if: i32, address: DeviceAddress, handle: u16) {
        let conn_id = {
            let mut state = self.state.lock();
            state.notifications.insert((address, handle));
            state.conn_for(&address).unwrap_or(0)
        };
        self.enqueue(move |cb| cb.register_for_notification_cb(conn_id, true, STATUS_SUCCESS, handle));
    }

    fn deregister_for_notification(&self, _client_if: i32, address: DeviceAddress, handle: u16) {
        let conn_id = {
            let mut state = self.state.lock();
            state.notifications.remove(&(address, handle));
            state.conn_for(&address).unwrap_or(0)
        };
        self.enqueue(move |cb| cb.register_for_notification_cb(conn_id, false, STATUS_SUCCESS, handle));
    }

    fn read_remote_rssi(&self, client_if: i32, address: DeviceAddress) {
        let rssi = self.state.lock().peers.get(&address).map(|p| p.rssi);
        self.enqueue(move |cb| match rssi {
            Some(rssi) => cb.remote_rssi_cb(client_if, address, rssi, STATUS_SUCCESS),
            None => cb.remote_rssi_cb(client_if, address, 0, STATUS_ERROR),
        });
    }

    fn configure_mtu(&self, conn_id: i32, mtu: i32) {
        let negotiated = mtu.clamp(MIN_MTU, MAX_MTU);
        self.enqueue(move |cb| cb.configure_mtu_cb(conn_id, STATUS_SUCCESS, negotiated));
    }

    fn conn_parameter_update(&self, address: DeviceAddress, params: ConnectionParameters) {
        debug!("Loopback connection parameter update for {}: {:?}", address, params);
    }

    // ------------------------------------------------------------------
    // Scanner
    // ------------------------------------------------------------------

    fn register_scanner(&self, app_uuid: Uuid128) {
        let scanner_id = {
            let mut state = self.state.lock();
            let id = state.next_scanner_id;
            state.next_scanner_id = state.next_scanner_id.wrapping_add(1);
            id
        };
        self.enqueue(move |cb| cb.register_scanner_cb(app_uuid, scanner_id, STATUS_SUCCESS as u8));
    }

    fn unregister_scanner(&self, scanner_id: i32) {
        debug!("Loopback scanner {} unregistered", scanner_id);
    }

    fn scan(&self, start: bool) {
        if !start {
            return;
        }
        let results: Vec<_> = self
            .state
            .lock()
            .peers
            .values()
            .map(|p| (p.address, p.rssi, p.adv_data.clone()))
            .collect();
        self.enqueue(move |cb| {
            for (address, rssi, adv_data) in results {
                cb.scan_result_cb(address, rssi, adv_data);
            }
        });
    }

    fn set_scan_parameters(&self, scanner_id: i32, _scan_interval: u32, _scan_window: u32) {
        self.enqueue(move |cb| cb.scan_parameter_setup_completed_cb(scanner_id, STATUS_SUCCESS));
    }

    fn scan_filter_param_setup(
        &self,
        scanner_id: i32,
        action: u8,
        _filter_index: u8,
        _params: Option<FilterParams>,
    ) {
        let available = FILTER_SLOTS - self.state.lock().filter_slots_used;
        self.enqueue(move |cb| cb.scan_filter_param_cb(action, scanner_id, STATUS_SUCCESS, available));
    }

    fn scan_filter_add_remove(&self, scanner_id: i32, call: ScanFilterCall) {
        let available = {
            let mut state = self.state.lock();
            if call.action == 0 {
                state.filter_slots_used = (state.filter_slots_used + 1).min(FILTER_SLOTS);
            } else {
                state.filter_slots_used = (state.filter_slots_used - 1).max(0);
            }
            FILTER_SLOTS - state.filter_slots_used
        };
        self.enqueue(move |cb| {
            cb.scan_filter_cfg_cb(call.action, scanner_id, STATUS_SUCCESS, call.filter_type, available)
        });
    }

    fn scan_filter_clear(&self, scanner_id: i32, _filter_index: u8) {
        self.state.lock().filter_slots_used = 0;
        self.enqueue(move |cb| cb.scan_filter_cfg_cb(2, scanner_id, STATUS_SUCCESS, 0, FILTER_SLOTS));
    }

    fn scan_filter_enable(&self, scanner_id: i32, enable: bool) {
        self.enqueue(move |cb| cb.scan_filter_status_cb(enable, scanner_id, STATUS_SUCCESS));
    }

    fn batchscan_config_storage(&self, scanner_id: i32, _storage: BatchScanStorage) {
        self.enqueue(move |cb| cb.batchscan_cfg_storage_cb(scanner_id, STATUS_SUCCESS));
    }

    fn batchscan_enable(&self, scanner_id: i32, _params: BatchScanParams) {
        self.enqueue(move |cb| cb.batchscan_startstop_cb(true, scanner_id, STATUS_SUCCESS));
    }

    fn batchscan_disable(&self, scanner_id: i32) {
        self.enqueue(move |cb| cb.batchscan_startstop_cb(false, scanner_id, STATUS_SUCCESS));
    }

    fn batchscan_read_reports(&self, scanner_id: i32, scan_type: u8) {
        // One record per peer: address followed by RSSI
        let (num_records, data) = {
            let state = self.state.lock();
            let mut data = Vec::new();
            for peer in state.peers.values() {
                data.extend_from_slice(peer.address.as_bytes());
                data.push(peer.rssi as i8 as u8);
            }
            (state.peers.len() as i32, data)
        };
        self.enqueue(move |cb| {
            cb.batchscan_reports_cb(scanner_id, STATUS_SUCCESS, scan_type as i32, num_records, data)
        });
    }

    // ------------------------------------------------------------------
    // Advertiser
    // ------------------------------------------------------------------

    fn register_advertiser(&self, app_uuid: Uuid128) {
        let advertiser_id = {
            let mut state = self.state.lock();
            let id = state.next_advertiser_id;
            state.next_advertiser_id = state.next_advertiser_id.wrapping_add(1);
            id
        };
        self.enqueue(move |cb| cb.advertiser_register_cb(app_uuid, advertiser_id, STATUS_SUCCESS as u8));
    }

    fn start_advertising(
        &self,
        advertiser_id: u8,
        _params: AdvertiseParameters,
        _adv_data: Vec<u8>,
        _scan_response: Vec<u8>,
        _timeout_s: u16,
    ) {
        self.enqueue(move |cb| cb.advertiser_start_cb(advertiser_id, STATUS_SUCCESS as u8));
    }

    fn enable_advertising(&self, advertiser_id: u8, enable: bool, _timeout_s: u16) {
        self.enqueue(move |cb| cb.advertiser_enable_cb(enable, advertiser_id, STATUS_SUCCESS as u8));
    }

    fn unregister_advertiser(&self, advertiser_id: u8) {
        debug!("Loopback advertiser {} unregistered", advertiser_id);
    }

    // ------------------------------------------------------------------
    // Server
    // ------------------------------------------------------------------

    fn register_server(&self, app_uuid: Uuid128) {
        let server_if = {
            let mut state = self.state.lock();
            let id = state.next_server_if;
            state.next_server_if += 1;
            id
        };
        self.enqueue(move |cb| cb.register_server_cb(STATUS_SUCCESS, server_if, app_uuid));
    }

    fn unregister_server(&self, server_if: i32) {
        debug!("Loopback server {} unregistered", server_if);
    }

    fn server_connect(&self, server_if: i32, address: DeviceAddress, _is_direct: bool, _transport: i32) {
        self.simulate_server_connection(server_if, address);
    }

    fn server_disconnect(&self, server_if: i32, address: DeviceAddress, conn_id: i32) {
        self.state.lock().connections.remove(&conn_id);
        self.enqueue(move |cb| cb.connection_cb(conn_id, server_if, false, address));
    }

    fn add_service(&self, server_if: i32, mut service: Vec<StackDbElement>) {
        // Assign consecutive handles; the service row spans the whole table
        {
            let mut state = self.state.lock();
            let start = state.next_handle;
            let end = start.saturating_add(service.len().saturating_sub(1) as u16);
            for (offset, element) in service.iter_mut().enumerate() {
                element.attribute_handle = start.saturating_add(offset as u16);
            }
            if let Some(first) = service.first_mut() {
                first.start_handle = start;
                first.end_handle = end;
            }
            state.next_handle = end.saturating_add(1);
            state.local_services.insert(start, service.clone());
        }
        self.enqueue(move |cb| cb.service_added_cb(STATUS_SUCCESS, server_if, service));
    }

    fn stop_service(&self, server_if: i32, service_handle: u16) {
        let status = if self.state.lock().local_services.contains_key(&service_handle) {
            STATUS_SUCCESS
        } else {
            STATUS_ERROR
        };
        self.enqueue(move |cb| cb.service_stopped_cb(status, server_if, service_handle));
    }

    fn delete_service(&self, server_if: i32, service_handle: u16) {
        let status = match self.state.lock().local_services.remove(&service_handle) {
            Some(_) => STATUS_SUCCESS,
            None => STATUS_ERROR,
        };
        self.enqueue(move |cb| cb.service_deleted_cb(status, server_if, service_handle));
    }

    fn send_indication(
        &self,
        _server_if: i32,
        attr_handle: u16,
        conn_id: i32,
        confirm: bool,
        value: Vec<u8>,
    ) {
        self.state
            .lock()
            .indications
            .push((conn_id, attr_handle, confirm, value));
        self.enqueue(move |cb| cb.indication_sent_cb(conn_id, STATUS_SUCCESS));
    }

    fn send_response(&self, conn_id: i32, trans_id: i32, status: i32, response: GattResponse) {
        let handle = response.handle;
        self.state.lock().responses.push(RecordedResponse {
            conn_id,
            trans_id,
            status,
            response,
        });
        self.enqueue(move |cb| cb.response_confirmation_cb(STATUS_SUCCESS, handle));
    }
}

impl LoopbackStack {
    fn read_value(&self, conn_id: i32, handle: u16) -> (i32, Vec<u8>) {
        let mut state = self.state.lock();
        match state.peer_for_conn(conn_id).and_then(|p| p.values.get(&handle)) {
            Some(value) => (STATUS_SUCCESS, value.clone()),
            None => (STATUS_INVALID_HANDLE, Vec::new()),
        }
    }

    /// Store a written value; returns the status and, when the client is
    /// registered for notifications on `handle`, the notification to echo.
    fn write_value(&self, conn_id: i32, handle: u16, value: Vec<u8>) -> (i32, Option<NotifyParams>) {
        let mut state = self.state.lock();
        let Some(address) = state.connections.get(&conn_id).copied() else {
            return (STATUS_ERROR, None);
        };
        let notify = state
            .notifications
            .contains(&(address, handle))
            .then(|| NotifyParams {
                address,
                handle,
                is_notify: true,
                value: value.clone(),
            });
        match state.peers.get_mut(&address) {
            Some(peer) => {
                peer.values.insert(handle, value);
                (STATUS_SUCCESS, notify)
            }
            None => (STATUS_ERROR, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{parse_address, AttributeKind};
    use crate::events::GattEvent;
    use crate::router::{CallbackRouter, EventSink};

    fn peer_address() -> DeviceAddress {
        parse_address("C0:FF:EE:00:00:01").unwrap()
    }

    fn running_stack() -> (LoopbackStack, crate::router::EventReceivers) {
        let stack = LoopbackStack::new().with_peer(
            LoopbackPeer::new(peer_address())
                .with_rssi(-42)
                .with_database(vec![
                    AttributeRow::new(AttributeKind::PrimaryService, Uuid128::from_u16(0x180F))
                        .with_handles(1, 1, 2),
                    AttributeRow::new(AttributeKind::Characteristic, Uuid128::from_u16(0x2A19))
                        .with_handles(2, 0, 0),
                ])
                .with_value(2, vec![87]),
        );
        let router = Arc::new(CallbackRouter::default());
        let (sink, rx) = EventSink::channel();
        router.install_sink(sink);
        stack.init(router).expect("loopback init");
        (stack, rx)
    }

    #[test]
    fn test_connect_known_peer() {
        let (stack, mut rx) = running_stack();
        stack.connect(1, peer_address(), true, 2);
        stack.flush();

        match rx.client.try_recv().unwrap() {
            GattEvent::Connected {
                conn_id,
                status,
                address,
                ..
            } => {
                assert_eq!(conn_id, 1);
                assert_eq!(status, STATUS_SUCCESS);
                assert_eq!(address, "C0:FF:EE:00:00:01");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_connect_unknown_peer_fails() {
        let (stack, mut rx) = running_stack();
        stack.connect(1, DeviceAddress([1, 2, 3, 4, 5, 6]), true, 2);
        stack.flush();
        assert_eq!(rx.client.try_recv().unwrap().status(), Some(STATUS_ERROR));
    }

    #[test]
    fn test_read_unknown_handle_reports_failure() {
        let (stack, mut rx) = running_stack();
        stack.connect(1, peer_address(), true, 2);
        stack.read_characteristic(1, 0x99, 0);
        stack.flush();

        let _connected = rx.client.try_recv().unwrap();
        match rx.client.try_recv().unwrap() {
            GattEvent::CharacteristicRead { status, value, .. } => {
                assert_eq!(status, STATUS_INVALID_HANDLE);
                assert_eq!(value, vec![0]);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_write_echoes_notification_when_registered() {
        let (stack, mut rx) = running_stack();
        stack.connect(1, peer_address(), true, 2);
        stack.register_for_notification(1, peer_address(), 2);
        stack.write_characteristic(1, 2, 1, 0, vec![50]);
        stack.flush();

        let events: Vec<_> = std::iter::from_fn(|| rx.client.try_recv().ok()).collect();
        assert!(matches!(events[1], GattEvent::NotificationRegistered { registered: true, handle: 2, .. }));
        assert!(matches!(events[2], GattEvent::CharacteristicWritten { status: 0, handle: 2, .. }));
        assert!(matches!(&events[3], GattEvent::Notify { value, .. } if value == &vec![50]));
    }

    #[test]
    fn test_add_service_assigns_handles() {
        let (stack, mut rx) = running_stack();
        let rows = vec![
            AttributeRow::new(AttributeKind::PrimaryService, Uuid128::from_u16(0x181A)),
            AttributeRow::new(AttributeKind::Characteristic, Uuid128::from_u16(0x2A6E)),
            AttributeRow::new(AttributeKind::Descriptor, Uuid128::from_u16(0x2902)),
        ];
        stack.add_service(1, encode_table(&rows).unwrap());
        stack.flush();

        match rx.server.try_recv().unwrap() {
            GattEvent::ServiceAdded { rows, status, .. } => {
                assert_eq!(status, STATUS_SUCCESS);
                let handles: Vec<_> = rows.iter().map(|r| r.attribute_handle).collect();
                assert_eq!(handles, vec![1, 2, 3]);
                assert_eq!((rows[0].start_handle, rows[0].end_handle), (1, 3));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_calls_ignored_after_cleanup() {
        let (stack, mut rx) = running_stack();
        stack.cleanup();
        assert!(!stack.is_running());
        stack.register_client(Uuid128::from_u16(1));
        stack.flush();
        assert!(rx.client.try_recv().is_err());
    }

    #[test]
    fn test_muted_stack_swallows_callbacks() {
        let (stack, mut rx) = running_stack();
        stack.set_muted(true);
        stack.configure_mtu(1, 247);
        stack.set_muted(false);
        stack.flush();
        assert!(rx.client.try_recv().is_err());
    }

    #[test]
    fn test_mtu_clamped() {
        let (stack, mut rx) = running_stack();
        stack.configure_mtu(1, 1000);
        stack.flush();
        assert!(matches!(
            rx.client.try_recv().unwrap(),
            GattEvent::MtuConfigured { mtu: 517, .. }
        ));
    }
}
