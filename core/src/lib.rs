// GATT Bridge Core
//
// Sits between an application-level BLE GATT consumer and an asynchronous GATT
// controller stack. Requests go out through the dispatch facade on
// `BridgeContext`; stack callbacks come back through `CallbackRouter` as
// `GattEvent`s, correlated by the identifiers the stack reports.

pub mod codec;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod logging;
pub mod loopback;
pub mod pending;
pub mod router;
pub mod stack;

pub use codec::{
    decode_table, decode_uuid, encode_filter, encode_table, encode_uuid, format_address,
    from_stack, parse_address, AttributeKind, AttributeRow, DeviceAddress, FilterParams,
    RawScanFilter, ScanFilterCondition, StackBuffer, StackDbElement, Uuid128, MAX_ATTR_LEN,
};
pub use config::BridgeConfig;
pub use context::BridgeContext;
pub use dispatch::{Dispatch, DropReason};
pub use error::BridgeError;
pub use events::{ActorKind, AdvTrackingInfo, AttributeTarget, GattEvent};
pub use logging::{init_logging, LoggingGuard};
pub use loopback::{LoopbackPeer, LoopbackStack};
pub use pending::{CorrelationKey, Pending};
pub use router::{CallbackRouter, Delivery, EventReceivers, EventSink, ADV_REPORT_LEN};
pub use stack::{
    AdvertiseParameters, BatchScanParams, BatchScanStorage, ConnectionParameters, GattResponse,
    GattStack, StackCallbacks,
};
