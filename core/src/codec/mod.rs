/// Binary codecs for everything that crosses the stack boundary
///
/// - **uuid**: 128-bit UUIDs as split 64-bit halves
/// - **address**: 6-byte device addresses as colon-hex text
/// - **value**: bounded attribute value buffers and read-result conventions
/// - **attribute_table**: GATT database rows as flat stack elements
/// - **scan_filter**: typed scan filter conditions as uniform stack calls

pub mod address;
pub mod attribute_table;
pub mod scan_filter;
pub mod uuid;
pub mod value;

pub use self::address::{format_address, parse_address, DeviceAddress, ADDRESS_TEXT_LEN};
pub use self::attribute_table::{
    decode_table, duplicate_handle, encode_table, AttributeKind, AttributeRow, StackDbElement,
};
pub use self::scan_filter::{
    encode_filter, FilterAction, FilterParamAction, FilterParams, RawScanFilter, ScanFilterCall,
    ScanFilterCondition,
};
pub use self::uuid::{decode_uuid, encode_uuid, Uuid128, BLUETOOTH_BASE_UUID};
pub use self::value::{from_stack, StackBuffer, GATT_SUCCESS, MAX_ATTR_LEN, READ_FAILURE_SENTINEL};
