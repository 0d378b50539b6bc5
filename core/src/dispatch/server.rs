/// GATT server requests
///
/// Services are published as whole attribute tables. Responses to incoming
/// read/write requests must carry the transaction id and connection id of the
/// request they answer; values are bounded by the configured
/// `max_attribute_len`.

use super::{address_arg, value_arg, Dispatch, DropReason};
use crate::codec::{encode_table, AttributeRow, StackBuffer, Uuid128};
use crate::context::BridgeContext;
use crate::error::BridgeError;
use crate::stack::GattResponse;

impl BridgeContext {
    pub fn register_server(&self, app_uuid: Uuid128) -> Dispatch {
        self.dispatch("register_server", |stack| {
            stack.register_server(app_uuid);
            Ok(())
        })
    }

    pub fn unregister_server(&self, server_if: i32) -> Dispatch {
        self.dispatch("unregister_server", |stack| {
            stack.unregister_server(server_if);
            Ok(())
        })
    }

    pub fn server_connect(&self, server_if: i32, address: &str, is_direct: bool, transport: i32) -> Dispatch {
        self.dispatch("server_connect", |stack| {
            stack.server_connect(server_if, address_arg(address)?, is_direct, transport);
            Ok(())
        })
    }

    pub fn server_disconnect(&self, server_if: i32, address: &str, conn_id: i32) -> Dispatch {
        self.dispatch("server_disconnect", |stack| {
            stack.server_disconnect(server_if, address_arg(address)?, conn_id);
            Ok(())
        })
    }

    /// Publish one service; `rows` starts with the service declaration
    pub fn add_service(&self, server_if: i32, rows: &[AttributeRow]) -> Dispatch {
        self.dispatch("add_service", |stack| {
            let first = rows
                .first()
                .ok_or(DropReason::InvalidArgument("empty service"))?;
            if !first.kind.is_service() {
                return Err(DropReason::InvalidArgument(
                    "service table must start with a service row",
                ));
            }
            let elements =
                encode_table(rows).map_err(|_| DropReason::InvalidArgument("attribute row without uuid"))?;
            stack.add_service(server_if, elements);
            Ok(())
        })
    }

    pub fn stop_service(&self, server_if: i32, service_handle: u16) -> Dispatch {
        self.dispatch("stop_service", |stack| {
            stack.stop_service(server_if, service_handle);
            Ok(())
        })
    }

    pub fn delete_service(&self, server_if: i32, service_handle: u16) -> Dispatch {
        self.dispatch("delete_service", |stack| {
            stack.delete_service(server_if, service_handle);
            Ok(())
        })
    }

    /// Indicate a value change; the peer must confirm
    pub fn send_indication(
        &self,
        server_if: i32,
        attr_handle: u16,
        conn_id: i32,
        value: Option<&[u8]>,
    ) -> Dispatch {
        self.dispatch("send_indication", |stack| {
            let value = value_arg(value, "indication value")?;
            stack.send_indication(server_if, attr_handle, conn_id, true, value.to_vec());
            Ok(())
        })
    }

    /// Notify a value change without confirmation
    pub fn send_notification(
        &self,
        server_if: i32,
        attr_handle: u16,
        conn_id: i32,
        value: Option<&[u8]>,
    ) -> Dispatch {
        self.dispatch("send_notification", |stack| {
            let value = value_arg(value, "notification value")?;
            stack.send_indication(server_if, attr_handle, conn_id, false, value.to_vec());
            Ok(())
        })
    }

    /// Answer the request identified by `conn_id` and `trans_id`
    #[allow(clippy::too_many_arguments)]
    pub fn send_response(
        &self,
        conn_id: i32,
        trans_id: i32,
        status: i32,
        handle: u16,
        offset: u16,
        auth_req: u8,
        value: Option<&[u8]>,
    ) -> Dispatch {
        let limit = self.config().max_attribute_len;
        self.dispatch("send_response", |stack| {
            let value = value_arg(value, "response value")?;
            let value = StackBuffer::to_stack(value, limit).map_err(|e| match e {
                BridgeError::ValueTooLong { len, max } => DropReason::ValueTooLong { len, max },
                _ => DropReason::InvalidArgument("response value"),
            })?;
            let response = GattResponse {
                handle,
                offset,
                auth_req,
                value,
            };
            stack.send_response(conn_id, trans_id, status, response);
            Ok(())
        })
    }
}
