/// GATT client requests
///
/// Connection ids, client interfaces and handles are passed through untouched;
/// the bridge does not track which of them are live.

use super::{address_arg, reject, value_arg, Dispatch, DropReason};
use crate::codec::Uuid128;
use crate::context::BridgeContext;
use crate::events::ActorKind;
use crate::pending::{CorrelationKey, Pending};
use crate::stack::ConnectionParameters;

impl BridgeContext {
    /// Device type reported by the stack (synchronous)
    pub fn get_device_type(&self, address: &str) -> Result<i32, DropReason> {
        let address = address_arg(address).map_err(|r| reject("get_device_type", r))?;
        let stack = self
            .current_stack()
            .ok_or_else(|| reject("get_device_type", DropReason::NotInitialized))?;
        Ok(stack.get_device_type(address))
    }

    pub fn register_client(&self, app_uuid: Uuid128) -> Dispatch {
        self.dispatch("register_client", |stack| {
            stack.register_client(app_uuid);
            Ok(())
        })
    }

    /// Register and await the `ClientRegistered` completion for `app_uuid`
    pub fn register_client_awaitable(&self, app_uuid: Uuid128) -> Result<Pending, DropReason> {
        let key = CorrelationKey::Registration {
            kind: ActorKind::Client,
            app_uuid,
        };
        self.dispatch_awaitable("register_client", key, |stack| {
            stack.register_client(app_uuid)
        })
    }

    pub fn unregister_client(&self, client_if: i32) -> Dispatch {
        self.dispatch("unregister_client", |stack| {
            stack.unregister_client(client_if);
            Ok(())
        })
    }

    pub fn connect(&self, client_if: i32, address: &str, is_direct: bool, transport: i32) -> Dispatch {
        self.dispatch("connect", |stack| {
            stack.connect(client_if, address_arg(address)?, is_direct, transport);
            Ok(())
        })
    }

    pub fn disconnect(&self, client_if: i32, address: &str, conn_id: i32) -> Dispatch {
        self.dispatch("disconnect", |stack| {
            stack.disconnect(client_if, address_arg(address)?, conn_id);
            Ok(())
        })
    }

    /// Drop the stack's cached attribute database for `address`
    pub fn refresh(&self, client_if: i32, address: &str) -> Dispatch {
        self.dispatch("refresh", |stack| {
            stack.refresh(client_if, address_arg(address)?);
            Ok(())
        })
    }

    /// Discover all services, or only those matching `filter`
    pub fn search_service(&self, conn_id: i32, filter: Option<Uuid128>) -> Dispatch {
        self.dispatch("search_service", |stack| {
            stack.search_service(conn_id, filter);
            Ok(())
        })
    }

    pub fn get_gatt_db(&self, conn_id: i32) -> Dispatch {
        self.dispatch("get_gatt_db", |stack| {
            stack.get_gatt_db(conn_id);
            Ok(())
        })
    }

    pub fn get_gatt_db_awaitable(&self, conn_id: i32) -> Result<Pending, DropReason> {
        self.dispatch_awaitable("get_gatt_db", CorrelationKey::GattDb { conn_id }, |stack| {
            stack.get_gatt_db(conn_id)
        })
    }

    pub fn read_characteristic(&self, conn_id: i32, handle: u16, auth_req: i32) -> Dispatch {
        self.dispatch("read_characteristic", |stack| {
            stack.read_characteristic(conn_id, handle, auth_req);
            Ok(())
        })
    }

    pub fn read_characteristic_awaitable(
        &self,
        conn_id: i32,
        handle: u16,
        auth_req: i32,
    ) -> Result<Pending, DropReason> {
        let key = CorrelationKey::CharacteristicRead { conn_id, handle };
        self.dispatch_awaitable("read_characteristic", key, |stack| {
            stack.read_characteristic(conn_id, handle, auth_req)
        })
    }

    pub fn read_descriptor(&self, conn_id: i32, handle: u16, auth_req: i32) -> Dispatch {
        self.dispatch("read_descriptor", |stack| {
            stack.read_descriptor(conn_id, handle, auth_req);
            Ok(())
        })
    }

    pub fn read_descriptor_awaitable(
        &self,
        conn_id: i32,
        handle: u16,
        auth_req: i32,
    ) -> Result<Pending, DropReason> {
        let key = CorrelationKey::DescriptorRead { conn_id, handle };
        self.dispatch_awaitable("read_descriptor", key, |stack| {
            stack.read_descriptor(conn_id, handle, auth_req)
        })
    }

    pub fn write_characteristic(
        &self,
        conn_id: i32,
        handle: u16,
        write_type: i32,
        auth_req: i32,
        value: Option<&[u8]>,
    ) -> Dispatch {
        self.dispatch("write_characteristic", |stack| {
            let value = value_arg(value, "characteristic value")?;
            stack.write_characteristic(conn_id, handle, write_type, auth_req, value.to_vec());
            Ok(())
        })
    }

    pub fn write_characteristic_awaitable(
        &self,
        conn_id: i32,
        handle: u16,
        write_type: i32,
        auth_req: i32,
        value: Option<&[u8]>,
    ) -> Result<Pending, DropReason> {
        let value = value_arg(value, "characteristic value")
            .map_err(|r| reject("write_characteristic", r))?
            .to_vec();
        let key = CorrelationKey::CharacteristicWrite { conn_id, handle };
        self.dispatch_awaitable("write_characteristic", key, |stack| {
            stack.write_characteristic(conn_id, handle, write_type, auth_req, value)
        })
    }

    pub fn write_descriptor(
        &self,
        conn_id: i32,
        handle: u16,
        auth_req: i32,
        value: Option<&[u8]>,
    ) -> Dispatch {
        self.dispatch("write_descriptor", |stack| {
            let value = value_arg(value, "descriptor value")?;
            stack.write_descriptor(conn_id, handle, auth_req, value.to_vec());
            Ok(())
        })
    }

    /// Commit (`execute = true`) or abort queued prepared writes
    pub fn execute_write(&self, conn_id: i32, execute: bool) -> Dispatch {
        self.dispatch("execute_write", |stack| {
            stack.execute_write(conn_id, execute);
            Ok(())
        })
    }

    /// Register (`enable = true`) or deregister for notifications on `handle`
    pub fn register_for_notification(
        &self,
        client_if: i32,
        address: &str,
        handle: u16,
        enable: bool,
    ) -> Dispatch {
        self.dispatch("register_for_notification", |stack| {
            let address = address_arg(address)?;
            if enable {
                stack.register_for_notification(client_if, address, handle);
            } else {
                stack.deregister_for_notification(client_if, address, handle);
            }
            Ok(())
        })
    }

    pub fn read_remote_rssi(&self, client_if: i32, address: &str) -> Dispatch {
        self.dispatch("read_remote_rssi", |stack| {
            stack.read_remote_rssi(client_if, address_arg(address)?);
            Ok(())
        })
    }

    pub fn read_remote_rssi_awaitable(
        &self,
        client_if: i32,
        address: &str,
    ) -> Result<Pending, DropReason> {
        let address = address_arg(address).map_err(|r| reject("read_remote_rssi", r))?;
        let key = CorrelationKey::RemoteRssi { client_if, address };
        self.dispatch_awaitable("read_remote_rssi", key, |stack| {
            stack.read_remote_rssi(client_if, address)
        })
    }

    pub fn configure_mtu(&self, conn_id: i32, mtu: i32) -> Dispatch {
        self.dispatch("configure_mtu", |stack| {
            stack.configure_mtu(conn_id, mtu);
            Ok(())
        })
    }

    pub fn configure_mtu_awaitable(&self, conn_id: i32, mtu: i32) -> Result<Pending, DropReason> {
        self.dispatch_awaitable("configure_mtu", CorrelationKey::Mtu { conn_id }, |stack| {
            stack.configure_mtu(conn_id, mtu)
        })
    }

    pub fn connection_parameter_update(
        &self,
        address: &str,
        params: ConnectionParameters,
    ) -> Dispatch {
        self.dispatch("connection_parameter_update", |stack| {
            stack.conn_parameter_update(address_arg(address)?, params);
            Ok(())
        })
    }
}
