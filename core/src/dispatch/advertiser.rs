use super::{value_arg, Dispatch};
use crate::codec::Uuid128;
use crate::context::BridgeContext;
use crate::stack::AdvertiseParameters;

impl BridgeContext {
    pub fn register_advertiser(&self, app_uuid: Uuid128) -> Dispatch {
        self.dispatch("register_advertiser", |stack| {
            stack.register_advertiser(app_uuid);
            Ok(())
        })
    }

    /// Configure and start an advertising set. A missing scan response is sent
    /// as empty.
    pub fn start_advertising(
        &self,
        advertiser_id: u8,
        params: AdvertiseParameters,
        adv_data: Option<&[u8]>,
        scan_response: Option<&[u8]>,
        timeout_s: u16,
    ) -> Dispatch {
        self.dispatch("start_advertising", |stack| {
            let adv_data = value_arg(adv_data, "advertising data")?;
            stack.start_advertising(
                advertiser_id,
                params,
                adv_data.to_vec(),
                scan_response.unwrap_or_default().to_vec(),
                timeout_s,
            );
            Ok(())
        })
    }

    pub fn enable_advertising(&self, advertiser_id: u8, enable: bool, timeout_s: u16) -> Dispatch {
        self.dispatch("enable_advertising", |stack| {
            stack.enable_advertising(advertiser_id, enable, timeout_s);
            Ok(())
        })
    }

    pub fn unregister_advertiser(&self, advertiser_id: u8) -> Dispatch {
        self.dispatch("unregister_advertiser", |stack| {
            stack.unregister_advertiser(advertiser_id);
            Ok(())
        })
    }
}
