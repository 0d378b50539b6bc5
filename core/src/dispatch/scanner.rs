/// Scanner requests: scanning, hardware scan filters and batch scan

use super::{Dispatch, DropReason};
use crate::codec::{
    encode_filter, FilterAction, FilterParamAction, FilterParams, RawScanFilter,
    ScanFilterCondition, Uuid128,
};
use crate::context::BridgeContext;
use crate::error::BridgeError;
use crate::stack::{BatchScanParams, BatchScanStorage};

impl BridgeContext {
    pub fn register_scanner(&self, app_uuid: Uuid128) -> Dispatch {
        self.dispatch("register_scanner", |stack| {
            stack.register_scanner(app_uuid);
            Ok(())
        })
    }

    pub fn unregister_scanner(&self, scanner_id: i32) -> Dispatch {
        self.dispatch("unregister_scanner", |stack| {
            stack.unregister_scanner(scanner_id);
            Ok(())
        })
    }

    /// Start (`true`) or stop scanning
    pub fn scan(&self, start: bool) -> Dispatch {
        self.dispatch("scan", |stack| {
            stack.scan(start);
            Ok(())
        })
    }

    pub fn set_scan_parameters(&self, scanner_id: i32, scan_interval: u32, scan_window: u32) -> Dispatch {
        self.dispatch("set_scan_parameters", |stack| {
            if scan_window > scan_interval {
                return Err(DropReason::InvalidArgument("scan window exceeds interval"));
            }
            stack.set_scan_parameters(scanner_id, scan_interval, scan_window);
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Filter parameters
    // ------------------------------------------------------------------

    pub fn scan_filter_param_add(&self, params: FilterParams) -> Dispatch {
        self.dispatch("scan_filter_param_add", |stack| {
            stack.scan_filter_param_setup(
                params.scanner_id as i32,
                FilterParamAction::Add.code(),
                params.filter_index,
                Some(params),
            );
            Ok(())
        })
    }

    pub fn scan_filter_param_delete(&self, scanner_id: i32, filter_index: u8) -> Dispatch {
        self.dispatch("scan_filter_param_delete", |stack| {
            stack.scan_filter_param_setup(
                scanner_id,
                FilterParamAction::Delete.code(),
                filter_index,
                None,
            );
            Ok(())
        })
    }

    pub fn scan_filter_param_clear_all(&self, scanner_id: i32) -> Dispatch {
        self.dispatch("scan_filter_param_clear_all", |stack| {
            stack.scan_filter_param_setup(scanner_id, FilterParamAction::ClearAll.code(), 0, None);
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Filter conditions
    // ------------------------------------------------------------------

    pub fn scan_filter_add(
        &self,
        scanner_id: i32,
        filter_index: u8,
        condition: &ScanFilterCondition,
    ) -> Dispatch {
        self.scan_filter_add_remove("scan_filter_add", scanner_id, FilterAction::Add, filter_index, condition)
    }

    pub fn scan_filter_delete(
        &self,
        scanner_id: i32,
        filter_index: u8,
        condition: &ScanFilterCondition,
    ) -> Dispatch {
        self.scan_filter_add_remove(
            "scan_filter_delete",
            scanner_id,
            FilterAction::Delete,
            filter_index,
            condition,
        )
    }

    /// Add a filter given as positional fields plus a type discriminant
    pub fn scan_filter_add_raw(&self, scanner_id: i32, filter_index: u8, raw: RawScanFilter) -> Dispatch {
        let condition = ScanFilterCondition::try_from(raw);
        self.dispatch("scan_filter_add", |stack| {
            let condition = condition.map_err(|e| match e {
                BridgeError::MalformedAddress(text) => DropReason::MalformedAddress(text),
                _ => DropReason::InvalidArgument("scan filter fields"),
            })?;
            let call = encode_filter(FilterAction::Add, filter_index, &condition)
                .ok_or(DropReason::EmptyLocalName)?;
            stack.scan_filter_add_remove(scanner_id, call);
            Ok(())
        })
    }

    fn scan_filter_add_remove(
        &self,
        op: &'static str,
        scanner_id: i32,
        action: FilterAction,
        filter_index: u8,
        condition: &ScanFilterCondition,
    ) -> Dispatch {
        self.dispatch(op, |stack| {
            let call = encode_filter(action, filter_index, condition)
                .ok_or(DropReason::EmptyLocalName)?;
            stack.scan_filter_add_remove(scanner_id, call);
            Ok(())
        })
    }

    /// Remove every condition at `filter_index`
    pub fn scan_filter_clear(&self, scanner_id: i32, filter_index: u8) -> Dispatch {
        self.dispatch("scan_filter_clear", |stack| {
            stack.scan_filter_clear(scanner_id, filter_index);
            Ok(())
        })
    }

    pub fn scan_filter_enable(&self, scanner_id: i32, enable: bool) -> Dispatch {
        self.dispatch("scan_filter_enable", |stack| {
            stack.scan_filter_enable(scanner_id, enable);
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Batch scan
    // ------------------------------------------------------------------

    pub fn batch_scan_config_storage(&self, scanner_id: i32, storage: BatchScanStorage) -> Dispatch {
        self.dispatch("batch_scan_config_storage", |stack| {
            let total = storage.max_full_reports_percent as u16
                + storage.max_truncated_reports_percent as u16;
            if total > 100 || storage.notify_threshold_percent > 100 {
                return Err(DropReason::InvalidArgument("batch scan storage percentages"));
            }
            stack.batchscan_config_storage(scanner_id, storage);
            Ok(())
        })
    }

    pub fn batch_scan_start(&self, scanner_id: i32, params: BatchScanParams) -> Dispatch {
        self.dispatch("batch_scan_start", |stack| {
            stack.batchscan_enable(scanner_id, params);
            Ok(())
        })
    }

    pub fn batch_scan_stop(&self, scanner_id: i32) -> Dispatch {
        self.dispatch("batch_scan_stop", |stack| {
            stack.batchscan_disable(scanner_id);
            Ok(())
        })
    }

    pub fn batch_scan_read_reports(&self, scanner_id: i32, scan_mode: u8) -> Dispatch {
        self.dispatch("batch_scan_read_reports", |stack| {
            stack.batchscan_read_reports(scanner_id, scan_mode);
            Ok(())
        })
    }
}
