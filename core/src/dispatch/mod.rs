/// Command dispatch facade
///
/// Every request entry point lives on `BridgeContext` and issues at most one
/// stack call. Requests that cannot be issued (bridge not initialized,
/// malformed input) are logged and reported as `Dispatch::Dropped`; no event
/// is ever produced for them. Results of issued calls arrive later as
/// `GattEvent`s.
///
/// - **client**: connections, discovery, reads/writes, notifications
/// - **scanner**: scanning, scan filters, batch scan
/// - **advertiser**: advertising sets
/// - **server**: local services, indications, request responses

pub mod advertiser;
pub mod client;
pub mod scanner;
pub mod server;

use crate::codec::{parse_address, DeviceAddress};
use crate::context::BridgeContext;
use crate::error::BridgeError;
use crate::pending::{CorrelationKey, Pending};
use crate::stack::GattStack;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a request was not issued
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DropReason {
    #[error("bridge not initialized")]
    NotInitialized,
    #[error("malformed address {0:?}")]
    MalformedAddress(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("value too long: {len} bytes (max {max})")]
    ValueTooLong { len: usize, max: usize },
    #[error("empty local name filter")]
    EmptyLocalName,
}

impl From<DropReason> for BridgeError {
    fn from(reason: DropReason) -> Self {
        match reason {
            DropReason::NotInitialized => BridgeError::NotInitialized,
            DropReason::MalformedAddress(text) => BridgeError::MalformedAddress(text),
            DropReason::InvalidArgument(what) => BridgeError::InvalidArgument(what.to_string()),
            DropReason::ValueTooLong { len, max } => BridgeError::ValueTooLong { len, max },
            DropReason::EmptyLocalName => {
                BridgeError::InvalidArgument("empty local name".to_string())
            }
        }
    }
}

/// Outcome of a facade call
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Dispatch {
    /// Exactly one stack call was issued
    Dispatched,
    /// No stack call was issued
    Dropped(DropReason),
}

impl Dispatch {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Dispatch::Dispatched)
    }

    pub fn drop_reason(&self) -> Option<&DropReason> {
        match self {
            Dispatch::Dispatched => None,
            Dispatch::Dropped(reason) => Some(reason),
        }
    }

    pub fn into_result(self) -> Result<(), BridgeError> {
        match self {
            Dispatch::Dispatched => Ok(()),
            Dispatch::Dropped(reason) => Err(reason.into()),
        }
    }
}

fn log_drop(op: &'static str, reason: &DropReason) {
    match reason {
        DropReason::NotInitialized => debug!("{} dropped: {}", op, reason),
        _ => warn!("{} dropped: {}", op, reason),
    }
}

pub(crate) fn reject(op: &'static str, reason: DropReason) -> DropReason {
    log_drop(op, &reason);
    reason
}

pub(crate) fn address_arg(text: &str) -> Result<DeviceAddress, DropReason> {
    parse_address(text).map_err(|_| DropReason::MalformedAddress(text.to_string()))
}

pub(crate) fn value_arg<'a>(
    value: Option<&'a [u8]>,
    what: &'static str,
) -> Result<&'a [u8], DropReason> {
    value.ok_or(DropReason::InvalidArgument(what))
}

impl BridgeContext {
    /// Issue one stack call built by `call`, unless validation inside it fails
    pub(crate) fn dispatch<F>(&self, op: &'static str, call: F) -> Dispatch
    where
        F: FnOnce(&dyn GattStack) -> Result<(), DropReason>,
    {
        let Some(stack) = self.current_stack() else {
            return Dispatch::Dropped(reject(op, DropReason::NotInitialized));
        };
        match call(stack.as_ref()) {
            Ok(()) => {
                debug!("{} dispatched", op);
                Dispatch::Dispatched
            }
            Err(reason) => Dispatch::Dropped(reject(op, reason)),
        }
    }

    /// Register a waiter for `key`, then issue the call.
    ///
    /// Arguments must already be validated; the waiter is registered first so
    /// a completion fired synchronously from inside the call still finds it.
    /// The stack lock is released before the call so callbacks may re-enter.
    pub(crate) fn dispatch_awaitable<F>(
        &self,
        op: &'static str,
        key: CorrelationKey,
        call: F,
    ) -> Result<Pending, DropReason>
    where
        F: FnOnce(&dyn GattStack),
    {
        let (stack, pending) = {
            // Waiter must exist before any cleanup that observes this stack
            let guard = self.stack_guard();
            let Some(stack) = guard.clone() else {
                return Err(reject(op, DropReason::NotInitialized));
            };
            (stack, self.router().register_waiter(key))
        };
        call(stack.as_ref());
        debug!("{} dispatched, awaiting {:?}", op, key);
        Ok(pending)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::context::BridgeContext;
    use crate::router::{EventReceivers, EventSink};
    use crate::stack::MockGattStack;
    use std::sync::Arc;

    /// Initialized context around a mock that has its outbound expectations set
    pub(crate) fn context_with(mut stack: MockGattStack) -> (BridgeContext, EventReceivers) {
        stack.expect_init().returning(|_| Ok(()));
        stack.expect_cleanup().return_const(());
        let ctx = BridgeContext::default();
        let (sink, receivers) = EventSink::channel();
        ctx.initialize(Arc::new(stack), sink)
            .expect("mock stack initializes");
        (ctx, receivers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_into_result() {
        assert_eq!(Dispatch::Dispatched.into_result(), Ok(()));
        assert_eq!(
            Dispatch::Dropped(DropReason::ValueTooLong { len: 601, max: 600 }).into_result(),
            Err(BridgeError::ValueTooLong { len: 601, max: 600 })
        );
    }

    #[test]
    fn test_uninitialized_context_drops() {
        let ctx = BridgeContext::default();
        let outcome = ctx.dispatch("noop", |_| Ok(()));
        assert_eq!(outcome, Dispatch::Dropped(DropReason::NotInitialized));
        assert!(ctx
            .dispatch_awaitable("noop", CorrelationKey::Mtu { conn_id: 1 }, |_| {})
            .is_err());
        assert!(ctx.router().pending().is_empty());
    }

    #[test]
    fn test_address_arg() {
        assert!(address_arg("AA:BB:CC:DD:EE:FF").is_ok());
        assert_eq!(
            address_arg("AA-BB-CC-DD-EE-FF"),
            Err(DropReason::MalformedAddress("AA-BB-CC-DD-EE-FF".to_string()))
        );
    }

    #[test]
    fn test_value_arg() {
        assert_eq!(value_arg(Some(&[1u8, 2][..]), "value"), Ok(&[1u8, 2][..]));
        assert_eq!(
            value_arg(None, "value"),
            Err(DropReason::InvalidArgument("value"))
        );
    }
}
