/// Bridge lifecycle
///
/// `BridgeContext` owns the current stack handle and, through the router, the
/// current delivery sink. There is at most one live stack per context:
/// `initialize` tears down whatever was there before, and `cleanup` can be
/// called any number of times.

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::router::{CallbackRouter, EventSink};
use crate::stack::{GattStack, StackCallbacks};
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct BridgeContext {
    stack: RwLock<Option<Arc<dyn GattStack>>>,
    router: Arc<CallbackRouter>,
    config: BridgeConfig,
}

impl Default for BridgeContext {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl BridgeContext {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            stack: RwLock::new(None),
            router: Arc::new(CallbackRouter::new(config.adv_report_len)),
            config,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Router the stack delivers callbacks to
    pub fn router(&self) -> &Arc<CallbackRouter> {
        &self.router
    }

    pub fn is_initialized(&self) -> bool {
        self.stack.read().is_some()
    }

    /// Bring up `stack` with `sink` as the delivery target.
    ///
    /// Any previous stack is cleaned up first. The sink is installed before
    /// the stack starts so callbacks fired during `init` are delivered. If the
    /// stack refuses to start nothing stays installed.
    pub fn initialize(&self, stack: Arc<dyn GattStack>, sink: EventSink) -> Result<(), BridgeError> {
        if self.is_initialized() {
            warn!("Bridge already initialized; cleaning up previous stack");
            self.cleanup();
        }

        self.router.install_sink(sink);

        let callbacks: Arc<dyn StackCallbacks> = self.router.clone();
        if let Err(status) = stack.init(callbacks) {
            error!("GATT stack init failed with status {}", status);
            self.router.remove_sink();
            return Err(BridgeError::StackRejected(status));
        }

        *self.stack.write() = Some(stack);
        info!("GATT bridge initialized");
        Ok(())
    }

    /// Tear down the stack and the sink. Outstanding waiters are cancelled.
    pub fn cleanup(&self) {
        let previous = self.stack.write().take();
        self.router.remove_sink();

        match previous {
            Some(stack) => {
                stack.cleanup();
                info!("GATT bridge cleaned up");
            }
            None => debug!("Cleanup with no stack installed"),
        }
    }

    /// Snapshot of the current stack handle. The lock is not held while the
    /// caller uses it, so callbacks may re-enter the context.
    pub(crate) fn current_stack(&self) -> Option<Arc<dyn GattStack>> {
        self.stack.read().clone()
    }

    /// Read guard over the stack slot; `cleanup` cannot start while it is held
    pub(crate) fn stack_guard(&self) -> RwLockReadGuard<'_, Option<Arc<dyn GattStack>>> {
        self.stack.read()
    }
}

impl Drop for BridgeContext {
    fn drop(&mut self) {
        if self.is_initialized() {
            self.cleanup();
        }
    }
}
