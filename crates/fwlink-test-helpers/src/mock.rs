//! Mock implementations for testing.
//!
//! [`MockDeviceHandle`] clones share their state, so a test keeps one clone
//! to script failures and read counters while the device owns another.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use fwlink_device::{BusDevice, DeviceDetails, DeviceHandle, DeviceHandleFactory, InstallFlags};
use fwlink_errors::{DeviceError, DeviceResult, FirmwareFault, KernelPolicyError};
use fwlink_kernel::KernelInfo;

#[derive(Debug, Default)]
struct MockHandleState {
    details: DeviceDetails,
    present: bool,
    probe_fails: bool,
    deny_open: bool,
    write_fault: Option<FirmwareFault>,
    rescan_error: Option<DeviceError>,
    opens: usize,
    closes: usize,
    probes: usize,
    rescans: usize,
    writes: Vec<Vec<u8>>,
    last_flags: Option<InstallFlags>,
}

/// Scriptable device handle.
#[derive(Debug, Clone)]
pub struct MockDeviceHandle {
    logical_id: String,
    state: Arc<Mutex<MockHandleState>>,
}

impl MockDeviceHandle {
    /// Handle whose hardware answers with `details`.
    pub fn new(logical_id: impl Into<String>, details: DeviceDetails) -> Self {
        Self {
            logical_id: logical_id.into(),
            state: Arc::new(Mutex::new(MockHandleState {
                details,
                present: true,
                ..MockHandleState::default()
            })),
        }
    }

    /// Handle that probes but finds nothing downstream on rescan.
    pub fn absent(logical_id: impl Into<String>, details: DeviceDetails) -> Self {
        let handle = Self::new(logical_id, details);
        handle.set_present(false);
        handle
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Whether rescans find hardware.
    pub fn set_present(&self, present: bool) {
        self.state.lock().present = present;
    }

    pub fn set_probe_fails(&self, fails: bool) {
        self.state.lock().probe_fails = fails;
    }

    pub fn set_deny_open(&self, deny: bool) {
        self.state.lock().deny_open = deny;
    }

    /// Make the next writes fail with `fault`; `None` makes them succeed.
    pub fn set_write_fault(&self, fault: Option<FirmwareFault>) {
        self.state.lock().write_fault = fault;
    }

    /// Make rescans fail with `error` regardless of presence; `None` clears it.
    pub fn set_rescan_error(&self, error: Option<DeviceError>) {
        self.state.lock().rescan_error = error;
    }

    /// Replace what probe and rescan report.
    pub fn set_details(&self, details: DeviceDetails) {
        self.state.lock().details = details;
    }

    pub fn opens(&self) -> usize {
        self.state.lock().opens
    }

    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }

    pub fn probes(&self) -> usize {
        self.state.lock().probes
    }

    pub fn rescans(&self) -> usize {
        self.state.lock().rescans
    }

    /// Images written so far.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }

    pub fn last_flags(&self) -> Option<InstallFlags> {
        self.state.lock().last_flags
    }

    /// Whether more opens than closes happened.
    pub fn is_open(&self) -> bool {
        let state = self.state.lock();
        state.opens > state.closes
    }
}

#[async_trait]
impl DeviceHandle for MockDeviceHandle {
    fn open(&self) -> DeviceResult {
        let mut state = self.state.lock();
        if state.deny_open {
            return Err(DeviceError::access(&self.logical_id, "permission denied"));
        }
        state.opens += 1;
        Ok(())
    }

    fn close(&self) -> DeviceResult {
        self.state.lock().closes += 1;
        Ok(())
    }

    async fn probe(&self) -> DeviceResult<DeviceDetails> {
        let mut state = self.state.lock();
        state.probes += 1;
        if state.probe_fails {
            return Err(DeviceError::probe(&self.logical_id, "mock probe failure"));
        }
        Ok(state.details.clone())
    }

    async fn rescan(&self) -> DeviceResult<DeviceDetails> {
        let mut state = self.state.lock();
        state.rescans += 1;
        if let Some(error) = state.rescan_error.clone() {
            return Err(error);
        }
        if !state.present {
            return Err(DeviceError::rescan(
                &self.logical_id,
                "nothing connected downstream",
            ));
        }
        Ok(state.details.clone())
    }

    async fn write_firmware(&self, firmware: &[u8], flags: InstallFlags) -> Result<(), FirmwareFault> {
        let mut state = self.state.lock();
        state.last_flags = Some(flags);
        if let Some(fault) = state.write_fault.clone() {
            return Err(fault);
        }
        state.writes.push(firmware.to_vec());
        Ok(())
    }
}

/// Factory handing out pre-registered [`MockDeviceHandle`]s by logical id.
#[derive(Debug, Clone, Default)]
pub struct MockHandleFactory {
    handles: Arc<Mutex<HashMap<String, MockDeviceHandle>>>,
    created: Arc<Mutex<Vec<String>>>,
}

impl MockHandleFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` and return a clone sharing its state.
    pub fn insert(&self, handle: MockDeviceHandle) -> MockDeviceHandle {
        self.handles
            .lock()
            .insert(handle.logical_id().to_string(), handle.clone());
        handle
    }

    /// Look up a registered handle.
    pub fn handle(&self, logical_id: &str) -> Option<MockDeviceHandle> {
        self.handles.lock().get(logical_id).cloned()
    }

    /// Logical ids `create` was called for, in order.
    pub fn created(&self) -> Vec<String> {
        self.created.lock().clone()
    }
}

impl DeviceHandleFactory for MockHandleFactory {
    fn create(&self, bus: &BusDevice) -> DeviceResult<Box<dyn DeviceHandle>> {
        self.created.lock().push(bus.logical_id.clone());
        match self.handles.lock().get(&bus.logical_id) {
            Some(handle) => Ok(Box::new(handle.clone())),
            None => Err(DeviceError::access(&bus.logical_id, "no such device node")),
        }
    }
}

/// Fixed kernel release and module list.
#[derive(Debug, Clone)]
pub struct MockKernelInfo {
    release: String,
    modules: Option<Vec<String>>,
}

impl MockKernelInfo {
    /// Kernel `release` with module support and nothing loaded.
    pub fn new(release: impl Into<String>) -> Self {
        Self {
            release: release.into(),
            modules: Some(Vec::new()),
        }
    }

    /// Add loaded modules.
    pub fn with_modules(mut self, modules: &[&str]) -> Self {
        self.modules
            .get_or_insert_with(Vec::new)
            .extend(modules.iter().map(|m| (*m).to_string()));
        self
    }

    /// Kernel built without loadable module support.
    pub fn without_module_support(mut self) -> Self {
        self.modules = None;
        self
    }
}

impl KernelInfo for MockKernelInfo {
    fn release(&self) -> Result<String, KernelPolicyError> {
        Ok(self.release.clone())
    }

    fn loaded_modules(&self) -> Result<Option<Vec<String>>, KernelPolicyError> {
        Ok(self.modules.clone())
    }
}
