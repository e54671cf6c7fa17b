//! The host radio: one btleplug adapter plus the peripherals it has seen.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use btleplug::api::{Central as _, CentralState, Manager as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::runtime::Handle;

use blecentral_app::ports::{LinkEventSink, LinkPrimitive, ScanEventSink, ScanPrimitive};
use blecentral_domain::address::Address;
use blecentral_domain::capability::CapabilityDescriptor;
use blecentral_domain::error::{ConnectError, ScanFailure};

use crate::config::BleConfig;
use crate::error::{BleError, scan_failure};
use crate::link::BleLink;
use crate::scanner::{self, BleScanHandle};

/// Peripheral handles seen while scanning, by address.
pub(crate) type PeripheralCache = Arc<Mutex<HashMap<Address, Peripheral>>>;

/// btleplug-backed implementation of the scan and link ports.
///
/// A host without any adapter still yields a radio: scans then fail with
/// [`ScanFailure::NoAdapter`] and connects with
/// [`ConnectError::AdapterUnavailable`], which is what callers expect.
#[derive(Clone)]
pub struct BleRadio {
    adapter: Option<Adapter>,
    filter: ScanFilter,
    cache: PeripheralCache,
}

impl BleRadio {
    /// Acquire the configured host adapter.
    ///
    /// # Errors
    ///
    /// Returns [`BleError::Platform`] when the BLE manager cannot be created,
    /// or [`BleError::AdapterIndex`] when adapters exist but not at the
    /// configured index.
    pub async fn open(config: &BleConfig, capability: &CapabilityDescriptor) -> Result<Self, BleError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let available = adapters.len();

        let adapter = if available == 0 {
            tracing::warn!("no BLE adapter found on this host");
            None
        } else {
            let adapter = adapters
                .into_iter()
                .nth(config.adapter_index)
                .ok_or(BleError::AdapterIndex {
                    index: config.adapter_index,
                    available,
                })?;
            match adapter.adapter_info().await {
                Ok(info) => tracing::info!(adapter = %info, "using BLE adapter"),
                Err(err) => tracing::debug!(%err, "adapter info unavailable"),
            }
            Some(adapter)
        };

        let filter = if config.filter_by_service {
            ScanFilter {
                services: vec![capability.service],
            }
        } else {
            ScanFilter::default()
        };

        Ok(Self {
            adapter,
            filter,
            cache: Arc::default(),
        })
    }
}

impl ScanPrimitive for BleRadio {
    type Handle = BleScanHandle;

    async fn begin_scan(&self, sink: ScanEventSink) -> Result<BleScanHandle, ScanFailure> {
        let adapter = self.adapter.clone().ok_or(ScanFailure::NoAdapter)?;

        match adapter.adapter_state().await {
            Ok(CentralState::PoweredOff) => return Err(ScanFailure::AdapterDisabled),
            Ok(_) => {}
            Err(err) => tracing::debug!(%err, "adapter state unavailable"),
        }

        let events = adapter.events().await.map_err(|err| scan_failure(&err))?;
        adapter
            .start_scan(self.filter.clone())
            .await
            .map_err(|err| scan_failure(&err))?;

        let forwarder = tokio::spawn(scanner::forward(
            adapter.clone(),
            events,
            sink,
            Arc::clone(&self.cache),
        ));
        Ok(BleScanHandle::new(adapter, forwarder, Handle::current()))
    }
}

impl LinkPrimitive for BleRadio {
    type Link = BleLink;

    fn open_link(&self, address: Address, sink: LinkEventSink) -> Result<BleLink, ConnectError> {
        let adapter = self.adapter.clone().ok_or(ConnectError::AdapterUnavailable)?;
        let peripheral = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&address)
            .cloned()
            .ok_or(ConnectError::DeviceUnresolvable)?;
        let runtime = Handle::try_current().map_err(|_| ConnectError::LinkOpenFailed)?;

        tracing::debug!(%address, "opening link");
        Ok(BleLink::spawn(&runtime, adapter, peripheral, sink))
    }
}
