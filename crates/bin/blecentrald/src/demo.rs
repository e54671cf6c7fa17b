//! Demo setup for the virtual backend: one UART peripheral that chats
//! periodically and one unrelated beacon.

use std::time::Duration;

use tokio::task::JoinHandle;

use blecentral_adapter_virtual::{VirtualPeripheral, VirtualRadio};
use blecentral_domain::address::Address;
use blecentral_domain::capability::CapabilityDescriptor;

pub const DEMO_ADDRESS: Address = Address::new([0xC0, 0xFF, 0xEE, 0x00, 0x00, 0x01]);
const BEACON_ADDRESS: Address = Address::new([0xC0, 0xFF, 0xEE, 0x00, 0x00, 0x02]);
const CHATTER_PERIOD: Duration = Duration::from_secs(2);

#[must_use]
pub fn radio() -> VirtualRadio {
    VirtualRadio::new(vec![
        VirtualPeripheral::uart(DEMO_ADDRESS, "blecentral-demo"),
        VirtualPeripheral::new(BEACON_ADDRESS).with_rssi(-88),
    ])
}

/// Notify a numbered line on the demo peripheral every couple of seconds.
pub fn spawn_chatter(radio: VirtualRadio, capability: CapabilityDescriptor) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CHATTER_PERIOD);
        let mut line = 0_u32;
        loop {
            ticker.tick().await;
            let text = format!("tick {line}");
            if radio.notify(DEMO_ADDRESS, capability.notify_characteristic, text.as_bytes()) {
                line += 1;
            }
        }
    })
}
