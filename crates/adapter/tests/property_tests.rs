//! Property-based tests for enumeration, framing and string iteration

use common::test_utils::{FakeCall, FakeDevice, FakeTransport, create_mock_device};
use hid_adapter::{DeviceManager, MAX_INDEXED_STRINGS};
use proptest::prelude::*;

/// Devices with IDs drawn from a small pool so filters hit and miss
fn device_set_strategy() -> impl Strategy<Value = Vec<FakeDevice>> {
    proptest::collection::vec((0u16..4, 0u16..4), 0..24).prop_map(|ids| {
        ids.into_iter()
            .enumerate()
            .map(|(i, (v, p))| create_mock_device(i as u32, 0x1000 + v, 0x2000 + p))
            .collect()
    })
}

/// A vendor or product filter: zero (wildcard) or one of the pool IDs
fn filter_strategy(base: u16) -> impl Strategy<Value = u16> {
    prop_oneof![Just(0u16), (0u16..4).prop_map(move |id| base + id)]
}

proptest! {
    /// Property: search returns exactly the matching devices, in list order
    #[test]
    fn prop_search_matches_filter_in_order(
        devices in device_set_strategy(),
        vendor_id in filter_strategy(0x1000),
        product_id in filter_strategy(0x2000),
    ) {
        let expected: Vec<String> = devices
            .iter()
            .filter(|d| vendor_id == 0 || d.vendor_id == vendor_id)
            .filter(|d| product_id == 0 || d.product_id == product_id)
            .filter_map(|d| d.path.clone())
            .collect();

        let fake = FakeTransport::install(devices);
        let mut manager = DeviceManager::new(fake.dispatcher());
        let found: Vec<String> = manager
            .search_devices(vendor_id, product_id)
            .unwrap()
            .iter()
            .map(|d| d.path_lossy())
            .collect();

        prop_assert_eq!(found, expected);
    }

    /// Property: every search is released exactly once at shutdown
    #[test]
    fn prop_sessions_released_once(
        devices in device_set_strategy(),
        searches in 1usize..6,
    ) {
        let fake = FakeTransport::install(devices);
        let mut manager = DeviceManager::new(fake.dispatcher());
        for _ in 0..searches {
            manager.search_devices(0, 0).unwrap();
        }
        let retained = manager.session_count();

        manager.shutdown();
        manager.shutdown();

        prop_assert_eq!(fake.count(|c| *c == FakeCall::FreeEnumeration), retained);
        prop_assert_eq!(fake.outstanding_lists(), 0);
        prop_assert!(fake.count(|c| *c == FakeCall::Exit) <= 1);
    }

    /// Property: the transport always sees 0x00 followed by the payload
    #[test]
    fn prop_write_frames_payload(payload in proptest::collection::vec(any::<u8>(), 1..2048)) {
        let fake = FakeTransport::install(vec![create_mock_device(1, 0x1234, 0x5678)]);
        let mut manager = DeviceManager::new(fake.dispatcher());
        let mut handle = manager.search_devices(0, 0).unwrap().remove(0);
        prop_assert!(handle.connect());

        let written = handle.write(&payload[..]);

        let mut expected = vec![0u8];
        expected.extend_from_slice(&payload);
        prop_assert_eq!(written, payload.len() as i32 + 1);
        prop_assert_eq!(fake.written_frames(), vec![expected]);
    }

    /// Property: indexed strings yield min(available, cap) entries
    #[test]
    fn prop_device_strings_bounded(available in 0usize..40) {
        let mut device = create_mock_device(1, 0x1234, 0x5678);
        device.indexed_strings = (0..available).map(|i| format!("s{}", i)).collect();
        let fake = FakeTransport::install(vec![device]);
        let mut manager = DeviceManager::new(fake.dispatcher());
        let mut handle = manager.search_devices(0, 0).unwrap().remove(0);
        prop_assert!(handle.connect());

        let strings: Vec<String> = handle.device_strings().collect();

        prop_assert_eq!(strings.len(), available.min(MAX_INDEXED_STRINGS as usize));
        prop_assert_eq!(
            fake.count(|c| *c == FakeCall::GetIndexedString(MAX_INDEXED_STRINGS)),
            0
        );
    }
}
