//! Integration tests for DeviceManager
//!
//! Runs the manager against the in-process transport double:
//! - Transport init/exit lifecycle
//! - Enumeration filters and ordering
//! - Enumeration session accounting and release
//! - Corrupt (cyclic) enumeration lists

use common::test_utils::{
    FakeCall, FakeTransport, create_mock_device, create_mock_device_list,
};
use hid_adapter::{DeviceManager, DeviceState, HidError, MAX_DEVICE_COUNT};

mod lifecycle {
    use super::*;

    #[test]
    fn test_first_search_initialises_transport() {
        let fake = FakeTransport::install(create_mock_device_list(1));
        let mut manager = DeviceManager::new(fake.dispatcher());

        manager.search_devices(0, 0).unwrap();

        assert_eq!(
            &fake.calls()[..2],
            &[
                FakeCall::Init,
                FakeCall::Enumerate {
                    vendor_id: 0,
                    product_id: 0
                }
            ]
        );
    }

    #[test]
    fn test_init_failure_returns_transport_error() {
        let fake = FakeTransport::install(create_mock_device_list(1))
            .with_behavior(|b| b.fail_init = true);
        let mut manager = DeviceManager::new(fake.dispatcher());

        let err = manager.search_devices(0, 0).unwrap_err();
        assert!(matches!(
            err,
            HidError::Transport {
                operation: "hid_init",
                ..
            }
        ));
        assert_eq!(fake.count(|c| matches!(c, FakeCall::Enumerate { .. })), 0);
    }

    #[test]
    fn test_shutdown_frees_each_session_once_and_exits_once() {
        let fake = FakeTransport::install(create_mock_device_list(3));
        let mut manager = DeviceManager::new(fake.dispatcher());

        manager.search_devices(0, 0).unwrap();
        manager.search_devices(0x1002, 0).unwrap();
        assert_eq!(fake.outstanding_lists(), 2);

        manager.shutdown();
        manager.shutdown();
        drop(manager);

        assert_eq!(fake.count(|c| *c == FakeCall::FreeEnumeration), 2);
        assert_eq!(fake.count(|c| *c == FakeCall::Exit), 1);
        assert_eq!(fake.outstanding_lists(), 0);
    }

    #[test]
    fn test_frees_happen_before_exit() {
        let fake = FakeTransport::install(create_mock_device_list(2));
        let mut manager = DeviceManager::new(fake.dispatcher());

        manager.search_devices(0, 0).unwrap();
        manager.shutdown();

        let calls = fake.calls();
        let free = calls
            .iter()
            .position(|c| *c == FakeCall::FreeEnumeration)
            .unwrap();
        let exit = calls.iter().position(|c| *c == FakeCall::Exit).unwrap();
        assert!(free < exit);
    }

    #[test]
    fn test_drop_releases_everything() {
        let fake = FakeTransport::install(create_mock_device_list(2));
        {
            let mut manager = DeviceManager::new(fake.dispatcher());
            manager.search_devices(0, 0).unwrap();
        }
        assert_eq!(fake.outstanding_lists(), 0);
        assert_eq!(fake.count(|c| *c == FakeCall::Exit), 1);
    }

    #[test]
    fn test_shutdown_without_search_makes_no_calls() {
        let fake = FakeTransport::install(create_mock_device_list(2));
        let mut manager = DeviceManager::new(fake.dispatcher());

        manager.shutdown();

        assert!(fake.calls().is_empty());
    }

    #[test]
    fn test_search_after_shutdown_reinitialises() {
        let fake = FakeTransport::install(create_mock_device_list(1));
        let mut manager = DeviceManager::new(fake.dispatcher());

        manager.search_devices(0, 0).unwrap();
        manager.shutdown();
        manager.search_devices(0, 0).unwrap();

        assert_eq!(fake.count(|c| *c == FakeCall::Init), 2);
        assert!(manager.is_initialized());
    }
}

mod enumeration {
    use super::*;

    #[test]
    fn test_three_devices_in_list_order() {
        let fake = FakeTransport::install(create_mock_device_list(3));
        let mut manager = DeviceManager::new(fake.dispatcher());

        let devices = manager.search_devices(0, 0).unwrap();

        let paths: Vec<String> = devices.iter().map(|d| d.path_lossy()).collect();
        assert_eq!(paths, vec!["/dev/hidraw1", "/dev/hidraw2", "/dev/hidraw3"]);
        assert!(devices.iter().all(|d| d.state() == DeviceState::Discovered));
    }

    #[test]
    fn test_no_match_returns_empty_vec() {
        let fake = FakeTransport::install(create_mock_device_list(3));
        let mut manager = DeviceManager::new(fake.dispatcher());

        let devices = manager.search_devices(0xdead, 0xbeef).unwrap();

        assert!(devices.is_empty());
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn test_vendor_filter_with_wildcard_product() {
        let fake = FakeTransport::install(vec![
            create_mock_device(1, 0x046d, 0xc52b),
            create_mock_device(2, 0x046d, 0xc077),
            create_mock_device(3, 0x1209, 0x0001),
        ]);
        let mut manager = DeviceManager::new(fake.dispatcher());

        let devices = manager.search_devices(0x046d, 0).unwrap();

        assert_eq!(devices.len(), 2);
        assert!(devices.iter().all(|d| d.vendor_id() == 0x046d));
    }

    #[test]
    fn test_exact_filter() {
        let fake = FakeTransport::install(vec![
            create_mock_device(1, 0x046d, 0xc52b),
            create_mock_device(2, 0x046d, 0xc077),
        ]);
        let mut manager = DeviceManager::new(fake.dispatcher());

        let devices = manager.search_devices(0x046d, 0xc077).unwrap();

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].product_id(), 0xc077);
        assert_eq!(devices[0].path_lossy(), "/dev/hidraw2");
    }

    #[test]
    fn test_descriptor_strings_are_copied() {
        let fake = FakeTransport::install(create_mock_device_list(1));
        let mut manager = DeviceManager::new(fake.dispatcher());

        let devices = manager.search_devices(0, 0).unwrap();
        manager.shutdown();

        // Lists are freed; the descriptor must not point into them.
        let descriptor = devices[0].descriptor();
        assert_eq!(descriptor.serial_number.as_deref(), Some("SN000001"));
        assert_eq!(
            descriptor.manufacturer_string.as_deref(),
            Some("Test Manufacturer 1")
        );
        assert_eq!(descriptor.product_string.as_deref(), Some("Test Product 1"));
    }

    #[test]
    fn test_sessions_accumulate_across_searches() {
        let fake = FakeTransport::install(create_mock_device_list(2));
        let mut manager = DeviceManager::new(fake.dispatcher());

        for _ in 0..3 {
            manager.search_devices(0, 0).unwrap();
        }

        assert_eq!(manager.session_count(), 3);
        assert_eq!(fake.count(|c| *c == FakeCall::FreeEnumeration), 0);
    }

    #[test]
    fn test_handles_share_the_manager_dispatcher() {
        let fake = FakeTransport::install(create_mock_device_list(2));
        let mut manager = DeviceManager::new(fake.dispatcher());

        let mut devices = manager.search_devices(0, 0).unwrap();
        assert!(devices[1].connect());

        assert_eq!(
            fake.count(|c| *c == FakeCall::OpenPath("/dev/hidraw2".into())),
            1
        );
    }

    #[test]
    fn test_same_device_compares_paths() {
        let fake = FakeTransport::install(create_mock_device_list(2));
        let mut manager = DeviceManager::new(fake.dispatcher());

        let first = manager.search_devices(0, 0).unwrap();
        let second = manager.search_devices(0, 0).unwrap();

        assert!(first[0].same_device(&second[0]));
        assert!(!first[0].same_device(&second[1]));
    }
}

mod corrupt_lists {
    use super::*;

    #[test]
    fn test_cyclic_list_overflows() {
        let fake = FakeTransport::install(create_mock_device_list(2))
            .with_behavior(|b| b.cyclic = true);
        let mut manager = DeviceManager::new(fake.dispatcher());

        match manager.search_devices(0, 0) {
            Err(HidError::EnumerationOverflow { limit }) => assert_eq!(limit, MAX_DEVICE_COUNT),
            other => panic!("expected EnumerationOverflow, got {:?}", other),
        }
    }

    #[test]
    fn test_overflowed_list_is_still_released() {
        let fake = FakeTransport::install(create_mock_device_list(1))
            .with_behavior(|b| b.cyclic = true);
        let mut manager = DeviceManager::new(fake.dispatcher());

        assert!(manager.search_devices(0, 0).is_err());
        assert_eq!(manager.session_count(), 1);

        manager.shutdown();
        assert_eq!(fake.outstanding_lists(), 0);
    }

    #[test]
    fn test_device_without_path_is_returned_but_not_connectable() {
        let mut pathless = create_mock_device(1, 0x1234, 0x5678);
        pathless.path = None;
        let fake = FakeTransport::install(vec![pathless]);
        let mut manager = DeviceManager::new(fake.dispatcher());

        let mut devices = manager.search_devices(0, 0).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].path(), None);
        assert!(!devices[0].connect());
        assert_eq!(devices[0].state(), DeviceState::Discovered);
    }
}
