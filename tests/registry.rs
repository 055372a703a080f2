use parking_lot::Mutex;
use peripherals::bus::{sync_devices, BusCore, PeripheralBus};
use peripherals::{
    BusType, CecStateChange, EventFilter, Host, NotificationLevel, Peripheral, PeripheralHandle,
    PeripheralManager, PeripheralType, RegistryConfig, RegistryEvent, RegistryListener,
    ScanResult, SettingValue, VirtualBus,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

const MAPPINGS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<peripherals>
  <peripheral vendor_product="1234:abcd" bus="usb" name="Test Remote" mapTo="hid">
    <setting key="foo" type="bool" value="yes" />
  </peripheral>
  <peripheral vendor_product="2548:1001,2548:1002" name="Pulse-Eight CEC Adapter" mapTo="cec" />
  <peripheral bus="cec" name="CEC Adapter" mapTo="cec">
    <setting key="enabled" type="bool" value="yes" label="305" />
    <setting key="use_tv_menu_language" type="bool" value="yes" />
  </peripheral>
</peripherals>
"#;

#[derive(Default)]
struct RecordingHost {
    toasts: Mutex<Vec<(NotificationLevel, String, String)>>,
    refreshes: AtomicUsize,
    dialogs: AtomicUsize,
    folders: Mutex<Vec<String>>,
}

impl Host for RecordingHost {
    fn create_directory(&self, path: &Path) -> std::io::Result<()> {
        self.folders.lock().push(path.display().to_string());
        std::fs::create_dir_all(path)
    }

    fn localize(&self, id: u32) -> String {
        format!("#{id}")
    }

    fn notify(&self, level: NotificationLevel, title: &str, body: &str) {
        self.toasts.lock().push((level, title.into(), body.into()));
    }

    fn refresh_settings_ui(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }

    fn open_peripheral_manager(&self) {
        self.dialogs.fetch_add(1, Ordering::SeqCst);
    }
}

impl RecordingHost {
    fn titles(&self) -> Vec<String> {
        self.toasts.lock().iter().map(|t| t.1.clone()).collect()
    }
}

/// Bus that counts how often it is brought up and scanned.
struct CountingBus {
    core: BusCore,
    initialised: AtomicUsize,
    scans: AtomicUsize,
    devices: Mutex<Vec<ScanResult>>,
}

impl CountingBus {
    fn new(bus_type: BusType) -> Self {
        Self {
            core: BusCore::new(bus_type),
            initialised: AtomicUsize::new(0),
            scans: AtomicUsize::new(0),
            devices: Mutex::new(Vec::new()),
        }
    }
}

impl PeripheralBus for CountingBus {
    fn bus_type(&self) -> BusType {
        self.core.bus_type()
    }

    fn initialise(&self) -> bool {
        self.initialised.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn trigger_device_scan(&self, registry: &PeripheralManager) {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let found = self.devices.lock().clone();
        sync_devices(self, registry, &found);
    }

    fn core(&self) -> &BusCore {
        &self.core
    }
}

#[derive(Clone, Default)]
struct Events(Arc<Mutex<Vec<RegistryEvent>>>);

impl RegistryListener for Events {
    fn on_event(&mut self, event: &RegistryEvent) {
        self.0.lock().push(event.clone());
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    config: RegistryConfig,
    host: Arc<RecordingHost>,
}

fn fixture(cec: bool) -> Fixture {
    fixture_with(cec, MAPPINGS)
}

fn fixture_with(cec: bool, mappings: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let mapping_file = dir.path().join("peripherals.xml");
    std::fs::write(&mapping_file, mappings).unwrap();

    let mut config = RegistryConfig::default();
    config.mapping_file = mapping_file;
    config.data_dir = dir.path().join("peripheral_data");
    config.capabilities.cec = cec;

    Fixture {
        _dir: dir,
        config,
        host: Arc::new(RecordingHost::default()),
    }
}

fn registry(f: &Fixture) -> PeripheralManager {
    PeripheralManager::new(f.config.clone(), f.host.clone())
}

fn remote(location: &str) -> ScanResult {
    ScanResult::new(location)
        .with_bus(BusType::Usb)
        .with_ids(0x1234, 0xabcd)
}

#[test]
fn mapped_device_is_built_with_its_settings() {
    let f = fixture(true);
    let usb = Arc::new(VirtualBus::new(BusType::Usb));
    usb.attach(remote("1-1"));
    usb.attach(ScanResult::new("1-2").with_bus(BusType::Usb).with_ids(0x1234, 0xffff));

    let registry = registry(&f).with_bus_instance(usb.clone());
    registry.initialise().unwrap();

    assert_eq!(usb.number_of_peripherals(), 1);
    assert!(usb.get_peripheral("1-2").is_none());

    let handle = usb.get_peripheral("1-1").unwrap();
    let p = handle.lock();
    assert_eq!(p.peripheral_type(), PeripheralType::Hid);
    assert_eq!(p.bool_setting("foo"), Some(true));
    assert_eq!(p.device_name(), "Test Remote");
    assert!(p.is_initialised());
}

#[test]
fn initialise_runs_once_until_cleared() {
    let f = fixture(true);
    let bus = Arc::new(CountingBus::new(BusType::Usb));
    bus.devices.lock().push(remote("1-1"));
    let registry = registry(&f).with_bus_instance(bus.clone());

    registry.initialise().unwrap();
    registry.initialise().unwrap();
    assert_eq!(bus.initialised.load(Ordering::SeqCst), 1);
    assert_eq!(bus.scans.load(Ordering::SeqCst), 1);
    assert_eq!(f.host.folders.lock().len(), 1);
    assert!(f.config.data_dir.is_dir());

    registry.clear();
    assert!(!registry.is_initialised());
    assert_eq!(bus.number_of_peripherals(), 0);

    registry.initialise().unwrap();
    assert_eq!(bus.initialised.load(Ordering::SeqCst), 2);
    assert_eq!(f.host.folders.lock().len(), 2);
    assert_eq!(registry.number_of_peripherals(), 1);
}

#[test]
fn missing_mapping_file_leaves_devices_unmapped() {
    let mut f = fixture(true);
    f.config.mapping_file = f.config.data_dir.join("nope.xml");
    let usb = Arc::new(VirtualBus::new(BusType::Usb));
    usb.attach(remote("1-1"));

    let registry = registry(&f).with_bus_instance(usb);
    registry.initialise().unwrap();
    assert!(registry.is_initialised());
    assert_eq!(registry.number_of_peripherals(), 0);
}

#[test]
fn added_and_removed_devices_notify_the_host() {
    let f = fixture(true);
    let usb = Arc::new(VirtualBus::new(BusType::Usb));
    let registry = registry(&f).with_bus_instance(usb.clone());
    let events = Events::default();
    registry.add_listener(events.clone(), EventFilter::All, None);
    registry.initialise().unwrap();

    usb.attach(remote("1-1"));
    registry.trigger_device_scan(BusType::Usb);
    usb.detach("1-1");
    registry.trigger_device_scan(BusType::Unknown);

    assert_eq!(registry.number_of_peripherals(), 0);
    assert_eq!(f.host.titles(), vec!["#35005", "#35006"]);
    assert_eq!(f.host.toasts.lock()[0].2, "Test Remote");
    assert_eq!(f.host.refreshes.load(Ordering::SeqCst), 2);

    let events = events.0.lock();
    assert!(matches!(&events[0], RegistryEvent::DeviceAdded { location, .. } if location == "1-1"));
    assert!(matches!(&events[1], RegistryEvent::DeviceRemoved { bus: BusType::Usb, .. }));
}

#[test]
fn rescanning_does_not_duplicate_peripherals() {
    let f = fixture(true);
    let usb = Arc::new(VirtualBus::new(BusType::Usb));
    usb.attach(remote("1-1"));
    let registry = registry(&f).with_bus_instance(usb.clone());
    registry.initialise().unwrap();

    registry.trigger_device_scan(BusType::Usb);
    registry.trigger_device_scan(BusType::Usb);
    assert_eq!(registry.number_of_peripherals(), 1);
    assert_eq!(f.host.titles(), vec!["#35005"]);
}

#[test]
fn scan_filter_picks_one_bus() {
    let f = fixture(true);
    let usb = Arc::new(CountingBus::new(BusType::Usb));
    let cec = Arc::new(CountingBus::new(BusType::Cec));
    let registry = registry(&f)
        .with_bus_instance(usb.clone())
        .with_bus_instance(cec.clone());
    registry.initialise().unwrap();

    registry.trigger_device_scan(BusType::Cec);
    assert_eq!(usb.scans.load(Ordering::SeqCst), 1);
    assert_eq!(cec.scans.load(Ordering::SeqCst), 2);

    registry.trigger_device_scan(BusType::Unknown);
    assert_eq!(usb.scans.load(Ordering::SeqCst), 2);
    assert_eq!(cec.scans.load(Ordering::SeqCst), 3);

    // No bus of that type: nothing happens.
    registry.trigger_device_scan(BusType::Pci);
    assert_eq!(usb.scans.load(Ordering::SeqCst), 2);
}

#[test]
fn missing_cec_support_warns_once_until_cleared() {
    let f = fixture(false);
    let cec = Arc::new(VirtualBus::new(BusType::Cec));
    cec.attach(ScanResult::new("/dev/cec0"));
    let registry = registry(&f).with_bus_instance(cec.clone());
    let events = Events::default();
    registry.add_listener(
        events.clone(),
        EventFilter::Custom(|e| matches!(e, RegistryEvent::CapabilityMissing { .. })),
        None,
    );

    registry.initialise().unwrap();
    registry.trigger_device_scan(BusType::Cec);
    registry.trigger_device_scan(BusType::Cec);

    assert_eq!(cec.number_of_peripherals(), 0);
    assert_eq!(events.0.lock().len(), 1);
    assert_eq!(
        f.host.toasts.lock().clone(),
        vec![(NotificationLevel::Warning, "#36000".to_string(), "#36017".to_string())]
    );

    registry.clear();
    registry.initialise().unwrap();
    assert_eq!(events.0.lock().len(), 2);
}

#[test]
fn toggle_mute_without_cec_adapters() {
    let f = fixture(true);
    let usb = Arc::new(VirtualBus::new(BusType::Usb));
    usb.attach(remote("1-1"));
    let registry = registry(&f).with_bus_instance(usb);
    registry.initialise().unwrap();

    assert!(!registry.toggle_mute());
    assert!(!registry.is_muted());
    assert!(!registry.toggle_device_state(CecStateChange::Toggle, 0));
}

#[test]
fn toggle_device_state_targets_one_adapter() {
    let f = fixture(true);
    let cec = Arc::new(VirtualBus::new(BusType::Cec));
    for port in ["cec0", "cec1", "cec2"] {
        cec.attach(ScanResult::new(port));
    }
    let registry = registry(&f).with_bus_instance(cec.clone());
    registry.initialise().unwrap();

    let active = |location: &str| {
        cec.get_peripheral(location)
            .unwrap()
            .lock()
            .as_cec()
            .unwrap()
            .is_active()
    };

    assert!(registry.toggle_device_state(CecStateChange::Standby, 1));
    assert!(active("cec0"));
    assert!(!active("cec1"));
    assert!(active("cec2"));

    // Index zero applies to every adapter.
    assert!(registry.toggle_device_state(CecStateChange::Toggle, 0));
    assert!(!active("cec0"));
    assert!(active("cec1"));
    assert!(!active("cec2"));

    assert!(!registry.toggle_device_state(CecStateChange::Toggle, 3));
}

#[test]
fn directory_and_path_lookup() {
    let f = fixture(true);
    let usb = Arc::new(VirtualBus::new(BusType::Usb));
    usb.attach(remote("1-1"));
    let cec = Arc::new(VirtualBus::new(BusType::Cec));
    cec.attach(ScanResult::new("cec0"));
    let registry = registry(&f)
        .with_bus_instance(usb)
        .with_bus_instance(cec);
    registry.initialise().unwrap();

    let mut items = Vec::new();
    registry.get_directory("peripherals://all/", &mut items);
    assert_eq!(items.len(), 2);

    items.clear();
    registry.get_directory("peripherals://cec/", &mut items);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].path, "peripherals://cec/cec0.dev");
    assert_eq!(items[0].label, "CEC Adapter");

    items.clear();
    registry.get_directory("peripherals://pci/", &mut items);
    registry.get_directory("smb://all/", &mut items);
    assert!(items.is_empty());

    let handle = registry.get_by_path("peripherals://usb/1-1.dev").unwrap();
    assert_eq!(handle.lock().location(), "1-1");
    assert!(registry.get_by_path("peripherals://all/1-1.dev").is_none());
    assert!(registry.get_by_path("peripherals://cec/1-1.dev").is_none());
}

#[test]
fn setting_hooks() {
    let f = fixture(true);
    let cec = Arc::new(VirtualBus::new(BusType::Cec));
    cec.attach(ScanResult::new("cec0"));
    let registry = registry(&f).with_bus_instance(cec.clone());
    registry.initialise().unwrap();

    let handle = cec.get_peripheral("cec0").unwrap();
    assert_eq!(handle.lock().bool_setting("use_tv_menu_language"), Some(true));
    registry.on_setting_changed("locale.language");
    assert_eq!(handle.lock().bool_setting("use_tv_menu_language"), Some(false));

    // Settings stay typed.
    assert!(!handle.lock().set_setting("enabled", SettingValue::Int(1)));

    registry.on_setting_action("input.peripherals");
    registry.on_setting_action("input.keyboard");
    assert_eq!(f.host.dialogs.load(Ordering::SeqCst), 1);
}

#[test]
fn filtered_and_tagged_listeners() {
    let f = fixture(true);
    let usb = Arc::new(VirtualBus::new(BusType::Usb));
    let registry = registry(&f).with_bus_instance(usb.clone());

    let tagged = Events::default();
    let removals = Events::default();
    registry.add_listener(tagged.clone(), EventFilter::All, Some("1-2".into()));
    let id = registry.add_listener(removals.clone(), EventFilter::RemovedOnly, None);
    registry.initialise().unwrap();

    usb.attach(remote("1-1"));
    usb.attach(remote("1-2"));
    registry.trigger_device_scan(BusType::Usb);
    assert_eq!(tagged.0.lock().len(), 1);

    registry.set_listener_enabled(id, false);
    usb.detach("1-1");
    registry.trigger_device_scan(BusType::Usb);
    assert!(removals.0.lock().is_empty());

    registry.set_listener_enabled(id, true);
    usb.detach("1-2");
    registry.trigger_device_scan(BusType::Usb);
    assert_eq!(removals.0.lock().len(), 1);
    assert_eq!(tagged.0.lock().len(), 2);

    assert!(registry.remove_listener(id));
    assert!(!registry.remove_listener(id));
}

#[test]
fn concurrent_queries_during_scans() {
    let f = fixture(true);
    let usb = Arc::new(VirtualBus::new(BusType::Usb));
    for i in 0..16 {
        usb.attach(remote(&format!("1-{i}")));
    }
    let registry = Arc::new(registry(&f).with_bus_instance(usb.clone()));
    registry.initialise().unwrap();

    let workers: Vec<_> = (0..4)
        .map(|n| {
            let registry = Arc::clone(&registry);
            let usb = Arc::clone(&usb);
            std::thread::spawn(move || {
                for round in 0..20 {
                    if n == 0 {
                        let location = format!("1-{}", round % 16);
                        usb.detach(&location);
                        registry.trigger_device_scan(BusType::Usb);
                        usb.attach(remote(&location));
                        registry.trigger_device_scan(BusType::Usb);
                    } else {
                        let _ = registry.number_of_peripherals();
                        let _ = registry.snapshot();
                        let _ = registry.toggle_mute();
                    }
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }
    assert_eq!(registry.number_of_peripherals(), 16);
}

#[test]
fn a_location_lives_on_one_bus_only() {
    let f = fixture_with(
        true,
        r#"<peripherals><peripheral name="Drive" mapTo="disk"/></peripherals>"#,
    );
    let usb = Arc::new(VirtualBus::new(BusType::Usb));
    let pci = Arc::new(VirtualBus::new(BusType::Pci));
    usb.attach(ScanResult::new("dev0"));
    pci.attach(ScanResult::new("dev0"));
    pci.attach(ScanResult::new("dev1"));
    let registry = registry(&f)
        .with_bus_instance(usb.clone())
        .with_bus_instance(pci.clone());
    registry.initialise().unwrap();

    assert_eq!(registry.number_of_peripherals(), 2);
    assert!(usb.has_peripheral("dev0"));
    assert!(!pci.has_peripheral("dev0"));
    assert!(pci.has_peripheral("dev1"));
    assert_eq!(f.host.titles(), vec!["#35005", "#35005"]);

    // Once the first bus lets go, the other one may claim it.
    usb.detach("dev0");
    registry.trigger_device_scan(BusType::Usb);
    registry.trigger_device_scan(BusType::Pci);
    assert!(pci.has_peripheral("dev0"));
    assert_eq!(registry.number_of_peripherals(), 2);
}

/// Bus whose registration waits (bounded) for a `clear` to finish.
struct GateBus {
    core: BusCore,
    devices: Mutex<Vec<ScanResult>>,
    armed: AtomicBool,
    entered: Mutex<mpsc::Sender<()>>,
    cleared: Mutex<mpsc::Receiver<()>>,
}

impl PeripheralBus for GateBus {
    fn bus_type(&self) -> BusType {
        BusType::Usb
    }

    fn trigger_device_scan(&self, registry: &PeripheralManager) {
        let found = self.devices.lock().clone();
        sync_devices(self, registry, &found);
    }

    fn core(&self) -> &BusCore {
        &self.core
    }

    fn register(&self, peripheral: Peripheral) -> Option<PeripheralHandle> {
        if self.armed.swap(false, Ordering::SeqCst) {
            let _ = self.entered.lock().send(());
            let _ = self
                .cleared
                .lock()
                .recv_timeout(Duration::from_millis(200));
        }
        self.core.register(peripheral)
    }
}

#[test]
fn clear_during_a_scan_leaves_no_peripherals() {
    let f = fixture(true);
    let (entered_tx, entered_rx) = mpsc::channel();
    let (cleared_tx, cleared_rx) = mpsc::channel();
    let bus = Arc::new(GateBus {
        core: BusCore::new(BusType::Usb),
        devices: Mutex::new(Vec::new()),
        armed: AtomicBool::new(false),
        entered: Mutex::new(entered_tx),
        cleared: Mutex::new(cleared_rx),
    });
    let registry = Arc::new(registry(&f).with_bus_instance(bus.clone()));
    registry.initialise().unwrap();

    bus.devices.lock().push(remote("1-1"));
    bus.armed.store(true, Ordering::SeqCst);
    let scanner = {
        let registry = Arc::clone(&registry);
        std::thread::spawn(move || registry.trigger_device_scan(BusType::Usb))
    };

    entered_rx.recv().unwrap();
    let clearer = {
        let registry = Arc::clone(&registry);
        std::thread::spawn(move || {
            registry.clear();
            let _ = cleared_tx.send(());
        })
    };
    scanner.join().unwrap();
    clearer.join().unwrap();

    assert_eq!(registry.phase(), peripherals::Phase::Uninitialised);
    assert_eq!(bus.number_of_peripherals(), 0);

    // A restart rebuilds the device from scratch and announces it.
    registry.initialise().unwrap();
    assert_eq!(bus.number_of_peripherals(), 1);
    assert_eq!(f.host.titles(), vec!["#35005", "#35005"]);
}

/// Locks the removed peripheral from inside the removal callback.
struct InspectRemoved {
    watched: Arc<Mutex<Option<PeripheralHandle>>>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl RegistryListener for InspectRemoved {
    fn on_event(&mut self, event: &RegistryEvent) {
        if !matches!(event, RegistryEvent::DeviceRemoved { .. }) {
            return;
        }
        if let Some(handle) = self.watched.lock().as_ref() {
            let name = handle.lock().device_name().to_string();
            self.seen.lock().push(name);
        }
    }
}

#[test]
fn removal_listeners_may_lock_the_removed_peripheral() {
    let f = fixture(true);
    let usb = Arc::new(VirtualBus::new(BusType::Usb));
    usb.attach(remote("1-1"));
    let registry = registry(&f).with_bus_instance(usb.clone());
    let watched = Arc::new(Mutex::new(None));
    let seen = Arc::new(Mutex::new(Vec::new()));
    registry.add_listener(
        InspectRemoved {
            watched: Arc::clone(&watched),
            seen: Arc::clone(&seen),
        },
        EventFilter::All,
        None,
    );
    registry.initialise().unwrap();

    *watched.lock() = usb.get_peripheral("1-1");
    usb.detach("1-1");
    registry.trigger_device_scan(BusType::Usb);

    assert_eq!(seen.lock().clone(), vec!["Test Remote".to_string()]);
}
