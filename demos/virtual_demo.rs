use peripherals::{
    Action, ActionId, BusType, CecStateChange, MappingTable, NullHost, PeripheralManager,
    RegistryConfig, ScanResult, VirtualBus,
};
use std::sync::Arc;

const MAPPINGS: &str = r#"
<peripherals>
  <peripheral bus="cec" name="CEC Adapter" mapTo="cec">
    <setting key="enabled" type="bool" value="yes" label="305" />
  </peripheral>
</peripherals>"#;

fn main() {
    // Write the mapping next to the binary's temp dir so the registry can load it.
    let dir = std::env::temp_dir().join("peripherals-virtual-demo");
    std::fs::create_dir_all(&dir).expect("create demo dir");
    let mapping_file = dir.join("peripherals.xml");
    std::fs::write(&mapping_file, MAPPINGS).expect("write mappings");
    println!("{} rule(s)", MappingTable::from_xml_str(MAPPINGS).expect("parse").len());

    let config = RegistryConfig {
        mapping_file,
        data_dir: dir.join("data"),
        ..RegistryConfig::default()
    };

    let cec = Arc::new(VirtualBus::new(BusType::Cec));
    cec.attach(ScanResult::new("/dev/cec0"));

    let registry = PeripheralManager::new(config, Arc::new(NullHost)).with_bus_instance(cec.clone());
    registry.initialise().expect("initialise registry");

    let adapter = registry
        .get_peripheral_at_location("/dev/cec0", BusType::Cec)
        .expect("adapter registered");
    if let Some(cec) = adapter.lock().as_cec_mut() {
        cec.set_audio_system_connected(true);
    }

    println!("mute handled: {}", registry.on_action(&Action::new(ActionId::Mute, 1.0)));
    println!("muted: {}", registry.is_muted());
    println!("standby: {}", registry.toggle_device_state(CecStateChange::Standby, 0));

    if let Some(cec) = adapter.lock().as_cec_mut() {
        for command in cec.take_commands() {
            println!("(Virtual) CEC command {:?}", command);
        }
    }

    // Unplug and rescan: the adapter is removed.
    cec.detach("/dev/cec0");
    registry.trigger_device_scan(BusType::Cec);
    println!("{} peripheral(s) left", registry.number_of_peripherals());
}
