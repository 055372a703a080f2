//! Load a registry config, scan the built-in buses and dump what was found.
//!
//! ```text
//! RUST_LOG=peripherals=debug cargo run --example diagnose --features hid -- peripherals.toml
//! ```

use peripherals::{EventFilter, LogListener, NullHost, PeripheralManager, RegistryConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => RegistryConfig::load(&path).expect("load config"),
        None => RegistryConfig::default(),
    };

    let registry = PeripheralManager::new(config, Arc::new(NullHost)).with_default_buses();
    registry.add_listener(LogListener::new(), EventFilter::All, None);
    registry.initialise().expect("initialise registry");

    println!(
        "{} peripheral(s), cec support: {}",
        registry.number_of_peripherals(),
        registry.supports_cec()
    );
    println!("{}", registry.snapshot().to_json().expect("serialize snapshot"));
}
