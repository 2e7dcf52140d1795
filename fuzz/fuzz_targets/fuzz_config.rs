#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = toml::from_str::<spc_config::Config>(data) {
        if cfg.validate().is_ok() {
            // Everything validate() accepts must convert cleanly.
            for d in &cfg.devices {
                let s = spc_core::conversions::sensor_settings(&cfg, d);
                assert!(s.limits.ucl() >= s.limits.lcl());
                assert!(spc_config::is_valid_sensor_name(d.name()));
            }
        }
    }
    let _ = data.parse::<spc_config::TimeWindow>();
});
