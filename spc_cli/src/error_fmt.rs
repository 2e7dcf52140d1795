//! Human-readable error descriptions and structured JSON error formatting.

use spc_core::error::{BuildError, CommandError, SpcError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingProbe => {
                "What happened: A sensor was built without a data source.\nLikely causes: The simulator channel was not wired into the builder.\nHow to fix: Pass the device channel via with_probe(...).".to_string()
            }
            BuildError::MissingStore => {
                "What happened: A sensor was built without a measurement store.\nLikely causes: The store was not wired into the builder.\nHow to fix: Pass a store via with_store(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun `spc self-check`."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CommandError>() {
        return match ce {
            CommandError::NotReady { sensor, state } => format!(
                "What happened: {sensor} cannot start measuring while {state}.\nHow to fix: Power it on first (`sensor {sensor} start`)."
            ),
            CommandError::InvalidLimits { ucl, lcl } => format!(
                "What happened: Control limits UCL {ucl} / LCL {lcl} were rejected.\nHow to fix: Use finite values with UCL >= LCL."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<SpcError>() {
        return match se {
            SpcError::UnknownSensor(name) | SpcError::UnknownSimulator(name) => format!(
                "What happened: No device named '{name}'.\nHow to fix: Check the [[device]] names in the config."
            ),
            SpcError::InvalidName(name) => format!(
                "What happened: '{name}' cannot be used as a sensor name.\nHow to fix: Use only letters, digits, '_' and '-'."
            ),
            SpcError::Storage(msg) => format!(
                "What happened: Storage failed ({msg}).\nLikely causes: Missing directory or insufficient permissions.\nHow to fix: Check [storage] dir in the config."
            ),
        };
    }

    // Config loading errors arrive wrapped as "invalid configuration"
    let msg = err.to_string();
    let root = err.root_cause().to_string();

    if root.starts_with("read config") {
        return format!(
            "What happened: {root}.\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Point --config at a readable TOML file."
        );
    }

    if msg.starts_with("invalid configuration") {
        let detail = root.strip_prefix("invalid configuration: ").unwrap_or(&root);
        return format!(
            "What happened: Configuration is invalid ({detail}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun `spc self-check`."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Short stable name of the error class, used in JSON output.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<CommandError>().is_some() {
        return "Rejected";
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    match err.downcast_ref::<SpcError>() {
        Some(SpcError::UnknownSensor(_) | SpcError::UnknownSimulator(_)) => "UnknownDevice",
        Some(SpcError::InvalidName(_)) => "InvalidName",
        Some(SpcError::Storage(_)) => "Storage",
        None => "Error",
    }
}

/// Stable exit codes per error class; anything unclassified returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match reason_name(err) {
        "Build" => 2,
        "Rejected" => 3,
        "UnknownDevice" | "InvalidName" => 4,
        "Storage" => 5,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use spc_core::SensorState;

    #[test]
    fn rejected_command_maps_to_exit_3() {
        let err = eyre::Report::new(CommandError::NotReady {
            sensor: "pressure_sensor".into(),
            state: SensorState::Off,
        });
        assert_eq!(exit_code_for_error(&err), 3);
        assert!(humanize(&err).contains("pressure_sensor cannot start measuring while OFF"));
    }

    #[test]
    fn unknown_sensor_json_names_reason() {
        let err = eyre::Report::new(SpcError::UnknownSensor("ghost".into()));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "UnknownDevice");
        assert!(v["message"].as_str().unwrap().contains("'ghost'"));
        assert_eq!(exit_code_for_error(&err), 4);
    }

    #[test]
    fn config_errors_get_a_hint() {
        let err = eyre::eyre!("sampling.period_ms must be >= 1")
            .wrap_err("invalid configuration");
        let text = humanize(&err);
        assert!(text.starts_with(
            "What happened: Configuration is invalid (sampling.period_ms must be >= 1)"
        ));
        assert_eq!(exit_code_for_error(&err), 1);
    }
}
