//! Line-oriented operator console over a `Station`.
//!
//! One command per line; replies are written back as plain text. Rejected
//! commands and unknown names are reported and the session carries on.

use eyre::bail;
use std::io::{BufRead, Write};

use crate::station::Station;

pub const HELP: &str = "\
commands:
  sensor <name> start|stop|measure|idle|verbose|disable|status|logs|alert
  sensor <name> limits <ucl> <lcl>
  sim <name|kind|number> start|stop|bias|failure|status
  sims
  help
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum SensorAction {
    Start,
    Stop,
    Measure,
    Idle,
    Verbose,
    Disable,
    Status,
    Logs,
    Alert,
    Limits { ucl: f64, lcl: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimAction {
    Start,
    Stop,
    Bias,
    Failure,
    Status,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Sensor { name: String, action: SensorAction },
    Sim { key: String, action: SimAction },
    Sims,
    Help,
    Quit,
}

/// Parse one console line. Blank lines and `#` comments yield `None`.
pub fn parse(line: &str) -> eyre::Result<Option<Command>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let cmd = match words.as_slice() {
        [] => return Ok(None),
        [first, ..] if first.starts_with('#') => return Ok(None),
        ["help"] => Command::Help,
        ["quit" | "exit"] => Command::Quit,
        ["sims"] => Command::Sims,
        ["sensor", name, "limits", ucl, lcl] => Command::Sensor {
            name: (*name).to_owned(),
            action: SensorAction::Limits {
                ucl: parse_limit(ucl)?,
                lcl: parse_limit(lcl)?,
            },
        },
        ["sensor", name, action] => Command::Sensor {
            name: (*name).to_owned(),
            action: match *action {
                "start" => SensorAction::Start,
                "stop" => SensorAction::Stop,
                "measure" => SensorAction::Measure,
                "idle" => SensorAction::Idle,
                "verbose" => SensorAction::Verbose,
                "disable" => SensorAction::Disable,
                "status" => SensorAction::Status,
                "logs" => SensorAction::Logs,
                "alert" => SensorAction::Alert,
                other => bail!("unknown sensor action '{other}'"),
            },
        },
        ["sim", key, action] => Command::Sim {
            key: (*key).to_owned(),
            action: match *action {
                "start" => SimAction::Start,
                "stop" => SimAction::Stop,
                "bias" => SimAction::Bias,
                "failure" => SimAction::Failure,
                "status" => SimAction::Status,
                other => bail!("unknown sim action '{other}'"),
            },
        },
        _ => bail!("unrecognized command '{}' (try 'help')", line.trim()),
    };
    Ok(Some(cmd))
}

fn parse_limit(s: &str) -> eyre::Result<f64> {
    match s.parse::<f64>() {
        Ok(v) => Ok(v),
        Err(_) => bail!("'{s}' is not a number"),
    }
}

fn on_off(b: bool) -> &'static str {
    if b { "on" } else { "off" }
}

fn last_log(station: &Station, name: &str) -> eyre::Result<Vec<String>> {
    Ok(station.sensor(name)?.get_logs().pop().into_iter().collect())
}

/// Execute a parsed command; returns the reply lines.
pub fn execute(station: &Station, cmd: &Command) -> eyre::Result<Vec<String>> {
    match cmd {
        Command::Help => Ok(HELP.lines().map(str::to_owned).collect()),
        Command::Quit => Ok(Vec::new()),
        Command::Sims => Ok(station
            .devices()
            .iter()
            .map(|d| format!("{} [{}]", d.sim.describe(), d.sim.status().indicator().color()))
            .collect()),
        Command::Sim { key, action } => {
            let sim = station.sim(key)?;
            let line = match action {
                SimAction::Start => sim.start(),
                SimAction::Stop => sim.stop(),
                SimAction::Bias => sim.toggle_bias(),
                SimAction::Failure => sim.toggle_device_failure(),
                SimAction::Status => {
                    let st = sim.status();
                    format!(
                        "{} running={} bias={} failure={} [{}]",
                        sim.describe(),
                        on_off(st.running),
                        on_off(st.bias_injected),
                        on_off(st.device_failure),
                        st.indicator().color()
                    )
                }
            };
            Ok(vec![line])
        }
        Command::Sensor { name, action } => {
            let sensor = station.sensor(name)?;
            match action {
                SensorAction::Start => sensor.start(),
                SensorAction::Stop => sensor.stop(),
                SensorAction::Measure => sensor.start_measuring()?,
                SensorAction::Idle => {
                    if !sensor.stop_measuring() {
                        return Ok(vec![format!("{name} is not measuring")]);
                    }
                }
                SensorAction::Verbose => {
                    sensor.toggle_verbose_logging();
                }
                SensorAction::Disable => sensor.disable(),
                SensorAction::Limits { ucl, lcl } => {
                    sensor.set_limits(*ucl, *lcl)?;
                    return Ok(vec![format!("{name} limits set: UCL {ucl}, LCL {lcl}")]);
                }
                SensorAction::Status => {
                    let st = sensor.status();
                    let last = st
                        .last_value
                        .map_or_else(|| "-".to_owned(), |v| v.to_string());
                    return Ok(vec![format!(
                        "{}: {} [{}] last={} ucl={} lcl={} verbose={}",
                        st.name,
                        st.state,
                        st.state.color(),
                        last,
                        st.ucl,
                        st.lcl,
                        on_off(st.verbose)
                    )]);
                }
                SensorAction::Logs => return Ok(sensor.get_logs()),
                SensorAction::Alert => {
                    return Ok(vec![
                        sensor
                            .latest_alert(station.alert_lookback())
                            .unwrap_or_else(|| format!("{name}: no alerts")),
                    ]);
                }
            }
            last_log(station, name)
        }
    }
}

/// Read commands until `quit` or end of input.
pub fn run_console(
    station: &Station,
    input: impl BufRead,
    mut out: impl Write,
) -> eyre::Result<()> {
    writeln!(out, "type 'help' for commands")?;
    for line in input.lines() {
        let line = line?;
        let cmd = match parse(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(e) => {
                writeln!(out, "error: {e}")?;
                continue;
            }
        };
        if cmd == Command::Quit {
            break;
        }
        match execute(station, &cmd) {
            Ok(lines) => {
                for l in lines {
                    writeln!(out, "{l}")?;
                }
            }
            Err(e) => writeln!(out, "error: {e}")?,
        }
        out.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use crate::station::in_memory_config;

    #[rstest]
    #[case("sensor temperature_sensor start", Command::Sensor { name: "temperature_sensor".into(), action: SensorAction::Start })]
    #[case("  sensor p limits 6.5 3.5 ", Command::Sensor { name: "p".into(), action: SensorAction::Limits { ucl: 6.5, lcl: 3.5 } })]
    #[case("sim 2 bias", Command::Sim { key: "2".into(), action: SimAction::Bias })]
    #[case("sims", Command::Sims)]
    #[case("exit", Command::Quit)]
    fn parses_commands(#[case] line: &str, #[case] expected: Command) {
        assert_eq!(parse(line).unwrap(), Some(expected));
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("# comment")]
    fn skips_blank_and_comments(#[case] line: &str) {
        assert_eq!(parse(line).unwrap(), None);
    }

    #[rstest]
    #[case("sensor x explode", "unknown sensor action")]
    #[case("sim x warp", "unknown sim action")]
    #[case("sensor x limits high low", "not a number")]
    #[case("dance", "unrecognized command")]
    fn rejects_bad_lines(#[case] line: &str, #[case] needle: &str) {
        let err = parse(line).unwrap_err().to_string();
        assert!(err.contains(needle), "{err}");
    }

    #[test]
    fn session_drives_a_sensor() {
        let station = Station::build(&in_memory_config()).unwrap();
        let script = "\
sensor radiation_sensor measure
sensor radiation_sensor start
sensor radiation_sensor limits 0.1 0.3
sensor radiation_sensor limits 0.4 0.05
sensor radiation_sensor status
sensor ghost start
quit
sensor radiation_sensor stop
";
        let mut out = Vec::new();
        run_console(&station, script.as_bytes(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("radiation_sensor must be ON to start measuring"));
        assert!(text.contains("radiation_sensor is now ON"));
        assert!(text.contains("error: invalid control limits"));
        assert!(text.contains("radiation_sensor limits set: UCL 0.4, LCL 0.05"));
        assert!(text.contains("radiation_sensor: ON [green] last=- ucl=0.4 lcl=0.05 verbose=off"));
        assert!(text.contains("error: unknown sensor 'ghost'"));
        assert!(!text.contains("is now OFF"), "input after quit must be ignored");
    }

    #[test]
    fn sim_commands_return_operator_messages() {
        let station = Station::build(&in_memory_config()).unwrap();
        let run = |line: &str| execute(&station, &parse(line).unwrap().unwrap()).unwrap();

        assert_eq!(run("sim temperature bias"), ["Bias 1 injection enabled."]);
        assert_eq!(run("sim 3 failure"), ["Device 3 failure simulation active."]);
        assert_eq!(run("sim pressure_sensor stop"), ["Experiment 2 stopped."]);
        let sims = run("sims");
        assert_eq!(sims.len(), 3);
        assert!(sims[0].ends_with("[red]"));
        assert!(run("sim 1 status")[0].contains("bias=on"));
    }
}
