use crate::error::{Error, Result};
use crate::ipmi::component::{Component, Entity};
use crate::ipmi::executor::CommandRunner;
use once_cell::sync::Lazy;
use regex::Regex;

const QUERY: &str = "sdr type Temperature";

/// Matches one sensor line of `ipmitool sdr type Temperature`:
///
/// ```text
/// Inlet Temp       | 04h | ok  |  7.1 | 21 degrees C
/// Exhaust Temp     | 01h | ok  |  7.1 | 38 degrees C
/// Temp             | 0Eh | ok  |  3.1 | 45 degrees C
/// ```
///
/// Group 1 is the name, group 2 the hexadecimal sensor address, group 3 the
/// reading in Celsius. Headers, blanks and non-ok sensors don't match.
static TEMPERATURE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*)\s*\|\s([0-9A-Fa-f]+)h\s.*\|\s(\d+)\sdegrees C$")
        .expect("Invalid regex pattern")
});

/// Parses the output of `ipmitool sdr type Temperature`.
///
/// Non-matching lines are silently discarded; the only parse failure is when
/// no line matches at all.
pub fn parse_temperatures(output: &str) -> Result<Vec<Component>> {
    let temperatures: Vec<Component> = output
        .lines()
        .filter_map(|line| {
            let captures = TEMPERATURE_LINE.captures(line)?;
            let name = captures[1].trim().to_string();
            let id = u32::from_str_radix(&captures[2], 16).ok()?;
            let celsius = captures[3].parse().ok()?;
            Some(Component::Temperature {
                entity: Entity { id, name },
                celsius,
            })
        })
        .collect();

    if temperatures.is_empty() {
        return Err(Error::Parse {
            query: QUERY,
            output: output.to_string(),
        });
    }

    Ok(temperatures)
}

/// Reads all temperature sensors from the BMC
pub async fn get_temperatures(runner: &dyn CommandRunner) -> Result<Vec<Component>> {
    parse_temperatures(&runner.run(QUERY).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeRunner;

    const SDR_OUTPUT: &str = "\
Inlet Temp       | 04h | ok  |  7.1 | 21 degrees C
Exhaust Temp     | 01h | ok  |  7.1 | 38 degrees C
Temp             | 0Eh | ok  |  3.1 | 45 degrees C
Temp             | 0Fh | ok  |  3.2 | 50 degrees C
";

    #[test]
    fn test_parse() {
        let sensors = parse_temperatures(SDR_OUTPUT).expect("output should parse");

        assert_eq!(sensors.len(), 4);
        assert_eq!(
            sensors[0],
            Component::Temperature {
                entity: Entity::new(4, "Inlet Temp"),
                celsius: 21,
            }
        );
        // The sensor address is hexadecimal: 0E -> 14
        assert_eq!(
            sensors[2],
            Component::Temperature {
                entity: Entity::new(14, "Temp"),
                celsius: 45,
            }
        );
    }

    /// Names may repeat across sensors, only the id tells them apart
    #[test]
    fn test_duplicate_names() {
        let sensors = parse_temperatures(SDR_OUTPUT).expect("output should parse");

        assert_eq!(sensors[2].entity().name, "Temp");
        assert_eq!(sensors[3].entity().name, "Temp");
        assert_ne!(sensors[2].entity().id, sensors[3].entity().id);
    }

    #[test]
    fn test_unrelated_lines_are_dropped() {
        let output = format!("Some header\n\n{SDR_OUTPUT}\nFan1 RPM | 30h | ok | 7.1 | 4200 RPM\n");
        let sensors = parse_temperatures(&output).expect("output should parse");

        assert_eq!(sensors.len(), 4);
    }

    /// A parse failure is never an empty success list
    #[test]
    fn test_no_matching_line_fails() {
        let err = parse_temperatures("garbage\n").expect_err("garbage should not parse");

        match err {
            Error::Parse { query, output } => {
                assert_eq!(query, "sdr type Temperature");
                assert!(output.contains("garbage"));
            }
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_temperatures() {
        let runner = FakeRunner::new();
        runner.respond("sdr type Temperature", SDR_OUTPUT);

        let sensors = get_temperatures(&runner)
            .await
            .expect("scripted output should parse");

        assert_eq!(sensors.len(), 4);
        assert_eq!(runner.calls(), vec!["sdr type Temperature"]);
    }
}
