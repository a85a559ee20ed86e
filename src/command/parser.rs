use super::Command;
use crate::error::CommandError;

/// Parses one line of player input into a typed `Command` (C2). Pure and
/// stateless — safe to call from any thread, per §4.1.
pub fn parse(text: &str) -> Result<Command, CommandError> {
    let trimmed = text.trim().to_lowercase();
    if trimmed.is_empty() {
        return Err(CommandError::Empty);
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    let (verb, rest) = tokens.split_first().expect("non-empty after trim check");

    match canonical_verb(verb) {
        Some("accelerate") => Ok(Command::Accelerate {
            intensity: parse_intensity(rest)?,
        }),
        Some("brake") => Ok(Command::Brake {
            intensity: parse_intensity(rest)?,
        }),
        Some("shift") => Ok(Command::Shift {
            gear: parse_gear(rest)?,
        }),
        Some("coast") => Ok(Command::Coast),
        Some("pit") => Ok(Command::Pit),
        _ => Err(CommandError::UnknownCommand(verb.to_string())),
    }
}

/// Renders a command back to its canonical text form, the inverse of
/// `parse`, so `parse(render(cmd)) == cmd` is a literal round trip (§8).
pub fn render(cmd: &Command) -> String {
    match cmd {
        Command::Accelerate { intensity } => format!("accelerate {:.2}", intensity),
        Command::Brake { intensity } => format!("brake {:.2}", intensity),
        Command::Shift { gear } => format!("shift {}", gear),
        Command::Coast => "coast".to_string(),
        Command::Pit => "pit".to_string(),
    }
}

fn canonical_verb(token: &str) -> Option<&'static str> {
    match token {
        "accelerate" | "acc" | "accel" | "gas" | "throttle" => Some("accelerate"),
        "brake" | "br" | "stop" | "slow" => Some("brake"),
        "shift" | "sh" | "gear" => Some("shift"),
        "pit" | "p" | "pitstop" => Some("pit"),
        "coast" | "c" | "neutral" => Some("coast"),
        _ => None,
    }
}

fn parse_intensity(rest: &[&str]) -> Result<f32, CommandError> {
    let Some(token) = rest.first() else {
        return Ok(1.0);
    };
    let value = if let Some(pct) = token.strip_suffix('%') {
        let pct: f32 = pct
            .parse()
            .map_err(|_| CommandError::BadIntensity(token.to_string()))?;
        if !(0.0..=100.0).contains(&pct) {
            return Err(CommandError::BadIntensity(token.to_string()));
        }
        pct / 100.0
    } else {
        let value: f32 = token
            .parse()
            .map_err(|_| CommandError::BadIntensity(token.to_string()))?;
        if !(0.0..=1.0).contains(&value) {
            return Err(CommandError::BadIntensity(token.to_string()));
        }
        value
    };
    Ok(value)
}

fn parse_gear(rest: &[&str]) -> Result<u8, CommandError> {
    let token = rest
        .first()
        .ok_or_else(|| CommandError::BadGear(String::new()))?;
    if rest.len() != 1 {
        return Err(CommandError::BadGear(rest.join(" ")));
    }
    let gear: u8 = token
        .parse()
        .map_err(|_| CommandError::BadGear(token.to_string()))?;
    if !(1..=8).contains(&gear) {
        return Err(CommandError::BadGear(token.to_string()));
    }
    Ok(gear)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_aliases() {
        assert_eq!(parse("acc 50%").unwrap(), Command::Accelerate { intensity: 0.5 });
        assert_eq!(parse("gas").unwrap(), Command::Accelerate { intensity: 1.0 });
        assert_eq!(parse("br 0.25").unwrap(), Command::Brake { intensity: 0.25 });
        assert_eq!(parse("sh 3").unwrap(), Command::Shift { gear: 3 });
        assert_eq!(parse("p").unwrap(), Command::Pit);
        assert_eq!(parse("c").unwrap(), Command::Coast);
    }

    #[test]
    fn is_case_and_whitespace_insensitive() {
        assert_eq!(
            parse("  ACCELERATE   75%  ").unwrap(),
            Command::Accelerate { intensity: 0.75 }
        );
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(parse("").unwrap_err(), CommandError::Empty);
        assert_eq!(parse("   ").unwrap_err(), CommandError::Empty);
    }

    #[test]
    fn rejects_unknown_command() {
        assert!(matches!(
            parse("teleport").unwrap_err(),
            CommandError::UnknownCommand(_)
        ));
    }

    #[test]
    fn rejects_bad_intensity() {
        assert!(matches!(
            parse("accelerate 150%").unwrap_err(),
            CommandError::BadIntensity(_)
        ));
        assert!(matches!(
            parse("brake 1.5").unwrap_err(),
            CommandError::BadIntensity(_)
        ));
        assert!(matches!(
            parse("accelerate fast").unwrap_err(),
            CommandError::BadIntensity(_)
        ));
    }

    #[test]
    fn rejects_bad_gear() {
        assert!(matches!(parse("shift 9").unwrap_err(), CommandError::BadGear(_)));
        assert!(matches!(parse("shift").unwrap_err(), CommandError::BadGear(_)));
        assert!(matches!(parse("shift 3.5").unwrap_err(), CommandError::BadGear(_)));
        assert!(matches!(parse("shift 1 2").unwrap_err(), CommandError::BadGear(_)));
    }

    #[test]
    fn round_trips_through_render() {
        for cmd in [
            Command::Accelerate { intensity: 1.0 },
            Command::Accelerate { intensity: 0.5 },
            Command::Brake { intensity: 0.0 },
            Command::Shift { gear: 7 },
            Command::Coast,
            Command::Pit,
        ] {
            assert_eq!(parse(&render(&cmd)).unwrap(), cmd);
        }
    }

    proptest::proptest! {
        #[test]
        fn accelerate_round_trips_for_any_valid_intensity(intensity in 0.0f32..=1.0f32) {
            let rounded = (intensity * 100.0).round() / 100.0;
            let cmd = Command::Accelerate { intensity: rounded };
            prop_assert_eq!(parse(&render(&cmd)).unwrap(), cmd);
        }

        #[test]
        fn brake_round_trips_for_any_valid_intensity(intensity in 0.0f32..=1.0f32) {
            let rounded = (intensity * 100.0).round() / 100.0;
            let cmd = Command::Brake { intensity: rounded };
            prop_assert_eq!(parse(&render(&cmd)).unwrap(), cmd);
        }

        #[test]
        fn shift_round_trips_for_any_valid_gear(gear in 1u8..=8u8) {
            let cmd = Command::Shift { gear };
            prop_assert_eq!(parse(&render(&cmd)).unwrap(), cmd);
        }

        #[test]
        fn parse_never_panics_on_arbitrary_input(text in ".*") {
            let _ = parse(&text);
        }
    }
}
