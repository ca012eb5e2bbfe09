//! S4 command encoding.
//!
//! [`Command::encode`] renders a typed command into its wire payload. It is
//! pure: it performs no I/O and never appends the line terminator (that is
//! [`protocol::encode_line`](crate::protocol::encode_line)'s job). Invalid
//! arguments are rejected here, before anything can reach the transport.
//!
//! # S4 command reference
//!
//! ```text
//! USB                  start a session (monitor answers _WR_)
//! RESET                reset the monitor
//! IR<w><aaa>           read memory: width S|D|T, 3-hex address
//! DD<code>             display mode (units, intensity, average intensity)
//! WSI<u><hhhh>         distance workout: unit digit, 4 hex digits
//! WSU<hhhh>            duration workout in seconds, 4 hex digits
//! ```
//!
//! Numeric workout arguments always use the two-byte (`D`) width: exactly
//! four zero-padded uppercase hex digits, range `1..=0xFFFF`.

use std::fmt;
use std::str::FromStr;

use rowlib_core::{Error, Result, Width};
use serde::Deserialize;

use crate::registry::Registry;

/// Width used for every numeric workout argument.
pub const WORKOUT_ARG_WIDTH: Width = Width::Double;

// ---------------------------------------------------------------
// Units
// ---------------------------------------------------------------

/// Distance units understood by the display and workout commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Units {
    /// Metres.
    Meters,
    /// Statute miles.
    Miles,
    /// Kilometres.
    Kilometers,
    /// Stroke count.
    Strokes,
}

impl Units {
    /// Two-letter code used by `DD`.
    pub fn display_code(&self) -> &'static str {
        match self {
            Units::Meters => "ME",
            Units::Miles => "MI",
            Units::Kilometers => "KM",
            Units::Strokes => "ST",
        }
    }

    /// Single-digit code used by `WSI`.
    pub fn workout_code(&self) -> char {
        match self {
            Units::Meters => '1',
            Units::Miles => '2',
            Units::Kilometers => '3',
            Units::Strokes => '4',
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Units::Meters => "meters",
            Units::Miles => "miles",
            Units::Kilometers => "kilometers",
            Units::Strokes => "strokes",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Units {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "meters" | "metres" | "m" | "me" => Ok(Units::Meters),
            "miles" | "mi" => Ok(Units::Miles),
            "kilometers" | "kilometres" | "km" => Ok(Units::Kilometers),
            "strokes" | "st" => Ok(Units::Strokes),
            _ => Err(Error::InvalidUnits(s.to_string())),
        }
    }
}

impl TryFrom<String> for Units {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

// ---------------------------------------------------------------
// Intensity display options
// ---------------------------------------------------------------

/// What the intensity window of the display shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntensityOption {
    /// Speed in metres per second.
    MetersPerSecond,
    /// Speed in miles per hour.
    MilesPerHour,
    /// Time per 500 m.
    Split500m,
    /// Time per 2 km.
    Split2km,
    /// Power in watts.
    Watts,
    /// Energy rate in calories per hour.
    CaloriesPerHour,
}

impl IntensityOption {
    /// `DD` code for the live intensity window.
    pub fn intensity_code(&self) -> &'static str {
        match self {
            IntensityOption::MetersPerSecond => "MS",
            IntensityOption::MilesPerHour => "MP",
            IntensityOption::Split500m => "50",
            IntensityOption::Split2km => "2K",
            IntensityOption::Watts => "WA",
            IntensityOption::CaloriesPerHour => "CH",
        }
    }

    /// `DD` code for the average intensity window. The monitor only averages
    /// speed and split readouts.
    pub fn average_code(&self) -> Result<&'static str> {
        match self {
            IntensityOption::MetersPerSecond => Ok("AS"),
            IntensityOption::MilesPerHour => Ok("AP"),
            IntensityOption::Split500m => Ok("A5"),
            IntensityOption::Split2km => Ok("A2"),
            IntensityOption::Watts | IntensityOption::CaloriesPerHour => {
                Err(Error::InvalidOption(format!("{self} has no average display")))
            }
        }
    }
}

impl fmt::Display for IntensityOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntensityOption::MetersPerSecond => "m/s",
            IntensityOption::MilesPerHour => "mph",
            IntensityOption::Split500m => "/500m",
            IntensityOption::Split2km => "/2km",
            IntensityOption::Watts => "watts",
            IntensityOption::CaloriesPerHour => "cal/hr",
        };
        write!(f, "{s}")
    }
}

impl FromStr for IntensityOption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "m/s" | "mps" | "meters_per_second" => Ok(IntensityOption::MetersPerSecond),
            "mph" | "miles_per_hour" => Ok(IntensityOption::MilesPerHour),
            "/500m" | "500m" | "split_500m" => Ok(IntensityOption::Split500m),
            "/2km" | "2km" | "split_2km" => Ok(IntensityOption::Split2km),
            "watts" | "w" => Ok(IntensityOption::Watts),
            "cal/hr" | "calories_per_hour" => Ok(IntensityOption::CaloriesPerHour),
            _ => Err(Error::InvalidOption(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------
// Commands
// ---------------------------------------------------------------

/// A command to the monitor. Each variant renders to exactly one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start a session (`USB`).
    Initialize,
    /// Reset the monitor (`RESET`).
    Reset,
    /// Select distance units on the display.
    SetDisplayUnits(Units),
    /// Select the intensity readout.
    SetIntensityDisplay(IntensityOption),
    /// Select the average intensity readout.
    SetAverageIntensityDisplay(IntensityOption),
    /// Program a distance workout.
    DefineDistanceWorkout {
        /// Target distance in `units`.
        distance: u32,
        /// Units of `distance`.
        units: Units,
    },
    /// Program a duration workout.
    DefineDurationWorkout {
        /// Target duration in seconds.
        seconds: u32,
    },
    /// Read one named memory location.
    RequestDataPoint(String),
}

impl Command {
    /// Render the wire payload, without line terminator.
    pub fn encode(&self, registry: &Registry) -> Result<String> {
        match self {
            Command::Initialize => Ok("USB".to_string()),
            Command::Reset => Ok("RESET".to_string()),
            Command::SetDisplayUnits(units) => Ok(format!("DD{}", units.display_code())),
            Command::SetIntensityDisplay(option) => Ok(format!("DD{}", option.intensity_code())),
            Command::SetAverageIntensityDisplay(option) => {
                Ok(format!("DD{}", option.average_code()?))
            }
            Command::DefineDistanceWorkout { distance, units } => Ok(format!(
                "WSI{}{}",
                units.workout_code(),
                encode_workout_arg("distance", *distance)?
            )),
            Command::DefineDurationWorkout { seconds } => {
                Ok(format!("WSU{}", encode_workout_arg("seconds", *seconds)?))
            }
            Command::RequestDataPoint(name) => {
                let entry = registry.require(name)?;
                Ok(format!("IR{}{}", entry.width.letter(), entry.address))
            }
        }
    }
}

/// Encode a workout argument in the fixed four-digit field.
fn encode_workout_arg(field: &'static str, value: u32) -> Result<String> {
    let max = WORKOUT_ARG_WIDTH.max_value();
    if value == 0 {
        return Err(Error::ValueOutOfRange { field, value, max });
    }
    WORKOUT_ARG_WIDTH
        .encode_hex(value)
        .ok_or(Error::ValueOutOfRange { field, value, max })
}
