use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{error::Error, transport::codecs::lines::LinesCodec};

/// Flow control on the serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FlowControl {
    /// No flow control.
    #[default]
    None,

    /// XON/XOFF.
    Software,

    /// RTS/CTS.
    Hardware,
}

impl From<FlowControl> for tokio_serial::FlowControl {
    fn from(flow_control: FlowControl) -> Self {
        match flow_control {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Software => tokio_serial::FlowControl::Software,
            FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
        }
    }
}

/// The configuration used for running the shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Baud rate transports are constructed with.
    pub baud_rate: u32,

    /// See [`FlowControl`].
    pub flow_control: FlowControl,

    /// Inbound data is split into lines on this character.
    pub read_delimiter: char,

    /// If set, appended to every written message.
    pub write_delimiter: Option<char>,

    /// Printed before reading each line. May be empty.
    pub prompt: String,

    /// How long the shell waits for a response before reading the next line,
    /// and at the end of input for responses still outstanding.
    pub response_timeout_ms: u64,

    /// Lines to run before reading any input.
    /// For example `set /dev/ttyACM0`.
    pub startup: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            flow_control: FlowControl::None,
            read_delimiter: '\n',
            write_delimiter: Some('\n'),
            prompt: "> ".into(),
            response_timeout_ms: 2000,
            startup: vec![],
        }
    }
}

impl Config {
    fn ron() -> ron::Options {
        ron::Options::default()
            .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
            .with_default_extension(ron::extensions::Extensions::UNWRAP_NEWTYPES)
    }

    /// Deserialize a .ron file's contents.
    /// Fields left out get their default value.
    pub fn deserialize(input: &str) -> Result<Self, Error> {
        let config = Self::ron()
            .from_str::<Config>(input)
            .map_err(|e| Error::BadConfig(format!("Not valid RON: {e}")))?;

        config.validate()?;

        Ok(config)
    }

    /// An example configuration with some fields filled in.
    pub fn example() -> Self {
        Self {
            baud_rate: 9600,
            flow_control: FlowControl::Hardware,
            read_delimiter: '\r',
            startup: vec!["set /dev/ttyACM0".into(), "open".into()],
            ..Default::default()
        }
    }

    /// Serialize the configuration in a "pretty" (i.e. non-compact) fashion.
    pub fn serialize_pretty(&self) -> Result<String, Error> {
        Self::ron()
            .to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::BadConfig(format!("Could not serialize: {e}")))
    }

    /// Setup a new configuration from a RON file.
    pub fn new_from_path<P: AsRef<Path>>(p: P) -> Result<Self, Error> {
        let s = std::fs::read_to_string(p)?;

        Self::deserialize(&s)
    }

    /// The line codec transports should use.
    pub fn line_codec(&self) -> LinesCodec {
        // Delimiters are validated to be ASCII.
        LinesCodec::new(
            self.read_delimiter as u8,
            self.write_delimiter.map(|c| c as u8),
        )
    }

    fn check_delimiter(name: &str, c: char) -> Result<(), Error> {
        if c.is_ascii() {
            Ok(())
        } else {
            Err(Error::BadConfig(format!(
                "The {name} must be a single ASCII character, got `{c}`."
            )))
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.baud_rate == 0 {
            return Err(Error::BadConfig("The baud rate must be above zero.".into()));
        }

        Self::check_delimiter("read delimiter", self.read_delimiter)?;

        if let Some(c) = self.write_delimiter {
            Self::check_delimiter("write delimiter", c)?;
        }

        Ok(())
    }
}
