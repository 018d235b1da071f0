use std::io::Write;

use termcolor::{self, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tracing::{event, Level};

fn get_colour_choice() -> ColorChoice {
    if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

/// Relays console output bytes to the host terminal.  Machine output
/// is tinted when stdout is a tty so it stands apart from the
/// simulator's own messages.
pub struct ConsoleEcho {
    stream: StandardStream,
    tinted: bool,
}

impl ConsoleEcho {
    pub fn new() -> ConsoleEcho {
        ConsoleEcho {
            stream: StandardStream::stdout(get_colour_choice()),
            tinted: false,
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if !self.tinted {
            let mut spec = ColorSpec::new();
            spec.set_fg(Some(termcolor::Color::Cyan));
            if let Err(e) = self.stream.set_color(&spec) {
                event!(Level::ERROR, "Failed to select colour {:?}: {}", spec, e);
            }
            self.tinted = true;
        }
        if let Err(e) = self
            .stream
            .write_all(bytes)
            .and_then(|()| self.stream.flush())
        {
            event!(Level::ERROR, "Failed to relay console output: {}", e);
        }
    }

    pub fn disconnect(&mut self) {
        if let Err(e) = self.stream.reset() {
            event!(Level::ERROR, "Failed to reset terminal: {}", e);
        }
    }
}
