//! Terminal output, with colors!

use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Print a status line with a colored tag.
fn print_tagged(color: Color, tag: &str, msg: &str) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    stdout
        .set_color(ColorSpec::new().set_fg(Some(color)))
        .expect("set color");
    writeln!(&mut stdout, "{tag:<5} {msg}").expect("write message");

    stdout.reset().expect("reset color");
}

/// Print an OK message, in green.
pub fn print_ok(msg: &str) {
    print_tagged(Color::Green, "OK", msg);
}

/// Print a warning message, in yellow.
pub fn print_warn(msg: &str) {
    print_tagged(Color::Yellow, "WARN", msg);
}
