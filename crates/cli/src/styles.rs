//! Help output colors.

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;

/// Yellow headers and usage, cyan literals and placeholders.
pub fn cli_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Yellow.on_default().bold())
		.usage(AnsiColor::Yellow.on_default().bold())
		.literal(AnsiColor::Cyan.on_default().bold())
		.placeholder(AnsiColor::Cyan.on_default())
		.valid(AnsiColor::Green.on_default())
		.invalid(AnsiColor::Red.on_default().bold())
		.error(AnsiColor::Red.on_default().bold())
}
