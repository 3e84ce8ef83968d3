use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};

/// Checking progress bar
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub(crate) enum Bar {
    /// Fancy Unicode progress bars
    #[default]
    Unicode,
    /// Basic ASCII progress bars
    Ascii,
}

impl Bar {
    /// A bar over the given number of properties,
    /// with the property being checked as message.
    pub(crate) fn property_bar(&self, model_name: &str, properties: usize) -> ProgressBar {
        const FINE_BAR: &str = "█▉▊▋▌▍▎▏  ";
        const ASCII_BAR: &str = "#--";

        let style = if let Bar::Ascii = self {
            ProgressStyle::with_template(
                "{elapsed_precise} {prefix} {bar:50} {pos}/{len} properties: {wide_msg}",
            )
            .unwrap()
            .progress_chars(ASCII_BAR)
        } else {
            ProgressStyle::with_template(
                "{elapsed_precise} {prefix} {bar:50.white.on_black} {pos}/{len} properties: {wide_msg}",
            )
            .unwrap()
            .progress_chars(FINE_BAR)
        };
        let bar = ProgressBar::new(properties as u64)
            .with_style(style)
            .with_prefix(format!("checking {model_name}"));
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        bar
    }
}
