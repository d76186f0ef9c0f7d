use clap::ValueEnum;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> tracing::level_filters::LevelFilter {
        match self {
            LogLevel::Error => tracing::level_filters::LevelFilter::ERROR,
            LogLevel::Warn => tracing::level_filters::LevelFilter::WARN,
            LogLevel::Info => tracing::level_filters::LevelFilter::INFO,
            LogLevel::Debug => tracing::level_filters::LevelFilter::DEBUG,
            LogLevel::Trace => tracing::level_filters::LevelFilter::TRACE,
        }
    }

    /// Apply `-D` repetitions: once for debug, twice or more for trace.
    /// Never lowers an explicitly chosen level.
    pub fn raised_by(self, debug: u8) -> Self {
        let floor = match debug {
            0 => return self,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        };
        self.max(floor)
    }
}

pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level.as_filter())
        .with_ansi(false)
        .with_target(false);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_raises_level() {
        assert_eq!(LogLevel::Info.raised_by(0), LogLevel::Info);
        assert_eq!(LogLevel::Info.raised_by(1), LogLevel::Debug);
        assert_eq!(LogLevel::Warn.raised_by(2), LogLevel::Trace);
        assert_eq!(LogLevel::Trace.raised_by(1), LogLevel::Trace);
    }
}
