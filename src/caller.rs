/// Location of the application code that issued a log event.
///
/// All fields stay at their zero values when no qualifying frame could be
/// found; records are still shipped in that case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameInfo {
    pub file: String,
    pub func: String,
    pub line: u32,
}

impl FrameInfo {
    pub fn new(file: impl Into<String>, func: impl Into<String>, line: u32) -> Self {
        FrameInfo {
            file: file.into(),
            func: func.into(),
            line,
        }
    }
}

/// Module prefix skipped by default when attributing a log line: frames
/// originating inside this crate are never the interesting caller.
pub const DEFAULT_SKIP_PREFIX: &str = "tracing_udplog";

/// Pick the first frame that does not belong to the logging machinery.
///
/// `frames` are candidate callsites ordered innermost first; a frame is
/// skipped when its `func` starts with `skip_prefix`, compared
/// case-insensitively. Returns a zeroed [`FrameInfo`] when every candidate
/// was skipped.
pub fn resolve_caller<I>(frames: I, skip_prefix: &str) -> FrameInfo
where
    I: IntoIterator<Item = FrameInfo>,
{
    let prefix = skip_prefix.to_ascii_lowercase();
    for frame in frames {
        if !prefix.is_empty() && frame.func.to_ascii_lowercase().starts_with(&prefix) {
            continue;
        }
        return frame;
    }
    FrameInfo::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_logging_frames() {
        let frames = vec![
            FrameInfo::new("layer.rs", "tracing_udplog::layer", 10),
            FrameInfo::new("main.rs", "myapp::handlers", 42),
        ];
        let caller = resolve_caller(frames, DEFAULT_SKIP_PREFIX);
        assert_eq!(caller.func, "myapp::handlers");
        assert_eq!(caller.line, 42);
    }

    #[test]
    fn prefix_match_is_case_insensitive() {
        let frames = vec![
            FrameInfo::new("layer.rs", "Tracing_Udplog::layer", 10),
            FrameInfo::new("main.rs", "myapp", 7),
        ];
        let caller = resolve_caller(frames, DEFAULT_SKIP_PREFIX);
        assert_eq!(caller.file, "main.rs");
    }

    #[test]
    fn no_qualifying_frame_yields_zero_values() {
        let frames = vec![FrameInfo::new("layer.rs", "tracing_udplog::layer", 1)];
        let caller = resolve_caller(frames, DEFAULT_SKIP_PREFIX);
        assert_eq!(caller, FrameInfo::default());
        assert_eq!(caller.line, 0);
    }

    #[test]
    fn empty_prefix_takes_first_frame() {
        let frames = vec![FrameInfo::new("a.rs", "tracing_udplog::x", 3)];
        let caller = resolve_caller(frames, "");
        assert_eq!(caller.file, "a.rs");
    }
}
