//! Free-text scrubbing for error messages and stack traces.

use regex::Regex;

use crate::error::Result;

/// Compiled scrubbing patterns
#[derive(Debug, Clone)]
pub struct Scrubber {
    email: Regex,
    unix_path: Regex,
    windows_path: Regex,
    username: Regex,
    frame_with_fn: Regex,
    bare_frame: Regex,
}

impl Scrubber {
    pub fn new() -> Result<Self> {
        Ok(Self {
            email: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")?,
            unix_path: Regex::new(r"(?:~|\.{1,2})?(?:/[\w.@-]+){2,}/?")?,
            windows_path: Regex::new(r"[A-Za-z]:\\(?:[^\\\s:]+\\)*[^\\\s:]*")?,
            username: Regex::new(r"(?i)\buser[_-]?\d+\b")?,
            // "at handleUpload (/home/alice/app/upload.js:42:13)"
            frame_with_fn: Regex::new(r"(?m)^(\s*at\s+)([^\s(]+)\s+\(.*?:(\d+):(\d+)\)\s*$")?,
            // "at /home/alice/app/upload.js:42:13"
            bare_frame: Regex::new(r"(?m)^(\s*at\s+)\S+?:(\d+):(\d+)\s*$")?,
        })
    }

    /// Replace emails, file-system paths and `user_123`-style names
    pub fn scrub_error_message(&self, message: &str) -> String {
        let out = self.email.replace_all(message, "[EMAIL]");
        let out = self.windows_path.replace_all(&out, "[PATH]");
        let out = self.unix_path.replace_all(&out, "[PATH]");
        self.username.replace_all(&out, "[USER]").into_owned()
    }

    /// Keep function names and line/column, drop file paths
    pub fn scrub_stack_trace(&self, trace: &str) -> String {
        let out = self.frame_with_fn.replace_all(trace, "${1}${2} ([PATH]:${3}:${4})");
        let out = self.bare_frame.replace_all(&out, "${1}[PATH]:${2}:${3}");
        self.scrub_error_message(&out)
    }
}
