use fluent_bundle::{FluentArgs, FluentBundle, FluentResource, FluentValue};
use unic_langid::LanguageIdentifier;

/// Anything that can turn a message code plus named args into text.
pub trait Localize {
    fn msg(&self, code: &str, args: &[(&str, &str)]) -> String;
}

/// Fluent-based localizer with built-in resources.
pub struct FluentLoc {
    bundle: FluentBundle<FluentResource>,
}

impl FluentLoc {
    /// Create a localizer using built-in `.ftl` strings (see ../i18n).
    pub fn builtin(lang: &str) -> Self {
        let langid: LanguageIdentifier = lang.parse().unwrap_or_default();

        // Only en-GB ships today; every other tag falls back to it.
        let ftl_src = include_str!("../i18n/en-GB.ftl");

        let mut bundle = FluentBundle::new(vec![langid]);
        // Terminal output: no bidi isolation marks around paths.
        bundle.set_use_isolating(false);
        match FluentResource::try_new(ftl_src.to_owned()) {
            Ok(res) => {
                if let Err(errs) = bundle.add_resource(res) {
                    tracing::warn!(?errs, "conflicting messages in built-in resource");
                }
            }
            Err((_, errs)) => tracing::warn!(?errs, "invalid built-in FTL resource"),
        }
        Self { bundle }
    }
}

impl Localize for FluentLoc {
    /// Returns the code itself if the message is missing or fails to format.
    fn msg(&self, code: &str, args: &[(&str, &str)]) -> String {
        let Some(msg) = self.bundle.get_message(code) else {
            return code.to_string();
        };
        let Some(pattern) = msg.value() else {
            return code.to_string();
        };

        let mut fa = FluentArgs::new();
        for (k, v) in args {
            fa.set(*k, FluentValue::from(*v));
        }

        let mut errs = vec![];
        let s = self.bundle.format_pattern(pattern, Some(&fa), &mut errs).to_string();

        if errs.is_empty() {
            s
        } else {
            code.to_string()
        }
    }
}

/// A no-op localizer you can use in tests.
pub struct NoopLoc;

impl Localize for NoopLoc {
    fn msg(&self, code: &str, _args: &[(&str, &str)]) -> String {
        code.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_formats_with_args() {
        let loc = FluentLoc::builtin("en-GB");
        let s = loc.msg("archive-created", &[("path", "/tmp/out.zip")]);
        assert_eq!(s, "Archive created successfully:\n/tmp/out.zip");
    }

    #[test]
    fn unknown_language_falls_back() {
        let loc = FluentLoc::builtin("xx-not-a-tag!");
        let s = loc.msg("archive-failed", &[("reason", "disk full")]);
        assert!(s.ends_with("disk full"), "{s}");
    }

    #[test]
    fn missing_code_is_echoed() {
        assert_eq!(FluentLoc::builtin("en").msg("no-such-message", &[]), "no-such-message");
        assert_eq!(NoopLoc.msg("archive-created", &[("path", "x")]), "archive-created");
    }
}
