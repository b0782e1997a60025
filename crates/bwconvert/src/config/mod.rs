//! Conversion defaults loaded from the environment, with command-line
//! overrides.

pub mod validation;

use bw_engine::{ConversionRequest, DEFAULT_DPI, DEFAULT_THRESHOLD, LumaWeights};

use crate::args::Args;
use validation::validate_setting;

pub const KEY_THRESHOLD: &str = "BWCONVERT_THRESHOLD";
pub const KEY_INVERT: &str = "BWCONVERT_INVERT";
pub const KEY_VERBOSE: &str = "BWCONVERT_VERBOSE";
pub const KEY_DPI: &str = "BWCONVERT_DPI";
pub const KEY_LUMA: &str = "BWCONVERT_LUMA";

/// Defaults for every conversion started from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    pub threshold: i32,
    pub invert: bool,
    pub verbose: bool,
    pub dpi: u32,
    pub luma: LumaWeights,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            threshold: i32::from(DEFAULT_THRESHOLD),
            invert: false,
            verbose: false,
            dpi: DEFAULT_DPI,
            luma: LumaWeights::default(),
        }
    }
}

/// An environment value that failed validation and was replaced by the
/// default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedSetting {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

impl CliConfig {
    /// Load from process environment variables.
    pub fn from_env() -> (Self, Vec<RejectedSetting>) {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty or invalid values keep the
    /// built-in default; invalid ones are returned so the caller can report
    /// them once logging is up.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> (Self, Vec<RejectedSetting>) {
        let mut rejected = Vec::new();
        let mut get = |key: &'static str| -> Option<String> {
            let value = lookup(key)?;
            let value = value.trim();
            if value.is_empty() {
                return None;
            }
            match validate_setting(key, value) {
                Ok(()) => Some(value.to_string()),
                Err(reason) => {
                    rejected.push(RejectedSetting {
                        key,
                        value: value.to_string(),
                        reason,
                    });
                    None
                }
            }
        };

        let defaults = Self::default();
        let config = Self {
            threshold: get(KEY_THRESHOLD)
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.threshold),
            invert: get(KEY_INVERT).map_or(defaults.invert, |v| v == "true"),
            verbose: get(KEY_VERBOSE).map_or(defaults.verbose, |v| v == "true"),
            dpi: get(KEY_DPI)
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.dpi),
            luma: get(KEY_LUMA)
                .and_then(|v| LumaWeights::parse(&v))
                .unwrap_or(defaults.luma),
        };
        (config, rejected)
    }

    /// Build the engine request, letting command-line values win.
    pub fn request(&self, args: &Args) -> ConversionRequest {
        ConversionRequest::new(
            &args.input,
            &args.output,
            args.threshold.unwrap_or(self.threshold),
        )
        .with_invert(args.invert || self.invert)
        .with_verbose(args.verbose || self.verbose)
        .with_luma(args.luma.unwrap_or(self.luma))
        .with_dpi(args.dpi.unwrap_or(self.dpi))
    }
}

/// Load a `.env` file from the working directory or its parent, if any.
/// Returns the path that was loaded.
pub fn load_dotenv() -> Option<&'static str> {
    [".env", "../.env"]
        .into_iter()
        .find(|path| dotenvy::from_filename(path).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let (cfg, rejected) = CliConfig::from_lookup(|_| None);
        assert!(rejected.is_empty());
        assert_eq!(cfg, CliConfig::default());
        assert_eq!(cfg.threshold, 128);
        assert_eq!(cfg.dpi, 300);
        assert_eq!(cfg.luma, LumaWeights::Rec601);
    }

    #[test]
    fn test_environment_values_applied() {
        let (cfg, _) = CliConfig::from_lookup(lookup(&[
            (KEY_THRESHOLD, "90"),
            (KEY_INVERT, "true"),
            (KEY_VERBOSE, "true"),
            (KEY_DPI, "600"),
            (KEY_LUMA, "rec709"),
        ]));
        assert_eq!(cfg.threshold, 90);
        assert!(cfg.invert);
        assert!(cfg.verbose);
        assert_eq!(cfg.dpi, 600);
        assert_eq!(cfg.luma, LumaWeights::Rec709);
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let (cfg, rejected) = CliConfig::from_lookup(lookup(&[
            (KEY_THRESHOLD, "999"),
            (KEY_INVERT, "yes"),
            (KEY_DPI, "0"),
            (KEY_LUMA, "srgb"),
            (KEY_VERBOSE, ""),
        ]));
        assert_eq!(cfg, CliConfig::default());

        // Empty values are treated as unset, not as invalid.
        let keys: Vec<&str> = rejected.iter().map(|r| r.key).collect();
        assert_eq!(keys, vec![KEY_THRESHOLD, KEY_INVERT, KEY_DPI, KEY_LUMA]);
        assert_eq!(rejected[0].value, "999");
        assert_eq!(rejected[0].reason, "must be between 0 and 255");
    }

    #[test]
    fn test_command_line_overrides_environment() {
        let (cfg, _) = CliConfig::from_lookup(lookup(&[(KEY_THRESHOLD, "90"), (KEY_DPI, "600")]));
        let args = Args::try_parse_from([
            "bwconvert", "-t", "200", "--luma", "709", "-i", "in.png", "out.png",
        ])
        .unwrap();

        let req = cfg.request(&args);
        assert_eq!(req.threshold, 200);
        assert_eq!(req.dpi, 600);
        assert_eq!(req.luma, LumaWeights::Rec709);
        assert!(req.invert);
        assert!(!req.verbose);
        assert_eq!(req.input.to_str(), Some("in.png"));
    }

    #[test]
    fn test_environment_flags_apply_when_not_given() {
        let (cfg, _) =
            CliConfig::from_lookup(lookup(&[(KEY_INVERT, "true"), (KEY_VERBOSE, "true")]));
        let args = Args::try_parse_from(["bwconvert", "a", "b"]).unwrap();
        let req = cfg.request(&args);
        assert!(req.invert);
        assert!(req.verbose);
        assert_eq!(req.threshold, 128);
    }

    #[test]
    fn test_invalid_verbose_value_does_not_enable_verbose() {
        let (cfg, rejected) = CliConfig::from_lookup(lookup(&[(KEY_VERBOSE, "1")]));
        assert_eq!(rejected.len(), 1);
        let args = Args::try_parse_from(["bwconvert", "a", "b"]).unwrap();
        assert!(!cfg.request(&args).verbose);
    }
}
