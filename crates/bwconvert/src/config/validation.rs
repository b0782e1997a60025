//! Setting value validation.

use bw_engine::LumaWeights;

use super::{KEY_DPI, KEY_INVERT, KEY_LUMA, KEY_THRESHOLD, KEY_VERBOSE};

/// Validate a setting value. Returns `Ok(())` if valid, or an error message.
pub fn validate_setting(key: &str, value: &str) -> Result<(), String> {
    match key {
        KEY_THRESHOLD => validate_int_range(value, 0, 255)?,
        KEY_DPI => validate_int_range(value, 1, 10_000)?,
        KEY_LUMA => {
            if LumaWeights::parse(value).is_none() {
                return Err("must be 'rec601' or 'rec709'".into());
            }
        }
        // Boolean settings
        KEY_INVERT | KEY_VERBOSE => {
            if value != "true" && value != "false" {
                return Err("must be 'true' or 'false'".into());
            }
        }
        _ => {}
    }
    Ok(())
}

fn validate_int_range(value: &str, min: i32, max: i32) -> Result<(), String> {
    let v: i32 = value.trim().parse().map_err(|_| "must be an integer")?;
    if v < min || v > max {
        return Err(format!("must be between {min} and {max}"));
    }
    Ok(())
}
