//! Classify command implementation

use crate::classifier::TierPolicy;
use crate::cli::output::{format_classification_json, format_classification_table};
use crate::cli::{load_or_default, ClassifyArgs};

/// Handle `switchyard classify`: analysis and tier decision, no backend calls.
pub fn handle_classify(args: &ClassifyArgs) -> anyhow::Result<String> {
    let config = load_or_default(&args.config)?;
    let (analysis, decision) = TierPolicy::from_config(&config.classifier).classify(&args.text);

    if args.json {
        Ok(format_classification_json(&analysis, &decision)?)
    } else {
        Ok(format_classification_table(&analysis, &decision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(text: &str, config: PathBuf) -> ClassifyArgs {
        ClassifyArgs {
            text: text.to_string(),
            json: true,
            config,
        }
    }

    #[test]
    fn test_classify_json_with_defaults() {
        let output =
            handle_classify(&args("```sql\nSELECT 1\n```", PathBuf::from("missing.toml"))).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["tier"], "complex");
        assert_eq!(parsed["analysis"]["has_code"], true);
    }

    #[test]
    fn test_classify_uses_configured_thresholds() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[classifier]\nmedium_threshold = 0\n").unwrap();

        let output = handle_classify(&args("hello", temp.path().to_path_buf())).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["tier"], "medium");
    }

    #[test]
    fn test_classify_reports_bad_config() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[classifier\n").unwrap();

        assert!(handle_classify(&args("hello", temp.path().to_path_buf())).is_err());
    }
}
