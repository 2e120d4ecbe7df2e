//! Backends command implementation

use crate::cli::output::{format_backends_json, format_backends_table, BackendView};
use crate::cli::{load_or_default, BackendsArgs};

/// Handle `switchyard backends`: configured backends with tier membership.
pub fn handle_backends(args: &BackendsArgs) -> anyhow::Result<String> {
    let config = load_or_default(&args.config)?;
    config.validate()?;

    let views: Vec<BackendView> = config
        .backends
        .iter()
        .map(|backend| BackendView::new(backend, &config))
        .collect();

    if args.json {
        Ok(format_backends_json(&views)?)
    } else {
        Ok(format_backends_table(&views))
    }
}
