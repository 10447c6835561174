use anyhow::{bail, Context, Result};
use std::fs;

use crate::backend::Client;
use crate::config::Options;
use crate::diagnostics::{self, Severity};
use crate::inspector;

/// Run the whole scan: read file, parse, relay diagnostics, filter by
/// pattern, one backend request per match, print each result to stdout.
///
/// A fatal diagnostic aborts before any backend call. A failed request for
/// one match is reported and the remaining matches still run; the run as a
/// whole fails if any request failed.
pub fn run(opts: &Options) -> Result<()> {
    run_with_client(opts, &Client::new(opts.api_key.clone()))
}

/// Like `run`, but with the backend client supplied by the caller.
pub fn run_with_client(opts: &Options, client: &Client) -> Result<()> {
    let source = fs::read_to_string(&opts.input_file)
        .with_context(|| format!("failed to read {}", opts.input_file.display()))?;

    if !opts.search_paths.is_empty() {
        log::debug!(
            "{} search path(s) accepted but unused: this parser runs no preprocessor",
            opts.search_paths.len()
        );
    }

    let tree = inspector::parse_source(&opts.input_file, &source)?;

    let diags = diagnostics::collect(tree.root_node(), &source);
    for diag in &diags {
        match diag.severity {
            Severity::Warning => log::warn!("{diag}"),
            Severity::Error => log::error!("{diag}"),
        }
    }
    if diagnostics::has_fatal(&diags) {
        bail!(
            "fatal diagnostics in {}; no requests were made",
            opts.input_file.display()
        );
    }

    let decls = inspector::collect_functions(tree.root_node(), &source);
    let matches = inspector::filter_matches(&decls, &opts.function_name);
    log::info!(
        "{} of {} function declaration(s) match the pattern",
        matches.len(),
        decls.len()
    );

    let mut failed = 0usize;

    for decl in matches {
        let Some(text) = decl.span.slice(&source) else {
            log::warn!("unresolvable source span for `{}`, skipping", decl.name);
            continue;
        };
        log::info!("found match: {} (line {})", decl.name, decl.line);

        match client.generate(text, opts.personality.instruction()) {
            Ok(output) => println!("{output}"),
            Err(err) => {
                failed += 1;
                log::error!("request for `{}` failed: {err:#}", decl.name);
            }
        }
    }

    if failed > 0 {
        bail!("{failed} request(s) failed");
    }
    Ok(())
}
