use std::io::{IsTerminal, stderr};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{prefix} [{bar:40}] {pos:>5}/{len:<5} | {percent:>3}% | {elapsed_precise} | {msg}";

fn ellipsize(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut shortened: String = input.chars().take(keep).collect();
    shortened.push_str("...");
    shortened
}

/// Cooperative cancellation flag shared with indexing workers. Workers poll
/// it at chunk boundaries; the front-end sets it on interrupt.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Thin wrapper over an `indicatif` bar drawing to stderr. Every call is
/// mutually exclusive through the bar's internal lock; all worker-side
/// prints must go through [`ProgressReporter::println`].
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// A reporter for the indexing stage, sized to the file count. Hidden
    /// when stderr is not a terminal.
    pub fn for_indexing(count: u64) -> Self {
        let bar = if stderr().is_terminal() {
            ProgressBar::with_draw_target(Some(count), ProgressDrawTarget::stderr())
        } else {
            ProgressBar::with_draw_target(Some(count), ProgressDrawTarget::hidden())
        };
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_prefix("INDEX");
        Self { bar }
    }

    /// A reporter that renders nothing; used by tests and library callers.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn start_file(&self, path: &Path) {
        let name = path
            .file_name()
            .and_then(|os| os.to_str())
            .unwrap_or("<non-utf8>");
        self.bar.set_message(ellipsize(name, 40));
    }

    pub fn finish_file(&self) {
        self.bar.inc(1);
    }

    /// Print a line above the bar without tearing it.
    pub fn println(&self, message: &str) {
        self.bar.println(message);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
