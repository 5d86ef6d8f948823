//! Default content for the five core documents, used when a store is
//! initialized and a document is absent.

pub fn template_for(filename: &str) -> Option<&'static str> {
    match filename {
        "product-context.md" => Some(PRODUCT_CONTEXT),
        "active-context.md" => Some(ACTIVE_CONTEXT),
        "progress.md" => Some(PROGRESS),
        "decision-log.md" => Some(DECISION_LOG),
        "system-patterns.md" => Some(SYSTEM_PATTERNS),
        _ => None,
    }
}

const PRODUCT_CONTEXT: &str = "# Product Context\n\n\
    Describe the project's purpose, the problem it solves, and who it's for.\n";

const ACTIVE_CONTEXT: &str = "# Active Context\n\n\
    ## Current Project State\n\n\
    \n\
    ## Ongoing Tasks\n\n\
    \n\
    ## Known Issues\n\n\
    \n\
    ## Next Steps\n\n\
    \n\
    ## Session Notes\n\n";

const PROGRESS: &str = "# Progress\n\n## Update History\n\n";

const DECISION_LOG: &str = "# Decision Log\n\n";

const SYSTEM_PATTERNS: &str = "# System Patterns\n\n\
    Describe recurring architectural and design patterns used in this project.\n";
