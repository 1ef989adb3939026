use crate::commands::common::{normalize_search_term, print_records, CliContext};
use crate::error::CliError;

pub async fn run_search(term: &str, as_json: bool, context: &CliContext) -> Result<(), CliError> {
    let term = normalize_search_term(term)?;
    let store = context.open_store().await?;
    store.search(term).await?;
    print_records(&store.records(), as_json)
}
