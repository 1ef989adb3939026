use crate::commands::common::{print_records, CliContext};
use crate::error::CliError;

pub async fn run_list(as_json: bool, context: &CliContext) -> Result<(), CliError> {
    let store = context.open_store().await?;
    store.initialize().await?;
    print_records(&store.records(), as_json)
}
