use crate::commands::common::{parse_record_id, print_success, CliContext};
use crate::error::CliError;

pub async fn run_delete(id: &str, context: &CliContext) -> Result<(), CliError> {
    let id = parse_record_id(id)?;
    let store = context.open_store().await?;
    store.remove_record(&id).await?;
    print_success(&store.status());
    println!("{id}");
    Ok(())
}
