use stockroom_core::RecordDraft;

use crate::commands::common::{format_record, print_success, CliContext};
use crate::error::CliError;

pub async fn run_add(draft: RecordDraft, as_json: bool, context: &CliContext) -> Result<(), CliError> {
    // Reject bad input before touching the keychain or the network.
    draft.validate()?;

    let store = context.open_store().await?;
    let record = store.add_record(&draft).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_success(&store.status());
        println!("{}", format_record(&record));
    }
    Ok(())
}
