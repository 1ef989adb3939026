use crate::commands::common::{format_record, parse_record_id, print_success, CliContext};
use crate::error::CliError;

/// Field overrides for `stockroom edit`; unset fields keep their value.
#[derive(Debug, Default)]
pub struct EditChanges {
    pub name: Option<String>,
    pub quantity: Option<String>,
    pub price: Option<String>,
}

impl EditChanges {
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.quantity.is_none() && self.price.is_none()
    }
}

pub async fn run_edit(id: &str, changes: EditChanges, context: &CliContext) -> Result<(), CliError> {
    if changes.is_empty() {
        return Err(CliError::NothingToEdit);
    }
    let id = parse_record_id(id)?;

    let store = context.open_store().await?;
    store.initialize().await?;

    let mut draft = store.begin_edit(&id)?;
    if let Some(name) = changes.name {
        draft.name = name;
    }
    if let Some(quantity) = changes.quantity {
        draft.quantity = quantity;
    }
    if let Some(price) = changes.price {
        draft.price = price;
    }
    store.update_draft(draft)?;
    store.commit_edit(&id).await?;

    print_success(&store.status());
    if let Some(record) = store.record(&id) {
        println!("{}", format_record(&record));
    }
    Ok(())
}
