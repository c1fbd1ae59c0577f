//! Consumer-side handler for contract-created events.

use async_trait::async_trait;
use domain::ContractCreated;
use messaging::{Delivery, HandlerError, MessageHandler, decode_json};

/// Logs every contract-created event taken from the queue.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContractCreatedListener;

#[async_trait]
impl MessageHandler for ContractCreatedListener {
    async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError> {
        let event: ContractCreated = decode_json(delivery)?;
        tracing::info!(
            contract_id = %event.contract_id,
            proposal_id = %event.proposal_id,
            contract_date = %event.contract_date,
            redelivered = delivery.redelivered,
            "contract created event received"
        );
        Ok(())
    }
}
