pub(crate) mod reconciliation;
pub(crate) mod scheduler;
