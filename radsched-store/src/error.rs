use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage temporarily unavailable: {0}")]
    Transient(#[from] sqlx::Error),

    #[error("conversation state changed concurrently")]
    ConcurrentTransition,

    #[error("a non-terminal conversation already exists for this phone number")]
    ActiveConversationExists,

    #[error("record not found")]
    NotFound,

    #[error("stored order_data did not match the expected shape: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl From<StoreError> for radsched_core::CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConcurrentTransition => radsched_core::CoreError::ConcurrentTransition,
            StoreError::NotFound => radsched_core::CoreError::NoActiveConversation,
            StoreError::Transient(_) | StoreError::Corrupt(_) | StoreError::ActiveConversationExists => {
                radsched_core::CoreError::StorageTransient
            }
        }
    }
}
