mod connection;
mod error;
mod models;
mod store;

pub use connection::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoScoreboardStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::Corrupt {
                collection,
                message,
            } => StorageError::corrupt(collection, message),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
