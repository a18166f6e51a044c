use chrono::Utc;
use mongodb::bson::{to_bson, Bson};
use mongodb::{options::ClientOptions, Client, Database};

use crate::error::AppError;

pub struct MongoDB {
    pub client: Client,
    pub db: Database,
}

impl MongoDB {
    pub async fn init(uri: &str, db_name: &str) -> Self {
        let client_options = ClientOptions::parse(uri)
            .await
            .expect("Failed to parse MongoDB connection string");
        let client = Client::with_options(client_options).expect("Failed to initialize client");
        let db = client.database(db_name);
        MongoDB { client, db }
    }
}

/// Timestamp bump for update documents, serialized the same way the
/// model structs serialize their chrono fields on insert.
pub(crate) fn now_bson() -> Result<Bson, AppError> {
    Ok(to_bson(&Utc::now())?)
}
