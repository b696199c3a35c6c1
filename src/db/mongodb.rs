use anyhow::{Context, Result};
use mongodb::{Client, Database};
use std::env;

pub async fn get_database() -> Result<Database> {
    let uri = env::var("MONGO_URI").context("MONGO_URI not set")?;
    let db_name = env::var("MONGO_DB").unwrap_or_else(|_| String::from("elspor"));

    let client = Client::with_uri_str(&uri)
        .await
        .context("Failed to connect to MongoDB")?;

    Ok(client.database(&db_name))
}
