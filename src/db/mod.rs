use log::{error, info};
use mongodb::{Client, Database};
use rocket::fairing::AdHoc;

use crate::services::{ApplicationFeeService, SubscriptionService};

/// Connects to MongoDB and wires the payment services once at ignite.
/// Everything downstream receives them through managed state; nothing else
/// constructs repositories or gateway clients.
pub fn init() -> AdHoc {
    AdHoc::try_on_ignite("MongoDB", |rocket| async {
        match connect().await {
            Ok(database) => {
                info!("MongoDB connected");
                let subscriptions = SubscriptionService::new(&database);
                let application_fees = ApplicationFeeService::new(&database);
                Ok(rocket
                    .manage(database)
                    .manage(subscriptions)
                    .manage(application_fees))
            }
            Err(e) => {
                error!("Failed to connect to MongoDB: {}", e);
                Err(rocket)
            }
        }
    })
}

async fn connect() -> Result<Database, mongodb::error::Error> {
    let uri = crate::config::Config::mongodb_uri();
    let client = Client::with_uri_str(&uri).await?;

    // Test connection
    client
        .database("admin")
        .run_command(mongodb::bson::doc! {"ping": 1}, None)
        .await?;

    Ok(client.database("academy"))
}

pub type DbConn = Database;
