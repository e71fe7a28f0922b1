//! Email Dispatcher - Entry Point
//!
//! Sends one email per batch of queued records.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    email_dispatcher::run().await
}
