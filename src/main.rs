use std::env;

use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use wallet_eng::csv::{read_ops, write_accounts};
use wallet_eng::driver::Driver;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let path = env::args()
        .nth(1)
        .expect("usage: wallet-eng <operations.csv>");

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let driver = Driver::new();
    let (op_sender, op_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in read_ops(&path) {
            match result {
                Ok(op) => {
                    op_sender.send(op).await.unwrap();
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    driver.run(ReceiverStream::new(op_receiver)).await;

    write_accounts(driver.snapshot().await);
}
