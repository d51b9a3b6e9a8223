#[tokio::main]
async fn main() -> eyre::Result<()> {
    sqdelay::run().start().await
}
