#[tokio::main]
async fn main() -> anyhow::Result<()> {
    streamgate::run().await
}
