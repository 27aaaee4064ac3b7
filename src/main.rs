#[tokio::main]
async fn main() -> std::io::Result<()> {
    horde_server::run_with_config().await
}
