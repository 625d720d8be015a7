#[tokio::main]
async fn main() -> std::io::Result<()> {
    realm_server::run_with_config().await
}
