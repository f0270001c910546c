#[tokio::main]
async fn main() {
    std::process::exit(cdflow::run().await);
}
