use mcmgr::presentation::cli::CliApp;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging is installed per subcommand once the configuration is known
    let app = CliApp::new();
    app.run().await
}
