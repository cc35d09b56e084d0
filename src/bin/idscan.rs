fn main() -> anyhow::Result<()> {
    identity_scanner::cli::run()
}
