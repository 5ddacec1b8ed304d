fn main() -> anyhow::Result<()> {
    shortcut_deck::cli::run()
}
