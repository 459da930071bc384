// Entrypoint for the CLI application.
// Keeps `main` small: everything happens in `ytup::run`.

fn main() -> anyhow::Result<()> {
    ytup::run()
}
