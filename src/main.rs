fn main() {
    if let Err(err) = csm::run() {
        log::error!("{err}");
        std::process::exit(err.exit_code());
    }
}
