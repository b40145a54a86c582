fn main() {
    if let Err(err) = mining_facts::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
