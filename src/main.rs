fn main() {
    if let Err(err) = nyc311_db::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
