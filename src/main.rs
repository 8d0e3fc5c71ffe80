fn main() {
    if let Err(err) = export_migrate::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
