fn main() {
    if let Err(err) = telemetry_hub::app::run() {
        eprintln!("application startup failed: {err}");
        std::process::exit(1);
    }
}
