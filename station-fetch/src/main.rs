fn main() {
    if let Err(err) = telemetry_hub::app::run_station_fetch() {
        eprintln!("station fetch failed: {err}");
        std::process::exit(1);
    }
}
