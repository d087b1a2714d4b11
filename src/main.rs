fn main() {
    if let Err(err) = focuscam_lib::run() {
        eprintln!("focuscam: {err:#}");
        std::process::exit(1);
    }
}
