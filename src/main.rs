fn main() {
    if let Err(err) = graphx_layout::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
