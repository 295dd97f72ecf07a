fn main() {
    std::process::exit(assetsync_lib::run())
}
