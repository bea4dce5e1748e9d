fn main() {
    mockshift::cli::run();
}
